//! Writing documents as nested Parquet records
//!
//! Documents are turned into a stream of record events by [`emit_document`],
//! the mirror image of normalization: maps become groups, sequences under a
//! list wrapper become occurrences of its `array` field. The events are shredded
//! into column values with repetition and definition levels by
//! [`ColumnShredder`], and [`DocumentWriter`] flushes buffered rows as row groups.

mod shredder;
mod writer;

pub use shredder::ColumnShredder;
pub use writer::{write_json, writer_properties, DocumentWriter};

use std::collections::BTreeMap;

use crate::document::Document;
use crate::error::{Error, Result};
use crate::schema::path::child_path;
use crate::schema::{GroupNode, SchemaNode};

/// Receives one record as a sequence of structural events
///
/// Fields must be opened in a group instance at most once and carry at least
/// one value; absent fields are simply never started.
pub trait RecordConsumer {
    fn start_message(&mut self) -> Result<()>;
    fn end_message(&mut self) -> Result<()>;
    fn start_field(&mut self, name: &str, index: usize) -> Result<()>;
    fn end_field(&mut self, name: &str, index: usize) -> Result<()>;
    fn start_group(&mut self) -> Result<()>;
    fn end_group(&mut self) -> Result<()>;
    fn add_scalar(&mut self, value: &str) -> Result<()>;
}

/// Emits `document` as one record of `schema`
///
/// Fails with `InvalidDocument` when the document has keys the schema does not
/// declare, misses a required field, or has a different shape than the schema.
pub fn emit_document(
    schema: &GroupNode,
    document: &Document,
    consumer: &mut dyn RecordConsumer,
) -> Result<()> {
    let Document::Map(map) = document else {
        return Err(Error::InvalidDocument(
            "a record must be a map".to_string(),
        ));
    };
    consumer.start_message()?;
    emit_fields(schema, map, consumer, "")?;
    consumer.end_message()
}

fn emit_fields(
    group: &GroupNode,
    map: &BTreeMap<String, Document>,
    consumer: &mut dyn RecordConsumer,
    path: &str,
) -> Result<()> {
    if let Some(unknown) = map.keys().find(|key| group.field_index(key).is_none()) {
        return Err(Error::InvalidDocument(format!(
            "{} is not declared in the schema",
            child_path(path, unknown)
        )));
    }

    for (index, field) in group.children().iter().enumerate() {
        let field_path = child_path(path, field.name());
        let Some(value) = map.get(field.name()) else {
            if field.is_required() {
                return Err(Error::InvalidDocument(format!(
                    "required field {} is missing",
                    field_path
                )));
            }
            continue;
        };

        consumer.start_field(field.name(), index)?;
        emit_occurrence(field, value, consumer, &field_path)?;
        consumer.end_field(field.name(), index)?;
    }
    Ok(())
}

fn emit_occurrence(
    node: &SchemaNode,
    value: &Document,
    consumer: &mut dyn RecordConsumer,
    path: &str,
) -> Result<()> {
    match (node, value) {
        (SchemaNode::Leaf(_), Document::Scalar(scalar)) => consumer.add_scalar(scalar),
        (SchemaNode::Group(group), Document::Sequence(items)) if group.is_list_wrapper() => {
            consumer.start_group()?;
            emit_list(group, items, consumer, path)?;
            consumer.end_group()
        }
        (SchemaNode::Group(group), Document::Map(map)) if !group.is_list_wrapper() => {
            consumer.start_group()?;
            emit_fields(group, map, consumer, path)?;
            consumer.end_group()
        }
        _ => Err(Error::InvalidDocument(format!(
            "{} does not match the shape of field {}",
            path,
            node.name()
        ))),
    }
}

/// Emits the items of a sequence as occurrences of the wrapper's `array` field
fn emit_list(
    wrapper: &GroupNode,
    items: &[Document],
    consumer: &mut dyn RecordConsumer,
    path: &str,
) -> Result<()> {
    if items.is_empty() {
        return Ok(());
    }

    let element = &wrapper.children()[0];
    consumer.start_field(element.name(), 0)?;
    for item in items {
        emit_occurrence(element, item, consumer, path)?;
    }
    consumer.end_field(element.name(), 0)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    /// Records events as text
    #[derive(Default)]
    struct EventLog(Vec<String>);

    impl RecordConsumer for EventLog {
        fn start_message(&mut self) -> Result<()> {
            self.0.push("start_message".to_string());
            Ok(())
        }

        fn end_message(&mut self) -> Result<()> {
            self.0.push("end_message".to_string());
            Ok(())
        }

        fn start_field(&mut self, name: &str, index: usize) -> Result<()> {
            self.0.push(format!("start_field {} {}", name, index));
            Ok(())
        }

        fn end_field(&mut self, name: &str, index: usize) -> Result<()> {
            self.0.push(format!("end_field {} {}", name, index));
            Ok(())
        }

        fn start_group(&mut self) -> Result<()> {
            self.0.push("start_group".to_string());
            Ok(())
        }

        fn end_group(&mut self) -> Result<()> {
            self.0.push("end_group".to_string());
            Ok(())
        }

        fn add_scalar(&mut self, value: &str) -> Result<()> {
            self.0.push(format!("scalar {}", value));
            Ok(())
        }
    }

    const SCHEMA: &str = "
        message root {
            required binary name (STRING);
            optional group aliases (LIST) {
                repeated binary array (STRING);
            }
            optional group meta {
                optional int32 age;
            }
        }
    ";

    fn emit(value: serde_json::Value) -> Result<Vec<String>> {
        let schema = GroupNode::parse(SCHEMA).unwrap();
        let document = Document::try_from(value).unwrap();
        let mut log = EventLog::default();
        emit_document(&schema, &document, &mut log)?;
        Ok(log.0)
    }

    #[test]
    fn test_events_follow_declaration_order() {
        let events = emit(json!({
            "meta": {"age": 89},
            "aliases": ["Maui", "Frank"],
            "name": "Donald",
        }))
        .unwrap();

        assert_eq!(
            events,
            vec![
                "start_message",
                "start_field name 0",
                "scalar Donald",
                "end_field name 0",
                "start_field aliases 1",
                "start_group",
                "start_field array 0",
                "scalar Maui",
                "scalar Frank",
                "end_field array 0",
                "end_group",
                "end_field aliases 1",
                "start_field meta 2",
                "start_group",
                "start_field age 0",
                "scalar 89",
                "end_field age 0",
                "end_group",
                "end_field meta 2",
                "end_message",
            ]
        );
    }

    #[test]
    fn test_empty_sequence_writes_empty_wrapper() {
        let events = emit(json!({"name": "Donald", "aliases": []})).unwrap();
        assert_eq!(
            events[4..8],
            ["start_field aliases 1", "start_group", "end_group", "end_field aliases 1"]
        );
    }

    #[test]
    fn test_invalid_documents() {
        for value in [
            json!({"name": "Donald", "surname": "Duck"}),
            json!({"aliases": []}),
            json!({"name": ["Donald"]}),
            json!({"name": "Donald", "aliases": "Maui"}),
            json!({"name": "Donald", "meta": ["x"]}),
            json!(["Donald"]),
        ] {
            let result = emit(value.clone());
            assert!(
                matches!(result, Err(Error::InvalidDocument(_))),
                "{} should be rejected",
                value
            );
        }
    }
}
