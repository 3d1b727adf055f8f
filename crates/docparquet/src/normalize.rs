//! Record normalization
//!
//! Turns a decoded record into a [`Document`]:
//!
//! - a list wrapper group becomes a sequence of its `array` occurrences
//! - any other group becomes a map keyed by field name, holding the first
//!   occurrence of every present field; absent fields are omitted
//! - every scalar is passed through the field interceptor with its logical path
//!
//! Paths are built like column selector paths, so a selector and an
//! interceptor see the same name for the same column.

use std::collections::BTreeMap;

use crate::document::Document;
use crate::error::{Error, Result};
use crate::interceptor::FieldInterceptor;
use crate::record::{DecodedRecord, Group, Value};
use crate::schema::path::child_path;
use crate::schema::{GroupNode, SchemaNode};

/// Normalizes one record
pub fn normalize(record: &DecodedRecord, interceptor: &dyn FieldInterceptor) -> Result<Document> {
    normalize_group(record.schema(), record.root(), interceptor, "")
}

fn normalize_group(
    schema: &GroupNode,
    group: &Group,
    interceptor: &dyn FieldInterceptor,
    path: &str,
) -> Result<Document> {
    if group.field_count() != schema.children().len() {
        return Err(Error::PreconditionFailed(format!(
            "record group at {:?} has {} fields but schema {} declares {}",
            path,
            group.field_count(),
            schema.name(),
            schema.children().len()
        )));
    }

    if schema.is_list_wrapper() {
        let element = &schema.children()[0];
        let items = group
            .values(0)
            .iter()
            .map(|value| normalize_value(element, value, interceptor, path))
            .collect::<Result<Vec<_>>>()?;
        return Ok(Document::Sequence(items));
    }

    let mut map = BTreeMap::new();
    for (index, field) in schema.children().iter().enumerate() {
        // Non-wrapper fields are single-valued in documents
        let Some(value) = group.values(index).first() else {
            continue;
        };
        let field_path = child_path(path, field.name());
        map.insert(
            field.name().to_string(),
            normalize_value(field, value, interceptor, &field_path)?,
        );
    }
    Ok(Document::Map(map))
}

fn normalize_value(
    node: &SchemaNode,
    value: &Value,
    interceptor: &dyn FieldInterceptor,
    path: &str,
) -> Result<Document> {
    match (node, value) {
        (SchemaNode::Group(schema), Value::Group(group)) => {
            normalize_group(schema, group, interceptor, path)
        }
        (SchemaNode::Leaf(_), Value::Scalar(raw)) => {
            Ok(Document::Scalar(interceptor.intercept(path, raw.clone())))
        }
        _ => Err(Error::PreconditionFailed(format!(
            "record value at {:?} does not match field {}",
            path,
            node.name()
        ))),
    }
}
