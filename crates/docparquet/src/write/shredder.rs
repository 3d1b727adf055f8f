//! Record shredding into leaf columns
//!
//! Every leaf column is buffered as values plus repetition and definition
//! levels. For a field `f` opened in a group instance that started at
//! repetition level `r`, the first occurrence is written at `r` and every
//! further one at `f`'s own maximum repetition level. A field that never
//! occurs writes one null into each leaf below it, at `r` and the definition
//! level of the enclosing group.

use parquet::basic::Type as PhysicalType;
use parquet::column::writer::ColumnWriter;
use parquet::data_type::{ByteArray, FixedLenByteArray};
use parquet::file::writer::SerializedFileWriter;
use std::io::Write;

use super::RecordConsumer;
use crate::error::{Error, Result};
use crate::schema::{GroupNode, LeafNode, SchemaNode};

/// Flattened schema node
#[derive(Debug)]
struct FlatNode {
    name: String,
    repeated: bool,
    required: bool,
    max_rep: i16,
    max_def: i16,
    kind: NodeKind,
}

#[derive(Debug)]
enum NodeKind {
    Group { children: Vec<usize> },
    Leaf { column: usize },
}

#[derive(Debug)]
enum ColumnValues {
    Boolean(Vec<bool>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    ByteArray(Vec<ByteArray>),
    FixedLenByteArray {
        length: usize,
        values: Vec<FixedLenByteArray>,
    },
}

#[derive(Debug)]
struct ColumnBuffer {
    name: String,
    max_rep: i16,
    max_def: i16,
    values: ColumnValues,
    def_levels: Vec<i16>,
    rep_levels: Vec<i16>,
}

/// Position of a column buffer before the current record
#[derive(Debug, Clone, Copy)]
struct Checkpoint {
    values: usize,
    levels: usize,
}

#[derive(Debug)]
struct OpenField {
    position: usize,
    count: usize,
}

/// One group instance being written
#[derive(Debug)]
struct Frame {
    node: usize,
    rep: i16,
    written: Vec<bool>,
    field: Option<OpenField>,
}

/// Buffers shredded records until they are flushed as a row group
#[derive(Debug)]
pub struct ColumnShredder {
    nodes: Vec<FlatNode>,
    columns: Vec<ColumnBuffer>,
    stack: Vec<Frame>,
    checkpoints: Vec<Checkpoint>,
    rows: usize,
}

impl ColumnValues {
    fn new(leaf: &LeafNode, column: &str) -> Result<Self> {
        Ok(match leaf.physical_type() {
            PhysicalType::BOOLEAN => ColumnValues::Boolean(Vec::new()),
            PhysicalType::INT32 => ColumnValues::Int32(Vec::new()),
            PhysicalType::INT64 => ColumnValues::Int64(Vec::new()),
            PhysicalType::FLOAT => ColumnValues::Float(Vec::new()),
            PhysicalType::DOUBLE => ColumnValues::Double(Vec::new()),
            PhysicalType::BYTE_ARRAY => ColumnValues::ByteArray(Vec::new()),
            PhysicalType::FIXED_LEN_BYTE_ARRAY => ColumnValues::FixedLenByteArray {
                length: usize::try_from(leaf.type_length()).map_err(|_| {
                    Error::InvalidSchema(format!("column {} has no fixed length", column))
                })?,
                values: Vec::new(),
            },
            PhysicalType::INT96 => {
                return Err(Error::InvalidSchema(format!(
                    "column {} has unsupported physical type INT96",
                    column
                )))
            }
        })
    }

    fn push(&mut self, column: &str, value: &str) -> Result<()> {
        fn parse<T: std::str::FromStr>(column: &str, value: &str) -> Result<T> {
            value.trim().parse().map_err(|_| {
                Error::InvalidRecord(format!(
                    "value {:?} does not fit column {}",
                    value, column
                ))
            })
        }

        match self {
            ColumnValues::Boolean(values) => values.push(parse(column, value)?),
            // Unsigned annotations share the signed physical types
            ColumnValues::Int32(values) => values.push(
                parse::<i32>(column, value)
                    .or_else(|_| parse::<u32>(column, value).map(|v| v as i32))?,
            ),
            ColumnValues::Int64(values) => values.push(
                parse::<i64>(column, value)
                    .or_else(|_| parse::<u64>(column, value).map(|v| v as i64))?,
            ),
            ColumnValues::Float(values) => values.push(parse(column, value)?),
            ColumnValues::Double(values) => values.push(parse(column, value)?),
            ColumnValues::ByteArray(values) => values.push(ByteArray::from(value)),
            ColumnValues::FixedLenByteArray { length, values } => {
                if value.len() != *length {
                    return Err(Error::InvalidRecord(format!(
                        "value {:?} has {} bytes but column {} holds exactly {}",
                        value,
                        value.len(),
                        column,
                        length
                    )));
                }
                values.push(FixedLenByteArray::from(ByteArray::from(value)))
            }
        }
        Ok(())
    }

    fn len(&self) -> usize {
        match self {
            ColumnValues::Boolean(values) => values.len(),
            ColumnValues::Int32(values) => values.len(),
            ColumnValues::Int64(values) => values.len(),
            ColumnValues::Float(values) => values.len(),
            ColumnValues::Double(values) => values.len(),
            ColumnValues::ByteArray(values) => values.len(),
            ColumnValues::FixedLenByteArray { values, .. } => values.len(),
        }
    }

    fn truncate(&mut self, len: usize) {
        match self {
            ColumnValues::Boolean(values) => values.truncate(len),
            ColumnValues::Int32(values) => values.truncate(len),
            ColumnValues::Int64(values) => values.truncate(len),
            ColumnValues::Float(values) => values.truncate(len),
            ColumnValues::Double(values) => values.truncate(len),
            ColumnValues::ByteArray(values) => values.truncate(len),
            ColumnValues::FixedLenByteArray { values, .. } => values.truncate(len),
        }
    }
}

impl ColumnBuffer {
    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            values: self.values.len(),
            levels: self.def_levels.len(),
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        self.values.truncate(checkpoint.values);
        self.def_levels.truncate(checkpoint.levels);
        self.rep_levels.truncate(checkpoint.levels);
    }

    fn push_value(&mut self, value: &str, rep: i16) -> Result<()> {
        self.values.push(&self.name, value)?;
        self.rep_levels.push(rep);
        self.def_levels.push(self.max_def);
        Ok(())
    }

    fn push_null(&mut self, rep: i16, def: i16) {
        self.rep_levels.push(rep);
        self.def_levels.push(def);
    }

    fn write_to(&self, writer: &mut ColumnWriter<'_>) -> Result<()> {
        let def = (self.max_def > 0).then_some(self.def_levels.as_slice());
        let rep = (self.max_rep > 0).then_some(self.rep_levels.as_slice());

        match (writer, &self.values) {
            (ColumnWriter::BoolColumnWriter(w), ColumnValues::Boolean(v)) => {
                w.write_batch(v, def, rep)?;
            }
            (ColumnWriter::Int32ColumnWriter(w), ColumnValues::Int32(v)) => {
                w.write_batch(v, def, rep)?;
            }
            (ColumnWriter::Int64ColumnWriter(w), ColumnValues::Int64(v)) => {
                w.write_batch(v, def, rep)?;
            }
            (ColumnWriter::FloatColumnWriter(w), ColumnValues::Float(v)) => {
                w.write_batch(v, def, rep)?;
            }
            (ColumnWriter::DoubleColumnWriter(w), ColumnValues::Double(v)) => {
                w.write_batch(v, def, rep)?;
            }
            (ColumnWriter::ByteArrayColumnWriter(w), ColumnValues::ByteArray(v)) => {
                w.write_batch(v, def, rep)?;
            }
            (ColumnWriter::FixedLenByteArrayColumnWriter(w), ColumnValues::FixedLenByteArray { values: v, .. }) => {
                w.write_batch(v, def, rep)?;
            }
            _ => {
                return Err(Error::InvalidRecord(format!(
                    "column writer for {} does not match its buffered values",
                    self.name
                )))
            }
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.values.truncate(0);
        self.def_levels.clear();
        self.rep_levels.clear();
    }
}

impl ColumnShredder {
    /// Prepares one column buffer per leaf of `schema`
    pub fn new(schema: &GroupNode) -> Result<Self> {
        let mut shredder = Self {
            nodes: Vec::new(),
            columns: Vec::new(),
            stack: Vec::new(),
            checkpoints: Vec::new(),
            rows: 0,
        };
        shredder.nodes.push(FlatNode {
            name: schema.name().to_string(),
            repeated: false,
            required: true,
            max_rep: 0,
            max_def: 0,
            kind: NodeKind::Group {
                children: Vec::new(),
            },
        });
        let children = shredder.flatten_children(schema, 0, 0, schema.name())?;
        shredder.nodes[0].kind = NodeKind::Group { children };
        Ok(shredder)
    }

    fn flatten_children(
        &mut self,
        group: &GroupNode,
        max_rep: i16,
        max_def: i16,
        path: &str,
    ) -> Result<Vec<usize>> {
        let mut ids = Vec::with_capacity(group.children().len());
        for child in group.children() {
            let repeated = child.is_repeated();
            let required = child.is_required();
            let child_rep = max_rep + i16::from(repeated);
            let child_def = max_def + i16::from(!required);
            let child_path = format!("{}.{}", path, child.name());

            let id = self.nodes.len();
            self.nodes.push(FlatNode {
                name: child.name().to_string(),
                repeated,
                required,
                max_rep: child_rep,
                max_def: child_def,
                kind: NodeKind::Group {
                    children: Vec::new(),
                },
            });

            let kind = match child {
                SchemaNode::Group(inner) => NodeKind::Group {
                    children: self.flatten_children(inner, child_rep, child_def, &child_path)?,
                },
                SchemaNode::Leaf(leaf) => {
                    let column = self.columns.len();
                    self.columns.push(ColumnBuffer {
                        values: ColumnValues::new(leaf, &child_path)?,
                        name: child_path,
                        max_rep: child_rep,
                        max_def: child_def,
                        def_levels: Vec::new(),
                        rep_levels: Vec::new(),
                    });
                    NodeKind::Leaf { column }
                }
            };
            self.nodes[id].kind = kind;
            ids.push(id);
        }
        Ok(ids)
    }

    /// Complete records buffered since the last flush
    pub fn buffered_rows(&self) -> usize {
        self.rows
    }

    /// Number of leaf columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Repetition and definition levels buffered for a column
    pub fn column_levels(&self, column: usize) -> Option<(&[i16], &[i16])> {
        self.columns
            .get(column)
            .map(|c| (c.rep_levels.as_slice(), c.def_levels.as_slice()))
    }

    /// Drops whatever the record in progress has buffered
    pub fn rollback(&mut self) {
        if self.checkpoints.len() == self.columns.len() {
            for (column, checkpoint) in self.columns.iter_mut().zip(&self.checkpoints) {
                column.restore(*checkpoint);
            }
        }
        self.checkpoints.clear();
        self.stack.clear();
    }

    /// Writes buffered rows as one row group and clears the buffers
    ///
    /// Returns the number of rows written; nothing is written when no row is buffered.
    pub fn flush<W: Write + Send>(&mut self, writer: &mut SerializedFileWriter<W>) -> Result<usize> {
        if !self.stack.is_empty() {
            return Err(Error::PreconditionFailed(
                "cannot flush in the middle of a record".to_string(),
            ));
        }
        if self.rows == 0 {
            return Ok(0);
        }

        let mut row_group = writer.next_row_group()?;
        for column in &mut self.columns {
            let mut column_writer = row_group.next_column()?.ok_or_else(|| {
                Error::InvalidSchema(format!("no column writer for {}", column.name))
            })?;
            column.write_to(column_writer.untyped())?;
            column_writer.close()?;
            column.clear();
        }
        row_group.close()?;

        Ok(std::mem::take(&mut self.rows))
    }

    fn top(&mut self) -> Result<&mut Frame> {
        self.stack
            .last_mut()
            .ok_or_else(|| Error::InvalidRecord("no record in progress".to_string()))
    }

    /// Counts one more occurrence of the open field; returns (child id, repetition level)
    fn next_occurrence(&mut self) -> Result<(usize, i16)> {
        let frame = self.stack.last_mut().ok_or_else(|| {
            Error::InvalidRecord("no record in progress".to_string())
        })?;
        let field = frame
            .field
            .as_mut()
            .ok_or_else(|| Error::InvalidRecord("value outside of a field".to_string()))?;
        let NodeKind::Group { children } = &self.nodes[frame.node].kind else {
            return Err(Error::InvalidRecord("value inside a leaf".to_string()));
        };
        let child = children[field.position];
        let node = &self.nodes[child];

        if field.count > 0 && !node.repeated {
            return Err(Error::InvalidRecord(format!(
                "field {} is not repeated but got a second value",
                node.name
            )));
        }
        let rep = if field.count == 0 { frame.rep } else { node.max_rep };
        field.count += 1;
        Ok((child, rep))
    }

    /// Writes nulls for every leaf below `node`
    fn write_nulls(&mut self, node: usize, rep: i16, def: i16) {
        match &self.nodes[node].kind {
            NodeKind::Leaf { column } => self.columns[*column].push_null(rep, def),
            NodeKind::Group { children } => {
                for child in children.clone() {
                    self.write_nulls(child, rep, def);
                }
            }
        }
    }

    /// Fills in absent fields of a finished group instance
    fn finish_frame(&mut self, frame: Frame) -> Result<()> {
        if let Some(field) = &frame.field {
            return Err(Error::InvalidRecord(format!(
                "field at position {} is still open",
                field.position
            )));
        }
        let NodeKind::Group { children } = &self.nodes[frame.node].kind else {
            return Err(Error::InvalidRecord("group event on a leaf".to_string()));
        };
        let children = children.clone();
        let def = self.nodes[frame.node].max_def;

        for (position, child) in children.into_iter().enumerate() {
            if frame.written[position] {
                continue;
            }
            if self.nodes[child].required {
                return Err(Error::InvalidRecord(format!(
                    "required field {} is missing",
                    self.nodes[child].name
                )));
            }
            self.write_nulls(child, frame.rep, def);
        }
        Ok(())
    }

    fn frame_for(&self, node: usize, rep: i16) -> Frame {
        let width = match &self.nodes[node].kind {
            NodeKind::Group { children } => children.len(),
            NodeKind::Leaf { .. } => 0,
        };
        Frame {
            node,
            rep,
            written: vec![false; width],
            field: None,
        }
    }
}

impl RecordConsumer for ColumnShredder {
    fn start_message(&mut self) -> Result<()> {
        if !self.stack.is_empty() {
            return Err(Error::InvalidRecord(
                "record started before the previous one ended".to_string(),
            ));
        }
        self.checkpoints = self.columns.iter().map(ColumnBuffer::checkpoint).collect();
        let root = self.frame_for(0, 0);
        self.stack.push(root);
        Ok(())
    }

    fn end_message(&mut self) -> Result<()> {
        if self.stack.len() != 1 {
            return Err(Error::InvalidRecord(
                "record ended inside a group".to_string(),
            ));
        }
        if let Some(frame) = self.stack.pop() {
            self.finish_frame(frame)?;
        }
        self.checkpoints.clear();
        self.rows += 1;
        Ok(())
    }

    fn start_field(&mut self, name: &str, index: usize) -> Result<()> {
        let frame = self.stack.last().ok_or_else(|| {
            Error::InvalidRecord("no record in progress".to_string())
        })?;
        if frame.field.is_some() {
            return Err(Error::InvalidRecord(format!(
                "field {} started inside another field",
                name
            )));
        }
        let NodeKind::Group { children } = &self.nodes[frame.node].kind else {
            return Err(Error::InvalidRecord("field inside a leaf".to_string()));
        };
        let position = children
            .iter()
            .position(|&child| self.nodes[child].name == name)
            .ok_or_else(|| Error::InvalidRecord(format!("field {} is not declared", name)))?;
        if position != index {
            return Err(Error::InvalidRecord(format!(
                "field {} is declared at index {} but was started at {}",
                name, position, index
            )));
        }
        if frame.written[position] {
            return Err(Error::InvalidRecord(format!(
                "field {} was already written",
                name
            )));
        }

        self.top()?.field = Some(OpenField { position, count: 0 });
        Ok(())
    }

    fn end_field(&mut self, name: &str, index: usize) -> Result<()> {
        let frame = self.top()?;
        match frame.field.take() {
            Some(field) if field.position == index => {
                if field.count == 0 {
                    return Err(Error::InvalidRecord(format!(
                        "field {} ended without a value",
                        name
                    )));
                }
                frame.written[index] = true;
                Ok(())
            }
            _ => Err(Error::InvalidRecord(format!(
                "field {} ended but was not started",
                name
            ))),
        }
    }

    fn start_group(&mut self) -> Result<()> {
        let (child, rep) = self.next_occurrence()?;
        if !matches!(self.nodes[child].kind, NodeKind::Group { .. }) {
            return Err(Error::InvalidRecord(format!(
                "field {} is not a group",
                self.nodes[child].name
            )));
        }
        let frame = self.frame_for(child, rep);
        self.stack.push(frame);
        Ok(())
    }

    fn end_group(&mut self) -> Result<()> {
        if self.stack.len() < 2 {
            return Err(Error::InvalidRecord(
                "group ended outside of a group".to_string(),
            ));
        }
        match self.stack.pop() {
            Some(frame) => self.finish_frame(frame),
            None => Ok(()),
        }
    }

    fn add_scalar(&mut self, value: &str) -> Result<()> {
        let (child, rep) = self.next_occurrence()?;
        let NodeKind::Leaf { column } = self.nodes[child].kind else {
            return Err(Error::InvalidRecord(format!(
                "field {} is a group, not a scalar",
                self.nodes[child].name
            )));
        };
        self.columns[column].push_value(value, rep)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::document::Document;
    use crate::write::emit_document;

    const SCHEMA: &str = "
        message root {
            required binary id (STRING);
            optional group aliases (LIST) {
                repeated binary array (STRING);
            }
            optional group addresses (LIST) {
                repeated group array {
                    required binary streetName (STRING);
                    optional int32 number;
                }
            }
        }
    ";

    fn shred(documents: &[serde_json::Value]) -> ColumnShredder {
        let schema = GroupNode::parse(SCHEMA).unwrap();
        let mut shredder = ColumnShredder::new(&schema).unwrap();
        for value in documents {
            let document = Document::try_from(value.clone()).unwrap();
            emit_document(&schema, &document, &mut shredder).unwrap();
        }
        shredder
    }

    #[test]
    fn test_levels_of_repeated_scalars() {
        let shredder = shred(&[
            json!({"id": "1", "aliases": ["a", "b"]}),
            json!({"id": "2"}),
            json!({"id": "3", "aliases": []}),
        ]);

        assert_eq!(shredder.buffered_rows(), 3);
        assert_eq!(shredder.column_count(), 4);

        let (rep, def) = shredder.column_levels(1).unwrap();
        assert_eq!(rep, &[0, 1, 0, 0]);
        assert_eq!(def, &[2, 2, 0, 1]);

        let (rep, def) = shredder.column_levels(0).unwrap();
        assert_eq!(rep, &[0, 0, 0]);
        assert_eq!(def, &[0, 0, 0]);
    }

    #[test]
    fn test_levels_of_repeated_groups() {
        let shredder = shred(&[json!({
            "id": "1",
            "addresses": [
                {"streetName": "Webfoot Walk", "number": 1313},
                {"streetName": "Duckburg Lane"},
            ],
        })]);

        let (rep, def) = shredder.column_levels(2).unwrap();
        assert_eq!(rep, &[0, 1]);
        assert_eq!(def, &[2, 2]);

        let (rep, def) = shredder.column_levels(3).unwrap();
        assert_eq!(rep, &[0, 1]);
        assert_eq!(def, &[3, 2]);
    }

    #[test]
    fn test_rollback_discards_partial_record() {
        let schema = GroupNode::parse(SCHEMA).unwrap();
        let mut shredder = shred(&[json!({"id": "1", "aliases": ["a"]})]);

        let bad = Document::try_from(json!({
            "id": "2",
            "aliases": ["b"],
            "addresses": [{"streetName": "x", "number": "not a number"}],
        }))
        .unwrap();
        assert!(matches!(
            emit_document(&schema, &bad, &mut shredder),
            Err(Error::InvalidRecord(_))
        ));
        shredder.rollback();

        assert_eq!(shredder.buffered_rows(), 1);
        for column in 0..shredder.column_count() {
            let (rep, def) = shredder.column_levels(column).unwrap();
            assert_eq!(rep.len(), 1);
            assert_eq!(def.len(), 1);
        }
    }

    #[test]
    fn test_event_validation() {
        let schema = GroupNode::parse(SCHEMA).unwrap();
        let mut shredder = ColumnShredder::new(&schema).unwrap();

        assert!(shredder.start_field("id", 0).is_err());

        shredder.start_message().unwrap();
        assert!(shredder.start_field("id", 1).is_err());
        assert!(shredder.start_field("unknown", 0).is_err());
        shredder.start_field("id", 0).unwrap();
        shredder.add_scalar("1").unwrap();
        assert!(shredder.add_scalar("2").is_err());
        shredder.end_field("id", 0).unwrap();
        assert!(shredder.start_field("id", 0).is_err());

        shredder.start_field("aliases", 1).unwrap();
        assert!(shredder.end_field("aliases", 1).is_err());
        shredder.rollback();

        shredder.start_message().unwrap();
        assert!(matches!(
            shredder.end_message(),
            Err(Error::InvalidRecord(msg)) if msg.contains("id")
        ));
    }

    #[test]
    fn test_int96_is_rejected() {
        let schema = GroupNode::parse("message root { required int96 ts; }").unwrap();
        assert!(matches!(
            ColumnShredder::new(&schema),
            Err(Error::InvalidSchema(_))
        ));
    }

    #[test]
    fn test_fixed_length_values_must_match_the_column() {
        let schema = GroupNode::parse("message root { required fixed_len_byte_array(4) code; }").unwrap();
        let mut shredder = ColumnShredder::new(&schema).unwrap();

        for code in ["abcdefgh", "ab"] {
            let document = Document::try_from(json!({ "code": code })).unwrap();
            assert!(matches!(
                emit_document(&schema, &document, &mut shredder),
                Err(Error::InvalidRecord(_))
            ));
            shredder.rollback();
        }

        let document = Document::try_from(json!({"code": "abcd"})).unwrap();
        emit_document(&schema, &document, &mut shredder).unwrap();
        assert_eq!(shredder.buffered_rows(), 1);
        assert_eq!(shredder.column_levels(0).unwrap().0.len(), 1);
    }

    #[test]
    fn test_unsigned_values_fit_signed_columns() {
        let schema = GroupNode::parse(
            "message root { required int32 small (UINT_32); required int64 large (UINT_64); }",
        )
        .unwrap();
        let mut shredder = ColumnShredder::new(&schema).unwrap();
        let document = Document::try_from(json!({
            "small": "4000000000",
            "large": "18000000000000000000",
        }))
        .unwrap();
        emit_document(&schema, &document, &mut shredder).unwrap();
        assert_eq!(shredder.buffered_rows(), 1);
    }
}
