//! Decoded records
//!
//! A [`Group`] is an in-memory instance of a [`GroupNode`]: for every declared
//! field, in declaration order, it holds the ordered list of that field's
//! occurrences. Absent optional fields have zero occurrences, repeated fields
//! any number. Records are produced by the storage layer one per row and
//! consumed once by the normalizer.
//!
//! The engine's row API flattens list and map wrappers into plain lists and
//! entry maps. [`DecodedRecord::from_row`] puts the wrapper levels back so the
//! record mirrors the physical schema exactly.

use std::sync::Arc;

use parquet::basic::{ConvertedType, LogicalType};
use parquet::data_type::Decimal;
use parquet::record::{Field, Map, Row};

use crate::error::{Error, Result};
use crate::schema::{GroupNode, SchemaNode};

/// One occurrence of a field
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(String),
    Group(Group),
}

/// Field occurrences of one group instance, indexed like the schema's children
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Group {
    fields: Vec<Vec<Value>>,
}

/// A decoded row together with the schema it was decoded against
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRecord {
    schema: Arc<GroupNode>,
    root: Group,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Scalar(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Scalar(value)
    }
}

impl From<Group> for Value {
    fn from(group: Group) -> Self {
        Value::Group(group)
    }
}

impl Group {
    /// Creates an instance of `schema` with no occurrences
    pub fn new(schema: &GroupNode) -> Self {
        Self {
            fields: vec![Vec::new(); schema.children().len()],
        }
    }

    /// Number of declared fields this instance holds slots for
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Number of occurrences of the field at `index`
    pub fn repetition_count(&self, index: usize) -> usize {
        self.fields.get(index).map(Vec::len).unwrap_or(0)
    }

    /// Occurrences of the field at `index`
    pub fn values(&self, index: usize) -> &[Value] {
        self.fields.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The `i`-th occurrence of the field at `index`
    pub fn value(&self, index: usize, i: usize) -> Option<&Value> {
        self.fields.get(index).and_then(|values| values.get(i))
    }

    /// Appends an occurrence of the field `name`, checking it against `schema`
    pub fn add(&mut self, schema: &GroupNode, name: &str, value: impl Into<Value>) -> Result<()> {
        let index = schema.field_index(name).ok_or_else(|| {
            Error::InvalidRecord(format!(
                "field {} is not declared in group {}",
                name,
                schema.name()
            ))
        })?;
        let node = &schema.children()[index];
        let value = value.into();

        match (node, &value) {
            (SchemaNode::Leaf(_), Value::Scalar(_)) | (SchemaNode::Group(_), Value::Group(_)) => {}
            _ => {
                return Err(Error::InvalidRecord(format!(
                    "field {} cannot hold a {}",
                    name,
                    kind_name(&value)
                )))
            }
        }

        let slot = self
            .fields
            .get_mut(index)
            .ok_or_else(|| Error::PreconditionFailed(format!(
                "group was not created from schema {}",
                schema.name()
            )))?;
        if !node.is_repeated() && !slot.is_empty() {
            return Err(Error::InvalidRecord(format!(
                "field {} is not repeated but got a second value",
                name
            )));
        }
        slot.push(value);
        Ok(())
    }

    /// Builder-style variant of [`Group::add`]
    pub fn with(mut self, schema: &GroupNode, name: &str, value: impl Into<Value>) -> Result<Self> {
        self.add(schema, name, value)?;
        Ok(self)
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Scalar(_) => "scalar",
        Value::Group(_) => "group",
    }
}

impl DecodedRecord {
    pub fn new(schema: Arc<GroupNode>, root: Group) -> Self {
        Self { schema, root }
    }

    /// Converts an engine row decoded against `schema`
    pub fn from_row(schema: Arc<GroupNode>, row: &Row) -> Result<Self> {
        let root = group_from_row(&schema, row)?;
        Ok(Self { schema, root })
    }

    pub fn schema(&self) -> &GroupNode {
        &self.schema
    }

    pub fn root(&self) -> &Group {
        &self.root
    }

    pub fn into_root(self) -> Group {
        self.root
    }
}

fn group_from_row(schema: &GroupNode, row: &Row) -> Result<Group> {
    let mut group = Group::new(schema);
    for (name, field) in row.get_column_iter() {
        let index = schema.field_index(name).ok_or_else(|| {
            Error::InvalidRecord(format!(
                "row field {} is not declared in group {}",
                name,
                schema.name()
            ))
        })?;
        group.fields[index] = occurrences(&schema.children()[index], field)?;
    }
    Ok(group)
}

/// Occurrences of one schema field as decoded by the row API
fn occurrences(node: &SchemaNode, field: &Field) -> Result<Vec<Value>> {
    match field {
        Field::Null => Ok(Vec::new()),
        // Repeated fields outside list/map annotations come back as plain lists
        Field::ListInternal(list) if node.is_repeated() => list
            .elements()
            .iter()
            .filter(|element| !matches!(element, Field::Null))
            .map(|element| occurrence(node, element))
            .collect(),
        _ => Ok(vec![occurrence(node, field)?]),
    }
}

fn occurrence(node: &SchemaNode, field: &Field) -> Result<Value> {
    match node {
        SchemaNode::Leaf(_) => Ok(Value::Scalar(scalar_text(node, field)?)),
        SchemaNode::Group(group) => match field {
            Field::Group(row) => Ok(Value::Group(group_from_row(group, row)?)),
            Field::ListInternal(list) if is_list_annotated(group) => {
                Ok(Value::Group(list_wrapper(group, list.elements())?))
            }
            Field::MapInternal(map) if is_map_annotated(group) => {
                Ok(Value::Group(map_wrapper(group, map)?))
            }
            _ => Err(shape_mismatch(node, field)),
        },
    }
}

/// Rebuilds a list wrapper group from the flattened list elements
///
/// For two-level lists the engine may hand back the repeated field itself as
/// one nested list of its occurrences, so every element is expanded through
/// [`occurrences`] of the repeated node.
fn list_wrapper(wrapper: &GroupNode, elements: &[Field]) -> Result<Group> {
    let repeated = single_child(wrapper)?;
    let mut group = Group::new(wrapper);

    group.fields[0] = if is_element_type(repeated) {
        let mut values = Vec::with_capacity(elements.len());
        for element in elements {
            values.extend(occurrences(repeated, element)?);
        }
        values
    } else {
        // Three-level list: every element sits inside one instance of the repeated group
        let repeated_group = repeated
            .as_group()
            .ok_or_else(|| Error::InvalidRecord(format!("list {} has no element group", wrapper.name())))?;
        let element_node = single_child(repeated_group)?;
        elements
            .iter()
            .map(|element| {
                let mut instance = Group::new(repeated_group);
                instance.fields[0] = occurrences(element_node, element)?;
                Ok(Value::Group(instance))
            })
            .collect::<Result<Vec<_>>>()?
    };

    Ok(group)
}

/// Rebuilds a map wrapper group (`repeated group key_value { key; value; }`)
fn map_wrapper(wrapper: &GroupNode, map: &Map) -> Result<Group> {
    let key_value = single_child(wrapper)?
        .as_group()
        .filter(|kv| kv.children().len() == 2)
        .ok_or_else(|| {
            Error::InvalidRecord(format!("map {} has no key/value group", wrapper.name()))
        })?;

    let mut group = Group::new(wrapper);
    for (key, value) in map.entries() {
        let mut entry = Group::new(key_value);
        entry.fields[0] = occurrences(&key_value.children()[0], key)?;
        entry.fields[1] = occurrences(&key_value.children()[1], value)?;
        group.fields[0].push(Value::Group(entry));
    }
    Ok(group)
}

fn single_child(group: &GroupNode) -> Result<&SchemaNode> {
    match group.children() {
        [child] => Ok(child),
        _ => Err(Error::InvalidRecord(format!(
            "wrapper group {} must have exactly one field",
            group.name()
        ))),
    }
}

fn is_list_annotated(group: &GroupNode) -> bool {
    group.info().converted_type() == ConvertedType::LIST
        || matches!(group.info().logical_type(), Some(LogicalType::List))
}

fn is_map_annotated(group: &GroupNode) -> bool {
    matches!(
        group.info().converted_type(),
        ConvertedType::MAP | ConvertedType::MAP_KEY_VALUE
    ) || matches!(group.info().logical_type(), Some(LogicalType::Map))
}

/// Whether the row API treats the repeated field of a list as the element itself
fn is_element_type(repeated: &SchemaNode) -> bool {
    match repeated {
        SchemaNode::Leaf(_) => true,
        SchemaNode::Group(group) => {
            // A nested legacy list: the repeated group is a list of its own
            let nested_list = is_list_annotated(group)
                || matches!(group.children(), [child] if child.is_repeated());
            !nested_list
                && (group.children().len() > 1
                    || group.name() == "array"
                    || group.name().ends_with("_tuple"))
        }
    }
}

/// Textual form of a scalar as its stored physical value
///
/// Logical annotations (dates, timestamps, decimals) are not applied, so the
/// text parses back into the same physical value. Binary values are read as
/// UTF-8.
fn scalar_text(node: &SchemaNode, field: &Field) -> Result<String> {
    Ok(match field {
        Field::Str(value) => value.clone(),
        Field::Bytes(bytes) => String::from_utf8_lossy(bytes.data()).into_owned(),
        Field::Bool(value) => value.to_string(),
        Field::Byte(value) => value.to_string(),
        Field::Short(value) => value.to_string(),
        Field::Int(value) | Field::Date(value) | Field::TimeMillis(value) => value.to_string(),
        Field::Long(value)
        | Field::TimeMicros(value)
        | Field::TimestampMillis(value)
        | Field::TimestampMicros(value) => value.to_string(),
        Field::UByte(value) => value.to_string(),
        Field::UShort(value) => value.to_string(),
        Field::UInt(value) => value.to_string(),
        Field::ULong(value) => value.to_string(),
        Field::Float(value) => value.to_string(),
        Field::Double(value) => value.to_string(),
        Field::Decimal(decimal) => decimal_text(decimal),
        Field::Float16(value) => value.to_string(),
        Field::Null | Field::Group(_) | Field::ListInternal(_) | Field::MapInternal(_) => {
            return Err(shape_mismatch(node, field))
        }
    })
}

/// Unscaled integer for INT32/INT64 decimals, raw bytes otherwise
fn decimal_text(decimal: &Decimal) -> String {
    match decimal {
        Decimal::Int32 { value, .. } => i32::from_be_bytes(*value).to_string(),
        Decimal::Int64 { value, .. } => i64::from_be_bytes(*value).to_string(),
        Decimal::Bytes { value, .. } => String::from_utf8_lossy(value.data()).into_owned(),
    }
}

fn shape_mismatch(node: &SchemaNode, field: &Field) -> Error {
    Error::InvalidRecord(format!(
        "decoded value {} does not fit field {}",
        field,
        node.name()
    ))
}
