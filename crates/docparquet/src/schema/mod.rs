//! Nested schema model
//!
//! A schema is a closed tree of [`SchemaNode`]s: groups with ordered children
//! and leaves holding a Parquet physical type. The tree is built once from a
//! Parquet message type (parsed text or a file footer) and never mutated;
//! projections build new trees instead.
//!
//! Lists follow the "list wrapper" convention: a group whose first child is a
//! repeated field named `array`. The wrapper flag is computed when the group is
//! constructed so readers never inspect field order again.

pub mod path;

use std::fmt;
use std::sync::Arc;

use parquet::basic::{ConvertedType, LogicalType, Repetition, Type as PhysicalType};
use parquet::schema::parser::parse_message_type;
use parquet::schema::printer::print_schema;
use parquet::schema::types::{BasicTypeInfo, Type, TypePtr};

use crate::error::{Error, Result};

pub use path::{resolve_path, LIST_ELEMENT_NAME};

/// Attributes shared by groups and leaves
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInfo {
    name: String,
    repetition: Option<Repetition>,
    converted_type: ConvertedType,
    logical_type: Option<LogicalType>,
    id: Option<i32>,
}

impl NodeInfo {
    fn from_basic(info: &BasicTypeInfo) -> Self {
        Self {
            name: info.name().to_string(),
            repetition: info.has_repetition().then(|| info.repetition()),
            converted_type: info.converted_type(),
            logical_type: info.logical_type(),
            id: info.has_id().then(|| info.id()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `None` only for the message root
    pub fn repetition(&self) -> Option<Repetition> {
        self.repetition
    }

    pub fn converted_type(&self) -> ConvertedType {
        self.converted_type
    }

    pub fn logical_type(&self) -> Option<&LogicalType> {
        self.logical_type.as_ref()
    }
}

/// A node in a nested schema
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    Group(GroupNode),
    Leaf(LeafNode),
}

/// A group of ordered child fields; the message root is a group without repetition
#[derive(Debug, Clone, PartialEq)]
pub struct GroupNode {
    info: NodeInfo,
    children: Vec<SchemaNode>,
    list_wrapper: bool,
}

/// A scalar column
#[derive(Debug, Clone, PartialEq)]
pub struct LeafNode {
    info: NodeInfo,
    physical_type: PhysicalType,
    source: TypePtr,
}

/// A leaf column together with the paths that address it
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnLeaf {
    /// Field names from the root down to the leaf, wrappers included
    pub physical_path: Vec<String>,
    /// Slash-separated logical path with list wrappers elided
    pub path: String,
    pub physical_type: PhysicalType,
}

impl SchemaNode {
    /// Converts an engine type into a schema node
    pub fn from_parquet(tp: &TypePtr) -> Self {
        if tp.is_group() {
            SchemaNode::Group(GroupNode::from_type(tp))
        } else {
            SchemaNode::Leaf(LeafNode {
                info: NodeInfo::from_basic(tp.get_basic_info()),
                physical_type: tp.get_physical_type(),
                source: tp.clone(),
            })
        }
    }

    pub fn info(&self) -> &NodeInfo {
        match self {
            SchemaNode::Group(group) => &group.info,
            SchemaNode::Leaf(leaf) => &leaf.info,
        }
    }

    pub fn name(&self) -> &str {
        self.info().name()
    }

    pub fn repetition(&self) -> Option<Repetition> {
        self.info().repetition()
    }

    pub fn is_repeated(&self) -> bool {
        self.repetition() == Some(Repetition::REPEATED)
    }

    pub fn is_required(&self) -> bool {
        self.repetition() == Some(Repetition::REQUIRED)
    }

    pub fn as_group(&self) -> Option<&GroupNode> {
        match self {
            SchemaNode::Group(group) => Some(group),
            SchemaNode::Leaf(_) => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&LeafNode> {
        match self {
            SchemaNode::Group(_) => None,
            SchemaNode::Leaf(leaf) => Some(leaf),
        }
    }

    /// Converts the node back into an engine type
    pub fn to_parquet(&self) -> Result<TypePtr> {
        match self {
            SchemaNode::Group(group) => group.to_parquet(),
            SchemaNode::Leaf(leaf) => Ok(leaf.source.clone()),
        }
    }
}

impl GroupNode {
    fn new(info: NodeInfo, children: Vec<SchemaNode>) -> Self {
        let list_wrapper = children
            .first()
            .map(|first| first.name() == LIST_ELEMENT_NAME)
            .unwrap_or(false);
        Self {
            info,
            children,
            list_wrapper,
        }
    }

    fn from_type(tp: &Type) -> Self {
        let children = tp.get_fields().iter().map(SchemaNode::from_parquet).collect();
        Self::new(NodeInfo::from_basic(tp.get_basic_info()), children)
    }

    /// Parses Parquet message type text, e.g. `message root { required binary id (STRING); }`
    pub fn parse(text: &str) -> Result<Self> {
        let message = parse_message_type(text).map_err(|e| Error::InvalidSchema(e.to_string()))?;
        Self::from_message(&message)
    }

    /// Builds the schema of a whole file from its message type
    pub fn from_message(message: &Type) -> Result<Self> {
        if !message.is_group() || !message.is_schema() {
            return Err(Error::InvalidSchema(format!(
                "{} is not a message type",
                message.name()
            )));
        }
        Ok(Self::from_type(message))
    }

    /// Copies this group's attributes onto a new list of children
    pub(crate) fn with_children(&self, children: Vec<SchemaNode>) -> Self {
        Self::new(self.info.clone(), children)
    }

    pub fn info(&self) -> &NodeInfo {
        &self.info
    }

    pub fn name(&self) -> &str {
        self.info.name()
    }

    pub fn repetition(&self) -> Option<Repetition> {
        self.info.repetition()
    }

    /// True for the message root
    pub fn is_message(&self) -> bool {
        self.info.repetition.is_none()
    }

    /// True when the first declared field is the repeated `array` element
    pub fn is_list_wrapper(&self) -> bool {
        self.list_wrapper
    }

    pub fn children(&self) -> &[SchemaNode] {
        &self.children
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.children.iter().position(|child| child.name() == name)
    }

    pub fn child(&self, name: &str) -> Option<&SchemaNode> {
        self.children.iter().find(|child| child.name() == name)
    }

    /// Every leaf column in declaration (column index) order
    pub fn leaves(&self) -> Vec<ColumnLeaf> {
        let mut leaves = Vec::new();
        let mut physical_path = Vec::new();
        collect_leaves(self, "", &mut physical_path, &mut leaves);
        leaves
    }

    /// Converts the group back into an engine type
    pub fn to_parquet(&self) -> Result<TypePtr> {
        let fields = self
            .children
            .iter()
            .map(SchemaNode::to_parquet)
            .collect::<Result<Vec<_>>>()?;

        let mut builder = Type::group_type_builder(self.name())
            .with_converted_type(self.info.converted_type)
            .with_logical_type(self.info.logical_type.clone())
            .with_id(self.info.id)
            .with_fields(fields);
        if let Some(repetition) = self.info.repetition {
            builder = builder.with_repetition(repetition);
        }

        Ok(Arc::new(builder.build()?))
    }
}

impl LeafNode {
    pub fn info(&self) -> &NodeInfo {
        &self.info
    }

    pub fn name(&self) -> &str {
        self.info.name()
    }

    pub fn repetition(&self) -> Option<Repetition> {
        self.info.repetition()
    }

    pub fn physical_type(&self) -> PhysicalType {
        self.physical_type
    }

    /// Declared byte width of a FIXED_LEN_BYTE_ARRAY column, `-1` otherwise
    pub fn type_length(&self) -> i32 {
        match self.source.as_ref() {
            Type::PrimitiveType { type_length, .. } => *type_length,
            Type::GroupType { .. } => -1,
        }
    }
}

fn collect_leaves(
    group: &GroupNode,
    parent_path: &str,
    physical_path: &mut Vec<String>,
    leaves: &mut Vec<ColumnLeaf>,
) {
    for child in group.children() {
        let path = resolve_path(parent_path, child);
        physical_path.push(child.name().to_string());
        match child {
            SchemaNode::Group(inner) => collect_leaves(inner, &path, physical_path, leaves),
            SchemaNode::Leaf(leaf) => leaves.push(ColumnLeaf {
                physical_path: physical_path.clone(),
                path,
                physical_type: leaf.physical_type,
            }),
        }
        physical_path.pop();
    }
}

impl fmt::Display for GroupNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tp = self.to_parquet().map_err(|_| fmt::Error)?;
        let mut out = Vec::new();
        print_schema(&mut out, &tp);
        f.write_str(&String::from_utf8_lossy(&out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERSON: &str = "
        message root {
            required group person {
                required group name {
                    required binary firstName (STRING);
                    optional binary middleName (STRING);
                    required binary surname (STRING);
                }
                optional group address (LIST) {
                    repeated group array {
                        required binary streetName (STRING);
                        required binary zipCode (STRING);
                    }
                }
            }
            optional group aliases (LIST) {
                repeated binary array (STRING);
            }
        }
    ";

    #[test]
    fn test_parse_message() {
        let schema = GroupNode::parse(PERSON).unwrap();
        assert!(schema.is_message());
        assert_eq!(schema.name(), "root");
        assert_eq!(schema.children().len(), 2);

        let person = schema.child("person").unwrap().as_group().unwrap();
        assert_eq!(person.repetition(), Some(Repetition::REQUIRED));
        assert!(!person.is_list_wrapper());
    }

    #[test]
    fn test_list_wrapper_flag() {
        let schema = GroupNode::parse(PERSON).unwrap();
        let person = schema.child("person").unwrap().as_group().unwrap();
        let address = person.child("address").unwrap().as_group().unwrap();
        assert!(address.is_list_wrapper());

        let element = address.child("array").unwrap().as_group().unwrap();
        assert!(!element.is_list_wrapper());

        let aliases = schema.child("aliases").unwrap().as_group().unwrap();
        assert!(aliases.is_list_wrapper());
    }

    #[test]
    fn test_leaves_in_column_order() {
        let schema = GroupNode::parse(PERSON).unwrap();
        let paths: Vec<String> = schema.leaves().into_iter().map(|l| l.path).collect();
        assert_eq!(
            paths,
            vec![
                "/person/name/firstName",
                "/person/name/middleName",
                "/person/name/surname",
                "/person/address/streetName",
                "/person/address/zipCode",
                "/aliases",
            ]
        );

        let street = &schema.leaves()[3];
        assert_eq!(
            street.physical_path,
            vec!["person", "address", "array", "streetName"]
        );
        assert_eq!(street.physical_type, PhysicalType::BYTE_ARRAY);
    }

    #[test]
    fn test_round_trip_through_parquet_type() {
        let schema = GroupNode::parse(PERSON).unwrap();
        let tp = schema.to_parquet().unwrap();
        assert!(tp.is_schema());

        let again = GroupNode::from_message(&tp).unwrap();
        assert_eq!(schema, again);
    }

    #[test]
    fn test_display_reparses() {
        let schema = GroupNode::parse(PERSON).unwrap();
        let printed = schema.to_string();
        assert!(printed.starts_with("message root"));
        assert_eq!(GroupNode::parse(&printed).unwrap(), schema);
    }

    #[test]
    fn test_invalid_schema_text() {
        let result = GroupNode::parse("foo");
        assert!(matches!(result, Err(Error::InvalidSchema(_))));
    }

    #[test]
    fn test_from_message_rejects_non_root() {
        let schema = GroupNode::parse(PERSON).unwrap();
        let person = schema.child("person").unwrap().to_parquet().unwrap();
        assert!(matches!(
            GroupNode::from_message(&person),
            Err(Error::InvalidSchema(_))
        ));
    }
}
