//! Logical column paths
//!
//! Paths are slash separated and start at the first field below the message
//! root, e.g. `/person/address/streetName`. The repeated `array` element of a
//! list wrapper never contributes a segment, so a path reflects the logical
//! structure no matter how many wrappers sit in between.

use super::SchemaNode;

/// Name of the repeated element field inside a list wrapper
pub const LIST_ELEMENT_NAME: &str = "array";

/// True for the repeated `array` element of a list wrapper
pub fn is_list_element(node: &SchemaNode) -> bool {
    node.is_repeated() && node.name() == LIST_ELEMENT_NAME
}

/// Resolves the path of `node` below a parent path
///
/// Callers start with `""` for the children of the message root.
pub fn resolve_path(parent_path: &str, node: &SchemaNode) -> String {
    if is_list_element(node) {
        parent_path.to_string()
    } else {
        child_path(parent_path, node.name())
    }
}

/// Appends one field name to a path
pub fn child_path(parent_path: &str, name: &str) -> String {
    format!("{}/{}", parent_path, name)
}
