//! Column projection for nested schemas
//!
//! A projection keeps only the leaf columns whose logical path matches at least
//! one glob pattern, plus the ancestor groups needed to reach them. Passing the
//! projected schema to the reader lets the engine skip every other column.
//!
//! Given:
//!
//! ```text
//! message root {
//!     required group person {
//!         required group name {
//!             required binary firstName (STRING);
//!             optional binary middleName (STRING);
//!             required binary surname (STRING);
//!         }
//!         optional group address (LIST) {
//!             repeated group array {
//!                 required binary streetName (STRING);
//!                 required binary zipCode (STRING);
//!             }
//!         }
//!     }
//! }
//! ```
//!
//! the patterns `**/firstName` and `/person/address/streetName` keep
//! `person.name.firstName` and `person.address.array.streetName` only.
//!
//! An empty pattern set matches nothing. Callers that want "no projection"
//! must skip the projector themselves; [`ProjectionBuilder`] does exactly that.

pub mod builder;

pub use builder::{ProjectionBuilder, ProjectionMode};

use tracing::debug;

use crate::error::Result;
use crate::glob::{compile_all, GlobMatcher};
use crate::schema::{resolve_path, GroupNode, SchemaNode};

/// Projects `schema` onto the leaves matched by `patterns`
///
/// Returns `Ok(None)` when no leaf matches, which is always the case for an
/// empty pattern set. Fails with `InvalidPattern` on a malformed glob.
pub fn project<I, S>(schema: &GroupNode, patterns: I) -> Result<Option<GroupNode>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let matchers = compile_all(patterns)?;
    let projected = project_group(schema, &matchers, "");

    debug!(
        patterns = matchers.len(),
        kept_leaves = projected.as_ref().map(|p| p.leaves().len()).unwrap_or(0),
        "Projected schema {}",
        schema.name()
    );

    Ok(projected)
}

/// Parses schema text and projects it; fails with `InvalidSchema` on bad text
pub fn project_text<I, S>(schema: &str, patterns: I) -> Result<Option<GroupNode>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let schema = GroupNode::parse(schema)?;
    project(&schema, patterns)
}

fn project_group(group: &GroupNode, matchers: &[GlobMatcher], path: &str) -> Option<GroupNode> {
    let children: Vec<SchemaNode> = group
        .children()
        .iter()
        .filter_map(|child| {
            let child_path = resolve_path(path, child);
            match child {
                SchemaNode::Group(inner) => {
                    project_group(inner, matchers, &child_path).map(SchemaNode::Group)
                }
                SchemaNode::Leaf(_) => matchers
                    .iter()
                    .any(|m| m.is_match(&child_path))
                    .then(|| child.clone()),
            }
        })
        .collect();

    if children.is_empty() {
        None
    } else {
        Some(group.with_children(children))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    const PERSON: &str = "
        message root {
            required group person {
                required group name {
                    required binary firstname (STRING);
                    optional binary middlename (STRING);
                    required binary surname (STRING);
                }
                optional group address (LIST) {
                    repeated group array {
                        required group windows (LIST) {
                            repeated binary array (STRING);
                        }
                        required group building {
                            required binary number (STRING);
                            required binary floors (STRING);
                        }
                    }
                }
                required binary gender (STRING);
            }
            required group meta {
                required binary id (STRING);
            }
        }
    ";

    fn parse(text: &str) -> GroupNode {
        GroupNode::parse(text).unwrap()
    }

    #[test]
    fn test_projection_keeps_matching_leaves_and_ancestors() {
        let projected = project_text(PERSON, ["**/firstname", "/person/gender"])
            .unwrap()
            .unwrap();

        let want = parse(
            "
            message root {
                required group person {
                    required group name {
                        required binary firstname (STRING);
                    }
                    required binary gender (STRING);
                }
            }
            ",
        );
        assert_eq!(projected, want);
    }

    #[test]
    fn test_projection_through_list_wrappers() {
        let projected = project_text(PERSON, ["/person/address/windows", "**/floors"])
            .unwrap()
            .unwrap();

        let want = parse(
            "
            message root {
                required group person {
                    optional group address (LIST) {
                        repeated group array {
                            required group windows (LIST) {
                                repeated binary array (STRING);
                            }
                            required group building {
                                required binary floors (STRING);
                            }
                        }
                    }
                }
            }
            ",
        );
        assert_eq!(projected, want);
        let address = projected
            .child("person")
            .and_then(SchemaNode::as_group)
            .and_then(|p| p.child("address"))
            .and_then(SchemaNode::as_group)
            .unwrap();
        assert!(address.is_list_wrapper());
    }

    #[test]
    fn test_empty_pattern_set_matches_nothing() {
        let patterns: Vec<String> = Vec::new();
        assert!(project_text(PERSON, patterns).unwrap().is_none());
    }

    #[test]
    fn test_no_pattern_matches() {
        assert!(project_text(PERSON, ["/person/name/lastname"])
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_match_everything() {
        let schema = parse(PERSON);
        let projected = project(&schema, ["**"]).unwrap().unwrap();
        assert_eq!(projected, schema);
    }

    #[test]
    fn test_invalid_schema_text() {
        assert!(matches!(
            project_text("foo", [""]),
            Err(Error::InvalidSchema(_))
        ));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(
            project_text(PERSON, ["/person/{name"]),
            Err(Error::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_projected_leaves_match_and_matching_leaves_survive() {
        let schema = parse(PERSON);
        let patterns = ["/person/*/number", "/meta/**", "/person/name/?irstname"];
        let matchers = compile_all(patterns).unwrap();
        let projected = project(&schema, patterns).unwrap().unwrap();

        let kept: Vec<String> = projected.leaves().into_iter().map(|l| l.path).collect();
        for path in &kept {
            assert!(matchers.iter().any(|m| m.is_match(path)), "{} should match", path);
        }
        for leaf in schema.leaves() {
            if matchers.iter().any(|m| m.is_match(&leaf.path)) {
                assert!(kept.contains(&leaf.path), "{} should survive", leaf.path);
            }
        }
        assert_eq!(kept, vec!["/person/name/firstname", "/meta/id"]);
    }
}
