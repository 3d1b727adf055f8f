//! Projection builder for column selectors
//!
//! This module provides a builder API for collecting field selectors and
//! turning them into the schema a reader decodes with.

use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::projection::project;
use crate::schema::GroupNode;

/// How a schema is narrowed before decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionMode {
    /// Read all columns (no projection)
    All,

    /// Read only the columns matched by the selectors
    Selected,
}

/// Builder for creating column projections
///
/// Provides a fluent API for selecting which columns to read from a file.
#[derive(Debug, Clone, Default)]
pub struct ProjectionBuilder {
    /// Glob patterns selecting leaf columns
    selectors: BTreeSet<String>,
}

impl ProjectionBuilder {
    /// Creates a new projection builder with no selectors (reads everything)
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a selector to the projection
    pub fn add_selector(mut self, pattern: impl Into<String>) -> Self {
        self.selectors.insert(pattern.into());
        self
    }

    /// Adds multiple selectors to the projection
    pub fn add_selectors(mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        for pattern in patterns {
            self.selectors.insert(pattern.into());
        }
        self
    }

    /// Returns the projection mode
    pub fn mode(&self) -> ProjectionMode {
        if self.selectors.is_empty() {
            ProjectionMode::All
        } else {
            ProjectionMode::Selected
        }
    }

    /// Returns the selectors
    pub fn selectors(&self) -> &BTreeSet<String> {
        &self.selectors
    }

    /// Builds the schema to decode with
    ///
    /// Without selectors the full schema is returned untouched; the projector
    /// is never asked to handle an empty pattern set. With selectors, a
    /// projection that keeps nothing fails with `NoMatchingColumns`.
    pub fn build(&self, schema: &GroupNode) -> Result<GroupNode> {
        if self.mode() == ProjectionMode::All {
            return Ok(schema.clone());
        }

        project(schema, &self.selectors)?.ok_or_else(|| {
            Error::NoMatchingColumns(
                self.selectors
                    .iter()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
            )
        })
    }
}
