//! Reading all values of a single column

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::projection::project;
use crate::record::{Group, Value};
use crate::schema::GroupNode;
use crate::storage::{ParquetStorage, RecordStorage};

/// Reads every value of the one column matched by `pattern`, across all row groups
///
/// Values come back in file order, repeated occurrences flattened. Fails with
/// `NoMatchingColumns` when nothing matches and `AmbiguousColumn` when more
/// than one leaf does. The storage is closed either way; a close failure is
/// only reported when the read itself succeeded.
pub fn read_column<S: RecordStorage>(mut storage: S, pattern: &str) -> Result<Vec<String>> {
    let result = collect_column(&mut storage, pattern);
    let closed = storage.close();
    let values = result?;
    closed?;
    Ok(values)
}

/// [`read_column`] over a Parquet file on disk
pub fn read_column_path<P: AsRef<Path>>(path: P, pattern: &str) -> Result<Vec<String>> {
    read_column(ParquetStorage::<File>::open_path(path)?, pattern)
}

fn collect_column<S: RecordStorage>(storage: &mut S, pattern: &str) -> Result<Vec<String>> {
    let schema = storage.read_file_schema()?;
    let projected = project(&schema, [pattern])?
        .ok_or_else(|| Error::NoMatchingColumns(pattern.to_string()))?;

    let leaves = projected.leaves();
    let leaf = match leaves.as_slice() {
        [leaf] => leaf.clone(),
        _ => {
            return Err(Error::AmbiguousColumn {
                pattern: pattern.to_string(),
                matches: leaves.len(),
            })
        }
    };

    let projected = Arc::new(projected);
    let mut values = Vec::new();
    let mut row_groups = 0;
    while let Some(mut row_group) = storage.read_next_row_group(&projected)? {
        while let Some(record) = row_group.next_record()? {
            collect_values(&projected, record.root(), &leaf.physical_path, &mut values)?;
        }
        row_groups += 1;
    }

    debug!(
        column = %leaf.path,
        row_groups,
        values = values.len(),
        "Read column"
    );
    Ok(values)
}

fn collect_values(
    schema: &GroupNode,
    group: &Group,
    path: &[String],
    out: &mut Vec<String>,
) -> Result<()> {
    let Some((name, rest)) = path.split_first() else {
        return Ok(());
    };
    let index = schema
        .field_index(name)
        .ok_or_else(|| Error::InvalidRecord(format!("column field {} is missing", name)))?;

    for value in group.values(index) {
        match value {
            Value::Scalar(scalar) if rest.is_empty() => out.push(scalar.clone()),
            Value::Group(inner) => {
                let inner_schema = schema.children()[index].as_group().ok_or_else(|| {
                    Error::InvalidRecord(format!("field {} is not a group", name))
                })?;
                collect_values(inner_schema, inner, rest, out)?;
            }
            Value::Scalar(_) => {
                return Err(Error::InvalidRecord(format!(
                    "field {} holds a scalar above the column",
                    name
                )))
            }
        }
    }
    Ok(())
}
