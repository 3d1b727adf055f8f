//! Cursor over the records of consecutive row groups

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::record::DecodedRecord;
use crate::schema::GroupNode;
use crate::storage::{RecordStorage, RowGroup};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    Open,
    Exhausted,
    Closed,
}

/// Yields decoded records across row groups, fetching the next group lazily
///
/// A row group that reports zero rows ends the stream even when later row
/// groups hold data. Once the end is reached the cursor keeps returning
/// `None` and never touches the storage again.
pub struct RowGroupCursor<S: RecordStorage> {
    storage: S,
    schema: Arc<GroupNode>,
    current: RowGroup,
    remaining: usize,
    state: CursorState,
}

impl<S: RecordStorage> RowGroupCursor<S> {
    /// Reads the first row group; fails with `EmptyStorage` when there is none
    ///
    /// On failure the storage is closed before the error is returned.
    pub fn open(mut storage: S, schema: Arc<GroupNode>) -> Result<Self> {
        let first = match storage
            .read_next_row_group(&schema)
            .and_then(|first| first.ok_or(Error::EmptyStorage))
        {
            Ok(first) => first,
            Err(e) => {
                if let Err(close_error) = storage.close() {
                    warn!(error = %close_error, "Failed to close storage after open failure");
                }
                return Err(e);
            }
        };
        debug!(
            row_group = first.index(),
            rows = first.row_count(),
            "Opened row group cursor"
        );

        Ok(Self {
            storage,
            schema,
            remaining: first.row_count(),
            current: first,
            state: CursorState::Open,
        })
    }

    pub fn schema(&self) -> &Arc<GroupNode> {
        &self.schema
    }

    /// Returns the next record, or `None` once every row group is consumed
    pub fn next(&mut self) -> Result<Option<DecodedRecord>> {
        match self.state {
            CursorState::Closed => {
                return Err(Error::PreconditionFailed(
                    "record cursor is closed".to_string(),
                ))
            }
            CursorState::Exhausted => return Ok(None),
            CursorState::Open => {}
        }

        if self.remaining == 0 {
            let Some(next) = self.storage.read_next_row_group(&self.schema)? else {
                self.state = CursorState::Exhausted;
                return Ok(None);
            };
            debug!(
                row_group = next.index(),
                rows = next.row_count(),
                "Advanced to next row group"
            );
            self.remaining = next.row_count();
            self.current = next;
            if self.remaining == 0 {
                self.state = CursorState::Exhausted;
                return Ok(None);
            }
        }

        let record = self.current.next_record()?.ok_or_else(|| {
            Error::InvalidRecord(format!(
                "row group {} ended before its reported row count",
                self.current.index()
            ))
        })?;
        self.remaining -= 1;
        Ok(Some(record))
    }

    pub fn is_closed(&self) -> bool {
        self.state == CursorState::Closed
    }

    /// Closes the underlying storage; a second close fails
    pub fn close(&mut self) -> Result<()> {
        if self.state == CursorState::Closed {
            return Err(Error::PreconditionFailed(
                "record cursor already closed".to_string(),
            ));
        }
        self.state = CursorState::Closed;
        self.storage.close()
    }
}
