//! Streaming documents out of record storage
//!
//! ```no_run
//! use docparquet::stream::RecordStream;
//!
//! # fn main() -> docparquet::Result<()> {
//! let mut stream = RecordStream::open_path("people.parquet")?
//!     .with_field_selectors(["/addresses/streetName"])
//!     .with_field_interceptor(|_field: &str, value: String| value.trim().to_string())
//!     .build()?;
//!
//! while let Some(document) = stream.read()? {
//!     println!("{}", document.to_json_string()?);
//! }
//! stream.close()?;
//! # Ok(())
//! # }
//! ```

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use config::ReaderConfig;
use tracing::{info, warn};

use crate::cursor::RowGroupCursor;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::interceptor::{FieldInterceptor, Identity};
use crate::normalize::normalize;
use crate::projection::ProjectionBuilder;
use crate::schema::GroupNode;
use crate::storage::{ParquetStorage, RecordStorage};

/// Configures and opens a [`RecordStream`]
pub struct RecordStreamBuilder<S: RecordStorage> {
    storage: S,
    projection: ProjectionBuilder,
    interceptor: Box<dyn FieldInterceptor + Send>,
}

/// Lazily reads, projects and normalizes records one at a time
pub struct RecordStream<S: RecordStorage> {
    cursor: RowGroupCursor<S>,
    interceptor: Box<dyn FieldInterceptor + Send>,
}

impl RecordStream<ParquetStorage<File>> {
    /// Starts building a stream over a Parquet file on disk
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<RecordStreamBuilder<ParquetStorage<File>>> {
        Ok(Self::builder(ParquetStorage::open_path(path)?))
    }
}

impl<S: RecordStorage> RecordStream<S> {
    pub fn builder(storage: S) -> RecordStreamBuilder<S> {
        RecordStreamBuilder {
            storage,
            projection: ProjectionBuilder::new(),
            interceptor: Box::new(Identity),
        }
    }

    /// Schema records are decoded against, after projection
    pub fn schema(&self) -> &Arc<GroupNode> {
        self.cursor.schema()
    }

    /// Returns the next document, or `None` once the storage is exhausted
    pub fn read(&mut self) -> Result<Option<Document>> {
        match self.cursor.next()? {
            Some(record) => normalize(&record, self.interceptor.as_ref()).map(Some),
            None => Ok(None),
        }
    }

    /// Releases the storage; storage failures are wrapped in [`Error::Close`]
    pub fn close(&mut self) -> Result<()> {
        if self.cursor.is_closed() {
            return Err(Error::PreconditionFailed(
                "record stream already closed".to_string(),
            ));
        }
        self.cursor.close().map_err(|e| Error::Close(Box::new(e)))
    }
}

impl<S: RecordStorage> Iterator for RecordStream<S> {
    type Item = Result<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read().transpose()
    }
}

impl<S: RecordStorage> RecordStreamBuilder<S> {
    /// Replaces the column selectors; an empty set reads every column
    pub fn with_field_selectors<I>(mut self, selectors: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.projection = ProjectionBuilder::new().add_selectors(selectors);
        self
    }

    pub fn with_field_interceptor<F>(mut self, interceptor: F) -> Self
    where
        F: FieldInterceptor + Send + 'static,
    {
        self.interceptor = Box::new(interceptor);
        self
    }

    /// Applies reader settings from configuration after validating them
    pub fn with_config(self, config: &ReaderConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| Error::Config(format!("{:#}", e)))?;
        Ok(self.with_field_selectors(config.field_selectors.iter().cloned()))
    }

    /// Reads the file schema, projects it and positions on the first row group
    ///
    /// The storage is closed when the stream cannot be opened; a close failure
    /// is logged and the original error returned.
    pub fn build(mut self) -> Result<RecordStream<S>> {
        let schema = match self.projected_schema() {
            Ok(schema) => schema,
            Err(e) => {
                if let Err(close_error) = self.storage.close() {
                    warn!(error = %close_error, "Failed to close storage after open failure");
                }
                return Err(e);
            }
        };

        info!(
            mode = ?self.projection.mode(),
            selectors = self.projection.selectors().len(),
            columns = schema.leaves().len(),
            "Opening record stream"
        );

        let cursor = RowGroupCursor::open(self.storage, schema)?;
        Ok(RecordStream {
            cursor,
            interceptor: self.interceptor,
        })
    }

    fn projected_schema(&mut self) -> Result<Arc<GroupNode>> {
        let file_schema = self.storage.read_file_schema()?;
        Ok(Arc::new(self.projection.build(&file_schema)?))
    }
}
