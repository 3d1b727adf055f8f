//! Record storage backed by Parquet files

use std::fmt;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use parquet::errors::Result as ParquetResult;
use parquet::file::metadata::RowGroupMetaData;
use parquet::file::reader::{ChunkReader, FileReader, Length};
use parquet::file::serialized_reader::{ReadOptionsBuilder, SerializedFileReader};
use parquet::record::reader::RowIter;
use tracing::debug;

use crate::error::{Error, Result};
use crate::record::DecodedRecord;
use crate::schema::GroupNode;

type Records = Box<dyn Iterator<Item = Result<DecodedRecord>> + Send>;

/// One row group whose records are decoded as they are taken
pub struct RowGroup {
    index: usize,
    row_count: usize,
    records: Records,
}

impl RowGroup {
    /// Wraps a lazy record source reporting `row_count` rows up front
    pub fn new<I>(index: usize, row_count: usize, records: I) -> Self
    where
        I: Iterator<Item = Result<DecodedRecord>> + Send + 'static,
    {
        Self {
            index,
            row_count,
            records: Box::new(records),
        }
    }

    /// A row group over records that are already decoded
    pub fn from_records(index: usize, records: Vec<DecodedRecord>) -> Self {
        Self::new(index, records.len(), records.into_iter().map(Ok))
    }

    /// Position of the row group in its file
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of rows the row group reported when it was read
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Decodes the next record, in file order
    pub fn next_record(&mut self) -> Result<Option<DecodedRecord>> {
        self.records.next().transpose()
    }
}

impl fmt::Debug for RowGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowGroup")
            .field("index", &self.index)
            .field("row_count", &self.row_count)
            .finish_non_exhaustive()
    }
}

/// Source of decoded row groups
pub trait RecordStorage {
    /// Reads the schema of the whole file
    fn read_file_schema(&mut self) -> Result<GroupNode>;

    /// Opens the next row group for decoding against `schema`, or returns `None` past the last one
    fn read_next_row_group(&mut self, schema: &Arc<GroupNode>) -> Result<Option<RowGroup>>;

    /// Releases the underlying resource
    fn close(&mut self) -> Result<()>;
}

impl<S: RecordStorage + ?Sized> RecordStorage for Box<S> {
    fn read_file_schema(&mut self) -> Result<GroupNode> {
        (**self).read_file_schema()
    }

    fn read_next_row_group(&mut self, schema: &Arc<GroupNode>) -> Result<Option<RowGroup>> {
        (**self).read_next_row_group(schema)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// Input shared between the file reader and the per row group readers
struct SharedInput<R>(Arc<R>);

impl<R> Clone for SharedInput<R> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<R: ChunkReader> Length for SharedInput<R> {
    fn len(&self) -> u64 {
        self.0.len()
    }
}

impl<R: ChunkReader> ChunkReader for SharedInput<R> {
    type T = R::T;

    fn get_read(&self, start: u64) -> ParquetResult<Self::T> {
        self.0.get_read(start)
    }

    fn get_bytes(&self, start: u64, length: usize) -> ParquetResult<Bytes> {
        self.0.get_bytes(start, length)
    }
}

/// Storage reading a Parquet file through the engine's row API
pub struct ParquetStorage<R: ChunkReader> {
    input: SharedInput<R>,
    reader: Option<SerializedFileReader<SharedInput<R>>>,
    next_row_group: usize,
}

impl ParquetStorage<File> {
    /// Opens a Parquet file on disk
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::open(file)
    }
}

impl<R: ChunkReader + 'static> ParquetStorage<R> {
    /// Opens Parquet data from any chunk reader (a file, in-memory bytes)
    pub fn open(input: R) -> Result<Self> {
        let input = SharedInput(Arc::new(input));
        let reader = SerializedFileReader::new(input.clone())?;
        debug!(
            row_groups = reader.num_row_groups(),
            "Opened Parquet storage"
        );
        Ok(Self {
            input,
            reader: Some(reader),
            next_row_group: 0,
        })
    }

    pub fn num_row_groups(&self) -> Result<usize> {
        Ok(self.reader()?.num_row_groups())
    }

    pub fn num_rows(&self) -> Result<i64> {
        Ok(self.reader()?.metadata().file_metadata().num_rows())
    }

    fn reader(&self) -> Result<&SerializedFileReader<SharedInput<R>>> {
        self.reader
            .as_ref()
            .ok_or_else(|| Error::PreconditionFailed("storage is closed".to_string()))
    }
}

impl<R: ChunkReader + 'static> RecordStorage for ParquetStorage<R> {
    fn read_file_schema(&mut self) -> Result<GroupNode> {
        GroupNode::from_message(self.reader()?.metadata().file_metadata().schema())
    }

    fn read_next_row_group(&mut self, schema: &Arc<GroupNode>) -> Result<Option<RowGroup>> {
        let index = self.next_row_group;
        let reader = self.reader()?;
        if index >= reader.num_row_groups() {
            return Ok(None);
        }
        let row_count = usize::try_from(reader.metadata().row_group(index).num_rows()).unwrap_or(0);

        // A reader restricted to this row group owns its rows independently of `self`
        let options = ReadOptionsBuilder::new()
            .with_predicate(Box::new(move |_: &RowGroupMetaData, i: usize| i == index))
            .build();
        let group_reader = SerializedFileReader::new_with_options(self.input.clone(), options)?;
        let projection = schema.to_parquet()?;
        let rows = RowIter::from_file_into(Box::new(group_reader))
            .project(Some(projection.as_ref().clone()))?;

        let schema = Arc::clone(schema);
        let records = rows.map(move |row| {
            let row = row?;
            DecodedRecord::from_row(Arc::clone(&schema), &row)
        });
        self.next_row_group += 1;

        debug!(row_group = index, rows = row_count, "Opened row group");
        Ok(Some(RowGroup::new(index, row_count, records)))
    }

    fn close(&mut self) -> Result<()> {
        match self.reader.take() {
            Some(_) => Ok(()),
            None => Err(Error::PreconditionFailed(
                "storage already closed".to_string(),
            )),
        }
    }
}
