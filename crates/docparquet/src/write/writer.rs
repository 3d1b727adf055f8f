//! Parquet file writer for documents

use std::io::{Read, Write};
use std::sync::Arc;

use config::{CompressionCodec, WriterConfig};
use parquet::basic::{BrotliLevel, Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use parquet::file::writer::SerializedFileWriter;
use tracing::{debug, info};

use super::{emit_document, ColumnShredder};
use crate::document::{Document, JsonDocuments};
use crate::error::{Error, Result};
use crate::schema::GroupNode;

/// Builds engine writer properties from configuration
pub fn writer_properties(config: &WriterConfig) -> Result<WriterProperties> {
    config
        .validate()
        .map_err(|e| Error::Config(format!("{:#}", e)))?;
    let codec = config
        .compression_codec()
        .map_err(|e| Error::Config(format!("{:#}", e)))?;

    let compression = match codec {
        CompressionCodec::Uncompressed => Compression::UNCOMPRESSED,
        CompressionCodec::Snappy => Compression::SNAPPY,
        CompressionCodec::Gzip => Compression::GZIP(GzipLevel::default()),
        CompressionCodec::Lz4 => Compression::LZ4_RAW,
        CompressionCodec::Zstd => Compression::ZSTD(ZstdLevel::default()),
        CompressionCodec::Brotli => Compression::BROTLI(BrotliLevel::default()),
    };

    let mut builder = WriterProperties::builder()
        .set_compression(compression)
        .set_dictionary_enabled(config.enable_dictionary)
        .set_data_page_size_limit(config.data_page_size_limit)
        .set_max_row_group_size(config.max_row_group_rows);
    if let Some(created_by) = &config.created_by {
        builder = builder.set_created_by(created_by.clone());
    }
    Ok(builder.build())
}

/// Writes documents into a Parquet file with a nested schema
///
/// Rows are buffered and written as a row group every `max_row_group_rows`
/// documents; [`DocumentWriter::close`] flushes the rest and writes the footer.
pub struct DocumentWriter<W: Write + Send> {
    schema: Arc<GroupNode>,
    shredder: ColumnShredder,
    writer: SerializedFileWriter<W>,
    max_row_group_rows: usize,
    rows_written: u64,
}

impl<W: Write + Send> DocumentWriter<W> {
    pub fn new(sink: W, schema: GroupNode, config: &WriterConfig) -> Result<Self> {
        let properties = writer_properties(config)?;
        let shredder = ColumnShredder::new(&schema)?;
        let writer = SerializedFileWriter::new(sink, schema.to_parquet()?, Arc::new(properties))?;

        debug!(
            columns = shredder.column_count(),
            compression = %config.compression,
            "Created document writer"
        );

        Ok(Self {
            schema: Arc::new(schema),
            shredder,
            writer,
            max_row_group_rows: config.max_row_group_rows,
            rows_written: 0,
        })
    }

    /// Creates a writer with default settings
    pub fn with_defaults(sink: W, schema: GroupNode) -> Result<Self> {
        Self::new(sink, schema, &WriterConfig::default())
    }

    pub fn schema(&self) -> &Arc<GroupNode> {
        &self.schema
    }

    /// Rows handed to the engine so far
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Buffers one document; a rejected document leaves no trace in the file
    pub fn write(&mut self, document: &Document) -> Result<()> {
        if let Err(e) = emit_document(&self.schema, document, &mut self.shredder) {
            self.shredder.rollback();
            return Err(e);
        }
        if self.shredder.buffered_rows() >= self.max_row_group_rows {
            self.flush()?;
        }
        Ok(())
    }

    /// Writes every document, stopping at the first failure
    pub fn write_all<I>(&mut self, documents: I) -> Result<u64>
    where
        I: IntoIterator<Item = Result<Document>>,
    {
        let mut count = 0;
        for document in documents {
            self.write(&document?)?;
            count += 1;
        }
        Ok(count)
    }

    /// Writes buffered rows as a row group
    pub fn flush(&mut self) -> Result<()> {
        let rows = self.shredder.flush(&mut self.writer)?;
        if rows > 0 {
            self.rows_written += rows as u64;
            debug!(rows, total = self.rows_written, "Flushed row group");
        }
        Ok(())
    }

    /// Flushes, writes the footer and hands back the sink
    pub fn close(mut self) -> Result<W> {
        self.flush()?;
        info!(rows = self.rows_written, "Closing document writer");
        Ok(self.writer.into_inner()?)
    }
}

/// Writes every JSON document read from `input`; returns the number written
pub fn write_json<R: Read, W: Write + Send>(input: R, writer: &mut DocumentWriter<W>) -> Result<u64> {
    writer.write_all(JsonDocuments::new(input))
}
