//! # docparquet
//!
//! Reading and writing nested Parquet records as generic documents.
//!
//! This crate provides:
//! - Glob-based column projection over nested schemas with list wrappers
//! - Lazy record streams that normalize each row into a [`Document`]
//! - Per-field value rewriting through a [`FieldInterceptor`]
//! - A document writer that shreds documents back into nested columns
//!
//! ## Example
//!
//! ```no_run
//! use docparquet::RecordStream;
//!
//! let stream = RecordStream::open_path("people.parquet")
//!     .unwrap()
//!     .with_field_selectors(["/addresses/streetName"])
//!     .with_field_interceptor(|_field: &str, value: String| {
//!         value.chars().filter(char::is_ascii_digit).collect::<String>()
//!     })
//!     .build()
//!     .unwrap();
//!
//! for document in stream {
//!     println!("{}", document.unwrap().to_json_string().unwrap());
//! }
//! ```

pub mod column;
pub mod cursor;
pub mod document;
pub mod error;
pub mod glob;
pub mod interceptor;
pub mod normalize;
pub mod projection;
pub mod record;
pub mod schema;
pub mod storage;
pub mod stream;
pub mod write;

pub use column::{read_column, read_column_path};
pub use document::{Document, JsonDocuments};
pub use error::{Error, Result};
pub use interceptor::{FieldInterceptor, Identity};
pub use normalize::normalize;
pub use projection::{project, project_text, ProjectionBuilder};
pub use record::DecodedRecord;
pub use schema::GroupNode;
pub use storage::{ParquetStorage, RecordStorage};
pub use stream::{RecordStream, RecordStreamBuilder};
pub use write::{write_json, DocumentWriter};
