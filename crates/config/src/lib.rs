use anyhow::{Context, Result};
use config_rs::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Environment variable prefix, e.g. `DOCPARQUET_WRITER__COMPRESSION=zstd`
pub const ENV_PREFIX: &str = "DOCPARQUET";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Settings applied when streaming records out of a file
    #[serde(default)]
    pub reader: ReaderConfig,

    /// Settings applied when writing documents into a file
    #[serde(default)]
    pub writer: WriterConfig,
}

/// Configuration for record streams
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ReaderConfig {
    /// Glob patterns selecting the columns to read (empty = read every column)
    #[serde(default)]
    pub field_selectors: Vec<String>,
}

/// Configuration for the document writer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WriterConfig {
    /// Compression codec name (uncompressed, snappy, gzip, lz4, zstd, brotli)
    #[serde(default = "default_compression")]
    pub compression: String,

    /// Dictionary-encode columns (default: true)
    #[serde(default = "default_enable_dictionary")]
    pub enable_dictionary: bool,

    /// Number of records buffered before a row group is flushed
    #[serde(default = "default_max_row_group_rows")]
    pub max_row_group_rows: usize,

    /// Target size of a data page in bytes
    #[serde(default = "default_data_page_size_limit")]
    pub data_page_size_limit: usize,

    /// Value written to the footer's `created_by` field
    #[serde(default)]
    pub created_by: Option<String>,
}

/// Compression codecs understood by the writer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionCodec {
    Uncompressed,
    Snappy,
    Gzip,
    Lz4,
    Zstd,
    Brotli,
}

// Default value functions
fn default_compression() -> String {
    "snappy".to_string()
}

fn default_enable_dictionary() -> bool {
    true
}

fn default_max_row_group_rows() -> usize {
    1024 * 1024
}

fn default_data_page_size_limit() -> usize {
    1024 * 1024
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            compression: default_compression(),
            enable_dictionary: default_enable_dictionary(),
            max_row_group_rows: default_max_row_group_rows(),
            data_page_size_limit: default_data_page_size_limit(),
            created_by: None,
        }
    }
}

impl FromStr for CompressionCodec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "uncompressed" | "none" => Ok(CompressionCodec::Uncompressed),
            "snappy" => Ok(CompressionCodec::Snappy),
            "gzip" => Ok(CompressionCodec::Gzip),
            "lz4" => Ok(CompressionCodec::Lz4),
            "zstd" => Ok(CompressionCodec::Zstd),
            "brotli" => Ok(CompressionCodec::Brotli),
            other => anyhow::bail!("Unknown compression codec: {}", other),
        }
    }
}

impl fmt::Display for CompressionCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompressionCodec::Uncompressed => "uncompressed",
            CompressionCodec::Snappy => "snappy",
            CompressionCodec::Gzip => "gzip",
            CompressionCodec::Lz4 => "lz4",
            CompressionCodec::Zstd => "zstd",
            CompressionCodec::Brotli => "brotli",
        };
        f.write_str(name)
    }
}

impl Config {
    /// Load Config with layered configuration priority:
    /// 1. Default values
    /// 2. TOML file (if provided)
    /// 3. Environment variables (`DOCPARQUET_READER__*`, `DOCPARQUET_WRITER__*`)
    pub fn load(config_file: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder()
            // Reader defaults
            .set_default("reader.field_selectors", Vec::<String>::new())?
            // Writer defaults
            .set_default("writer.compression", default_compression())?
            .set_default("writer.enable_dictionary", default_enable_dictionary())?
            .set_default(
                "writer.max_row_group_rows",
                default_max_row_group_rows() as u64,
            )?
            .set_default(
                "writer.data_page_size_limit",
                default_data_page_size_limit() as u64,
            )?;

        if let Some(file_path) = config_file {
            let path = Path::new(file_path);
            if !path.exists() {
                anyhow::bail!("Configuration file not found: {}", path.display());
            }
            builder = builder.add_source(File::from(path));
        }

        // Double underscore separates sections so that keys keep their own underscores
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("reader.field_selectors")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        let app_config: Config = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        Ok(app_config)
    }

    /// Load Config from a TOML file
    ///
    /// Environment variables can still override values from the file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path
            .to_str()
            .with_context(|| format!("Configuration path is not valid UTF-8: {}", path.display()))?;
        Self::load(Some(path_str))
    }

    /// Create a new Config from environment variables with defaults
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.reader.validate()?;
        self.writer.validate()?;
        Ok(())
    }
}

impl ReaderConfig {
    /// Validate the reader configuration
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.field_selectors.iter().all(|s| !s.trim().is_empty()),
            "Field selectors cannot contain blank patterns"
        );
        Ok(())
    }
}

impl WriterConfig {
    /// Parses the configured compression name
    pub fn compression_codec(&self) -> Result<CompressionCodec> {
        self.compression.parse()
    }

    /// Validate the writer configuration
    pub fn validate(&self) -> Result<()> {
        self.compression_codec()?;
        anyhow::ensure!(
            self.max_row_group_rows > 0,
            "max_row_group_rows must be greater than zero"
        );
        anyhow::ensure!(
            self.data_page_size_limit > 0,
            "data_page_size_limit must be greater than zero"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.reader.field_selectors.is_empty());
        assert_eq!(config.writer.compression, "snappy");
        assert!(config.writer.enable_dictionary);
        assert_eq!(config.writer.max_row_group_rows, 1024 * 1024);
        assert_eq!(config.writer.created_by, None);
    }

    #[test]
    fn test_load_with_defaults() {
        let config = Config::load(None).expect("Failed to load config");
        assert_eq!(config.writer.compression_codec().unwrap(), CompressionCodec::Snappy);
        assert!(config.writer.enable_dictionary);
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("Failed to create temp file");
        writeln!(
            file,
            r#"
[reader]
field_selectors = ["**/streetName", "/person/name/*"]

[writer]
compression = "zstd"
max_row_group_rows = 500
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).expect("Failed to load config");
        assert_eq!(
            config.reader.field_selectors,
            vec!["**/streetName".to_string(), "/person/name/*".to_string()]
        );
        assert_eq!(config.writer.compression_codec().unwrap(), CompressionCodec::Zstd);
        assert_eq!(config.writer.max_row_group_rows, 500);
        // Untouched keys keep their defaults
        assert!(config.writer.enable_dictionary);
    }

    #[test]
    fn test_environment_overrides_defaults() {
        // Only touches a key no other test asserts on
        std::env::set_var("DOCPARQUET_WRITER__CREATED_BY", "env-test");
        let config = Config::from_env();
        std::env::remove_var("DOCPARQUET_WRITER__CREATED_BY");

        let config = config.expect("Failed to load config");
        assert_eq!(config.writer.created_by.as_deref(), Some("env-test"));
        assert_eq!(config.writer.max_row_group_rows, 1024 * 1024);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(Config::load(Some("/definitely/not/here.toml")).is_err());
    }

    #[test]
    fn test_compression_codec_parsing() {
        assert_eq!("GZIP".parse::<CompressionCodec>().unwrap(), CompressionCodec::Gzip);
        assert_eq!("none".parse::<CompressionCodec>().unwrap(), CompressionCodec::Uncompressed);
        assert!("rar".parse::<CompressionCodec>().is_err());
        assert_eq!(CompressionCodec::Brotli.to_string(), "brotli");
    }

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_bad_writer_settings() {
        let mut config = Config::default();
        config.writer.max_row_group_rows = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.writer.compression = "lzma".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_blank_selector() {
        let mut config = Config::default();
        config.reader.field_selectors = vec!["  ".to_string()];
        assert!(config.validate().is_err());
    }
}
