//! Generic document trees
//!
//! A [`Document`] is what records normalize into and what the writer accepts:
//! string-keyed maps, ordered sequences and textual scalars. Serializing a
//! document yields plain JSON (`{"a":["x"]}`), and JSON input converts back
//! with numbers and booleans kept in their textual form.

use std::collections::BTreeMap;
use std::io::Read;

use serde::Serialize;
use serde_json::de::IoRead;
use serde_json::{StreamDeserializer, Value as JsonValue};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Document {
    Map(BTreeMap<String, Document>),
    Sequence(Vec<Document>),
    Scalar(String),
}

impl Document {
    pub fn as_map(&self) -> Option<&BTreeMap<String, Document>> {
        match self {
            Document::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Document]> {
        match self {
            Document::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Document::Scalar(value) => Some(value),
            _ => None,
        }
    }

    /// Looks up a key of a map document
    pub fn get(&self, key: &str) -> Option<&Document> {
        self.as_map().and_then(|map| map.get(key))
    }

    /// Parses a single JSON value
    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: JsonValue = serde_json::from_str(text)?;
        Self::try_from(value)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl From<&str> for Document {
    fn from(value: &str) -> Self {
        Document::Scalar(value.to_string())
    }
}

impl From<String> for Document {
    fn from(value: String) -> Self {
        Document::Scalar(value)
    }
}

impl TryFrom<JsonValue> for Document {
    type Error = Error;

    /// Null map members are dropped; a null anywhere else has no document form
    fn try_from(value: JsonValue) -> Result<Self> {
        match value {
            JsonValue::Object(members) => {
                let mut map = BTreeMap::new();
                for (key, member) in members {
                    if member.is_null() {
                        continue;
                    }
                    map.insert(key, Document::try_from(member)?);
                }
                Ok(Document::Map(map))
            }
            JsonValue::Array(items) => items
                .into_iter()
                .map(Document::try_from)
                .collect::<Result<Vec<_>>>()
                .map(Document::Sequence),
            JsonValue::String(value) => Ok(Document::Scalar(value)),
            JsonValue::Number(number) => Ok(Document::Scalar(number.to_string())),
            JsonValue::Bool(flag) => Ok(Document::Scalar(flag.to_string())),
            JsonValue::Null => Err(Error::InvalidDocument(
                "null is only allowed as a map member".to_string(),
            )),
        }
    }
}

impl From<Document> for JsonValue {
    fn from(document: Document) -> Self {
        match document {
            Document::Map(map) => JsonValue::Object(
                map.into_iter()
                    .map(|(key, value)| (key, JsonValue::from(value)))
                    .collect(),
            ),
            Document::Sequence(items) => {
                JsonValue::Array(items.into_iter().map(JsonValue::from).collect())
            }
            Document::Scalar(value) => JsonValue::String(value),
        }
    }
}

/// Iterates over the documents of a JSON input
///
/// The input holds whitespace-separated JSON values. A top-level array is
/// flattened into its elements, so both `[{..},{..}]` and JSON lines work.
pub struct JsonDocuments<R: Read> {
    values: StreamDeserializer<'static, IoRead<R>, JsonValue>,
    pending: std::vec::IntoIter<JsonValue>,
}

impl<R: Read> JsonDocuments<R> {
    pub fn new(reader: R) -> Self {
        Self {
            values: serde_json::Deserializer::from_reader(reader).into_iter(),
            pending: Vec::new().into_iter(),
        }
    }
}

impl<R: Read> Iterator for JsonDocuments<R> {
    type Item = Result<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(value) = self.pending.next() {
                return Some(Document::try_from(value));
            }
            match self.values.next()? {
                Ok(JsonValue::Array(items)) => self.pending = items.into_iter(),
                Ok(value) => return Some(Document::try_from(value)),
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}
