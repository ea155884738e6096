use serde_json::Map;

use super::base::{Encoder, ObjectSerializer};
use super::Document;
use crate::error::SerializationError;
use crate::runtime::Value;

/// Lists, tuples, sets and frozensets, element by element.
#[derive(Debug)]
pub struct SequenceEncoder;

impl Encoder for SequenceEncoder {
    fn name(&self) -> &'static str {
        "SequenceEncoder"
    }

    fn encode(
        &self,
        value: &Value,
        serializer: &mut ObjectSerializer,
    ) -> Result<Document, SerializationError> {
        let items = value
            .elements()
            .map(|items| items.to_vec())
            .ok_or_else(|| SerializationError::encoder("not a sequence"))?;
        let mut encoded = Vec::with_capacity(items.len());
        for item in &items {
            encoded.push(serializer.encode_member(item)?);
        }
        Ok(Document::Array(encoded))
    }
}

/// Dicts, keyed by the address of each key.
#[derive(Debug)]
pub struct MappingEncoder;

impl Encoder for MappingEncoder {
    fn name(&self) -> &'static str {
        "MappingEncoder"
    }

    fn encode(
        &self,
        value: &Value,
        serializer: &mut ObjectSerializer,
    ) -> Result<Document, SerializationError> {
        let entries = value
            .entries()
            .ok_or_else(|| SerializationError::encoder("not a mapping"))?;
        let mut encoded = Map::new();
        for (key, item) in &entries {
            let key = match serializer.encode_member(key)? {
                Document::String(key) => key,
                other => other.to_string(),
            };
            encoded.insert(key, serializer.encode_member(item)?);
        }
        Ok(Document::Object(encoded))
    }
}
