use std::collections::HashMap;

use serde_json::json;

use super::heap::{Heap, HeapAddress};
use super::registry::SerializerRegistry;
use super::Document;
use crate::error::SerializationError;
use crate::runtime::{ObjectId, TypeDescriptor, Value};

/// Turns one kind of value into its document.
///
/// Encoders never mutate the value. Children are encoded through the
/// [`ObjectSerializer`] passed in, which hands back their heap addresses.
pub trait Encoder {
    fn name(&self) -> &'static str;

    /// The encoder-specific body of `value`.
    fn encode(
        &self,
        value: &Value,
        serializer: &mut ObjectSerializer,
    ) -> Result<Document, SerializationError>;

    /// The full stored document: object name, type descriptor and body.
    fn serialize(
        &self,
        value: &Value,
        serializer: &mut ObjectSerializer,
    ) -> Result<Document, SerializationError> {
        Ok(json!({
            "name": value.object_name(),
            "type": encode_type(&value.type_descriptor()),
            "value": self.encode(value, serializer)?,
        }))
    }
}

pub fn encode_type(descriptor: &TypeDescriptor) -> Document {
    json!({
        "name": descriptor.name,
        "module": descriptor.module,
    })
}

/// Encodes value graphs into the heap.
///
/// Holds a per-step cache keyed by object identity and the chain of
/// containers currently being encoded, which is what breaks cycles.
#[derive(Debug)]
pub struct ObjectSerializer {
    registry: SerializerRegistry,
    heap: Heap,
    cache: HashMap<ObjectId, Document>,
    ancestors: Vec<ObjectId>,
}

impl Default for ObjectSerializer {
    fn default() -> Self {
        Self::new(SerializerRegistry::with_defaults())
    }
}

impl ObjectSerializer {
    pub fn new(registry: SerializerRegistry) -> Self {
        Self {
            registry,
            heap: Heap::new(),
            cache: HashMap::new(),
            ancestors: Vec::new(),
        }
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn registry(&self) -> &SerializerRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut SerializerRegistry {
        &mut self.registry
    }

    /// Starts a new step: drops the cache and this step's variables.
    pub fn reset(&mut self) {
        self.cache.clear();
        self.ancestors.clear();
        self.heap.reset();
    }

    /// Starts a new run.
    pub fn clear(&mut self) {
        self.reset();
        self.heap.clear();
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Encodes `value` and returns its heap address.
    pub fn encode(&mut self, value: &Value) -> Result<HeapAddress, SerializationError> {
        let encoded = match self.cache.get(&value.id()) {
            Some(encoded) => encoded.clone(),
            None => {
                let encoder =
                    self.registry
                        .get(value.type_key())
                        .ok_or_else(|| SerializationError::NoEncoder {
                            type_name: value.type_descriptor().name,
                        })?;
                self.encode_using(value, encoder.as_ref())?
            }
        };
        Ok(self.heap.store(encoded, value))
    }

    /// Encodes `value` with a specific encoder, caching the result.
    pub fn encode_using(
        &mut self,
        value: &Value,
        encoder: &dyn Encoder,
    ) -> Result<Document, SerializationError> {
        let guarded = value.cycle_placeholder().is_some();
        if guarded {
            self.ancestors.push(value.id());
        }
        let result = encoder.serialize(value, self);
        if guarded {
            self.ancestors.pop();
        }

        match result {
            Ok(encoded) => {
                self.cache.insert(value.id(), encoded.clone());
                Ok(encoded)
            }
            Err(SerializationError::Encoder(reason)) => Err(SerializationError::EncoderFailed {
                encoder: encoder.name(),
                value: value.repr(),
                reason,
            }),
            Err(err) => Err(err),
        }
    }

    /// Encodes a member of a container: its address, or the cycle
    /// placeholder when it is one of the containers being encoded.
    pub fn encode_member(&mut self, value: &Value) -> Result<Document, SerializationError> {
        if self.ancestors.contains(&value.id()) {
            if let Some(placeholder) = value.cycle_placeholder() {
                return Ok(Document::from(placeholder));
            }
        }
        self.encode(value).map(Document::from)
    }
}
