//! Object graph snapshots: encoders, the registry that picks them, and the
//! two-tier heap that hands out addresses.

mod base;
mod builtins;
mod collections;
mod fallback;
mod heap;
mod registry;

/// A JSON-safe encoded value.
pub type Document = serde_json::Value;

pub use base::{encode_type, Encoder, ObjectSerializer};
pub use builtins::{
    BuiltinFunctionEncoder, ClassEncoder, FunctionEncoder, InstanceEncoder, MethodEncoder,
    ModuleEncoder, PrimitiveEncoder, TypeEncoder,
};
pub use collections::{MappingEncoder, SequenceEncoder};
pub use fallback::FallbackEncoder;
pub use heap::{Heap, HeapAddress, HeapPool};
pub use registry::{SerializerRegistry, PRIMITIVE_TYPES};
