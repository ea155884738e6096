use serde_json::json;

use super::base::{Encoder, ObjectSerializer};
use super::builtins::{BuiltinFunctionEncoder, ClassEncoder, InstanceEncoder};
use super::Document;
use crate::error::SerializationError;
use crate::runtime::{ObjectKind, Value};

/// Used for every type without a registered encoder.
///
/// Tries, in order: exception, sandbox builtin, class, instance, and finally
/// the textual representation.
#[derive(Debug)]
pub struct FallbackEncoder;

impl Encoder for FallbackEncoder {
    fn name(&self) -> &'static str {
        "FallbackEncoder"
    }

    fn encode(
        &self,
        value: &Value,
        serializer: &mut ObjectSerializer,
    ) -> Result<Document, SerializationError> {
        match value.kind() {
            ObjectKind::Exception(exc) => Ok(json!({
                "type": exc.type_name,
                "message": exc.message,
            })),
            ObjectKind::SandboxBuiltin(_) => BuiltinFunctionEncoder.encode(value, serializer),
            ObjectKind::Class(_) => ClassEncoder.encode(value, serializer),
            ObjectKind::Instance(_) => InstanceEncoder.encode(value, serializer),
            _ => Ok(Document::String(value.repr())),
        }
    }
}
