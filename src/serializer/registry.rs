use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use super::base::Encoder;
use super::builtins::{
    BuiltinFunctionEncoder, FunctionEncoder, MethodEncoder, ModuleEncoder, PrimitiveEncoder,
    TypeEncoder,
};
use super::collections::{MappingEncoder, SequenceEncoder};
use super::fallback::FallbackEncoder;
use crate::error::RegistryError;
use crate::runtime::TypeKey;

/// Runtime types treated as primitives and encoded by their textual representation.
pub const PRIMITIVE_TYPES: &[TypeKey] = &[
    TypeKey::NoneType,
    TypeKey::Bool,
    TypeKey::Int,
    TypeKey::Float,
    TypeKey::Complex,
    TypeKey::Str,
    TypeKey::Bytes,
];

/// Type-indexed table of encoders with one optional fallback.
#[derive(Default)]
pub struct SerializerRegistry {
    handlers: HashMap<TypeKey, Rc<dyn Encoder>>,
    default: Option<Rc<dyn Encoder>>,
}

impl fmt::Debug for SerializerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut handlers: Vec<_> = self
            .handlers
            .iter()
            .map(|(key, encoder)| (*key, encoder.name()))
            .collect();
        handlers.sort_by_key(|(key, _)| format!("{key:?}"));
        f.debug_struct("SerializerRegistry")
            .field("handlers", &handlers)
            .field("default", &self.default.as_ref().map(|e| e.name()))
            .finish()
    }
}

impl SerializerRegistry {
    /// An empty registry with no fallback.
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry with every built-in encoder and the fallback installed.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.install_defaults();
        registry
    }

    fn install_defaults(&mut self) {
        let entries: [(&[TypeKey], Rc<dyn Encoder>); 8] = [
            (PRIMITIVE_TYPES, Rc::new(PrimitiveEncoder)),
            (&[TypeKey::Type], Rc::new(TypeEncoder)),
            (&[TypeKey::Function], Rc::new(FunctionEncoder)),
            (&[TypeKey::Method], Rc::new(MethodEncoder)),
            (&[TypeKey::BuiltinFunction], Rc::new(BuiltinFunctionEncoder)),
            (&[TypeKey::Module], Rc::new(ModuleEncoder)),
            (
                &[
                    TypeKey::List,
                    TypeKey::Tuple,
                    TypeKey::Set,
                    TypeKey::FrozenSet,
                ],
                Rc::new(SequenceEncoder),
            ),
            (&[TypeKey::Dict], Rc::new(MappingEncoder)),
        ];
        for (types, encoder) in entries {
            for type_key in types {
                self.handlers.insert(*type_key, Rc::clone(&encoder));
            }
        }
        self.default = Some(Rc::new(FallbackEncoder));
    }

    /// Registers `encoder` for `type_key`. Registering the same encoder twice is a no-op.
    pub fn register(
        &mut self,
        type_key: TypeKey,
        encoder: Rc<dyn Encoder>,
    ) -> Result<(), RegistryError> {
        if let Some(existing) = self.handlers.get(&type_key) {
            if std::ptr::addr_eq(Rc::as_ptr(existing), Rc::as_ptr(&encoder)) {
                return Ok(());
            }
            return Err(RegistryError::Duplicate { type_key });
        }
        self.handlers.insert(type_key, encoder);
        Ok(())
    }

    /// Registers one encoder for several types.
    pub fn register_many(
        &mut self,
        types: &[TypeKey],
        encoder: Rc<dyn Encoder>,
    ) -> Result<(), RegistryError> {
        if types.is_empty() {
            return Err(RegistryError::NoTypes);
        }
        for type_key in types {
            self.register(*type_key, Rc::clone(&encoder))?;
        }
        Ok(())
    }

    pub fn set_default(&mut self, encoder: Rc<dyn Encoder>) {
        self.default = Some(encoder);
    }

    /// The encoder for `type_key`, else the fallback.
    pub fn get(&self, type_key: TypeKey) -> Option<Rc<dyn Encoder>> {
        self.handlers
            .get(&type_key)
            .or(self.default.as_ref())
            .cloned()
    }

    pub fn contains(&self, type_key: TypeKey) -> bool {
        self.handlers.contains_key(&type_key)
    }
}
