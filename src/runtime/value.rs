use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use super::code::Code;

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one live object. Handles cloned from the same value share it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    fn next() -> Self {
        Self(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// Name → value bindings in insertion order.
pub type Bindings = IndexMap<String, Value>;

/// The concrete runtime type of a value. Encoders are registered against these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKey {
    NoneType,
    Bool,
    Int,
    Float,
    Complex,
    Str,
    Bytes,
    Tuple,
    List,
    Set,
    FrozenSet,
    Dict,
    Type,
    Function,
    Method,
    BuiltinFunction,
    SandboxBuiltin,
    Module,
    Class,
    Instance,
    Exception,
    Opaque,
}

/// `{name, module}` pair describing a type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub name: String,
    pub module: String,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
        }
    }

    fn builtin(name: &str) -> Self {
        Self::new(name, "builtins")
    }
}

/// Link from a closure to the call frame that defined it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentLink {
    pub name: String,
    pub uid: u64,
}

#[derive(Debug)]
pub struct TypeObject {
    pub name: String,
    pub module: String,
}

#[derive(Debug)]
pub struct FunctionObject {
    pub name: String,
    pub code: Rc<Code>,
    pub doc: Option<String>,
    parent: RefCell<Option<ParentLink>>,
}

impl FunctionObject {
    pub fn is_lambda(&self) -> bool {
        self.name == "<lambda>"
    }

    pub fn parent(&self) -> Option<ParentLink> {
        self.parent.borrow().clone()
    }

    pub fn set_parent(&self, link: ParentLink) {
        *self.parent.borrow_mut() = Some(link);
    }
}

#[derive(Debug)]
pub struct MethodObject {
    pub function: Value,
    pub owner: Value,
    pub receiver: Value,
}

#[derive(Debug)]
pub struct BuiltinObject {
    pub name: String,
    pub doc: Option<String>,
}

#[derive(Debug)]
pub struct ModuleObject {
    pub name: String,
    pub version: Option<String>,
    pub package: Option<String>,
    pub attributes: RefCell<Bindings>,
}

#[derive(Debug)]
pub struct ClassObject {
    pub name: String,
    pub module: String,
    pub bases: Vec<Value>,
    pub attributes: RefCell<Bindings>,
}

#[derive(Debug)]
pub struct InstanceObject {
    pub class: Value,
    pub attributes: RefCell<Bindings>,
}

#[derive(Debug)]
pub struct ExceptionObject {
    pub type_name: String,
    pub message: String,
}

#[derive(Debug)]
pub struct OpaqueObject {
    pub descriptor: TypeDescriptor,
    pub repr: String,
}

#[derive(Debug)]
pub enum ObjectKind {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Complex(f64, f64),
    Str(String),
    Bytes(Vec<u8>),
    Tuple(Vec<Value>),
    List(RefCell<Vec<Value>>),
    Set(RefCell<Vec<Value>>),
    FrozenSet(Vec<Value>),
    Dict(RefCell<Vec<(Value, Value)>>),
    Type(TypeObject),
    Function(FunctionObject),
    Method(MethodObject),
    Builtin(BuiltinObject),
    SandboxBuiltin(BuiltinObject),
    Module(ModuleObject),
    Class(ClassObject),
    Instance(InstanceObject),
    Exception(ExceptionObject),
    Opaque(OpaqueObject),
}

pub struct Object {
    id: ObjectId,
    kind: ObjectKind,
}

/// A live value handle. Cloning keeps the identity.
#[derive(Clone)]
pub struct Value(Rc<Object>);

/// Either a borrowed element list or an owned one, depending on mutability.
pub enum Elements<'a> {
    Fixed(&'a [Value]),
    Shared(Ref<'a, Vec<Value>>),
}

impl std::ops::Deref for Elements<'_> {
    type Target = [Value];

    fn deref(&self) -> &[Value] {
        match self {
            Self::Fixed(items) => items,
            Self::Shared(items) => items,
        }
    }
}

impl Value {
    pub fn new(kind: ObjectKind) -> Self {
        Self(Rc::new(Object {
            id: ObjectId::next(),
            kind,
        }))
    }

    pub fn none() -> Self {
        Self::new(ObjectKind::None)
    }

    pub fn bool(value: bool) -> Self {
        Self::new(ObjectKind::Bool(value))
    }

    pub fn int(value: i64) -> Self {
        Self::new(ObjectKind::Int(value))
    }

    pub fn float(value: f64) -> Self {
        Self::new(ObjectKind::Float(value))
    }

    pub fn complex(re: f64, im: f64) -> Self {
        Self::new(ObjectKind::Complex(re, im))
    }

    pub fn str(value: impl Into<String>) -> Self {
        Self::new(ObjectKind::Str(value.into()))
    }

    pub fn bytes(value: impl Into<Vec<u8>>) -> Self {
        Self::new(ObjectKind::Bytes(value.into()))
    }

    pub fn tuple(items: impl IntoIterator<Item = Value>) -> Self {
        Self::new(ObjectKind::Tuple(items.into_iter().collect()))
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Self::new(ObjectKind::List(RefCell::new(items.into_iter().collect())))
    }

    pub fn set(items: impl IntoIterator<Item = Value>) -> Self {
        Self::new(ObjectKind::Set(RefCell::new(items.into_iter().collect())))
    }

    pub fn frozenset(items: impl IntoIterator<Item = Value>) -> Self {
        Self::new(ObjectKind::FrozenSet(items.into_iter().collect()))
    }

    pub fn dict(entries: impl IntoIterator<Item = (Value, Value)>) -> Self {
        Self::new(ObjectKind::Dict(RefCell::new(entries.into_iter().collect())))
    }

    pub fn type_object(name: impl Into<String>, module: impl Into<String>) -> Self {
        Self::new(ObjectKind::Type(TypeObject {
            name: name.into(),
            module: module.into(),
        }))
    }

    pub fn function(name: impl Into<String>, code: &Rc<Code>, doc: Option<&str>) -> Self {
        Self::new(ObjectKind::Function(FunctionObject {
            name: name.into(),
            code: Rc::clone(code),
            doc: doc.map(str::to_string),
            parent: RefCell::new(None),
        }))
    }

    pub fn method(function: Value, owner: Value, receiver: Value) -> Self {
        Self::new(ObjectKind::Method(MethodObject {
            function,
            owner,
            receiver,
        }))
    }

    pub fn builtin(name: impl Into<String>, doc: Option<&str>) -> Self {
        Self::new(ObjectKind::Builtin(BuiltinObject {
            name: name.into(),
            doc: doc.map(str::to_string),
        }))
    }

    /// A callable the sandbox substitutes for a restricted builtin (`input`, `__import__`).
    pub fn sandbox_builtin(name: impl Into<String>, doc: Option<&str>) -> Self {
        Self::new(ObjectKind::SandboxBuiltin(BuiltinObject {
            name: name.into(),
            doc: doc.map(str::to_string),
        }))
    }

    pub fn module(
        name: impl Into<String>,
        version: Option<&str>,
        package: Option<&str>,
        attributes: Bindings,
    ) -> Self {
        Self::new(ObjectKind::Module(ModuleObject {
            name: name.into(),
            version: version.map(str::to_string),
            package: package.map(str::to_string),
            attributes: RefCell::new(attributes),
        }))
    }

    pub fn class(
        name: impl Into<String>,
        module: impl Into<String>,
        bases: Vec<Value>,
        attributes: Bindings,
    ) -> Self {
        Self::new(ObjectKind::Class(ClassObject {
            name: name.into(),
            module: module.into(),
            bases,
            attributes: RefCell::new(attributes),
        }))
    }

    pub fn instance(class: Value, attributes: Bindings) -> Self {
        Self::new(ObjectKind::Instance(InstanceObject {
            class,
            attributes: RefCell::new(attributes),
        }))
    }

    pub fn exception(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ObjectKind::Exception(ExceptionObject {
            type_name: type_name.into(),
            message: message.into(),
        }))
    }

    pub fn opaque(descriptor: TypeDescriptor, repr: impl Into<String>) -> Self {
        Self::new(ObjectKind::Opaque(OpaqueObject {
            descriptor,
            repr: repr.into(),
        }))
    }

    pub fn id(&self) -> ObjectId {
        self.0.id
    }

    pub fn kind(&self) -> &ObjectKind {
        &self.0.kind
    }

    pub fn is(&self, other: &Value) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn type_key(&self) -> TypeKey {
        match self.kind() {
            ObjectKind::None => TypeKey::NoneType,
            ObjectKind::Bool(_) => TypeKey::Bool,
            ObjectKind::Int(_) => TypeKey::Int,
            ObjectKind::Float(_) => TypeKey::Float,
            ObjectKind::Complex(..) => TypeKey::Complex,
            ObjectKind::Str(_) => TypeKey::Str,
            ObjectKind::Bytes(_) => TypeKey::Bytes,
            ObjectKind::Tuple(_) => TypeKey::Tuple,
            ObjectKind::List(_) => TypeKey::List,
            ObjectKind::Set(_) => TypeKey::Set,
            ObjectKind::FrozenSet(_) => TypeKey::FrozenSet,
            ObjectKind::Dict(_) => TypeKey::Dict,
            ObjectKind::Type(_) => TypeKey::Type,
            ObjectKind::Function(_) => TypeKey::Function,
            ObjectKind::Method(_) => TypeKey::Method,
            ObjectKind::Builtin(_) => TypeKey::BuiltinFunction,
            ObjectKind::SandboxBuiltin(_) => TypeKey::SandboxBuiltin,
            ObjectKind::Module(_) => TypeKey::Module,
            ObjectKind::Class(_) => TypeKey::Class,
            ObjectKind::Instance(_) => TypeKey::Instance,
            ObjectKind::Exception(_) => TypeKey::Exception,
            ObjectKind::Opaque(_) => TypeKey::Opaque,
        }
    }

    /// The `{name, module}` descriptor of this value's type.
    pub fn type_descriptor(&self) -> TypeDescriptor {
        match self.kind() {
            ObjectKind::None => TypeDescriptor::builtin("NoneType"),
            ObjectKind::Bool(_) => TypeDescriptor::builtin("bool"),
            ObjectKind::Int(_) => TypeDescriptor::builtin("int"),
            ObjectKind::Float(_) => TypeDescriptor::builtin("float"),
            ObjectKind::Complex(..) => TypeDescriptor::builtin("complex"),
            ObjectKind::Str(_) => TypeDescriptor::builtin("str"),
            ObjectKind::Bytes(_) => TypeDescriptor::builtin("bytes"),
            ObjectKind::Tuple(_) => TypeDescriptor::builtin("tuple"),
            ObjectKind::List(_) => TypeDescriptor::builtin("list"),
            ObjectKind::Set(_) => TypeDescriptor::builtin("set"),
            ObjectKind::FrozenSet(_) => TypeDescriptor::builtin("frozenset"),
            ObjectKind::Dict(_) => TypeDescriptor::builtin("dict"),
            ObjectKind::Type(_) | ObjectKind::Class(_) => TypeDescriptor::builtin("type"),
            ObjectKind::Function(_) => TypeDescriptor::builtin("function"),
            ObjectKind::Method(_) => TypeDescriptor::builtin("method"),
            // Sandbox overrides masquerade as the builtin they replace.
            ObjectKind::Builtin(_) | ObjectKind::SandboxBuiltin(_) => {
                TypeDescriptor::builtin("builtin_function_or_method")
            }
            ObjectKind::Module(_) => TypeDescriptor::builtin("module"),
            ObjectKind::Instance(instance) => match instance.class.kind() {
                ObjectKind::Class(class) => TypeDescriptor::new(&class.name, &class.module),
                ObjectKind::Type(ty) => TypeDescriptor::new(&ty.name, &ty.module),
                _ => TypeDescriptor::builtin("object"),
            },
            ObjectKind::Exception(exc) => TypeDescriptor::builtin(&exc.type_name),
            ObjectKind::Opaque(opaque) => opaque.descriptor.clone(),
        }
    }

    /// Friendly name: the value's own `__name__` when it has one, else its type name.
    pub fn object_name(&self) -> String {
        match self.kind() {
            ObjectKind::Type(ty) => ty.name.clone(),
            ObjectKind::Function(func) => func.name.clone(),
            ObjectKind::Method(method) => method.function.object_name(),
            ObjectKind::Builtin(builtin) | ObjectKind::SandboxBuiltin(builtin) => {
                builtin.name.clone()
            }
            ObjectKind::Module(module) => module.name.clone(),
            ObjectKind::Class(class) => class.name.clone(),
            _ => self.type_descriptor().name,
        }
    }

    /// Immutable values live in the constants pool for the whole run.
    pub fn is_constant(&self) -> bool {
        matches!(
            self.type_key(),
            TypeKey::Int
                | TypeKey::Float
                | TypeKey::Complex
                | TypeKey::Str
                | TypeKey::Bool
                | TypeKey::Bytes
                | TypeKey::FrozenSet
                | TypeKey::Tuple
                | TypeKey::Type
                | TypeKey::Class
                | TypeKey::Function
                | TypeKey::Method
                | TypeKey::BuiltinFunction
                | TypeKey::SandboxBuiltin
        )
    }

    /// Placeholder substituted for this value when it closes a reference cycle.
    /// `None` for values that cannot hold references.
    pub fn cycle_placeholder(&self) -> Option<&'static str> {
        match self.kind() {
            ObjectKind::Tuple(_)
            | ObjectKind::List(_)
            | ObjectKind::Set(_)
            | ObjectKind::FrozenSet(_) => Some("[...]"),
            ObjectKind::Dict(_) => Some("{...}"),
            ObjectKind::Module(_) | ObjectKind::Class(_) | ObjectKind::Instance(_) => {
                Some("<...>")
            }
            _ => None,
        }
    }

    /// Elements of a list-like value.
    pub fn elements(&self) -> Option<Elements<'_>> {
        match self.kind() {
            ObjectKind::Tuple(items) | ObjectKind::FrozenSet(items) => {
                Some(Elements::Fixed(items))
            }
            ObjectKind::List(items) | ObjectKind::Set(items) => {
                Some(Elements::Shared(items.borrow()))
            }
            _ => None,
        }
    }

    /// Key/value pairs of a dict, in insertion order.
    pub fn entries(&self) -> Option<Vec<(Value, Value)>> {
        match self.kind() {
            ObjectKind::Dict(entries) => Some(entries.borrow().clone()),
            _ => None,
        }
    }

    /// Attribute map of modules, classes and instances.
    pub fn attributes(&self) -> Option<Ref<'_, Bindings>> {
        match self.kind() {
            ObjectKind::Module(module) => Some(module.attributes.borrow()),
            ObjectKind::Class(class) => Some(class.attributes.borrow()),
            ObjectKind::Instance(instance) => Some(instance.attributes.borrow()),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionObject> {
        match self.kind() {
            ObjectKind::Function(func) => Some(func),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self.kind() {
            ObjectKind::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self.kind() {
            ObjectKind::Str(value) => Some(value),
            _ => None,
        }
    }

    /// Appends to a list or set. Returns false for any other kind.
    pub fn push(&self, item: Value) -> bool {
        match self.kind() {
            ObjectKind::List(items) | ObjectKind::Set(items) => {
                items.borrow_mut().push(item);
                true
            }
            _ => false,
        }
    }

    /// Inserts or replaces a dict entry. Primitive keys match by value, others by identity.
    pub fn insert(&self, key: Value, value: Value) -> bool {
        let ObjectKind::Dict(entries) = self.kind() else {
            return false;
        };
        let mut entries = entries.borrow_mut();
        match entries.iter_mut().find(|(k, _)| k.same_key(&key)) {
            Some(slot) => slot.1 = value,
            None => entries.push((key, value)),
        }
        true
    }

    fn same_key(&self, other: &Value) -> bool {
        if self.is(other) {
            return true;
        }
        let primitive = |value: &Value| {
            matches!(
                value.kind(),
                ObjectKind::None
                    | ObjectKind::Bool(_)
                    | ObjectKind::Int(_)
                    | ObjectKind::Float(_)
                    | ObjectKind::Complex(..)
                    | ObjectKind::Str(_)
                    | ObjectKind::Bytes(_)
            )
        };
        primitive(self)
            && primitive(other)
            && self.type_key() == other.type_key()
            && self.repr() == other.repr()
    }

    /// Sets an attribute on a module, class or instance.
    pub fn set_attribute(&self, name: impl Into<String>, value: Value) -> bool {
        let attributes = match self.kind() {
            ObjectKind::Module(module) => &module.attributes,
            ObjectKind::Class(class) => &class.attributes,
            ObjectKind::Instance(instance) => &instance.attributes,
            _ => return false,
        };
        attributes.borrow_mut().insert(name.into(), value);
        true
    }

    /// Textual representation in the traced language's `repr` style.
    pub fn repr(&self) -> String {
        let mut out = String::new();
        let mut active = Vec::new();
        self.write_repr(&mut out, &mut active);
        out
    }

    fn write_repr(&self, out: &mut String, active: &mut Vec<ObjectId>) {
        if active.contains(&self.id()) {
            out.push_str(self.cycle_placeholder().unwrap_or("..."));
            return;
        }
        match self.kind() {
            ObjectKind::None => out.push_str("None"),
            ObjectKind::Bool(true) => out.push_str("True"),
            ObjectKind::Bool(false) => out.push_str("False"),
            ObjectKind::Int(value) => out.push_str(&value.to_string()),
            ObjectKind::Float(value) => out.push_str(&float_repr(*value)),
            ObjectKind::Complex(re, im) => {
                let sign = if *im < 0.0 { '-' } else { '+' };
                if *re == 0.0 {
                    out.push_str(&format!("{}j", complex_part(*im)));
                } else {
                    out.push_str(&format!(
                        "({}{}{}j)",
                        complex_part(*re),
                        sign,
                        complex_part(im.abs())
                    ));
                }
            }
            ObjectKind::Str(value) => out.push_str(&str_repr(value)),
            ObjectKind::Bytes(value) => out.push_str(&bytes_repr(value)),
            ObjectKind::Tuple(_)
            | ObjectKind::List(_)
            | ObjectKind::Set(_)
            | ObjectKind::FrozenSet(_) => {
                let (open, close) = match self.type_key() {
                    TypeKey::Tuple => ("(", ")"),
                    TypeKey::List => ("[", "]"),
                    TypeKey::FrozenSet => ("frozenset({", "})"),
                    _ => ("{", "}"),
                };
                active.push(self.id());
                let items: Vec<Value> = self
                    .elements()
                    .map(|items| items.to_vec())
                    .unwrap_or_default();
                out.push_str(open);
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.write_repr(out, active);
                }
                if self.type_key() == TypeKey::Tuple && items.len() == 1 {
                    out.push(',');
                }
                out.push_str(close);
                active.pop();
            }
            ObjectKind::Dict(_) => {
                active.push(self.id());
                out.push('{');
                for (i, (key, value)) in self.entries().unwrap_or_default().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    key.write_repr(out, active);
                    out.push_str(": ");
                    value.write_repr(out, active);
                }
                out.push('}');
                active.pop();
            }
            ObjectKind::Type(ty) => out.push_str(&format!("<class '{}'>", ty.name)),
            ObjectKind::Class(class) => {
                out.push_str(&format!("<class '{}.{}'>", class.module, class.name))
            }
            ObjectKind::Function(func) => out.push_str(&format!("<function {}>", func.name)),
            ObjectKind::Method(method) => out.push_str(&format!(
                "<bound method {}.{}>",
                method.owner.object_name(),
                method.function.object_name()
            )),
            ObjectKind::Builtin(builtin) | ObjectKind::SandboxBuiltin(builtin) => {
                out.push_str(&format!("<built-in function {}>", builtin.name))
            }
            ObjectKind::Module(module) => out.push_str(&format!("<module '{}'>", module.name)),
            ObjectKind::Instance(_) => {
                let ty = self.type_descriptor();
                out.push_str(&format!(
                    "<{}.{} object at {:#x}>",
                    ty.module,
                    ty.name,
                    self.id().get()
                ))
            }
            ObjectKind::Exception(exc) => {
                out.push_str(&format!("{}({})", exc.type_name, str_repr(&exc.message)))
            }
            ObjectKind::Opaque(opaque) => out.push_str(&opaque.repr),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value#{}({})", self.id().get(), self.repr())
    }
}

fn float_body(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value.is_infinite() {
        (if value > 0.0 { "inf" } else { "-inf" }).to_string()
    } else if value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

fn float_repr(value: f64) -> String {
    float_body(value)
}

// Complex parts drop the trailing `.0` of integral floats.
fn complex_part(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{}", value as i64)
    } else {
        float_body(value)
    }
}

fn str_repr(value: &str) -> String {
    let quote = if value.contains('\'') && !value.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(value.len() + 2);
    out.push(quote);
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

fn bytes_repr(value: &[u8]) -> String {
    let mut out = String::from("b'");
    for byte in value {
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'\'' => out.push_str("\\'"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7e => out.push(*byte as char),
            other => out.push_str(&format!("\\x{other:02x}")),
        }
    }
    out.push('\'');
    out
}
