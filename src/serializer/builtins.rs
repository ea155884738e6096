use serde_json::{json, Map};

use super::base::{Encoder, ObjectSerializer};
use super::Document;
use crate::error::SerializationError;
use crate::runtime::{FunctionObject, ObjectKind, Value};

/// Values interpreted as primitives are stored as their textual representation.
#[derive(Debug)]
pub struct PrimitiveEncoder;

impl Encoder for PrimitiveEncoder {
    fn name(&self) -> &'static str {
        "PrimitiveEncoder"
    }

    fn encode(&self, value: &Value, _: &mut ObjectSerializer) -> Result<Document, SerializationError> {
        Ok(Document::String(value.repr()))
    }
}

/// Type objects are stored as a bare `{name, module}` document.
#[derive(Debug)]
pub struct TypeEncoder;

impl Encoder for TypeEncoder {
    fn name(&self) -> &'static str {
        "TypeEncoder"
    }

    fn encode(&self, value: &Value, _: &mut ObjectSerializer) -> Result<Document, SerializationError> {
        match value.kind() {
            ObjectKind::Type(ty) => Ok(json!({ "name": ty.name, "module": ty.module })),
            ObjectKind::Class(class) => Ok(json!({ "name": class.name, "module": class.module })),
            _ => Err(SerializationError::encoder("not a type object")),
        }
    }

    fn serialize(
        &self,
        value: &Value,
        serializer: &mut ObjectSerializer,
    ) -> Result<Document, SerializationError> {
        self.encode(value, serializer)
    }
}

fn encode_function(func: &FunctionObject) -> Document {
    let code = &func.code;
    let parent = func
        .parent()
        .map_or(Document::Null, |link| json!({ "name": link.name, "uid": link.uid }));
    json!({
        "arguments": {
            "args": code.params,
            "varargs": code.varargs,
            "keywords": code.varkw,
        },
        "isLambda": func.is_lambda(),
        "lineno": code.first_line,
        "parent": parent,
        "help": func.doc,
    })
}

#[derive(Debug)]
pub struct FunctionEncoder;

impl Encoder for FunctionEncoder {
    fn name(&self) -> &'static str {
        "FunctionEncoder"
    }

    fn encode(&self, value: &Value, _: &mut ObjectSerializer) -> Result<Document, SerializationError> {
        value
            .as_function()
            .map(encode_function)
            .ok_or_else(|| SerializationError::encoder("not a function"))
    }
}

/// Bound methods: the function encoding plus the owning class.
#[derive(Debug)]
pub struct MethodEncoder;

impl Encoder for MethodEncoder {
    fn name(&self) -> &'static str {
        "MethodEncoder"
    }

    fn encode(
        &self,
        value: &Value,
        serializer: &mut ObjectSerializer,
    ) -> Result<Document, SerializationError> {
        let ObjectKind::Method(method) = value.kind() else {
            return Err(SerializationError::encoder("not a bound method"));
        };
        let func = method
            .function
            .as_function()
            .ok_or_else(|| SerializationError::encoder("method does not wrap a function"))?;
        let mut encoded = encode_function(func);
        let owner = serializer.encode_member(&method.owner)?;
        if let Some(fields) = encoded.as_object_mut() {
            fields.insert("class".to_string(), owner);
        }
        Ok(encoded)
    }
}

/// Builtin callables, including the ones the sandbox substitutes.
#[derive(Debug)]
pub struct BuiltinFunctionEncoder;

impl Encoder for BuiltinFunctionEncoder {
    fn name(&self) -> &'static str {
        "BuiltinFunctionEncoder"
    }

    fn encode(&self, value: &Value, _: &mut ObjectSerializer) -> Result<Document, SerializationError> {
        match value.kind() {
            ObjectKind::Builtin(builtin) | ObjectKind::SandboxBuiltin(builtin) => {
                Ok(json!({ "help": builtin.doc }))
            }
            _ => Err(SerializationError::encoder("not a builtin callable")),
        }
    }
}

/// Encodes the public attributes of `value` by name, sorted.
pub(super) fn encode_attributes(
    value: &Value,
    serializer: &mut ObjectSerializer,
) -> Result<Document, SerializationError> {
    let mut attributes: Vec<(String, Value)> = value
        .attributes()
        .map(|attrs| {
            attrs
                .iter()
                .filter(|(name, _)| !name.starts_with("__"))
                .map(|(name, attr)| (name.clone(), attr.clone()))
                .collect()
        })
        .unwrap_or_default();
    attributes.sort_by(|a, b| a.0.cmp(&b.0));

    let mut encoded = Map::new();
    for (name, attr) in attributes {
        encoded.insert(name, serializer.encode_member(&attr)?);
    }
    Ok(Document::Object(encoded))
}

#[derive(Debug)]
pub struct ModuleEncoder;

impl Encoder for ModuleEncoder {
    fn name(&self) -> &'static str {
        "ModuleEncoder"
    }

    fn encode(
        &self,
        value: &Value,
        serializer: &mut ObjectSerializer,
    ) -> Result<Document, SerializationError> {
        let ObjectKind::Module(module) = value.kind() else {
            return Err(SerializationError::encoder("not a module"));
        };
        Ok(json!({
            "version": module.version.clone().unwrap_or_default(),
            "package": module.package.clone().unwrap_or_default(),
            "attributes": encode_attributes(value, serializer)?,
        }))
    }
}

/// User classes: bases other than `object`, and attributes.
#[derive(Debug)]
pub struct ClassEncoder;

impl Encoder for ClassEncoder {
    fn name(&self) -> &'static str {
        "ClassEncoder"
    }

    fn encode(
        &self,
        value: &Value,
        serializer: &mut ObjectSerializer,
    ) -> Result<Document, SerializationError> {
        let ObjectKind::Class(class) = value.kind() else {
            return Err(SerializationError::encoder("not a class"));
        };
        let mut bases = Vec::new();
        for base in &class.bases {
            if is_object_type(base) {
                continue;
            }
            bases.push(serializer.encode_member(base)?);
        }
        Ok(json!({
            "super": bases,
            "attributes": encode_attributes(value, serializer)?,
        }))
    }
}

fn is_object_type(value: &Value) -> bool {
    matches!(value.kind(), ObjectKind::Type(ty) if ty.name == "object" && ty.module == "builtins")
}

/// Instances of user classes: their class and attributes.
#[derive(Debug)]
pub struct InstanceEncoder;

impl Encoder for InstanceEncoder {
    fn name(&self) -> &'static str {
        "InstanceEncoder"
    }

    fn encode(
        &self,
        value: &Value,
        serializer: &mut ObjectSerializer,
    ) -> Result<Document, SerializationError> {
        let ObjectKind::Instance(instance) = value.kind() else {
            return Err(SerializationError::encoder("not an instance"));
        };
        Ok(json!({
            "class": serializer.encode_member(&instance.class)?,
            "attributes": encode_attributes(value, serializer)?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{Bindings, Code, ParentLink};
    use crate::serializer::HeapAddress;

    fn stored(serializer: &ObjectSerializer, address: &HeapAddress) -> Document {
        serializer.heap().get(address).cloned().unwrap()
    }

    #[test]
    fn test_primitive_document() {
        let mut serializer = ObjectSerializer::default();
        let address = serializer.encode(&Value::str("Hello")).unwrap();
        assert_eq!(
            stored(&serializer, &address),
            json!({
                "name": "str",
                "type": { "name": "str", "module": "builtins" },
                "value": "'Hello'",
            })
        );
    }

    #[test]
    fn test_type_document_is_bare() {
        let mut serializer = ObjectSerializer::default();
        let address = serializer.encode(&Value::type_object("int", "builtins")).unwrap();
        assert_eq!(
            stored(&serializer, &address),
            json!({ "name": "int", "module": "builtins" })
        );
    }

    #[test]
    fn test_function_document() {
        let code = Code::new("hello", 1)
            .with_params(["arg1", "arg2"])
            .with_varargs("args")
            .with_varkw("kwargs")
            .build();
        let func = Value::function("hello", &code, Some("Say hello"));
        func.as_function().unwrap().set_parent(ParentLink {
            name: "outer".into(),
            uid: 2,
        });

        let mut serializer = ObjectSerializer::default();
        let address = serializer.encode(&func).unwrap();
        let doc = stored(&serializer, &address);

        assert_eq!(doc["name"], "hello");
        assert_eq!(doc["type"]["name"], "function");
        assert_eq!(
            doc["value"],
            json!({
                "arguments": {
                    "args": ["arg1", "arg2"],
                    "varargs": "args",
                    "keywords": "kwargs",
                },
                "isLambda": false,
                "lineno": 1,
                "parent": { "name": "outer", "uid": 2 },
                "help": "Say hello",
            })
        );
    }

    #[test]
    fn test_lambda_without_parent() {
        let code = Code::new("<lambda>", 3).with_params(["x"]).build();
        let func = Value::function("<lambda>", &code, None);

        let mut serializer = ObjectSerializer::default();
        let address = serializer.encode(&func).unwrap();
        let doc = stored(&serializer, &address);
        assert_eq!(doc["value"]["isLambda"], true);
        assert!(doc["value"]["parent"].is_null());
        assert!(doc["value"]["help"].is_null());
    }

    #[test]
    fn test_method_carries_owner_class() {
        let object = Value::type_object("object", "builtins");
        let class = Value::class("Greeter", "__main__", vec![object], Bindings::new());
        let code = Code::new("greet", 2).with_params(["self"]).build();
        let func = Value::function("greet", &code, None);
        let receiver = Value::instance(class.clone(), Bindings::new());
        let method = Value::method(func, class.clone(), receiver);

        let mut serializer = ObjectSerializer::default();
        let address = serializer.encode(&method).unwrap();
        let doc = stored(&serializer, &address);
        let class_address = serializer.heap().address_of(&class).unwrap();

        assert_eq!(doc["name"], "greet");
        assert_eq!(doc["value"]["class"], class_address.as_str());
    }

    #[test]
    fn test_module_attributes_are_filtered_and_sorted() {
        let mut attrs = Bindings::new();
        attrs.insert("pi".into(), Value::float(3.5));
        attrs.insert("__doc__".into(), Value::str("math"));
        attrs.insert("e".into(), Value::float(2.5));
        let module = Value::module("math", None, Some(""), attrs);

        let mut serializer = ObjectSerializer::default();
        let address = serializer.encode(&module).unwrap();
        let doc = stored(&serializer, &address);

        let names: Vec<&String> = doc["value"]["attributes"]
            .as_object()
            .unwrap()
            .keys()
            .collect();
        assert_eq!(names, ["e", "pi"]);
        assert_eq!(doc["value"]["version"], "");
    }

    #[test]
    fn test_builtin_help() {
        let mut serializer = ObjectSerializer::default();
        let address = serializer
            .encode(&Value::builtin("len", Some("Return the number of items")))
            .unwrap();
        assert_eq!(
            stored(&serializer, &address)["value"],
            json!({ "help": "Return the number of items" })
        );
    }
}
