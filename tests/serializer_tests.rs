use std::rc::Rc;

use serde_json::json;

use script_tracer::config::Settings;
use script_tracer::error::SerializationError;
use script_tracer::recorder::{StepEvent, TraceRecorder};
use script_tracer::runtime::{
    namespace, Bindings, Code, Frame, InputQueue, ObjectKind, ScriptedSource, TypeDescriptor,
    TypeKey, Value,
};
use script_tracer::serializer::{
    Document, Encoder, HeapAddress, ObjectSerializer, SerializerRegistry,
};

// Renders an opaque value as its text split on whitespace.
#[derive(Debug)]
struct WordsEncoder;

impl Encoder for WordsEncoder {
    fn name(&self) -> &'static str {
        "WordsEncoder"
    }

    fn encode(&self, value: &Value, _: &mut ObjectSerializer) -> Result<Document, SerializationError> {
        match value.kind() {
            ObjectKind::Opaque(_) => Ok(json!(value.repr().split_whitespace().collect::<Vec<_>>())),
            _ => Err(SerializationError::encoder("expected an opaque value")),
        }
    }
}

#[derive(Debug)]
struct RejectingEncoder;

impl Encoder for RejectingEncoder {
    fn name(&self) -> &'static str {
        "RejectingEncoder"
    }

    fn encode(&self, _: &Value, _: &mut ObjectSerializer) -> Result<Document, SerializationError> {
        Err(SerializationError::encoder("refusing to encode"))
    }
}

fn stored(serializer: &ObjectSerializer, address: &HeapAddress) -> Document {
    serializer.heap().get(address).cloned().expect("stored document")
}

#[cfg(test)]
mod serializer_tests {
    use super::*;

    #[test]
    fn test_list_appended_to_itself() {
        let lst = Value::list([Value::int(1)]);
        lst.push(lst.clone());

        let mut serializer = ObjectSerializer::default();
        let address = serializer.encode(&lst).unwrap();
        let doc = stored(&serializer, &address);
        let one = serializer.heap().address_of(&lst.elements().unwrap()[0]).unwrap();

        assert_eq!(doc["value"], json!([one.as_str(), "[...]"]));
    }

    #[test]
    fn test_dict_stored_in_itself() {
        let d = Value::dict([(Value::int(1), Value::str("one"))]);
        let two = Value::int(2);
        d.insert(two.clone(), d.clone());

        let mut serializer = ObjectSerializer::default();
        let address = serializer.encode(&d).unwrap();
        let body = stored(&serializer, &address)["value"].clone();
        let two_address = serializer.heap().address_of(&two).unwrap();

        let entries = body.as_object().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[two_address.as_str()], "{...}");
        let other = entries
            .iter()
            .find(|(key, _)| key.as_str() != two_address.as_str())
            .unwrap();
        assert_ne!(other.1, "{...}");
    }

    #[test]
    fn test_instance_attribute_cycle() {
        let class = Value::class("Node", "__main__", vec![], Bindings::new());
        let node = Value::instance(class, Bindings::new());
        node.set_attribute("next", node.clone());
        node.set_attribute("__dict__", Value::dict([]));

        let mut serializer = ObjectSerializer::default();
        let address = serializer.encode(&node).unwrap();
        let doc = stored(&serializer, &address);
        assert_eq!(doc["value"]["attributes"], json!({ "next": "<...>" }));
    }

    #[test]
    fn test_registered_encoder_replaces_fallback() {
        let mut registry = SerializerRegistry::with_defaults();
        registry.register(TypeKey::Opaque, Rc::new(WordsEncoder)).unwrap();
        let serializer = ObjectSerializer::new(registry);

        let module = Frame::script(&Code::module().build(), &namespace());
        let mut source = ScriptedSource::new();
        source
            .assign(
                &module,
                "p",
                Value::opaque(TypeDescriptor::new("Path", "pathlib"), "PosixPath tmp"),
            )
            .line(&module, 1)
            .ret(&module, Value::none());

        let mut recorder = TraceRecorder::with_serializer(Settings::default(), serializer);
        let trace = recorder.run(&mut source, "p = Path('tmp')", InputQueue::new());
        let step = &trace.steps[0];
        let globals = &step.frame.as_ref().unwrap().globals;
        let doc = trace.resolve(step, &globals["p"]).unwrap();

        assert_eq!(doc["type"], json!({ "name": "Path", "module": "pathlib" }));
        assert_eq!(doc["value"], json!(["PosixPath", "tmp"]));
    }

    #[test]
    fn test_encoder_failure_is_reported_with_encoder_name() {
        let mut registry = SerializerRegistry::with_defaults();
        registry.set_default(Rc::new(RejectingEncoder));
        let serializer = ObjectSerializer::new(registry);

        let module = Frame::script(&Code::module().build(), &namespace());
        let mut source = ScriptedSource::new();
        source
            .line(&module, 1)
            .assign(&module, "e", Value::exception("ValueError", "bad"))
            .line(&module, 2)
            .ret(&module, Value::none());

        let mut recorder = TraceRecorder::with_serializer(Settings::default(), serializer);
        let trace = recorder.run(&mut source, "", InputQueue::new());

        assert_eq!(trace.events(), [StepEvent::StepLine, StepEvent::SystemError]);
        let data = &trace.steps[1].event_data;
        assert_eq!(data["type"], "SerializationError");
        let message = data["message"].as_str().unwrap();
        assert!(message.contains("RejectingEncoder"), "{message}");
        assert!(message.contains("refusing to encode"), "{message}");
    }

    #[test]
    fn test_objects_keep_addresses_across_steps() {
        let module = Frame::script(&Code::module().build(), &namespace());
        let xs = Value::list([]);
        let mut source = ScriptedSource::new();
        let grow = xs.clone();
        source
            .assign(&module, "xs", xs)
            .line(&module, 1)
            .effect(move || {
                grow.push(Value::int(1));
            })
            .line(&module, 2)
            .ret(&module, Value::none());

        let trace = TraceRecorder::default().run(&mut source, "", InputQueue::new());
        let addresses: Vec<&HeapAddress> = trace
            .steps
            .iter()
            .map(|step| &step.frame.as_ref().unwrap().globals["xs"])
            .collect();
        assert!(addresses.windows(2).all(|pair| pair[0] == pair[1]));

        let first = trace.resolve(&trace.steps[0], addresses[0]).unwrap();
        let second = trace.resolve(&trace.steps[1], addresses[1]).unwrap();
        assert_eq!(first["value"], json!([]));
        assert_eq!(second["value"].as_array().unwrap().len(), 1);
    }
}
