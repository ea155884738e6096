use serde_json::json;

use script_tracer::config::Settings;
use script_tracer::debugger::RunOutcome;
use script_tracer::recorder::{StepEvent, StepSnapshot, Trace, TraceRecorder};
use script_tracer::runtime::{
    input_queue, namespace, Code, ExceptionInfo, Frame, FrameRef, InputQueue, ScriptedSource,
    SyntaxFailure, Traceback, Value,
};
use script_tracer::serializer::{Document, HeapAddress, ObjectSerializer, SerializerRegistry};

fn module_frame() -> FrameRef {
    Frame::script(&Code::module().build(), &namespace())
}

fn address(doc: &Document) -> HeapAddress {
    serde_json::from_value(doc.clone()).expect("heap address")
}

// The stored document behind a binding, looked up through the step heap and refs.
fn lookup<'a>(trace: &'a Trace, step: &'a StepSnapshot, doc: &Document) -> &'a Document {
    let address = address(doc);
    trace
        .resolve(step, &address)
        .unwrap_or_else(|| panic!("{address} is not in the step heap or refs"))
}

#[cfg(test)]
mod recorder_tests {
    use super::*;

    #[test]
    fn test_hello_world_document() {
        let module = module_frame();
        let mut source = ScriptedSource::new();
        source
            .call(&module)
            .line(&module, 1)
            .print("Hello")
            .ret(&module, Value::none());

        let trace = TraceRecorder::default().run(&mut source, "print('Hello')", InputQueue::new());
        let encoded = serde_json::to_value(&trace).unwrap();

        assert_eq!(encoded["scriptLines"], json!(["print('Hello')"]));
        assert_eq!(
            encoded["steps"][0],
            json!({
                "event": "StepLine",
                "eventData": {},
                "output": "",
                "lineNumber": 1,
                "name": "<module>",
                "stack": [],
                "heap": {},
                "globals": {},
            })
        );
        assert_eq!(encoded["steps"][1]["event"], "ExitBlock");
        assert_eq!(encoded["steps"][1]["output"], "Hello\n");
        assert_eq!(trace.steps.len(), 2);

        let none = lookup(&trace, &trace.steps[1], &trace.steps[1].event_data["returnValue"]);
        assert_eq!(none["value"], "None");
    }

    #[test]
    fn test_enter_block_arguments_and_stack() {
        let hello = Code::new("hello", 1)
            .with_params(["a", "b"])
            .with_varargs("args")
            .with_varkw("kwargs")
            .build();
        let module = Frame::script(&Code::module().with_nested(&hello).build(), &namespace());
        let call = Frame::call(
            &module,
            &hello,
            [
                ("a", Value::int(1)),
                ("b", Value::int(2)),
                ("args", Value::tuple((3..=6).map(Value::int))),
                (
                    "kwargs",
                    Value::dict([
                        (Value::str("x"), Value::int(1)),
                        (Value::str("y"), Value::int(3)),
                    ]),
                ),
            ],
        );
        let mut source = ScriptedSource::new();
        source
            .call(&module)
            .line(&module, 1)
            .assign(&module, "hello", Value::function("hello", &hello, None))
            .line(&module, 3)
            .call(&call)
            .line(&call, 2)
            .ret(&call, Value::int(3))
            .ret(&module, Value::none());

        let script = "def hello(a, b, *args, **kwargs):\n    return a + b\nhello(1, 2, *[3, 4, 5, 6], x=1, y=3)";
        let trace = TraceRecorder::default().run(&mut source, script, InputQueue::new());
        assert_eq!(
            trace.events(),
            [
                StepEvent::StepLine,
                StepEvent::StepLine,
                StepEvent::EnterBlock,
                StepEvent::StepLine,
                StepEvent::ExitBlock,
                StepEvent::ExitBlock,
            ]
        );

        let enter = &trace.steps[2];
        assert_eq!(enter.name(), Some("hello"));
        assert_eq!(enter.line_number, 1);
        let arguments = enter.event_data["arguments"].as_object().unwrap();
        let names: Vec<&String> = arguments.keys().collect();
        assert_eq!(names, ["a", "b", "args", "kwargs"]);
        assert_eq!(lookup(&trace, enter, &arguments["args"])["value"].as_array().unwrap().len(), 4);
        let kwargs = lookup(&trace, enter, &arguments["kwargs"]);
        assert_eq!(kwargs["name"], "dict");
        assert_eq!(kwargs["value"].as_object().unwrap().len(), 2);

        let stack = enter.stack();
        assert_eq!(stack.len(), 1);
        assert_eq!(stack[0].name, "hello");
        assert_eq!(stack[0].uid, 1);
        let locals: Vec<&str> = stack[0].locals.keys().map(String::as_str).collect();
        assert_eq!(locals, ["a", "b", "args", "kwargs"]);
        // Globals are the module bindings even inside the call.
        assert!(enter.frame.as_ref().unwrap().globals.contains_key("hello"));

        let exit = &trace.steps[4];
        assert_eq!(lookup(&trace, exit, &exit.event_data["returnValue"])["value"], "3");
    }

    #[test]
    fn test_closure_parent_is_recorded() {
        let increment = Code::new("increment", 3).build();
        let make_counter = Code::new("make_counter", 1)
            .with_locals(["count", "increment"])
            .with_nested(&increment)
            .build();
        let module = Frame::script(&Code::module().with_nested(&make_counter).build(), &namespace());
        let maker = Frame::call(&module, &make_counter, Vec::<(String, Value)>::new());
        let inner = Frame::call(&module, &increment, Vec::<(String, Value)>::new());
        let increment_fn = Value::function("increment", &increment, None);

        let mut source = ScriptedSource::new();
        source
            .call(&module)
            .line(&module, 1)
            .assign(&module, "make_counter", Value::function("make_counter", &make_counter, None))
            .line(&module, 6)
            .call(&maker)
            .line(&maker, 2)
            .assign(&maker, "count", Value::int(0))
            .line(&maker, 3)
            .assign(&maker, "increment", increment_fn.clone())
            .line(&maker, 5)
            .ret(&maker, increment_fn.clone())
            .assign(&module, "counter", increment_fn)
            .line(&module, 7)
            .call(&inner)
            .line(&inner, 4)
            .ret(&inner, Value::int(1))
            .ret(&module, Value::none());

        let trace = TraceRecorder::default().run(&mut source, "", InputQueue::new());
        let last = trace.steps.last().unwrap();
        let globals = &last.frame.as_ref().unwrap().globals;

        let counter = trace.resolve(last, &globals["counter"]).unwrap();
        assert_eq!(counter["name"], "increment");
        assert_eq!(counter["value"]["parent"], json!({ "name": "make_counter", "uid": 1 }));
        let maker_fn = trace.resolve(last, &globals["make_counter"]).unwrap();
        assert!(maker_fn["value"]["parent"].is_null());

        let inside = trace
            .steps
            .iter()
            .find(|step| step.event == StepEvent::StepLine && step.name() == Some("increment"))
            .unwrap();
        assert_eq!(inside.stack()[0].uid, 2);
        assert_eq!(inside.line_number, 4);
    }

    #[test]
    fn test_infinite_loop_overflows() {
        let module = module_frame();
        let mut source = ScriptedSource::new();
        source.call(&module).line(&module, 1).assign(&module, "n", Value::int(0));
        let top = source.mark();
        let counter = module.clone();
        let mut n = 0;
        source
            .line(&module, 2)
            .line(&module, 3)
            .effect(move || {
                n += 1;
                counter.set_local("n", Value::int(n));
            })
            .jump(top);

        let mut recorder = TraceRecorder::new(Settings {
            max_steps: 10,
            ..Settings::default()
        });
        let trace = recorder.run(&mut source, "n = 0\nwhile True:\n    n += 1", InputQueue::new());

        assert_eq!(trace.steps.len(), 11);
        assert_eq!(trace.steps[10].event, StepEvent::Overflow);
        assert_eq!(trace.steps[10].event_data, json!({ "maxSteps": 10 }));
        assert!(trace.steps[..10].iter().all(|step| step.event == StepEvent::StepLine));
        assert_eq!(recorder.last_outcome(), Some(RunOutcome::Halted));
    }

    #[test]
    fn test_uncaught_exception_trace() {
        let divide = Code::new("divide", 1).with_params(["a", "b"]).build();
        let module = Frame::script(&Code::module().with_nested(&divide).build(), &namespace());
        let frame = Frame::call(&module, &divide, [("a", Value::int(1)), ("b", Value::int(0))]);
        let raised = ExceptionInfo::new(
            Value::exception("ZeroDivisionError", "division by zero"),
            Traceback::new(vec![(frame.clone(), 2)]),
        );
        let unwound =
            raised.with_traceback(Traceback::new(vec![(module.clone(), 3), (frame.clone(), 2)]));

        let mut source = ScriptedSource::new();
        source
            .call(&module)
            .line(&module, 1)
            .assign(&module, "divide", Value::function("divide", &divide, None))
            .line(&module, 3)
            .call(&frame)
            .line(&frame, 2)
            .raise(&frame, raised)
            .ret(&frame, Value::none())
            .raise(&module, unwound.clone())
            .ret(&module, Value::none())
            .fail(script_tracer::error::SourceError::Uncaught(unwound));

        let mut recorder = TraceRecorder::default();
        let trace = recorder.run(&mut source, "", InputQueue::new());
        assert_eq!(recorder.last_outcome(), Some(RunOutcome::Raised));
        assert_eq!(
            trace.events(),
            [
                StepEvent::StepLine,
                StepEvent::StepLine,
                StepEvent::EnterBlock,
                StepEvent::StepLine,
                StepEvent::Exception,
                StepEvent::ExitBlock,
                StepEvent::Exception,
                StepEvent::ExitBlock,
            ]
        );

        let at_module = &trace.steps[6];
        assert_eq!(at_module.name(), Some("<module>"));
        assert_eq!(at_module.line_number, 3);
        assert!(at_module.stack().is_empty());
        assert_eq!(at_module.event_data["type"], "ZeroDivisionError");
        assert_eq!(
            at_module.event_data["traceback"],
            json!([
                { "name": "<module>", "lineNumber": 3 },
                { "name": "divide", "lineNumber": 2 },
            ])
        );
        let value = lookup(&trace, at_module, &at_module.event_data["value"]);
        assert_eq!(
            value["value"],
            json!({ "type": "ZeroDivisionError", "message": "division by zero" })
        );
    }

    #[test]
    fn test_inputs_are_consumed_in_order() {
        let module = module_frame();
        let program = || {
            let mut source = ScriptedSource::new();
            source
                .line(&module, 1)
                .read_input(&module, "first")
                .read_input(&module, "second")
                .line(&module, 2)
                .ret(&module, Value::none());
            source
        };
        let mut recorder = TraceRecorder::default();

        let mut source = program();
        let trace = recorder.run(&mut source, "", input_queue("alice 'bob smith'").unwrap());
        let last = trace.steps.last().unwrap();
        let globals = &last.frame.as_ref().unwrap().globals;
        assert_eq!(trace.resolve(last, &globals["first"]).unwrap()["value"], "'alice'");
        assert_eq!(trace.resolve(last, &globals["second"]).unwrap()["value"], "'bob smith'");

        let mut source = program();
        let trace = recorder.run(&mut source, "", input_queue("alice").unwrap());
        assert_eq!(trace.events(), [StepEvent::StepLine, StepEvent::Exception]);
        assert_eq!(trace.steps[1].event_data["type"], "StandardInputReadError");
        assert_eq!(recorder.last_outcome(), Some(RunOutcome::Raised));
    }

    #[test]
    fn test_syntax_error_is_a_single_frameless_step() {
        let mut source = ScriptedSource::syntax_error(SyntaxFailure::new("invalid syntax", 2, 7));
        let trace = TraceRecorder::default().run(&mut source, "x = 1\nprint 'x'", InputQueue::new());

        assert_eq!(trace.steps.len(), 1);
        assert_eq!(
            serde_json::to_value(&trace.steps[0]).unwrap(),
            json!({
                "event": "SyntaxError",
                "eventData": { "message": "invalid syntax", "lineNumber": 2, "offset": 7 },
                "output": "",
                "lineNumber": 2,
            })
        );
        assert_eq!(trace.script_lines, ["x = 1", "print 'x'"]);
    }

    #[test]
    fn test_missing_encoder_becomes_system_error() {
        let module = module_frame();
        let mut source = ScriptedSource::new();
        source
            .line(&module, 1)
            .assign(&module, "x", Value::int(1))
            .line(&module, 2)
            .ret(&module, Value::none());

        let serializer = ObjectSerializer::new(SerializerRegistry::new());
        let mut recorder = TraceRecorder::with_serializer(Settings::default(), serializer);
        let trace = recorder.run(&mut source, "x = 1\nx", InputQueue::new());

        assert_eq!(trace.events(), [StepEvent::StepLine, StepEvent::SystemError]);
        assert_eq!(trace.steps[1].event_data["type"], "NoSerializerFoundError");
        assert_eq!(trace.steps[1].line_number, 1);
        assert_eq!(recorder.last_outcome(), Some(RunOutcome::SystemError));
    }

    #[test]
    fn test_steps_in_skipped_calls_are_dropped() {
        let helper = Code::new("helper", 1).build();
        let module = Frame::script(&Code::module().with_nested(&helper).build(), &namespace());
        let call = Frame::call(&module, &helper, Vec::<(String, Value)>::new());
        let mut source = ScriptedSource::new();
        source
            .line(&module, 3)
            .call(&call)
            .line(&call, 2)
            .ret(&call, Value::none())
            .line(&module, 4)
            .ret(&module, Value::none());

        let mut recorder = TraceRecorder::new(Settings {
            skip_functions: vec!["helper".into()],
            ..Settings::default()
        });
        let trace = recorder.run(&mut source, "", InputQueue::new());

        assert_eq!(
            trace.events(),
            [StepEvent::StepLine, StepEvent::StepLine, StepEvent::ExitBlock]
        );
        assert!(trace.steps.iter().all(|step| step.name() == Some("<module>")));
    }

    #[test]
    fn test_ignored_names_and_unnamed_frames() {
        let anonymous = Code::new("", 1).with_params(["x"]).build();
        let module = Frame::script(&Code::module().with_nested(&anonymous).build(), &namespace());
        module.set_local("__name__", Value::str("__main__"));
        module.set_local("shown", Value::int(1));
        let call = Frame::call(&module, &anonymous, [("x", Value::int(5))]);

        let mut source = ScriptedSource::new();
        source
            .line(&module, 1)
            .call(&call)
            .line(&call, 1)
            .ret(&call, Value::none())
            .ret(&module, Value::none());

        let trace = TraceRecorder::default().run(&mut source, "", InputQueue::new());
        let inside = &trace.steps[2];
        assert_eq!(inside.name(), Some("<<Unnamed Function>>"));
        assert_eq!(inside.stack()[0].name, "<<Unnamed Function>>");

        let globals = &inside.frame.as_ref().unwrap().globals;
        let names: Vec<&str> = globals.keys().map(String::as_str).collect();
        assert_eq!(names, ["shown"]);
    }

    #[test]
    fn test_constants_are_emitted_once_as_refs() {
        let module = module_frame();
        let mut source = ScriptedSource::new();
        source
            .assign(&module, "n", Value::int(7))
            .assign(&module, "xs", Value::list([]))
            .line(&module, 1)
            .line(&module, 2)
            .ret(&module, Value::none());

        let trace = TraceRecorder::default().run(&mut source, "", InputQueue::new());
        let step = &trace.steps[0];
        let globals = &step.frame.as_ref().unwrap().globals;

        assert!(trace.refs.contains_key(&globals["n"]));
        assert!(!trace.refs.contains_key(&globals["xs"]));
        for step in &trace.steps[..2] {
            let frame = step.frame.as_ref().unwrap();
            assert!(frame.heap.contains_key(&globals["xs"]));
            assert!(!frame.heap.contains_key(&globals["n"]));
        }
    }

    #[test]
    fn test_reentered_frame_keeps_its_identity() {
        let gen = Code::new("gen", 1).build();
        let module = Frame::script(&Code::module().with_nested(&gen).build(), &namespace());
        let resumed = Frame::call(&module, &gen, Vec::<(String, Value)>::new());
        let mut source = ScriptedSource::new();
        source
            .call(&module)
            .line(&module, 1)
            .call(&resumed)
            .line(&resumed, 2)
            .ret(&resumed, Value::int(1))
            .line(&module, 4)
            .call(&resumed)
            .line(&resumed, 3)
            .ret(&resumed, Value::int(2))
            .ret(&module, Value::none());

        let script = "def gen():\n    yield 1\n    yield 2\nfor x in gen(): pass";
        let trace = TraceRecorder::default().run(&mut source, script, InputQueue::new());
        let uids: Vec<u64> = trace
            .steps
            .iter()
            .filter(|step| step.name() == Some("gen"))
            .map(|step| step.stack()[0].uid)
            .collect();
        assert_eq!(uids, [1; 6]);
    }
}
