//! Built-in programs the CLI can trace, each a script paired with a replay of its execution.

use clap::ValueEnum;
use script_tracer::error::SourceError;
use script_tracer::runtime::{
    namespace, Code, ExceptionInfo, Frame, ScriptedSource, SyntaxFailure, Traceback, Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DemoName {
    /// A single print at module level
    Hello,
    /// A call packing extra positional and keyword arguments
    Call,
    /// A nested function returned from its defining call
    Closure,
    /// An infinite loop cut off by the step budget
    Loop,
    /// An exception raised in a function and never caught
    Exception,
    /// Reads one line of standard input
    Input,
    /// A script that does not compile
    Syntax,
}

pub struct Demo {
    pub script: &'static str,
    pub source: ScriptedSource,
}

pub fn build(name: DemoName) -> Demo {
    match name {
        DemoName::Hello => hello(),
        DemoName::Call => call(),
        DemoName::Closure => closure(),
        DemoName::Loop => endless_loop(),
        DemoName::Exception => exception(),
        DemoName::Input => input(),
        DemoName::Syntax => Demo {
            script: "print 'Hello'",
            source: ScriptedSource::syntax_error(SyntaxFailure::new("invalid syntax", 1, 13)),
        },
    }
}

fn hello() -> Demo {
    let module = Frame::script(&Code::module().build(), &namespace());
    let mut source = ScriptedSource::new();
    source
        .call(&module)
        .line(&module, 1)
        .print("Hello")
        .ret(&module, Value::none());
    Demo {
        script: "print('Hello')",
        source,
    }
}

fn call() -> Demo {
    let hello = Code::new("hello", 1)
        .with_params(["a", "b"])
        .with_varargs("args")
        .with_varkw("kwargs")
        .build();
    let module = Frame::script(&Code::module().with_nested(&hello).build(), &namespace());
    let frame = Frame::call(
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
        .call(&frame)
        .line(&frame, 2)
        .ret(&frame, Value::int(3))
        .ret(&module, Value::none());
    Demo {
        script: "def hello(a, b, *args, **kwargs):\n    return a + b\nhello(1, 2, *[3, 4, 5, 6], x=1, y=3)",
        source,
    }
}

fn closure() -> Demo {
    let increment = Code::new("increment", 3).build();
    let make_counter = Code::new("make_counter", 1)
        .with_locals(["count", "increment"])
        .with_nested(&increment)
        .build();
    let module = Frame::script(
        &Code::module().with_nested(&make_counter).build(),
        &namespace(),
    );
    let maker = Frame::call(&module, &make_counter, Vec::<(String, Value)>::new());
    let inner = Frame::call(&module, &increment, Vec::<(String, Value)>::new());
    let increment_fn = Value::function("increment", &increment, None);

    let mut source = ScriptedSource::new();
    source
        .call(&module)
        .line(&module, 1)
        .assign(
            &module,
            "make_counter",
            Value::function("make_counter", &make_counter, None),
        )
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
    Demo {
        script: "def make_counter():\n    count = 0\n    def increment():\n        return count + 1\n    return increment\ncounter = make_counter()\ncounter()",
        source,
    }
}

fn endless_loop() -> Demo {
    let module = Frame::script(&Code::module().build(), &namespace());
    let mut source = ScriptedSource::new();
    source
        .call(&module)
        .line(&module, 1)
        .assign(&module, "n", Value::int(0));
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
    Demo {
        script: "n = 0\nwhile True:\n    n += 1",
        source,
    }
}

fn exception() -> Demo {
    let divide = Code::new("divide", 1).with_params(["a", "b"]).build();
    let module = Frame::script(&Code::module().with_nested(&divide).build(), &namespace());
    let frame = Frame::call(
        &module,
        &divide,
        [("a", Value::int(1)), ("b", Value::int(0))],
    );

    let mut source = ScriptedSource::new();
    source
        .call(&module)
        .line(&module, 1)
        .assign(&module, "divide", Value::function("divide", &divide, None))
        .line(&module, 3)
        .call(&frame)
        .line(&frame, 2);
    let raised = ExceptionInfo::new(
        Value::exception("ZeroDivisionError", "division by zero"),
        Traceback::new(vec![(frame.clone(), 2)]),
    );
    let unwound =
        raised.with_traceback(Traceback::new(vec![(module.clone(), 3), (frame.clone(), 2)]));
    source
        .raise(&frame, raised)
        .ret(&frame, Value::none())
        .raise(&module, unwound.clone())
        .ret(&module, Value::none())
        .fail(SourceError::Uncaught(unwound));
    Demo {
        script: "def divide(a, b):\n    return a / b\ndivide(1, 0)",
        source,
    }
}

fn input() -> Demo {
    let module = Frame::script(&Code::module().build(), &namespace());
    let mut source = ScriptedSource::new();
    source
        .call(&module)
        .line(&module, 1)
        .read_input(&module, "name")
        .line(&module, 2)
        .print("Thanks!")
        .ret(&module, Value::none());
    Demo {
        script: "name = input()\nprint('Thanks!')",
        source,
    }
}
