use std::fmt;
use std::rc::Rc;

use tracing::debug;

use super::frame::FrameRef;
use super::source::{ExceptionInfo, ExecutionSource, InputQueue, Notification, SyntaxFailure};
use super::value::Value;
use crate::error::SourceError;

const INPUT_ERROR: &str = "StandardInputReadError";
const INPUT_ERROR_MESSAGE: &str = "Unable to read from Standard Input Stream";

enum Instruction {
    Call(FrameRef),
    Line(FrameRef, i32),
    Return(FrameRef, Value),
    Raise(FrameRef, ExceptionInfo),
    Effect(Box<dyn FnMut()>),
    Print(String),
    ReadInput(FrameRef, String),
    Jump(usize),
    Fail(SourceError),
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Call(frame) => write!(f, "Call({})", frame.name()),
            Self::Line(frame, line) => write!(f, "Line({}, {line})", frame.name()),
            Self::Return(frame, value) => write!(f, "Return({}, {})", frame.name(), value.repr()),
            Self::Raise(frame, exc) => write!(f, "Raise({}, {})", frame.name(), exc.type_name()),
            Self::Effect(_) => f.write_str("Effect"),
            Self::Print(text) => write!(f, "Print({text:?})"),
            Self::ReadInput(frame, target) => write!(f, "ReadInput({}, {target})", frame.name()),
            Self::Jump(target) => write!(f, "Jump({target})"),
            Self::Fail(err) => write!(f, "Fail({err})"),
        }
    }
}

/// An execution source that replays a programmed run.
///
/// The program is a flat instruction list. Hook instructions (`call`, `line`,
/// `ret`, `raise`) each yield one notification; the others run silently
/// between hook points, mutating bindings, printing, or reading input.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    program: Vec<Instruction>,
    syntax_error: Option<SyntaxFailure>,
    pc: usize,
    pending: Option<SourceError>,
    output: String,
    inputs: InputQueue,
    halted: bool,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// A source whose script fails to compile.
    pub fn syntax_error(failure: SyntaxFailure) -> Self {
        Self {
            syntax_error: Some(failure),
            ..Self::default()
        }
    }

    pub fn call(&mut self, frame: &FrameRef) -> &mut Self {
        self.push(Instruction::Call(Rc::clone(frame)))
    }

    /// Moves `frame` to `line` and notifies.
    pub fn line(&mut self, frame: &FrameRef, line: i32) -> &mut Self {
        self.push(Instruction::Line(Rc::clone(frame), line))
    }

    pub fn ret(&mut self, frame: &FrameRef, value: Value) -> &mut Self {
        self.push(Instruction::Return(Rc::clone(frame), value))
    }

    pub fn raise(&mut self, frame: &FrameRef, exception: ExceptionInfo) -> &mut Self {
        self.push(Instruction::Raise(Rc::clone(frame), exception))
    }

    /// Binds `name` in `frame`'s locals (its globals at top level).
    pub fn assign(&mut self, frame: &FrameRef, name: &str, value: Value) -> &mut Self {
        let frame = Rc::clone(frame);
        let name = name.to_string();
        self.effect(move || frame.set_local(name.clone(), value.clone()))
    }

    pub fn assign_global(&mut self, frame: &FrameRef, name: &str, value: Value) -> &mut Self {
        let frame = Rc::clone(frame);
        let name = name.to_string();
        self.effect(move || frame.set_global(name.clone(), value.clone()))
    }

    /// Appends a line to the captured output.
    pub fn print(&mut self, text: &str) -> &mut Self {
        self.push(Instruction::Print(format!("{text}\n")))
    }

    /// Pops the next queued input and binds it as a string in `frame`.
    pub fn read_input(&mut self, frame: &FrameRef, target: &str) -> &mut Self {
        self.push(Instruction::ReadInput(Rc::clone(frame), target.to_string()))
    }

    pub fn effect(&mut self, effect: impl FnMut() + 'static) -> &mut Self {
        self.push(Instruction::Effect(Box::new(effect)))
    }

    /// Position of the next instruction, for use as a jump target.
    pub fn mark(&self) -> usize {
        self.program.len()
    }

    pub fn jump(&mut self, target: usize) -> &mut Self {
        self.push(Instruction::Jump(target))
    }

    /// Ends the run with `error` when reached.
    pub fn fail(&mut self, error: SourceError) -> &mut Self {
        self.push(Instruction::Fail(error))
    }

    fn push(&mut self, instruction: Instruction) -> &mut Self {
        self.program.push(instruction);
        self
    }

    /// Binds the next input line, or raises the input error in `frame`.
    fn read_line(&mut self, frame: &FrameRef, target: &str) -> Option<Notification> {
        if let Some(line) = self.inputs.pop_front() {
            frame.set_local(target, Value::str(line));
            return None;
        }
        let exception = ExceptionInfo::raised_in(frame, INPUT_ERROR, INPUT_ERROR_MESSAGE);
        self.pending = Some(SourceError::Uncaught(exception.clone()));
        Some(Notification::Exception {
            frame: Rc::clone(frame),
            exception,
        })
    }
}

impl ExecutionSource for ScriptedSource {
    fn start(&mut self, script: &str, inputs: InputQueue) -> Result<(), SourceError> {
        self.pc = 0;
        self.pending = None;
        self.output.clear();
        self.inputs = inputs;
        self.halted = false;
        if let Some(failure) = &self.syntax_error {
            return Err(SourceError::Syntax(failure.clone()));
        }
        debug!(
            lines = script.lines().count(),
            instructions = self.program.len(),
            "starting scripted run"
        );
        Ok(())
    }

    fn next_notification(&mut self) -> Result<Option<Notification>, SourceError> {
        if let Some(err) = self.pending.take() {
            self.halted = true;
            return Err(err);
        }
        let mut executed = 0;
        while !self.halted && self.pc < self.program.len() {
            executed += 1;
            if executed > self.program.len() {
                return Err(SourceError::Internal(format!(
                    "program loops without reaching a hook point at instruction {}",
                    self.pc
                )));
            }

            let pc = self.pc;
            self.pc += 1;
            let notification = match &mut self.program[pc] {
                Instruction::Call(frame) => Notification::Call {
                    frame: Rc::clone(frame),
                },
                Instruction::Line(frame, line) => {
                    frame.set_line(*line);
                    Notification::Line {
                        frame: Rc::clone(frame),
                    }
                }
                Instruction::Return(frame, value) => Notification::Return {
                    frame: Rc::clone(frame),
                    value: value.clone(),
                },
                Instruction::Raise(frame, exception) => Notification::Exception {
                    frame: Rc::clone(frame),
                    exception: exception.clone(),
                },
                Instruction::Effect(effect) => {
                    effect();
                    continue;
                }
                Instruction::Print(text) => {
                    self.output.push_str(text);
                    continue;
                }
                Instruction::ReadInput(frame, target) => {
                    let (frame, target) = (Rc::clone(frame), target.clone());
                    match self.read_line(&frame, &target) {
                        Some(raised) => raised,
                        None => continue,
                    }
                }
                Instruction::Jump(target) => {
                    self.pc = *target;
                    continue;
                }
                Instruction::Fail(err) => return Err(err.clone()),
            };
            return Ok(Some(notification));
        }
        Ok(None)
    }

    fn output(&self) -> &str {
        &self.output
    }

    fn halt(&mut self) {
        self.halted = true;
    }
}
