use std::collections::VecDeque;
use std::fmt;

use super::frame::{FrameRef, Traceback};
use super::value::{ObjectKind, Value};
use crate::error::SourceError;

/// Lines fed to the script's standard input, front first.
pub type InputQueue = VecDeque<String>;

/// Splits a shell-style argument string into an input queue.
pub fn input_queue(raw: &str) -> Option<InputQueue> {
    shlex::split(raw).map(VecDeque::from)
}

/// A raised exception as seen by the tracer.
#[derive(Debug, Clone)]
pub struct ExceptionInfo {
    type_name: String,
    value: Value,
    traceback: Traceback,
}

impl ExceptionInfo {
    pub fn new(value: Value, traceback: Traceback) -> Self {
        let type_name = value.type_descriptor().name;
        Self {
            type_name,
            value,
            traceback,
        }
    }

    /// Exception raised at the current line of `frame`.
    pub fn raised_in(frame: &FrameRef, type_name: &str, message: &str) -> Self {
        Self::new(Value::exception(type_name, message), Traceback::at(frame))
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn message(&self) -> &str {
        match self.value.kind() {
            ObjectKind::Exception(exc) => &exc.message,
            _ => "",
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn traceback(&self) -> &Traceback {
        &self.traceback
    }

    pub fn with_traceback(&self, traceback: Traceback) -> Self {
        Self {
            traceback,
            ..self.clone()
        }
    }
}

/// A compile failure reported before the script starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxFailure {
    pub message: String,
    pub line: i32,
    pub offset: i32,
}

impl SyntaxFailure {
    pub fn new(message: impl Into<String>, line: i32, offset: i32) -> Self {
        Self {
            message: message.into(),
            line,
            offset,
        }
    }
}

impl fmt::Display for SyntaxFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (line {}, offset {})", self.message, self.line, self.offset)
    }
}

/// One low-level hook notification from the running script.
#[derive(Debug, Clone)]
pub enum Notification {
    Call { frame: FrameRef },
    Line { frame: FrameRef },
    Return { frame: FrameRef, value: Value },
    Exception { frame: FrameRef, exception: ExceptionInfo },
}

impl Notification {
    pub fn frame(&self) -> &FrameRef {
        match self {
            Self::Call { frame }
            | Self::Line { frame }
            | Self::Return { frame, .. }
            | Self::Exception { frame, .. } => frame,
        }
    }
}

/// The interpreter hook the debugger pulls notifications from.
///
/// `start` compiles and prepares the script. Each `next_notification` call
/// runs the script up to its next hook point. `Ok(None)` means the script
/// finished normally.
pub trait ExecutionSource {
    fn start(&mut self, script: &str, inputs: InputQueue) -> Result<(), SourceError>;

    fn next_notification(&mut self) -> Result<Option<Notification>, SourceError>;

    /// Everything the script printed so far.
    fn output(&self) -> &str;

    /// Stops the script. No notifications follow.
    fn halt(&mut self);
}
