use std::fmt;

use serde::{Deserialize, Serialize};

use crate::runtime::{Bindings, ExceptionInfo, FrameRef, SyntaxFailure, Value};

/// The semantic event kinds the debugger reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionEvent {
    StepLine,
    EnterBlock,
    ExitBlock,
    Exception,
    SyntaxError,
    SystemError,
}

impl fmt::Display for ExecutionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One translated event with its payload.
#[derive(Debug, Clone)]
pub enum DebuggerEvent {
    StepLine {
        frame: FrameRef,
    },
    EnterBlock {
        frame: FrameRef,
        arguments: Bindings,
    },
    ExitBlock {
        frame: FrameRef,
        return_value: Value,
    },
    Exception {
        frame: FrameRef,
        exception: ExceptionInfo,
    },
    SyntaxError {
        error: SyntaxFailure,
    },
    SystemError {
        type_name: String,
        message: String,
    },
}

impl DebuggerEvent {
    pub fn kind(&self) -> ExecutionEvent {
        match self {
            Self::StepLine { .. } => ExecutionEvent::StepLine,
            Self::EnterBlock { .. } => ExecutionEvent::EnterBlock,
            Self::ExitBlock { .. } => ExecutionEvent::ExitBlock,
            Self::Exception { .. } => ExecutionEvent::Exception,
            Self::SyntaxError { .. } => ExecutionEvent::SyntaxError,
            Self::SystemError { .. } => ExecutionEvent::SystemError,
        }
    }

    /// The frame the event happened in. Terminal errors have none.
    pub fn frame(&self) -> Option<&FrameRef> {
        match self {
            Self::StepLine { frame }
            | Self::EnterBlock { frame, .. }
            | Self::ExitBlock { frame, .. }
            | Self::Exception { frame, .. } => Some(frame),
            Self::SyntaxError { .. } | Self::SystemError { .. } => None,
        }
    }
}
