use tracing::{debug, trace};

use super::breakpoints::StopPolicy;
use super::event::DebuggerEvent;
use super::stepping::DebuggerState;
use crate::runtime::{Bindings, ExceptionInfo, FrameRef, Value};
use crate::script::ScriptLines;

/// Call-depth filter turning raw hook notifications into script-level events.
///
/// Calls into code that does not belong to the script, and everything they
/// call in turn, are collapsed. Class bodies are collapsed the same way.
#[derive(Debug, Default)]
pub struct ManagedDebugger {
    pub(super) state: DebuggerState,
    pub(super) last_was_exception: bool,
    policy: StopPolicy,
    lines: ScriptLines,
}

impl ManagedDebugger {
    pub fn new(policy: StopPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn state(&self) -> DebuggerState {
        self.state
    }

    pub fn last_was_exception(&self) -> bool {
        self.last_was_exception
    }

    pub fn policy(&self) -> &StopPolicy {
        &self.policy
    }

    /// Forgets everything from a previous run.
    pub fn reset(&mut self, script: &str) {
        self.state = DebuggerState::Running;
        self.last_was_exception = false;
        self.lines = ScriptLines::new(script);
    }

    pub fn finish(&mut self) {
        self.state = DebuggerState::Finished;
    }

    pub fn on_call(&mut self, frame: &FrameRef) -> Option<DebuggerEvent> {
        if self.state.is_finished() {
            return None;
        }
        if !frame.is_script() || frame.line() <= 0 || !self.state.is_running() {
            self.state = self.state.descend();
            trace!(
                name = frame.name(),
                depth = self.state.suppressed_depth(),
                "suppressing call"
            );
            return None;
        }
        if !self.policy.should_stop(frame) {
            return None;
        }
        if self.lines.declares_class(frame.code().first_line) {
            debug!(name = frame.name(), "suppressing class body");
            self.state = DebuggerState::Suppressing(1);
            return None;
        }
        Some(DebuggerEvent::EnterBlock {
            frame: FrameRef::clone(frame),
            arguments: bound_arguments(frame),
        })
    }

    pub fn on_line(&mut self, frame: &FrameRef) -> Option<DebuggerEvent> {
        if !self.state.is_running() {
            return None;
        }
        self.last_was_exception = false;
        Some(DebuggerEvent::StepLine {
            frame: FrameRef::clone(frame),
        })
    }

    pub fn on_return(&mut self, frame: &FrameRef, value: &Value) -> Option<DebuggerEvent> {
        match self.state {
            DebuggerState::Finished => None,
            DebuggerState::Suppressing(_) => {
                self.state = self.state.ascend();
                if self.state.is_running() {
                    debug!(name = frame.name(), "leaving suppressed calls");
                }
                None
            }
            DebuggerState::Running if frame.is_script() => Some(DebuggerEvent::ExitBlock {
                frame: FrameRef::clone(frame),
                return_value: value.clone(),
            }),
            DebuggerState::Running => None,
        }
    }

    pub fn on_exception(
        &mut self,
        frame: &FrameRef,
        exception: &ExceptionInfo,
    ) -> Option<DebuggerEvent> {
        if !self.state.is_running() {
            return None;
        }
        self.last_was_exception = true;
        Some(DebuggerEvent::Exception {
            frame: FrameRef::clone(frame),
            exception: exception.clone(),
        })
    }
}

/// Declared parameters bound in `frame`, in declaration order.
fn bound_arguments(frame: &FrameRef) -> Bindings {
    frame
        .code()
        .parameters()
        .filter_map(|name| frame.local(name).map(|value| (name.to_string(), value)))
        .collect()
}
