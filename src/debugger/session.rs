use tracing::{debug, error, warn};

use super::context::ManagedDebugger;
use super::event::DebuggerEvent;
use crate::error::{SourceError, TraceError};
use crate::runtime::{ExecutionSource, InputQueue, Notification};

/// What the debugger should do after an event was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    /// Stop the run right away.
    Halt,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The script ran to its end.
    Completed,
    /// An uncaught exception ended the script after being reported.
    Raised,
    /// A handler asked for the run to stop.
    Halted,
    SyntaxError,
    SystemError,
}

/// Receives every event the debugger emits, with the output captured so far.
pub trait EventHandler {
    fn handle(&mut self, event: &DebuggerEvent, output: &str) -> Result<Control, TraceError>;
}

impl<F> EventHandler for F
where
    F: FnMut(&DebuggerEvent, &str) -> Result<Control, TraceError>,
{
    fn handle(&mut self, event: &DebuggerEvent, output: &str) -> Result<Control, TraceError> {
        self(event, output)
    }
}

impl ManagedDebugger {
    /// Runs `script` on `source`, feeding translated events to `handler`.
    ///
    /// The source is halted and the debugger finished on every exit path.
    pub fn run<S, H>(
        &mut self,
        source: &mut S,
        script: &str,
        inputs: InputQueue,
        handler: &mut H,
    ) -> RunOutcome
    where
        S: ExecutionSource + ?Sized,
        H: EventHandler + ?Sized,
    {
        self.reset(script);
        let outcome = self.drive(source, script, &inputs, handler);
        source.halt();
        self.finish();
        debug!(?outcome, "run finished");
        outcome
    }

    fn drive<S, H>(
        &mut self,
        source: &mut S,
        script: &str,
        inputs: &InputQueue,
        handler: &mut H,
    ) -> RunOutcome
    where
        S: ExecutionSource + ?Sized,
        H: EventHandler + ?Sized,
    {
        match source.start(script, inputs.clone()) {
            Ok(()) => {}
            Err(SourceError::Syntax(failure)) => {
                let event = DebuggerEvent::SyntaxError { error: failure };
                if let Err(err) = handler.handle(&event, source.output()) {
                    error!(%err, script, ?inputs, "failed to record syntax error");
                }
                return RunOutcome::SyntaxError;
            }
            Err(err) => {
                return self.system_error(err.into(), source.output(), script, inputs, handler)
            }
        }

        loop {
            let notification = match source.next_notification() {
                Ok(Some(notification)) => notification,
                Ok(None) => return RunOutcome::Completed,
                Err(SourceError::Uncaught(info)) if self.last_was_exception => {
                    debug!(exception = info.type_name(), "script ended by reported exception");
                    return RunOutcome::Raised;
                }
                Err(err) => {
                    return self.system_error(err.into(), source.output(), script, inputs, handler)
                }
            };

            let Some(event) = self.translate(&notification) else {
                continue;
            };
            match handler.handle(&event, source.output()) {
                Ok(Control::Continue) => {}
                Ok(Control::Halt) => {
                    warn!(event = %event.kind(), "handler halted the run");
                    return RunOutcome::Halted;
                }
                Err(err) => {
                    return self.system_error(err, source.output(), script, inputs, handler)
                }
            }
        }
    }

    fn translate(&mut self, notification: &Notification) -> Option<DebuggerEvent> {
        match notification {
            Notification::Call { frame } => self.on_call(frame),
            Notification::Line { frame } => self.on_line(frame),
            Notification::Return { frame, value } => self.on_return(frame, value),
            Notification::Exception { frame, exception } => self.on_exception(frame, exception),
        }
    }

    fn system_error<H>(
        &mut self,
        err: TraceError,
        output: &str,
        script: &str,
        inputs: &InputQueue,
        handler: &mut H,
    ) -> RunOutcome
    where
        H: EventHandler + ?Sized,
    {
        error!(%err, script, ?inputs, "trace run failed");
        self.finish();
        let event = DebuggerEvent::SystemError {
            type_name: err.type_name().to_string(),
            message: err.message(),
        };
        if let Err(err) = handler.handle(&event, output) {
            error!(%err, "failed to record system error");
        }
        RunOutcome::SystemError
    }
}
