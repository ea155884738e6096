use std::mem;

use serde_json::{json, Map};
use tracing::{debug, trace, warn};

use super::closures::ClosureAttribution;
use super::stack::{FrameIdentities, ResolvedStack};
use super::trace::{EncodedBindings, FrameSnapshot, StackEntry, StepEvent, StepSnapshot, Trace};
use crate::config::Settings;
use crate::debugger::{
    Control, DebuggerEvent, EventHandler, ExecutionEvent, ManagedDebugger, RunOutcome, StopPolicy,
};
use crate::error::TraceError;
use crate::runtime::{Bindings, ExecutionSource, FrameRef, InputQueue, Traceback, MODULE_SCOPE};
use crate::script::ScriptLines;
use crate::serializer::{Document, ObjectSerializer};

/// Records a script run as a list of step snapshots.
///
/// One recorder owns its serializer and heap; every call to [`TraceRecorder::run`]
/// starts from a clean slate, so a recorder can be reused for many runs.
#[derive(Debug)]
pub struct TraceRecorder {
    settings: Settings,
    serializer: ObjectSerializer,
    identities: FrameIdentities,
    closures: ClosureAttribution,
    steps: Vec<StepSnapshot>,
    last_line: i32,
    last_outcome: Option<RunOutcome>,
}

impl Default for TraceRecorder {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl TraceRecorder {
    pub fn new(settings: Settings) -> Self {
        Self::with_serializer(settings, ObjectSerializer::default())
    }

    /// A recorder using a custom serializer, e.g. one with extra encoders registered.
    pub fn with_serializer(settings: Settings, serializer: ObjectSerializer) -> Self {
        Self {
            settings,
            serializer,
            identities: FrameIdentities::default(),
            closures: ClosureAttribution::default(),
            steps: Vec::new(),
            last_line: 0,
            last_outcome: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// How the most recent run ended.
    pub fn last_outcome(&self) -> Option<RunOutcome> {
        self.last_outcome
    }

    pub fn run<S>(&mut self, source: &mut S, script: &str, inputs: InputQueue) -> Trace
    where
        S: ExecutionSource + ?Sized,
    {
        self.steps.clear();
        self.identities.clear();
        self.closures.clear();
        self.serializer.clear();
        self.last_line = 0;

        let policy = StopPolicy::skipping(self.settings.skip_functions.iter().cloned());
        let mut debugger = ManagedDebugger::new(policy);
        let outcome = debugger.run(source, script, inputs, self);
        self.last_outcome = Some(outcome);

        if self.settings.dedupe_trailing_return {
            self.drop_return_after_exception();
        }
        debug!(?outcome, steps = self.steps.len(), "trace recorded");

        Trace {
            script_lines: ScriptLines::new(script).as_slice().to_vec(),
            refs: self.serializer.heap().constants().clone(),
            steps: mem::take(&mut self.steps),
        }
    }

    fn record(&mut self, event: &DebuggerEvent, output: &str) -> Result<Control, TraceError> {
        self.serializer.reset();

        let step = match event.frame() {
            Some(frame) => match self.framed_step(event, frame, output)? {
                Some(step) => step,
                None => return Ok(Control::Continue),
            },
            None => self.frameless_step(event, output),
        };
        trace!(event = %event.kind(), line = step.line_number, "recorded step");
        self.steps.push(step);

        // Frameless steps end the run and are always the last entry.
        if event.frame().is_some() && self.steps.len() >= self.settings.max_steps {
            warn!(max_steps = self.settings.max_steps, "step budget exhausted");
            self.steps.push(StepSnapshot {
                event: StepEvent::Overflow,
                event_data: json!({ "maxSteps": self.settings.max_steps }),
                output: output.to_string(),
                line_number: self.last_line,
                frame: None,
            });
            return Ok(Control::Halt);
        }
        Ok(Control::Continue)
    }

    fn framed_step(
        &mut self,
        event: &DebuggerEvent,
        frame: &FrameRef,
        output: &str,
    ) -> Result<Option<StepSnapshot>, TraceError> {
        let traceback = match event {
            DebuggerEvent::Exception { exception, .. } => Some(exception.traceback()),
            _ => None,
        };
        let stack = ResolvedStack::resolve(frame, traceback);
        if event.kind() == ExecutionEvent::EnterBlock {
            self.identities.assign(frame);
        }
        self.closures.scan(&stack, &self.identities, &self.settings);

        if !frame.is_top_level() && self.identities.get(frame).is_none() {
            debug!(name = frame.name(), event = %event.kind(), "dropping step in unentered frame");
            return Ok(None);
        }

        let event_data = self.encode_event_data(event)?;
        let mut entries = Vec::new();
        for caller in stack.callers().filter(|caller| !caller.is_top_level()) {
            let Some(uid) = self.identities.get(caller) else {
                continue;
            };
            entries.push(StackEntry {
                name: self.settings.scope_name(caller.name()).to_string(),
                locals: self.encode_locals(caller)?,
                uid,
            });
        }
        let globals = self.encode_bindings(&frame.globals())?;

        let line_number = stack.current_line();
        self.last_line = line_number;
        Ok(Some(StepSnapshot {
            event: event.kind().into(),
            event_data,
            output: output.to_string(),
            line_number,
            frame: Some(FrameSnapshot {
                name: self.settings.scope_name(frame.name()).to_string(),
                stack: entries,
                heap: self.serializer.heap().variables().clone(),
                globals,
            }),
        }))
    }

    fn frameless_step(&mut self, event: &DebuggerEvent, output: &str) -> StepSnapshot {
        let (event_data, line_number) = match event {
            DebuggerEvent::SyntaxError { error } => (
                json!({
                    "message": error.message,
                    "lineNumber": error.line,
                    "offset": error.offset,
                }),
                error.line,
            ),
            DebuggerEvent::SystemError { type_name, message } => (
                json!({ "type": type_name, "message": message }),
                self.last_line,
            ),
            _ => (json!({}), self.last_line),
        };
        StepSnapshot {
            event: event.kind().into(),
            event_data,
            output: output.to_string(),
            line_number,
            frame: None,
        }
    }

    fn encode_event_data(&mut self, event: &DebuggerEvent) -> Result<Document, TraceError> {
        let data = match event {
            DebuggerEvent::EnterBlock { arguments, .. } => {
                let mut encoded = Map::new();
                for (name, value) in arguments {
                    encoded.insert(name.clone(), self.serializer.encode(value)?.into());
                }
                json!({ "arguments": encoded })
            }
            DebuggerEvent::ExitBlock { return_value, .. } => {
                json!({ "returnValue": self.serializer.encode(return_value)? })
            }
            DebuggerEvent::Exception { exception, .. } => json!({
                "type": exception.type_name(),
                "value": self.serializer.encode(exception.value())?,
                "traceback": self.encode_traceback(exception.traceback()),
            }),
            _ => json!({}),
        };
        Ok(data)
    }

    fn encode_traceback(&self, traceback: &Traceback) -> Document {
        traceback
            .entries()
            .iter()
            .map(|(frame, line)| {
                json!({
                    "name": self.settings.scope_name(frame.name()),
                    "lineNumber": line,
                })
            })
            .collect()
    }

    /// Parameters in declaration order, then every other local by name.
    fn encode_locals(&mut self, frame: &FrameRef) -> Result<EncodedBindings, TraceError> {
        let locals = frame.locals();
        let mut ordered: Vec<&String> = frame
            .code()
            .parameters()
            .filter_map(|param| locals.get_key_value(param).map(|(name, _)| name))
            .collect();
        let mut rest: Vec<&String> = locals
            .keys()
            .filter(|name| !ordered.contains(name))
            .collect();
        rest.sort();
        ordered.extend(rest);

        let mut encoded = EncodedBindings::new();
        for name in ordered {
            if self.settings.is_ignored(name) {
                continue;
            }
            encoded.insert(name.clone(), self.serializer.encode(&locals[name])?);
        }
        Ok(encoded)
    }

    fn encode_bindings(&mut self, bindings: &Bindings) -> Result<EncodedBindings, TraceError> {
        let mut encoded = EncodedBindings::new();
        for (name, value) in bindings {
            if self.settings.is_ignored(name) {
                continue;
            }
            encoded.insert(name.clone(), self.serializer.encode(value)?);
        }
        Ok(encoded)
    }

    /// Removes the module exit recorded right after an exception that ended the run.
    fn drop_return_after_exception(&mut self) {
        let [.., before, last] = self.steps.as_slice() else {
            return;
        };
        let module_exit = last.event == StepEvent::ExitBlock && last.name() == Some(MODULE_SCOPE);
        if before.event == StepEvent::Exception && module_exit {
            debug!("dropping module exit after exception");
            self.steps.pop();
        }
    }
}

impl EventHandler for TraceRecorder {
    fn handle(&mut self, event: &DebuggerEvent, output: &str) -> Result<Control, TraceError> {
        self.record(event, output)
    }
}
