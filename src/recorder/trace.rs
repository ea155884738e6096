use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::debugger::ExecutionEvent;
use crate::serializer::{Document, HeapAddress, HeapPool};

/// Event name of a recorded step. `Overflow` marks a run cut off by the step budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepEvent {
    StepLine,
    EnterBlock,
    ExitBlock,
    Exception,
    SyntaxError,
    SystemError,
    Overflow,
}

impl From<ExecutionEvent> for StepEvent {
    fn from(event: ExecutionEvent) -> Self {
        match event {
            ExecutionEvent::StepLine => Self::StepLine,
            ExecutionEvent::EnterBlock => Self::EnterBlock,
            ExecutionEvent::ExitBlock => Self::ExitBlock,
            ExecutionEvent::Exception => Self::Exception,
            ExecutionEvent::SyntaxError => Self::SyntaxError,
            ExecutionEvent::SystemError => Self::SystemError,
        }
    }
}

/// Name → address bindings as rendered in a step.
pub type EncodedBindings = IndexMap<String, HeapAddress>;

/// One visible call frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackEntry {
    pub name: String,
    pub locals: EncodedBindings,
    pub uid: u64,
}

/// The frame-dependent part of a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSnapshot {
    /// Scope name of the frame the event happened in.
    pub name: String,
    /// Visible call frames, innermost first.
    pub stack: Vec<StackEntry>,
    /// Mutable objects touched by this step.
    pub heap: HeapPool,
    pub globals: EncodedBindings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepSnapshot {
    pub event: StepEvent,
    pub event_data: Document,
    pub output: String,
    pub line_number: i32,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub frame: Option<FrameSnapshot>,
}

impl StepSnapshot {
    /// Scope name of the step's frame, if it has one.
    pub fn name(&self) -> Option<&str> {
        self.frame.as_ref().map(|frame| frame.name.as_str())
    }

    pub fn stack(&self) -> &[StackEntry] {
        self.frame.as_ref().map_or(&[], |frame| frame.stack.as_slice())
    }
}

/// A finished recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trace {
    pub script_lines: Vec<String>,
    /// Constants referenced by address from any step.
    pub refs: HeapPool,
    pub steps: Vec<StepSnapshot>,
}

impl Trace {
    pub fn events(&self) -> Vec<StepEvent> {
        self.steps.iter().map(|step| step.event).collect()
    }

    /// Looks an address up in the step's heap, then in the constants.
    pub fn resolve<'a>(
        &'a self,
        step: &'a StepSnapshot,
        address: &HeapAddress,
    ) -> Option<&'a Document> {
        step.frame
            .as_ref()
            .and_then(|frame| frame.heap.get(address))
            .or_else(|| self.refs.get(address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_frameless_step_has_no_frame_fields() {
        let step = StepSnapshot {
            event: StepEvent::Overflow,
            event_data: json!({ "maxSteps": 3 }),
            output: String::new(),
            line_number: 4,
            frame: None,
        };
        assert_eq!(
            serde_json::to_value(&step).unwrap(),
            json!({
                "event": "Overflow",
                "eventData": { "maxSteps": 3 },
                "output": "",
                "lineNumber": 4,
            })
        );
    }

    #[test]
    fn test_framed_step_layout() {
        let step = StepSnapshot {
            event: StepEvent::StepLine,
            event_data: json!({}),
            output: "Hello\n".into(),
            line_number: 1,
            frame: Some(FrameSnapshot {
                name: "<module>".into(),
                stack: vec![],
                heap: HeapPool::new(),
                globals: EncodedBindings::new(),
            }),
        };
        let encoded = serde_json::to_value(&step).unwrap();
        let keys: Vec<&String> = encoded.as_object().unwrap().keys().collect();
        assert_eq!(
            keys,
            ["event", "eventData", "output", "lineNumber", "name", "stack", "heap", "globals"]
        );
    }
}
