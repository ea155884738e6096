//! Turns debugger events into the step-by-step trace document.

mod closures;
mod runner;
mod stack;
mod trace;

pub use closures::ClosureAttribution;
pub use runner::TraceRecorder;
pub use stack::{FrameIdentities, ResolvedStack};
pub use trace::{EncodedBindings, FrameSnapshot, StackEntry, StepEvent, StepSnapshot, Trace};
