//! Records the execution of a script as a sequence of step snapshots: the
//! visible call stack, locals, globals and a heap of encoded objects at
//! every line, call, return and exception.

pub mod config;
pub mod debugger;
pub mod error;
pub mod recorder;
pub mod runtime;
pub mod script;
pub mod serializer;

pub use config::Settings;
pub use recorder::{Trace, TraceRecorder};
