mod breakpoints;
mod context;
mod event;
mod session;
mod stepping;

pub use breakpoints::StopPolicy;
pub use context::ManagedDebugger;
pub use event::{DebuggerEvent, ExecutionEvent};
pub use session::{Control, EventHandler, RunOutcome};
pub use stepping::DebuggerState;
