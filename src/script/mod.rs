mod lines;

pub use lines::{is_class_definition, ScriptLines};
