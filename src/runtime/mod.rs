//! The live program model the tracer observes: values, compiled bodies,
//! frames, and the execution sources that report on them.

mod code;
pub mod frame;
mod scripted;
mod source;
mod value;

pub use code::{Code, CodeId, MODULE_SCOPE, SCRIPT_FILENAME};
pub use frame::{namespace, Frame, FrameId, FrameRef, Namespace, Traceback};
pub use scripted::ScriptedSource;
pub use source::{
    input_queue, ExceptionInfo, ExecutionSource, InputQueue, Notification, SyntaxFailure,
};
pub use value::{
    Bindings, BuiltinObject, ClassObject, Elements, FunctionObject, InstanceObject, MethodObject,
    ModuleObject, ObjectId, ObjectKind, ParentLink, TypeDescriptor, TypeKey, TypeObject, Value,
};
