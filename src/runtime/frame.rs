use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use super::code::Code;
use super::value::{Bindings, Value};

static NEXT_FRAME_ID: AtomicU64 = AtomicU64::new(1);

/// Per-process identity of an activation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(u64);

/// Global bindings shared by every frame of one script.
pub type Namespace = Rc<RefCell<Bindings>>;

pub type FrameRef = Rc<Frame>;

pub fn namespace() -> Namespace {
    Rc::new(RefCell::new(IndexMap::new()))
}

/// One activation record: a code body, its line cursor, and its bindings.
pub struct Frame {
    id: FrameId,
    code: Rc<Code>,
    line: Cell<i32>,
    parent: Option<FrameRef>,
    locals: RefCell<Bindings>,
    globals: Namespace,
}

impl Frame {
    pub fn new(code: &Rc<Code>, parent: Option<&FrameRef>, globals: &Namespace) -> FrameRef {
        Rc::new(Self {
            id: FrameId(NEXT_FRAME_ID.fetch_add(1, Ordering::Relaxed)),
            code: Rc::clone(code),
            line: Cell::new(code.first_line),
            parent: parent.cloned(),
            locals: RefCell::new(IndexMap::new()),
            globals: Rc::clone(globals),
        })
    }

    /// The top-level frame of a script. Its locals are its globals.
    pub fn script(code: &Rc<Code>, globals: &Namespace) -> FrameRef {
        Self::new(code, None, globals)
    }

    /// A frame for calling `code` from `parent`, with `bound` already bound as locals.
    pub fn call<I, S>(parent: &FrameRef, code: &Rc<Code>, bound: I) -> FrameRef
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        let frame = Self::new(code, Some(parent), &parent.globals);
        {
            let mut locals = frame.locals.borrow_mut();
            for (name, value) in bound {
                locals.insert(name.into(), value);
            }
        }
        frame
    }

    pub fn id(&self) -> FrameId {
        self.id
    }

    pub fn code(&self) -> &Rc<Code> {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.code.name
    }

    pub fn line(&self) -> i32 {
        self.line.get()
    }

    pub fn set_line(&self, line: i32) {
        self.line.set(line);
    }

    pub fn parent(&self) -> Option<&FrameRef> {
        self.parent.as_ref()
    }

    /// True for the bottom frame of the traced script.
    pub fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_module(&self) -> bool {
        self.code.is_module()
    }

    pub fn is_script(&self) -> bool {
        self.code.is_script()
    }

    /// Snapshot of local bindings. Module-level frames see their globals.
    pub fn locals(&self) -> Bindings {
        if self.is_top_level() {
            return self.globals.borrow().clone();
        }
        self.locals.borrow().clone()
    }

    pub fn local(&self, name: &str) -> Option<Value> {
        if self.is_top_level() {
            return self.globals.borrow().get(name).cloned();
        }
        self.locals.borrow().get(name).cloned()
    }

    pub fn globals(&self) -> Bindings {
        self.globals.borrow().clone()
    }

    pub fn namespace(&self) -> &Namespace {
        &self.globals
    }

    pub fn set_local(&self, name: impl Into<String>, value: Value) {
        if self.is_top_level() {
            self.globals.borrow_mut().insert(name.into(), value);
        } else {
            self.locals.borrow_mut().insert(name.into(), value);
        }
    }

    pub fn set_global(&self, name: impl Into<String>, value: Value) {
        self.globals.borrow_mut().insert(name.into(), value);
    }

    pub fn remove_local(&self, name: &str) -> Option<Value> {
        if self.is_top_level() {
            return self.globals.borrow_mut().shift_remove(name);
        }
        self.locals.borrow_mut().shift_remove(name)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("id", &self.id)
            .field("name", &self.code.name)
            .field("line", &self.line.get())
            .finish()
    }
}

/// Frames an exception unwound through, outermost first, with the line each was at.
#[derive(Debug, Clone, Default)]
pub struct Traceback {
    entries: Vec<(FrameRef, i32)>,
}

impl Traceback {
    pub fn new(entries: Vec<(FrameRef, i32)>) -> Self {
        Self { entries }
    }

    /// Traceback of an exception raised at the current line of `frame`.
    pub fn at(frame: &FrameRef) -> Self {
        Self::new(vec![(Rc::clone(frame), frame.line())])
    }

    /// Extends the traceback as the exception propagates into a caller.
    pub fn unwound_into(&self, caller: &FrameRef) -> Self {
        let mut entries = vec![(Rc::clone(caller), caller.line())];
        entries.extend(self.entries.iter().cloned());
        Self { entries }
    }

    pub fn entries(&self) -> &[(FrameRef, i32)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
