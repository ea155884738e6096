use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// File name scripts are compiled under. Frames whose code carries it belong to the user.
pub const SCRIPT_FILENAME: &str = "<string>";

/// Scope name of top-level script code.
pub const MODULE_SCOPE: &str = "<module>";

static NEXT_CODE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodeId(u64);

/// A compiled body: what a function value points at and what a frame executes.
#[derive(Debug)]
pub struct Code {
    id: CodeId,
    pub name: String,
    pub filename: String,
    pub first_line: i32,
    /// Positional parameter names in declaration order.
    pub params: Vec<String>,
    pub varargs: Option<String>,
    pub varkw: Option<String>,
    /// All local names, parameters first.
    pub varnames: Vec<String>,
    /// Code objects of functions, lambdas and classes defined in this body.
    pub nested: Vec<Rc<Code>>,
}

impl Code {
    pub fn new(name: impl Into<String>, first_line: i32) -> Self {
        Self {
            id: CodeId(NEXT_CODE_ID.fetch_add(1, Ordering::Relaxed)),
            name: name.into(),
            filename: SCRIPT_FILENAME.to_string(),
            first_line,
            params: Vec::new(),
            varargs: None,
            varkw: None,
            varnames: Vec::new(),
            nested: Vec::new(),
        }
    }

    /// Top-level script body.
    pub fn module() -> Self {
        Self::new(MODULE_SCOPE, 1)
    }

    pub fn with_params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.params = params.into_iter().map(Into::into).collect();
        self.sync_varnames();
        self
    }

    pub fn with_varargs(mut self, name: impl Into<String>) -> Self {
        self.varargs = Some(name.into());
        self.sync_varnames();
        self
    }

    pub fn with_varkw(mut self, name: impl Into<String>) -> Self {
        self.varkw = Some(name.into());
        self.sync_varnames();
        self
    }

    /// Adds non-parameter local names after the parameters.
    pub fn with_locals<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            if !self.varnames.contains(&name) {
                self.varnames.push(name);
            }
        }
        self
    }

    pub fn with_nested(mut self, code: &Rc<Code>) -> Self {
        self.nested.push(Rc::clone(code));
        self
    }

    pub fn in_file(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    pub fn build(self) -> Rc<Code> {
        Rc::new(self)
    }

    pub fn id(&self) -> CodeId {
        self.id
    }

    pub fn is_script(&self) -> bool {
        self.filename == SCRIPT_FILENAME
    }

    pub fn is_module(&self) -> bool {
        self.name == MODULE_SCOPE
    }

    /// Declared parameters: positional, then `*args`, then `**kwargs`.
    pub fn parameters(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .map(String::as_str)
            .chain(self.varargs.as_deref())
            .chain(self.varkw.as_deref())
    }

    /// True when `code` is one of this body's nested constants.
    pub fn contains(&self, code: &Code) -> bool {
        self.nested.iter().any(|nested| nested.id == code.id)
    }

    fn sync_varnames(&mut self) {
        let extra: Vec<String> = self
            .varnames
            .iter()
            .filter(|name| !self.parameters().any(|p| p == name.as_str()))
            .cloned()
            .collect();
        let mut varnames: Vec<String> = self.parameters().map(str::to_string).collect();
        varnames.extend(extra);
        self.varnames = varnames;
    }
}
