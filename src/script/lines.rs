use once_cell::sync::Lazy;
use regex::Regex;

static CLASS_DEF: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*class\s+").unwrap());

/// True when `line` opens a class body.
pub fn is_class_definition(line: &str) -> bool {
    CLASS_DEF.is_match(line)
}

/// The traced script split into lines, addressed 1-based the way frames report them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptLines {
    lines: Vec<String>,
}

impl ScriptLines {
    pub fn new(script: &str) -> Self {
        Self {
            lines: script.lines().map(str::to_string).collect(),
        }
    }

    /// Line `number` (1-based). Line markers at or below zero have no text.
    pub fn get(&self, number: i32) -> Option<&str> {
        let index = usize::try_from(number).ok()?.checked_sub(1)?;
        self.lines.get(index).map(String::as_str)
    }

    /// True when line `number` declares a class.
    pub fn declares_class(&self, number: i32) -> bool {
        self.get(number).is_some_and(is_class_definition)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.lines
    }
}
