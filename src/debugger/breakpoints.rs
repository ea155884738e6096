use std::collections::HashSet;

use crate::runtime::Frame;

/// Decides whether a script call is worth stopping in.
#[derive(Debug, Clone, Default)]
pub struct StopPolicy {
    skipped: HashSet<String>,
}

impl StopPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skipping<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            skipped: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn skip(&mut self, name: impl Into<String>) {
        self.skipped.insert(name.into());
    }

    pub fn is_skipped(&self, name: &str) -> bool {
        self.skipped.contains(name)
    }

    /// The top-level frame is where tracing starts, so its call never stops.
    pub fn should_stop(&self, frame: &Frame) -> bool {
        !frame.is_top_level() && !self.is_skipped(frame.name())
    }
}
