use std::collections::HashMap;
use std::rc::Rc;

use tracing::trace;

use crate::runtime::{FrameId, FrameRef, Traceback};

/// The live call chain at one event, outermost frame first.
#[derive(Debug, Clone)]
pub struct ResolvedStack {
    entries: Vec<(FrameRef, i32)>,
    current: usize,
}

impl ResolvedStack {
    /// Walks from `frame` to the top-level frame, then extends the chain with
    /// the frames `traceback` unwound through below `frame`.
    pub fn resolve(frame: &FrameRef, traceback: Option<&Traceback>) -> Self {
        let mut entries = Vec::new();
        let mut cursor = Some(Rc::clone(frame));
        while let Some(frame) = cursor {
            cursor = frame.parent().cloned();
            let line = frame.line();
            entries.push((frame, line));
        }
        entries.reverse();
        let current = entries.len().saturating_sub(1);

        if let Some(traceback) = traceback {
            let mut unwound = traceback.entries();
            if unwound
                .first()
                .is_some_and(|(first, _)| first.id() == frame.id())
            {
                unwound = &unwound[1..];
            }
            entries.extend(unwound.iter().cloned());
        }
        Self { entries, current }
    }

    pub fn entries(&self) -> &[(FrameRef, i32)] {
        &self.entries
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_frame(&self) -> &FrameRef {
        &self.entries[self.current].0
    }

    pub fn current_line(&self) -> i32 {
        self.entries[self.current].1
    }

    /// True when the event happened in the top-level script frame.
    pub fn at_module_scope(&self) -> bool {
        self.current == 0
    }

    /// Frames from the current one back to the top level, innermost first.
    pub fn callers(&self) -> impl Iterator<Item = &FrameRef> {
        self.entries[..=self.current]
            .iter()
            .rev()
            .map(|(frame, _)| frame)
    }
}

/// Numbers frames in the order they were entered. Numbers are never reused.
#[derive(Debug)]
pub struct FrameIdentities {
    assigned: HashMap<FrameId, u64>,
    next: u64,
}

impl Default for FrameIdentities {
    fn default() -> Self {
        Self {
            assigned: HashMap::new(),
            next: 1,
        }
    }
}

impl FrameIdentities {
    /// The frame's identity, minting the next one the first time it is entered.
    pub fn assign(&mut self, frame: &FrameRef) -> u64 {
        if let Some(uid) = self.get(frame) {
            return uid;
        }
        let uid = self.next;
        self.next += 1;
        self.assigned.insert(frame.id(), uid);
        trace!(name = frame.name(), uid, "assigned frame identity");
        uid
    }

    pub fn get(&self, frame: &FrameRef) -> Option<u64> {
        self.assigned.get(&frame.id()).copied()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }
}
