use std::collections::{HashMap, HashSet};

use tracing::trace;

use super::stack::{FrameIdentities, ResolvedStack};
use crate::config::Settings;
use crate::runtime::{Bindings, FrameId, ObjectId, ObjectKind, ParentLink, Value};

/// Tracks which call frame lexically defined each nested function.
#[derive(Debug, Default)]
pub struct ClosureAttribution {
    global_funcs: HashSet<ObjectId>,
    parents: HashMap<ObjectId, FrameId>,
}

impl ClosureAttribution {
    pub fn clear(&mut self) {
        self.global_funcs.clear();
        self.parents.clear();
    }

    pub fn is_global(&self, func: &Value) -> bool {
        self.global_funcs.contains(&func.id())
    }

    pub fn parent_of(&self, func: &Value) -> Option<FrameId> {
        self.parents.get(&func.id()).copied()
    }

    /// Scans the bindings visible at the current frame of `stack`.
    ///
    /// At module scope every top-level function is global. Inside a call,
    /// each function reachable from the locals is matched to the visible
    /// frame whose body declares it.
    pub fn scan(&mut self, stack: &ResolvedStack, identities: &FrameIdentities, settings: &Settings) {
        let frame = stack.current_frame();
        if stack.at_module_scope() {
            self.record_globals(&frame.globals(), settings);
            return;
        }

        for func in reachable_functions(&frame.locals(), settings) {
            if self.parents.contains_key(&func.id()) || self.global_funcs.contains(&func.id()) {
                continue;
            }
            let Some(function) = func.as_function() else {
                continue;
            };
            let Some(owner) = stack
                .callers()
                .find(|caller| caller.code().contains(&function.code))
            else {
                continue;
            };
            let Some(uid) = identities.get(owner) else {
                trace!(function = %function.name, parent = owner.name(), "defining frame not entered");
                continue;
            };
            trace!(function = %function.name, parent = owner.name(), uid, "attributed closure");
            self.parents.insert(func.id(), owner.id());
            function.set_parent(ParentLink {
                name: owner.name().to_string(),
                uid,
            });
        }
    }

    fn record_globals(&mut self, globals: &Bindings, settings: &Settings) {
        for (name, value) in globals {
            if settings.is_ignored(name) {
                continue;
            }
            if matches!(value.kind(), ObjectKind::Function(_) | ObjectKind::Method(_))
                && !self.parents.contains_key(&value.id())
            {
                self.global_funcs.insert(value.id());
            }
        }
    }
}

/// Plain functions reachable from `bindings` through collections, dicts,
/// class and instance attributes, and bound methods.
fn reachable_functions(bindings: &Bindings, settings: &Settings) -> Vec<Value> {
    let mut found = Vec::new();
    let mut visited = HashSet::new();
    for (name, value) in bindings {
        if !settings.is_ignored(name) {
            collect_functions(value, &mut visited, &mut found);
        }
    }
    found
}

fn collect_functions(value: &Value, visited: &mut HashSet<ObjectId>, found: &mut Vec<Value>) {
    if !visited.insert(value.id()) {
        return;
    }
    match value.kind() {
        ObjectKind::Function(_) => found.push(value.clone()),
        ObjectKind::Method(method) => collect_functions(&method.function, visited, found),
        ObjectKind::Dict(_) => {
            for (key, item) in value.entries().unwrap_or_default() {
                collect_functions(&key, visited, found);
                collect_functions(&item, visited, found);
            }
        }
        ObjectKind::Class(_) | ObjectKind::Instance(_) => {
            let attributes: Vec<Value> = value
                .attributes()
                .map(|attrs| attrs.values().cloned().collect())
                .unwrap_or_default();
            for attr in &attributes {
                collect_functions(attr, visited, found);
            }
        }
        _ => {
            let items: Vec<Value> = value
                .elements()
                .map(|items| items.to_vec())
                .unwrap_or_default();
            for item in &items {
                collect_functions(item, visited, found);
            }
        }
    }
}
