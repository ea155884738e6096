use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::Document;
use crate::runtime::{ObjectId, Value};

/// Synthetic address standing in for an object for the rest of the run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeapAddress(String);

impl HeapAddress {
    fn from_seed(seed: u64) -> Self {
        Self(format!("{seed:#x}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HeapAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<HeapAddress> for Document {
    fn from(address: HeapAddress) -> Self {
        Document::String(address.0)
    }
}

pub type HeapPool = IndexMap<HeapAddress, Document>;

/// Two-tier store of encoded objects.
///
/// Constants accumulate for the whole run. Variables hold only what the
/// current step touched and are wiped by [`Heap::reset`].
#[derive(Debug)]
pub struct Heap {
    consts: HeapPool,
    variables: HeapPool,
    id_mappings: HashMap<ObjectId, HeapAddress>,
    seed: u64,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap {
    pub fn new() -> Self {
        Self {
            consts: IndexMap::new(),
            variables: IndexMap::new(),
            id_mappings: HashMap::new(),
            seed: 1,
        }
    }

    /// Forgets every address. Called between runs.
    pub fn clear(&mut self) {
        self.consts.clear();
        self.variables.clear();
        self.id_mappings.clear();
        self.seed = 1;
    }

    /// Drops this step's variables. Addresses stay reserved.
    pub fn reset(&mut self) {
        self.variables.clear();
    }

    /// Stores `encoded` as the body of `actual` and returns its address.
    ///
    /// An object already stored keeps its first body until the variables
    /// are reset, after which it is stored again under the same address.
    pub fn store(&mut self, encoded: Document, actual: &Value) -> HeapAddress {
        let address = match self.id_mappings.get(&actual.id()) {
            Some(address) => {
                if self.contains(address) {
                    return address.clone();
                }
                address.clone()
            }
            None => {
                let address = HeapAddress::from_seed(self.seed);
                self.seed += 1;
                trace!(%address, value = %actual.repr(), "minted heap address");
                self.id_mappings.insert(actual.id(), address.clone());
                address
            }
        };

        if actual.is_constant() {
            self.consts.insert(address.clone(), encoded);
        } else {
            self.variables.insert(address.clone(), encoded);
        }
        address
    }

    pub fn get(&self, address: &HeapAddress) -> Option<&Document> {
        self.consts
            .get(address)
            .or_else(|| self.variables.get(address))
    }

    pub fn contains(&self, address: &HeapAddress) -> bool {
        self.consts.contains_key(address) || self.variables.contains_key(address)
    }

    /// Address previously minted for `value`, if any.
    pub fn address_of(&self, value: &Value) -> Option<&HeapAddress> {
        self.id_mappings.get(&value.id())
    }

    pub fn variables(&self) -> &HeapPool {
        &self.variables
    }

    pub fn constants(&self) -> &HeapPool {
        &self.consts
    }

    pub fn len(&self) -> usize {
        self.consts.len() + self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
