use indexmap::IndexMap;
use log::debug;
use std::rc::Rc;

use crate::constants::DEFAULT_MAX_CACHE;
use crate::script::Program;

/// A compiled template: the parsed routine plus its formal parameter list.
#[derive(Debug)]
pub struct Routine {
    program: Program,
}

impl Routine {
    pub fn new(program: Program) -> Self {
        Self { program }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Number of positional arguments the routine was compiled to accept.
    pub fn arity(&self) -> usize {
        self.program.params.len()
    }
}

/// How a full cache picks the entry to drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eviction {
    /// Drop the earliest-inserted entry; lookups never refresh position.
    Fifo,
}

/// Bounded template → routine cache with [`Eviction::Fifo`] eviction.
///
/// Reads never refresh an entry's position: once full, each insertion evicts
/// the entry that was inserted earliest, however recently it was used.
#[derive(Debug)]
pub struct RoutineCache {
    entries: IndexMap<String, Rc<Routine>>,
    max_size: usize,
}

impl RoutineCache {
    pub fn new(max_size: usize) -> Self {
        Self { entries: IndexMap::new(), max_size: max_size.max(1) }
    }

    pub fn get(&self, template: &str) -> Option<Rc<Routine>> {
        self.entries.get(template).cloned()
    }

    pub fn contains(&self, template: &str) -> bool {
        self.entries.contains_key(template)
    }

    /// Inserts a routine, evicting the oldest entry first when full.
    /// Re-inserting an existing key replaces it in place.
    pub fn insert(&mut self, template: String, routine: Rc<Routine>) {
        if !self.entries.contains_key(&template) && self.entries.len() >= self.max_size {
            if let Some((evicted, _)) = self.entries.shift_remove_index(0) {
                debug!("Evicting cached routine for template of {} bytes", evicted.len());
            }
        }
        self.entries.insert(template, routine);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn policy(&self) -> Eviction {
        Eviction::Fifo
    }
}

impl Default for RoutineCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CACHE)
    }
}
