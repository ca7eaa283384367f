use crate::jit::program::PreparedProgram;
use crate::types::RuntimeError;
use alloc::{sync::Arc, vec::Vec};
use hashbrown::HashMap;

struct CacheEntry {
    program: Arc<PreparedProgram>,
    byte_cost: usize,
    /// Second-chance bit: set on every lookup hit, cleared by one
    /// sweep pass before the entry becomes an eviction candidate.
    hit: bool,
}

/// The budgeted per-function prepared-program cache.
///
/// A pure memoisation layer: its absence (or any eviction) never
/// changes execution semantics, only how often bodies are re-prepared.
/// Eviction is a clock sweep over insertion order.
#[derive(Default)]
pub struct JitCache {
    entries: HashMap<u32, CacheEntry>,
    order: Vec<u32>,
    cursor: usize,
    total_bytes: usize,
}

impl JitCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn contains(&self, function_idx: u32) -> bool {
        self.entries.contains_key(&function_idx)
    }

    /// Looks the function up, marking the entry recently used.
    pub fn get(&mut self, function_idx: u32) -> Option<Arc<PreparedProgram>> {
        let entry = self.entries.get_mut(&function_idx)?;
        entry.hit = true;
        Some(Arc::clone(&entry.program))
    }

    /// Inserts a program, evicting under budget pressure.
    ///
    /// `spill` is consulted once per victim with its opcode blob; a
    /// spill failure aborts the eviction and the insertion, in which
    /// case the program is still returned for direct use, just not
    /// cached.
    pub fn insert(
        &mut self,
        function_idx: u32,
        program: PreparedProgram,
        budget_bytes: u64,
        mut spill: Option<&mut (dyn FnMut(u32, &[u8]) -> Result<(), RuntimeError> + Send)>,
    ) -> Arc<PreparedProgram> {
        let byte_cost = program.byte_cost();
        let program = Arc::new(program);
        if byte_cost as u64 > budget_bytes {
            // never fits; use it uncached
            return program;
        }
        while self.total_bytes + byte_cost > budget_bytes as usize && !self.order.is_empty() {
            match self.pick_victim() {
                Some(victim) => {
                    if let Some(spill) = spill.as_deref_mut() {
                        let entry = &self.entries[&victim];
                        if spill(victim, entry.program.export_blob()).is_err() {
                            log::debug!("jit spill hook failed, leaving fn {function_idx} uncached");
                            return program;
                        }
                    }
                    self.remove(victim);
                }
                None => return program,
            }
        }
        self.total_bytes += byte_cost;
        self.order.push(function_idx);
        self.entries.insert(
            function_idx,
            CacheEntry {
                program: Arc::clone(&program),
                byte_cost,
                hit: false,
            },
        );
        program
    }

    /// The clock sweep: entries hit since the last pass get one more
    /// round, the first cold entry loses.
    fn pick_victim(&mut self) -> Option<u32> {
        if self.order.is_empty() {
            return None;
        }
        // two full passes guarantee a victim even if everything was hot
        for _ in 0..self.order.len() * 2 {
            if self.cursor >= self.order.len() {
                self.cursor = 0;
            }
            let candidate = self.order[self.cursor];
            let entry = self.entries.get_mut(&candidate)?;
            if entry.hit {
                entry.hit = false;
                self.cursor += 1;
            } else {
                return Some(candidate);
            }
        }
        Some(self.order[0])
    }

    pub fn remove(&mut self, function_idx: u32) -> Option<Arc<PreparedProgram>> {
        let entry = self.entries.remove(&function_idx)?;
        self.total_bytes -= entry.byte_cost;
        if let Some(pos) = self.order.iter().position(|&f| f == function_idx) {
            self.order.remove(pos);
            if pos < self.cursor {
                self.cursor -= 1;
            }
        }
        Some(entry.program)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.cursor = 0;
        self.total_bytes = 0;
    }
}
