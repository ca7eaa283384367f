use crate::runtime::Runtime;
use crate::types::RuntimeError;
use alloc::{boxed::Box, vec::Vec};

/// Persists a prepared program's opcode blob before its cache entry is
/// evicted. A failure aborts the eviction.
pub type JitSpillHook = Box<dyn FnMut(u32, &[u8]) -> Result<(), RuntimeError> + Send>;

/// Recalls a previously spilled opcode blob; `Ok(None)` means the host
/// has nothing for this function and the admission proceeds as a cache
/// miss.
pub type JitLoadHook = Box<dyn FnMut(u32) -> Result<Option<Vec<u8>>, RuntimeError> + Send>;

/// Persists a memory's page bytes as the buffer is released. A failure
/// aborts the spill and the memory stays resident.
pub type MemorySpillHook = Box<dyn FnMut(u32, &[u8]) -> Result<(), RuntimeError> + Send>;

/// Produces a fresh buffer for a spilled memory; it must be exactly as
/// long as the second argument or the load fails with `unsupported`.
pub type MemoryLoadHook = Box<dyn FnMut(u32, u64) -> Result<Vec<u8>, RuntimeError> + Send>;

/// Fires when a function whose trap flag is set is about to execute.
///
/// The hook gets the runtime handle because the canonical use is to
/// drive [`Runtime::jit_load_program`] and clear the flag; returning
/// an error propagates as the trap.
pub type FunctionTrapHook =
    Box<dyn FnMut(&mut Runtime, u32) -> Result<(), RuntimeError> + Send>;

/// The spill/load hook set, all optional. Hooks are synchronous and
/// must not touch the value stack; they interact with the runtime only
/// through the documented accessors.
#[derive(Default)]
pub struct SpillHooks {
    pub jit_spill: Option<JitSpillHook>,
    pub jit_load: Option<JitLoadHook>,
    pub memory_spill: Option<MemorySpillHook>,
    pub memory_load: Option<MemoryLoadHook>,
}

impl core::fmt::Debug for SpillHooks {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SpillHooks")
            .field("jit_spill", &self.jit_spill.is_some())
            .field("jit_load", &self.jit_load.is_some())
            .field("memory_spill", &self.memory_spill.is_some())
            .field("memory_load", &self.memory_load.is_some())
            .finish()
    }
}
