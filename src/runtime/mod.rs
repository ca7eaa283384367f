mod hooks;
mod host;

pub use hooks::{
    FunctionTrapHook, JitLoadHook, JitSpillHook, MemoryLoadHook, MemorySpillHook, SpillHooks,
};
pub use host::{HostCall, HostFunction, HostFunctionPtr, SymbolResolver};

use crate::config::RuntimeConfig;
use crate::jit::{JitCache, JitContext, JitStats, JitTier, PreparedProgram};
use crate::loader::{DataMode, ElementMode, GlobalOrigin, Module};
use crate::types::{ImportName, Pages, RuntimeError, TrapCode, Value};
use crate::vm::{executor, InstructionStream, Job, RuntimeMemory, RuntimeTable};
use alloc::{boxed::Box, sync::Arc, vec::Vec};
use bitvec::vec::BitVec;
use bytes::BytesMut;
use hashbrown::HashMap;

type FnvMap<K, V> = HashMap<K, V, fnv::FnvBuildHasher>;

/// One global variable slot.
#[derive(Debug, Copy, Clone)]
pub struct GlobalSlot {
    pub value: Value,
    pub mutable: bool,
    pub imported: bool,
}

struct PendingMemory {
    bytes: BytesMut,
    allow_grow: bool,
}

struct PendingTable {
    elements: Vec<Value>,
    allow_grow: bool,
}

/// The execution runtime: one module attachment, its instantiation
/// state, host bindings, hooks and the tier-one cache.
///
/// A runtime is not internally synchronised; it must be driven from
/// one thread at a time. The attached [`Module`] is shared and
/// read-only, so several runtimes may instantiate it concurrently.
pub struct Runtime {
    pub(crate) module: Option<Arc<Module>>,
    pub(crate) config: RuntimeConfig,
    pub(crate) memories: Vec<RuntimeMemory>,
    pub(crate) tables: Vec<RuntimeTable>,
    pub(crate) globals: Vec<GlobalSlot>,
    /// Element segment items, materialised at attach.
    pub(crate) elem_items: Vec<Box<[Value]>>,
    pub(crate) data_dropped: BitVec,
    pub(crate) elem_dropped: BitVec,
    host_functions: FnvMap<ImportName, HostFunction>,
    pending_memories: FnvMap<ImportName, PendingMemory>,
    pending_tables: FnvMap<ImportName, PendingTable>,
    pub(crate) function_traps: BitVec,
    pub(crate) trap_hook: Option<FunctionTrapHook>,
    pub(crate) hooks: SpillHooks,
    pub(crate) jit_context: JitContext,
    pub(crate) jit_stats: JitStats,
    pub(crate) jit_cache: JitCache,
    pub(crate) jit_prepared_executions: u64,
    pub(crate) microcode_enabled: bool,
    next_job_id: u32,
    resolver: Option<Box<dyn SymbolResolver>>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        let jit_context = JitContext::new(config.jit.clone());
        let microcode_enabled = config.microcode_enabled(&jit_context);
        Self {
            module: None,
            config,
            memories: Vec::new(),
            tables: Vec::new(),
            globals: Vec::new(),
            elem_items: Vec::new(),
            data_dropped: BitVec::new(),
            elem_dropped: BitVec::new(),
            host_functions: FnvMap::default(),
            pending_memories: FnvMap::default(),
            pending_tables: FnvMap::default(),
            function_traps: BitVec::new(),
            trap_hook: None,
            hooks: SpillHooks::default(),
            jit_context,
            jit_stats: JitStats::default(),
            jit_cache: JitCache::new(),
            jit_prepared_executions: 0,
            microcode_enabled,
            next_job_id: 0,
            resolver: None,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Whether microcode dispatch is active for this runtime.
    pub fn microcode_enabled(&self) -> bool {
        self.microcode_enabled
    }

    pub fn jit_stats(&self) -> &JitStats {
        &self.jit_stats
    }

    /// How many times dispatch ran off a prepared program.
    pub fn prepared_executions(&self) -> u64 {
        self.jit_prepared_executions
    }

    pub fn jit_context(&self) -> &JitContext {
        &self.jit_context
    }

    /// Mutable tier configuration access, effective before attach.
    pub fn jit_context_mut(&mut self) -> &mut JitContext {
        &mut self.jit_context
    }

    pub fn module(&self) -> Result<&Arc<Module>, RuntimeError> {
        self.module.as_ref().ok_or(RuntimeError::NoModule)
    }

    /// Attaches a module: resolves imports, materialises memories,
    /// tables and globals, applies active segments, prescans when
    /// configured and runs the start function.
    pub fn attach_module(&mut self, module: Arc<Module>) -> Result<(), RuntimeError> {
        if self.module.is_some() {
            return Err(RuntimeError::InvalidArgument);
        }

        // memories, imported entries first by construction
        let mut memories = Vec::with_capacity(module.memories().len());
        for decl in module.memories() {
            let memory = match &decl.imported {
                Some(name) => match self.pending_memories.remove(name) {
                    Some(pending) => {
                        RuntimeMemory::from_host_buffer(decl, pending.bytes, pending.allow_grow)?
                    }
                    None => {
                        // no binding yet: a zeroed host-owned buffer at
                        // the declared minimum, replaceable by rebind
                        let len = Pages::new(decl.limits.min)
                            .to_bytes()
                            .ok_or(RuntimeError::InvalidArgument)?;
                        let mut bytes = BytesMut::with_capacity(len as usize);
                        bytes.resize(len as usize, 0);
                        RuntimeMemory::from_host_buffer(decl, bytes, false)?
                    }
                },
                None => RuntimeMemory::new(decl)?,
            };
            memories.push(memory);
        }

        let mut tables = Vec::with_capacity(module.tables().len());
        for decl in module.tables() {
            let table = match &decl.imported {
                Some(name) => match self.pending_tables.remove(name) {
                    Some(pending) => {
                        RuntimeTable::from_host_elements(decl, pending.elements, pending.allow_grow)?
                    }
                    None => {
                        let null = Value::default_for(decl.elem_type);
                        let elements = alloc::vec![null; decl.limits.min as usize];
                        RuntimeTable::from_host_elements(decl, elements, false)?
                    }
                },
                None => RuntimeTable::new(decl)?,
            };
            tables.push(table);
        }

        // globals: the imported prefix first, then defined ones whose
        // init-exprs may reference that prefix
        let mut globals: Vec<GlobalSlot> = Vec::with_capacity(module.globals().len());
        let imported_count = module.num_imported_globals() as usize;
        for decl in module.globals() {
            let slot = match &decl.origin {
                GlobalOrigin::Imported(_) => GlobalSlot {
                    value: Value::default_for(decl.ty),
                    mutable: decl.mutable,
                    imported: true,
                },
                GlobalOrigin::Defined(init) => {
                    let imported_values: Vec<Value> = globals
                        .iter()
                        .take(imported_count)
                        .map(|g| g.value)
                        .collect();
                    let imported_mutability: Vec<bool> = module
                        .globals()
                        .iter()
                        .take(imported_count)
                        .map(|g| g.mutable)
                        .collect();
                    let value = init.eval(&imported_values, &imported_mutability)?;
                    if !value.matches_valtype(decl.ty) {
                        return Err(RuntimeError::Trap(TrapCode::TypeMismatch));
                    }
                    GlobalSlot {
                        value,
                        mutable: decl.mutable,
                        imported: false,
                    }
                }
            };
            globals.push(slot);
        }

        // element segment items
        let mut elem_items = Vec::with_capacity(module.elements().len());
        {
            let imported_values: Vec<Value> =
                globals.iter().take(imported_count).map(|g| g.value).collect();
            let imported_mutability: Vec<bool> = module
                .globals()
                .iter()
                .take(imported_count)
                .map(|g| g.mutable)
                .collect();
            for segment in module.elements() {
                let mut items = Vec::with_capacity(segment.items.len());
                for item in segment.items.iter() {
                    let value = item.eval(&imported_values, &imported_mutability)?;
                    if !value.kind().is_ref() {
                        return Err(RuntimeError::Trap(TrapCode::TypeMismatch));
                    }
                    items.push(value);
                }
                elem_items.push(items.into_boxed_slice());
            }
        }

        let mut data_dropped = BitVec::repeat(false, module.data_segments().len());
        let mut elem_dropped = BitVec::repeat(false, module.elements().len());

        self.memories = memories;
        self.tables = tables;
        self.globals = globals;

        // active element segments land in their tables, then count as
        // dropped
        {
            let imported_values: Vec<Value> = self
                .globals
                .iter()
                .take(imported_count)
                .map(|g| g.value)
                .collect();
            let imported_mutability: Vec<bool> = module
                .globals()
                .iter()
                .take(imported_count)
                .map(|g| g.mutable)
                .collect();
            for (idx, segment) in module.elements().iter().enumerate() {
                if let ElementMode::Active { table_idx, offset } = &segment.mode {
                    let offset = offset
                        .eval(&imported_values, &imported_mutability)?
                        .as_i32()? as u32;
                    let table = self
                        .tables
                        .get_mut(*table_idx as usize)
                        .ok_or(RuntimeError::InvalidArgument)?;
                    table.init(offset, &elem_items[idx], 0, elem_items[idx].len() as u32)?;
                    elem_dropped.set(idx, true);
                }
            }
            for (idx, segment) in module.data_segments().iter().enumerate() {
                if let DataMode::Active { memory_idx, offset } = &segment.mode {
                    let bytes = module.load_data_bytes(segment)?;
                    let memory = self
                        .memories
                        .get_mut(*memory_idx as usize)
                        .ok_or(RuntimeError::InvalidArgument)?;
                    let offset = match offset.eval(&imported_values, &imported_mutability)? {
                        Value::I32(v) => v as u32 as u64,
                        Value::I64(v) if memory.is_memory64() => v as u64,
                        _ => return Err(RuntimeError::Trap(TrapCode::TypeMismatch)),
                    };
                    memory.write(offset, &bytes)?;
                    data_dropped.set(idx, true);
                }
            }
        }

        self.elem_items = elem_items;
        self.data_dropped = data_dropped;
        self.elem_dropped = elem_dropped;
        self.function_traps = BitVec::repeat(false, module.functions().len());
        self.module = Some(Arc::clone(&module));

        log::info!(
            "attached module: {} functions, {} memories, {} tables, tier {:?}",
            module.functions().len(),
            self.memories.len(),
            self.tables.len(),
            self.jit_context.tier(),
        );

        if self.config.jit.prescan_functions
            && (self.jit_context.tier() == JitTier::Microcode || self.config.jit.prescan_force)
        {
            self.prescan_functions()?;
        }

        if let Some(start) = module.start_function() {
            let mut job = self.create_job()?;
            self.execute_job(&mut job, start)?;
        }
        Ok(())
    }

    /// Drops the instantiation; the module image itself stays with its
    /// other owners.
    pub fn detach_module(&mut self) {
        self.module = None;
        self.memories.clear();
        self.tables.clear();
        self.globals.clear();
        self.elem_items.clear();
        self.data_dropped = BitVec::new();
        self.elem_dropped = BitVec::new();
        self.function_traps = BitVec::new();
        self.jit_cache.clear();
        log::info!("detached module");
    }

    fn prescan_functions(&mut self) -> Result<(), RuntimeError> {
        let module = self.module()?.clone();
        let budget = self.jit_context.decision.budget.cache_budget_bytes;
        for (idx, entry) in module.functions().iter().enumerate() {
            if entry.is_imported() {
                continue;
            }
            let idx = idx as u32;
            let body = module.load_function_body(idx)?;
            let program = match PreparedProgram::prepare(&body, self.microcode_enabled) {
                Ok(program) => program,
                // a body outside the supported surface stays uncached
                // and fails (or not) when it actually runs
                Err(_) => continue,
            };
            if self.config.jit.prescan_spill {
                if let Some(hook) = self.hooks.jit_spill.as_mut() {
                    hook(idx, program.export_blob())?;
                }
            }
            if let Some(hook) = self.hooks.jit_spill.as_mut() {
                self.jit_cache
                    .insert(idx, program, budget, Some(hook.as_mut()));
            } else {
                self.jit_cache.insert(idx, program, budget, None);
            }
        }
        log::debug!(
            "prescan prepared {} programs ({} bytes resident)",
            self.jit_cache.len(),
            self.jit_cache.total_bytes(),
        );
        Ok(())
    }

    /// Creates a job bound to the attached module.
    pub fn create_job(&mut self) -> Result<Job, RuntimeError> {
        let module = self.module()?.clone();
        let id = self.next_job_id;
        self.next_job_id += 1;
        Ok(Job::new(id, module, self.config.max_stack_height))
    }

    /// Runs `function_idx` on `job`.
    ///
    /// A job left suspended at a trap is reset first; otherwise the
    /// value stack is kept, so callers can seed arguments with
    /// [`Job::push_value`] and read results afterwards.
    pub fn execute_job(&mut self, job: &mut Job, function_idx: u32) -> Result<(), RuntimeError> {
        let outcome = executor::execute_job(self, job, function_idx);
        self.jit_context.update(&self.jit_stats);
        outcome
    }

    /// [`Runtime::execute_job`] with the arguments pushed for you.
    pub fn execute_job_with_args(
        &mut self,
        job: &mut Job,
        function_idx: u32,
        args: &[Value],
    ) -> Result<(), RuntimeError> {
        for arg in args {
            job.push_value(*arg).map_err(RuntimeError::Trap)?;
        }
        self.execute_job(job, function_idx)
    }

    pub fn memory(&self, memory_idx: u32) -> Result<&RuntimeMemory, RuntimeError> {
        self.memories
            .get(memory_idx as usize)
            .ok_or(RuntimeError::InvalidArgument)
    }

    pub fn memory_mut(&mut self, memory_idx: u32) -> Result<&mut RuntimeMemory, RuntimeError> {
        self.memories
            .get_mut(memory_idx as usize)
            .ok_or(RuntimeError::InvalidArgument)
    }

    pub fn memory_count(&self) -> u32 {
        self.memories.len() as u32
    }

    pub fn table(&self, table_idx: u32) -> Result<&RuntimeTable, RuntimeError> {
        self.tables
            .get(table_idx as usize)
            .ok_or(RuntimeError::InvalidArgument)
    }

    pub fn table_mut(&mut self, table_idx: u32) -> Result<&mut RuntimeTable, RuntimeError> {
        self.tables
            .get_mut(table_idx as usize)
            .ok_or(RuntimeError::InvalidArgument)
    }

    pub fn global(&self, global_idx: u32) -> Result<&GlobalSlot, RuntimeError> {
        self.globals
            .get(global_idx as usize)
            .ok_or(RuntimeError::InvalidArgument)
    }

    pub fn global_mut(&mut self, global_idx: u32) -> Result<&mut GlobalSlot, RuntimeError> {
        self.globals
            .get_mut(global_idx as usize)
            .ok_or(RuntimeError::InvalidArgument)
    }

    /// Pokes a value into an imported global slot after attach.
    pub fn set_imported_global(
        &mut self,
        global_idx: u32,
        value: Value,
    ) -> Result<(), RuntimeError> {
        let slot = self.global_mut(global_idx)?;
        if !slot.imported || !value.matches_valtype(slot.value.kind()) {
            return Err(RuntimeError::InvalidArgument);
        }
        slot.value = value;
        Ok(())
    }

    /// Host read access to a linear memory.
    pub fn read_memory(
        &mut self,
        memory_idx: u32,
        offset: u64,
        buffer: &mut [u8],
    ) -> Result<(), RuntimeError> {
        self.ensure_memory_loaded(memory_idx)?;
        Ok(self.memory(memory_idx)?.read(offset, buffer)?)
    }

    /// Host write access to a linear memory.
    pub fn write_memory(
        &mut self,
        memory_idx: u32,
        offset: u64,
        buffer: &[u8],
    ) -> Result<(), RuntimeError> {
        self.ensure_memory_loaded(memory_idx)?;
        Ok(self.memory_mut(memory_idx)?.write(offset, buffer)?)
    }

    /// A data segment's bytes; dropped segments read as empty.
    pub(crate) fn data_segment_bytes(&self, data_idx: u32) -> Result<Vec<u8>, RuntimeError> {
        let module = self.module()?;
        let segment = module
            .data_segments()
            .get(data_idx as usize)
            .ok_or(RuntimeError::InvalidArgument)?;
        if self.data_dropped.get(data_idx as usize).as_deref() == Some(&true) {
            return Ok(Vec::new());
        }
        Ok(module.load_data_bytes(segment)?)
    }

    pub(crate) fn drop_data_segment(&mut self, data_idx: u32) -> Result<(), RuntimeError> {
        if data_idx as usize >= self.data_dropped.len() {
            return Err(RuntimeError::InvalidArgument);
        }
        self.data_dropped.set(data_idx as usize, true);
        Ok(())
    }

    pub(crate) fn drop_elem_segment(&mut self, elem_idx: u32) -> Result<(), RuntimeError> {
        if elem_idx as usize >= self.elem_dropped.len() {
            return Err(RuntimeError::InvalidArgument);
        }
        self.elem_dropped.set(elem_idx as usize, true);
        Ok(())
    }

    pub(crate) fn table_init(
        &mut self,
        table_idx: u32,
        elem_idx: u32,
        dst: u32,
        src: u32,
        count: u32,
    ) -> Result<(), RuntimeError> {
        let dropped = self
            .elem_dropped
            .get(elem_idx as usize)
            .as_deref()
            .copied()
            .ok_or(RuntimeError::InvalidArgument)?;
        let empty: Box<[Value]> = Box::new([]);
        let items = if dropped {
            &empty
        } else {
            &self.elem_items[elem_idx as usize]
        };
        let table = self
            .tables
            .get_mut(table_idx as usize)
            .ok_or(RuntimeError::InvalidArgument)?;
        Ok(table.init(dst, items, src, count)?)
    }

    pub(crate) fn copy_table_range(
        &mut self,
        dst_table: u32,
        dst: u32,
        src_table: u32,
        src: u32,
        count: u32,
    ) -> Result<(), RuntimeError> {
        if dst_table == src_table {
            return Ok(self.table_mut(dst_table)?.copy_within(dst, src, count)?);
        }
        let (dst_idx, src_idx) = (dst_table as usize, src_table as usize);
        if dst_idx >= self.tables.len() || src_idx >= self.tables.len() {
            return Err(RuntimeError::InvalidArgument);
        }
        let (first, second) = if dst_idx < src_idx {
            let (a, b) = self.tables.split_at_mut(src_idx);
            (&mut a[dst_idx], &b[0])
        } else {
            let (a, b) = self.tables.split_at_mut(dst_idx);
            (&mut b[0], &a[src_idx])
        };
        Ok(RuntimeTable::copy(first, dst, second, src, count)?)
    }

    pub(crate) fn copy_memory_range(
        &mut self,
        dst_memory: u32,
        dst: u64,
        src_memory: u32,
        src: u64,
        count: u64,
    ) -> Result<(), RuntimeError> {
        if dst_memory == src_memory {
            let memory = self.memory_mut(dst_memory)?;
            memory.check_range(dst, count)?;
            memory.check_range(src, count)?;
            let data = memory.data_mut()?;
            data.copy_within(src as usize..(src + count) as usize, dst as usize);
            return Ok(());
        }
        let (dst_idx, src_idx) = (dst_memory as usize, src_memory as usize);
        if dst_idx >= self.memories.len() || src_idx >= self.memories.len() {
            return Err(RuntimeError::InvalidArgument);
        }
        let (dst_mem, src_mem) = if dst_idx < src_idx {
            let (a, b) = self.memories.split_at_mut(src_idx);
            (&mut a[dst_idx], &b[0])
        } else {
            let (a, b) = self.memories.split_at_mut(dst_idx);
            (&mut b[0], &a[src_idx])
        };
        dst_mem.check_range(dst, count)?;
        src_mem.check_range(src, count)?;
        let mut scratch = alloc::vec![0u8; count as usize];
        src_mem.read(src, &mut scratch)?;
        dst_mem.write(dst, &scratch)?;
        Ok(())
    }

    /// Records a host callback for a named import; calls resolve by
    /// name at invocation time, so binding after attach works.
    pub fn bind_host_function(
        &mut self,
        module_name: &str,
        import_name: &str,
        function: HostFunction,
    ) {
        self.host_functions
            .insert(ImportName::new(module_name, import_name), function);
    }

    /// Resolves a symbol through the configured [`SymbolResolver`] and
    /// binds it.
    pub fn bind_host_function_from_library(
        &mut self,
        module_name: &str,
        import_name: &str,
        library_path: &str,
        symbol_name: &str,
    ) -> Result<(), RuntimeError> {
        let resolver = self.resolver.as_ref().ok_or(RuntimeError::InvalidArgument)?;
        let function = resolver
            .resolve(library_path, symbol_name)
            .ok_or(RuntimeError::Stream)?;
        self.bind_host_function(module_name, import_name, Box::new(function));
        Ok(())
    }

    pub fn set_symbol_resolver(&mut self, resolver: Box<dyn SymbolResolver>) {
        self.resolver = Some(resolver);
    }

    pub(crate) fn take_host_function(&mut self, name: &ImportName) -> Option<HostFunction> {
        self.host_functions.remove(name)
    }

    pub(crate) fn put_back_host_function(&mut self, name: ImportName, function: HostFunction) {
        self.host_functions.insert(name, function);
    }

    /// Binds (or atomically rebinds) a host buffer to an imported
    /// memory.
    ///
    /// Before attach the binding is stored and resolved during
    /// [`Runtime::attach_module`]. After attach a rebind must match
    /// the current byte size and index width exactly; on any failure
    /// the existing binding is left untouched.
    pub fn bind_imported_memory(
        &mut self,
        module_name: &str,
        import_name: &str,
        bytes: impl Into<Vec<u8>>,
        allow_grow: bool,
    ) -> Result<(), RuntimeError> {
        let name = ImportName::new(module_name, import_name);
        let bytes = BytesMut::from(&bytes.into()[..]);
        let Some(module) = self.module.clone() else {
            self.pending_memories
                .insert(name, PendingMemory { bytes, allow_grow });
            return Ok(());
        };
        let (idx, decl) = module
            .memories()
            .iter()
            .enumerate()
            .find(|(_, decl)| decl.imported.as_ref() == Some(&name))
            .ok_or(RuntimeError::InvalidArgument)?;
        let current = self.memory(idx as u32)?;
        if bytes.len() as u64 != current.size_bytes() {
            return Err(RuntimeError::Trap(TrapCode::TypeMismatch));
        }
        let replacement = RuntimeMemory::from_host_buffer(decl, bytes, allow_grow)
            .map_err(|_| RuntimeError::Trap(TrapCode::TypeMismatch))?;
        self.memories[idx] = replacement;
        Ok(())
    }

    /// Binds (or atomically rebinds) host elements to an imported
    /// table; same rules as [`Runtime::bind_imported_memory`].
    pub fn bind_imported_table(
        &mut self,
        module_name: &str,
        import_name: &str,
        elements: Vec<Value>,
        allow_grow: bool,
    ) -> Result<(), RuntimeError> {
        let name = ImportName::new(module_name, import_name);
        let Some(module) = self.module.clone() else {
            self.pending_tables
                .insert(name, PendingTable { elements, allow_grow });
            return Ok(());
        };
        let (idx, decl) = module
            .tables()
            .iter()
            .enumerate()
            .find(|(_, decl)| decl.imported.as_ref() == Some(&name))
            .ok_or(RuntimeError::InvalidArgument)?;
        let current = self.table(idx as u32)?;
        if elements.len() as u32 != current.size() {
            return Err(RuntimeError::Trap(TrapCode::TypeMismatch));
        }
        let replacement = RuntimeTable::from_host_elements(decl, elements, allow_grow)
            .map_err(|_| RuntimeError::Trap(TrapCode::TypeMismatch))?;
        self.tables[idx] = replacement;
        Ok(())
    }

    pub fn set_trap_hook(&mut self, hook: FunctionTrapHook) {
        self.trap_hook = Some(hook);
    }

    pub fn clear_trap_hook(&mut self) {
        self.trap_hook = None;
    }

    /// Flags (or unflags) a function so the trap hook fires before it
    /// executes; idempotent either way.
    pub fn set_function_trap(
        &mut self,
        function_idx: u32,
        enabled: bool,
    ) -> Result<(), RuntimeError> {
        if function_idx as usize >= self.function_traps.len() {
            return Err(RuntimeError::InvalidArgument);
        }
        self.function_traps.set(function_idx as usize, enabled);
        Ok(())
    }

    pub fn clear_function_traps(&mut self) {
        self.function_traps.fill(false);
    }

    pub(crate) fn function_trap_enabled(&self, function_idx: u32) -> bool {
        self.function_traps
            .get(function_idx as usize)
            .as_deref()
            .copied()
            .unwrap_or(false)
    }

    pub fn set_spill_hooks(&mut self, hooks: SpillHooks) {
        self.hooks = hooks;
    }

    /// Exports a function's prepared program through the jit spill
    /// hook and evicts it from the cache.
    pub fn jit_spill_program(&mut self, function_idx: u32) -> Result<(), RuntimeError> {
        if self.hooks.jit_spill.is_none() {
            return Err(RuntimeError::InvalidArgument);
        }
        let program = match self.jit_cache.remove(function_idx) {
            Some(program) => program,
            None => {
                let module = self.module()?.clone();
                let body = module.load_function_body(function_idx)?;
                Arc::new(PreparedProgram::prepare(&body, self.microcode_enabled)?)
            }
        };
        let hook = self.hooks.jit_spill.as_mut().expect("checked above");
        hook(function_idx, program.export_blob())?;
        log::debug!("spilled program for fn {function_idx}");
        Ok(())
    }

    /// Recalls a spilled opcode blob and readmits the reconstructed
    /// program to the cache.
    pub fn jit_load_program(&mut self, function_idx: u32) -> Result<(), RuntimeError> {
        let module = self.module()?.clone();
        let mut hook = self.hooks.jit_load.take().ok_or(RuntimeError::InvalidArgument)?;
        let blob = hook(function_idx);
        self.hooks.jit_load = Some(hook);
        let blob = blob?.ok_or(RuntimeError::Stream)?;
        let body = module.load_function_body(function_idx)?;
        let mut stream = InstructionStream::from_body(body);
        let program = PreparedProgram::from_blob(&blob, &mut stream, self.microcode_enabled)?;
        let budget = self.jit_context.decision.budget.cache_budget_bytes;
        if let Some(hook) = self.hooks.jit_spill.as_mut() {
            self.jit_cache
                .insert(function_idx, program, budget, Some(hook.as_mut()));
        } else {
            self.jit_cache.insert(function_idx, program, budget, None);
        }
        log::debug!("reloaded program for fn {function_idx}");
        Ok(())
    }

    /// Spills a memory's pages through the memory spill hook and
    /// releases the buffer.
    pub fn spill_memory(&mut self, memory_idx: u32) -> Result<(), RuntimeError> {
        if self.memory(memory_idx)?.is_spilled() {
            return Ok(());
        }
        let mut hook = self
            .hooks
            .memory_spill
            .take()
            .ok_or(RuntimeError::InvalidArgument)?;
        let outcome = match self.memory(memory_idx).map(|m| m.data()) {
            Ok(Ok(data)) => hook(memory_idx, data),
            Ok(Err(code)) => Err(code.into()),
            Err(err) => Err(err),
        };
        self.hooks.memory_spill = Some(hook);
        outcome?;
        self.memory_mut(memory_idx)?.take_for_spill();
        log::debug!("spilled memory {memory_idx}");
        Ok(())
    }

    /// Reloads a spilled memory through the memory load hook; the
    /// returned buffer must match the spilled size byte-for-byte in
    /// length.
    pub fn load_memory(&mut self, memory_idx: u32) -> Result<(), RuntimeError> {
        if !self.memory(memory_idx)?.is_spilled() {
            return Ok(());
        }
        let expected = self.memory(memory_idx)?.size_bytes();
        let mut hook = self
            .hooks
            .memory_load
            .take()
            .ok_or(RuntimeError::InvalidArgument)?;
        let bytes = hook(memory_idx, expected);
        self.hooks.memory_load = Some(hook);
        let bytes = bytes?;
        self.memory_mut(memory_idx)?
            .restore_from_load(BytesMut::from(&bytes[..]))?;
        log::debug!("loaded memory {memory_idx}");
        Ok(())
    }

    /// Makes a memory resident, invoking the load hook when spilled.
    pub fn ensure_memory_loaded(&mut self, memory_idx: u32) -> Result<(), RuntimeError> {
        if self.memory(memory_idx)?.is_spilled() {
            self.load_memory(memory_idx)?;
        }
        Ok(())
    }

    /// Cache admission on function entry: cached program, spilled
    /// blob, or a fresh preparation, in that order.
    pub(crate) fn acquire_prepared(
        &mut self,
        function_idx: u32,
        stream: &mut InstructionStream,
    ) -> Option<Arc<PreparedProgram>> {
        if self.jit_context.tier() != JitTier::Microcode {
            return None;
        }
        if let Some(program) = self.jit_cache.get(function_idx) {
            self.jit_prepared_executions += 1;
            return Some(program);
        }
        let mut from_blob = None;
        if let Some(mut hook) = self.hooks.jit_load.take() {
            let blob = hook(function_idx);
            self.hooks.jit_load = Some(hook);
            if let Ok(Some(blob)) = blob {
                from_blob =
                    PreparedProgram::from_blob(&blob, stream, self.microcode_enabled).ok();
            }
        }
        let program = match from_blob {
            Some(program) => program,
            None => PreparedProgram::prepare_from_stream(stream, self.microcode_enabled).ok()?,
        };
        let budget = self.jit_context.decision.budget.cache_budget_bytes;
        let program = if let Some(hook) = self.hooks.jit_spill.as_mut() {
            self.jit_cache
                .insert(function_idx, program, budget, Some(hook.as_mut()))
        } else {
            self.jit_cache.insert(function_idx, program, budget, None)
        };
        self.jit_prepared_executions += 1;
        Some(program)
    }
}
