use crate::jit::PreparedProgram;
use crate::types::Value;
use alloc::{sync::Arc, vec::Vec};

/// One live function activation.
#[derive(Clone)]
pub struct CallFrame {
    /// The function this frame executes.
    pub function_idx: u32,
    /// The caller's function index; `None` for the entry frame.
    pub return_function: Option<u32>,
    /// PC to resume the caller at.
    pub return_pc: usize,
    /// Value stack height at entry, after the arguments were consumed.
    pub stack_base: usize,
    /// Control stack height at entry.
    pub control_base: usize,
    /// Parameters followed by zero-initialised declared locals.
    pub locals: Vec<Value>,
    /// The callee's declared result count, enforced on return.
    pub result_arity: usize,
    /// The prepared program driving dispatch for this frame, when the
    /// tier is on. Held here so cache eviction cannot pull it out from
    /// under a live activation.
    pub prepared: Option<Arc<PreparedProgram>>,
}

impl core::fmt::Debug for CallFrame {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CallFrame")
            .field("function_idx", &self.function_idx)
            .field("return_pc", &self.return_pc)
            .field("stack_base", &self.stack_base)
            .field("locals", &self.locals.len())
            .field("result_arity", &self.result_arity)
            .field("prepared", &self.prepared.is_some())
            .finish()
    }
}
