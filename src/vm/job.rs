use crate::loader::Module;
use crate::types::Value;
use crate::vm::call_stack::CallFrame;
use crate::vm::control_stack::ControlStack;
use crate::vm::instr_stream::InstructionStream;
use crate::vm::register_window::RegisterWindow;
use crate::vm::value_stack::ValueStack;
use alloc::{sync::Arc, vec::Vec};

/// Execution state of a [`Job`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Idle,
    Running,
    /// A trap ended the previous invocation; the next `execute_job`
    /// resets the job and starts fresh.
    SuspendedAtTrap,
    Finished,
}

/// The per-invocation state: value stack, register window, control and
/// call stacks, and the lazily loaded instruction stream.
///
/// A job belongs to the runtime that created it and never migrates;
/// at most one job executes per thread at a time.
pub struct Job {
    id: u32,
    pub(crate) value_stack: ValueStack,
    pub(crate) reg: RegisterWindow,
    pub(crate) control_stack: ControlStack,
    pub(crate) call_stack: Vec<CallFrame>,
    pub(crate) stream: InstructionStream,
    pub(crate) status: JobStatus,
}

impl core::fmt::Debug for Job {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("status", &self.status)
            .finish()
    }
}

impl Job {
    pub(crate) fn new(id: u32, module: Arc<Module>, max_stack_height: usize) -> Self {
        Self {
            id,
            value_stack: ValueStack::new(max_stack_height),
            reg: RegisterWindow::new(),
            control_stack: ControlStack::new(),
            call_stack: Vec::new(),
            stream: InstructionStream::new(module),
            status: JobStatus::Idle,
        }
    }

    /// The monotonic identifier assigned by the owning runtime.
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Pushes an argument for the next invocation.
    pub fn push_value(&mut self, value: Value) -> Result<(), crate::types::TrapCode> {
        self.value_stack.push(value)
    }

    /// The value `depth` entries below the top of the value stack.
    pub fn peek(&self, depth: usize) -> Option<&Value> {
        self.value_stack.peek(depth)
    }

    /// Pops a result left by the previous invocation.
    pub fn pop_value(&mut self) -> Result<Value, crate::types::TrapCode> {
        self.value_stack.pop()
    }

    /// Number of values currently on the value stack.
    pub fn stack_height(&self) -> usize {
        self.value_stack.len()
    }

    /// Clears every stack and the register window; the stream keeps
    /// its module attachment.
    pub fn reset(&mut self) {
        self.value_stack.reset();
        self.reg.clear();
        self.control_stack.reset();
        self.call_stack.clear();
        self.stream.unload();
        self.status = JobStatus::Idle;
    }
}
