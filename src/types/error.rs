use crate::types::HostError;
use alloc::boxed::Box;
use core::fmt::Formatter;

/// A non-resumable Wasm-level runtime error.
///
/// Any of these terminates the current job invocation and unwinds the
/// interpreter back to the `execute_job` caller.
#[derive(Debug)]
pub enum TrapCode {
    UnreachableCodeReached,
    MemoryOutOfBounds,
    TableOutOfBounds,
    IndirectCallToNull,
    IntegerDivisionByZero,
    IntegerOverflow,
    BadConversionToInteger,
    StackOverflow,
    StackUnderflow,
    TypeMismatch,
    BadSignature,
    NullReference,
    MalformedInstruction,
    HostTrap,
}

impl core::fmt::Display for TrapCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            TrapCode::UnreachableCodeReached => write!(f, "unreachable code reached"),
            TrapCode::MemoryOutOfBounds => write!(f, "out of bounds memory access"),
            TrapCode::TableOutOfBounds => {
                write!(f, "undefined element: out of bounds table access")
            }
            TrapCode::IndirectCallToNull => write!(f, "uninitialized element"),
            TrapCode::IntegerDivisionByZero => write!(f, "integer divide by zero"),
            TrapCode::IntegerOverflow => write!(f, "integer overflow"),
            TrapCode::BadConversionToInteger => write!(f, "invalid conversion to integer"),
            TrapCode::StackOverflow => write!(f, "value stack exhausted"),
            TrapCode::StackUnderflow => write!(f, "value stack underflow"),
            TrapCode::TypeMismatch => write!(f, "value type mismatch"),
            TrapCode::BadSignature => write!(f, "indirect call type mismatch"),
            TrapCode::NullReference => write!(f, "null reference"),
            TrapCode::MalformedInstruction => write!(f, "malformed instruction encoding"),
            TrapCode::HostTrap => write!(f, "host function trapped"),
        }
    }
}

/// The error kinds surfaced by every fallible runtime operation.
///
/// The set mirrors the stable exit codes of [`RuntimeError::exit_code`]:
/// a caller that only cares about the coarse class can collapse any
/// value of this enum to one of the nine distinct integers.
#[derive(Debug)]
pub enum RuntimeError {
    /// A contract violation at an API boundary.
    InvalidArgument,
    /// Allocation failure; never retried by the core.
    OutOfMemory,
    /// The operation requires an attached module.
    NoModule,
    /// I/O or decoder stream failure while parsing.
    Stream,
    /// A feature present in the input but outside the supported
    /// surface, or a spill/load size mismatch.
    Unsupported,
    /// The opcode has no handler.
    UnimplementedOpcode(u8),
    /// The configured recursion limit was hit.
    CallDepthExceeded,
    /// A Wasm-level trap.
    Trap(TrapCode),
    /// A custom error raised by a host function.
    Host(Box<dyn HostError>),
}

impl core::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            RuntimeError::InvalidArgument => write!(f, "invalid argument"),
            RuntimeError::OutOfMemory => write!(f, "out of memory"),
            RuntimeError::NoModule => write!(f, "no module attached"),
            RuntimeError::Stream => write!(f, "stream failure"),
            RuntimeError::Unsupported => write!(f, "unsupported"),
            RuntimeError::UnimplementedOpcode(byte) => {
                write!(f, "unimplemented opcode 0x{byte:02x}")
            }
            RuntimeError::CallDepthExceeded => write!(f, "call depth exceeded"),
            RuntimeError::Trap(code) => write!(f, "trap: {code}"),
            RuntimeError::Host(err) => write!(f, "host error: {err}"),
        }
    }
}

impl From<TrapCode> for RuntimeError {
    fn from(code: TrapCode) -> Self {
        RuntimeError::Trap(code)
    }
}

impl RuntimeError {
    /// The stable integer code of this error kind; `0` is reserved for
    /// success.
    pub fn exit_code(&self) -> i32 {
        match self {
            RuntimeError::InvalidArgument => -1,
            RuntimeError::OutOfMemory => -2,
            RuntimeError::NoModule => -3,
            RuntimeError::Stream => -4,
            RuntimeError::Unsupported => -5,
            RuntimeError::UnimplementedOpcode(_) => -6,
            RuntimeError::CallDepthExceeded => -7,
            RuntimeError::Trap(_) | RuntimeError::Host(_) => -8,
        }
    }

    /// Returns `true` for Wasm-level traps (including host-signalled
    /// ones).
    pub fn is_trap(&self) -> bool {
        matches!(self, RuntimeError::Trap(_) | RuntimeError::Host(_))
    }
}
