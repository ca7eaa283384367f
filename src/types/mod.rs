mod error;
mod func_ref;
mod host_error;
mod import_name;
mod units;
mod value;

/// Size of one WebAssembly linear memory page in bytes.
pub const N_BYTES_PER_MEMORY_PAGE: u32 = 65536;

/// Default height limit of the typed value stack, in entries.
pub const N_DEFAULT_MAX_STACK_HEIGHT: usize = 1024;

/// The smallest value stack limit any configuration may request.
pub const N_MIN_STACK_HEIGHT: usize = 256;

/// Default recursion limit for nested calls.
pub const N_DEFAULT_MAX_CALL_DEPTH: usize = 1024;

/// Number of immediate cells held by a job's register window.
pub const N_REG_WINDOW_CELLS: usize = 4;

/// Largest payload of a single register window cell, in bytes.
pub const N_REG_CELL_BYTES: usize = 8;

/// Upper bound on microcode steps composing one opcode.
pub const JIT_MAX_STEPS_PER_OP: usize = 4;

pub use error::*;
pub use func_ref::*;
pub use host_error::*;
pub use import_name::*;
pub use units::*;
pub use value::*;
