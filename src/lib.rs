//! A spill-capable WebAssembly execution core.
//!
//! picowasm runs Wasm 1.0 modules (plus reference types, bulk
//! memory/table ops, multi-memory, memory64 and a minimal SIMD
//! surface) on a typed stack machine whose dispatch is accelerated by
//! a budgeted cache of microcode-decomposed prepared programs. Linear
//! memory pages and prepared programs can be spilled to external
//! storage through host hooks, which is what makes the runtime viable
//! on microcontroller-class hosts with little RAM and plenty of flash.

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(unused_crate_dependencies)]

extern crate alloc;

mod config;
mod jit;
mod loader;
mod ops;
mod runtime;
mod types;
mod vm;

// dev-dependencies exercised only by integration tests
#[cfg(test)]
use hex_literal as _;
#[cfg(test)]
use rand as _;

pub use config::{OverrideSource, RuntimeConfig};
pub use jit::{
    JitBudget, JitConfig, JitContext, JitDecision, JitDecisionReason, JitProbe, JitStats, JitTier,
    PreparedOp, PreparedProgram,
};
pub use loader::{
    ByteSource, ConstExpr, DataMode, DataSegment, ElementMode, ElementSegment, ExportEntry,
    ExternalKind, FuncType, FunctionEntry, FunctionOrigin, GlobalDecl, GlobalOrigin, Limits,
    LoaderError, MemoryDecl, MemorySource, Module, Section, SectionKind, SourceReader, TableDecl,
};
#[cfg(feature = "std")]
pub use loader::FileSource;
pub use ops::{
    descriptor_for, microcode_steps, ArithKind, BitKind, CmpKind, ExtOpcode, NumKind, OpCategory,
    OpDescriptor, OpHandler, Opcode, PrefixedOpcode, SimdOpcode, TypeInfo,
};
pub use runtime::{
    FunctionTrapHook, GlobalSlot, HostCall, HostFunction, HostFunctionPtr, JitLoadHook,
    JitSpillHook, MemoryLoadHook, MemorySpillHook, Runtime, SpillHooks, SymbolResolver,
};
pub use types::{
    ExternRef, F32, F64, FuncRef, HostError, ImportName, Pages, RuntimeError, TrapCode, V128,
    ValType, Value,
};
pub use vm::{
    CallFrame, ControlFrame, ControlStack, InstructionStream, Job, JobStatus, LabelKind, RegCell,
    RegisterWindow, RuntimeMemory, RuntimeTable, ValueStack,
};

pub use types::{
    JIT_MAX_STEPS_PER_OP, N_BYTES_PER_MEMORY_PAGE, N_DEFAULT_MAX_CALL_DEPTH,
    N_DEFAULT_MAX_STACK_HEIGHT, N_MIN_STACK_HEIGHT, N_REG_CELL_BYTES, N_REG_WINDOW_CELLS,
};
