pub(crate) mod decode;
mod descriptor;
pub(crate) mod handlers;
mod microcode;
mod opcode;

pub use descriptor::{
    descriptor_for, ArithKind, BitKind, CmpKind, NumKind, OpCategory, OpDescriptor, OpHandler,
    TypeInfo, CORE_TABLE, FC_TABLE, SIMD_TABLE,
};
pub use microcode::microcode_steps;
pub use opcode::{ExtOpcode, Opcode, PrefixedOpcode, SimdOpcode, PREFIX_FC, PREFIX_SIMD};
