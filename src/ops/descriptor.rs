use crate::ops::handlers::{alu, control, convert, memory, simd, stack, table};
use crate::ops::opcode::ExtOpcode;
use crate::runtime::Runtime;
use crate::types::RuntimeError;
use crate::vm::Job;

/// The numeric family a descriptor's value belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NumKind {
    Void,
    Int,
    Float,
    Ref,
    Vec,
}

/// Value type, byte width and signedness of a typed operation.
///
/// Generic family handlers read these instead of being specialised per
/// opcode: one arithmetic handler serves all four widths and both
/// signs.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    pub kind: NumKind,
    pub byte_width: u8,
    pub signed: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CmpKind {
    Eqz,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ArithKind {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Min,
    Max,
    Copysign,
    Abs,
    Neg,
    Ceil,
    Floor,
    Trunc,
    Nearest,
    Sqrt,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BitKind {
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Rotl,
    Rotr,
    Clz,
    Ctz,
    Popcnt,
}

/// The category tag driving generic handler dispatch.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OpCategory {
    Unique,
    ControlFlow,
    Call,
    Load,
    Store,
    Const,
    Drop,
    Select,
    Cmp(CmpKind),
    Arith(ArithKind),
    Bitops(BitKind),
    Convert,
}

/// A primary handler or a single microcode step.
pub type OpHandler =
    fn(&mut Runtime, &mut Job, &'static OpDescriptor) -> Result<(), RuntimeError>;

/// One entry of the static opcode tables.
///
/// Descriptors are process-wide immutable; prepared programs reference
/// them by `'static` borrow, so descriptor identity is pointer
/// identity.
#[derive(Debug, Copy, Clone)]
pub struct OpDescriptor {
    pub ext: ExtOpcode,
    pub name: &'static str,
    pub value_type: TypeInfo,
    pub category: OpCategory,
    /// Bits read or written by subword load/store variants.
    pub size_arg: u8,
    /// Immediate operand cells the handler drains from the register
    /// window.
    pub num_pull: u8,
    /// Values the handler pushes onto the value stack.
    pub num_push: u8,
    /// Immediates encoded in the byte code.
    pub num_args: u8,
    pub handler: OpHandler,
}

pub const TY_VOID: TypeInfo = TypeInfo { kind: NumKind::Void, byte_width: 0, signed: false };
pub const TY_I32: TypeInfo = TypeInfo { kind: NumKind::Int, byte_width: 4, signed: true };
pub const TY_U32: TypeInfo = TypeInfo { kind: NumKind::Int, byte_width: 4, signed: false };
pub const TY_I64: TypeInfo = TypeInfo { kind: NumKind::Int, byte_width: 8, signed: true };
pub const TY_U64: TypeInfo = TypeInfo { kind: NumKind::Int, byte_width: 8, signed: false };
pub const TY_F32: TypeInfo = TypeInfo { kind: NumKind::Float, byte_width: 4, signed: false };
pub const TY_F64: TypeInfo = TypeInfo { kind: NumKind::Float, byte_width: 8, signed: false };
pub const TY_REF: TypeInfo = TypeInfo { kind: NumKind::Ref, byte_width: 8, signed: false };
pub const TY_V128: TypeInfo = TypeInfo { kind: NumKind::Vec, byte_width: 16, signed: false };

fn op_unimplemented(
    _runtime: &mut Runtime,
    _job: &mut Job,
    descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    Err(RuntimeError::UnimplementedOpcode(descriptor.ext.lead_byte()))
}

const UNDEFINED: OpDescriptor = OpDescriptor {
    ext: ExtOpcode::Core(0),
    name: "",
    value_type: TY_VOID,
    category: OpCategory::Unique,
    size_arg: 0,
    num_pull: 0,
    num_push: 0,
    num_args: 0,
    handler: op_unimplemented,
};

macro_rules! core_op {
    ($t:ident, $byte:expr, $name:literal, $ty:expr, $cat:expr, $size:expr, $pull:expr, $push:expr, $args:expr, $h:expr) => {
        $t[$byte as usize] = OpDescriptor {
            ext: ExtOpcode::Core($byte),
            name: $name,
            value_type: $ty,
            category: $cat,
            size_arg: $size,
            num_pull: $pull,
            num_push: $push,
            num_args: $args,
            handler: $h,
        };
    };
}

macro_rules! ext_op {
    ($ctor:ident, $sub:expr, $name:literal, $ty:expr, $cat:expr, $size:expr, $pull:expr, $push:expr, $args:expr, $h:expr) => {
        OpDescriptor {
            ext: ExtOpcode::$ctor($sub),
            name: $name,
            value_type: $ty,
            category: $cat,
            size_arg: $size,
            num_pull: $pull,
            num_push: $push,
            num_args: $args,
            handler: $h,
        }
    };
}

/// The 256-entry core descriptor table indexed by the first opcode
/// byte. Slots with an empty name have no handler and raise
/// `unimplemented-opcode` when reached.
pub static CORE_TABLE: [OpDescriptor; 256] = build_core_table();

const fn build_core_table() -> [OpDescriptor; 256] {
    use ArithKind::*;
    use BitKind::*;
    use CmpKind::*;
    use OpCategory::*;

    let mut t = [UNDEFINED; 256];

    // control flow
    core_op!(t, 0x00, "unreachable", TY_VOID, ControlFlow, 0, 0, 0, 0, control::op_unreachable);
    core_op!(t, 0x01, "nop", TY_VOID, ControlFlow, 0, 0, 0, 0, control::op_nop);
    core_op!(t, 0x02, "block", TY_VOID, ControlFlow, 0, 1, 0, 1, control::op_block);
    core_op!(t, 0x03, "loop", TY_VOID, ControlFlow, 0, 1, 0, 1, control::op_loop);
    core_op!(t, 0x04, "if", TY_VOID, ControlFlow, 0, 1, 0, 1, control::op_if);
    core_op!(t, 0x05, "else", TY_VOID, ControlFlow, 0, 0, 0, 0, control::op_else);
    core_op!(t, 0x0B, "end", TY_VOID, ControlFlow, 0, 0, 0, 0, control::op_end);
    core_op!(t, 0x0C, "br", TY_VOID, ControlFlow, 0, 1, 0, 1, control::op_br);
    core_op!(t, 0x0D, "br_if", TY_VOID, ControlFlow, 0, 1, 0, 1, control::op_br_if);
    core_op!(t, 0x0E, "br_table", TY_VOID, ControlFlow, 0, 2, 0, 1, control::op_br_table);
    core_op!(t, 0x0F, "return", TY_VOID, ControlFlow, 0, 0, 0, 0, control::op_return);
    core_op!(t, 0x10, "call", TY_VOID, Call, 0, 1, 0, 1, control::op_call);
    core_op!(t, 0x11, "call_indirect", TY_VOID, Call, 0, 2, 0, 2, control::op_call_indirect);

    // parametric
    core_op!(t, 0x1A, "drop", TY_VOID, Drop, 0, 0, 0, 0, stack::op_drop);
    core_op!(t, 0x1B, "select", TY_VOID, Select, 0, 0, 1, 0, stack::op_select);
    core_op!(t, 0x1C, "select_t", TY_VOID, Select, 0, 1, 1, 1, stack::op_select_typed);

    // variables
    core_op!(t, 0x20, "local.get", TY_VOID, Unique, 0, 1, 1, 1, stack::op_local_get);
    core_op!(t, 0x21, "local.set", TY_VOID, Unique, 0, 1, 0, 1, stack::op_local_set);
    core_op!(t, 0x22, "local.tee", TY_VOID, Unique, 0, 1, 1, 1, stack::op_local_tee);
    core_op!(t, 0x23, "global.get", TY_VOID, Unique, 0, 1, 1, 1, stack::op_global_get);
    core_op!(t, 0x24, "global.set", TY_VOID, Unique, 0, 1, 0, 1, stack::op_global_set);
    core_op!(t, 0x25, "table.get", TY_REF, Unique, 0, 1, 1, 1, table::op_table_get);
    core_op!(t, 0x26, "table.set", TY_REF, Unique, 0, 1, 0, 1, table::op_table_set);

    // loads
    core_op!(t, 0x28, "i32.load", TY_I32, Load, 32, 3, 1, 2, memory::op_load);
    core_op!(t, 0x29, "i64.load", TY_I64, Load, 64, 3, 1, 2, memory::op_load);
    core_op!(t, 0x2A, "f32.load", TY_F32, Load, 32, 3, 1, 2, memory::op_load);
    core_op!(t, 0x2B, "f64.load", TY_F64, Load, 64, 3, 1, 2, memory::op_load);
    core_op!(t, 0x2C, "i32.load8_s", TY_I32, Load, 8, 3, 1, 2, memory::op_load);
    core_op!(t, 0x2D, "i32.load8_u", TY_U32, Load, 8, 3, 1, 2, memory::op_load);
    core_op!(t, 0x2E, "i32.load16_s", TY_I32, Load, 16, 3, 1, 2, memory::op_load);
    core_op!(t, 0x2F, "i32.load16_u", TY_U32, Load, 16, 3, 1, 2, memory::op_load);
    core_op!(t, 0x30, "i64.load8_s", TY_I64, Load, 8, 3, 1, 2, memory::op_load);
    core_op!(t, 0x31, "i64.load8_u", TY_U64, Load, 8, 3, 1, 2, memory::op_load);
    core_op!(t, 0x32, "i64.load16_s", TY_I64, Load, 16, 3, 1, 2, memory::op_load);
    core_op!(t, 0x33, "i64.load16_u", TY_U64, Load, 16, 3, 1, 2, memory::op_load);
    core_op!(t, 0x34, "i64.load32_s", TY_I64, Load, 32, 3, 1, 2, memory::op_load);
    core_op!(t, 0x35, "i64.load32_u", TY_U64, Load, 32, 3, 1, 2, memory::op_load);

    // stores
    core_op!(t, 0x36, "i32.store", TY_I32, Store, 32, 3, 0, 2, memory::op_store);
    core_op!(t, 0x37, "i64.store", TY_I64, Store, 64, 3, 0, 2, memory::op_store);
    core_op!(t, 0x38, "f32.store", TY_F32, Store, 32, 3, 0, 2, memory::op_store);
    core_op!(t, 0x39, "f64.store", TY_F64, Store, 64, 3, 0, 2, memory::op_store);
    core_op!(t, 0x3A, "i32.store8", TY_I32, Store, 8, 3, 0, 2, memory::op_store);
    core_op!(t, 0x3B, "i32.store16", TY_I32, Store, 16, 3, 0, 2, memory::op_store);
    core_op!(t, 0x3C, "i64.store8", TY_I64, Store, 8, 3, 0, 2, memory::op_store);
    core_op!(t, 0x3D, "i64.store16", TY_I64, Store, 16, 3, 0, 2, memory::op_store);
    core_op!(t, 0x3E, "i64.store32", TY_I64, Store, 32, 3, 0, 2, memory::op_store);

    core_op!(t, 0x3F, "memory.size", TY_VOID, Unique, 0, 1, 1, 1, memory::op_memory_size);
    core_op!(t, 0x40, "memory.grow", TY_VOID, Unique, 0, 1, 1, 1, memory::op_memory_grow);

    // constants
    core_op!(t, 0x41, "i32.const", TY_I32, Const, 32, 1, 1, 1, stack::op_const);
    core_op!(t, 0x42, "i64.const", TY_I64, Const, 64, 1, 1, 1, stack::op_const);
    core_op!(t, 0x43, "f32.const", TY_F32, Const, 32, 1, 1, 1, stack::op_const);
    core_op!(t, 0x44, "f64.const", TY_F64, Const, 64, 1, 1, 1, stack::op_const);

    // i32 comparisons
    core_op!(t, 0x45, "i32.eqz", TY_I32, Cmp(Eqz), 0, 0, 1, 0, alu::op_cmp);
    core_op!(t, 0x46, "i32.eq", TY_I32, Cmp(Eq), 0, 0, 1, 0, alu::op_cmp);
    core_op!(t, 0x47, "i32.ne", TY_I32, Cmp(Ne), 0, 0, 1, 0, alu::op_cmp);
    core_op!(t, 0x48, "i32.lt_s", TY_I32, Cmp(Lt), 0, 0, 1, 0, alu::op_cmp);
    core_op!(t, 0x49, "i32.lt_u", TY_U32, Cmp(Lt), 0, 0, 1, 0, alu::op_cmp);
    core_op!(t, 0x4A, "i32.gt_s", TY_I32, Cmp(Gt), 0, 0, 1, 0, alu::op_cmp);
    core_op!(t, 0x4B, "i32.gt_u", TY_U32, Cmp(Gt), 0, 0, 1, 0, alu::op_cmp);
    core_op!(t, 0x4C, "i32.le_s", TY_I32, Cmp(Le), 0, 0, 1, 0, alu::op_cmp);
    core_op!(t, 0x4D, "i32.le_u", TY_U32, Cmp(Le), 0, 0, 1, 0, alu::op_cmp);
    core_op!(t, 0x4E, "i32.ge_s", TY_I32, Cmp(Ge), 0, 0, 1, 0, alu::op_cmp);
    core_op!(t, 0x4F, "i32.ge_u", TY_U32, Cmp(Ge), 0, 0, 1, 0, alu::op_cmp);

    // i64 comparisons
    core_op!(t, 0x50, "i64.eqz", TY_I64, Cmp(Eqz), 0, 0, 1, 0, alu::op_cmp);
    core_op!(t, 0x51, "i64.eq", TY_I64, Cmp(Eq), 0, 0, 1, 0, alu::op_cmp);
    core_op!(t, 0x52, "i64.ne", TY_I64, Cmp(Ne), 0, 0, 1, 0, alu::op_cmp);
    core_op!(t, 0x53, "i64.lt_s", TY_I64, Cmp(Lt), 0, 0, 1, 0, alu::op_cmp);
    core_op!(t, 0x54, "i64.lt_u", TY_U64, Cmp(Lt), 0, 0, 1, 0, alu::op_cmp);
    core_op!(t, 0x55, "i64.gt_s", TY_I64, Cmp(Gt), 0, 0, 1, 0, alu::op_cmp);
    core_op!(t, 0x56, "i64.gt_u", TY_U64, Cmp(Gt), 0, 0, 1, 0, alu::op_cmp);
    core_op!(t, 0x57, "i64.le_s", TY_I64, Cmp(Le), 0, 0, 1, 0, alu::op_cmp);
    core_op!(t, 0x58, "i64.le_u", TY_U64, Cmp(Le), 0, 0, 1, 0, alu::op_cmp);
    core_op!(t, 0x59, "i64.ge_s", TY_I64, Cmp(Ge), 0, 0, 1, 0, alu::op_cmp);
    core_op!(t, 0x5A, "i64.ge_u", TY_U64, Cmp(Ge), 0, 0, 1, 0, alu::op_cmp);

    // float comparisons
    core_op!(t, 0x5B, "f32.eq", TY_F32, Cmp(Eq), 0, 0, 1, 0, alu::op_cmp);
    core_op!(t, 0x5C, "f32.ne", TY_F32, Cmp(Ne), 0, 0, 1, 0, alu::op_cmp);
    core_op!(t, 0x5D, "f32.lt", TY_F32, Cmp(Lt), 0, 0, 1, 0, alu::op_cmp);
    core_op!(t, 0x5E, "f32.gt", TY_F32, Cmp(Gt), 0, 0, 1, 0, alu::op_cmp);
    core_op!(t, 0x5F, "f32.le", TY_F32, Cmp(Le), 0, 0, 1, 0, alu::op_cmp);
    core_op!(t, 0x60, "f32.ge", TY_F32, Cmp(Ge), 0, 0, 1, 0, alu::op_cmp);
    core_op!(t, 0x61, "f64.eq", TY_F64, Cmp(Eq), 0, 0, 1, 0, alu::op_cmp);
    core_op!(t, 0x62, "f64.ne", TY_F64, Cmp(Ne), 0, 0, 1, 0, alu::op_cmp);
    core_op!(t, 0x63, "f64.lt", TY_F64, Cmp(Lt), 0, 0, 1, 0, alu::op_cmp);
    core_op!(t, 0x64, "f64.gt", TY_F64, Cmp(Gt), 0, 0, 1, 0, alu::op_cmp);
    core_op!(t, 0x65, "f64.le", TY_F64, Cmp(Le), 0, 0, 1, 0, alu::op_cmp);
    core_op!(t, 0x66, "f64.ge", TY_F64, Cmp(Ge), 0, 0, 1, 0, alu::op_cmp);

    // i32 arithmetic and bit ops
    core_op!(t, 0x67, "i32.clz", TY_U32, Bitops(Clz), 0, 0, 1, 0, alu::op_bitops);
    core_op!(t, 0x68, "i32.ctz", TY_U32, Bitops(Ctz), 0, 0, 1, 0, alu::op_bitops);
    core_op!(t, 0x69, "i32.popcnt", TY_U32, Bitops(Popcnt), 0, 0, 1, 0, alu::op_bitops);
    core_op!(t, 0x6A, "i32.add", TY_I32, Arith(Add), 0, 0, 1, 0, alu::op_arith);
    core_op!(t, 0x6B, "i32.sub", TY_I32, Arith(Sub), 0, 0, 1, 0, alu::op_arith);
    core_op!(t, 0x6C, "i32.mul", TY_I32, Arith(Mul), 0, 0, 1, 0, alu::op_arith);
    core_op!(t, 0x6D, "i32.div_s", TY_I32, Arith(Div), 0, 0, 1, 0, alu::op_arith);
    core_op!(t, 0x6E, "i32.div_u", TY_U32, Arith(Div), 0, 0, 1, 0, alu::op_arith);
    core_op!(t, 0x6F, "i32.rem_s", TY_I32, Arith(Rem), 0, 0, 1, 0, alu::op_arith);
    core_op!(t, 0x70, "i32.rem_u", TY_U32, Arith(Rem), 0, 0, 1, 0, alu::op_arith);
    core_op!(t, 0x71, "i32.and", TY_U32, Bitops(And), 0, 0, 1, 0, alu::op_bitops);
    core_op!(t, 0x72, "i32.or", TY_U32, Bitops(Or), 0, 0, 1, 0, alu::op_bitops);
    core_op!(t, 0x73, "i32.xor", TY_U32, Bitops(Xor), 0, 0, 1, 0, alu::op_bitops);
    core_op!(t, 0x74, "i32.shl", TY_U32, Bitops(Shl), 0, 0, 1, 0, alu::op_bitops);
    core_op!(t, 0x75, "i32.shr_s", TY_I32, Bitops(Shr), 0, 0, 1, 0, alu::op_bitops);
    core_op!(t, 0x76, "i32.shr_u", TY_U32, Bitops(Shr), 0, 0, 1, 0, alu::op_bitops);
    core_op!(t, 0x77, "i32.rotl", TY_U32, Bitops(Rotl), 0, 0, 1, 0, alu::op_bitops);
    core_op!(t, 0x78, "i32.rotr", TY_U32, Bitops(Rotr), 0, 0, 1, 0, alu::op_bitops);

    // i64 arithmetic and bit ops
    core_op!(t, 0x79, "i64.clz", TY_U64, Bitops(Clz), 0, 0, 1, 0, alu::op_bitops);
    core_op!(t, 0x7A, "i64.ctz", TY_U64, Bitops(Ctz), 0, 0, 1, 0, alu::op_bitops);
    core_op!(t, 0x7B, "i64.popcnt", TY_U64, Bitops(Popcnt), 0, 0, 1, 0, alu::op_bitops);
    core_op!(t, 0x7C, "i64.add", TY_I64, Arith(Add), 0, 0, 1, 0, alu::op_arith);
    core_op!(t, 0x7D, "i64.sub", TY_I64, Arith(Sub), 0, 0, 1, 0, alu::op_arith);
    core_op!(t, 0x7E, "i64.mul", TY_I64, Arith(Mul), 0, 0, 1, 0, alu::op_arith);
    core_op!(t, 0x7F, "i64.div_s", TY_I64, Arith(Div), 0, 0, 1, 0, alu::op_arith);
    core_op!(t, 0x80, "i64.div_u", TY_U64, Arith(Div), 0, 0, 1, 0, alu::op_arith);
    core_op!(t, 0x81, "i64.rem_s", TY_I64, Arith(Rem), 0, 0, 1, 0, alu::op_arith);
    core_op!(t, 0x82, "i64.rem_u", TY_U64, Arith(Rem), 0, 0, 1, 0, alu::op_arith);
    core_op!(t, 0x83, "i64.and", TY_U64, Bitops(And), 0, 0, 1, 0, alu::op_bitops);
    core_op!(t, 0x84, "i64.or", TY_U64, Bitops(Or), 0, 0, 1, 0, alu::op_bitops);
    core_op!(t, 0x85, "i64.xor", TY_U64, Bitops(Xor), 0, 0, 1, 0, alu::op_bitops);
    core_op!(t, 0x86, "i64.shl", TY_U64, Bitops(Shl), 0, 0, 1, 0, alu::op_bitops);
    core_op!(t, 0x87, "i64.shr_s", TY_I64, Bitops(Shr), 0, 0, 1, 0, alu::op_bitops);
    core_op!(t, 0x88, "i64.shr_u", TY_U64, Bitops(Shr), 0, 0, 1, 0, alu::op_bitops);
    core_op!(t, 0x89, "i64.rotl", TY_U64, Bitops(Rotl), 0, 0, 1, 0, alu::op_bitops);
    core_op!(t, 0x8A, "i64.rotr", TY_U64, Bitops(Rotr), 0, 0, 1, 0, alu::op_bitops);

    // f32 arithmetic
    core_op!(t, 0x8B, "f32.abs", TY_F32, Arith(Abs), 0, 0, 1, 0, alu::op_arith);
    core_op!(t, 0x8C, "f32.neg", TY_F32, Arith(Neg), 0, 0, 1, 0, alu::op_arith);
    core_op!(t, 0x8D, "f32.ceil", TY_F32, Arith(Ceil), 0, 0, 1, 0, alu::op_arith);
    core_op!(t, 0x8E, "f32.floor", TY_F32, Arith(Floor), 0, 0, 1, 0, alu::op_arith);
    core_op!(t, 0x8F, "f32.trunc", TY_F32, Arith(Trunc), 0, 0, 1, 0, alu::op_arith);
    core_op!(t, 0x90, "f32.nearest", TY_F32, Arith(Nearest), 0, 0, 1, 0, alu::op_arith);
    core_op!(t, 0x91, "f32.sqrt", TY_F32, Arith(Sqrt), 0, 0, 1, 0, alu::op_arith);
    core_op!(t, 0x92, "f32.add", TY_F32, Arith(Add), 0, 0, 1, 0, alu::op_arith);
    core_op!(t, 0x93, "f32.sub", TY_F32, Arith(Sub), 0, 0, 1, 0, alu::op_arith);
    core_op!(t, 0x94, "f32.mul", TY_F32, Arith(Mul), 0, 0, 1, 0, alu::op_arith);
    core_op!(t, 0x95, "f32.div", TY_F32, Arith(Div), 0, 0, 1, 0, alu::op_arith);
    core_op!(t, 0x96, "f32.min", TY_F32, Arith(Min), 0, 0, 1, 0, alu::op_arith);
    core_op!(t, 0x97, "f32.max", TY_F32, Arith(Max), 0, 0, 1, 0, alu::op_arith);
    core_op!(t, 0x98, "f32.copysign", TY_F32, Arith(Copysign), 0, 0, 1, 0, alu::op_arith);

    // f64 arithmetic
    core_op!(t, 0x99, "f64.abs", TY_F64, Arith(Abs), 0, 0, 1, 0, alu::op_arith);
    core_op!(t, 0x9A, "f64.neg", TY_F64, Arith(Neg), 0, 0, 1, 0, alu::op_arith);
    core_op!(t, 0x9B, "f64.ceil", TY_F64, Arith(Ceil), 0, 0, 1, 0, alu::op_arith);
    core_op!(t, 0x9C, "f64.floor", TY_F64, Arith(Floor), 0, 0, 1, 0, alu::op_arith);
    core_op!(t, 0x9D, "f64.trunc", TY_F64, Arith(Trunc), 0, 0, 1, 0, alu::op_arith);
    core_op!(t, 0x9E, "f64.nearest", TY_F64, Arith(Nearest), 0, 0, 1, 0, alu::op_arith);
    core_op!(t, 0x9F, "f64.sqrt", TY_F64, Arith(Sqrt), 0, 0, 1, 0, alu::op_arith);
    core_op!(t, 0xA0, "f64.add", TY_F64, Arith(Add), 0, 0, 1, 0, alu::op_arith);
    core_op!(t, 0xA1, "f64.sub", TY_F64, Arith(Sub), 0, 0, 1, 0, alu::op_arith);
    core_op!(t, 0xA2, "f64.mul", TY_F64, Arith(Mul), 0, 0, 1, 0, alu::op_arith);
    core_op!(t, 0xA3, "f64.div", TY_F64, Arith(Div), 0, 0, 1, 0, alu::op_arith);
    core_op!(t, 0xA4, "f64.min", TY_F64, Arith(Min), 0, 0, 1, 0, alu::op_arith);
    core_op!(t, 0xA5, "f64.max", TY_F64, Arith(Max), 0, 0, 1, 0, alu::op_arith);
    core_op!(t, 0xA6, "f64.copysign", TY_F64, Arith(Copysign), 0, 0, 1, 0, alu::op_arith);

    // conversions
    core_op!(t, 0xA7, "i32.wrap_i64", TY_I32, Convert, 0, 0, 1, 0, convert::op_convert);
    core_op!(t, 0xA8, "i32.trunc_f32_s", TY_I32, Convert, 0, 0, 1, 0, convert::op_convert);
    core_op!(t, 0xA9, "i32.trunc_f32_u", TY_U32, Convert, 0, 0, 1, 0, convert::op_convert);
    core_op!(t, 0xAA, "i32.trunc_f64_s", TY_I32, Convert, 0, 0, 1, 0, convert::op_convert);
    core_op!(t, 0xAB, "i32.trunc_f64_u", TY_U32, Convert, 0, 0, 1, 0, convert::op_convert);
    core_op!(t, 0xAC, "i64.extend_i32_s", TY_I64, Convert, 0, 0, 1, 0, convert::op_convert);
    core_op!(t, 0xAD, "i64.extend_i32_u", TY_U64, Convert, 0, 0, 1, 0, convert::op_convert);
    core_op!(t, 0xAE, "i64.trunc_f32_s", TY_I64, Convert, 0, 0, 1, 0, convert::op_convert);
    core_op!(t, 0xAF, "i64.trunc_f32_u", TY_U64, Convert, 0, 0, 1, 0, convert::op_convert);
    core_op!(t, 0xB0, "i64.trunc_f64_s", TY_I64, Convert, 0, 0, 1, 0, convert::op_convert);
    core_op!(t, 0xB1, "i64.trunc_f64_u", TY_U64, Convert, 0, 0, 1, 0, convert::op_convert);
    core_op!(t, 0xB2, "f32.convert_i32_s", TY_F32, Convert, 0, 0, 1, 0, convert::op_convert);
    core_op!(t, 0xB3, "f32.convert_i32_u", TY_F32, Convert, 0, 0, 1, 0, convert::op_convert);
    core_op!(t, 0xB4, "f32.convert_i64_s", TY_F32, Convert, 0, 0, 1, 0, convert::op_convert);
    core_op!(t, 0xB5, "f32.convert_i64_u", TY_F32, Convert, 0, 0, 1, 0, convert::op_convert);
    core_op!(t, 0xB6, "f32.demote_f64", TY_F32, Convert, 0, 0, 1, 0, convert::op_convert);
    core_op!(t, 0xB7, "f64.convert_i32_s", TY_F64, Convert, 0, 0, 1, 0, convert::op_convert);
    core_op!(t, 0xB8, "f64.convert_i32_u", TY_F64, Convert, 0, 0, 1, 0, convert::op_convert);
    core_op!(t, 0xB9, "f64.convert_i64_s", TY_F64, Convert, 0, 0, 1, 0, convert::op_convert);
    core_op!(t, 0xBA, "f64.convert_i64_u", TY_F64, Convert, 0, 0, 1, 0, convert::op_convert);
    core_op!(t, 0xBB, "f64.promote_f32", TY_F64, Convert, 0, 0, 1, 0, convert::op_convert);
    core_op!(t, 0xBC, "i32.reinterpret_f32", TY_I32, Convert, 0, 0, 1, 0, convert::op_convert);
    core_op!(t, 0xBD, "i64.reinterpret_f64", TY_I64, Convert, 0, 0, 1, 0, convert::op_convert);
    core_op!(t, 0xBE, "f32.reinterpret_i32", TY_F32, Convert, 0, 0, 1, 0, convert::op_convert);
    core_op!(t, 0xBF, "f64.reinterpret_i64", TY_F64, Convert, 0, 0, 1, 0, convert::op_convert);
    core_op!(t, 0xC0, "i32.extend8_s", TY_I32, Convert, 8, 0, 1, 0, convert::op_convert);
    core_op!(t, 0xC1, "i32.extend16_s", TY_I32, Convert, 16, 0, 1, 0, convert::op_convert);
    core_op!(t, 0xC2, "i64.extend8_s", TY_I64, Convert, 8, 0, 1, 0, convert::op_convert);
    core_op!(t, 0xC3, "i64.extend16_s", TY_I64, Convert, 16, 0, 1, 0, convert::op_convert);
    core_op!(t, 0xC4, "i64.extend32_s", TY_I64, Convert, 32, 0, 1, 0, convert::op_convert);

    // references
    core_op!(t, 0xD0, "ref.null", TY_REF, Unique, 0, 1, 1, 1, stack::op_ref_null);
    core_op!(t, 0xD1, "ref.is_null", TY_REF, Unique, 0, 0, 1, 0, stack::op_ref_is_null);
    core_op!(t, 0xD2, "ref.func", TY_REF, Unique, 0, 1, 1, 1, stack::op_ref_func);

    t
}

/// Descriptor table for the `0xFC` prefix, indexed by sub-opcode.
pub static FC_TABLE: [OpDescriptor; 18] = [
    ext_op!(Fc, 0, "i32.trunc_sat_f32_s", TY_I32, OpCategory::Convert, 0, 0, 1, 0, convert::op_convert),
    ext_op!(Fc, 1, "i32.trunc_sat_f32_u", TY_U32, OpCategory::Convert, 0, 0, 1, 0, convert::op_convert),
    ext_op!(Fc, 2, "i32.trunc_sat_f64_s", TY_I32, OpCategory::Convert, 0, 0, 1, 0, convert::op_convert),
    ext_op!(Fc, 3, "i32.trunc_sat_f64_u", TY_U32, OpCategory::Convert, 0, 0, 1, 0, convert::op_convert),
    ext_op!(Fc, 4, "i64.trunc_sat_f32_s", TY_I64, OpCategory::Convert, 0, 0, 1, 0, convert::op_convert),
    ext_op!(Fc, 5, "i64.trunc_sat_f32_u", TY_U64, OpCategory::Convert, 0, 0, 1, 0, convert::op_convert),
    ext_op!(Fc, 6, "i64.trunc_sat_f64_s", TY_I64, OpCategory::Convert, 0, 0, 1, 0, convert::op_convert),
    ext_op!(Fc, 7, "i64.trunc_sat_f64_u", TY_U64, OpCategory::Convert, 0, 0, 1, 0, convert::op_convert),
    ext_op!(Fc, 8, "memory.init", TY_VOID, OpCategory::Unique, 0, 2, 0, 2, memory::op_memory_init),
    ext_op!(Fc, 9, "data.drop", TY_VOID, OpCategory::Unique, 0, 1, 0, 1, memory::op_data_drop),
    ext_op!(Fc, 10, "memory.copy", TY_VOID, OpCategory::Unique, 0, 2, 0, 2, memory::op_memory_copy),
    ext_op!(Fc, 11, "memory.fill", TY_VOID, OpCategory::Unique, 0, 1, 0, 1, memory::op_memory_fill),
    ext_op!(Fc, 12, "table.init", TY_VOID, OpCategory::Unique, 0, 2, 0, 2, table::op_table_init),
    ext_op!(Fc, 13, "elem.drop", TY_VOID, OpCategory::Unique, 0, 1, 0, 1, table::op_elem_drop),
    ext_op!(Fc, 14, "table.copy", TY_VOID, OpCategory::Unique, 0, 2, 0, 2, table::op_table_copy),
    ext_op!(Fc, 15, "table.grow", TY_VOID, OpCategory::Unique, 0, 1, 1, 1, table::op_table_grow),
    ext_op!(Fc, 16, "table.size", TY_VOID, OpCategory::Unique, 0, 1, 1, 1, table::op_table_size),
    ext_op!(Fc, 17, "table.fill", TY_VOID, OpCategory::Unique, 0, 1, 0, 1, table::op_table_fill),
];

/// Descriptor table for the `0xFD` (SIMD) prefix; sparse, looked up
/// through [`simd_index`].
pub static SIMD_TABLE: [OpDescriptor; 14] = [
    ext_op!(Simd, 0, "v128.load", TY_V128, OpCategory::Load, 128, 3, 1, 2, simd::op_v128_load),
    ext_op!(Simd, 11, "v128.store", TY_V128, OpCategory::Store, 128, 3, 0, 2, simd::op_v128_store),
    ext_op!(Simd, 12, "v128.const", TY_V128, OpCategory::Const, 128, 2, 1, 1, simd::op_v128_const),
    ext_op!(Simd, 15, "i8x16.splat", TY_V128, OpCategory::Unique, 8, 0, 1, 0, simd::op_splat),
    ext_op!(Simd, 16, "i16x8.splat", TY_V128, OpCategory::Unique, 16, 0, 1, 0, simd::op_splat),
    ext_op!(Simd, 17, "i32x4.splat", TY_V128, OpCategory::Unique, 32, 0, 1, 0, simd::op_splat),
    ext_op!(Simd, 18, "i64x2.splat", TY_V128, OpCategory::Unique, 64, 0, 1, 0, simd::op_splat),
    ext_op!(Simd, 21, "i8x16.extract_lane_s", TY_I32, OpCategory::Unique, 8, 1, 1, 1, simd::op_lane_extract),
    ext_op!(Simd, 22, "i8x16.extract_lane_u", TY_U32, OpCategory::Unique, 8, 1, 1, 1, simd::op_lane_extract),
    ext_op!(Simd, 23, "i8x16.replace_lane", TY_V128, OpCategory::Unique, 8, 1, 1, 1, simd::op_lane_replace),
    ext_op!(Simd, 27, "i32x4.extract_lane", TY_I32, OpCategory::Unique, 32, 1, 1, 1, simd::op_lane_extract),
    ext_op!(Simd, 28, "i32x4.replace_lane", TY_V128, OpCategory::Unique, 32, 1, 1, 1, simd::op_lane_replace),
    ext_op!(Simd, 110, "i8x16.add", TY_V128, OpCategory::Unique, 8, 0, 1, 0, simd::op_i8x16_add),
    ext_op!(Simd, 248, "i32x4.trunc_sat_f32x4_s", TY_V128, OpCategory::Convert, 32, 0, 1, 0, simd::op_trunc_sat_f32x4),
];

fn simd_index(sub: u32) -> Option<usize> {
    SIMD_TABLE.iter().position(|d| d.ext == ExtOpcode::Simd(sub))
}

/// Resolves a decoded opcode to its descriptor; `None` means the byte
/// has no assigned meaning at all (prefixed sub-opcode out of range).
pub fn descriptor_for(ext: ExtOpcode) -> Option<&'static OpDescriptor> {
    match ext {
        ExtOpcode::Core(byte) => {
            let descriptor = &CORE_TABLE[byte as usize];
            (!descriptor.name.is_empty()).then_some(descriptor)
        }
        ExtOpcode::Fc(sub) => FC_TABLE.get(sub as usize),
        ExtOpcode::Simd(sub) => simd_index(sub).map(|i| &SIMD_TABLE[i]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_ops_resolve() {
        let add = descriptor_for(ExtOpcode::Core(0x6A)).unwrap();
        assert_eq!(add.name, "i32.add");
        assert_eq!(add.value_type.byte_width, 4);
        assert!(matches!(add.category, OpCategory::Arith(ArithKind::Add)));

        let load = descriptor_for(ExtOpcode::Core(0x2C)).unwrap();
        assert_eq!(load.size_arg, 8);
        assert!(load.value_type.signed);
    }

    #[test]
    fn unknown_ops_do_not_resolve() {
        assert!(descriptor_for(ExtOpcode::Core(0x27)).is_none());
        assert!(descriptor_for(ExtOpcode::Fc(99)).is_none());
        assert!(descriptor_for(ExtOpcode::Simd(1)).is_none());
    }

    #[test]
    fn descriptor_identity_is_pointer_identity() {
        let a = descriptor_for(ExtOpcode::Core(0x6A)).unwrap();
        let b = descriptor_for(ExtOpcode::Core(0x6A)).unwrap();
        assert!(core::ptr::eq(a, b));
    }
}
