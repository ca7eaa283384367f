use crate::ops::descriptor::{ArithKind, BitKind, CmpKind, OpCategory, OpDescriptor, OpHandler};
use crate::ops::handlers::{alu, convert};
use crate::ops::opcode::ExtOpcode;
use crate::runtime::Runtime;
use crate::types::RuntimeError;
use crate::vm::Job;

/// The parallel microcode table: fine-grained step sequences for the
/// opcodes worth decomposing.
///
/// Each step carries its operator baked in and reads only width and
/// signedness from the descriptor, so one sequence serves a whole
/// opcode family. Sequences stay within
/// [`JIT_MAX_STEPS_PER_OP`](crate::types::JIT_MAX_STEPS_PER_OP).
macro_rules! define_microcode_step {
    ($step:ident, $body:path, $kind:expr) => {
        fn $step(
            runtime: &mut Runtime,
            job: &mut Job,
            descriptor: &'static OpDescriptor,
        ) -> Result<(), RuntimeError> {
            $body(runtime, job, descriptor, $kind)
        }
    };
}

define_microcode_step!(step_arith_add, alu::arith_with, ArithKind::Add);
define_microcode_step!(step_arith_sub, alu::arith_with, ArithKind::Sub);
define_microcode_step!(step_arith_mul, alu::arith_with, ArithKind::Mul);
define_microcode_step!(step_arith_div, alu::arith_with, ArithKind::Div);
define_microcode_step!(step_arith_rem, alu::arith_with, ArithKind::Rem);
define_microcode_step!(step_bitwise_and, alu::bitops_with, BitKind::And);
define_microcode_step!(step_bitwise_or, alu::bitops_with, BitKind::Or);
define_microcode_step!(step_bitwise_xor, alu::bitops_with, BitKind::Xor);
define_microcode_step!(step_shift_left, alu::bitops_with, BitKind::Shl);
define_microcode_step!(step_shift_right, alu::bitops_with, BitKind::Shr);
define_microcode_step!(step_rotate_left, alu::bitops_with, BitKind::Rotl);
define_microcode_step!(step_rotate_right, alu::bitops_with, BitKind::Rotr);
define_microcode_step!(step_bitcount_clz, alu::bitops_with, BitKind::Clz);
define_microcode_step!(step_bitcount_ctz, alu::bitops_with, BitKind::Ctz);
define_microcode_step!(step_bitcount_popcnt, alu::bitops_with, BitKind::Popcnt);

fn step_convert(
    runtime: &mut Runtime,
    job: &mut Job,
    descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    convert::op_convert(runtime, job, descriptor)
}

fn step_compare(
    runtime: &mut Runtime,
    job: &mut Job,
    descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    alu::op_cmp(runtime, job, descriptor)
}

macro_rules! define_microcode {
    ($name:ident, $($step:expr),+ $(,)?) => {
        static $name: &[OpHandler] = &[$($step),+];
    };
}

define_microcode!(MC_ARITH_ADD, step_arith_add);
define_microcode!(MC_ARITH_SUB, step_arith_sub);
define_microcode!(MC_ARITH_MUL, step_arith_mul);
define_microcode!(MC_ARITH_DIV, step_arith_div);
define_microcode!(MC_ARITH_REM, step_arith_rem);
define_microcode!(MC_BITWISE_AND, step_bitwise_and);
define_microcode!(MC_BITWISE_OR, step_bitwise_or);
define_microcode!(MC_BITWISE_XOR, step_bitwise_xor);
define_microcode!(MC_SHIFT_LEFT, step_shift_left);
define_microcode!(MC_SHIFT_RIGHT, step_shift_right);
define_microcode!(MC_ROTATE_LEFT, step_rotate_left);
define_microcode!(MC_ROTATE_RIGHT, step_rotate_right);
define_microcode!(MC_BITCOUNT_CLZ, step_bitcount_clz);
define_microcode!(MC_BITCOUNT_CTZ, step_bitcount_ctz);
define_microcode!(MC_BITCOUNT_POPCNT, step_bitcount_popcnt);
define_microcode!(MC_COMPARE, step_compare);
define_microcode!(MC_CONVERT, step_convert);

/// Microcode steps for a core opcode, derived from its descriptor's
/// category; prefixed opcodes run their primary handler as the single
/// step.
pub fn microcode_steps(ext: ExtOpcode) -> Option<&'static [OpHandler]> {
    let ExtOpcode::Core(byte) = ext else {
        return None;
    };
    let descriptor = &crate::ops::descriptor::CORE_TABLE[byte as usize];
    if descriptor.name.is_empty() {
        return None;
    }
    match descriptor.category {
        OpCategory::Cmp(_) => Some(MC_COMPARE),
        OpCategory::Arith(kind) => match kind {
            ArithKind::Add => Some(MC_ARITH_ADD),
            ArithKind::Sub => Some(MC_ARITH_SUB),
            ArithKind::Mul => Some(MC_ARITH_MUL),
            ArithKind::Div => Some(MC_ARITH_DIV),
            ArithKind::Rem => Some(MC_ARITH_REM),
            _ => None,
        },
        OpCategory::Bitops(kind) => match kind {
            BitKind::And => Some(MC_BITWISE_AND),
            BitKind::Or => Some(MC_BITWISE_OR),
            BitKind::Xor => Some(MC_BITWISE_XOR),
            BitKind::Shl => Some(MC_SHIFT_LEFT),
            BitKind::Shr => Some(MC_SHIFT_RIGHT),
            BitKind::Rotl => Some(MC_ROTATE_LEFT),
            BitKind::Rotr => Some(MC_ROTATE_RIGHT),
            BitKind::Clz => Some(MC_BITCOUNT_CLZ),
            BitKind::Ctz => Some(MC_BITCOUNT_CTZ),
            BitKind::Popcnt => Some(MC_BITCOUNT_POPCNT),
        },
        OpCategory::Convert => Some(MC_CONVERT),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JIT_MAX_STEPS_PER_OP;

    #[test]
    fn sequences_stay_within_the_step_bound() {
        for byte in 0..=255u8 {
            if let Some(steps) = microcode_steps(ExtOpcode::Core(byte)) {
                assert!(!steps.is_empty());
                assert!(steps.len() <= JIT_MAX_STEPS_PER_OP);
            }
        }
    }

    #[test]
    fn control_flow_has_no_microcode() {
        assert!(microcode_steps(ExtOpcode::Core(0x02)).is_none());
        assert!(microcode_steps(ExtOpcode::Core(0x10)).is_none());
        assert!(microcode_steps(ExtOpcode::Fc(10)).is_none());
    }

    #[test]
    fn alu_families_have_microcode() {
        assert!(microcode_steps(ExtOpcode::Core(0x6A)).is_some());
        assert!(microcode_steps(ExtOpcode::Core(0x7C)).is_some());
        assert!(microcode_steps(ExtOpcode::Core(0x46)).is_some());
        assert!(microcode_steps(ExtOpcode::Core(0xA8)).is_some());
    }
}
