use crate::ops::descriptor::{ArithKind, BitKind, CmpKind, NumKind, OpCategory, OpDescriptor};
use crate::ops::handlers::{mask_to_width, pop_int_bits, push_bool, push_int_bits, sign_extend};
use crate::runtime::Runtime;
use crate::types::{
    nearest_f32, nearest_f64, wasm_max_f32, wasm_max_f64, wasm_min_f32, wasm_min_f64,
    RuntimeError, TrapCode, ValType,
};
use crate::vm::Job;

/// Comparison operators for every numeric family.
///
/// Integer comparisons run in the widened signed or unsigned 64-bit
/// domain per the descriptor; float comparisons inherit IEEE NaN
/// behaviour from the primitive operators.
pub fn op_cmp(
    _runtime: &mut Runtime,
    job: &mut Job,
    descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let OpCategory::Cmp(kind) = descriptor.category else {
        return Err(RuntimeError::InvalidArgument);
    };
    let ty = descriptor.value_type;
    if ty.kind == NumKind::Float {
        let (lhs, rhs) = job.value_stack.pop2()?;
        let outcome = if ty.byte_width == 4 {
            let lhs = lhs.as_f32()?.to_float();
            let rhs = rhs.as_f32()?.to_float();
            float_cmp(kind, lhs as f64, rhs as f64)?
        } else {
            let lhs = lhs.as_f64()?.to_float();
            let rhs = rhs.as_f64()?.to_float();
            float_cmp(kind, lhs, rhs)?
        };
        return Ok(push_bool(job, outcome)?);
    }
    if kind == CmpKind::Eqz {
        let value = pop_int_bits(job, ty.byte_width)?;
        return Ok(push_bool(job, value == 0)?);
    }
    let rhs = pop_int_bits(job, ty.byte_width)?;
    let lhs = pop_int_bits(job, ty.byte_width)?;
    let outcome = if ty.signed {
        let bits = ty.byte_width * 8;
        let lhs = sign_extend(lhs, bits) as i64;
        let rhs = sign_extend(rhs, bits) as i64;
        match kind {
            CmpKind::Eq => lhs == rhs,
            CmpKind::Ne => lhs != rhs,
            CmpKind::Lt => lhs < rhs,
            CmpKind::Gt => lhs > rhs,
            CmpKind::Le => lhs <= rhs,
            CmpKind::Ge => lhs >= rhs,
            CmpKind::Eqz => unreachable!("handled above"),
        }
    } else {
        match kind {
            CmpKind::Eq => lhs == rhs,
            CmpKind::Ne => lhs != rhs,
            CmpKind::Lt => lhs < rhs,
            CmpKind::Gt => lhs > rhs,
            CmpKind::Le => lhs <= rhs,
            CmpKind::Ge => lhs >= rhs,
            CmpKind::Eqz => unreachable!("handled above"),
        }
    };
    Ok(push_bool(job, outcome)?)
}

fn float_cmp(kind: CmpKind, lhs: f64, rhs: f64) -> Result<bool, RuntimeError> {
    Ok(match kind {
        CmpKind::Eq => lhs == rhs,
        CmpKind::Ne => lhs != rhs,
        CmpKind::Lt => lhs < rhs,
        CmpKind::Gt => lhs > rhs,
        CmpKind::Le => lhs <= rhs,
        CmpKind::Ge => lhs >= rhs,
        CmpKind::Eqz => return Err(RuntimeError::InvalidArgument),
    })
}

/// Arithmetic for both numeric families, unary float operators
/// included.
pub fn op_arith(
    runtime: &mut Runtime,
    job: &mut Job,
    descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let OpCategory::Arith(kind) = descriptor.category else {
        return Err(RuntimeError::InvalidArgument);
    };
    arith_with(runtime, job, descriptor, kind)
}

/// The shared arithmetic body, also reachable from microcode steps
/// with a fixed operator.
pub(crate) fn arith_with(
    _runtime: &mut Runtime,
    job: &mut Job,
    descriptor: &'static OpDescriptor,
    kind: ArithKind,
) -> Result<(), RuntimeError> {
    let ty = descriptor.value_type;
    if ty.kind == NumKind::Float {
        return float_arith(job, ty.byte_width, kind);
    }
    let bits = ty.byte_width * 8;
    let rhs = pop_int_bits(job, ty.byte_width)?;
    let lhs = pop_int_bits(job, ty.byte_width)?;
    let outcome = if ty.signed {
        let lhs = sign_extend(lhs, bits) as i64;
        let rhs = sign_extend(rhs, bits) as i64;
        let min = if bits == 32 { i32::MIN as i64 } else { i64::MIN };
        match kind {
            ArithKind::Add => lhs.wrapping_add(rhs) as u64,
            ArithKind::Sub => lhs.wrapping_sub(rhs) as u64,
            ArithKind::Mul => lhs.wrapping_mul(rhs) as u64,
            ArithKind::Div => {
                if rhs == 0 {
                    return Err(TrapCode::IntegerDivisionByZero.into());
                }
                if lhs == min && rhs == -1 {
                    return Err(TrapCode::IntegerOverflow.into());
                }
                (lhs / rhs) as u64
            }
            ArithKind::Rem => {
                if rhs == 0 {
                    return Err(TrapCode::IntegerDivisionByZero.into());
                }
                lhs.wrapping_rem(rhs) as u64
            }
            _ => return Err(RuntimeError::Trap(TrapCode::TypeMismatch)),
        }
    } else {
        match kind {
            ArithKind::Add => lhs.wrapping_add(rhs),
            ArithKind::Sub => lhs.wrapping_sub(rhs),
            ArithKind::Mul => lhs.wrapping_mul(rhs),
            ArithKind::Div => {
                if rhs == 0 {
                    return Err(TrapCode::IntegerDivisionByZero.into());
                }
                lhs / rhs
            }
            ArithKind::Rem => {
                if rhs == 0 {
                    return Err(TrapCode::IntegerDivisionByZero.into());
                }
                lhs % rhs
            }
            _ => return Err(RuntimeError::Trap(TrapCode::TypeMismatch)),
        }
    };
    Ok(push_int_bits(job, mask_to_width(outcome, bits), bits)?)
}

fn float_arith(job: &mut Job, byte_width: u8, kind: ArithKind) -> Result<(), RuntimeError> {
    let unary = matches!(
        kind,
        ArithKind::Abs
            | ArithKind::Neg
            | ArithKind::Ceil
            | ArithKind::Floor
            | ArithKind::Trunc
            | ArithKind::Nearest
            | ArithKind::Sqrt
    );
    if byte_width == 4 {
        if unary {
            let value = job.value_stack.pop_typed(ValType::F32)?.as_f32()?.to_float();
            let outcome = match kind {
                ArithKind::Abs => libm::fabsf(value),
                ArithKind::Neg => -value,
                ArithKind::Ceil => libm::ceilf(value),
                ArithKind::Floor => libm::floorf(value),
                ArithKind::Trunc => libm::truncf(value),
                ArithKind::Nearest => nearest_f32(value),
                ArithKind::Sqrt => libm::sqrtf(value),
                _ => unreachable!("binary kinds handled below"),
            };
            return Ok(job.value_stack.push(outcome.into())?);
        }
        let (lhs, rhs) = job.value_stack.pop2()?;
        let lhs = lhs.as_f32()?.to_float();
        let rhs = rhs.as_f32()?.to_float();
        let outcome = match kind {
            ArithKind::Add => lhs + rhs,
            ArithKind::Sub => lhs - rhs,
            ArithKind::Mul => lhs * rhs,
            ArithKind::Div => lhs / rhs,
            ArithKind::Min => wasm_min_f32(lhs, rhs),
            ArithKind::Max => wasm_max_f32(lhs, rhs),
            ArithKind::Copysign => libm::copysignf(lhs, rhs),
            // floating-point rem has no Wasm operator
            ArithKind::Rem => return Err(RuntimeError::Trap(TrapCode::TypeMismatch)),
            _ => unreachable!("unary kinds handled above"),
        };
        return Ok(job.value_stack.push(outcome.into())?);
    }
    if unary {
        let value = job.value_stack.pop_typed(ValType::F64)?.as_f64()?.to_float();
        let outcome = match kind {
            ArithKind::Abs => libm::fabs(value),
            ArithKind::Neg => -value,
            ArithKind::Ceil => libm::ceil(value),
            ArithKind::Floor => libm::floor(value),
            ArithKind::Trunc => libm::trunc(value),
            ArithKind::Nearest => nearest_f64(value),
            ArithKind::Sqrt => libm::sqrt(value),
            _ => unreachable!("binary kinds handled below"),
        };
        return Ok(job.value_stack.push(outcome.into())?);
    }
    let (lhs, rhs) = job.value_stack.pop2()?;
    let lhs = lhs.as_f64()?.to_float();
    let rhs = rhs.as_f64()?.to_float();
    let outcome = match kind {
        ArithKind::Add => lhs + rhs,
        ArithKind::Sub => lhs - rhs,
        ArithKind::Mul => lhs * rhs,
        ArithKind::Div => lhs / rhs,
        ArithKind::Min => wasm_min_f64(lhs, rhs),
        ArithKind::Max => wasm_max_f64(lhs, rhs),
        ArithKind::Copysign => libm::copysign(lhs, rhs),
        ArithKind::Rem => return Err(RuntimeError::Trap(TrapCode::TypeMismatch)),
        _ => unreachable!("unary kinds handled above"),
    };
    Ok(job.value_stack.push(outcome.into())?)
}

/// Bit operations: logic, shifts, rotates and bit counts.
pub fn op_bitops(
    runtime: &mut Runtime,
    job: &mut Job,
    descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let OpCategory::Bitops(kind) = descriptor.category else {
        return Err(RuntimeError::InvalidArgument);
    };
    bitops_with(runtime, job, descriptor, kind)
}

/// The shared bit-operation body, also reachable from microcode steps.
pub(crate) fn bitops_with(
    _runtime: &mut Runtime,
    job: &mut Job,
    descriptor: &'static OpDescriptor,
    kind: BitKind,
) -> Result<(), RuntimeError> {
    let ty = descriptor.value_type;
    let bits = ty.byte_width * 8;
    if matches!(kind, BitKind::Clz | BitKind::Ctz | BitKind::Popcnt) {
        let value = pop_int_bits(job, ty.byte_width)?;
        let outcome = if bits == 32 {
            let value = value as u32;
            match kind {
                BitKind::Clz => value.leading_zeros() as u64,
                BitKind::Ctz => value.trailing_zeros() as u64,
                _ => value.count_ones() as u64,
            }
        } else {
            match kind {
                BitKind::Clz => value.leading_zeros() as u64,
                BitKind::Ctz => value.trailing_zeros() as u64,
                _ => value.count_ones() as u64,
            }
        };
        return Ok(push_int_bits(job, outcome, bits)?);
    }
    let rhs = pop_int_bits(job, ty.byte_width)?;
    let lhs = pop_int_bits(job, ty.byte_width)?;
    // shift and rotate amounts are masked to width - 1
    let amount = (rhs & (bits as u64 - 1)) as u32;
    let outcome = match kind {
        BitKind::And => lhs & rhs,
        BitKind::Or => lhs | rhs,
        BitKind::Xor => lhs ^ rhs,
        BitKind::Shl => mask_to_width(lhs << amount, bits),
        BitKind::Shr => {
            if ty.signed {
                let value = sign_extend(lhs, bits) as i64;
                mask_to_width((value >> amount) as u64, bits)
            } else {
                lhs >> amount
            }
        }
        BitKind::Rotl => {
            if bits == 32 {
                (lhs as u32).rotate_left(amount) as u64
            } else {
                lhs.rotate_left(amount)
            }
        }
        BitKind::Rotr => {
            if bits == 32 {
                (lhs as u32).rotate_right(amount) as u64
            } else {
                lhs.rotate_right(amount)
            }
        }
        _ => unreachable!("unary kinds handled above"),
    };
    Ok(push_int_bits(job, outcome, bits)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::descriptor::{descriptor_for, CORE_TABLE};
    use crate::ops::opcode::ExtOpcode;
    use crate::types::Value;
    use alloc::sync::Arc;

    fn fixture() -> (Runtime, Job) {
        let module = crate::loader::Module::from_bytes(
            wat::parse_str(r#"(module (func))"#).unwrap(),
        )
        .unwrap();
        let mut runtime = Runtime::new();
        let module = Arc::new(module);
        runtime.attach_module(Arc::clone(&module)).unwrap();
        let job = runtime.create_job().unwrap();
        (runtime, job)
    }

    fn desc(byte: u8) -> &'static OpDescriptor {
        descriptor_for(ExtOpcode::Core(byte)).unwrap()
    }

    #[test]
    fn add_wraps_in_width() {
        let (mut rt, mut job) = fixture();
        job.push_value(Value::I32(i32::MAX)).unwrap();
        job.push_value(Value::I32(1)).unwrap();
        op_arith(&mut rt, &mut job, desc(0x6A)).unwrap();
        assert_eq!(job.pop_value().unwrap(), Value::I32(i32::MIN));
    }

    #[test]
    fn div_traps() {
        let (mut rt, mut job) = fixture();
        job.push_value(Value::I32(4)).unwrap();
        job.push_value(Value::I32(0)).unwrap();
        let err = op_arith(&mut rt, &mut job, desc(0x6D)).unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Trap(TrapCode::IntegerDivisionByZero)
        ));

        let (mut rt, mut job) = fixture();
        job.push_value(Value::I32(i32::MIN)).unwrap();
        job.push_value(Value::I32(-1)).unwrap();
        let err = op_arith(&mut rt, &mut job, desc(0x6D)).unwrap_err();
        assert!(matches!(err, RuntimeError::Trap(TrapCode::IntegerOverflow)));
    }

    #[test]
    fn rem_of_min_by_minus_one_is_zero() {
        let (mut rt, mut job) = fixture();
        job.push_value(Value::I64(i64::MIN)).unwrap();
        job.push_value(Value::I64(-1)).unwrap();
        op_arith(&mut rt, &mut job, desc(0x81)).unwrap();
        assert_eq!(job.pop_value().unwrap(), Value::I64(0));
    }

    #[test]
    fn unsigned_comparison_uses_unsigned_domain() {
        let (mut rt, mut job) = fixture();
        job.push_value(Value::I32(-1)).unwrap();
        job.push_value(Value::I32(1)).unwrap();
        // -1 as u32 is huge, so lt_u is false
        op_cmp(&mut rt, &mut job, desc(0x49)).unwrap();
        assert_eq!(job.pop_value().unwrap(), Value::I32(0));

        job.push_value(Value::I32(-1)).unwrap();
        job.push_value(Value::I32(1)).unwrap();
        op_cmp(&mut rt, &mut job, desc(0x48)).unwrap();
        assert_eq!(job.pop_value().unwrap(), Value::I32(1));
    }

    #[test]
    fn shift_amounts_are_masked() {
        let (mut rt, mut job) = fixture();
        job.push_value(Value::I32(1)).unwrap();
        job.push_value(Value::I32(33)).unwrap();
        op_bitops(&mut rt, &mut job, desc(0x74)).unwrap();
        assert_eq!(job.pop_value().unwrap(), Value::I32(2));
    }

    #[test]
    fn rotates_and_counts() {
        let (mut rt, mut job) = fixture();
        job.push_value(Value::I32(0x8000_0001u32 as i32)).unwrap();
        job.push_value(Value::I32(1)).unwrap();
        op_bitops(&mut rt, &mut job, desc(0x77)).unwrap();
        assert_eq!(job.pop_value().unwrap(), Value::I32(3));

        job.push_value(Value::I32(0x0000_FF00)).unwrap();
        op_bitops(&mut rt, &mut job, desc(0x69)).unwrap();
        assert_eq!(job.pop_value().unwrap(), Value::I32(8));
    }

    #[test]
    fn type_mismatch_at_pop_traps() {
        let (mut rt, mut job) = fixture();
        job.push_value(Value::I64(1)).unwrap();
        job.push_value(Value::I32(2)).unwrap();
        let err = op_arith(&mut rt, &mut job, desc(0x6A)).unwrap_err();
        assert!(matches!(err, RuntimeError::Trap(TrapCode::TypeMismatch)));
    }

    #[test]
    fn every_alu_descriptor_routes_to_a_family_handler() {
        for byte in 0x45..=0xA6u16 {
            let descriptor = &CORE_TABLE[byte as usize];
            assert!(
                !descriptor.name.is_empty(),
                "gap in the alu range at 0x{byte:02x}"
            );
        }
    }
}
