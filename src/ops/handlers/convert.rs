use crate::ops::descriptor::OpDescriptor;
use crate::ops::handlers::sign_extend;
use crate::ops::opcode::ExtOpcode;
use crate::runtime::Runtime;
use crate::types::{
    trunc_f32_to_i32, trunc_f32_to_i64, trunc_f32_to_u32, trunc_f32_to_u64, trunc_f64_to_i32,
    trunc_f64_to_i64, trunc_f64_to_u32, trunc_f64_to_u64, trunc_sat_f32_to_i32,
    trunc_sat_f32_to_i64, trunc_sat_f32_to_u32, trunc_sat_f32_to_u64, trunc_sat_f64_to_i32,
    trunc_sat_f64_to_i64, trunc_sat_f64_to_u32, trunc_sat_f64_to_u64, RuntimeError, TrapCode,
    ValType, Value, F32, F64,
};
use crate::vm::Job;

/// Every conversion operator: wraps, extensions, truncations (both
/// trapping and saturating), float conversions and reinterprets.
///
/// The operator is selected by the opcode identity; operand kinds are
/// re-checked at the pops like everywhere else.
pub fn op_convert(
    _runtime: &mut Runtime,
    job: &mut Job,
    descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let stack = &mut job.value_stack;
    let value = match descriptor.ext {
        ExtOpcode::Core(byte) => match byte {
            // i32.wrap_i64
            0xA7 => Value::I32(stack.pop_i64()? as i32),
            // trapping float -> int truncations
            0xA8 => Value::I32(trunc_f32_to_i32(pop_f32(stack)?)?),
            0xA9 => Value::I32(trunc_f32_to_u32(pop_f32(stack)?)? as i32),
            0xAA => Value::I32(trunc_f64_to_i32(pop_f64(stack)?)?),
            0xAB => Value::I32(trunc_f64_to_u32(pop_f64(stack)?)? as i32),
            0xAC => Value::I64(stack.pop_i32()? as i64),
            0xAD => Value::I64(stack.pop_i32()? as u32 as i64),
            0xAE => Value::I64(trunc_f32_to_i64(pop_f32(stack)?)?),
            0xAF => Value::I64(trunc_f32_to_u64(pop_f32(stack)?)? as i64),
            0xB0 => Value::I64(trunc_f64_to_i64(pop_f64(stack)?)?),
            0xB1 => Value::I64(trunc_f64_to_u64(pop_f64(stack)?)? as i64),
            // int -> float conversions
            0xB2 => (stack.pop_i32()? as f32).into(),
            0xB3 => (stack.pop_i32()? as u32 as f32).into(),
            0xB4 => (stack.pop_i64()? as f32).into(),
            0xB5 => (stack.pop_i64()? as u64 as f32).into(),
            0xB6 => (pop_f64(stack)? as f32).into(),
            0xB7 => (stack.pop_i32()? as f64).into(),
            0xB8 => (stack.pop_i32()? as u32 as f64).into(),
            0xB9 => (stack.pop_i64()? as f64).into(),
            0xBA => (stack.pop_i64()? as u64 as f64).into(),
            0xBB => (pop_f32(stack)? as f64).into(),
            // reinterprets preserve the raw bits
            0xBC => Value::I32(stack.pop_typed(ValType::F32)?.as_f32()?.to_bits() as i32),
            0xBD => Value::I64(stack.pop_typed(ValType::F64)?.as_f64()?.to_bits() as i64),
            0xBE => Value::F32(F32::from_bits(stack.pop_i32()? as u32)),
            0xBF => Value::F64(F64::from_bits(stack.pop_i64()? as u64)),
            // sign extensions within one width
            0xC0 | 0xC1 => {
                let value = stack.pop_i32()? as u32 as u64;
                Value::I32(sign_extend(value, descriptor.size_arg) as i32)
            }
            0xC2 | 0xC3 | 0xC4 => {
                let value = stack.pop_i64()? as u64;
                Value::I64(sign_extend(value, descriptor.size_arg) as i64)
            }
            _ => return Err(RuntimeError::UnimplementedOpcode(byte)),
        },
        ExtOpcode::Fc(sub) => match sub {
            0 => Value::I32(trunc_sat_f32_to_i32(pop_f32(stack)?)),
            1 => Value::I32(trunc_sat_f32_to_u32(pop_f32(stack)?) as i32),
            2 => Value::I32(trunc_sat_f64_to_i32(pop_f64(stack)?)),
            3 => Value::I32(trunc_sat_f64_to_u32(pop_f64(stack)?) as i32),
            4 => Value::I64(trunc_sat_f32_to_i64(pop_f32(stack)?)),
            5 => Value::I64(trunc_sat_f32_to_u64(pop_f32(stack)?) as i64),
            6 => Value::I64(trunc_sat_f64_to_i64(pop_f64(stack)?)),
            7 => Value::I64(trunc_sat_f64_to_u64(pop_f64(stack)?) as i64),
            _ => return Err(RuntimeError::UnimplementedOpcode(0xFC)),
        },
        ExtOpcode::Simd(_) => return Err(RuntimeError::UnimplementedOpcode(0xFD)),
    };
    Ok(job.value_stack.push(value)?)
}

fn pop_f32(stack: &mut crate::vm::ValueStack) -> Result<f32, TrapCode> {
    Ok(stack.pop_typed(ValType::F32)?.as_f32()?.to_float())
}

fn pop_f64(stack: &mut crate::vm::ValueStack) -> Result<f64, TrapCode> {
    Ok(stack.pop_typed(ValType::F64)?.as_f64()?.to_float())
}
