use crate::ops::descriptor::OpDescriptor;
use crate::ops::handlers::pop_address;
use crate::ops::opcode::{ExtOpcode, SimdOpcode};
use crate::runtime::Runtime;
use crate::types::{RuntimeError, TrapCode, ValType, Value, V128};
use crate::vm::Job;

fn simd_op(descriptor: &OpDescriptor) -> Result<SimdOpcode, RuntimeError> {
    match descriptor.ext {
        ExtOpcode::Simd(sub) => {
            SimdOpcode::from_u32(sub).ok_or(RuntimeError::UnimplementedOpcode(0xFD))
        }
        _ => Err(RuntimeError::InvalidArgument),
    }
}

pub fn op_v128_const(
    _runtime: &mut Runtime,
    job: &mut Job,
    _descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let hi = job.reg.pop_u64()?;
    let lo = job.reg.pop_u64()?;
    let bits = (hi as u128) << 64 | lo as u128;
    Ok(job.value_stack.push(Value::V128(V128::from_bits(bits)))?)
}

pub fn op_v128_load(
    runtime: &mut Runtime,
    job: &mut Job,
    _descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let offset = job.reg.pop_u64()?;
    let memory_idx = job.reg.pop_u32()?;
    let _align = job.reg.pop_u32()?;
    runtime.ensure_memory_loaded(memory_idx)?;
    let is_memory64 = runtime.memory(memory_idx)?.is_memory64();
    let address = pop_address(job, is_memory64)?;
    let effective = address
        .checked_add(offset)
        .ok_or(TrapCode::MemoryOutOfBounds)?;
    let memory = runtime.memory(memory_idx)?;
    memory.check_range(effective, 16)?;
    let mut bytes = [0u8; 16];
    memory.read(effective, &mut bytes)?;
    Ok(job
        .value_stack
        .push(Value::V128(V128::from_le_bytes(bytes)))?)
}

pub fn op_v128_store(
    runtime: &mut Runtime,
    job: &mut Job,
    _descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let offset = job.reg.pop_u64()?;
    let memory_idx = job.reg.pop_u32()?;
    let _align = job.reg.pop_u32()?;
    let vector = job.value_stack.pop_typed(ValType::V128)?.as_v128()?;
    runtime.ensure_memory_loaded(memory_idx)?;
    let is_memory64 = runtime.memory(memory_idx)?.is_memory64();
    let address = pop_address(job, is_memory64)?;
    let effective = address
        .checked_add(offset)
        .ok_or(TrapCode::MemoryOutOfBounds)?;
    let memory = runtime.memory_mut(memory_idx)?;
    memory.write(effective, &vector.to_le_bytes())?;
    Ok(())
}

/// All four integer splats, selected by the descriptor's lane width.
pub fn op_splat(
    _runtime: &mut Runtime,
    job: &mut Job,
    descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let vector = match descriptor.size_arg {
        8 => V128::splat_i8(job.value_stack.pop_i32()? as u8),
        16 => V128::splat_i16(job.value_stack.pop_i32()? as u16),
        32 => V128::splat_i32(job.value_stack.pop_i32()? as u32),
        _ => V128::splat_i64(job.value_stack.pop_i64()? as u64),
    };
    Ok(job.value_stack.push(Value::V128(vector))?)
}

pub fn op_lane_extract(
    _runtime: &mut Runtime,
    job: &mut Job,
    descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let lane = job.reg.pop()?.bits as u8;
    let vector = job.value_stack.pop_typed(ValType::V128)?.as_v128()?;
    let value = match descriptor.size_arg {
        8 => {
            let lane_value = vector.lane_i8(lane);
            if descriptor.value_type.signed {
                Value::I32(lane_value as i8 as i32)
            } else {
                Value::I32(lane_value as i32)
            }
        }
        _ => Value::I32(vector.lane_i32(lane) as i32),
    };
    Ok(job.value_stack.push(value)?)
}

pub fn op_lane_replace(
    _runtime: &mut Runtime,
    job: &mut Job,
    descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let lane = job.reg.pop()?.bits as u8;
    let replacement = job.value_stack.pop_i32()?;
    let vector = job.value_stack.pop_typed(ValType::V128)?.as_v128()?;
    let vector = match descriptor.size_arg {
        8 => vector.with_lane_i8(lane, replacement as u8),
        _ => vector.with_lane_i32(lane, replacement as u32),
    };
    Ok(job.value_stack.push(Value::V128(vector))?)
}

pub fn op_i8x16_add(
    _runtime: &mut Runtime,
    job: &mut Job,
    _descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let rhs = job.value_stack.pop_typed(ValType::V128)?.as_v128()?;
    let lhs = job.value_stack.pop_typed(ValType::V128)?.as_v128()?;
    Ok(job.value_stack.push(Value::V128(lhs.i8x16_add(rhs)))?)
}

pub fn op_trunc_sat_f32x4(
    _runtime: &mut Runtime,
    job: &mut Job,
    descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    simd_op(descriptor)?;
    let vector = job.value_stack.pop_typed(ValType::V128)?.as_v128()?;
    Ok(job
        .value_stack
        .push(Value::V128(vector.i32x4_trunc_sat_f32x4_s()))?)
}
