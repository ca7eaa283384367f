use crate::ops::descriptor::{NumKind, OpDescriptor};
use crate::ops::handlers::{pop_address, sign_extend};
use crate::runtime::Runtime;
use crate::types::{RuntimeError, TrapCode, ValType, Value, F32, F64};
use crate::vm::Job;

/// Loads of every width and sign, one handler driven by the
/// descriptor.
pub fn op_load(
    runtime: &mut Runtime,
    job: &mut Job,
    descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let offset = job.reg.pop_u64()?;
    let memory_idx = job.reg.pop_u32()?;
    let _align = job.reg.pop_u32()?;
    runtime.ensure_memory_loaded(memory_idx)?;
    let is_memory64 = runtime.memory(memory_idx)?.is_memory64();
    let address = pop_address(job, is_memory64)?;
    let access_size = (descriptor.size_arg / 8) as u64;
    let effective = address
        .checked_add(offset)
        .ok_or(TrapCode::MemoryOutOfBounds)?;
    let memory = runtime.memory(memory_idx)?;
    memory.check_range(effective, access_size)?;
    let mut bytes = [0u8; 8];
    memory.read(effective, &mut bytes[..access_size as usize])?;
    let raw = u64::from_le_bytes(bytes);
    let ty = descriptor.value_type;
    let value = match ty.kind {
        NumKind::Float => {
            if ty.byte_width == 4 {
                Value::F32(F32::from_bits(raw as u32))
            } else {
                Value::F64(F64::from_bits(raw))
            }
        }
        _ => {
            let bits = if ty.signed {
                sign_extend(raw, descriptor.size_arg)
            } else {
                raw
            };
            Value::from_int_bits(bits, ty.byte_width * 8)
        }
    };
    Ok(job.value_stack.push(value)?)
}

/// Stores of every width, symmetric to [`op_load`].
pub fn op_store(
    runtime: &mut Runtime,
    job: &mut Job,
    descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let offset = job.reg.pop_u64()?;
    let memory_idx = job.reg.pop_u32()?;
    let _align = job.reg.pop_u32()?;
    let ty = descriptor.value_type;
    let raw = match ty.kind {
        NumKind::Float => {
            if ty.byte_width == 4 {
                job.value_stack.pop_typed(ValType::F32)?.as_f32()?.to_bits() as u64
            } else {
                job.value_stack.pop_typed(ValType::F64)?.as_f64()?.to_bits()
            }
        }
        _ => {
            let expected = if ty.byte_width == 4 {
                ValType::I32
            } else {
                ValType::I64
            };
            job.value_stack.pop_typed(expected)?.int_bits()?
        }
    };
    runtime.ensure_memory_loaded(memory_idx)?;
    let is_memory64 = runtime.memory(memory_idx)?.is_memory64();
    let address = pop_address(job, is_memory64)?;
    let access_size = (descriptor.size_arg / 8) as usize;
    let effective = address
        .checked_add(offset)
        .ok_or(TrapCode::MemoryOutOfBounds)?;
    let memory = runtime.memory_mut(memory_idx)?;
    memory.write(effective, &raw.to_le_bytes()[..access_size])?;
    Ok(())
}

/// `memory.size`: the current page count at the memory's index width.
pub fn op_memory_size(
    runtime: &mut Runtime,
    job: &mut Job,
    _descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let memory_idx = job.reg.pop_u32()?;
    let memory = runtime.memory(memory_idx)?;
    let pages = memory.pages();
    let value = if memory.is_memory64() {
        Value::I64(pages as i64)
    } else {
        Value::I32(pages as i32)
    };
    Ok(job.value_stack.push(value)?)
}

/// `memory.grow`: previous page count on success, the all-ones
/// sentinel on any refusal. Never traps on the growth itself.
pub fn op_memory_grow(
    runtime: &mut Runtime,
    job: &mut Job,
    _descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let memory_idx = job.reg.pop_u32()?;
    runtime.ensure_memory_loaded(memory_idx)?;
    let is_memory64 = runtime.memory(memory_idx)?.is_memory64();
    let delta = if is_memory64 {
        job.value_stack.pop_i64()? as u64
    } else {
        job.value_stack.pop_i32()? as u32 as u64
    };
    let memory = runtime.memory_mut(memory_idx)?;
    let outcome = memory.grow(delta).unwrap_or(memory.grow_sentinel());
    let value = if is_memory64 {
        Value::I64(outcome as i64)
    } else {
        Value::I32(outcome as i32)
    };
    Ok(job.value_stack.push(value)?)
}

/// `memory.init`: copies out of a (possibly dropped) data segment with
/// full pre-validation of both ranges.
pub fn op_memory_init(
    runtime: &mut Runtime,
    job: &mut Job,
    _descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let memory_idx = job.reg.pop_u32()?;
    let data_idx = job.reg.pop_u32()?;
    let count = job.value_stack.pop_i32()? as u32 as u64;
    let src = job.value_stack.pop_i32()? as u32 as u64;
    runtime.ensure_memory_loaded(memory_idx)?;
    let is_memory64 = runtime.memory(memory_idx)?.is_memory64();
    let dst = pop_address(job, is_memory64)?;
    let bytes = runtime.data_segment_bytes(data_idx)?;
    let src_end = src.checked_add(count).ok_or(TrapCode::MemoryOutOfBounds)?;
    if src_end > bytes.len() as u64 {
        return Err(TrapCode::MemoryOutOfBounds.into());
    }
    let memory = runtime.memory_mut(memory_idx)?;
    memory.check_range(dst, count)?;
    memory.write(dst, &bytes[src as usize..src_end as usize])?;
    Ok(())
}

/// `data.drop`: marks the segment empty; idempotent.
pub fn op_data_drop(
    runtime: &mut Runtime,
    job: &mut Job,
    _descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let data_idx = job.reg.pop_u32()?;
    runtime.drop_data_segment(data_idx)
}

/// `memory.copy`: both ranges validated up front, then one move; the
/// overlap behaves like `memmove`.
pub fn op_memory_copy(
    runtime: &mut Runtime,
    job: &mut Job,
    _descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let src_memory = job.reg.pop_u32()?;
    let dst_memory = job.reg.pop_u32()?;
    runtime.ensure_memory_loaded(src_memory)?;
    if dst_memory != src_memory {
        runtime.ensure_memory_loaded(dst_memory)?;
    }
    let src_is_64 = runtime.memory(src_memory)?.is_memory64();
    let dst_is_64 = runtime.memory(dst_memory)?.is_memory64();
    let count = if src_is_64 && dst_is_64 {
        job.value_stack.pop_i64()? as u64
    } else {
        job.value_stack.pop_i32()? as u32 as u64
    };
    let src = pop_address(job, src_is_64)?;
    let dst = pop_address(job, dst_is_64)?;
    runtime.copy_memory_range(dst_memory, dst, src_memory, src, count)?;
    Ok(())
}

/// `memory.fill` with a single pre-validated range.
pub fn op_memory_fill(
    runtime: &mut Runtime,
    job: &mut Job,
    _descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let memory_idx = job.reg.pop_u32()?;
    runtime.ensure_memory_loaded(memory_idx)?;
    let is_memory64 = runtime.memory(memory_idx)?.is_memory64();
    let count = if is_memory64 {
        job.value_stack.pop_i64()? as u64
    } else {
        job.value_stack.pop_i32()? as u32 as u64
    };
    let byte = job.value_stack.pop_i32()? as u8;
    let dst = pop_address(job, is_memory64)?;
    let memory = runtime.memory_mut(memory_idx)?;
    memory.check_range(dst, count)?;
    let data = memory.data_mut()?;
    data[dst as usize..(dst + count) as usize].fill(byte);
    Ok(())
}
