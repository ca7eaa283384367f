use crate::ops::descriptor::OpDescriptor;
use crate::runtime::Runtime;
use crate::types::{RuntimeError, TrapCode, Value};
use crate::vm::Job;

pub fn op_table_get(
    runtime: &mut Runtime,
    job: &mut Job,
    _descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let table_idx = job.reg.pop_u32()?;
    let index = job.value_stack.pop_i32()? as u32;
    let value = runtime.table(table_idx)?.get(index)?;
    Ok(job.value_stack.push(value)?)
}

pub fn op_table_set(
    runtime: &mut Runtime,
    job: &mut Job,
    _descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let table_idx = job.reg.pop_u32()?;
    let value = job.value_stack.pop()?;
    let index = job.value_stack.pop_i32()? as u32;
    runtime.table_mut(table_idx)?.set(index, value)?;
    Ok(())
}

/// `table.init`: copies out of a (possibly dropped) element segment
/// with full pre-validation.
pub fn op_table_init(
    runtime: &mut Runtime,
    job: &mut Job,
    _descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let table_idx = job.reg.pop_u32()?;
    let elem_idx = job.reg.pop_u32()?;
    let count = job.value_stack.pop_i32()? as u32;
    let src = job.value_stack.pop_i32()? as u32;
    let dst = job.value_stack.pop_i32()? as u32;
    runtime.table_init(table_idx, elem_idx, dst, src, count)
}

/// `elem.drop`: marks the segment empty; idempotent.
pub fn op_elem_drop(
    runtime: &mut Runtime,
    job: &mut Job,
    _descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let elem_idx = job.reg.pop_u32()?;
    runtime.drop_elem_segment(elem_idx)
}

pub fn op_table_copy(
    runtime: &mut Runtime,
    job: &mut Job,
    _descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let src_table = job.reg.pop_u32()?;
    let dst_table = job.reg.pop_u32()?;
    let count = job.value_stack.pop_i32()? as u32;
    let src = job.value_stack.pop_i32()? as u32;
    let dst = job.value_stack.pop_i32()? as u32;
    runtime.copy_table_range(dst_table, dst, src_table, src, count)?;
    Ok(())
}

/// `table.grow`: previous size on success, `-1` on refusal. Never
/// traps on the growth itself.
pub fn op_table_grow(
    runtime: &mut Runtime,
    job: &mut Job,
    _descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let table_idx = job.reg.pop_u32()?;
    let delta = job.value_stack.pop_i32()? as u32;
    let init = job.value_stack.pop()?;
    if !init.kind().is_ref() {
        return Err(TrapCode::TypeMismatch.into());
    }
    let outcome = runtime
        .table_mut(table_idx)?
        .grow(delta, init)
        .map(|prev| prev as i32)
        .unwrap_or(-1);
    Ok(job.value_stack.push(Value::I32(outcome))?)
}

pub fn op_table_size(
    runtime: &mut Runtime,
    job: &mut Job,
    _descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let table_idx = job.reg.pop_u32()?;
    let size = runtime.table(table_idx)?.size();
    Ok(job.value_stack.push(Value::I32(size as i32))?)
}

pub fn op_table_fill(
    runtime: &mut Runtime,
    job: &mut Job,
    _descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let table_idx = job.reg.pop_u32()?;
    let count = job.value_stack.pop_i32()? as u32;
    let value = job.value_stack.pop()?;
    let dst = job.value_stack.pop_i32()? as u32;
    runtime.table_mut(table_idx)?.fill(dst, value, count)?;
    Ok(())
}
