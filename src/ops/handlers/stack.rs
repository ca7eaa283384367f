use crate::ops::descriptor::{NumKind, OpDescriptor};
use crate::runtime::Runtime;
use crate::types::{ExternRef, FuncRef, RuntimeError, TrapCode, ValType, Value, F32, F64};
use crate::vm::Job;

/// Constants of all four numeric types; the decoder already extended
/// the literal to the descriptor's width.
pub fn op_const(
    _runtime: &mut Runtime,
    job: &mut Job,
    descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let cell = job.reg.pop()?;
    let ty = descriptor.value_type;
    let value = match ty.kind {
        NumKind::Float => {
            if ty.byte_width == 4 {
                Value::F32(F32::from_bits(cell.bits as u32))
            } else {
                Value::F64(F64::from_bits(cell.bits))
            }
        }
        _ => Value::from_int_bits(cell.bits, ty.byte_width * 8),
    };
    Ok(job.value_stack.push(value)?)
}

pub fn op_drop(
    _runtime: &mut Runtime,
    job: &mut Job,
    _descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    job.value_stack.pop()?;
    Ok(())
}

pub fn op_select(
    _runtime: &mut Runtime,
    job: &mut Job,
    _descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let condition = job.value_stack.pop()?.truthy()?;
    let (lhs, rhs) = job.value_stack.pop2()?;
    if !lhs.matches_valtype(rhs.kind()) {
        return Err(TrapCode::TypeMismatch.into());
    }
    Ok(job.value_stack.push(if condition { lhs } else { rhs })?)
}

/// Typed `select`: additionally checks both operands against the
/// annotated type.
pub fn op_select_typed(
    _runtime: &mut Runtime,
    job: &mut Job,
    _descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let ty_byte = job.reg.pop()?.bits as u8;
    let expected =
        ValType::from_byte(ty_byte).ok_or(TrapCode::MalformedInstruction)?;
    let condition = job.value_stack.pop()?.truthy()?;
    let (lhs, rhs) = job.value_stack.pop2()?;
    if !lhs.matches_valtype(expected) || !rhs.matches_valtype(expected) {
        return Err(TrapCode::TypeMismatch.into());
    }
    Ok(job.value_stack.push(if condition { lhs } else { rhs })?)
}

fn local_slot<'a>(job: &'a mut Job, index: u32) -> Result<&'a mut Value, RuntimeError> {
    let frame = job
        .call_stack
        .last_mut()
        .ok_or(RuntimeError::InvalidArgument)?;
    frame
        .locals
        .get_mut(index as usize)
        .ok_or(RuntimeError::Trap(TrapCode::MalformedInstruction))
}

pub fn op_local_get(
    _runtime: &mut Runtime,
    job: &mut Job,
    _descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let index = job.reg.pop_u32()?;
    let value = *local_slot(job, index)?;
    Ok(job.value_stack.push(value)?)
}

pub fn op_local_set(
    _runtime: &mut Runtime,
    job: &mut Job,
    _descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let index = job.reg.pop_u32()?;
    let value = job.value_stack.pop()?;
    let slot = local_slot(job, index)?;
    if !value.matches_valtype(slot.kind()) {
        return Err(TrapCode::TypeMismatch.into());
    }
    *slot = value;
    Ok(())
}

pub fn op_local_tee(
    _runtime: &mut Runtime,
    job: &mut Job,
    _descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let index = job.reg.pop_u32()?;
    let value = *job
        .value_stack
        .peek(0)
        .ok_or(RuntimeError::Trap(TrapCode::StackUnderflow))?;
    let slot = local_slot(job, index)?;
    if !value.matches_valtype(slot.kind()) {
        return Err(TrapCode::TypeMismatch.into());
    }
    *slot = value;
    Ok(())
}

pub fn op_global_get(
    runtime: &mut Runtime,
    job: &mut Job,
    _descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let index = job.reg.pop_u32()?;
    let value = runtime.global(index)?.value;
    Ok(job.value_stack.push(value)?)
}

pub fn op_global_set(
    runtime: &mut Runtime,
    job: &mut Job,
    _descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let index = job.reg.pop_u32()?;
    let value = job.value_stack.pop()?;
    let slot = runtime.global_mut(index)?;
    if !slot.mutable || !value.matches_valtype(slot.value.kind()) {
        return Err(TrapCode::TypeMismatch.into());
    }
    slot.value = value;
    Ok(())
}

pub fn op_ref_null(
    _runtime: &mut Runtime,
    job: &mut Job,
    _descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let heap_type = job.reg.pop()?.bits as u8;
    let ty = ValType::from_byte(heap_type)
        .filter(ValType::is_ref)
        .ok_or(TrapCode::MalformedInstruction)?;
    let value = match ty {
        ValType::ExternRef => Value::ExternRef(ExternRef::null()),
        _ => Value::FuncRef(FuncRef::null()),
    };
    Ok(job.value_stack.push(value)?)
}

pub fn op_ref_is_null(
    _runtime: &mut Runtime,
    job: &mut Job,
    _descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let token = job.value_stack.pop()?.as_ref_token()?;
    Ok(job.value_stack.push(Value::I32((token == 0) as i32))?)
}

pub fn op_ref_func(
    _runtime: &mut Runtime,
    job: &mut Job,
    _descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let func_idx = job.reg.pop_u32()?;
    Ok(job
        .value_stack
        .push(Value::FuncRef(FuncRef::from_index(func_idx)))?)
}
