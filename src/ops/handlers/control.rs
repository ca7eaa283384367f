use crate::ops::decode::{block_type_arities, scan_block_bounds};
use crate::ops::descriptor::OpDescriptor;
use crate::runtime::Runtime;
use crate::types::{RuntimeError, TrapCode};
use crate::vm::executor::{branch_to_label, call_function, do_return};
use crate::vm::{ControlFrame, Job, LabelKind};

pub fn op_unreachable(
    _runtime: &mut Runtime,
    _job: &mut Job,
    _descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    Err(TrapCode::UnreachableCodeReached.into())
}

pub fn op_nop(
    _runtime: &mut Runtime,
    _job: &mut Job,
    _descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    Ok(())
}

fn push_structured_frame(
    job: &mut Job,
    kind: LabelKind,
    raw_block_type: i64,
) -> Result<(), RuntimeError> {
    let module = job
        .stream
        .module()
        .cloned()
        .ok_or(RuntimeError::NoModule)?;
    let (params, results) = block_type_arities(&module, raw_block_type)?;
    let body_start = job.stream.pc();
    let (else_pc, end_pc) = scan_block_bounds(&mut job.stream, body_start)?;
    let stack_height = job
        .value_stack
        .len()
        .checked_sub(params)
        .ok_or(RuntimeError::Trap(TrapCode::StackUnderflow))?;
    let branch_arity = match kind {
        LabelKind::Loop => params,
        _ => results,
    };
    let target_pc = match kind {
        LabelKind::Loop => body_start,
        // branching out of a block or if lands just past its `end`
        _ => end_pc + 1,
    };
    job.control_stack.push(ControlFrame {
        kind,
        branch_arity,
        stack_height,
        target_pc,
        end_pc,
        else_pc,
    });
    Ok(())
}

pub fn op_block(
    _runtime: &mut Runtime,
    job: &mut Job,
    _descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let raw = job.reg.pop_u64()? as i64;
    push_structured_frame(job, LabelKind::Block, raw)
}

pub fn op_loop(
    _runtime: &mut Runtime,
    job: &mut Job,
    _descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let raw = job.reg.pop_u64()? as i64;
    push_structured_frame(job, LabelKind::Loop, raw)
}

pub fn op_if(
    _runtime: &mut Runtime,
    job: &mut Job,
    _descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let raw = job.reg.pop_u64()? as i64;
    let condition = job.value_stack.pop()?.truthy()?;
    push_structured_frame(job, LabelKind::If, raw)?;
    if !condition {
        let frame = job.control_stack.label(0)?;
        // fall into the else arm, or straight onto the `end` which
        // pops the frame
        let target = frame.else_pc.unwrap_or(frame.end_pc);
        job.stream.set_pc(target)?;
    }
    Ok(())
}

/// Reached only when the then-arm ran to completion: skip over the
/// else arm onto the frame's `end`.
pub fn op_else(
    _runtime: &mut Runtime,
    job: &mut Job,
    _descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let frame = job.control_stack.label(0)?;
    let end_pc = frame.end_pc;
    job.stream.set_pc(end_pc)?;
    Ok(())
}

/// Closes the innermost structured frame, or returns from the current
/// call frame when the body itself ends.
pub fn op_end(
    runtime: &mut Runtime,
    job: &mut Job,
    _descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let control_base = job
        .call_stack
        .last()
        .map(|frame| frame.control_base)
        .unwrap_or(0);
    if job.control_stack.len() > control_base {
        job.control_stack.pop()?;
        return Ok(());
    }
    do_return(runtime, job)
}

pub fn op_br(
    runtime: &mut Runtime,
    job: &mut Job,
    _descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let depth = job.reg.pop_u32()?;
    branch_to_label(runtime, job, depth)
}

pub fn op_br_if(
    runtime: &mut Runtime,
    job: &mut Job,
    _descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let depth = job.reg.pop_u32()?;
    let condition = job.value_stack.pop()?.truthy()?;
    if condition {
        branch_to_label(runtime, job, depth)?;
    }
    Ok(())
}

/// Re-reads the label vector through the instruction stream and picks
/// the i-th entry or the trailing default.
pub fn op_br_table(
    runtime: &mut Runtime,
    job: &mut Job,
    _descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let vector_pc = job.reg.pop_u64()? as usize;
    let count = job.reg.pop_u32()?;
    let index = job.value_stack.pop_i32()? as u32;
    let chosen_slot = index.min(count);
    job.stream.set_pc(vector_pc)?;
    let mut chosen = 0u32;
    for slot in 0..=count {
        let label = job.stream.read_uleb32()?;
        if slot == chosen_slot {
            chosen = label;
        }
    }
    branch_to_label(runtime, job, chosen)
}

pub fn op_return(
    runtime: &mut Runtime,
    job: &mut Job,
    _descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    do_return(runtime, job)
}

pub fn op_call(
    runtime: &mut Runtime,
    job: &mut Job,
    _descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let func_idx = job.reg.pop_u32()?;
    call_function(runtime, job, func_idx)
}

/// Pops the element index, reads a funcref out of the table and
/// dynamically checks the callee's declared type.
pub fn op_call_indirect(
    runtime: &mut Runtime,
    job: &mut Job,
    _descriptor: &'static OpDescriptor,
) -> Result<(), RuntimeError> {
    let table_idx = job.reg.pop_u32()?;
    let type_idx = job.reg.pop_u32()?;
    let element = job.value_stack.pop_i32()? as u32;
    let value = runtime.table(table_idx)?.get(element)?;
    let func_ref = value.as_func_ref()?;
    let func_idx = func_ref
        .index()
        .ok_or(RuntimeError::Trap(TrapCode::IndirectCallToNull))?;
    let module = runtime.module()?.clone();
    let entry = module
        .function(func_idx)
        .ok_or(RuntimeError::Trap(TrapCode::TableOutOfBounds))?;
    if entry.type_idx != type_idx {
        return Err(TrapCode::BadSignature.into());
    }
    call_function(runtime, job, func_idx)
}
