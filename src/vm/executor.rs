use crate::loader::{FuncType, FunctionOrigin};
use crate::ops::decode::{read_immediates, read_locals_decl, read_opcode};
use crate::ops::{descriptor_for, microcode_steps};
use crate::runtime::{HostCall, Runtime};
use crate::types::{ImportName, RuntimeError, TrapCode, Value};
use crate::vm::{CallFrame, Job, JobStatus, LabelKind};
use alloc::vec::Vec;

/// Hard cap on declared locals, keeping a hostile locals declaration
/// from allocating unbounded memory.
const MAX_DECLARED_LOCALS: u64 = 65_536;

/// Runs one invocation of `function_idx` on `job`.
///
/// A job suspended at a trap is reset to a fresh state first. On any
/// error the register window is cleared and the job lands in
/// `SuspendedAtTrap`; prepared programs and memories are untouched.
pub(crate) fn execute_job(
    runtime: &mut Runtime,
    job: &mut Job,
    function_idx: u32,
) -> Result<(), RuntimeError> {
    runtime.module()?;
    if job.status == JobStatus::SuspendedAtTrap {
        job.reset();
    }
    job.status = JobStatus::Running;
    match run_invocation(runtime, job, function_idx) {
        Ok(()) => {
            job.status = JobStatus::Finished;
            Ok(())
        }
        Err(err) => {
            if let Some(absolute) = job.stream.absolute_offset() {
                if let Some((function, offset)) = job.stream.locate_absolute(absolute) {
                    log::debug!("trap in fn {function} at +{offset}: {err}");
                }
            }
            job.reg.clear();
            job.status = JobStatus::SuspendedAtTrap;
            Err(err)
        }
    }
}

fn run_invocation(
    runtime: &mut Runtime,
    job: &mut Job,
    function_idx: u32,
) -> Result<(), RuntimeError> {
    enter_function(runtime, job, function_idx, true)?;
    while job.status == JobStatus::Running {
        if job.call_stack.is_empty() {
            job.status = JobStatus::Finished;
            break;
        }
        step(runtime, job)?;
    }
    Ok(())
}

/// Fetch, decode, dispatch: one opcode.
fn step(runtime: &mut Runtime, job: &mut Job) -> Result<(), RuntimeError> {
    // bodies end with an explicit `end`; running off the window
    // unwinds the same way
    if job.stream.at_end() {
        return do_return(runtime, job);
    }
    let op_pc = job.stream.pc();
    let ext = read_opcode(&mut job.stream)?;
    let descriptor =
        descriptor_for(ext).ok_or(RuntimeError::UnimplementedOpcode(ext.lead_byte()))?;
    read_immediates(ext, &mut job.stream, Some(&mut job.reg))?;
    runtime.jit_stats.executed_ops += 1;

    #[cfg(feature = "debug-print")]
    {
        let height = job.value_stack.len();
        let top: alloc::vec::Vec<_> =
            job.value_stack.as_slice().iter().rev().take(8).collect();
        println!("{op_pc}:\t{}\tstack({height}):{top:?}", descriptor.name);
    }

    let prepared = job
        .call_stack
        .last()
        .and_then(|frame| frame.prepared.clone());
    if let Some(program) = prepared {
        if let Some(op) = program.op_at(op_pc) {
            for step in op.steps.iter() {
                step(runtime, job, op.descriptor)?;
            }
            return Ok(());
        }
    }

    runtime.jit_stats.decoded_ops += 1;
    if runtime.microcode_enabled {
        if let Some(steps) = microcode_steps(ext) {
            for step in steps {
                step(runtime, job, descriptor)?;
            }
            return Ok(());
        }
    }
    (descriptor.handler)(runtime, job, descriptor)
}

/// `call` and `call_indirect` funnel through here.
pub(crate) fn call_function(
    runtime: &mut Runtime,
    job: &mut Job,
    function_idx: u32,
) -> Result<(), RuntimeError> {
    enter_function(runtime, job, function_idx, false)
}

fn enter_function(
    runtime: &mut Runtime,
    job: &mut Job,
    function_idx: u32,
    is_entry: bool,
) -> Result<(), RuntimeError> {
    let module = runtime.module()?.clone();
    let entry = module
        .function(function_idx)
        .ok_or(RuntimeError::InvalidArgument)?;
    let func_type = module
        .func_type_of(function_idx)
        .ok_or(RuntimeError::InvalidArgument)?
        .clone();
    if let FunctionOrigin::Imported(name) = &entry.origin {
        return invoke_host_import(runtime, job, function_idx, name.clone(), &func_type);
    }
    if job.call_stack.len() >= runtime.config.max_call_depth {
        return Err(RuntimeError::CallDepthExceeded);
    }

    // function-entry trap hook, the host's chance to materialise the
    // program or pages on demand
    if runtime.function_trap_enabled(function_idx) {
        if let Some(mut hook) = runtime.trap_hook.take() {
            let outcome = hook(runtime, function_idx);
            if runtime.trap_hook.is_none() {
                runtime.trap_hook = Some(hook);
            }
            outcome?;
        }
    }

    let mut args = Vec::with_capacity(func_type.params.len());
    for param in func_type.params.iter().rev() {
        args.push(job.value_stack.pop_typed(*param)?);
    }
    args.reverse();

    let return_function = job.stream.function_idx();
    let return_pc = job.stream.pc();
    job.stream.load(function_idx)?;

    let groups = read_locals_decl(&mut job.stream)?;
    let mut locals = args;
    let mut declared: u64 = 0;
    for (count, val_type) in groups {
        declared += count as u64;
        if declared > MAX_DECLARED_LOCALS {
            return Err(RuntimeError::OutOfMemory);
        }
        for _ in 0..count {
            locals.push(Value::default_for(val_type));
        }
    }

    let prepared = runtime.acquire_prepared(function_idx, &mut job.stream);
    job.call_stack.push(CallFrame {
        function_idx,
        return_function: if is_entry { None } else { return_function },
        return_pc,
        stack_base: job.value_stack.len(),
        control_base: job.control_stack.len(),
        locals,
        result_arity: func_type.results.len(),
        prepared,
    });
    Ok(())
}

fn invoke_host_import(
    runtime: &mut Runtime,
    job: &mut Job,
    function_idx: u32,
    name: ImportName,
    func_type: &FuncType,
) -> Result<(), RuntimeError> {
    let mut args = Vec::with_capacity(func_type.params.len());
    for param in func_type.params.iter().rev() {
        args.push(job.value_stack.pop_typed(*param)?);
    }
    args.reverse();
    let mut results: Vec<Value> = func_type
        .results
        .iter()
        .map(|ty| Value::default_for(*ty))
        .collect();
    let mut results_set = alloc::vec![false; results.len()];

    let mut function = runtime
        .take_host_function(&name)
        .ok_or(RuntimeError::InvalidArgument)?;
    let outcome = {
        let mut call = HostCall {
            signature: func_type,
            args: &args,
            results: &mut results,
            results_set: &mut results_set,
            function_index: function_idx,
            import_module: name.module(),
            import_name: name.name(),
        };
        function(runtime, &mut call)
    };
    runtime.put_back_host_function(name, function);
    outcome?;

    if results_set.iter().any(|set| !set) {
        return Err(RuntimeError::Trap(TrapCode::HostTrap));
    }
    for (value, expected) in results.iter().zip(func_type.results.iter()) {
        if !value.matches_valtype(*expected) {
            return Err(RuntimeError::Trap(TrapCode::TypeMismatch));
        }
    }
    for value in results {
        job.value_stack.push(value)?;
    }
    Ok(())
}

/// Unwinds the current call frame: results off, intermediates gone,
/// results back, control handed to the caller (or the job finished).
pub(crate) fn do_return(runtime: &mut Runtime, job: &mut Job) -> Result<(), RuntimeError> {
    let frame = job
        .call_stack
        .pop()
        .ok_or(RuntimeError::InvalidArgument)?;
    let module = runtime.module()?.clone();
    let func_type = module
        .func_type_of(frame.function_idx)
        .ok_or(RuntimeError::InvalidArgument)?;
    let results = job.value_stack.pop_many(frame.result_arity)?;
    for (value, expected) in results.iter().zip(func_type.results.iter()) {
        if !value.matches_valtype(*expected) {
            return Err(RuntimeError::Trap(TrapCode::TypeMismatch));
        }
    }
    job.value_stack.truncate(frame.stack_base);
    job.control_stack.truncate(frame.control_base);
    job.value_stack.push_many(&results)?;
    match frame.return_function {
        Some(caller) => {
            job.stream.load(caller)?;
            job.stream.set_pc(frame.return_pc)?;
        }
        None => {
            job.stream.unload();
            job.status = JobStatus::Finished;
        }
    }
    Ok(())
}

/// Branch to label `depth`: rewind the value stack to the frame's
/// height plus its arity and redirect the PC, keeping the frame alive
/// for loops.
pub(crate) fn branch_to_label(
    runtime: &mut Runtime,
    job: &mut Job,
    depth: u32,
) -> Result<(), RuntimeError> {
    let control_len = job.control_stack.len();
    let control_base = job
        .call_stack
        .last()
        .map(|frame| frame.control_base)
        .unwrap_or(0);
    if depth as usize >= control_len - control_base {
        return Err(RuntimeError::Trap(TrapCode::StackUnderflow));
    }
    let frame = job.control_stack.label(depth)?.clone();
    job.value_stack
        .rewind_keeping(frame.stack_height, frame.branch_arity)?;
    let label_index = control_len - depth as usize - 1;
    match frame.kind {
        LabelKind::Loop => {
            job.control_stack.truncate(label_index + 1);
            runtime.jit_stats.hot_loop_hits += 1;
        }
        _ => job.control_stack.truncate(label_index),
    }
    job.stream.set_pc(frame.target_pc)?;
    Ok(())
}
