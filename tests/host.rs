use hex_literal::hex;
use picowasm::{
    HostCall, HostFunctionPtr, Module, Runtime, RuntimeError, SymbolResolver, TrapCode, Value,
};
use std::sync::Arc;

fn module_from_wat(wat: &str) -> Arc<Module> {
    Arc::new(Module::from_bytes(wat::parse_str(wat).unwrap()).unwrap())
}

fn bind_host_add(runtime: &mut Runtime) {
    runtime.bind_host_function(
        "env",
        "host_add",
        Box::new(|_runtime, call| {
            if !call.expect(2, 1) {
                return Err(RuntimeError::InvalidArgument);
            }
            let lhs = call.arg_i32(0)?;
            let rhs = call.arg_i32(1)?;
            call.set_i32(0, lhs.wrapping_add(rhs))
        }),
    );
}

#[test]
fn host_import_add() {
    let mut runtime = Runtime::new();
    runtime
        .attach_module(module_from_wat(
            r#"(module
                 (import "env" "host_add" (func (param i32 i32) (result i32)))
                 (func (export "run") (result i32)
                   i32.const 7
                   i32.const 5
                   call 0))"#,
        ))
        .unwrap();
    bind_host_add(&mut runtime);
    let run = runtime.module().unwrap().exported_function("run").unwrap();
    let mut job = runtime.create_job().unwrap();
    runtime.execute_job(&mut job, run).unwrap();
    assert_eq!(job.pop_value().unwrap(), Value::I32(12));
}

/// The same module as a hand-encoded binary: magic, one type, the
/// `env.host_add` import, one body `i32.const 7; i32.const 5; call 0`.
#[test]
fn host_import_add_from_raw_binary() {
    let binary = hex!(
        "0061736d01000000"
        "010701 60027f7f017f"
        "021001 03656e76 08686f73745f616464 0000"
        "03020100"
        "0707010372756e0001"
        "0a0a010800 4107 4105 1000 0b"
    );
    let module = Arc::new(Module::from_bytes(binary.to_vec()).unwrap());
    assert_eq!(module.num_imported_functions(), 1);
    let mut runtime = Runtime::new();
    runtime.attach_module(module).unwrap();
    bind_host_add(&mut runtime);
    let run = runtime.module().unwrap().exported_function("run").unwrap();
    let mut job = runtime.create_job().unwrap();
    runtime.execute_job(&mut job, run).unwrap();
    assert_eq!(job.pop_value().unwrap(), Value::I32(12));
}

#[test]
fn unbound_import_fails() {
    let mut runtime = Runtime::new();
    runtime
        .attach_module(module_from_wat(
            r#"(module
                 (import "env" "missing" (func))
                 (func (export "run") call 0))"#,
        ))
        .unwrap();
    let run = runtime.module().unwrap().exported_function("run").unwrap();
    let mut job = runtime.create_job().unwrap();
    assert!(matches!(
        runtime.execute_job(&mut job, run),
        Err(RuntimeError::InvalidArgument)
    ));
}

#[test]
fn host_function_must_fill_every_result() {
    let mut runtime = Runtime::new();
    runtime
        .attach_module(module_from_wat(
            r#"(module
                 (import "env" "lazy" (func (result i32)))
                 (func (export "run") (result i32) call 0))"#,
        ))
        .unwrap();
    runtime.bind_host_function("env", "lazy", Box::new(|_, _| Ok(())));
    let run = runtime.module().unwrap().exported_function("run").unwrap();
    let mut job = runtime.create_job().unwrap();
    assert!(matches!(
        runtime.execute_job(&mut job, run),
        Err(RuntimeError::Trap(TrapCode::HostTrap))
    ));
}

#[test]
fn host_trap_propagates() {
    let mut runtime = Runtime::new();
    runtime
        .attach_module(module_from_wat(
            r#"(module
                 (import "env" "bad" (func))
                 (func (export "run") call 0))"#,
        ))
        .unwrap();
    runtime.bind_host_function(
        "env",
        "bad",
        Box::new(|_, _| Err(RuntimeError::Trap(TrapCode::HostTrap))),
    );
    let run = runtime.module().unwrap().exported_function("run").unwrap();
    let mut job = runtime.create_job().unwrap();
    let err = runtime.execute_job(&mut job, run).unwrap_err();
    assert!(err.is_trap());
}

#[test]
fn host_functions_reach_linear_memory() {
    let mut runtime = Runtime::new();
    runtime
        .attach_module(module_from_wat(
            r#"(module (memory 1)
                 (import "env" "poke" (func (param i32 i32)))
                 (func (export "run") (result i32)
                   i32.const 8
                   i32.const 99
                   call 0
                   i32.const 8
                   i32.load))"#,
        ))
        .unwrap();
    runtime.bind_host_function(
        "env",
        "poke",
        Box::new(|runtime, call| {
            let address = call.arg_i32(0)? as u32 as u64;
            let value = call.arg_i32(1)?;
            runtime.write_memory(0, address, &value.to_le_bytes())
        }),
    );
    let run = runtime.module().unwrap().exported_function("run").unwrap();
    let mut job = runtime.create_job().unwrap();
    runtime.execute_job(&mut job, run).unwrap();
    assert_eq!(job.pop_value().unwrap(), Value::I32(99));
}

#[test]
fn imported_memory_before_attach() {
    let mut runtime = Runtime::new();
    let mut bytes = vec![0u8; 65536];
    bytes[..4].copy_from_slice(&[0x2A, 0x00, 0x00, 0x00]);
    runtime
        .bind_imported_memory("env", "mem0", bytes, false)
        .unwrap();
    runtime
        .attach_module(module_from_wat(
            r#"(module
                 (import "env" "mem0" (memory 1))
                 (func (export "run") (result i32)
                   i32.const 0
                   i32.load))"#,
        ))
        .unwrap();
    assert!(runtime.memory(0).unwrap().is_host());
    let run = runtime.module().unwrap().exported_function("run").unwrap();
    let mut job = runtime.create_job().unwrap();
    runtime.execute_job(&mut job, run).unwrap();
    assert_eq!(job.pop_value().unwrap(), Value::I32(42));
}

#[test]
fn imported_memory_rebind_rules() {
    let mut runtime = Runtime::new();
    runtime
        .attach_module(module_from_wat(
            r#"(module
                 (import "env" "mem0" (memory 1))
                 (func (export "run") (result i32)
                   i32.const 0
                   i32.load))"#,
        ))
        .unwrap();

    // rebind after attach replaces the bytes when the size matches
    let mut bytes = vec![0u8; 65536];
    bytes[0] = 0x07;
    runtime
        .bind_imported_memory("env", "mem0", bytes, false)
        .unwrap();
    let run = runtime.module().unwrap().exported_function("run").unwrap();
    let mut job = runtime.create_job().unwrap();
    runtime.execute_job(&mut job, run).unwrap();
    assert_eq!(job.pop_value().unwrap(), Value::I32(7));

    // a mismatched size must fail and leave the binding untouched
    let err = runtime
        .bind_imported_memory("env", "mem0", vec![0u8; 16], false)
        .unwrap_err();
    assert!(err.is_trap());
    let mut probe = [0u8; 1];
    runtime.read_memory(0, 0, &mut probe).unwrap();
    assert_eq!(probe[0], 0x07);

    // rebinding identical bytes disturbs nothing
    let mut same = vec![0u8; 65536];
    same[0] = 0x07;
    runtime
        .bind_imported_memory("env", "mem0", same, false)
        .unwrap();
    runtime.read_memory(0, 0, &mut probe).unwrap();
    assert_eq!(probe[0], 0x07);
}

#[test]
fn host_memory_growth_is_refused_by_default() {
    let mut runtime = Runtime::new();
    runtime
        .bind_imported_memory("env", "mem0", vec![0u8; 65536], false)
        .unwrap();
    runtime
        .attach_module(module_from_wat(
            r#"(module
                 (import "env" "mem0" (memory 1))
                 (func (export "grow") (result i32)
                   i32.const 1
                   memory.grow))"#,
        ))
        .unwrap();
    let grow = runtime.module().unwrap().exported_function("grow").unwrap();
    let mut job = runtime.create_job().unwrap();
    runtime.execute_job(&mut job, grow).unwrap();
    assert_eq!(job.pop_value().unwrap(), Value::I32(-1));
}

#[test]
fn imported_table_binding() {
    let mut runtime = Runtime::new();
    runtime
        .bind_imported_table(
            "env",
            "tab",
            vec![Value::FuncRef(picowasm::FuncRef::from_index(0)); 2],
            false,
        )
        .unwrap();
    runtime
        .attach_module(module_from_wat(
            r#"(module
                 (import "env" "tab" (table 2 funcref))
                 (func $f (result i32) i32.const 31)
                 (func (export "run") (result i32)
                   i32.const 1
                   call_indirect (result i32)))"#,
        ))
        .unwrap();
    let run = runtime.module().unwrap().exported_function("run").unwrap();
    let mut job = runtime.create_job().unwrap();
    runtime.execute_job(&mut job, run).unwrap();
    assert_eq!(job.pop_value().unwrap(), Value::I32(31));
}

struct StaticResolver;

fn resolved_add(_runtime: &mut Runtime, call: &mut HostCall<'_>) -> Result<(), RuntimeError> {
    let lhs = call.arg_i32(0)?;
    let rhs = call.arg_i32(1)?;
    call.set_i32(0, lhs + rhs)
}

impl SymbolResolver for StaticResolver {
    fn resolve(&self, library_path: &str, symbol_name: &str) -> Option<HostFunctionPtr> {
        if library_path == "libhost_add.so" && symbol_name == "host_add" {
            Some(resolved_add)
        } else {
            None
        }
    }
}

#[test]
fn symbol_resolver_binds_host_functions() {
    let mut runtime = Runtime::new();
    runtime
        .attach_module(module_from_wat(
            r#"(module
                 (import "env" "host_add" (func (param i32 i32) (result i32)))
                 (func (export "run") (result i32)
                   i32.const 30
                   i32.const 12
                   call 0))"#,
        ))
        .unwrap();

    // no resolver installed yet
    assert!(runtime
        .bind_host_function_from_library("env", "host_add", "libhost_add.so", "host_add")
        .is_err());

    runtime.set_symbol_resolver(Box::new(StaticResolver));
    assert!(runtime
        .bind_host_function_from_library("env", "host_add", "libhost_add.so", "missing")
        .is_err());
    runtime
        .bind_host_function_from_library("env", "host_add", "libhost_add.so", "host_add")
        .unwrap();

    let run = runtime.module().unwrap().exported_function("run").unwrap();
    let mut job = runtime.create_job().unwrap();
    runtime.execute_job(&mut job, run).unwrap();
    assert_eq!(job.pop_value().unwrap(), Value::I32(42));
}
