use picowasm::{
    JitConfig, Module, Runtime, RuntimeConfig, RuntimeError, TrapCode, Value,
};
use std::sync::Arc;

fn module_from_wat(wat: &str) -> Arc<Module> {
    Arc::new(Module::from_bytes(wat::parse_str(wat).unwrap()).unwrap())
}

fn runtime_for(wat: &str) -> Runtime {
    let mut runtime = Runtime::new();
    runtime.attach_module(module_from_wat(wat)).unwrap();
    runtime
}

fn run_export(runtime: &mut Runtime, name: &str) -> Result<Value, RuntimeError> {
    let function_idx = runtime.module().unwrap().exported_function(name).unwrap();
    let mut job = runtime.create_job().unwrap();
    runtime.execute_job(&mut job, function_idx)?;
    Ok(job.pop_value().unwrap())
}

#[test]
fn stack_arithmetic() {
    let mut runtime = runtime_for(
        r#"(module (func (export "run") (result i32)
             i32.const 7
             i32.const 5
             i32.add))"#,
    );
    assert_eq!(run_export(&mut runtime, "run").unwrap(), Value::I32(12));
}

#[test]
fn division_by_zero_traps() {
    let mut runtime = runtime_for(
        r#"(module (func (export "run") (result i32)
             i32.const 4
             i32.const 0
             i32.div_s))"#,
    );
    let err = run_export(&mut runtime, "run").unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Trap(TrapCode::IntegerDivisionByZero)
    ));
    assert_eq!(err.exit_code(), -8);
}

#[test]
fn multi_value_return() {
    let mut runtime = runtime_for(
        r#"(module (func (export "run") (result i32 i64)
             i32.const 7
             i64.const 9))"#,
    );
    let function_idx = runtime.module().unwrap().exported_function("run").unwrap();
    let mut job = runtime.create_job().unwrap();
    runtime.execute_job(&mut job, function_idx).unwrap();
    assert_eq!(job.stack_height(), 2);
    assert_eq!(job.peek(0), Some(&Value::I64(9)));
    assert_eq!(job.peek(1), Some(&Value::I32(7)));
}

#[test]
fn entry_arguments_come_from_the_stack() {
    let mut runtime = runtime_for(
        r#"(module (func (export "add3") (param i32 i32 i32) (result i32)
             local.get 0
             local.get 1
             i32.add
             local.get 2
             i32.add))"#,
    );
    let function_idx = runtime.module().unwrap().exported_function("add3").unwrap();
    let mut job = runtime.create_job().unwrap();
    runtime
        .execute_job_with_args(
            &mut job,
            function_idx,
            &[Value::I32(1), Value::I32(2), Value::I32(3)],
        )
        .unwrap();
    assert_eq!(job.pop_value().unwrap(), Value::I32(6));
}

#[test]
fn blocks_branches_and_loops() {
    let mut runtime = runtime_for(
        r#"(module (func (export "fib") (param $n i32) (result i32)
             (local $a i32) (local $b i32) (local $t i32)
             i32.const 0
             local.set $a
             i32.const 1
             local.set $b
             (block $exit
               (loop $again
                 local.get $n
                 i32.eqz
                 br_if $exit
                 local.get $a
                 local.get $b
                 i32.add
                 local.set $t
                 local.get $b
                 local.set $a
                 local.get $t
                 local.set $b
                 local.get $n
                 i32.const 1
                 i32.sub
                 local.set $n
                 br $again))
             local.get $a))"#,
    );
    let function_idx = runtime.module().unwrap().exported_function("fib").unwrap();
    let mut job = runtime.create_job().unwrap();
    runtime
        .execute_job_with_args(&mut job, function_idx, &[Value::I32(10)])
        .unwrap();
    assert_eq!(job.pop_value().unwrap(), Value::I32(55));
}

#[test]
fn if_else_both_arms() {
    let wat = r#"(module (func (export "pick") (param i32) (result i32)
        local.get 0
        (if (result i32)
          (then i32.const 10)
          (else i32.const 20))))"#;
    let mut runtime = runtime_for(wat);
    let function_idx = runtime.module().unwrap().exported_function("pick").unwrap();
    let mut job = runtime.create_job().unwrap();
    runtime
        .execute_job_with_args(&mut job, function_idx, &[Value::I32(1)])
        .unwrap();
    assert_eq!(job.pop_value().unwrap(), Value::I32(10));
    let mut job = runtime.create_job().unwrap();
    runtime
        .execute_job_with_args(&mut job, function_idx, &[Value::I32(0)])
        .unwrap();
    assert_eq!(job.pop_value().unwrap(), Value::I32(20));
}

#[test]
fn br_table_targets() {
    let wat = r#"(module (func (export "route") (param i32) (result i32)
        (local $r i32)
        (block $exit
          (block $two
            (block $one
              (block $zero
                local.get 0
                br_table $zero $one $two)
              i32.const 10
              local.set $r
              br $exit)
            i32.const 11
            local.set $r
            br $exit)
          i32.const 12
          local.set $r)
        local.get $r))"#;
    let mut runtime = runtime_for(wat);
    let function_idx = runtime.module().unwrap().exported_function("route").unwrap();
    for (input, expected) in [(0, 10), (1, 11), (2, 12), (9, 12)] {
        let mut job = runtime.create_job().unwrap();
        runtime
            .execute_job_with_args(&mut job, function_idx, &[Value::I32(input)])
            .unwrap();
        assert_eq!(job.pop_value().unwrap(), Value::I32(expected), "input {input}");
    }
}

#[test]
fn nested_calls_and_recursion() {
    let mut runtime = runtime_for(
        r#"(module
             (func $double (param i32) (result i32)
               local.get 0
               i32.const 2
               i32.mul)
             (func (export "quad") (param i32) (result i32)
               local.get 0
               call $double
               call $double))"#,
    );
    let function_idx = runtime.module().unwrap().exported_function("quad").unwrap();
    let mut job = runtime.create_job().unwrap();
    runtime
        .execute_job_with_args(&mut job, function_idx, &[Value::I32(5)])
        .unwrap();
    assert_eq!(job.pop_value().unwrap(), Value::I32(20));
}

#[test]
fn call_depth_exceeded_leaves_the_job_recoverable() {
    let config = RuntimeConfig::new().with_max_call_depth(16);
    let mut runtime = Runtime::with_config(config);
    runtime
        .attach_module(module_from_wat(
            r#"(module
                 (func (export "forever") call 0)
                 (func (export "ok") (result i32) i32.const 1))"#,
        ))
        .unwrap();
    let forever = runtime.module().unwrap().exported_function("forever").unwrap();
    let ok = runtime.module().unwrap().exported_function("ok").unwrap();
    let mut job = runtime.create_job().unwrap();
    let err = runtime.execute_job(&mut job, forever).unwrap_err();
    assert!(matches!(err, RuntimeError::CallDepthExceeded));
    // the trapped job resets and runs again
    runtime.execute_job(&mut job, ok).unwrap();
    assert_eq!(job.pop_value().unwrap(), Value::I32(1));
    assert_eq!(job.stack_height(), 0);
}

#[test]
fn call_indirect_dispatch_and_traps() {
    let mut runtime = runtime_for(
        r#"(module
             (type $ret_i32 (func (result i32)))
             (type $ret_i64 (func (result i64)))
             (func $a (type $ret_i32) i32.const 42)
             (func $b (type $ret_i64) i64.const 9)
             (table 3 funcref)
             (elem (i32.const 0) $a $b)
             (func (export "ok") (result i32)
               i32.const 0
               call_indirect (type $ret_i32))
             (func (export "null") (result i32)
               i32.const 2
               call_indirect (type $ret_i32))
             (func (export "bad") (result i32)
               i32.const 1
               call_indirect (type $ret_i32)))"#,
    );
    assert_eq!(run_export(&mut runtime, "ok").unwrap(), Value::I32(42));
    assert!(matches!(
        run_export(&mut runtime, "null").unwrap_err(),
        RuntimeError::Trap(TrapCode::IndirectCallToNull)
    ));
    assert!(matches!(
        run_export(&mut runtime, "bad").unwrap_err(),
        RuntimeError::Trap(TrapCode::BadSignature)
    ));
}

#[test]
fn memory_load_store_and_bounds() {
    let mut runtime = runtime_for(
        r#"(module (memory 1)
             (func (export "roundtrip") (result i32)
               i32.const 16
               i32.const -559038737
               i32.store
               i32.const 16
               i32.load)
             (func (export "subword") (result i32)
               i32.const 0
               i32.const 200
               i32.store8
               i32.const 0
               i32.load8_s)
             (func (export "oob") (result i32)
               i32.const 65533
               i32.load))"#,
    );
    assert_eq!(
        run_export(&mut runtime, "roundtrip").unwrap(),
        Value::I32(-559038737)
    );
    // 200 sign-extends to -56 through load8_s
    assert_eq!(run_export(&mut runtime, "subword").unwrap(), Value::I32(-56));
    assert!(matches!(
        run_export(&mut runtime, "oob").unwrap_err(),
        RuntimeError::Trap(TrapCode::MemoryOutOfBounds)
    ));
}

#[test]
fn memory_grow_and_sentinel() {
    let mut runtime = runtime_for(
        r#"(module (memory 1 2)
             (func (export "grow0") (result i32) i32.const 0 memory.grow)
             (func (export "grow1") (result i32) i32.const 1 memory.grow)
             (func (export "grow_past") (result i32) i32.const 5 memory.grow)
             (func (export "size") (result i32) memory.size))"#,
    );
    assert_eq!(run_export(&mut runtime, "grow0").unwrap(), Value::I32(1));
    assert_eq!(run_export(&mut runtime, "grow_past").unwrap(), Value::I32(-1));
    assert_eq!(run_export(&mut runtime, "size").unwrap(), Value::I32(1));
    assert_eq!(run_export(&mut runtime, "grow1").unwrap(), Value::I32(1));
    assert_eq!(run_export(&mut runtime, "size").unwrap(), Value::I32(2));
    assert_eq!(run_export(&mut runtime, "grow1").unwrap(), Value::I32(-1));
}

#[test]
fn bulk_memory_ops() {
    let mut runtime = runtime_for(
        r#"(module (memory 1)
             (data "\2a\2b")
             (func (export "init") (result i32)
               i32.const 10
               i32.const 0
               i32.const 2
               memory.init 0
               i32.const 10
               i32.load8_u)
             (func (export "fill_and_copy") (result i32)
               i32.const 0
               i32.const 7
               i32.const 4
               memory.fill
               i32.const 100
               i32.const 0
               i32.const 4
               memory.copy
               i32.const 103
               i32.load8_u)
             (func (export "copy0_at_end")
               i32.const 65536
               i32.const 0
               i32.const 0
               memory.copy)
             (func (export "drop_then_init")
               data.drop 0
               i32.const 0
               i32.const 0
               i32.const 1
               memory.init 0))"#,
    );
    assert_eq!(run_export(&mut runtime, "init").unwrap(), Value::I32(0x2A));
    assert_eq!(
        run_export(&mut runtime, "fill_and_copy").unwrap(),
        Value::I32(7)
    );
    let copy0 = runtime.module().unwrap().exported_function("copy0_at_end").unwrap();
    let mut job = runtime.create_job().unwrap();
    runtime.execute_job(&mut job, copy0).unwrap();
    let drop_then_init = runtime
        .module()
        .unwrap()
        .exported_function("drop_then_init")
        .unwrap();
    let mut job = runtime.create_job().unwrap();
    let err = runtime.execute_job(&mut job, drop_then_init).unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Trap(TrapCode::MemoryOutOfBounds)
    ));
}

#[test]
fn globals_and_imported_globals() {
    let mut runtime = runtime_for(
        r#"(module
             (import "env" "base" (global i32))
             (global $counter (mut i32) (i32.const 10))
             (func (export "bump") (result i32)
               global.get 1
               i32.const 1
               i32.add
               global.set 1
               global.get 0
               global.get 1
               i32.add))"#,
    );
    runtime.set_imported_global(0, Value::I32(100)).unwrap();
    assert_eq!(run_export(&mut runtime, "bump").unwrap(), Value::I32(111));
    assert_eq!(run_export(&mut runtime, "bump").unwrap(), Value::I32(112));
    // wrong type is refused
    assert!(runtime.set_imported_global(0, Value::I64(1)).is_err());
    // non-imported slot is refused
    assert!(runtime.set_imported_global(1, Value::I32(0)).is_err());
}

#[test]
fn float_ops_and_conversions() {
    let mut runtime = runtime_for(
        r#"(module
             (func (export "mix") (result f64)
               f64.const 1.5
               f64.const 2.25
               f64.add
               f64.sqrt)
             (func (export "trunc_ok") (result i32)
               f32.const 126.9
               i32.trunc_f32_s)
             (func (export "trunc_nan") (result i32)
               f32.const nan
               i32.trunc_f32_s)
             (func (export "trunc_sat") (result i32)
               f64.const 1e30
               i32.trunc_sat_f64_s)
             (func (export "reinterpret") (result i32)
               f32.const 1.0
               i32.reinterpret_f32))"#,
    );
    let result = run_export(&mut runtime, "mix").unwrap();
    match result {
        Value::F64(v) => assert!((v.to_float() - 1.9364916731037085).abs() < 1e-12),
        other => panic!("expected f64, got {other:?}"),
    }
    assert_eq!(run_export(&mut runtime, "trunc_ok").unwrap(), Value::I32(126));
    assert!(matches!(
        run_export(&mut runtime, "trunc_nan").unwrap_err(),
        RuntimeError::Trap(TrapCode::BadConversionToInteger)
    ));
    assert_eq!(
        run_export(&mut runtime, "trunc_sat").unwrap(),
        Value::I32(i32::MAX)
    );
    assert_eq!(
        run_export(&mut runtime, "reinterpret").unwrap(),
        Value::I32(0x3F80_0000)
    );
}

#[test]
fn sign_extension_ops() {
    let mut runtime = runtime_for(
        r#"(module
             (func (export "ext8") (result i32)
               i32.const 0x80
               i32.extend8_s)
             (func (export "ext32") (result i64)
               i64.const 0x80000000
               i64.extend32_s))"#,
    );
    assert_eq!(run_export(&mut runtime, "ext8").unwrap(), Value::I32(-128));
    assert_eq!(
        run_export(&mut runtime, "ext32").unwrap(),
        Value::I64(-2147483648)
    );
}

#[test]
fn reference_ops_and_tables() {
    let mut runtime = runtime_for(
        r#"(module
             (table $t 4 funcref)
             (func $f (result i32) i32.const 5)
             (elem declare func $f)
             (func (export "probe") (result i32)
               i32.const 0
               ref.func $f
               table.set $t
               i32.const 0
               table.get $t
               ref.is_null)
             (func (export "nulls") (result i32)
               ref.null func
               ref.is_null)
             (func (export "size") (result i32)
               table.size $t)
             (func (export "grow") (result i32)
               ref.null func
               i32.const 2
               table.grow $t))"#,
    );
    assert_eq!(run_export(&mut runtime, "probe").unwrap(), Value::I32(0));
    assert_eq!(run_export(&mut runtime, "nulls").unwrap(), Value::I32(1));
    assert_eq!(run_export(&mut runtime, "size").unwrap(), Value::I32(4));
    assert_eq!(run_export(&mut runtime, "grow").unwrap(), Value::I32(4));
    assert_eq!(run_export(&mut runtime, "size").unwrap(), Value::I32(6));
}

#[test]
fn simd_minimum_surface() {
    let mut runtime = runtime_for(
        r#"(module (memory 1)
             (func (export "lanes") (result i32)
               v128.const i32x4 1 2 3 4
               v128.const i32x4 5 6 7 8
               i8x16.add
               i32x4.extract_lane 0)
             (func (export "splat") (result i32)
               i32.const 9
               i32x4.splat
               i32x4.extract_lane 3)
             (func (export "replace") (result i32)
               v128.const i32x4 0 0 0 0
               i32.const 77
               i32x4.replace_lane 2
               i32x4.extract_lane 2)
             (func (export "store_load") (result i32)
               i32.const 0
               v128.const i32x4 11 22 33 44
               v128.store
               i32.const 0
               v128.load
               i32x4.extract_lane 1)
             (func (export "trunc") (result i32)
               v128.const f32x4 1.7 -2.7 3.5 1e10
               i32x4.trunc_sat_f32x4_s
               i32x4.extract_lane 1))"#,
    );
    assert_eq!(run_export(&mut runtime, "lanes").unwrap(), Value::I32(6));
    assert_eq!(run_export(&mut runtime, "splat").unwrap(), Value::I32(9));
    assert_eq!(run_export(&mut runtime, "replace").unwrap(), Value::I32(77));
    assert_eq!(run_export(&mut runtime, "store_load").unwrap(), Value::I32(22));
    assert_eq!(run_export(&mut runtime, "trunc").unwrap(), Value::I32(-2));
}

#[test]
fn memory64_addressing() {
    let mut runtime = runtime_for(
        r#"(module (memory i64 1)
             (func (export "m64") (result i64)
               i64.const 8
               i64.const 77
               i64.store
               i64.const 8
               i64.load)
             (func (export "size64") (result i64)
               memory.size))"#,
    );
    assert_eq!(run_export(&mut runtime, "m64").unwrap(), Value::I64(77));
    assert_eq!(run_export(&mut runtime, "size64").unwrap(), Value::I64(1));
}

#[test]
fn start_function_runs_at_attach() {
    let mut runtime = runtime_for(
        r#"(module
             (global $g (mut i32) (i32.const 0))
             (func $init global.get 0 i32.const 41 i32.add global.set 0)
             (start $init)
             (func (export "read") (result i32) global.get 0 i32.const 1 i32.add))"#,
    );
    assert_eq!(run_export(&mut runtime, "read").unwrap(), Value::I32(42));
}

#[test]
fn unreachable_and_unknown_opcodes() {
    let mut runtime = runtime_for(
        r#"(module (func (export "dead") unreachable))"#,
    );
    assert!(matches!(
        run_export(&mut runtime, "dead").unwrap_err(),
        RuntimeError::Trap(TrapCode::UnreachableCodeReached)
    ));
}

#[test]
fn observable_results_are_independent_of_dispatch_tier() {
    let wat = r#"(module
        (memory 1)
        (func (export "work") (param $n i32) (result i32)
          (local $acc i32)
          (block $exit
            (loop $l
              local.get $n
              i32.eqz
              br_if $exit
              local.get $acc
              local.get $n
              i32.mul
              local.get $n
              i32.add
              local.set $acc
              i32.const 0
              local.get $acc
              i32.store
              local.get $n
              i32.const 1
              i32.sub
              local.set $n
              br $l))
          i32.const 0
          i32.load))"#;

    let mut expectations = Vec::new();
    for (microcode, prescan) in [(false, false), (true, false), (false, true), (true, true)] {
        let jit = JitConfig {
            min_ram_bytes: 0,
            min_cpu_count: 0,
            min_hot_loop_hits: 0,
            min_executed_ops: 0,
            min_advantage_score: 0.0,
            prescan_functions: prescan,
            prescan_force: prescan,
            ..JitConfig::default()
        };
        let config = RuntimeConfig::new().with_microcode(microcode).with_jit(jit);
        let mut runtime = Runtime::with_config(config);
        runtime.attach_module(module_from_wat(wat)).unwrap();
        let function_idx = runtime.module().unwrap().exported_function("work").unwrap();
        let mut job = runtime.create_job().unwrap();
        runtime
            .execute_job_with_args(&mut job, function_idx, &[Value::I32(17)])
            .unwrap();
        expectations.push(job.pop_value().unwrap());
        // run again on the warm cache
        let mut job = runtime.create_job().unwrap();
        runtime
            .execute_job_with_args(&mut job, function_idx, &[Value::I32(17)])
            .unwrap();
        expectations.push(job.pop_value().unwrap());
    }
    assert!(expectations.windows(2).all(|pair| pair[0] == pair[1]));
}

#[test]
fn randomized_arithmetic_agrees_with_native_semantics() {
    use rand::Rng;
    let mut rng = rand::rng();
    for _ in 0..32 {
        let a: i32 = rng.random();
        let b: i32 = rng.random();
        let wat = format!(
            r#"(module
                 (func (export "add") (result i32) i32.const {a} i32.const {b} i32.add)
                 (func (export "xor") (result i32) i32.const {a} i32.const {b} i32.xor)
                 (func (export "rotl") (result i32) i32.const {a} i32.const {b} i32.rotl))"#
        );
        let mut runtime = runtime_for(&wat);
        assert_eq!(
            run_export(&mut runtime, "add").unwrap(),
            Value::I32(a.wrapping_add(b))
        );
        assert_eq!(
            run_export(&mut runtime, "xor").unwrap(),
            Value::I32(a ^ b)
        );
        assert_eq!(
            run_export(&mut runtime, "rotl").unwrap(),
            Value::I32(a.rotate_left(b as u32 & 31))
        );
    }
}
