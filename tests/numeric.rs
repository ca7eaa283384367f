//! Numeric operator semantics exercised through whole-module runs, so
//! every case crosses the decoder, the register window and the
//! dispatch path rather than calling handlers directly.

use picowasm::{Module, Runtime, RuntimeError, TrapCode, Value};
use std::sync::Arc;

fn run_one(wat: &str) -> Result<Value, RuntimeError> {
    let module = Arc::new(Module::from_bytes(wat::parse_str(wat).unwrap()).unwrap());
    let mut runtime = Runtime::new();
    runtime.attach_module(module).unwrap();
    let function_idx = runtime.module().unwrap().exported_function("t").unwrap();
    let mut job = runtime.create_job().unwrap();
    runtime.execute_job(&mut job, function_idx)?;
    Ok(job.pop_value().unwrap())
}

fn eval(body: &str, result_ty: &str) -> Result<Value, RuntimeError> {
    run_one(&format!(
        r#"(module (func (export "t") (result {result_ty}) {body}))"#
    ))
}

#[test]
fn i64_division_edges() {
    assert_eq!(
        eval("i64.const -7 i64.const 2 i64.div_s", "i64").unwrap(),
        Value::I64(-3)
    );
    assert_eq!(
        eval("i64.const -7 i64.const 2 i64.rem_s", "i64").unwrap(),
        Value::I64(-1)
    );
    assert_eq!(
        eval("i64.const -1 i64.const 2 i64.div_u", "i64").unwrap(),
        Value::I64(i64::MAX)
    );
    assert!(matches!(
        eval("i64.const -9223372036854775808 i64.const -1 i64.div_s", "i64").unwrap_err(),
        RuntimeError::Trap(TrapCode::IntegerOverflow)
    ));
    assert!(matches!(
        eval("i64.const 1 i64.const 0 i64.rem_u", "i64").unwrap_err(),
        RuntimeError::Trap(TrapCode::IntegerDivisionByZero)
    ));
}

#[test]
fn i64_shifts_mask_to_63() {
    assert_eq!(
        eval("i64.const 1 i64.const 64 i64.shl", "i64").unwrap(),
        Value::I64(1)
    );
    assert_eq!(
        eval("i64.const -8 i64.const 1 i64.shr_s", "i64").unwrap(),
        Value::I64(-4)
    );
    assert_eq!(
        eval("i64.const -8 i64.const 1 i64.shr_u", "i64").unwrap(),
        Value::I64((-8i64 as u64 >> 1) as i64)
    );
    assert_eq!(
        eval("i64.const 1 i64.const 1 i64.rotr", "i64").unwrap(),
        Value::I64(i64::MIN)
    );
}

#[test]
fn bit_counts() {
    assert_eq!(eval("i32.const 0 i32.clz", "i32").unwrap(), Value::I32(32));
    assert_eq!(eval("i32.const 0 i32.ctz", "i32").unwrap(), Value::I32(32));
    assert_eq!(eval("i64.const 0 i64.clz", "i64").unwrap(), Value::I64(64));
    assert_eq!(
        eval("i64.const -1 i64.popcnt", "i64").unwrap(),
        Value::I64(64)
    );
    assert_eq!(
        eval("i32.const 4096 i32.ctz", "i32").unwrap(),
        Value::I32(12)
    );
}

#[test]
fn comparisons_return_canonical_booleans() {
    assert_eq!(
        eval("i64.const -1 i64.const 1 i64.lt_s", "i32").unwrap(),
        Value::I32(1)
    );
    assert_eq!(
        eval("i64.const -1 i64.const 1 i64.lt_u", "i32").unwrap(),
        Value::I32(0)
    );
    assert_eq!(
        eval("f32.const nan f32.const nan f32.eq", "i32").unwrap(),
        Value::I32(0)
    );
    assert_eq!(
        eval("f32.const nan f32.const nan f32.ne", "i32").unwrap(),
        Value::I32(1)
    );
    assert_eq!(
        eval("f64.const -0 f64.const 0 f64.eq", "i32").unwrap(),
        Value::I32(1)
    );
}

#[test]
fn float_min_max_and_copysign() {
    let min = eval("f32.const -0 f32.const 0 f32.min", "f32").unwrap();
    assert_eq!(min.as_f32().unwrap().to_bits(), (-0.0f32).to_bits());
    let max = eval("f64.const nan f64.const 1 f64.max", "f64").unwrap();
    assert!(max.as_f64().unwrap().to_float().is_nan());
    assert_eq!(
        eval("f32.const 2 f32.const -1 f32.copysign", "f32").unwrap(),
        Value::F32((-2.0f32).into())
    );
}

#[test]
fn float_rounding_family() {
    assert_eq!(
        eval("f64.const 2.5 f64.nearest", "f64").unwrap(),
        Value::F64(2.0f64.into())
    );
    assert_eq!(
        eval("f64.const -2.5 f64.nearest", "f64").unwrap(),
        Value::F64((-2.0f64).into())
    );
    assert_eq!(
        eval("f64.const -1.2 f64.ceil", "f64").unwrap(),
        Value::F64((-1.0f64).into())
    );
    assert_eq!(
        eval("f64.const -1.2 f64.floor", "f64").unwrap(),
        Value::F64((-2.0f64).into())
    );
    assert_eq!(
        eval("f64.const -1.7 f64.trunc", "f64").unwrap(),
        Value::F64((-1.0f64).into())
    );
}

#[test]
fn conversion_matrix_spot_checks() {
    assert_eq!(
        eval("i64.const 4294967297 i32.wrap_i64", "i32").unwrap(),
        Value::I32(1)
    );
    assert_eq!(
        eval("i32.const -1 i64.extend_i32_u", "i64").unwrap(),
        Value::I64(0xFFFF_FFFF)
    );
    assert_eq!(
        eval("i32.const -1 i64.extend_i32_s", "i64").unwrap(),
        Value::I64(-1)
    );
    assert_eq!(
        eval("i32.const -1 f64.convert_i32_u", "f64").unwrap(),
        Value::F64(4294967295.0f64.into())
    );
    assert_eq!(
        eval("i64.const -1 f32.convert_i64_u", "f32").unwrap(),
        Value::F32((u64::MAX as f32).into())
    );
    assert_eq!(
        eval("f64.const 3.9 f32.demote_f64 i32.trunc_f32_u", "i32").unwrap(),
        Value::I32(3)
    );
    assert_eq!(
        eval("f32.const 3.9 f64.promote_f32 f64.floor", "f64").unwrap(),
        Value::F64(3.0f64.into())
    );
}

#[test]
fn trapping_and_saturating_truncations_differ() {
    assert!(matches!(
        eval("f64.const 1e300 i64.trunc_f64_s", "i64").unwrap_err(),
        RuntimeError::Trap(TrapCode::IntegerOverflow)
    ));
    assert_eq!(
        eval("f64.const 1e300 i64.trunc_sat_f64_s", "i64").unwrap(),
        Value::I64(i64::MAX)
    );
    assert_eq!(
        eval("f64.const -1e300 i64.trunc_sat_f64_s", "i64").unwrap(),
        Value::I64(i64::MIN)
    );
    assert_eq!(
        eval("f32.const nan i32.trunc_sat_f32_u", "i32").unwrap(),
        Value::I32(0)
    );
    assert!(matches!(
        eval("f32.const -1.5 i32.trunc_f32_u", "i32").unwrap_err(),
        RuntimeError::Trap(TrapCode::IntegerOverflow)
    ));
    // fractional values in [-1, 0) truncate to zero for unsigned
    assert_eq!(
        eval("f32.const -0.75 i32.trunc_f32_u", "i32").unwrap(),
        Value::I32(0)
    );
}

#[test]
fn reinterpret_round_trips_bits() {
    assert_eq!(
        eval(
            "f64.const -0 i64.reinterpret_f64",
            "i64"
        )
        .unwrap(),
        Value::I64(i64::MIN)
    );
    assert_eq!(
        eval("i32.const 1078530011 f32.reinterpret_i32 i32.reinterpret_f32", "i32").unwrap(),
        Value::I32(1078530011)
    );
}

#[test]
fn select_is_type_checked_at_runtime() {
    assert_eq!(
        eval("i32.const 10 i32.const 20 i32.const 1 select", "i32").unwrap(),
        Value::I32(10)
    );
    assert_eq!(
        eval("i64.const 10 i64.const 20 i32.const 0 select", "i64").unwrap(),
        Value::I64(20)
    );
}

#[test]
fn subword_memory_traffic() {
    let wat = r#"(module (memory 1)
        (func (export "t") (result i64)
          i32.const 0
          i64.const -2
          i64.store32
          i32.const 0
          i64.load32_u))"#;
    assert_eq!(run_one(wat).unwrap(), Value::I64(0xFFFF_FFFE));

    let wat = r#"(module (memory 1)
        (func (export "t") (result i64)
          i32.const 0
          i64.const 500
          i64.store16
          i32.const 0
          i64.load16_s))"#;
    // 500 & 0xFFFF = 500, sign bit clear
    assert_eq!(run_one(wat).unwrap(), Value::I64(500));
}

#[test]
fn load_offsets_participate_in_bounds_checks() {
    let wat = r#"(module (memory 1)
        (func (export "t") (result i32)
          i32.const 65532
          i32.load offset=4))"#;
    assert!(matches!(
        run_one(wat).unwrap_err(),
        RuntimeError::Trap(TrapCode::MemoryOutOfBounds)
    ));
    let wat = r#"(module (memory 1)
        (func (export "t") (result i32)
          i32.const 65528
          i32.load offset=4))"#;
    assert_eq!(run_one(wat).unwrap(), Value::I32(0));
}
