use crate::loader::FuncType;
use crate::runtime::Runtime;
use crate::types::{ExternRef, FuncRef, RuntimeError, ValType, Value, F32, F64};
use alloc::boxed::Box;

/// One invocation of an imported function, the exclusive interface
/// between the interpreter and host code.
///
/// The callback must populate every result slot (checked against the
/// signature after it returns) or fail; failure propagates with the
/// same semantics as a Wasm trap.
pub struct HostCall<'a> {
    pub(crate) signature: &'a FuncType,
    pub(crate) args: &'a [Value],
    pub(crate) results: &'a mut [Value],
    pub(crate) results_set: &'a mut [bool],
    pub(crate) function_index: u32,
    pub(crate) import_module: &'a str,
    pub(crate) import_name: &'a str,
}

impl HostCall<'_> {
    pub fn signature(&self) -> &FuncType {
        self.signature
    }

    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    pub fn result_count(&self) -> usize {
        self.results.len()
    }

    /// The index of the imported function in the module's function
    /// space.
    pub fn function_index(&self) -> u32 {
        self.function_index
    }

    pub fn import_module(&self) -> &str {
        self.import_module
    }

    pub fn import_name(&self) -> &str {
        self.import_name
    }

    /// Checks the call shape; hosts use this as a cheap signature
    /// guard before touching arguments.
    pub fn expect(&self, arg_count: usize, result_count: usize) -> bool {
        self.args.len() == arg_count && self.results.len() == result_count
    }

    /// The raw argument at `index`.
    pub fn arg(&self, index: usize) -> Result<Value, RuntimeError> {
        self.args
            .get(index)
            .copied()
            .ok_or(RuntimeError::InvalidArgument)
    }

    fn set(&mut self, index: usize, value: Value) -> Result<(), RuntimeError> {
        let expected = self
            .signature
            .results
            .get(index)
            .ok_or(RuntimeError::InvalidArgument)?;
        if !value.matches_valtype(*expected) {
            return Err(RuntimeError::InvalidArgument);
        }
        self.results[index] = value;
        self.results_set[index] = true;
        Ok(())
    }
}

macro_rules! impl_host_call_accessors {
    ( $( ($name:ident, $ty:ty, $as:ident, $variant:ident) ),* $(,)? ) => {
        paste::paste! {
            impl HostCall<'_> {
                $(
                    #[doc = "Typed argument accessor; fails on a kind mismatch."]
                    pub fn [<arg_ $name>](&self, index: usize) -> Result<$ty, RuntimeError> {
                        self.arg(index)?
                            .$as()
                            .map_err(|_| RuntimeError::InvalidArgument)
                    }

                    #[doc = "Typed result setter; checked against the signature."]
                    pub fn [<set_ $name>](&mut self, index: usize, value: $ty) -> Result<(), RuntimeError> {
                        self.set(index, Value::$variant(value.into()))
                    }
                )*
            }
        }
    };
}

impl_host_call_accessors!((i32, i32, as_i32, I32), (i64, i64, as_i64, I64),);

impl HostCall<'_> {
    /// Float argument accessor; fails on a kind mismatch.
    pub fn arg_f32(&self, index: usize) -> Result<f32, RuntimeError> {
        Ok(self
            .arg(index)?
            .as_f32()
            .map_err(|_| RuntimeError::InvalidArgument)?
            .to_float())
    }

    pub fn arg_f64(&self, index: usize) -> Result<f64, RuntimeError> {
        Ok(self
            .arg(index)?
            .as_f64()
            .map_err(|_| RuntimeError::InvalidArgument)?
            .to_float())
    }

    /// Float result setter; checked against the signature.
    pub fn set_f32(&mut self, index: usize, value: f32) -> Result<(), RuntimeError> {
        self.set(index, Value::F32(F32::from(value)))
    }

    pub fn set_f64(&mut self, index: usize, value: f64) -> Result<(), RuntimeError> {
        self.set(index, Value::F64(F64::from(value)))
    }

    /// Reference argument accessor: the flat token of either reference
    /// kind.
    pub fn arg_ref(&self, index: usize) -> Result<u64, RuntimeError> {
        self.arg(index)?
            .as_ref_token()
            .map_err(|_| RuntimeError::InvalidArgument)
    }

    /// Reference result setter; the token lands as a value of the
    /// declared reference type.
    pub fn set_ref(&mut self, index: usize, token: u64) -> Result<(), RuntimeError> {
        let expected = self
            .signature
            .results
            .get(index)
            .copied()
            .ok_or(RuntimeError::InvalidArgument)?;
        let value = match expected {
            ValType::FuncRef => Value::FuncRef(FuncRef::from_token(token)),
            ValType::ExternRef => Value::ExternRef(ExternRef::new(token)),
            _ => return Err(RuntimeError::InvalidArgument),
        };
        self.set(index, value)
    }
}

/// A host function bound to an import: a boxed callback plus whatever
/// state it captured.
pub type HostFunction =
    Box<dyn FnMut(&mut Runtime, &mut HostCall<'_>) -> Result<(), RuntimeError> + Send>;

/// A plain-function host callback, the shape a symbol resolver can
/// produce.
pub type HostFunctionPtr =
    fn(&mut Runtime, &mut HostCall<'_>) -> Result<(), RuntimeError>;

/// Resolves a named symbol out of a dynamic library to a host
/// callback. The embedder supplies the implementation; the core never
/// opens shared libraries itself.
pub trait SymbolResolver: Send {
    fn resolve(&self, library_path: &str, symbol_name: &str) -> Option<HostFunctionPtr>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::boxed::Box;

    fn sig(params: &[ValType], results: &[ValType]) -> FuncType {
        FuncType {
            params: params.to_vec().into_boxed_slice(),
            results: results.to_vec().into_boxed_slice(),
        }
    }

    #[test]
    fn typed_accessors_enforce_kinds() {
        let signature = sig(&[ValType::I32, ValType::I64], &[ValType::I32]);
        let args = [Value::I32(7), Value::I64(9)];
        let mut results = [Value::I32(0)];
        let mut results_set = [false];
        let mut call = HostCall {
            signature: &signature,
            args: &args,
            results: &mut results,
            results_set: &mut results_set,
            function_index: 0,
            import_module: "env",
            import_name: "f",
        };
        assert!(call.expect(2, 1));
        assert!(!call.expect(1, 1));
        assert_eq!(call.arg_i32(0).unwrap(), 7);
        assert_eq!(call.arg_i64(1).unwrap(), 9);
        assert!(call.arg_i64(0).is_err());
        assert!(call.arg_i32(5).is_err());
        call.set_i32(0, 16).unwrap();
        assert!(call.set_i64(0, 16).is_err());
        assert_eq!(results[0], Value::I32(16));
        assert!(results_set[0]);
    }

    #[test]
    fn ref_results_follow_the_declared_type() {
        let signature = sig(&[], &[ValType::FuncRef]);
        let mut results = [Value::FuncRef(FuncRef::null())];
        let mut results_set = [false];
        let mut call = HostCall {
            signature: &signature,
            args: &[],
            results: &mut results,
            results_set: &mut results_set,
            function_index: 3,
            import_module: "env",
            import_name: "g",
        };
        call.set_ref(0, FuncRef::from_index(4).token()).unwrap();
        assert_eq!(results[0], Value::FuncRef(FuncRef::from_index(4)));
    }

    #[test]
    fn boxed_host_functions_capture_state() {
        let mut counter = 0u32;
        let mut callback: Box<dyn FnMut(&mut u32)> = Box::new(|count| *count += 1);
        callback(&mut counter);
        assert_eq!(counter, 1);
    }
}
