use crate::loader::stream::{LoaderError, SourceReader};
use crate::types::{ExternRef, FuncRef, TrapCode, ValType, Value, F32, F64};

/// A restricted constant expression.
///
/// Decoded at load time, evaluated at instantiation against the
/// already-materialised global slots. Anything outside this closed set
/// of operators fails the load.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstExpr {
    I32(i32),
    I64(i64),
    F32(u32),
    F64(u64),
    GlobalGet(u32),
    RefNull(ValType),
    RefFunc(u32),
}

impl ConstExpr {
    /// Parses one constant expression up to and including its `end`.
    pub fn parse(reader: &mut SourceReader<'_>) -> Result<Self, LoaderError> {
        let opcode = reader.read_byte()?;
        let expr = match opcode {
            0x41 => ConstExpr::I32(reader.read_s32_leb()?),
            0x42 => ConstExpr::I64(reader.read_s64_leb()?),
            0x43 => ConstExpr::F32(reader.read_f32_bits()?),
            0x44 => ConstExpr::F64(reader.read_f64_bits()?),
            0x23 => ConstExpr::GlobalGet(reader.read_u32_leb()?),
            0xD0 => {
                let heap_type = reader.read_byte()?;
                let ty = ValType::from_byte(heap_type)
                    .filter(ValType::is_ref)
                    .ok_or(LoaderError::Malformed("ref.null heap type"))?;
                ConstExpr::RefNull(ty)
            }
            0xD2 => ConstExpr::RefFunc(reader.read_u32_leb()?),
            _ => return Err(LoaderError::Malformed("non-constant opcode in init expr")),
        };
        if reader.read_byte()? != 0x0B {
            return Err(LoaderError::Malformed("init expr not terminated"));
        }
        Ok(expr)
    }

    /// Evaluates against the global slots materialised so far.
    ///
    /// `global.get` may only name an imported immutable global; the
    /// caller passes the imported prefix of the global space together
    /// with the matching mutability flags.
    pub fn eval(
        &self,
        imported_globals: &[Value],
        imported_mutability: &[bool],
    ) -> Result<Value, TrapCode> {
        match self {
            ConstExpr::I32(value) => Ok(Value::I32(*value)),
            ConstExpr::I64(value) => Ok(Value::I64(*value)),
            ConstExpr::F32(bits) => Ok(Value::F32(F32::from_bits(*bits))),
            ConstExpr::F64(bits) => Ok(Value::F64(F64::from_bits(*bits))),
            ConstExpr::GlobalGet(index) => {
                let index = *index as usize;
                if imported_mutability.get(index).copied().unwrap_or(true) {
                    return Err(TrapCode::TypeMismatch);
                }
                imported_globals
                    .get(index)
                    .copied()
                    .ok_or(TrapCode::TypeMismatch)
            }
            ConstExpr::RefNull(ValType::ExternRef) => Ok(Value::ExternRef(ExternRef::null())),
            ConstExpr::RefNull(_) => Ok(Value::FuncRef(FuncRef::null())),
            ConstExpr::RefFunc(index) => Ok(Value::FuncRef(FuncRef::from_index(*index))),
        }
    }

    /// The function index referenced by `ref.func`, if any; used to
    /// materialise element segments without a full evaluation context.
    pub fn as_func_index(&self) -> Option<FuncRef> {
        match self {
            ConstExpr::RefFunc(index) => Some(FuncRef::from_index(*index)),
            ConstExpr::RefNull(_) => Some(FuncRef::null()),
            _ => None,
        }
    }
}
