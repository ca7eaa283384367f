use crate::types::{ExternRef, FuncRef, TrapCode};
use num_derive::FromPrimitive;

/// A WebAssembly value type as encoded in the binary format.
///
/// The same enum doubles as the runtime kind tag carried by every
/// [`Value`]: the two sets are in one-to-one correspondence. At type
/// check sites `funcref` and `externref` share the reference tag, see
/// [`Value::matches_valtype`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, FromPrimitive)]
#[repr(u8)]
pub enum ValType {
    I32 = 0x7F,
    I64 = 0x7E,
    F32 = 0x7D,
    F64 = 0x7C,
    V128 = 0x7B,
    FuncRef = 0x70,
    ExternRef = 0x6F,
}

impl ValType {
    /// Decodes a value type from its binary encoding byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        num_traits::FromPrimitive::from_u8(byte)
    }

    /// Returns `true` for the two opaque reference types.
    pub fn is_ref(&self) -> bool {
        matches!(self, ValType::FuncRef | ValType::ExternRef)
    }

    /// Width of a value of this type in bytes on the wire.
    pub fn byte_width(&self) -> u8 {
        match self {
            ValType::I32 | ValType::F32 => 4,
            ValType::I64 | ValType::F64 => 8,
            ValType::V128 => 16,
            ValType::FuncRef | ValType::ExternRef => 8,
        }
    }
}

impl core::fmt::Display for ValType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            ValType::I32 => "i32",
            ValType::I64 => "i64",
            ValType::F32 => "f32",
            ValType::F64 => "f64",
            ValType::V128 => "v128",
            ValType::FuncRef => "funcref",
            ValType::ExternRef => "externref",
        };
        write!(f, "{name}")
    }
}

/// A 32-bit float by its raw bits.
///
/// Keeping the bit pattern instead of an `f32` preserves NaN payloads
/// across moves through the value stack and linear memory.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[repr(transparent)]
pub struct F32(u32);

/// A 64-bit float by its raw bits, see [`F32`].
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[repr(transparent)]
pub struct F64(u64);

macro_rules! impl_float_wrapper {
    ($name:ident, $prim:ty, $bits:ty) => {
        impl $name {
            #[inline]
            pub fn from_bits(bits: $bits) -> Self {
                Self(bits)
            }

            #[inline]
            pub fn to_bits(self) -> $bits {
                self.0
            }

            #[inline]
            pub fn to_float(self) -> $prim {
                <$prim>::from_bits(self.0)
            }

            #[inline]
            pub fn is_nan(self) -> bool {
                self.to_float().is_nan()
            }
        }

        impl From<$prim> for $name {
            #[inline]
            fn from(value: $prim) -> Self {
                Self(value.to_bits())
            }
        }

        impl From<$name> for $prim {
            #[inline]
            fn from(value: $name) -> Self {
                value.to_float()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.to_float())
            }
        }
    };
}

impl_float_wrapper!(F32, f32, u32);
impl_float_wrapper!(F64, f64, u64);

/// A 128-bit SIMD vector by its raw little-endian bits.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[repr(transparent)]
pub struct V128(u128);

impl V128 {
    #[inline]
    pub fn from_bits(bits: u128) -> Self {
        Self(bits)
    }

    #[inline]
    pub fn to_bits(self) -> u128 {
        self.0
    }

    #[inline]
    pub fn from_le_bytes(bytes: [u8; 16]) -> Self {
        Self(u128::from_le_bytes(bytes))
    }

    #[inline]
    pub fn to_le_bytes(self) -> [u8; 16] {
        self.0.to_le_bytes()
    }

    /// Reads the `lane`-th 8-bit lane.
    pub fn lane_i8(self, lane: u8) -> u8 {
        self.to_le_bytes()[lane as usize & 15]
    }

    /// Replaces the `lane`-th 8-bit lane.
    pub fn with_lane_i8(self, lane: u8, value: u8) -> Self {
        let mut bytes = self.to_le_bytes();
        bytes[lane as usize & 15] = value;
        Self::from_le_bytes(bytes)
    }

    /// Reads the `lane`-th 32-bit lane.
    pub fn lane_i32(self, lane: u8) -> u32 {
        let bytes = self.to_le_bytes();
        let base = (lane as usize & 3) * 4;
        u32::from_le_bytes([bytes[base], bytes[base + 1], bytes[base + 2], bytes[base + 3]])
    }

    /// Replaces the `lane`-th 32-bit lane.
    pub fn with_lane_i32(self, lane: u8, value: u32) -> Self {
        let mut bytes = self.to_le_bytes();
        let base = (lane as usize & 3) * 4;
        bytes[base..base + 4].copy_from_slice(&value.to_le_bytes());
        Self::from_le_bytes(bytes)
    }

    /// Lane-wise `i8x16.add` with wrapping lane arithmetic.
    pub fn i8x16_add(self, rhs: Self) -> Self {
        let lhs = self.to_le_bytes();
        let rhs = rhs.to_le_bytes();
        let mut out = [0u8; 16];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = lhs[i].wrapping_add(rhs[i]);
        }
        Self::from_le_bytes(out)
    }

    /// Lane-wise saturating `i32x4.trunc_sat_f32x4_s`.
    pub fn i32x4_trunc_sat_f32x4_s(self) -> Self {
        let mut out = Self::default();
        for lane in 0..4 {
            let sample = f32::from_bits(self.lane_i32(lane));
            out = out.with_lane_i32(lane, trunc_sat_f32_to_i32(sample) as u32);
        }
        out
    }

    /// Broadcasts a 32-bit value into all four lanes.
    pub fn splat_i32(value: u32) -> Self {
        let mut out = Self::default();
        for lane in 0..4 {
            out = out.with_lane_i32(lane, value);
        }
        out
    }

    /// Broadcasts an 8-bit value into all sixteen lanes.
    pub fn splat_i8(value: u8) -> Self {
        Self::from_le_bytes([value; 16])
    }

    /// Broadcasts a 16-bit value into all eight lanes.
    pub fn splat_i16(value: u16) -> Self {
        let mut bytes = [0u8; 16];
        for chunk in bytes.chunks_exact_mut(2) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        Self::from_le_bytes(bytes)
    }

    /// Broadcasts a 64-bit value into both lanes.
    pub fn splat_i64(value: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&value.to_le_bytes());
        bytes[8..].copy_from_slice(&value.to_le_bytes());
        Self::from_le_bytes(bytes)
    }
}

/// A tagged runtime value.
///
/// The tag is load-bearing: this interpreter executes unvalidated
/// bytecode, so every pop re-checks the kind and a mismatch traps with
/// [`TrapCode::TypeMismatch`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Value {
    I32(i32),
    I64(i64),
    F32(F32),
    F64(F64),
    V128(V128),
    FuncRef(FuncRef),
    ExternRef(ExternRef),
}

macro_rules! impl_typed_accessors {
    ( $( ($variant:ident, $ty:ty, $name:ident) ),* $(,)? ) => {
        paste::paste! {
            impl Value {
                $(
                    #[doc = "Reads the payload, trapping on a kind mismatch."]
                    #[inline]
                    pub fn [<as_ $name>](&self) -> Result<$ty, TrapCode> {
                        match self {
                            Value::$variant(value) => Ok(*value),
                            _ => Err(TrapCode::TypeMismatch),
                        }
                    }
                )*
            }

            $(
                impl From<$ty> for Value {
                    #[inline]
                    fn from(value: $ty) -> Self {
                        Value::$variant(value)
                    }
                }
            )*
        }
    };
}

impl_typed_accessors!(
    (I32, i32, i32),
    (I64, i64, i64),
    (F32, F32, f32),
    (F64, F64, f64),
    (V128, V128, v128),
    (FuncRef, FuncRef, func_ref),
    (ExternRef, ExternRef, extern_ref),
);

impl From<u32> for Value {
    #[inline]
    fn from(value: u32) -> Self {
        Value::I32(value as i32)
    }
}

impl From<u64> for Value {
    #[inline]
    fn from(value: u64) -> Self {
        Value::I64(value as i64)
    }
}

impl From<f32> for Value {
    #[inline]
    fn from(value: f32) -> Self {
        Value::F32(value.into())
    }
}

impl From<f64> for Value {
    #[inline]
    fn from(value: f64) -> Self {
        Value::F64(value.into())
    }
}

impl Value {
    /// The kind tag of this value.
    pub fn kind(&self) -> ValType {
        match self {
            Value::I32(_) => ValType::I32,
            Value::I64(_) => ValType::I64,
            Value::F32(_) => ValType::F32,
            Value::F64(_) => ValType::F64,
            Value::V128(_) => ValType::V128,
            Value::FuncRef(_) => ValType::FuncRef,
            Value::ExternRef(_) => ValType::ExternRef,
        }
    }

    /// The zero value of the given type.
    pub fn default_for(ty: ValType) -> Self {
        match ty {
            ValType::I32 => Value::I32(0),
            ValType::I64 => Value::I64(0),
            ValType::F32 => Value::F32(F32::default()),
            ValType::F64 => Value::F64(F64::default()),
            ValType::V128 => Value::V128(V128::default()),
            ValType::FuncRef => Value::FuncRef(FuncRef::null()),
            ValType::ExternRef => Value::ExternRef(ExternRef::null()),
        }
    }

    /// Checks this value against a declared type; the two reference
    /// types share one tag.
    pub fn matches_valtype(&self, expected: ValType) -> bool {
        let kind = self.kind();
        kind == expected || (kind.is_ref() && expected.is_ref())
    }

    /// The integer payload zero-extended to 64 bits, trapping on a
    /// non-integer kind.
    #[inline]
    pub fn int_bits(&self) -> Result<u64, TrapCode> {
        match self {
            Value::I32(value) => Ok(*value as u32 as u64),
            Value::I64(value) => Ok(*value as u64),
            _ => Err(TrapCode::TypeMismatch),
        }
    }

    /// The integer payload sign-extended to 64 bits, trapping on a
    /// non-integer kind.
    #[inline]
    pub fn int_bits_signed(&self) -> Result<i64, TrapCode> {
        match self {
            Value::I32(value) => Ok(*value as i64),
            Value::I64(value) => Ok(*value),
            _ => Err(TrapCode::TypeMismatch),
        }
    }

    /// Rebuilds an integer value of the given width from raw 64-bit
    /// arithmetic, masking and re-extending as the descriptor demands.
    #[inline]
    pub fn from_int_bits(bits: u64, bit_width: u8) -> Self {
        match bit_width {
            32 => Value::I32(bits as u32 as i32),
            _ => Value::I64(bits as i64),
        }
    }

    /// Reads either reference kind, trapping on non-reference values.
    #[inline]
    pub fn as_ref_token(&self) -> Result<u64, TrapCode> {
        match self {
            Value::FuncRef(value) => Ok(value.token()),
            Value::ExternRef(value) => Ok(value.token()),
            _ => Err(TrapCode::TypeMismatch),
        }
    }

    /// The `i32` truthiness used by `br_if`, `if` and `select`.
    #[inline]
    pub fn truthy(&self) -> Result<bool, TrapCode> {
        Ok(self.as_i32()? != 0)
    }
}

impl core::fmt::Display for Value {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Value::I32(value) => write!(f, "i32:{value}"),
            Value::I64(value) => write!(f, "i64:{value}"),
            Value::F32(value) => write!(f, "f32:{value}"),
            Value::F64(value) => write!(f, "f64:{value}"),
            Value::V128(value) => write!(f, "v128:{:032x}", value.to_bits()),
            Value::FuncRef(value) => write!(f, "funcref:{value}"),
            Value::ExternRef(value) => write!(f, "externref:{value}"),
        }
    }
}

/// `fNN.nearest` with round-half-to-even semantics.
#[inline]
pub fn nearest_f32(value: f32) -> f32 {
    libm::rintf(value)
}

/// See [`nearest_f32`].
#[inline]
pub fn nearest_f64(value: f64) -> f64 {
    libm::rint(value)
}

macro_rules! impl_wasm_min_max {
    ($min:ident, $max:ident, $prim:ty) => {
        /// Wasm `min`: NaN-propagating, `-0.0 < +0.0`.
        pub fn $min(lhs: $prim, rhs: $prim) -> $prim {
            match (lhs.is_nan(), rhs.is_nan()) {
                (true, false) => lhs,
                (false, true) => rhs,
                _ => {
                    if rhs.is_sign_negative() {
                        return rhs.min(lhs);
                    }
                    lhs.min(rhs)
                }
            }
        }

        /// Wasm `max`: NaN-propagating, `+0.0 > -0.0`.
        pub fn $max(lhs: $prim, rhs: $prim) -> $prim {
            match (lhs.is_nan(), rhs.is_nan()) {
                (true, false) => lhs,
                (false, true) => rhs,
                _ => {
                    if rhs.is_sign_positive() {
                        return rhs.max(lhs);
                    }
                    lhs.max(rhs)
                }
            }
        }
    };
}

impl_wasm_min_max!(wasm_min_f32, wasm_max_f32, f32);
impl_wasm_min_max!(wasm_min_f64, wasm_max_f64, f64);

macro_rules! impl_trunc_to_int {
    ($name:ident, $sat:ident, $prim:ty, $int:ty, $trunc:path, $lo:expr, $hi:expr) => {
        /// Trapping float-to-integer truncation.
        pub fn $name(value: $prim) -> Result<$int, TrapCode> {
            if value.is_nan() {
                return Err(TrapCode::BadConversionToInteger);
            }
            let truncated = $trunc(value);
            if truncated >= $hi || truncated < $lo {
                return Err(TrapCode::IntegerOverflow);
            }
            Ok(truncated as $int)
        }

        /// Saturating float-to-integer truncation; NaN becomes zero.
        #[inline]
        pub fn $sat(value: $prim) -> $int {
            value as $int
        }
    };
}

impl_trunc_to_int!(
    trunc_f32_to_i32,
    trunc_sat_f32_to_i32,
    f32,
    i32,
    libm::truncf,
    -2147483648.0,
    2147483648.0
);
impl_trunc_to_int!(
    trunc_f32_to_u32,
    trunc_sat_f32_to_u32,
    f32,
    u32,
    libm::truncf,
    0.0,
    4294967296.0
);
impl_trunc_to_int!(
    trunc_f32_to_i64,
    trunc_sat_f32_to_i64,
    f32,
    i64,
    libm::truncf,
    -9223372036854775808.0,
    9223372036854775808.0
);
impl_trunc_to_int!(
    trunc_f32_to_u64,
    trunc_sat_f32_to_u64,
    f32,
    u64,
    libm::truncf,
    0.0,
    18446744073709551616.0
);
impl_trunc_to_int!(
    trunc_f64_to_i32,
    trunc_sat_f64_to_i32,
    f64,
    i32,
    libm::trunc,
    -2147483648.0,
    2147483648.0
);
impl_trunc_to_int!(
    trunc_f64_to_u32,
    trunc_sat_f64_to_u32,
    f64,
    u32,
    libm::trunc,
    0.0,
    4294967296.0
);
impl_trunc_to_int!(
    trunc_f64_to_i64,
    trunc_sat_f64_to_i64,
    f64,
    i64,
    libm::trunc,
    -9223372036854775808.0,
    9223372036854775808.0
);
impl_trunc_to_int!(
    trunc_f64_to_u64,
    trunc_sat_f64_to_u64,
    f64,
    u64,
    libm::trunc,
    0.0,
    18446744073709551616.0
);
