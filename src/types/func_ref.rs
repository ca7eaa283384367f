/// An opaque, nullable reference to a function by its index in the
/// attached module's function space.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct FuncRef(Option<u32>);

impl FuncRef {
    /// A reference to the function at `func_idx`.
    pub fn from_index(func_idx: u32) -> Self {
        Self(Some(func_idx))
    }

    /// The null reference.
    pub fn null() -> Self {
        Self(None)
    }

    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    /// The referenced function index, `None` for null.
    pub fn index(&self) -> Option<u32> {
        self.0
    }

    /// A flat 64-bit token for host traffic: zero is null, any other
    /// value is `index + 1`.
    pub fn token(&self) -> u64 {
        match self.0 {
            Some(index) => u64::from(index) + 1,
            None => 0,
        }
    }

    pub fn from_token(token: u64) -> Self {
        if token == 0 {
            Self::null()
        } else {
            Self(Some((token - 1) as u32))
        }
    }
}

impl core::fmt::Display for FuncRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.0 {
            Some(index) => write!(f, "func[{index}]"),
            None => write!(f, "null"),
        }
    }
}

/// An opaque host-defined reference token; the core only moves it
/// around and compares it against null.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ExternRef(u64);

impl ExternRef {
    pub fn new(token: u64) -> Self {
        Self(token)
    }

    pub fn null() -> Self {
        Self(0)
    }

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    pub fn token(&self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for ExternRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_null() {
            write!(f, "null")
        } else {
            write!(f, "extern[{}]", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip() {
        assert_eq!(FuncRef::from_token(FuncRef::null().token()), FuncRef::null());
        let reference = FuncRef::from_index(0);
        assert!(!reference.is_null());
        assert_eq!(FuncRef::from_token(reference.token()), reference);
    }
}
