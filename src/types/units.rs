use crate::types::N_BYTES_PER_MEMORY_PAGE;

/// An amount of linear memory pages.
///
/// One page is 64 KiB. Page counts are carried as `u64` so the same
/// type covers memory64 limits.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Pages(u64);

impl Pages {
    pub const fn new(pages: u64) -> Self {
        Self(pages)
    }

    /// The page count covering `bytes`, which must be page-aligned.
    pub fn from_bytes(bytes: u64) -> Option<Self> {
        if bytes % N_BYTES_PER_MEMORY_PAGE as u64 != 0 {
            return None;
        }
        Some(Self(bytes / N_BYTES_PER_MEMORY_PAGE as u64))
    }

    /// This amount in bytes, `None` on overflow.
    pub fn to_bytes(self) -> Option<u64> {
        self.0.checked_mul(N_BYTES_PER_MEMORY_PAGE as u64)
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for Pages {
    fn from(pages: u64) -> Self {
        Self(pages)
    }
}

impl From<Pages> for u64 {
    fn from(pages: Pages) -> Self {
        pages.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_conversion() {
        assert_eq!(Pages::new(2).to_bytes(), Some(131072));
        assert_eq!(Pages::from_bytes(131072), Some(Pages::new(2)));
        assert_eq!(Pages::from_bytes(1), None);
    }
}
