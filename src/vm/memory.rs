use crate::loader::MemoryDecl;
use crate::types::{Pages, RuntimeError, TrapCode, N_BYTES_PER_MEMORY_PAGE};
use bytes::BytesMut;

/// One linear memory instance.
///
/// The buffer always lives here; a host-bound memory is one whose
/// initial contents came from the embedder and whose buffer remains
/// reachable through the runtime accessors. While spilled the buffer
/// is empty and `size_bytes` remembers the logical size the load hook
/// must restore.
pub struct RuntimeMemory {
    data: BytesMut,
    size_bytes: u64,
    max_bytes: Option<u64>,
    is_memory64: bool,
    is_spilled: bool,
    is_host: bool,
    allow_grow: bool,
}

impl RuntimeMemory {
    /// Materialises a defined memory at its declared minimum size.
    pub fn new(decl: &MemoryDecl) -> Result<Self, RuntimeError> {
        let size_bytes = Pages::new(decl.limits.min)
            .to_bytes()
            .ok_or(RuntimeError::InvalidArgument)?;
        let max_bytes = match decl.limits.max {
            Some(max) => Some(
                Pages::new(max)
                    .to_bytes()
                    .ok_or(RuntimeError::InvalidArgument)?,
            ),
            None => None,
        };
        let len = usize::try_from(size_bytes).map_err(|_| RuntimeError::OutOfMemory)?;
        let mut data = BytesMut::with_capacity(len);
        data.resize(len, 0);
        Ok(Self {
            data,
            size_bytes,
            max_bytes,
            is_memory64: decl.is_memory64,
            is_spilled: false,
            is_host: false,
            allow_grow: true,
        })
    }

    /// Adopts a host-provided buffer for an imported memory.
    ///
    /// The buffer length must be page-aligned and satisfy the import's
    /// declared limits.
    pub fn from_host_buffer(
        decl: &MemoryDecl,
        buffer: impl Into<BytesMut>,
        allow_grow: bool,
    ) -> Result<Self, RuntimeError> {
        let data = buffer.into();
        let size_bytes = data.len() as u64;
        let pages = Pages::from_bytes(size_bytes).ok_or(RuntimeError::InvalidArgument)?;
        if pages.get() < decl.limits.min {
            return Err(RuntimeError::InvalidArgument);
        }
        let max_bytes = match decl.limits.max {
            Some(max) => {
                if pages.get() > max {
                    return Err(RuntimeError::InvalidArgument);
                }
                Some(
                    Pages::new(max)
                        .to_bytes()
                        .ok_or(RuntimeError::InvalidArgument)?,
                )
            }
            None => None,
        };
        Ok(Self {
            data,
            size_bytes,
            max_bytes,
            is_memory64: decl.is_memory64,
            is_spilled: false,
            is_host: true,
            allow_grow,
        })
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn max_bytes(&self) -> Option<u64> {
        self.max_bytes
    }

    /// Current size in pages.
    pub fn pages(&self) -> u64 {
        self.size_bytes / N_BYTES_PER_MEMORY_PAGE as u64
    }

    pub fn is_memory64(&self) -> bool {
        self.is_memory64
    }

    pub fn is_spilled(&self) -> bool {
        self.is_spilled
    }

    pub fn is_host(&self) -> bool {
        self.is_host
    }

    /// The failure sentinel `memory.grow` pushes: all ones at the
    /// memory's index width.
    pub fn grow_sentinel(&self) -> u64 {
        if self.is_memory64 {
            u64::MAX
        } else {
            u32::MAX as u64
        }
    }

    /// Grows by `delta` pages, returning the previous page count, or
    /// `None` for any refusal. Growing by zero always succeeds.
    pub fn grow(&mut self, delta: u64) -> Option<u64> {
        let current = self.pages();
        if delta == 0 {
            return Some(current);
        }
        if self.is_spilled || (self.is_host && !self.allow_grow) {
            return None;
        }
        let desired = Pages::new(current).checked_add(Pages::new(delta))?;
        let new_bytes = desired.to_bytes()?;
        if let Some(max) = self.max_bytes {
            if new_bytes > max {
                return None;
            }
        }
        // a 32-bit memory cannot outgrow its address space
        if !self.is_memory64 && desired.get() > 65536 {
            return None;
        }
        let new_len = usize::try_from(new_bytes).ok()?;
        self.data.resize(new_len, 0);
        self.size_bytes = new_bytes;
        Some(current)
    }

    /// Shared view of the bytes; fails while spilled.
    pub fn data(&self) -> Result<&[u8], TrapCode> {
        if self.is_spilled {
            return Err(TrapCode::MemoryOutOfBounds);
        }
        Ok(self.data.as_ref())
    }

    /// Exclusive view of the bytes; fails while spilled.
    pub fn data_mut(&mut self) -> Result<&mut [u8], TrapCode> {
        if self.is_spilled {
            return Err(TrapCode::MemoryOutOfBounds);
        }
        Ok(self.data.as_mut())
    }

    /// Checks `addr + len` against the current size with unsigned
    /// arithmetic that cannot wrap.
    pub fn check_range(&self, addr: u64, len: u64) -> Result<(), TrapCode> {
        let end = addr.checked_add(len).ok_or(TrapCode::MemoryOutOfBounds)?;
        if end > self.size_bytes {
            return Err(TrapCode::MemoryOutOfBounds);
        }
        Ok(())
    }

    /// Reads `buffer.len()` bytes starting at `offset`.
    pub fn read(&self, offset: u64, buffer: &mut [u8]) -> Result<(), TrapCode> {
        self.check_range(offset, buffer.len() as u64)?;
        let start = offset as usize;
        buffer.copy_from_slice(&self.data()?[start..start + buffer.len()]);
        Ok(())
    }

    /// Writes `buffer` starting at `offset`.
    pub fn write(&mut self, offset: u64, buffer: &[u8]) -> Result<(), TrapCode> {
        self.check_range(offset, buffer.len() as u64)?;
        let start = offset as usize;
        self.data_mut()?[start..start + buffer.len()].copy_from_slice(buffer);
        Ok(())
    }

    /// Detaches the buffer for a spill; the logical size is retained
    /// so the matching load can be verified.
    pub fn take_for_spill(&mut self) -> BytesMut {
        self.is_spilled = true;
        core::mem::take(&mut self.data)
    }

    /// Re-attaches a buffer produced by the load hook; its length must
    /// equal the size at spill time.
    pub fn restore_from_load(&mut self, buffer: impl Into<BytesMut>) -> Result<(), RuntimeError> {
        let buffer = buffer.into();
        if buffer.len() as u64 != self.size_bytes {
            return Err(RuntimeError::Unsupported);
        }
        self.data = buffer;
        self.is_spilled = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::Limits;

    fn decl(min: u64, max: Option<u64>) -> MemoryDecl {
        MemoryDecl {
            limits: Limits { min, max },
            is_memory64: false,
            imported: None,
        }
    }

    #[test]
    fn grow_by_zero_always_succeeds() {
        let mut memory = RuntimeMemory::new(&decl(1, Some(1))).unwrap();
        assert_eq!(memory.grow(0), Some(1));
        assert_eq!(memory.pages(), 1);
    }

    #[test]
    fn grow_past_max_fails_without_resizing() {
        let mut memory = RuntimeMemory::new(&decl(1, Some(2))).unwrap();
        assert_eq!(memory.grow(2), None);
        assert_eq!(memory.pages(), 1);
        assert_eq!(memory.grow(1), Some(1));
        assert_eq!(memory.pages(), 2);
    }

    #[test]
    fn bounds_check_is_overflow_safe() {
        let memory = RuntimeMemory::new(&decl(1, None)).unwrap();
        assert!(memory.check_range(u64::MAX, 8).is_err());
        assert!(memory.check_range(65536, 0).is_ok());
        assert!(memory.check_range(65533, 4).is_err());
    }

    #[test]
    fn spill_round_trip_preserves_bytes() {
        let mut memory = RuntimeMemory::new(&decl(1, None)).unwrap();
        memory.write(0, &[1, 2, 3]).unwrap();
        let spilled = memory.take_for_spill();
        assert!(memory.is_spilled());
        assert!(memory.data().is_err());
        memory.restore_from_load(spilled).unwrap();
        let mut bytes = [0u8; 3];
        memory.read(0, &mut bytes).unwrap();
        assert_eq!(bytes, [1, 2, 3]);
    }

    #[test]
    fn load_size_mismatch_is_unsupported() {
        let mut memory = RuntimeMemory::new(&decl(1, None)).unwrap();
        memory.take_for_spill();
        let short = BytesMut::from(&[0u8; 16][..]);
        assert!(matches!(
            memory.restore_from_load(short),
            Err(RuntimeError::Unsupported)
        ));
    }

    #[test]
    fn host_memory_refuses_growth_by_default() {
        let buffer = BytesMut::from(&alloc::vec![0u8; 65536][..]);
        let mut memory = RuntimeMemory::from_host_buffer(&decl(1, None), buffer, false).unwrap();
        assert!(memory.is_host());
        assert_eq!(memory.grow(1), None);
        assert_eq!(memory.grow(0), Some(1));
    }
}
