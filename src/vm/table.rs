use crate::loader::TableDecl;
use crate::types::{RuntimeError, TrapCode, ValType, Value};
use alloc::vec::Vec;

/// One table instance: an ordered run of reference tokens.
pub struct RuntimeTable {
    elements: Vec<Value>,
    elem_type: ValType,
    max_size: Option<u32>,
    is_host: bool,
    allow_grow: bool,
}

impl RuntimeTable {
    /// Materialises a defined table at its declared minimum size,
    /// filled with nulls.
    pub fn new(decl: &TableDecl) -> Result<Self, RuntimeError> {
        let min = u32::try_from(decl.limits.min).map_err(|_| RuntimeError::InvalidArgument)?;
        let max_size = match decl.limits.max {
            Some(max) => Some(u32::try_from(max).map_err(|_| RuntimeError::InvalidArgument)?),
            None => None,
        };
        let null = Value::default_for(decl.elem_type);
        Ok(Self {
            elements: alloc::vec![null; min as usize],
            elem_type: decl.elem_type,
            max_size,
            is_host: false,
            allow_grow: true,
        })
    }

    /// Adopts a host-provided run of references for an imported table.
    pub fn from_host_elements(
        decl: &TableDecl,
        elements: Vec<Value>,
        allow_grow: bool,
    ) -> Result<Self, RuntimeError> {
        if (elements.len() as u64) < decl.limits.min {
            return Err(RuntimeError::InvalidArgument);
        }
        if let Some(max) = decl.limits.max {
            if elements.len() as u64 > max {
                return Err(RuntimeError::InvalidArgument);
            }
        }
        if elements.iter().any(|v| !v.kind().is_ref()) {
            return Err(RuntimeError::InvalidArgument);
        }
        let max_size = decl.limits.max.map(|max| max as u32);
        Ok(Self {
            elements,
            elem_type: decl.elem_type,
            max_size,
            is_host: true,
            allow_grow,
        })
    }

    pub fn elem_type(&self) -> ValType {
        self.elem_type
    }

    pub fn size(&self) -> u32 {
        self.elements.len() as u32
    }

    pub fn max_size(&self) -> Option<u32> {
        self.max_size
    }

    pub fn is_host(&self) -> bool {
        self.is_host
    }

    pub fn get(&self, index: u32) -> Result<Value, TrapCode> {
        self.elements
            .get(index as usize)
            .copied()
            .ok_or(TrapCode::TableOutOfBounds)
    }

    pub fn set(&mut self, index: u32, value: Value) -> Result<(), TrapCode> {
        if !value.kind().is_ref() {
            return Err(TrapCode::TypeMismatch);
        }
        let slot = self
            .elements
            .get_mut(index as usize)
            .ok_or(TrapCode::TableOutOfBounds)?;
        *slot = value;
        Ok(())
    }

    /// Grows by `delta` entries seeded with `init`, returning the
    /// previous size, or `None` for any refusal. Growing by zero
    /// always succeeds.
    pub fn grow(&mut self, delta: u32, init: Value) -> Option<u32> {
        let current = self.size();
        if delta == 0 {
            return Some(current);
        }
        if self.is_host && !self.allow_grow {
            return None;
        }
        if !init.kind().is_ref() {
            return None;
        }
        let desired = current.checked_add(delta)?;
        if let Some(max) = self.max_size {
            if desired > max {
                return None;
            }
        }
        self.elements.resize(desired as usize, init);
        Some(current)
    }

    /// Fills `[dst, dst + len)` with `value` after validating the full
    /// range.
    pub fn fill(&mut self, dst: u32, value: Value, len: u32) -> Result<(), TrapCode> {
        if !value.kind().is_ref() {
            return Err(TrapCode::TypeMismatch);
        }
        let range = self.checked_range(dst, len)?;
        self.elements[range].fill(value);
        Ok(())
    }

    /// Copies inside one table with full pre-validation of both
    /// ranges; overlapping ranges behave like `memmove`.
    pub fn copy_within(&mut self, dst: u32, src: u32, len: u32) -> Result<(), TrapCode> {
        self.checked_range(dst, len)?;
        let src_range = self.checked_range(src, len)?;
        self.elements.copy_within(src_range, dst as usize);
        Ok(())
    }

    /// Copies across two tables with full pre-validation.
    pub fn copy(
        dst_table: &mut RuntimeTable,
        dst: u32,
        src_table: &RuntimeTable,
        src: u32,
        len: u32,
    ) -> Result<(), TrapCode> {
        let dst_range = dst_table.checked_range(dst, len)?;
        let src_range = src_table.checked_range(src, len)?;
        dst_table.elements[dst_range].copy_from_slice(&src_table.elements[src_range]);
        Ok(())
    }

    /// Copies a run out of an element segment's materialised items.
    pub fn init(&mut self, dst: u32, items: &[Value], src: u32, len: u32) -> Result<(), TrapCode> {
        let dst_range = self.checked_range(dst, len)?;
        let src_end = (src as usize)
            .checked_add(len as usize)
            .ok_or(TrapCode::TableOutOfBounds)?;
        let src_items = items
            .get(src as usize..src_end)
            .ok_or(TrapCode::TableOutOfBounds)?;
        self.elements[dst_range].copy_from_slice(src_items);
        Ok(())
    }

    fn checked_range(&self, start: u32, len: u32) -> Result<core::ops::Range<usize>, TrapCode> {
        let end = (start as usize)
            .checked_add(len as usize)
            .ok_or(TrapCode::TableOutOfBounds)?;
        if end > self.elements.len() {
            return Err(TrapCode::TableOutOfBounds);
        }
        Ok(start as usize..end)
    }
}
