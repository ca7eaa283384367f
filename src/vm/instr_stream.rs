use crate::loader::Module;
use crate::types::{RuntimeError, TrapCode};
use alloc::{sync::Arc, vec::Vec};

/// Strict LEB128 over an in-memory body window.
///
/// Same acceptance rules as the loader's reader; failures here happen
/// mid-execution and therefore surface as traps.
fn read_uleb_slice(bytes: &[u8], pc: &mut usize, bits: u32) -> Result<u64, TrapCode> {
    let mut result: u64 = 0;
    let mut shift: u32 = 0;
    loop {
        if shift >= bits {
            return Err(TrapCode::MalformedInstruction);
        }
        let byte = *bytes.get(*pc).ok_or(TrapCode::MemoryOutOfBounds)?;
        *pc += 1;
        if shift + 7 > bits && (byte & 0x7F) >> (bits - shift) != 0 {
            return Err(TrapCode::MalformedInstruction);
        }
        result |= ((byte & 0x7F) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
    }
}

fn read_sleb_slice(bytes: &[u8], pc: &mut usize, bits: u32) -> Result<i64, TrapCode> {
    let mut result: i64 = 0;
    let mut shift: u32 = 0;
    loop {
        if shift >= bits {
            return Err(TrapCode::MalformedInstruction);
        }
        let byte = *bytes.get(*pc).ok_or(TrapCode::MemoryOutOfBounds)?;
        *pc += 1;
        result |= (((byte & 0x7F) as i64)) << shift;
        shift += 7;
        if byte & 0x80 == 0 {
            if shift < 64 && (byte & 0x40) != 0 {
                result |= -1i64 << shift;
            }
            if bits < 64 {
                let min = -(1i64 << (bits - 1));
                let max = (1i64 << (bits - 1)) - 1;
                if result < min || result > max {
                    return Err(TrapCode::MalformedInstruction);
                }
            }
            return Ok(result);
        }
    }
}

/// The per-job instruction stream.
///
/// Holds at most one function body in memory at a time: loading a
/// function replaces the previous window, so only the body currently
/// executing stays resident. The program counter is a byte offset into
/// the window; any read past it traps.
pub struct InstructionStream {
    module: Option<Arc<Module>>,
    function_idx: Option<u32>,
    body: Vec<u8>,
    pc: usize,
}

impl InstructionStream {
    pub fn new(module: Arc<Module>) -> Self {
        Self {
            module: Some(module),
            function_idx: None,
            body: Vec::new(),
            pc: 0,
        }
    }

    /// A detached stream over a raw body, used by the prepared-program
    /// builder; `load` is unavailable on it.
    pub fn from_body(body: Vec<u8>) -> Self {
        Self {
            module: None,
            function_idx: None,
            body,
            pc: 0,
        }
    }

    pub fn module(&self) -> Option<&Arc<Module>> {
        self.module.as_ref()
    }

    /// Loads `function_idx`'s body, replacing any loaded one. Loading
    /// the function already resident just resets the PC.
    pub fn load(&mut self, function_idx: u32) -> Result<(), RuntimeError> {
        if self.function_idx == Some(function_idx) {
            self.pc = 0;
            return Ok(());
        }
        let module = self.module.as_ref().ok_or(RuntimeError::NoModule)?;
        let body = module.load_function_body(function_idx)?;
        self.body = body;
        self.function_idx = Some(function_idx);
        self.pc = 0;
        Ok(())
    }

    /// Drops the resident body.
    pub fn unload(&mut self) {
        self.function_idx = None;
        self.body = Vec::new();
        self.pc = 0;
    }

    pub fn is_loaded(&self) -> bool {
        self.function_idx.is_some()
    }

    pub fn function_idx(&self) -> Option<u32> {
        self.function_idx
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    pub fn at_end(&self) -> bool {
        self.pc >= self.body.len()
    }

    pub fn set_pc(&mut self, offset: usize) -> Result<(), TrapCode> {
        if offset > self.body.len() {
            return Err(TrapCode::MemoryOutOfBounds);
        }
        self.pc = offset;
        Ok(())
    }

    pub fn advance(&mut self, count: usize) -> Result<(), TrapCode> {
        let next = self.pc.checked_add(count).ok_or(TrapCode::MemoryOutOfBounds)?;
        self.set_pc(next)
    }

    pub fn peek_byte(&self) -> Result<u8, TrapCode> {
        self.body.get(self.pc).copied().ok_or(TrapCode::MemoryOutOfBounds)
    }

    pub fn read_byte(&mut self) -> Result<u8, TrapCode> {
        let byte = self.peek_byte()?;
        self.pc += 1;
        Ok(byte)
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), TrapCode> {
        let end = self
            .pc
            .checked_add(buf.len())
            .ok_or(TrapCode::MemoryOutOfBounds)?;
        let slice = self.body.get(self.pc..end).ok_or(TrapCode::MemoryOutOfBounds)?;
        buf.copy_from_slice(slice);
        self.pc = end;
        Ok(())
    }

    pub fn read_uleb32(&mut self) -> Result<u32, TrapCode> {
        Ok(read_uleb_slice(&self.body, &mut self.pc, 32)? as u32)
    }

    pub fn read_uleb64(&mut self) -> Result<u64, TrapCode> {
        read_uleb_slice(&self.body, &mut self.pc, 64)
    }

    pub fn read_sleb32(&mut self) -> Result<i32, TrapCode> {
        Ok(read_sleb_slice(&self.body, &mut self.pc, 32)? as i32)
    }

    pub fn read_sleb64(&mut self) -> Result<i64, TrapCode> {
        read_sleb_slice(&self.body, &mut self.pc, 64)
    }

    pub fn read_sleb33(&mut self) -> Result<i64, TrapCode> {
        read_sleb_slice(&self.body, &mut self.pc, 33)
    }

    /// The full resident body; empty when nothing is loaded.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The absolute source offset of the current PC, for diagnostics.
    pub fn absolute_offset(&self) -> Option<u64> {
        let function_idx = self.function_idx?;
        let (body_offset, _) = self.module.as_ref()?.body_range(function_idx)?;
        Some(body_offset + self.pc as u64)
    }

    /// Maps an absolute source offset back to (function, offset); see
    /// [`Module::function_for_offset`].
    pub fn locate_absolute(&self, absolute_offset: u64) -> Option<(u32, u32)> {
        self.module.as_ref()?.function_for_offset(absolute_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::Module;

    fn stream_for(wat: &str) -> InstructionStream {
        let module = Module::from_bytes(wat::parse_str(wat).unwrap()).unwrap();
        InstructionStream::new(Arc::new(module))
    }

    #[test]
    fn lazy_single_body() {
        let mut stream = stream_for(
            r#"
(module
  (func (result i32) i32.const 41)
  (func (result i32) i32.const 42)
)"#,
        );
        assert!(!stream.is_loaded());
        stream.load(0).unwrap();
        assert!(stream.is_loaded());
        let first_len = stream.body_len();
        stream.advance(1).unwrap();
        stream.load(1).unwrap();
        assert_eq!(stream.pc(), 0);
        assert_eq!(stream.body_len(), first_len);
        stream.unload();
        assert!(!stream.is_loaded());
    }

    #[test]
    fn reads_past_window_trap() {
        let mut stream = stream_for(r#"(module (func))"#);
        stream.load(0).unwrap();
        let len = stream.body_len();
        stream.set_pc(len).unwrap();
        assert!(stream.read_byte().is_err());
        assert!(stream.set_pc(len + 1).is_err());
    }

    #[test]
    fn body_reads_decode_lebs() {
        let mut stream = stream_for(r#"(module (func (result i32) i32.const 624485 drop i32.const 1))"#);
        stream.load(0).unwrap();
        // locals declaration: empty vec
        assert_eq!(stream.read_byte().unwrap(), 0x00);
        assert_eq!(stream.read_byte().unwrap(), 0x41);
        assert_eq!(stream.read_sleb32().unwrap(), 624485);
    }
}
