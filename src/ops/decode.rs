use crate::loader::Module;
use crate::ops::opcode::{ExtOpcode, Opcode, PrefixedOpcode, SimdOpcode, PREFIX_FC, PREFIX_SIMD};
use crate::types::{RuntimeError, TrapCode, ValType};
use crate::vm::{InstructionStream, RegisterWindow};
use alloc::vec::Vec;
use smallvec::SmallVec;

/// Reads the next opcode, folding the `0xFC`/`0xFD` prefixes into one
/// logical opcode key.
pub fn read_opcode(stream: &mut InstructionStream) -> Result<ExtOpcode, RuntimeError> {
    let byte = stream.read_byte()?;
    match byte {
        PREFIX_FC => Ok(ExtOpcode::Fc(stream.read_uleb32()?)),
        PREFIX_SIMD => Ok(ExtOpcode::Simd(stream.read_uleb32()?)),
        _ => Ok(ExtOpcode::Core(byte)),
    }
}

/// Where decoded immediates go: into a job's register window, or
/// nowhere when an instruction is only being skipped over.
struct Sink<'a> {
    reg: Option<&'a mut RegisterWindow>,
}

impl Sink<'_> {
    #[inline]
    fn put(&mut self, bits: u64, width: u8) {
        if let Some(reg) = self.reg.as_deref_mut() {
            reg.push(bits, width);
        }
    }
}

/// Decodes the immediates of `ext`, enqueueing them into `reg` in the
/// documented order (handlers drain newest-first).
///
/// With `reg = None` this degrades to skipping the instruction's
/// immediates, which is what the block scanner and the prepared-program
/// builder need.
pub fn read_immediates(
    ext: ExtOpcode,
    stream: &mut InstructionStream,
    reg: Option<&mut RegisterWindow>,
) -> Result<(), RuntimeError> {
    let mut sink = Sink { reg };
    match ext {
        ExtOpcode::Core(byte) => {
            let Some(op) = Opcode::from_byte(byte) else {
                return Ok(());
            };
            read_core_immediates(op, stream, &mut sink)
        }
        ExtOpcode::Fc(sub) => {
            let Some(op) = PrefixedOpcode::from_u32(sub) else {
                return Ok(());
            };
            read_fc_immediates(op, stream, &mut sink)
        }
        ExtOpcode::Simd(sub) => {
            let Some(op) = SimdOpcode::from_u32(sub) else {
                return Ok(());
            };
            read_simd_immediates(op, stream, &mut sink)
        }
    }
}

fn read_memarg(stream: &mut InstructionStream, sink: &mut Sink<'_>) -> Result<(), RuntimeError> {
    let flags = stream.read_uleb32()?;
    // bit 6 of the alignment flags carries a memory index (multi-memory)
    let memory_idx = if flags & 0x40 != 0 {
        stream.read_uleb32()?
    } else {
        0
    };
    let offset = stream.read_uleb64()?;
    sink.put((flags & !0x40) as u64, 4);
    sink.put(memory_idx as u64, 4);
    sink.put(offset, 8);
    Ok(())
}

fn read_core_immediates(
    op: Opcode,
    stream: &mut InstructionStream,
    sink: &mut Sink<'_>,
) -> Result<(), RuntimeError> {
    use Opcode::*;
    match op {
        Block | Loop | If => {
            let block_type = stream.read_sleb33()?;
            sink.put(block_type as u64, 8);
        }
        Br | BrIf => {
            let label = stream.read_uleb32()?;
            sink.put(label as u64, 4);
        }
        BrTable => {
            let count = stream.read_uleb32()?;
            let vector_pc = stream.pc();
            for _ in 0..=count {
                stream.read_uleb32()?;
            }
            sink.put(count as u64, 4);
            sink.put(vector_pc as u64, 8);
        }
        Call => {
            let func_idx = stream.read_uleb32()?;
            sink.put(func_idx as u64, 4);
        }
        CallIndirect => {
            let type_idx = stream.read_uleb32()?;
            let table_idx = stream.read_uleb32()?;
            sink.put(type_idx as u64, 4);
            sink.put(table_idx as u64, 4);
        }
        SelectT => {
            let count = stream.read_uleb32()?;
            if count != 1 {
                return Err(RuntimeError::Unsupported);
            }
            let val_type = stream.read_byte()?;
            sink.put(val_type as u64, 1);
        }
        LocalGet | LocalSet | LocalTee | GlobalGet | GlobalSet | TableGet | TableSet => {
            let index = stream.read_uleb32()?;
            sink.put(index as u64, 4);
        }
        I32Load | I64Load | F32Load | F64Load | I32Load8S | I32Load8U | I32Load16S
        | I32Load16U | I64Load8S | I64Load8U | I64Load16S | I64Load16U | I64Load32S
        | I64Load32U | I32Store | I64Store | F32Store | F64Store | I32Store8 | I32Store16
        | I64Store8 | I64Store16 | I64Store32 => read_memarg(stream, sink)?,
        MemorySize | MemoryGrow => {
            let memory_idx = stream.read_uleb32()?;
            sink.put(memory_idx as u64, 4);
        }
        I32Const => {
            let value = stream.read_sleb32()?;
            sink.put(value as i64 as u64, 4);
        }
        I64Const => {
            let value = stream.read_sleb64()?;
            sink.put(value as u64, 8);
        }
        F32Const => {
            let mut bits = [0u8; 4];
            stream.read_exact(&mut bits)?;
            sink.put(u32::from_le_bytes(bits) as u64, 4);
        }
        F64Const => {
            let mut bits = [0u8; 8];
            stream.read_exact(&mut bits)?;
            sink.put(u64::from_le_bytes(bits), 8);
        }
        RefNull => {
            let heap_type = stream.read_byte()?;
            sink.put(heap_type as u64, 1);
        }
        RefFunc => {
            let func_idx = stream.read_uleb32()?;
            sink.put(func_idx as u64, 4);
        }
        _ => {}
    }
    Ok(())
}

fn read_fc_immediates(
    op: PrefixedOpcode,
    stream: &mut InstructionStream,
    sink: &mut Sink<'_>,
) -> Result<(), RuntimeError> {
    use PrefixedOpcode::*;
    match op {
        MemoryInit => {
            let data_idx = stream.read_uleb32()?;
            let memory_idx = stream.read_uleb32()?;
            sink.put(data_idx as u64, 4);
            sink.put(memory_idx as u64, 4);
        }
        DataDrop => {
            let data_idx = stream.read_uleb32()?;
            sink.put(data_idx as u64, 4);
        }
        MemoryCopy => {
            let dst_memory = stream.read_uleb32()?;
            let src_memory = stream.read_uleb32()?;
            sink.put(dst_memory as u64, 4);
            sink.put(src_memory as u64, 4);
        }
        MemoryFill => {
            let memory_idx = stream.read_uleb32()?;
            sink.put(memory_idx as u64, 4);
        }
        TableInit => {
            let elem_idx = stream.read_uleb32()?;
            let table_idx = stream.read_uleb32()?;
            sink.put(elem_idx as u64, 4);
            sink.put(table_idx as u64, 4);
        }
        ElemDrop => {
            let elem_idx = stream.read_uleb32()?;
            sink.put(elem_idx as u64, 4);
        }
        TableCopy => {
            let dst_table = stream.read_uleb32()?;
            let src_table = stream.read_uleb32()?;
            sink.put(dst_table as u64, 4);
            sink.put(src_table as u64, 4);
        }
        TableGrow | TableSize | TableFill => {
            let table_idx = stream.read_uleb32()?;
            sink.put(table_idx as u64, 4);
        }
        _ => {}
    }
    Ok(())
}

fn read_simd_immediates(
    op: SimdOpcode,
    stream: &mut InstructionStream,
    sink: &mut Sink<'_>,
) -> Result<(), RuntimeError> {
    use SimdOpcode::*;
    match op {
        V128Load | V128Store => read_memarg(stream, sink)?,
        V128Const => {
            let mut bytes = [0u8; 16];
            stream.read_exact(&mut bytes)?;
            let bits = u128::from_le_bytes(bytes);
            sink.put(bits as u64, 8);
            sink.put((bits >> 64) as u64, 8);
        }
        I8x16ExtractLaneS | I8x16ExtractLaneU | I8x16ReplaceLane | I32x4ExtractLane
        | I32x4ReplaceLane => {
            let lane = stream.read_byte()?;
            sink.put(lane as u64, 1);
        }
        _ => {}
    }
    Ok(())
}

/// Reads past one whole instruction (opcode plus immediates) without
/// touching any register window.
pub fn skip_instruction(stream: &mut InstructionStream) -> Result<ExtOpcode, RuntimeError> {
    let ext = read_opcode(stream)?;
    read_immediates(ext, stream, None)?;
    Ok(ext)
}

/// Scans forward from `from_pc` (just past a block header) for the
/// matching `end`, tracking nesting. Returns the offset just past a
/// depth-zero `else` (if any) and the offset of the `end` opcode
/// itself. The stream PC is restored.
pub fn scan_block_bounds(
    stream: &mut InstructionStream,
    from_pc: usize,
) -> Result<(Option<usize>, usize), RuntimeError> {
    let saved_pc = stream.pc();
    stream.set_pc(from_pc)?;
    let mut depth = 0usize;
    let mut else_pc = None;
    let end_pc;
    loop {
        let op_pc = stream.pc();
        let ext = read_opcode(stream)?;
        if let ExtOpcode::Core(byte) = ext {
            match byte {
                0x02 | 0x03 | 0x04 => depth += 1,
                0x05 => {
                    if depth == 0 {
                        else_pc = Some(stream.pc());
                    }
                }
                0x0B => {
                    if depth == 0 {
                        end_pc = op_pc;
                        break;
                    }
                    depth -= 1;
                }
                _ => {}
            }
        }
        read_immediates(ext, stream, None)?;
    }
    stream.set_pc(saved_pc)?;
    Ok((else_pc, end_pc))
}

/// The (params, results) arity a block type declares.
pub fn block_type_arities(module: &Module, raw: i64) -> Result<(usize, usize), RuntimeError> {
    if raw == -0x40 {
        return Ok((0, 0));
    }
    if raw < 0 {
        let byte = (raw & 0x7F) as u8;
        ValType::from_byte(byte)
            .ok_or(RuntimeError::Trap(TrapCode::MalformedInstruction))?;
        return Ok((0, 1));
    }
    let func_type = module
        .types()
        .get(raw as usize)
        .ok_or(RuntimeError::Trap(TrapCode::MalformedInstruction))?;
    Ok((func_type.params.len(), func_type.results.len()))
}

/// Parses a body's locals declaration into (count, type) runs and
/// leaves the PC at the first instruction.
pub fn read_locals_decl(
    stream: &mut InstructionStream,
) -> Result<SmallVec<[(u32, ValType); 4]>, RuntimeError> {
    let group_count = stream.read_uleb32()?;
    let mut groups = SmallVec::new();
    for _ in 0..group_count {
        let count = stream.read_uleb32()?;
        let val_type = ValType::from_byte(stream.read_byte()?)
            .ok_or(RuntimeError::Trap(TrapCode::MalformedInstruction))?;
        groups.push((count, val_type));
    }
    Ok(groups)
}

/// Walks a whole body (locals declaration included) and returns the
/// byte offset of every opcode plus the concatenated opcode bytes,
/// the raw material of a prepared program.
pub fn scan_body_opcodes(
    stream: &mut InstructionStream,
) -> Result<(Vec<u32>, Vec<ExtOpcode>, Vec<u8>), RuntimeError> {
    let saved_pc = stream.pc();
    stream.set_pc(0)?;
    read_locals_decl(stream)?;
    let mut offsets = Vec::new();
    let mut opcodes = Vec::new();
    let mut blob = Vec::new();
    while !stream.at_end() {
        let op_pc = stream.pc();
        let ext = read_opcode(stream)?;
        let imm_start = stream.pc();
        offsets.push(op_pc as u32);
        opcodes.push(ext);
        // the opcode's encoded bytes, before any immediates
        for pos in op_pc..imm_start {
            blob.push(byte_at(stream, pos)?);
        }
        read_immediates(ext, stream, None)?;
    }
    stream.set_pc(saved_pc)?;
    Ok((offsets, opcodes, blob))
}

fn byte_at(stream: &mut InstructionStream, pos: usize) -> Result<u8, RuntimeError> {
    let saved = stream.pc();
    stream.set_pc(pos)?;
    let byte = stream.peek_byte()?;
    stream.set_pc(saved)?;
    Ok(byte)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::Module;
    use alloc::sync::Arc;

    fn stream_for(wat: &str) -> InstructionStream {
        let module = Module::from_bytes(wat::parse_str(wat).unwrap()).unwrap();
        let mut stream = InstructionStream::new(Arc::new(module));
        stream.load(0).unwrap();
        stream
    }

    #[test]
    fn const_immediate_lands_in_window() {
        let mut stream = stream_for(r#"(module (func (result i32) i32.const -7))"#);
        read_locals_decl(&mut stream).unwrap();
        let ext = read_opcode(&mut stream).unwrap();
        assert_eq!(ext, ExtOpcode::Core(0x41));
        let mut reg = RegisterWindow::new();
        read_immediates(ext, &mut stream, Some(&mut reg)).unwrap();
        assert_eq!(reg.pop().unwrap().bits as i64, -7);
    }

    #[test]
    fn scan_finds_block_end_and_else() {
        let mut stream = stream_for(
            r#"
(module (func (param i32) (result i32)
  local.get 0
  (if (result i32)
    (then i32.const 1)
    (else i32.const 2))
))"#,
        );
        read_locals_decl(&mut stream).unwrap();
        // local.get 0
        skip_instruction(&mut stream).unwrap();
        // the `if` opcode
        let ext = read_opcode(&mut stream).unwrap();
        assert_eq!(ext, ExtOpcode::Core(0x04));
        read_immediates(ext, &mut stream, None).unwrap();
        let (else_pc, end_pc) = scan_block_bounds(&mut stream, stream.pc()).unwrap();
        assert!(else_pc.is_some());
        assert!(end_pc > else_pc.unwrap());
    }

    #[test]
    fn body_scan_collects_opcode_bytes() {
        let mut stream = stream_for(r#"(module (func (result i32) i32.const 7 i32.const 5 i32.add))"#);
        let (offsets, opcodes, blob) = scan_body_opcodes(&mut stream).unwrap();
        assert_eq!(opcodes.len(), 4); // const, const, add, end
        assert_eq!(offsets.len(), 4);
        assert_eq!(blob, alloc::vec![0x41, 0x41, 0x6A, 0x0B]);
    }
}
