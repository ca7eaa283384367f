use crate::ops::{
    decode::scan_body_opcodes, descriptor_for, microcode_steps, OpDescriptor, OpHandler,
};
use crate::types::{RuntimeError, JIT_MAX_STEPS_PER_OP};
use crate::vm::InstructionStream;
use alloc::vec::Vec;
use smallvec::SmallVec;

/// One decomposed opcode: its descriptor and the step handlers that
/// execute it.
#[derive(Clone)]
pub struct PreparedOp {
    pub descriptor: &'static OpDescriptor,
    pub steps: SmallVec<[OpHandler; JIT_MAX_STEPS_PER_OP]>,
}

impl PreparedOp {
    /// Decomposes one opcode: the microcode steps when the table has
    /// them, otherwise the descriptor's primary handler as the single
    /// step.
    pub fn prepare(descriptor: &'static OpDescriptor, use_microcode: bool) -> Self {
        let mut steps: SmallVec<[OpHandler; JIT_MAX_STEPS_PER_OP]> = SmallVec::new();
        let microcode = if use_microcode {
            microcode_steps(descriptor.ext)
        } else {
            None
        };
        match microcode {
            Some(microcode) => {
                for step in microcode.iter().take(JIT_MAX_STEPS_PER_OP) {
                    steps.push(*step);
                }
            }
            None => steps.push(descriptor.handler),
        }
        Self { descriptor, steps }
    }
}

impl core::fmt::Debug for PreparedOp {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PreparedOp")
            .field("op", &self.descriptor.name)
            .field("steps", &self.steps.len())
            .finish()
    }
}

/// A whole function body decomposed into prepared ops, one per logical
/// opcode, addressable by the byte offset the opcode starts at.
pub struct PreparedProgram {
    ops: Vec<PreparedOp>,
    offsets: Vec<u32>,
    blob: Vec<u8>,
}

impl PreparedProgram {
    /// Prepares a function body (locals declaration included).
    ///
    /// Preparation is deterministic: the same body and tables always
    /// produce the same program.
    pub fn prepare(body: &[u8], use_microcode: bool) -> Result<Self, RuntimeError> {
        let mut stream = InstructionStream::from_body(body.to_vec());
        Self::prepare_from_stream(&mut stream, use_microcode)
    }

    /// Prepares from an already loaded stream without copying the
    /// body; the stream PC is preserved.
    pub fn prepare_from_stream(
        stream: &mut InstructionStream,
        use_microcode: bool,
    ) -> Result<Self, RuntimeError> {
        let (offsets, opcodes, blob) = scan_body_opcodes(stream)?;
        let mut ops = Vec::with_capacity(opcodes.len());
        for ext in &opcodes {
            let descriptor = descriptor_for(*ext)
                .ok_or(RuntimeError::UnimplementedOpcode(ext.lead_byte()))?;
            ops.push(PreparedOp::prepare(descriptor, use_microcode));
        }
        Ok(Self {
            ops,
            offsets,
            blob,
        })
    }

    /// Rebuilds a program from a spilled opcode blob.
    ///
    /// The blob carries only the opcode bytes; offsets are re-derived
    /// from the body. A disagreement between the two means the blob
    /// belongs to something else and the caller treats it as a cache
    /// miss.
    pub fn from_blob(
        blob: &[u8],
        stream: &mut InstructionStream,
        use_microcode: bool,
    ) -> Result<Self, RuntimeError> {
        let program = Self::prepare_from_stream(stream, use_microcode)?;
        if program.blob != blob {
            return Err(RuntimeError::Unsupported);
        }
        Ok(program)
    }

    /// The durable opcode blob: the original opcode bytes in body
    /// order.
    pub fn export_blob(&self) -> &[u8] {
        &self.blob
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Resident cost estimate used against the cache budget.
    pub fn byte_cost(&self) -> usize {
        self.ops.len() * core::mem::size_of::<PreparedOp>()
            + self.offsets.len() * core::mem::size_of::<u32>()
            + self.blob.len()
    }

    /// The prepared op whose opcode starts at byte offset `pc`.
    pub fn op_at(&self, pc: usize) -> Option<&PreparedOp> {
        let index = self.offsets.binary_search(&(pc as u32)).ok()?;
        self.ops.get(index)
    }

    pub fn ops(&self) -> &[PreparedOp] {
        &self.ops
    }

    pub fn offsets(&self) -> &[u32] {
        &self.offsets
    }
}

impl core::fmt::Debug for PreparedProgram {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PreparedProgram")
            .field("ops", &self.ops.len())
            .field("bytes", &self.byte_cost())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_of(wat: &str, func: u32) -> Vec<u8> {
        let module = crate::loader::Module::from_bytes(wat::parse_str(wat).unwrap()).unwrap();
        module.load_function_body(func).unwrap()
    }

    #[test]
    fn prepares_one_op_per_opcode() {
        let body = body_of(r#"(module (func (result i32) i32.const 7 i32.const 5 i32.add))"#, 0);
        let program = PreparedProgram::prepare(&body, true).unwrap();
        assert_eq!(program.len(), 4);
        assert!(program.ops().iter().all(|op| !op.steps.is_empty()));
        assert!(program.ops().iter().all(|op| op.steps.len() <= JIT_MAX_STEPS_PER_OP));
    }

    #[test]
    fn blob_round_trip_is_identity() {
        let body = body_of(
            r#"(module (memory 1) (func (param i32) (result i32)
                 local.get 0
                 i32.load offset=4
                 i32.const 1
                 i32.add))"#,
            0,
        );
        let program = PreparedProgram::prepare(&body, true).unwrap();
        let blob = program.export_blob().to_vec();
        let mut stream = InstructionStream::from_body(body.clone());
        let restored = PreparedProgram::from_blob(&blob, &mut stream, true).unwrap();
        assert_eq!(restored.export_blob(), &blob[..]);
        assert_eq!(restored.len(), program.len());
        for (a, b) in restored.ops().iter().zip(program.ops()) {
            assert!(core::ptr::eq(a.descriptor, b.descriptor));
            assert_eq!(a.steps.len(), b.steps.len());
        }
    }

    #[test]
    fn foreign_blob_is_rejected() {
        let body = body_of(r#"(module (func (result i32) i32.const 1))"#, 0);
        let mut stream = InstructionStream::from_body(body);
        assert!(matches!(
            PreparedProgram::from_blob(&[0x41, 0x6A, 0x0B], &mut stream, true),
            Err(RuntimeError::Unsupported)
        ));
    }

    #[test]
    fn prefixed_opcodes_count_once() {
        let body = body_of(
            r#"(module (memory 1) (func (param i32 i32 i32)
                 local.get 0
                 local.get 1
                 local.get 2
                 memory.copy))"#,
            0,
        );
        let program = PreparedProgram::prepare(&body, true).unwrap();
        // three local.gets, memory.copy, end
        assert_eq!(program.len(), 5);
        assert_eq!(program.op_at(program.offsets()[3] as usize).unwrap().descriptor.name, "memory.copy");
    }
}
