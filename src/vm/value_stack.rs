use crate::types::{TrapCode, ValType, Value, N_MIN_STACK_HEIGHT};
use alloc::vec::Vec;

/// The typed value stack used to execute Wasm bytecode.
///
/// Unlike engines that validate ahead of time, this interpreter runs
/// raw bodies, so the stack re-checks every pop: popping from an empty
/// stack or popping an unexpected kind traps instead of corrupting
/// state.
#[derive(Debug, Clone)]
pub struct ValueStack {
    entries: Vec<Value>,
    maximum_len: usize,
}

impl Default for ValueStack {
    fn default() -> Self {
        Self::new(crate::types::N_DEFAULT_MAX_STACK_HEIGHT)
    }
}

impl ValueStack {
    /// Creates a stack bounded at `maximum_len` entries; the bound is
    /// clamped up to the minimum the interpreter contract guarantees.
    pub fn new(maximum_len: usize) -> Self {
        Self {
            entries: Vec::new(),
            maximum_len: maximum_len.max(N_MIN_STACK_HEIGHT),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pushes a value, trapping once the configured bound is hit.
    pub fn push(&mut self, value: Value) -> Result<(), TrapCode> {
        if self.entries.len() >= self.maximum_len {
            return Err(TrapCode::StackOverflow);
        }
        self.entries.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<Value, TrapCode> {
        self.entries.pop().ok_or(TrapCode::StackUnderflow)
    }

    /// Pops a value and checks it against the expected kind; the two
    /// reference kinds are interchangeable here.
    pub fn pop_typed(&mut self, expected: ValType) -> Result<Value, TrapCode> {
        let value = self.pop()?;
        if !value.matches_valtype(expected) {
            return Err(TrapCode::TypeMismatch);
        }
        Ok(value)
    }

    pub fn pop_i32(&mut self) -> Result<i32, TrapCode> {
        self.pop()?.as_i32()
    }

    pub fn pop_i64(&mut self) -> Result<i64, TrapCode> {
        self.pop()?.as_i64()
    }

    /// Pops the two operands of a binary operator, left-hand side
    /// first in the result.
    pub fn pop2(&mut self) -> Result<(Value, Value), TrapCode> {
        let rhs = self.pop()?;
        let lhs = self.pop()?;
        Ok((lhs, rhs))
    }

    pub fn pop3(&mut self) -> Result<(Value, Value, Value), TrapCode> {
        let trd = self.pop()?;
        let (fst, snd) = self.pop2()?;
        Ok((fst, snd, trd))
    }

    /// The value `depth` entries below the top; `0` is the top itself.
    pub fn peek(&self, depth: usize) -> Option<&Value> {
        let len = self.entries.len();
        self.entries.get(len.checked_sub(depth + 1)?)
    }

    /// Shrinks the stack back to `height`, discarding anything above.
    pub fn truncate(&mut self, height: usize) {
        self.entries.truncate(height);
    }

    /// Pops the top `count` values preserving stack order (the first
    /// element of the result was pushed first).
    pub fn pop_many(&mut self, count: usize) -> Result<Vec<Value>, TrapCode> {
        if self.entries.len() < count {
            return Err(TrapCode::StackUnderflow);
        }
        Ok(self.entries.split_off(self.entries.len() - count))
    }

    /// Pushes values back in order.
    pub fn push_many(&mut self, values: &[Value]) -> Result<(), TrapCode> {
        for value in values {
            self.push(*value)?;
        }
        Ok(())
    }

    /// Rewinds to `height` while keeping the top `carry` values, the
    /// branch-unwind primitive.
    pub fn rewind_keeping(&mut self, height: usize, carry: usize) -> Result<(), TrapCode> {
        let carried = self.pop_many(carry)?;
        if self.entries.len() < height {
            return Err(TrapCode::StackUnderflow);
        }
        self.entries.truncate(height);
        self.push_many(&carried)
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }

    /// The full contents, bottom first; test and diagnostics helper.
    pub fn as_slice(&self) -> &[Value] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop_on_empty_traps() {
        let mut stack = ValueStack::default();
        assert!(matches!(stack.pop(), Err(TrapCode::StackUnderflow)));
    }

    #[test]
    fn typed_pop_enforces_kinds() {
        let mut stack = ValueStack::default();
        stack.push(Value::I32(1)).unwrap();
        assert!(matches!(
            stack.pop_typed(ValType::I64),
            Err(TrapCode::TypeMismatch)
        ));
    }

    #[test]
    fn overflow_traps() {
        let mut stack = ValueStack::new(0);
        for _ in 0..N_MIN_STACK_HEIGHT {
            stack.push(Value::I32(0)).unwrap();
        }
        assert!(matches!(
            stack.push(Value::I32(0)),
            Err(TrapCode::StackOverflow)
        ));
    }

    #[test]
    fn rewind_keeps_branch_results() {
        let mut stack = ValueStack::default();
        for i in 0..5 {
            stack.push(Value::I32(i)).unwrap();
        }
        stack.rewind_keeping(1, 2).unwrap();
        assert_eq!(stack.as_slice(), &[Value::I32(0), Value::I32(3), Value::I32(4)]);
    }
}
