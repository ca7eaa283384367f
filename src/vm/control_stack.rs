use crate::types::TrapCode;
use smallvec::SmallVec;

/// What structured instruction opened a control frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LabelKind {
    Block,
    Loop,
    If,
}

/// One active `block`/`loop`/`if`.
#[derive(Debug, Clone)]
pub struct ControlFrame {
    pub kind: LabelKind,
    /// How many values a branch to this label carries over the
    /// unwind: the result count for blocks and ifs, the parameter
    /// count for loops.
    pub branch_arity: usize,
    /// Value stack height when the frame was entered.
    pub stack_height: usize,
    /// Branch target: the offset just past the matching `end` for
    /// blocks and ifs, the body start for loops.
    pub target_pc: usize,
    /// Offset just past the matching `end`; equals `target_pc` except
    /// for loops.
    pub end_pc: usize,
    /// For `if` frames with an `else` arm: offset just past `else`.
    pub else_pc: Option<usize>,
}

/// The per-job label stack.
///
/// Most call frames nest only a handful of labels, so the storage is
/// inline up to a small depth.
#[derive(Debug, Default, Clone)]
pub struct ControlStack {
    frames: SmallVec<[ControlFrame; 16]>,
}

impl ControlStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn push(&mut self, frame: ControlFrame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Result<ControlFrame, TrapCode> {
        self.frames.pop().ok_or(TrapCode::StackUnderflow)
    }

    /// The frame addressed by branching to label `depth`; `0` is the
    /// innermost frame.
    pub fn label(&self, depth: u32) -> Result<&ControlFrame, TrapCode> {
        let len = self.frames.len();
        let index = len
            .checked_sub(depth as usize + 1)
            .ok_or(TrapCode::StackUnderflow)?;
        Ok(&self.frames[index])
    }

    /// Drops frames above `height`, used when a call frame unwinds or
    /// a branch discards the labels it jumped over.
    pub fn truncate(&mut self, height: usize) {
        self.frames.truncate(height);
    }

    pub fn reset(&mut self) {
        self.frames.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(kind: LabelKind, target_pc: usize) -> ControlFrame {
        ControlFrame {
            kind,
            branch_arity: 0,
            stack_height: 0,
            target_pc,
            end_pc: target_pc,
            else_pc: None,
        }
    }

    #[test]
    fn labels_count_from_innermost() {
        let mut stack = ControlStack::new();
        stack.push(frame(LabelKind::Block, 10));
        stack.push(frame(LabelKind::Loop, 20));
        assert_eq!(stack.label(0).unwrap().target_pc, 20);
        assert_eq!(stack.label(1).unwrap().target_pc, 10);
        assert!(stack.label(2).is_err());
    }

    #[test]
    fn truncate_discards_inner_frames() {
        let mut stack = ControlStack::new();
        stack.push(frame(LabelKind::Block, 10));
        stack.push(frame(LabelKind::Block, 20));
        stack.push(frame(LabelKind::Block, 30));
        stack.truncate(1);
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.label(0).unwrap().target_pc, 10);
    }
}
