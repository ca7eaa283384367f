mod cache;
mod context;
mod program;

pub use cache::JitCache;
pub use context::{
    compute_budget, decide, score_advantage, JitBudget, JitConfig, JitContext, JitDecision,
    JitDecisionReason, JitProbe, JitStats, JitTier,
};
pub use program::{PreparedOp, PreparedProgram};
