/// The execution tier the runtime decided on.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum JitTier {
    Off,
    Microcode,
    /// Reserved for a native backend; never selected by this crate.
    NativeReserved,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum JitDecisionReason {
    Ok,
    LowResources,
    LowAdvantage,
}

/// What the host looks like, measured once per process.
#[derive(Debug, Default, Copy, Clone)]
pub struct JitProbe {
    pub ram_bytes: u64,
    pub cpu_count: u32,
    pub ok: bool,
}

static PROBE: spin::Once<JitProbe> = spin::Once::new();

impl JitProbe {
    /// The cached system probe; RAM and CPU count, zeroed when the
    /// host offers no way to ask.
    pub fn system() -> JitProbe {
        *PROBE.call_once(Self::measure)
    }

    #[cfg(feature = "std")]
    fn measure() -> JitProbe {
        let cpu_count = std::thread::available_parallelism()
            .map(|n| n.get() as u32)
            .unwrap_or(0);
        let ram_bytes = read_total_ram().unwrap_or(0);
        JitProbe {
            ram_bytes,
            cpu_count,
            ok: ram_bytes > 0 && cpu_count > 0,
        }
    }

    #[cfg(not(feature = "std"))]
    fn measure() -> JitProbe {
        JitProbe::default()
    }
}

#[cfg(all(feature = "std", target_os = "linux"))]
fn read_total_ram() -> Option<u64> {
    let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
    let line = meminfo.lines().find(|l| l.starts_with("MemTotal:"))?;
    let kib: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kib * 1024)
}

#[cfg(all(feature = "std", not(target_os = "linux")))]
fn read_total_ram() -> Option<u64> {
    None
}

/// Tier thresholds and cache sizing knobs.
#[derive(Debug, Clone)]
pub struct JitConfig {
    pub min_ram_bytes: u64,
    pub min_cpu_count: u32,
    /// Percent of probed RAM granted to the prepared-program cache.
    pub max_cache_percent: u32,
    pub max_ops_per_chunk: u32,
    pub max_chunks: u32,
    pub min_hot_loop_hits: u64,
    pub min_executed_ops: u64,
    pub min_advantage_score: f32,
    /// Prepare every defined function at module attach.
    pub prescan_functions: bool,
    /// Prescan even when the tier decision is off.
    pub prescan_force: bool,
    /// Spill each prescanned program right after preparing it.
    pub prescan_spill: bool,
}

impl Default for JitConfig {
    fn default() -> Self {
        Self {
            min_ram_bytes: 64 * 1024 * 1024,
            min_cpu_count: 2,
            max_cache_percent: 4,
            max_ops_per_chunk: 512,
            max_chunks: 64,
            min_hot_loop_hits: 16,
            min_executed_ops: 1024,
            min_advantage_score: 0.55,
            prescan_functions: false,
            prescan_force: false,
            prescan_spill: false,
        }
    }
}

/// The budget derived from the probe.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct JitBudget {
    pub cache_budget_bytes: u64,
    pub max_ops_per_chunk: u32,
    pub max_chunks: u32,
}

/// Monotonic execution counters feeding the advantage score.
#[derive(Debug, Default, Copy, Clone)]
pub struct JitStats {
    pub executed_ops: u64,
    pub decoded_ops: u64,
    pub hot_loop_hits: u64,
}

#[derive(Debug, Copy, Clone)]
pub struct JitDecision {
    pub tier: JitTier,
    pub reason: JitDecisionReason,
    pub advantage_score: f32,
    pub budget: JitBudget,
}

impl Default for JitDecision {
    fn default() -> Self {
        Self {
            tier: JitTier::Off,
            reason: JitDecisionReason::LowResources,
            advantage_score: 0.0,
            budget: JitBudget::default(),
        }
    }
}

fn clamp_u64(value: u64, min: u64, max: u64) -> u64 {
    value.max(min).min(max)
}

/// The cache budget granted by a probe: a RAM percentage clamped to
/// `[64 KiB, ram/2]`, zero when the probe failed.
pub fn compute_budget(probe: &JitProbe, config: &JitConfig) -> JitBudget {
    if !probe.ok {
        return JitBudget::default();
    }
    let base = probe.ram_bytes / 100;
    let cache = base * config.max_cache_percent as u64;
    JitBudget {
        cache_budget_bytes: clamp_u64(cache, 64 * 1024, probe.ram_bytes / 2),
        max_ops_per_chunk: config.max_ops_per_chunk,
        max_chunks: config.max_chunks,
    }
}

/// The advantage score gating the tier:
/// `0.6 * hot_score + 0.4 * decode_ratio`.
pub fn score_advantage(config: &JitConfig, stats: &JitStats) -> f32 {
    if stats.executed_ops < config.min_executed_ops {
        return 0.0;
    }
    let hot_score = if stats.hot_loop_hits >= config.min_hot_loop_hits {
        1.0
    } else if stats.hot_loop_hits > 0 {
        0.5
    } else {
        0.0
    };
    let mut decode_ratio = if stats.executed_ops > 0 {
        stats.decoded_ops as f32 / stats.executed_ops as f32
    } else {
        0.0
    };
    if decode_ratio > 1.0 {
        decode_ratio = 1.0;
    }
    hot_score * 0.6 + decode_ratio * 0.4
}

/// Applies resource thresholds and the advantage score to pick a tier.
pub fn decide(probe: &JitProbe, config: &JitConfig, stats: Option<&JitStats>) -> JitDecision {
    if !probe.ok
        || probe.ram_bytes < config.min_ram_bytes
        || probe.cpu_count < config.min_cpu_count
    {
        return JitDecision {
            tier: JitTier::Off,
            reason: JitDecisionReason::LowResources,
            advantage_score: 0.0,
            budget: JitBudget::default(),
        };
    }
    let budget = compute_budget(probe, config);
    let advantage_score = match stats {
        Some(stats) => score_advantage(config, stats),
        None => 0.0,
    };
    if advantage_score < config.min_advantage_score {
        return JitDecision {
            tier: JitTier::Off,
            reason: JitDecisionReason::LowAdvantage,
            advantage_score,
            budget,
        };
    }
    JitDecision {
        tier: JitTier::Microcode,
        reason: JitDecisionReason::Ok,
        advantage_score,
        budget,
    }
}

/// Immutable-after-init tier state: probe, configuration and the
/// current decision.
#[derive(Debug, Clone)]
pub struct JitContext {
    pub probe: JitProbe,
    pub config: JitConfig,
    pub decision: JitDecision,
}

impl JitContext {
    pub fn new(config: JitConfig) -> Self {
        let probe = JitProbe::system();
        let decision = decide(&probe, &config, None);
        Self {
            probe,
            config,
            decision,
        }
    }

    /// A context with a caller-supplied probe, for tests and embedders
    /// that know their hardware better than the probe does.
    pub fn with_probe(config: JitConfig, probe: JitProbe) -> Self {
        let decision = decide(&probe, &config, None);
        Self {
            probe,
            config,
            decision,
        }
    }

    /// Re-evaluates the decision against fresh execution stats.
    pub fn update(&mut self, stats: &JitStats) {
        self.decision = decide(&self.probe, &self.config, Some(stats));
    }

    pub fn tier(&self) -> JitTier {
        self.decision.tier
    }
}
