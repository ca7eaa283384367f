use crate::jit::{JitConfig, JitContext};
use crate::types::{N_DEFAULT_MAX_CALL_DEPTH, N_DEFAULT_MAX_STACK_HEIGHT};

/// Where a configuration knob got its value from.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OverrideSource {
    Unset,
    Env,
    Probe,
}

/// Runtime construction knobs.
///
/// Folded together exactly once: the environment overrides (std only)
/// are read when the config is built and the result is immutable for
/// the runtime's lifetime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub max_call_depth: usize,
    pub max_stack_height: usize,
    /// Forced microcode state; `None` defers to the host probe.
    pub microcode: Option<bool>,
    pub microcode_source: OverrideSource,
    pub jit: JitConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_call_depth: N_DEFAULT_MAX_CALL_DEPTH,
            max_stack_height: N_DEFAULT_MAX_STACK_HEIGHT,
            microcode: None,
            microcode_source: OverrideSource::Unset,
            jit: JitConfig::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// The default configuration with process environment overrides
    /// applied: `PICOWASM_MICROCODE`, `PICOWASM_JIT_PRESCAN` and
    /// `PICOWASM_JIT_PRESCAN_FORCE`.
    #[cfg(feature = "std")]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(enabled) = env_flag("PICOWASM_MICROCODE") {
            config.microcode = Some(enabled);
            config.microcode_source = OverrideSource::Env;
        }
        if let Some(enabled) = env_flag("PICOWASM_JIT_PRESCAN") {
            config.jit.prescan_functions = enabled;
        }
        if let Some(enabled) = env_flag("PICOWASM_JIT_PRESCAN_FORCE") {
            config.jit.prescan_force = enabled;
        }
        config
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn with_max_stack_height(mut self, height: usize) -> Self {
        self.max_stack_height = height;
        self
    }

    /// Forces microcode dispatch on or off regardless of the probe.
    pub fn with_microcode(mut self, enabled: bool) -> Self {
        self.microcode = Some(enabled);
        self.microcode_source = OverrideSource::Env;
        self
    }

    pub fn with_jit(mut self, jit: JitConfig) -> Self {
        self.jit = jit;
        self
    }

    /// Resolves the effective microcode flag: an explicit override
    /// wins, otherwise the probe thresholds decide.
    pub(crate) fn microcode_enabled(&self, context: &JitContext) -> bool {
        match self.microcode {
            Some(enabled) => enabled,
            None => {
                let probe = &context.probe;
                probe.ok
                    && probe.ram_bytes >= context.config.min_ram_bytes
                    && probe.cpu_count >= context.config.min_cpu_count
            }
        }
    }
}

#[cfg(feature = "std")]
fn env_flag(name: &str) -> Option<bool> {
    let value = std::env::var(name).ok()?;
    match value.as_str() {
        "1" | "true" | "on" => Some(true),
        "0" | "false" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jit::JitProbe;

    #[test]
    fn explicit_override_beats_the_probe() {
        let config = RuntimeConfig::new().with_microcode(true);
        let context = JitContext::with_probe(config.jit.clone(), JitProbe::default());
        assert!(config.microcode_enabled(&context));
        assert_eq!(config.microcode_source, OverrideSource::Env);

        let config = RuntimeConfig::new().with_microcode(false);
        let good = JitProbe {
            ram_bytes: 1 << 30,
            cpu_count: 8,
            ok: true,
        };
        let context = JitContext::with_probe(config.jit.clone(), good);
        assert!(!config.microcode_enabled(&context));
    }

    #[test]
    fn probe_decides_when_unset() {
        let config = RuntimeConfig::new();
        let weak = JitProbe {
            ram_bytes: 1 << 20,
            cpu_count: 1,
            ok: true,
        };
        let context = JitContext::with_probe(config.jit.clone(), weak);
        assert!(!config.microcode_enabled(&context));

        let good = JitProbe {
            ram_bytes: 1 << 30,
            cpu_count: 8,
            ok: true,
        };
        let context = JitContext::with_probe(config.jit.clone(), good);
        assert!(config.microcode_enabled(&context));
    }
}
