use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Future scheduled occurrences kept per series, for every frequency.
pub const DEFAULT_TARGET_FUTURE_COUNT: usize = 4;
/// Hard cap on extension-loop iterations per maintenance pass.
pub const DEFAULT_MAX_EXTENSION_STEPS: usize = 24;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;

/// Top-level config (yardops.toml + YARDOPS_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct YardopsConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub recurrence: RecurrenceConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Tuning for the recurring job series maintainer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceConfig {
    /// How many strictly-future `Scheduled` occurrences each active series keeps.
    #[serde(default = "default_target_future_count")]
    pub target_future_count: usize,
    /// Iteration cap for one maintenance pass. Never below `target_future_count`.
    #[serde(default = "default_max_extension_steps")]
    pub max_extension_steps: usize,
}

impl Default for RecurrenceConfig {
    fn default() -> Self {
        Self {
            target_future_count: DEFAULT_TARGET_FUTURE_COUNT,
            max_extension_steps: DEFAULT_MAX_EXTENSION_STEPS,
        }
    }
}

impl RecurrenceConfig {
    /// Effective loop bound for a pass that aims at `target` future occurrences.
    pub fn step_budget(&self, target: usize) -> usize {
        self.max_extension_steps.max(target)
    }
}

/// Optional periodic maintenance sweep run by the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_sweep_interval")]
    pub interval_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

fn default_target_future_count() -> usize {
    DEFAULT_TARGET_FUTURE_COUNT
}
fn default_max_extension_steps() -> usize {
    DEFAULT_MAX_EXTENSION_STEPS
}
fn default_sweep_interval() -> u64 {
    DEFAULT_SWEEP_INTERVAL_SECS
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.yardops/yardops.db", home)
}

impl YardopsConfig {
    /// Load config from a TOML file with YARDOPS_* env var overrides.
    ///
    /// Nested keys use a double underscore, e.g.
    /// `YARDOPS_RECURRENCE__TARGET_FUTURE_COUNT=6`.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.yardops/yardops.toml
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: YardopsConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("YARDOPS_").split("__"))
            .extract()
            .map_err(|e| crate::error::YardopsError::Config(e.to_string()))?;

        if config.recurrence.target_future_count == 0 {
            return Err(crate::error::YardopsError::Config(
                "recurrence.target_future_count must be at least 1".to_string(),
            ));
        }

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.yardops/yardops.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_keep_four_future_occurrences() {
        let cfg = YardopsConfig::default();
        assert_eq!(cfg.recurrence.target_future_count, 4);
        assert_eq!(cfg.recurrence.max_extension_steps, 24);
        assert!(!cfg.sweep.enabled);
    }

    #[test]
    fn step_budget_never_below_target() {
        let cfg = RecurrenceConfig {
            target_future_count: 30,
            max_extension_steps: 24,
        };
        assert_eq!(cfg.step_budget(30), 30);
        assert_eq!(cfg.step_budget(4), 24);
    }

    #[test]
    fn load_reads_toml_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[database]\npath = \"/tmp/yard.db\"\n\n[recurrence]\ntarget_future_count = 6\n\n[sweep]\nenabled = true\ninterval_secs = 60"
        )
        .unwrap();

        let cfg = YardopsConfig::load(file.path().to_str()).unwrap();
        assert_eq!(cfg.database.path, "/tmp/yard.db");
        assert_eq!(cfg.recurrence.target_future_count, 6);
        assert_eq!(cfg.recurrence.max_extension_steps, 24);
        assert!(cfg.sweep.enabled);
        assert_eq!(cfg.sweep.interval_secs, 60);
    }

    #[test]
    fn load_rejects_zero_target() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[recurrence]\ntarget_future_count = 0").unwrap();

        let err = YardopsConfig::load(file.path().to_str()).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }
}
