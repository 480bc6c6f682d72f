//! Self-play configuration
//!
//! Consumed once when workers are built; nothing here is reloaded mid-run.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::{Result, SelfPlayError};

/// Upper bound on worker threads
pub const MAX_THREADS: usize = 64;

/// Self-play hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelfPlayConfig {
    // ========== Workers ==========
    /// Episodes played in lock-step by each worker
    /// Default: 256
    pub batch_size: usize,

    /// Worker threads
    /// Default: 4
    pub num_threads: usize,

    // ========== Search ==========
    /// PUCT exploration constant
    /// Default: 4.0
    pub cpuct: f32,

    /// Simulations per move
    /// Default: 800
    pub num_simulations: usize,

    // ========== Exploration ==========
    /// Dirichlet concentration
    /// Default: 0.8
    pub dirichlet_alpha: f32,

    /// Weight kept by the visit distribution when mixing in noise
    /// Default: 0.5
    pub dirichlet_weight: f32,

    /// Moves played with sampling before switching to argmax
    /// Default: 16
    pub temperature_threshold: usize,

    // ========== Training history ==========
    /// Iterations kept in the history
    /// Default: 4
    pub history_window: usize,

    /// Most recent iterations merged into each exported training set
    /// Default: 2
    pub export_window: usize,

    /// Share of `q` in the exported value target
    /// Default: 0.0
    pub percent_q: f32,

    // ========== Liveness ==========
    /// How long a worker waits for its evaluation before giving up
    /// Default: 30000
    pub evaluation_timeout_ms: u64,

    /// Base seed for the worker RNGs; random when absent
    pub seed: Option<u64>,
}

impl Default for SelfPlayConfig {
    fn default() -> Self {
        Self {
            batch_size: 256,
            num_threads: 4,
            cpuct: 4.0,
            num_simulations: 800,
            dirichlet_alpha: 0.8,
            dirichlet_weight: 0.5,
            temperature_threshold: 16,
            history_window: 4,
            export_window: 2,
            percent_q: 0.0,
            evaluation_timeout_ms: 30_000,
            seed: None,
        }
    }
}

impl SelfPlayConfig {
    /// Loads a JSON config; missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: SelfPlayConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(SelfPlayError::InvalidConfig(msg));

        if self.batch_size == 0 {
            return invalid("batch_size must be at least 1".into());
        }
        if self.num_threads == 0 || self.num_threads > MAX_THREADS {
            return invalid(format!(
                "num_threads must be in 1..={}, got {}",
                MAX_THREADS, self.num_threads
            ));
        }
        if self.cpuct.is_nan() || self.cpuct <= 0.0 {
            return invalid(format!("cpuct must be positive, got {}", self.cpuct));
        }
        if self.num_simulations == 0 {
            return invalid("num_simulations must be at least 1".into());
        }
        if self.dirichlet_alpha.is_nan() || self.dirichlet_alpha <= 0.0 {
            return invalid(format!(
                "dirichlet_alpha must be positive, got {}",
                self.dirichlet_alpha
            ));
        }
        if !(0.0..=1.0).contains(&self.dirichlet_weight) {
            return invalid(format!(
                "dirichlet_weight must be in [0, 1], got {}",
                self.dirichlet_weight
            ));
        }
        if !(0.0..=1.0).contains(&self.percent_q) {
            return invalid(format!("percent_q must be in [0, 1], got {}", self.percent_q));
        }
        if self.history_window == 0 || self.export_window == 0 {
            return invalid("history_window and export_window must be at least 1".into());
        }
        if self.evaluation_timeout_ms == 0 {
            return invalid("evaluation_timeout_ms must be at least 1".into());
        }
        Ok(())
    }

    pub fn evaluation_timeout(&self) -> Duration {
        Duration::from_millis(self.evaluation_timeout_ms)
    }

    /// Seed for worker `worker_id`: derived from `seed` when set so runs
    /// are reproducible, otherwise fresh entropy.
    pub fn worker_seed(&self, worker_id: usize) -> u64 {
        match self.seed {
            Some(seed) => seed.wrapping_add(worker_id as u64),
            None => rand::random::<u64>(),
        }
    }

    /// Compact configuration string for logging
    pub fn to_config_string(&self) -> String {
        format!(
            "workers[{}x{}]_sims[{}]_cpuct[{:.2}]_dir[{:.2},{:.2}]_temp[{}]_hist[{},{}]",
            self.num_threads,
            self.batch_size,
            self.num_simulations,
            self.cpuct,
            self.dirichlet_alpha,
            self.dirichlet_weight,
            self.temperature_threshold,
            self.history_window,
            self.export_window
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = SelfPlayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.batch_size, 256);
        assert_eq!(config.num_simulations, 800);
        assert_eq!(config.evaluation_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_thread_cap() {
        let mut config = SelfPlayConfig::default();
        config.num_threads = MAX_THREADS + 1;
        assert_matches!(config.validate(), Err(SelfPlayError::InvalidConfig(_)));
        config.num_threads = MAX_THREADS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_values() {
        let mut config = SelfPlayConfig::default();
        config.dirichlet_weight = 1.5;
        assert!(config.validate().is_err());

        let mut config = SelfPlayConfig::default();
        config.cpuct = 0.0;
        assert!(config.validate().is_err());

        let mut config = SelfPlayConfig::default();
        config.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"batch_size": 8, "num_simulations": 25, "seed": 42}}"#).unwrap();

        let config = SelfPlayConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.batch_size, 8);
        assert_eq!(config.num_simulations, 25);
        assert_eq!(config.cpuct, 4.0);
        assert_eq!(config.worker_seed(3), 45);
    }

    #[test]
    fn test_config_string() {
        let config = SelfPlayConfig::default();
        let s = config.to_config_string();
        assert!(s.contains("workers[4x256]"));
        assert!(s.contains("cpuct[4.00]"));
    }
}
