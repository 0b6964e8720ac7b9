// src/config.rs

use crate::constants::*;
use crate::error::{NexusError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Tuning knobs for the review scheduler. Defaults come from `constants`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub ease_floor: f64,
    pub ease_ceiling: f64,
    pub ease_default: f64,
    pub fail_penalty: f64,
    pub hard_penalty: f64,
    pub easy_bonus: f64,
    pub seed_hard: u32,
    pub seed_good: u32,
    pub seed_easy: u32,
    pub hard_multiplier: f64,
    pub easy_multiplier: f64,
    pub reset_interval: u32,
    pub max_interval: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            ease_floor: EASE_FACTOR_MIN,
            ease_ceiling: EASE_FACTOR_MAX,
            ease_default: EASE_FACTOR_DEFAULT,
            fail_penalty: EASE_FACTOR_DECREMENT_FAIL,
            hard_penalty: EASE_FACTOR_DECREMENT_HARD,
            easy_bonus: EASE_FACTOR_INCREMENT_EASY,
            seed_hard: INTERVAL_SEED_HARD,
            seed_good: INTERVAL_SEED_GOOD,
            seed_easy: INTERVAL_SEED_EASY,
            hard_multiplier: INTERVAL_MULTIPLIER_HARD,
            easy_multiplier: INTERVAL_MULTIPLIER_EASY,
            reset_interval: INTERVAL_RESET,
            max_interval: INTERVAL_MAX,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(NexusError::InvalidConfig(msg.to_string()));

        // Below 1.0 a Good review would shrink the interval.
        if !(self.ease_floor >= 1.0) {
            return fail("ease_floor must be at least 1.0");
        }
        if self.ease_ceiling < self.ease_floor {
            return fail("ease_ceiling must be >= ease_floor");
        }
        if self.ease_default < self.ease_floor || self.ease_default > self.ease_ceiling {
            return fail("ease_default must lie within [ease_floor, ease_ceiling]");
        }
        if self.fail_penalty < 0.0 || self.hard_penalty < 0.0 || self.easy_bonus < 0.0 {
            return fail("ease adjustments must be non-negative");
        }
        if self.seed_hard < INTERVAL_MIN || self.seed_good < INTERVAL_MIN || self.seed_easy < INTERVAL_MIN {
            return fail("interval seeds must be at least one day");
        }
        if !(self.seed_hard <= self.seed_good && self.seed_good <= self.seed_easy) {
            return fail("interval seeds must be ordered hard <= good <= easy");
        }
        if !(self.hard_multiplier > 0.0) || self.easy_multiplier < 1.0 {
            return fail("hard_multiplier must be positive and easy_multiplier >= 1");
        }
        if self.reset_interval < INTERVAL_MIN {
            return fail("reset_interval must be at least one day");
        }
        if self.max_interval < self.seed_easy.max(self.reset_interval) {
            return fail("max_interval must be >= every seed and the reset interval");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NexusConfig {
    pub database_path: PathBuf,
    pub log_level: String,
    pub scheduler: SchedulerConfig,
}

impl Default for NexusConfig {
    fn default() -> Self {
        NexusConfig {
            database_path: PathBuf::from(DEFAULT_DB_FILE),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl NexusConfig {
    /// Loads a TOML config file. A missing file yields the defaults.
    ///
    /// Runs before the logger exists, so the caller reports the outcome.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(NexusConfig::default());
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: NexusConfig = toml::from_str(content)?;
        config.scheduler.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        assert!(SchedulerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = NexusConfig::from_toml(
            r#"
            log_level = "debug"

            [scheduler]
            seed_easy = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.scheduler.seed_easy, 10);
        assert_eq!(config.scheduler.seed_good, INTERVAL_SEED_GOOD);
        assert_eq!(config.database_path, PathBuf::from(DEFAULT_DB_FILE));
    }

    #[test]
    fn test_invalid_scheduler_rejected() {
        let err = NexusConfig::from_toml("[scheduler]\nease_floor = 0.0\n").unwrap_err();
        assert!(matches!(err, NexusError::InvalidConfig(_)));

        let err = NexusConfig::from_toml("[scheduler]\nseed_hard = 9\n").unwrap_err();
        assert!(matches!(err, NexusError::InvalidConfig(_)));
    }

    #[test]
    fn test_ease_floor_below_one_rejected() {
        let err = NexusConfig::from_toml("[scheduler]\nease_floor = 0.5\nease_default = 0.5\n")
            .unwrap_err();
        assert!(matches!(err, NexusError::InvalidConfig(_)));

        let config = NexusConfig::from_toml("[scheduler]\nease_floor = 1.0\n").unwrap();
        assert_eq!(config.scheduler.ease_floor, 1.0);
    }

    #[test]
    fn test_floor_of_one_keeps_good_intervals_growing() {
        use crate::models::{Quality, ReviewRecord};
        use crate::scheduler::ReviewScheduler;
        use chrono::{TimeZone, Utc};

        let config = SchedulerConfig {
            ease_floor: 1.0,
            ease_default: 1.0,
            ..SchedulerConfig::default()
        };
        let scheduler = ReviewScheduler::new(config).unwrap();
        let mut record = ReviewRecord::with_ease(1, 1.0);
        let mut now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let mut intervals = Vec::new();
        for _ in 0..3 {
            record = scheduler.apply(&record, Quality::Good, now).unwrap();
            intervals.push(record.interval_days);
            now = record.next_review.unwrap();
        }
        assert!(intervals.windows(2).all(|w| w[0] <= w[1]), "{:?}", intervals);
    }

    #[test]
    fn test_malformed_toml() {
        let err = NexusConfig::from_toml("log_level = [").unwrap_err();
        assert!(matches!(err, NexusError::ConfigParse(_)));
    }

    #[test]
    fn test_load_missing_and_present_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert_eq!(NexusConfig::load(&missing).unwrap(), NexusConfig::default());

        let path = dir.path().join("nexus.toml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "database_path = \"/tmp/nexus-test.db\"").unwrap();
        let config = NexusConfig::load(&path).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/nexus-test.db"));
    }
}
