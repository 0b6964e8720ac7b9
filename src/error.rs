// src/error.rs

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NexusError {
    #[error("Invalid review quality: {0} (expected 0-3)")]
    InvalidQuality(i64),

    #[error("Clock regression: now ({now}) is earlier than last review ({last_review})")]
    ClockRegression {
        last_review: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    #[error("Next review for {now} plus {interval_days} day(s) is out of range")]
    InvalidTimestamp {
        now: DateTime<Utc>,
        interval_days: u32,
    },

    #[error("Manual progress rejected: entity has {children} child item(s)")]
    OverrideRejected { children: usize },

    #[error("Progress out of range: {0} (expected 0-100)")]
    ProgressOutOfRange(i64),

    #[error("Invalid milestone status: {0}")]
    InvalidStatus(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl NexusError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        NexusError::NotFound { entity, id }
    }

    /// True for errors caused by caller input rather than the store.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            NexusError::InvalidQuality(_)
                | NexusError::ClockRegression { .. }
                | NexusError::InvalidTimestamp { .. }
                | NexusError::OverrideRejected { .. }
                | NexusError::ProgressOutOfRange(_)
                | NexusError::InvalidStatus(_)
                | NexusError::NotFound { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, NexusError>;
