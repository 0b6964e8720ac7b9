// src/constants.rs

// --- Time Constants ---
pub const DAY_SECONDS: i64 = 86400;

// --- Spaced Repetition (SM-2) Parameters ---
pub const INTERVAL_RESET: u32 = 1; // Days, after a failed review
pub const INTERVAL_MIN: u32 = 1; // Days
pub const INTERVAL_MAX: u32 = 180; // Days

pub const EASE_FACTOR_MIN: f64 = 1.3;
pub const EASE_FACTOR_MAX: f64 = 5.0;
pub const EASE_FACTOR_DEFAULT: f64 = 2.5;

// Adjustments
pub const EASE_FACTOR_DECREMENT_FAIL: f64 = 0.20;
pub const EASE_FACTOR_DECREMENT_HARD: f64 = 0.15;
pub const EASE_FACTOR_INCREMENT_EASY: f64 = 0.15;

// First-repetition seeds (match the UI sub-labels: 2d / 4d / 7d)
pub const INTERVAL_SEED_HARD: u32 = 2;
pub const INTERVAL_SEED_GOOD: u32 = 4;
pub const INTERVAL_SEED_EASY: u32 = 7;

// Interval Multipliers
pub const INTERVAL_MULTIPLIER_HARD: f64 = 0.7;
pub const INTERVAL_MULTIPLIER_EASY: f64 = 1.2;

// --- Progress ---
pub const PROGRESS_MAX: u8 = 100;

// --- Achievements ---
pub const REVIEWS_DEDICATED_LEARNER: i64 = 50;
pub const EASY_RATINGS_PERFECT_RECALL: i64 = 10;
pub const MODULES_CURRICULUM_MASTER: i64 = 5;

// --- Runtime ---
pub const DEFAULT_DB_FILE: &str = "uati_nexus.db";
pub const DEFAULT_LOG_LEVEL: &str = "info";
