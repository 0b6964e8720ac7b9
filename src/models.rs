// src/models.rs

use crate::constants::EASE_FACTOR_DEFAULT;
use crate::error::NexusError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// --- Review Quality ---

/// The four review buttons (Errei / Difícil / Bom / Fácil).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Quality {
    Fail = 0,
    Hard = 1,
    Good = 2,
    Easy = 3,
}

impl Quality {
    pub const ALL: [Quality; 4] = [Quality::Fail, Quality::Hard, Quality::Good, Quality::Easy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Fail => "Fail",
            Quality::Hard => "Hard",
            Quality::Good => "Good",
            Quality::Easy => "Easy",
        }
    }
}

impl TryFrom<i64> for Quality {
    type Error = NexusError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Quality::Fail),
            1 => Ok(Quality::Hard),
            2 => Ok(Quality::Good),
            3 => Ok(Quality::Easy),
            other => Err(NexusError::InvalidQuality(other)),
        }
    }
}

impl From<Quality> for i64 {
    fn from(q: Quality) -> i64 {
        q as i64
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Review Record ---

/// Per-flashcard scheduling state. Owned by the flashcard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRecord {
    pub id: i64,
    pub last_review: Option<DateTime<Utc>>,
    pub next_review: Option<DateTime<Utc>>,
    pub interval_days: u32,
    pub ease_factor: f64,
    pub repetition_count: u32,
}

impl ReviewRecord {
    /// Defaulted record for a freshly created flashcard.
    pub fn new(id: i64) -> Self {
        Self::with_ease(id, EASE_FACTOR_DEFAULT)
    }

    /// Defaulted record starting from a configured ease factor.
    pub fn with_ease(id: i64, ease_factor: f64) -> Self {
        ReviewRecord {
            id,
            last_review: None,
            next_review: None,
            interval_days: 0,
            ease_factor,
            repetition_count: 0,
        }
    }

    pub fn is_new(&self) -> bool {
        self.last_review.is_none()
    }
}

// --- Flashcards ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deck {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flashcard {
    pub id: i64,
    pub deck_id: i64,
    pub front: String,
    pub back: String,
    pub created_at: DateTime<Utc>,
}

/// A flashcard together with its scheduling state, as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlashcardView {
    #[serde(flatten)]
    pub card: Flashcard,
    pub review: ReviewRecord,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewLogEntry {
    pub id: i64,
    pub flashcard_id: i64,
    pub quality: Quality,
    pub reviewed_at: DateTime<Utc>,
    pub interval_days: u32,
    pub ease_factor: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DeckStats {
    pub total: i64,
    pub due: i64,
    pub new: i64,
}

// --- Curriculum ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurriculumModule {
    pub id: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub progress: u8,
    pub position: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: i64,
    pub module_id: i64,
    pub title: String,
    pub completed: bool,
    pub position: i64,
}

// --- Projects ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl MilestoneStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MilestoneStatus::Pending => "pending",
            MilestoneStatus::InProgress => "in_progress",
            MilestoneStatus::Completed => "completed",
        }
    }
}

impl FromStr for MilestoneStatus {
    type Err = NexusError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MilestoneStatus::Pending),
            "in_progress" => Ok(MilestoneStatus::InProgress),
            "completed" => Ok(MilestoneStatus::Completed),
            other => Err(NexusError::InvalidStatus(other.to_string())),
        }
    }
}

impl fmt::Display for MilestoneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub progress: u8,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub id: i64,
    pub project_id: i64,
    pub title: String,
    pub status: MilestoneStatus,
    pub position: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
}

// --- Achievements ---

/// Counters the achievement rules are evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LearningStats {
    pub total_reviews: i64,
    pub easy_reviews: i64,
    pub completed_modules: i64,
    pub completed_projects: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_from_int() {
        assert_eq!(Quality::try_from(0i64).unwrap(), Quality::Fail);
        assert_eq!(Quality::try_from(3i64).unwrap(), Quality::Easy);
        assert!(matches!(
            Quality::try_from(4i64),
            Err(NexusError::InvalidQuality(4))
        ));
        assert!(matches!(
            Quality::try_from(-1i64),
            Err(NexusError::InvalidQuality(-1))
        ));
    }

    #[test]
    fn test_quality_serde_is_integer() {
        assert_eq!(serde_json::to_string(&Quality::Good).unwrap(), "2");
        let q: Quality = serde_json::from_str("1").unwrap();
        assert_eq!(q, Quality::Hard);
        assert!(serde_json::from_str::<Quality>("5").is_err());
    }

    #[test]
    fn test_milestone_status_roundtrip_strings() {
        for status in [
            MilestoneStatus::Pending,
            MilestoneStatus::InProgress,
            MilestoneStatus::Completed,
        ] {
            assert_eq!(status.as_str().parse::<MilestoneStatus>().unwrap(), status);
        }
        assert!("done".parse::<MilestoneStatus>().is_err());
    }

    #[test]
    fn test_new_record_defaults() {
        let r = ReviewRecord::new(9);
        assert!(r.is_new());
        assert_eq!(r.interval_days, 0);
        assert_eq!(r.repetition_count, 0);
        assert_eq!(r.ease_factor, EASE_FACTOR_DEFAULT);
    }
}
