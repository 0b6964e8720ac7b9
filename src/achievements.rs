// src/achievements.rs

use crate::constants::*;
use crate::error::NexusError;
use crate::models::LearningStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Achievement {
    FirstReview,
    DedicatedLearner,
    PerfectRecall,
    FirstModuleCompleted,
    CurriculumMaster,
    FirstProjectShipped,
}

impl Achievement {
    pub const ALL: [Achievement; 6] = [
        Achievement::FirstReview,
        Achievement::DedicatedLearner,
        Achievement::PerfectRecall,
        Achievement::FirstModuleCompleted,
        Achievement::CurriculumMaster,
        Achievement::FirstProjectShipped,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Achievement::FirstReview => "first_review",
            Achievement::DedicatedLearner => "dedicated_learner",
            Achievement::PerfectRecall => "perfect_recall",
            Achievement::FirstModuleCompleted => "first_module_completed",
            Achievement::CurriculumMaster => "curriculum_master",
            Achievement::FirstProjectShipped => "first_project_shipped",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Achievement::FirstReview => "First Review",
            Achievement::DedicatedLearner => "Dedicated Learner",
            Achievement::PerfectRecall => "Perfect Recall",
            Achievement::FirstModuleCompleted => "Module Complete",
            Achievement::CurriculumMaster => "Curriculum Master",
            Achievement::FirstProjectShipped => "Shipped It",
        }
    }

    /// Whether the stats snapshot meets this achievement's threshold.
    pub fn is_met(&self, stats: &LearningStats) -> bool {
        match self {
            Achievement::FirstReview => stats.total_reviews >= 1,
            Achievement::DedicatedLearner => stats.total_reviews >= REVIEWS_DEDICATED_LEARNER,
            Achievement::PerfectRecall => stats.easy_reviews >= EASY_RATINGS_PERFECT_RECALL,
            Achievement::FirstModuleCompleted => stats.completed_modules >= 1,
            Achievement::CurriculumMaster => stats.completed_modules >= MODULES_CURRICULUM_MASTER,
            Achievement::FirstProjectShipped => stats.completed_projects >= 1,
        }
    }
}

impl FromStr for Achievement {
    type Err = NexusError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Achievement::ALL
            .into_iter()
            .find(|a| a.key() == s)
            .ok_or_else(|| NexusError::InvalidConfig(format!("unknown achievement: {}", s)))
    }
}

impl fmt::Display for Achievement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockedAchievement {
    pub achievement: Achievement,
    pub unlocked_at: DateTime<Utc>,
}

/// Achievements met by `stats` that are not in `already`.
pub fn evaluate(stats: &LearningStats, already: &[Achievement]) -> Vec<Achievement> {
    Achievement::ALL
        .into_iter()
        .filter(|a| !already.contains(a) && a.is_met(stats))
        .collect()
}
