// src/progress.rs

//! Progress aggregation for parents that own completable children
//! (module -> topics, project -> milestones).
//!
//! A parent with children has a derived progress. A childless parent keeps
//! a manually set value. When the last child is removed the parent keeps
//! its last stored value (frozen) and becomes manually editable again.

use crate::constants::PROGRESS_MAX;
use crate::error::{NexusError, Result};
use crate::models::{Milestone, MilestoneStatus, Topic};
use log::debug;

/// Anything that exposes a completed / not completed state.
pub trait Completable {
    fn is_completed(&self) -> bool;
}

impl Completable for bool {
    fn is_completed(&self) -> bool {
        *self
    }
}

impl Completable for Topic {
    fn is_completed(&self) -> bool {
        self.completed
    }
}

impl Completable for MilestoneStatus {
    fn is_completed(&self) -> bool {
        *self == MilestoneStatus::Completed
    }
}

impl Completable for Milestone {
    fn is_completed(&self) -> bool {
        self.status.is_completed()
    }
}

impl<T: Completable + ?Sized> Completable for &T {
    fn is_completed(&self) -> bool {
        (**self).is_completed()
    }
}

/// Percentage of completed children, rounded half up.
///
/// Returns `None` for an empty list: there is nothing to derive from and
/// the caller should fall back to the stored manual value.
pub fn compute_from_children<C: Completable>(children: &[C]) -> Option<u8> {
    if children.is_empty() {
        return None;
    }

    let total = children.len() as u64;
    let completed = children.iter().filter(|c| c.is_completed()).count() as u64;
    // round(100 * completed / total), halves rounded up, in integer arithmetic
    let percent = (200 * completed + total) / (2 * total);
    Some(percent as u8)
}

/// Sets a manual progress value. Only legal while the parent has no children.
pub fn apply_manual_override<C: Completable>(
    children: &[C],
    current: u8,
    new_value: i64,
) -> Result<u8> {
    if !children.is_empty() {
        return Err(NexusError::OverrideRejected {
            children: children.len(),
        });
    }
    let value = validate_progress(new_value)?;
    debug!("[Progress] Manual override {} -> {}", current, value);
    Ok(value)
}

/// The value a parent should store given its current children.
pub fn recompute<C: Completable>(stored: u8, children: &[C]) -> u8 {
    compute_from_children(children).unwrap_or(stored)
}

pub fn validate_progress(value: i64) -> Result<u8> {
    if (0..=PROGRESS_MAX as i64).contains(&value) {
        Ok(value as u8)
    } else {
        Err(NexusError::ProgressOutOfRange(value))
    }
}
