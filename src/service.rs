// src/service.rs

//! Request-level operations: load, compute, persist, notify.
//!
//! Each function takes a single `now` for the whole logical request.
//! Progress recomputation after a child mutation is a best-effort secondary
//! effect; it never fails the child mutation itself.

use crate::achievements::{self, UnlockedAchievement};
use crate::error::{NexusError, Result};
use crate::events::{EventSink, NexusEvent};
use crate::models::{
    CurriculumModule, DeckStats, FlashcardView, Milestone, MilestoneStatus, Project, Quality, Topic,
};
use crate::progress::{self, Completable};
use crate::repository;
use crate::scheduler::{self, ReviewScheduler};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rusqlite::Connection;
use std::str::FromStr;

// --- Flashcard Review ---

/// Rates a flashcard and persists its next scheduling state.
pub fn review_flashcard(
    conn: &Connection,
    scheduler: &ReviewScheduler,
    card_id: i64,
    quality: i64,
    now: DateTime<Utc>,
    sink: &dyn EventSink,
) -> Result<FlashcardView> {
    // Reject bad ratings before touching the store.
    let quality = Quality::try_from(quality)?;
    info!("Processing review for Flashcard ID: {} ({})", card_id, quality);

    let tx = conn.unchecked_transaction()?;
    let record = repository::get_review_record(&tx, card_id)?
        .ok_or_else(|| NexusError::not_found("Flashcard", card_id))?;
    let next = scheduler.apply(&record, quality, now)?;
    repository::save_review_record(&tx, &next)?;
    repository::log_review(&tx, card_id, quality, &next, now)?;
    tx.commit()?;

    if let Some(next_review) = next.next_review {
        sink.emit(NexusEvent::CardReviewed {
            flashcard_id: card_id,
            quality,
            next_review,
        });
    }
    award_achievements(conn, now, sink);

    repository::get_flashcard(conn, card_id)?.ok_or_else(|| NexusError::not_found("Flashcard", card_id))
}

/// Creates a card whose review record starts at the configured ease.
pub fn create_flashcard(
    conn: &Connection,
    scheduler: &ReviewScheduler,
    deck_id: i64,
    front: &str,
    back: &str,
    now: DateTime<Utc>,
) -> Result<FlashcardView> {
    ensure_deck(conn, deck_id)?;
    let ease = scheduler.config().ease_default;
    Ok(repository::create_flashcard(conn, deck_id, front, back, ease, now)?)
}

/// Due cards, optionally restricted to one deck, in presentation order.
pub fn due_cards(conn: &Connection, deck_id: Option<i64>, now: DateTime<Utc>) -> Result<Vec<FlashcardView>> {
    if let Some(id) = deck_id {
        ensure_deck(conn, id)?;
    }
    let cards = repository::list_flashcards(conn, deck_id)?;
    let due: Vec<FlashcardView> = scheduler::select_due(&cards, now).into_iter().cloned().collect();
    debug!("[Due] {} of {} card(s) due", due.len(), cards.len());
    Ok(due)
}

pub fn deck_stats(conn: &Connection, deck_id: i64, now: DateTime<Utc>) -> Result<DeckStats> {
    ensure_deck(conn, deck_id)?;
    let cards = repository::list_flashcards(conn, Some(deck_id))?;

    let mut stats = DeckStats::default();
    for c in &cards {
        stats.total += 1;
        if scheduler::is_due(&c.review, now) {
            stats.due += 1;
        }
        if c.review.is_new() {
            stats.new += 1;
        }
    }
    Ok(stats)
}

fn ensure_deck(conn: &Connection, deck_id: i64) -> Result<()> {
    repository::get_deck(conn, deck_id)?
        .map(|_| ())
        .ok_or_else(|| NexusError::not_found("Deck", deck_id))
}

// --- Progress Recompute ---

/// An aggregation parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parent {
    Module(i64),
    Project(i64),
}

impl Parent {
    fn label(&self) -> &'static str {
        match self {
            Parent::Module(_) => "Module",
            Parent::Project(_) => "Project",
        }
    }

    fn id(&self) -> i64 {
        match self {
            Parent::Module(id) | Parent::Project(id) => *id,
        }
    }

    /// Stored progress plus the completion flags of every child.
    fn load(&self, conn: &Connection) -> rusqlite::Result<Option<(u8, Vec<bool>)>> {
        match *self {
            Parent::Module(id) => {
                let Some(module) = repository::get_module(conn, id)? else {
                    return Ok(None);
                };
                let flags = repository::list_topics(conn, id)?
                    .iter()
                    .map(Completable::is_completed)
                    .collect();
                Ok(Some((module.progress, flags)))
            }
            Parent::Project(id) => {
                let Some(project) = repository::get_project(conn, id)? else {
                    return Ok(None);
                };
                let flags = repository::list_milestones(conn, id)?
                    .iter()
                    .map(Completable::is_completed)
                    .collect();
                Ok(Some((project.progress, flags)))
            }
        }
    }

    fn store(&self, conn: &Connection, progress: u8) -> rusqlite::Result<bool> {
        match *self {
            Parent::Module(id) => repository::update_module_progress(conn, id, progress),
            Parent::Project(id) => repository::update_project_progress(conn, id, progress),
        }
    }

    fn completed_event(&self) -> NexusEvent {
        match *self {
            Parent::Module(module_id) => NexusEvent::ModuleCompleted { module_id },
            Parent::Project(project_id) => NexusEvent::ProjectCompleted { project_id },
        }
    }
}

/// Recomputes and stores a parent's progress from its children.
///
/// Returns the stored progress, or `None` when the parent is gone or the
/// store failed; both cases are logged and otherwise ignored.
pub fn recompute_progress(
    conn: &Connection,
    parent: Parent,
    now: DateTime<Utc>,
    sink: &dyn EventSink,
) -> Option<u8> {
    let (stored, flags) = match parent.load(conn) {
        Ok(Some(state)) => state,
        Ok(None) => {
            warn!(
                "[Progress] {} {} no longer exists, skipping recompute",
                parent.label(),
                parent.id()
            );
            return None;
        }
        Err(e) => {
            warn!(
                "[Progress] Failed to load {} {}: {}",
                parent.label(),
                parent.id(),
                e
            );
            return None;
        }
    };

    let updated = progress::recompute(stored, &flags);
    if updated != stored {
        match parent.store(conn, updated) {
            Ok(true) => {}
            Ok(false) => {
                warn!(
                    "[Progress] {} {} vanished before update, skipping",
                    parent.label(),
                    parent.id()
                );
                return None;
            }
            Err(e) => {
                warn!(
                    "[Progress] Failed to store progress for {} {}: {}",
                    parent.label(),
                    parent.id(),
                    e
                );
                return None;
            }
        }
    }

    info!(
        "[Progress Result] {} {}: {}% -> {}% ({} child item(s))",
        parent.label(),
        parent.id(),
        stored,
        updated,
        flags.len()
    );
    after_progress_change(conn, parent, stored, updated, now, sink);
    Some(updated)
}

fn after_progress_change(
    conn: &Connection,
    parent: Parent,
    before: u8,
    after: u8,
    now: DateTime<Utc>,
    sink: &dyn EventSink,
) {
    if after == 100 && before < 100 {
        sink.emit(parent.completed_event());
        award_achievements(conn, now, sink);
    }
}

fn set_manual_progress(
    conn: &Connection,
    parent: Parent,
    value: i64,
    now: DateTime<Utc>,
    sink: &dyn EventSink,
) -> Result<u8> {
    let (stored, flags) = parent
        .load(conn)?
        .ok_or_else(|| NexusError::not_found(parent.label(), parent.id()))?;
    let updated = progress::apply_manual_override(&flags, stored, value)?;
    parent.store(conn, updated)?;
    after_progress_change(conn, parent, stored, updated, now, sink);
    Ok(updated)
}

// --- Curriculum ---

/// Manual progress for a module without topics.
pub fn set_module_progress(
    conn: &Connection,
    module_id: i64,
    value: i64,
    now: DateTime<Utc>,
    sink: &dyn EventSink,
) -> Result<CurriculumModule> {
    set_manual_progress(conn, Parent::Module(module_id), value, now, sink)?;
    load_module(conn, module_id)
}

pub fn create_topic(
    conn: &Connection,
    module_id: i64,
    title: &str,
    completed: bool,
    now: DateTime<Utc>,
    sink: &dyn EventSink,
) -> Result<Topic> {
    load_module(conn, module_id)?;
    let topic = repository::create_topic(conn, module_id, title, completed)?;
    recompute_progress(conn, Parent::Module(module_id), now, sink);
    Ok(topic)
}

pub fn set_topic_completed(
    conn: &Connection,
    topic_id: i64,
    completed: bool,
    now: DateTime<Utc>,
    sink: &dyn EventSink,
) -> Result<Topic> {
    let mut topic = load_topic(conn, topic_id)?;
    if topic.completed != completed {
        repository::set_topic_completed(conn, topic_id, completed)?;
        topic.completed = completed;
        recompute_progress(conn, Parent::Module(topic.module_id), now, sink);
    }
    Ok(topic)
}

pub fn delete_topic(conn: &Connection, topic_id: i64, now: DateTime<Utc>, sink: &dyn EventSink) -> Result<()> {
    let topic = load_topic(conn, topic_id)?;
    repository::delete_topic(conn, topic_id)?;
    recompute_progress(conn, Parent::Module(topic.module_id), now, sink);
    Ok(())
}

fn load_module(conn: &Connection, module_id: i64) -> Result<CurriculumModule> {
    repository::get_module(conn, module_id)?.ok_or_else(|| NexusError::not_found("Module", module_id))
}

fn load_topic(conn: &Connection, topic_id: i64) -> Result<Topic> {
    repository::get_topic(conn, topic_id)?.ok_or_else(|| NexusError::not_found("Topic", topic_id))
}

// --- Projects ---

/// Manual progress for a project without milestones.
pub fn set_project_progress(
    conn: &Connection,
    project_id: i64,
    value: i64,
    now: DateTime<Utc>,
    sink: &dyn EventSink,
) -> Result<Project> {
    set_manual_progress(conn, Parent::Project(project_id), value, now, sink)?;
    load_project(conn, project_id)
}

pub fn create_milestone(
    conn: &Connection,
    project_id: i64,
    title: &str,
    due_date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    sink: &dyn EventSink,
) -> Result<Milestone> {
    load_project(conn, project_id)?;
    let milestone = repository::create_milestone(conn, project_id, title, due_date)?;
    recompute_progress(conn, Parent::Project(project_id), now, sink);
    Ok(milestone)
}

/// Updates a milestone's status. `status` arrives as its wire string.
pub fn set_milestone_status(
    conn: &Connection,
    milestone_id: i64,
    status: &str,
    now: DateTime<Utc>,
    sink: &dyn EventSink,
) -> Result<Milestone> {
    let status = MilestoneStatus::from_str(status)?;
    let mut milestone = load_milestone(conn, milestone_id)?;
    if milestone.status != status {
        repository::set_milestone_status(conn, milestone_id, status)?;
        let was_completed = milestone.status.is_completed();
        milestone.status = status;
        if was_completed != status.is_completed() {
            recompute_progress(conn, Parent::Project(milestone.project_id), now, sink);
        }
    }
    Ok(milestone)
}

pub fn delete_milestone(
    conn: &Connection,
    milestone_id: i64,
    now: DateTime<Utc>,
    sink: &dyn EventSink,
) -> Result<()> {
    let milestone = load_milestone(conn, milestone_id)?;
    repository::delete_milestone(conn, milestone_id)?;
    recompute_progress(conn, Parent::Project(milestone.project_id), now, sink);
    Ok(())
}

fn load_project(conn: &Connection, project_id: i64) -> Result<Project> {
    repository::get_project(conn, project_id)?.ok_or_else(|| NexusError::not_found("Project", project_id))
}

fn load_milestone(conn: &Connection, milestone_id: i64) -> Result<Milestone> {
    repository::get_milestone(conn, milestone_id)?
        .ok_or_else(|| NexusError::not_found("Milestone", milestone_id))
}

// --- Achievements ---

/// Unlocks every achievement the current stats now satisfy.
pub fn unlock_new_achievements(
    conn: &Connection,
    now: DateTime<Utc>,
    sink: &dyn EventSink,
) -> Result<Vec<UnlockedAchievement>> {
    let stats = repository::get_learning_stats(conn)?;
    let already: Vec<_> = repository::list_unlocked_achievements(conn)?
        .into_iter()
        .map(|u| u.achievement)
        .collect();

    let mut unlocked = Vec::new();
    for achievement in achievements::evaluate(&stats, &already) {
        if repository::unlock_achievement(conn, achievement, now)? {
            info!("[Achievement] Unlocked: {}", achievement);
            sink.emit(NexusEvent::AchievementUnlocked {
                achievement,
                unlocked_at: now,
            });
            unlocked.push(UnlockedAchievement {
                achievement,
                unlocked_at: now,
            });
        }
    }
    Ok(unlocked)
}

fn award_achievements(conn: &Connection, now: DateTime<Utc>, sink: &dyn EventSink) {
    if let Err(e) = unlock_new_achievements(conn, now, sink) {
        warn!("[Achievement] Evaluation skipped: {}", e);
    }
}
