// src/repository.rs

use crate::achievements::{Achievement, UnlockedAchievement};
use crate::models::{
    CurriculumModule, Deck, Flashcard, FlashcardView, LearningStats, Milestone, MilestoneStatus,
    Project, Quality, ReviewLogEntry, ReviewRecord, Topic,
};
use chrono::{DateTime, SubsecRound, Utc};
use log::{debug, warn};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use std::str::FromStr;

// --- Column helpers ---

pub fn to_ts(dt: DateTime<Utc>) -> i64 {
    dt.timestamp()
}

/// Drops sub-second precision, matching what the store keeps.
pub fn truncate_secs(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.trunc_subsecs(0)
}

fn ts_from(idx: usize, ts: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, "timestamp out of range".into())
    })
}

fn ts_col(row: &Row, idx: usize) -> Result<DateTime<Utc>> {
    ts_from(idx, row.get(idx)?)
}

fn opt_ts_col(row: &Row, idx: usize) -> Result<Option<DateTime<Utc>>> {
    row.get::<_, Option<i64>>(idx)?
        .map(|ts| ts_from(idx, ts))
        .transpose()
}

fn progress_col(row: &Row, idx: usize) -> Result<u8> {
    let raw: i64 = row.get(idx)?;
    u8::try_from(raw).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}

// --- Decks ---

pub fn create_deck(
    conn: &Connection,
    name: &str,
    description: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Deck> {
    conn.execute(
        "INSERT INTO decks (name, description, created_at) VALUES (?, ?, ?)",
        params![name, description, to_ts(now)],
    )?;
    Ok(Deck {
        id: conn.last_insert_rowid(),
        name: name.to_string(),
        description: description.map(str::to_string),
        created_at: truncate_secs(now),
    })
}

fn map_deck(row: &Row) -> Result<Deck> {
    Ok(Deck {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: ts_col(row, 3)?,
    })
}

pub fn get_deck(conn: &Connection, deck_id: i64) -> Result<Option<Deck>> {
    conn.query_row(
        "SELECT id, name, description, created_at FROM decks WHERE id = ?",
        [deck_id],
        map_deck,
    )
    .optional()
}

pub fn list_decks(conn: &Connection) -> Result<Vec<Deck>> {
    let mut stmt = conn.prepare("SELECT id, name, description, created_at FROM decks ORDER BY id")?;
    let decks = stmt.query_map([], map_deck)?.collect::<Result<Vec<_>>>()?;
    Ok(decks)
}

/// Deletes a deck together with its cards and their review state.
pub fn delete_deck(conn: &Connection, deck_id: i64) -> Result<bool> {
    Ok(conn.execute("DELETE FROM decks WHERE id = ?", [deck_id])? > 0)
}

// --- Flashcards ---

const FLASHCARD_VIEW_SQL: &str = "SELECT f.id, f.deck_id, f.front, f.back, f.created_at,
        rs.last_review_ts, rs.next_review_ts, rs.interval_days, rs.ease_factor, rs.repetition_count
     FROM flashcards f
     JOIN review_state rs ON rs.flashcard_id = f.id";

fn map_flashcard_view(row: &Row) -> Result<FlashcardView> {
    let id: i64 = row.get(0)?;
    Ok(FlashcardView {
        card: Flashcard {
            id,
            deck_id: row.get(1)?,
            front: row.get(2)?,
            back: row.get(3)?,
            created_at: ts_col(row, 4)?,
        },
        review: ReviewRecord {
            id,
            last_review: opt_ts_col(row, 5)?,
            next_review: opt_ts_col(row, 6)?,
            interval_days: row.get(7)?,
            ease_factor: row.get(8)?,
            repetition_count: row.get(9)?,
        },
    })
}

/// Creates a flashcard with a fresh review record starting at `ease_factor`.
pub fn create_flashcard(
    conn: &Connection,
    deck_id: i64,
    front: &str,
    back: &str,
    ease_factor: f64,
    now: DateTime<Utc>,
) -> Result<FlashcardView> {
    conn.execute(
        "INSERT INTO flashcards (deck_id, front, back, created_at) VALUES (?, ?, ?, ?)",
        params![deck_id, front, back, to_ts(now)],
    )?;
    let id = conn.last_insert_rowid();
    let review = ReviewRecord::with_ease(id, ease_factor);
    save_review_record(conn, &review)?;
    debug!("[DB] Created flashcard {} in deck {}", id, deck_id);

    Ok(FlashcardView {
        card: Flashcard {
            id,
            deck_id,
            front: front.to_string(),
            back: back.to_string(),
            created_at: truncate_secs(now),
        },
        review,
    })
}

pub fn get_flashcard(conn: &Connection, card_id: i64) -> Result<Option<FlashcardView>> {
    conn.query_row(
        &format!("{} WHERE f.id = ?", FLASHCARD_VIEW_SQL),
        [card_id],
        map_flashcard_view,
    )
    .optional()
}

pub fn list_flashcards(conn: &Connection, deck_id: Option<i64>) -> Result<Vec<FlashcardView>> {
    let cards = match deck_id {
        Some(deck_id) => {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE f.deck_id = ? ORDER BY f.created_at, f.id",
                FLASHCARD_VIEW_SQL
            ))?;
            let rows = stmt.query_map([deck_id], map_flashcard_view)?;
            rows.collect::<Result<Vec<_>>>()?
        }
        None => {
            let mut stmt =
                conn.prepare(&format!("{} ORDER BY f.created_at, f.id", FLASHCARD_VIEW_SQL))?;
            let rows = stmt.query_map([], map_flashcard_view)?;
            rows.collect::<Result<Vec<_>>>()?
        }
    };
    Ok(cards)
}

pub fn delete_flashcard(conn: &Connection, card_id: i64) -> Result<bool> {
    Ok(conn.execute("DELETE FROM flashcards WHERE id = ?", [card_id])? > 0)
}

// --- Review State ---

pub fn get_review_record(conn: &Connection, card_id: i64) -> Result<Option<ReviewRecord>> {
    conn.query_row(
        "SELECT last_review_ts, next_review_ts, interval_days, ease_factor, repetition_count
         FROM review_state WHERE flashcard_id = ?",
        [card_id],
        |row| {
            Ok(ReviewRecord {
                id: card_id,
                last_review: opt_ts_col(row, 0)?,
                next_review: opt_ts_col(row, 1)?,
                interval_days: row.get(2)?,
                ease_factor: row.get(3)?,
                repetition_count: row.get(4)?,
            })
        },
    )
    .optional()
}

/// Saves the calculated review state.
pub fn save_review_record(conn: &Connection, record: &ReviewRecord) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO review_state
            (flashcard_id, last_review_ts, next_review_ts, interval_days, ease_factor, repetition_count)
         VALUES (?, ?, ?, ?, ?, ?)",
        params![
            record.id,
            record.last_review.map(to_ts),
            record.next_review.map(to_ts),
            record.interval_days,
            record.ease_factor,
            record.repetition_count
        ],
    )?;
    Ok(())
}

/// Records one review in the append-only history.
pub fn log_review(
    conn: &Connection,
    card_id: i64,
    quality: Quality,
    record: &ReviewRecord,
    reviewed_at: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO review_log (flashcard_id, quality, reviewed_at, interval_days, ease_factor)
         VALUES (?, ?, ?, ?, ?)",
        params![
            card_id,
            i64::from(quality),
            to_ts(reviewed_at),
            record.interval_days,
            record.ease_factor
        ],
    )?;
    Ok(())
}

pub fn get_review_log(conn: &Connection, card_id: i64) -> Result<Vec<ReviewLogEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, flashcard_id, quality, reviewed_at, interval_days, ease_factor
         FROM review_log WHERE flashcard_id = ? ORDER BY reviewed_at, id",
    )?;
    let entries = stmt
        .query_map([card_id], |row| {
            let raw: i64 = row.get(2)?;
            let quality = Quality::try_from(raw).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(2, Type::Integer, Box::new(e))
            })?;
            Ok(ReviewLogEntry {
                id: row.get(0)?,
                flashcard_id: row.get(1)?,
                quality,
                reviewed_at: ts_col(row, 3)?,
                interval_days: row.get(4)?,
                ease_factor: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>>>()?;
    Ok(entries)
}

// --- Curriculum Modules ---

fn map_module(row: &Row) -> Result<CurriculumModule> {
    Ok(CurriculumModule {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        progress: progress_col(row, 3)?,
        position: row.get(4)?,
        created_at: ts_col(row, 5)?,
    })
}

pub fn create_module(
    conn: &Connection,
    title: &str,
    description: Option<&str>,
    now: DateTime<Utc>,
) -> Result<CurriculumModule> {
    let position: i64 = conn.query_row(
        "SELECT COALESCE(MAX(position), -1) + 1 FROM modules",
        [],
        |r| r.get(0),
    )?;
    conn.execute(
        "INSERT INTO modules (title, description, progress, position, created_at) VALUES (?, ?, 0, ?, ?)",
        params![title, description, position, to_ts(now)],
    )?;
    Ok(CurriculumModule {
        id: conn.last_insert_rowid(),
        title: title.to_string(),
        description: description.map(str::to_string),
        progress: 0,
        position,
        created_at: truncate_secs(now),
    })
}

pub fn get_module(conn: &Connection, module_id: i64) -> Result<Option<CurriculumModule>> {
    conn.query_row(
        "SELECT id, title, description, progress, position, created_at FROM modules WHERE id = ?",
        [module_id],
        map_module,
    )
    .optional()
}

pub fn list_modules(conn: &Connection) -> Result<Vec<CurriculumModule>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, description, progress, position, created_at FROM modules ORDER BY position, id",
    )?;
    let modules = stmt.query_map([], map_module)?.collect::<Result<Vec<_>>>()?;
    Ok(modules)
}

pub fn update_module_progress(conn: &Connection, module_id: i64, progress: u8) -> Result<bool> {
    Ok(conn.execute(
        "UPDATE modules SET progress = ? WHERE id = ?",
        params![progress, module_id],
    )? > 0)
}

pub fn delete_module(conn: &Connection, module_id: i64) -> Result<bool> {
    Ok(conn.execute("DELETE FROM modules WHERE id = ?", [module_id])? > 0)
}

// --- Topics ---

fn map_topic(row: &Row) -> Result<Topic> {
    Ok(Topic {
        id: row.get(0)?,
        module_id: row.get(1)?,
        title: row.get(2)?,
        completed: row.get(3)?,
        position: row.get(4)?,
    })
}

pub fn create_topic(conn: &Connection, module_id: i64, title: &str, completed: bool) -> Result<Topic> {
    let position: i64 = conn.query_row(
        "SELECT COALESCE(MAX(position), -1) + 1 FROM topics WHERE module_id = ?",
        [module_id],
        |r| r.get(0),
    )?;
    conn.execute(
        "INSERT INTO topics (module_id, title, completed, position) VALUES (?, ?, ?, ?)",
        params![module_id, title, completed, position],
    )?;
    Ok(Topic {
        id: conn.last_insert_rowid(),
        module_id,
        title: title.to_string(),
        completed,
        position,
    })
}

pub fn get_topic(conn: &Connection, topic_id: i64) -> Result<Option<Topic>> {
    conn.query_row(
        "SELECT id, module_id, title, completed, position FROM topics WHERE id = ?",
        [topic_id],
        map_topic,
    )
    .optional()
}

pub fn list_topics(conn: &Connection, module_id: i64) -> Result<Vec<Topic>> {
    let mut stmt = conn.prepare(
        "SELECT id, module_id, title, completed, position FROM topics
         WHERE module_id = ? ORDER BY position, id",
    )?;
    let topics = stmt.query_map([module_id], map_topic)?.collect::<Result<Vec<_>>>()?;
    Ok(topics)
}

pub fn set_topic_completed(conn: &Connection, topic_id: i64, completed: bool) -> Result<bool> {
    Ok(conn.execute(
        "UPDATE topics SET completed = ? WHERE id = ?",
        params![completed, topic_id],
    )? > 0)
}

pub fn delete_topic(conn: &Connection, topic_id: i64) -> Result<bool> {
    Ok(conn.execute("DELETE FROM topics WHERE id = ?", [topic_id])? > 0)
}

// --- Projects ---

fn map_project(row: &Row) -> Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        progress: progress_col(row, 3)?,
        created_at: ts_col(row, 4)?,
    })
}

pub fn create_project(
    conn: &Connection,
    title: &str,
    description: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Project> {
    conn.execute(
        "INSERT INTO projects (title, description, progress, created_at) VALUES (?, ?, 0, ?)",
        params![title, description, to_ts(now)],
    )?;
    Ok(Project {
        id: conn.last_insert_rowid(),
        title: title.to_string(),
        description: description.map(str::to_string),
        progress: 0,
        created_at: truncate_secs(now),
    })
}

pub fn get_project(conn: &Connection, project_id: i64) -> Result<Option<Project>> {
    conn.query_row(
        "SELECT id, title, description, progress, created_at FROM projects WHERE id = ?",
        [project_id],
        map_project,
    )
    .optional()
}

pub fn list_projects(conn: &Connection) -> Result<Vec<Project>> {
    let mut stmt =
        conn.prepare("SELECT id, title, description, progress, created_at FROM projects ORDER BY id")?;
    let projects = stmt.query_map([], map_project)?.collect::<Result<Vec<_>>>()?;
    Ok(projects)
}

pub fn update_project_progress(conn: &Connection, project_id: i64, progress: u8) -> Result<bool> {
    Ok(conn.execute(
        "UPDATE projects SET progress = ? WHERE id = ?",
        params![progress, project_id],
    )? > 0)
}

pub fn delete_project(conn: &Connection, project_id: i64) -> Result<bool> {
    Ok(conn.execute("DELETE FROM projects WHERE id = ?", [project_id])? > 0)
}

// --- Milestones ---

fn map_milestone(row: &Row) -> Result<Milestone> {
    let raw: String = row.get(3)?;
    let status = MilestoneStatus::from_str(&raw).unwrap_or_else(|_| {
        warn!("[DB] Unknown milestone status '{}', treating as pending", raw);
        MilestoneStatus::Pending
    });
    Ok(Milestone {
        id: row.get(0)?,
        project_id: row.get(1)?,
        title: row.get(2)?,
        status,
        position: row.get(4)?,
        due_date: opt_ts_col(row, 5)?,
    })
}

pub fn create_milestone(
    conn: &Connection,
    project_id: i64,
    title: &str,
    due_date: Option<DateTime<Utc>>,
) -> Result<Milestone> {
    let position: i64 = conn.query_row(
        "SELECT COALESCE(MAX(position), -1) + 1 FROM milestones WHERE project_id = ?",
        [project_id],
        |r| r.get(0),
    )?;
    conn.execute(
        "INSERT INTO milestones (project_id, title, status, position, due_ts) VALUES (?, ?, ?, ?, ?)",
        params![
            project_id,
            title,
            MilestoneStatus::Pending.as_str(),
            position,
            due_date.map(to_ts)
        ],
    )?;
    Ok(Milestone {
        id: conn.last_insert_rowid(),
        project_id,
        title: title.to_string(),
        status: MilestoneStatus::Pending,
        position,
        due_date: due_date.map(truncate_secs),
    })
}

pub fn get_milestone(conn: &Connection, milestone_id: i64) -> Result<Option<Milestone>> {
    conn.query_row(
        "SELECT id, project_id, title, status, position, due_ts FROM milestones WHERE id = ?",
        [milestone_id],
        map_milestone,
    )
    .optional()
}

pub fn list_milestones(conn: &Connection, project_id: i64) -> Result<Vec<Milestone>> {
    let mut stmt = conn.prepare(
        "SELECT id, project_id, title, status, position, due_ts FROM milestones
         WHERE project_id = ? ORDER BY position, id",
    )?;
    let milestones = stmt
        .query_map([project_id], map_milestone)?
        .collect::<Result<Vec<_>>>()?;
    Ok(milestones)
}

pub fn set_milestone_status(
    conn: &Connection,
    milestone_id: i64,
    status: MilestoneStatus,
) -> Result<bool> {
    Ok(conn.execute(
        "UPDATE milestones SET status = ? WHERE id = ?",
        params![status.as_str(), milestone_id],
    )? > 0)
}

pub fn delete_milestone(conn: &Connection, milestone_id: i64) -> Result<bool> {
    Ok(conn.execute("DELETE FROM milestones WHERE id = ?", [milestone_id])? > 0)
}

// --- Achievements ---

pub fn list_unlocked_achievements(conn: &Connection) -> Result<Vec<UnlockedAchievement>> {
    let mut stmt = conn.prepare("SELECT key, unlocked_at FROM achievements ORDER BY unlocked_at, key")?;
    let rows = stmt.query_map([], |row| {
        let key: String = row.get(0)?;
        Ok((key, ts_col(row, 1)?))
    })?;

    let mut unlocked = Vec::new();
    for r in rows {
        let (key, unlocked_at) = r?;
        match Achievement::from_str(&key) {
            Ok(achievement) => unlocked.push(UnlockedAchievement {
                achievement,
                unlocked_at,
            }),
            Err(_) => warn!("[DB] Skipping unknown achievement key '{}'", key),
        }
    }
    Ok(unlocked)
}

/// Returns true if the achievement was newly unlocked.
pub fn unlock_achievement(
    conn: &Connection,
    achievement: Achievement,
    now: DateTime<Utc>,
) -> Result<bool> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO achievements (key, unlocked_at) VALUES (?, ?)",
        params![achievement.key(), to_ts(now)],
    )?;
    Ok(changed > 0)
}

pub fn get_learning_stats(conn: &Connection) -> Result<LearningStats> {
    conn.query_row(
        "SELECT
            (SELECT count(*) FROM review_log),
            (SELECT count(*) FROM review_log WHERE quality = ?),
            (SELECT count(*) FROM modules WHERE progress = 100),
            (SELECT count(*) FROM projects WHERE progress = 100)",
        [i64::from(Quality::Easy)],
        |row| {
            Ok(LearningStats {
                total_reviews: row.get(0)?,
                easy_reviews: row.get(1)?,
                completed_modules: row.get(2)?,
                completed_projects: row.get(3)?,
            })
        },
    )
}
