// src/database.rs

use log::{debug, info};
use rusqlite::{Connection, Result};
use std::path::Path;

pub fn open(path: &Path) -> Result<Connection> {
    info!("Database path: {:?}", path);
    let conn = Connection::open(path)?;
    init_db(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_db(&conn)?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    debug!("init_db: Checking database schema...");

    // Cascades (deck -> cards -> review state, module -> topics,
    // project -> milestones) rely on foreign key enforcement.
    conn.pragma_update(None, "foreign_keys", true)?;

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS decks (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            created_at INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS flashcards (
            id INTEGER PRIMARY KEY,
            deck_id INTEGER NOT NULL REFERENCES decks(id) ON DELETE CASCADE,
            front TEXT NOT NULL,
            back TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS review_state (
            flashcard_id INTEGER PRIMARY KEY REFERENCES flashcards(id) ON DELETE CASCADE,
            last_review_ts INTEGER,
            next_review_ts INTEGER,
            interval_days INTEGER NOT NULL DEFAULT 0,
            ease_factor REAL NOT NULL DEFAULT 2.5,
            repetition_count INTEGER NOT NULL DEFAULT 0
        );
        CREATE TABLE IF NOT EXISTS review_log (
            id INTEGER PRIMARY KEY,
            flashcard_id INTEGER NOT NULL REFERENCES flashcards(id) ON DELETE CASCADE,
            quality INTEGER NOT NULL CHECK (quality BETWEEN 0 AND 3),
            reviewed_at INTEGER NOT NULL,
            interval_days INTEGER NOT NULL,
            ease_factor REAL NOT NULL
        );
        CREATE TABLE IF NOT EXISTS modules (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT,
            progress INTEGER NOT NULL DEFAULT 0 CHECK (progress BETWEEN 0 AND 100),
            position INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS topics (
            id INTEGER PRIMARY KEY,
            module_id INTEGER NOT NULL REFERENCES modules(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            completed INTEGER NOT NULL DEFAULT 0,
            position INTEGER NOT NULL DEFAULT 0
        );
        CREATE TABLE IF NOT EXISTS projects (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT,
            progress INTEGER NOT NULL DEFAULT 0 CHECK (progress BETWEEN 0 AND 100),
            created_at INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS milestones (
            id INTEGER PRIMARY KEY,
            project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending','in_progress','completed')),
            position INTEGER NOT NULL DEFAULT 0,
            due_ts INTEGER
        );
        CREATE TABLE IF NOT EXISTS achievements (
            key TEXT PRIMARY KEY,
            unlocked_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_flashcards_deck ON flashcards(deck_id);
        CREATE INDEX IF NOT EXISTS idx_topics_module ON topics(module_id);
        CREATE INDEX IF NOT EXISTS idx_milestones_project ON milestones(project_id);
        ",
    )?;

    Ok(())
}
