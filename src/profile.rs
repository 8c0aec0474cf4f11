//! Per-user progress: session count, rolling averages and personal bests.

use chrono::{DateTime, Local};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;
use crate::error::ProfileError;
use crate::session::SessionResult;
use crate::util::rolling_mean;

pub type Result<T> = std::result::Result<T, ProfileError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProgress {
    pub username: String,
    pub sessions: u32,
    pub avg_wpm: f64,
    pub avg_accuracy: f64,
    pub best_wpm: u32,
    pub best_accuracy: u8,
    pub best_challenge_score: u32,
    pub last_session_at: Option<DateTime<Local>>,
}

impl UserProgress {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            sessions: 0,
            avg_wpm: 0.0,
            avg_accuracy: 0.0,
            best_wpm: 0,
            best_accuracy: 0,
            best_challenge_score: 0,
            last_session_at: None,
        }
    }

    /// Fold one finished session into the aggregate.
    pub fn record(&mut self, result: &SessionResult) {
        self.sessions += 1;
        self.avg_wpm = rolling_mean(self.avg_wpm, self.sessions, result.wpm as f64);
        self.avg_accuracy = rolling_mean(self.avg_accuracy, self.sessions, result.accuracy as f64);

        self.best_wpm = self.best_wpm.max(result.wpm);
        self.best_accuracy = self.best_accuracy.max(result.accuracy);
        if let Some(score) = result.challenge_score {
            self.best_challenge_score = self.best_challenge_score.max(score);
        }
        self.last_session_at = Some(Local::now());
    }
}

/// Receives the final result of every session.
pub trait Aggregator {
    /// Record a finished session. Called exactly once per session end.
    fn persist(&mut self, username: &str, result: &SessionResult) -> Result<UserProgress>;
    /// Current aggregate; a fresh record for unknown users.
    fn progress(&self, username: &str) -> Result<UserProgress>;
    /// Zero a user's progress.
    fn reset(&mut self, username: &str) -> Result<UserProgress>;
}

/// In-memory aggregate store, handy for tests and as a fallback when the
/// database cannot be opened.
#[derive(Debug, Clone, Default)]
pub struct MemoryProfiles {
    users: HashMap<String, UserProgress>,
}

impl MemoryProfiles {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Aggregator for MemoryProfiles {
    fn persist(&mut self, username: &str, result: &SessionResult) -> Result<UserProgress> {
        let entry = self
            .users
            .entry(username.to_string())
            .or_insert_with(|| UserProgress::new(username));
        entry.record(result);
        Ok(entry.clone())
    }

    fn progress(&self, username: &str) -> Result<UserProgress> {
        Ok(self
            .users
            .get(username)
            .cloned()
            .unwrap_or_else(|| UserProgress::new(username)))
    }

    fn reset(&mut self, username: &str) -> Result<UserProgress> {
        let fresh = UserProgress::new(username);
        self.users.insert(username.to_string(), fresh.clone());
        Ok(fresh)
    }
}

/// SQLite-backed profile store
#[derive(Debug)]
pub struct ProfileDb {
    conn: Connection,
}

impl ProfileDb {
    /// Open the database at its default location under the state dir.
    pub fn open_default() -> Result<Self> {
        let path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("digita_profiles.db"));
        Self::open(path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS profiles (
                username TEXT PRIMARY KEY,
                sessions INTEGER NOT NULL DEFAULT 0,
                avg_wpm REAL NOT NULL DEFAULT 0,
                avg_accuracy REAL NOT NULL DEFAULT 0,
                best_wpm INTEGER NOT NULL DEFAULT 0,
                best_accuracy INTEGER NOT NULL DEFAULT 0,
                best_challenge_score INTEGER NOT NULL DEFAULT 0,
                last_session_at TEXT
            )
            "#,
            [],
        )?;

        Ok(ProfileDb { conn })
    }
}

impl Aggregator for ProfileDb {
    fn persist(&mut self, username: &str, result: &SessionResult) -> Result<UserProgress> {
        let tx = self.conn.transaction()?;
        let mut progress =
            load_progress(&tx, username)?.unwrap_or_else(|| UserProgress::new(username));
        progress.record(result);
        store_progress(&tx, &progress)?;
        tx.commit()?;
        Ok(progress)
    }

    fn progress(&self, username: &str) -> Result<UserProgress> {
        Ok(load_progress(&self.conn, username)?.unwrap_or_else(|| UserProgress::new(username)))
    }

    fn reset(&mut self, username: &str) -> Result<UserProgress> {
        let fresh = UserProgress::new(username);
        store_progress(&self.conn, &fresh)?;
        Ok(fresh)
    }
}

fn load_progress(conn: &Connection, username: &str) -> Result<Option<UserProgress>> {
    let row = conn
        .query_row(
            r#"
            SELECT sessions, avg_wpm, avg_accuracy, best_wpm, best_accuracy,
                   best_challenge_score, last_session_at
            FROM profiles
            WHERE username = ?1
            "#,
            [username],
            |row| {
                Ok((
                    row.get::<_, u32>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, u32>(3)?,
                    row.get::<_, u8>(4)?,
                    row.get::<_, u32>(5)?,
                    row.get::<_, Option<String>>(6)?,
                ))
            },
        )
        .optional()?;

    let Some((
        sessions,
        avg_wpm,
        avg_accuracy,
        best_wpm,
        best_accuracy,
        best_challenge_score,
        last_session_at,
    )) = row
    else {
        return Ok(None);
    };

    let last_session_at = last_session_at
        .map(|value| {
            DateTime::parse_from_rfc3339(&value)
                .map(|ts| ts.with_timezone(&Local))
                .map_err(|_| ProfileError::CorruptedTimestamp {
                    username: username.to_string(),
                    value,
                })
        })
        .transpose()?;

    Ok(Some(UserProgress {
        username: username.to_string(),
        sessions,
        avg_wpm,
        avg_accuracy,
        best_wpm,
        best_accuracy,
        best_challenge_score,
        last_session_at,
    }))
}

fn store_progress(conn: &Connection, progress: &UserProgress) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO profiles
        (username, sessions, avg_wpm, avg_accuracy, best_wpm, best_accuracy,
         best_challenge_score, last_session_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(username) DO UPDATE SET
            sessions = excluded.sessions,
            avg_wpm = excluded.avg_wpm,
            avg_accuracy = excluded.avg_accuracy,
            best_wpm = excluded.best_wpm,
            best_accuracy = excluded.best_accuracy,
            best_challenge_score = excluded.best_challenge_score,
            last_session_at = excluded.last_session_at
        "#,
        params![
            progress.username,
            progress.sessions,
            progress.avg_wpm,
            progress.avg_accuracy,
            progress.best_wpm,
            progress.best_accuracy,
            progress.best_challenge_score,
            progress.last_session_at.map(|ts| ts.to_rfc3339()),
        ],
    )?;
    Ok(())
}
