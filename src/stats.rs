use chrono::{DateTime, Local};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;
use crate::error::SinkError;
use crate::language::CodeLanguage;
use crate::sink::{
    level_for_xp, LeaderboardEntry, Profile, ResultRecord, ResultSink, SubmitStatus, UserContext,
    XpSync,
};

pub const LEADERBOARD_SIZE: usize = 10;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        user_id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        xp INTEGER NOT NULL DEFAULT 0,
        level INTEGER NOT NULL DEFAULT 1
    );

    CREATE TABLE IF NOT EXISTS results (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL REFERENCES users(user_id),
        language TEXT NOT NULL,
        wpm INTEGER NOT NULL,
        accuracy INTEGER NOT NULL,
        mistakes INTEGER NOT NULL,
        duration INTEGER NOT NULL,
        recorded_at TEXT NOT NULL
    );

    CREATE UNIQUE INDEX IF NOT EXISTS idx_results_dedup
        ON results(user_id, wpm, accuracy, mistakes);

    CREATE INDEX IF NOT EXISTS idx_results_wpm ON results(wpm);
"#;

/// One stored result, as exported to csv
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    pub name: String,
    pub language: CodeLanguage,
    pub wpm: u32,
    pub accuracy: u32,
    pub mistakes: usize,
    pub duration_secs: u64,
    pub recorded_at: DateTime<Local>,
}

/// SQLite-backed results, experience and leaderboard
#[derive(Debug)]
pub struct StatsDb {
    conn: Connection,
}

impl StatsDb {
    /// Open the database at the default state location
    pub fn new() -> Result<Self, SinkError> {
        let db_path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("codetype_stats.db"));
        Self::open(db_path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SinkError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, SinkError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, SinkError> {
        conn.execute_batch(SCHEMA)?;
        Ok(StatsDb { conn })
    }

    /// Create the user if needed and return their stored profile
    pub fn ensure_user(&self, user: &UserContext) -> Result<Profile, SinkError> {
        self.conn.execute(
            "INSERT INTO users (user_id, name) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET name = excluded.name",
            params![user.user_id, user.name],
        )?;

        let xp: u64 = self.conn.query_row(
            "SELECT xp FROM users WHERE user_id = ?1",
            [&user.user_id],
            |row| row.get(0),
        )?;

        Ok(Profile::new(user.clone(), xp))
    }

    pub fn stored_level(&self, user: &UserContext) -> Result<Option<u64>, SinkError> {
        let level = self
            .conn
            .query_row(
                "SELECT level FROM users WHERE user_id = ?1",
                [&user.user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(level)
    }

    /// Top `limit` results by wpm, highest first
    pub fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, SinkError> {
        let rows = self.query_rows(
            r#"
            SELECT COALESCE(u.name, 'Unknown'), r.language, r.wpm, r.accuracy,
                   r.mistakes, r.duration, r.recorded_at
            FROM results r
            LEFT JOIN users u ON u.user_id = r.user_id
            ORDER BY r.wpm DESC, r.id ASC
            LIMIT ?1
            "#,
            params![limit],
        )?;

        Ok(rows
            .into_iter()
            .enumerate()
            .map(|(i, row)| LeaderboardEntry {
                rank: i + 1,
                name: row.name,
                wpm: row.wpm,
                accuracy: row.accuracy,
                language: row.language,
                date: row.recorded_at,
            })
            .collect())
    }

    /// Most recent results of one user, newest first
    pub fn recent_results(
        &self,
        user: &UserContext,
        limit: usize,
    ) -> Result<Vec<ResultRow>, SinkError> {
        self.query_rows(
            r#"
            SELECT u.name, r.language, r.wpm, r.accuracy, r.mistakes, r.duration, r.recorded_at
            FROM results r
            JOIN users u ON u.user_id = r.user_id
            WHERE r.user_id = ?1
            ORDER BY r.id DESC
            LIMIT ?2
            "#,
            params![user.user_id, limit],
        )
    }

    /// Write every stored result as csv, returning the number of rows
    pub fn export_csv<W: Write>(&self, writer: W) -> Result<usize, SinkError> {
        let rows = self.query_rows(
            r#"
            SELECT COALESCE(u.name, 'Unknown'), r.language, r.wpm, r.accuracy,
                   r.mistakes, r.duration, r.recorded_at
            FROM results r
            LEFT JOIN users u ON u.user_id = r.user_id
            ORDER BY r.id ASC
            "#,
            [],
        )?;

        let mut csv_writer = csv::Writer::from_writer(writer);
        for row in &rows {
            csv_writer.serialize(row)?;
        }
        csv_writer.flush()?;
        Ok(rows.len())
    }

    fn query_rows<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> Result<Vec<ResultRow>, SinkError> {
        let mut stmt = self.conn.prepare(sql)?;
        let row_iter = stmt.query_map(params, |row| {
            let language_str: String = row.get(1)?;
            let language = CodeLanguage::from_name(&language_str).ok_or_else(|| {
                rusqlite::Error::InvalidColumnType(
                    1,
                    "language".to_string(),
                    rusqlite::types::Type::Text,
                )
            })?;

            let timestamp_str: String = row.get(6)?;
            let recorded_at = DateTime::parse_from_rfc3339(&timestamp_str)
                .map_err(|_| {
                    rusqlite::Error::InvalidColumnType(
                        6,
                        "recorded_at".to_string(),
                        rusqlite::types::Type::Text,
                    )
                })?
                .with_timezone(&Local);

            Ok(ResultRow {
                name: row.get(0)?,
                language,
                wpm: row.get(2)?,
                accuracy: row.get(3)?,
                mistakes: row.get(4)?,
                duration_secs: row.get(5)?,
                recorded_at,
            })
        })?;

        let mut rows = Vec::new();
        for row in row_iter {
            rows.push(row?);
        }
        Ok(rows)
    }
}

impl ResultSink for StatsDb {
    fn submit(&self, user: &UserContext, record: &ResultRecord) -> Result<SubmitStatus, SinkError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO users (user_id, name) VALUES (?1, ?2)",
            params![user.user_id, user.name],
        )?;

        let inserted = self.conn.execute(
            r#"
            INSERT OR IGNORE INTO results
            (user_id, language, wpm, accuracy, mistakes, duration, recorded_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                user.user_id,
                record.language.to_string(),
                record.wpm,
                record.accuracy,
                record.mistakes,
                record.duration_secs,
                record.recorded_at.to_rfc3339(),
            ],
        )?;

        if inserted == 0 {
            Ok(SubmitStatus::Duplicate)
        } else {
            Ok(SubmitStatus::Recorded)
        }
    }
}

impl XpSync for StatsDb {
    fn sync_xp(&self, user: &UserContext, delta: u32) -> Result<u64, SinkError> {
        let current = self.ensure_user(user)?.xp;
        let total = current + u64::from(delta);
        self.conn.execute(
            "UPDATE users SET xp = ?2, level = ?3 WHERE user_id = ?1",
            params![user.user_id, total, level_for_xp(total)],
        )?;
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::tempdir;

    fn record(wpm: u32, accuracy: u32, mistakes: usize) -> ResultRecord {
        ResultRecord {
            wpm,
            accuracy,
            language: CodeLanguage::Rust,
            mistakes,
            duration_secs: 60,
            recorded_at: Local::now(),
        }
    }

    #[test]
    fn submit_then_duplicate() {
        let db = StatsDb::open_in_memory().unwrap();
        let ada = UserContext::local("Ada");

        assert_matches!(db.submit(&ada, &record(50, 96, 3)), Ok(SubmitStatus::Recorded));
        assert_matches!(db.submit(&ada, &record(50, 96, 3)), Ok(SubmitStatus::Duplicate));
        // same tuple for a different user is not a duplicate
        let bob = UserContext::local("Bob");
        assert_matches!(db.submit(&bob, &record(50, 96, 3)), Ok(SubmitStatus::Recorded));

        assert_eq!(db.recent_results(&ada, 10).unwrap().len(), 1);
    }

    #[test]
    fn leaderboard_orders_by_wpm_and_limits() {
        let db = StatsDb::open_in_memory().unwrap();
        let ada = UserContext::local("Ada");
        let bob = UserContext::local("Bob");

        db.submit(&ada, &record(40, 90, 1)).unwrap();
        db.submit(&bob, &record(80, 95, 2)).unwrap();
        db.submit(&ada, &record(60, 99, 0)).unwrap();

        let board = db.leaderboard(2).unwrap();
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].rank, 1);
        assert_eq!(board[0].name, "Bob");
        assert_eq!(board[0].wpm, 80);
        assert_eq!(board[1].name, "Ada");
        assert_eq!(board[1].wpm, 60);
        assert_eq!(board[1].language, CodeLanguage::Rust);
    }

    #[test]
    fn xp_accumulates_and_updates_level() {
        let db = StatsDb::open_in_memory().unwrap();
        let ada = UserContext::local("Ada");

        assert_eq!(db.sync_xp(&ada, 600).unwrap(), 600);
        assert_eq!(db.stored_level(&ada).unwrap(), Some(1));
        assert_eq!(db.sync_xp(&ada, 500).unwrap(), 1100);
        assert_eq!(db.stored_level(&ada).unwrap(), Some(2));
        assert_eq!(db.ensure_user(&ada).unwrap().xp, 1100);
    }

    #[test]
    fn unknown_user_has_no_level() {
        let db = StatsDb::open_in_memory().unwrap();
        assert_eq!(db.stored_level(&UserContext::local("nobody")).unwrap(), None);
    }

    #[test]
    fn ensure_user_starts_at_zero_xp() {
        let db = StatsDb::open_in_memory().unwrap();
        let profile = db.ensure_user(&UserContext::local("Ada")).unwrap();
        assert_eq!(profile.xp, 0);
        assert_eq!(profile.level(), 1);
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("stats.db");
        let ada = UserContext::local("Ada");
        {
            let db = StatsDb::open(&path).unwrap();
            db.submit(&ada, &record(42, 97, 1)).unwrap();
            db.sync_xp(&ada, 41).unwrap();
        }
        let db = StatsDb::open(&path).unwrap();
        assert_eq!(db.leaderboard(LEADERBOARD_SIZE).unwrap()[0].wpm, 42);
        assert_eq!(db.ensure_user(&ada).unwrap().xp, 41);
    }

    #[test]
    fn export_csv_writes_header_and_rows() {
        let db = StatsDb::open_in_memory().unwrap();
        let ada = UserContext::local("Ada");
        db.submit(&ada, &record(42, 97, 1)).unwrap();
        let mut cpp = record(30, 90, 4);
        cpp.language = CodeLanguage::Cpp;
        db.submit(&ada, &cpp).unwrap();

        let mut out = Vec::new();
        let written = db.export_csv(&mut out).unwrap();
        assert_eq!(written, 2);

        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("name,language,wpm,accuracy,mistakes,duration_secs,recorded_at")
        );
        assert!(lines.next().unwrap().starts_with("Ada,Rust,42,97,1,60,"));
        assert!(lines.next().unwrap().starts_with("Ada,C++,30,90,4,60,"));
    }
}
