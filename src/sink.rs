use std::sync::Mutex;

use chrono::{DateTime, Local};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::SinkError;
use crate::language::CodeLanguage;
use crate::metrics::{self, Score};
use crate::session::SnippetResult;

pub const XP_PER_LEVEL: u64 = 1000;

/// The caller a result belongs to, passed explicitly to every sink call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: String,
    pub name: String,
}

impl UserContext {
    pub fn new(user_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
        }
    }

    /// Local users are keyed by their name
    pub fn local(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            user_id: name.to_lowercase(),
            name,
        }
    }
}

/// Local view of a user's experience. Updated optimistically before the
/// sink confirms; a failed sync leaves it ahead of the stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub user: UserContext,
    pub xp: u64,
}

impl Profile {
    pub fn new(user: UserContext, xp: u64) -> Self {
        Self { user, xp }
    }

    pub fn level(&self) -> u64 {
        level_for_xp(self.xp)
    }
}

pub fn level_for_xp(xp: u64) -> u64 {
    xp / XP_PER_LEVEL + 1
}

/// One finished session as stored by a result sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub wpm: u32,
    pub accuracy: u32,
    pub language: CodeLanguage,
    pub mistakes: usize,
    pub duration_secs: u64,
    pub recorded_at: DateTime<Local>,
}

impl ResultRecord {
    pub fn new(result: &SnippetResult, score: &Score) -> Self {
        Self {
            wpm: score.wpm,
            accuracy: score.accuracy,
            language: result.language,
            mistakes: result.mistakes,
            duration_secs: result.duration_secs,
            recorded_at: Local::now(),
        }
    }

    /// Records are duplicates when these match for the same user
    pub fn dedup_key(&self) -> (u32, u32, usize) {
        (self.wpm, self.accuracy, self.mistakes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStatus {
    Recorded,
    /// Same record already stored; counts as success
    Duplicate,
}

pub trait ResultSink {
    fn submit(&self, user: &UserContext, record: &ResultRecord) -> Result<SubmitStatus, SinkError>;
}

pub trait XpSync {
    /// Add `delta` to the stored total and return the new total.
    fn sync_xp(&self, user: &UserContext, delta: u32) -> Result<u64, SinkError>;
}

/// A leaderboard row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub name: String,
    pub wpm: u32,
    pub accuracy: u32,
    pub language: CodeLanguage,
    pub date: DateTime<Local>,
}

/// Outcome of reporting a finished session
#[derive(Debug)]
pub struct Report {
    pub result: SnippetResult,
    pub score: Score,
    pub feedback: &'static str,
    pub saved: Result<SubmitStatus, SinkError>,
    pub xp_synced: bool,
}

impl Report {
    pub fn saved_ok(&self) -> bool {
        self.saved.is_ok()
    }
}

/// Score a finished session, bump local xp, then forward the record and the
/// xp delta. Sink failures are logged and reported back, never retried.
pub fn report_finished(
    result: SnippetResult,
    profile: &mut Profile,
    sink: &dyn ResultSink,
    xp: &dyn XpSync,
) -> Report {
    let score = Score::from_result(&result);
    let feedback = metrics::feedback(result.mistakes, score.wpm, score.accuracy);

    profile.xp += u64::from(score.xp);

    let record = ResultRecord::new(&result, &score);
    let saved = sink.submit(&profile.user, &record);
    match &saved {
        Ok(SubmitStatus::Recorded) => {
            tracing::info!(wpm = score.wpm, accuracy = score.accuracy, "result recorded")
        }
        Ok(SubmitStatus::Duplicate) => {
            tracing::info!(wpm = score.wpm, accuracy = score.accuracy, "result already recorded")
        }
        Err(e) => tracing::warn!(error = %e, "failed to save result"),
    }

    let xp_synced = match xp.sync_xp(&profile.user, score.xp) {
        Ok(total) => {
            tracing::debug!(delta = score.xp, total, "xp synced");
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, delta = score.xp, "failed to sync xp");
            false
        }
    };

    Report {
        result,
        score,
        feedback,
        saved,
        xp_synced,
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    records: Vec<(UserContext, ResultRecord)>,
    xp: Vec<(String, u64)>,
}

/// In-process sink with the same duplicate rule as the database.
#[derive(Debug, Default)]
pub struct MemorySink {
    state: Mutex<MemoryState>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ResultRecord> {
        self.lock()
            .map(|s| s.records.iter().map(|(_, r)| r.clone()).collect())
            .unwrap_or_default()
    }

    pub fn xp_for(&self, user: &UserContext) -> u64 {
        self.lock()
            .ok()
            .and_then(|s| {
                s.xp.iter()
                    .find(|(id, _)| *id == user.user_id)
                    .map(|(_, xp)| *xp)
            })
            .unwrap_or(0)
    }

    /// Top `limit` records by wpm, highest first
    pub fn leaderboard(&self, limit: usize) -> Vec<LeaderboardEntry> {
        let Ok(state) = self.lock() else {
            return Vec::new();
        };
        state
            .records
            .iter()
            .sorted_by(|a, b| b.1.wpm.cmp(&a.1.wpm))
            .take(limit)
            .enumerate()
            .map(|(i, (user, record))| LeaderboardEntry {
                rank: i + 1,
                name: user.name.clone(),
                wpm: record.wpm,
                accuracy: record.accuracy,
                language: record.language,
                date: record.recorded_at,
            })
            .collect()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, SinkError> {
        self.state
            .lock()
            .map_err(|_| SinkError::Unavailable("memory sink poisoned".into()))
    }
}

impl ResultSink for MemorySink {
    fn submit(&self, user: &UserContext, record: &ResultRecord) -> Result<SubmitStatus, SinkError> {
        let mut state = self.lock()?;
        let duplicate = state
            .records
            .iter()
            .any(|(u, r)| u.user_id == user.user_id && r.dedup_key() == record.dedup_key());
        if duplicate {
            return Ok(SubmitStatus::Duplicate);
        }
        state.records.push((user.clone(), record.clone()));
        Ok(SubmitStatus::Recorded)
    }
}

impl XpSync for MemorySink {
    fn sync_xp(&self, user: &UserContext, delta: u32) -> Result<u64, SinkError> {
        let mut state = self.lock()?;
        if let Some(entry) = state.xp.iter_mut().find(|(id, _)| *id == user.user_id) {
            entry.1 += u64::from(delta);
            return Ok(entry.1);
        }
        state.xp.push((user.user_id.clone(), u64::from(delta)));
        Ok(u64::from(delta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    struct Offline;

    impl ResultSink for Offline {
        fn submit(&self, _: &UserContext, _: &ResultRecord) -> Result<SubmitStatus, SinkError> {
            Err(SinkError::Unavailable("offline".into()))
        }
    }

    impl XpSync for Offline {
        fn sync_xp(&self, _: &UserContext, _: u32) -> Result<u64, SinkError> {
            Err(SinkError::Unavailable("offline".into()))
        }
    }

    fn result(correct: usize, total: usize, mistakes: usize, elapsed: u64) -> SnippetResult {
        SnippetResult {
            correct_chars: correct,
            mistakes,
            total_chars: total,
            time_elapsed_secs: elapsed,
            duration_secs: 60,
            snippets_completed: 0,
            language: CodeLanguage::Python,
        }
    }

    fn profile() -> Profile {
        Profile::new(UserContext::local("Ada"), 0)
    }

    #[test]
    fn level_steps_every_thousand_xp() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(999), 1);
        assert_eq!(level_for_xp(1000), 2);
        assert_eq!(level_for_xp(2500), 3);
    }

    #[test]
    fn local_user_id_is_lowercased_name() {
        let user = UserContext::local("Ada");
        assert_eq!(user.user_id, "ada");
        assert_eq!(user.name, "Ada");
    }

    #[test]
    fn report_records_result_and_xp() {
        let sink = MemorySink::new();
        let mut profile = profile();

        let report = report_finished(result(250, 250, 0, 60), &mut profile, &sink, &sink);

        assert_eq!(report.score.wpm, 50);
        assert_eq!(report.score.accuracy, 100);
        assert_eq!(report.score.xp, 50);
        assert_matches!(report.saved, Ok(SubmitStatus::Recorded));
        assert!(report.xp_synced);
        assert_eq!(profile.xp, 50);
        assert_eq!(sink.xp_for(&profile.user), 50);

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].language, CodeLanguage::Python);
        assert_eq!(records[0].duration_secs, 60);
    }

    #[test]
    fn duplicate_submission_is_success() {
        let sink = MemorySink::new();
        let mut profile = profile();

        report_finished(result(250, 250, 0, 60), &mut profile, &sink, &sink);
        let second = report_finished(result(250, 250, 0, 60), &mut profile, &sink, &sink);

        assert_matches!(second.saved, Ok(SubmitStatus::Duplicate));
        assert!(second.saved_ok());
        assert_eq!(sink.records().len(), 1);
    }

    #[test]
    fn offline_sink_keeps_result_and_local_xp() {
        let mut profile = profile();

        let report = report_finished(result(100, 120, 20, 60), &mut profile, &Offline, &Offline);

        assert_matches!(report.saved, Err(SinkError::Unavailable(_)));
        assert!(!report.xp_synced);
        // no rollback of the optimistic update
        assert_eq!(profile.xp, u64::from(report.score.xp));
        assert_eq!(report.result.correct_chars, 100);
    }

    #[test]
    fn report_of_unstarted_session() {
        let sink = MemorySink::new();
        let mut profile = profile();

        let report = report_finished(result(0, 0, 0, 0), &mut profile, &sink, &sink);
        assert_eq!(report.score.wpm, 0);
        assert_eq!(report.score.accuracy, 100);
        assert_eq!(report.score.xp, 0);
        assert_eq!(report.feedback, "Great accuracy! Speed will come naturally.");
    }

    #[test]
    fn memory_leaderboard_sorted_by_wpm() {
        let sink = MemorySink::new();
        let ada = UserContext::local("Ada");
        let bob = UserContext::local("Bob");
        let mut record = ResultRecord::new(
            &result(100, 100, 0, 60),
            &Score {
                wpm: 20,
                accuracy: 100,
                xp: 20,
            },
        );
        sink.submit(&ada, &record).unwrap();
        record.wpm = 70;
        sink.submit(&bob, &record).unwrap();
        record.wpm = 45;
        sink.submit(&ada, &record).unwrap();

        let board = sink.leaderboard(2);
        assert_eq!(board.len(), 2);
        assert_eq!((board[0].rank, board[0].name.as_str(), board[0].wpm), (1, "Bob", 70));
        assert_eq!((board[1].rank, board[1].name.as_str(), board[1].wpm), (2, "Ada", 45));
    }
}
