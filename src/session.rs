use std::time::SystemTime;

use serde::Serialize;

use crate::error::SessionError;
use crate::language::CodeLanguage;
use crate::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Created or reset, no keystroke yet
    Idle,
    /// First keystroke received, timer running
    Active,
    /// Terminal; reached by timeout, manual end
    Finished,
}

/// What `apply_input` did with an update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    /// Session already finished
    Ignored,
    /// Longer than the target; previous input kept
    Rejected,
    Accepted,
    /// Accepted and the whole target is now typed
    SnippetComplete,
}

/// Rendering classification of a target position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharState {
    Correct,
    Incorrect,
    Pending,
}

/// Terminal statistics of a session, emitted exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnippetResult {
    pub correct_chars: usize,
    pub mistakes: usize,
    pub total_chars: usize,
    pub time_elapsed_secs: u64,
    pub duration_secs: u64,
    pub snippets_completed: usize,
    pub language: CodeLanguage,
}

/// A live typing attempt against one snippet at a time.
///
/// Input arrives as the full typed text rather than key events. Appends are
/// told apart from truncations by comparing lengths, and only an append can
/// count a mistake.
#[derive(Debug, Clone)]
pub struct Session {
    target: Vec<char>,
    typed: Vec<char>,
    language: CodeLanguage,
    mistakes: usize,
    phase: Phase,
    started_at: Option<SystemTime>,
    duration_secs: u64,
    remaining_secs: u64,
    // running totals of snippets already completed
    completed_correct: usize,
    completed_total: usize,
    snippets_completed: usize,
    result: Option<SnippetResult>,
}

impl Session {
    pub fn new(
        duration_secs: u64,
        target: &str,
        language: CodeLanguage,
    ) -> Result<Self, SessionError> {
        if duration_secs == 0 {
            return Err(SessionError::InvalidConfiguration(
                "session duration must be greater than zero seconds".to_string(),
            ));
        }

        Ok(Self {
            target: target.chars().collect(),
            typed: Vec::new(),
            language,
            mistakes: 0,
            phase: Phase::Idle,
            started_at: None,
            duration_secs,
            remaining_secs: duration_secs,
            completed_correct: 0,
            completed_total: 0,
            snippets_completed: 0,
            result: None,
        })
    }

    pub fn apply_input(&mut self, new_typed: &str) -> InputOutcome {
        self.apply_input_at(new_typed, SystemTime::now())
    }

    pub fn apply_input_at(&mut self, new_typed: &str, now: SystemTime) -> InputOutcome {
        if self.phase == Phase::Finished {
            return InputOutcome::Ignored;
        }

        let new_typed: Vec<char> = new_typed.chars().collect();
        if new_typed.len() > self.target.len() {
            return InputOutcome::Rejected;
        }

        if self.phase == Phase::Idle && self.typed.is_empty() && !new_typed.is_empty() {
            self.phase = Phase::Active;
            self.started_at = Some(now);
        }

        if new_typed.len() > self.typed.len() {
            let idx = new_typed.len() - 1;
            if new_typed[idx] != self.target[idx] {
                self.mistakes += 1;
            }
        }

        self.typed = new_typed;

        if self.is_snippet_complete() {
            InputOutcome::SnippetComplete
        } else {
            InputOutcome::Accepted
        }
    }

    /// Advance the countdown by one second. Returns the terminal result when
    /// this tick runs the clock out.
    pub fn tick(&mut self) -> Option<SnippetResult> {
        self.tick_at(SystemTime::now())
    }

    pub fn tick_at(&mut self, now: SystemTime) -> Option<SnippetResult> {
        if self.phase == Phase::Finished {
            return None;
        }

        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs == 0 {
            return self.finish(now);
        }
        None
    }

    /// Manual termination from Idle or Active.
    pub fn end_now(&mut self) -> Option<SnippetResult> {
        self.end_now_at(SystemTime::now())
    }

    pub fn end_now_at(&mut self, now: SystemTime) -> Option<SnippetResult> {
        self.finish(now)
    }

    fn finish(&mut self, now: SystemTime) -> Option<SnippetResult> {
        if self.result.is_some() {
            return None;
        }

        self.phase = Phase::Finished;
        let result = self.snapshot(self.elapsed_secs_at(now));
        self.result = Some(result.clone());
        Some(result)
    }

    /// Swap in the next snippet. Typed text is cleared; mistakes, phase and
    /// timing carry over.
    pub fn load_snippet(&mut self, target: &str) {
        if self.phase == Phase::Finished {
            return;
        }

        if !self.typed.is_empty() || !self.target.is_empty() {
            if self.is_snippet_complete() {
                self.snippets_completed += 1;
            }
            self.completed_correct += self.correct_chars();
            self.completed_total += self.typed.len();
        }

        self.target = target.chars().collect();
        self.typed.clear();
    }

    fn snapshot(&self, time_elapsed_secs: u64) -> SnippetResult {
        SnippetResult {
            correct_chars: self.completed_correct + self.correct_chars(),
            mistakes: self.mistakes,
            total_chars: self.completed_total + self.typed.len(),
            time_elapsed_secs,
            duration_secs: self.duration_secs,
            snippets_completed: self.snippets_completed,
            language: self.language,
        }
    }

    pub fn elapsed_secs_at(&self, now: SystemTime) -> u64 {
        self.started_at
            .map(|started| {
                now.duration_since(started)
                    .unwrap_or_default()
                    .as_secs()
            })
            .unwrap_or(0)
    }

    /// Index-wise correct characters of the snippet in progress
    pub fn correct_chars(&self) -> usize {
        self.typed
            .iter()
            .zip(self.target.iter())
            .filter(|(t, e)| t == e)
            .count()
    }

    pub fn char_states(&self) -> Vec<CharState> {
        self.target
            .iter()
            .enumerate()
            .map(|(idx, expected)| match self.typed.get(idx) {
                Some(c) if c == expected => CharState::Correct,
                Some(_) => CharState::Incorrect,
                None => CharState::Pending,
            })
            .collect()
    }

    /// Live wpm/accuracy for display while typing
    pub fn live_score(&self, now: SystemTime) -> (u32, u32) {
        let snapshot = self.snapshot(self.elapsed_secs_at(now));
        (
            metrics::wpm(snapshot.correct_chars, snapshot.time_elapsed_secs),
            metrics::accuracy(snapshot.correct_chars, snapshot.total_chars),
        )
    }

    pub fn is_snippet_complete(&self) -> bool {
        self.typed.len() == self.target.len()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn has_started(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn has_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    pub fn target(&self) -> &[char] {
        &self.target
    }

    pub fn target_text(&self) -> String {
        self.target.iter().collect()
    }

    pub fn typed_text(&self) -> String {
        self.typed.iter().collect()
    }

    pub fn typed_len(&self) -> usize {
        self.typed.len()
    }

    pub fn mistakes(&self) -> usize {
        self.mistakes
    }

    pub fn started_at(&self) -> Option<SystemTime> {
        self.started_at
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn duration_secs(&self) -> u64 {
        self.duration_secs
    }

    pub fn language(&self) -> CodeLanguage {
        self.language
    }

    pub fn result(&self) -> Option<&SnippetResult> {
        self.result.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn session(duration: u64, target: &str) -> Session {
        Session::new(duration, target, CodeLanguage::Rust).unwrap()
    }

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000 + secs)
    }

    #[test]
    fn new_session_is_idle() {
        let s = session(60, "fn main() {}");
        assert_eq!(s.phase(), Phase::Idle);
        assert_eq!(s.remaining_secs(), 60);
        assert_eq!(s.typed_text(), "");
        assert_eq!(s.mistakes(), 0);
        assert!(s.started_at().is_none());
        assert!(s.result().is_none());
    }

    #[test]
    fn zero_duration_is_rejected() {
        let err = Session::new(0, "abc", CodeLanguage::Go).unwrap_err();
        assert!(matches!(err, SessionError::InvalidConfiguration(_)));
    }

    #[test]
    fn first_keystroke_starts_the_clock() {
        let mut s = session(60, "abc");
        assert_eq!(s.apply_input_at("a", at(5)), InputOutcome::Accepted);
        assert_eq!(s.phase(), Phase::Active);
        assert_eq!(s.started_at(), Some(at(5)));

        // later keystrokes keep the original start
        s.apply_input_at("ab", at(7));
        assert_eq!(s.started_at(), Some(at(5)));
    }

    #[test]
    fn mismatched_append_counts_a_mistake() {
        let mut s = session(60, "abc");
        s.apply_input("a");
        s.apply_input("ab");
        let outcome = s.apply_input("abx");

        assert_eq!(outcome, InputOutcome::SnippetComplete);
        assert_eq!(s.mistakes(), 1);
        assert_eq!(s.correct_chars(), 2);
        assert_eq!(s.typed_len(), 3);
        assert_eq!(s.phase(), Phase::Active);
    }

    #[test]
    fn corrections_never_decrement_mistakes() {
        let mut s = session(60, "abcd");
        s.apply_input("x");
        assert_eq!(s.mistakes(), 1);

        // truncate and retype correctly
        s.apply_input("");
        assert_eq!(s.mistakes(), 1);
        s.apply_input("a");
        assert_eq!(s.mistakes(), 1);
        assert_eq!(s.correct_chars(), 1);
    }

    #[test]
    fn edit_of_earlier_position_does_not_count() {
        let mut s = session(60, "abcd");
        s.apply_input("ab");
        // same length, different content
        s.apply_input("xb");
        assert_eq!(s.mistakes(), 0);
        assert_eq!(s.correct_chars(), 1);
    }

    #[test]
    fn multi_char_append_only_checks_last_char() {
        let mut s = session(60, "abcd");
        s.apply_input("xyc");
        assert_eq!(s.mistakes(), 0);
        assert_eq!(s.phase(), Phase::Active);
    }

    #[test]
    fn input_longer_than_target_is_rejected() {
        let mut s = session(60, "ab");
        s.apply_input("a");
        assert_eq!(s.apply_input("abc"), InputOutcome::Rejected);
        assert_eq!(s.typed_text(), "a");
        assert_eq!(s.mistakes(), 0);
    }

    #[test]
    fn typed_never_exceeds_target() {
        let mut s = session(60, "hello");
        for input in ["h", "hx", "hxyzzz", "hello!", "hel", "hello", "helloo"] {
            s.apply_input(input);
            assert!(s.typed_len() <= s.target().len());
        }
    }

    #[test]
    fn mistakes_are_monotonic_over_appends() {
        let mut s = session(60, "abcdef");
        let mut last = 0;
        for input in ["x", "xb", "xbz", "xb", "xbq", "", "a", "ab"] {
            s.apply_input(input);
            assert!(s.mistakes() >= last);
            last = s.mistakes();
        }
        assert_eq!(s.mistakes(), 3);
    }

    #[test]
    fn snippet_complete_does_not_finish() {
        let mut s = session(60, "ab");
        s.apply_input("a");
        assert_eq!(s.apply_input("ab"), InputOutcome::SnippetComplete);
        assert!(!s.has_finished());
        assert!(s.result().is_none());
    }

    #[test]
    fn tick_counts_down() {
        let mut s = session(3, "abc");
        s.apply_input("a");
        assert!(s.tick().is_none());
        assert_eq!(s.remaining_secs(), 2);
        assert!(s.tick().is_none());
        assert_eq!(s.remaining_secs(), 1);
        assert!(s.tick().is_some());
        assert_eq!(s.remaining_secs(), 0);
        assert_eq!(s.phase(), Phase::Finished);
    }

    #[test]
    fn timeout_without_input_finishes_with_zero_elapsed() {
        let mut s = session(30, "abc");
        let mut emitted = Vec::new();
        for i in 0..30 {
            if let Some(r) = s.tick_at(at(i)) {
                emitted.push(r);
            }
        }
        assert_eq!(s.phase(), Phase::Finished);
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].time_elapsed_secs, 0);
        assert_eq!(s.remaining_secs(), 0);
    }

    #[test]
    fn late_ticks_never_emit_twice() {
        let mut s = session(2, "abc");
        s.apply_input("a");
        let emitted = (0..10).filter_map(|_| s.tick()).count();
        assert_eq!(emitted, 1);
        assert_eq!(s.remaining_secs(), 0);
    }

    #[test]
    fn timeout_result_uses_wall_clock() {
        let mut s = session(2, "abcdef");
        s.apply_input_at("a", at(0));
        s.apply_input_at("ab", at(1));
        assert!(s.tick_at(at(1)).is_none());
        let result = s.tick_at(at(2)).unwrap();
        assert_eq!(result.time_elapsed_secs, 2);
        assert_eq!(result.correct_chars, 2);
        assert_eq!(result.total_chars, 2);
        assert_eq!(result.duration_secs, 2);
        assert_eq!(result.language, CodeLanguage::Rust);
    }

    #[test]
    fn end_now_twice_emits_once() {
        let mut s = session(60, "abc");
        s.apply_input_at("a", at(0));
        let first = s.end_now_at(at(12));
        let second = s.end_now_at(at(13));
        assert_eq!(first.map(|r| r.time_elapsed_secs), Some(12));
        assert!(second.is_none());
    }

    #[test]
    fn end_now_from_idle_has_zero_elapsed() {
        let mut s = session(60, "abc");
        let result = s.end_now().unwrap();
        assert_eq!(result.time_elapsed_secs, 0);
        assert_eq!(result.total_chars, 0);
        assert_eq!(s.phase(), Phase::Finished);
    }

    #[test]
    fn end_now_after_timeout_is_noop() {
        let mut s = session(1, "abc");
        s.apply_input("a");
        assert!(s.tick().is_some());
        assert!(s.end_now().is_none());
    }

    #[test]
    fn finished_session_ignores_input_and_ticks() {
        let mut s = session(60, "abcdef");
        s.apply_input("ax");
        s.end_now();
        let mistakes = s.mistakes();
        let typed = s.typed_text();

        assert_eq!(s.apply_input("axz"), InputOutcome::Ignored);
        assert!(s.tick().is_none());
        assert_eq!(s.mistakes(), mistakes);
        assert_eq!(s.typed_text(), typed);
        assert_eq!(s.remaining_secs(), 60);
    }

    #[test]
    fn load_snippet_preserves_score_state() {
        let mut s = session(60, "ab");
        s.apply_input_at("a", at(0));
        s.apply_input_at("ax", at(1));
        assert!(s.is_snippet_complete());
        s.tick_at(at(1));

        s.load_snippet("cd");
        assert_eq!(s.typed_text(), "");
        assert_eq!(s.target_text(), "cd");
        assert_eq!(s.mistakes(), 1);
        assert_eq!(s.phase(), Phase::Active);
        assert_eq!(s.remaining_secs(), 59);
        assert_eq!(s.started_at(), Some(at(0)));
    }

    #[test]
    fn result_accumulates_completed_snippets() {
        let mut s = session(60, "ab");
        s.apply_input_at("a", at(0));
        s.apply_input_at("ax", at(1));
        s.load_snippet("cde");
        s.apply_input_at("c", at(2));

        let result = s.end_now_at(at(3)).unwrap();
        assert_eq!(result.correct_chars, 2);
        assert_eq!(result.total_chars, 3);
        assert_eq!(result.mistakes, 1);
        assert_eq!(result.snippets_completed, 1);
    }

    #[test]
    fn empty_target_is_already_complete() {
        let s = session(60, "");
        assert!(s.is_snippet_complete());
    }

    #[test]
    fn char_states_classify_each_position() {
        let mut s = session(60, "abc");
        s.apply_input("a");
        s.apply_input("ax");
        assert_eq!(
            s.char_states(),
            vec![CharState::Correct, CharState::Incorrect, CharState::Pending]
        );
    }

    #[test]
    fn live_score_before_start_is_neutral() {
        let s = session(60, "abc");
        assert_eq!(s.live_score(at(0)), (0, 100));
    }
}
