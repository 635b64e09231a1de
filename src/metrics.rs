use serde::Serialize;

use crate::session::SnippetResult;

/// Characters that make up one "word" for wpm normalisation
pub const CHARS_PER_WORD: f64 = 5.0;

/// Words per minute from correct characters.
///
/// An elapsed time of zero yields 0 rather than an infinite rate: a session
/// ended before its first keystroke has typed nothing.
pub fn wpm(correct_chars: usize, elapsed_secs: u64) -> u32 {
    if elapsed_secs == 0 {
        return 0;
    }
    let words = correct_chars as f64 / CHARS_PER_WORD;
    let minutes = elapsed_secs as f64 / 60.0;
    (words / minutes).round() as u32
}

/// Percentage of typed characters that are correct, 100 when nothing was typed.
pub fn accuracy(correct_chars: usize, total_typed: usize) -> u32 {
    if total_typed == 0 {
        return 100;
    }
    let ratio = correct_chars.min(total_typed) as f64 / total_typed as f64;
    (ratio * 100.0).round() as u32
}

/// Count of positions where `typed` matches `target`, over the typed prefix.
pub fn correct_chars(typed: &str, target: &str) -> usize {
    typed
        .chars()
        .zip(target.chars())
        .filter(|(t, e)| t == e)
        .count()
}

/// Experience awarded for a finished session
pub fn xp_delta(wpm: u32, accuracy: u32) -> u32 {
    (wpm as f64 * (accuracy as f64 / 100.0)).round() as u32
}

/// Static feedback line for a finished session.
pub fn feedback(mistakes: usize, wpm: u32, accuracy: u32) -> &'static str {
    if accuracy >= 98 && wpm > 60 {
        "Outstanding! You're coding at the speed of thought."
    } else if accuracy >= 95 {
        "Great accuracy! Speed will come naturally."
    } else if wpm > 80 && accuracy < 90 {
        "Fast, but focus on precision."
    } else if mistakes > 10 {
        "Too many bugs in this run! Slow down."
    } else {
        "Good effort. Keep practicing!"
    }
}

/// Derived scores of a finished session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Score {
    pub wpm: u32,
    pub accuracy: u32,
    pub xp: u32,
}

impl Score {
    pub fn from_result(result: &SnippetResult) -> Self {
        let wpm = wpm(result.correct_chars, result.time_elapsed_secs);
        let accuracy = accuracy(result.correct_chars, result.total_chars);
        Self {
            wpm,
            accuracy,
            xp: xp_delta(wpm, accuracy),
        }
    }
}
