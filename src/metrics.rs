use itertools::{EitherOrBoth, Itertools};
use serde::{Deserialize, Serialize};

/// Correctness of a single typed position.
#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub enum Outcome {
    Correct,
    Incorrect,
}

/// Live typing statistics for the current buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    pub wpm: u32,
    pub accuracy: u8,
    pub errors: usize,
}

impl Default for Metrics {
    /// Nothing typed yet counts as a perfect run.
    fn default() -> Self {
        Self {
            wpm: 0,
            accuracy: 100,
            errors: 0,
        }
    }
}

/// Compare every typed position against the target. Positions typed past the
/// end of the target have nothing to match and count as incorrect.
pub fn outcomes<'a>(target: &'a str, typed: &'a str) -> impl Iterator<Item = Outcome> + 'a {
    typed
        .chars()
        .zip_longest(target.chars())
        .filter_map(|pair| match pair {
            EitherOrBoth::Both(got, expected) if got == expected => Some(Outcome::Correct),
            EitherOrBoth::Both(_, _) | EitherOrBoth::Left(_) => Some(Outcome::Incorrect),
            EitherOrBoth::Right(_) => None,
        })
}

pub fn compute(target: &str, typed: &str, elapsed_ms: u64) -> Metrics {
    let (correct, errors) = outcomes(target, typed).fold((0usize, 0usize), |(ok, bad), o| {
        match o {
            Outcome::Correct => (ok + 1, bad),
            Outcome::Incorrect => (ok, bad + 1),
        }
    });

    let typed_len = correct + errors;
    let accuracy = if typed_len == 0 {
        100
    } else {
        ((correct as f64 / typed_len as f64) * 100.0).round() as u8
    };

    Metrics {
        wpm: words_per_minute(typed, elapsed_ms),
        accuracy,
        errors,
    }
}

pub fn words_per_minute(typed: &str, elapsed_ms: u64) -> u32 {
    let words = typed.split_whitespace().count();
    if elapsed_ms == 0 || words == 0 {
        return 0;
    }

    let elapsed_min = elapsed_ms as f64 / 60_000.0;
    (words as f64 / elapsed_min).round() as u32
}

/// Per-character view of the target for highlighting: typed positions carry
/// their outcome, the rest are pending.
pub fn highlight(target: &str, typed: &str) -> Vec<(char, Option<Outcome>)> {
    let mut typed_chars = typed.chars();
    target
        .chars()
        .map(|expected| {
            let outcome = typed_chars.next().map(|got| {
                if got == expected {
                    Outcome::Correct
                } else {
                    Outcome::Incorrect
                }
            });
            (expected, outcome)
        })
        .collect()
}
