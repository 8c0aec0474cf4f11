//! Scoring for challenge mode.
//!
//! Only growth of the typed buffer is scored. Each phrase keeps a watermark
//! of how far it has been consumed; deleting characters never moves it back,
//! so a mistake cannot be erased and retyped for points or lives.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::ChallengeSettings;

pub const POINTS_PER_HIT: u32 = 10;
pub const MISS_PENALTY: u32 = 5;
/// Consecutive hits needed for each +0.1 step of the multiplier.
pub const COMBO_TIER: u32 = 10;

/// Score multiplier, kept in tenths so it is always exact: 10 is x1.0 and
/// 20 (the cap) is x2.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Multiplier(u8);

impl Multiplier {
    pub const BASE: Multiplier = Multiplier(10);
    pub const MAX: Multiplier = Multiplier(20);

    pub fn for_combo(combo: u32) -> Self {
        let steps = (combo / COMBO_TIER).min(10) as u8;
        Multiplier(Self::BASE.0 + steps)
    }

    pub fn tenths(self) -> u32 {
        self.0 as u32
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 10.0
    }

    /// Points earned by one correct character at this multiplier,
    /// i.e. `round(10 * multiplier)`.
    pub fn points(self) -> u32 {
        POINTS_PER_HIT * self.tenths() / 10
    }
}

impl Default for Multiplier {
    fn default() -> Self {
        Self::BASE
    }
}

impl fmt::Display for Multiplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}.{}", self.0 / 10, self.0 % 10)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stroke {
    Hit,
    Miss,
}

/// Snapshot shown in the challenge heads-up display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hud {
    pub remaining_secs: u32,
    pub lives: u32,
    pub score: u32,
    pub combo: u32,
    pub multiplier: Multiplier,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeState {
    pub remaining_secs: u32,
    pub lives: u32,
    pub score: u32,
    pub combo: u32,
    pub multiplier: Multiplier,
    pub last_consumed_len: usize,
}

impl ChallengeState {
    pub fn new(settings: &ChallengeSettings) -> Self {
        Self {
            remaining_secs: settings.duration_secs,
            lives: settings.lives,
            score: 0,
            combo: 0,
            multiplier: Multiplier::BASE,
            last_consumed_len: 0,
        }
    }

    pub fn hud(&self) -> Hud {
        Hud {
            remaining_secs: self.remaining_secs,
            lives: self.lives,
            score: self.score,
            combo: self.combo,
            multiplier: self.multiplier,
        }
    }

    fn hit(&mut self) {
        self.combo += 1;
        self.multiplier = Multiplier::for_combo(self.combo);
        self.score += self.multiplier.points();
    }

    fn miss(&mut self) {
        self.lives = self.lives.saturating_sub(1);
        self.score = self.score.saturating_sub(MISS_PENALTY);
        self.combo = 0;
        self.multiplier = Multiplier::BASE;
    }
}

/// Result of scoring one input event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    pub strokes: Vec<Stroke>,
    /// The buffer reached the end of the target; the caller must load the
    /// next phrase and call [`ChallengeEngine::begin_phrase`].
    pub phrase_complete: bool,
}

#[derive(Debug, Clone)]
pub struct ChallengeEngine {
    state: ChallengeState,
}

impl ChallengeEngine {
    pub fn new(settings: &ChallengeSettings) -> Self {
        Self {
            state: ChallengeState::new(settings),
        }
    }

    pub fn state(&self) -> &ChallengeState {
        &self.state
    }

    pub fn hud(&self) -> Hud {
        self.state.hud()
    }

    pub fn is_out_of_lives(&self) -> bool {
        self.state.lives == 0
    }

    /// Score the characters appended since the watermark.
    pub fn apply_delta(&mut self, new_typed: &str, target: &str) -> Delta {
        let typed_len = new_typed.chars().count();
        let prev_len = self.state.last_consumed_len;
        if typed_len <= prev_len {
            return Delta::default();
        }

        let mut expected = target.chars().skip(prev_len);
        let strokes = new_typed
            .chars()
            .skip(prev_len)
            .map(|got| {
                if expected.next() == Some(got) {
                    self.state.hit();
                    Stroke::Hit
                } else {
                    self.state.miss();
                    Stroke::Miss
                }
            })
            .collect();

        self.state.last_consumed_len = typed_len;

        Delta {
            strokes,
            phrase_complete: typed_len >= target.chars().count(),
        }
    }

    /// Start scoring a fresh phrase. Score, lives and combo carry over.
    pub fn begin_phrase(&mut self) {
        self.state.last_consumed_len = 0;
    }

    /// Count down one second. Returns true when the clock has run out.
    pub fn tick(&mut self) -> bool {
        self.state.remaining_secs = self.state.remaining_secs.saturating_sub(1);
        self.state.remaining_secs == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(lives: u32) -> ChallengeEngine {
        ChallengeEngine::new(&ChallengeSettings {
            duration_secs: 60,
            lives,
        })
    }

    #[test]
    fn test_multiplier_curve() {
        assert_eq!(Multiplier::for_combo(0), Multiplier::BASE);
        assert_eq!(Multiplier::for_combo(9).as_f64(), 1.0);
        assert_eq!(Multiplier::for_combo(10).as_f64(), 1.1);
        assert_eq!(Multiplier::for_combo(35).as_f64(), 1.3);
        assert_eq!(Multiplier::for_combo(100), Multiplier::MAX);
        assert_eq!(Multiplier::for_combo(150), Multiplier::MAX);
    }

    #[test]
    fn test_multiplier_points_and_display() {
        assert_eq!(Multiplier::BASE.points(), 10);
        assert_eq!(Multiplier::for_combo(10).points(), 11);
        assert_eq!(Multiplier::MAX.points(), 20);
        assert_eq!(Multiplier::for_combo(20).to_string(), "x1.2");
        assert_eq!(Multiplier::MAX.to_string(), "x2.0");
    }

    #[test]
    fn test_hits_build_combo_and_score() {
        let mut e = engine(3);
        let delta = e.apply_delta("abc", "abcdef");

        assert_eq!(delta.strokes, vec![Stroke::Hit; 3]);
        assert!(!delta.phrase_complete);
        assert_eq!(e.state().combo, 3);
        assert_eq!(e.state().score, 30);
        assert_eq!(e.state().last_consumed_len, 3);
    }

    #[test]
    fn test_tenth_hit_uses_raised_multiplier() {
        let mut e = engine(3);
        let target = "a".repeat(20);
        e.apply_delta(&"a".repeat(10), &target);

        // nine hits at x1.0 and the tenth at x1.1
        assert_eq!(e.state().score, 9 * 10 + 11);
        assert_eq!(e.state().multiplier.as_f64(), 1.1);
    }

    #[test]
    fn test_miss_resets_combo_and_costs_life() {
        let mut e = engine(3);
        e.apply_delta("ab", "abcd");
        let delta = e.apply_delta("abx", "abcd");

        assert_eq!(delta.strokes, vec![Stroke::Miss]);
        assert_eq!(e.state().lives, 2);
        assert_eq!(e.state().score, 15);
        assert_eq!(e.state().combo, 0);
        assert_eq!(e.state().multiplier, Multiplier::BASE);
    }

    #[test]
    fn test_score_never_negative() {
        let mut e = engine(3);
        e.apply_delta("x", "abc");

        assert_eq!(e.state().score, 0);
    }

    #[test]
    fn test_lives_never_negative() {
        let mut e = engine(1);
        e.apply_delta("x", "abc");
        assert_eq!(e.state().lives, 0);
        assert!(e.is_out_of_lives());

        e.apply_delta("xy", "abc");
        assert_eq!(e.state().lives, 0);
    }

    #[test]
    fn test_backspace_does_not_rescore() {
        let mut e = engine(3);
        e.apply_delta("ax", "abcd");
        let before = e.state().clone();

        // delete the mistake: nothing scored, watermark kept
        let delta = e.apply_delta("a", "abcd");
        assert!(delta.strokes.is_empty());
        assert_eq!(e.state(), &before);

        // retype the fixed character: index 1 was already consumed
        let delta = e.apply_delta("ab", "abcd");
        assert!(delta.strokes.is_empty());
        assert_eq!(e.state().lives, 2);
        assert_eq!(e.state().score, before.score);
        assert_eq!(e.state().last_consumed_len, 2);
    }

    #[test]
    fn test_scoring_resumes_past_watermark() {
        let mut e = engine(3);
        e.apply_delta("abc", "abcdef");
        e.apply_delta("a", "abcdef");

        let delta = e.apply_delta("abcd", "abcdef");
        assert_eq!(delta.strokes, vec![Stroke::Hit]);
        assert_eq!(e.state().last_consumed_len, 4);
    }

    #[test]
    fn test_paste_scores_every_new_char() {
        let mut e = engine(5);
        let delta = e.apply_delta("abXd", "abcd");

        assert_eq!(
            delta.strokes,
            vec![Stroke::Hit, Stroke::Hit, Stroke::Miss, Stroke::Hit]
        );
        assert!(delta.phrase_complete);
    }

    #[test]
    fn test_phrase_complete_keeps_totals() {
        let mut e = engine(3);
        let delta = e.apply_delta("hi", "hi");
        assert!(delta.phrase_complete);

        let score = e.state().score;
        e.begin_phrase();

        assert_eq!(e.state().last_consumed_len, 0);
        assert_eq!(e.state().score, score);
        assert_eq!(e.state().combo, 2);
        assert_eq!(e.state().lives, 3);
    }

    #[test]
    fn test_typing_past_target_is_a_miss() {
        let mut e = engine(3);
        e.apply_delta("ab", "abc");
        let delta = e.apply_delta("abcd", "abc");

        assert_eq!(delta.strokes, vec![Stroke::Hit, Stroke::Miss]);
        assert!(delta.phrase_complete);
    }

    #[test]
    fn test_tick_floors_at_zero() {
        let mut e = ChallengeEngine::new(&ChallengeSettings {
            duration_secs: 2,
            lives: 3,
        });

        assert!(!e.tick());
        assert!(e.tick());
        assert!(e.tick());
        assert_eq!(e.state().remaining_secs, 0);
    }
}
