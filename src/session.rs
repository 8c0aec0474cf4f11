//! Typing session lifecycle.
//!
//! A [`SessionMachine`] owns everything one practice session needs: the
//! signed-in user, the target text and typed buffer, live metrics and, in
//! challenge mode, the scoring engine and its countdown. Every transition is
//! a method call that returns the events the presentation layer should
//! react to.

use serde::{Deserialize, Serialize};
use std::time::Instant;
use strum_macros::Display;

use crate::challenge::{ChallengeEngine, ChallengeState, Hud, Stroke};
use crate::config::ChallengeSettings;
use crate::error::{ProfileError, Result, SessionError};
use crate::metrics::{self, Metrics, Outcome};
use crate::profile::{Aggregator, UserProgress};
use crate::texts::TextSource;
use crate::timer::{IntervalTimer, Timer, TICK_INTERVAL};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Mode {
    Beginner,
    Challenge,
}

impl Mode {
    pub fn toggled(self) -> Self {
        match self {
            Mode::Beginner => Mode::Challenge,
            Mode::Challenge => Mode::Beginner,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Phase {
    Idle,
    Active,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum EndReason {
    #[strum(to_string = "text completed")]
    Completed,
    #[strum(to_string = "out of lives")]
    NoLivesLeft,
    #[strum(to_string = "time's up")]
    TimeUp,
}

/// Final numbers of a session, handed to the aggregator once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionResult {
    pub wpm: u32,
    pub accuracy: u8,
    pub errors: usize,
    pub challenge_score: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionState {
    pub mode: Mode,
    pub phase: Phase,
    pub started_at: Option<Instant>,
}

/// Output of a transition, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Render { typed: String, target: String },
    Metrics(Metrics),
    Hud(Hud),
    Cue { positive: bool },
    PhraseAdvanced { target: String },
    Ended { reason: EndReason, result: SessionResult },
}

pub struct SessionMachine<T: Timer = IntervalTimer> {
    state: SessionState,
    user: Option<String>,
    settings: ChallengeSettings,
    target: Option<String>,
    typed: String,
    metrics: Metrics,
    challenge: Option<ChallengeEngine>,
    last_result: Option<(EndReason, SessionResult)>,
    timer: T,
    texts: Box<dyn TextSource>,
    aggregator: Box<dyn Aggregator>,
}

impl<T: Timer> SessionMachine<T> {
    pub fn new(
        mode: Mode,
        timer: T,
        texts: Box<dyn TextSource>,
        aggregator: Box<dyn Aggregator>,
    ) -> Self {
        let mut machine = Self {
            state: SessionState {
                mode,
                phase: Phase::Idle,
                started_at: None,
            },
            user: None,
            settings: ChallengeSettings::default(),
            target: None,
            typed: String::new(),
            metrics: Metrics::default(),
            challenge: None,
            last_result: None,
            timer,
            texts,
            aggregator,
        };
        machine.reset(false);
        machine
    }

    pub fn with_settings(mut self, settings: ChallengeSettings) -> Self {
        self.set_challenge_settings(settings);
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn mode(&self) -> Mode {
        self.state.mode
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn is_active(&self) -> bool {
        self.state.phase == Phase::Active
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn settings(&self) -> ChallengeSettings {
        self.settings
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn typed(&self) -> &str {
        &self.typed
    }

    pub fn metrics(&self) -> Metrics {
        self.metrics
    }

    pub fn challenge(&self) -> Option<&ChallengeState> {
        self.challenge.as_ref().map(ChallengeEngine::state)
    }

    pub fn hud(&self) -> Option<Hud> {
        self.challenge.as_ref().map(ChallengeEngine::hud)
    }

    pub fn last_result(&self) -> Option<(EndReason, SessionResult)> {
        self.last_result
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }

    /// Target characters with the outcome of each typed position.
    pub fn highlight(&self) -> Vec<(char, Option<Outcome>)> {
        metrics::highlight(self.target.as_deref().unwrap_or_default(), &self.typed)
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.state
            .started_at
            .map_or(0, |started| started.elapsed().as_millis() as u64)
    }

    pub fn sign_in(&mut self, username: &str) -> Result<()> {
        let username = username.trim().to_lowercase();
        if username.is_empty() {
            return Err(SessionError::NotAuthenticated);
        }

        tracing::info!("signed in as {username}");
        self.user = Some(username);
        self.new_text();
        Ok(())
    }

    pub fn sign_out(&mut self) {
        self.timer.stop();
        if let Some(user) = self.user.take() {
            tracing::info!("{user} signed out");
        }
        self.reset(false);
    }

    /// Switch modes; always starts over with a text from the new pool.
    pub fn set_mode(&mut self, mode: Mode) {
        self.state.mode = mode;
        self.new_text();
    }

    pub fn set_challenge_settings(&mut self, settings: ChallengeSettings) {
        self.settings = settings;
        if !self.is_active() && self.state.mode == Mode::Challenge {
            self.challenge = Some(ChallengeEngine::new(&settings));
        }
    }

    /// Reset and load a fresh target.
    pub fn new_text(&mut self) {
        self.reset(false);
        self.target = Some(self.texts.next_text(self.state.mode));
    }

    pub fn start(&mut self) -> Result<Vec<SessionEvent>> {
        if self.user.is_none() {
            return Err(SessionError::NotAuthenticated);
        }
        match self.state.phase {
            Phase::Active => return Ok(Vec::new()),
            Phase::Ended => {
                return Err(SessionError::InvalidState {
                    operation: "start",
                    phase: Phase::Ended,
                })
            }
            Phase::Idle => {}
        }

        if self.target.is_none() {
            self.target = Some(self.texts.next_text(self.state.mode));
        }
        let target = self.target.clone().unwrap_or_default();

        self.state.phase = Phase::Active;
        self.state.started_at = Some(Instant::now());
        tracing::info!(mode = %self.state.mode, "session started");

        let mut events = vec![SessionEvent::Render {
            typed: self.typed.clone(),
            target,
        }];

        if self.state.mode == Mode::Challenge {
            let engine = ChallengeEngine::new(&self.settings);
            events.push(SessionEvent::Hud(engine.hud()));
            self.challenge = Some(engine);
            self.timer.start(TICK_INTERVAL);
        }

        Ok(events)
    }

    /// Feed the whole current input (not just the last key).
    pub fn on_input(&mut self, new_typed: &str) -> Result<Vec<SessionEvent>> {
        if !self.is_active() {
            return Err(SessionError::InvalidState {
                operation: "type",
                phase: self.state.phase,
            });
        }

        let target = self.target.clone().unwrap_or_default();
        self.typed = new_typed.to_string();
        self.metrics = metrics::compute(&target, &self.typed, self.elapsed_ms());

        let mut events = vec![
            SessionEvent::Render {
                typed: self.typed.clone(),
                target: target.clone(),
            },
            SessionEvent::Metrics(self.metrics),
        ];

        match self.state.mode {
            Mode::Beginner => {
                if self.typed == target {
                    events.extend(self.end(EndReason::Completed));
                }
            }
            Mode::Challenge => {
                let Some(engine) = self.challenge.as_mut() else {
                    return Ok(events);
                };

                let delta = engine.apply_delta(&self.typed, &target);
                events.extend(delta.strokes.iter().map(|stroke| SessionEvent::Cue {
                    positive: *stroke == Stroke::Hit,
                }));
                events.push(SessionEvent::Hud(engine.hud()));
                let out_of_lives = engine.is_out_of_lives();

                if delta.phrase_complete {
                    events.extend(self.advance_phrase());
                }
                if out_of_lives {
                    events.extend(self.end(EndReason::NoLivesLeft));
                }
            }
        }

        Ok(events)
    }

    fn advance_phrase(&mut self) -> Vec<SessionEvent> {
        let target = self.texts.next_text(Mode::Challenge);
        self.target = Some(target.clone());
        self.typed.clear();
        if let Some(engine) = self.challenge.as_mut() {
            engine.begin_phrase();
        }
        tracing::debug!("next phrase: {target:?}");

        vec![
            SessionEvent::PhraseAdvanced {
                target: target.clone(),
            },
            SessionEvent::Render {
                typed: String::new(),
                target,
            },
        ]
    }

    /// One second of challenge countdown. Ignored unless a challenge is
    /// running, so a tick that lands after a reset does nothing.
    pub fn on_tick(&mut self) -> Vec<SessionEvent> {
        if !self.is_active() || self.state.mode != Mode::Challenge {
            return Vec::new();
        }
        let Some(engine) = self.challenge.as_mut() else {
            return Vec::new();
        };

        let expired = engine.tick();
        tracing::debug!(remaining = engine.state().remaining_secs, "tick");
        let mut events = vec![SessionEvent::Hud(engine.hud())];
        if expired {
            events.extend(self.end(EndReason::TimeUp));
        }
        events
    }

    /// Apply every tick the timer has accumulated.
    pub fn poll_timer(&mut self) -> Vec<SessionEvent> {
        let due = self.timer.take_due_ticks();
        let mut events = Vec::new();
        for _ in 0..due {
            if !self.is_active() {
                break;
            }
            events.extend(self.on_tick());
        }
        events
    }

    pub fn end(&mut self, reason: EndReason) -> Vec<SessionEvent> {
        if !self.is_active() {
            return Vec::new();
        }
        self.timer.stop();

        let target = self.target.as_deref().unwrap_or_default();
        self.metrics = metrics::compute(target, &self.typed, self.elapsed_ms());
        let result = SessionResult {
            wpm: self.metrics.wpm,
            accuracy: self.metrics.accuracy,
            errors: self.metrics.errors,
            challenge_score: match self.state.mode {
                Mode::Challenge => Some(self.challenge().map_or(0, |c| c.score)),
                Mode::Beginner => None,
            },
        };
        self.state.phase = Phase::Ended;
        self.last_result = Some((reason, result));

        tracing::info!(
            %reason,
            wpm = result.wpm,
            accuracy = result.accuracy,
            errors = result.errors,
            score = ?result.challenge_score,
            "session ended"
        );

        if let Some(user) = self.user.as_deref() {
            if let Err(err) = self.aggregator.persist(user, &result) {
                tracing::warn!("could not save progress for {user}: {err}");
            }
        }

        vec![
            SessionEvent::Metrics(self.metrics),
            SessionEvent::Cue { positive: true },
            SessionEvent::Ended { reason, result },
        ]
    }

    pub fn reset(&mut self, keep_text: bool) {
        self.timer.stop();
        self.state.phase = Phase::Idle;
        self.state.started_at = None;
        self.typed.clear();
        self.metrics = Metrics::default();
        self.last_result = None;
        self.challenge = match self.state.mode {
            Mode::Challenge => Some(ChallengeEngine::new(&self.settings)),
            Mode::Beginner => None,
        };
        if !keep_text {
            self.target = None;
        }
    }

    /// Aggregate progress of the signed-in user.
    pub fn progress(&self) -> std::result::Result<Option<UserProgress>, ProfileError> {
        self.user
            .as_deref()
            .map(|user| self.aggregator.progress(user))
            .transpose()
    }

    pub fn reset_progress(&mut self) -> std::result::Result<Option<UserProgress>, ProfileError> {
        match self.user.as_deref() {
            Some(user) => {
                tracing::info!("progress reset for {user}");
                self.aggregator.reset(user).map(Some)
            }
            None => Ok(None),
        }
    }
}
