use include_dir::{include_dir, Dir};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Deserialize;
use std::collections::VecDeque;

use crate::session::Mode;

static POOL_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/pools");

/// Supplies the next target text for a mode.
pub trait TextSource {
    fn next_text(&mut self, mode: Mode) -> String;
}

#[derive(Deserialize, Clone, Debug)]
pub struct TextPool {
    pub mode: Mode,
    pub texts: Vec<String>,
}

impl TextPool {
    /// Load one of the pools embedded at build time.
    pub fn embedded(mode: Mode) -> Self {
        let file_name = format!("{mode}.json");
        let file = POOL_DIR
            .get_file(&file_name)
            .expect("text pool not embedded");
        let contents = file
            .contents_utf8()
            .expect("text pool is not valid utf-8");
        serde_json::from_str(contents).expect("unable to deserialize text pool")
    }
}

/// Picks uniformly at random from the embedded pools.
pub struct PoolTextSource {
    beginner: Vec<String>,
    challenge: Vec<String>,
    rng: StdRng,
}

impl PoolTextSource {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            beginner: TextPool::embedded(Mode::Beginner).texts,
            challenge: TextPool::embedded(Mode::Challenge).texts,
            rng,
        }
    }

    /// Replace the beginner drills with a single custom text. A blank text
    /// leaves the embedded drills in place.
    pub fn with_beginner_text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        if text.trim().is_empty() {
            tracing::warn!("ignoring blank custom text");
        } else {
            self.beginner = vec![text];
        }
        self
    }

    pub fn pool(&self, mode: Mode) -> &[String] {
        match mode {
            Mode::Beginner => &self.beginner,
            Mode::Challenge => &self.challenge,
        }
    }
}

impl Default for PoolTextSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TextSource for PoolTextSource {
    fn next_text(&mut self, mode: Mode) -> String {
        let pool = match mode {
            Mode::Beginner => &self.beginner,
            Mode::Challenge => &self.challenge,
        };
        pool.choose(&mut self.rng).cloned().unwrap_or_default()
    }
}

/// Hands out fixed texts in order, cycling, regardless of mode.
#[derive(Debug, Clone)]
pub struct ScriptedTextSource {
    texts: VecDeque<String>,
}

impl ScriptedTextSource {
    pub fn new<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            texts: texts.into_iter().map(Into::into).collect(),
        }
    }
}

impl TextSource for ScriptedTextSource {
    fn next_text(&mut self, _mode: Mode) -> String {
        match self.texts.pop_front() {
            Some(text) => {
                self.texts.push_back(text.clone());
                text
            }
            None => String::new(),
        }
    }
}
