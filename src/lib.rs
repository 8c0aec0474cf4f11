// Library surface: the session core plus the runtime and storage pieces the
// terminal front end wires together. UI widgets stay in the binary.
pub mod app_dirs;
pub mod challenge;
pub mod config;
pub mod error;
pub mod metrics;
pub mod profile;
pub mod runtime;
pub mod session;
pub mod texts;
pub mod timer;
pub mod util;

pub use error::{ConfigError, ProfileError, SessionError};
pub use session::{EndReason, Mode, Phase, SessionEvent, SessionMachine, SessionResult};
