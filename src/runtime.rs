use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyEvent, KeyEventKind};

/// Redraw cadence while nothing else is happening.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(100);

/// Unified event type consumed by the app loop
#[derive(Clone, Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Resize,
    /// Nothing arrived before the wait ran out; time to poll timers/redraw.
    Tick,
    /// The source is gone and no further input will ever arrive.
    Disconnected,
}

/// Source of terminal events (keyboard, resize, etc.)
pub trait EventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError>;
}

/// Production event source: a reader thread forwarding crossterm events.
pub struct CrosstermEventSource {
    rx: Receiver<AppEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            let forwarded = match event::read() {
                // windows reports releases too
                Ok(CtEvent::Key(key)) if key.kind != KeyEventKind::Release => {
                    tx.send(AppEvent::Key(key))
                }
                Ok(CtEvent::Resize(_, _)) => tx.send(AppEvent::Resize),
                Ok(_) => Ok(()),
                Err(err) => {
                    tracing::warn!("terminal event reader stopped: {err}");
                    break;
                }
            };
            if forwarded.is_err() {
                break;
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Event source fed through a channel, for tests and headless drivers
pub struct ChannelEventSource {
    rx: Receiver<AppEvent>,
}

impl ChannelEventSource {
    pub fn new(rx: Receiver<AppEvent>) -> Self {
        Self { rx }
    }
}

impl EventSource for ChannelEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<AppEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Advances the application one event at a time
pub struct Runner<E: EventSource> {
    event_source: E,
    frame_interval: Duration,
}

impl<E: EventSource> Runner<E> {
    pub fn new(event_source: E, frame_interval: Duration) -> Self {
        Self {
            event_source,
            frame_interval,
        }
    }

    /// Wait for the next event, but never past the frame interval or the
    /// given timer deadline, whichever is sooner. Returns `Tick` on timeout
    /// and `Disconnected` once the source has hung up.
    pub fn step(&self, timer_deadline: Option<Duration>) -> AppEvent {
        let wait = timer_deadline.map_or(self.frame_interval, |d| d.min(self.frame_interval));
        match self.event_source.recv_timeout(wait) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) => AppEvent::Tick,
            Err(RecvTimeoutError::Disconnected) => AppEvent::Disconnected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Instant;

    #[test]
    fn step_returns_tick_on_timeout() {
        let (_tx, rx) = mpsc::channel();
        let runner = Runner::new(ChannelEventSource::new(rx), Duration::from_millis(1));

        match runner.step(None) {
            AppEvent::Tick => {}
            other => panic!("expected Tick on timeout, got {other:?}"),
        }
    }

    #[test]
    fn step_passes_through_events() {
        let (tx, rx) = mpsc::channel();
        tx.send(AppEvent::Resize).unwrap();
        let runner = Runner::new(ChannelEventSource::new(rx), Duration::from_millis(10));

        match runner.step(None) {
            AppEvent::Resize => {}
            other => panic!("expected Resize event, got {other:?}"),
        }
    }

    #[test]
    fn step_waits_no_longer_than_timer_deadline() {
        let (_tx, rx) = mpsc::channel();
        let runner = Runner::new(ChannelEventSource::new(rx), Duration::from_secs(5));

        let started = Instant::now();
        assert!(matches!(
            runner.step(Some(Duration::from_millis(5))),
            AppEvent::Tick
        ));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn step_reports_disconnected_source() {
        let (tx, rx) = mpsc::channel::<AppEvent>();
        drop(tx);
        let runner = Runner::new(ChannelEventSource::new(rx), Duration::from_secs(5));

        let started = Instant::now();
        assert!(matches!(runner.step(None), AppEvent::Disconnected));
        assert!(matches!(runner.step(None), AppEvent::Disconnected));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn step_drains_queued_events_before_disconnect() {
        let (tx, rx) = mpsc::channel();
        tx.send(AppEvent::Resize).unwrap();
        drop(tx);
        let runner = Runner::new(ChannelEventSource::new(rx), Duration::from_millis(10));

        assert!(matches!(runner.step(None), AppEvent::Resize));
        assert!(matches!(runner.step(None), AppEvent::Disconnected));
    }
}
