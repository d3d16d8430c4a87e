//! Time utilities for game simulation

use std::time::{Duration, Instant};

/// Default simulation period in milliseconds
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 16;

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Measures wall-clock time between ticks
#[derive(Debug, Clone, Default)]
pub struct TickClock {
    previous: Option<Instant>,
}

impl TickClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a tick at `now` and return the milliseconds since the previous
    /// one. The first sample only starts the clock and returns None.
    pub fn sample(&mut self, now: Instant) -> Option<f64> {
        let previous = self.previous.replace(now)?;
        Some(duration_millis(now.saturating_duration_since(previous)))
    }
}

fn duration_millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
