//! Time utilities for the tick scheduler

use std::time::{Duration, Instant};

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

/// Reference simulation rate
pub const DEFAULT_TICK_RATE_HZ: u32 = 60;

/// Upper bound accepted from configuration
pub const MAX_TICK_RATE_HZ: u32 = 240;

/// Wall-clock length of one tick at the given rate
pub fn tick_duration(tick_rate_hz: u32) -> Duration {
    Duration::from_micros(1_000_000 / tick_rate_hz.max(1) as u64)
}

/// A simple timer for measuring durations
#[derive(Debug, Clone)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
