//! Connection supervision: lifecycle state plus capped exponential
//! reconnection backoff.
//!
//! Exhausted reconnection attempts are a terminal state change, not an
//! error — the user must manually retry.

use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use causerie_shared::constants::{
    MAX_RECONNECT_ATTEMPTS, RECONNECT_BASE_DELAY_MS, RECONNECT_MAX_DELAY_MS,
};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionPhase {
    Disconnected,
    Connecting,
    Reconnecting,
    Connected,
}

/// Snapshot handed to the presentation layer.  Transient, process-lifetime
/// only.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionState {
    pub connected: bool,
    pub is_host: bool,
    pub reconnect_attempts: u32,
    pub phase: ConnectionPhase,
}

/// Backoff delay for a given attempt number (1-based):
/// `min(base * 2^attempt, ceiling)`.
pub fn reconnect_delay(attempt: u32) -> Duration {
    let doubled = RECONNECT_BASE_DELAY_MS.saturating_mul(1u64 << attempt.min(32));
    Duration::from_millis(doubled.min(RECONNECT_MAX_DELAY_MS))
}

pub struct ConnectionSupervisor {
    phase: ConnectionPhase,
    is_host: bool,
    attempts: u32,
    timer: Option<JoinHandle<()>>,
}

impl ConnectionSupervisor {
    pub fn new() -> Self {
        Self {
            phase: ConnectionPhase::Disconnected,
            is_host: false,
            attempts: 0,
            timer: None,
        }
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    pub fn set_is_host(&mut self, is_host: bool) {
        self.is_host = is_host;
    }

    /// Mark a connection attempt in flight.
    pub fn set_connecting(&mut self) {
        self.phase = ConnectionPhase::Connecting;
    }

    /// Terminal success transition: resets the attempt counter and cancels
    /// any pending reconnect timer.
    pub fn set_connected(&mut self, connected: bool) {
        if connected {
            self.phase = ConnectionPhase::Connected;
            self.attempts = 0;
            self.cancel_timer();
        } else {
            self.phase = ConnectionPhase::Disconnected;
        }
    }

    /// Schedule `retry` after the backoff delay for the next attempt.
    ///
    /// Returns the scheduled delay, or `None` once the attempt budget is
    /// exhausted (no retry is scheduled, the caller must surface the
    /// terminal state).  Must be called from within a tokio runtime.
    pub fn attempt_reconnect<F>(&mut self, retry: F) -> Option<Duration>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.attempts >= MAX_RECONNECT_ATTEMPTS {
            warn!(
                attempts = self.attempts,
                "maximum reconnection attempts reached"
            );
            return None;
        }

        self.attempts += 1;
        self.phase = ConnectionPhase::Reconnecting;
        let delay = reconnect_delay(self.attempts);

        info!(
            attempt = self.attempts,
            max = MAX_RECONNECT_ATTEMPTS,
            delay_ms = delay.as_millis() as u64,
            "scheduling reconnection attempt"
        );

        self.cancel_timer();
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            retry();
        }));

        Some(delay)
    }

    /// Zero the counter and cancel any pending timer.  Called whenever the
    /// supervisor learns connectivity is healthy through any channel.
    pub fn reset_reconnect_attempts(&mut self) {
        self.attempts = 0;
        self.cancel_timer();
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.attempts
    }

    pub fn snapshot(&self) -> ConnectionState {
        ConnectionState {
            connected: self.phase == ConnectionPhase::Connected,
            is_host: self.is_host,
            reconnect_attempts: self.attempts,
            phase: self.phase,
        }
    }
}

impl Default for ConnectionSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConnectionSupervisor {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}
