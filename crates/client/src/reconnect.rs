//! Retry schedule for a dropped relay socket.
//!
//! A [`Backoff`] hands out waits that double (by default) from
//! `initial_delay` up to `max_delay`. [`reestablish`] sleeps the next wait,
//! dials the relay again, and repeats until it gets a socket or its
//! [`CancellationToken`] fires.

use std::time::Duration;

use pagelock_core::DocumentId;
use tokio_util::sync::CancellationToken;

use crate::client::{RelayClient, RelayConnection};

#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    pub initial_delay: Duration,
    /// Ceiling for any single wait.
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(15),
            multiplier: 2.0,
        }
    }
}

/// Wait schedule for one outage. Start a fresh one per dropped socket.
#[derive(Debug)]
pub struct Backoff<'a> {
    config: &'a ReconnectConfig,
    upcoming: Duration,
    attempts: u32,
}

impl<'a> Backoff<'a> {
    pub fn new(config: &'a ReconnectConfig) -> Self {
        Self {
            config,
            upcoming: config.initial_delay.min(config.max_delay),
            attempts: 0,
        }
    }

    /// The wait before the next dial. Advances the schedule.
    pub fn next_wait(&mut self) -> Duration {
        let wait = self.upcoming;
        self.upcoming = wait.mul_f64(self.config.multiplier).min(self.config.max_delay);
        self.attempts += 1;
        wait
    }

    /// Dials started so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// Dial the relay for `document_id` until it answers.
///
/// `None` means `cancel` fired first. The first dial happens only after one
/// wait, since the socket has just dropped.
pub async fn reestablish(
    client: &RelayClient,
    document_id: &DocumentId,
    config: &ReconnectConfig,
    cancel: &CancellationToken,
) -> Option<RelayConnection> {
    let mut backoff = Backoff::new(config);

    loop {
        let wait = backoff.next_wait();
        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(wait) => {}
        }

        let attempt = backoff.attempts();
        tracing::debug!(
            document_id = %document_id,
            attempt,
            waited_ms = wait.as_millis() as u64,
            "Dialing lock relay",
        );

        let result = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(document_id = %document_id, attempt, "Relay redial abandoned");
                return None;
            }
            result = client.connect(document_id) => result,
        };

        match result {
            Ok(conn) => {
                tracing::info!(document_id = %document_id, attempt, "Relay socket restored");
                return Some(conn);
            }
            Err(e) => {
                tracing::warn!(document_id = %document_id, attempt, error = %e, "Relay still unreachable");
            }
        }
    }
}
