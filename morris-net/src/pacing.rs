//! Computer thinking delay
//!
//! The computer waits a short, jittered moment before its move is applied.
//! The wait can be cancelled by a reset or a disconnect.

use morris_core::AiConfig;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Shared cancellation flag; all clones observe the same cancel
#[derive(Clone, Debug)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the token is cancelled
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ThinkingDelay {
    base: Duration,
    jitter: Duration,
    rng: ChaCha8Rng,
}

impl ThinkingDelay {
    pub fn new(base: Duration, jitter: Duration, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self { base, jitter, rng }
    }

    pub fn from_config(config: &AiConfig) -> Self {
        Self::new(
            Duration::from_millis(config.thinking_delay_ms),
            Duration::from_millis(config.thinking_jitter_ms),
            config.seed,
        )
    }

    /// No delay at all (tests and computer-vs-computer matches)
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO, Some(0))
    }

    /// Next delay: base plus a uniform share of the jitter
    pub fn next_duration(&mut self) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let extra = if jitter_ms == 0 {
            0
        } else {
            self.rng.gen_range(0..jitter_ms)
        };
        self.base + Duration::from_millis(extra)
    }

    /// Sleep for one thinking delay. Returns false if cancelled first.
    pub async fn wait(&mut self, token: &CancelToken) -> bool {
        if token.is_cancelled() {
            return false;
        }
        let delay = self.next_duration();
        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = token.cancelled() => false,
        }
    }
}
