use anyhow::{Result, anyhow};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn check_cancelled(&self, stage: &'static str) -> Result<()> {
        if self.is_cancelled() {
            return Err(anyhow!("operation cancelled at stage={stage}"));
        }
        Ok(())
    }
}

/// Holds the token of the one outstanding request; issuing a new one cancels
/// whatever was in flight.
#[derive(Debug, Default)]
pub struct LatestOnly {
    inflight: Option<CancellationToken>,
}

impl LatestOnly {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self) -> CancellationToken {
        if let Some(previous) = self.inflight.take() {
            previous.cancel();
        }
        let token = CancellationToken::new();
        self.inflight = Some(token.clone());
        token
    }

    pub fn cancel_all(&mut self) {
        if let Some(previous) = self.inflight.take() {
            previous.cancel();
        }
    }
}
