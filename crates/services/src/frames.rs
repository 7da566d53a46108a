//! Cooperative per-frame scheduling for readiness polling.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Yields until the next frame.
///
/// The watcher probes the widget once per frame; nothing else blocks.
#[async_trait]
pub trait FrameScheduler: Send + Sync {
    async fn next_frame(&self);
}

/// Real-time frames at a fixed cadence.
#[derive(Debug, Clone)]
pub struct IntervalFrames {
    period: Duration,
}

impl IntervalFrames {
    #[must_use]
    pub fn new(period: Duration) -> Self {
        Self { period }
    }
}

impl Default for IntervalFrames {
    fn default() -> Self {
        Self::new(Duration::from_millis(16))
    }
}

#[async_trait]
impl FrameScheduler for IntervalFrames {
    async fn next_frame(&self) {
        tokio::time::sleep(self.period).await;
    }
}

/// Virtual frames that only advance when told to.
///
/// Each `advance` grants frames; each `next_frame` consumes one, so frames granted
/// before a watcher starts waiting are not lost.
#[derive(Debug)]
pub struct ManualFrames {
    permits: Semaphore,
    delivered: AtomicU64,
}

impl Default for ManualFrames {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualFrames {
    #[must_use]
    pub fn new() -> Self {
        Self {
            permits: Semaphore::new(0),
            delivered: AtomicU64::new(0),
        }
    }

    /// Grant `frames` more frames.
    pub fn advance(&self, frames: usize) {
        self.permits.add_permits(frames);
    }

    /// Frames consumed so far.
    #[must_use]
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FrameScheduler for ManualFrames {
    async fn next_frame(&self) {
        // The semaphore is never closed, so acquire only fails if it were.
        if let Ok(permit) = self.permits.acquire().await {
            permit.forget();
            self.delivered.fetch_add(1, Ordering::SeqCst);
        } else {
            std::future::pending::<()>().await;
        }
    }
}
