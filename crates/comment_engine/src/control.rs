use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use engine_logging::engine_info;
use tokio_util::sync::CancellationToken;

/// How often a paused worker re-checks the flags.
pub const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(300);

/// Shared pause/stop context passed to everything that can suspend.
///
/// Clones observe the same flags. Workers only read; the controller sets.
#[derive(Debug, Clone, Default)]
pub struct ControlSignal {
    inner: Arc<ControlInner>,
}

#[derive(Debug, Default)]
struct ControlInner {
    paused: AtomicBool,
    stop_requested: AtomicBool,
    stop: CancellationToken,
}

impl ControlSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        if !self.inner.paused.swap(true, Ordering::SeqCst) {
            engine_info!("Harvest paused; waiting for resume");
        }
    }

    pub fn resume(&self) {
        if self.inner.paused.swap(false, Ordering::SeqCst) {
            engine_info!("Harvest resumed");
        }
    }

    pub fn stop(&self) {
        if !self.inner.stop_requested.swap(true, Ordering::SeqCst) {
            engine_info!("Stop requested; finishing in-flight work");
        }
        self.inner.stop.cancel();
    }

    pub fn should_stop(&self) -> bool {
        self.inner.stop_requested.load(Ordering::SeqCst)
    }

    pub fn should_pause(&self) -> bool {
        self.inner.paused.load(Ordering::SeqCst)
    }

    /// Resolves once stop has been requested.
    pub async fn stopped(&self) {
        self.inner.stop.cancelled().await;
    }

    /// Returns when pause clears or stop is requested, whichever comes first.
    pub async fn wait_while_paused(&self) {
        while self.should_pause() && !self.should_stop() {
            tokio::select! {
                _ = tokio::time::sleep(PAUSE_POLL_INTERVAL) => {}
                _ = self.stopped() => return,
            }
        }
    }

    /// Sleeps `total` in steps of at most `step`, honouring pause and stop
    /// between steps. Time spent paused does not count towards `total`.
    ///
    /// Returns `false` if stop was observed before the full delay elapsed.
    pub async fn sleep_stepped(&self, total: Duration, step: Duration) -> bool {
        let step = step.max(Duration::from_millis(1));
        let mut remaining = total;
        while !remaining.is_zero() {
            self.wait_while_paused().await;
            if self.should_stop() {
                return false;
            }
            let chunk = remaining.min(step);
            tokio::select! {
                _ = tokio::time::sleep(chunk) => {}
                _ = self.stopped() => return false,
            }
            remaining -= chunk;
        }
        !self.should_stop()
    }
}
