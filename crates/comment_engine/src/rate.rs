use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use engine_logging::engine_info;
use tokio::time::Instant;

/// Request pacing shared by every worker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateSettings {
    pub requests_per_minute: u32,
    /// Lower bound of the randomized pause between two pages of one content id.
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RateSettings {
    fn default() -> Self {
        Self {
            requests_per_minute: 12,
            min_delay: Duration::from_secs(3),
            max_delay: Duration::from_secs(6),
        }
    }
}

impl RateSettings {
    /// Minimum spacing between two requests, `60s / rpm`.
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(60.0 / f64::from(self.requests_per_minute.max(1)))
    }

    /// rpm at least 1, delays ordered.
    pub fn clamped(self) -> Self {
        let min_delay = self.min_delay;
        Self {
            requests_per_minute: self.requests_per_minute.max(1),
            min_delay,
            max_delay: self.max_delay.max(min_delay),
        }
    }
}

/// Partial reconfiguration; `None` keeps the current value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RateUpdate {
    pub requests_per_minute: Option<u32>,
    pub min_delay_secs: Option<f64>,
    pub max_delay_secs: Option<f64>,
}

#[derive(Debug)]
struct LimiterState {
    settings: RateSettings,
    next_allowed: Option<Instant>,
}

/// Process-wide request gate.
///
/// Consecutive slots handed out by [`RateLimiter::reserve`] are at least one
/// interval apart regardless of how many workers call it. Time comes from
/// `tokio::time`, so a paused test runtime drives it deterministically.
#[derive(Debug)]
pub struct RateLimiter {
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(settings: RateSettings) -> Self {
        Self {
            state: Mutex::new(LimiterState {
                settings: settings.clamped(),
                next_allowed: None,
            }),
        }
    }

    pub fn settings(&self) -> RateSettings {
        self.lock().settings
    }

    /// Applies a runtime change. Out-of-range values are clamped, never rejected.
    pub fn configure(&self, update: RateUpdate) -> RateSettings {
        let mut state = self.lock();
        let mut settings = state.settings;
        if let Some(rpm) = update.requests_per_minute {
            settings.requests_per_minute = rpm;
        }
        if let Some(secs) = update.min_delay_secs.and_then(delay_from_secs) {
            settings.min_delay = secs;
        }
        if let Some(secs) = update.max_delay_secs.and_then(delay_from_secs) {
            settings.max_delay = secs;
        }
        state.settings = settings.clamped();
        let applied = state.settings;
        drop(state);

        engine_info!(
            "Rate reconfigured: rpm={} delay={:.1}s..{:.1}s",
            applied.requests_per_minute,
            applied.min_delay.as_secs_f64(),
            applied.max_delay.as_secs_f64()
        );
        applied
    }

    /// Claims the next free slot as seen from `now` and returns the instant at
    /// which the caller may issue its request.
    pub fn reserve(&self, now: Instant) -> Instant {
        let mut state = self.lock();
        let interval = state.settings.interval();
        let slot = match state.next_allowed {
            Some(next) if next > now => next,
            _ => now,
        };
        state.next_allowed = Some(slot + interval);
        slot
    }

    /// Waits until one request may be issued. The wait happens outside the lock.
    pub async fn acquire(&self) {
        let now = Instant::now();
        let slot = self.reserve(now);
        if slot > now {
            tokio::time::sleep_until(slot).await;
        }
    }

    fn lock(&self) -> MutexGuard<'_, LimiterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Longest inter-page delay accepted from configuration.
pub const MAX_DELAY: Duration = Duration::from_secs(86_400);

/// Delay bound from seconds: negatives become zero, huge or infinite values
/// become [`MAX_DELAY`], NaN is `None`.
pub fn delay_from_secs(value: f64) -> Option<Duration> {
    if value.is_nan() {
        return None;
    }
    Some(Duration::from_secs_f64(value.clamp(0.0, MAX_DELAY.as_secs_f64())))
}
