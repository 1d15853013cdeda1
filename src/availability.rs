use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::time::{Duration, Instant};

pub const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(120);
pub const TRANSIENT_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AvailabilityState {
    /// No credential configured; the service is never called.
    Uninitialized,
    /// A capability check is in flight.
    Probing,
    Available,
    Unavailable,
}

#[derive(Debug)]
struct Inner {
    state: AvailabilityState,
    rate_limit_reset_at: Option<Instant>,
    last_request_at: Option<Instant>,
}

/// Point-in-time view of one service, suitable for status output.
#[derive(Debug, Clone, Serialize)]
pub struct AvailabilitySnapshot {
    pub service: String,
    pub state: AvailabilityState,
    pub cooldown_seconds: u64,
    pub retry_after_seconds: f64,
    pub cooldown_remaining_seconds: f64,
}

/// Process-wide availability and pacing for one external service.
///
/// A call is permitted only while the service is `Available`, the backoff
/// window has passed and at least `cooldown` elapsed since the last permitted
/// call. Granting permission records the call time under the same lock, so
/// concurrent callers can never both be admitted inside one cooldown.
#[derive(Debug)]
pub struct ServiceAvailability {
    name: String,
    cooldown: Duration,
    rate_limit_backoff: Duration,
    transient_backoff: Duration,
    inner: Mutex<Inner>,
}

impl ServiceAvailability {
    pub fn new(name: impl Into<String>, cooldown: Duration) -> Self {
        Self {
            name: name.into(),
            cooldown,
            rate_limit_backoff: RATE_LIMIT_BACKOFF,
            transient_backoff: TRANSIENT_BACKOFF,
            inner: Mutex::new(Inner {
                state: AvailabilityState::Uninitialized,
                rate_limit_reset_at: None,
                last_request_at: None,
            }),
        }
    }

    pub fn with_backoff(mut self, rate_limit: Duration, transient: Duration) -> Self {
        self.rate_limit_backoff = rate_limit;
        self.transient_backoff = transient;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> AvailabilityState {
        self.lock().state
    }

    pub fn is_available(&self) -> bool {
        self.state() == AvailabilityState::Available
    }

    pub fn rate_limit_reset_at(&self) -> Option<Instant> {
        self.lock().rate_limit_reset_at
    }

    pub fn begin_probe(&self) {
        self.lock().state = AvailabilityState::Probing;
    }

    /// Settles a capability check. A successful check only makes the service
    /// available once the backoff window has passed.
    pub fn complete_probe_at(&self, now: Instant, usable: bool) -> AvailabilityState {
        let mut inner = self.lock();
        let backoff_over = inner.rate_limit_reset_at.is_none_or(|reset| now >= reset);
        inner.state = if usable && backoff_over {
            AvailabilityState::Available
        } else {
            AvailabilityState::Unavailable
        };
        inner.state
    }

    pub fn complete_probe(&self, usable: bool) -> AvailabilityState {
        self.complete_probe_at(Instant::now(), usable)
    }

    pub fn try_acquire_at(&self, now: Instant) -> bool {
        let mut inner = self.lock();
        if inner.state != AvailabilityState::Available {
            return false;
        }
        if inner.rate_limit_reset_at.is_some_and(|reset| now < reset) {
            return false;
        }
        let cooled = inner
            .last_request_at
            .is_none_or(|last| now.saturating_duration_since(last) >= self.cooldown);
        if cooled {
            inner.last_request_at = Some(now);
        }
        cooled
    }

    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    pub fn record_rate_limited_at(&self, now: Instant) {
        let mut inner = self.lock();
        inner.state = AvailabilityState::Unavailable;
        inner.rate_limit_reset_at = Some(now + self.rate_limit_backoff);
    }

    pub fn record_rate_limited(&self) {
        self.record_rate_limited_at(Instant::now());
    }

    /// Pushes the backoff window out without touching the state.
    pub fn record_transient_at(&self, now: Instant) {
        let mut inner = self.lock();
        let reset = now + self.transient_backoff;
        inner.rate_limit_reset_at = Some(match inner.rate_limit_reset_at {
            Some(existing) if existing > reset => existing,
            _ => reset,
        });
    }

    pub fn record_transient(&self) {
        self.record_transient_at(Instant::now());
    }

    /// True when the background monitor should re-run the capability check.
    pub fn needs_probe_at(&self, now: Instant) -> bool {
        let inner = self.lock();
        inner.state == AvailabilityState::Unavailable
            && inner.rate_limit_reset_at.is_none_or(|reset| now >= reset)
    }

    pub fn snapshot_at(&self, now: Instant) -> AvailabilitySnapshot {
        let inner = self.lock();
        let retry_after = inner
            .rate_limit_reset_at
            .map(|reset| reset.saturating_duration_since(now))
            .unwrap_or_default();
        let cooldown_remaining = inner
            .last_request_at
            .map(|last| self.cooldown.saturating_sub(now.saturating_duration_since(last)))
            .unwrap_or_default();
        AvailabilitySnapshot {
            service: self.name.clone(),
            state: inner.state,
            cooldown_seconds: self.cooldown.as_secs(),
            retry_after_seconds: round_tenths(retry_after),
            cooldown_remaining_seconds: round_tenths(cooldown_remaining),
        }
    }

    pub fn snapshot(&self) -> AvailabilitySnapshot {
        self.snapshot_at(Instant::now())
    }
}

fn round_tenths(duration: Duration) -> f64 {
    (duration.as_secs_f64() * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn available(cooldown_secs: u64, now: Instant) -> ServiceAvailability {
        let availability = ServiceAvailability::new("test", Duration::from_secs(cooldown_secs));
        availability.begin_probe();
        assert_eq!(
            availability.complete_probe_at(now, true),
            AvailabilityState::Available
        );
        availability
    }

    #[test]
    fn uninitialized_never_permits() {
        let availability = ServiceAvailability::new("test", Duration::from_secs(1));
        assert_eq!(availability.state(), AvailabilityState::Uninitialized);
        assert!(!availability.try_acquire());
        assert!(!availability.needs_probe_at(Instant::now()));
    }

    #[test]
    fn failed_probe_is_unavailable() {
        let availability = ServiceAvailability::new("test", Duration::from_secs(1));
        availability.begin_probe();
        assert_eq!(availability.state(), AvailabilityState::Probing);
        assert!(!availability.try_acquire());
        assert_eq!(
            availability.complete_probe(false),
            AvailabilityState::Unavailable
        );
        assert!(availability.needs_probe_at(Instant::now()));
    }

    #[test]
    fn cooldown_spaces_requests() {
        let start = Instant::now();
        let availability = available(10, start);
        assert!(availability.try_acquire_at(start));
        assert!(!availability.try_acquire_at(start + Duration::from_secs(9)));
        assert!(availability.try_acquire_at(start + Duration::from_secs(10)));
        assert!(!availability.try_acquire_at(start + Duration::from_secs(15)));
    }

    #[test]
    fn denied_attempt_does_not_move_last_request() {
        let start = Instant::now();
        let availability = available(10, start);
        assert!(availability.try_acquire_at(start));
        assert!(!availability.try_acquire_at(start + Duration::from_secs(5)));
        assert!(availability.try_acquire_at(start + Duration::from_secs(10)));
    }

    #[test]
    fn rate_limit_holds_until_reset_even_if_probed_early() {
        let start = Instant::now();
        let availability = available(1, start);
        availability.record_rate_limited_at(start);
        assert_eq!(availability.state(), AvailabilityState::Unavailable);

        let early = start + Duration::from_secs(60);
        assert!(!availability.needs_probe_at(early));
        availability.begin_probe();
        assert_eq!(
            availability.complete_probe_at(early, true),
            AvailabilityState::Unavailable
        );
        assert!(!availability.try_acquire_at(early));

        let later = start + RATE_LIMIT_BACKOFF;
        assert!(availability.needs_probe_at(later));
        availability.begin_probe();
        assert_eq!(
            availability.complete_probe_at(later, true),
            AvailabilityState::Available
        );
        assert!(availability.try_acquire_at(later));
    }

    #[test]
    fn transient_backs_off_without_flipping_state() {
        let start = Instant::now();
        let availability = available(1, start);
        availability.record_transient_at(start);
        assert_eq!(availability.state(), AvailabilityState::Available);
        assert!(!availability.try_acquire_at(start + Duration::from_secs(29)));
        assert!(availability.try_acquire_at(start + TRANSIENT_BACKOFF));
    }

    #[test]
    fn transient_never_shortens_rate_limit_window() {
        let start = Instant::now();
        let availability = available(1, start);
        availability.record_rate_limited_at(start);
        availability.record_transient_at(start);
        assert_eq!(
            availability.rate_limit_reset_at(),
            Some(start + RATE_LIMIT_BACKOFF)
        );
    }

    #[test]
    fn concurrent_callers_admit_exactly_one_per_cooldown() {
        let now = Instant::now();
        let availability = Arc::new(available(60, now));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let availability = availability.clone();
                std::thread::spawn(move || availability.try_acquire_at(now))
            })
            .collect();
        let admitted = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|granted| *granted)
            .count();
        assert_eq!(admitted, 1);
    }

    #[test]
    fn snapshot_reports_remaining_windows() {
        let start = Instant::now();
        let availability = available(10, start);
        assert!(availability.try_acquire_at(start));
        availability.record_rate_limited_at(start);
        let snapshot = availability.snapshot_at(start + Duration::from_secs(4));
        assert_eq!(snapshot.state, AvailabilityState::Unavailable);
        assert_eq!(snapshot.cooldown_seconds, 10);
        assert_eq!(snapshot.cooldown_remaining_seconds, 6.0);
        assert_eq!(snapshot.retry_after_seconds, 116.0);
    }
}
