use failsafe::failure_policy::FailurePolicy;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{Config, Error as FailsafeError, Instrument, StateMachine};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            CircuitState::Closed => 0,
            CircuitState::Open => 1,
            CircuitState::HalfOpen => 2,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct BreakerSettings {
    /// Consecutive failures that trip the breaker.
    pub failure_threshold: u32,
    /// How long the breaker stays open before letting a probe through.
    pub open_timeout: Duration,
    /// Failures older than this no longer count towards the threshold.
    pub reset_interval: Duration,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            open_timeout: Duration::from_secs(5),
            reset_interval: Duration::from_secs(60),
        }
    }
}

/// Trips after `threshold` consecutive failures, forgetting the streak once
/// `reset_interval` has passed since it started.
#[derive(Debug, Clone)]
pub struct ConsecutiveFailuresWithin {
    threshold: u32,
    open_timeout: Duration,
    reset_interval: Duration,
    failures: u32,
    streak_started: Option<Instant>,
}

impl ConsecutiveFailuresWithin {
    pub fn new(settings: &BreakerSettings) -> Self {
        Self {
            threshold: settings.failure_threshold.max(1),
            open_timeout: settings.open_timeout,
            reset_interval: settings.reset_interval,
            failures: 0,
            streak_started: None,
        }
    }

    fn reset(&mut self) {
        self.failures = 0;
        self.streak_started = None;
    }
}

impl FailurePolicy for ConsecutiveFailuresWithin {
    fn record_success(&mut self) {
        self.reset();
    }

    fn mark_dead_on_failure(&mut self) -> Option<Duration> {
        let now = Instant::now();
        match self.streak_started {
            Some(started) if now.duration_since(started) < self.reset_interval => {}
            _ => {
                self.failures = 0;
                self.streak_started = Some(now);
            }
        }

        self.failures += 1;
        if self.failures >= self.threshold {
            Some(self.open_timeout)
        } else {
            None
        }
    }

    fn revived(&mut self) {
        self.reset();
    }
}

/// Mirrors the state machine's transitions so they can be logged and queried.
#[derive(Debug, Clone)]
pub struct StateObserver {
    name: Arc<str>,
    state: Arc<AtomicU8>,
}

impl StateObserver {
    fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            state: Arc::new(AtomicU8::new(CircuitState::Closed.as_u8())),
        }
    }

    fn current(&self) -> CircuitState {
        CircuitState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn transition(&self, to: CircuitState) {
        let from = CircuitState::from_u8(self.state.swap(to.as_u8(), Ordering::AcqRel));
        if from != to {
            info!(breaker = %self.name, from = %from, to = %to, "Circuit breaker state changed");
        }
    }
}

impl Instrument for StateObserver {
    fn on_call_rejected(&self) {
        debug!(breaker = %self.name, "Call rejected by open circuit breaker");
    }

    fn on_open(&self) {
        self.transition(CircuitState::Open);
    }

    fn on_half_open(&self) {
        self.transition(CircuitState::HalfOpen);
    }

    fn on_closed(&self) {
        self.transition(CircuitState::Closed);
    }
}

#[derive(Debug)]
pub enum BreakerError<E> {
    /// The call was not attempted.
    Rejected,
    Inner(E),
}

/// Releases the half-open probe slot when dropped.
struct ProbeSlot<'a>(&'a AtomicBool);

impl<'a> ProbeSlot<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ProbeSlot(flag))
    }
}

impl Drop for ProbeSlot<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Circuit breaker around arbitrary futures.
///
/// Closed: every call runs and failures are counted. Open: calls are rejected
/// without running. Once the open timeout has elapsed a single probe call is
/// let through; its success closes the breaker, its failure reopens it.
#[derive(Clone)]
pub struct CircuitBreaker {
    machine: StateMachine<ConsecutiveFailuresWithin, StateObserver>,
    observer: StateObserver,
    probe_in_flight: Arc<AtomicBool>,
}

impl CircuitBreaker {
    pub fn new(name: &str, settings: &BreakerSettings) -> Self {
        let observer = StateObserver::new(name);
        let machine = Config::new()
            .failure_policy(ConsecutiveFailuresWithin::new(settings))
            .instrument(observer.clone())
            .build();

        Self {
            machine,
            observer,
            probe_in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.observer.current()
    }

    pub async fn call<F, T, E>(&self, f: F) -> Result<T, BreakerError<E>>
    where
        F: Future<Output = Result<T, E>>,
    {
        // Outside the closed state only one call at a time may reach the state
        // machine, so a half-open breaker sees exactly one probe.
        let _probe = match self.state() {
            CircuitState::Closed => None,
            CircuitState::Open | CircuitState::HalfOpen => {
                match ProbeSlot::acquire(&self.probe_in_flight) {
                    Some(slot) => Some(slot),
                    None => {
                        debug!(breaker = %self.observer.name, "Probe already in flight, rejecting call");
                        return Err(BreakerError::Rejected);
                    }
                }
            }
        };

        match self.machine.call(f).await {
            Ok(value) => Ok(value),
            Err(FailsafeError::Rejected) => Err(BreakerError::Rejected),
            Err(FailsafeError::Inner(e)) => Err(BreakerError::Inner(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn settings(open_timeout: Duration) -> BreakerSettings {
        BreakerSettings {
            failure_threshold: 3,
            open_timeout,
            reset_interval: Duration::from_secs(60),
        }
    }

    async fn fail(breaker: &CircuitBreaker, calls: &AtomicUsize) -> Result<(), BreakerError<&'static str>> {
        breaker
            .call(async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>("boom")
            })
            .await
    }

    async fn succeed(breaker: &CircuitBreaker, calls: &AtomicUsize) -> Result<(), BreakerError<&'static str>> {
        breaker
            .call(async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<(), &'static str>(())
            })
            .await
    }

    #[test]
    fn test_default_settings() {
        let settings = BreakerSettings::default();
        assert_eq!(settings.failure_threshold, 3);
        assert_eq!(settings.open_timeout, Duration::from_secs(5));
        assert_eq!(settings.reset_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_policy_trips_on_threshold() {
        let mut policy = ConsecutiveFailuresWithin::new(&settings(Duration::from_secs(5)));

        assert_eq!(policy.mark_dead_on_failure(), None);
        assert_eq!(policy.mark_dead_on_failure(), None);
        assert_eq!(policy.mark_dead_on_failure(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_policy_success_resets_streak() {
        let mut policy = ConsecutiveFailuresWithin::new(&settings(Duration::from_secs(5)));

        policy.mark_dead_on_failure();
        policy.mark_dead_on_failure();
        policy.record_success();

        assert_eq!(policy.mark_dead_on_failure(), None);
        assert_eq!(policy.mark_dead_on_failure(), None);
    }

    #[test]
    fn test_policy_forgets_stale_streak() {
        let mut policy = ConsecutiveFailuresWithin::new(&BreakerSettings {
            failure_threshold: 2,
            open_timeout: Duration::from_secs(5),
            reset_interval: Duration::from_millis(20),
        });

        assert_eq!(policy.mark_dead_on_failure(), None);
        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(policy.mark_dead_on_failure(), None);
        assert_eq!(policy.mark_dead_on_failure(), Some(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_opens_after_three_failures_and_rejects() {
        let breaker = CircuitBreaker::new("test", &settings(Duration::from_secs(30)));
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            assert!(matches!(fail(&breaker, &calls).await, Err(BreakerError::Inner("boom"))));
            assert_eq!(breaker.state(), CircuitState::Closed);
        }
        assert!(matches!(fail(&breaker, &calls).await, Err(BreakerError::Inner("boom"))));
        assert_eq!(breaker.state(), CircuitState::Open);

        assert!(matches!(succeed(&breaker, &calls).await, Err(BreakerError::Rejected)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_probe_success_closes() {
        let breaker = CircuitBreaker::new("test", &settings(Duration::from_millis(50)));
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let _ = fail(&breaker, &calls).await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(succeed(&breaker, &calls).await.is_ok());
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_probe_failure_reopens() {
        let breaker = CircuitBreaker::new("test", &settings(Duration::from_millis(50)));
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let _ = fail(&breaker, &calls).await;
        }
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert!(matches!(fail(&breaker, &calls).await, Err(BreakerError::Inner(_))));
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(matches!(succeed(&breaker, &calls).await, Err(BreakerError::Rejected)));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_single_probe_in_half_open() {
        let breaker = CircuitBreaker::new("test", &settings(Duration::from_millis(50)));
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let _ = fail(&breaker, &calls).await;
        }
        tokio::time::sleep(Duration::from_millis(80)).await;

        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let probe_breaker = breaker.clone();
        let probe = tokio::spawn(async move {
            probe_breaker
                .call(async {
                    let _ = release_rx.await;
                    Ok::<(), &'static str>(())
                })
                .await
        });

        // Let the probe reach the state machine.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert!(matches!(succeed(&breaker, &calls).await, Err(BreakerError::Rejected)));

        release_tx.send(()).unwrap();
        assert!(probe.await.unwrap().is_ok());
        assert_eq!(breaker.state(), CircuitState::Closed);
    }
}
