//! Circuit breaker for calls to a remote dependency.
//!
//! Outcomes are counted in a rolling window split into time buckets. Once the
//! failure share of the window reaches the configured percentage the circuit
//! opens and calls fail fast without running. After `reset_timeout` exactly one
//! trial call is let through: its success closes the circuit, its failure or
//! timeout opens it again.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use dossier_core::BreakerPolicy;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::Instant;
use utoipa::ToSchema;

const EVENT_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// State transition published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitEvent {
    pub circuit: String,
    pub from: CircuitState,
    pub to: CircuitState,
}

/// Why a guarded call failed.
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// Circuit open; the operation was not attempted.
    #[error("circuit '{circuit}' is open")]
    Open { circuit: String },

    /// The operation did not finish within the deadline. Its future was dropped.
    #[error("call through circuit '{circuit}' timed out after {timeout:?}")]
    Timeout { circuit: String, timeout: Duration },

    /// The operation itself failed.
    #[error("call through circuit '{circuit}' failed: {source}")]
    Upstream {
        circuit: String,
        #[source]
        source: E,
    },
}

impl<E> CircuitBreakerError<E> {
    /// Stable classification used in logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            CircuitBreakerError::Open { .. } => "circuit-open",
            CircuitBreakerError::Timeout { .. } => "timeout",
            CircuitBreakerError::Upstream { .. } => "upstream-error",
        }
    }

    pub fn circuit(&self) -> &str {
        match self {
            CircuitBreakerError::Open { circuit }
            | CircuitBreakerError::Timeout { circuit, .. }
            | CircuitBreakerError::Upstream { circuit, .. } => circuit,
        }
    }

    pub fn into_upstream(self) -> Option<E> {
        match self {
            CircuitBreakerError::Upstream { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Point-in-time view of a breaker, for health reporting.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CircuitSnapshot {
    pub name: String,
    pub state: CircuitState,
    /// Calls counted in the current window.
    pub calls: u32,
    pub failures: u32,
}

#[derive(Debug)]
struct Bucket {
    start: Instant,
    successes: u32,
    failures: u32,
}

#[derive(Debug)]
struct RollingWindow {
    buckets: VecDeque<Bucket>,
    bucket_len: Duration,
    span: Duration,
}

impl RollingWindow {
    fn new(span: Duration, buckets: u32) -> Self {
        let buckets = buckets.max(1);
        Self {
            buckets: VecDeque::with_capacity(buckets as usize),
            bucket_len: span / buckets,
            span,
        }
    }

    fn evict(&mut self, now: Instant) {
        while let Some(front) = self.buckets.front() {
            if now.duration_since(front.start) >= self.span {
                self.buckets.pop_front();
            } else {
                break;
            }
        }
    }

    fn record(&mut self, now: Instant, success: bool) {
        self.evict(now);
        let reuse = matches!(self.buckets.back(), Some(b) if now.duration_since(b.start) < self.bucket_len);
        if !reuse {
            self.buckets.push_back(Bucket {
                start: now,
                successes: 0,
                failures: 0,
            });
        }
        if let Some(bucket) = self.buckets.back_mut() {
            if success {
                bucket.successes += 1;
            } else {
                bucket.failures += 1;
            }
        }
    }

    /// (calls, failures) still inside the window.
    fn totals(&mut self, now: Instant) -> (u32, u32) {
        self.evict(now);
        self.buckets.iter().fold((0, 0), |(calls, failures), b| {
            (calls + b.successes + b.failures, failures + b.failures)
        })
    }

    fn clear(&mut self) {
        self.buckets.clear();
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Closed,
    Open { since: Instant },
    /// A trial is in flight.
    HalfOpen,
}

#[derive(Debug)]
struct Inner {
    phase: Phase,
    window: RollingWindow,
}

#[derive(Debug, Clone, Copy)]
struct Admission {
    trial: bool,
}

/// A long-lived breaker shared by every call of one operation category.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    policy: BreakerPolicy,
    inner: Mutex<Inner>,
    events: broadcast::Sender<CircuitEvent>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, policy: BreakerPolicy) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            name: name.into(),
            inner: Mutex::new(Inner {
                phase: Phase::Closed,
                window: RollingWindow::new(policy.rolling_window, policy.rolling_buckets),
            }),
            policy,
            events,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Receive every state transition from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<CircuitEvent> {
        self.events.subscribe()
    }

    /// Current state. An open circuit whose cooldown has elapsed reports
    /// `HalfOpen`: the next call will be the trial.
    pub fn state(&self) -> CircuitState {
        let inner = self.lock();
        match inner.phase {
            Phase::Closed => CircuitState::Closed,
            Phase::HalfOpen => CircuitState::HalfOpen,
            Phase::Open { since } if since.elapsed() >= self.policy.reset_timeout => {
                CircuitState::HalfOpen
            }
            Phase::Open { .. } => CircuitState::Open,
        }
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let state = self.state();
        let (calls, failures) = self.lock().window.totals(Instant::now());
        CircuitSnapshot {
            name: self.name.clone(),
            state,
            calls,
            failures,
        }
    }

    /// Run `op` through the breaker.
    ///
    /// `op` is only invoked when the circuit admits the call. The call is
    /// raced against the policy timeout; on expiry its future is dropped.
    pub async fn fire<T, E, F, Fut>(&self, op: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let Some(admission) = self.admit() else {
            tracing::debug!(circuit = %self.name, "Call rejected, circuit open");
            return Err(CircuitBreakerError::Open {
                circuit: self.name.clone(),
            });
        };

        let mut guard = TrialGuard {
            breaker: self,
            armed: admission.trial,
        };
        let outcome = tokio::time::timeout(self.policy.timeout, op()).await;
        guard.armed = false;

        match outcome {
            Ok(Ok(value)) => {
                self.on_success(admission);
                Ok(value)
            }
            Ok(Err(source)) => {
                self.on_failure(admission);
                Err(CircuitBreakerError::Upstream {
                    circuit: self.name.clone(),
                    source,
                })
            }
            Err(_) => {
                self.on_failure(admission);
                tracing::warn!(
                    circuit = %self.name,
                    timeout_ms = self.policy.timeout.as_millis() as u64,
                    "Guarded call timed out"
                );
                Err(CircuitBreakerError::Timeout {
                    circuit: self.name.clone(),
                    timeout: self.policy.timeout,
                })
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn admit(&self) -> Option<Admission> {
        let mut inner = self.lock();
        match inner.phase {
            Phase::Closed => Some(Admission { trial: false }),
            Phase::HalfOpen => None,
            Phase::Open { since } => {
                if since.elapsed() < self.policy.reset_timeout {
                    return None;
                }
                inner.phase = Phase::HalfOpen;
                self.transition(CircuitState::Open, CircuitState::HalfOpen);
                Some(Admission { trial: true })
            }
        }
    }

    fn on_success(&self, admission: Admission) {
        let mut inner = self.lock();
        let now = Instant::now();
        if admission.trial {
            if matches!(inner.phase, Phase::HalfOpen) {
                inner.phase = Phase::Closed;
                inner.window.clear();
                self.transition(CircuitState::HalfOpen, CircuitState::Closed);
            }
            return;
        }
        inner.window.record(now, true);
    }

    fn on_failure(&self, admission: Admission) {
        let mut inner = self.lock();
        let now = Instant::now();
        if admission.trial {
            if matches!(inner.phase, Phase::HalfOpen) {
                inner.phase = Phase::Open { since: now };
                self.transition(CircuitState::HalfOpen, CircuitState::Open);
            }
            return;
        }

        inner.window.record(now, false);
        if !matches!(inner.phase, Phase::Closed) {
            return;
        }
        let (calls, failures) = inner.window.totals(now);
        if calls >= self.policy.volume_threshold
            && calls > 0
            && failures * 100 >= u32::from(self.policy.error_threshold_percentage) * calls
        {
            inner.phase = Phase::Open { since: now };
            self.transition(CircuitState::Closed, CircuitState::Open);
        }
    }

    /// Trial dropped before finishing: treat like a failed trial.
    fn abandon_trial(&self) {
        let mut inner = self.lock();
        if matches!(inner.phase, Phase::HalfOpen) {
            inner.phase = Phase::Open {
                since: Instant::now(),
            };
            self.transition(CircuitState::HalfOpen, CircuitState::Open);
        }
    }

    fn transition(&self, from: CircuitState, to: CircuitState) {
        match to {
            CircuitState::Open => tracing::warn!(
                circuit = %self.name,
                from = %from,
                reset_timeout_ms = self.policy.reset_timeout.as_millis() as u64,
                "Circuit opened, remote storage considered unavailable"
            ),
            CircuitState::HalfOpen => {
                tracing::info!(circuit = %self.name, "Circuit half-open, sending trial")
            }
            CircuitState::Closed => {
                tracing::info!(circuit = %self.name, "Circuit closed, remote storage recovered")
            }
        }
        // no subscribers is fine
        let _ = self.events.send(CircuitEvent {
            circuit: self.name.clone(),
            from,
            to,
        });
    }
}

struct TrialGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.abandon_trial();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::oneshot;

    #[derive(Debug, thiserror::Error)]
    #[error("drive said no")]
    struct DriveDown;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new("upload", BreakerPolicy::default())
    }

    async fn fail(breaker: &CircuitBreaker) -> CircuitBreakerError<DriveDown> {
        breaker
            .fire(|| async { Err::<(), _>(DriveDown) })
            .await
            .unwrap_err()
    }

    async fn succeed(breaker: &CircuitBreaker) -> Result<u8, CircuitBreakerError<DriveDown>> {
        breaker.fire(|| async { Ok::<_, DriveDown>(7) }).await
    }

    #[tokio::test(start_paused = true)]
    async fn closed_circuit_passes_results_through() {
        let breaker = breaker();
        assert_eq!(succeed(&breaker).await.unwrap(), 7);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn upstream_failure_is_wrapped_and_trips() {
        let breaker = breaker();
        let err = fail(&breaker).await;
        assert_eq!(err.reason(), "upstream-error");
        assert!(matches!(err, CircuitBreakerError::Upstream { .. }));
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn open_circuit_fails_fast_without_invoking() {
        let breaker = breaker();
        fail(&breaker).await;

        let invoked = AtomicUsize::new(0);
        let err = breaker
            .fire(|| async {
                invoked.fetch_add(1, Ordering::SeqCst);
                Ok::<_, DriveDown>(())
            })
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "circuit-open");
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn trips_only_at_threshold_percentage() {
        let policy = BreakerPolicy {
            volume_threshold: 4,
            ..BreakerPolicy::default()
        };
        let breaker = CircuitBreaker::new("status", policy);

        for _ in 0..3 {
            succeed(&breaker).await.unwrap();
        }
        fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Closed, "1 of 4 failed");

        fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Closed, "2 of 5 failed");

        fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Open, "3 of 6 failed");
    }

    #[tokio::test(start_paused = true)]
    async fn volume_threshold_defers_tripping() {
        let policy = BreakerPolicy {
            volume_threshold: 3,
            ..BreakerPolicy::default()
        };
        let breaker = CircuitBreaker::new("status", policy);
        fail(&breaker).await;
        fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Closed);
        fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_outside_window_are_forgotten() {
        let policy = BreakerPolicy {
            volume_threshold: 2,
            ..BreakerPolicy::default()
        };
        let breaker = CircuitBreaker::new("status", policy);
        fail(&breaker).await;
        tokio::time::advance(policy.rolling_window + Duration::from_millis(1)).await;
        fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.snapshot().calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_counts_as_failure() {
        let breaker = breaker();
        let err = breaker
            .fire(|| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, DriveDown>(())
            })
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "timeout");
        assert!(matches!(
            err,
            CircuitBreakerError::Timeout { timeout, .. } if timeout == Duration::from_millis(5000)
        ));
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_trial_success_closes() {
        let breaker = breaker();
        let mut events = breaker.subscribe();
        fail(&breaker).await;

        tokio::time::advance(Duration::from_millis(29_999)).await;
        assert_eq!(breaker.state(), CircuitState::Open);
        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        succeed(&breaker).await.unwrap();
        assert_eq!(breaker.state(), CircuitState::Closed);

        let seen: Vec<CircuitState> = std::iter::from_fn(|| events.try_recv().ok())
            .map(|e| e.to)
            .collect();
        assert_eq!(
            seen,
            vec![
                CircuitState::Open,
                CircuitState::HalfOpen,
                CircuitState::Closed
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_trial_failure_restarts_cooldown() {
        let breaker = breaker();
        fail(&breaker).await;
        tokio::time::advance(Duration::from_secs(30)).await;

        fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(29)).await;
        assert_eq!(succeed(&breaker).await.unwrap_err().reason(), "circuit-open");
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(succeed(&breaker).await.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn only_one_trial_is_admitted() {
        let breaker = breaker();
        fail(&breaker).await;
        tokio::time::advance(Duration::from_secs(30)).await;

        let (release, released) = oneshot::channel::<()>();
        let invoked = AtomicUsize::new(0);

        let trial = breaker.fire(|| async move {
            let _ = released.await;
            Ok::<_, DriveDown>("trial")
        });
        let competitor = async {
            let result = breaker
                .fire(|| async {
                    invoked.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, DriveDown>("competitor")
                })
                .await;
            let _ = release.send(());
            result
        };

        let (trial, competitor) = tokio::join!(trial, competitor);
        assert_eq!(trial.unwrap(), "trial");
        assert_eq!(competitor.unwrap_err().reason(), "circuit-open");
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_trial_reopens() {
        let breaker = breaker();
        fail(&breaker).await;
        tokio::time::advance(Duration::from_secs(30)).await;

        {
            let trial = breaker.fire(|| std::future::pending::<Result<(), DriveDown>>());
            tokio::pin!(trial);
            assert!(poll_once(trial.as_mut()).await.is_none());
        }

        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn late_success_does_not_close_open_circuit() {
        let breaker = breaker();
        let (release, released) = oneshot::channel::<()>();

        let slow = breaker.fire(|| async move {
            let _ = released.await;
            Ok::<_, DriveDown>(())
        });
        let trip = async {
            let err = fail(&breaker).await;
            let _ = release.send(());
            err
        };
        let (slow, _) = tokio::join!(slow, trip);
        assert!(slow.is_ok());
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    /// Polls a future exactly once.
    async fn poll_once<F: Future + Unpin>(fut: F) -> Option<F::Output> {
        let mut fut = fut;
        std::future::poll_fn(|cx| {
            std::task::Poll::Ready(match std::pin::Pin::new(&mut fut).poll(cx) {
                std::task::Poll::Ready(v) => Some(v),
                std::task::Poll::Pending => None,
            })
        })
        .await
    }
}
