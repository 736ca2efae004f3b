//! Circuit breaker guarding provider upstream calls.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Observable circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Trip threshold and recovery timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that trip the circuit.
    pub failure_threshold: u32,
    /// How long the circuit stays open before a probe is allowed.
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Default)]
struct Window {
    failures: u32,
    tripped_at: Option<Instant>,
    probing: bool,
}

/// Thread-safe breaker for adapter network requests.
///
/// Closed until `failure_threshold` consecutive failures; then open for
/// `cooldown`, after which a single probe is allowed. A failed probe
/// re-opens immediately, a success closes the circuit.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    window: Mutex<Window>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            window: Mutex::new(Window::default()),
        }
    }

    pub fn allow_request(&self) -> bool {
        let mut window = self.lock();
        match window.tripped_at {
            None => true,
            Some(tripped_at) => {
                if tripped_at.elapsed() >= self.config.cooldown {
                    window.probing = true;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut window = self.lock();
        *window = Window::default();
    }

    pub fn record_failure(&self) {
        let mut window = self.lock();
        window.failures = window.failures.saturating_add(1);
        if window.probing || window.failures >= self.config.failure_threshold {
            window.tripped_at = Some(Instant::now());
            window.probing = false;
        }
    }

    pub fn state(&self) -> CircuitState {
        let window = self.lock();
        match window.tripped_at {
            None => CircuitState::Closed,
            Some(tripped_at) if tripped_at.elapsed() >= self.config.cooldown => {
                CircuitState::HalfOpen
            }
            Some(_) => CircuitState::Open,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Window> {
        self.window
            .lock()
            .expect("circuit breaker lock is not poisoned")
    }
}
