use crate::domain::ports::Clock;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Wall-clock time and real `tokio` sleeps.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// A clock that only moves when slept on or advanced explicitly.
///
/// Sleeping advances the clock by exactly the requested duration and returns
/// immediately, so polling loops run deterministically and without delay.
#[derive(Debug, Clone)]
pub struct ManualClock {
    inner: Arc<Mutex<ManualClockState>>,
}

#[derive(Debug)]
struct ManualClockState {
    now: DateTime<Utc>,
    sleeps: Vec<Duration>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ManualClockState {
                now: start,
                sleeps: Vec::new(),
            })),
        }
    }

    pub fn advance(&self, duration: Duration) {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        state.now += chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero());
    }

    /// Every duration passed to [`Clock::sleep`], in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        let state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        state.sleeps.clone()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).now
    }

    async fn sleep(&self, duration: Duration) {
        {
            let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            state.sleeps.push(duration);
        }
        self.advance(duration);
        tokio::task::yield_now().await;
    }
}
