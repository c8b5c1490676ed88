//! A small saga runner: ordered steps, each paired with its compensation.

use crate::error::Result;
use async_trait::async_trait;
use tracing::{debug, error, warn};

/// One local transaction in a saga, together with the action that undoes it.
#[async_trait]
pub trait SagaStep<C: Send>: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(&self, ctx: &mut C) -> Result<()>;

    /// Reverses a successful [`execute`](SagaStep::execute). Only called for
    /// steps that committed.
    async fn compensate(&self, ctx: &mut C) -> Result<()>;
}

pub struct Saga<C: Send> {
    name: &'static str,
    steps: Vec<Box<dyn SagaStep<C>>>,
}

impl<C: Send> Saga<C> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: impl SagaStep<C> + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Runs every step in order.
    ///
    /// On the first failure, every step that already committed is compensated
    /// in reverse order of commitment and the failing step's error is
    /// returned. A compensation that fails is logged and the remaining
    /// compensations still run.
    pub async fn run(&self, ctx: &mut C) -> Result<()> {
        for (index, step) in self.steps.iter().enumerate() {
            debug!(saga = self.name, step = step.name(), "executing saga step");
            if let Err(err) = step.execute(ctx).await {
                warn!(
                    saga = self.name,
                    step = step.name(),
                    error = %err,
                    "saga step failed, compensating"
                );
                self.compensate(&self.steps[..index], ctx).await;
                return Err(err);
            }
        }
        Ok(())
    }

    async fn compensate(&self, committed: &[Box<dyn SagaStep<C>>], ctx: &mut C) {
        for step in committed.iter().rev() {
            warn!(saga = self.name, step = step.name(), "compensating saga step");
            if let Err(err) = step.compensate(ctx).await {
                error!(
                    saga = self.name,
                    step = step.name(),
                    error = %err,
                    "compensation failed; manual reconciliation required"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostelError;

    #[derive(Default)]
    struct Journal {
        entries: Vec<String>,
    }

    struct Recorded {
        name: &'static str,
        fail_execute: bool,
        fail_compensate: bool,
    }

    impl Recorded {
        fn ok(name: &'static str) -> Self {
            Self {
                name,
                fail_execute: false,
                fail_compensate: false,
            }
        }
    }

    #[async_trait]
    impl SagaStep<Journal> for Recorded {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn execute(&self, ctx: &mut Journal) -> Result<()> {
            if self.fail_execute {
                return Err(HostelError::WriteError(format!("{} failed", self.name)));
            }
            ctx.entries.push(format!("do {}", self.name));
            Ok(())
        }

        async fn compensate(&self, ctx: &mut Journal) -> Result<()> {
            ctx.entries.push(format!("undo {}", self.name));
            if self.fail_compensate {
                return Err(HostelError::WriteError("undo failed".into()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_all_steps_succeed() {
        let saga = Saga::new("test").step(Recorded::ok("a")).step(Recorded::ok("b"));
        let mut journal = Journal::default();
        saga.run(&mut journal).await.unwrap();
        assert_eq!(journal.entries, vec!["do a", "do b"]);
    }

    #[tokio::test]
    async fn test_compensates_in_reverse_order() {
        let saga = Saga::new("test")
            .step(Recorded::ok("a"))
            .step(Recorded::ok("b"))
            .step(Recorded {
                name: "c",
                fail_execute: true,
                fail_compensate: false,
            });
        let mut journal = Journal::default();

        let result = saga.run(&mut journal).await;

        assert!(matches!(result, Err(HostelError::WriteError(msg)) if msg == "c failed"));
        // The failing step is never compensated.
        assert_eq!(journal.entries, vec!["do a", "do b", "undo b", "undo a"]);
    }

    #[tokio::test]
    async fn test_failed_compensation_does_not_stop_the_rest() {
        let saga = Saga::new("test")
            .step(Recorded::ok("a"))
            .step(Recorded {
                name: "b",
                fail_execute: false,
                fail_compensate: true,
            })
            .step(Recorded {
                name: "c",
                fail_execute: true,
                fail_compensate: false,
            });
        let mut journal = Journal::default();

        let result = saga.run(&mut journal).await;

        assert!(result.is_err());
        assert_eq!(journal.entries, vec!["do a", "do b", "undo b", "undo a"]);
    }

    #[tokio::test]
    async fn test_first_step_failure_compensates_nothing() {
        let saga = Saga::new("test")
            .step(Recorded {
                name: "a",
                fail_execute: true,
                fail_compensate: false,
            })
            .step(Recorded::ok("b"));
        let mut journal = Journal::default();

        assert!(saga.run(&mut journal).await.is_err());
        assert!(journal.entries.is_empty());
    }
}
