//! Ordered, retryable list of deferred steps with optional expected results.
//!
//! A [`Sequence`] holds steps that have not run yet. Running it executes them
//! in order against a context (usually a [`Portal`](crate::portal::Portal)),
//! stopping the attempt at the first step that errors or whose result differs
//! from its [`Expectation`]. A failed attempt restarts from the first step, up
//! to the number of attempts in the [`RetryPolicy`]. Step side effects are
//! never rolled back; replaying them must be safe for the caller.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tally_common::error::portal_error::PortalError;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, thiserror::Error)]
pub enum ActionError {
    #[error("Portal error: {0}")]
    Portal(#[from] PortalError),

    #[error("{0}")]
    Other(String),
}

impl ActionError {
    pub fn portal_error(&self) -> Option<&PortalError> {
        match self {
            ActionError::Portal(e) => Some(e),
            ActionError::Other(_) => None,
        }
    }

    pub fn code(&self) -> &'static str {
        self.portal_error().map_or("STEP_FAILED", PortalError::code)
    }
}

/// A deferred operation bound to its arguments.
#[async_trait]
pub trait Step<C: ?Sized + Send + 'static>: Send + Sync {
    /// Name used in log lines and failure reports.
    fn name(&self) -> String;

    async fn execute(&self, ctx: &mut C) -> Result<Value, ActionError>;
}

/// What a step must return for its attempt to continue.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Expectation {
    /// Any successful result is accepted.
    #[default]
    None,
    /// The result must equal this value.
    Equals(Value),
}

impl Expectation {
    pub fn equals(value: impl Into<Value>) -> Self {
        Expectation::Equals(value.into())
    }

    fn mismatch(&self, actual: &Value) -> Option<Value> {
        match self {
            Expectation::None => None,
            Expectation::Equals(expected) if expected == actual => None,
            Expectation::Equals(expected) => Some(expected.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// `attempts` below 1 is raised to 1.
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::ZERO)
    }
}

#[derive(Debug, Clone)]
pub enum FailureCause {
    Error(ActionError),
    Mismatch { expected: Value, actual: Value },
}

/// Why an attempt stopped.
#[derive(Debug, Clone)]
pub struct StepFailure {
    /// Zero-based position of the failing step.
    pub index: usize,
    pub step: String,
    pub cause: FailureCause,
}

impl StepFailure {
    /// What to check when the step keeps failing on a portal error.
    pub fn recovery_hint(&self) -> Option<&'static str> {
        match &self.cause {
            FailureCause::Error(e) => e.portal_error().map(PortalError::recovery_hint),
            FailureCause::Mismatch { .. } => None,
        }
    }
}

impl std::fmt::Display for StepFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            FailureCause::Error(e) => write!(
                f,
                "step {} ({}) failed [{}]: {}",
                self.index + 1,
                self.step,
                e.code(),
                e
            ),
            FailureCause::Mismatch { expected, actual } => write!(
                f,
                "step {} ({}) returned {}, expected {}",
                self.index + 1,
                self.step,
                actual,
                expected
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SequenceReport {
    pub succeeded: bool,
    /// Attempts actually started.
    pub attempts: u32,
    /// Failure of the most recent failed attempt, if any.
    pub last_failure: Option<StepFailure>,
}

struct Entry<C: ?Sized + Send + 'static> {
    step: Box<dyn Step<C>>,
    expectation: Expectation,
}

pub struct Sequence<C: ?Sized + Send + 'static> {
    entries: Vec<Entry<C>>,
}

impl<C: ?Sized + Send + 'static> Default for Sequence<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ?Sized + Send + 'static> Sequence<C> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append a step whose result is not checked.
    pub fn add<S: Step<C> + 'static>(&mut self, step: S) -> &mut Self {
        self.add_with(step, Expectation::None)
    }

    /// Append a step whose result must equal `expected`.
    pub fn add_expecting<S: Step<C> + 'static>(
        &mut self,
        step: S,
        expected: impl Into<Value>,
    ) -> &mut Self {
        self.add_with(step, Expectation::equals(expected))
    }

    pub fn add_with<S: Step<C> + 'static>(&mut self, step: S, expectation: Expectation) -> &mut Self {
        self.entries.push(Entry {
            step: Box::new(step),
            expectation,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn step_names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.step.name()).collect()
    }

    /// Run the sequence; `true` iff some attempt completed every step.
    pub async fn run(&self, ctx: &mut C, policy: &RetryPolicy) -> bool {
        self.run_with_report(ctx, policy).await.succeeded
    }

    pub async fn run_with_report(&self, ctx: &mut C, policy: &RetryPolicy) -> SequenceReport {
        let total = policy.attempts();
        let mut last_failure = None;

        for attempt in 1..=total {
            info!("--- Attempt {} of {} ---", attempt, total);

            match self.run_attempt(ctx).await {
                Ok(()) => {
                    info!("All {} steps succeeded on attempt {}", self.len(), attempt);
                    return SequenceReport {
                        succeeded: true,
                        attempts: attempt,
                        last_failure: None,
                    };
                }
                Err(failure) => {
                    warn!("Attempt {} of {} failed: {}", attempt, total, failure);
                    if let Some(hint) = failure.recovery_hint() {
                        debug!("Hint: {}", hint);
                    }
                    last_failure = Some(failure);
                }
            }

            if attempt < total && !policy.delay().is_zero() {
                debug!("Waiting {:?} before next attempt", policy.delay());
                tokio::time::sleep(policy.delay()).await;
            }
        }

        warn!("Retry limit reached after {} attempts", total);
        SequenceReport {
            succeeded: false,
            attempts: total,
            last_failure,
        }
    }

    async fn run_attempt(&self, ctx: &mut C) -> Result<(), StepFailure> {
        for (index, entry) in self.entries.iter().enumerate() {
            let name = entry.step.name();
            debug!("Running step {}: {}", index + 1, name);

            let result = entry.step.execute(ctx).await.map_err(|e| StepFailure {
                index,
                step: name.clone(),
                cause: FailureCause::Error(e),
            })?;

            if let Expectation::Equals(_) = entry.expectation {
                debug!("Checking {}: got {}", name, result);
            }
            if let Some(expected) = entry.expectation.mismatch(&result) {
                return Err(StepFailure {
                    index,
                    step: name,
                    cause: FailureCause::Mismatch {
                        expected,
                        actual: result,
                    },
                });
            }
        }
        Ok(())
    }
}
