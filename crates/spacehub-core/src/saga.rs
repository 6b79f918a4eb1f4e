// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Compensating saga runner.
//!
//! A [`Saga`] runs an ordered list of [`SagaStep`] command objects against a
//! shared context. When a step fails, every step that already completed is
//! compensated in reverse order (last completed step first). A failing
//! compensation does not stop the rollback; it is recorded and the remaining
//! compensations still run.

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};

/// Compensation state of one saga step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompensationState {
    /// The step defines no compensation.
    None,
    /// The step completed; compensation may be needed.
    Pending,
    /// Compensation is in progress.
    Triggered,
    /// Compensation completed successfully.
    Completed,
    /// Compensation failed.
    Failed,
}

impl CompensationState {
    /// Returns the string representation of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Pending => "pending",
            Self::Triggered => "triggered",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// One step of a saga.
#[async_trait]
pub trait SagaStep<C: Send + Sync>: Send + Sync {
    /// Step name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Whether [`SagaStep::compensate`] undoes anything.
    fn has_compensation(&self) -> bool {
        true
    }

    /// Run the step.
    async fn execute(&self, ctx: &mut C) -> Result<()>;

    /// Undo the step after a later step failed.
    async fn compensate(&self, _ctx: &C) -> Result<()> {
        Ok(())
    }
}

/// Outcome of one compensation.
#[derive(Debug)]
pub struct CompensationRecord {
    /// Step that was compensated.
    pub step: &'static str,
    /// Final state.
    pub state: CompensationState,
    /// Error text when the compensation failed.
    pub error: Option<String>,
}

/// A saga that stopped at a failing step.
#[derive(Debug)]
pub struct SagaFailure {
    /// Name of the failing step.
    pub step: &'static str,
    /// Error the step returned.
    pub error: Error,
    /// Compensations that ran, in execution order.
    pub compensations: Vec<CompensationRecord>,
}

impl SagaFailure {
    /// True when every compensation succeeded.
    pub fn is_fully_compensated(&self) -> bool {
        self.compensations
            .iter()
            .all(|c| c.state != CompensationState::Failed)
    }

    /// Collapse into a single error.
    ///
    /// A clean rollback yields the step's own error; otherwise
    /// `Error::CompensationFailed` naming the step and every failed
    /// compensation.
    pub fn into_error(self) -> Error {
        if self.is_fully_compensated() {
            return self.error;
        }
        let failures = self
            .compensations
            .iter()
            .filter(|c| c.state == CompensationState::Failed)
            .map(|c| format!("{}: {}", c.step, c.error.as_deref().unwrap_or_default()))
            .collect();
        Error::CompensationFailed {
            step: self.step,
            cause: self.error.to_string(),
            failures,
        }
    }
}

/// An ordered list of steps with reverse-order compensation.
pub struct Saga<C: Send + Sync> {
    name: &'static str,
    steps: Vec<Box<dyn SagaStep<C>>>,
}

impl<C: Send + Sync> Saga<C> {
    /// Create an empty saga.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            steps: Vec::new(),
        }
    }

    /// Append a step.
    pub fn step(mut self, step: impl SagaStep<C> + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Step names in execution order.
    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run every step, compensating on the first failure.
    pub async fn run(&self, ctx: &mut C) -> std::result::Result<(), SagaFailure> {
        let mut completed: Vec<(&dyn SagaStep<C>, CompensationState)> = Vec::new();

        for step in &self.steps {
            debug!(saga = self.name, step = step.name(), "Executing saga step");
            match step.execute(ctx).await {
                Ok(()) => {
                    let state = if step.has_compensation() {
                        CompensationState::Pending
                    } else {
                        CompensationState::None
                    };
                    completed.push((step.as_ref(), state));
                }
                Err(e) => {
                    warn!(
                        saga = self.name,
                        step = step.name(),
                        error = %e,
                        "Saga step failed, compensating"
                    );
                    let compensations = self.compensate(completed, ctx).await;
                    return Err(SagaFailure {
                        step: step.name(),
                        error: e,
                        compensations,
                    });
                }
            }
        }

        Ok(())
    }

    async fn compensate(
        &self,
        completed: Vec<(&dyn SagaStep<C>, CompensationState)>,
        ctx: &C,
    ) -> Vec<CompensationRecord> {
        let mut records = Vec::new();

        for (step, state) in completed.into_iter().rev() {
            if state != CompensationState::Pending {
                continue;
            }
            debug!(
                saga = self.name,
                step = step.name(),
                state = CompensationState::Triggered.as_str(),
                "Compensating saga step"
            );
            let record = match step.compensate(ctx).await {
                Ok(()) => CompensationRecord {
                    step: step.name(),
                    state: CompensationState::Completed,
                    error: None,
                },
                Err(e) => {
                    error!(
                        saga = self.name,
                        step = step.name(),
                        error = %e,
                        "Compensation failed"
                    );
                    CompensationRecord {
                        step: step.name(),
                        state: CompensationState::Failed,
                        error: Some(e.to_string()),
                    }
                }
            };
            records.push(record);
        }

        info!(
            saga = self.name,
            count = records.len(),
            failed = records
                .iter()
                .filter(|r| r.state == CompensationState::Failed)
                .count(),
            "Compensation finished"
        );
        records
    }
}
