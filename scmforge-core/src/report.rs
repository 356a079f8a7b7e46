//! Aggregation of batch outcomes.

use std::fmt;

use crate::model::{CreateOutcome, FailureReason};

/// Summary of a finished batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub created: Vec<String>,
    pub already_existed: Vec<String>,
    pub failed: Vec<(String, FailureReason)>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a report from a complete outcome list.
    pub fn from_outcomes<I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = CreateOutcome>,
    {
        let mut report = Self::new();
        for outcome in outcomes {
            report.record(outcome);
        }
        report
    }

    /// Add one outcome.
    pub fn record(&mut self, outcome: CreateOutcome) {
        match outcome {
            CreateOutcome::Created(name) => self.created.push(name),
            CreateOutcome::AlreadyExists(name) => self.already_existed.push(name),
            CreateOutcome::Failed { name, reason } => self.failed.push((name, reason)),
        }
    }

    pub fn total(&self) -> usize {
        self.created.len() + self.already_existed.len() + self.failed.len()
    }

    /// True when no item failed. Already-existing objects count as success.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Emit the summary and every failure through `tracing`.
    pub fn log(&self) {
        tracing::info!("{}", self);
        for (name, reason) in &self.failed {
            tracing::error!(object = %name, "{}", reason);
        }
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} objects: {} created, {} already existed, {} failed",
            self.total(),
            self.created.len(),
            self.already_existed.len(),
            self.failed.len()
        )
    }
}

impl FromIterator<CreateOutcome> for BatchReport {
    fn from_iter<I: IntoIterator<Item = CreateOutcome>>(iter: I) -> Self {
        Self::from_outcomes(iter)
    }
}
