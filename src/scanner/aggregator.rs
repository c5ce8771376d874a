//! Thread-safe accumulation of per-repository outcomes
//!
//! Outcomes arrive from any worker in completion order. Each append is a
//! single mutual-exclusion section, and the list is drained exactly once
//! after the worker pool has joined. No ordering is promised.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};

use crate::scanner::types::{RepositoryOutcome, RepositoryTarget};

#[derive(Debug, Default)]
pub struct ResultAggregator {
    outcomes: Mutex<Vec<RepositoryOutcome>>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of a successfully scanned repository
    pub fn record_success(&self, outcome: RepositoryOutcome) {
        self.lock().push(outcome);
    }

    /// Record a failed repository: empty findings, failure status
    pub fn record_failure(
        &self,
        target: &RepositoryTarget,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) {
        self.lock()
            .push(RepositoryOutcome::failure(target, start, end));
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Hand the accumulated outcomes to report building, leaving the
    /// aggregator empty. Called once, after all workers have completed.
    pub fn drain(&self) -> Vec<RepositoryOutcome> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<RepositoryOutcome>> {
        // A worker can only poison the lock by panicking mid-push; the list
        // itself stays consistent, so recover rather than propagate.
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
