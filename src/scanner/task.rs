//! Per-repository scan task pipeline
//!
//! Each worker runs one repository through Clone → Scan → Aggregate with an
//! explicit task context. Every error is converted into a recorded failure;
//! nothing propagates to sibling tasks.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::scanner::aggregator::ResultAggregator;
use crate::scanner::credentials::ScanCredentials;
use crate::scanner::detector::ScanExecutor;
use crate::scanner::error::ScanResult;
use crate::scanner::types::{RepositoryOutcome, RepositoryTarget};
use crate::scanner::workspace::RepositoryCloner;

/// Explicit per-task context threaded through the pipeline
#[derive(Debug, Clone)]
pub struct TaskContext {
    /// Short identifier tagging every log line of this task
    pub execution_id: String,
    pub started: DateTime<Utc>,
}

impl TaskContext {
    pub fn new() -> Self {
        let mut execution_id = Uuid::new_v4().simple().to_string();
        execution_id.truncate(8);
        Self {
            execution_id,
            started: Utc::now(),
        }
    }
}

impl Default for TaskContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Run one repository through clone, scan and aggregation
///
/// Recording the outcome is the final step on both paths, so a completed task
/// has contributed exactly one entry.
pub async fn process_repository(
    endpoint: &str,
    target: &RepositoryTarget,
    cloner: &dyn RepositoryCloner,
    executor: &dyn ScanExecutor,
    credentials: &ScanCredentials,
    aggregator: &ResultAggregator,
) {
    let ctx = TaskContext::new();
    log::info!(
        "({}) Scanning repository: {} (organization: {})",
        ctx.execution_id,
        target.name,
        target.organization
    );

    match scan_one(endpoint, target, cloner, executor, credentials, &ctx).await {
        Ok(findings) => {
            let end = Utc::now();
            log::info!(
                "({}) Number of secrets found in repository {}: {}",
                ctx.execution_id,
                target.full_name(),
                findings.len()
            );
            aggregator.record_success(RepositoryOutcome::success(
                target,
                ctx.started,
                end,
                findings,
            ));
        }
        Err(error) => {
            log::error!(
                "({}) An error occurred while processing repository {}: {}",
                ctx.execution_id,
                target.full_name(),
                error
            );
            aggregator.record_failure(target, ctx.started, Utc::now());
        }
    }
}

async fn scan_one(
    endpoint: &str,
    target: &RepositoryTarget,
    cloner: &dyn RepositoryCloner,
    executor: &dyn ScanExecutor,
    credentials: &ScanCredentials,
    ctx: &TaskContext,
) -> ScanResult<Vec<serde_json::Value>> {
    let workspace = cloner
        .clone_repository(endpoint, target, credentials, ctx)
        .await?;
    executor.scan(workspace, target, ctx).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_ids_are_short_and_unique() {
        let first = TaskContext::new();
        let second = TaskContext::new();

        assert_eq!(first.execution_id.len(), 8);
        assert_ne!(first.execution_id, second.execution_id);
    }
}
