//! Scan coordination across a bounded worker pool
//!
//! Owns the job state machine `ready → running → {success, failure}`. Every
//! target is submitted immediately; a semaphore bounds how many clone/scan
//! pipelines run at once. Each task is individually fault-isolated, and the
//! job-level result document is produced in a guaranteed step regardless of
//! which terminal status was reached.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;

use crate::core::error_handling::log_error_with_context;
use crate::scanner::aggregator::ResultAggregator;
use crate::scanner::config::{ScanConfiguration, CONFIGURATION_FILE};
use crate::scanner::credentials::ScanCredentials;
use crate::scanner::detector::ScanExecutor;
use crate::scanner::error::{ScanError, ScanResult};
use crate::scanner::task;
use crate::scanner::types::{ScanJob, ScanReport, ScanStatus};
use crate::scanner::workspace::RepositoryCloner;

/// Default upper bound on simultaneous clone/scan pipelines
pub const DEFAULT_CONCURRENCY: usize = 20;

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Folder holding the configuration document and receiving the report
    pub scanner_folder: PathBuf,
    pub concurrency: usize,
}

/// Summary handed back to the lifecycle layer after the report write
#[derive(Debug, Clone)]
pub struct ScanSummary {
    pub status: ScanStatus,
    pub report_path: PathBuf,
}

/// Drives one scan job from ready to a terminal status
pub struct ScanCoordinator {
    job: ScanJob,
    settings: CoordinatorSettings,
    cloner: Arc<dyn RepositoryCloner>,
    executor: Arc<dyn ScanExecutor>,
    aggregator: Arc<ResultAggregator>,
}

impl ScanCoordinator {
    pub fn new(
        job: ScanJob,
        settings: CoordinatorSettings,
        cloner: Arc<dyn RepositoryCloner>,
        executor: Arc<dyn ScanExecutor>,
    ) -> Self {
        log::info!("Scanner initialized: {}", job.scan_identifier);
        log::info!("Source code management system to scan: {:?}", job.scm);
        log::debug!("Concurrency level: {}", settings.concurrency);
        Self {
            job,
            settings,
            cloner,
            executor,
            aggregator: Arc::new(ResultAggregator::new()),
        }
    }

    pub fn job(&self) -> &ScanJob {
        &self.job
    }

    /// Run the scan to a terminal status.
    ///
    /// Job-level failures (credentials, configuration) are captured in the
    /// returned status; only a failure to produce the result document itself
    /// surfaces as an error.
    pub async fn scan(&mut self, credentials: &ScanCredentials) -> ScanResult<ScanSummary> {
        log::info!("Starting scan: {}", self.job.scan_identifier);
        self.job.start = Some(Utc::now());

        match self.execute(credentials).await {
            Ok(()) => {
                self.job.status = ScanStatus::Success;
                log::info!("Scan completed: {}", self.job.scan_identifier);
            }
            Err(error) => {
                self.job.status = ScanStatus::Failure;
                log_error_with_context(
                    &error,
                    &format!("Scan failed: {}", self.job.scan_identifier),
                );
            }
        }
        self.job.end = Some(Utc::now());

        let report_path = self.write_report()?;
        Ok(ScanSummary {
            status: self.job.status,
            report_path,
        })
    }

    async fn execute(&mut self, credentials: &ScanCredentials) -> ScanResult<()> {
        credentials.ensure_present()?;

        let configuration_path = self.settings.scanner_folder.join(CONFIGURATION_FILE);
        let configuration = ScanConfiguration::load(&configuration_path)?;

        // The job only transitions to running once its inputs are known good;
        // a validation failure goes straight to failure with zero fan-out.
        self.job.status = ScanStatus::Running;
        self.fan_out(&configuration, credentials).await;
        Ok(())
    }

    /// Submit one task per target and wait for full pool drain
    async fn fan_out(&self, configuration: &ScanConfiguration, credentials: &ScanCredentials) {
        let repositories = &configuration.repositories;
        log::info!(
            "Scanning {} repositor{} with {} worker{}...",
            repositories.len(),
            if repositories.len() > 1 { "ies" } else { "y" },
            self.settings.concurrency,
            if self.settings.concurrency > 1 { "s" } else { "" }
        );

        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency.max(1)));
        let mut handles = Vec::with_capacity(repositories.len());
        let mut submitted = Vec::with_capacity(repositories.len());

        for target in repositories.iter().cloned() {
            submitted.push(target.clone());
            let endpoint = configuration.endpoint.clone();
            let cloner = self.cloner.clone();
            let executor = self.executor.clone();
            let aggregator = self.aggregator.clone();
            let credentials = credentials.clone();
            let semaphore = semaphore.clone();

            handles.push(tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        // The semaphore is never closed while tasks are
                        // pending; record a failure rather than lose the slot.
                        aggregator.record_failure(&target, Utc::now(), Utc::now());
                        return;
                    }
                };
                task::process_repository(
                    &endpoint,
                    &target,
                    cloner.as_ref(),
                    executor.as_ref(),
                    &credentials,
                    &aggregator,
                )
                .await;
            }));
        }

        let joined = futures::future::join_all(handles).await;
        for (result, target) in joined.into_iter().zip(submitted) {
            if result.is_err() {
                // A panicked task recorded nothing; keep the one-outcome-per-
                // target invariant intact.
                log::error!(
                    "Worker for repository {} aborted unexpectedly",
                    target.full_name()
                );
                self.aggregator.record_failure(&target, Utc::now(), Utc::now());
            }
        }

        log::info!("All repositories processed.");
    }

    /// Guaranteed production of the job-level result document
    fn write_report(&self) -> ScanResult<PathBuf> {
        let outcomes = self.aggregator.drain();
        let report = ScanReport::new(&self.job, outcomes);

        let path = self
            .settings
            .scanner_folder
            .join(format!("{}.json", self.job.scan_uuid));
        log::info!("Saving all scan results to file: {}", path.display());

        let mut payload = serde_json::to_string(&report).map_err(|error| ScanError::Report {
            message: format!("report serialization failed: {}", error),
        })?;
        payload.push('\n');
        std::fs::write(&path, payload)?;

        log::info!("All scan results saved to file: {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::task::TaskContext;
    use crate::scanner::types::{OutcomeStatus, RepositoryTarget, ScanMode, Scm};
    use crate::scanner::workspace::Workspace;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    struct FakeCloner {
        calls: AtomicUsize,
        fail_for: Vec<String>,
    }

    impl FakeCloner {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_for: Vec::new(),
            }
        }

        fn failing_for(names: &[&str]) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_for: names.iter().map(|name| name.to_string()).collect(),
            }
        }
    }

    #[async_trait]
    impl RepositoryCloner for FakeCloner {
        async fn clone_repository(
            &self,
            _endpoint: &str,
            target: &RepositoryTarget,
            _credentials: &ScanCredentials,
            _ctx: &TaskContext,
        ) -> ScanResult<Workspace> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_for.contains(&target.name) {
                return Err(ScanError::Clone {
                    repository: target.full_name(),
                    message: "authentication failed".to_string(),
                });
            }
            Workspace::create()
        }
    }

    struct FakeExecutor;

    #[async_trait]
    impl ScanExecutor for FakeExecutor {
        async fn scan(
            &self,
            workspace: Workspace,
            _target: &RepositoryTarget,
            ctx: &TaskContext,
        ) -> ScanResult<Vec<serde_json::Value>> {
            workspace.cleanup(&ctx.execution_id);
            Ok(vec![serde_json::json!({"DetectorName": "stub"})])
        }
    }

    fn write_configuration(folder: &std::path::Path, repositories: usize) {
        let targets: Vec<_> = (0..repositories)
            .map(|index| {
                serde_json::json!({"organization": "acme", "name": format!("repo{}", index)})
            })
            .collect();
        let document = serde_json::json!({
            "endpoint": "https://git.example/{organization}/{repository}",
            "repositories": targets,
        });
        std::fs::write(
            folder.join(CONFIGURATION_FILE),
            serde_json::to_string(&document).unwrap(),
        )
        .unwrap();
    }

    fn job() -> ScanJob {
        ScanJob::new(
            "weekly".to_string(),
            Uuid::new_v4(),
            Scm::Github,
            ScanMode::All,
        )
    }

    fn credentials() -> ScanCredentials {
        ScanCredentials {
            username: "scan-bot".to_string(),
            token: "tok".to_string(),
        }
    }

    fn coordinator_with(
        folder: &std::path::Path,
        concurrency: usize,
        cloner: Arc<FakeCloner>,
    ) -> ScanCoordinator {
        ScanCoordinator::new(
            job(),
            CoordinatorSettings {
                scanner_folder: folder.to_path_buf(),
                concurrency,
            },
            cloner,
            Arc::new(FakeExecutor),
        )
    }

    fn read_report(summary: &ScanSummary) -> ScanReport {
        let raw = std::fs::read_to_string(&summary.report_path).unwrap();
        assert!(raw.ends_with('\n'), "report must be newline-terminated");
        serde_json::from_str(&raw).unwrap()
    }

    #[tokio::test]
    async fn every_target_yields_exactly_one_outcome() {
        let folder = tempfile::tempdir().unwrap();
        write_configuration(folder.path(), 4);
        let cloner = Arc::new(FakeCloner::failing_for(&["repo2"]));
        let mut coordinator = coordinator_with(folder.path(), 2, cloner.clone());

        let summary = coordinator.scan(&credentials()).await.unwrap();

        // Per-repository failures never fail the job itself.
        assert_eq!(summary.status, ScanStatus::Success);
        let report = read_report(&summary);
        assert_eq!(report.results.len(), 4);

        let failed: Vec<_> = report
            .results
            .iter()
            .filter(|outcome| outcome.status == OutcomeStatus::Failure)
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].repository, "repo2");
        assert_eq!(cloner.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn invalid_configuration_fails_without_fanning_out() {
        let folder = tempfile::tempdir().unwrap();
        std::fs::write(
            folder.path().join(CONFIGURATION_FILE),
            r#"{"endpoint": "https://git.example/{organization}/{repository}",
                "repositories": [{"organization": "acme", "name": "repo1", "owner": "bob"}]}"#,
        )
        .unwrap();
        let cloner = Arc::new(FakeCloner::new());
        let mut coordinator = coordinator_with(folder.path(), 2, cloner.clone());

        let summary = coordinator.scan(&credentials()).await.unwrap();

        assert_eq!(summary.status, ScanStatus::Failure);
        assert_eq!(cloner.calls.load(Ordering::SeqCst), 0);
        let report = read_report(&summary);
        assert!(report.results.is_empty());
    }

    #[tokio::test]
    async fn blank_credentials_fail_the_precondition_check() {
        let folder = tempfile::tempdir().unwrap();
        write_configuration(folder.path(), 2);
        let cloner = Arc::new(FakeCloner::new());
        let mut coordinator = coordinator_with(folder.path(), 2, cloner.clone());

        let blank = ScanCredentials {
            username: String::new(),
            token: String::new(),
        };
        let summary = coordinator.scan(&blank).await.unwrap();

        assert_eq!(summary.status, ScanStatus::Failure);
        assert_eq!(cloner.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn bounded_pool_processes_many_targets_without_corruption() {
        let folder = tempfile::tempdir().unwrap();
        write_configuration(folder.path(), 20);
        let cloner = Arc::new(FakeCloner::new());
        let mut coordinator = coordinator_with(folder.path(), 5, cloner.clone());

        let summary = coordinator.scan(&credentials()).await.unwrap();

        assert_eq!(summary.status, ScanStatus::Success);
        let report = read_report(&summary);
        assert_eq!(report.results.len(), 20);

        let repositories: std::collections::HashSet<_> = report
            .results
            .iter()
            .map(|outcome| outcome.repository.clone())
            .collect();
        assert_eq!(repositories.len(), 20, "duplicate repository outcome");
    }
}
