//! Job-level report invariants, exercised through the public coordinator API
//! with in-process fakes for the clone and detector stages.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use secretscan::scanner::api::{
    CoordinatorSettings, RepositoryCloner, RepositoryTarget, ScanCoordinator, ScanCredentials,
    ScanExecutor, ScanJob, ScanMode, ScanReport, ScanStatus, Scm, TaskContext, Workspace,
};
use secretscan::scanner::{ScanError, ScanResult};

struct CountingCloner {
    calls: AtomicUsize,
}

#[async_trait]
impl RepositoryCloner for CountingCloner {
    async fn clone_repository(
        &self,
        _endpoint: &str,
        _target: &RepositoryTarget,
        _credentials: &ScanCredentials,
        _ctx: &TaskContext,
    ) -> ScanResult<Workspace> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Workspace::create()
    }
}

struct StubExecutor {
    fail_for: Vec<String>,
}

#[async_trait]
impl ScanExecutor for StubExecutor {
    async fn scan(
        &self,
        workspace: Workspace,
        target: &RepositoryTarget,
        ctx: &TaskContext,
    ) -> ScanResult<Vec<serde_json::Value>> {
        workspace.cleanup(&ctx.execution_id);
        if self.fail_for.contains(&target.name) {
            return Err(ScanError::Detector {
                message: "detector exited with status 2".to_string(),
            });
        }
        Ok(vec![serde_json::json!({"DetectorName": "stub"})])
    }
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

fn write_configuration(folder: &std::path::Path, repositories: usize) {
    let targets: Vec<_> = (0..repositories)
        .map(|index| serde_json::json!({"organization": "acme", "name": format!("repo{}", index)}))
        .collect();
    let document = serde_json::json!({
        "endpoint": "https://git.example/{organization}/{repository}",
        "repositories": targets,
    });
    std::fs::write(
        folder.join("repositories_to_scan.json"),
        serde_json::to_string_pretty(&document).unwrap(),
    )
    .unwrap();
}

fn read_report(path: &std::path::Path) -> ScanReport {
    let raw = std::fs::read_to_string(path).unwrap();
    serde_json::from_str(&raw).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn twenty_targets_through_five_workers_yield_twenty_unique_outcomes() {
    let scanner_folder = tempfile::tempdir().unwrap();
    write_configuration(scanner_folder.path(), 20);

    let cloner = Arc::new(CountingCloner {
        calls: AtomicUsize::new(0),
    });
    let mut coordinator = ScanCoordinator::new(
        job(),
        CoordinatorSettings {
            scanner_folder: scanner_folder.path().to_path_buf(),
            concurrency: 5,
        },
        cloner.clone(),
        Arc::new(StubExecutor {
            fail_for: vec!["repo3".to_string(), "repo11".to_string()],
        }),
    );

    let summary = coordinator.scan(&credentials()).await.unwrap();
    assert_eq!(summary.status, ScanStatus::Success);
    assert_eq!(cloner.calls.load(Ordering::SeqCst), 20);

    let report = read_report(&summary.report_path);
    assert_eq!(report.results.len(), 20);

    let repositories: HashSet<_> = report
        .results
        .iter()
        .map(|outcome| outcome.repository.as_str())
        .collect();
    assert_eq!(repositories.len(), 20, "duplicate repository outcome");

    let identities: HashSet<_> = report
        .results
        .iter()
        .map(|outcome| outcome.scan_uuid)
        .collect();
    assert_eq!(identities.len(), 20, "duplicate outcome identity");
}

#[tokio::test]
async fn schema_violation_produces_a_failure_report_without_cloning() {
    let scanner_folder = tempfile::tempdir().unwrap();
    // "repository" is not a valid field name
    std::fs::write(
        scanner_folder.path().join("repositories_to_scan.json"),
        r#"{"endpoint": "https://git.example/{organization}/{repository}",
            "repositories": [{"organization": "acme", "repository": "repo1"}]}"#,
    )
    .unwrap();

    let cloner = Arc::new(CountingCloner {
        calls: AtomicUsize::new(0),
    });
    let mut coordinator = ScanCoordinator::new(
        job(),
        CoordinatorSettings {
            scanner_folder: scanner_folder.path().to_path_buf(),
            concurrency: 5,
        },
        cloner.clone(),
        Arc::new(StubExecutor { fail_for: vec![] }),
    );

    let summary = coordinator.scan(&credentials()).await.unwrap();

    assert_eq!(summary.status, ScanStatus::Failure);
    assert_eq!(cloner.calls.load(Ordering::SeqCst), 0);

    let report = read_report(&summary.report_path);
    assert_eq!(report.status, ScanStatus::Failure);
    assert!(report.results.is_empty());
}

#[tokio::test]
async fn report_carries_job_identity_and_timing() {
    let scanner_folder = tempfile::tempdir().unwrap();
    write_configuration(scanner_folder.path(), 1);

    let job = job();
    let scan_uuid = job.scan_uuid;
    let mut coordinator = ScanCoordinator::new(
        job,
        CoordinatorSettings {
            scanner_folder: scanner_folder.path().to_path_buf(),
            concurrency: 1,
        },
        Arc::new(CountingCloner {
            calls: AtomicUsize::new(0),
        }),
        Arc::new(StubExecutor { fail_for: vec![] }),
    );

    let summary = coordinator.scan(&credentials()).await.unwrap();
    let report = read_report(&summary.report_path);

    assert_eq!(report.scan_uuid, scan_uuid);
    assert_eq!(report.scan_identifier, "weekly");
    assert_eq!(report.scm, Scm::Github);
    assert_eq!(report.scan_mode, ScanMode::All);
    let start = report.start.expect("job start recorded");
    let end = report.end.expect("job end recorded");
    assert!(end >= start);
}
