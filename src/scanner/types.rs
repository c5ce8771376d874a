//! Scan job data model and result document types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Source code management system hosting the repositories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Scm {
    Github,
    AzureDevops,
    Custom,
}

/// Job-level status, `ready → running → {success, failure}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Ready,
    Running,
    Success,
    Failure,
}

/// Terminal status of a single repository scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Failure,
}

/// Which findings the detector reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    Verified,
    All,
}

/// One repository to clone and scan, as described by the configuration document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepositoryTarget {
    pub organization: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, rename = "since-commit", skip_serializing_if = "Option::is_none")]
    pub since_commit: Option<String>,
    #[serde(default, rename = "max-depth", skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl RepositoryTarget {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.organization, self.name)
    }
}

/// Per-repository result record
///
/// Written exactly once by the worker that processed the target, then never
/// mutated. `findings` holds the raw detector records untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryOutcome {
    pub scan_uuid: Uuid,
    pub organization: String,
    pub repository: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub findings: Vec<serde_json::Value>,
    pub status: OutcomeStatus,
}

impl RepositoryOutcome {
    pub fn success(
        target: &RepositoryTarget,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        findings: Vec<serde_json::Value>,
    ) -> Self {
        Self {
            scan_uuid: Uuid::new_v4(),
            organization: target.organization.clone(),
            repository: target.name.clone(),
            start,
            end,
            metadata: target.metadata.clone(),
            findings,
            status: OutcomeStatus::Success,
        }
    }

    pub fn failure(target: &RepositoryTarget, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            scan_uuid: Uuid::new_v4(),
            organization: target.organization.clone(),
            repository: target.name.clone(),
            start,
            end,
            metadata: target.metadata.clone(),
            findings: Vec::new(),
            status: OutcomeStatus::Failure,
        }
    }
}

/// One execution of the scan across a repository list
#[derive(Debug, Clone)]
pub struct ScanJob {
    pub scan_identifier: String,
    pub scan_uuid: Uuid,
    pub scm: Scm,
    pub mode: ScanMode,
    pub status: ScanStatus,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl ScanJob {
    pub fn new(scan_identifier: String, scan_uuid: Uuid, scm: Scm, mode: ScanMode) -> Self {
        Self {
            scan_identifier,
            scan_uuid,
            scm,
            mode,
            status: ScanStatus::Ready,
            start: None,
            end: None,
        }
    }
}

/// Job-level result document, serialized once per scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub scan_type: String,
    pub scan_mode: ScanMode,
    pub scan_uuid: Uuid,
    pub scan_identifier: String,
    pub scm: Scm,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub status: ScanStatus,
    pub scan_context: String,
    pub results: Vec<RepositoryOutcome>,
}

impl ScanReport {
    /// Build the document for a finished job. Per-repository results are only
    /// reported when the job itself succeeded; a job that failed before or
    /// during fan-out publishes an empty list.
    pub fn new(job: &ScanJob, outcomes: Vec<RepositoryOutcome>) -> Self {
        let results = if job.status == ScanStatus::Success {
            outcomes
        } else {
            Vec::new()
        };

        Self {
            scan_type: "detection".to_string(),
            scan_mode: job.mode,
            scan_uuid: job.scan_uuid,
            scan_identifier: job.scan_identifier.clone(),
            scm: job.scm,
            start: job.start,
            end: job.end,
            status: job.status,
            scan_context: "repository".to_string(),
            results,
        }
    }
}
