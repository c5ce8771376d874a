//! Detector execution and output interpretation
//!
//! The external detector is invoked once per repository as a black-box
//! subprocess producing line-delimited JSON findings on stdout and diagnostic
//! text on stderr. A failed run is a per-repository failure, never retried.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::scanner::error::{ScanError, ScanResult};
use crate::scanner::task::TaskContext;
use crate::scanner::types::RepositoryTarget;
use crate::scanner::workspace::Workspace;

/// Location and behavior of the external detector executable
#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub installation_path: PathBuf,
    pub executable_name: String,
    pub report_only_verified: bool,
    /// Optional external rule-configuration file passed as `--config`
    pub rule_configuration: Option<PathBuf>,
}

impl DetectorSettings {
    pub fn executable(&self) -> PathBuf {
        self.installation_path.join(&self.executable_name)
    }
}

/// Abstraction over running the detector against a cloned workspace
///
/// Implementations consume the workspace and remove it on every path, success
/// and failure alike.
#[async_trait]
pub trait ScanExecutor: Send + Sync {
    async fn scan(
        &self,
        workspace: Workspace,
        target: &RepositoryTarget,
        ctx: &TaskContext,
    ) -> ScanResult<Vec<serde_json::Value>>;
}

/// Executor that spawns the detector subprocess
pub struct DetectorExecutor {
    settings: DetectorSettings,
}

impl DetectorExecutor {
    pub fn new(settings: DetectorSettings) -> Self {
        Self { settings }
    }

    /// Build the full argument list for one repository scan
    fn command_arguments(&self, workspace_path: &Path, target: &RepositoryTarget) -> Vec<String> {
        let mut arguments = vec![
            "git".to_string(),
            "--no-update".to_string(),
            "--json".to_string(),
        ];
        if self.settings.report_only_verified {
            arguments.push("--only-verified".to_string());
        }
        if let Some(since_commit) = &target.since_commit {
            arguments.push(format!("--since-commit={}", since_commit));
        }
        if let Some(branch) = &target.branch {
            arguments.push(format!("--branch={}", branch));
        }
        if let Some(max_depth) = target.max_depth {
            arguments.push(format!("--max-depth={}", max_depth));
        }
        if let Some(rules) = &self.settings.rule_configuration {
            arguments.push(format!("--config={}", rules.display()));
        }
        arguments.push(format!("file://{}", workspace_path.display()));
        arguments
    }

    async fn run_detector(
        &self,
        workspace_path: &Path,
        target: &RepositoryTarget,
        ctx: &TaskContext,
    ) -> ScanResult<Vec<serde_json::Value>> {
        let executable = self.settings.executable();
        let arguments = self.command_arguments(workspace_path, target);
        log::debug!(
            "({}) Scanning command to execute: {} {}",
            ctx.execution_id,
            executable.display(),
            arguments.join(" ")
        );

        let mut child = Command::new(&executable)
            .args(&arguments)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|error| ScanError::Detector {
                message: format!("{} could not be started: {}", executable.display(), error),
            })?;

        let stdout = child.stdout.take().ok_or_else(|| ScanError::Detector {
            message: "detector stdout was not captured".to_string(),
        })?;
        let stderr = child.stderr.take().ok_or_else(|| ScanError::Detector {
            message: "detector stderr was not captured".to_string(),
        })?;

        // Drain both streams to completion before waiting on the process, so
        // neither pipe can fill up and deadlock the detector.
        let collect_stdout = async {
            let mut lines = BufReader::new(stdout).lines();
            let mut collected = Vec::new();
            while let Some(line) = lines.next_line().await? {
                collected.push(line);
            }
            Ok::<_, std::io::Error>(collected)
        };
        let execution_id = ctx.execution_id.clone();
        let forward_stderr = async {
            let mut lines = BufReader::new(stderr).lines();
            while let Some(line) = lines.next_line().await? {
                if !line.is_empty() {
                    log::debug!("DETECTOR ({}): {}", execution_id, line);
                }
            }
            Ok::<_, std::io::Error>(())
        };
        let (raw_lines, ()) = tokio::try_join!(collect_stdout, forward_stderr)?;

        let status = child.wait().await?;
        if !status.success() {
            return Err(ScanError::Detector {
                message: format!("detector exited with status {}", status),
            });
        }

        let mut findings = Vec::new();
        for line in raw_lines {
            if line.trim().is_empty() {
                continue;
            }
            // Malformed lines are skipped, not fatal.
            match serde_json::from_str(&line) {
                Ok(finding) => findings.push(finding),
                Err(_) => log::debug!(
                    "({}) Skipping malformed detector output line: {}",
                    ctx.execution_id,
                    line
                ),
            }
        }
        Ok(findings)
    }
}

#[async_trait]
impl ScanExecutor for DetectorExecutor {
    async fn scan(
        &self,
        workspace: Workspace,
        target: &RepositoryTarget,
        ctx: &TaskContext,
    ) -> ScanResult<Vec<serde_json::Value>> {
        let result = self.run_detector(workspace.path(), target, ctx).await;
        // Guaranteed cleanup whether scanning succeeded or failed.
        workspace.cleanup(&ctx.execution_id);
        result
    }
}
