//! Clone workspaces and the repository cloner
//!
//! Each repository is cloned into an exclusively-owned temporary directory
//! whose lifetime is bounded to one target's processing. Removal is guaranteed
//! on every exit path: explicitly through [`Workspace::cleanup`], with Drop as
//! the backstop.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::process::Command;

use crate::scanner::credentials::{self, ScanCredentials};
use crate::scanner::error::{ScanError, ScanResult};
use crate::scanner::task::TaskContext;
use crate::scanner::types::RepositoryTarget;

/// Exclusively-owned temporary directory holding one cloned repository
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh, uniquely-named workspace directory
    pub fn create() -> ScanResult<Self> {
        let dir = tempfile::Builder::new().prefix("secretscan-").tempdir()?;
        Ok(Self { dir })
    }

    /// Create a workspace under a specific parent directory
    pub fn create_in(parent: &Path) -> ScanResult<Self> {
        let dir = tempfile::Builder::new()
            .prefix("secretscan-")
            .tempdir_in(parent)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Delete the workspace. Removal failures are logged, not raised: a
    /// leftover directory must not turn a finished scan into a failure.
    pub fn cleanup(self, execution_id: &str) {
        let path = self.dir.path().to_path_buf();
        log::debug!(
            "({}) Deleting local repository: {}",
            execution_id,
            path.display()
        );
        if let Err(error) = self.dir.close() {
            log::error!(
                "({}) An error occurred while deleting local repository {}: {}",
                execution_id,
                path.display(),
                error
            );
        }
    }
}

/// Substitute the organization/repository placeholders in the endpoint template
pub fn format_clone_url(endpoint: &str, target: &RepositoryTarget) -> String {
    endpoint
        .replace("{organization}", &target.organization)
        .replace("{repository}", &target.name)
}

/// Abstraction over cloning one repository into a fresh workspace
#[async_trait]
pub trait RepositoryCloner: Send + Sync {
    async fn clone_repository(
        &self,
        endpoint: &str,
        target: &RepositoryTarget,
        credentials: &ScanCredentials,
        ctx: &TaskContext,
    ) -> ScanResult<Workspace>;
}

/// Cloner backed by the git command-line client
///
/// Interactive prompts are disabled and credentials flow through the askpass
/// bridge via environment variables set on the child process only.
pub struct GitCloner {
    git_executable: String,
    credential_bridge: Option<PathBuf>,
    workspace_parent: Option<PathBuf>,
}

impl GitCloner {
    pub fn new(credential_bridge: Option<PathBuf>) -> Self {
        Self {
            git_executable: "git".to_string(),
            credential_bridge,
            workspace_parent: None,
        }
    }

    /// Place workspaces under `parent` instead of the system temp directory
    pub fn with_workspace_parent(mut self, parent: PathBuf) -> Self {
        self.workspace_parent = Some(parent);
        self
    }

    fn create_workspace(&self) -> ScanResult<Workspace> {
        match &self.workspace_parent {
            Some(parent) => Workspace::create_in(parent),
            None => Workspace::create(),
        }
    }
}

#[async_trait]
impl RepositoryCloner for GitCloner {
    async fn clone_repository(
        &self,
        endpoint: &str,
        target: &RepositoryTarget,
        scan_credentials: &ScanCredentials,
        ctx: &TaskContext,
    ) -> ScanResult<Workspace> {
        let url = format_clone_url(endpoint, target);
        let workspace = self.create_workspace()?;
        log::debug!(
            "({}) Cloning repository {} into {}",
            ctx.execution_id,
            url,
            workspace.path().display()
        );

        let mut command = Command::new(&self.git_executable);
        command
            .arg("clone")
            .arg(&url)
            .arg(workspace.path())
            .env("GIT_TERMINAL_PROMPT", "0")
            .env(credentials::USERNAME_VAR, &scan_credentials.username)
            .env(credentials::TOKEN_VAR, &scan_credentials.token)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(bridge) = &self.credential_bridge {
            command.env("GIT_ASKPASS", bridge);
        }

        let output = command.output().await.map_err(|error| ScanError::Clone {
            repository: target.full_name(),
            message: format!("git could not be started: {}", error),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // The partially created workspace is removed before the error
            // surfaces; the caller never observes an orphaned directory.
            workspace.cleanup(&ctx.execution_id);
            return Err(ScanError::Clone {
                repository: target.full_name(),
                message: stderr.trim().to_string(),
            });
        }

        log::debug!("({}) Repository cloned: {}", ctx.execution_id, url);
        Ok(workspace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(organization: &str, name: &str) -> RepositoryTarget {
        RepositoryTarget {
            organization: organization.to_string(),
            name: name.to_string(),
            branch: None,
            since_commit: None,
            max_depth: None,
            metadata: None,
        }
    }

    fn credentials() -> ScanCredentials {
        ScanCredentials {
            username: "scan-bot".to_string(),
            token: "tok".to_string(),
        }
    }

    fn git_available() -> bool {
        std::process::Command::new("git")
            .arg("--version")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    #[test]
    fn clone_url_substitutes_both_placeholders() {
        let url = format_clone_url(
            "https://git.example/{organization}/{repository}.git",
            &target("acme", "repo1"),
        );
        assert_eq!(url, "https://git.example/acme/repo1.git");
    }

    #[test]
    fn workspace_cleanup_removes_the_directory() {
        let workspace = Workspace::create().unwrap();
        let path = workspace.path().to_path_buf();
        std::fs::write(path.join("marker"), "x").unwrap();

        workspace.cleanup("test0000");

        assert!(!path.exists());
    }

    #[test]
    fn workspace_drop_removes_the_directory() {
        let path = {
            let workspace = Workspace::create().unwrap();
            workspace.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn failed_clone_leaves_no_workspace_behind() {
        if !git_available() {
            eprintln!("skipping: git not available");
            return;
        }

        let missing = tempfile::tempdir().unwrap();
        let parent = tempfile::tempdir().unwrap();
        let endpoint = format!(
            "file://{}/{{organization}}/{{repository}}",
            missing.path().display()
        );
        let cloner = GitCloner::new(None).with_workspace_parent(parent.path().to_path_buf());
        let ctx = TaskContext::new();

        let result = cloner
            .clone_repository(&endpoint, &target("acme", "absent"), &credentials(), &ctx)
            .await;

        assert!(matches!(result, Err(ScanError::Clone { .. })));
        let leftover = std::fs::read_dir(parent.path()).unwrap().count();
        assert_eq!(leftover, 0, "clone failure leaked a workspace directory");
    }
}
