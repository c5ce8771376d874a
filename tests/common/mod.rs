//! Shared helpers for integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

/// Whether the git command-line client is present on this machine
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// A local directory tree acting as the clone endpoint:
/// `<root>/<organization>/<repository>` git repositories served over `file://`
pub struct GitFixture {
    pub root: TempDir,
}

impl GitFixture {
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().expect("create fixture root"),
        }
    }

    /// Endpoint template resolving repositories inside this fixture
    pub fn endpoint(&self) -> String {
        format!(
            "file://{}/{{organization}}/{{repository}}",
            self.root.path().display()
        )
    }

    /// Create a repository with one commit containing `file_contents`
    pub fn add_repository(&self, organization: &str, name: &str, file_contents: &str) -> PathBuf {
        let repo_dir = self.root.path().join(organization).join(name);
        std::fs::create_dir_all(&repo_dir).expect("create repository directory");

        run_git(&repo_dir, &["init"]);
        std::fs::write(repo_dir.join("notes.txt"), file_contents).expect("write tracked file");
        run_git(&repo_dir, &["add", "."]);
        run_git(
            &repo_dir,
            &[
                "-c",
                "user.name=integration-test",
                "-c",
                "user.email=test@example.invalid",
                "commit",
                "-m",
                "initial commit",
            ],
        );
        repo_dir
    }
}

fn run_git(working_directory: &Path, arguments: &[&str]) {
    let output = Command::new("git")
        .args(arguments)
        .current_dir(working_directory)
        .output()
        .expect("git could not be started");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        arguments,
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Write an executable detector stub that prints the given stdout lines and
/// exits with `exit_code`
#[cfg(unix)]
pub fn write_detector_stub(dir: &Path, name: &str, stdout_lines: &[&str], exit_code: i32) {
    use std::os::unix::fs::PermissionsExt;

    let mut script = String::from("#!/bin/sh\n");
    for line in stdout_lines {
        script.push_str(&format!("echo '{}'\n", line));
    }
    script.push_str("echo 'detector diagnostics' >&2\n");
    script.push_str(&format!("exit {}\n", exit_code));

    let path = dir.join(name);
    std::fs::write(&path, script).expect("write detector stub");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("make detector stub executable");
}
