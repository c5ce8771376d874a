//! Detector installation
//!
//! The detector ships an upstream install script; it is downloaded with the
//! generic retry policy, executed against the target directory, and the
//! resulting binary is made executable.

use std::path::PathBuf;

use tokio::process::Command;

use crate::core::retry::{retry_backoff, BackoffPolicy};
use crate::lifecycle::error::LifecycleError;

/// Upstream installer for the default detector
pub const DEFAULT_INSTALL_SCRIPT_URL: &str =
    "https://raw.githubusercontent.com/trufflesecurity/trufflehog/main/scripts/install.sh";

#[derive(Debug, Clone)]
pub struct DetectorInstall {
    pub script_url: String,
    pub installation_path: PathBuf,
    /// Pinned detector version; latest when absent
    pub version: Option<String>,
}

/// Download the install script, run it, and make the binary executable
pub async fn install_detector(
    install: &DetectorInstall,
    executable_name: &str,
) -> Result<(), LifecycleError> {
    log::info!("Installing detector...");
    log::debug!(
        "Detector installation path: {}",
        install.installation_path.display()
    );
    log::debug!("Detector version: {:?}", install.version);

    tokio::fs::create_dir_all(&install.installation_path).await?;

    let script_url = install.script_url.as_str();
    let script = retry_backoff(
        "detector install script download",
        &BackoffPolicy::default(),
        || async move {
            let response = reqwest::get(script_url).await?;
            response.error_for_status()?.text().await
        },
    )
    .await?;

    let staging = tempfile::tempdir()?;
    let script_path = staging.path().join("install.sh");
    tokio::fs::write(&script_path, script).await?;

    let mut command = Command::new("sh");
    command
        .arg(&script_path)
        .arg("-b")
        .arg(&install.installation_path);
    if let Some(version) = &install.version {
        command.arg(format!("v{}", version));
    }

    let output = command.output().await?;
    if !output.status.success() {
        return Err(LifecycleError::Install {
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let binary = install.installation_path.join(executable_name);
        tokio::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).await?;
    }
    #[cfg(not(unix))]
    let _ = executable_name;

    log::info!("Detector has been installed successfully.");
    Ok(())
}
