//! Scan credentials: secret-store resolution and the git credential bridge
//!
//! Credentials are resolved once per job and passed by reference to each
//! worker; they reach clone subprocesses through environment variables scoped
//! to the child process, never the process-global environment.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::cloud::SecretStore;
use crate::scanner::error::{ScanError, ScanResult};

/// Environment variable carrying the clone username
pub const USERNAME_VAR: &str = "SECRETSCAN_USERNAME";
/// Environment variable carrying the clone token
pub const TOKEN_VAR: &str = "SECRETSCAN_TOKEN";

// Askpass script registered as the git credential helper. Answers git's
// Username/Password prompts from the scan environment variables so tokens are
// never written to disk or passed on a command line.
const CREDENTIAL_BRIDGE: &str = r#"#!/bin/sh
case "$1" in
    Username*) printf '%s\n' "$SECRETSCAN_USERNAME" ;;
    Password*) printf '%s\n' "$SECRETSCAN_TOKEN" ;;
esac
"#;

/// Credentials used to authenticate repository clones
#[derive(Clone)]
pub struct ScanCredentials {
    pub username: String,
    pub token: String,
}

// The token never appears in logs or debug output.
impl fmt::Debug for ScanCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanCredentials")
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[derive(Deserialize)]
struct SecretPayload {
    username: String,
    token: String,
}

impl ScanCredentials {
    /// Fetch and parse the credential payload from the secret store
    pub async fn resolve(store: &dyn SecretStore, reference: &str) -> ScanResult<Self> {
        log::info!("Retrieving credentials used for scan: {}", reference);
        let payload = store.fetch(reference).await?;

        let parsed: SecretPayload =
            serde_json::from_str(&payload).map_err(|_| ScanError::Configuration {
                message: format!(
                    "Credential secret '{}' is not a JSON object with username and token fields",
                    reference
                ),
            })?;

        Ok(Self {
            username: parsed.username,
            token: parsed.token,
        })
    }

    /// Read credentials already present in the environment
    ///
    /// Used when a prior provisioning step exported them; absence is a
    /// precondition failure, not a fetch failure.
    pub fn from_env() -> ScanResult<Self> {
        let username = std::env::var(USERNAME_VAR).ok().filter(|v| !v.is_empty());
        let token = std::env::var(TOKEN_VAR).ok().filter(|v| !v.is_empty());

        match (username, token) {
            (Some(username), Some(token)) => Ok(Self { username, token }),
            _ => Err(missing_credentials()),
        }
    }

    /// Precondition check performed before any repository work starts
    pub fn ensure_present(&self) -> ScanResult<()> {
        if self.username.is_empty() || self.token.is_empty() {
            Err(missing_credentials())
        } else {
            Ok(())
        }
    }
}

fn missing_credentials() -> ScanError {
    ScanError::CredentialsMissing {
        missing: format!("{}, {}", USERNAME_VAR, TOKEN_VAR),
    }
}

/// Write the credential bridge script and register it as the git credential
/// helper for the scanning user. Returns the script path for use as
/// `GIT_ASKPASS`.
pub async fn install_credential_bridge(
    scanner_folder: &Path,
    home: Option<&Path>,
) -> ScanResult<PathBuf> {
    let script_path = scanner_folder.join("git-credential-bridge.sh");

    log::info!(
        "Configuring git credential helper: {}",
        script_path.display()
    );
    tokio::fs::create_dir_all(scanner_folder).await?;
    tokio::fs::write(&script_path, CREDENTIAL_BRIDGE).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&script_path, std::fs::Permissions::from_mode(0o755)).await?;
    }

    let mut command = tokio::process::Command::new("git");
    command
        .args(["config", "--global", "credential.helper"])
        .arg(&script_path);
    if let Some(home) = home {
        // git honors XDG_CONFIG_HOME over HOME; clear it so the helper lands
        // in the scanning user's own configuration.
        command.env("HOME", home).env_remove("XDG_CONFIG_HOME");
    }
    let status = command
        .status()
        .await
        .map_err(|error| ScanError::Command {
            message: format!("git config could not be started: {}", error),
        })?;

    if !status.success() {
        return Err(ScanError::Command {
            message: format!("git config exited with status {}", status),
        });
    }

    Ok(script_path)
}

/// Persist the credential variables for host-level service supervision.
/// The file is readable by its owner only.
pub async fn write_service_environment(
    file_path: &Path,
    credentials: &ScanCredentials,
) -> ScanResult<()> {
    log::info!(
        "Persisting environment variables for service: {}",
        file_path.display()
    );

    let contents = format!(
        "{}={}\n{}={}\n",
        USERNAME_VAR, credentials.username, TOKEN_VAR, credentials.token
    );
    tokio::fs::write(file_path, contents).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(file_path, std::fs::Permissions::from_mode(0o400)).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::CloudError;
    use async_trait::async_trait;
    use serial_test::serial;

    struct FakeSecretStore {
        payload: String,
    }

    #[async_trait]
    impl SecretStore for FakeSecretStore {
        async fn fetch(&self, _reference: &str) -> Result<String, CloudError> {
            Ok(self.payload.clone())
        }
    }

    #[tokio::test]
    async fn resolve_parses_the_secret_payload() {
        let store = FakeSecretStore {
            payload: r#"{"username": "scan-bot", "token": "tok-123"}"#.to_string(),
        };

        let credentials = ScanCredentials::resolve(&store, "scans/credentials")
            .await
            .unwrap();

        assert_eq!(credentials.username, "scan-bot");
        assert_eq!(credentials.token, "tok-123");
    }

    #[tokio::test]
    async fn resolve_rejects_malformed_payload() {
        let store = FakeSecretStore {
            payload: "not-json".to_string(),
        };

        let error = ScanCredentials::resolve(&store, "scans/credentials")
            .await
            .unwrap_err();

        assert!(matches!(error, ScanError::Configuration { .. }));
    }

    #[test]
    #[serial]
    fn from_env_reads_both_variables() {
        std::env::set_var(USERNAME_VAR, "scan-bot");
        std::env::set_var(TOKEN_VAR, "tok-123");

        let credentials = ScanCredentials::from_env().unwrap();
        assert_eq!(credentials.username, "scan-bot");
        assert_eq!(credentials.token, "tok-123");

        std::env::remove_var(USERNAME_VAR);
        std::env::remove_var(TOKEN_VAR);
    }

    #[test]
    #[serial]
    fn from_env_fails_when_a_variable_is_absent() {
        std::env::set_var(USERNAME_VAR, "scan-bot");
        std::env::remove_var(TOKEN_VAR);

        let error = ScanCredentials::from_env().unwrap_err();
        assert!(matches!(error, ScanError::CredentialsMissing { .. }));

        std::env::remove_var(USERNAME_VAR);
    }

    #[test]
    fn ensure_present_rejects_blank_credentials() {
        let credentials = ScanCredentials {
            username: String::new(),
            token: "tok".to_string(),
        };

        assert!(credentials.ensure_present().is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn credential_bridge_is_installed_for_the_given_home() {
        fn git_available() -> bool {
            std::process::Command::new("git")
                .arg("--version")
                .output()
                .map(|output| output.status.success())
                .unwrap_or(false)
        }
        if !git_available() {
            eprintln!("skipping: git not available");
            return;
        }

        let scanner_folder = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();

        let script_path = install_credential_bridge(scanner_folder.path(), Some(home.path()))
            .await
            .unwrap();

        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&script_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111, "bridge script must be executable");

        let gitconfig = std::fs::read_to_string(home.path().join(".gitconfig")).unwrap();
        assert!(gitconfig.contains("credential"));
        assert!(gitconfig.contains("git-credential-bridge.sh"));
    }

    #[test]
    fn debug_output_redacts_the_token() {
        let credentials = ScanCredentials {
            username: "scan-bot".to_string(),
            token: "tok-123".to_string(),
        };

        let debug = format!("{:?}", credentials);
        assert!(!debug.contains("tok-123"));
        assert!(debug.contains("<redacted>"));
    }
}
