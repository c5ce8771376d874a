//! Instance lifecycle: initialize, scan, finalize
//!
//! The outer state machine of a scan instance. Initialize acquires every
//! input (storage downloads, credentials, detector). Scan delegates to the
//! coordinator; a job-level failure there is still finalized so the failure
//! report reaches storage. Finalize publishes artifacts and terminates the
//! instance. A failure in any phase routes to a common error path: notify the
//! operator channel, then terminate. If termination itself fails, notify again
//! and fall back to an unconditional OS-level shutdown; a stuck instance that
//! cannot kill itself would otherwise run up cost silently.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use uuid::Uuid;

use crate::cloud::{InstanceControl, Notifier, ObjectStore, SecretStore};
use crate::core::error_handling::log_error_with_context;
use crate::lifecycle::error::LifecycleError;
use crate::lifecycle::install::{install_detector, DetectorInstall};
use crate::scanner::api::{
    CoordinatorSettings, DetectorExecutor, DetectorSettings, GitCloner, ScanCoordinator,
    ScanCredentials, ScanJob, ScanSummary,
};
use crate::scanner::credentials;

/// Subject line of every operator notification
const NOTIFICATION_SUBJECT: &str = "[SECRET SCAN]";

/// Optional detector rule-configuration file inside the scanner folder
const RULE_CONFIGURATION_FILE: &str = "configuration.yaml";

/// File carrying the credential variables for host-level service supervision
const SERVICE_ENVIRONMENT_FILE: &str = "secretscan.env";

/// Object-storage layout of scan inputs and artifacts
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub base_prefix: String,
}

impl StorageLayout {
    pub fn new(base_prefix: String) -> Self {
        Self { base_prefix }
    }

    pub fn scan_files(&self, scan_identifier: &str) -> String {
        format!("{}/scans/{}/files", self.base_prefix, scan_identifier)
    }

    pub fn scanner_files(&self, scan_identifier: &str) -> String {
        format!("{}/scans/{}/setup", self.base_prefix, scan_identifier)
    }

    pub fn shared_scanner_file(&self, file_name: &str) -> String {
        format!("{}/scanner/{}", self.base_prefix, file_name)
    }

    pub fn results(&self) -> String {
        format!("{}/results", self.base_prefix)
    }

    pub fn logs(&self, scan_uuid: &Uuid) -> String {
        format!("{}/logs/{}", self.base_prefix, scan_uuid)
    }
}

#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    pub scan_folder: PathBuf,
    pub scanner_folder: PathBuf,
    pub storage: StorageLayout,
    /// Secret reference for scan credentials; environment fallback when absent
    pub credentials_reference: Option<String>,
    /// Home directory whose git configuration receives the credential helper
    pub credential_home: Option<PathBuf>,
    pub detector: DetectorSettings,
    /// Detector installation; `None` uses a pre-installed binary
    pub detector_install: Option<DetectorInstall>,
    pub concurrency: usize,
    pub terminate_after_scan: bool,
    pub terminate_on_error: bool,
}

/// Terminal outcome of one lifecycle run, mapped to the process exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Failed,
}

pub struct LifecycleManager {
    job: ScanJob,
    settings: LifecycleSettings,
    storage: Arc<dyn ObjectStore>,
    secrets: Arc<dyn SecretStore>,
    notifier: Arc<dyn Notifier>,
    instance: Arc<dyn InstanceControl>,
}

impl LifecycleManager {
    pub fn new(
        job: ScanJob,
        settings: LifecycleSettings,
        storage: Arc<dyn ObjectStore>,
        secrets: Arc<dyn SecretStore>,
        notifier: Arc<dyn Notifier>,
        instance: Arc<dyn InstanceControl>,
    ) -> Self {
        Self {
            job,
            settings,
            storage,
            secrets,
            notifier,
            instance,
        }
    }

    /// Drive the instance through initialize → scan → finalize
    pub async fn run(&self) -> RunOutcome {
        let (scan_credentials, bridge) = match self.initialize().await {
            Ok(prepared) => prepared,
            Err(error) => return self.handle_failure("initialization", &error).await,
        };

        let summary = match self.scan(&scan_credentials, bridge).await {
            Ok(summary) => summary,
            Err(error) => return self.handle_failure("scan", &error).await,
        };

        match self.finalize(&summary).await {
            Ok(()) => RunOutcome::Completed,
            Err(error) => self.handle_failure("finalization", &error).await,
        }
    }

    /// Acquire every input the scan needs
    async fn initialize(&self) -> Result<(ScanCredentials, PathBuf), LifecycleError> {
        log::info!("Downloading scan files...");
        self.storage
            .download_prefix(
                &self.settings.storage.scan_files(&self.job.scan_identifier),
                &self.settings.scan_folder,
            )
            .await?;

        log::info!("Downloading scanner files...");
        self.storage
            .download_prefix(
                &self
                    .settings
                    .storage
                    .scanner_files(&self.job.scan_identifier),
                &self.settings.scanner_folder,
            )
            .await?;

        // Collaborator-owned detector rules; a missing file just means the
        // detector runs with its built-in rules.
        self.storage
            .download_file(
                &self
                    .settings
                    .storage
                    .shared_scanner_file(RULE_CONFIGURATION_FILE),
                &self.settings.scanner_folder.join(RULE_CONFIGURATION_FILE),
                true,
            )
            .await?;

        let scan_credentials = match &self.settings.credentials_reference {
            Some(reference) => {
                ScanCredentials::resolve(self.secrets.as_ref(), reference).await?
            }
            None => ScanCredentials::from_env()?,
        };

        let bridge = credentials::install_credential_bridge(
            &self.settings.scanner_folder,
            self.settings.credential_home.as_deref(),
        )
        .await?;

        credentials::write_service_environment(
            &self.settings.scanner_folder.join(SERVICE_ENVIRONMENT_FILE),
            &scan_credentials,
        )
        .await?;

        if let Some(install) = &self.settings.detector_install {
            install_detector(install, &self.settings.detector.executable_name).await?;
        }

        log::info!("Initialization complete.");
        Ok((scan_credentials, bridge))
    }

    /// Delegate to the scan coordinator
    ///
    /// A job that fails inside the coordinator still returns a summary and
    /// proceeds to finalization; only an escaping error (for example a failed
    /// report write) takes the lifecycle error path.
    async fn scan(
        &self,
        scan_credentials: &ScanCredentials,
        bridge: PathBuf,
    ) -> Result<ScanSummary, LifecycleError> {
        let mut detector = self.settings.detector.clone();
        let rules = self.settings.scanner_folder.join(RULE_CONFIGURATION_FILE);
        if rules.is_file() {
            detector.rule_configuration = Some(rules);
        }

        let cloner = Arc::new(GitCloner::new(Some(bridge)));
        let executor = Arc::new(DetectorExecutor::new(detector));
        let mut coordinator = ScanCoordinator::new(
            self.job.clone(),
            CoordinatorSettings {
                scanner_folder: self.settings.scanner_folder.clone(),
                concurrency: self.settings.concurrency,
            },
            cloner,
            executor,
        );

        Ok(coordinator.scan(scan_credentials).await?)
    }

    /// Publish artifacts and terminate the instance
    async fn finalize(&self, summary: &ScanSummary) -> Result<(), LifecycleError> {
        let file_name = summary
            .report_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| format!("{}.json", self.job.scan_uuid));

        log::info!("Uploading results...");
        self.storage
            .upload_file(
                &summary.report_path,
                &format!("{}/{}", self.settings.storage.results(), file_name),
            )
            .await?;

        self.upload_logs().await?;

        if self.settings.terminate_after_scan {
            log::info!("Terminating instance...");
            self.instance.terminate().await?;
        }

        Ok(())
    }

    /// Upload every `*.log` file from the scan and scanner log directories
    async fn upload_logs(&self) -> Result<(), LifecycleError> {
        let prefix = self.settings.storage.logs(&self.job.scan_uuid);
        for directory in [
            self.settings.scan_folder.join("logs"),
            self.settings.scanner_folder.join("logs"),
        ] {
            self.upload_logs_from(&directory, &prefix).await?;
        }
        Ok(())
    }

    async fn upload_logs_from(
        &self,
        local_dir: &Path,
        prefix: &str,
    ) -> Result<(), LifecycleError> {
        if !local_dir.is_dir() {
            return Ok(());
        }
        for entry in std::fs::read_dir(local_dir)? {
            let path = entry?.path();
            let is_log = path
                .extension()
                .map(|extension| extension == "log")
                .unwrap_or(false);
            if is_log && path.is_file() {
                if let Some(file_name) = path.file_name() {
                    let remote = format!("{}/{}", prefix, file_name.to_string_lossy());
                    self.storage.upload_file(&path, &remote).await?;
                }
            }
        }
        Ok(())
    }

    /// Common error path shared by all three phases
    async fn handle_failure(&self, phase: &str, error: &LifecycleError) -> RunOutcome {
        log_error_with_context(error, &format!("An error occurred during {}", phase));

        // Best effort: publish whatever logs exist before touching the
        // instance, so the failure is diagnosable after termination.
        if let Err(upload_error) = self.upload_logs().await {
            log::warn!("Log upload on the error path failed: {}", upload_error);
        }

        let instance_id = self
            .instance
            .identity()
            .await
            .unwrap_or_else(|_| "unknown".to_string());
        self.notifier
            .notify(
                NOTIFICATION_SUBJECT,
                &format!(
                    "An error occurred during {} on instance '{}': {}",
                    phase, instance_id, error
                ),
            )
            .await;

        if self.settings.terminate_on_error {
            if let Err(termination_error) = self.instance.terminate().await {
                self.notifier
                    .notify(
                        NOTIFICATION_SUBJECT,
                        &format!(
                            "Instance '{}' was expected to be terminated because of an error \
                             during {}, but an error occurred while trying to terminate it: {}",
                            instance_id, phase, termination_error
                        ),
                    )
                    .await;
                self.instance.force_shutdown().await;
            }
        }

        RunOutcome::Failed
    }
}
