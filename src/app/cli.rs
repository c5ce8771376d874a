//! CLI argument definitions
//!
//! Every operational argument mirrors a `SECRETSCAN_*` environment variable so
//! the binary runs unattended under service supervision with no command line
//! at all. Validation failures are initialization errors (exit code 2).

use clap::{ArgAction, Parser};
use std::path::PathBuf;
use uuid::Uuid;

use crate::core::validation;
use crate::scanner::api::Scm;

/// Secret-detection scan orchestrator for ephemeral compute instances
#[derive(Parser, Debug, Clone)]
#[command(name = "secretscan")]
#[command(about = "Clones a fleet of repositories, runs secret detection, and reports results")]
#[command(version)]
pub struct Args {
    /// Source code management system hosting the repositories
    #[arg(long = "scm", value_enum, env = "SECRETSCAN_SCM")]
    pub scm: Scm,

    /// Identifier of the scheduled scan
    #[arg(long = "scan-identifier", env = "SECRETSCAN_SCAN_IDENTIFIER", value_parser = non_empty)]
    pub scan_identifier: String,

    /// UUID associated to the scan
    #[arg(long = "scan-uuid", env = "SECRETSCAN_SCAN_UUID", value_parser = valid_uuid4)]
    pub scan_uuid: Uuid,

    /// Folder receiving the scan input files
    #[arg(long = "scan-folder", env = "SECRETSCAN_SCAN_FOLDER")]
    pub scan_folder: PathBuf,

    /// Folder dedicated to the scanner (configuration, report, logs)
    #[arg(long = "scanner-folder", env = "SECRETSCAN_SCANNER_FOLDER")]
    pub scanner_folder: PathBuf,

    /// Name of the storage bucket holding scan files and receiving results
    #[arg(long = "bucket", env = "SECRETSCAN_BUCKET_NAME", value_parser = non_empty)]
    pub bucket: String,

    /// Key prefix under which scan artifacts live in the bucket
    #[arg(
        long = "storage-prefix",
        env = "SECRETSCAN_STORAGE_PREFIX",
        default_value = "secret-scans"
    )]
    pub storage_prefix: String,

    /// Secret reference holding the scan credentials; when omitted the
    /// credentials are read from the environment
    #[arg(
        long = "credentials-reference",
        env = "SECRETSCAN_CREDENTIALS_REFERENCE"
    )]
    pub credentials_reference: Option<String>,

    /// Home directory whose git configuration receives the credential helper
    #[arg(long = "credential-home", env = "SECRETSCAN_CREDENTIAL_HOME")]
    pub credential_home: Option<PathBuf>,

    /// Path where the detector is (or will be) installed
    #[arg(
        long = "detector-path",
        env = "SECRETSCAN_DETECTOR_PATH",
        default_value = "/usr/bin"
    )]
    pub detector_path: PathBuf,

    /// Name of the detector executable
    #[arg(
        long = "detector-executable",
        env = "SECRETSCAN_DETECTOR_EXECUTABLE",
        default_value = "trufflehog"
    )]
    pub detector_executable: String,

    /// Detector version to install; latest when omitted
    #[arg(long = "detector-version", env = "SECRETSCAN_DETECTOR_VERSION")]
    pub detector_version: Option<String>,

    /// Use a pre-installed detector binary instead of installing one
    #[arg(
        long = "skip-detector-install",
        env = "SECRETSCAN_SKIP_DETECTOR_INSTALL",
        action = ArgAction::SetTrue
    )]
    pub skip_detector_install: bool,

    /// Report only verified secrets
    #[arg(
        long = "report-only-verified",
        env = "SECRETSCAN_REPORT_ONLY_VERIFIED",
        action = ArgAction::SetTrue
    )]
    pub report_only_verified: bool,

    /// Maximum number of repositories cloned and scanned simultaneously
    #[arg(
        long = "concurrency",
        env = "SECRETSCAN_CONCURRENCY",
        default_value_t = crate::scanner::api::DEFAULT_CONCURRENCY,
        value_parser = positive_usize
    )]
    pub concurrency: usize,

    /// Topic receiving operator notifications
    #[arg(long = "notification-topic", env = "SECRETSCAN_NOTIFICATION_TOPIC")]
    pub notification_topic: Option<String>,

    /// Terminate the instance at the end of operations
    #[arg(
        long = "terminate-after-scan",
        env = "SECRETSCAN_TERMINATE_AFTER_SCAN",
        default_value_t = true,
        action = ArgAction::Set,
        value_name = "BOOL"
    )]
    pub terminate_after_scan: bool,

    /// Terminate the instance if an error occurs
    #[arg(
        long = "terminate-on-error",
        env = "SECRETSCAN_TERMINATE_ON_ERROR",
        default_value_t = true,
        action = ArgAction::Set,
        value_name = "BOOL"
    )]
    pub terminate_on_error: bool,

    /// Cloud region override
    #[arg(long = "region", env = "AWS_REGION")]
    pub region: Option<String>,

    /// Store debug information
    #[arg(long = "debug", env = "SECRETSCAN_DEBUG", action = ArgAction::SetTrue)]
    pub debug: bool,

    /// Log level
    #[arg(
        long = "log-level",
        value_name = "LEVEL",
        value_parser = ["trace", "debug", "info", "warn", "error", "off"],
        env = "SECRETSCAN_LOG_LEVEL"
    )]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(
        long = "log-format",
        value_name = "FORMAT",
        value_parser = ["text", "json"],
        default_value = "text",
        env = "SECRETSCAN_LOG_FORMAT"
    )]
    pub log_format: String,
}

fn non_empty(value: &str) -> Result<String, String> {
    validation::validate_non_empty(value, "value")?;
    Ok(value.to_string())
}

fn valid_uuid4(value: &str) -> Result<Uuid, String> {
    let parsed = Uuid::parse_str(value).map_err(|error| error.to_string())?;
    if parsed.get_version_num() != 4 {
        return Err(format!("{} is not a UUID v4", value));
    }
    Ok(parsed)
}

fn positive_usize(value: &str) -> Result<usize, String> {
    validation::validate_positive_int(value)
}
