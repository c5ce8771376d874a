//! Application startup
//!
//! Parses arguments, initializes logging, builds the runtime and the cloud
//! collaborators, then hands over to the lifecycle manager. Exit codes:
//! 0 success, 1 failure after initialization succeeded, 2 failure during
//! initialization (argument/config parsing), so operators can tell
//! configuration errors from execution errors.

use std::sync::Arc;

use clap::Parser;

use crate::app::cli::Args;
use crate::cloud::aws::{Ec2InstanceControl, S3ObjectStore, SecretsManagerStore, SnsNotifier};
use crate::cloud::{InstanceControl, Notifier, NullNotifier, ObjectStore, SecretStore};
use crate::core::logging::init_logging;
use crate::lifecycle::{
    DetectorInstall, LifecycleManager, LifecycleSettings, RunOutcome, StorageLayout,
    DEFAULT_INSTALL_SCRIPT_URL,
};
use crate::scanner::api::{DetectorSettings, ScanJob, ScanMode};

pub fn run() -> i32 {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(error) => {
            // clap renders its own message, including --help and --version
            let _ = error.print();
            return match error.kind() {
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => 0,
                _ => 2,
            };
        }
    };

    let log_level = if args.debug {
        Some("debug")
    } else {
        args.log_level.as_deref()
    };
    if let Err(error) = init_logging(
        log_level,
        Some(&args.log_format),
        &args.scanner_folder.join("logs"),
    ) {
        eprintln!(
            "FATAL ERROR: An unexpected error occurred during initialization: {}",
            error
        );
        return 2;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(error) => {
            log::error!("FATAL: Runtime could not be started: {}", error);
            return 2;
        }
    };

    runtime.block_on(run_lifecycle(args))
}

async fn run_lifecycle(args: Args) -> i32 {
    log::info!(
        "secretscan starting (built {}, revision {})",
        crate::BUILD_TIME,
        crate::GIT_HASH
    );

    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
    if let Some(region) = args.region.clone() {
        loader = loader.region(aws_config::Region::new(region));
    }
    let shared_config = loader.load().await;

    let storage: Arc<dyn ObjectStore> = Arc::new(S3ObjectStore::new(
        aws_sdk_s3::Client::new(&shared_config),
        args.bucket.clone(),
    ));
    let secrets: Arc<dyn SecretStore> = Arc::new(SecretsManagerStore::new(
        aws_sdk_secretsmanager::Client::new(&shared_config),
    ));
    let notifier: Arc<dyn Notifier> = match &args.notification_topic {
        Some(topic) => Arc::new(SnsNotifier::new(
            aws_sdk_sns::Client::new(&shared_config),
            topic.clone(),
        )),
        None => Arc::new(NullNotifier),
    };
    let instance: Arc<dyn InstanceControl> = Arc::new(Ec2InstanceControl::new(
        aws_sdk_ec2::Client::new(&shared_config),
    ));

    let mode = if args.report_only_verified {
        ScanMode::Verified
    } else {
        ScanMode::All
    };
    let job = ScanJob::new(args.scan_identifier.clone(), args.scan_uuid, args.scm, mode);

    let settings = LifecycleSettings {
        scan_folder: args.scan_folder.clone(),
        scanner_folder: args.scanner_folder.clone(),
        storage: StorageLayout::new(args.storage_prefix.clone()),
        credentials_reference: args.credentials_reference.clone(),
        credential_home: args.credential_home.clone(),
        detector: DetectorSettings {
            installation_path: args.detector_path.clone(),
            executable_name: args.detector_executable.clone(),
            report_only_verified: args.report_only_verified,
            rule_configuration: None,
        },
        detector_install: (!args.skip_detector_install).then(|| DetectorInstall {
            script_url: DEFAULT_INSTALL_SCRIPT_URL.to_string(),
            installation_path: args.detector_path.clone(),
            version: args.detector_version.clone(),
        }),
        concurrency: args.concurrency,
        terminate_after_scan: args.terminate_after_scan,
        terminate_on_error: args.terminate_on_error,
    };

    let manager = LifecycleManager::new(job, settings, storage, secrets, notifier, instance);
    match manager.run().await {
        RunOutcome::Completed => 0,
        RunOutcome::Failed => 1,
    }
}
