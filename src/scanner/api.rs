//! Scanner API
//!
//! Public surface of the scanner system, consolidating the exports external
//! callers (the lifecycle layer, integration tests) are expected to use.

pub use crate::scanner::aggregator::ResultAggregator;
pub use crate::scanner::config::{ScanConfiguration, CONFIGURATION_FILE};
pub use crate::scanner::coordinator::{
    CoordinatorSettings, ScanCoordinator, ScanSummary, DEFAULT_CONCURRENCY,
};
pub use crate::scanner::credentials::ScanCredentials;
pub use crate::scanner::detector::{DetectorExecutor, DetectorSettings, ScanExecutor};
pub use crate::scanner::error::{ScanError, ScanResult};
pub use crate::scanner::task::TaskContext;
pub use crate::scanner::types::{
    OutcomeStatus, RepositoryOutcome, RepositoryTarget, ScanJob, ScanMode, ScanReport, ScanStatus,
    Scm,
};
pub use crate::scanner::workspace::{GitCloner, RepositoryCloner, Workspace};
