//! Scan configuration document loading and validation
//!
//! The configuration names the clone endpoint template and the repository
//! fleet. It is validated strictly before any cloning occurs: unknown fields
//! are rejected at deserialization time and the semantic checks below stand in
//! for the schema the document is versioned against.

use std::path::Path;

use serde::Deserialize;

use crate::core::validation;
use crate::scanner::error::{ScanError, ScanResult};
use crate::scanner::types::RepositoryTarget;

/// File name of the configuration document inside the scanner folder
pub const CONFIGURATION_FILE: &str = "repositories_to_scan.json";

/// Validated scan configuration: endpoint template plus repository list
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanConfiguration {
    pub endpoint: String,
    pub repositories: Vec<RepositoryTarget>,
}

impl ScanConfiguration {
    /// Load and validate the configuration document at `path`
    pub fn load(path: &Path) -> ScanResult<Self> {
        log::info!(
            "Loading and validating configuration file: {}",
            path.display()
        );

        if !path.is_file() {
            return Err(ScanError::Configuration {
                message: format!("Configuration file not found: {}", path.display()),
            });
        }

        let raw = std::fs::read_to_string(path).map_err(|error| ScanError::Configuration {
            message: format!(
                "Configuration file could not be read: {}: {}",
                path.display(),
                error
            ),
        })?;

        let configuration: Self =
            serde_json::from_str(&raw).map_err(|error| ScanError::Configuration {
                message: format!(
                    "Configuration file does not strictly conform to the schema: {}",
                    error
                ),
            })?;

        configuration.validate()?;

        log::info!(
            "Configuration file loaded and validated successfully: {}",
            path.display()
        );
        Ok(configuration)
    }

    fn validate(&self) -> ScanResult<()> {
        validation::validate_endpoint_template(&self.endpoint).map_err(configuration_error)?;

        if self.repositories.is_empty() {
            return Err(ScanError::Configuration {
                message: "Configuration must list at least one repository".to_string(),
            });
        }

        for target in &self.repositories {
            validation::validate_non_empty(&target.organization, "repository organization")
                .map_err(configuration_error)?;
            validation::validate_non_empty(&target.name, "repository name")
                .map_err(configuration_error)?;
        }

        Ok(())
    }
}

fn configuration_error(message: String) -> ScanError {
    ScanError::Configuration { message }
}
