pub mod env_interpolation;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

use crate::core::client::action::CommandAction;
use crate::error::{ScannerError, ScannerResult};
use crate::types::field_path::FieldPath;
use crate::types::scan::{ActionRef, ClaimRetryPolicy, LaunchMode, ScanConfig};
use crate::utils::constants::{
    DEFAULT_CLAIM_BASE_DELAY_MS, DEFAULT_CLAIM_MAX_ATTEMPTS, DEFAULT_CLAIM_MAX_DELAY_MS, DEFAULT_COMPLETED_FIELD,
    DEFAULT_RECOVERY_TIMEOUT_SECS, DEFAULT_STARTED_FIELD,
};

/// Versioned scan file wrapper
/// This allows us to evolve the file format over time while maintaining backward compatibility
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "config_version")]
pub enum ScanFileVersioned {
    #[serde(rename = "1")]
    V1(ScanFileV1),
}

impl ScanFileVersioned {
    /// Load a scan file from disk, interpolating environment variables first
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let content = env_interpolation::interpolate_yaml_content(content)?;

        let yaml_value: serde_yaml::Value = serde_yaml::from_str(&content).context("Failed to parse YAML")?;
        if yaml_value.get("config_version").is_none() {
            anyhow::bail!(
                "Missing required field 'config_version' in config file. \
                 Current supported version: 1"
            );
        }

        let versioned: ScanFileVersioned = serde_yaml::from_str(&content).context("Failed to deserialize config")?;
        Ok(versioned)
    }

    /// Convert to the canonical (latest) file format
    pub fn into_canonical(self) -> ScanFileV1 {
        match self {
            ScanFileVersioned::V1(v1) => v1,
        }
    }
}

/// Version 1 of the scan file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanFileV1 {
    pub invoker_name: String,
    pub collection: String,
    #[serde(default = "empty_filter")]
    pub filter: Value,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub max_records: Option<usize>,
    #[serde(default = "default_recovery_timeout_secs")]
    pub recovery_timeout_secs: u64,
    #[serde(default = "default_started_field")]
    pub started_field: String,
    #[serde(default = "default_completed_field")]
    pub completed_field: String,
    #[serde(default)]
    pub launch_mode: LaunchMode,
    #[serde(default)]
    pub claim_retry: ClaimRetryFileConfig,
    #[serde(default)]
    pub action: Option<ActionDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimRetryFileConfig {
    /// `0` retries until the job is cancelled
    #[serde(default = "default_claim_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_claim_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_claim_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for ClaimRetryFileConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_CLAIM_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_CLAIM_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_CLAIM_MAX_DELAY_MS,
        }
    }
}

impl From<ClaimRetryFileConfig> for ClaimRetryPolicy {
    fn from(value: ClaimRetryFileConfig) -> Self {
        Self {
            max_attempts: (value.max_attempts > 0).then_some(value.max_attempts),
            base_delay: Duration::from_millis(value.base_delay_ms),
            max_delay: Duration::from_millis(value.max_delay_ms),
        }
    }
}

/// An external command registered as the run's action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionDefinition {
    pub name: String,
    /// Program followed by its arguments
    pub command: Vec<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl ActionDefinition {
    pub fn to_command_action(&self) -> ScannerResult<CommandAction> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| ScannerError::ConfigError(format!("action {} has an empty command", self.name)))?;
        Ok(CommandAction::new(&self.name, program)
            .with_args(args.iter().cloned())
            .with_timeout(self.timeout_secs.map(Duration::from_secs)))
    }
}

/// A loaded scan file: the run parameters and the action they refer to
#[derive(Debug, Clone)]
pub struct ScanFile {
    pub scan: ScanConfig,
    pub action: Option<ActionDefinition>,
}

impl TryFrom<ScanFileV1> for ScanFile {
    type Error = ScannerError;

    fn try_from(file: ScanFileV1) -> Result<Self, Self::Error> {
        let started_field: FieldPath = file.started_field.parse().map_err(config_error)?;
        let completed_field: FieldPath = file.completed_field.parse().map_err(config_error)?;

        let mut scan = ScanConfig::new(file.invoker_name, file.collection)
            .with_filter(file.filter)
            .with_workers(file.workers)
            .with_max_records(file.max_records)
            .with_recovery_timeout(Duration::from_secs(file.recovery_timeout_secs))
            .with_fields(started_field, completed_field)
            .with_launch_mode(file.launch_mode)
            .with_claim_retry(file.claim_retry.into());
        if let Some(action) = &file.action {
            scan = scan.with_action(ActionRef::new(&action.name));
        }
        scan.validate()?;

        Ok(Self { scan, action: file.action })
    }
}

/// Loads, interpolates and validates a scan file
pub fn load_scan_file(path: &Path) -> ScannerResult<ScanFile> {
    let versioned = ScanFileVersioned::from_yaml_file(path).map_err(|e| ScannerError::ConfigError(format!("{e:#}")))?;
    versioned.into_canonical().try_into()
}

fn config_error(err: impl std::fmt::Display) -> ScannerError {
    ScannerError::ConfigError(err.to_string())
}

fn empty_filter() -> Value {
    Value::Object(Default::default())
}

fn default_workers() -> usize {
    1
}

fn default_recovery_timeout_secs() -> u64 {
    DEFAULT_RECOVERY_TIMEOUT_SECS
}

fn default_started_field() -> String {
    DEFAULT_STARTED_FIELD.to_string()
}

fn default_completed_field() -> String {
    DEFAULT_COMPLETED_FIELD.to_string()
}

fn default_claim_max_attempts() -> u32 {
    DEFAULT_CLAIM_MAX_ATTEMPTS
}

fn default_claim_base_delay_ms() -> u64 {
    DEFAULT_CLAIM_BASE_DELAY_MS
}

fn default_claim_max_delay_ms() -> u64 {
    DEFAULT_CLAIM_MAX_DELAY_MS
}
