//! Configuration module for the Wardrobe coordinator.
//!
//! This module provides structures and utilities for managing coordinator
//! configuration. It supports loading configuration from TOML files and
//! provides validation to ensure all required configuration values are
//! properly set.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the coordinator.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Configuration specific to this marketplace instance.
	pub marketplace: MarketplaceConfig,
	/// Configuration for the storage backend.
	pub storage: StorageConfig,
	/// Configuration for the idempotency ledger.
	#[serde(default)]
	pub idempotency: IdempotencyConfig,
	/// Configuration for the SLA scheduler.
	#[serde(default)]
	pub scheduler: SchedulerConfig,
	/// Configuration for the HTTP API server.
	pub api: Option<ApiConfig>,
}

/// Configuration specific to the marketplace instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MarketplaceConfig {
	/// Unique identifier for this coordinator instance.
	pub id: String,
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
	/// Interval in seconds for cleaning up expired storage entries.
	#[serde(default = "default_cleanup_interval_seconds")]
	pub cleanup_interval_seconds: u64,
}

fn default_cleanup_interval_seconds() -> u64 {
	300
}

/// Configuration for the idempotency ledger.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IdempotencyConfig {
	/// How long a creation key is remembered, in hours.
	#[serde(default = "default_retention_hours")]
	pub retention_hours: u64,
}

fn default_retention_hours() -> u64 {
	24
}

impl Default for IdempotencyConfig {
	fn default() -> Self {
		Self {
			retention_hours: default_retention_hours(),
		}
	}
}

/// Configuration for the SLA scheduler.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
	/// Interval in seconds between SLA scans.
	#[serde(default = "default_scan_interval_seconds")]
	pub scan_interval_seconds: u64,
	/// How long an order may sit in Requested before the reaper cancels
	/// it, in hours.
	#[serde(default = "default_stale_request_hours")]
	pub stale_request_hours: u64,
}

fn default_scan_interval_seconds() -> u64 {
	3600
}

fn default_stale_request_hours() -> u64 {
	24
}

impl Default for SchedulerConfig {
	fn default() -> Self {
		Self {
			scan_interval_seconds: default_scan_interval_seconds(),
			stale_request_hours: default_stale_request_hours(),
		}
	}
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Whether the API server should be started.
	pub enabled: bool,
	/// Bind host.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Bind port.
	#[serde(default = "default_api_port")]
	pub port: u16,
	/// Shared secret required on admin endpoints. Admin routes answer 403
	/// when unset.
	#[serde(default)]
	pub admin_token: Option<String>,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	8080
}

impl Config {
	/// Loads configuration from a TOML file.
	///
	/// # Errors
	///
	/// Returns a [`ConfigError`] when the file cannot be read, parsed, or
	/// fails validation.
	pub fn from_file(path: &str) -> Result<Self, ConfigError> {
		let content = std::fs::read_to_string(path)?;
		content.parse()
	}

	/// Loads configuration from a TOML file without blocking the runtime.
	pub async fn from_file_async(path: &str) -> Result<Self, ConfigError> {
		let content = tokio::fs::read_to_string(path).await?;
		content.parse()
	}

	/// Validates cross-field constraints that serde cannot express.
	fn validate(&self) -> Result<(), ConfigError> {
		if self.marketplace.id.is_empty() {
			return Err(ConfigError::Validation(
				"marketplace.id must not be empty".to_string(),
			));
		}
		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"storage.primary '{}' has no matching implementations entry",
				self.storage.primary
			)));
		}
		if self.scheduler.scan_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"scheduler.scan_interval_seconds must be positive".to_string(),
			));
		}
		if self.idempotency.retention_hours == 0 {
			return Err(ConfigError::Validation(
				"idempotency.retention_hours must be positive".to_string(),
			));
		}
		Ok(())
	}
}

impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let config: Config = toml::from_str(s)?;
		config.validate()?;
		Ok(config)
	}
}
