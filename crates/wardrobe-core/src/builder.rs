//! Engine construction from configuration and implementation factories.
//!
//! The binary hands the builder a map of storage factories; the builder
//! picks the configured primary, validates its raw TOML table against the
//! implementation's own schema, and wires the engine over it.

use crate::engine::LifecycleEngine;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use wardrobe_config::Config;
use wardrobe_storage::{StorageFactory, StorageService};

/// Errors that can occur while building the engine.
#[derive(Debug, Error)]
pub enum BuilderError {
	/// The configured implementation has no registered factory.
	#[error("Unknown implementation: {0}")]
	UnknownImplementation(String),
	/// The configuration is missing or invalid for the implementation.
	#[error("Configuration error: {0}")]
	Configuration(String),
	/// The storage backend could not be constructed.
	#[error("Storage error: {0}")]
	Storage(String),
}

/// Factories for all pluggable implementations.
pub struct EngineFactories {
	/// Storage backend factories by implementation name.
	pub storage_factories: HashMap<String, StorageFactory>,
}

/// Builds a [`LifecycleEngine`] from configuration.
pub struct EngineBuilder {
	config: Config,
}

impl EngineBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Constructs the configured storage backend and wires the engine.
	pub fn build(self, factories: EngineFactories) -> Result<LifecycleEngine, BuilderError> {
		let primary = &self.config.storage.primary;
		let factory = factories
			.storage_factories
			.get(primary)
			.ok_or_else(|| BuilderError::UnknownImplementation(primary.clone()))?;
		let impl_config = self
			.config
			.storage
			.implementations
			.get(primary)
			.ok_or_else(|| {
				BuilderError::Configuration(format!(
					"storage.implementations.{} is missing",
					primary
				))
			})?;

		let backend = factory(impl_config).map_err(|e| BuilderError::Storage(e.to_string()))?;
		backend
			.config_schema()
			.validate(impl_config)
			.map_err(|e| BuilderError::Configuration(e.to_string()))?;

		let storage = Arc::new(StorageService::new(backend));
		Ok(LifecycleEngine::new(self.config, storage))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use wardrobe_storage::get_all_implementations;

	fn factories() -> EngineFactories {
		EngineFactories {
			storage_factories: get_all_implementations()
				.into_iter()
				.map(|(name, factory)| (name.to_string(), factory))
				.collect(),
		}
	}

	fn config(primary: &str) -> Config {
		format!(
			r#"
[marketplace]
id = "builder-test"

[storage]
primary = "{}"

[storage.implementations.memory]
"#,
			primary
		)
		.parse()
		.unwrap()
	}

	#[test]
	fn builds_with_memory_storage() {
		let engine = EngineBuilder::new(config("memory")).build(factories()).unwrap();
		assert_eq!(engine.config().marketplace.id, "builder-test");
	}

	#[test]
	fn unknown_implementation_is_rejected() {
		// Config validation already catches a primary without an
		// implementations entry, so probe the builder directly with an
		// empty factory map
		let result = EngineBuilder::new(config("memory")).build(EngineFactories {
			storage_factories: HashMap::new(),
		});
		assert!(matches!(result, Err(BuilderError::UnknownImplementation(_))));
	}
}
