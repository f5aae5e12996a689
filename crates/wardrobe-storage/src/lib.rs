//! Storage module for the Wardrobe coordinator.
//!
//! This module provides abstractions for persistent storage of coordinator
//! data, supporting different backend implementations such as in-memory or
//! file-based storage. Beyond plain key-value access it defines the two
//! conditional operations the whole design hangs on: insert-if-absent and
//! compare-and-swap. Every optimistic-concurrency guarantee upstack reduces
//! to these two calls.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use thiserror::Error;
use wardrobe_types::ConfigSchema;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod memory;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// A requested item is not found (or has expired).
	#[error("Not found")]
	NotFound,
	/// An insert-if-absent hit an existing key.
	#[error("Already exists")]
	AlreadyExists,
	/// A compare-and-swap found different stored bytes than expected.
	#[error("Conflict")]
	Conflict,
	/// Serialization/deserialization failed.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// The storage backend failed.
	#[error("Backend error: {0}")]
	Backend(String),
	/// Configuration validation failed.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Trait defining the low-level interface for storage backends.
///
/// This trait must be implemented by any storage backend that wants to
/// integrate with the coordinator. It provides basic key-value operations
/// with optional TTL support plus the conditional writes used for
/// optimistic concurrency.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores raw bytes with optional time-to-live.
	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError>;

	/// Stores raw bytes only if the key does not exist yet.
	///
	/// Returns [`StorageError::AlreadyExists`] when the key is present.
	/// The existence check and the write are atomic with respect to other
	/// conditional operations on the same backend.
	async fn create_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError>;

	/// Replaces the value at `key` only if the stored bytes equal
	/// `expected`.
	///
	/// Returns [`StorageError::Conflict`] when the stored bytes differ and
	/// [`StorageError::NotFound`] when the key is absent. The comparison
	/// and the write are atomic with respect to other conditional
	/// operations on the same backend.
	async fn swap_bytes(
		&self,
		key: &str,
		expected: &[u8],
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError>;

	/// Deletes the value associated with the given key.
	async fn delete(&self, key: &str) -> Result<(), StorageError>;

	/// Checks if a key exists in storage.
	async fn exists(&self, key: &str) -> Result<bool, StorageError>;

	/// Lists all live keys starting with the given prefix.
	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

	/// Returns the configuration schema for validation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Removes expired entries from storage (optional operation).
	/// Returns the number of entries removed.
	/// Implementations without TTL support can return Ok(0).
	async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		Ok(0)
	}
}

/// Type alias for storage factory functions.
///
/// This is the function signature that all storage implementations must
/// provide to create instances of their storage interface.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Get all registered storage implementations.
///
/// Returns a vector of (name, factory) tuples for all available storage
/// implementations, used to populate the engine builder's factory map.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory};

	vec![
		(file::NAME, file::create_storage),
		(memory::NAME, memory::create_storage),
	]
}

/// High-level storage service that provides typed operations.
///
/// The StorageService wraps a low-level storage backend and provides
/// convenient methods for storing and retrieving typed data with automatic
/// JSON serialization. Typed variants of the conditional writes serialize
/// the expected value exactly as it was read, so a compare-and-swap guards
/// against any interleaved write, not only version bumps.
pub struct StorageService {
	/// The underlying storage backend implementation.
	backend: Box<dyn StorageInterface>,
}

impl StorageService {
	/// Creates a new StorageService with the specified backend.
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	fn key(namespace: &str, id: &str) -> String {
		format!("{}:{}", namespace, id)
	}

	fn to_bytes<T: Serialize>(data: &T) -> Result<Vec<u8>, StorageError> {
		serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	/// Stores a serializable value with optional time-to-live.
	pub async fn store_with_ttl<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		self.backend
			.set_bytes(&Self::key(namespace, id), Self::to_bytes(data)?, ttl)
			.await
	}

	/// Stores a serializable value without time-to-live.
	pub async fn store<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		self.store_with_ttl(namespace, id, data, None).await
	}

	/// Inserts a serializable value only if the id is not taken yet.
	///
	/// # Errors
	///
	/// [`StorageError::AlreadyExists`] when a value is already stored
	/// under this id.
	pub async fn insert_new_with_ttl<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		self.backend
			.create_bytes(&Self::key(namespace, id), Self::to_bytes(data)?, ttl)
			.await
	}

	/// Inserts a serializable value only if the id is not taken yet,
	/// without time-to-live.
	pub async fn insert_new<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		self.insert_new_with_ttl(namespace, id, data, None).await
	}

	/// Atomically replaces the stored value if it still serializes to the
	/// same bytes as `expected`.
	///
	/// `expected` must be the exact value previously read through
	/// [`StorageService::retrieve`]; any concurrent modification makes the
	/// comparison fail.
	///
	/// # Errors
	///
	/// [`StorageError::Conflict`] when the stored value has changed,
	/// [`StorageError::NotFound`] when it is gone.
	pub async fn swap<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		expected: &T,
		data: &T,
	) -> Result<(), StorageError> {
		self.swap_with_ttl(namespace, id, expected, data, None).await
	}

	/// [`StorageService::swap`] with a time-to-live on the new value.
	pub async fn swap_with_ttl<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		expected: &T,
		data: &T,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		self.backend
			.swap_bytes(
				&Self::key(namespace, id),
				&Self::to_bytes(expected)?,
				Self::to_bytes(data)?,
				ttl,
			)
			.await
	}

	/// Retrieves and deserializes a value from storage.
	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<T, StorageError> {
		let bytes = self.backend.get_bytes(&Self::key(namespace, id)).await?;
		serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	/// Retrieves and deserializes every value in a namespace.
	///
	/// Entries that disappear between the key listing and the read (TTL
	/// expiry, concurrent delete) are skipped rather than reported.
	pub async fn retrieve_all<T: DeserializeOwned>(
		&self,
		namespace: &str,
	) -> Result<Vec<T>, StorageError> {
		let prefix = format!("{}:", namespace);
		let keys = self.backend.list_keys(&prefix).await?;
		let mut values = Vec::with_capacity(keys.len());
		for key in keys {
			match self.backend.get_bytes(&key).await {
				Ok(bytes) => {
					let value = serde_json::from_slice(&bytes)
						.map_err(|e| StorageError::Serialization(e.to_string()))?;
					values.push(value);
				}
				Err(StorageError::NotFound) => continue,
				Err(e) => return Err(e),
			}
		}
		Ok(values)
	}

	/// Removes a value from storage.
	pub async fn remove(&self, namespace: &str, id: &str) -> Result<(), StorageError> {
		self.backend.delete(&Self::key(namespace, id)).await
	}

	/// Checks if a value exists in storage.
	pub async fn exists(&self, namespace: &str, id: &str) -> Result<bool, StorageError> {
		self.backend.exists(&Self::key(namespace, id)).await
	}

	/// Removes expired entries from storage.
	///
	/// Returns the number of entries that were removed.
	pub async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		self.backend.cleanup_expired().await
	}
}

#[cfg(test)]
mod tests {
	use super::implementations::memory::MemoryStorage;
	use super::*;
	use serde::Deserialize;

	#[derive(Debug, Clone, PartialEq, serde::Serialize, Deserialize)]
	struct Record {
		id: u64,
		label: String,
	}

	fn service() -> StorageService {
		StorageService::new(Box::new(MemoryStorage::new()))
	}

	#[tokio::test]
	async fn typed_roundtrip() {
		let storage = service();
		let rec = Record {
			id: 1,
			label: "coat".into(),
		};

		storage.store("orders", "1", &rec).await.unwrap();
		let back: Record = storage.retrieve("orders", "1").await.unwrap();
		assert_eq!(back, rec);
	}

	#[tokio::test]
	async fn typed_swap_detects_interleaved_write() {
		let storage = service();
		let v1 = Record {
			id: 1,
			label: "v1".into(),
		};
		storage.store("orders", "1", &v1).await.unwrap();

		// Another writer slips in
		let v2 = Record {
			id: 1,
			label: "v2".into(),
		};
		storage.store("orders", "1", &v2).await.unwrap();

		// A swap against the stale read fails and changes nothing
		let v3 = Record {
			id: 1,
			label: "v3".into(),
		};
		let result = storage.swap("orders", "1", &v1, &v3).await;
		assert!(matches!(result, Err(StorageError::Conflict)));
		let back: Record = storage.retrieve("orders", "1").await.unwrap();
		assert_eq!(back, v2);
	}

	#[tokio::test]
	async fn retrieve_all_returns_namespace_only() {
		let storage = service();
		for id in 1..=3u64 {
			let rec = Record {
				id,
				label: format!("item-{}", id),
			};
			storage.store("orders", &id.to_string(), &rec).await.unwrap();
		}
		storage
			.store(
				"deliveries",
				"1",
				&Record {
					id: 9,
					label: "other".into(),
				},
			)
			.await
			.unwrap();

		let all: Vec<Record> = storage.retrieve_all("orders").await.unwrap();
		assert_eq!(all.len(), 3);
		assert!(all.iter().all(|r| r.label.starts_with("item-")));
	}

	#[tokio::test]
	async fn insert_new_is_first_writer_wins() {
		let storage = service();
		let rec = Record {
			id: 1,
			label: "first".into(),
		};
		storage.insert_new("orders", "1", &rec).await.unwrap();

		let other = Record {
			id: 1,
			label: "second".into(),
		};
		let result = storage.insert_new("orders", "1", &other).await;
		assert!(matches!(result, Err(StorageError::AlreadyExists)));
	}
}
