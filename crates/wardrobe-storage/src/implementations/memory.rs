//! In-memory storage backend implementation for the coordinator.
//!
//! This module provides a memory-based implementation of the
//! StorageInterface trait, useful for testing, development and
//! single-process deployments. Unlike a throwaway test double it honors
//! TTLs: the idempotency ledger's retention window depends on them.

use crate::{StorageError, StorageInterface};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use wardrobe_types::{current_timestamp, ConfigSchema, Schema, ValidationError};

/// Implementation name used in configuration.
pub const NAME: &str = "memory";

/// One stored entry with its expiry stamp (0 = never expires).
#[derive(Debug, Clone)]
struct Entry {
	value: Vec<u8>,
	expires_at: u64,
}

impl Entry {
	fn new(value: Vec<u8>, ttl: Option<Duration>) -> Self {
		let expires_at = match ttl {
			Some(ttl) if !ttl.is_zero() => current_timestamp().saturating_add(ttl.as_secs()),
			_ => 0,
		};
		Self { value, expires_at }
	}

	fn is_expired(&self) -> bool {
		self.expires_at != 0 && current_timestamp() >= self.expires_at
	}
}

/// In-memory storage implementation.
///
/// Data lives in a HashMap behind a read-write lock. Conditional writes
/// hold the write lock across the compare and the write, which is what
/// makes them atomic here.
pub struct MemoryStorage {
	store: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryStorage {
	/// Creates a new MemoryStorage instance.
	pub fn new() -> Self {
		Self {
			store: Arc::new(RwLock::new(HashMap::new())),
		}
	}
}

impl Default for MemoryStorage {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl StorageInterface for MemoryStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let store = self.store.read().await;
		match store.get(key) {
			Some(entry) if !entry.is_expired() => Ok(entry.value.clone()),
			_ => Err(StorageError::NotFound),
		}
	}

	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		let mut store = self.store.write().await;
		store.insert(key.to_string(), Entry::new(value, ttl));
		Ok(())
	}

	async fn create_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		let mut store = self.store.write().await;
		match store.get(key) {
			Some(entry) if !entry.is_expired() => Err(StorageError::AlreadyExists),
			_ => {
				store.insert(key.to_string(), Entry::new(value, ttl));
				Ok(())
			}
		}
	}

	async fn swap_bytes(
		&self,
		key: &str,
		expected: &[u8],
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		let mut store = self.store.write().await;
		match store.get(key) {
			Some(entry) if !entry.is_expired() => {
				if entry.value != expected {
					return Err(StorageError::Conflict);
				}
				store.insert(key.to_string(), Entry::new(value, ttl));
				Ok(())
			}
			_ => Err(StorageError::NotFound),
		}
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let mut store = self.store.write().await;
		store.remove(key);
		Ok(())
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		let store = self.store.read().await;
		Ok(matches!(store.get(key), Some(entry) if !entry.is_expired()))
	}

	async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
		let store = self.store.read().await;
		let mut keys: Vec<String> = store
			.iter()
			.filter(|(key, entry)| key.starts_with(prefix) && !entry.is_expired())
			.map(|(key, _)| key.clone())
			.collect();
		keys.sort();
		Ok(keys)
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryStorageSchema)
	}

	async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		let mut store = self.store.write().await;
		let before = store.len();
		store.retain(|_, entry| !entry.is_expired());
		Ok(before - store.len())
	}
}

/// Configuration schema for MemoryStorage.
pub struct MemoryStorageSchema;

impl ConfigSchema for MemoryStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		// Memory storage has no required configuration
		let schema = Schema::new(vec![], vec![]);
		schema.validate(config)
	}
}

/// Factory function to create a memory storage backend from configuration.
///
/// Configuration parameters:
/// - None required for memory storage
pub fn create_storage(_config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	Ok(Box::new(MemoryStorage::new()))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_basic_operations() {
		let storage = MemoryStorage::new();

		let key = "test_key";
		let value = b"test_value".to_vec();
		storage.set_bytes(key, value.clone(), None).await.unwrap();

		let retrieved = storage.get_bytes(key).await.unwrap();
		assert_eq!(retrieved, value);

		assert!(storage.exists(key).await.unwrap());

		storage.delete(key).await.unwrap();
		assert!(!storage.exists(key).await.unwrap());

		let result = storage.get_bytes(key).await;
		assert!(matches!(result, Err(StorageError::NotFound)));
	}

	#[tokio::test]
	async fn test_create_rejects_existing_key() {
		let storage = MemoryStorage::new();

		storage
			.create_bytes("dup", b"first".to_vec(), None)
			.await
			.unwrap();
		let result = storage.create_bytes("dup", b"second".to_vec(), None).await;
		assert!(matches!(result, Err(StorageError::AlreadyExists)));

		// The original value is untouched
		assert_eq!(storage.get_bytes("dup").await.unwrap(), b"first".to_vec());
	}

	#[tokio::test]
	async fn test_swap_requires_exact_bytes() {
		let storage = MemoryStorage::new();

		storage.set_bytes("k", b"v1".to_vec(), None).await.unwrap();

		// Stale expectation loses
		let result = storage.swap_bytes("k", b"v0", b"v2".to_vec(), None).await;
		assert!(matches!(result, Err(StorageError::Conflict)));
		assert_eq!(storage.get_bytes("k").await.unwrap(), b"v1".to_vec());

		// Matching expectation wins
		storage
			.swap_bytes("k", b"v1", b"v2".to_vec(), None)
			.await
			.unwrap();
		assert_eq!(storage.get_bytes("k").await.unwrap(), b"v2".to_vec());
	}

	#[tokio::test]
	async fn test_swap_missing_key_is_not_found() {
		let storage = MemoryStorage::new();
		let result = storage
			.swap_bytes("missing", b"x", b"y".to_vec(), None)
			.await;
		assert!(matches!(result, Err(StorageError::NotFound)));
	}

	#[tokio::test]
	async fn test_expired_entry_is_gone() {
		let storage = MemoryStorage::new();

		// Zero-second TTL expires immediately
		storage
			.set_bytes("fleeting", b"x".to_vec(), Some(Duration::from_secs(1)))
			.await
			.unwrap();
		// Entry created now with 1s TTL is still live
		assert!(storage.exists("fleeting").await.unwrap());

		// Manufacture an already-expired entry
		{
			let mut store = storage.store.write().await;
			store.insert(
				"stale".to_string(),
				Entry {
					value: b"x".to_vec(),
					expires_at: 1,
				},
			);
		}
		assert!(!storage.exists("stale").await.unwrap());
		assert!(matches!(
			storage.get_bytes("stale").await,
			Err(StorageError::NotFound)
		));
		// create_bytes treats the expired entry as absent
		storage
			.create_bytes("stale", b"fresh".to_vec(), None)
			.await
			.unwrap();

		let removed = storage.cleanup_expired().await.unwrap();
		assert_eq!(removed, 0); // "stale" was just overwritten, nothing left to sweep
	}

	#[tokio::test]
	async fn test_list_keys_filters_by_prefix() {
		let storage = MemoryStorage::new();

		storage
			.set_bytes("orders:1", b"a".to_vec(), None)
			.await
			.unwrap();
		storage
			.set_bytes("orders:2", b"b".to_vec(), None)
			.await
			.unwrap();
		storage
			.set_bytes("deliveries:1", b"c".to_vec(), None)
			.await
			.unwrap();

		let keys = storage.list_keys("orders:").await.unwrap();
		assert_eq!(keys, vec!["orders:1".to_string(), "orders:2".to_string()]);
	}
}
