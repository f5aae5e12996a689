//! Idempotency ledger for order creation requests.
//!
//! Deduplicates creation requests by client-supplied key, scoped per
//! requester. Admission atomically reserves the key with an
//! insert-if-absent, so two racing requests with the same key resolve to
//! one admitted and one duplicate. Records expire after the configured
//! retention window; a request without a key is always treated as
//! distinct.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use wardrobe_storage::{StorageError, StorageService};
use wardrobe_types::StorageKey;

/// Errors that can occur during idempotency admission.
#[derive(Debug, Error)]
pub enum IdempotencyError {
	/// The original request with this key has not finished yet.
	#[error("A request with this idempotency key is still in flight")]
	InFlight,
	/// The key was reused with a different request payload.
	#[error("Idempotency key reused with a different payload")]
	FingerprintMismatch,
	/// The storage backend failed.
	#[error("Storage error: {0}")]
	Storage(String),
}

/// Outcome of an admission check.
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
	/// First time this key is seen; the caller proceeds and must call
	/// [`IdempotencyLedger::complete`] or [`IdempotencyLedger::abort`].
	Admitted,
	/// The key was seen before and the original request finished; the
	/// caller returns the recorded order without re-executing anything.
	Duplicate(u64),
}

/// One ledger entry. `order_id` stays empty while the original request is
/// in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyRecord {
	pub fingerprint: String,
	pub order_id: Option<u64>,
}

/// Deduplicates order-creation requests by client-supplied key.
pub struct IdempotencyLedger {
	storage: Arc<StorageService>,
	retention: Duration,
}

impl IdempotencyLedger {
	pub fn new(storage: Arc<StorageService>, retention: Duration) -> Self {
		Self { storage, retention }
	}

	/// Keys are scoped per requester so a collision across different
	/// requesters never mixes results.
	fn entry_id(requester_id: u64, key: &str) -> String {
		format!("{}:{}", requester_id, key)
	}

	/// Admits a creation request or reports the original result.
	///
	/// # Errors
	///
	/// [`IdempotencyError::InFlight`] when the original request is still
	/// running, [`IdempotencyError::FingerprintMismatch`] when the key is
	/// reused with a different payload.
	pub async fn admit(
		&self,
		requester_id: u64,
		key: &str,
		fingerprint: &str,
	) -> Result<Admission, IdempotencyError> {
		let id = Self::entry_id(requester_id, key);
		let reservation = IdempotencyRecord {
			fingerprint: fingerprint.to_string(),
			order_id: None,
		};

		loop {
			match self
				.storage
				.insert_new_with_ttl(
					StorageKey::Idempotency.as_str(),
					&id,
					&reservation,
					Some(self.retention),
				)
				.await
			{
				Ok(()) => return Ok(Admission::Admitted),
				Err(StorageError::AlreadyExists) => {
					let existing: IdempotencyRecord = match self
						.storage
						.retrieve(StorageKey::Idempotency.as_str(), &id)
						.await
					{
						Ok(record) => record,
						// Expired between the insert attempt and the read
						Err(StorageError::NotFound) => continue,
						Err(e) => return Err(IdempotencyError::Storage(e.to_string())),
					};

					if existing.fingerprint != fingerprint {
						return Err(IdempotencyError::FingerprintMismatch);
					}
					return match existing.order_id {
						Some(order_id) => Ok(Admission::Duplicate(order_id)),
						None => Err(IdempotencyError::InFlight),
					};
				}
				Err(e) => return Err(IdempotencyError::Storage(e.to_string())),
			}
		}
	}

	/// Records the result of an admitted request.
	///
	/// Best effort: if the reservation vanished or was concurrently
	/// touched, later duplicates fall back to in-flight semantics until
	/// the retention window closes, which is safe.
	pub async fn complete(&self, requester_id: u64, key: &str, order_id: u64) {
		let id = Self::entry_id(requester_id, key);
		let stored: IdempotencyRecord = match self
			.storage
			.retrieve(StorageKey::Idempotency.as_str(), &id)
			.await
		{
			Ok(record) => record,
			Err(e) => {
				tracing::warn!(requester_id, key, %e, "idempotency completion lost its reservation");
				return;
			}
		};
		let completed = IdempotencyRecord {
			fingerprint: stored.fingerprint.clone(),
			order_id: Some(order_id),
		};
		if let Err(e) = self
			.storage
			.swap_with_ttl(
				StorageKey::Idempotency.as_str(),
				&id,
				&stored,
				&completed,
				Some(self.retention),
			)
			.await
		{
			tracing::warn!(requester_id, key, %e, "failed to record idempotency result");
		}
	}

	/// Releases a reservation after a failed creation so a retry with the
	/// same key can succeed.
	pub async fn abort(&self, requester_id: u64, key: &str) {
		let id = Self::entry_id(requester_id, key);
		if let Err(e) = self
			.storage
			.remove(StorageKey::Idempotency.as_str(), &id)
			.await
		{
			tracing::warn!(requester_id, key, %e, "failed to release idempotency reservation");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use wardrobe_storage::implementations::memory::MemoryStorage;

	fn ledger() -> IdempotencyLedger {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		IdempotencyLedger::new(storage, Duration::from_secs(3600))
	}

	#[tokio::test]
	async fn first_admission_wins_the_reservation() {
		let ledger = ledger();
		let admission = ledger.admit(1, "create-1", "fp").await.unwrap();
		assert_eq!(admission, Admission::Admitted);
	}

	#[tokio::test]
	async fn duplicate_while_in_flight_is_rejected() {
		let ledger = ledger();
		ledger.admit(1, "create-1", "fp").await.unwrap();

		let err = ledger.admit(1, "create-1", "fp").await.unwrap_err();
		assert!(matches!(err, IdempotencyError::InFlight));
	}

	#[tokio::test]
	async fn duplicate_after_completion_replays_the_result() {
		let ledger = ledger();
		ledger.admit(1, "create-1", "fp").await.unwrap();
		ledger.complete(1, "create-1", 77).await;

		let admission = ledger.admit(1, "create-1", "fp").await.unwrap();
		assert_eq!(admission, Admission::Duplicate(77));
	}

	#[tokio::test]
	async fn key_reuse_with_different_payload_is_rejected() {
		let ledger = ledger();
		ledger.admit(1, "create-1", "fp-a").await.unwrap();
		ledger.complete(1, "create-1", 77).await;

		let err = ledger.admit(1, "create-1", "fp-b").await.unwrap_err();
		assert!(matches!(err, IdempotencyError::FingerprintMismatch));
	}

	#[tokio::test]
	async fn keys_are_scoped_per_requester() {
		let ledger = ledger();
		ledger.admit(1, "create-1", "fp").await.unwrap();
		ledger.complete(1, "create-1", 77).await;

		// Same key, different requester: a fresh reservation
		let admission = ledger.admit(2, "create-1", "fp").await.unwrap();
		assert_eq!(admission, Admission::Admitted);
	}

	#[tokio::test]
	async fn abort_frees_the_key_for_retry() {
		let ledger = ledger();
		ledger.admit(1, "create-1", "fp").await.unwrap();
		ledger.abort(1, "create-1").await;

		let admission = ledger.admit(1, "create-1", "fp").await.unwrap();
		assert_eq!(admission, Admission::Admitted);
	}
}
