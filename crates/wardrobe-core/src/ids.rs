//! Monotonic id allocation backed by counter records.

use wardrobe_storage::{StorageError, StorageService};
use wardrobe_types::StorageKey;

/// Allocates the next id from the named counter.
///
/// The counter record is incremented with a compare-and-swap loop, so
/// concurrent allocations never hand out the same id.
pub(crate) async fn next_id(storage: &StorageService, counter: &str) -> Result<u64, StorageError> {
	loop {
		match storage
			.retrieve::<u64>(StorageKey::Counters.as_str(), counter)
			.await
		{
			Ok(current) => {
				let next = current + 1;
				match storage
					.swap(StorageKey::Counters.as_str(), counter, &current, &next)
					.await
				{
					Ok(()) => return Ok(next),
					Err(StorageError::Conflict) => continue,
					Err(e) => return Err(e),
				}
			}
			Err(StorageError::NotFound) => {
				match storage
					.insert_new(StorageKey::Counters.as_str(), counter, &1u64)
					.await
				{
					Ok(()) => return Ok(1),
					Err(StorageError::AlreadyExists) => continue,
					Err(e) => return Err(e),
				}
			}
			Err(e) => return Err(e),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Arc;
	use wardrobe_storage::implementations::memory::MemoryStorage;

	#[tokio::test]
	async fn ids_are_dense_and_unique() {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));

		let mut handles = Vec::new();
		for _ in 0..8 {
			let storage = storage.clone();
			handles.push(tokio::spawn(async move {
				next_id(&storage, "orders").await.unwrap()
			}));
		}

		let mut ids = Vec::new();
		for handle in handles {
			ids.push(handle.await.unwrap());
		}
		ids.sort_unstable();
		assert_eq!(ids, (1..=8).collect::<Vec<u64>>());
	}

	#[tokio::test]
	async fn counters_are_independent() {
		let storage = StorageService::new(Box::new(MemoryStorage::new()));
		assert_eq!(next_id(&storage, "orders").await.unwrap(), 1);
		assert_eq!(next_id(&storage, "orders").await.unwrap(), 2);
		assert_eq!(next_id(&storage, "disputes").await.unwrap(), 1);
	}
}
