//! Subscription usage accounting.
//!
//! Gates creation of subscription-gated order types (Rent, Swap) behind a
//! per-cycle quota. The limit check and the counter increment are one
//! atomic operation: a compare-and-swap loop that re-reads and re-evaluates
//! on every conflict, so two concurrent requests can never jointly exceed
//! the limit.

use chrono::{DateTime, Months, Utc};
use std::sync::Arc;
use thiserror::Error;
use wardrobe_storage::{StorageError, StorageService};
use wardrobe_types::{current_timestamp, StorageKey, UsageAction, UserSubscription};

/// Errors that can occur during usage accounting.
#[derive(Debug, Error)]
pub enum UsageError {
	/// The user has no subscription record.
	#[error("No active subscription for user {0}")]
	NoActiveSubscription(u64),
	/// The relevant counter has reached its plan limit.
	#[error("{kind} quota exhausted: {used} of {limit} used this cycle")]
	QuotaExceeded {
		kind: UsageAction,
		used: u32,
		limit: u32,
	},
	/// The storage backend failed.
	#[error("Storage error: {0}")]
	Storage(String),
}

/// Checks and updates per-cycle usage counters.
pub struct SubscriptionUsageGate {
	storage: Arc<StorageService>,
}

impl SubscriptionUsageGate {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	async fn load(&self, user_id: u64) -> Result<UserSubscription, UsageError> {
		self.storage
			.retrieve(StorageKey::Subscriptions.as_str(), &user_id.to_string())
			.await
			.map_err(|e| match e {
				StorageError::NotFound => UsageError::NoActiveSubscription(user_id),
				other => UsageError::Storage(other.to_string()),
			})
	}

	async fn swap(
		&self,
		user_id: u64,
		expected: &UserSubscription,
		next: &UserSubscription,
	) -> Result<(), StorageError> {
		self.storage
			.swap(
				StorageKey::Subscriptions.as_str(),
				&user_id.to_string(),
				expected,
				next,
			)
			.await
	}

	/// Returns the user's subscription record as stored.
	pub async fn get(&self, user_id: u64) -> Result<UserSubscription, UsageError> {
		self.load(user_id).await
	}

	/// Creates or replaces a subscription record.
	pub async fn upsert(&self, subscription: &UserSubscription) -> Result<(), UsageError> {
		self.storage
			.store(
				StorageKey::Subscriptions.as_str(),
				&subscription.user_id.to_string(),
				subscription,
			)
			.await
			.map_err(|e| UsageError::Storage(e.to_string()))
	}

	/// Atomically checks the quota and consumes one unit.
	///
	/// An expired cycle is rolled forward in whole months and its counters
	/// reset before the check; expiry never denies service by itself. Two
	/// concurrent calls at the last remaining unit: exactly one succeeds,
	/// the other observes the updated counter and is denied.
	pub async fn reserve(&self, user_id: u64, action: UsageAction) -> Result<(), UsageError> {
		loop {
			let stored = self.load(user_id).await?;
			let mut next = stored.clone();

			let now = current_timestamp();
			if now >= next.cycle_end {
				roll_cycle(&mut next, now);
			}

			let (used, limit) = next.usage(action);
			if used >= limit {
				return Err(UsageError::QuotaExceeded {
					kind: action,
					used,
					limit,
				});
			}

			match action {
				UsageAction::Rental => next.rentals_used += 1,
				UsageAction::Swap => next.swaps_used += 1,
			}

			match self.swap(user_id, &stored, &next).await {
				Ok(()) => return Ok(()),
				Err(StorageError::Conflict) => continue,
				Err(StorageError::NotFound) => {
					return Err(UsageError::NoActiveSubscription(user_id))
				}
				Err(e) => return Err(UsageError::Storage(e.to_string())),
			}
		}
	}

	/// Credits one unit back after a gated order is cancelled.
	///
	/// Counters never go negative. A missing subscription or an already
	/// zero counter leaves nothing to credit and is not an error.
	pub async fn release(&self, user_id: u64, action: UsageAction) -> Result<(), UsageError> {
		loop {
			let stored = match self.load(user_id).await {
				Ok(sub) => sub,
				Err(UsageError::NoActiveSubscription(_)) => {
					tracing::warn!(user_id, %action, "no subscription to credit back to");
					return Ok(());
				}
				Err(e) => return Err(e),
			};

			let (used, _) = stored.usage(action);
			if used == 0 {
				tracing::warn!(user_id, %action, "usage counter already zero, nothing to credit");
				return Ok(());
			}

			let mut next = stored.clone();
			match action {
				UsageAction::Rental => next.rentals_used -= 1,
				UsageAction::Swap => next.swaps_used -= 1,
			}

			match self.swap(user_id, &stored, &next).await {
				Ok(()) => return Ok(()),
				Err(StorageError::Conflict) => continue,
				Err(StorageError::NotFound) => return Ok(()),
				Err(e) => return Err(UsageError::Storage(e.to_string())),
			}
		}
	}

	/// Re-applies a released unit, capped at the plan limit.
	///
	/// Used only by the state machine's rollback path to undo a
	/// credit-back.
	pub(crate) async fn restore(&self, user_id: u64, action: UsageAction) -> Result<(), UsageError> {
		loop {
			let stored = match self.load(user_id).await {
				Ok(sub) => sub,
				Err(UsageError::NoActiveSubscription(_)) => return Ok(()),
				Err(e) => return Err(e),
			};

			let (used, limit) = stored.usage(action);
			if used >= limit {
				return Ok(());
			}

			let mut next = stored.clone();
			match action {
				UsageAction::Rental => next.rentals_used += 1,
				UsageAction::Swap => next.swaps_used += 1,
			}

			match self.swap(user_id, &stored, &next).await {
				Ok(()) => return Ok(()),
				Err(StorageError::Conflict) => continue,
				Err(StorageError::NotFound) => return Ok(()),
				Err(e) => return Err(UsageError::Storage(e.to_string())),
			}
		}
	}
}

/// Rolls an expired cycle forward in whole months until it covers `now`,
/// resetting the counters.
fn roll_cycle(sub: &mut UserSubscription, now: u64) {
	let now_dt = DateTime::<Utc>::from_timestamp(now as i64, 0).unwrap_or_else(Utc::now);
	let mut start = DateTime::<Utc>::from_timestamp(sub.cycle_start as i64, 0).unwrap_or(now_dt);
	let mut end = DateTime::<Utc>::from_timestamp(sub.cycle_end as i64, 0).unwrap_or(now_dt);

	while end <= now_dt {
		start = end;
		end = match end.checked_add_months(Months::new(1)) {
			Some(next) => next,
			None => break,
		};
	}

	sub.cycle_start = start.timestamp().max(0) as u64;
	sub.cycle_end = end.timestamp().max(0) as u64;
	sub.rentals_used = 0;
	sub.swaps_used = 0;
}
