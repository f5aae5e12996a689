//! Subscription record operability surface.
//!
//! The usage gate reads these records; this module lets operators seed and
//! inspect them. Replacing a record resets its counters and opens a fresh
//! cycle starting now.

use super::map_usage_error;
use std::sync::Arc;
use wardrobe_core::LifecycleEngine;
use wardrobe_types::{
	current_timestamp, ApiError, UpsertSubscriptionRequest, UserSubscription,
};

/// One-month cycle length used when opening a fresh window.
const CYCLE_SECONDS: u64 = 30 * 24 * 3600;

/// Fetches a user's subscription record.
pub async fn get_subscription(
	engine: &Arc<LifecycleEngine>,
	user_id: u64,
) -> Result<UserSubscription, ApiError> {
	engine
		.usage_gate()
		.get(user_id)
		.await
		.map_err(|e| match e {
			wardrobe_core::UsageError::NoActiveSubscription(user_id) => ApiError::NotFound {
				message: format!("No subscription for user {}", user_id),
			},
			other => map_usage_error(other),
		})
}

/// Creates or replaces a user's subscription record.
pub async fn put_subscription(
	engine: &Arc<LifecycleEngine>,
	user_id: u64,
	request: UpsertSubscriptionRequest,
) -> Result<UserSubscription, ApiError> {
	let now = current_timestamp();
	let subscription = UserSubscription {
		user_id,
		cycle_start: now,
		cycle_end: now + CYCLE_SECONDS,
		rentals_used: 0,
		swaps_used: 0,
		rental_limit: request.rental_limit,
		swap_credits: request.swap_credits,
	};
	engine
		.usage_gate()
		.upsert(&subscription)
		.await
		.map_err(map_usage_error)?;
	Ok(subscription)
}
