//! Order creation flow.
//!
//! A creation request passes the idempotency ledger, then the subscription
//! usage gate, then is persisted as a new order in its initial state. A
//! denial or persistence failure releases whatever the earlier steps took,
//! so a retry with the same key can succeed.

use crate::engine::event_bus::EventBus;
use crate::idempotency::{Admission, IdempotencyError, IdempotencyLedger};
use crate::ids;
use crate::state::{OrderStateMachine, TransitionError};
use crate::usage::{SubscriptionUsageGate, UsageError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;
use wardrobe_storage::StorageService;
use wardrobe_types::{
	current_timestamp, CreateOrderRequest, LifecycleEvent, Order, OrderEvent, OrderStatus,
	OrderType,
};

/// Errors that can occur during order creation.
#[derive(Debug, Error)]
pub enum IntakeError {
	/// The request payload is malformed.
	#[error("Invalid request: {0}")]
	Validation(String),
	/// Idempotency admission failed.
	#[error(transparent)]
	Idempotency(#[from] IdempotencyError),
	/// The usage gate denied the request.
	#[error(transparent)]
	Quota(#[from] UsageError),
	/// A replayed key points at an order that no longer exists.
	#[error("Order not found: {0}")]
	NotFound(u64),
	/// The storage backend failed.
	#[error("Storage error: {0}")]
	Storage(String),
}

/// A created (or replayed) order.
#[derive(Debug, Clone)]
pub struct CreationResult {
	pub order: Order,
	/// True when an idempotency key replayed an earlier result instead of
	/// creating anything.
	pub replayed: bool,
}

/// Admits and persists new orders.
pub struct OrderIntake {
	storage: Arc<StorageService>,
	machine: Arc<OrderStateMachine>,
	ledger: Arc<IdempotencyLedger>,
	usage: Arc<SubscriptionUsageGate>,
	stale_window: Duration,
	event_bus: EventBus,
}

impl OrderIntake {
	pub fn new(
		storage: Arc<StorageService>,
		machine: Arc<OrderStateMachine>,
		ledger: Arc<IdempotencyLedger>,
		usage: Arc<SubscriptionUsageGate>,
		stale_window: Duration,
		event_bus: EventBus,
	) -> Self {
		Self {
			storage,
			machine,
			ledger,
			usage,
			stale_window,
			event_bus,
		}
	}

	/// Creates a new order, honoring an optional idempotency key.
	///
	/// Without a key the request is always treated as distinct; callers
	/// that need dedup must always send one.
	#[instrument(skip(self, request), fields(renter_id = request.renter_id, order_type = %request.order_type))]
	pub async fn create(
		&self,
		request: CreateOrderRequest,
		idempotency_key: Option<&str>,
	) -> Result<CreationResult, IntakeError> {
		let request = validate(request)?;

		// The serialized payload doubles as the fingerprint: equal bytes,
		// equal request
		let fingerprint = serde_json::to_string(&request)
			.map_err(|e| IntakeError::Storage(e.to_string()))?;

		if let Some(key) = idempotency_key {
			match self
				.ledger
				.admit(request.renter_id, key, &fingerprint)
				.await?
			{
				Admission::Admitted => {}
				Admission::Duplicate(order_id) => {
					let order =
						self.machine.get_order(order_id).await.map_err(|e| match e {
							TransitionError::NotFound(id) => IntakeError::NotFound(id),
							other => IntakeError::Storage(other.to_string()),
						})?;
					return Ok(CreationResult {
						order,
						replayed: true,
					});
				}
			}
		}

		let gated_action = request.order_type.usage_action();
		if let Some(action) = gated_action {
			if let Err(denial) = self.usage.reserve(request.renter_id, action).await {
				if let Some(key) = idempotency_key {
					self.ledger.abort(request.renter_id, key).await;
				}
				return Err(denial.into());
			}
		}

		let order = match self.persist(&request, gated_action.is_some()).await {
			Ok(order) => order,
			Err(e) => {
				// Undo what the earlier steps took
				if let Some(action) = gated_action {
					if let Err(release_err) =
						self.usage.release(request.renter_id, action).await
					{
						tracing::error!(renter_id = request.renter_id, %release_err, "failed to release usage after aborted creation");
					}
				}
				if let Some(key) = idempotency_key {
					self.ledger.abort(request.renter_id, key).await;
				}
				return Err(e);
			}
		};

		if let Some(key) = idempotency_key {
			self.ledger.complete(request.renter_id, key, order.id).await;
		}

		self.event_bus
			.publish(LifecycleEvent::Order(OrderEvent::Created {
				order_id: order.id,
				order_type: order.order_type,
			}))
			.ok();

		Ok(CreationResult {
			order,
			replayed: false,
		})
	}

	async fn persist(
		&self,
		request: &CreateOrderRequest,
		usage_consumed: bool,
	) -> Result<Order, IntakeError> {
		let id = ids::next_id(&self.storage, "orders")
			.await
			.map_err(|e| IntakeError::Storage(e.to_string()))?;
		let now = current_timestamp();

		let order = Order {
			id,
			order_type: request.order_type,
			status: OrderStatus::Requested,
			previous_status: None,
			version: 1,
			renter_id: request.renter_id,
			owner_id: request.owner_id,
			start_date: request.start_date,
			end_date: request.end_date,
			expires_at: now + self.stale_window.as_secs(),
			is_late: false,
			usage_consumed,
			created_at: now,
			updated_at: now,
			deleted_at: None,
		};

		self.machine
			.store_order(&order)
			.await
			.map_err(|e| IntakeError::Storage(e.to_string()))?;

		Ok(order)
	}
}

/// Normalizes and validates a creation request.
fn validate(mut request: CreateOrderRequest) -> Result<CreateOrderRequest, IntakeError> {
	if request.renter_id == request.owner_id {
		return Err(IntakeError::Validation(
			"renter and owner must be different users".to_string(),
		));
	}

	match request.order_type {
		OrderType::Rent => {
			let (start, end) = match (request.start_date, request.end_date) {
				(Some(start), Some(end)) => (start, end),
				_ => {
					return Err(IntakeError::Validation(
						"rent orders require a start and end date".to_string(),
					))
				}
			};
			if start >= end {
				return Err(IntakeError::Validation(
					"rental window must end after it starts".to_string(),
				));
			}
		}
		OrderType::Swap => {
			if let (Some(start), Some(end)) = (request.start_date, request.end_date) {
				if start >= end {
					return Err(IntakeError::Validation(
						"swap window must end after it starts".to_string(),
					));
				}
			}
		}
		OrderType::Buy => {
			// The rental window is meaningless for a purchase
			request.start_date = None;
			request.end_date = None;
		}
	}

	Ok(request)
}

#[cfg(test)]
mod tests {
	use super::*;
	use wardrobe_storage::implementations::memory::MemoryStorage;
	use wardrobe_types::{StorageKey, UserSubscription};

	const HOUR: u64 = 3600;

	struct Harness {
		storage: Arc<StorageService>,
		usage: Arc<SubscriptionUsageGate>,
		intake: OrderIntake,
	}

	fn harness() -> Harness {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let usage = Arc::new(SubscriptionUsageGate::new(storage.clone()));
		let event_bus = EventBus::default();
		let machine = Arc::new(OrderStateMachine::new(
			storage.clone(),
			usage.clone(),
			event_bus.clone(),
		));
		let ledger = Arc::new(IdempotencyLedger::new(
			storage.clone(),
			Duration::from_secs(24 * HOUR),
		));
		let intake = OrderIntake::new(
			storage.clone(),
			machine,
			ledger,
			usage.clone(),
			Duration::from_secs(24 * HOUR),
			event_bus,
		);
		Harness {
			storage,
			usage,
			intake,
		}
	}

	async fn seed_subscription(harness: &Harness, user_id: u64, rentals_used: u32, limit: u32) {
		let now = current_timestamp();
		harness
			.usage
			.upsert(&UserSubscription {
				user_id,
				cycle_start: now - 1000,
				cycle_end: now + 30 * 24 * HOUR,
				rentals_used,
				swaps_used: 0,
				rental_limit: limit,
				swap_credits: 2,
			})
			.await
			.unwrap();
	}

	fn rent_request(renter_id: u64) -> CreateOrderRequest {
		let now = current_timestamp();
		CreateOrderRequest {
			order_type: OrderType::Rent,
			renter_id,
			owner_id: 99,
			start_date: Some(now),
			end_date: Some(now + 7 * 24 * HOUR),
		}
	}

	async fn stored_orders(harness: &Harness) -> Vec<Order> {
		harness
			.storage
			.retrieve_all(StorageKey::Orders.as_str())
			.await
			.unwrap()
	}

	#[tokio::test]
	async fn creates_a_rent_order_in_requested_state() {
		let harness = harness();
		seed_subscription(&harness, 1, 0, 5).await;

		let result = harness.intake.create(rent_request(1), None).await.unwrap();
		assert!(!result.replayed);
		let order = result.order;
		assert_eq!(order.status, OrderStatus::Requested);
		assert_eq!(order.version, 1);
		assert!(order.usage_consumed);
		assert_eq!(order.expires_at, order.created_at + 24 * HOUR);

		let sub = harness.usage.get(1).await.unwrap();
		assert_eq!(sub.rentals_used, 1);
	}

	#[tokio::test]
	async fn buy_orders_skip_the_gate_and_drop_dates() {
		let harness = harness();
		// No subscription seeded: a gated type would be denied

		let now = current_timestamp();
		let request = CreateOrderRequest {
			order_type: OrderType::Buy,
			renter_id: 1,
			owner_id: 2,
			start_date: Some(now),
			end_date: Some(now + HOUR),
		};
		let result = harness.intake.create(request, None).await.unwrap();
		assert!(result.order.start_date.is_none());
		assert!(result.order.end_date.is_none());
		assert!(!result.order.usage_consumed);
	}

	#[tokio::test]
	async fn quota_denial_aborts_the_reservation() {
		let harness = harness();
		seed_subscription(&harness, 1, 5, 5).await;

		let err = harness
			.intake
			.create(rent_request(1), Some("key-1"))
			.await
			.unwrap_err();
		assert!(matches!(err, IntakeError::Quota(UsageError::QuotaExceeded { .. })));
		assert!(stored_orders(&harness).await.is_empty());

		// The key was released: after quota frees up, the retry succeeds
		seed_subscription(&harness, 1, 0, 5).await;
		let result = harness
			.intake
			.create(rent_request(1), Some("key-1"))
			.await
			.unwrap();
		assert!(!result.replayed);
	}

	#[tokio::test]
	async fn duplicate_key_replays_without_new_order_or_usage() {
		let harness = harness();
		seed_subscription(&harness, 1, 0, 5).await;
		let request = rent_request(1);

		let first = harness
			.intake
			.create(request.clone(), Some("key-1"))
			.await
			.unwrap();
		let second = harness
			.intake
			.create(request, Some("key-1"))
			.await
			.unwrap();

		assert!(second.replayed);
		assert_eq!(second.order.id, first.order.id);
		assert_eq!(stored_orders(&harness).await.len(), 1);
		assert_eq!(harness.usage.get(1).await.unwrap().rentals_used, 1);
	}

	#[tokio::test]
	async fn no_key_means_no_dedup() {
		let harness = harness();
		seed_subscription(&harness, 1, 0, 5).await;
		let request = rent_request(1);

		harness.intake.create(request.clone(), None).await.unwrap();
		harness.intake.create(request, None).await.unwrap();
		assert_eq!(stored_orders(&harness).await.len(), 2);
	}

	#[tokio::test]
	async fn rent_without_dates_is_rejected() {
		let harness = harness();
		seed_subscription(&harness, 1, 0, 5).await;

		let mut request = rent_request(1);
		request.end_date = None;
		let err = harness.intake.create(request, None).await.unwrap_err();
		assert!(matches!(err, IntakeError::Validation(_)));
	}

	#[tokio::test]
	async fn self_dealing_is_rejected() {
		let harness = harness();
		let mut request = rent_request(1);
		request.owner_id = 1;
		let err = harness.intake.create(request, None).await.unwrap_err();
		assert!(matches!(err, IntakeError::Validation(_)));
	}
}
