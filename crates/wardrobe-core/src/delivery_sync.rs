//! Delivery sync adapter.
//!
//! Translates carrier-side delivery events into order transitions. The
//! vocabulary mapping is deliberately partial: PickedUp and InTransit move
//! the order to InTransit, Delivered moves it to Delivered, and a Failed
//! delivery never changes order status at all; a failed handoff needs a
//! human decision, not an automatic state change. Conflicts with concurrent
//! transitions are retried a bounded number of times and then surfaced,
//! never swallowed.

use crate::engine::event_bus::EventBus;
use crate::state::{OrderStateMachine, TransitionError};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;
use wardrobe_storage::{StorageError, StorageService};
use wardrobe_types::{
	current_timestamp, Actor, Delivery, DeliveryEvent, DeliveryStatus, LifecycleEvent, Order,
	OrderStatus, StorageKey,
};

/// How many times a lost race against a concurrent transition is retried
/// before the conflict is handed back to the caller.
const SYNC_RETRY_LIMIT: usize = 3;

/// Errors that can occur while processing delivery updates.
#[derive(Debug, Error)]
pub enum DeliverySyncError {
	/// The order does not exist.
	#[error("Order not found: {0}")]
	OrderNotFound(u64),
	/// The order has no delivery record yet (it was never dispatched).
	#[error("Order {0} has no delivery record")]
	NotDispatched(u64),
	/// The carrier status update does not follow the delivery lifecycle.
	#[error("Invalid delivery progression from {from} to {to}")]
	InvalidProgression {
		from: DeliveryStatus,
		to: DeliveryStatus,
	},
	/// The mapped order transition failed.
	#[error(transparent)]
	Transition(#[from] TransitionError),
	/// The storage backend failed.
	#[error("Storage error: {0}")]
	Storage(String),
}

/// Result of a delivery update: the stored record and the order it moved,
/// if the mapped transition applied.
#[derive(Debug, Clone)]
pub struct DeliveryUpdate {
	pub delivery: Delivery,
	pub order: Option<Order>,
}

/// Applies carrier events to the delivery record and the order.
pub struct DeliverySyncAdapter {
	storage: Arc<StorageService>,
	machine: Arc<OrderStateMachine>,
	event_bus: EventBus,
}

impl DeliverySyncAdapter {
	pub fn new(
		storage: Arc<StorageService>,
		machine: Arc<OrderStateMachine>,
		event_bus: EventBus,
	) -> Self {
		Self {
			storage,
			machine,
			event_bus,
		}
	}

	/// Returns the delivery record for an order.
	pub async fn get_delivery(&self, order_id: u64) -> Result<Delivery, DeliverySyncError> {
		// The order must exist even if soft-deleted records would hide it
		self.machine.get_order(order_id).await.map_err(map_order_err)?;
		self.storage
			.retrieve(StorageKey::Deliveries.as_str(), &order_id.to_string())
			.await
			.map_err(|e| match e {
				StorageError::NotFound => DeliverySyncError::NotDispatched(order_id),
				other => DeliverySyncError::Storage(other.to_string()),
			})
	}

	/// Records a carrier status update and syncs the order.
	///
	/// A same-status update only refreshes notes and tracking number. The
	/// order sync runs regardless, so a retried carrier event can finish a
	/// sync that previously lost a race.
	#[instrument(skip(self, notes, tracking_number), fields(order_id = order_id, status = %status))]
	pub async fn update_delivery(
		&self,
		order_id: u64,
		status: DeliveryStatus,
		notes: Option<String>,
		tracking_number: Option<String>,
	) -> Result<DeliveryUpdate, DeliverySyncError> {
		let delivery = loop {
			let stored = self.get_delivery(order_id).await?;

			if stored.status != status && !progression_allowed(stored.status, status) {
				return Err(DeliverySyncError::InvalidProgression {
					from: stored.status,
					to: status,
				});
			}

			let mut next = stored.clone();
			let now = current_timestamp();
			next.status = status;
			next.updated_at = now;
			match status {
				DeliveryStatus::PickedUp => {
					next.picked_up_at.get_or_insert(now);
				}
				DeliveryStatus::Delivered => {
					next.delivered_at.get_or_insert(now);
				}
				DeliveryStatus::Failed => {
					next.failed_at.get_or_insert(now);
				}
				DeliveryStatus::Pending | DeliveryStatus::InTransit => {}
			}
			if let Some(ref notes) = notes {
				next.notes = Some(notes.clone());
			}
			if let Some(ref tracking) = tracking_number {
				next.tracking_number = Some(tracking.clone());
			}

			match self
				.storage
				.swap(
					StorageKey::Deliveries.as_str(),
					&order_id.to_string(),
					&stored,
					&next,
				)
				.await
			{
				Ok(()) => break next,
				Err(StorageError::Conflict) => continue,
				Err(StorageError::NotFound) => {
					return Err(DeliverySyncError::NotDispatched(order_id))
				}
				Err(e) => return Err(DeliverySyncError::Storage(e.to_string())),
			}
		};

		self.event_bus
			.publish(LifecycleEvent::Delivery(DeliveryEvent::Updated {
				order_id,
				status,
			}))
			.ok();

		let order = self.sync_from_delivery(order_id, status).await?;

		Ok(DeliveryUpdate { delivery, order })
	}

	/// Maps a delivery status onto the order lifecycle and applies it.
	///
	/// Returns `Ok(None)` when the status has no order counterpart
	/// (Pending, Failed) or the order is already at or past the mapped
	/// status. A version conflict from a concurrent transition is retried
	/// with a fresh read up to [`SYNC_RETRY_LIMIT`] times, then surfaced.
	pub async fn sync_from_delivery(
		&self,
		order_id: u64,
		delivery_status: DeliveryStatus,
	) -> Result<Option<Order>, DeliverySyncError> {
		let target = match delivery_status {
			DeliveryStatus::PickedUp | DeliveryStatus::InTransit => OrderStatus::InTransit,
			DeliveryStatus::Delivered => OrderStatus::Delivered,
			// Delivery failure alone never auto-changes order status
			DeliveryStatus::Pending | DeliveryStatus::Failed => return Ok(None),
		};

		let mut last_conflict = None;
		for _ in 0..SYNC_RETRY_LIMIT {
			let order = self.machine.get_order(order_id).await.map_err(map_order_err)?;

			if already_reached(order.status, target) {
				return Ok(None);
			}

			match self
				.machine
				.transition(order_id, target, order.version, Actor::System)
				.await
			{
				Ok(outcome) => return Ok(Some(outcome.after)),
				Err(TransitionError::Conflict {
					order_id,
					presented,
					stored,
				}) => {
					tracing::debug!(order_id, presented, stored, "delivery sync lost a race, retrying");
					last_conflict = Some(TransitionError::Conflict {
						order_id,
						presented,
						stored,
					});
					continue;
				}
				Err(e) => return Err(e.into()),
			}
		}

		Err(last_conflict
			.unwrap_or(TransitionError::NotFound(order_id))
			.into())
	}
}

fn map_order_err(e: TransitionError) -> DeliverySyncError {
	match e {
		TransitionError::NotFound(id) => DeliverySyncError::OrderNotFound(id),
		other => DeliverySyncError::Storage(other.to_string()),
	}
}

/// Allowed carrier status progressions. Forward skips are fine (sparse
/// carrier feeds jump stages); Delivered and Failed are terminal.
fn progression_allowed(from: DeliveryStatus, to: DeliveryStatus) -> bool {
	use DeliveryStatus::*;
	matches!(
		(from, to),
		(Pending, PickedUp)
			| (Pending, InTransit)
			| (Pending, Delivered)
			| (Pending, Failed)
			| (PickedUp, InTransit)
			| (PickedUp, Delivered)
			| (PickedUp, Failed)
			| (InTransit, Delivered)
			| (InTransit, Failed)
	)
}

/// Whether the order already sits at or beyond the mapped status in the
/// forward lifecycle, making the sync a no-op.
fn already_reached(current: OrderStatus, target: OrderStatus) -> bool {
	match (lifecycle_rank(current), lifecycle_rank(target)) {
		(Some(current), Some(target)) => current >= target,
		_ => false,
	}
}

/// Position in the linear forward flow. Side states (Rejected, Cancelled,
/// Disputed) have no rank; transitions into them are never a sync no-op.
fn lifecycle_rank(status: OrderStatus) -> Option<u8> {
	use OrderStatus::*;
	match status {
		Requested => Some(0),
		Approved => Some(1),
		Dispatched => Some(2),
		InTransit => Some(3),
		Delivered => Some(4),
		InUse => Some(5),
		ReturnRequested => Some(6),
		Returned => Some(7),
		Completed => Some(8),
		Rejected | Cancelled | Disputed => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::usage::SubscriptionUsageGate;
	use wardrobe_storage::implementations::memory::MemoryStorage;
	use wardrobe_types::{Order, OrderType};

	struct Harness {
		machine: Arc<OrderStateMachine>,
		adapter: DeliverySyncAdapter,
	}

	fn harness() -> Harness {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let usage = Arc::new(SubscriptionUsageGate::new(storage.clone()));
		let event_bus = EventBus::default();
		let machine = Arc::new(OrderStateMachine::new(
			storage.clone(),
			usage,
			event_bus.clone(),
		));
		let adapter = DeliverySyncAdapter::new(storage, machine.clone(), event_bus);
		Harness { machine, adapter }
	}

	/// Seeds an order in Approved and dispatches it so a delivery record
	/// exists. Returns the order id.
	async fn dispatched_order(harness: &Harness, id: u64) -> Order {
		let now = current_timestamp();
		let order = Order {
			id,
			order_type: OrderType::Rent,
			status: OrderStatus::Approved,
			previous_status: None,
			version: 1,
			renter_id: 10,
			owner_id: 20,
			start_date: Some(now),
			end_date: Some(now + 7 * 24 * 3600),
			expires_at: now + 24 * 3600,
			is_late: false,
			usage_consumed: false,
			created_at: now,
			updated_at: now,
			deleted_at: None,
		};
		harness.machine.store_order(&order).await.unwrap();
		harness
			.machine
			.transition(id, OrderStatus::Dispatched, 1, Actor::User(20))
			.await
			.unwrap()
			.after
	}

	#[tokio::test]
	async fn picked_up_moves_the_order_to_in_transit() {
		let harness = harness();
		dispatched_order(&harness, 1).await;

		let update = harness
			.adapter
			.update_delivery(1, DeliveryStatus::PickedUp, None, Some("TRK-1".into()))
			.await
			.unwrap();

		assert_eq!(update.delivery.status, DeliveryStatus::PickedUp);
		assert!(update.delivery.picked_up_at.is_some());
		assert_eq!(update.delivery.tracking_number.as_deref(), Some("TRK-1"));

		let order = update.order.unwrap();
		assert_eq!(order.status, OrderStatus::InTransit);
		assert_eq!(order.previous_status, Some(OrderStatus::Dispatched));
	}

	#[tokio::test]
	async fn delivered_moves_the_order_to_delivered() {
		let harness = harness();
		dispatched_order(&harness, 1).await;
		harness
			.adapter
			.update_delivery(1, DeliveryStatus::PickedUp, None, None)
			.await
			.unwrap();

		let update = harness
			.adapter
			.update_delivery(1, DeliveryStatus::Delivered, None, None)
			.await
			.unwrap();
		assert!(update.delivery.delivered_at.is_some());
		assert_eq!(update.order.unwrap().status, OrderStatus::Delivered);
	}

	#[tokio::test]
	async fn failed_delivery_never_touches_the_order() {
		let harness = harness();
		let order = dispatched_order(&harness, 1).await;

		let update = harness
			.adapter
			.update_delivery(1, DeliveryStatus::Failed, Some("address unknown".into()), None)
			.await
			.unwrap();

		assert_eq!(update.delivery.status, DeliveryStatus::Failed);
		assert!(update.delivery.failed_at.is_some());
		assert!(update.order.is_none());

		let unchanged = harness.machine.get_order(1).await.unwrap();
		assert_eq!(unchanged.status, OrderStatus::Dispatched);
		assert_eq!(unchanged.version, order.version);
	}

	#[tokio::test]
	async fn replayed_delivered_event_is_a_noop() {
		let harness = harness();
		dispatched_order(&harness, 1).await;
		harness
			.adapter
			.update_delivery(1, DeliveryStatus::Delivered, None, None)
			.await
			.unwrap();
		let before = harness.machine.get_order(1).await.unwrap();

		let update = harness
			.adapter
			.update_delivery(1, DeliveryStatus::Delivered, None, None)
			.await
			.unwrap();
		assert!(update.order.is_none());
		assert_eq!(harness.machine.get_order(1).await.unwrap(), before);
	}

	#[tokio::test]
	async fn late_carrier_event_after_the_order_moved_on_is_a_noop() {
		let harness = harness();
		dispatched_order(&harness, 1).await;
		harness
			.adapter
			.update_delivery(1, DeliveryStatus::Delivered, None, None)
			.await
			.unwrap();

		// The renter confirms receipt; the order is now past Delivered
		let order = harness.machine.get_order(1).await.unwrap();
		harness
			.machine
			.transition(1, OrderStatus::InUse, order.version, Actor::User(10))
			.await
			.unwrap();

		// A duplicate Delivered webhook trickles in
		let synced = harness
			.adapter
			.sync_from_delivery(1, DeliveryStatus::Delivered)
			.await
			.unwrap();
		assert!(synced.is_none());
	}

	#[tokio::test]
	async fn regressions_in_the_carrier_vocabulary_are_rejected() {
		let harness = harness();
		dispatched_order(&harness, 1).await;
		harness
			.adapter
			.update_delivery(1, DeliveryStatus::Delivered, None, None)
			.await
			.unwrap();

		let err = harness
			.adapter
			.update_delivery(1, DeliveryStatus::PickedUp, None, None)
			.await
			.unwrap_err();
		assert!(matches!(
			err,
			DeliverySyncError::InvalidProgression {
				from: DeliveryStatus::Delivered,
				to: DeliveryStatus::PickedUp,
			}
		));
	}

	#[tokio::test]
	async fn updates_before_dispatch_are_rejected() {
		let harness = harness();
		// No order at all
		let err = harness
			.adapter
			.update_delivery(9, DeliveryStatus::PickedUp, None, None)
			.await
			.unwrap_err();
		assert!(matches!(err, DeliverySyncError::OrderNotFound(9)));
	}
}
