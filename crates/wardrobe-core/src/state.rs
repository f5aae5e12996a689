//! Order state machine implementation.
//!
//! The single authority for order status changes. Every caller, whether a
//! user request, the delivery sync adapter, the SLA scheduler or an admin
//! override, submits a requested transition here. The machine validates it
//! against the adjacency graph and the actor permission matrix, applies it
//! with a version-guarded compare-and-swap, and triggers the side effects
//! the destination state implies. A failed side effect rolls the whole
//! transition back; no transition is ever left half-applied.

use crate::engine::event_bus::EventBus;
use crate::ids;
use crate::usage::SubscriptionUsageGate;
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;
use wardrobe_storage::{StorageError, StorageService};
use wardrobe_types::{
	current_timestamp, Actor, Delivery, DeliveryStatus, Dispute, DisputeStatus, LifecycleEvent,
	Order, OrderEvent, OrderStatus, StorageKey,
};

/// Errors that can occur during order state management.
#[derive(Debug, Error)]
pub enum TransitionError {
	/// Unknown or soft-deleted order.
	#[error("Order not found: {0}")]
	NotFound(u64),
	/// The caller's observed version is stale, or the guarded write lost
	/// to a concurrent update. The caller must re-read and retry.
	#[error("Version conflict on order {order_id}: presented {presented}, stored {stored}")]
	Conflict {
		order_id: u64,
		presented: u64,
		stored: u64,
	},
	/// The requested status is not reachable from the current status.
	#[error("Invalid state transition from {from} to {to}")]
	InvalidTransition { from: OrderStatus, to: OrderStatus },
	/// The requested transition is legal but not for this actor.
	#[error("Actor {actor} may not move an order from {from} to {to}")]
	Forbidden {
		actor: Actor,
		from: OrderStatus,
		to: OrderStatus,
	},
	/// A side effect failed; the transition was rolled back.
	#[error("Side effect failed, transition rolled back: {0}")]
	SideEffect(String),
	/// The storage backend failed.
	#[error("Storage error: {0}")]
	Storage(String),
}

/// Adjacency graph of the order lifecycle.
///
/// Each state maps to the set of states reachable from it through the
/// normal (non-admin) paths. Terminal states map to the empty set.
static TRANSITIONS: Lazy<HashMap<OrderStatus, HashSet<OrderStatus>>> = Lazy::new(|| {
	use OrderStatus::*;
	HashMap::from([
		(
			Requested,
			HashSet::from([Approved, Rejected, Cancelled, Disputed]),
		),
		(Approved, HashSet::from([Dispatched, Cancelled, Disputed])),
		(Dispatched, HashSet::from([InTransit, Cancelled, Disputed])),
		(InTransit, HashSet::from([Delivered, Disputed])),
		(Delivered, HashSet::from([InUse, Disputed])),
		(InUse, HashSet::from([ReturnRequested, Disputed])),
		(ReturnRequested, HashSet::from([Returned, Disputed])),
		(Returned, HashSet::from([Completed, Disputed])),
		(Rejected, HashSet::new()),
		(Disputed, HashSet::new()),
		(Completed, HashSet::new()),
		(Cancelled, HashSet::new()),
	])
});

/// Transitions an ordinary user may request.
///
/// Carrier-authority moves (Dispatched to InTransit, InTransit to
/// Delivered) are deliberately absent: those arrive only through the
/// delivery sync adapter as a system actor.
static USER_TRANSITIONS: Lazy<HashSet<(OrderStatus, OrderStatus)>> = Lazy::new(|| {
	use OrderStatus::*;
	HashSet::from([
		(Requested, Approved),
		(Requested, Rejected),
		(Requested, Cancelled),
		(Requested, Disputed),
		(Approved, Dispatched),
		(Approved, Cancelled),
		(Approved, Disputed),
		(Dispatched, Cancelled),
		(Dispatched, Disputed),
		(InTransit, Disputed),
		(Delivered, InUse),
		(Delivered, Disputed),
		(InUse, ReturnRequested),
		(InUse, Disputed),
		(ReturnRequested, Returned),
		(ReturnRequested, Disputed),
		(Returned, Completed),
		(Returned, Disputed),
	])
});

/// Transitions the system triggers may request: the stale-request reaper
/// and the delivery sync adapter.
static SYSTEM_TRANSITIONS: Lazy<HashSet<(OrderStatus, OrderStatus)>> = Lazy::new(|| {
	use OrderStatus::*;
	HashSet::from([
		(Requested, Cancelled),
		(Dispatched, InTransit),
		(InTransit, Delivered),
	])
});

/// States whose entry implies a Delivery record must exist.
pub fn is_dispatch_equivalent(status: OrderStatus) -> bool {
	matches!(
		status,
		OrderStatus::Dispatched | OrderStatus::InTransit | OrderStatus::Delivered
	)
}

/// Side effects applied alongside an accepted transition.
///
/// Recorded so the rollback path knows exactly what to undo.
#[derive(Debug, Clone, Default)]
pub struct AppliedEffects {
	/// A Delivery record was created for this order.
	pub delivery_created: bool,
	/// A consumed subscription unit was credited back.
	pub usage_released: bool,
	/// A Dispute record was opened, with its id.
	pub dispute_opened: Option<u64>,
}

/// Result of an accepted transition: the order before and after, plus the
/// side effects that were applied with it.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
	pub before: Order,
	pub after: Order,
	pub effects: AppliedEffects,
}

/// Manages order state transitions and persistence.
pub struct OrderStateMachine {
	storage: Arc<StorageService>,
	usage: Arc<SubscriptionUsageGate>,
	event_bus: EventBus,
}

impl OrderStateMachine {
	pub fn new(
		storage: Arc<StorageService>,
		usage: Arc<SubscriptionUsageGate>,
		event_bus: EventBus,
	) -> Self {
		Self {
			storage,
			usage,
			event_bus,
		}
	}

	/// Gets an order by id. Soft-deleted orders are reported as missing.
	pub async fn get_order(&self, order_id: u64) -> Result<Order, TransitionError> {
		let order: Order = self
			.storage
			.retrieve(StorageKey::Orders.as_str(), &order_id.to_string())
			.await
			.map_err(|e| match e {
				StorageError::NotFound => TransitionError::NotFound(order_id),
				other => TransitionError::Storage(other.to_string()),
			})?;
		if order.deleted_at.is_some() {
			return Err(TransitionError::NotFound(order_id));
		}
		Ok(order)
	}

	/// Stores a new order. The id must be unused.
	pub async fn store_order(&self, order: &Order) -> Result<(), TransitionError> {
		self.storage
			.insert_new(StorageKey::Orders.as_str(), &order.id.to_string(), order)
			.await
			.map_err(|e| TransitionError::Storage(e.to_string()))
	}

	/// Lists all orders that are not soft-deleted.
	///
	/// Scheduler scans run over this; a deleted order is invisible to
	/// them by construction.
	pub async fn list_active_orders(&self) -> Result<Vec<Order>, TransitionError> {
		let orders: Vec<Order> = self
			.storage
			.retrieve_all(StorageKey::Orders.as_str())
			.await
			.map_err(|e| TransitionError::Storage(e.to_string()))?;
		Ok(orders
			.into_iter()
			.filter(|o| o.deleted_at.is_none())
			.collect())
	}

	/// Soft-deletes an order. Not a lifecycle transition: `version` is
	/// untouched and no side effects run.
	pub async fn soft_delete(&self, order_id: u64) -> Result<Order, TransitionError> {
		loop {
			let stored = self.get_order(order_id).await?;
			let mut deleted = stored.clone();
			deleted.deleted_at = Some(current_timestamp());
			match self
				.storage
				.swap(
					StorageKey::Orders.as_str(),
					&order_id.to_string(),
					&stored,
					&deleted,
				)
				.await
			{
				Ok(()) => {
					self.event_bus
						.publish(LifecycleEvent::Order(OrderEvent::Deleted { order_id }))
						.ok();
					return Ok(deleted);
				}
				Err(StorageError::Conflict) => continue,
				Err(StorageError::NotFound) => return Err(TransitionError::NotFound(order_id)),
				Err(e) => return Err(TransitionError::Storage(e.to_string())),
			}
		}
	}

	/// Transitions an order to a new status.
	///
	/// Validates the caller's observed `expected_version`, the adjacency
	/// graph and the actor permission matrix, then applies the write with
	/// a compare-and-swap on the exact bytes read. Admin actors bypass
	/// adjacency and permissions but not terminality, and their writes go
	/// through the same guard so version bookkeeping stays correct.
	#[instrument(skip(self), fields(order_id = order_id, to = %requested, actor = %actor))]
	pub async fn transition(
		&self,
		order_id: u64,
		requested: OrderStatus,
		expected_version: u64,
		actor: Actor,
	) -> Result<TransitionOutcome, TransitionError> {
		let stored = self.get_order(order_id).await?;

		if stored.version != expected_version {
			return Err(TransitionError::Conflict {
				order_id,
				presented: expected_version,
				stored: stored.version,
			});
		}

		let from = stored.status;
		if from.is_terminal() || requested == from {
			return Err(TransitionError::InvalidTransition {
				from,
				to: requested,
			});
		}

		if !actor.is_admin() {
			let reachable = TRANSITIONS
				.get(&from)
				.is_some_and(|next| next.contains(&requested));
			if !reachable {
				return Err(TransitionError::InvalidTransition {
					from,
					to: requested,
				});
			}

			let permitted = match actor {
				Actor::User(_) => USER_TRANSITIONS.contains(&(from, requested)),
				Actor::System => SYSTEM_TRANSITIONS.contains(&(from, requested)),
				Actor::Admin(_) => true,
			};
			if !permitted {
				return Err(TransitionError::Forbidden {
					actor,
					from,
					to: requested,
				});
			}
		}

		let mut after = stored.clone();
		after.status = requested;
		after.previous_status = Some(from);
		after.version = stored.version + 1;
		after.updated_at = current_timestamp();

		// The credit-back flag is cleared inside the same guarded write
		// that cancels, so it can never be applied twice.
		let releases_usage = requested == OrderStatus::Cancelled && stored.usage_consumed;
		if releases_usage {
			after.usage_consumed = false;
		}

		match self
			.storage
			.swap(
				StorageKey::Orders.as_str(),
				&order_id.to_string(),
				&stored,
				&after,
			)
			.await
		{
			Ok(()) => {}
			Err(StorageError::Conflict) => {
				// Lost to a concurrent writer between read and swap
				let current = self.get_order(order_id).await?;
				return Err(TransitionError::Conflict {
					order_id,
					presented: expected_version,
					stored: current.version,
				});
			}
			Err(StorageError::NotFound) => return Err(TransitionError::NotFound(order_id)),
			Err(e) => return Err(TransitionError::Storage(e.to_string())),
		}

		let mut outcome = TransitionOutcome {
			before: stored,
			after,
			effects: AppliedEffects::default(),
		};

		if let Err(reason) = self.apply_side_effects(&mut outcome, releases_usage).await {
			tracing::warn!(order_id, %reason, "rolling back transition");
			self.revert(&outcome).await;
			return Err(TransitionError::SideEffect(reason));
		}

		self.event_bus
			.publish(LifecycleEvent::Order(OrderEvent::Transitioned {
				order_id,
				from,
				to: requested,
				version: outcome.after.version,
			}))
			.ok();

		Ok(outcome)
	}

	/// Applies the side effects implied by the destination state.
	async fn apply_side_effects(
		&self,
		outcome: &mut TransitionOutcome,
		releases_usage: bool,
	) -> Result<(), String> {
		let order = &outcome.after;

		if is_dispatch_equivalent(order.status) {
			let now = current_timestamp();
			let delivery = Delivery {
				order_id: order.id,
				status: DeliveryStatus::Pending,
				picked_up_at: None,
				delivered_at: None,
				failed_at: None,
				notes: None,
				tracking_number: None,
				created_at: now,
				updated_at: now,
			};
			match self
				.storage
				.insert_new(
					StorageKey::Deliveries.as_str(),
					&order.id.to_string(),
					&delivery,
				)
				.await
			{
				Ok(()) => outcome.effects.delivery_created = true,
				// A second dispatch finds the record in place; that is
				// success, not an error
				Err(StorageError::AlreadyExists) => {}
				Err(e) => return Err(format!("delivery record: {}", e)),
			}
		}

		if releases_usage {
			if let Some(action) = order.order_type.usage_action() {
				self.usage
					.release(order.renter_id, action)
					.await
					.map_err(|e| format!("usage credit-back: {}", e))?;
				outcome.effects.usage_released = true;
			}
		}

		if order.status == OrderStatus::Disputed {
			let dispute_id = ids::next_id(&self.storage, "disputes")
				.await
				.map_err(|e| format!("dispute id: {}", e))?;
			let dispute = Dispute {
				id: dispute_id,
				order_id: order.id,
				status: DisputeStatus::Open,
				resolution: None,
				opened_at: current_timestamp(),
				resolved_at: None,
			};
			self.storage
				.insert_new(
					StorageKey::Disputes.as_str(),
					&dispute_id.to_string(),
					&dispute,
				)
				.await
				.map_err(|e| format!("dispute record: {}", e))?;
			outcome.effects.dispute_opened = Some(dispute_id);
		}

		Ok(())
	}

	/// Rolls an applied transition back: restores the order to its prior
	/// bytes and undoes the recorded side effects.
	///
	/// Best effort; individual failures are logged, not returned, because
	/// the caller is already on an error path. Also used by the admin
	/// channel when the paired audit write fails.
	pub async fn revert(&self, outcome: &TransitionOutcome) {
		let order_id = outcome.before.id;

		if let Err(e) = self
			.storage
			.swap(
				StorageKey::Orders.as_str(),
				&order_id.to_string(),
				&outcome.after,
				&outcome.before,
			)
			.await
		{
			tracing::error!(order_id, error = %e, "failed to restore order during rollback");
		}

		if outcome.effects.delivery_created {
			if let Err(e) = self
				.storage
				.remove(StorageKey::Deliveries.as_str(), &order_id.to_string())
				.await
			{
				tracing::error!(order_id, error = %e, "failed to remove delivery during rollback");
			}
		}

		if let Some(dispute_id) = outcome.effects.dispute_opened {
			if let Err(e) = self
				.storage
				.remove(StorageKey::Disputes.as_str(), &dispute_id.to_string())
				.await
			{
				tracing::error!(order_id, dispute_id, error = %e, "failed to remove dispute during rollback");
			}
		}

		if outcome.effects.usage_released {
			if let Some(action) = outcome.before.order_type.usage_action() {
				if let Err(e) = self.usage.restore(outcome.before.renter_id, action).await {
					tracing::error!(order_id, error = %e, "failed to restore usage during rollback");
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use wardrobe_storage::implementations::memory::MemoryStorage;
	use wardrobe_types::{OrderType, UserSubscription};

	fn harness() -> (Arc<StorageService>, Arc<SubscriptionUsageGate>, OrderStateMachine) {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let usage = Arc::new(SubscriptionUsageGate::new(storage.clone()));
		let machine =
			OrderStateMachine::new(storage.clone(), usage.clone(), EventBus::default());
		(storage, usage, machine)
	}

	fn sample_order(id: u64, order_type: OrderType, status: OrderStatus) -> Order {
		let now = current_timestamp();
		Order {
			id,
			order_type,
			status,
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
		}
	}

	async fn seed(machine: &OrderStateMachine, order: &Order) {
		machine.store_order(order).await.unwrap();
	}

	async fn seed_subscription(storage: &StorageService, user_id: u64, rentals_used: u32) {
		let now = current_timestamp();
		let sub = UserSubscription {
			user_id,
			cycle_start: now - 1000,
			cycle_end: now + 30 * 24 * 3600,
			rentals_used,
			swaps_used: 0,
			rental_limit: 5,
			swap_credits: 2,
		};
		storage
			.store(
				StorageKey::Subscriptions.as_str(),
				&user_id.to_string(),
				&sub,
			)
			.await
			.unwrap();
	}

	#[tokio::test]
	async fn accepted_transition_bumps_version_and_records_previous_status() {
		let (_, _, machine) = harness();
		seed(&machine, &sample_order(1, OrderType::Rent, OrderStatus::Requested)).await;

		let outcome = machine
			.transition(1, OrderStatus::Approved, 1, Actor::User(20))
			.await
			.unwrap();
		assert_eq!(outcome.after.status, OrderStatus::Approved);
		assert_eq!(outcome.after.previous_status, Some(OrderStatus::Requested));
		assert_eq!(outcome.after.version, 2);

		let outcome = machine
			.transition(1, OrderStatus::Dispatched, 2, Actor::User(20))
			.await
			.unwrap();
		assert_eq!(outcome.after.version, 3);
		assert_eq!(outcome.after.previous_status, Some(OrderStatus::Approved));
	}

	#[tokio::test]
	async fn stale_version_is_a_conflict_and_mutates_nothing() {
		let (_, _, machine) = harness();
		seed(&machine, &sample_order(1, OrderType::Rent, OrderStatus::Requested)).await;

		machine
			.transition(1, OrderStatus::Approved, 1, Actor::User(20))
			.await
			.unwrap();

		// Another caller still holding version 1
		let err = machine
			.transition(1, OrderStatus::Rejected, 1, Actor::User(20))
			.await
			.unwrap_err();
		assert!(matches!(
			err,
			TransitionError::Conflict {
				presented: 1,
				stored: 2,
				..
			}
		));

		let order = machine.get_order(1).await.unwrap();
		assert_eq!(order.status, OrderStatus::Approved);
		assert_eq!(order.version, 2);
	}

	#[tokio::test]
	async fn unreachable_status_is_rejected() {
		let (_, _, machine) = harness();
		seed(&machine, &sample_order(1, OrderType::Rent, OrderStatus::Requested)).await;

		let err = machine
			.transition(1, OrderStatus::Delivered, 1, Actor::User(10))
			.await
			.unwrap_err();
		assert!(matches!(err, TransitionError::InvalidTransition { .. }));
	}

	#[tokio::test]
	async fn carrier_moves_are_reserved_for_the_system_actor() {
		let (_, _, machine) = harness();
		seed(&machine, &sample_order(1, OrderType::Rent, OrderStatus::Dispatched)).await;

		let err = machine
			.transition(1, OrderStatus::InTransit, 1, Actor::User(10))
			.await
			.unwrap_err();
		assert!(matches!(err, TransitionError::Forbidden { .. }));

		machine
			.transition(1, OrderStatus::InTransit, 1, Actor::System)
			.await
			.unwrap();
	}

	#[tokio::test]
	async fn terminal_states_reject_every_actor() {
		let (_, _, machine) = harness();
		seed(&machine, &sample_order(1, OrderType::Buy, OrderStatus::Completed)).await;
		seed(&machine, &sample_order(2, OrderType::Buy, OrderStatus::Cancelled)).await;

		for (id, actor) in [
			(1, Actor::User(10)),
			(1, Actor::System),
			(1, Actor::Admin(1)),
			(2, Actor::User(10)),
			(2, Actor::System),
			(2, Actor::Admin(1)),
		] {
			let err = machine
				.transition(id, OrderStatus::Requested, 1, actor)
				.await
				.unwrap_err();
			assert!(matches!(err, TransitionError::InvalidTransition { .. }));
		}
	}

	#[tokio::test]
	async fn rejected_is_terminal_except_for_admin() {
		let (_, _, machine) = harness();
		seed(&machine, &sample_order(1, OrderType::Rent, OrderStatus::Rejected)).await;

		let err = machine
			.transition(1, OrderStatus::Approved, 1, Actor::User(20))
			.await
			.unwrap_err();
		assert!(matches!(err, TransitionError::InvalidTransition { .. }));

		let outcome = machine
			.transition(1, OrderStatus::Approved, 1, Actor::Admin(1))
			.await
			.unwrap();
		assert_eq!(outcome.after.status, OrderStatus::Approved);
	}

	#[tokio::test]
	async fn dispatch_creates_delivery_exactly_once() {
		let (storage, _, machine) = harness();
		seed(&machine, &sample_order(1, OrderType::Rent, OrderStatus::Approved)).await;

		let outcome = machine
			.transition(1, OrderStatus::Dispatched, 1, Actor::User(20))
			.await
			.unwrap();
		assert!(outcome.effects.delivery_created);

		let delivery: Delivery = storage
			.retrieve(StorageKey::Deliveries.as_str(), "1")
			.await
			.unwrap();
		assert_eq!(delivery.status, DeliveryStatus::Pending);

		// Admin walks the order back and it dispatches again: the existing
		// record is found and that is a no-op success
		machine
			.transition(1, OrderStatus::Approved, 2, Actor::Admin(1))
			.await
			.unwrap();
		let outcome = machine
			.transition(1, OrderStatus::Dispatched, 3, Actor::User(20))
			.await
			.unwrap();
		assert!(!outcome.effects.delivery_created);
	}

	#[tokio::test]
	async fn cancelling_a_gated_order_credits_the_unit_back() {
		let (storage, _, machine) = harness();
		seed_subscription(&storage, 10, 1).await;
		let mut order = sample_order(1, OrderType::Rent, OrderStatus::Requested);
		order.usage_consumed = true;
		seed(&machine, &order).await;

		let outcome = machine
			.transition(1, OrderStatus::Cancelled, 1, Actor::User(10))
			.await
			.unwrap();
		assert!(outcome.effects.usage_released);
		assert!(!outcome.after.usage_consumed);

		let sub: UserSubscription = storage
			.retrieve(StorageKey::Subscriptions.as_str(), "10")
			.await
			.unwrap();
		assert_eq!(sub.rentals_used, 0);
	}

	#[tokio::test]
	async fn cancelling_a_buy_order_leaves_counters_alone() {
		let (storage, _, machine) = harness();
		seed_subscription(&storage, 10, 1).await;
		seed(&machine, &sample_order(1, OrderType::Buy, OrderStatus::Requested)).await;

		let outcome = machine
			.transition(1, OrderStatus::Cancelled, 1, Actor::User(10))
			.await
			.unwrap();
		assert!(!outcome.effects.usage_released);

		let sub: UserSubscription = storage
			.retrieve(StorageKey::Subscriptions.as_str(), "10")
			.await
			.unwrap();
		assert_eq!(sub.rentals_used, 1);
	}

	#[tokio::test]
	async fn entering_disputed_opens_a_dispute_record() {
		let (storage, _, machine) = harness();
		seed(&machine, &sample_order(1, OrderType::Rent, OrderStatus::InUse)).await;

		let outcome = machine
			.transition(1, OrderStatus::Disputed, 1, Actor::User(10))
			.await
			.unwrap();
		let dispute_id = outcome.effects.dispute_opened.unwrap();

		let dispute: Dispute = storage
			.retrieve(StorageKey::Disputes.as_str(), &dispute_id.to_string())
			.await
			.unwrap();
		assert_eq!(dispute.order_id, 1);
		assert_eq!(dispute.status, DisputeStatus::Open);
		assert!(dispute.resolution.is_none());
	}

	#[tokio::test]
	async fn revert_restores_the_pre_transition_snapshot() {
		let (storage, _, machine) = harness();
		seed(&machine, &sample_order(1, OrderType::Rent, OrderStatus::Approved)).await;
		let before = machine.get_order(1).await.unwrap();

		let outcome = machine
			.transition(1, OrderStatus::Dispatched, 1, Actor::User(20))
			.await
			.unwrap();
		assert!(outcome.effects.delivery_created);

		machine.revert(&outcome).await;

		let restored = machine.get_order(1).await.unwrap();
		assert_eq!(restored, before);
		assert!(!storage
			.exists(StorageKey::Deliveries.as_str(), "1")
			.await
			.unwrap());
	}

	#[tokio::test]
	async fn soft_deleted_orders_are_invisible() {
		let (_, _, machine) = harness();
		seed(&machine, &sample_order(1, OrderType::Rent, OrderStatus::Requested)).await;

		let deleted = machine.soft_delete(1).await.unwrap();
		assert!(deleted.deleted_at.is_some());
		// Version untouched: deletion is not a transition
		assert_eq!(deleted.version, 1);

		let err = machine.get_order(1).await.unwrap_err();
		assert!(matches!(err, TransitionError::NotFound(1)));

		let err = machine
			.transition(1, OrderStatus::Approved, 1, Actor::User(20))
			.await
			.unwrap_err();
		assert!(matches!(err, TransitionError::NotFound(1)));

		assert!(machine.list_active_orders().await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn same_status_request_is_invalid_even_for_admin() {
		let (_, _, machine) = harness();
		seed(&machine, &sample_order(1, OrderType::Rent, OrderStatus::InUse)).await;

		let err = machine
			.transition(1, OrderStatus::InUse, 1, Actor::Admin(1))
			.await
			.unwrap_err();
		assert!(matches!(err, TransitionError::InvalidTransition { .. }));
	}
}
