//! Admin override channel.
//!
//! Every operation here is a privileged, audited state mutation: the state
//! change and its AdminOverrideLog entry succeed or fail together. A failed
//! operation writes no log, and a failed log write reverts the state change
//! through the state machine's rollback path, so neither an orphan log nor
//! an unaudited change can exist.

use crate::engine::event_bus::EventBus;
use crate::state::{OrderStateMachine, TransitionError};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;
use wardrobe_storage::{StorageError, StorageService};
use wardrobe_types::{
	current_timestamp, Actor, AdminAction, AdminEvent, AdminOverrideLog, Dispute,
	DisputeResolution, DisputeStatus, LifecycleEvent, Order, OrderStatus, StorageKey,
};

/// How many times a lost version race is retried with a fresh read before
/// giving up.
const OVERRIDE_RETRY_LIMIT: usize = 3;

/// Errors that can occur on the admin override channel.
#[derive(Debug, Error)]
pub enum AdminError {
	/// Every override requires a non-empty reason.
	#[error("A reason is required for administrative actions")]
	MissingReason,
	/// Unknown dispute id.
	#[error("Dispute not found: {0}")]
	DisputeNotFound(u64),
	/// The dispute was already resolved.
	#[error("Dispute {0} is already resolved")]
	AlreadyResolved(u64),
	/// The underlying order transition failed.
	#[error(transparent)]
	Transition(#[from] TransitionError),
	/// The audit entry could not be written; the state change was rolled
	/// back.
	#[error("Audit log write failed, change rolled back: {0}")]
	AuditFailed(String),
	/// The storage backend failed.
	#[error("Storage error: {0}")]
	Storage(String),
}

/// Privileged operations with a mandatory audit trail.
pub struct AdminOverrideChannel {
	storage: Arc<StorageService>,
	machine: Arc<OrderStateMachine>,
	event_bus: EventBus,
}

impl AdminOverrideChannel {
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

	fn require_reason(reason: &str) -> Result<(), AdminError> {
		if reason.trim().is_empty() {
			return Err(AdminError::MissingReason);
		}
		Ok(())
	}

	/// Writes one immutable audit entry.
	async fn append_log(
		&self,
		admin_id: u64,
		action: AdminAction,
		entity_type: &str,
		entity_id: u64,
		reason: &str,
		metadata: serde_json::Value,
	) -> Result<AdminOverrideLog, StorageError> {
		let log = AdminOverrideLog {
			id: Uuid::new_v4(),
			admin_id,
			action,
			entity_type: entity_type.to_string(),
			entity_id,
			reason: reason.to_string(),
			metadata,
			created_at: current_timestamp(),
		};
		self.storage
			.insert_new(StorageKey::AdminLogs.as_str(), &log.id.to_string(), &log)
			.await?;
		Ok(log)
	}

	/// Forces an order into a status, bypassing the normal adjacency
	/// rules.
	///
	/// Still goes through the state machine so version bookkeeping and
	/// side effects stay correct; terminal states stay closed even here.
	#[instrument(skip(self, reason), fields(order_id = order_id, admin_id = admin_id, to = %new_status))]
	pub async fn override_order_status(
		&self,
		order_id: u64,
		new_status: OrderStatus,
		admin_id: u64,
		reason: &str,
	) -> Result<Order, AdminError> {
		Self::require_reason(reason)?;

		let mut attempts = 0;
		let outcome = loop {
			let order = self.machine.get_order(order_id).await?;
			match self
				.machine
				.transition(order_id, new_status, order.version, Actor::Admin(admin_id))
				.await
			{
				Ok(outcome) => break outcome,
				Err(TransitionError::Conflict { .. }) if attempts < OVERRIDE_RETRY_LIMIT => {
					attempts += 1;
					continue;
				}
				Err(e) => return Err(e.into()),
			}
		};

		let metadata = serde_json::json!({
			"from": outcome.before.status,
			"to": outcome.after.status,
			"version": outcome.after.version,
		});
		if let Err(e) = self
			.append_log(
				admin_id,
				AdminAction::OverrideOrderStatus,
				"order",
				order_id,
				reason,
				metadata,
			)
			.await
		{
			self.machine.revert(&outcome).await;
			return Err(AdminError::AuditFailed(e.to_string()));
		}

		self.event_bus
			.publish(LifecycleEvent::Admin(AdminEvent::Override {
				admin_id,
				action: AdminAction::OverrideOrderStatus,
				entity_id: order_id,
			}))
			.ok();

		Ok(outcome.after)
	}

	/// Resolves a dispute with the given outcome.
	///
	/// This channel is the sole writer of `resolution` and `resolved_at`.
	#[instrument(skip(self, reason), fields(dispute_id = dispute_id, admin_id = admin_id))]
	pub async fn force_close_dispute(
		&self,
		dispute_id: u64,
		admin_id: u64,
		reason: &str,
		resolution: DisputeResolution,
	) -> Result<Dispute, AdminError> {
		Self::require_reason(reason)?;

		let resolved = loop {
			let stored: Dispute = self
				.storage
				.retrieve(StorageKey::Disputes.as_str(), &dispute_id.to_string())
				.await
				.map_err(|e| match e {
					StorageError::NotFound => AdminError::DisputeNotFound(dispute_id),
					other => AdminError::Storage(other.to_string()),
				})?;

			if stored.status == DisputeStatus::Resolved {
				return Err(AdminError::AlreadyResolved(dispute_id));
			}

			let mut resolved = stored.clone();
			resolved.status = DisputeStatus::Resolved;
			resolved.resolution = Some(resolution);
			resolved.resolved_at = Some(current_timestamp());

			match self
				.storage
				.swap(
					StorageKey::Disputes.as_str(),
					&dispute_id.to_string(),
					&stored,
					&resolved,
				)
				.await
			{
				Ok(()) => break (stored, resolved),
				// Someone else closed it between read and write
				Err(StorageError::Conflict) => continue,
				Err(StorageError::NotFound) => {
					return Err(AdminError::DisputeNotFound(dispute_id))
				}
				Err(e) => return Err(AdminError::Storage(e.to_string())),
			}
		};
		let (before, after) = resolved;

		let metadata = serde_json::json!({
			"order_id": after.order_id,
			"resolution": after.resolution,
		});
		if let Err(e) = self
			.append_log(
				admin_id,
				AdminAction::ForceCloseDispute,
				"dispute",
				dispute_id,
				reason,
				metadata,
			)
			.await
		{
			// Put the dispute back as it was
			if let Err(revert_err) = self
				.storage
				.swap(
					StorageKey::Disputes.as_str(),
					&dispute_id.to_string(),
					&after,
					&before,
				)
				.await
			{
				tracing::error!(dispute_id, error = %revert_err, "failed to revert dispute after audit failure");
			}
			return Err(AdminError::AuditFailed(e.to_string()));
		}

		self.event_bus
			.publish(LifecycleEvent::Admin(AdminEvent::Override {
				admin_id,
				action: AdminAction::ForceCloseDispute,
				entity_id: dispute_id,
			}))
			.ok();

		Ok(after)
	}

	/// Records the intent to suspend a user.
	///
	/// Audit-only: identity is owned by an external collaborator, so there
	/// is no account-status field here to enforce the freeze against.
	#[instrument(skip(self, reason), fields(user_id = user_id, admin_id = admin_id))]
	pub async fn freeze_user(
		&self,
		user_id: u64,
		admin_id: u64,
		reason: &str,
	) -> Result<AdminOverrideLog, AdminError> {
		Self::require_reason(reason)?;

		let metadata = serde_json::json!({ "effect": "audit-only" });
		let log = self
			.append_log(
				admin_id,
				AdminAction::FreezeUser,
				"user",
				user_id,
				reason,
				metadata,
			)
			.await
			.map_err(|e| AdminError::Storage(e.to_string()))?;

		self.event_bus
			.publish(LifecycleEvent::Admin(AdminEvent::Override {
				admin_id,
				action: AdminAction::FreezeUser,
				entity_id: user_id,
			}))
			.ok();

		Ok(log)
	}

	/// Lists audit entries newest-first, optionally filtered by admin.
	pub async fn list_audit(
		&self,
		admin_id: Option<u64>,
	) -> Result<Vec<AdminOverrideLog>, AdminError> {
		let mut logs: Vec<AdminOverrideLog> = self
			.storage
			.retrieve_all(StorageKey::AdminLogs.as_str())
			.await
			.map_err(|e| AdminError::Storage(e.to_string()))?;

		if let Some(admin_id) = admin_id {
			logs.retain(|log| log.admin_id == admin_id);
		}
		logs.sort_by(|a, b| {
			b.created_at
				.cmp(&a.created_at)
				.then_with(|| b.id.cmp(&a.id))
		});
		Ok(logs)
	}

	/// Lists all disputes, newest first.
	pub async fn list_disputes(&self) -> Result<Vec<Dispute>, AdminError> {
		let mut disputes: Vec<Dispute> = self
			.storage
			.retrieve_all(StorageKey::Disputes.as_str())
			.await
			.map_err(|e| AdminError::Storage(e.to_string()))?;
		disputes.sort_by(|a, b| b.opened_at.cmp(&a.opened_at).then_with(|| b.id.cmp(&a.id)));
		Ok(disputes)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::usage::SubscriptionUsageGate;
	use wardrobe_storage::implementations::memory::MemoryStorage;
	use wardrobe_types::OrderType;

	struct Harness {
		storage: Arc<StorageService>,
		machine: Arc<OrderStateMachine>,
		admin: AdminOverrideChannel,
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
		let admin = AdminOverrideChannel::new(storage.clone(), machine.clone(), event_bus);
		Harness {
			storage,
			machine,
			admin,
		}
	}

	async fn seed_order(harness: &Harness, id: u64, status: OrderStatus) {
		let now = current_timestamp();
		harness
			.machine
			.store_order(&Order {
				id,
				order_type: OrderType::Rent,
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
			})
			.await
			.unwrap();
	}

	#[tokio::test]
	async fn override_bypasses_adjacency_and_writes_exactly_one_log() {
		let harness = harness();
		seed_order(&harness, 42, OrderStatus::InUse).await;

		let order = harness
			.admin
			.override_order_status(42, OrderStatus::Completed, 1, "manual resolution")
			.await
			.unwrap();

		assert_eq!(order.status, OrderStatus::Completed);
		assert_eq!(order.previous_status, Some(OrderStatus::InUse));
		assert_eq!(order.version, 2);

		let logs = harness.admin.list_audit(None).await.unwrap();
		assert_eq!(logs.len(), 1);
		let log = &logs[0];
		assert_eq!(log.entity_id, 42);
		assert_eq!(log.action, AdminAction::OverrideOrderStatus);
		assert_eq!(log.admin_id, 1);
		assert_eq!(log.metadata["from"], "inUse");
		assert_eq!(log.metadata["to"], "completed");
	}

	#[tokio::test]
	async fn override_without_reason_is_rejected_and_unlogged() {
		let harness = harness();
		seed_order(&harness, 1, OrderStatus::InUse).await;

		let err = harness
			.admin
			.override_order_status(1, OrderStatus::Completed, 1, "  ")
			.await
			.unwrap_err();
		assert!(matches!(err, AdminError::MissingReason));

		assert_eq!(
			harness.machine.get_order(1).await.unwrap().status,
			OrderStatus::InUse
		);
		assert!(harness.admin.list_audit(None).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn override_cannot_leave_terminal_states() {
		let harness = harness();
		seed_order(&harness, 1, OrderStatus::Cancelled).await;

		let err = harness
			.admin
			.override_order_status(1, OrderStatus::Requested, 1, "trying anyway")
			.await
			.unwrap_err();
		assert!(matches!(
			err,
			AdminError::Transition(TransitionError::InvalidTransition { .. })
		));
		// A failed operation must not leave an audit entry
		assert!(harness.admin.list_audit(None).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn force_close_resolves_an_open_dispute_once() {
		let harness = harness();
		seed_order(&harness, 1, OrderStatus::InUse).await;
		let outcome = harness
			.machine
			.transition(1, OrderStatus::Disputed, 1, Actor::User(10))
			.await
			.unwrap();
		let dispute_id = outcome.effects.dispute_opened.unwrap();

		let dispute = harness
			.admin
			.force_close_dispute(dispute_id, 7, "renter provided photos", DisputeResolution::RefundRenter)
			.await
			.unwrap();
		assert_eq!(dispute.status, DisputeStatus::Resolved);
		assert_eq!(dispute.resolution, Some(DisputeResolution::RefundRenter));
		assert!(dispute.resolved_at.is_some());

		let logs = harness.admin.list_audit(None).await.unwrap();
		assert_eq!(logs.len(), 1);
		assert_eq!(logs[0].action, AdminAction::ForceCloseDispute);
		assert_eq!(logs[0].entity_id, dispute_id);

		// Closing again fails and writes no further log
		let err = harness
			.admin
			.force_close_dispute(dispute_id, 7, "again", DisputeResolution::Dismissed)
			.await
			.unwrap_err();
		assert!(matches!(err, AdminError::AlreadyResolved(_)));
		assert_eq!(harness.admin.list_audit(None).await.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn freeze_user_is_audit_only() {
		let harness = harness();

		let log = harness
			.admin
			.freeze_user(55, 1, "chargeback abuse")
			.await
			.unwrap();
		assert_eq!(log.action, AdminAction::FreezeUser);
		assert_eq!(log.entity_id, 55);
		assert_eq!(log.metadata["effect"], "audit-only");

		let logs = harness.admin.list_audit(None).await.unwrap();
		assert_eq!(logs.len(), 1);
	}

	#[tokio::test]
	async fn audit_listing_filters_by_admin_and_sorts_newest_first() {
		let harness = harness();
		harness.admin.freeze_user(1, 100, "first").await.unwrap();
		harness.admin.freeze_user(2, 200, "second").await.unwrap();
		harness.admin.freeze_user(3, 100, "third").await.unwrap();

		let all = harness.admin.list_audit(None).await.unwrap();
		assert_eq!(all.len(), 3);
		assert!(all.windows(2).all(|w| w[0].created_at >= w[1].created_at));

		let filtered = harness.admin.list_audit(Some(100)).await.unwrap();
		assert_eq!(filtered.len(), 2);
		assert!(filtered.iter().all(|log| log.admin_id == 100));
	}
}
