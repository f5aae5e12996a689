//! Event types for inter-component communication.
//!
//! Events flow through the engine's broadcast bus. Publishing is
//! fire-and-forget: the authoritative state lives in storage, events exist
//! so the engine loop (and anything else subscribed) can observe the
//! coordinator working.

use crate::{AdminAction, DeliveryStatus, OrderStatus, OrderType};
use serde::{Deserialize, Serialize};

/// Main event type encompassing all coordinator events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LifecycleEvent {
	/// Events from order intake and the state machine.
	Order(OrderEvent),
	/// Events from delivery tracking.
	Delivery(DeliveryEvent),
	/// Events from the SLA scheduler.
	Scheduler(SchedulerEvent),
	/// Events from the admin override channel.
	Admin(AdminEvent),
}

/// Events related to the order lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OrderEvent {
	/// A creation request passed the ledger and the usage gate.
	Created { order_id: u64, order_type: OrderType },
	/// An accepted transition.
	Transitioned {
		order_id: u64,
		from: OrderStatus,
		to: OrderStatus,
		version: u64,
	},
	/// An order was soft-deleted.
	Deleted { order_id: u64 },
}

/// Events related to delivery tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DeliveryEvent {
	/// The delivery record for an order changed status.
	Updated {
		order_id: u64,
		status: DeliveryStatus,
	},
}

/// Events emitted by the recurring SLA scans.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SchedulerEvent {
	/// One full scan finished.
	SweepCompleted {
		reaped: usize,
		flagged: usize,
		conflicts: usize,
		errors: usize,
	},
}

/// Events emitted by the admin override channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AdminEvent {
	/// A privileged mutation was applied and audited.
	Override {
		admin_id: u64,
		action: AdminAction,
		entity_id: u64,
	},
}
