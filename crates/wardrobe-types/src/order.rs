//! Order lifecycle types for the marketplace coordinator.
//!
//! This module defines the order record itself, the lifecycle status
//! vocabulary, and the actor roles that are allowed to request transitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A rental, purchase or swap transaction between a renter and an owner.
///
/// The order is the single authoritative record of a transaction. All status
/// changes go through the state machine's guarded transition, which keeps
/// `status`, `previous_status` and `version` consistent under concurrency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
	/// Opaque identifier for this order.
	pub id: u64,
	/// Kind of transaction. Immutable after creation.
	pub order_type: OrderType,
	/// Current lifecycle status.
	pub status: OrderStatus,
	/// Status immediately before the last accepted transition.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub previous_status: Option<OrderStatus>,
	/// Optimistic concurrency token. Incremented on every accepted
	/// transition; a caller must present the version it last observed.
	pub version: u64,
	/// Identity of the renting party (owned by the identity collaborator).
	pub renter_id: u64,
	/// Identity of the owning party.
	pub owner_id: u64,
	/// Start of the rental window. Meaningless for Buy orders.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub start_date: Option<u64>,
	/// End of the rental window.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub end_date: Option<u64>,
	/// Deadline for the Requested state, set at creation.
	pub expires_at: u64,
	/// Set by the SLA scheduler when `end_date` has passed while the order
	/// is still out with the renter. Not a lifecycle transition.
	#[serde(default)]
	pub is_late: bool,
	/// Whether creation consumed a subscription usage unit. Cleared inside
	/// the same guarded write that cancels the order, so the credit-back
	/// can never be applied twice.
	#[serde(default)]
	pub usage_consumed: bool,
	/// Timestamp when this order was created.
	pub created_at: u64,
	/// Timestamp when this order was last updated.
	pub updated_at: u64,
	/// Soft-delete marker. Deleted orders are excluded from scheduler scans
	/// and status queries.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub deleted_at: Option<u64>,
}

/// Kind of marketplace transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderType {
	/// Time-bounded rental of a listed item.
	Rent,
	/// Outright purchase.
	Buy,
	/// Item-for-item swap between two wardrobes.
	Swap,
}

impl fmt::Display for OrderType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			OrderType::Rent => write!(f, "Rent"),
			OrderType::Buy => write!(f, "Buy"),
			OrderType::Swap => write!(f, "Swap"),
		}
	}
}

/// Status of an order in the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderStatus {
	/// Order has been created and awaits the owner's decision.
	Requested,
	/// Owner accepted the request.
	Approved,
	/// Owner declined the request. Terminal for non-admin actors.
	Rejected,
	/// Item handed to the carrier.
	Dispatched,
	/// Carrier is moving the item.
	InTransit,
	/// Carrier delivered the item to the renter.
	Delivered,
	/// Renter confirmed receipt and is using the item.
	InUse,
	/// Renter asked to send the item back.
	ReturnRequested,
	/// Item is back with the owner.
	Returned,
	/// Transaction finished successfully. Terminal.
	Completed,
	/// Transaction abandoned. Terminal.
	Cancelled,
	/// A party contested the outcome; resolution goes through the admin
	/// override channel.
	Disputed,
}

impl OrderStatus {
	/// States that accept no further transitions from any actor, admin
	/// included.
	pub fn is_terminal(&self) -> bool {
		matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			OrderStatus::Requested => "Requested",
			OrderStatus::Approved => "Approved",
			OrderStatus::Rejected => "Rejected",
			OrderStatus::Dispatched => "Dispatched",
			OrderStatus::InTransit => "InTransit",
			OrderStatus::Delivered => "Delivered",
			OrderStatus::InUse => "InUse",
			OrderStatus::ReturnRequested => "ReturnRequested",
			OrderStatus::Returned => "Returned",
			OrderStatus::Completed => "Completed",
			OrderStatus::Cancelled => "Cancelled",
			OrderStatus::Disputed => "Disputed",
		};
		write!(f, "{}", s)
	}
}

/// Role of the caller requesting a transition.
///
/// The state machine consults the actor when validating a requested
/// transition: ordinary users are bound to the normal adjacency graph,
/// system triggers (delivery sync, SLA scheduler) to their own subset,
/// and admins bypass adjacency but never terminality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Actor {
	/// A marketplace user, renter or owner.
	User(u64),
	/// An internal trigger: delivery sync adapter or SLA scheduler.
	System,
	/// A privileged operator acting through the override channel.
	Admin(u64),
}

impl Actor {
	/// Whether this actor is allowed to bypass the adjacency graph.
	pub fn is_admin(&self) -> bool {
		matches!(self, Actor::Admin(_))
	}
}

impl fmt::Display for Actor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Actor::User(id) => write!(f, "user:{}", id),
			Actor::System => write!(f, "system"),
			Actor::Admin(id) => write!(f, "admin:{}", id),
		}
	}
}
