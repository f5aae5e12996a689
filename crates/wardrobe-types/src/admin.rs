//! Administrative override and dispute types.
//!
//! Every privileged mutation records exactly one [`AdminOverrideLog`] entry
//! in the same logical transaction as the state change it describes. Log
//! entries are write-once and never updated or deleted.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Immutable audit entry for one administrative action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminOverrideLog {
	/// Entry identifier.
	pub id: Uuid,
	/// The operator who performed the action.
	pub admin_id: u64,
	/// What was done.
	pub action: AdminAction,
	/// Kind of entity the action touched ("order", "dispute", "user").
	pub entity_type: String,
	/// Identifier of the touched entity.
	pub entity_id: u64,
	/// Mandatory free-text justification.
	pub reason: String,
	/// Structured snapshot of before/after values.
	pub metadata: serde_json::Value,
	/// Timestamp when the entry was written.
	pub created_at: u64,
}

/// Kinds of administrative actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdminAction {
	ForceCloseDispute,
	OverrideOrderStatus,
	FreezeUser,
}

impl fmt::Display for AdminAction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			AdminAction::ForceCloseDispute => "FORCE_CLOSE_DISPUTE",
			AdminAction::OverrideOrderStatus => "OVERRIDE_ORDER_STATUS",
			AdminAction::FreezeUser => "FREEZE_USER",
		};
		write!(f, "{}", s)
	}
}

/// A contested order outcome.
///
/// Opened when an order enters the Disputed status; terminated only through
/// the admin override channel, which is the sole writer of `resolution` and
/// `resolved_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dispute {
	/// Dispute identifier.
	pub id: u64,
	/// The contested order.
	pub order_id: u64,
	/// Open or resolved.
	pub status: DisputeStatus,
	/// Outcome chosen by the resolving admin.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub resolution: Option<DisputeResolution>,
	/// Timestamp when the dispute was opened.
	pub opened_at: u64,
	/// Timestamp when the dispute was resolved.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub resolved_at: Option<u64>,
}

/// Dispute lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DisputeStatus {
	Open,
	Resolved,
}

/// Outcome of a resolved dispute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DisputeResolution {
	/// The renter gets their money back.
	RefundRenter,
	/// The owner keeps the payout.
	PayoutOwner,
	/// Both parties share the loss.
	Split,
	/// Complaint judged without merit.
	Dismissed,
}
