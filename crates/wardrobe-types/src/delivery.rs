//! Delivery tracking types.
//!
//! One Delivery record exists per order once the order reaches a
//! dispatch-equivalent state. The record never outlives its order.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Carrier tracking record for one order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
	/// The order this record belongs to. Also its storage key, which is
	/// what enforces one Delivery per order.
	pub order_id: u64,
	/// Current carrier status.
	pub status: DeliveryStatus,
	/// Timestamp when the carrier picked the parcel up.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub picked_up_at: Option<u64>,
	/// Timestamp when the parcel reached the renter.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub delivered_at: Option<u64>,
	/// Timestamp when the carrier reported a failure.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub failed_at: Option<u64>,
	/// Free-text notes from carrier events or manual updates.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub notes: Option<String>,
	/// Carrier tracking number, when known.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub tracking_number: Option<String>,
	/// Timestamp when this record was created.
	pub created_at: u64,
	/// Timestamp when this record was last updated.
	pub updated_at: u64,
}

/// Carrier-side status vocabulary.
///
/// Distinct from [`crate::OrderStatus`]: the delivery sync adapter owns the
/// translation between the two, and a Failed delivery deliberately has no
/// order-status counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeliveryStatus {
	/// Record created, parcel not yet with the carrier.
	Pending,
	/// Carrier has the parcel.
	PickedUp,
	/// Parcel is on the move.
	InTransit,
	/// Parcel arrived.
	Delivered,
	/// Carrier gave up. Requires human decision, never advances the order.
	Failed,
}

impl fmt::Display for DeliveryStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			DeliveryStatus::Pending => "Pending",
			DeliveryStatus::PickedUp => "PickedUp",
			DeliveryStatus::InTransit => "InTransit",
			DeliveryStatus::Delivered => "Delivered",
			DeliveryStatus::Failed => "Failed",
		};
		write!(f, "{}", s)
	}
}
