//! Subscription usage accounting types.

use crate::OrderType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-user usage window for subscription-gated order types.
///
/// Counters are reset only when a new cycle begins, never go negative, and
/// are incremented exactly once per admitted gated order. Cancelling such an
/// order before it consumed its benefit credits the unit back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSubscription {
	/// The subscriber.
	pub user_id: u64,
	/// Start of the current one-month accounting window.
	pub cycle_start: u64,
	/// End of the current accounting window. Usage past this point rolls
	/// the window forward instead of denying service.
	pub cycle_end: u64,
	/// Rentals admitted in the current cycle.
	pub rentals_used: u32,
	/// Swaps admitted in the current cycle.
	pub swaps_used: u32,
	/// Plan bound for rentals per cycle.
	pub rental_limit: u32,
	/// Plan bound for swaps per cycle.
	pub swap_credits: u32,
}

impl UserSubscription {
	/// Counter and limit for the given action.
	pub fn usage(&self, action: UsageAction) -> (u32, u32) {
		match action {
			UsageAction::Rental => (self.rentals_used, self.rental_limit),
			UsageAction::Swap => (self.swaps_used, self.swap_credits),
		}
	}
}

/// Which quota an order consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UsageAction {
	Rental,
	Swap,
}

impl fmt::Display for UsageAction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			UsageAction::Rental => write!(f, "rental"),
			UsageAction::Swap => write!(f, "swap"),
		}
	}
}

impl OrderType {
	/// The quota this order type consumes, if any. Buy is exempt.
	pub fn usage_action(&self) -> Option<UsageAction> {
		match self {
			OrderType::Rent => Some(UsageAction::Rental),
			OrderType::Swap => Some(UsageAction::Swap),
			OrderType::Buy => None,
		}
	}
}
