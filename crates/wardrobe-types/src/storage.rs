//! Storage namespace types for the coordinator.

use std::str::FromStr;

/// Storage namespaces for the coordinator's data collections.
///
/// This enum provides type safety for storage operations by replacing
/// string literals with strongly typed variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Order records.
	Orders,
	/// Delivery tracking records, keyed by order id.
	Deliveries,
	/// Per-user subscription usage windows.
	Subscriptions,
	/// Dispute records.
	Disputes,
	/// Write-once admin audit entries.
	AdminLogs,
	/// Idempotency reservations, expiring after the retention window.
	Idempotency,
	/// Monotonic id counters.
	Counters,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Orders => "orders",
			StorageKey::Deliveries => "deliveries",
			StorageKey::Subscriptions => "subscriptions",
			StorageKey::Disputes => "disputes",
			StorageKey::AdminLogs => "admin_logs",
			StorageKey::Idempotency => "idempotency",
			StorageKey::Counters => "counters",
		}
	}

	/// Returns an iterator over all StorageKey variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Orders,
			Self::Deliveries,
			Self::Subscriptions,
			Self::Disputes,
			Self::AdminLogs,
			Self::Idempotency,
			Self::Counters,
		]
		.into_iter()
	}
}

impl FromStr for StorageKey {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"orders" => Ok(Self::Orders),
			"deliveries" => Ok(Self::Deliveries),
			"subscriptions" => Ok(Self::Subscriptions),
			"disputes" => Ok(Self::Disputes),
			"admin_logs" => Ok(Self::AdminLogs),
			"idempotency" => Ok(Self::Idempotency),
			"counters" => Ok(Self::Counters),
			_ => Err(()),
		}
	}
}

impl From<StorageKey> for &'static str {
	fn from(key: StorageKey) -> Self {
		key.as_str()
	}
}
