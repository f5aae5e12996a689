//! Admin override channel endpoints.

use super::map_admin_error;
use std::sync::Arc;
use wardrobe_core::LifecycleEngine;
use wardrobe_types::{
	AdminOverrideLog, ApiError, CloseDisputeRequest, Dispute, FreezeUserRequest, Order,
	OverrideOrderStatusRequest,
};

/// Forces an order into a status outside the normal adjacency rules.
pub async fn override_order_status(
	engine: &Arc<LifecycleEngine>,
	order_id: u64,
	request: OverrideOrderStatusRequest,
) -> Result<Order, ApiError> {
	engine
		.admin()
		.override_order_status(order_id, request.status, request.admin_id, &request.reason)
		.await
		.map_err(map_admin_error)
}

/// Resolves a dispute with the given outcome.
pub async fn close_dispute(
	engine: &Arc<LifecycleEngine>,
	dispute_id: u64,
	request: CloseDisputeRequest,
) -> Result<Dispute, ApiError> {
	engine
		.admin()
		.force_close_dispute(
			dispute_id,
			request.admin_id,
			&request.reason,
			request.resolution,
		)
		.await
		.map_err(map_admin_error)
}

/// Lists all disputes, newest first.
pub async fn list_disputes(engine: &Arc<LifecycleEngine>) -> Result<Vec<Dispute>, ApiError> {
	engine.admin().list_disputes().await.map_err(map_admin_error)
}

/// Records the intent to suspend a user (audit-only).
pub async fn freeze_user(
	engine: &Arc<LifecycleEngine>,
	user_id: u64,
	request: FreezeUserRequest,
) -> Result<AdminOverrideLog, ApiError> {
	engine
		.admin()
		.freeze_user(user_id, request.admin_id, &request.reason)
		.await
		.map_err(map_admin_error)
}

/// Lists audit entries newest-first, optionally filtered by admin.
pub async fn list_audit(
	engine: &Arc<LifecycleEngine>,
	admin_id: Option<u64>,
) -> Result<Vec<AdminOverrideLog>, ApiError> {
	engine
		.admin()
		.list_audit(admin_id)
		.await
		.map_err(map_admin_error)
}
