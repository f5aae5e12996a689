//! Order intake, lookup and user-driven status transitions.

use super::{map_intake_error, map_transition_error};
use std::sync::Arc;
use wardrobe_core::{CreationResult, LifecycleEngine};
use wardrobe_types::{Actor, ApiError, CreateOrderRequest, Order, UpdateOrderStatusRequest};

/// Creates an order, honoring an optional idempotency key.
pub async fn create_order(
	engine: &Arc<LifecycleEngine>,
	request: CreateOrderRequest,
	idempotency_key: Option<&str>,
) -> Result<CreationResult, ApiError> {
	engine
		.intake()
		.create(request, idempotency_key)
		.await
		.map_err(map_intake_error)
}

/// Fetches an order by id. Soft-deleted orders answer 404.
pub async fn get_order(engine: &Arc<LifecycleEngine>, order_id: u64) -> Result<Order, ApiError> {
	engine
		.state_machine()
		.get_order(order_id)
		.await
		.map_err(map_transition_error)
}

/// Applies a user-requested status transition.
pub async fn update_order_status(
	engine: &Arc<LifecycleEngine>,
	order_id: u64,
	request: UpdateOrderStatusRequest,
) -> Result<Order, ApiError> {
	engine
		.state_machine()
		.transition(
			order_id,
			request.status,
			request.version,
			Actor::User(request.user_id),
		)
		.await
		.map(|outcome| outcome.after)
		.map_err(map_transition_error)
}

/// Soft-deletes an order.
pub async fn delete_order(engine: &Arc<LifecycleEngine>, order_id: u64) -> Result<(), ApiError> {
	engine
		.state_machine()
		.soft_delete(order_id)
		.await
		.map(|_| ())
		.map_err(map_transition_error)
}
