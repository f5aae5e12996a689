//! Delivery status updates and lookups.

use super::map_delivery_error;
use serde::Serialize;
use std::sync::Arc;
use wardrobe_core::LifecycleEngine;
use wardrobe_types::{ApiError, Delivery, Order, UpdateDeliveryRequest};

/// Response for a delivery update: the stored record and, when the event
/// mapped onto the order lifecycle, the updated order.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryUpdateResponse {
	pub delivery: Delivery,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub order: Option<Order>,
}

/// Records a carrier status update and syncs the order.
pub async fn update_delivery(
	engine: &Arc<LifecycleEngine>,
	order_id: u64,
	request: UpdateDeliveryRequest,
) -> Result<DeliveryUpdateResponse, ApiError> {
	let update = engine
		.delivery_sync()
		.update_delivery(order_id, request.status, request.notes, request.tracking_number)
		.await
		.map_err(map_delivery_error)?;
	Ok(DeliveryUpdateResponse {
		delivery: update.delivery,
		order: update.order,
	})
}

/// Fetches the delivery record for an order.
pub async fn get_delivery(
	engine: &Arc<LifecycleEngine>,
	order_id: u64,
) -> Result<Delivery, ApiError> {
	engine
		.delivery_sync()
		.get_delivery(order_id)
		.await
		.map_err(map_delivery_error)
}
