//! HTTP server for the Wardrobe coordinator API.
//!
//! This module provides the HTTP surface over the lifecycle engine:
//! order intake and status transitions, delivery updates, subscription
//! records, and the admin override channel. Handlers stay thin and
//! delegate to the `apis` modules.

use axum::{
	extract::{Path, Query, State},
	http::{HeaderMap, StatusCode},
	response::{IntoResponse, Json},
	routing::{get, patch, post},
	Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use wardrobe_config::ApiConfig;
use wardrobe_core::LifecycleEngine;
use wardrobe_types::{
	ApiError, CloseDisputeRequest, CreateOrderRequest, FreezeUserRequest,
	OverrideOrderStatusRequest, UpdateDeliveryRequest, UpdateOrderStatusRequest,
	UpsertSubscriptionRequest,
};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Reference to the lifecycle engine for processing requests.
	pub engine: Arc<LifecycleEngine>,
	/// API server configuration, including the admin token.
	pub api_config: ApiConfig,
}

/// Starts the HTTP server for the API.
pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<LifecycleEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	let bind_address = format!("{}:{}", api_config.host, api_config.port);

	if api_config.admin_token.is_none() {
		tracing::warn!("No admin token configured - admin endpoints will reject every request");
	}

	let app_state = AppState {
		engine,
		api_config: api_config.clone(),
	};

	let app = Router::new()
		.nest(
			"/api",
			Router::new()
				.route("/orders", post(handle_create_order))
				.route(
					"/orders/{id}",
					get(handle_get_order).delete(handle_delete_order),
				)
				.route("/orders/{id}/status", patch(handle_update_order_status))
				.route(
					"/orders/{id}/delivery",
					post(handle_update_delivery).get(handle_get_delivery),
				)
				.route(
					"/users/{id}/subscription",
					get(handle_get_subscription).put(handle_put_subscription),
				)
				.route("/admin/orders/{id}/status", post(handle_admin_override_status))
				.route("/admin/disputes/{id}/close", post(handle_admin_close_dispute))
				.route("/admin/disputes", get(handle_admin_list_disputes))
				.route("/admin/users/{id}/freeze", post(handle_admin_freeze_user))
				.route("/admin/audit", get(handle_admin_audit)),
		)
		.layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
		.with_state(app_state);

	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Wardrobe API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

/// Checks the shared admin token on privileged routes.
fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
	let expected = state
		.api_config
		.admin_token
		.as_deref()
		.ok_or_else(|| ApiError::Forbidden {
			message: "Admin access is not configured".to_string(),
		})?;
	let presented = headers
		.get("x-admin-token")
		.and_then(|value| value.to_str().ok());
	if presented != Some(expected) {
		return Err(ApiError::Forbidden {
			message: "Missing or invalid admin token".to_string(),
		});
	}
	Ok(())
}

/// Handles POST /api/orders requests.
///
/// Honors the `Idempotency-Key` header: a replayed key returns the
/// original order with 200 instead of 201 and re-executes nothing.
async fn handle_create_order(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(request): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
	let idempotency_key = headers
		.get("idempotency-key")
		.and_then(|value| value.to_str().ok());

	match crate::apis::orders::create_order(&state.engine, request, idempotency_key).await {
		Ok(result) => {
			let status = if result.replayed {
				StatusCode::OK
			} else {
				StatusCode::CREATED
			};
			Ok((status, Json(result.order)))
		}
		Err(e) => {
			tracing::warn!("Order creation failed: {}", e);
			Err(e)
		}
	}
}

/// Handles GET /api/orders/{id} requests.
async fn handle_get_order(
	Path(id): Path<u64>,
	State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
	let order = crate::apis::orders::get_order(&state.engine, id).await?;
	Ok(Json(order))
}

/// Handles DELETE /api/orders/{id} requests (soft delete).
async fn handle_delete_order(
	Path(id): Path<u64>,
	State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
	crate::apis::orders::delete_order(&state.engine, id).await?;
	Ok(StatusCode::NO_CONTENT)
}

/// Handles PATCH /api/orders/{id}/status requests.
///
/// The caller supplies the version it last observed; a mismatch is a 409
/// and the caller re-reads and retries.
async fn handle_update_order_status(
	Path(id): Path<u64>,
	State(state): State<AppState>,
	Json(request): Json<UpdateOrderStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
	match crate::apis::orders::update_order_status(&state.engine, id, request).await {
		Ok(order) => Ok(Json(order)),
		Err(e) => {
			tracing::warn!("Order status update failed: {}", e);
			Err(e)
		}
	}
}

/// Handles POST /api/orders/{id}/delivery requests.
async fn handle_update_delivery(
	Path(id): Path<u64>,
	State(state): State<AppState>,
	Json(request): Json<UpdateDeliveryRequest>,
) -> Result<impl IntoResponse, ApiError> {
	match crate::apis::delivery::update_delivery(&state.engine, id, request).await {
		Ok(response) => Ok(Json(response)),
		Err(e) => {
			tracing::warn!("Delivery update failed: {}", e);
			Err(e)
		}
	}
}

/// Handles GET /api/orders/{id}/delivery requests.
async fn handle_get_delivery(
	Path(id): Path<u64>,
	State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
	let delivery = crate::apis::delivery::get_delivery(&state.engine, id).await?;
	Ok(Json(delivery))
}

/// Handles GET /api/users/{id}/subscription requests.
async fn handle_get_subscription(
	Path(id): Path<u64>,
	State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
	let subscription = crate::apis::subscriptions::get_subscription(&state.engine, id).await?;
	Ok(Json(subscription))
}

/// Handles PUT /api/users/{id}/subscription requests.
async fn handle_put_subscription(
	Path(id): Path<u64>,
	State(state): State<AppState>,
	Json(request): Json<UpsertSubscriptionRequest>,
) -> Result<impl IntoResponse, ApiError> {
	let subscription =
		crate::apis::subscriptions::put_subscription(&state.engine, id, request).await?;
	Ok(Json(subscription))
}

/// Handles POST /api/admin/orders/{id}/status requests.
async fn handle_admin_override_status(
	Path(id): Path<u64>,
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(request): Json<OverrideOrderStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
	require_admin(&state, &headers)?;
	match crate::apis::admin::override_order_status(&state.engine, id, request).await {
		Ok(order) => Ok(Json(order)),
		Err(e) => {
			tracing::warn!("Admin status override failed: {}", e);
			Err(e)
		}
	}
}

/// Handles POST /api/admin/disputes/{id}/close requests.
async fn handle_admin_close_dispute(
	Path(id): Path<u64>,
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(request): Json<CloseDisputeRequest>,
) -> Result<impl IntoResponse, ApiError> {
	require_admin(&state, &headers)?;
	match crate::apis::admin::close_dispute(&state.engine, id, request).await {
		Ok(dispute) => Ok(Json(dispute)),
		Err(e) => {
			tracing::warn!("Dispute close failed: {}", e);
			Err(e)
		}
	}
}

/// Handles GET /api/admin/disputes requests.
async fn handle_admin_list_disputes(
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
	require_admin(&state, &headers)?;
	let disputes = crate::apis::admin::list_disputes(&state.engine).await?;
	Ok(Json(disputes))
}

/// Handles POST /api/admin/users/{id}/freeze requests.
async fn handle_admin_freeze_user(
	Path(id): Path<u64>,
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(request): Json<FreezeUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
	require_admin(&state, &headers)?;
	let log = crate::apis::admin::freeze_user(&state.engine, id, request).await?;
	Ok(Json(log))
}

/// Query parameters for the audit listing.
#[derive(Debug, Deserialize)]
pub struct AuditQuery {
	#[serde(rename = "adminId")]
	pub admin_id: Option<u64>,
}

/// Handles GET /api/admin/audit requests, newest entries first.
async fn handle_admin_audit(
	State(state): State<AppState>,
	headers: HeaderMap,
	Query(query): Query<AuditQuery>,
) -> Result<impl IntoResponse, ApiError> {
	require_admin(&state, &headers)?;
	let logs = crate::apis::admin::list_audit(&state.engine, query.admin_id).await?;
	Ok(Json(logs))
}
