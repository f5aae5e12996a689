//! API types for the Wardrobe coordinator HTTP surface.
//!
//! This module defines the request payloads for the coordinator endpoints
//! and the error type they all map failures into. Domain records (orders,
//! deliveries, subscriptions, audit entries) are returned as-is.

use crate::{DeliveryStatus, DisputeResolution, OrderStatus, OrderType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Body of `POST /api/orders`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
	/// Kind of transaction to open.
	pub order_type: OrderType,
	/// The requesting renter.
	pub renter_id: u64,
	/// The owner of the listed item.
	pub owner_id: u64,
	/// Rental window start. Required for Rent orders.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub start_date: Option<u64>,
	/// Rental window end.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub end_date: Option<u64>,
}

/// Body of `PATCH /api/orders/{id}/status`.
///
/// The caller must supply the version it last observed; a mismatch is
/// answered with 409 and the caller re-reads and retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderStatusRequest {
	/// Requested destination status.
	pub status: OrderStatus,
	/// Last observed order version.
	pub version: u64,
	/// The user making the request.
	pub user_id: u64,
}

/// Body of `POST /api/orders/{id}/delivery`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDeliveryRequest {
	/// New carrier status.
	pub status: DeliveryStatus,
	/// Optional free-text note.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub notes: Option<String>,
	/// Optional carrier tracking number.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub tracking_number: Option<String>,
}

/// Body of `POST /api/admin/disputes/{id}/close`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseDisputeRequest {
	pub admin_id: u64,
	pub reason: String,
	pub resolution: DisputeResolution,
}

/// Body of `POST /api/admin/orders/{id}/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideOrderStatusRequest {
	pub admin_id: u64,
	pub reason: String,
	pub status: OrderStatus,
}

/// Body of `POST /api/admin/users/{id}/freeze`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreezeUserRequest {
	pub admin_id: u64,
	pub reason: String,
}

/// Body of `PUT /api/users/{id}/subscription`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertSubscriptionRequest {
	pub rental_limit: u32,
	pub swap_credits: u32,
}

/// API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error type/code.
	pub error: String,
	/// Human-readable description.
	pub message: String,
	/// Additional error context.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub details: Option<serde_json::Value>,
}

/// Structured API error with HTTP status mapping.
///
/// Handlers translate component errors into these variants; the taxonomy
/// mirrors the coordinator's: unknown entity, version conflict, illegal
/// transition or quota denial, missing authorization.
#[derive(Debug)]
pub enum ApiError {
	/// Malformed or invalid request (400).
	BadRequest { error_type: String, message: String },
	/// Missing admin/role authorization (403).
	Forbidden { message: String },
	/// Unknown order/delivery/dispute/subscription id (404).
	NotFound { message: String },
	/// Version mismatch or a lost conditional write (409).
	Conflict {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Business-rule rejection: illegal transition, quota denial (422).
	UnprocessableEntity { error_type: String, message: String },
	/// Internal failure (500).
	InternalServerError { message: String },
}

impl ApiError {
	/// HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			ApiError::BadRequest { .. } => 400,
			ApiError::Forbidden { .. } => 403,
			ApiError::NotFound { .. } => 404,
			ApiError::Conflict { .. } => 409,
			ApiError::UnprocessableEntity { .. } => 422,
			ApiError::InternalServerError { .. } => 500,
		}
	}

	/// Convert to [`ErrorResponse`] for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		match self {
			ApiError::BadRequest {
				error_type,
				message,
			} => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: None,
			},
			ApiError::Forbidden { message } => ErrorResponse {
				error: "forbidden".to_string(),
				message: message.clone(),
				details: None,
			},
			ApiError::NotFound { message } => ErrorResponse {
				error: "not_found".to_string(),
				message: message.clone(),
				details: None,
			},
			ApiError::Conflict {
				error_type,
				message,
				details,
			} => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: details.clone(),
			},
			ApiError::UnprocessableEntity {
				error_type,
				message,
			} => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: None,
			},
			ApiError::InternalServerError { message } => ErrorResponse {
				error: "internal_error".to_string(),
				message: message.clone(),
				details: None,
			},
		}
	}
}

impl fmt::Display for ApiError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ApiError::BadRequest { message, .. } => write!(f, "Bad Request: {}", message),
			ApiError::Forbidden { message } => write!(f, "Forbidden: {}", message),
			ApiError::NotFound { message } => write!(f, "Not Found: {}", message),
			ApiError::Conflict { message, .. } => write!(f, "Conflict: {}", message),
			ApiError::UnprocessableEntity { message, .. } => {
				write!(f, "Unprocessable Entity: {}", message)
			}
			ApiError::InternalServerError { message } => {
				write!(f, "Internal Server Error: {}", message)
			}
		}
	}
}

impl std::error::Error for ApiError {}

impl axum::response::IntoResponse for ApiError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status =
			StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		let body = self.to_error_response();
		(status, Json(body)).into_response()
	}
}
