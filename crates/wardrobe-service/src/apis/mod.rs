//! API operation modules and shared error mapping.
//!
//! Each module implements the business side of one endpoint group and
//! translates component errors into the [`ApiError`] taxonomy: unknown
//! entity 404, version conflict 409, business-rule rejection 422, missing
//! authorization 403.

pub mod admin;
pub mod delivery;
pub mod orders;
pub mod subscriptions;

use wardrobe_core::{AdminError, DeliverySyncError, IdempotencyError, IntakeError, TransitionError, UsageError};
use wardrobe_types::ApiError;

/// Maps state machine errors onto the HTTP taxonomy.
pub(crate) fn map_transition_error(e: TransitionError) -> ApiError {
	match e {
		TransitionError::NotFound(id) => ApiError::NotFound {
			message: format!("Order {} not found", id),
		},
		TransitionError::Conflict {
			order_id,
			presented,
			stored,
		} => ApiError::Conflict {
			error_type: "version_conflict".to_string(),
			message: format!(
				"Order {} changed concurrently; re-read and retry",
				order_id
			),
			details: Some(serde_json::json!({
				"presented": presented,
				"stored": stored,
			})),
		},
		TransitionError::InvalidTransition { from, to } => ApiError::UnprocessableEntity {
			error_type: "invalid_transition".to_string(),
			message: format!("Cannot move an order from {} to {}", from, to),
		},
		TransitionError::Forbidden { actor, from, to } => ApiError::Forbidden {
			message: format!("{} may not move an order from {} to {}", actor, from, to),
		},
		TransitionError::SideEffect(message) => ApiError::InternalServerError { message },
		TransitionError::Storage(message) => ApiError::InternalServerError { message },
	}
}

/// Maps intake errors onto the HTTP taxonomy.
pub(crate) fn map_intake_error(e: IntakeError) -> ApiError {
	match e {
		IntakeError::Validation(message) => ApiError::BadRequest {
			error_type: "invalid_request".to_string(),
			message,
		},
		IntakeError::Idempotency(IdempotencyError::InFlight) => ApiError::Conflict {
			error_type: "request_in_flight".to_string(),
			message: "A request with this idempotency key is still in flight".to_string(),
			details: None,
		},
		IntakeError::Idempotency(IdempotencyError::FingerprintMismatch) => {
			ApiError::UnprocessableEntity {
				error_type: "idempotency_key_reuse".to_string(),
				message: "Idempotency key reused with a different payload".to_string(),
			}
		}
		IntakeError::Idempotency(IdempotencyError::Storage(message)) => {
			ApiError::InternalServerError { message }
		}
		IntakeError::Quota(denial) => map_usage_error(denial),
		IntakeError::NotFound(id) => ApiError::NotFound {
			message: format!("Order {} not found", id),
		},
		IntakeError::Storage(message) => ApiError::InternalServerError { message },
	}
}

/// Maps usage gate denials onto the HTTP taxonomy, keeping the specific
/// reason string.
pub(crate) fn map_usage_error(e: UsageError) -> ApiError {
	match e {
		UsageError::NoActiveSubscription(user_id) => ApiError::UnprocessableEntity {
			error_type: "no_active_subscription".to_string(),
			message: format!("No active subscription for user {}", user_id),
		},
		denial @ UsageError::QuotaExceeded { .. } => ApiError::UnprocessableEntity {
			error_type: "quota_exceeded".to_string(),
			message: denial.to_string(),
		},
		UsageError::Storage(message) => ApiError::InternalServerError { message },
	}
}

/// Maps delivery adapter errors onto the HTTP taxonomy.
pub(crate) fn map_delivery_error(e: DeliverySyncError) -> ApiError {
	match e {
		DeliverySyncError::OrderNotFound(id) => ApiError::NotFound {
			message: format!("Order {} not found", id),
		},
		DeliverySyncError::NotDispatched(id) => ApiError::NotFound {
			message: format!("Order {} has no delivery record", id),
		},
		DeliverySyncError::InvalidProgression { from, to } => ApiError::UnprocessableEntity {
			error_type: "invalid_delivery_progression".to_string(),
			message: format!("Cannot move a delivery from {} to {}", from, to),
		},
		DeliverySyncError::Transition(e) => map_transition_error(e),
		DeliverySyncError::Storage(message) => ApiError::InternalServerError { message },
	}
}

/// Maps admin channel errors onto the HTTP taxonomy.
pub(crate) fn map_admin_error(e: AdminError) -> ApiError {
	match e {
		AdminError::MissingReason => ApiError::BadRequest {
			error_type: "missing_reason".to_string(),
			message: "A reason is required for administrative actions".to_string(),
		},
		AdminError::DisputeNotFound(id) => ApiError::NotFound {
			message: format!("Dispute {} not found", id),
		},
		AdminError::AlreadyResolved(id) => ApiError::Conflict {
			error_type: "dispute_already_resolved".to_string(),
			message: format!("Dispute {} is already resolved", id),
			details: None,
		},
		AdminError::Transition(e) => map_transition_error(e),
		AdminError::AuditFailed(message) => ApiError::InternalServerError { message },
		AdminError::Storage(message) => ApiError::InternalServerError { message },
	}
}
