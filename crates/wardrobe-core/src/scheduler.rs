//! Recurring SLA enforcement scans.
//!
//! Two idempotent sweeps share the guarded transition entry point with
//! live requests, so a concurrently approved order can never be cancelled
//! out from under the approver: the reaper's transition simply loses the
//! version race and skips. Scan errors are counted, logged and retried on
//! the next run, never fatal to the process.

use crate::engine::event_bus::EventBus;
use crate::state::{OrderStateMachine, TransitionError};
use std::sync::Arc;
use wardrobe_storage::{StorageError, StorageService};
use wardrobe_types::{
	current_timestamp, Actor, LifecycleEvent, Order, OrderStatus, SchedulerEvent, StorageKey,
};

/// Counts from one full sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
	/// Stale requests cancelled.
	pub reaped: usize,
	/// Orders newly flagged late.
	pub flagged: usize,
	/// Orders skipped because a concurrent transition won the race.
	pub conflicts: usize,
	/// Failures that will be retried on the next run.
	pub errors: usize,
}

/// Runs the stale-request reaper and the late-return flagger.
///
/// Needs no configuration of its own: every deadline it enforces is
/// carried on the order (`expires_at`, `end_date`).
pub struct SlaScheduler {
	storage: Arc<StorageService>,
	machine: Arc<OrderStateMachine>,
	event_bus: EventBus,
}

impl SlaScheduler {
	pub fn new(
		storage: Arc<StorageService>,
		machine: Arc<OrderStateMachine>,
		event_bus: EventBus,
	) -> Self {
		Self {
			storage,
			machine,
			event_bus,
		}
	}

	/// Runs both scans once and reports what happened.
	pub async fn run_once(&self) -> SweepReport {
		let mut report = SweepReport::default();

		let orders = match self.machine.list_active_orders().await {
			Ok(orders) => orders,
			Err(e) => {
				tracing::warn!(error = %e, "SLA sweep could not list orders, retrying next run");
				report.errors += 1;
				return report;
			}
		};

		let now = current_timestamp();
		self.reap_stale_requests(&orders, now, &mut report).await;
		self.flag_late_returns(&orders, now, &mut report).await;

		tracing::info!(
			reaped = report.reaped,
			flagged = report.flagged,
			conflicts = report.conflicts,
			errors = report.errors,
			"SLA sweep completed"
		);
		self.event_bus
			.publish(LifecycleEvent::Scheduler(SchedulerEvent::SweepCompleted {
				reaped: report.reaped,
				flagged: report.flagged,
				conflicts: report.conflicts,
				errors: report.errors,
			}))
			.ok();

		report
	}

	/// Cancels orders that sat in Requested past their deadline.
	///
	/// Every cancellation goes through the state machine with the version
	/// just read, so the guard is "still Requested, still this version".
	/// The usage credit-back rides the normal Cancelled side effect.
	async fn reap_stale_requests(&self, orders: &[Order], now: u64, report: &mut SweepReport) {
		for order in orders
			.iter()
			.filter(|o| o.status == OrderStatus::Requested && o.expires_at <= now)
		{
			match self
				.machine
				.transition(order.id, OrderStatus::Cancelled, order.version, Actor::System)
				.await
			{
				Ok(_) => {
					tracing::info!(order_id = order.id, "reaped stale request");
					report.reaped += 1;
				}
				// A concurrent approval or cancellation won; leave it be
				Err(TransitionError::Conflict { .. })
				| Err(TransitionError::InvalidTransition { .. })
				| Err(TransitionError::NotFound(_)) => {
					tracing::debug!(order_id = order.id, "stale request changed under the reaper");
					report.conflicts += 1;
				}
				Err(e) => {
					tracing::warn!(order_id = order.id, error = %e, "reaper failed, retrying next run");
					report.errors += 1;
				}
			}
		}
	}

	/// Flags orders whose rental window has passed while they are still
	/// out with the renter.
	///
	/// Not a lifecycle transition: the write leaves `version` untouched,
	/// and a lost race is simply picked up by the next run.
	async fn flag_late_returns(&self, orders: &[Order], now: u64, report: &mut SweepReport) {
		for order in orders.iter().filter(|o| {
			matches!(o.status, OrderStatus::Delivered | OrderStatus::InUse)
				&& !o.is_late
				&& o.end_date.is_some_and(|end| end < now)
		}) {
			let mut flagged = order.clone();
			flagged.is_late = true;

			match self
				.storage
				.swap(
					StorageKey::Orders.as_str(),
					&order.id.to_string(),
					order,
					&flagged,
				)
				.await
			{
				Ok(()) => {
					tracing::info!(order_id = order.id, "flagged late return");
					report.flagged += 1;
				}
				Err(StorageError::Conflict) | Err(StorageError::NotFound) => {
					report.conflicts += 1;
				}
				Err(e) => {
					tracing::warn!(order_id = order.id, error = %e, "late flagger failed, retrying next run");
					report.errors += 1;
				}
			}
		}
	}

}
