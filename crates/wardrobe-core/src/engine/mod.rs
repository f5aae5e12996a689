//! Lifecycle engine that wires the coordinator together.
//!
//! The engine owns the storage service, the state machine and every
//! satellite component, and runs the background loop: recurring SLA
//! sweeps, storage cleanup, lifecycle-event logging and shutdown on
//! ctrl-c. Request handlers call into the components through the engine's
//! accessors; the loop only drives time-based work.

pub mod event_bus;

use crate::admin::AdminOverrideChannel;
use crate::delivery_sync::DeliverySyncAdapter;
use crate::idempotency::IdempotencyLedger;
use crate::intake::OrderIntake;
use crate::scheduler::SlaScheduler;
use crate::state::OrderStateMachine;
use crate::usage::SubscriptionUsageGate;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use wardrobe_config::Config;
use wardrobe_storage::StorageService;

/// Errors that can occur while the engine is running.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Service error: {0}")]
	Service(String),
}

/// Main engine owning all coordinator components.
#[derive(Clone)]
pub struct LifecycleEngine {
	config: Config,
	storage: Arc<StorageService>,
	state_machine: Arc<OrderStateMachine>,
	usage_gate: Arc<SubscriptionUsageGate>,
	intake: Arc<OrderIntake>,
	delivery_sync: Arc<DeliverySyncAdapter>,
	scheduler: Arc<SlaScheduler>,
	admin: Arc<AdminOverrideChannel>,
	event_bus: event_bus::EventBus,
}

impl LifecycleEngine {
	/// Creates the engine and wires all components over the given storage.
	pub fn new(config: Config, storage: Arc<StorageService>) -> Self {
		let event_bus = event_bus::EventBus::default();

		let usage_gate = Arc::new(SubscriptionUsageGate::new(storage.clone()));
		let state_machine = Arc::new(OrderStateMachine::new(
			storage.clone(),
			usage_gate.clone(),
			event_bus.clone(),
		));
		let ledger = Arc::new(IdempotencyLedger::new(
			storage.clone(),
			Duration::from_secs(config.idempotency.retention_hours * 3600),
		));
		let intake = Arc::new(OrderIntake::new(
			storage.clone(),
			state_machine.clone(),
			ledger,
			usage_gate.clone(),
			Duration::from_secs(config.scheduler.stale_request_hours * 3600),
			event_bus.clone(),
		));
		let delivery_sync = Arc::new(DeliverySyncAdapter::new(
			storage.clone(),
			state_machine.clone(),
			event_bus.clone(),
		));
		let scheduler = Arc::new(SlaScheduler::new(
			storage.clone(),
			state_machine.clone(),
			event_bus.clone(),
		));
		let admin = Arc::new(AdminOverrideChannel::new(
			storage.clone(),
			state_machine.clone(),
			event_bus.clone(),
		));

		Self {
			config,
			storage,
			state_machine,
			usage_gate,
			intake,
			delivery_sync,
			scheduler,
			admin,
			event_bus,
		}
	}

	/// Background loop: SLA sweeps, storage cleanup, event logging.
	///
	/// Runs until ctrl-c. Sweep failures are reported by the scheduler as
	/// counts and retried on the next tick; nothing in here is fatal.
	pub async fn run(&self) -> Result<(), EngineError> {
		let mut sweep_interval = tokio::time::interval(Duration::from_secs(
			self.config.scheduler.scan_interval_seconds,
		));
		let mut cleanup_interval = tokio::time::interval(Duration::from_secs(
			self.config.storage.cleanup_interval_seconds,
		));
		let mut events = self.event_bus.subscribe();

		tracing::info!(marketplace = %self.config.marketplace.id, "lifecycle engine running");

		loop {
			tokio::select! {
				_ = sweep_interval.tick() => {
					self.scheduler.run_once().await;
				}

				_ = cleanup_interval.tick() => {
					match self.storage.cleanup_expired().await {
						Ok(count) if count > 0 => {
							tracing::debug!("Storage cleanup: removed {} expired entries", count);
						}
						Err(e) => {
							tracing::warn!("Storage cleanup failed: {}", e);
						}
						_ => {} // No expired entries
					}
				}

				event = events.recv() => {
					match event {
						Ok(event) => tracing::debug!(?event, "lifecycle event"),
						Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
							tracing::warn!(missed, "event observer lagged");
						}
						Err(tokio::sync::broadcast::error::RecvError::Closed) => {}
					}
				}

				_ = tokio::signal::ctrl_c() => {
					tracing::info!("shutdown signal received");
					break;
				}
			}
		}

		Ok(())
	}

	/// Returns a reference to the configuration.
	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Returns a reference to the storage service.
	pub fn storage(&self) -> &Arc<StorageService> {
		&self.storage
	}

	/// Returns a reference to the order state machine.
	pub fn state_machine(&self) -> &Arc<OrderStateMachine> {
		&self.state_machine
	}

	/// Returns a reference to the subscription usage gate.
	pub fn usage_gate(&self) -> &Arc<SubscriptionUsageGate> {
		&self.usage_gate
	}

	/// Returns a reference to the order intake.
	pub fn intake(&self) -> &Arc<OrderIntake> {
		&self.intake
	}

	/// Returns a reference to the delivery sync adapter.
	pub fn delivery_sync(&self) -> &Arc<DeliverySyncAdapter> {
		&self.delivery_sync
	}

	/// Returns a reference to the SLA scheduler.
	pub fn scheduler(&self) -> &Arc<SlaScheduler> {
		&self.scheduler
	}

	/// Returns a reference to the admin override channel.
	pub fn admin(&self) -> &Arc<AdminOverrideChannel> {
		&self.admin
	}

	/// Returns a reference to the event bus.
	pub fn event_bus(&self) -> &event_bus::EventBus {
		&self.event_bus
	}
}
