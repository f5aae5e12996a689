//! Core order-lifecycle coordination for the Wardrobe marketplace.
//!
//! This crate owns the authoritative state of every order and keeps it
//! consistent with the satellite subsystems that are allowed to mutate it:
//! delivery tracking, time-based SLA enforcement and administrative
//! override, with subscription usage accounting gating creation of gated
//! order types. All of them converge on one guarded transition function;
//! correctness under concurrency comes from the storage layer's
//! conditional writes, not from in-process locking.

/// Privileged, audited mutations.
pub mod admin;
/// Engine construction from configuration and factories.
pub mod builder;
/// Translation of carrier events into order transitions.
pub mod delivery_sync;
/// Engine wiring and the main run loop.
pub mod engine;
/// Deduplication of creation requests by client-supplied key.
pub mod idempotency;
/// Order creation flow.
pub mod intake;
/// Recurring SLA scans.
pub mod scheduler;
/// The order state machine.
pub mod state;
/// Subscription usage accounting.
pub mod usage;

mod ids;

pub use admin::{AdminError, AdminOverrideChannel};
pub use builder::{BuilderError, EngineBuilder, EngineFactories};
pub use delivery_sync::{DeliverySyncAdapter, DeliverySyncError};
pub use engine::{event_bus::EventBus, EngineError, LifecycleEngine};
pub use idempotency::{Admission, IdempotencyError, IdempotencyLedger};
pub use intake::{CreationResult, IntakeError, OrderIntake};
pub use scheduler::{SlaScheduler, SweepReport};
pub use state::{AppliedEffects, OrderStateMachine, TransitionError, TransitionOutcome};
pub use usage::{SubscriptionUsageGate, UsageError};
