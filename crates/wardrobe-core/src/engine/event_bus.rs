//! Broadcast bus for lifecycle events.
//!
//! Publishing is fire-and-forget: the authoritative state lives in
//! storage, so a dropped event is a lost observation, never lost data.

use tokio::sync::broadcast;
use wardrobe_types::LifecycleEvent;

/// Default channel capacity before the oldest unread events are dropped.
const DEFAULT_CAPACITY: usize = 256;

/// Clonable handle to the broadcast channel.
#[derive(Debug, Clone)]
pub struct EventBus {
	sender: broadcast::Sender<LifecycleEvent>,
}

impl EventBus {
	/// Creates a bus with the given buffer capacity.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Publishes an event to all current subscribers.
	///
	/// Returns the number of receivers, or an error when there are none;
	/// callers that do not care use `.ok()`.
	pub fn publish(
		&self,
		event: LifecycleEvent,
	) -> Result<usize, broadcast::error::SendError<LifecycleEvent>> {
		self.sender.send(event)
	}

	/// Subscribes to events published after this call.
	pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
		self.sender.subscribe()
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new(DEFAULT_CAPACITY)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use wardrobe_types::{OrderEvent, OrderType};

	#[tokio::test]
	async fn subscribers_see_published_events() {
		let bus = EventBus::default();
		let mut receiver = bus.subscribe();

		bus.publish(LifecycleEvent::Order(OrderEvent::Created {
			order_id: 1,
			order_type: OrderType::Rent,
		}))
		.unwrap();

		match receiver.recv().await.unwrap() {
			LifecycleEvent::Order(OrderEvent::Created { order_id, .. }) => {
				assert_eq!(order_id, 1)
			}
			other => panic!("unexpected event: {:?}", other),
		}
	}

	#[tokio::test]
	async fn publish_without_subscribers_is_harmless() {
		let bus = EventBus::default();
		assert!(bus
			.publish(LifecycleEvent::Order(OrderEvent::Deleted { order_id: 1 }))
			.is_err());
	}
}
