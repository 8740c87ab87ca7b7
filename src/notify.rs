use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::Event;

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast hub for per-salon change feeds. Collaborators (dashboards,
/// reminder senders) subscribe to a salon and receive every committed
/// event touching it. Best-effort: lagging receivers drop messages.
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<Event>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to notifications for a salon. Creates the channel if needed.
    pub fn subscribe(&self, salon_id: Ulid) -> broadcast::Receiver<Event> {
        let sender = self
            .channels
            .entry(salon_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Publish a committed event to the salon's subscribers, if any.
    pub fn send(&self, salon_id: Ulid, event: &Event) {
        if let Some(sender) = self.channels.get(&salon_id) {
            let _ = sender.send(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Span, TimeSlot};

    #[tokio::test]
    async fn subscribe_and_receive() {
        let hub = NotifyHub::new();
        let salon_id = Ulid::new();
        let mut rx = hub.subscribe(salon_id);

        let event = Event::SlotCreated {
            slot: TimeSlot {
                id: Ulid::new(),
                salon_id,
                span: Span::new(1000, 2000),
                available: true,
            },
        };
        hub.send(salon_id, &event);

        let received = rx.recv().await.unwrap();
        assert_eq!(received, event);
    }

    #[tokio::test]
    async fn send_without_subscribers_is_noop() {
        let hub = NotifyHub::new();
        let salon_id = Ulid::new();
        // nobody listening; send drops the event
        hub.send(salon_id, &Event::ReviewRemoved { id: Ulid::new() });
    }
}
