//! Typed notifications between the measurement, settings and tracking parts.

use tokio::sync::broadcast;

use crate::units::UnitSystem;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Tracking,
    Units,
    Detection,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    TrackingStateChanged { enabled: bool },
    UnitSystemChanged(UnitSystem),
    DetectionCompleted { count: usize },
}

impl AppEvent {
    pub fn topic(&self) -> Topic {
        match self {
            AppEvent::TrackingStateChanged { .. } => Topic::Tracking,
            AppEvent::UnitSystemChanged(_) => Topic::Units,
            AppEvent::DetectionCompleted { .. } => Topic::Detection,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<AppEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publishes an event. Having no subscribers is not an error.
    pub fn publish(&self, event: AppEvent) {
        log::debug!("Publishing {:?}", event);
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self, topic: Topic) -> Subscription {
        Subscription {
            topic,
            receiver: self.sender.subscribe(),
        }
    }
}

/// Receiver that only yields events of one topic.
pub struct Subscription {
    topic: Topic,
    receiver: broadcast::Receiver<AppEvent>,
}

impl Subscription {
    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Waits for the next event on this topic. `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<AppEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.topic() == self.topic => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("{:?} subscriber lagged, {} events skipped", self.topic, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next already-queued event on this topic, without waiting.
    pub fn try_recv(&mut self) -> Option<AppEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if event.topic() == self.topic => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribers_only_see_their_topic() {
        let bus = EventBus::new();
        let mut tracking = bus.subscribe(Topic::Tracking);
        let mut units = bus.subscribe(Topic::Units);

        bus.publish(AppEvent::UnitSystemChanged(UnitSystem::Metric));
        bus.publish(AppEvent::TrackingStateChanged { enabled: true });
        bus.publish(AppEvent::DetectionCompleted { count: 3 });

        assert_eq!(
            tracking.try_recv(),
            Some(AppEvent::TrackingStateChanged { enabled: true })
        );
        assert_eq!(tracking.try_recv(), None);
        assert_eq!(
            units.try_recv(),
            Some(AppEvent::UnitSystemChanged(UnitSystem::Metric))
        );
        assert_eq!(units.try_recv(), None);
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        let bus = EventBus::new();
        bus.publish(AppEvent::DetectionCompleted { count: 0 });
    }

    #[tokio::test]
    async fn recv_waits_for_matching_event() {
        let bus = EventBus::new();
        let mut detection = bus.subscribe(Topic::Detection);
        let publisher = bus.clone();
        tokio::spawn(async move {
            publisher.publish(AppEvent::TrackingStateChanged { enabled: false });
            publisher.publish(AppEvent::DetectionCompleted { count: 2 });
        });
        assert_eq!(
            detection.recv().await,
            Some(AppEvent::DetectionCompleted { count: 2 })
        );
    }
}
