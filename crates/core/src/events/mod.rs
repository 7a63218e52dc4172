//! Outbound notifications.
//!
//! Subscribers receive events over bounded `mpsc` channels. Delivery is
//! synchronous: `publish` sends on the calling thread before returning, once
//! per subscriber per event, in publication order. A subscriber whose queue
//! is full misses the event instead of blocking the frame. Subscribers whose
//! receiver was dropped are pruned on the next publish.

use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::LostHand;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AchievementCategory {
    Bilateral,
    Engagement,
    LargeMovement,
    FineMotor,
    Rhythm,
    Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Achievement {
    pub name: String,
    pub description: String,
    pub category: AchievementCategory,
}

impl Achievement {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        category: AchievementCategory,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            category,
        }
    }
}

/// Partial progress increments reported by an activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressDelta {
    pub bilateral: u32,
    pub large_movement: u32,
    pub fine_movement: u32,
}

impl ProgressDelta {
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn total(&self) -> u32 {
        self.bilateral + self.large_movement + self.fine_movement
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FeedbackEvent {
    Achievement {
        achievement: Achievement,
        timestamp: f64,
    },
    Progress {
        delta: ProgressDelta,
        timestamp: f64,
    },
    HandLost(LostHand),
    Error {
        source: String,
        message: String,
    },
}

/// Events a subscriber may leave unread before new ones are dropped.
pub const SUBSCRIBER_CAPACITY: usize = 1_024;

#[derive(Debug)]
pub struct EventBus {
    subscribers: Vec<SyncSender<FeedbackEvent>>,
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_capacity(SUBSCRIBER_CAPACITY)
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn subscribe(&mut self) -> Receiver<FeedbackEvent> {
        let (tx, rx) = mpsc::sync_channel(self.capacity);
        self.subscribers.push(tx);
        rx
    }

    pub fn publish(&mut self, event: FeedbackEvent) {
        self.subscribers
            .retain(|subscriber| match subscriber.try_send(event.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(dropped)) => {
                    warn!(event = ?dropped, "subscriber queue full, event dropped");
                    true
                }
                Err(TrySendError::Disconnected(_)) => false,
            });
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(message: &str) -> FeedbackEvent {
        FeedbackEvent::Error {
            source: "test".to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn every_subscriber_gets_each_event_once_in_order() {
        let mut bus = EventBus::new();
        let first = bus.subscribe();
        let second = bus.subscribe();

        bus.publish(error("one"));
        bus.publish(error("two"));

        for rx in [first, second] {
            let received: Vec<_> = rx.try_iter().collect();
            assert_eq!(received, vec![error("one"), error("two")]);
        }
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let mut bus = EventBus::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());

        bus.publish(error("ping"));
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(kept.try_iter().count(), 1);
    }

    #[test]
    fn full_queues_drop_events_without_losing_the_subscriber() {
        let mut bus = EventBus::with_capacity(2);
        let slow = bus.subscribe();

        bus.publish(error("one"));
        bus.publish(error("two"));
        bus.publish(error("three"));
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(slow.try_iter().collect::<Vec<_>>(), vec![error("one"), error("two")]);

        bus.publish(error("four"));
        assert_eq!(slow.try_iter().collect::<Vec<_>>(), vec![error("four")]);
    }

    #[test]
    fn progress_totals() {
        let delta = ProgressDelta {
            bilateral: 1,
            large_movement: 1,
            ..Default::default()
        };
        assert_eq!(delta.total(), 2);
        assert!(!delta.is_empty());
        assert!(ProgressDelta::default().is_empty());
    }
}
