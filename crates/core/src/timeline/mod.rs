//! Frame clock and deferred-event queue.

use serde::{Deserialize, Serialize};

/// Manually advanced clock in milliseconds, used by drivers that synthesise
/// frames instead of reading wall-clock time.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackClock {
    pub time_ms: f64,
}

impl PlaybackClock {
    pub fn reset(&mut self) {
        self.time_ms = 0.0;
    }

    pub fn advance(&mut self, delta_ms: f64) {
        self.time_ms = (self.time_ms + delta_ms).max(0.0);
    }

    pub fn now(&self) -> f64 {
        self.time_ms
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledEvent<T> {
    pub due_ms: f64,
    pub payload: T,
}

/// Time-ordered queue of pending events. Events with equal due times come out
/// in the order they were scheduled.
#[derive(Debug, Clone)]
pub struct Scheduler<T> {
    events: Vec<ScheduledEvent<T>>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self { events: Vec::new() }
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due_ms: f64, payload: T) {
        let index = self.events.partition_point(|event| event.due_ms <= due_ms);
        self.events.insert(index, ScheduledEvent { due_ms, payload });
    }

    /// Removes and returns every event due at or before `now_ms`.
    pub fn drain_due(&mut self, now_ms: f64) -> Vec<ScheduledEvent<T>> {
        let due = self.events.partition_point(|event| event.due_ms <= now_ms);
        self.events.drain(..due).collect()
    }

    pub fn cancel_all(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_in_due_order() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(300.0, "c");
        scheduler.schedule(100.0, "a");
        scheduler.schedule(200.0, "b");
        scheduler.schedule(100.0, "a2");

        let due: Vec<_> = scheduler
            .drain_due(200.0)
            .into_iter()
            .map(|event| event.payload)
            .collect();
        assert_eq!(due, vec!["a", "a2", "b"]);
        assert_eq!(scheduler.len(), 1);
        assert_eq!(scheduler.drain_due(300.0)[0].payload, "c");
    }

    #[test]
    fn cancel_clears_everything() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(10.0, 1);
        scheduler.schedule(20.0, 2);
        scheduler.cancel_all();
        assert!(scheduler.is_empty());
        assert!(scheduler.drain_due(1_000.0).is_empty());
    }

    #[test]
    fn clock_never_goes_negative() {
        let mut clock = PlaybackClock::default();
        clock.advance(16.0);
        clock.advance(-100.0);
        assert_eq!(clock.now(), 0.0);
    }
}
