use serde::{Deserialize, Serialize};

use crate::{Achievement, ProgressDelta};

const MS_PER_MINUTE: f64 = 60_000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub name: String,
    pub start_ms: f64,
    /// `None` while the activity is still running.
    pub end_ms: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimedAchievement {
    pub achievement: Achievement,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCounters {
    pub bilateral: u64,
    pub large_movement: u64,
    pub fine_movement: u64,
    pub total_movements: u64,
}

/// Everything that happened since the session started. Only the activity
/// engine writes to it.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionLog {
    started_ms: f64,
    activities: Vec<ActivityRecord>,
    achievements: Vec<TimedAchievement>,
    counters: SessionCounters,
}

impl SessionLog {
    pub fn new(started_ms: f64) -> Self {
        Self {
            started_ms,
            activities: Vec::new(),
            achievements: Vec::new(),
            counters: SessionCounters::default(),
        }
    }

    pub fn started_ms(&self) -> f64 {
        self.started_ms
    }

    pub fn activities(&self) -> &[ActivityRecord] {
        &self.activities
    }

    pub fn achievements(&self) -> &[TimedAchievement] {
        &self.achievements
    }

    pub fn counters(&self) -> SessionCounters {
        self.counters
    }

    pub(crate) fn open_activity(&mut self, name: &str, now_ms: f64) {
        self.activities.push(ActivityRecord {
            name: name.to_string(),
            start_ms: now_ms,
            end_ms: None,
        });
    }

    /// Closes the most recent record if it is still open.
    pub(crate) fn close_activity(&mut self, now_ms: f64) {
        if let Some(record) = self.activities.last_mut() {
            if record.end_ms.is_none() {
                record.end_ms = Some(now_ms);
            }
        }
    }

    pub(crate) fn record_achievement(&mut self, achievement: Achievement, now_ms: f64) {
        self.achievements.push(TimedAchievement {
            achievement,
            timestamp: now_ms,
        });
    }

    pub(crate) fn add_progress(&mut self, delta: ProgressDelta) {
        self.counters.bilateral += u64::from(delta.bilateral);
        self.counters.large_movement += u64::from(delta.large_movement);
        self.counters.fine_movement += u64::from(delta.fine_movement);
        self.counters.total_movements += u64::from(delta.total());
    }

    pub fn summary(&self, now_ms: f64) -> SessionSummary {
        let elapsed_ms = (now_ms - self.started_ms).max(0.0);
        let total_movements = self.counters.total_movements;
        let average_movements_per_minute = if elapsed_ms > 0.0 {
            total_movements as f64 / (elapsed_ms / MS_PER_MINUTE)
        } else {
            0.0
        };

        SessionSummary {
            elapsed_ms,
            activities: self
                .activities
                .iter()
                .map(|record| ActivitySummary {
                    name: record.name.clone(),
                    start_ms: record.start_ms,
                    end_ms: record.end_ms,
                    duration_ms: (record.end_ms.unwrap_or(now_ms) - record.start_ms).max(0.0),
                })
                .collect(),
            achievement_count: self.achievements.len(),
            counters: self.counters,
            total_movements,
            average_movements_per_minute,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySummary {
    pub name: String,
    pub start_ms: f64,
    pub end_ms: Option<f64>,
    pub duration_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub elapsed_ms: f64,
    pub activities: Vec<ActivitySummary>,
    pub achievement_count: usize,
    pub counters: SessionCounters,
    pub total_movements: u64,
    pub average_movements_per_minute: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AchievementCategory;

    #[test]
    fn average_is_per_minute_and_zero_without_elapsed_time() {
        let mut log = SessionLog::new(1_000.0);
        log.add_progress(ProgressDelta {
            large_movement: 1,
            bilateral: 1,
            ..Default::default()
        });
        log.add_progress(ProgressDelta {
            fine_movement: 4,
            ..Default::default()
        });

        assert_eq!(log.summary(1_000.0).average_movements_per_minute, 0.0);

        let summary = log.summary(31_000.0);
        assert_eq!(summary.total_movements, 6);
        assert_eq!(summary.counters.fine_movement, 4);
        assert!((summary.average_movements_per_minute - 12.0).abs() < 1e-9);
    }

    #[test]
    fn open_records_run_until_now() {
        let mut log = SessionLog::new(0.0);
        log.open_activity("fine-motor", 100.0);
        log.close_activity(400.0);
        log.close_activity(900.0);
        log.open_activity("rhythm-sync", 500.0);
        log.record_achievement(
            Achievement::new("Steady", "kept time", AchievementCategory::Rhythm),
            600.0,
        );

        let summary = log.summary(1_500.0);
        assert_eq!(summary.activities[0].end_ms, Some(400.0));
        assert_eq!(summary.activities[0].duration_ms, 300.0);
        assert_eq!(summary.activities[1].end_ms, None);
        assert_eq!(summary.activities[1].duration_ms, 1_000.0);
        assert_eq!(summary.achievement_count, 1);
    }
}
