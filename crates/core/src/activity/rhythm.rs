use crate::{Achievement, AchievementCategory, Result};

use super::{
    count_param, Activity, ActivityOutcome, ActivityParams, ActivityStatus, FrameContext, Tally,
};

const NAME: &str = "rhythm-sync";
const VELOCITY_FLOOR: &str = "velocity_floor";
const SYNC_WINDOW: &str = "sync_window";
const ACHIEVEMENT_EVERY: &str = "achievement_every";

/// Moving in time with the music's beat.
#[derive(Debug, Default)]
pub struct RhythmSync {
    params: ActivityParams,
    tally: Tally,
    /// Timestamp of the most recent beat seen in the audio features.
    last_beat: Option<f64>,
    beat_matched: bool,
}

impl RhythmSync {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Activity for RhythmSync {
    fn name(&self) -> &'static str {
        NAME
    }

    fn display_name(&self) -> &'static str {
        "Rhythm Sync"
    }

    fn description(&self) -> &'static str {
        "Move your hands in time with the beat of the music"
    }

    fn default_params(&self) -> ActivityParams {
        ActivityParams::new()
            .with(VELOCITY_FLOOR, 0.3)
            .with(SYNC_WINDOW, 250.0)
            .with(ACHIEVEMENT_EVERY, 10.0)
    }

    fn start(&mut self, params: &ActivityParams, now_ms: f64) {
        self.params = params.clone();
        self.tally.start(now_ms);
        self.last_beat = None;
        self.beat_matched = false;
    }

    fn stop(&mut self, _now_ms: f64) {
        self.tally.stop();
    }

    fn process_hands(&mut self, frame: &FrameContext<'_>) -> Result<ActivityOutcome> {
        let Some(audio) = frame.audio else {
            return Ok(ActivityOutcome::default());
        };
        if !self.tally.is_active() {
            return Ok(ActivityOutcome::default());
        }

        if audio.beat && self.last_beat != Some(audio.timestamp) {
            self.last_beat = Some(audio.timestamp);
            self.beat_matched = false;
        }

        let Some(beat_at) = self.last_beat else {
            return Ok(ActivityOutcome::default());
        };
        let window = f64::from(self.params.value_or(SYNC_WINDOW, 250.0));
        if self.beat_matched || (frame.now_ms - beat_at).abs() > window {
            return Ok(ActivityOutcome::default());
        }

        let floor = self.params.value_or(VELOCITY_FLOOR, 0.3) * self.params.velocity_scale();
        if !frame
            .hands
            .iter()
            .any(|hand| hand.velocity.magnitude > floor)
        {
            return Ok(ActivityOutcome::default());
        }

        let every = count_param(NAME, &self.params, ACHIEVEMENT_EVERY, 10)?;
        self.beat_matched = true;
        let achievement = self.tally.bump(every).then(|| {
            Achievement::new(
                "Rhythm Master",
                "Moved in sync with the music",
                AchievementCategory::Rhythm,
            )
        });
        Ok(ActivityOutcome {
            achievement,
            ..Default::default()
        })
    }

    fn update_settings(&mut self, params: &ActivityParams) {
        self.params = self.params.merged(params);
    }

    fn status(&self) -> ActivityStatus {
        let goal = self.params.value_or(ACHIEVEMENT_EVERY, 10.0).round() as u32;
        let detail = self
            .last_beat
            .map(|beat| format!("last beat at {beat:.0} ms"));
        self.tally.status(NAME, goal, detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::tests::hand_at;
    use crate::{AudioFeatures, Handedness};

    fn started() -> RhythmSync {
        let mut activity = RhythmSync::new();
        let params = activity.default_params();
        activity.start(&params, 0.0);
        activity
    }

    fn beat(timestamp: f64) -> AudioFeatures {
        AudioFeatures {
            timestamp,
            beat: true,
            ..AudioFeatures::silent(timestamp)
        }
    }

    fn run(
        activity: &mut RhythmSync,
        speed: f32,
        audio: Option<&AudioFeatures>,
        now_ms: f64,
    ) -> ActivityOutcome {
        let hands = [hand_at(Handedness::Right, 0.5, 0.5, speed)];
        activity
            .process_hands(&FrameContext {
                hands: &hands,
                audio,
                now_ms,
            })
            .unwrap()
    }

    #[test]
    fn without_audio_nothing_happens() {
        let mut activity = started();
        assert!(run(&mut activity, 2.0, None, 0.0).is_empty());
        assert_eq!(activity.status().count, 0);
    }

    #[test]
    fn one_match_per_beat() {
        let mut activity = started();
        let features = beat(1_000.0);
        run(&mut activity, 1.0, Some(&features), 1_050.0);
        run(&mut activity, 1.0, Some(&features), 1_100.0);
        assert_eq!(activity.status().count, 1);

        let next = beat(1_500.0);
        run(&mut activity, 1.0, Some(&next), 1_520.0);
        assert_eq!(activity.status().count, 2);
    }

    #[test]
    fn movement_outside_the_window_or_too_slow_misses() {
        let mut activity = started();
        let features = beat(1_000.0);
        run(&mut activity, 0.1, Some(&features), 1_010.0);
        run(&mut activity, 1.0, Some(&features), 1_400.0);
        assert_eq!(activity.status().count, 0);
    }

    #[test]
    fn tenth_match_is_an_achievement() {
        let mut activity = started();
        let mut achievements = 0;
        for i in 1..=10 {
            let at = i as f64 * 500.0;
            let features = beat(at);
            if run(&mut activity, 1.0, Some(&features), at + 20.0)
                .achievement
                .is_some()
            {
                achievements += 1;
            }
        }
        assert_eq!(achievements, 1);
    }
}
