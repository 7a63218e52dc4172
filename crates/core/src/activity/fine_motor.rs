use crate::{Achievement, AchievementCategory, ProgressDelta, Result};

use super::{
    count_param, Activity, ActivityOutcome, ActivityParams, ActivityStatus, FrameContext, Tally,
};

const NAME: &str = "fine-motor";
const PRECISION_THRESHOLD: &str = "precision_threshold";
const ACHIEVEMENT_EVERY: &str = "achievement_every";

/// Small, controlled movements.
#[derive(Debug, Default)]
pub struct FineMotor {
    params: ActivityParams,
    tally: Tally,
}

impl FineMotor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Activity for FineMotor {
    fn name(&self) -> &'static str {
        NAME
    }

    fn display_name(&self) -> &'static str {
        "Fine Motor Control"
    }

    fn description(&self) -> &'static str {
        "Make small, careful movements to draw precise lines"
    }

    fn default_params(&self) -> ActivityParams {
        ActivityParams::new()
            .with(PRECISION_THRESHOLD, 0.15)
            .with(ACHIEVEMENT_EVERY, 20.0)
    }

    fn start(&mut self, params: &ActivityParams, now_ms: f64) {
        self.params = params.clone();
        self.tally.start(now_ms);
    }

    fn stop(&mut self, _now_ms: f64) {
        self.tally.stop();
    }

    fn process_hands(&mut self, frame: &FrameContext<'_>) -> Result<ActivityOutcome> {
        if !self.tally.is_active() {
            return Ok(ActivityOutcome::default());
        }
        let every = count_param(NAME, &self.params, ACHIEVEMENT_EVERY, 20)?;
        let threshold =
            self.params.value_or(PRECISION_THRESHOLD, 0.15) * self.params.tolerance_scale();

        let mut milestone = false;
        for hand in frame.hands {
            let magnitude = hand.velocity.magnitude;
            if magnitude > 0.0 && magnitude < threshold {
                milestone |= self.tally.bump(every);
            }
        }

        if !milestone {
            return Ok(ActivityOutcome::default());
        }
        Ok(ActivityOutcome {
            achievement: Some(Achievement::new(
                "Precision Artist",
                "Showed careful, controlled movement",
                AchievementCategory::FineMotor,
            )),
            progress: ProgressDelta {
                fine_movement: 1,
                ..Default::default()
            },
            effects: Vec::new(),
        })
    }

    fn update_settings(&mut self, params: &ActivityParams) {
        self.params = self.params.merged(params);
    }

    fn status(&self) -> ActivityStatus {
        let goal = self.params.value_or(ACHIEVEMENT_EVERY, 20.0).round() as u32;
        self.tally.status(NAME, goal, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::tests::{frame, hand_at};
    use crate::Handedness;

    fn started() -> FineMotor {
        let mut activity = FineMotor::new();
        let params = activity.default_params();
        activity.start(&params, 0.0);
        activity
    }

    #[test]
    fn only_slow_nonzero_movement_counts() {
        let mut activity = started();
        for speed in [0.0, 0.05, 0.149, 0.15, 0.6] {
            let hands = [hand_at(Handedness::Right, 0.5, 0.5, speed)];
            activity.process_hands(&frame(&hands, 0.0)).unwrap();
        }
        assert_eq!(activity.status().count, 2);
    }

    #[test]
    fn twentieth_precise_frame_is_rewarded() {
        let mut activity = started();
        let hands = [hand_at(Handedness::Left, 0.5, 0.5, 0.1)];
        let mut rewarded = Vec::new();
        for i in 1..=40 {
            let outcome = activity.process_hands(&frame(&hands, i as f64)).unwrap();
            if outcome.achievement.is_some() {
                assert_eq!(outcome.progress.fine_movement, 1);
                rewarded.push(i);
            }
        }
        assert_eq!(rewarded, vec![20, 40]);
    }

    #[test]
    fn stopped_activity_ignores_frames() {
        let mut activity = started();
        activity.stop(10.0);
        let hands = [hand_at(Handedness::Left, 0.5, 0.5, 0.1)];
        activity.process_hands(&frame(&hands, 20.0)).unwrap();
        assert_eq!(activity.status().count, 0);
        assert!(!activity.status().active);
    }
}
