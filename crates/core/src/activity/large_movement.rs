use crate::{Achievement, AchievementCategory, EffectRequest, ProgressDelta, Result};

use super::{
    count_param, Activity, ActivityOutcome, ActivityParams, ActivityStatus, FrameContext, Tally,
};

const NAME: &str = "large-movement";
const VELOCITY_THRESHOLD: &str = "velocity_threshold";
const BRUSH_SCALE: &str = "brush_scale";
const ACHIEVEMENT_EVERY: &str = "achievement_every";
const PULSE_MS: f64 = 300.0;

/// Big, fast arm movements swell the brush.
#[derive(Debug, Default)]
pub struct LargeMovement {
    params: ActivityParams,
    tally: Tally,
}

impl LargeMovement {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Activity for LargeMovement {
    fn name(&self) -> &'static str {
        NAME
    }

    fn display_name(&self) -> &'static str {
        "Large Movement"
    }

    fn description(&self) -> &'static str {
        "Make big sweeping movements to paint with a wider brush"
    }

    fn default_params(&self) -> ActivityParams {
        ActivityParams::new()
            .with(VELOCITY_THRESHOLD, 0.8)
            .with(BRUSH_SCALE, 1.5)
            .with(ACHIEVEMENT_EVERY, 5.0)
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
        let every = count_param(NAME, &self.params, ACHIEVEMENT_EVERY, 5)?;
        let threshold =
            self.params.value_or(VELOCITY_THRESHOLD, 0.8) * self.params.velocity_scale();
        let scale = self.params.value_or(BRUSH_SCALE, 1.5);

        let mut outcome = ActivityOutcome::default();
        let mut milestone = false;
        for hand in frame.hands {
            if hand.velocity.magnitude <= threshold {
                continue;
            }
            outcome.effects.push(EffectRequest::BrushPulse {
                scale,
                duration_ms: PULSE_MS,
            });
            milestone |= self.tally.bump(every);
        }

        if milestone {
            outcome.achievement = Some(Achievement::new(
                "Big Mover",
                "Made large, expansive movements",
                AchievementCategory::LargeMovement,
            ));
            outcome.progress = ProgressDelta {
                large_movement: 1,
                bilateral: u32::from(frame.hands.len() == 2),
                ..Default::default()
            };
        }
        Ok(outcome)
    }

    fn update_settings(&mut self, params: &ActivityParams) {
        self.params = self.params.merged(params);
    }

    fn status(&self) -> ActivityStatus {
        let goal = self.params.value_or(ACHIEVEMENT_EVERY, 5.0).round() as u32;
        self.tally.status(NAME, goal, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::tests::{frame, hand_at};
    use crate::activity::VELOCITY_SCALE;
    use crate::Handedness;

    fn started(params: ActivityParams) -> LargeMovement {
        let mut activity = LargeMovement::new();
        let params = activity.default_params().merged(&params);
        activity.start(&params, 0.0);
        activity
    }

    #[test]
    fn fast_hands_pulse_the_brush() {
        let mut activity = started(ActivityParams::new());
        let hands = [
            hand_at(Handedness::Left, 0.3, 0.5, 1.0),
            hand_at(Handedness::Right, 0.7, 0.5, 0.2),
        ];
        let outcome = activity.process_hands(&frame(&hands, 0.0)).unwrap();
        assert_eq!(
            outcome.effects,
            vec![EffectRequest::BrushPulse {
                scale: 1.5,
                duration_ms: 300.0
            }]
        );
        assert_eq!(activity.status().count, 1);
    }

    #[test]
    fn fifth_movement_counts_bilateral_with_two_hands() {
        let mut activity = started(ActivityParams::new());
        let hands = [
            hand_at(Handedness::Left, 0.3, 0.5, 1.0),
            hand_at(Handedness::Right, 0.7, 0.5, 0.1),
        ];
        let outcomes: Vec<_> = (0..5)
            .map(|i| activity.process_hands(&frame(&hands, i as f64)).unwrap())
            .collect();

        assert!(outcomes[..4].iter().all(|o| o.achievement.is_none()));
        let last = &outcomes[4];
        assert!(last.achievement.is_some());
        assert_eq!(last.progress.large_movement, 1);
        assert_eq!(last.progress.bilateral, 1);
    }

    #[test]
    fn hard_difficulty_raises_the_bar() {
        let mut activity = started(ActivityParams::new().with(VELOCITY_SCALE, 1.25));
        let hands = [hand_at(Handedness::Left, 0.3, 0.5, 0.9)];
        assert!(activity.process_hands(&frame(&hands, 0.0)).unwrap().is_empty());
    }
}
