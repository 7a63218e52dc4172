use crate::{render::hsl_to_argb, Achievement, AchievementCategory, EffectRequest, Result};

use super::{
    count_param, Activity, ActivityOutcome, ActivityParams, ActivityStatus, FrameContext, Tally,
};

const NAME: &str = "cause-and-effect";
const MIN_EFFECT_INTERVAL: &str = "min_effect_interval";
const ACHIEVEMENT_EVERY: &str = "achievement_every";

/// Any visible hand triggers a ripple, rate limited.
#[derive(Debug, Default)]
pub struct CauseAndEffect {
    params: ActivityParams,
    tally: Tally,
    last_effect: Option<f64>,
}

impl CauseAndEffect {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Activity for CauseAndEffect {
    fn name(&self) -> &'static str {
        NAME
    }

    fn display_name(&self) -> &'static str {
        "Cause and Effect"
    }

    fn description(&self) -> &'static str {
        "Every movement makes something happen on screen"
    }

    fn default_params(&self) -> ActivityParams {
        ActivityParams::new()
            .with(MIN_EFFECT_INTERVAL, 500.0)
            .with(ACHIEVEMENT_EVERY, 25.0)
    }

    fn start(&mut self, params: &ActivityParams, now_ms: f64) {
        self.params = params.clone();
        self.tally.start(now_ms);
        self.last_effect = None;
    }

    fn stop(&mut self, _now_ms: f64) {
        self.tally.stop();
    }

    fn process_hands(&mut self, frame: &FrameContext<'_>) -> Result<ActivityOutcome> {
        if !self.tally.is_active() || frame.hands.is_empty() {
            return Ok(ActivityOutcome::default());
        }
        let interval = f64::from(self.params.value_or(MIN_EFFECT_INTERVAL, 500.0));
        if self
            .last_effect
            .is_some_and(|last| frame.now_ms - last < interval)
        {
            return Ok(ActivityOutcome::default());
        }
        let every = count_param(NAME, &self.params, ACHIEVEMENT_EVERY, 25)?;

        self.last_effect = Some(frame.now_ms);
        let effects = frame
            .hands
            .iter()
            .map(|hand| EffectRequest::Ripple {
                x: hand.center.x,
                y: hand.center.y,
                color: hsl_to_argb(hand.center.x.clamp(0.0, 1.0) * 360.0, 1.0, 0.6),
            })
            .collect();

        let achievement = self.tally.bump(every).then(|| {
            Achievement::new(
                "Curious Explorer",
                "Discovered how movement creates effects",
                AchievementCategory::Engagement,
            )
        });

        Ok(ActivityOutcome {
            achievement,
            effects,
            ..Default::default()
        })
    }

    fn update_settings(&mut self, params: &ActivityParams) {
        self.params = self.params.merged(params);
    }

    fn status(&self) -> ActivityStatus {
        let goal = self.params.value_or(ACHIEVEMENT_EVERY, 25.0).round() as u32;
        self.tally.status(NAME, goal, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::tests::{frame, hand_at};
    use crate::Handedness;

    fn started() -> CauseAndEffect {
        let mut activity = CauseAndEffect::new();
        let params = activity.default_params();
        activity.start(&params, 0.0);
        activity
    }

    #[test]
    fn ripples_are_rate_limited() {
        let mut activity = started();
        let hands = [
            hand_at(Handedness::Left, 0.3, 0.5, 0.0),
            hand_at(Handedness::Right, 0.7, 0.5, 0.0),
        ];

        let first = activity.process_hands(&frame(&hands, 1_000.0)).unwrap();
        assert_eq!(first.effects.len(), 2);
        assert!(activity.process_hands(&frame(&hands, 1_400.0)).unwrap().is_empty());
        assert_eq!(activity.process_hands(&frame(&hands, 1_500.0)).unwrap().effects.len(), 2);
        assert_eq!(activity.status().count, 2);
    }

    #[test]
    fn every_twenty_fifth_trigger_is_an_achievement() {
        let mut activity = started();
        let hands = [hand_at(Handedness::Left, 0.5, 0.5, 0.0)];
        let achievements = (0..50)
            .filter_map(|i| {
                activity
                    .process_hands(&frame(&hands, i as f64 * 500.0))
                    .unwrap()
                    .achievement
            })
            .count();
        assert_eq!(achievements, 2);
    }

    #[test]
    fn no_hands_no_effect() {
        let mut activity = started();
        assert!(activity.process_hands(&frame(&[], 0.0)).unwrap().is_empty());
    }
}
