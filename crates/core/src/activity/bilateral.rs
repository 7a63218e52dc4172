use crate::{Achievement, AchievementCategory, Handedness, ProgressDelta, Result};

use super::{
    count_param, Activity, ActivityOutcome, ActivityParams, ActivityStatus, FrameContext, Tally,
};

const NAME: &str = "bilateral-coordination";
const TARGET_DISTANCE: &str = "target_distance";
const TOLERANCE: &str = "tolerance";
const REQUIRED_COUNT: &str = "required_count";

/// Both hands held a steady distance apart.
#[derive(Debug, Default)]
pub struct BilateralCoordination {
    params: ActivityParams,
    tally: Tally,
}

impl BilateralCoordination {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Activity for BilateralCoordination {
    fn name(&self) -> &'static str {
        NAME
    }

    fn display_name(&self) -> &'static str {
        "Bilateral Coordination"
    }

    fn description(&self) -> &'static str {
        "Move both hands together while keeping them a steady distance apart"
    }

    fn default_params(&self) -> ActivityParams {
        ActivityParams::new()
            .with(TARGET_DISTANCE, 0.3)
            .with(TOLERANCE, 0.1)
            .with(REQUIRED_COUNT, 10.0)
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
        let left = frame.hands.iter().find(|hand| hand.label == Handedness::Left);
        let right = frame.hands.iter().find(|hand| hand.label == Handedness::Right);
        let (Some(left), Some(right)) = (left, right) else {
            return Ok(ActivityOutcome::default());
        };

        let required = count_param(NAME, &self.params, REQUIRED_COUNT, 10)?;
        let target = self.params.value_or(TARGET_DISTANCE, 0.3);
        let tolerance = self.params.value_or(TOLERANCE, 0.1) * self.params.tolerance_scale();

        let distance = left.center.distance_2d(right.center);
        if (distance - target).abs() >= tolerance || !self.tally.bump_until(required) {
            return Ok(ActivityOutcome::default());
        }

        Ok(ActivityOutcome {
            achievement: Some(Achievement::new(
                "Bilateral Master",
                "Both hands moved together in coordination",
                AchievementCategory::Bilateral,
            )),
            progress: ProgressDelta {
                bilateral: 1,
                ..Default::default()
            },
            effects: Vec::new(),
        })
    }

    fn update_settings(&mut self, params: &ActivityParams) {
        self.params = self.params.merged(params);
    }

    fn status(&self) -> ActivityStatus {
        let goal = self.params.value_or(REQUIRED_COUNT, 10.0).round() as u32;
        self.tally.status(NAME, goal, None)
    }
}
