use serde::{Deserialize, Serialize};

use crate::{Achievement, AchievementCategory, EffectRequest, HandRecord, Result};

use super::{
    count_param, Activity, ActivityOutcome, ActivityParams, ActivityStatus, FrameContext, Tally,
};

const NAME: &str = "emotional-expression";
const ENERGY_THRESHOLD: &str = "energy_threshold";
const ACHIEVEMENT_EVERY: &str = "achievement_every";
const TINT_MS: f64 = 1_000.0;
const TINT_REFRESH_MS: f64 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Mood {
    Joyful,
    Energetic,
    Calm,
    Focused,
    Peaceful,
}

impl Mood {
    /// Reads the mood off a hand's speed and pose.
    pub fn classify(hand: &HandRecord, energy_threshold: f32) -> Self {
        let energetic = hand.velocity.magnitude > energy_threshold;
        match (energetic, hand.gestures.is_open, hand.gestures.is_fist) {
            (true, true, _) => Mood::Joyful,
            (true, false, _) => Mood::Energetic,
            (false, true, _) => Mood::Calm,
            (false, false, true) => Mood::Focused,
            (false, false, false) => Mood::Peaceful,
        }
    }

    /// Palette colour the renderer is tinted with while the mood holds.
    pub fn color(self) -> u32 {
        match self {
            Mood::Joyful => 0xFFFF_D700,
            Mood::Energetic => 0xFFFF_4500,
            Mood::Calm => 0xFF87_CEEB,
            Mood::Focused => 0xFF93_70DB,
            Mood::Peaceful => 0xFF98_FB98,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mood::Joyful => "joyful",
            Mood::Energetic => "energetic",
            Mood::Calm => "calm",
            Mood::Focused => "focused",
            Mood::Peaceful => "peaceful",
        }
    }
}

/// Free movement, mirrored back as a mood and its colour.
#[derive(Debug, Default)]
pub struct EmotionalExpression {
    params: ActivityParams,
    tally: Tally,
    mood: Option<Mood>,
    tinted_at: f64,
}

impl EmotionalExpression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mood(&self) -> Option<Mood> {
        self.mood
    }
}

impl Activity for EmotionalExpression {
    fn name(&self) -> &'static str {
        NAME
    }

    fn display_name(&self) -> &'static str {
        "Emotional Expression"
    }

    fn description(&self) -> &'static str {
        "Express how you feel through movement and color"
    }

    fn default_params(&self) -> ActivityParams {
        ActivityParams::new()
            .with(ENERGY_THRESHOLD, 1.0)
            .with(ACHIEVEMENT_EVERY, 30.0)
    }

    fn start(&mut self, params: &ActivityParams, now_ms: f64) {
        self.params = params.clone();
        self.tally.start(now_ms);
        self.mood = None;
        self.tinted_at = now_ms;
    }

    fn stop(&mut self, _now_ms: f64) {
        self.tally.stop();
    }

    fn process_hands(&mut self, frame: &FrameContext<'_>) -> Result<ActivityOutcome> {
        if !self.tally.is_active() {
            return Ok(ActivityOutcome::default());
        }
        let Some(hand) = frame.hands.first() else {
            return Ok(ActivityOutcome::default());
        };
        let every = count_param(NAME, &self.params, ACHIEVEMENT_EVERY, 30)?;
        let threshold = self.params.value_or(ENERGY_THRESHOLD, 1.0) * self.params.velocity_scale();

        let mood = Mood::classify(hand, threshold);
        let mut outcome = ActivityOutcome::default();
        // The tint outlives the refresh interval so a steady mood never flickers.
        if self.mood != Some(mood) || frame.now_ms - self.tinted_at >= TINT_REFRESH_MS {
            outcome.effects.push(EffectRequest::Tint {
                color: mood.color(),
                duration_ms: TINT_MS,
            });
            self.tinted_at = frame.now_ms;
        }
        self.mood = Some(mood);

        outcome.achievement = self.tally.bump(every).then(|| {
            Achievement::new(
                "Expressive Artist",
                "Expressed emotions through movement",
                AchievementCategory::Expression,
            )
        });
        Ok(outcome)
    }

    fn update_settings(&mut self, params: &ActivityParams) {
        self.params = self.params.merged(params);
    }

    fn status(&self) -> ActivityStatus {
        let goal = self.params.value_or(ACHIEVEMENT_EVERY, 30.0).round() as u32;
        let detail = self.mood.map(|mood| mood.as_str().to_string());
        self.tally.status(NAME, goal, detail)
    }
}
