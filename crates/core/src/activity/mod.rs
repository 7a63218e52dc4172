//! Therapeutic activities and the engine that runs one of them at a time.
//!
//! Activities are trait objects kept in a name-keyed catalog built from
//! factories at startup. The engine owns the session log and turns activity
//! outcomes into render effects and bus events.

mod bilateral;
mod cause_effect;
mod expression;
mod fine_motor;
mod large_movement;
mod rhythm;
mod session;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::{
    render::EffectRequest, Achievement, AudioFeatures, CelebrationIntensity, EventBus,
    FeedbackError, FeedbackEvent, HandRecord, ProgressDelta, RenderEngine, Result, Settings,
};

pub use bilateral::BilateralCoordination;
pub use cause_effect::CauseAndEffect;
pub use expression::{EmotionalExpression, Mood};
pub use fine_motor::FineMotor;
pub use large_movement::LargeMovement;
pub use rhythm::RhythmSync;
pub use session::{
    ActivityRecord, ActivitySummary, SessionCounters, SessionLog, SessionSummary,
    TimedAchievement,
};

/// Engine-wide multiplier for distance tolerances (larger is easier).
pub const TOLERANCE_SCALE: &str = "tolerance_scale";
/// Engine-wide multiplier for velocity thresholds (larger is harder).
pub const VELOCITY_SCALE: &str = "velocity_scale";

/// Named numeric activity parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityParams(BTreeMap<String, f32>);

impl ActivityParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: f32) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: f32) {
        self.0.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<f32> {
        self.0.get(key).copied()
    }

    pub fn value_or(&self, key: &str, default: f32) -> f32 {
        self.get(key).unwrap_or(default)
    }

    /// Returns a copy of `self` with every entry of `overrides` on top.
    pub fn merged(&self, overrides: &ActivityParams) -> ActivityParams {
        let mut merged = self.clone();
        merged
            .0
            .extend(overrides.0.iter().map(|(key, value)| (key.clone(), *value)));
        merged
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.0.iter().map(|(key, value)| (key.as_str(), *value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parameters every activity receives, derived from the difficulty.
    pub fn for_settings(settings: &Settings) -> Self {
        Self::new()
            .with(TOLERANCE_SCALE, settings.difficulty.tolerance_scale())
            .with(VELOCITY_SCALE, settings.difficulty.velocity_scale())
    }

    fn tolerance_scale(&self) -> f32 {
        self.value_or(TOLERANCE_SCALE, 1.0)
    }

    fn velocity_scale(&self) -> f32 {
        self.value_or(VELOCITY_SCALE, 1.0)
    }
}

impl FromIterator<(String, f32)> for ActivityParams {
    fn from_iter<I: IntoIterator<Item = (String, f32)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Everything an activity sees for one perception frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext<'a> {
    pub hands: &'a [HandRecord],
    pub audio: Option<&'a AudioFeatures>,
    pub now_ms: f64,
}

/// What a single frame produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityOutcome {
    pub achievement: Option<Achievement>,
    pub progress: ProgressDelta,
    pub effects: Vec<EffectRequest>,
}

impl ActivityOutcome {
    pub fn is_empty(&self) -> bool {
        self.achievement.is_none() && self.progress.is_empty() && self.effects.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityStatus {
    pub name: &'static str,
    pub active: bool,
    pub started_ms: Option<f64>,
    /// Qualifying events counted so far.
    pub count: u32,
    /// Count at which the next achievement fires.
    pub goal: u32,
    pub achievements: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityInfo {
    pub name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub defaults: ActivityParams,
}

pub trait Activity: Send {
    /// Catalog key, e.g. `"fine-motor"`.
    fn name(&self) -> &'static str;
    fn display_name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn default_params(&self) -> ActivityParams;
    fn start(&mut self, params: &ActivityParams, now_ms: f64);
    fn stop(&mut self, now_ms: f64);
    fn process_hands(&mut self, frame: &FrameContext<'_>) -> Result<ActivityOutcome>;
    /// Layers `params` over the parameters the activity was started with.
    fn update_settings(&mut self, params: &ActivityParams);
    fn status(&self) -> ActivityStatus;
}

pub type ActivityFactory = fn() -> Result<Box<dyn Activity>>;

pub const BUILTIN_FACTORIES: [ActivityFactory; 6] = [
    build_bilateral_coordination,
    build_cause_and_effect,
    build_large_movement,
    build_fine_motor,
    build_rhythm_sync,
    build_emotional_expression,
];

fn build_bilateral_coordination() -> Result<Box<dyn Activity>> {
    Ok(Box::new(BilateralCoordination::new()))
}

fn build_cause_and_effect() -> Result<Box<dyn Activity>> {
    Ok(Box::new(CauseAndEffect::new()))
}

fn build_large_movement() -> Result<Box<dyn Activity>> {
    Ok(Box::new(LargeMovement::new()))
}

fn build_fine_motor() -> Result<Box<dyn Activity>> {
    Ok(Box::new(FineMotor::new()))
}

fn build_rhythm_sync() -> Result<Box<dyn Activity>> {
    Ok(Box::new(RhythmSync::new()))
}

fn build_emotional_expression() -> Result<Box<dyn Activity>> {
    Ok(Box::new(EmotionalExpression::new()))
}

/// Bookkeeping shared by the activities: run state, the qualifying-event
/// counter and the achievement tally.
#[derive(Debug, Clone, Default)]
pub(crate) struct Tally {
    active: bool,
    started_ms: Option<f64>,
    count: u32,
    achievements: u32,
}

impl Tally {
    fn start(&mut self, now_ms: f64) {
        *self = Self {
            active: true,
            started_ms: Some(now_ms),
            ..Self::default()
        };
    }

    fn stop(&mut self) {
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }

    /// Counts one event; true on every `every`-th.
    fn bump(&mut self, every: u32) -> bool {
        self.count = self.count.saturating_add(1);
        let milestone = every > 0 && self.count % every == 0;
        if milestone {
            self.achievements += 1;
        }
        milestone
    }

    /// Counts one event; true once `required` is reached, which restarts
    /// the count.
    fn bump_until(&mut self, required: u32) -> bool {
        self.count = self.count.saturating_add(1);
        if self.count >= required {
            self.count = 0;
            self.achievements += 1;
            true
        } else {
            false
        }
    }

    fn status(&self, name: &'static str, goal: u32, detail: Option<String>) -> ActivityStatus {
        ActivityStatus {
            name,
            active: self.active,
            started_ms: self.started_ms,
            count: self.count,
            goal,
            achievements: self.achievements,
            detail,
        }
    }
}

/// Reads a whole, positive count parameter.
pub(crate) fn count_param(
    activity: &'static str,
    params: &ActivityParams,
    key: &'static str,
    default: u32,
) -> Result<u32> {
    let value = params.value_or(key, default as f32);
    if !value.is_finite() || value < 1.0 {
        return Err(FeedbackError::Activity {
            name: activity.to_string(),
            reason: format!("`{key}` must be at least 1, got {value}"),
        });
    }
    Ok(value.round() as u32)
}

/// Runs at most one activity and keeps the session log.
pub struct ActivityEngine {
    catalog: BTreeMap<&'static str, Box<dyn Activity>>,
    current: Option<&'static str>,
    engine_params: ActivityParams,
    celebration: CelebrationIntensity,
    session: SessionLog,
}

impl ActivityEngine {
    pub fn new(settings: &Settings, now_ms: f64) -> Self {
        Self::with_factories(&BUILTIN_FACTORIES, settings, now_ms)
    }

    /// Builds the catalog from `factories`. A factory that fails leaves its
    /// entry unavailable.
    pub fn with_factories(factories: &[ActivityFactory], settings: &Settings, now_ms: f64) -> Self {
        let mut catalog = BTreeMap::new();
        for (index, factory) in factories.iter().enumerate() {
            match factory() {
                Ok(activity) => {
                    catalog.insert(activity.name(), activity);
                }
                Err(err) => warn!(index, error = %err, "activity unavailable"),
            }
        }
        info!(count = catalog.len(), "registered activities");

        Self {
            catalog,
            current: None,
            engine_params: ActivityParams::for_settings(settings),
            celebration: settings.celebration_intensity,
            session: SessionLog::new(now_ms),
        }
    }

    /// Starts `name`, stopping whatever ran before. Returns false and changes
    /// nothing when the name is not in the catalog.
    pub fn start_activity(
        &mut self,
        name: &str,
        custom: Option<&ActivityParams>,
        now_ms: f64,
    ) -> bool {
        match self.try_start_activity(name, custom, now_ms) {
            Ok(()) => true,
            Err(err) => {
                warn!(activity = name, error = %err, "activity not started");
                false
            }
        }
    }

    pub fn try_start_activity(
        &mut self,
        name: &str,
        custom: Option<&ActivityParams>,
        now_ms: f64,
    ) -> Result<()> {
        let key = match self.catalog.get_key_value(name) {
            Some((key, _)) => *key,
            None => {
                return Err(FeedbackError::UnknownActivity {
                    name: name.to_string(),
                })
            }
        };

        self.stop_activity(now_ms);

        let engine_params = self.engine_params.clone();
        let activity = self
            .catalog
            .get_mut(key)
            .ok_or_else(|| FeedbackError::UnknownActivity {
                name: name.to_string(),
            })?;
        let mut params = activity.default_params().merged(&engine_params);
        if let Some(custom) = custom {
            params = params.merged(custom);
        }
        activity.start(&params, now_ms);

        self.current = Some(key);
        self.session.open_activity(key, now_ms);
        info!(activity = key, params = params.len(), "activity started");
        Ok(())
    }

    /// Stops the running activity. Returns whether one was running.
    pub fn stop_activity(&mut self, now_ms: f64) -> bool {
        let Some(key) = self.current.take() else {
            return false;
        };
        if let Some(activity) = self.catalog.get_mut(key) {
            activity.stop(now_ms);
        }
        self.session.close_activity(now_ms);
        info!(activity = key, "activity stopped");
        true
    }

    /// Forwards one frame to the running activity and applies its outcome.
    pub fn process_hands(
        &mut self,
        hands: &[HandRecord],
        audio: Option<&AudioFeatures>,
        now_ms: f64,
        render: &mut RenderEngine,
        bus: &mut EventBus,
    ) {
        let Some(key) = self.current else {
            return;
        };
        let Some(activity) = self.catalog.get_mut(key) else {
            return;
        };

        let frame = FrameContext {
            hands,
            audio,
            now_ms,
        };
        let outcome = match activity.process_hands(&frame) {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(activity = key, error = %err, "activity failed");
                bus.publish(FeedbackEvent::Error {
                    source: key.to_string(),
                    message: err.to_string(),
                });
                return;
            }
        };

        if let Some(achievement) = outcome.achievement {
            info!(
                activity = key,
                achievement = %achievement.name,
                category = ?achievement.category,
                "achievement unlocked"
            );
            let (x, y) = hands
                .first()
                .map_or((0.5, 0.5), |hand| (hand.center.x, hand.center.y));
            render.apply_effect(
                EffectRequest::Celebration {
                    count: self.celebration.particle_count(),
                    x,
                    y,
                },
                now_ms,
            );
            self.session.record_achievement(achievement.clone(), now_ms);
            bus.publish(FeedbackEvent::Achievement {
                achievement,
                timestamp: now_ms,
            });
        }

        if !outcome.progress.is_empty() {
            self.session.add_progress(outcome.progress);
            bus.publish(FeedbackEvent::Progress {
                delta: outcome.progress,
                timestamp: now_ms,
            });
        }

        for effect in outcome.effects {
            render.apply_effect(effect, now_ms);
        }
    }

    /// Recomputes the engine-wide parameters and hands them to the running
    /// activity.
    pub fn update_settings(&mut self, settings: &Settings) {
        self.engine_params = ActivityParams::for_settings(settings);
        self.celebration = settings.celebration_intensity;
        if let Some(activity) = self.current.and_then(|key| self.catalog.get_mut(key)) {
            activity.update_settings(&self.engine_params);
        }
    }

    pub fn session(&self) -> &SessionLog {
        &self.session
    }

    pub fn session_summary(&self, now_ms: f64) -> SessionSummary {
        self.session.summary(now_ms)
    }

    /// Starts a fresh session log. A running activity stays active and is
    /// logged again from `now_ms`.
    pub fn reset_session(&mut self, now_ms: f64) {
        self.session = SessionLog::new(now_ms);
        if let Some(key) = self.current {
            self.session.open_activity(key, now_ms);
        }
        info!("session reset");
    }

    pub fn catalog(&self) -> Vec<ActivityInfo> {
        self.catalog
            .values()
            .map(|activity| ActivityInfo {
                name: activity.name(),
                display_name: activity.display_name(),
                description: activity.description(),
                defaults: activity.default_params(),
            })
            .collect()
    }

    pub fn current(&self) -> Option<&'static str> {
        self.current
    }

    pub fn status(&self) -> Option<ActivityStatus> {
        self.current
            .and_then(|key| self.catalog.get(key))
            .map(|activity| activity.status())
    }
}

impl std::fmt::Debug for ActivityEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityEngine")
            .field("catalog", &self.catalog.keys().collect::<Vec<_>>())
            .field("current", &self.current)
            .field("engine_params", &self.engine_params)
            .finish()
    }
}
