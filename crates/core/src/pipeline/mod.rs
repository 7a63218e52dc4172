//! The perception-to-feedback pipeline.
//!
//! [`FeedbackPipeline`] owns every component and exposes the three callbacks
//! the host drives it with: perception frames, audio ticks and animation
//! frames. Each callback first checks the `active` flag, so a callback that
//! arrives after [`FeedbackPipeline::stop`] does nothing.

use std::sync::mpsc::Receiver;

use tracing::{debug, info};

use crate::{
    activity::{ActivityEngine, ActivityInfo, ActivityParams, ActivityStatus, SessionSummary},
    Analyser, AppConfig, AudioConfig, AudioFeatureExtractor, AudioFeatures, EventBus,
    FeedbackEvent, HandRecord, InputNormalizer, RawFrame, RenderEngine, Result, Settings,
    SettingsPatch,
};

pub struct FeedbackPipeline {
    settings: Settings,
    audio_config: AudioConfig,
    active: bool,
    normalizer: InputNormalizer,
    analyser: Option<Analyser>,
    extractor: AudioFeatureExtractor,
    audio: Option<AudioFeatures>,
    render: RenderEngine,
    activities: ActivityEngine,
    bus: EventBus,
}

impl FeedbackPipeline {
    /// Builds an inactive pipeline. The session clock starts at `now_ms`.
    pub fn new(config: AppConfig, now_ms: f64) -> Result<Self> {
        Self::with_seed(config, now_ms, rand_seed(now_ms))
    }

    /// Like [`FeedbackPipeline::new`] with a fixed particle seed.
    pub fn with_seed(config: AppConfig, now_ms: f64, seed: u64) -> Result<Self> {
        config.settings.validate()?;
        config.render.validate()?;

        let AppConfig {
            settings,
            render,
            audio,
        } = config;

        let mut extractor = AudioFeatureExtractor::new(&audio);
        extractor.set_sensitivity(settings.sensitivity);
        extractor.set_smoothing(settings.audio_smoothing);

        Ok(Self {
            normalizer: InputNormalizer::new(),
            analyser: None,
            extractor,
            audio: None,
            render: RenderEngine::with_seed(render, &settings, seed),
            activities: ActivityEngine::new(&settings, now_ms),
            bus: EventBus::new(),
            audio_config: audio,
            settings,
            active: false,
        })
    }

    /// Brings the pipeline up. Returns `Ok(false)` when it was already
    /// running. A failed start leaves the pipeline inactive and may be
    /// retried.
    pub fn start(&mut self, now_ms: f64) -> Result<bool> {
        if self.active {
            return Ok(false);
        }
        if self.analyser.is_none() {
            self.analyser = Some(Analyser::new(&self.audio_config)?);
        }
        self.active = true;
        info!(at = now_ms, "pipeline started");
        Ok(true)
    }

    /// Stops tracking and clears everything on screen. Idempotent.
    pub fn stop(&mut self, now_ms: f64) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        self.normalizer.reset();
        self.extractor.reset();
        if let Some(analyser) = self.analyser.as_mut() {
            analyser.reset();
        }
        self.audio = None;
        self.render.set_audio(None);
        self.render.clear();
        info!(at = now_ms, "pipeline stopped");
        true
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Handles one detector frame and returns the normalised hands.
    pub fn on_perception_frame(&mut self, frame: &RawFrame) -> Vec<HandRecord> {
        if !self.active {
            debug!(timestamp = frame.timestamp, "perception frame after stop ignored");
            return Vec::new();
        }

        let hands = self.normalizer.ingest(frame, &self.settings);
        for lost in self.normalizer.take_lost_hands() {
            debug!(hand = %lost.id, "hand lost");
            self.bus.publish(FeedbackEvent::HandLost(lost));
        }

        self.render.update_hands(&hands, frame.timestamp);
        self.activities.process_hands(
            &hands,
            self.audio.as_ref(),
            frame.timestamp,
            &mut self.render,
            &mut self.bus,
        );
        hands
    }

    /// Handles one analyser tick given as frequency and time-domain bytes.
    pub fn on_audio_tick(
        &mut self,
        frequency: &[u8],
        time_domain: &[u8],
        now_ms: f64,
    ) -> Option<AudioFeatures> {
        if !self.active {
            return None;
        }
        let features = self.extractor.ingest(frequency, time_domain, now_ms);
        self.render.set_audio(Some(features.clone()));
        self.audio = Some(features.clone());
        Some(features)
    }

    /// Runs a block of raw samples through the analyser, then handles the
    /// resulting tick.
    pub fn on_audio_samples(&mut self, samples: &[f32], now_ms: f64) -> Result<Option<AudioFeatures>> {
        if !self.active {
            return Ok(None);
        }
        let Some(analyser) = self.analyser.as_mut() else {
            return Ok(None);
        };
        let frame = analyser.process(samples)?;
        Ok(self.on_audio_tick(&frame.frequency, &frame.time_domain, now_ms))
    }

    /// Advances deferred effects and physics, then redraws.
    pub fn on_animation_frame(&mut self, now_ms: f64) {
        if !self.active {
            return;
        }
        self.render.update(now_ms);
        self.render.render(now_ms);
    }

    /// Applies a partial settings update to every component. Returns whether
    /// anything changed; a rejected patch changes nothing.
    pub fn apply_settings(&mut self, patch: &SettingsPatch) -> Result<bool> {
        if !self.settings.apply(patch)? {
            return Ok(false);
        }
        self.extractor.set_sensitivity(self.settings.sensitivity);
        self.extractor.set_smoothing(self.settings.audio_smoothing);
        self.render.apply_settings(&self.settings);
        self.activities.update_settings(&self.settings);
        info!(version = self.settings.version, "settings updated");
        Ok(true)
    }

    pub fn status(&self) -> &Settings {
        &self.settings
    }

    pub fn subscribe(&mut self) -> Receiver<FeedbackEvent> {
        self.bus.subscribe()
    }

    pub fn start_activity(
        &mut self,
        name: &str,
        custom: Option<&ActivityParams>,
        now_ms: f64,
    ) -> bool {
        self.activities.start_activity(name, custom, now_ms)
    }

    pub fn stop_activity(&mut self, now_ms: f64) -> bool {
        self.activities.stop_activity(now_ms)
    }

    pub fn current_activity(&self) -> Option<&'static str> {
        self.activities.current()
    }

    pub fn activity_status(&self) -> Option<ActivityStatus> {
        self.activities.status()
    }

    pub fn catalog(&self) -> Vec<ActivityInfo> {
        self.activities.catalog()
    }

    pub fn session_summary(&self, now_ms: f64) -> SessionSummary {
        self.activities.session_summary(now_ms)
    }

    pub fn reset_session(&mut self, now_ms: f64) {
        self.activities.reset_session(now_ms);
    }

    pub fn render(&self) -> &RenderEngine {
        &self.render
    }

    pub fn audio(&self) -> Option<&AudioFeatures> {
        self.audio.as_ref()
    }
}

impl std::fmt::Debug for FeedbackPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbackPipeline")
            .field("active", &self.active)
            .field("settings_version", &self.settings.version)
            .field("activity", &self.activities.current())
            .finish()
    }
}

fn rand_seed(now_ms: f64) -> u64 {
    now_ms.to_bits() ^ 0x9e37_79b9_7f4a_7c15
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::tests::raw_hand;
    use crate::{FeedbackError, Handedness, RenderConfig};

    fn pipeline() -> FeedbackPipeline {
        let config = AppConfig {
            render: RenderConfig {
                width: 160,
                height: 90,
                ..RenderConfig::default()
            },
            ..AppConfig::default()
        };
        FeedbackPipeline::with_seed(config, 0.0, 42).unwrap()
    }

    fn frame(timestamp: f64, x: f32) -> RawFrame {
        RawFrame {
            timestamp,
            hands: vec![raw_hand(Handedness::Right, x, 0.5, 0.95)],
        }
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let mut pipeline = pipeline();
        assert!(pipeline.start(0.0).unwrap());
        assert!(!pipeline.start(1.0).unwrap());
        assert!(pipeline.stop(2.0));
        assert!(!pipeline.stop(3.0));
        assert!(!pipeline.is_active());
    }

    #[test]
    fn inactive_pipeline_ignores_callbacks() {
        let mut pipeline = pipeline();
        assert!(pipeline.on_perception_frame(&frame(0.0, 0.5)).is_empty());
        assert!(pipeline.on_audio_tick(&[200; 1024], &[128; 2048], 0.0).is_none());
        assert!(pipeline.on_audio_samples(&[0.0; 2048], 0.0).unwrap().is_none());
    }

    #[test]
    fn lost_hands_are_published() {
        let mut pipeline = pipeline();
        let events = pipeline.subscribe();
        pipeline.start(0.0).unwrap();

        assert_eq!(pipeline.on_perception_frame(&frame(0.0, 0.5)).len(), 1);
        pipeline.on_perception_frame(&RawFrame {
            timestamp: 33.0,
            hands: Vec::new(),
        });

        match events.try_recv() {
            Ok(FeedbackEvent::HandLost(lost)) => {
                assert_eq!(lost.id, "left_0");
                assert_eq!(lost.last_seen, 0.0);
            }
            other => panic!("expected a hand-lost event, got {other:?}"),
        }
    }

    #[test]
    fn audio_samples_reach_the_render_engine() {
        let mut pipeline = pipeline();
        pipeline.start(0.0).unwrap();
        let samples: Vec<f32> = (0..2048)
            .map(|i| (i as f32 * 0.05).sin() * 0.5)
            .collect();
        let features = pipeline.on_audio_samples(&samples, 10.0).unwrap().unwrap();
        assert!(features.volume > 0.0);
        assert_eq!(pipeline.audio(), Some(&features));
    }

    #[test]
    fn rejected_settings_leave_everything_unchanged() {
        let mut pipeline = pipeline();
        let before = pipeline.status().clone();
        let result = pipeline.apply_settings(&SettingsPatch {
            brush_size: Some(20.0),
            sensitivity: Some(9.0),
            ..Default::default()
        });
        assert!(matches!(result, Err(FeedbackError::InvalidSetting { .. })));
        assert_eq!(pipeline.status(), &before);
    }

    #[test]
    fn drawing_then_stop_clears_the_surface() {
        let mut pipeline = pipeline();
        pipeline.start(0.0).unwrap();
        for i in 0..5 {
            pipeline.on_perception_frame(&frame(i as f64 * 33.0, 0.3 + i as f32 * 0.1));
        }
        pipeline.on_animation_frame(140.0);
        assert!(pipeline.render().surface().painted_pixels() > 0);

        pipeline.stop(150.0);
        assert_eq!(pipeline.render().surface().painted_pixels(), 0);
        assert_eq!(pipeline.render().trail_ids().count(), 0);
    }
}
