//! Core library for the movement feedback pipeline.
//!
//! Hand landmarks and audio come in, visual feedback and therapy progress
//! come out. Each module owns one stage (input normalisation, audio
//! analysis, rendering, activities) and [`FeedbackPipeline`] wires them
//! together behind the three host callbacks.

pub mod activity;
pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod events;
pub mod input;
pub mod pipeline;
pub mod render;
pub mod timeline;

pub use activity::{
    Activity, ActivityEngine, ActivityInfo, ActivityOutcome, ActivityParams, ActivityStatus,
    FrameContext, SessionLog, SessionSummary,
};
pub use analysis::{AudioFeatureExtractor, AudioFeatures, Band, BandEnergy};
pub use audio::{Analyser, AnalyserFrame};
pub use config::{
    AppConfig, AudioConfig, CelebrationIntensity, ColorMode, Difficulty, HandMode,
    MovementZone, RenderConfig, RenderMode, Settings, SettingsPatch,
};
pub use error::{FeedbackError, Result};
pub use events::{Achievement, AchievementCategory, EventBus, FeedbackEvent, ProgressDelta};
pub use input::{
    Gestures, HandRecord, Handedness, InputNormalizer, Landmark, LostHand, Point3, RawFrame,
    RawHand, Velocity,
};
pub use pipeline::FeedbackPipeline;
pub use render::{EffectRequest, RenderEngine, Surface};
pub use timeline::{PlaybackClock, ScheduledEvent, Scheduler};
