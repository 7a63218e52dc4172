use std::{ops::RangeInclusive, path::Path, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{FeedbackError, Result};

const SENSITIVITY_RANGE: RangeInclusive<f32> = 0.1..=2.0;
const TRAIL_LENGTH_RANGE: RangeInclusive<u32> = 10..=100;
const BRUSH_SIZE_RANGE: RangeInclusive<f32> = 5.0..=50.0;
const CONFIDENCE_RANGE: RangeInclusive<f32> = 0.0..=1.0;
const SMOOTHING_RANGE: RangeInclusive<f32> = 0.0..=0.99;

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub settings: Settings,
    pub render: RenderConfig,
    pub audio: AudioConfig,
}

impl AppConfig {
    /// Loads a configuration file. Missing sections fall back to defaults and
    /// the runtime settings are validated before they are returned.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.settings.validate()?;
        config.render.validate()?;
        Ok(config)
    }
}

/// Fixed properties of the raster surface and the bounded render collections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderConfig {
    pub width: usize,
    pub height: usize,
    pub max_trail_length: usize,
    pub max_particles: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            max_trail_length: 50,
            max_particles: 500,
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(FeedbackError::setting(
                "render",
                format!("surface must not be empty ({}x{})", self.width, self.height),
            ));
        }
        if self.max_trail_length < 2 {
            return Err(FeedbackError::setting(
                "maxTrailLength",
                "a trail needs room for at least two points",
            ));
        }
        Ok(())
    }
}

/// Configuration specific to the audio subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub fft_size: usize,
    pub smoothing_time_constant: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            fft_size: 2048,
            smoothing_time_constant: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Rainbow,
    Speed,
    Position,
    Audio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    #[default]
    Drawing,
    Particles,
    Shapes,
}

impl FromStr for RenderMode {
    type Err = FeedbackError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "drawing" => Ok(RenderMode::Drawing),
            "particles" => Ok(RenderMode::Particles),
            "shapes" => Ok(RenderMode::Shapes),
            _ => Err(FeedbackError::setting(
                "renderMode",
                format!("unknown mode `{raw}` (drawing, particles, shapes)"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandMode {
    Single,
    #[default]
    Dual,
}

impl HandMode {
    /// Maximum number of hands tracked concurrently.
    pub fn max_hands(self) -> usize {
        match self {
            HandMode::Single => 1,
            HandMode::Dual => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    /// Multiplier applied to activity tolerances (larger is more forgiving).
    pub fn tolerance_scale(self) -> f32 {
        match self {
            Difficulty::Easy => 1.5,
            Difficulty::Medium => 1.0,
            Difficulty::Hard => 0.75,
        }
    }

    /// Multiplier applied to activity velocity thresholds.
    pub fn velocity_scale(self) -> f32 {
        match self {
            Difficulty::Easy => 0.75,
            Difficulty::Medium => 1.0,
            Difficulty::Hard => 1.25,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CelebrationIntensity {
    Low,
    #[default]
    Medium,
    High,
}

impl CelebrationIntensity {
    /// Size of the particle burst fired for an achievement.
    pub fn particle_count(self) -> usize {
        match self {
            CelebrationIntensity::Low => 15,
            CelebrationIntensity::Medium => 30,
            CelebrationIntensity::High => 50,
        }
    }
}

/// Axis-aligned detection region in normalised coordinates. Bounds are
/// inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementZone {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Default for MovementZone {
    fn default() -> Self {
        Self {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 1.0,
            max_y: 1.0,
        }
    }
}

impl MovementZone {
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    fn validate(&self) -> Result<()> {
        let unit = 0.0..=1.0;
        let corners = [self.min_x, self.min_y, self.max_x, self.max_y];
        if !corners.iter().all(|value| unit.contains(value)) {
            return Err(FeedbackError::setting(
                "movementZone",
                format!("{self:?} leaves the unit square"),
            ));
        }
        if self.min_x >= self.max_x || self.min_y >= self.max_y {
            return Err(FeedbackError::setting(
                "movementZone",
                format!("{self:?} has no area"),
            ));
        }
        Ok(())
    }
}

/// Runtime settings shared by every stage of the pipeline.
///
/// Settings are a plain value: components receive a reference when they need
/// it and never keep a mutable handle. `version` increases by one for every
/// accepted change so consumers can cheaply notice updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub version: u64,
    pub sensitivity: f32,
    pub trail_length: u32,
    pub brush_size: f32,
    pub color_mode: ColorMode,
    pub hand_mode: HandMode,
    pub symmetry_mode: bool,
    pub movement_zone: MovementZone,
    pub difficulty: Difficulty,
    pub celebration_intensity: CelebrationIntensity,
    pub render_mode: RenderMode,
    pub confidence_threshold: f32,
    pub smoothing: f32,
    pub audio_smoothing: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: 0,
            sensitivity: 1.0,
            trail_length: 50,
            brush_size: 10.0,
            color_mode: ColorMode::default(),
            hand_mode: HandMode::default(),
            symmetry_mode: false,
            movement_zone: MovementZone::default(),
            difficulty: Difficulty::default(),
            celebration_intensity: CelebrationIntensity::default(),
            render_mode: RenderMode::default(),
            confidence_threshold: 0.7,
            smoothing: 0.7,
            audio_smoothing: true,
        }
    }
}

impl Settings {
    /// Loads a settings file on its own, without the render and audio
    /// sections of [`AppConfig`].
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&raw)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks every option against its documented domain.
    pub fn validate(&self) -> Result<()> {
        check_range("sensitivity", self.sensitivity, &SENSITIVITY_RANGE)?;
        if !TRAIL_LENGTH_RANGE.contains(&self.trail_length) {
            return Err(FeedbackError::setting(
                "trailLength",
                format!("{} is outside {:?}", self.trail_length, TRAIL_LENGTH_RANGE),
            ));
        }
        check_range("brushSize", self.brush_size, &BRUSH_SIZE_RANGE)?;
        check_range(
            "confidenceThreshold",
            self.confidence_threshold,
            &CONFIDENCE_RANGE,
        )?;
        check_range("smoothing", self.smoothing, &SMOOTHING_RANGE)?;
        self.movement_zone.validate()
    }

    /// Applies a partial update atomically. The patch is validated as a whole
    /// and nothing changes when any field is rejected. Returns whether the
    /// settings changed.
    pub fn apply(&mut self, patch: &SettingsPatch) -> Result<bool> {
        let mut next = self.clone();
        patch.write_into(&mut next);
        next.validate()?;

        if next == *self {
            return Ok(false);
        }

        next.version = self.version + 1;
        *self = next;
        Ok(true)
    }

    /// Age after which trail points are pruned, in milliseconds.
    pub fn trail_max_age_ms(&self) -> f64 {
        f64::from(self.trail_length) * 100.0
    }
}

fn check_range(option: &'static str, value: f32, range: &RangeInclusive<f32>) -> Result<()> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(FeedbackError::setting(
            option,
            format!("{value} is outside {range:?}"),
        ))
    }
}

/// Partial settings update, as delivered by a settings panel or a JSON file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsPatch {
    pub sensitivity: Option<f32>,
    pub trail_length: Option<u32>,
    pub brush_size: Option<f32>,
    pub color_mode: Option<ColorMode>,
    pub hand_mode: Option<HandMode>,
    pub symmetry_mode: Option<bool>,
    pub movement_zone: Option<MovementZone>,
    pub difficulty: Option<Difficulty>,
    pub celebration_intensity: Option<CelebrationIntensity>,
    pub render_mode: Option<RenderMode>,
    pub confidence_threshold: Option<f32>,
    pub smoothing: Option<f32>,
    pub audio_smoothing: Option<bool>,
}

impl SettingsPatch {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    fn write_into(&self, settings: &mut Settings) {
        if let Some(value) = self.sensitivity {
            settings.sensitivity = value;
        }
        if let Some(value) = self.trail_length {
            settings.trail_length = value;
        }
        if let Some(value) = self.brush_size {
            settings.brush_size = value;
        }
        if let Some(value) = self.color_mode {
            settings.color_mode = value;
        }
        if let Some(value) = self.hand_mode {
            settings.hand_mode = value;
        }
        if let Some(value) = self.symmetry_mode {
            settings.symmetry_mode = value;
        }
        if let Some(value) = self.movement_zone {
            settings.movement_zone = value;
        }
        if let Some(value) = self.difficulty {
            settings.difficulty = value;
        }
        if let Some(value) = self.celebration_intensity {
            settings.celebration_intensity = value;
        }
        if let Some(value) = self.render_mode {
            settings.render_mode = value;
        }
        if let Some(value) = self.confidence_threshold {
            settings.confidence_threshold = value;
        }
        if let Some(value) = self.smoothing {
            settings.smoothing = value;
        }
        if let Some(value) = self.audio_smoothing {
            settings.audio_smoothing = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_modes_parse_case_insensitively() {
        assert_eq!("Particles".parse::<RenderMode>().unwrap(), RenderMode::Particles);
        assert_eq!("shapes".parse::<RenderMode>().unwrap(), RenderMode::Shapes);
        let err = "sculpt".parse::<RenderMode>().unwrap_err();
        assert!(err.to_string().contains("sculpt"));
    }

    #[test]
    fn defaults_are_valid() {
        Settings::default().validate().unwrap();
        RenderConfig::default().validate().unwrap();
    }

    #[test]
    fn accepted_patch_bumps_version() {
        let mut settings = Settings::default();
        let patch = SettingsPatch {
            brush_size: Some(25.0),
            color_mode: Some(ColorMode::Speed),
            ..Default::default()
        };

        assert!(settings.apply(&patch).unwrap());
        assert_eq!(settings.version, 1);
        assert_eq!(settings.brush_size, 25.0);
        assert_eq!(settings.color_mode, ColorMode::Speed);

        // Re-applying the same values is not a change.
        assert!(!settings.apply(&patch).unwrap());
        assert_eq!(settings.version, 1);
    }

    #[test]
    fn rejected_patch_changes_nothing() {
        let mut settings = Settings::default();
        let patch = SettingsPatch {
            brush_size: Some(20.0),
            sensitivity: Some(5.0),
            ..Default::default()
        };

        let err = settings.apply(&patch).unwrap_err();
        assert!(err.to_string().contains("sensitivity"));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn rejects_degenerate_zone() {
        let mut settings = Settings::default();
        let patch = SettingsPatch {
            movement_zone: Some(MovementZone {
                min_x: 0.5,
                min_y: 0.0,
                max_x: 0.5,
                max_y: 1.0,
            }),
            ..Default::default()
        };
        assert!(settings.apply(&patch).is_err());
    }

    #[test]
    fn parses_partial_json() {
        let config = AppConfig::from_json_str(
            r#"{ "settings": { "colorMode": "position", "handMode": "single" } }"#,
        )
        .unwrap();

        assert_eq!(config.settings.color_mode, ColorMode::Position);
        assert_eq!(config.settings.hand_mode.max_hands(), 1);
        assert_eq!(config.settings.brush_size, 10.0);
        assert_eq!(config.audio.fft_size, 2048);
    }

    #[test]
    fn celebration_sizes() {
        assert_eq!(CelebrationIntensity::Low.particle_count(), 15);
        assert_eq!(CelebrationIntensity::Medium.particle_count(), 30);
        assert_eq!(CelebrationIntensity::High.particle_count(), 50);
    }
}
