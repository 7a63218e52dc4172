//! Per-frame hand landmark normalisation.
//!
//! The external detector reports up to a handful of hands per frame, each as
//! 21 normalised landmarks with a handedness label and a confidence score.
//! [`InputNormalizer`] turns that into at most one [`HandRecord`] per hand
//! label with a mirrored, smoothed centre, a velocity and gesture flags.

mod gesture;

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Settings;

pub use gesture::{Gestures, PINCH_THRESHOLD};

/// MediaPipe hand landmark indices.
pub mod landmarks {
    pub const COUNT: usize = 21;

    pub const WRIST: usize = 0;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_PIP: usize = 6;
    pub const INDEX_TIP: usize = 8;
    pub const MIDDLE_PIP: usize = 10;
    pub const MIDDLE_TIP: usize = 12;
    pub const RING_PIP: usize = 14;
    pub const RING_TIP: usize = 16;
    pub const PINKY_PIP: usize = 18;
    pub const PINKY_TIP: usize = 20;
}

/// A single landmark in the detector's normalised image space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Position in normalised, mirrored screen space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Linear interpolation towards `target`; `t = 0` keeps `self`.
    pub fn lerp(self, target: Point3, t: f32) -> Point3 {
        Point3 {
            x: self.x + (target.x - self.x) * t,
            y: self.y + (target.y - self.y) * t,
            z: self.z + (target.z - self.z) * t,
        }
    }

    pub fn distance_2d(self, other: Point3) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    /// The label the user would give this hand when looking at a mirrored
    /// preview.
    pub fn mirrored(self) -> Self {
        match self {
            Handedness::Left => Handedness::Right,
            Handedness::Right => Handedness::Left,
        }
    }

    /// Fixed table slot: 0 for the left hand, 1 for the right.
    pub fn slot(self) -> usize {
        match self {
            Handedness::Left => 0,
            Handedness::Right => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Handedness::Left => "left",
            Handedness::Right => "right",
        }
    }

    fn hand_id(self) -> String {
        format!("{}_{}", self.as_str(), self.slot())
    }
}

impl fmt::Display for Handedness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One hand as reported by the detector, before any normalisation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawHand {
    pub landmarks: Vec<Landmark>,
    /// Label in the detector's (camera) coordinate space.
    pub label: Handedness,
    pub confidence: f32,
}

/// Detector output for one captured image.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RawFrame {
    /// Capture time in milliseconds.
    pub timestamp: f64,
    pub hands: Vec<RawHand>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub x: f32,
    pub y: f32,
    pub magnitude: f32,
}

impl Velocity {
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.magnitude.is_finite()
    }
}

/// One tracked hand in the current frame.
#[derive(Clone, Debug)]
pub struct HandRecord {
    pub id: String,
    pub label: Handedness,
    pub confidence: f32,
    pub center: Point3,
    /// Wrist to middle fingertip distance.
    pub size: f32,
    pub velocity: Velocity,
    pub gestures: Gestures,
    pub landmarks: Arc<[Landmark]>,
    pub timestamp: f64,
}

/// A hand that was tracked in the previous frame and is gone now.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LostHand {
    pub id: String,
    pub label: Handedness,
    pub last_seen: f64,
}

struct Candidate {
    label: Handedness,
    confidence: f32,
    center: Point3,
    size: f32,
    gestures: Gestures,
    landmarks: Arc<[Landmark]>,
}

/// Turns raw detector frames into identity-stable hand records.
///
/// Identity is by (mirrored) label only: the previous record with the same
/// label feeds smoothing and velocity.
#[derive(Debug, Default)]
pub struct InputNormalizer {
    history: [Option<HandRecord>; 2],
    lost: Vec<LostHand>,
}

impl InputNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Processes one detector frame.
    pub fn ingest(&mut self, frame: &RawFrame, settings: &Settings) -> Vec<HandRecord> {
        let mut slots: [Option<Candidate>; 2] = [None, None];

        for (index, raw) in frame.hands.iter().enumerate() {
            let Some(candidate) = Self::candidate(index, raw, settings) else {
                continue;
            };
            let slot = &mut slots[candidate.label.slot()];
            if slot
                .as_ref()
                .map_or(true, |existing| candidate.confidence > existing.confidence)
            {
                *slot = Some(candidate);
            }
        }

        let mut kept: Vec<Candidate> = slots.into_iter().flatten().collect();
        let max_hands = settings.hand_mode.max_hands();
        if kept.len() > max_hands {
            kept.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
            kept.truncate(max_hands);
            kept.sort_by_key(|candidate| candidate.label.slot());
        }

        let records: Vec<HandRecord> = kept
            .into_iter()
            .map(|candidate| self.track(candidate, frame.timestamp, settings))
            .collect();

        self.remember(&records);
        records
    }

    /// Hands that disappeared since they were last taken.
    pub fn take_lost_hands(&mut self) -> Vec<LostHand> {
        std::mem::take(&mut self.lost)
    }

    /// Forgets all history so the next frame starts fresh.
    pub fn reset(&mut self) {
        self.history = [None, None];
        self.lost.clear();
    }

    fn candidate(index: usize, raw: &RawHand, settings: &Settings) -> Option<Candidate> {
        if raw.landmarks.len() < landmarks::COUNT {
            debug!(
                index,
                points = raw.landmarks.len(),
                "skipping hand with a short landmark set"
            );
            return None;
        }
        let points = &raw.landmarks[..landmarks::COUNT];
        if !points.iter().all(Landmark::is_finite) {
            debug!(index, "skipping hand with non-finite landmarks");
            return None;
        }
        if !(raw.confidence >= settings.confidence_threshold) {
            debug!(index, confidence = raw.confidence, "skipping low-confidence hand");
            return None;
        }

        let count = points.len() as f32;
        let (sx, sy, sz) = points.iter().fold((0.0, 0.0, 0.0), |(x, y, z), p| {
            (x + p.x, y + p.y, z + p.z)
        });
        let center = Point3::new(1.0 - sx / count, sy / count, sz / count);
        if !settings.movement_zone.contains(center.x, center.y) {
            debug!(index, x = center.x, y = center.y, "hand outside movement zone");
            return None;
        }

        let wrist = points[landmarks::WRIST];
        let middle = points[landmarks::MIDDLE_TIP];

        Some(Candidate {
            label: raw.label.mirrored(),
            confidence: raw.confidence,
            center,
            size: (wrist.x - middle.x).hypot(wrist.y - middle.y),
            gestures: Gestures::detect(points),
            landmarks: Arc::from(points),
        })
    }

    fn track(&self, candidate: Candidate, timestamp: f64, settings: &Settings) -> HandRecord {
        let slot = candidate.label.slot();
        let (center, velocity) = match &self.history[slot] {
            Some(previous) => {
                let center = previous
                    .center
                    .lerp(candidate.center, 1.0 - settings.smoothing);
                let dt = ((timestamp - previous.timestamp) / 1000.0) as f32;
                let dx = center.x - previous.center.x;
                let dy = center.y - previous.center.y;
                let velocity = Velocity {
                    x: dx / dt * settings.sensitivity,
                    y: dy / dt * settings.sensitivity,
                    magnitude: dx.hypot(dy) / dt * settings.sensitivity,
                };
                // A zero, negative or vanishing interval yields no usable rate.
                if dt > 0.0 && velocity.is_finite() {
                    (center, velocity)
                } else {
                    (center, previous.velocity)
                }
            }
            None => (candidate.center, Velocity::default()),
        };

        HandRecord {
            id: candidate.label.hand_id(),
            label: candidate.label,
            confidence: candidate.confidence,
            center,
            size: candidate.size,
            velocity,
            gestures: candidate.gestures,
            landmarks: candidate.landmarks,
            timestamp,
        }
    }

    fn remember(&mut self, records: &[HandRecord]) {
        let mut next: [Option<HandRecord>; 2] = [None, None];
        for record in records {
            next[record.label.slot()] = Some(record.clone());
        }

        for (previous, current) in self.history.iter().zip(next.iter()) {
            if let (Some(previous), None) = (previous, current) {
                self.lost.push(LostHand {
                    id: previous.id.clone(),
                    label: previous.label,
                    last_seen: previous.timestamp,
                });
            }
        }

        self.history = next;
    }
}

impl fmt::Debug for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Candidate")
            .field("label", &self.label)
            .field("confidence", &self.confidence)
            .finish()
    }
}
