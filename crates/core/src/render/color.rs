//! Colour selection for strokes, particles and shapes.

use crate::{AudioFeatures, ColorMode, HandRecord};

/// Used whenever a colour mode has nothing to react to.
pub const FALLBACK_COLOR: u32 = 0xFF00_FF88;

const SPEED_RAMP: [(f32, u32); 3] = [
    (0.5, 0xFF00_88FF),
    (1.0, 0xFF00_FF88),
    (2.0, 0xFFFF_DD00),
];
const SPEED_MAX_COLOR: u32 = 0xFFFF_3344;

/// Picks the colour for a hand under the given mode.
pub fn select_color(
    mode: ColorMode,
    hand: &HandRecord,
    now_ms: f64,
    audio: Option<&AudioFeatures>,
) -> u32 {
    match mode {
        ColorMode::Rainbow => hsl_to_argb((now_ms / 10.0).rem_euclid(360.0) as f32, 1.0, 0.5),
        ColorMode::Speed => speed_color(hand.velocity.magnitude),
        ColorMode::Position => hsl_to_argb(
            hand.center.x.clamp(0.0, 1.0) * 360.0,
            1.0,
            0.3 + hand.center.y.clamp(0.0, 1.0) * 0.4,
        ),
        ColorMode::Audio => audio
            .map(|features| hsl_to_argb(features.volume.clamp(0.0, 1.0) * 360.0, 1.0, 0.5))
            .unwrap_or(FALLBACK_COLOR),
    }
}

pub fn speed_color(magnitude: f32) -> u32 {
    SPEED_RAMP
        .iter()
        .find(|(limit, _)| magnitude < *limit)
        .map(|(_, color)| *color)
        .unwrap_or(SPEED_MAX_COLOR)
}

/// Convert HSL (hue in degrees, saturation and lightness in [0, 1]) to packed
/// opaque ARGB.
pub fn hsl_to_argb(h: f32, s: f32, l: f32) -> u32 {
    let h = h.rem_euclid(360.0);
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = l - c / 2.0;
    let (r, g, b) = match (h / 60.0) as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let to_byte = |v: f32| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u32;
    0xFF00_0000 | (to_byte(r) << 16) | (to_byte(g) << 8) | to_byte(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{Gestures, Landmark, Point3, Velocity};
    use crate::Handedness;

    fn hand(x: f32, y: f32, speed: f32) -> HandRecord {
        HandRecord {
            id: "left_0".to_string(),
            label: Handedness::Left,
            confidence: 1.0,
            center: Point3::new(x, y, 0.0),
            size: 0.1,
            velocity: Velocity {
                x: speed,
                y: 0.0,
                magnitude: speed,
            },
            gestures: Gestures::default(),
            landmarks: Vec::<Landmark>::new().into(),
            timestamp: 0.0,
        }
    }

    #[test]
    fn hsl_primaries() {
        assert_eq!(hsl_to_argb(0.0, 1.0, 0.5), 0xFFFF_0000);
        assert_eq!(hsl_to_argb(120.0, 1.0, 0.5), 0xFF00_FF00);
        assert_eq!(hsl_to_argb(240.0, 1.0, 0.5), 0xFF00_00FF);
        assert_eq!(hsl_to_argb(360.0, 1.0, 0.5), 0xFFFF_0000);
        assert_eq!(hsl_to_argb(0.0, 0.0, 1.0), 0xFFFF_FFFF);
    }

    #[test]
    fn speed_ramp_steps() {
        assert_eq!(speed_color(0.1), 0xFF00_88FF);
        assert_eq!(speed_color(0.7), 0xFF00_FF88);
        assert_eq!(speed_color(1.5), 0xFFFF_DD00);
        assert_eq!(speed_color(9.0), SPEED_MAX_COLOR);
    }

    #[test]
    fn rainbow_cycles_with_time() {
        let h = hand(0.5, 0.5, 0.0);
        let red = select_color(ColorMode::Rainbow, &h, 0.0, None);
        let green = select_color(ColorMode::Rainbow, &h, 1_200.0, None);
        assert_eq!(red, 0xFFFF_0000);
        assert_eq!(green, 0xFF00_FF00);
        assert_eq!(select_color(ColorMode::Rainbow, &h, 3_600.0, None), red);
    }

    #[test]
    fn audio_mode_falls_back_without_features() {
        let h = hand(0.5, 0.5, 0.0);
        assert_eq!(select_color(ColorMode::Audio, &h, 0.0, None), FALLBACK_COLOR);

        let features = AudioFeatures {
            volume: 1.0 / 3.0,
            ..Default::default()
        };
        assert_eq!(
            select_color(ColorMode::Audio, &h, 0.0, Some(&features)),
            0xFF00_FF00
        );
    }

    #[test]
    fn position_maps_x_to_hue_and_y_to_lightness() {
        let dark = select_color(ColorMode::Position, &hand(0.0, 0.0, 0.0), 0.0, None);
        let light = select_color(ColorMode::Position, &hand(0.0, 1.0, 0.0), 0.0, None);
        assert_eq!(dark, hsl_to_argb(0.0, 1.0, 0.3));
        assert_eq!(light, hsl_to_argb(0.0, 1.0, 0.7));
        assert_ne!(dark, light);
    }
}
