//! Static hand-pose classification from a single landmark set.

use serde::{Deserialize, Serialize};

use super::{landmarks, Landmark};

/// Thumb-tip to index-tip distance below which the hand counts as pinching.
pub const PINCH_THRESHOLD: f32 = 0.05;

/// (fingertip, proximal joint) pairs for the four non-thumb fingers, index
/// first.
const FINGERS: [(usize, usize); 4] = [
    (landmarks::INDEX_TIP, landmarks::INDEX_PIP),
    (landmarks::MIDDLE_TIP, landmarks::MIDDLE_PIP),
    (landmarks::RING_TIP, landmarks::RING_PIP),
    (landmarks::PINKY_TIP, landmarks::PINKY_PIP),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gestures {
    pub is_pointing: bool,
    pub is_fist: bool,
    pub is_open: bool,
    pub is_pinching: bool,
}

impl Gestures {
    /// Classifies a full 21-point landmark set.
    ///
    /// A finger is extended when its tip sits above (smaller y than) its
    /// proximal joint. Mirroring only touches x, so raw landmarks work as-is.
    pub fn detect(points: &[Landmark]) -> Self {
        if points.len() < landmarks::COUNT {
            return Self::default();
        }

        let extended = FINGERS.map(|(tip, joint)| points[tip].y < points[joint].y);
        let extended_count = extended.iter().filter(|&&up| up).count();

        let thumb = points[landmarks::THUMB_TIP];
        let index = points[landmarks::INDEX_TIP];
        let pinch_distance = (thumb.x - index.x).hypot(thumb.y - index.y);

        Self {
            is_pointing: extended[0] && extended_count == 1,
            is_fist: extended_count == 0,
            is_open: extended_count == FINGERS.len(),
            is_pinching: pinch_distance < PINCH_THRESHOLD,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds a hand around `(cx, cy)` with the requested fingers raised.
    /// `raised` is ordered index, middle, ring, pinky.
    pub(crate) fn posed_hand(cx: f32, cy: f32, raised: [bool; 4]) -> Vec<Landmark> {
        let mut points = vec![Landmark::new(cx, cy, 0.0); landmarks::COUNT];
        points[landmarks::WRIST] = Landmark::new(cx, cy + 0.08, 0.0);
        points[landmarks::THUMB_TIP] = Landmark::new(cx - 0.12, cy, 0.0);

        for (finger, (tip, joint)) in FINGERS.iter().enumerate() {
            let x = cx - 0.03 + finger as f32 * 0.02;
            points[*joint] = Landmark::new(x, cy - 0.02, 0.0);
            let tip_y = if raised[finger] { cy - 0.07 } else { cy + 0.01 };
            points[*tip] = Landmark::new(x, tip_y, 0.0);
        }

        points
    }

    #[test]
    fn open_palm() {
        let gestures = Gestures::detect(&posed_hand(0.5, 0.5, [true; 4]));
        assert!(gestures.is_open);
        assert!(!gestures.is_fist);
        assert!(!gestures.is_pointing);
    }

    #[test]
    fn closed_fist() {
        let gestures = Gestures::detect(&posed_hand(0.5, 0.5, [false; 4]));
        assert!(gestures.is_fist);
        assert!(!gestures.is_open);
    }

    #[test]
    fn pointing_index_only() {
        let gestures = Gestures::detect(&posed_hand(0.5, 0.5, [true, false, false, false]));
        assert!(gestures.is_pointing);
        assert!(!gestures.is_open);
        assert!(!gestures.is_fist);

        let two_up = Gestures::detect(&posed_hand(0.5, 0.5, [true, true, false, false]));
        assert!(!two_up.is_pointing);
    }

    #[test]
    fn pinch_uses_thumb_and_index_tips() {
        let mut points = posed_hand(0.5, 0.5, [false; 4]);
        assert!(!Gestures::detect(&points).is_pinching);

        let index = points[landmarks::INDEX_TIP];
        points[landmarks::THUMB_TIP] = Landmark::new(index.x + 0.01, index.y, 0.0);
        assert!(Gestures::detect(&points).is_pinching);
    }

    #[test]
    fn open_and_fist_are_exclusive_for_every_pose() {
        for mask in 0..16u8 {
            let raised = [mask & 1 != 0, mask & 2 != 0, mask & 4 != 0, mask & 8 != 0];
            let gestures = Gestures::detect(&posed_hand(0.4, 0.6, raised));
            assert!(!(gestures.is_open && gestures.is_fist), "pose {mask:04b}");
            assert!(!(gestures.is_open && gestures.is_pointing), "pose {mask:04b}");
        }
    }

    #[test]
    fn short_landmark_set_has_no_gestures() {
        let points = vec![Landmark::default(); 5];
        assert_eq!(Gestures::detect(&points), Gestures::default());
    }
}
