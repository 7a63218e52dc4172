use std::collections::VecDeque;

/// One sampled hand position, in surface pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrailPoint {
    pub x: f32,
    pub y: f32,
    pub velocity: f32,
    pub timestamp: f64,
    pub color: u32,
}

/// Oldest-first run of recent points for one hand.
#[derive(Clone, Debug, Default)]
pub struct Trail {
    points: VecDeque<TrailPoint>,
}

impl Trail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a point and drops the oldest ones beyond `max_len`.
    pub fn push(&mut self, point: TrailPoint, max_len: usize) {
        self.points.push_back(point);
        while self.points.len() > max_len {
            self.points.pop_front();
        }
    }

    /// Drops every point captured before `cutoff_ms`.
    pub fn prune_before(&mut self, cutoff_ms: f64) {
        while self
            .points
            .front()
            .is_some_and(|point| point.timestamp < cutoff_ms)
        {
            self.points.pop_front();
        }
    }

    pub fn points(&self) -> impl ExactSizeIterator<Item = &TrailPoint> {
        self.points.iter()
    }

    /// Consecutive point pairs together with their position along the trail
    /// (0 at the oldest segment, 1 at the newest).
    pub fn segments(&self) -> impl Iterator<Item = (&TrailPoint, &TrailPoint, f32)> {
        let last = self.points.len().saturating_sub(1).max(1) as f32;
        self.points
            .iter()
            .zip(self.points.iter().skip(1))
            .enumerate()
            .map(move |(index, (from, to))| (from, to, (index + 1) as f32 / last))
    }

    pub fn newest(&self) -> Option<&TrailPoint> {
        self.points.back()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(timestamp: f64) -> TrailPoint {
        TrailPoint {
            x: timestamp as f32,
            y: 0.0,
            velocity: 0.0,
            timestamp,
            color: 0xFFFF_FFFF,
        }
    }

    #[test]
    fn push_trims_oldest_first() {
        let mut trail = Trail::new();
        for t in 0..8 {
            trail.push(point(t as f64), 5);
        }
        assert_eq!(trail.len(), 5);
        assert_eq!(trail.points().next().unwrap().timestamp, 3.0);
        assert_eq!(trail.newest().unwrap().timestamp, 7.0);
    }

    #[test]
    fn prune_drops_old_points() {
        let mut trail = Trail::new();
        for t in [0.0, 100.0, 200.0, 300.0] {
            trail.push(point(t), 10);
        }
        trail.prune_before(150.0);
        assert_eq!(trail.len(), 2);
        trail.prune_before(1_000.0);
        assert!(trail.is_empty());
    }

    #[test]
    fn segment_progress_runs_to_one() {
        let mut trail = Trail::new();
        for t in 0..5 {
            trail.push(point(t as f64), 10);
        }
        let progress: Vec<f32> = trail.segments().map(|(_, _, p)| p).collect();
        assert_eq!(progress, vec![0.25, 0.5, 0.75, 1.0]);
    }
}
