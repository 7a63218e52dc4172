//! Hand-driven drawing on a software raster surface.
//!
//! [`RenderEngine`] owns every collection it draws from: a trail per hand id,
//! a bounded particle pool, the hands remembered for shape drawing, and a
//! queue of deferred effects. All of them are bounded so a slow tick never
//! builds up a backlog.

mod color;
mod particle;
mod surface;
mod trail;

use std::collections::BTreeMap;
use std::f32::consts::{FRAC_PI_2, PI};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    timeline::Scheduler, AudioFeatures, ColorMode, Gestures, HandRecord, RenderConfig,
    RenderMode, Settings,
};

pub use color::{hsl_to_argb, select_color, speed_color, FALLBACK_COLOR};
pub use particle::{Particle, ParticleSystem};
pub use surface::{Surface, BACKGROUND};
pub use trail::{Trail, TrailPoint};

const SYMMETRY_SUFFIX: &str = "_symmetry";
const FLASH_DURATION_MS: f64 = 200.0;
const FLASH_ALPHA: f32 = 0.35;
const FLASH_COLOR: u32 = 0xFFFF_FFFF;
const RIPPLE_DURATION_MS: f64 = 1_000.0;
const RIPPLE_MAX_RADIUS: f32 = 120.0;
const CELEBRATION_COLOR: u32 = 0xFFFF_D700;
const DEFAULT_SEED: u64 = 0x5eed;

/// Visual side effects requested by the activity engine. Positions are in
/// normalised screen space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EffectRequest {
    /// Particle burst plus a brief full-surface flash.
    Celebration { count: usize, x: f32, y: f32 },
    /// Expanding ring.
    Ripple { x: f32, y: f32, color: u32 },
    /// Temporarily scales the brush.
    BrushPulse { scale: f32, duration_ms: f64 },
    /// Overrides the colour mode for a while. A newer tint replaces an older
    /// one.
    Tint { color: u32, duration_ms: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Deferred {
    EndFlash,
    ExpireRipple(u64),
    RestoreBrush,
    EndTint,
}

#[derive(Debug, Clone, Copy)]
struct Ripple {
    id: u64,
    x: f32,
    y: f32,
    color: u32,
    started: f64,
}

#[derive(Debug, Clone, Copy)]
struct Flash {
    started: f64,
}

#[derive(Debug, Clone, Copy)]
struct ShapeHand {
    x: f32,
    y: f32,
    magnitude: f32,
    gestures: Gestures,
    color: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Triangle,
    Square,
    Star,
    Circle,
}

impl Shape {
    fn for_gestures(gestures: &Gestures) -> Self {
        if gestures.is_pointing {
            Shape::Triangle
        } else if gestures.is_fist {
            Shape::Square
        } else if gestures.is_open {
            Shape::Star
        } else {
            Shape::Circle
        }
    }
}

#[derive(Debug)]
pub struct RenderEngine {
    config: RenderConfig,
    mode: RenderMode,
    color_mode: ColorMode,
    brush_size: f32,
    trail_max_age_ms: f64,
    symmetry: bool,
    surface: Surface,
    trails: BTreeMap<String, Trail>,
    particles: ParticleSystem,
    shape_hands: Vec<ShapeHand>,
    audio: Option<AudioFeatures>,
    ripples: Vec<Ripple>,
    next_ripple: u64,
    flash: Option<Flash>,
    brush_scale: f32,
    brush_pulse_until: f64,
    tint: Option<u32>,
    tint_until: f64,
    deferred: Scheduler<Deferred>,
}

impl RenderEngine {
    pub fn new(config: RenderConfig, settings: &Settings) -> Self {
        Self::with_seed(config, settings, DEFAULT_SEED)
    }

    /// Creates an engine whose particle jitter follows `seed`.
    pub fn with_seed(config: RenderConfig, settings: &Settings, seed: u64) -> Self {
        Self {
            surface: Surface::new(config.width, config.height),
            particles: ParticleSystem::new(config.max_particles, seed),
            config,
            mode: settings.render_mode,
            color_mode: settings.color_mode,
            brush_size: settings.brush_size,
            trail_max_age_ms: settings.trail_max_age_ms(),
            symmetry: settings.symmetry_mode,
            trails: BTreeMap::new(),
            shape_hands: Vec::new(),
            audio: None,
            ripples: Vec::new(),
            next_ripple: 0,
            flash: None,
            brush_scale: 1.0,
            brush_pulse_until: 0.0,
            tint: None,
            tint_until: 0.0,
            deferred: Scheduler::new(),
        }
    }

    /// Picks up the render-related options. Switching modes drops state that
    /// only the previous mode draws.
    pub fn apply_settings(&mut self, settings: &Settings) {
        if settings.render_mode != self.mode {
            debug!(from = ?self.mode, to = ?settings.render_mode, "render mode changed");
            self.trails.clear();
            self.shape_hands.clear();
            self.mode = settings.render_mode;
        }
        if !settings.symmetry_mode {
            self.trails.retain(|id, _| !id.ends_with(SYMMETRY_SUFFIX));
        }
        self.color_mode = settings.color_mode;
        self.brush_size = settings.brush_size;
        self.trail_max_age_ms = settings.trail_max_age_ms();
        self.symmetry = settings.symmetry_mode;
    }

    pub fn set_audio(&mut self, audio: Option<AudioFeatures>) {
        self.audio = audio;
    }

    /// Responds to one frame of normalised hands.
    pub fn update_hands(&mut self, hands: &[HandRecord], now_ms: f64) {
        match self.mode {
            RenderMode::Drawing => {
                for hand in hands {
                    self.extend_trails(hand, now_ms);
                }
            }
            RenderMode::Particles => {
                let brush = self.effective_brush_size();
                for hand in hands {
                    let color = self.color_for(hand, now_ms);
                    let at = self.to_pixels(hand.center.x, hand.center.y);
                    self.particles.spawn_trailing(at, hand.velocity, brush, color);
                }
            }
            RenderMode::Shapes => {
                self.shape_hands = hands
                    .iter()
                    .map(|hand| {
                        let (x, y) = self.to_pixels(hand.center.x, hand.center.y);
                        ShapeHand {
                            x,
                            y,
                            magnitude: hand.velocity.magnitude,
                            gestures: hand.gestures,
                            color: self.color_for(hand, now_ms),
                        }
                    })
                    .collect();
            }
        }
    }

    pub fn apply_effect(&mut self, request: EffectRequest, now_ms: f64) {
        match request {
            EffectRequest::Celebration { count, x, y } => {
                let at = self.to_pixels(x, y);
                let spawned = self.particles.burst(at, count, CELEBRATION_COLOR);
                debug!(requested = count, spawned, "celebration burst");
                self.flash = Some(Flash { started: now_ms });
                self.deferred
                    .schedule(now_ms + FLASH_DURATION_MS, Deferred::EndFlash);
            }
            EffectRequest::Ripple { x, y, color } => {
                let (x, y) = self.to_pixels(x, y);
                let id = self.next_ripple;
                self.next_ripple += 1;
                self.ripples.push(Ripple {
                    id,
                    x,
                    y,
                    color,
                    started: now_ms,
                });
                self.deferred
                    .schedule(now_ms + RIPPLE_DURATION_MS, Deferred::ExpireRipple(id));
            }
            EffectRequest::BrushPulse { scale, duration_ms } => {
                self.brush_scale = self.brush_scale.max(scale);
                self.brush_pulse_until = self.brush_pulse_until.max(now_ms + duration_ms);
                self.deferred
                    .schedule(now_ms + duration_ms, Deferred::RestoreBrush);
            }
            EffectRequest::Tint { color, duration_ms } => {
                self.tint = Some(color);
                self.tint_until = now_ms + duration_ms;
                self.deferred
                    .schedule(self.tint_until, Deferred::EndTint);
            }
        }
    }

    /// Per-tick housekeeping: due effects, trail ageing and particle physics.
    pub fn update(&mut self, now_ms: f64) {
        for event in self.deferred.drain_due(now_ms) {
            match event.payload {
                Deferred::EndFlash => {
                    if self
                        .flash
                        .is_some_and(|flash| flash.started + FLASH_DURATION_MS <= now_ms)
                    {
                        self.flash = None;
                    }
                }
                Deferred::ExpireRipple(id) => self.ripples.retain(|ripple| ripple.id != id),
                Deferred::RestoreBrush => {
                    if now_ms >= self.brush_pulse_until {
                        self.brush_scale = 1.0;
                    }
                }
                Deferred::EndTint => {
                    if now_ms >= self.tint_until {
                        self.tint = None;
                    }
                }
            }
        }

        let cutoff = now_ms - self.trail_max_age_ms;
        self.trails.retain(|_, trail| {
            trail.prune_before(cutoff);
            !trail.is_empty()
        });

        self.particles.update();
    }

    /// Redraws the surface from the retained collections.
    pub fn render(&mut self, now_ms: f64) {
        self.surface.clear();

        match self.mode {
            RenderMode::Drawing => self.draw_trails(),
            RenderMode::Particles => {}
            RenderMode::Shapes => self.draw_shapes(),
        }
        self.draw_particles();
        self.draw_ripples(now_ms);

        if let Some(flash) = self.flash {
            let progress = ((now_ms - flash.started) / FLASH_DURATION_MS).clamp(0.0, 1.0) as f32;
            self.surface.flash(FLASH_COLOR, FLASH_ALPHA * (1.0 - progress));
        }
    }

    /// Drops every retained collection and pending effect.
    pub fn clear(&mut self) {
        self.trails.clear();
        self.particles.clear();
        self.shape_hands.clear();
        self.ripples.clear();
        self.flash = None;
        self.brush_scale = 1.0;
        self.brush_pulse_until = 0.0;
        self.tint = None;
        self.tint_until = 0.0;
        self.deferred.cancel_all();
        self.surface.clear();
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn trail(&self, id: &str) -> Option<&Trail> {
        self.trails.get(id)
    }

    pub fn trail_ids(&self) -> impl Iterator<Item = &str> {
        self.trails.keys().map(String::as_str)
    }

    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    pub fn pending_effects(&self) -> usize {
        self.deferred.len()
    }

    pub fn ripple_count(&self) -> usize {
        self.ripples.len()
    }

    pub fn is_flashing(&self) -> bool {
        self.flash.is_some()
    }

    pub fn tint(&self) -> Option<u32> {
        self.tint
    }

    pub fn effective_brush_size(&self) -> f32 {
        self.brush_size * self.brush_scale
    }

    fn to_pixels(&self, x: f32, y: f32) -> (f32, f32) {
        (x * self.config.width as f32, y * self.config.height as f32)
    }

    fn color_for(&self, hand: &HandRecord, now_ms: f64) -> u32 {
        self.tint
            .unwrap_or_else(|| select_color(self.color_mode, hand, now_ms, self.audio.as_ref()))
    }

    fn extend_trails(&mut self, hand: &HandRecord, now_ms: f64) {
        let (x, y) = self.to_pixels(hand.center.x, hand.center.y);
        let point = TrailPoint {
            x,
            y,
            velocity: hand.velocity.magnitude,
            timestamp: now_ms,
            color: self.color_for(hand, now_ms),
        };
        let max_len = self.config.max_trail_length;

        self.trails
            .entry(hand.id.clone())
            .or_default()
            .push(point, max_len);

        if self.symmetry {
            let mirrored = TrailPoint {
                x: self.config.width as f32 - x,
                ..point
            };
            self.trails
                .entry(format!("{}{SYMMETRY_SUFFIX}", hand.id))
                .or_default()
                .push(mirrored, max_len);
        }
    }

    fn draw_trails(&mut self) {
        let brush = self.effective_brush_size();
        for trail in self.trails.values() {
            for (from, to, progress) in trail.segments() {
                let speed = to.velocity.min(2.0);
                let width = (brush * progress * (0.5 + speed / 2.0)).max(1.0);
                self.surface
                    .draw_line((from.x, from.y), (to.x, to.y), width, to.color, progress);
            }
        }
    }

    fn draw_shapes(&mut self) {
        let brush = self.brush_size * self.brush_scale;
        let width = self.config.width as f32;
        for hand in &self.shape_hands {
            let size = brush + hand.magnitude * 50.0;
            let shape = Shape::for_gestures(&hand.gestures);
            draw_shape(&mut self.surface, shape, hand.x, hand.y, size, hand.color);
            if self.symmetry {
                draw_shape(&mut self.surface, shape, width - hand.x, hand.y, size, hand.color);
            }
        }
    }

    fn draw_particles(&mut self) {
        for particle in self.particles.iter() {
            self.surface
                .fill_circle(particle.x, particle.y, particle.size, particle.color, particle.life);
        }
    }

    fn draw_ripples(&mut self, now_ms: f64) {
        for ripple in &self.ripples {
            let progress = ((now_ms - ripple.started) / RIPPLE_DURATION_MS).clamp(0.0, 1.0) as f32;
            self.surface.stroke_ring(
                ripple.x,
                ripple.y,
                10.0 + progress * RIPPLE_MAX_RADIUS,
                3.0,
                ripple.color,
                1.0 - progress,
            );
        }
    }
}

fn draw_shape(surface: &mut Surface, shape: Shape, x: f32, y: f32, size: f32, color: u32) {
    match shape {
        Shape::Circle => surface.fill_circle(x, y, size, color, 1.0),
        Shape::Square => surface.fill_polygon(
            &[
                (x - size, y - size),
                (x + size, y - size),
                (x + size, y + size),
                (x - size, y + size),
            ],
            color,
            1.0,
        ),
        Shape::Triangle => surface.fill_polygon(&regular_points(x, y, size, 3), color, 1.0),
        Shape::Star => {
            let vertices: Vec<(f32, f32)> = (0..10)
                .map(|i| {
                    let radius = if i % 2 == 0 { size } else { size * 0.5 };
                    let angle = -FRAC_PI_2 + i as f32 * PI / 5.0;
                    (x + angle.cos() * radius, y + angle.sin() * radius)
                })
                .collect();
            surface.fill_polygon(&vertices, color, 1.0);
        }
    }
}

fn regular_points(x: f32, y: f32, radius: f32, sides: usize) -> Vec<(f32, f32)> {
    (0..sides)
        .map(|i| {
            let angle = -FRAC_PI_2 + i as f32 * 2.0 * PI / sides as f32;
            (x + angle.cos() * radius, y + angle.sin() * radius)
        })
        .collect()
}
