//! Software raster surface.
//!
//! Pixels are packed `0xAARRGGBB` words, the layout windowing crates such as
//! `minifb` accept directly. Every primitive clips to the surface bounds and
//! blends with a per-call alpha.

use std::io::Write;

use crate::Result;

pub const BACKGROUND: u32 = 0xFF00_0000;

#[derive(Clone)]
pub struct Surface {
    width: usize,
    height: usize,
    pixels: Vec<u32>,
}

impl Surface {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![BACKGROUND; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<u32> {
        (x < self.width && y < self.height).then(|| self.pixels[y * self.width + x])
    }

    /// Number of pixels that differ from the background colour.
    pub fn painted_pixels(&self) -> usize {
        self.pixels.iter().filter(|&&p| p != BACKGROUND).count()
    }

    pub fn clear(&mut self) {
        self.pixels.fill(BACKGROUND);
    }

    pub fn blend_pixel(&mut self, x: i64, y: i64, color: u32, alpha: f32) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let alpha = alpha.clamp(0.0, 1.0);
        if alpha <= 0.0 {
            return;
        }
        let index = y as usize * self.width + x as usize;
        self.pixels[index] = mix(self.pixels[index], color, alpha);
    }

    /// Thick line segment with round caps.
    pub fn draw_line(
        &mut self,
        (x0, y0): (f32, f32),
        (x1, y1): (f32, f32),
        width: f32,
        color: u32,
        alpha: f32,
    ) {
        let half = (width * 0.5).max(0.5);
        let (dx, dy) = (x1 - x0, y1 - y0);
        let length_sq = dx * dx + dy * dy;

        let (min_x, max_x) = span(x0.min(x1) - half, x0.max(x1) + half, self.width);
        let (min_y, max_y) = span(y0.min(y1) - half, y0.max(y1) + half, self.height);
        for py in min_y..max_y {
            for px in min_x..max_x {
                let (cx, cy) = (px as f32 + 0.5, py as f32 + 0.5);
                let t = if length_sq > 0.0 {
                    (((cx - x0) * dx + (cy - y0) * dy) / length_sq).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                let (nx, ny) = (x0 + dx * t, y0 + dy * t);
                if (cx - nx).hypot(cy - ny) <= half {
                    self.blend_pixel(px as i64, py as i64, color, alpha);
                }
            }
        }
    }

    pub fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, color: u32, alpha: f32) {
        let radius = radius.max(0.5);
        let (min_x, max_x) = span(cx - radius, cx + radius, self.width);
        let (min_y, max_y) = span(cy - radius, cy + radius, self.height);
        for py in min_y..max_y {
            for px in min_x..max_x {
                if (px as f32 + 0.5 - cx).hypot(py as f32 + 0.5 - cy) <= radius {
                    self.blend_pixel(px as i64, py as i64, color, alpha);
                }
            }
        }
    }

    pub fn stroke_ring(
        &mut self,
        cx: f32,
        cy: f32,
        radius: f32,
        thickness: f32,
        color: u32,
        alpha: f32,
    ) {
        let outer = radius + thickness * 0.5;
        let inner = (radius - thickness * 0.5).max(0.0);
        let (min_x, max_x) = span(cx - outer, cx + outer, self.width);
        let (min_y, max_y) = span(cy - outer, cy + outer, self.height);
        for py in min_y..max_y {
            for px in min_x..max_x {
                let d = (px as f32 + 0.5 - cx).hypot(py as f32 + 0.5 - cy);
                if d >= inner && d <= outer {
                    self.blend_pixel(px as i64, py as i64, color, alpha);
                }
            }
        }
    }

    /// Even-odd polygon fill sampled at pixel centres.
    pub fn fill_polygon(&mut self, vertices: &[(f32, f32)], color: u32, alpha: f32) {
        if vertices.len() < 3 {
            return;
        }
        let (lo_x, hi_x) = vertices
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), v| (lo.min(v.0), hi.max(v.0)));
        let (lo_y, hi_y) = vertices
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), v| (lo.min(v.1), hi.max(v.1)));
        let (min_x, max_x) = span(lo_x, hi_x, self.width);
        let (min_y, max_y) = span(lo_y, hi_y, self.height);

        for py in min_y..max_y {
            for px in min_x..max_x {
                if contains(vertices, px as f32 + 0.5, py as f32 + 0.5) {
                    self.blend_pixel(px as i64, py as i64, color, alpha);
                }
            }
        }
    }

    /// Additive full-surface lighten, used for celebration flashes.
    pub fn flash(&mut self, color: u32, alpha: f32) {
        let alpha = alpha.clamp(0.0, 1.0);
        if alpha <= 0.0 {
            return;
        }
        for pixel in &mut self.pixels {
            *pixel = lighten(*pixel, color, alpha);
        }
    }

    /// Binary PPM (P6) encoding of the current frame.
    pub fn write_ppm<W: Write>(&self, mut out: W) -> Result<()> {
        write!(out, "P6\n{} {}\n255\n", self.width, self.height)?;
        let mut bytes = Vec::with_capacity(self.pixels.len() * 3);
        for pixel in &self.pixels {
            bytes.extend_from_slice(&[(pixel >> 16) as u8, (pixel >> 8) as u8, *pixel as u8]);
        }
        out.write_all(&bytes)?;
        Ok(())
    }
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// Pixel index range covering `[lo, hi]`, clipped to `0..limit`.
fn span(lo: f32, hi: f32, limit: usize) -> (usize, usize) {
    let start = lo.floor().max(0.0) as usize;
    let end = (hi.ceil().max(0.0) as usize).saturating_add(1).min(limit);
    (start.min(end), end)
}

fn contains(vertices: &[(f32, f32)], x: f32, y: f32) -> bool {
    let mut inside = false;
    let mut j = vertices.len() - 1;
    for i in 0..vertices.len() {
        let (xi, yi) = vertices[i];
        let (xj, yj) = vertices[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

fn channels(color: u32) -> [f32; 3] {
    [
        ((color >> 16) & 0xFF) as f32,
        ((color >> 8) & 0xFF) as f32,
        (color & 0xFF) as f32,
    ]
}

fn pack([r, g, b]: [f32; 3]) -> u32 {
    let to_byte = |v: f32| v.round().clamp(0.0, 255.0) as u32;
    0xFF00_0000 | (to_byte(r) << 16) | (to_byte(g) << 8) | to_byte(b)
}

fn mix(dst: u32, src: u32, alpha: f32) -> u32 {
    let d = channels(dst);
    let s = channels(src);
    pack([0, 1, 2].map(|i| s[i] * alpha + d[i] * (1.0 - alpha)))
}

fn lighten(dst: u32, src: u32, alpha: f32) -> u32 {
    let d = channels(dst);
    let s = channels(src);
    pack([0, 1, 2].map(|i| d[i] + s[i] * alpha))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: u32 = 0xFFFF_0000;

    #[test]
    fn blend_respects_alpha_and_bounds() {
        let mut surface = Surface::new(4, 4);
        surface.blend_pixel(1, 1, RED, 1.0);
        surface.blend_pixel(2, 2, RED, 0.5);
        surface.blend_pixel(-1, 9, RED, 1.0);

        assert_eq!(surface.pixel(1, 1), Some(RED));
        assert_eq!(surface.pixel(2, 2), Some(0xFF80_0000));
        assert_eq!(surface.painted_pixels(), 2);
        assert_eq!(surface.pixel(4, 0), None);
    }

    #[test]
    fn non_finite_shapes_are_clipped_away() {
        let mut surface = Surface::new(8, 8);
        surface.fill_circle(f32::INFINITY, 4.0, 2.0, RED, 1.0);
        surface.fill_circle(4.0, f32::MAX, 2.0, RED, 1.0);
        surface.draw_line((0.0, 0.0), (f32::INFINITY, 0.0), 1.0, RED, 1.0);
        assert_eq!(span(f32::INFINITY, f32::INFINITY, 8), (8, 8));
        assert_eq!(surface.pixel(0, 4), Some(BACKGROUND));
    }

    #[test]
    fn line_covers_its_endpoints() {
        let mut surface = Surface::new(32, 32);
        surface.draw_line((2.0, 2.0), (28.0, 2.0), 3.0, RED, 1.0);
        assert_eq!(surface.pixel(2, 2), Some(RED));
        assert_eq!(surface.pixel(27, 2), Some(RED));
        assert_eq!(surface.pixel(15, 20), Some(BACKGROUND));
    }

    #[test]
    fn shapes_clip_at_the_edges() {
        let mut surface = Surface::new(16, 16);
        surface.fill_circle(0.0, 0.0, 6.0, RED, 1.0);
        surface.fill_polygon(&[(10.0, 10.0), (30.0, 10.0), (30.0, 30.0)], RED, 1.0);
        surface.stroke_ring(8.0, 8.0, 20.0, 2.0, RED, 1.0);
        assert!(surface.painted_pixels() > 0);
        assert_eq!(surface.pixel(0, 0), Some(RED));
    }

    #[test]
    fn polygon_fills_only_the_inside() {
        let mut surface = Surface::new(20, 20);
        surface.fill_polygon(&[(5.0, 5.0), (15.0, 5.0), (15.0, 15.0), (5.0, 15.0)], RED, 1.0);
        assert_eq!(surface.pixel(10, 10), Some(RED));
        assert_eq!(surface.pixel(2, 2), Some(BACKGROUND));
        assert_eq!(surface.painted_pixels(), 100);
    }

    #[test]
    fn flash_lightens_everything() {
        let mut surface = Surface::new(3, 3);
        surface.flash(0xFFFF_FFFF, 0.5);
        assert!(surface.pixels().iter().all(|&p| p == 0xFF80_8080));
    }

    #[test]
    fn ppm_has_header_and_rgb_payload() {
        let surface = Surface::new(2, 1);
        let mut out = Vec::new();
        surface.write_ppm(&mut out).unwrap();
        assert!(out.starts_with(b"P6\n2 1\n255\n"));
        assert_eq!(out.len(), b"P6\n2 1\n255\n".len() + 6);
    }
}
