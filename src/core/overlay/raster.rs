//! Raster implementation of [`OverlaySurface`] on an RGBA image.
//!
//! Each paint call is rasterised into a small transparent layer covering only
//! its bounding box, then faded and composited onto the overlay canvas. Glow is
//! a blurred, tinted copy of the same layer composited underneath.

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::imageops::{blur, overlay};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_polygon_mut, draw_text_mut, text_size};
use imageproc::point::Point;

use super::surface::{DashPattern, DrawCommand, OverlaySurface, PathShape, StrokeStyle};

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// 2D affine transform in canvas order: `x' = a*x + c*y + e`, `y' = b*x + d*y + f`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Affine {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Affine {
    const IDENTITY: Affine = Affine {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    fn translate(&mut self, x: f32, y: f32) {
        self.e += self.a * x + self.c * y;
        self.f += self.b * x + self.d * y;
    }

    fn rotate(&mut self, radians: f32) {
        let (sin, cos) = radians.sin_cos();
        let (a, b, c, d) = (self.a, self.b, self.c, self.d);
        self.a = a * cos + c * sin;
        self.b = b * cos + d * sin;
        self.c = c * cos - a * sin;
        self.d = d * cos - b * sin;
    }

    fn scale(&mut self, factor: f32) {
        self.a *= factor;
        self.b *= factor;
        self.c *= factor;
        self.d *= factor;
    }

    fn apply(&self, (x, y): (f32, f32)) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Uniform scale factor, used to size stroke widths.
    fn linear_scale(&self) -> f32 {
        (self.a * self.d - self.b * self.c).abs().sqrt()
    }
}

#[derive(Debug, Clone, Copy)]
struct PaintState {
    transform: Affine,
    alpha: f32,
    glow: Option<(Rgba<u8>, f32)>,
}

impl Default for PaintState {
    fn default() -> Self {
        Self {
            transform: Affine::IDENTITY,
            alpha: 1.0,
            glow: None,
        }
    }
}

pub struct RasterSurface {
    canvas: RgbaImage,
    state: PaintState,
    stack: Vec<PaintState>,
    font: Option<FontVec>,
    warned_missing_font: bool,
}

impl RasterSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            canvas: RgbaImage::from_pixel(width, height, TRANSPARENT),
            state: PaintState::default(),
            stack: Vec::new(),
            font: None,
            warned_missing_font: false,
        }
    }

    pub fn with_font(mut self, font: FontVec) -> Self {
        self.font = Some(font);
        self
    }

    /// Load a TTF/OTF font for label text.
    pub fn load_font(path: &Path) -> Result<FontVec, String> {
        let bytes = std::fs::read(path)
            .map_err(|err| format!("Failed to read font {:?}: {}", path, err))?;
        FontVec::try_from_vec(bytes).map_err(|err| format!("Invalid font {:?}: {}", path, err))
    }

    pub fn image(&self) -> &RgbaImage {
        &self.canvas
    }

    fn stroke(&mut self, shape: &PathShape, style: &StrokeStyle) {
        let (points, closed) = flatten(shape);
        let device: Vec<(f32, f32)> = points
            .iter()
            .map(|point| self.state.transform.apply(*point))
            .collect();
        let scale = self.state.transform.linear_scale();
        let width = (style.width * scale).max(1.0);
        let segments = match style.dash {
            Some(dash) => dash_segments(&device, closed, scale_dash(dash, scale)),
            None => vec![close_path(device, closed)],
        };

        let pad = width + self.glow_pad();
        let Some(bounds) = LayerBounds::around(
            segments.iter().flatten().copied(),
            pad,
            self.canvas.width(),
            self.canvas.height(),
        ) else {
            return;
        };
        let mut layer = bounds.empty_layer();
        for run in segments.iter() {
            stroke_run(&mut layer, &bounds, run, width, style.color);
        }
        self.composite(layer, &bounds);
    }

    fn fill(&mut self, shape: &PathShape, color: Rgba<u8>) {
        let (points, _) = flatten(shape);
        let device: Vec<(f32, f32)> = points
            .iter()
            .map(|point| self.state.transform.apply(*point))
            .collect();
        let Some(bounds) = LayerBounds::around(
            device.iter().copied(),
            self.glow_pad(),
            self.canvas.width(),
            self.canvas.height(),
        ) else {
            return;
        };
        let Some(polygon) = to_polygon(&device, &bounds) else {
            return;
        };
        let mut layer = bounds.empty_layer();
        draw_polygon_mut(&mut layer, &polygon, color);
        self.composite(layer, &bounds);
    }

    fn text(&mut self, text: &str, x: f32, y: f32, size_px: f32, color: Rgba<u8>) {
        let Some(font) = self.font.as_ref() else {
            if !self.warned_missing_font {
                log::warn!("No label font configured; skipping overlay labels");
                self.warned_missing_font = true;
            }
            return;
        };
        let scale = PxScale::from(size_px * self.state.transform.linear_scale());
        let (text_w, text_h) = text_size(scale, font, text);
        let (anchor_x, anchor_y) = self.state.transform.apply((x, y));
        let left = (anchor_x - text_w as f32 * 0.5).round() as i64;
        let top = (anchor_y - text_h as f32).round() as i64;
        let pad = self.glow_pad().ceil() as i64 + 1;

        let layer_w = text_w + 1 + (pad as u32) * 2;
        let layer_h = text_h + (pad as u32) * 2;
        let mut layer = RgbaImage::from_pixel(layer_w.max(1), layer_h.max(1), TRANSPARENT);
        // Fixed bold weight: overstrike one pixel to the right.
        for dx in 0..2 {
            draw_text_mut(&mut layer, color, pad as i32 + dx, pad as i32, scale, font, text);
        }
        let bounds = LayerBounds {
            x: left - pad,
            y: top - pad,
            width: layer.width(),
            height: layer.height(),
        };
        self.composite(layer, &bounds);
    }

    fn glow_pad(&self) -> f32 {
        self.state.glow.map(|(_, blur)| blur * 2.0).unwrap_or(0.0)
    }

    fn composite(&mut self, mut layer: RgbaImage, bounds: &LayerBounds) {
        if let Some((glow_color, radius)) = self.state.glow {
            if radius > 0.0 {
                let mut glow = tint(&layer, glow_color);
                glow = blur(&glow, radius * 0.5);
                apply_opacity(&mut glow, self.state.alpha);
                overlay(&mut self.canvas, &glow, bounds.x, bounds.y);
            }
        }
        if self.state.alpha < 1.0 {
            apply_opacity(&mut layer, self.state.alpha);
        }
        overlay(&mut self.canvas, &layer, bounds.x, bounds.y);
    }
}

impl OverlaySurface for RasterSurface {
    fn size(&self) -> (u32, u32) {
        self.canvas.dimensions()
    }

    fn clear(&mut self) {
        for pixel in self.canvas.pixels_mut() {
            *pixel = TRANSPARENT;
        }
        self.state = PaintState::default();
        self.stack.clear();
    }

    fn execute(&mut self, command: &DrawCommand) {
        match command {
            DrawCommand::Save => self.stack.push(self.state),
            DrawCommand::Restore => {
                if let Some(state) = self.stack.pop() {
                    self.state = state;
                }
            }
            DrawCommand::Translate { x, y } => self.state.transform.translate(*x, *y),
            DrawCommand::Rotate { radians } => self.state.transform.rotate(*radians),
            DrawCommand::Scale { factor } => self.state.transform.scale(*factor),
            DrawCommand::SetAlpha { alpha } => self.state.alpha = alpha.clamp(0.0, 1.0),
            DrawCommand::SetGlow { color, blur } => {
                self.state.glow = (*blur > 0.0).then_some((*color, *blur));
            }
            DrawCommand::Stroke { shape, style } => self.stroke(shape, style),
            DrawCommand::Fill { shape, color } => self.fill(shape, *color),
            DrawCommand::Text {
                text,
                x,
                y,
                size_px,
                color,
            } => self.text(text, *x, *y, *size_px, *color),
        }
    }
}

/// Region of the canvas a single paint call touches.
#[derive(Debug, Clone, Copy, PartialEq)]
struct LayerBounds {
    x: i64,
    y: i64,
    width: u32,
    height: u32,
}

impl LayerBounds {
    fn around(
        points: impl Iterator<Item = (f32, f32)>,
        pad: f32,
        canvas_w: u32,
        canvas_h: u32,
    ) -> Option<Self> {
        let mut min_x = f32::INFINITY;
        let mut min_y = f32::INFINITY;
        let mut max_x = f32::NEG_INFINITY;
        let mut max_y = f32::NEG_INFINITY;
        for (x, y) in points {
            if !x.is_finite() || !y.is_finite() {
                continue;
            }
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        if min_x > max_x || min_y > max_y {
            return None;
        }

        let left = ((min_x - pad).floor() as i64).max(0);
        let top = ((min_y - pad).floor() as i64).max(0);
        let right = ((max_x + pad).ceil() as i64).min(canvas_w as i64);
        let bottom = ((max_y + pad).ceil() as i64).min(canvas_h as i64);
        if right <= left || bottom <= top {
            return None;
        }

        Some(Self {
            x: left,
            y: top,
            width: (right - left) as u32,
            height: (bottom - top) as u32,
        })
    }

    fn empty_layer(&self) -> RgbaImage {
        RgbaImage::from_pixel(self.width, self.height, TRANSPARENT)
    }

    fn local(&self, (x, y): (f32, f32)) -> (f32, f32) {
        (x - self.x as f32, y - self.y as f32)
    }
}

/// Flatten a shape to a point list in local coordinates. The flag tells
/// whether the outline closes back on its first point.
fn flatten(shape: &PathShape) -> (Vec<(f32, f32)>, bool) {
    match shape {
        PathShape::Arc {
            cx,
            cy,
            radius,
            start_rad,
            end_rad,
        } => {
            let sweep = end_rad - start_rad;
            let full = sweep.abs() >= std::f32::consts::TAU - 1e-4;
            let steps = ((radius.abs() * sweep.abs() / 4.0).ceil() as usize).clamp(12, 256);
            let count = if full { steps } else { steps + 1 };
            let points = (0..count)
                .map(|i| {
                    let angle = start_rad + sweep * i as f32 / steps as f32;
                    (cx + radius * angle.cos(), cy + radius * angle.sin())
                })
                .collect();
            // Partial arcs close through their chord, like a canvas path.
            (points, true)
        }
        PathShape::Rect {
            x,
            y,
            width,
            height,
        } => (
            vec![
                (*x, *y),
                (x + width, *y),
                (x + width, y + height),
                (*x, y + height),
            ],
            true,
        ),
        PathShape::Polyline { points, closed } => (points.clone(), *closed),
    }
}

fn close_path(mut points: Vec<(f32, f32)>, closed: bool) -> Vec<(f32, f32)> {
    if closed {
        if let Some(first) = points.first().copied() {
            points.push(first);
        }
    }
    points
}

fn scale_dash(dash: DashPattern, scale: f32) -> DashPattern {
    DashPattern {
        on: dash.on * scale,
        off: dash.off * scale,
        offset: dash.offset * scale,
    }
}

/// Split a path into the "on" runs of a dash pattern.
fn dash_segments(points: &[(f32, f32)], closed: bool, dash: DashPattern) -> Vec<Vec<(f32, f32)>> {
    let path = close_path(points.to_vec(), closed);
    let period = dash.on + dash.off;
    if dash.on <= 0.0 || period <= 0.0 || !period.is_finite() {
        return vec![path];
    }

    let mut runs = Vec::new();
    let mut current: Vec<(f32, f32)> = Vec::new();
    // Position inside the pattern at the start of the path.
    let mut phase = dash.offset.rem_euclid(period);
    for pair in path.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        let length = ((end.0 - start.0).powi(2) + (end.1 - start.1).powi(2)).sqrt();
        if length <= f32::EPSILON {
            continue;
        }
        let mut travelled = 0.0;
        while travelled < length {
            let on = phase < dash.on;
            let boundary = if on { dash.on } else { period };
            let step = (boundary - phase).min(length - travelled);
            let t0 = travelled / length;
            let t1 = (travelled + step) / length;
            if on {
                let a = lerp(start, end, t0);
                if current.last() != Some(&a) {
                    current.push(a);
                }
                current.push(lerp(start, end, t1));
            }
            travelled += step;
            phase += step;
            if phase >= period {
                phase -= period;
            }
            if phase >= dash.on && !current.is_empty() {
                runs.push(std::mem::take(&mut current));
            }
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

fn lerp(a: (f32, f32), b: (f32, f32), t: f32) -> (f32, f32) {
    (a.0 + (b.0 - a.0) * t, a.1 + (b.1 - a.1) * t)
}

/// Thick polyline: a quad per segment plus round joins and caps.
fn stroke_run(
    layer: &mut RgbaImage,
    bounds: &LayerBounds,
    run: &[(f32, f32)],
    width: f32,
    color: Rgba<u8>,
) {
    let half = width * 0.5;
    let join_radius = (half - 0.5).round().max(0.0) as i32;
    for point in run.iter() {
        let (x, y) = bounds.local(*point);
        draw_filled_circle_mut(layer, (x.round() as i32, y.round() as i32), join_radius, color);
    }
    for pair in run.windows(2) {
        let (ax, ay) = bounds.local(pair[0]);
        let (bx, by) = bounds.local(pair[1]);
        let length = ((bx - ax).powi(2) + (by - ay).powi(2)).sqrt();
        if length < 0.5 {
            continue;
        }
        let nx = -(by - ay) / length * half;
        let ny = (bx - ax) / length * half;
        let quad = [
            (ax + nx, ay + ny),
            (bx + nx, by + ny),
            (bx - nx, by - ny),
            (ax - nx, ay - ny),
        ];
        if let Some(polygon) = dedup_polygon(&quad) {
            draw_polygon_mut(layer, &polygon, color);
        }
    }
}

fn to_polygon(device: &[(f32, f32)], bounds: &LayerBounds) -> Option<Vec<Point<i32>>> {
    let local: Vec<(f32, f32)> = device.iter().map(|point| bounds.local(*point)).collect();
    dedup_polygon(&local)
}

/// Round to integer points, dropping repeats; `draw_polygon_mut` rejects a
/// polygon whose first and last points coincide.
fn dedup_polygon(points: &[(f32, f32)]) -> Option<Vec<Point<i32>>> {
    let mut polygon: Vec<Point<i32>> = Vec::with_capacity(points.len());
    for (x, y) in points {
        let point = Point::new(x.round() as i32, y.round() as i32);
        if polygon.last() != Some(&point) {
            polygon.push(point);
        }
    }
    while polygon.len() > 1 && polygon.first() == polygon.last() {
        polygon.pop();
    }
    (polygon.len() >= 3).then_some(polygon)
}

fn tint(layer: &RgbaImage, color: Rgba<u8>) -> RgbaImage {
    let mut out = layer.clone();
    for pixel in out.pixels_mut() {
        let alpha = pixel.0[3];
        *pixel = Rgba([color[0], color[1], color[2], alpha]);
    }
    out
}

fn apply_opacity(image: &mut RgbaImage, opacity: f32) {
    for pixel in image.pixels_mut() {
        let alpha = (pixel.0[3] as f32 * opacity).round().clamp(0.0, 255.0) as u8;
        pixel.0[3] = alpha;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::overlay::renderer::paint_frame;
    use crate::core::overlay::Viewport;
    use crate::state::{Anchor, Marker, MarkerColor, MarkerShape};

    fn painted_pixels(image: &RgbaImage) -> usize {
        image.pixels().filter(|pixel| pixel.0[3] > 0).count()
    }

    #[test]
    fn test_affine_translate_then_rotate() {
        let mut transform = Affine::IDENTITY;
        transform.translate(10.0, 20.0);
        transform.rotate(std::f32::consts::FRAC_PI_2);
        let (x, y) = transform.apply((5.0, 0.0));
        assert!((x - 10.0).abs() < 1e-4);
        assert!((y - 25.0).abs() < 1e-4);
    }

    #[test]
    fn test_circle_paints_around_center() {
        let mut surface = RasterSurface::new(200, 200);
        let marker = Marker::new(MarkerShape::Circle, Anchor::new(50.0, 50.0)).with_color(MarkerColor::Red);
        surface.execute_all(&paint_frame(&[marker], Viewport::new(200.0, 200.0), 0.0, 1.0));

        let ring = surface.image().get_pixel(140, 100);
        assert!(ring.0[3] > 200, "ring pixel {:?}", ring);
        assert!(ring.0[0] >= 0xee && ring.0[1] <= 0x45);
        assert_eq!(surface.image().get_pixel(0, 0).0[3], 0);
    }

    #[test]
    fn test_zero_opacity_paints_nothing() {
        let mut surface = RasterSurface::new(120, 120);
        let marker = Marker::new(MarkerShape::Rectangle, Anchor::new(50.0, 50.0));
        surface.execute_all(&paint_frame(&[marker], Viewport::new(120.0, 120.0), 0.0, 0.0));
        assert_eq!(painted_pixels(surface.image()), 0);
    }

    #[test]
    fn test_clear_erases_canvas() {
        let mut surface = RasterSurface::new(100, 100);
        let marker = Marker::new(MarkerShape::GlowZone, Anchor::new(50.0, 50.0));
        surface.execute_all(&paint_frame(&[marker], Viewport::new(100.0, 100.0), 250.0, 1.0));
        assert!(painted_pixels(surface.image()) > 0);
        surface.clear();
        assert_eq!(painted_pixels(surface.image()), 0);
    }

    #[test]
    fn test_off_canvas_marker_is_skipped() {
        let mut surface = RasterSurface::new(50, 50);
        surface.execute(&DrawCommand::Translate { x: 500.0, y: 500.0 });
        surface.execute(&DrawCommand::Fill {
            shape: PathShape::Rect {
                x: 0.0,
                y: 0.0,
                width: 10.0,
                height: 10.0,
            },
            color: Rgba([255, 255, 255, 255]),
        });
        assert_eq!(painted_pixels(surface.image()), 0);
    }

    #[test]
    fn test_labels_without_font_are_skipped() {
        let mut surface = RasterSurface::new(64, 64);
        surface.execute(&DrawCommand::Text {
            text: "Valve".to_string(),
            x: 32.0,
            y: 32.0,
            size_px: 16.0,
            color: Rgba([255, 255, 255, 255]),
        });
        assert_eq!(painted_pixels(surface.image()), 0);
    }

    #[test]
    fn test_dash_splits_line_into_runs() {
        let runs = dash_segments(
            &[(0.0, 0.0), (40.0, 0.0)],
            false,
            DashPattern {
                on: 5.0,
                off: 5.0,
                offset: 0.0,
            },
        );
        assert_eq!(runs.len(), 4);
        assert_eq!(runs[0], vec![(0.0, 0.0), (5.0, 0.0)]);
        assert_eq!(runs[1][0], (10.0, 0.0));
    }

    #[test]
    fn test_dedup_polygon_rejects_degenerate_shapes() {
        assert!(dedup_polygon(&[(1.0, 1.0), (1.2, 1.1), (0.9, 1.0)]).is_none());
        assert_eq!(dedup_polygon(&[(0.0, 0.0), (5.0, 0.0), (5.0, 5.0), (0.0, 0.0)]).unwrap().len(), 3);
    }
}
