//! Drawing recipes for each marker shape.

use std::f32::consts::{PI, TAU};

use image::Rgba;

use crate::constants::{FILL_ALPHA, GLOW_BLUR_PX, LABEL_FONT_PX, LABEL_OFFSET_PX, STROKE_WIDTH_PX};
use crate::state::{Marker, MarkerShape};

use super::geometry::{resolve_geometry, MarkerGeometry, Viewport};
use super::motion::{motion_for, MotionTransform, GLOW_DASH_CYCLE_PX};
use super::surface::{DashPattern, DrawCommand, PathShape, StrokeStyle};

const LABEL_COLOR: Rgba<u8> = Rgba([0xff, 0xff, 0xff, 0xff]);
const LABEL_SHADOW: Rgba<u8> = Rgba([0x00, 0x00, 0x00, 0xcc]);

/// Paint every marker for one frame.
pub fn paint_frame(
    markers: &[Marker],
    viewport: Viewport,
    t_ms: f64,
    opacity: f32,
) -> Vec<DrawCommand> {
    let mut commands = Vec::new();
    for marker in markers {
        let geometry = resolve_geometry(marker, viewport);
        let motion = motion_for(&marker.shape, t_ms);
        paint_marker(&mut commands, marker, &geometry, &motion, opacity);
    }
    commands
}

/// Paint one marker's shape and, if present, its label.
pub fn paint_marker(
    out: &mut Vec<DrawCommand>,
    marker: &Marker,
    geometry: &MarkerGeometry,
    motion: &MotionTransform,
    opacity: f32,
) {
    if marker.shape == MarkerShape::LabelOnly {
        if let Some(label) = marker.label.as_deref() {
            paint_label(out, label, geometry, opacity);
        }
        return;
    }

    let [r, g, b] = marker.color.rgb();
    let stroke = Rgba([r, g, b, 0xff]);
    let fill = Rgba([r, g, b, FILL_ALPHA]);

    out.push(DrawCommand::Save);
    out.push(DrawCommand::Translate {
        x: geometry.center_x,
        y: geometry.center_y,
    });
    if marker.rotation_deg != 0.0 {
        out.push(DrawCommand::Rotate {
            radians: marker.rotation_deg.to_radians(),
        });
    }
    out.push(DrawCommand::Translate {
        x: motion.translate_x,
        y: motion.translate_y,
    });
    if motion.rotation_rad != 0.0 {
        out.push(DrawCommand::Rotate {
            radians: motion.rotation_rad,
        });
    }
    if motion.scale != 1.0 {
        out.push(DrawCommand::Scale {
            factor: motion.scale,
        });
    }
    out.push(DrawCommand::SetAlpha { alpha: opacity });
    out.push(DrawCommand::SetGlow {
        color: stroke,
        blur: GLOW_BLUR_PX,
    });

    match marker.shape {
        MarkerShape::Circle => paint_circle(out, geometry, stroke, fill),
        MarkerShape::Rectangle => paint_rectangle(out, geometry, stroke, fill),
        MarkerShape::DirectionalArrow => paint_arrow(out, geometry, stroke),
        MarkerShape::GlowZone => paint_glow_zone(out, geometry, motion, stroke, fill),
        MarkerShape::ExplodedView => paint_exploded_view(out, geometry, motion, stroke, fill),
        MarkerShape::HandGesture { .. } => paint_hand(out, geometry, stroke, fill),
        MarkerShape::LabelOnly => {}
    }
    out.push(DrawCommand::Restore);

    if let Some(label) = marker.label.as_deref() {
        paint_label(out, label, geometry, opacity);
    }
}

fn paint_circle(out: &mut Vec<DrawCommand>, geometry: &MarkerGeometry, stroke: Rgba<u8>, fill: Rgba<u8>) {
    let shape = full_circle(geometry.radius());
    out.push(DrawCommand::Fill {
        shape: shape.clone(),
        color: fill,
    });
    out.push(DrawCommand::Stroke {
        shape,
        style: StrokeStyle::solid(stroke, STROKE_WIDTH_PX),
    });
}

fn paint_rectangle(
    out: &mut Vec<DrawCommand>,
    geometry: &MarkerGeometry,
    stroke: Rgba<u8>,
    fill: Rgba<u8>,
) {
    let shape = centered_rect(geometry.width, geometry.height);
    out.push(DrawCommand::Fill {
        shape: shape.clone(),
        color: fill,
    });
    out.push(DrawCommand::Stroke {
        shape,
        style: StrokeStyle::solid(stroke, STROKE_WIDTH_PX),
    });
}

/// Two stacked chevrons pointing along local -y.
fn paint_arrow(out: &mut Vec<DrawCommand>, geometry: &MarkerGeometry, stroke: Rgba<u8>) {
    let size = geometry.radius() * 0.5;
    let trailing = Rgba([stroke[0], stroke[1], stroke[2], 0x99]);
    for (offset, color) in [(0.0, stroke), (size * 0.9, trailing)] {
        out.push(DrawCommand::Stroke {
            shape: PathShape::Polyline {
                points: vec![(-size, size + offset), (0.0, offset), (size, size + offset)],
                closed: false,
            },
            style: StrokeStyle::solid(color, STROKE_WIDTH_PX),
        });
    }
}

fn paint_glow_zone(
    out: &mut Vec<DrawCommand>,
    geometry: &MarkerGeometry,
    motion: &MotionTransform,
    stroke: Rgba<u8>,
    fill: Rgba<u8>,
) {
    let radius = geometry.radius();
    let half_dash = (GLOW_DASH_CYCLE_PX as f32) * 0.5;
    out.push(DrawCommand::SetGlow {
        color: stroke,
        blur: GLOW_BLUR_PX * 2.0,
    });
    out.push(DrawCommand::Fill {
        shape: full_circle(radius),
        color: fill,
    });
    out.push(DrawCommand::Stroke {
        shape: full_circle(radius),
        style: StrokeStyle::dashed(
            stroke,
            STROKE_WIDTH_PX,
            DashPattern {
                on: half_dash,
                off: half_dash,
                offset: motion.dash_offset,
            },
        ),
    });
    out.push(DrawCommand::Stroke {
        shape: full_circle(radius * 0.6),
        style: StrokeStyle::solid(stroke, STROKE_WIDTH_PX * 0.5),
    });
}

/// Object box in the middle, a dashed outer frame pushed out by `spread`, and
/// connector lines between matching corners.
fn paint_exploded_view(
    out: &mut Vec<DrawCommand>,
    geometry: &MarkerGeometry,
    motion: &MotionTransform,
    stroke: Rgba<u8>,
    fill: Rgba<u8>,
) {
    let inner_w = geometry.width * 0.6;
    let inner_h = geometry.height * 0.6;
    let outer_w = geometry.width + motion.spread * 2.0;
    let outer_h = geometry.height + motion.spread * 2.0;

    let inner = centered_rect(inner_w, inner_h);
    out.push(DrawCommand::Fill {
        shape: inner.clone(),
        color: fill,
    });
    out.push(DrawCommand::Stroke {
        shape: inner,
        style: StrokeStyle::solid(stroke, STROKE_WIDTH_PX),
    });
    out.push(DrawCommand::Stroke {
        shape: centered_rect(outer_w, outer_h),
        style: StrokeStyle::dashed(
            stroke,
            STROKE_WIDTH_PX * 0.5,
            DashPattern {
                on: 8.0,
                off: 6.0,
                offset: 0.0,
            },
        ),
    });
    for (sx, sy) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
        out.push(DrawCommand::Stroke {
            shape: PathShape::Polyline {
                points: vec![
                    (sx * inner_w * 0.5, sy * inner_h * 0.5),
                    (sx * outer_w * 0.5, sy * outer_h * 0.5),
                ],
                closed: false,
            },
            style: StrokeStyle::solid(stroke, 1.0),
        });
    }
}

/// Palm arc, four fingers and a thumb, scaled to the marker radius.
fn paint_hand(out: &mut Vec<DrawCommand>, geometry: &MarkerGeometry, stroke: Rgba<u8>, fill: Rgba<u8>) {
    let s = geometry.radius();
    let palm_top = s * 0.1;
    let palm = PathShape::Arc {
        cx: 0.0,
        cy: palm_top,
        radius: s * 0.45,
        start_rad: 0.0,
        end_rad: PI,
    };
    out.push(DrawCommand::Fill {
        shape: palm.clone(),
        color: fill,
    });
    out.push(DrawCommand::Stroke {
        shape: palm,
        style: StrokeStyle::solid(stroke, STROKE_WIDTH_PX),
    });

    let fingers = [(-0.33, 0.55), (-0.11, 0.75), (0.11, 0.8), (0.33, 0.6)];
    for (x, reach) in fingers {
        out.push(DrawCommand::Stroke {
            shape: PathShape::Polyline {
                points: vec![(x * s, palm_top), (x * s, palm_top - reach * s)],
                closed: false,
            },
            style: StrokeStyle::solid(stroke, STROKE_WIDTH_PX),
        });
    }
    out.push(DrawCommand::Stroke {
        shape: PathShape::Polyline {
            points: vec![(-0.45 * s, palm_top + 0.2 * s), (-0.8 * s, -0.15 * s)],
            closed: false,
        },
        style: StrokeStyle::solid(stroke, STROKE_WIDTH_PX),
    });
}

/// Labels sit below the shape in surface coordinates so they never inherit
/// the shape's motion.
fn paint_label(out: &mut Vec<DrawCommand>, label: &str, geometry: &MarkerGeometry, opacity: f32) {
    out.push(DrawCommand::Save);
    out.push(DrawCommand::SetAlpha { alpha: opacity });
    out.push(DrawCommand::SetGlow {
        color: LABEL_SHADOW,
        blur: 4.0,
    });
    out.push(DrawCommand::Text {
        text: label.to_string(),
        x: geometry.center_x,
        y: geometry.center_y + geometry.height * 0.5 + LABEL_OFFSET_PX,
        size_px: LABEL_FONT_PX,
        color: LABEL_COLOR,
    });
    out.push(DrawCommand::Restore);
}

fn full_circle(radius: f32) -> PathShape {
    PathShape::Arc {
        cx: 0.0,
        cy: 0.0,
        radius,
        start_rad: 0.0,
        end_rad: TAU,
    }
}

fn centered_rect(width: f32, height: f32) -> PathShape {
    PathShape::Rect {
        x: -width * 0.5,
        y: -height * 0.5,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Anchor, HandAction, MarkerColor};

    fn hand(label: &str) -> Marker {
        Marker::new(
            MarkerShape::HandGesture {
                action: HandAction::Idle,
            },
            Anchor::new(30.0, 40.0),
        )
        .with_label(label)
    }

    fn first_translate(commands: &[DrawCommand]) -> Option<(f32, f32)> {
        commands.iter().find_map(|command| match command {
            DrawCommand::Translate { x, y } => Some((*x, *y)),
            _ => None,
        })
    }

    fn rotations(commands: &[DrawCommand]) -> Vec<f32> {
        commands
            .iter()
            .filter_map(|command| match command {
                DrawCommand::Rotate { radians } => Some(*radians),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_hand_scenario_position_and_rotation() {
        let markers = vec![hand("GIRAR")];
        let viewport = Viewport::new(1280.0, 720.0);

        let at_start = paint_frame(&markers, viewport, 0.0, 1.0);
        assert_eq!(first_translate(&at_start), Some((384.0, 288.0)));
        assert!(rotations(&at_start).is_empty());

        let half_cycle = paint_frame(&markers, viewport, 1000.0, 1.0);
        let turns = rotations(&half_cycle);
        assert_eq!(turns.len(), 1);
        assert!((turns[0] - PI).abs() < 1e-5);
    }

    #[test]
    fn test_same_inputs_produce_identical_commands() {
        let markers = vec![
            hand("press"),
            Marker::new(MarkerShape::GlowZone, Anchor::new(70.0, 20.0)).with_color(MarkerColor::Yellow),
            Marker::new(MarkerShape::ExplodedView, Anchor::new(50.0, 50.0)).with_label("Filter"),
        ];
        let viewport = Viewport::new(640.0, 480.0);
        assert_eq!(
            paint_frame(&markers, viewport, 4321.0, 0.7),
            paint_frame(&markers, viewport, 4321.0, 0.7)
        );
    }

    #[test]
    fn test_static_rotation_precedes_animated_rotation() {
        let marker = hand("rotate").with_rotation(90.0);
        let commands = paint_frame(&[marker], Viewport::new(100.0, 100.0), 500.0, 1.0);
        let turns = rotations(&commands);
        assert_eq!(turns.len(), 2);
        assert!((turns[0] - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
        assert!((turns[1] - std::f32::consts::FRAC_PI_2).abs() < 1e-5);
    }

    #[test]
    fn test_label_is_painted_outside_shape_transform() {
        let marker = Marker::new(MarkerShape::Circle, Anchor::new(50.0, 50.0)).with_label("Valve");
        let commands = paint_frame(&[marker], Viewport::new(200.0, 200.0), 0.0, 0.5);

        let text_index = commands
            .iter()
            .position(|command| matches!(command, DrawCommand::Text { .. }))
            .unwrap();
        let first_restore = commands
            .iter()
            .position(|command| matches!(command, DrawCommand::Restore))
            .unwrap();
        assert!(first_restore < text_index);

        match &commands[text_index] {
            DrawCommand::Text { x, y, text, .. } => {
                assert_eq!(text, "Valve");
                assert_eq!(*x, 100.0);
                assert_eq!(*y, 160.0);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_opacity_reaches_every_paint_group() {
        let marker = Marker::new(MarkerShape::Rectangle, Anchor::new(10.0, 10.0)).with_label("x");
        let commands = paint_frame(&[marker], Viewport::new(100.0, 100.0), 0.0, 0.25);
        let alphas: Vec<f32> = commands
            .iter()
            .filter_map(|command| match command {
                DrawCommand::SetAlpha { alpha } => Some(*alpha),
                _ => None,
            })
            .collect();
        assert_eq!(alphas, vec![0.25, 0.25]);
    }

    #[test]
    fn test_label_only_marker_draws_just_text() {
        let marker = Marker::new(MarkerShape::LabelOnly, Anchor::new(50.0, 50.0)).with_label("Shutoff");
        let commands = paint_frame(&[marker], Viewport::new(200.0, 200.0), 900.0, 0.5);
        assert!(!commands.iter().any(|command| matches!(
            command,
            DrawCommand::Fill { .. } | DrawCommand::Stroke { .. } | DrawCommand::Scale { .. }
        )));
        let texts: Vec<&str> = commands
            .iter()
            .filter_map(|command| match command {
                DrawCommand::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["Shutoff"]);
    }

    #[test]
    fn test_saves_and_restores_balance() {
        let markers: Vec<Marker> = [
            MarkerShape::Circle,
            MarkerShape::Rectangle,
            MarkerShape::DirectionalArrow,
            MarkerShape::GlowZone,
            MarkerShape::ExplodedView,
            MarkerShape::HandGesture {
                action: HandAction::Push,
            },
        ]
        .into_iter()
        .map(|shape| Marker::new(shape, Anchor::new(50.0, 50.0)).with_label("step"))
        .collect();
        let commands = paint_frame(&markers, Viewport::new(320.0, 240.0), 777.0, 1.0);
        let saves = commands.iter().filter(|c| matches!(c, DrawCommand::Save)).count();
        let restores = commands.iter().filter(|c| matches!(c, DrawCommand::Restore)).count();
        assert_eq!(saves, 12);
        assert_eq!(saves, restores);
    }
}
