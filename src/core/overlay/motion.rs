//! Per-marker procedural animation.
//!
//! The analysis service only sends semantic intent (a shape and, for hands, an
//! action). Everything here is a periodic function of the elapsed timeline time,
//! so the same `(shape, t)` always yields the same transform.

use std::f64::consts::{PI, TAU};

use crate::state::{HandAction, MarkerShape};

/// Length of one push/pull/rotate gesture.
const GESTURE_CYCLE_MS: f64 = 2000.0;
const ARROW_CYCLE_MS: f64 = 800.0;
const EXPLODE_CYCLE_MS: f64 = 800.0;

const IDLE_BOB_PX: f64 = 10.0;
const LUNGE_PX: f64 = 20.0;
const LUNGE_SCALE: f64 = 0.15;
const PRESS_SCALE: f64 = 0.05;
const ARROW_SLIDE_PX: f64 = 15.0;
const GLOW_SCALE: f64 = 0.1;
/// Length of one dash plus one gap on glow rings.
pub const GLOW_DASH_CYCLE_PX: f64 = 20.0;
const EXPLODE_SPREAD_PX: f64 = 8.0;
const JITTER_SCALE: f64 = 0.05;

/// Transform applied about a marker's resolved center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionTransform {
    pub translate_x: f32,
    pub translate_y: f32,
    pub scale: f32,
    pub rotation_rad: f32,
    /// Offset of dashed strokes along their path
    pub dash_offset: f32,
    /// Gap between an exploded view's object and its outer frame
    pub spread: f32,
}

impl MotionTransform {
    pub const IDENTITY: MotionTransform = MotionTransform {
        translate_x: 0.0,
        translate_y: 0.0,
        scale: 1.0,
        rotation_rad: 0.0,
        dash_offset: 0.0,
        spread: 0.0,
    };
}

impl Default for MotionTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Compute this frame's motion for a marker shape at `t_ms` into the timeline.
pub fn motion_for(shape: &MarkerShape, t_ms: f64) -> MotionTransform {
    match shape {
        MarkerShape::HandGesture { action } => hand_motion(*action, t_ms),
        MarkerShape::DirectionalArrow => {
            let cycle = cycle_fraction(t_ms, ARROW_CYCLE_MS);
            MotionTransform {
                translate_y: (-cycle * ARROW_SLIDE_PX) as f32,
                ..MotionTransform::IDENTITY
            }
        }
        MarkerShape::GlowZone => MotionTransform {
            scale: (1.0 + (t_ms / 200.0).sin() * GLOW_SCALE) as f32,
            dash_offset: ((t_ms / 40.0).rem_euclid(GLOW_DASH_CYCLE_PX)) as f32,
            ..MotionTransform::IDENTITY
        },
        MarkerShape::ExplodedView => {
            let phase = cycle_fraction(t_ms, EXPLODE_CYCLE_MS) * TAU;
            MotionTransform {
                spread: ((1.0 + phase.sin()) * EXPLODE_SPREAD_PX) as f32,
                ..MotionTransform::IDENTITY
            }
        }
        MarkerShape::Circle | MarkerShape::Rectangle => MotionTransform {
            scale: (1.0 + (t_ms / 150.0).sin() * JITTER_SCALE) as f32,
            ..MotionTransform::IDENTITY
        },
        MarkerShape::LabelOnly => MotionTransform::IDENTITY,
    }
}

fn hand_motion(action: HandAction, t_ms: f64) -> MotionTransform {
    let cycle = cycle_fraction(t_ms, GESTURE_CYCLE_MS);
    // Positive half of a sine: advance then reset, never below baseline.
    let pulse = (cycle * PI).sin().max(0.0);

    match action {
        HandAction::Push | HandAction::Connect => MotionTransform {
            translate_y: (pulse * LUNGE_PX) as f32,
            scale: (1.0 - pulse * LUNGE_SCALE) as f32,
            ..MotionTransform::IDENTITY
        },
        HandAction::Pull => MotionTransform {
            translate_y: (-pulse * LUNGE_PX) as f32,
            scale: (1.0 + pulse * LUNGE_SCALE) as f32,
            ..MotionTransform::IDENTITY
        },
        HandAction::Rotate => MotionTransform {
            rotation_rad: (cycle * TAU) as f32,
            ..MotionTransform::IDENTITY
        },
        HandAction::Press => MotionTransform {
            scale: (1.0 + (t_ms / 50.0).sin() * PRESS_SCALE) as f32,
            ..MotionTransform::IDENTITY
        },
        HandAction::Idle => MotionTransform {
            translate_y: ((t_ms / 300.0).sin() * IDLE_BOB_PX) as f32,
            ..MotionTransform::IDENTITY
        },
    }
}

fn cycle_fraction(t_ms: f64, period_ms: f64) -> f64 {
    t_ms.rem_euclid(period_ms) / period_ms
}
