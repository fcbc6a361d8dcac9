//! Drawing surface abstraction.
//!
//! The renderer never touches pixels directly; it emits [`DrawCommand`]s in a
//! canvas-like vocabulary (save/restore, transforms, strokes, fills, text) and a
//! surface executes them. Commands are plain data so a frame can be compared,
//! recorded or replayed.

use image::Rgba;

/// Geometric primitive in the surface's current local coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum PathShape {
    Arc {
        cx: f32,
        cy: f32,
        radius: f32,
        start_rad: f32,
        end_rad: f32,
    },
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
    Polyline {
        points: Vec<(f32, f32)>,
        closed: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DashPattern {
    pub on: f32,
    pub off: f32,
    pub offset: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeStyle {
    pub color: Rgba<u8>,
    pub width: f32,
    pub dash: Option<DashPattern>,
}

impl StrokeStyle {
    pub fn solid(color: Rgba<u8>, width: f32) -> Self {
        Self {
            color,
            width,
            dash: None,
        }
    }

    pub fn dashed(color: Rgba<u8>, width: f32, dash: DashPattern) -> Self {
        Self {
            color,
            width,
            dash: Some(dash),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Save,
    Restore,
    Translate { x: f32, y: f32 },
    Rotate { radians: f32 },
    Scale { factor: f32 },
    /// Multiplier applied to everything painted until the next restore
    SetAlpha { alpha: f32 },
    /// Soft shadow behind subsequent paints; `blur == 0` disables it
    SetGlow { color: Rgba<u8>, blur: f32 },
    Stroke { shape: PathShape, style: StrokeStyle },
    Fill { shape: PathShape, color: Rgba<u8> },
    /// Bold text centered horizontally on `x`, baseline at `y`
    Text {
        text: String,
        x: f32,
        y: f32,
        size_px: f32,
        color: Rgba<u8>,
    },
}

/// Anything the overlay can be painted onto.
pub trait OverlaySurface {
    /// Pixel size of the surface.
    fn size(&self) -> (u32, u32);

    /// Erase everything previously painted.
    fn clear(&mut self);

    fn execute(&mut self, command: &DrawCommand);

    fn execute_all(&mut self, commands: &[DrawCommand]) {
        for command in commands {
            self.execute(command);
        }
    }
}

/// Surface that keeps the commands of the current frame.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    width: u32,
    height: u32,
    commands: Vec<DrawCommand>,
    clear_count: usize,
}

#[cfg(test)]
impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            commands: Vec::new(),
            clear_count: 0,
        }
    }

    /// Commands painted since the last clear.
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn clear_count(&self) -> usize {
        self.clear_count
    }

    pub fn is_blank(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
impl OverlaySurface for RecordingSurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn clear(&mut self) {
        self.commands.clear();
        self.clear_count += 1;
    }

    fn execute(&mut self, command: &DrawCommand) {
        self.commands.push(command.clone());
    }
}
