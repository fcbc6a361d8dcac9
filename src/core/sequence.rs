//! Offline rendering of an overlay cue to numbered PNG frames.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ab_glyph::FontVec;
use image::imageops::overlay;
use image::{Rgba, RgbaImage};

use crate::state::MarkerList;

use super::overlay::{
    FrameClock, FrameOutcome, OverlayDriver, QueuedScheduler, RasterSurface, StepClock,
    OverlaySurface, TimelineConfig, Viewport,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequenceOptions {
    /// Total length to render; may exceed one timeline to show the loop
    pub duration_ms: f64,
    pub fps: f64,
    pub timeline: TimelineConfig,
}

impl SequenceOptions {
    pub fn frame_count(&self) -> usize {
        let frames = (self.duration_ms.max(0.0) / 1000.0 * self.fps.max(1.0)).ceil();
        (frames as usize).max(1)
    }
}

/// Where a sequence composites its overlay.
pub enum SequenceBase<'a> {
    /// Camera frame; the overlay matches its size
    Frame(&'a RgbaImage),
    /// Transparent canvas of this size
    Blank { width: u32, height: u32 },
}

impl SequenceBase<'_> {
    fn dimensions(&self) -> (u32, u32) {
        match self {
            SequenceBase::Frame(frame) => frame.dimensions(),
            SequenceBase::Blank { width, height } => (*width, *height),
        }
    }

    fn canvas(&self) -> RgbaImage {
        match self {
            SequenceBase::Frame(frame) => (*frame).clone(),
            SequenceBase::Blank { width, height } => {
                RgbaImage::from_pixel(*width, *height, Rgba([0, 0, 0, 0]))
            }
        }
    }
}

/// Drive the overlay loop on a virtual clock and hand each composited frame to
/// `sink`. Returns the number of frames produced.
pub fn render_sequence<F>(
    markers: Arc<MarkerList>,
    base: SequenceBase<'_>,
    options: &SequenceOptions,
    font: Option<FontVec>,
    mut sink: F,
) -> Result<usize, String>
where
    F: FnMut(usize, &RgbaImage) -> Result<(), String>,
{
    let (width, height) = base.dimensions();
    if width == 0 || height == 0 {
        return Err("Cannot render overlay onto an empty frame".to_string());
    }

    let mut surface = RasterSurface::new(width, height);
    if let Some(font) = font {
        surface = surface.with_font(font);
    }
    let (surface_width, surface_height) = surface.size();
    let mut driver = OverlayDriver::new(
        QueuedScheduler::new(),
        options.timeline,
        Viewport::from_pixels(surface_width, surface_height),
    );
    driver.set_markers(markers, Some(&mut surface));

    let mut clock = StepClock::at_fps(options.fps);
    let frame_count = options.frame_count();
    let mut loops = 0;
    for index in 0..frame_count {
        if let Some(FrameOutcome::Painted { looped: true, .. }) =
            driver.pump(clock.now_ms(), Some(&mut surface))
        {
            loops += 1;
        }
        let mut frame = base.canvas();
        overlay(&mut frame, surface.image(), 0, 0);
        sink(index, &frame)?;
        clock.tick();
    }

    driver.teardown(Some(&mut surface));
    log::info!(
        "Rendered {} overlay frame(s) at {}x{} ({} loop restart(s))",
        frame_count,
        width,
        height,
        loops
    );
    Ok(frame_count)
}

pub fn frame_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("frame_{:05}.png", index))
}

/// Render straight to `dir` as `frame_00000.png`, `frame_00001.png`, ...
pub fn write_png_sequence(
    dir: &Path,
    markers: Arc<MarkerList>,
    base: SequenceBase<'_>,
    options: &SequenceOptions,
    font: Option<FontVec>,
) -> Result<usize, String> {
    std::fs::create_dir_all(dir)
        .map_err(|err| format!("Failed to create output dir {:?}: {}", dir, err))?;
    render_sequence(markers, base, options, font, |index, frame| {
        let path = frame_path(dir, index);
        frame
            .save(&path)
            .map_err(|err| format!("Failed to write {:?}: {}", path, err))
    })
}
