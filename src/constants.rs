//! Shared constants for the overlay renderer and service clients.

/// Length of one overlay cue before it loops, in milliseconds.
pub const DEFAULT_TIMELINE_MS: f64 = 10_000.0;
/// Fraction of the timeline spent fading in (and, mirrored, fading out).
pub const FADE_FRACTION: f64 = 0.05;

/// Side of the square used when a marker has no bounding box.
pub const DEFAULT_MARKER_SIZE_PX: f32 = 80.0;
/// Vertical gap between the bottom of a shape and its label baseline.
pub const LABEL_OFFSET_PX: f32 = 20.0;
pub const LABEL_FONT_PX: f32 = 16.0;

pub const STROKE_WIDTH_PX: f32 = 4.0;
pub const GLOW_BLUR_PX: f32 = 15.0;
/// Alpha applied to shape fills (0x33 of 0xff).
pub const FILL_ALPHA: u8 = 0x33;

pub const COLOR_RED: [u8; 3] = [0xef, 0x44, 0x44];
pub const COLOR_GREEN: [u8; 3] = [0x22, 0xc5, 0x5e];
pub const COLOR_BLUE: [u8; 3] = [0x3b, 0x82, 0xf6];
pub const COLOR_YELLOW: [u8; 3] = [0xea, 0xb3, 0x08];
pub const COLOR_WHITE: [u8; 3] = [0xff, 0xff, 0xff];

pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_ANALYSIS_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";
pub const DEFAULT_VOICE_NAME: &str = "Puck";
/// Sample rate of the PCM returned by the speech model.
pub const TTS_SAMPLE_RATE: u32 = 24_000;

pub const DEFAULT_PROMPT: &str =
    "Identify any urgent repair issue in this image and give instructions.";
