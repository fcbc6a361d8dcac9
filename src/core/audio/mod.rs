//! Spoken guidance: PCM decoding and playback.

pub mod pcm;
pub mod playback;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no default audio output device found")]
    NoOutputDevice,
    #[error("output device has no usable f32 configuration: {0}")]
    UnsupportedConfig(String),
    #[error("audio stream failed: {0}")]
    Stream(String),
    #[error("invalid PCM payload: {0}")]
    InvalidPcm(String),
}
