//! Speech playback through the default cpal output device.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex,
};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::pcm::{resample_linear, to_interleaved_f32};
use super::AudioError;

const PREFERRED_RATE: u32 = 48_000;
const DRAIN_POLL: Duration = Duration::from_millis(20);

/// One utterance queued on the output stream.
#[derive(Clone)]
struct Utterance {
    samples: Arc<Vec<f32>>,
    start_frame: u64,
    channels: u16,
}

impl Utterance {
    fn frames(&self) -> u64 {
        let channels = self.channels.max(1) as usize;
        (self.samples.len() / channels) as u64
    }

    fn end_frame(&self) -> u64 {
        self.start_frame + self.frames()
    }
}

/// Owns a running output stream. Not `Send` on every platform, so create it on
/// the thread that plays.
pub struct SpeechPlayer {
    _stream: cpal::Stream,
    queue: Arc<Mutex<Vec<Utterance>>>,
    playing: Arc<AtomicBool>,
    playhead_frames: Arc<AtomicU64>,
    sample_rate: u32,
    channels: u16,
}

impl SpeechPlayer {
    pub fn new() -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::NoOutputDevice)?;
        let config = select_output_config(&device)?;
        let sample_rate = config.sample_rate.0;
        let channels = config.channels;

        let queue = Arc::new(Mutex::new(Vec::<Utterance>::new()));
        let playing = Arc::new(AtomicBool::new(false));
        let playhead_frames = Arc::new(AtomicU64::new(0));

        let queue_for_cb = Arc::clone(&queue);
        let playing_for_cb = Arc::clone(&playing);
        let playhead_for_cb = Arc::clone(&playhead_frames);
        let channels_for_cb = channels;

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _| {
                    for sample in data.iter_mut() {
                        *sample = 0.0;
                    }
                    if !playing_for_cb.load(Ordering::Relaxed) {
                        return;
                    }

                    let frames = data.len() / channels_for_cb as usize;
                    let start_frame = playhead_for_cb.load(Ordering::Relaxed);
                    let end_frame = start_frame + frames as u64;

                    if let Ok(queue) = queue_for_cb.lock() {
                        for item in queue.iter() {
                            mix_into(data, item, start_frame, end_frame, channels_for_cb);
                        }
                    }

                    playhead_for_cb.store(end_frame, Ordering::Relaxed);
                },
                move |err| {
                    log::warn!("Audio output error: {}", err);
                },
                None,
            )
            .map_err(|err| AudioError::Stream(err.to_string()))?;

        stream
            .play()
            .map_err(|err| AudioError::Stream(err.to_string()))?;
        log::debug!(
            "Speech output opened at {} Hz, {} channel(s)",
            sample_rate,
            channels
        );

        Ok(Self {
            _stream: stream,
            queue,
            playing,
            playhead_frames,
            sample_rate,
            channels,
        })
    }

    /// Queue mono 16-bit speech recorded at `source_rate` right after whatever
    /// is already playing.
    pub fn enqueue(&self, samples: &[i16], source_rate: u32) {
        let resampled = resample_linear(samples, source_rate, self.sample_rate);
        let interleaved = to_interleaved_f32(&resampled, self.channels);
        let playhead = self.playhead_frames.load(Ordering::Relaxed);

        if let Ok(mut queue) = self.queue.lock() {
            queue.retain(|item| item.end_frame() > playhead);
            let start_frame = queue
                .iter()
                .map(Utterance::end_frame)
                .max()
                .unwrap_or(playhead)
                .max(playhead);
            queue.push(Utterance {
                samples: Arc::new(interleaved),
                start_frame,
                channels: self.channels,
            });
        }
        self.playing.store(true, Ordering::Relaxed);
    }

    /// Frames left before the queue runs dry.
    pub fn remaining_frames(&self) -> u64 {
        let playhead = self.playhead_frames.load(Ordering::Relaxed);
        self.queue
            .lock()
            .map(|queue| {
                queue
                    .iter()
                    .map(Utterance::end_frame)
                    .max()
                    .unwrap_or(0)
                    .saturating_sub(playhead)
            })
            .unwrap_or(0)
    }

    /// Block until queued speech finishes or `timeout` passes.
    pub fn wait_until_drained(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.remaining_frames() > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(DRAIN_POLL);
        }
        self.playing.store(false, Ordering::Relaxed);
        true
    }

    pub fn stop(&self) {
        self.playing.store(false, Ordering::Relaxed);
        if let Ok(mut queue) = self.queue.lock() {
            queue.clear();
        }
    }
}

fn mix_into(data: &mut [f32], item: &Utterance, start_frame: u64, end_frame: u64, channels: u16) {
    if item.channels != channels {
        return;
    }
    let item_start = item.start_frame;
    let item_end = item.end_frame();
    if item_end <= start_frame || item_start >= end_frame {
        return;
    }

    let channels = channels as usize;
    let overlap_start = start_frame.max(item_start);
    let overlap_end = end_frame.min(item_end);
    let overlap_samples = (overlap_end - overlap_start) as usize * channels;
    let buffer_offset = (overlap_start - start_frame) as usize * channels;
    let item_offset = (overlap_start - item_start) as usize * channels;

    if item_offset + overlap_samples > item.samples.len()
        || buffer_offset + overlap_samples > data.len()
    {
        return;
    }
    for i in 0..overlap_samples {
        data[buffer_offset + i] += item.samples[item_offset + i];
    }
}

fn select_output_config(device: &cpal::Device) -> Result<cpal::StreamConfig, AudioError> {
    let configs: Vec<_> = device
        .supported_output_configs()
        .map_err(|err| AudioError::UnsupportedConfig(err.to_string()))?
        .filter(|config| config.sample_format() == cpal::SampleFormat::F32)
        .collect();

    let target_rate = cpal::SampleRate(PREFERRED_RATE);
    if let Some(config) = configs.iter().find(|config| {
        config.min_sample_rate() <= target_rate && config.max_sample_rate() >= target_rate
    }) {
        return Ok(config.with_sample_rate(target_rate).config());
    }

    let default_config = device
        .default_output_config()
        .map_err(|err| AudioError::UnsupportedConfig(err.to_string()))?;
    if default_config.sample_format() != cpal::SampleFormat::F32 {
        return Err(AudioError::UnsupportedConfig(
            "default output format is not f32".to_string(),
        ));
    }
    Ok(default_config.config())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utterance(start_frame: u64, samples: Vec<f32>) -> Utterance {
        Utterance {
            samples: Arc::new(samples),
            start_frame,
            channels: 2,
        }
    }

    #[test]
    fn test_mix_copies_overlap_only() {
        let item = utterance(2, vec![0.5; 8]);
        let mut data = vec![0.0; 8];
        mix_into(&mut data, &item, 0, 4, 2);
        assert_eq!(data, vec![0.0, 0.0, 0.0, 0.0, 0.5, 0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_mix_skips_channel_mismatch_and_past_items() {
        let item = utterance(0, vec![1.0; 4]);
        let mut data = vec![0.0; 4];
        mix_into(&mut data, &item, 0, 4, 1);
        mix_into(&mut data, &item, 10, 12, 2);
        assert!(data.iter().all(|sample| *sample == 0.0));
    }
}
