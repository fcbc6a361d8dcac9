//! 16-bit PCM helpers for synthesized speech.

use super::AudioError;

/// Decode little-endian signed 16-bit samples.
pub fn decode_pcm16_le(bytes: &[u8]) -> Result<Vec<i16>, AudioError> {
    if bytes.len() % 2 != 0 {
        return Err(AudioError::InvalidPcm(format!(
            "odd byte count {} for 16-bit samples",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Linear interpolation between neighbouring samples; fine for speech.
pub fn resample_linear(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let new_len = (samples.len() as f64 / ratio) as usize;
    let mut output = Vec::with_capacity(new_len);

    for i in 0..new_len {
        let src_pos = i as f64 * ratio;
        let src_idx = src_pos as usize;
        let frac = src_pos - src_idx as f64;

        let s1 = samples.get(src_idx).copied().unwrap_or(0);
        let s2 = samples.get(src_idx + 1).copied().unwrap_or(s1);

        let interpolated = s1 as f64 * (1.0 - frac) + s2 as f64 * frac;
        output.push(interpolated as i16);
    }

    output
}

/// Mono i16 to interleaved f32 with the sample copied to every channel.
pub fn to_interleaved_f32(samples: &[i16], channels: u16) -> Vec<f32> {
    let channels = channels.max(1) as usize;
    let mut output = Vec::with_capacity(samples.len() * channels);
    for sample in samples {
        let value = *sample as f32 / 32768.0;
        output.extend(std::iter::repeat(value).take(channels));
    }
    output
}
