//! Sample rate conversion and channel mixing

use rubato::{FftFixedIn, Resampler};

use crate::{Error, Result};

/// Frames fed to the resampler per block
const CHUNK_FRAMES: usize = 1024;

/// Convert mono samples from one sample rate to another
///
/// # Errors
///
/// Returns error if the resampler rejects the rates
pub fn resample(samples: &[f32], from: u32, to: u32) -> Result<Vec<f32>> {
    if from == to || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let mut resampler = FftFixedIn::<f32>::new(from as usize, to as usize, CHUNK_FRAMES, 2, 1)
        .map_err(|e| Error::Audio(format!("resampler setup failed: {e}")))?;

    #[allow(clippy::cast_possible_truncation)]
    let expected = (samples.len() as u64 * u64::from(to) / u64::from(from)) as usize;
    let delay = resampler.output_delay();
    let mut output = Vec::with_capacity(delay + expected + CHUNK_FRAMES);

    // Keep feeding silence past the end until the delayed tail has come out
    let mut position = 0;
    while position < samples.len() || output.len() < delay + expected {
        let needed = resampler.input_frames_next();
        let start = position.min(samples.len());
        let end = (position + needed).min(samples.len());

        let mut block = samples[start..end].to_vec();
        block.resize(needed, 0.0);

        let processed = resampler
            .process(&[block], None)
            .map_err(|e| Error::Audio(format!("resampling failed: {e}")))?;
        if let Some(channel) = processed.first() {
            output.extend_from_slice(channel);
        }

        position += needed;
    }

    output.drain(..delay);
    output.truncate(expected);
    Ok(output)
}

/// Average interleaved frames down to mono
#[must_use]
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }

    #[allow(clippy::cast_precision_loss)]
    let scale = 1.0 / channels as f32;
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() * scale)
        .collect()
}
