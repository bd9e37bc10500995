use std::{fs::File, io::ErrorKind, path::Path};

use serde::{Deserialize, Serialize};
use symphonia::core::{
    audio::SampleBuffer, codecs::DecoderOptions, errors::Error as SymphoniaError,
    formats::FormatOptions, io::MediaSourceStream, meta::MetadataOptions, probe::Hint,
};
use thiserror::Error;
use tracing::{debug, instrument};

pub const MAX_BIT_DEPTH: u16 = 32;

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("unreadable sample file {path}: {reason}")]
    UnreadableFile { path: String, reason: String },
    #[error("sample file {path} contains no audio frames")]
    Empty { path: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub sample_rate: u32,
    pub bit_depth: u16,
    frames: Vec<i32>,
}

impl Sample {
    #[must_use]
    pub fn from_frames(mut frames: Vec<i32>, sample_rate: u32, bit_depth: u16) -> Self {
        remove_dc_offset(&mut frames);
        Self {
            sample_rate,
            bit_depth: bit_depth.min(MAX_BIT_DEPTH),
            frames,
        }
    }

    #[instrument(fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, SampleError> {
        let is_wav = path
            .extension()
            .and_then(|value| value.to_str())
            .is_some_and(|value| value.eq_ignore_ascii_case("wav"));

        let (frames, sample_rate, bit_depth) = if is_wav {
            read_wav_channel_zero(path)?
        } else {
            decode_channel_zero(path)?
        };

        if frames.is_empty() {
            return Err(SampleError::Empty {
                path: path.display().to_string(),
            });
        }

        let sample = Self::from_frames(frames, sample_rate, bit_depth);
        debug!(
            sample_rate = sample.sample_rate,
            bit_depth = sample.bit_depth,
            frames = sample.len(),
            "sample loaded"
        );
        Ok(sample)
    }

    #[must_use]
    pub fn frames(&self) -> &[i32] {
        &self.frames
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[must_use]
    pub fn full_scale(&self) -> f64 {
        2_f64.powi(i32::from(self.bit_depth.clamp(1, MAX_BIT_DEPTH)) - 1)
    }

    #[must_use]
    pub fn mean(&self) -> f64 {
        if self.frames.is_empty() {
            return 0.0;
        }

        let sum: i64 = self.frames.iter().map(|&frame| i64::from(frame)).sum();
        sum as f64 / self.frames.len() as f64
    }
}

#[must_use]
pub fn scale_to_domain(raw: i64, bit_depth: u16) -> i32 {
    if bit_depth > MAX_BIT_DEPTH {
        let shift = u32::from(bit_depth - MAX_BIT_DEPTH);
        return (raw >> shift.min(63)) as i32;
    }
    raw.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

fn remove_dc_offset(frames: &mut [i32]) {
    if frames.is_empty() {
        return;
    }

    let sum: i64 = frames.iter().map(|&frame| i64::from(frame)).sum();
    // Truncating division keeps the offset an integer, like the stored frames.
    let mean = sum / frames.len() as i64;
    for frame in frames.iter_mut() {
        *frame = scale_to_domain(i64::from(*frame) - mean, MAX_BIT_DEPTH);
    }
}

fn read_wav_channel_zero(path: &Path) -> Result<(Vec<i32>, u32, u16), SampleError> {
    let unreadable = |reason: String| SampleError::UnreadableFile {
        path: path.display().to_string(),
        reason,
    };

    let mut reader = hound::WavReader::open(path).map_err(|error| unreadable(error.to_string()))?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let frames = match spec.sample_format {
        hound::SampleFormat::Int => reader
            .samples::<i32>()
            .step_by(channels)
            .map(|sample| sample.map(|value| scale_to_domain(i64::from(value), spec.bits_per_sample)))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|error| unreadable(error.to_string()))?,
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .step_by(channels)
            .map(|sample| sample.map(float_to_domain))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|error| unreadable(error.to_string()))?,
    };

    let bit_depth = match spec.sample_format {
        hound::SampleFormat::Int => spec.bits_per_sample.min(MAX_BIT_DEPTH),
        hound::SampleFormat::Float => MAX_BIT_DEPTH,
    };

    Ok((frames, spec.sample_rate, bit_depth))
}

fn decode_channel_zero(path: &Path) -> Result<(Vec<i32>, u32, u16), SampleError> {
    let unreadable = |reason: String| SampleError::UnreadableFile {
        path: path.display().to_string(),
        reason,
    };

    let file = File::open(path).map_err(|error| unreadable(error.to_string()))?;
    let source = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|value| value.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|error| unreadable(error.to_string()))?;
    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| unreadable("no default audio track".to_string()))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or_default();
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|error| unreadable(error.to_string()))?;

    let mut frames = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(error)) if error.kind() == ErrorKind::UnexpectedEof => {
                break;
            }
            Err(error) => return Err(unreadable(error.to_string())),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(error) => return Err(unreadable(error.to_string())),
        };

        let spec = *decoded.spec();
        sample_rate = spec.rate;
        let channel_count = spec.channels.count().max(1);
        let mut buffer = SampleBuffer::<i32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        frames.extend(buffer.samples().chunks(channel_count).map(|frame| frame[0]));
    }

    if sample_rate == 0 {
        return Err(unreadable("unknown sample rate".to_string()));
    }

    Ok((frames, sample_rate, MAX_BIT_DEPTH))
}

fn float_to_domain(value: f32) -> i32 {
    (f64::from(value.clamp(-1.0, 1.0)) * f64::from(i32::MAX)).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dc_offset_is_removed_with_integer_mean() {
        let sample = Sample::from_frames(vec![110, 90, 105, 95, 100], 8_000, 16);
        assert_eq!(sample.frames(), &[10, -10, 5, -5, 0]);
        assert_eq!(sample.mean(), 0.0);
    }

    #[test]
    fn wide_sources_are_scaled_into_32_bit_domain() {
        let raw = i64::from(i32::MAX) << 32;
        assert_eq!(scale_to_domain(raw, 64), i32::MAX);
        assert_eq!(scale_to_domain(-1_234, 16), -1_234);
    }

    #[test]
    fn full_scale_follows_bit_depth() {
        let sample = Sample::from_frames(vec![0, 1], 8_000, 8);
        assert_eq!(sample.full_scale(), 128.0);
        let sample = Sample::from_frames(vec![0, 1], 8_000, 16);
        assert_eq!(sample.full_scale(), 32_768.0);
    }
}
