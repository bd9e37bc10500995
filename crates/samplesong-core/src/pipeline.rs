use std::{
    fs,
    io::BufWriter,
    path::Path,
};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::{
    analysis::{MIN_CHUNK_SIZE, SampleAnalyzer, SpectrumError},
    cache::{CachePolicy, CacheStats, RenderCache},
    config::SamplesongConfig,
    midi::decode_score_file,
    mixer::Mixer,
    render::{render_note_shape, tail_threshold},
    report::{RenderReport, write_render_report},
    sample::{Sample, SampleError},
    score::{ParsedScore, ScoreError, ScoreOptions, ScoreParser},
};

pub const OUTPUT_BITS_PER_SAMPLE: u16 = 32;
pub const MAX_TAIL_SECONDS: f64 = 1.0;
pub const MIN_SPEED: f64 = 0.01;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Sample(#[from] SampleError),
    #[error(transparent)]
    Spectrum(#[from] SpectrumError),
    #[error(transparent)]
    Score(#[from] ScoreError),
    #[error("invalid options: {0}")]
    InvalidOptions(String),
    #[error("failed to write output {path}: {reason}")]
    Output { path: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    UserInput,
    InternalInvariant,
    Output,
}

impl PipelineError {
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Spectrum(SpectrumError::Degenerate { .. }) => ErrorClass::InternalInvariant,
            Self::Sample(_)
            | Self::Score(_)
            | Self::InvalidOptions(_)
            | Self::Spectrum(SpectrumError::InvalidChunkSize(_)) => ErrorClass::UserInput,
            Self::Output { .. } => ErrorClass::Output,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderOptions {
    pub score: ScoreOptions,
    pub chunk_size: usize,
    pub tail_seconds: f64,
    pub cache: CachePolicy,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::from_config(&SamplesongConfig::default())
    }
}

impl RenderOptions {
    #[must_use]
    pub fn from_config(config: &SamplesongConfig) -> Self {
        Self {
            score: ScoreOptions {
                transpose: config.render.transpose,
                speed: config.render.speed,
            },
            chunk_size: config.analysis.chunk_size,
            tail_seconds: config.render.tail_seconds,
            cache: config.cache,
        }
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(self.score.speed.is_finite() && self.score.speed >= MIN_SPEED) {
            return Err(PipelineError::InvalidOptions(format!(
                "speed must be at least {MIN_SPEED}, got {}",
                self.score.speed
            )));
        }
        if self.chunk_size < MIN_CHUNK_SIZE {
            return Err(PipelineError::InvalidOptions(format!(
                "chunk size must be at least {MIN_CHUNK_SIZE}, got {}",
                self.chunk_size
            )));
        }
        if !(0.0..=MAX_TAIL_SECONDS).contains(&self.tail_seconds) {
            return Err(PipelineError::InvalidOptions(format!(
                "tail seconds must be between 0 and {MAX_TAIL_SECONDS}, got {}",
                self.tail_seconds
            )));
        }
        if !(self.cache.max_age_seconds.is_finite() && self.cache.max_age_seconds >= 0.0) {
            return Err(PipelineError::InvalidOptions(format!(
                "cache max age must be zero or more, got {}",
                self.cache.max_age_seconds
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMix {
    pub frames: Vec<i32>,
    pub cache: CacheStats,
}

#[instrument(skip(sample, score), fields(notes = score.note_count, length = score.length))]
pub fn render_score(
    sample: &Sample,
    score: &ParsedScore,
    tail_threshold: usize,
    policy: CachePolicy,
) -> Result<RenderedMix, PipelineError> {
    let frames = output_frames(score.length, tail_threshold)?;
    let mut mixer = Mixer::new(frames);
    let mut cache = RenderCache::new(policy, sample.sample_rate);

    for note in score.iter() {
        let shape = cache.get_or_render(note, |note| render_note_shape(note, sample, tail_threshold));
        mixer.add(shape, note.start, note.volume);
        cache.note_processed(note.start);
    }

    let stats = cache.stats();
    debug!(
        hits = stats.hits,
        misses = stats.misses,
        evictions = stats.evictions,
        cached = cache.len(),
        "notes rendered"
    );

    Ok(RenderedMix {
        frames: mixer.finalize(),
        cache: stats,
    })
}

pub fn output_frames(score_length: usize, tail_threshold: usize) -> Result<usize, PipelineError> {
    score_length
        .checked_add(1)
        .and_then(|frames| frames.checked_add(tail_threshold))
        .ok_or_else(|| {
            PipelineError::InvalidOptions(format!(
                "output of {score_length} frames plus a {tail_threshold} frame tail is too long"
            ))
        })
}

#[instrument(skip_all, fields(sample = %sample_path.display(), score = %score_path.display(), output = %output_path.display()))]
pub fn render_performance(
    sample_path: &Path,
    score_path: &Path,
    output_path: &Path,
    options: &RenderOptions,
) -> Result<RenderReport, PipelineError> {
    options.validate()?;

    let mut analyzer = SampleAnalyzer::load(sample_path, options.chunk_size)?;
    let fundamental_hz = analyzer.fundamental_frequency()?;
    let chunk_size = analyzer.chunk_size();
    let sample = analyzer.into_sample();

    let messages = decode_score_file(score_path)?;
    let score = ScoreParser::new(sample.sample_rate, fundamental_hz, options.score).parse(messages)?;

    let tail_threshold = tail_threshold(sample.sample_rate, options.tail_seconds);
    let mix = render_score(&sample, &score, tail_threshold, options.cache)?;
    write_output_wav(output_path, sample.sample_rate, &mix.frames)?;

    info!(
        notes = score.note_count,
        frames = mix.frames.len(),
        fundamental_hz,
        "performance rendered"
    );

    Ok(RenderReport {
        sample_path: sample_path.display().to_string(),
        score_path: score_path.display().to_string(),
        output_path: output_path.display().to_string(),
        sample_rate: sample.sample_rate,
        bit_depth: sample.bit_depth,
        fundamental_hz,
        chunk_size,
        tail_threshold,
        note_count: score.note_count,
        score_length: score.length,
        output_frames: mix.frames.len(),
        max_polyphony: score.max_polyphony,
        max_pitch: score.max_pitch,
        cache: mix.cache,
        warnings: score.warnings,
    })
}

pub fn save_report(path: &Path, report: &RenderReport) -> Result<(), PipelineError> {
    write_render_report(path, report).map_err(|error| PipelineError::Output {
        path: path.display().to_string(),
        reason: format!("{error:#}"),
    })
}

#[instrument(skip(frames), fields(path = %path.display(), frames = frames.len()))]
pub fn write_output_wav(path: &Path, sample_rate: u32, frames: &[i32]) -> Result<(), PipelineError> {
    persist_wav(path, sample_rate, frames).map_err(|error| PipelineError::Output {
        path: path.display().to_string(),
        reason: format!("{error:#}"),
    })
}

fn persist_wav(path: &Path, sample_rate: u32, frames: &[i32]) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)
        .with_context(|| format!("failed to create output directory: {}", parent.display()))?;

    let mut temp_file =
        tempfile::NamedTempFile::new_in(parent).context("failed to create temp output file")?;

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: OUTPUT_BITS_PER_SAMPLE,
        sample_format: hound::SampleFormat::Int,
    };
    {
        let mut writer = hound::WavWriter::new(BufWriter::new(temp_file.as_file_mut()), spec)
            .context("failed to start wav stream")?;
        for &frame in frames {
            writer
                .write_sample(frame)
                .context("failed to write output sample")?;
        }
        writer.finalize().context("failed to finalize wav file")?;
    }

    temp_file
        .persist(path)
        .map_err(|error| anyhow::anyhow!(error.error))
        .with_context(|| format!("failed to persist output: {}", path.display()))?;

    info!("wav written");
    Ok(())
}
