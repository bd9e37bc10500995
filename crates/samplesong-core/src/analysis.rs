use std::path::Path;

use rustfft::{FftPlanner, num_complex::Complex64};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::sample::{Sample, SampleError};

pub const DEFAULT_CHUNK_SIZE: usize = 8_192;

pub const MIN_CHUNK_SIZE: usize = 2;

#[derive(Debug, Error, PartialEq)]
pub enum SpectrumError {
    #[error("chunk size must be at least {MIN_CHUNK_SIZE}, got {0}")]
    InvalidChunkSize(usize),
    #[error("spectrum stayed all-zero down to chunk size {MIN_CHUNK_SIZE} ({frames} frames analysed)")]
    Degenerate { frames: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spectrum {
    pub bins: Vec<f64>,
    pub spacing: f64,
    pub chunk_size: usize,
}

impl Spectrum {
    #[must_use]
    pub fn is_silent(&self) -> bool {
        self.bins.iter().all(|&bin| bin == 0.0)
    }

    #[must_use]
    pub fn peak_frequency(&self) -> Option<f64> {
        let (index, _) = self
            .bins
            .iter()
            .skip(1)
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (index, &magnitude)| match best {
                Some((_, best_magnitude)) if best_magnitude >= magnitude => best,
                _ => Some((index, magnitude)),
            })?;
        Some(index as f64 * self.spacing + self.spacing / 2.0)
    }
}

#[instrument(skip(frames), fields(frames = frames.len()))]
pub fn compute_spectrum(
    frames: &[i32],
    sample_rate: u32,
    chunk_size: usize,
) -> Result<Spectrum, SpectrumError> {
    if chunk_size < MIN_CHUNK_SIZE {
        return Err(SpectrumError::InvalidChunkSize(chunk_size));
    }

    let mut planner = FftPlanner::<f64>::new();
    let mut chunk_size = chunk_size;
    while chunk_size >= MIN_CHUNK_SIZE {
        let spectrum = accumulate_windows(&mut planner, frames, sample_rate, chunk_size);
        if !spectrum.is_silent() {
            debug!(chunk_size, bins = spectrum.bins.len(), "spectrum computed");
            return Ok(spectrum);
        }

        debug!(chunk_size, "spectrum all-zero, halving chunk size");
        chunk_size /= 2;
    }

    Err(SpectrumError::Degenerate {
        frames: frames.len(),
    })
}

fn accumulate_windows(
    planner: &mut FftPlanner<f64>,
    frames: &[i32],
    sample_rate: u32,
    chunk_size: usize,
) -> Spectrum {
    let fft = planner.plan_fft_forward(chunk_size);
    let mut bins = vec![0.0_f64; chunk_size / 2];
    let mut buffer = Vec::with_capacity(chunk_size);

    for window in frames.chunks_exact(chunk_size) {
        buffer.clear();
        buffer.extend(window.iter().map(|&frame| Complex64::new(f64::from(frame), 0.0)));
        fft.process(&mut buffer);
        for (bin, value) in bins.iter_mut().zip(&buffer) {
            *bin += value.norm();
        }
    }

    Spectrum {
        bins,
        spacing: f64::from(sample_rate) / chunk_size as f64,
        chunk_size,
    }
}

#[derive(Debug, Clone)]
pub struct SampleAnalyzer {
    sample: Sample,
    chunk_size: usize,
    spectrum: Option<Spectrum>,
    fundamental: Option<f64>,
}

impl SampleAnalyzer {
    #[must_use]
    pub fn new(sample: Sample, chunk_size: usize) -> Self {
        Self {
            sample,
            chunk_size,
            spectrum: None,
            fundamental: None,
        }
    }

    pub fn load(path: &Path, chunk_size: usize) -> Result<Self, SampleError> {
        Ok(Self::new(Sample::load(path)?, chunk_size))
    }

    #[must_use]
    pub fn sample(&self) -> &Sample {
        &self.sample
    }

    #[must_use]
    pub fn into_sample(self) -> Sample {
        self.sample
    }

    pub fn spectrum(&mut self) -> Result<&Spectrum, SpectrumError> {
        let spectrum = match self.spectrum.take() {
            Some(spectrum) => spectrum,
            None => compute_spectrum(
                self.sample.frames(),
                self.sample.sample_rate,
                self.chunk_size,
            )?,
        };
        self.chunk_size = spectrum.chunk_size;
        Ok(self.spectrum.insert(spectrum))
    }

    #[instrument(skip(self), fields(chunk_size = self.chunk_size))]
    pub fn fundamental_frequency(&mut self) -> Result<f64, SpectrumError> {
        if let Some(fundamental) = self.fundamental {
            return Ok(fundamental);
        }

        let frames = self.sample.len();
        let fundamental = self
            .spectrum()?
            .peak_frequency()
            .ok_or(SpectrumError::Degenerate { frames })?;
        self.fundamental = Some(fundamental);
        info!(fundamental_hz = fundamental, "fundamental frequency detected");
        Ok(fundamental)
    }

    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}
