use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{cache::CacheStats, score::ScoreWarning};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RenderReport {
    pub sample_path: String,
    pub score_path: String,
    pub output_path: String,
    pub sample_rate: u32,
    pub bit_depth: u16,
    pub fundamental_hz: f64,
    pub chunk_size: usize,
    pub tail_threshold: usize,
    pub note_count: usize,
    pub score_length: usize,
    pub output_frames: usize,
    pub max_polyphony: usize,
    pub max_pitch: f64,
    pub cache: CacheStats,
    pub warnings: Vec<ScoreWarning>,
}

pub fn read_render_report(path: &Path) -> Result<RenderReport> {
    let bytes = fs::read(path)
        .with_context(|| format!("failed to read render report: {}", path.display()))?;
    let report: RenderReport =
        serde_json::from_slice(&bytes).context("failed to parse render report json")?;
    Ok(report)
}

pub fn write_render_report(path: &Path, report: &RenderReport) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create report directory: {}", parent.display()))?;
    }

    let json = serde_json::to_vec_pretty(report).context("failed to encode render report json")?;
    fs::write(path, json)
        .with_context(|| format!("failed to write render report: {}", path.display()))?;
    Ok(())
}
