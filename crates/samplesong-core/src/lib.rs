pub mod analysis;
pub mod cache;
pub mod config;
pub mod diagnostics;
pub mod fixtures;
pub mod midi;
pub mod mixer;
pub mod pipeline;
pub mod render;
pub mod report;
pub mod sample;
pub mod score;
pub mod time;

pub use analysis::{SampleAnalyzer, Spectrum, SpectrumError, compute_spectrum};
pub use cache::{CachePolicy, CacheStats, CachedRender, RenderCache, RenderKey};
pub use config::SamplesongConfig;
pub use diagnostics::{TelemetryGuard, init_tracing};
pub use midi::{decode_score_bytes, decode_score_file};
pub use mixer::Mixer;
pub use pipeline::{
    ErrorClass, PipelineError, RenderOptions, RenderedMix, render_performance, render_score,
    save_report, write_output_wav,
};
pub use render::{render_note_shape, tail_threshold};
pub use report::RenderReport;
pub use sample::{Sample, SampleError};
pub use score::{
    Note, ParsedScore, ScoreError, ScoreMessage, ScoreOptions, ScoreParser, ScoreWarning,
    TimedMessage,
};
