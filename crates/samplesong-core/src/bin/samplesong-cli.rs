use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::{Parser, Subcommand};
use samplesong_core::{
    PipelineError, RenderOptions, SampleAnalyzer, SamplesongConfig,
    diagnostics::init_tracing,
    fixtures::{two_note_score, write_tone_wav},
    render_performance, save_report,
};

#[derive(Debug, Parser)]
#[command(name = "samplesong-cli")]
#[command(about = "Turn one audio sample into a performance of a MIDI score")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, clap::Args)]
struct RenderArgs {
    #[arg(long)]
    transpose: Option<i32>,

    #[arg(long)]
    speed: Option<f64>,

    #[arg(long)]
    chunk_size: Option<usize>,

    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Render {
        #[arg(long)]
        sample: PathBuf,

        #[arg(long)]
        score: PathBuf,

        #[arg(long, default_value = "out.wav")]
        output: PathBuf,

        #[command(flatten)]
        args: RenderArgs,
    },
    Analyze {
        #[arg(long)]
        sample: PathBuf,

        #[arg(long)]
        chunk_size: Option<usize>,
    },
    Demo {
        #[arg(long, default_value = "data/demo")]
        output_dir: PathBuf,

        #[command(flatten)]
        args: RenderArgs,
    },
}

impl RenderArgs {
    fn apply(&self, options: &mut RenderOptions) {
        if let Some(transpose) = self.transpose {
            options.score.transpose = transpose;
        }
        if let Some(speed) = self.speed {
            options.score.speed = speed;
        }
        if let Some(chunk_size) = self.chunk_size {
            options.chunk_size = chunk_size;
        }
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let config = SamplesongConfig::load(cli.config.as_deref())?;
    let log_dir = cli.log_dir.unwrap_or_else(|| config.paths.logs_dir.clone());
    let _telemetry = init_tracing(&log_dir, &config.diagnostics)?;
    let mut options = RenderOptions::from_config(&config);

    let result = match cli.command {
        Commands::Render {
            sample,
            score,
            output,
            args,
        } => {
            args.apply(&mut options);
            render(&sample, &score, &output, &options, args.report.as_deref())
        }
        Commands::Analyze { sample, chunk_size } => {
            let chunk_size = chunk_size.unwrap_or(options.chunk_size);
            analyze(&sample, chunk_size)
        }
        Commands::Demo { output_dir, args } => {
            args.apply(&mut options);
            std::fs::create_dir_all(&output_dir)?;
            let sample = output_dir.join("tone.wav");
            let score = output_dir.join("two-notes.mid");
            write_tone_wav(&sample, 220.0, 22_050, 2.0)?;
            std::fs::write(&score, two_note_score()?)?;
            render(
                &sample,
                &score,
                &output_dir.join("performance.wav"),
                &options,
                args.report.as_deref(),
            )
        }
    };

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(error) => {
            tracing::error!(class = ?error.class(), %error, "run aborted");
            eprintln!("error: {error}");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn render(
    sample: &Path,
    score: &Path,
    output: &Path,
    options: &RenderOptions,
    report_path: Option<&Path>,
) -> Result<(), PipelineError> {
    let report = render_performance(sample, score, output, options)?;
    println!(
        "Rendered {} notes (highest pitch {:.1}) over a {:.2} Hz sample into {}",
        report.note_count, report.max_pitch, report.fundamental_hz, report.output_path
    );

    if let Some(path) = report_path {
        save_report(path, &report)?;
    }
    Ok(())
}

fn analyze(sample: &Path, chunk_size: usize) -> Result<(), PipelineError> {
    let mut analyzer = SampleAnalyzer::load(sample, chunk_size)?;
    let fundamental = analyzer.fundamental_frequency()?;
    println!(
        "Fundamental frequency: {fundamental:.2} Hz (chunk size {})",
        analyzer.chunk_size()
    );
    Ok(())
}
