use samplesong_core::{
    ErrorClass, PipelineError, RenderOptions, ScoreError,
    fixtures::{ScriptedEvent, scripted_score, two_note_score, write_tone_wav},
    render::tail_threshold,
    render_performance,
    report::{read_render_report, write_render_report},
};
use tempfile::tempdir;

const SAMPLE_RATE: u32 = 8_000;

#[test]
fn two_note_score_renders_normalized_mono_output() {
    let temp = tempdir().expect("tempdir should be creatable");
    let sample_path = temp.path().join("tone.wav");
    let score_path = temp.path().join("two-notes.mid");
    let output_path = temp.path().join("out").join("performance.wav");
    write_tone_wav(&sample_path, 220.0, SAMPLE_RATE, 2.0).expect("tone should be writable");
    std::fs::write(&score_path, two_note_score().expect("fixture should encode"))
        .expect("score should be writable");

    let options = RenderOptions {
        chunk_size: 1_024,
        ..RenderOptions::default()
    };
    let report = render_performance(&sample_path, &score_path, &output_path, &options)
        .expect("render should succeed");

    let tail = tail_threshold(SAMPLE_RATE, options.tail_seconds);
    let score_length = 12_000;
    assert_eq!(report.note_count, 2);
    assert!((report.max_pitch - 76.0).abs() < 1e-12);
    assert_eq!(report.score_length, score_length);
    assert_eq!(report.output_frames, score_length + 1 + tail);
    assert!((report.fundamental_hz - 220.0).abs() <= f64::from(SAMPLE_RATE) / 1_024.0);
    assert!(report.warnings.is_empty());

    let mut reader = hound::WavReader::open(&output_path).expect("output should be readable");
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, SAMPLE_RATE);
    assert_eq!(spec.bits_per_sample, 32);
    assert_eq!(spec.sample_format, hound::SampleFormat::Int);
    assert_eq!(reader.duration() as usize, score_length + 1 + tail);

    let samples: Vec<i32> = reader
        .samples::<i32>()
        .collect::<Result<_, _>>()
        .expect("samples should decode");
    assert_eq!(samples.iter().copied().min(), Some(i32::MIN));
    assert_eq!(samples.iter().copied().max(), Some(i32::MAX));

    let report_path = temp.path().join("report.json");
    write_render_report(&report_path, &report).expect("report should be writable");
    let restored = read_render_report(&report_path).expect("report should parse");
    assert_eq!(restored, report);
}

#[test]
fn dangling_note_off_aborts_without_output() {
    let temp = tempdir().expect("tempdir should be creatable");
    let sample_path = temp.path().join("tone.wav");
    let score_path = temp.path().join("broken.mid");
    let output_path = temp.path().join("never.wav");
    write_tone_wav(&sample_path, 330.0, SAMPLE_RATE, 1.0).expect("tone should be writable");
    let bytes = scripted_score(
        0,
        &[
            ScriptedEvent::NoteOn {
                beat: 0.0,
                key: 60,
                velocity: 90,
            },
            ScriptedEvent::NoteOff { beat: 1.0, key: 60 },
            ScriptedEvent::NoteOff { beat: 2.0, key: 60 },
        ],
    )
    .expect("fixture should encode");
    std::fs::write(&score_path, bytes).expect("score should be writable");

    let err = render_performance(
        &sample_path,
        &score_path,
        &output_path,
        &RenderOptions::default(),
    )
    .expect_err("dangling note-off must abort");

    assert!(matches!(
        err,
        PipelineError::Score(ScoreError::DanglingNoteOff { key: 60, .. })
    ));
    assert_eq!(err.class(), ErrorClass::UserInput);
    assert!(!output_path.exists());
}

#[test]
fn unreadable_sample_aborts_before_parsing() {
    let temp = tempdir().expect("tempdir should be creatable");
    let sample_path = temp.path().join("not-audio.wav");
    std::fs::write(&sample_path, b"plain text").expect("file should be writable");
    let output_path = temp.path().join("never.wav");

    let err = render_performance(
        &sample_path,
        &temp.path().join("missing.mid"),
        &output_path,
        &RenderOptions::default(),
    )
    .expect_err("unreadable sample must abort");

    assert!(matches!(err, PipelineError::Sample(_)));
    assert_eq!(err.class(), ErrorClass::UserInput);
    assert!(!output_path.exists());
}

#[test]
fn invalid_speed_is_rejected_up_front() {
    let temp = tempdir().expect("tempdir should be creatable");
    let mut options = RenderOptions::default();
    options.score.speed = -1.0;

    let err = render_performance(
        &temp.path().join("a.wav"),
        &temp.path().join("b.mid"),
        &temp.path().join("c.wav"),
        &options,
    )
    .expect_err("negative speed must fail");
    assert!(matches!(err, PipelineError::InvalidOptions(_)));
}

#[test]
fn oversized_tail_is_rejected_before_rendering() {
    let temp = tempdir().expect("tempdir should be creatable");
    let sample_path = temp.path().join("tone.wav");
    let score_path = temp.path().join("two-notes.mid");
    let output_path = temp.path().join("never.wav");
    write_tone_wav(&sample_path, 220.0, SAMPLE_RATE, 1.0).expect("tone should be writable");
    std::fs::write(&score_path, two_note_score().expect("fixture should encode"))
        .expect("score should be writable");

    let options = RenderOptions {
        tail_seconds: 1e30,
        ..RenderOptions::default()
    };
    let err = render_performance(&sample_path, &score_path, &output_path, &options)
        .expect_err("an absurd tail must not render");

    assert!(matches!(err, PipelineError::InvalidOptions(_)));
    assert_eq!(err.class(), ErrorClass::UserInput);
    assert!(!output_path.exists());
}
