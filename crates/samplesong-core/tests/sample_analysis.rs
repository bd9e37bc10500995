use std::path::Path;

use samplesong_core::{
    SampleAnalyzer, SampleError, SpectrumError,
    fixtures::{sine_tone, write_tone_wav},
    sample::Sample,
};
use tempfile::tempdir;

fn write_wav<S: hound::Sample + Copy>(path: &Path, spec: hound::WavSpec, frames: &[S]) {
    let mut writer = hound::WavWriter::create(path, spec).expect("test wav should be creatable");
    for &frame in frames {
        writer
            .write_sample(frame)
            .expect("test wav sample write should succeed");
    }
    writer.finalize().expect("test wav finalize should succeed");
}

#[test]
fn pure_tone_fundamental_is_within_one_bin() {
    let temp = tempdir().expect("tempdir should be creatable");
    let sample_rate = 44_100;
    let chunk_size = 4_096;

    for frequency in [110.0, 261.63, 440.0, 1_234.5] {
        let path = temp.path().join(format!("tone-{frequency}.wav"));
        write_tone_wav(&path, frequency, sample_rate, 1.5).expect("tone should be writable");

        let mut analyzer =
            SampleAnalyzer::load(&path, chunk_size).expect("tone should load");
        let detected = analyzer
            .fundamental_frequency()
            .expect("fundamental should be found");
        let bin_width = f64::from(sample_rate) / chunk_size as f64;
        assert!(
            (detected - frequency).abs() <= bin_width,
            "detected {detected} Hz for a {frequency} Hz tone (bin width {bin_width})"
        );
    }
}

#[test]
fn loaded_sample_has_zero_mean() {
    let temp = tempdir().expect("tempdir should be creatable");
    let path = temp.path().join("offset.wav");
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let frames: Vec<i16> = sine_tone(300.0, 8_000, 0.5, 0.3)
        .into_iter()
        .map(|frame| frame.saturating_add(4_000))
        .collect();
    write_wav(&path, spec, &frames);

    let sample = Sample::load(&path).expect("sample should load");
    assert_eq!(sample.sample_rate, 8_000);
    assert_eq!(sample.bit_depth, 16);
    assert!(sample.mean().abs() < 1.0, "mean was {}", sample.mean());
}

#[test]
fn only_channel_zero_is_kept() {
    let temp = tempdir().expect("tempdir should be creatable");
    let path = temp.path().join("stereo.wav");
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: 8_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    write_wav(&path, spec, &[100_i16, 7, -100, 7, 100, 7, -100, 7]);

    let sample = Sample::load(&path).expect("stereo sample should load");
    assert_eq!(sample.frames(), &[100, -100, 100, -100]);
}

#[test]
fn eight_and_twenty_four_bit_keep_native_width() {
    let temp = tempdir().expect("tempdir should be creatable");

    let narrow = temp.path().join("narrow.wav");
    write_wav(
        &narrow,
        hound::WavSpec {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 8,
            sample_format: hound::SampleFormat::Int,
        },
        &[100_i8, -100, 50, -50],
    );
    let sample = Sample::load(&narrow).expect("8-bit sample should load");
    assert_eq!(sample.bit_depth, 8);
    assert_eq!(sample.frames(), &[100, -100, 50, -50]);

    let wide = temp.path().join("wide.wav");
    write_wav(
        &wide,
        hound::WavSpec {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 24,
            sample_format: hound::SampleFormat::Int,
        },
        &[4_000_000_i32, -4_000_000],
    );
    let sample = Sample::load(&wide).expect("24-bit sample should load");
    assert_eq!(sample.bit_depth, 24);
    assert_eq!(sample.frames(), &[4_000_000, -4_000_000]);
}

#[test]
fn non_wav_extensions_decode_through_symphonia() {
    let temp = tempdir().expect("tempdir should be creatable");
    let wav = temp.path().join("tone.wav");
    write_tone_wav(&wav, 440.0, 22_050, 0.5).expect("tone should be writable");
    let renamed = temp.path().join("tone.sample");
    std::fs::copy(&wav, &renamed).expect("copy should succeed");

    let sample = Sample::load(&renamed).expect("probed sample should load");
    assert_eq!(sample.sample_rate, 22_050);
    assert_eq!(sample.bit_depth, 32);
    assert_eq!(sample.len(), 11_025);
}

#[test]
fn missing_file_is_unreadable() {
    let temp = tempdir().expect("tempdir should be creatable");
    let err = Sample::load(&temp.path().join("missing.wav")).expect_err("missing file");
    assert!(matches!(err, SampleError::UnreadableFile { .. }));
}

#[test]
fn silent_sample_fails_without_unbounded_halving() {
    let sample = Sample::from_frames(vec![0; 10_000], 8_000, 16);
    let mut analyzer = SampleAnalyzer::new(sample, 8_192);
    let err = analyzer
        .fundamental_frequency()
        .expect_err("silence has no fundamental");
    assert!(matches!(err, SpectrumError::Degenerate { .. }));
}

#[test]
fn float_wav_is_scaled_into_32_bit_domain() {
    let temp = tempdir().expect("tempdir should be creatable");
    let path = temp.path().join("float.wav");
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8_000,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    write_wav(&path, spec, &[0.5_f32, -0.5, 0.25, -0.25]);

    let sample = Sample::load(&path).expect("float wav should load");
    assert_eq!(sample.bit_depth, 32);
    assert_eq!(
        sample.frames(),
        &[1_073_741_824, -1_073_741_824, 536_870_912, -536_870_912]
    );
}
