use crate::{sample::Sample, score::Note, time::seconds_to_samples};

pub const DEFAULT_TAIL_SECONDS: f64 = 0.075;

// Fraction of full scale per frame; 20 units for a 16-bit sample.
pub const CUT_PENALTY_PER_FRAME: f64 = 20.0 / 32_768.0;

#[must_use]
pub fn tail_threshold(sample_rate: u32, tail_seconds: f64) -> usize {
    seconds_to_samples(tail_seconds, sample_rate)
}

#[must_use]
pub fn render_note_shape(note: &Note, sample: &Sample, tail_threshold: usize) -> Vec<f64> {
    let wanted = note.length.saturating_add(tail_threshold);
    if note.pitch_ratio <= 0.0 || !note.pitch_ratio.is_finite() || sample.is_empty() {
        return Vec::new();
    }

    // Only as much source as the stretched output can use.
    let source_frames = ((wanted as f64 / note.pitch_ratio).ceil() as usize)
        .saturating_add(1)
        .min(sample.len());
    let mut stretched = resample(&sample.frames()[..source_frames], note.pitch_ratio);

    if stretched.len() < note.length {
        return stretched;
    }

    stretched.truncate(wanted);
    let penalty = sample.full_scale() * CUT_PENALTY_PER_FRAME;
    let cut = quietest_cut(&stretched[note.length..], penalty);
    stretched.truncate(note.length + cut);
    stretched
}

#[must_use]
pub fn resample(source: &[i32], ratio: f64) -> Vec<f64> {
    let output_len = (source.len() as f64 * ratio).round() as usize;
    match (source.len(), output_len) {
        (_, 0) | (0, _) => Vec::new(),
        (1, _) | (_, 1) => vec![f64::from(source[0]); output_len],
        (input_len, output_len) => {
            let span = (output_len - 1) as f64;
            (0..output_len)
                .map(|index| {
                    let position = (index * (input_len - 1)) as f64 / span;
                    let lower = (position.floor() as usize).min(input_len - 1);
                    let upper = (lower + 1).min(input_len - 1);
                    let fraction = position - lower as f64;
                    let low = f64::from(source[lower]);
                    let high = f64::from(source[upper]);
                    low + (high - low) * fraction
                })
                .collect()
        }
    }
}

fn quietest_cut(tail: &[f64], penalty_per_frame: f64) -> usize {
    tail.iter()
        .enumerate()
        .map(|(distance, frame)| (distance, frame.abs() + distance as f64 * penalty_per_frame))
        .fold(None, |best: Option<(usize, f64)>, (distance, cost)| match best {
            Some((_, best_cost)) if best_cost <= cost => best,
            _ => Some((distance, cost)),
        })
        .map_or(0, |(distance, _)| distance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mixer::Mixer;

    fn note(length: usize, pitch_ratio: f64, volume: f64) -> Note {
        Note {
            start: 0,
            length,
            pitch: 69.0,
            pitch_ratio,
            volume,
            bend: false,
        }
    }

    #[test]
    fn resample_stretches_and_shrinks() {
        let source = [0, 10, 20, 30, 40];
        assert_eq!(resample(&source, 1.0), vec![0.0, 10.0, 20.0, 30.0, 40.0]);

        let stretched = resample(&source, 2.0);
        assert_eq!(stretched.len(), 10);
        assert_eq!(stretched[0], 0.0);
        assert_eq!(stretched[9], 40.0);
        assert!(stretched.windows(2).all(|pair| pair[0] <= pair[1]));

        assert_eq!(resample(&source, 0.4), vec![0.0, 40.0]);
        assert!(resample(&source, 0.01).is_empty());
    }

    #[test]
    fn short_render_is_returned_without_extension() {
        let sample = Sample::from_frames(vec![100, -100, 100, -100], 1_000, 16);
        let rendered = render_note_shape(&note(50, 1.0, 1.0), &sample, 10);
        assert_eq!(rendered.len(), 4);
    }

    #[test]
    fn cut_lands_on_silence_inside_tail() {
        let mut frames: Vec<i32> = (0..120)
            .map(|index| if index % 2 == 0 { 1_000 } else { -1_000 })
            .collect();
        frames[105] = 0;
        let sample = Sample::from_frames(frames, 1_000, 16);

        let rendered = render_note_shape(&note(100, 1.0, 1.0), &sample, 10);
        assert_eq!(rendered.len(), 105);
    }

    #[test]
    fn cut_prefers_note_end_when_tail_is_flat() {
        let sample = Sample::from_frames(vec![0; 200], 1_000, 16);
        let rendered = render_note_shape(&note(100, 1.0, 1.0), &sample, 20);
        assert_eq!(rendered.len(), 100);
    }

    #[test]
    fn mixer_gain_applies_note_volume_to_shape() {
        let frames: Vec<i32> = (0..64).map(|index| if index % 2 == 0 { 500 } else { -500 }).collect();
        let sample = Sample::from_frames(frames, 1_000, 16);
        let quiet = note(32, 1.0, 0.5);
        let shape = render_note_shape(&quiet, &sample, 4);

        let mut mixer = Mixer::new(shape.len());
        mixer.add(&shape, 0, quiet.volume);
        for (full, mixed) in shape.iter().zip(mixer.frames()) {
            assert!((full * 0.5 - mixed).abs() < 1e-9);
        }
    }

    #[test]
    fn tail_threshold_is_75ms_by_default() {
        assert_eq!(tail_threshold(1_000, DEFAULT_TAIL_SECONDS), 75);
        assert_eq!(tail_threshold(48_000, DEFAULT_TAIL_SECONDS), 3_600);
    }
}
