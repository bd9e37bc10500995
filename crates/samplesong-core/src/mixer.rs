use tracing::debug;

#[derive(Debug, Clone)]
pub struct Mixer {
    buffer: Vec<f64>,
}

impl Mixer {
    #[must_use]
    pub fn new(frames: usize) -> Self {
        Self {
            buffer: vec![0.0; frames],
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    #[must_use]
    pub fn frames(&self) -> &[f64] {
        &self.buffer
    }

    pub fn add(&mut self, rendered: &[f64], start: usize, gain: f64) {
        let Some(target) = self.buffer.get_mut(start..) else {
            return;
        };
        for (frame, value) in target.iter_mut().zip(rendered) {
            *frame += value * gain;
        }
    }

    #[must_use]
    pub fn finalize(self) -> Vec<i32> {
        let (min, max) = self
            .buffer
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), &frame| {
                (min.min(frame), max.max(frame))
            });
        let span = max - min;
        if !span.is_finite() || span <= 0.0 {
            return vec![0; self.buffer.len()];
        }

        let full_range = f64::from(i32::MAX) - f64::from(i32::MIN);
        let scale = full_range / span;
        debug!(min, max, scale, frames = self.buffer.len(), "normalizing mix");

        self.buffer
            .into_iter()
            .map(|frame| {
                let scaled = (frame - min) * scale + f64::from(i32::MIN);
                scaled
                    .round()
                    .clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32
            })
            .collect()
    }
}
