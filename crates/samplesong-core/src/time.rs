pub const CONCERT_A_HZ: f64 = 440.0;
pub const CONCERT_A_NOTE: f64 = 69.0;

#[must_use]
pub fn seconds_to_samples(seconds: f64, sample_rate: u32) -> usize {
    if seconds <= 0.0 || sample_rate == 0 {
        return 0;
    }

    (seconds * f64::from(sample_rate)).round() as usize
}

#[must_use]
pub fn note_frequency_hz(note: f64) -> f64 {
    CONCERT_A_HZ * 2_f64.powf((note - CONCERT_A_NOTE) / 12.0)
}

#[must_use]
pub fn ticks_to_seconds(ticks: u64, micros_per_quarter: u32, ppq: u16) -> f64 {
    if ppq == 0 {
        return 0.0;
    }

    let beats = ticks as f64 / f64::from(ppq);
    beats * f64::from(micros_per_quarter) / 1_000_000.0
}
