use std::path::Path;

use anyhow::{Context, Result};
use midly::{
    Format, Header, MetaMessage, MidiMessage, PitchBend, Smf, Timing, TrackEvent, TrackEventKind,
    num::{u4, u7, u14, u15, u24, u28},
};

pub const FIXTURE_PPQ: u16 = 480;
pub const FIXTURE_MICROS_PER_QUARTER: u32 = 500_000;

#[must_use]
pub fn sine_tone(frequency_hz: f64, sample_rate: u32, seconds: f64, amplitude: f64) -> Vec<i16> {
    let frame_count = (seconds * f64::from(sample_rate)).round() as usize;
    (0..frame_count)
        .map(|frame| {
            let phase = frame as f64 / f64::from(sample_rate) * frequency_hz * std::f64::consts::TAU;
            (phase.sin() * amplitude.clamp(0.0, 1.0) * f64::from(i16::MAX)).round() as i16
        })
        .collect()
}

pub fn write_tone_wav(path: &Path, frequency_hz: f64, sample_rate: u32, seconds: f64) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("failed to create wav file: {}", path.display()))?;
    for sample in sine_tone(frequency_hz, sample_rate, seconds, 0.5) {
        writer
            .write_sample(sample)
            .context("failed to write tone sample")?;
    }
    writer.finalize().context("failed to finalize tone wav")?;
    Ok(())
}

#[derive(Debug, Clone, Copy)]
pub enum ScriptedEvent {
    NoteOn { beat: f64, key: u8, velocity: u8 },
    NoteOff { beat: f64, key: u8 },
    PitchBend { beat: f64, value: i16 },
}

impl ScriptedEvent {
    fn beat(self) -> f64 {
        match self {
            Self::NoteOn { beat, .. } | Self::NoteOff { beat, .. } | Self::PitchBend { beat, .. } => {
                beat
            }
        }
    }
}

pub fn scripted_score(channel: u8, events: &[ScriptedEvent]) -> Result<Vec<u8>> {
    let mut events = events.to_vec();
    events.sort_by(|left, right| left.beat().total_cmp(&right.beat()));

    let mut track = vec![TrackEvent {
        delta: u28::from(0_u32),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::from(FIXTURE_MICROS_PER_QUARTER))),
    }];

    let channel = u4::from(channel.min(15));
    let mut previous_tick = 0_u32;
    for event in events {
        let tick = (event.beat().max(0.0) * f64::from(FIXTURE_PPQ)).round() as u32;
        let message = match event {
            ScriptedEvent::NoteOn { key, velocity, .. } => MidiMessage::NoteOn {
                key: u7::from(key.min(127)),
                vel: u7::from(velocity.min(127)),
            },
            ScriptedEvent::NoteOff { key, .. } => MidiMessage::NoteOff {
                key: u7::from(key.min(127)),
                vel: u7::from(0),
            },
            ScriptedEvent::PitchBend { value, .. } => MidiMessage::PitchBend {
                bend: PitchBend(u14::from((i32::from(value.clamp(-8_192, 8_191)) + 8_192) as u16)),
            },
        };
        track.push(TrackEvent {
            delta: u28::from(tick.saturating_sub(previous_tick)),
            kind: TrackEventKind::Midi { channel, message },
        });
        previous_tick = tick;
    }

    track.push(TrackEvent {
        delta: u28::from(0_u32),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    let header = Header {
        format: Format::SingleTrack,
        timing: Timing::Metrical(u15::from(FIXTURE_PPQ)),
    };
    let mut bytes = Vec::new();
    Smf {
        header,
        tracks: vec![track],
    }
    .write_std(&mut bytes)
    .context("failed to encode fixture midi")?;
    Ok(bytes)
}

pub fn two_note_score() -> Result<Vec<u8>> {
    scripted_score(
        0,
        &[
            ScriptedEvent::NoteOn {
                beat: 0.0,
                key: 69,
                velocity: 100,
            },
            ScriptedEvent::NoteOff { beat: 2.0, key: 69 },
            ScriptedEvent::NoteOn {
                beat: 2.0,
                key: 76,
                velocity: 80,
            },
            ScriptedEvent::NoteOff { beat: 3.0, key: 76 },
        ],
    )
}
