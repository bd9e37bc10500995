use std::{fs, path::Path};

use midly::{Format, MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use tracing::{debug, instrument};

use crate::{
    score::{ScoreError, ScoreMessage, TimedMessage},
    time::ticks_to_seconds,
};

pub const DEFAULT_MICROS_PER_QUARTER: u32 = 500_000;

#[derive(Debug, Clone, Copy)]
struct AbsoluteEvent {
    tick: u64,
    track: usize,
    kind: EventKind,
}

#[derive(Debug, Clone, Copy)]
enum EventKind {
    Tempo(u32),
    Channel { channel: u8, message: ScoreMessage },
    Other,
}

#[instrument(fields(path = %path.display()))]
pub fn decode_score_file(path: &Path) -> Result<Vec<TimedMessage>, ScoreError> {
    let bytes = fs::read(path).map_err(|error| ScoreError::UnreadableFile {
        path: path.display().to_string(),
        reason: error.to_string(),
    })?;
    decode_score_bytes(&bytes)
}

pub fn decode_score_bytes(bytes: &[u8]) -> Result<Vec<TimedMessage>, ScoreError> {
    let smf = Smf::parse(bytes).map_err(|error| ScoreError::Malformed(error.to_string()))?;

    let mut events = Vec::new();
    let mut track_offset = 0_u64;
    for (track_index, track) in smf.tracks.iter().enumerate() {
        let mut tick = match smf.header.format {
            Format::Sequential => track_offset,
            Format::SingleTrack | Format::Parallel => 0,
        };
        for event in track {
            tick = tick.saturating_add(u64::from(event.delta.as_int()));
            events.push(AbsoluteEvent {
                tick,
                track: track_index,
                kind: classify(event.kind),
            });
        }
        track_offset = tick;
    }

    // Stable sort keeps in-track order for events sharing a tick.
    events.sort_by_key(|event| (event.tick, event.track));

    let mut micros_per_quarter = DEFAULT_MICROS_PER_QUARTER;
    let mut previous_tick = 0_u64;
    let mut messages = Vec::with_capacity(events.len());
    for event in events {
        let delta_ticks = event.tick - previous_tick;
        let delta_seconds = match smf.header.timing {
            Timing::Metrical(ppq) => ticks_to_seconds(delta_ticks, micros_per_quarter, ppq.as_int()),
            Timing::Timecode(fps, subframes) => {
                let ticks_per_second = f64::from(fps.as_f32()) * f64::from(subframes.max(1));
                delta_ticks as f64 / ticks_per_second
            }
        };
        previous_tick = event.tick;

        let message = match event.kind {
            EventKind::Tempo(tempo) => {
                micros_per_quarter = tempo;
                TimedMessage::new(delta_seconds, None, ScoreMessage::Other)
            }
            EventKind::Channel { channel, message } => {
                TimedMessage::new(delta_seconds, Some(channel), message)
            }
            EventKind::Other => TimedMessage::new(delta_seconds, None, ScoreMessage::Other),
        };
        messages.push(message);
    }

    debug!(
        tracks = smf.tracks.len(),
        messages = messages.len(),
        "score decoded"
    );
    Ok(messages)
}

fn classify(kind: TrackEventKind<'_>) -> EventKind {
    match kind {
        TrackEventKind::Midi { channel, message } => {
            let channel = channel.as_int() + 1;
            let message = match message {
                MidiMessage::NoteOn { key, vel } if vel.as_int() == 0 => ScoreMessage::NoteOff {
                    key: key.as_int(),
                },
                MidiMessage::NoteOn { key, vel } => ScoreMessage::NoteOn {
                    key: key.as_int(),
                    velocity: vel.as_int(),
                },
                MidiMessage::NoteOff { key, .. } => ScoreMessage::NoteOff { key: key.as_int() },
                MidiMessage::PitchBend { bend } => ScoreMessage::PitchBend {
                    value: bend.as_int(),
                },
                _ => ScoreMessage::Other,
            };
            EventKind::Channel { channel, message }
        }
        TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => EventKind::Tempo(tempo.as_int()),
        TrackEventKind::Meta(_) | TrackEventKind::SysEx(_) | TrackEventKind::Escape(_) => {
            EventKind::Other
        }
    }
}
