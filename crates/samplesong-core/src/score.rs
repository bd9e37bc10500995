use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::time::{note_frequency_hz, seconds_to_samples};

// General MIDI percussion, channels numbered from 1.
pub const PERCUSSION_CHANNEL: u8 = 10;
pub const MAX_VELOCITY: f64 = 127.0;
pub const BEND_RANGE_SEMITONES: f64 = 12.0;
pub const BEND_CENTER: f64 = 8_192.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScoreMessage {
    NoteOn { key: u8, velocity: u8 },
    NoteOff { key: u8 },
    PitchBend { value: i16 },
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimedMessage {
    pub delta_seconds: f64,
    pub channel: Option<u8>,
    pub message: ScoreMessage,
}

impl TimedMessage {
    #[must_use]
    pub fn new(delta_seconds: f64, channel: Option<u8>, message: ScoreMessage) -> Self {
        Self {
            delta_seconds,
            channel,
            message,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ScoreError {
    #[error("note-off for key {key} at {seconds:.3}s has no matching note-on")]
    DanglingNoteOff { key: u8, seconds: f64 },
    #[error("score contains no playable notes")]
    EmptyScore,
    #[error("unreadable score file {path}: {reason}")]
    UnreadableFile { path: String, reason: String },
    #[error("malformed score data: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScoreWarning {
    UnterminatedNotes { count: usize, seconds: f64 },
    ZeroLengthSegments { count: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub start: usize,
    pub length: usize,
    pub pitch: f64,
    pub pitch_ratio: f64,
    pub volume: f64,
    pub bend: bool,
}

impl Note {
    #[must_use]
    pub fn end(&self) -> usize {
        self.start.saturating_add(self.length)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreOptions {
    pub transpose: i32,
    pub speed: f64,
}

impl Default for ScoreOptions {
    fn default() -> Self {
        Self {
            transpose: 0,
            speed: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedScore {
    pub notes: BTreeMap<usize, Vec<Note>>,
    pub length: usize,
    pub note_count: usize,
    pub max_polyphony: usize,
    pub max_pitch: f64,
    pub warnings: Vec<ScoreWarning>,
}

impl ParsedScore {
    pub fn iter(&self) -> impl Iterator<Item = &Note> {
        self.notes.values().flatten()
    }
}

#[derive(Debug, Clone, Copy)]
struct OpenNote {
    start: usize,
    pitch: f64,
    volume: f64,
    bend_offset: f64,
}

#[derive(Debug)]
pub struct ScoreParser {
    sample_rate: u32,
    fundamental_hz: f64,
    options: ScoreOptions,
    open: BTreeMap<u8, Vec<OpenNote>>,
    bend_offset: f64,
    seconds: f64,
    notes: BTreeMap<usize, Vec<Note>>,
    note_count: usize,
    max_polyphony: usize,
    max_pitch: f64,
    zero_length: usize,
}

impl ScoreParser {
    #[must_use]
    pub fn new(sample_rate: u32, fundamental_hz: f64, options: ScoreOptions) -> Self {
        Self {
            sample_rate,
            fundamental_hz,
            options,
            open: BTreeMap::new(),
            bend_offset: 0.0,
            seconds: 0.0,
            notes: BTreeMap::new(),
            note_count: 0,
            max_polyphony: 0,
            max_pitch: f64::NEG_INFINITY,
            zero_length: 0,
        }
    }

    #[instrument(skip(self, messages), fields(sample_rate = self.sample_rate, fundamental_hz = self.fundamental_hz))]
    pub fn parse(
        mut self,
        messages: impl IntoIterator<Item = TimedMessage>,
    ) -> Result<ParsedScore, ScoreError> {
        for message in messages {
            self.push(message)?;
        }
        self.finish()
    }

    pub fn push(&mut self, timed: TimedMessage) -> Result<(), ScoreError> {
        self.seconds += timed.delta_seconds.max(0.0) / self.options.speed;
        if timed.channel == Some(PERCUSSION_CHANNEL) {
            return Ok(());
        }

        let now = seconds_to_samples(self.seconds, self.sample_rate);
        match timed.message {
            ScoreMessage::NoteOn { key, velocity } => self.note_on(key, velocity, now),
            ScoreMessage::NoteOff { key } => self.note_off(key, now)?,
            ScoreMessage::PitchBend { value } => self.pitch_bend(value, now),
            ScoreMessage::Other => {}
        }
        Ok(())
    }

    fn note_on(&mut self, key: u8, velocity: u8, now: usize) {
        let pitch = f64::from(key) + f64::from(self.options.transpose);
        let volume = if velocity == 0 {
            1.0
        } else {
            f64::from(velocity) / MAX_VELOCITY
        };

        self.open.entry(key).or_default().push(OpenNote {
            start: now,
            pitch,
            volume,
            bend_offset: self.bend_offset,
        });
        self.max_pitch = self.max_pitch.max(pitch + self.bend_offset);
        let sounding = self.open.values().map(Vec::len).sum();
        self.max_polyphony = self.max_polyphony.max(sounding);
    }

    fn note_off(&mut self, key: u8, now: usize) -> Result<(), ScoreError> {
        let open = self
            .open
            .get_mut(&key)
            .and_then(Vec::pop)
            .ok_or(ScoreError::DanglingNoteOff {
                key,
                seconds: self.seconds,
            })?;
        if self.open.get(&key).is_some_and(Vec::is_empty) {
            self.open.remove(&key);
        }

        self.close(open, now, false);
        Ok(())
    }

    fn pitch_bend(&mut self, value: i16, now: usize) {
        self.bend_offset = f64::from(value) / BEND_CENTER * BEND_RANGE_SEMITONES;

        let mut segments = Vec::new();
        for open in self.open.values_mut().flatten() {
            segments.push(*open);
            open.start = now;
            open.bend_offset = self.bend_offset;
            self.max_pitch = self.max_pitch.max(open.pitch + open.bend_offset);
        }

        for segment in segments {
            self.close(segment, now, true);
        }
    }

    fn close(&mut self, open: OpenNote, end: usize, bend: bool) {
        let length = end.saturating_sub(open.start);
        if length == 0 {
            self.zero_length += 1;
            return;
        }

        let pitch = open.pitch + open.bend_offset;
        let note = Note {
            start: open.start,
            length,
            pitch,
            pitch_ratio: self.fundamental_hz / note_frequency_hz(pitch),
            volume: open.volume,
            bend,
        };
        self.notes.entry(note.start).or_default().push(note);
        self.note_count += 1;
    }

    pub fn finish(mut self) -> Result<ParsedScore, ScoreError> {
        let mut warnings = Vec::new();
        let end = seconds_to_samples(self.seconds, self.sample_rate);

        let mut unterminated: Vec<OpenNote> =
            std::mem::take(&mut self.open).into_values().flatten().collect();
        if !unterminated.is_empty() {
            warn!(
                count = unterminated.len(),
                seconds = self.seconds,
                "score ended with notes still playing, closing them at the end of the score"
            );
            warnings.push(ScoreWarning::UnterminatedNotes {
                count: unterminated.len(),
                seconds: self.seconds,
            });
            unterminated.sort_by_key(|open| open.start);
            for open in unterminated {
                self.close(open, end, false);
            }
        }

        if self.zero_length > 0 {
            warn!(count = self.zero_length, "dropped zero-length segments");
            warnings.push(ScoreWarning::ZeroLengthSegments {
                count: self.zero_length,
            });
        }

        let length = self
            .notes
            .values()
            .flatten()
            .map(Note::end)
            .max()
            .ok_or(ScoreError::EmptyScore)?;

        debug!(
            note_count = self.note_count,
            length,
            max_polyphony = self.max_polyphony,
            "score parsed"
        );

        Ok(ParsedScore {
            notes: self.notes,
            length,
            note_count: self.note_count,
            max_polyphony: self.max_polyphony,
            max_pitch: self.max_pitch,
            warnings,
        })
    }
}
