use std::collections::{HashMap, hash_map::Entry};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{score::Note, time::seconds_to_samples};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderKey {
    pub length: usize,
    pitch_ratio_bits: u64,
}

impl RenderKey {
    #[must_use]
    pub fn new(length: usize, pitch_ratio: f64) -> Self {
        Self {
            length,
            pitch_ratio_bits: pitch_ratio.to_bits(),
        }
    }

    #[must_use]
    pub fn pitch_ratio(&self) -> f64 {
        f64::from_bits(self.pitch_ratio_bits)
    }
}

impl From<&Note> for RenderKey {
    fn from(note: &Note) -> Self {
        Self::new(note.length, note.pitch_ratio)
    }
}

#[derive(Debug, Clone)]
pub struct CachedRender {
    pub usage: usize,
    pub first_use: usize,
    pub buffer: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CachePolicy {
    pub evict_interval_notes: usize,
    pub max_age_seconds: f64,
    pub max_usage_for_eviction: usize,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            evict_interval_notes: 10,
            max_age_seconds: 7.5,
            max_usage_for_eviction: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub evictions: usize,
}

#[derive(Debug)]
pub struct RenderCache {
    entries: HashMap<RenderKey, CachedRender>,
    policy: CachePolicy,
    max_age_samples: usize,
    notes_until_tick: usize,
    stats: CacheStats,
}

impl RenderCache {
    #[must_use]
    pub fn new(policy: CachePolicy, sample_rate: u32) -> Self {
        let interval = policy.evict_interval_notes.max(1);
        Self {
            entries: HashMap::new(),
            policy,
            max_age_samples: seconds_to_samples(policy.max_age_seconds, sample_rate),
            notes_until_tick: interval,
            stats: CacheStats::default(),
        }
    }

    pub fn get_or_render(&mut self, note: &Note, render: impl FnOnce(&Note) -> Vec<f64>) -> &[f64] {
        let entry = match self.entries.entry(RenderKey::from(note)) {
            Entry::Occupied(occupied) => {
                self.stats.hits += 1;
                let entry = occupied.into_mut();
                entry.usage += 1;
                entry
            }
            Entry::Vacant(vacant) => {
                self.stats.misses += 1;
                vacant.insert(CachedRender {
                    usage: 1,
                    first_use: note.start,
                    buffer: render(note),
                })
            }
        };
        &entry.buffer
    }

    pub fn note_processed(&mut self, current_time: usize) -> usize {
        self.notes_until_tick -= 1;
        if self.notes_until_tick > 0 {
            return 0;
        }

        self.notes_until_tick = self.policy.evict_interval_notes.max(1);
        self.evict(current_time)
    }

    pub fn evict(&mut self, current_time: usize) -> usize {
        let before = self.entries.len();
        let max_age = self.max_age_samples;
        let max_usage = self.policy.max_usage_for_eviction;
        self.entries.retain(|_, entry| {
            current_time.saturating_sub(entry.first_use) <= max_age || entry.usage > max_usage
        });

        let evicted = before - self.entries.len();
        if evicted > 0 {
            debug!(evicted, remaining = self.entries.len(), current_time, "render cache evicted");
        }
        self.stats.evictions += evicted;
        evicted
    }

    #[must_use]
    pub fn get(&self, key: &RenderKey) -> Option<&CachedRender> {
        self.entries.get(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}
