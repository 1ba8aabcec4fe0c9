//! Synthetic reading generation.
//!
//! The value functions here are stand-ins for a real sensor feed: each known
//! channel samples uniformly from its declared range and rounds to two
//! decimals; unknown channel names get an unrounded `[0, 1)` value and an
//! empty unit.
//!
//! The random source is injectable. Production code uses an OS-seeded
//! [`StdRng`]; tests and `--seed` runs can pass a seeded one.

use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};

use crate::channel::Channel;
use crate::negotiate::EmissionMode;
use crate::reading::{Reading, ValueKind};

/// Samples a value for the named channel.
pub fn sample_value<R: Rng>(channel_name: &str, rng: &mut R) -> f64 {
    match Channel::from_name(channel_name) {
        Some(channel) => round2(rng.random_range(channel.range())),
        None => rng.random::<f64>(),
    }
}

/// Display unit for the named channel, empty when unknown.
pub fn unit_for(channel_name: &str) -> &'static str {
    Channel::from_name(channel_name).map_or("", Channel::unit)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Produces [`Reading`]s from a random source.
#[derive(Debug, Clone)]
pub struct ReadingGenerator<R = StdRng> {
    rng: R,
}

impl ReadingGenerator<StdRng> {
    /// Creates a generator seeded from operating system entropy.
    pub fn from_os_rng() -> Self {
        Self::new(StdRng::from_os_rng())
    }

    /// Creates a deterministic generator for reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl Default for ReadingGenerator<StdRng> {
    fn default() -> Self {
        Self::from_os_rng()
    }
}

impl<R: Rng> ReadingGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Generates one reading for an arbitrary channel name.
    pub fn generate(&mut self, asset_id: &str, channel_name: &str) -> Reading {
        Reading {
            asset_id: asset_id.to_string(),
            channel: channel_name.to_string(),
            value: sample_value(channel_name, &mut self.rng),
            kind: ValueKind::Number,
            unit: unit_for(channel_name).to_string(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// Draws the readings for one emitted message.
    ///
    /// `Random` picks one channel uniformly from `channels`; `AllChannels`
    /// samples every channel in order. An empty channel list yields no
    /// readings.
    pub fn draw(&mut self, asset_id: &str, channels: &[Channel], mode: EmissionMode) -> Vec<Reading> {
        match mode {
            EmissionMode::Random => channels
                .choose(&mut self.rng)
                .copied()
                .map(|channel| vec![self.generate(asset_id, channel.name())])
                .unwrap_or_default(),
            EmissionMode::AllChannels => channels
                .iter()
                .map(|channel| self.generate(asset_id, channel.name()))
                .collect(),
        }
    }
}
