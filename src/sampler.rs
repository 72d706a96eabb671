// pcap-client-sampler/src/sampler.rs
//! Per-client retention decisions.
//!
//! Each distinct [`AddressKey`] is decided exactly once with a single draw
//! from the [`Sampler`]; every later packet from that client reuses the
//! stored decision, so a client's traffic is kept or dropped as a whole.

use std::collections::HashMap;

use log::debug;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::key::AddressKey;

/// Source of uniform draws in `[0, 1)`.
pub trait Sampler {
    fn draw(&mut self) -> f64;
}

/// ChaCha8 stream seeded once per run; same seed, same draws.
#[derive(Debug, Clone)]
pub struct SeededSampler {
    rng: ChaCha8Rng,
}

impl SeededSampler {
    pub fn new(seed: u64) -> Self {
        SeededSampler {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl Sampler for SeededSampler {
    fn draw(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

/// Memoized retain/drop outcome per client.
#[derive(Debug)]
pub struct DecisionTable<S: Sampler> {
    sampler: S,
    limit: f64,
    decisions: HashMap<AddressKey, bool>,
    retained_clients: u64,
}

impl<S: Sampler> DecisionTable<S> {
    /// `limit` must already be validated to lie in (0, 1].
    pub fn new(sampler: S, limit: f64) -> Self {
        DecisionTable {
            sampler,
            limit,
            decisions: HashMap::new(),
            retained_clients: 0,
        }
    }

    pub fn decide(&mut self, key: AddressKey) -> bool {
        if let Some(&retained) = self.decisions.get(&key) {
            return retained;
        }

        let retained = self.sampler.draw() < self.limit;
        self.decisions.insert(key, retained);
        if retained {
            self.retained_clients += 1;
        }
        debug!("client {} {}", key, if retained { "retained" } else { "dropped" });
        retained
    }

    pub fn get(&self, key: &AddressKey) -> Option<bool> {
        self.decisions.get(key).copied()
    }

    pub fn retained_clients(&self) -> u64 {
        self.retained_clients
    }

    pub fn clients_seen(&self) -> usize {
        self.decisions.len()
    }

    pub fn decisions(&self) -> &HashMap<AddressKey, bool> {
        &self.decisions
    }
}
