// pcap-client-sampler/src/window.rs
use std::time::Duration;

use crate::dissector::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Continue,
    /// Window exhausted. The packet that produced this is not processed.
    Stop,
}

/// Capture-relative time window anchored at the first admitted packet.
#[derive(Debug, Clone)]
pub struct WindowController {
    duration: Option<Duration>,
    since: Option<Timestamp>,
    /// Cutoff in nanoseconds. `None` after anchoring means unbounded.
    until_nanos: Option<u128>,
}

impl WindowController {
    /// `None` never truncates.
    pub fn new(duration: Option<Duration>) -> Self {
        WindowController {
            duration,
            since: None,
            until_nanos: None,
        }
    }

    pub fn admit(&mut self, now: Timestamp) -> Admission {
        if self.since.is_none() {
            self.since = Some(now);
            self.until_nanos = self.duration.map(|d| now.as_nanos() + d.as_nanos());
            return Admission::Continue;
        }

        match self.until_nanos {
            Some(until) if now.as_nanos() >= until => Admission::Stop,
            _ => Admission::Continue,
        }
    }

    pub fn since(&self) -> Option<Timestamp> {
        self.since
    }

    /// Cutoff in milliseconds; infinite when the window is unbounded.
    pub fn until_ms(&self) -> Option<f64> {
        self.since.map(|_| match self.until_nanos {
            Some(until) => until as f64 / 1_000_000.0,
            None => f64::INFINITY,
        })
    }
}
