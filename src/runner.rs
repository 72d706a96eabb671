// pcap-client-sampler/src/runner.rs
use log::{info, trace, warn};
use serde::Serialize;

use crate::config::SamplingParams;
use crate::dissector::{PacketDissector, Timestamp};
use crate::error::Result;
use crate::key;
use crate::packet_capture::{CapturedPacket, PacketSink, PacketSource};
use crate::sampler::{DecisionTable, Sampler, SeededSampler};
use crate::window::{Admission, WindowController};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunStatistics {
    pub retained_client_count: u64,
    pub clients_seen: u64,
    #[serde(rename = "since_ms")]
    pub since: Option<Timestamp>,
    /// Timestamp of the last packet written.
    #[serde(rename = "last_seen_ms")]
    pub last_seen: Option<Timestamp>,
    pub elapsed_seconds: f64,
    pub packets_read: u64,
    pub packets_skipped: u64,
    pub packets_written: u64,
    pub window_exhausted: bool,
}

impl RunStatistics {
    pub fn since_ms(&self) -> Option<f64> {
        self.since.map(|t| t.as_millis_f64())
    }

    pub fn last_seen_ms(&self) -> Option<f64> {
        self.last_seen.map(|t| t.as_millis_f64())
    }
}

/// What happened to a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Skipped,
    Dropped,
    Written,
    Stop,
}

/// Drives one sampling run. Holds all state for that run; build a new one per run.
pub struct RunController<S: Sampler> {
    window: WindowController,
    table: DecisionTable<S>,
    last_seen: Option<Timestamp>,
    packets_read: u64,
    packets_skipped: u64,
    packets_written: u64,
    window_exhausted: bool,
}

impl RunController<SeededSampler> {
    pub fn new(params: &SamplingParams) -> Self {
        Self::with_sampler(params, SeededSampler::new(params.seed))
    }
}

impl<S: Sampler> RunController<S> {
    pub fn with_sampler(params: &SamplingParams, sampler: S) -> Self {
        RunController {
            window: WindowController::new(params.duration),
            table: DecisionTable::new(sampler, params.limit),
            last_seen: None,
            packets_read: 0,
            packets_skipped: 0,
            packets_written: 0,
            window_exhausted: false,
        }
    }

    /// Pull every record from `source`, writing retained ones to `sink`.
    ///
    /// Ends at end of input or when the window is exhausted. The sink is flushed
    /// before returning.
    pub fn run<Src, Snk>(&mut self, source: &mut Src, sink: &mut Snk) -> Result<RunStatistics>
    where
        Src: PacketSource + ?Sized,
        Snk: PacketSink + ?Sized,
    {
        let dissector = PacketDissector::new(source.datalink());
        if !dissector.is_raw_ip() {
            warn!(
                "Input datalink {:?} is not raw IP; records are copied unchanged",
                dissector.datalink()
            );
        }

        while let Some(packet) = source.next_packet()? {
            if self.process(&dissector, &packet, sink)? == Outcome::Stop {
                break;
            }
        }
        sink.finish()?;

        let stats = self.statistics();
        info!(
            "Run finished: {} packets read, {} written, {}/{} clients retained",
            stats.packets_read,
            stats.packets_written,
            stats.retained_client_count,
            stats.clients_seen
        );
        Ok(stats)
    }

    pub fn process<Snk: PacketSink + ?Sized>(
        &mut self,
        dissector: &PacketDissector,
        packet: &CapturedPacket,
        sink: &mut Snk,
    ) -> Result<Outcome> {
        self.packets_read += 1;

        let eligible = match key::extract(&dissector.dissect(packet)) {
            Some(eligible) => eligible,
            None => {
                trace!("Skipping record {} without IP source or payload", self.packets_read);
                self.packets_skipped += 1;
                return Ok(Outcome::Skipped);
            }
        };

        if self.window.admit(eligible.timestamp) == Admission::Stop {
            self.window_exhausted = true;
            info!("Window exhausted at {:.3} ms", eligible.timestamp.as_millis_f64());
            return Ok(Outcome::Stop);
        }

        if !self.table.decide(eligible.key) {
            return Ok(Outcome::Dropped);
        }

        sink.write_packet(packet)?;
        self.packets_written += 1;
        self.last_seen = Some(eligible.timestamp);
        Ok(Outcome::Written)
    }

    pub fn decisions(&self) -> &DecisionTable<S> {
        &self.table
    }

    pub fn statistics(&self) -> RunStatistics {
        let since = self.window.since();
        let elapsed_seconds = match (since, self.last_seen) {
            (Some(since), Some(last)) => {
                last.as_nanos().saturating_sub(since.as_nanos()) as f64 / 1_000_000_000.0
            }
            _ => 0.0,
        };

        RunStatistics {
            retained_client_count: self.table.retained_clients(),
            clients_seen: self.table.clients_seen() as u64,
            since,
            last_seen: self.last_seen,
            elapsed_seconds,
            packets_read: self.packets_read,
            packets_skipped: self.packets_skipped,
            packets_written: self.packets_written,
            window_exhausted: self.window_exhausted,
        }
    }
}
