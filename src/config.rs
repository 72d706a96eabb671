// pcap-client-sampler/src/config.rs
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ConfigError, SamplerError};

pub const DEFAULT_DURATION: &str = "0";
pub const DEFAULT_LIMIT: &str = "1.0";
pub const DEFAULT_SEED: u64 = 0;

/// Validated parameters of the sampling core.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingParams {
    /// Window length measured from the first eligible packet. `None` means unbounded.
    pub duration: Option<Duration>,
    /// Per-client retention probability, in (0, 1].
    pub limit: f64,
    pub seed: u64,
}

impl Default for SamplingParams {
    fn default() -> Self {
        SamplingParams {
            duration: None,
            limit: 1.0,
            seed: DEFAULT_SEED,
        }
    }
}

impl SamplingParams {
    /// Validate raw numeric values. A duration of `0` seconds means no truncation.
    pub fn new(duration_secs: f64, limit: f64, seed: u64) -> Result<Self, ConfigError> {
        if !duration_secs.is_finite() {
            return Err(ConfigError::NonFinite { name: "duration" });
        }
        if duration_secs < 0.0 {
            return Err(ConfigError::NegativeDuration(duration_secs));
        }
        if !limit.is_finite() {
            return Err(ConfigError::NonFinite { name: "limit" });
        }
        if limit <= 0.0 || limit > 1.0 {
            return Err(ConfigError::LimitOutOfRange(limit));
        }

        let duration = if duration_secs == 0.0 {
            None
        } else {
            let duration = Duration::try_from_secs_f64(duration_secs)
                .map_err(|_| ConfigError::NonFinite { name: "duration" })?;
            Some(duration)
        };

        Ok(SamplingParams {
            duration,
            limit,
            seed,
        })
    }

    /// Same as [`SamplingParams::new`], taking the values as typed on the command line.
    pub fn parse(duration: &str, limit: &str, seed: &str) -> Result<Self, ConfigError> {
        let duration_secs = parse_number("duration", duration)?;
        let limit = parse_number("limit", limit)?;
        let seed = seed.trim().parse::<u64>().map_err(|_| ConfigError::NotNumeric {
            name: "seed",
            value: seed.to_string(),
        })?;
        Self::new(duration_secs, limit, seed)
    }
}

/// Full run configuration: where to read, where to write, how to sample.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerConfig {
    pub read: PathBuf,
    pub write: PathBuf,
    pub params: SamplingParams,
}

impl SamplerConfig {
    pub fn new<R, W>(read: R, write: W, params: SamplingParams) -> Self
    where
        R: Into<PathBuf>,
        W: Into<PathBuf>,
    {
        SamplerConfig {
            read: read.into(),
            write: write.into(),
            params,
        }
    }

    /// Build from raw command-line values; nothing is opened here.
    pub fn from_args<R, W>(
        read: R,
        write: W,
        duration: &str,
        limit: &str,
        seed: &str,
    ) -> Result<Self, SamplerError>
    where
        R: Into<PathBuf>,
        W: Into<PathBuf>,
    {
        let params = SamplingParams::parse(duration, limit, seed)?;
        Ok(Self::new(read, write, params))
    }
}

fn parse_number(name: &'static str, value: &str) -> Result<f64, ConfigError> {
    value.trim().parse::<f64>().map_err(|_| ConfigError::NotNumeric {
        name,
        value: value.to_string(),
    })
}
