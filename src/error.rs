// pcap-client-sampler/src/error.rs
//! Error types for the client sampler.

use std::path::PathBuf;

use pcap_file::PcapError;
use thiserror::Error;

/// Rejected configuration values. Always raised before any file is opened.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{name} is not a number: {value:?}")]
    NotNumeric { name: &'static str, value: String },

    #[error("{name} must be a finite number")]
    NonFinite { name: &'static str },

    #[error("duration must be >= 0, got {0}")]
    NegativeDuration(f64),

    #[error("limit must be in (0, 1], got {0}")]
    LimitOutOfRange(f64),
}

#[derive(Error, Debug)]
pub enum SamplerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot open input {}: {source}", path.display())]
    SourceOpen {
        path: PathBuf,
        #[source]
        source: PcapError,
    },

    #[error("cannot open output {}: {source}", path.display())]
    SinkOpen {
        path: PathBuf,
        #[source]
        source: PcapError,
    },

    #[error("failed reading packet: {0}")]
    Read(#[source] PcapError),

    #[error("failed writing packet: {0}")]
    Write(#[source] PcapError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SamplerError>;
