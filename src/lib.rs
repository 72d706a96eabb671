// pcap-client-sampler/src/lib.rs
use log::info;

mod config;
pub use config::*;

mod dissector;
pub use dissector::*;

mod error;
pub use error::*;

pub mod key;
pub use key::{AddressKey, EligiblePacket};

mod packet_capture;
pub use packet_capture::*;

mod runner;
pub use runner::*;

mod sampler;
pub use sampler::*;

mod window;
pub use window::*;

/// Sample the capture at `config.read` into `config.write`.
///
/// The input is opened first; the output file is only created once the input
/// is known to be a readable capture.
pub fn sample_pcap(config: &SamplerConfig) -> Result<RunStatistics> {
    let mut source = PcapSource::open(&config.read)?;
    let mut sink = PcapSink::create(&config.write, source.ts_resolution())?;

    info!(
        "Sampling clients with limit {} (seed {}), window {}",
        config.params.limit,
        config.params.seed,
        config
            .params
            .duration
            .map(|d| format!("{:.3}s", d.as_secs_f64()))
            .unwrap_or_else(|| "unbounded".to_string())
    );

    let mut controller = RunController::new(&config.params);
    controller.run(&mut source, &mut sink)
}
