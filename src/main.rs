// pcap-client-sampler/src/main.rs
use clap::{Arg, ArgMatches, Command};
use pcap_client_sampler::{
    sample_pcap, RunStatistics, SamplerConfig, Timestamp, DEFAULT_DURATION, DEFAULT_LIMIT,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let matches = Command::new("pcap-client-sampler")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Downsample a pcap by keeping or dropping each source client as a whole")
        .arg(Arg::new("read")
            .short('r')
            .long("read")
            .value_name("FILE")
            .help("Input capture")
            .required(true)
            .num_args(1))
        .arg(Arg::new("write")
            .short('w')
            .long("write")
            .value_name("FILE")
            .help("Output capture (raw IP)")
            .required(true)
            .num_args(1))
        .arg(Arg::new("duration")
            .short('d')
            .long("duration")
            .value_name("SECONDS")
            .help("Keep only this many seconds from the first packet (0 = everything)")
            .default_value(DEFAULT_DURATION))
        .arg(Arg::new("limit")
            .short('l')
            .long("limit")
            .value_name("PROB")
            .help("Probability that a client is retained, in (0, 1]")
            .default_value(DEFAULT_LIMIT))
        .arg(Arg::new("seed")
            .short('s')
            .long("seed")
            .value_name("INT")
            .help("Random seed")
            .default_value("0"))
        .arg(Arg::new("format")
            .short('f')
            .long("format")
            .value_name("FORMAT")
            .help("Report format")
            .value_parser(["text", "json"])
            .default_value("text"))
        .get_matches();

    let config = SamplerConfig::from_args(
        arg(&matches, "read"),
        arg(&matches, "write"),
        arg(&matches, "duration"),
        arg(&matches, "limit"),
        arg(&matches, "seed"),
    )?;

    let stats = sample_pcap(&config)?;

    match arg(&matches, "format") {
        "json" => println!("{}", serde_json::to_string_pretty(&stats)?),
        _ => print_summary(&stats),
    }

    Ok(())
}

// Required and defaulted args are always present.
fn arg<'a>(matches: &'a ArgMatches, name: &str) -> &'a str {
    matches.get_one::<String>(name).map(String::as_str).unwrap_or_default()
}

fn print_summary(stats: &RunStatistics) {
    let stamp = |ts: Option<Timestamp>| match ts {
        Some(ts) => format!("{:.3} ms ({})", ts.as_millis_f64(), ts.to_rfc3339()),
        None => "-".to_string(),
    };

    println!("Since: {}", stamp(stats.since));
    println!("Until: {}", stamp(stats.last_seen));
    println!("Elapsed: {:.3}s", stats.elapsed_seconds);
    println!("Clients retained: {}", stats.retained_client_count);
    println!(
        "Packets: {} read, {} skipped, {} written",
        stats.packets_read, stats.packets_skipped, stats.packets_written
    );
}
