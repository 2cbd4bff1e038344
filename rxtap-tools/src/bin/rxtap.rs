//! rxtap CLI
//!
//! Replays recorded receive events through the capture hook into a pcap
//! file, decodes capture headers and manages the tool configuration.

use clap::{Arg, ArgMatches, Command};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::sync::Arc;
use tracing::{info, warn};

use rxtap::{
    radiotap::split_output, BufferAllocator, ChannelTable, FramePool, HeapAllocator,
    HtFlagsPolicy, MonitorHook,
};
use rxtap_tools::{read_records, replay, PcapSink, PcapWriter, Result, ToolConfig, ToolError};

fn main() -> Result<()> {
    let matches = Command::new("rxtap")
        .version(rxtap_tools::VERSION)
        .about("Radiotap capture hook tooling")
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)")
                .global(true),
        )
        .subcommand(
            Command::new("replay")
                .about("Replay recorded receive events into a pcap file")
                .arg(
                    Arg::new("input")
                        .short('i')
                        .long("input")
                        .value_name("FILE")
                        .help("JSON-lines file of receive records")
                        .required(true),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("FILE")
                        .help("pcap file to write")
                        .required(true),
                )
                .arg(
                    Arg::new("config")
                        .short('c')
                        .long("config")
                        .value_name("FILE")
                        .help("Configuration file path"),
                )
                .arg(
                    Arg::new("ht-flags")
                        .long("ht-flags")
                        .value_name("POLICY")
                        .help("HT flag mapping (independent, single-dispatch)"),
                )
                .arg(
                    Arg::new("max-output-len")
                        .long("max-output-len")
                        .value_name("BYTES")
                        .help("Ceiling on header plus frame length"),
                ),
        )
        .subcommand(
            Command::new("decode")
                .about("Decode a capture header given as hex")
                .arg(
                    Arg::new("hex")
                        .value_name("HEX")
                        .help("Capture header, optionally followed by frame bytes")
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Configuration management")
                .subcommand(
                    Command::new("generate")
                        .about("Generate default configuration file")
                        .arg(
                            Arg::new("output")
                                .short('o')
                                .long("output")
                                .value_name("FILE")
                                .help("Output file path")
                                .default_value("rxtap.toml"),
                        ),
                )
                .subcommand(
                    Command::new("validate")
                        .about("Validate configuration file")
                        .arg(
                            Arg::new("config")
                                .short('c')
                                .long("config")
                                .value_name("FILE")
                                .help("Configuration file to validate")
                                .required(true),
                        ),
                ),
        )
        .get_matches();

    let log_level = matches.get_one::<String>("log-level").cloned();

    match matches.subcommand() {
        Some(("replay", sub_matches)) => {
            let mut config = match sub_matches.get_one::<String>("config") {
                Some(path) => ToolConfig::from_file(path)?,
                None => ToolConfig::default(),
            };
            init_logging(log_level.as_deref().unwrap_or(&config.general.log_level));
            apply_overrides(&mut config, sub_matches)?;
            run_replay(&config, sub_matches)?;
        }
        Some(("decode", sub_matches)) => {
            init_logging(log_level.as_deref().unwrap_or("info"));
            if let Some(hex) = sub_matches.get_one::<String>("hex") {
                decode_header(hex)?;
            }
        }
        Some(("config", sub_matches)) => {
            init_logging(log_level.as_deref().unwrap_or("info"));
            match sub_matches.subcommand() {
                Some(("generate", gen_matches)) => {
                    if let Some(output) = gen_matches.get_one::<String>("output") {
                        generate_config(output)?;
                    }
                }
                Some(("validate", val_matches)) => {
                    if let Some(path) = val_matches.get_one::<String>("config") {
                        validate_config(path)?;
                    }
                }
                _ => {
                    println!("Use 'rxtap config --help' for usage information");
                }
            }
        }
        _ => {
            println!("Use 'rxtap --help' for usage information");
        }
    }

    Ok(())
}

/// Initialize logging
fn init_logging(level: &str) {
    let level_filter = match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_max_level(level_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Apply command-line overrides on top of the loaded configuration
fn apply_overrides(config: &mut ToolConfig, matches: &ArgMatches) -> Result<()> {
    if let Some(policy) = matches.get_one::<String>("ht-flags") {
        config.hook.ht_flags_policy = match policy.as_str() {
            "independent" => HtFlagsPolicy::Independent,
            "single-dispatch" => HtFlagsPolicy::SingleDispatch,
            other => {
                return Err(ToolError::Config {
                    message: format!("Unknown HT flag policy '{}'", other),
                })
            }
        };
    }

    if let Some(len) = matches.get_one::<String>("max-output-len") {
        config.hook.max_output_len = len.parse().map_err(|_| ToolError::Config {
            message: format!("Invalid max-output-len '{}'", len),
        })?;
    }

    Ok(())
}

/// Replay a record file through the hook into a pcap file
fn run_replay(config: &ToolConfig, matches: &ArgMatches) -> Result<()> {
    let validation = config.validate();
    for warning in &validation.warnings {
        warn!("{}", warning);
    }
    if !validation.valid {
        return Err(ToolError::Config {
            message: validation.errors.join("; "),
        });
    }

    let (Some(input), Some(output)) = (
        matches.get_one::<String>("input"),
        matches.get_one::<String>("output"),
    ) else {
        return Err(ToolError::Config {
            message: "replay requires --input and --output".to_string(),
        });
    };

    let records = read_records(BufReader::new(File::open(input)?))?;
    info!("Loaded {} records from {}", records.len(), input);

    let writer = PcapWriter::new(BufWriter::new(File::create(output)?), config.capture.snaplen)?;
    let pool = config
        .pool
        .enabled
        .then(|| Arc::new(FramePool::new(config.pool.buffer_size, config.pool.buffers)));

    let (allocator, sink) = match &pool {
        Some(pool) => (
            Box::new(Arc::clone(pool)) as Box<dyn BufferAllocator>,
            PcapSink::new(writer).with_pool(Arc::clone(pool)),
        ),
        None => (
            Box::new(HeapAllocator) as Box<dyn BufferAllocator>,
            PcapSink::new(writer),
        ),
    };

    let hook = MonitorHook::new(config.hook.clone(), ChannelTable, allocator, sink)?;
    let summary = replay(&hook, &records)?;
    hook.sink().flush()?;

    println!("Replay completed:");
    println!("  Records: {}", summary.records);
    println!("  Forwarded: {} ({} bytes)", summary.forwarded, summary.bytes_forwarded);
    println!("  Dropped (too large): {}", summary.dropped_too_large);
    println!("  Dropped (no buffer): {}", summary.dropped_no_buffer);
    if hook.sink().failed() > 0 {
        println!("  Capture write failures: {}", hook.sink().failed());
    }
    if let Some(pool) = &pool {
        let stats = pool.stats();
        println!(
            "  Pool: {} created, {} reused ({:.1}% reuse)",
            stats.created,
            stats.reused,
            stats.reuse_rate() * 100.0
        );
    }
    println!("  Output: {}", output);

    Ok(())
}

/// Decode and print a capture header
fn decode_header(hex_input: &str) -> Result<()> {
    let cleaned: String = hex_input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    let data = hex::decode(cleaned)?;
    let (header, frame) = split_output(&data)?;

    println!("Capture header: {}", header);
    println!("  TSF: {}", header.tsf);
    println!("  FCS included: {}", header.fcs_included());
    println!("  Rate: {} (500 kbps units)", header.data_rate);
    println!("  Channel: {} MHz, flags 0x{:04x}", header.channel_freq, header.channel_flags);
    println!("  Signal: {} dBm", header.antenna_signal);
    println!("  Noise: {} dBm", header.antenna_noise);
    if !header.mcs.is_zero() {
        println!(
            "  MCS: index {}, known 0x{:02x}, flags 0x{:02x}",
            header.mcs.index, header.mcs.known, header.mcs.flags
        );
    }
    if !frame.is_empty() {
        println!("  Frame: {} bytes", frame.len());
    }

    Ok(())
}

/// Generate default configuration file
fn generate_config(output_path: &str) -> Result<()> {
    println!("Generating default configuration: {}", output_path);

    ToolConfig::default().to_file(output_path)?;

    println!("Configuration file generated successfully!");
    Ok(())
}

/// Validate configuration file
fn validate_config(config_path: &str) -> Result<()> {
    println!("Validating configuration: {}", config_path);

    let config = ToolConfig::from_file(config_path)?;
    let result = config.validate();

    for warning in &result.warnings {
        println!("  Warning: {}", warning);
    }

    if result.valid {
        println!("Configuration is valid!");
        println!("  Max output length: {}", config.hook.max_output_len);
        println!("  HT flag policy: {}", config.hook.ht_flags_policy.name());
        println!("  Buffer pool: {}", if config.pool.enabled { "enabled" } else { "disabled" });
        println!("  Snapshot length: {}", config.capture.snaplen);
        Ok(())
    } else {
        for error in &result.errors {
            println!("  Error: {}", error);
        }
        Err(ToolError::Config {
            message: format!("{} validation error(s)", result.errors.len()),
        })
    }
}
