//! Unit tests for the fetch command line

use clap::Parser;
use pausable_downloader::cli::{Cli, Commands, ControlCommand, OutputFormat};

#[test]
fn test_fetch_requires_output() {
    let result = Cli::try_parse_from(["pausable-downloader", "fetch", "http://localhost/a.bin"]);
    assert!(result.is_err());
}

#[test]
fn test_rejects_zero_chunk_size() {
    let result = Cli::try_parse_from([
        "pausable-downloader",
        "fetch",
        "http://localhost/a.bin",
        "-o",
        "a.bin",
        "--chunk-size",
        "0",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli = Cli::parse_from([
        "pausable-downloader",
        "fetch",
        "http://localhost/a.bin",
        "-o",
        "a.bin",
        "--start-paused",
        "--output-format",
        "json",
        "--metrics-addr",
        "127.0.0.1:9090",
    ]);

    assert_eq!(cli.output_format, OutputFormat::Json);
    assert_eq!(cli.metrics_addr.map(|a| a.port()), Some(9090));
    let Commands::Fetch(args) = cli.command;
    assert!(args.start_paused);
    assert_eq!(args.url, "http://localhost/a.bin");
}

#[test]
fn test_invalid_output_format() {
    let result = Cli::try_parse_from([
        "pausable-downloader",
        "fetch",
        "http://localhost/a.bin",
        "-o",
        "a.bin",
        "--output-format",
        "xml",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_control_command_round_trip_display() {
    for line in ["pause", "resume", "cancel", "start http://localhost/b.bin"] {
        let command: ControlCommand = line.parse().unwrap();
        assert_eq!(command.to_string(), line);
    }
}
