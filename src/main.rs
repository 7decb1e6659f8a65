//! Minimal binary entry point. Full CLI argument parsing and YAML
//! config-file loading are external collaborators by design (see
//! `SPEC_FULL.md`); this is a thin, hand-rolled adapter from argv to a
//! [`pressmat::Config`] and a [`pressmat::SourceMode`] so the crate is
//! runnable on its own without pulling in an argument-parsing framework.

use pressmat::{Config, SourceMode};

struct Args {
    config_path: Option<String>,
    debug: bool,
    port: Option<String>,
    baudrate: Option<u32>,
    files: Vec<String>,
}

fn parse_args() -> Args {
    let mut args = Args { config_path: None, debug: false, port: None, baudrate: None, files: Vec::new() };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => args.config_path = iter.next(),
            "-d" | "--debug" => args.debug = true,
            "-p" | "--port" => args.port = iter.next(),
            "-b" | "--baudrate" => {
                if let Some(value) = iter.next() {
                    args.baudrate = value.parse().ok();
                }
            }
            other => args.files.push(other.to_string()),
        }
    }
    args
}

fn main() {
    let args = parse_args();

    let mut config = match &args.config_path {
        Some(path) => match Config::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("failed to load config '{}': {}", path, e);
                std::process::exit(1);
            }
        },
        None => Config::blank(),
    };

    if let Some(port) = args.port {
        config.serial.port = Some(port);
    }
    if let Some(baudrate) = args.baudrate {
        config.serial.baudrate = Some(baudrate);
    }

    let source_mode = if args.debug {
        SourceMode::Debug
    } else if !args.files.is_empty() {
        SourceMode::File(args.files)
    } else {
        SourceMode::Serial
    };

    if let Err(e) = pressmat::run(config, source_mode) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
