//! `pressmat`: matrix pressure sensor acquisition, a multi-stage DSP
//! pipeline, and a datagram RPC service exposing the result to clients.
//!
//! The crate is organized around the dataflow described by its design:
//! a [`source::FrameSource`] feeds the [`pipeline::Pipeline`] (optionally
//! through [`blob::BlobTracker`]), the [`worker::processing`] loop drives
//! that pipeline and publishes results onto the [`bus::SharedFrameBus`],
//! and [`worker::service`] answers client requests against that bus while
//! relaying control messages to the processing side over
//! [`control::ControlChannel`](control::control_channel).

pub mod blob;
pub mod bus;
pub mod config;
pub mod control;
pub mod error;
pub mod pipeline;
pub mod recording;
pub mod source;
pub mod wire;
pub mod worker;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub use config::Config;
pub use error::{PressmatError, Result};

use bus::SharedFrameBus;
use source::{AnySource, DebugSource, FileSource, SerialSource};
use worker::ProcessingOutcome;

/// Where the Processing Worker should pull raw frames from. CLI argument
/// parsing and config-file I/O that decide this (and everything else
/// about invocation) live outside this crate; `main.rs` is a thin,
/// hand-rolled adapter from argv to this enum plus a [`Config`].
#[derive(Debug, Clone)]
pub enum SourceMode {
    Serial,
    File(Vec<String>),
    Debug,
}

fn build_source(resolved: &config::ResolvedConfig, mode: &SourceMode) -> Result<AnySource> {
    match mode {
        SourceMode::Debug => Ok(AnySource::Debug(DebugSource::new())),
        SourceMode::File(filenames) => Ok(AnySource::File(FileSource::new(resolved.total, filenames.clone()))),
        SourceMode::Serial => {
            let port = resolved
                .serial_port
                .clone()
                .ok_or_else(|| PressmatError::ConfigError("serial.port is required".into()))?;
            let timeout = Duration::from_secs_f64(resolved.serial_timeout);
            let source = SerialSource::open(&port, resolved.baudrate, timeout, resolved.total, resolved.imu, resolved.protocol)?;
            Ok(AnySource::Serial(source))
        }
    }
}

/// The outer driver: builds a generation of the pipeline from `config`,
/// runs the Processing and Service Workers on their own threads, and
/// rebuilds everything from scratch when the Processing Worker returns a
/// `Restart`. Only the Processing Worker's outcome decides whether to
/// loop again; the Service Worker's thread is joined but not consulted,
/// since `RESTART`/`RESTART_FILE`/`CLOSE` all end its loop in lock-step.
pub fn run(mut config: Config, source_mode: SourceMode) -> Result<()> {
    loop {
        let resolved = config.resolve()?;
        config::print_sensor(&resolved);

        let bus = Arc::new(SharedFrameBus::new(resolved.total));
        let (proc_end, srv_end) = control::control_channel();

        let service_enabled = config.server_mode.unwrap_or(true);
        let service_handle = if service_enabled {
            let bus_for_service = Arc::clone(&bus);
            let config_for_service = config.clone();
            let resolved_for_service = resolved.clone();
            Some(thread::spawn(move || {
                worker::run_service(&resolved_for_service, config_for_service, bus_for_service, srv_end)
            }))
        } else {
            None
        };

        let source = build_source(&resolved, &source_mode)?;
        let outcome = worker::run_processing(&resolved, source, bus, proc_end)?;

        if let Some(handle) = service_handle {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => eprintln!("service worker error: {}", e),
                Err(_) => eprintln!("service worker thread panicked"),
            }
        }

        match outcome {
            ProcessingOutcome::Stopped => return Ok(()),
            ProcessingOutcome::Restart(new_config) => {
                config = *new_config;
                continue;
            }
        }
    }
}
