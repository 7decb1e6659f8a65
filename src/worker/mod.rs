//! The two cooperative workers that make up a running pipeline: the
//! Processing Worker (C6), which drives acquisition and DSP, and the
//! Service Worker (C7), which answers client RPCs over a datagram socket.
//! Each runs on its own OS thread, joined by the outer driver in `lib.rs`.

pub mod processing;
pub mod service;

pub use processing::{run_processing, ProcessingOutcome};
pub use service::run_service;
