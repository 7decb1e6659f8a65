//! Frame Acquisition (C1): pulls raw sensor frames from wherever they
//! actually come from (a serial UART, a recorded CSV file, or a debug
//! stub) and exposes them behind one small interface the rest of the
//! crate reads from.
//!
//! The original data always ends up as floats by the time the pressure
//! handler sees it, whether it started as raw ADC bytes off the wire or a
//! parsed CSV column, so [`FrameSource::fetch`] always yields `f64`s.

pub mod debug;
pub mod file;
pub mod serial;

use crate::error::Result;

pub use debug::DebugSource;
pub use file::FileSource;
pub use serial::SerialSource;

/// Metadata a fetch may carry alongside the raw frame: a source-assigned
/// sequence number and, for recorded sources, the original capture time in
/// microseconds since the epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tags {
    pub frame_idx: i64,
    pub timestamp_us: Option<i64>,
}

/// A source of raw sensor frames.
pub trait FrameSource {
    /// Fills `raw_out` (length `total`, or `total + 6` when IMU data is
    /// interleaved, with the 6 IMU axes appended past `total`) with the
    /// next frame. Returns the frame's tags.
    fn fetch(&mut self, raw_out: &mut [f64]) -> Result<Tags>;
}

/// A tagged union over the three concrete source kinds, used where a
/// trait object would add indirection for no benefit: the worker holds
/// exactly one of these for its whole lifetime and never needs to treat
/// sources polymorphically beyond `fetch`.
pub enum AnySource {
    Serial(SerialSource),
    File(FileSource),
    Debug(DebugSource),
}

impl FrameSource for AnySource {
    fn fetch(&mut self, raw_out: &mut [f64]) -> Result<Tags> {
        match self {
            AnySource::Serial(s) => s.fetch(raw_out),
            AnySource::File(s) => s.fetch(raw_out),
            AnySource::Debug(s) => s.fetch(raw_out),
        }
    }
}
