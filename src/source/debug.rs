//! A synthetic frame source used when no sensor hardware is attached.
//! Sleeps for a fixed interval and returns without touching the caller's
//! buffers, so the rest of the pipeline can be exercised end-to-end.

use std::thread;
use std::time::Duration;

use crate::error::Result;

use super::{FrameSource, Tags};

const DEBUG_SLEEP: Duration = Duration::from_millis(10);

#[derive(Debug, Default)]
pub struct DebugSource {
    frame_idx: i64,
}

impl DebugSource {
    pub fn new() -> Self {
        DebugSource { frame_idx: 0 }
    }
}

impl FrameSource for DebugSource {
    fn fetch(&mut self, _raw_out: &mut [f64]) -> Result<Tags> {
        thread::sleep(DEBUG_SLEEP);
        self.frame_idx += 1;
        Ok(Tags { frame_idx: self.frame_idx, timestamp_us: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_leaves_buffer_untouched_and_advances_frame_idx() {
        let mut source = DebugSource::new();
        let mut out = vec![9.0; 4];
        let tags = source.fetch(&mut out).unwrap();
        assert_eq!(out, vec![9.0; 4]);
        assert_eq!(tags.frame_idx, 1);
        let tags = source.fetch(&mut out).unwrap();
        assert_eq!(tags.frame_idx, 2);
    }
}
