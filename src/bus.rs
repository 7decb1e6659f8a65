//! Shared Frame Bus (C4): lock-free, single-writer cross-thread hand-off
//! of the raw frame, processed frame, IMU vector, and frame index.
//!
//! C6 is the sole writer; C7 and any in-process visualizer are readers.
//! Writes are bulk element-wise stores; readers may observe a torn mix of
//! old and new cells across a single frame, which is acceptable because
//! the client contract is "a recent frame", not "a consistent snapshot".

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

fn bits_to_f64(bits: u64) -> f64 {
    f64::from_bits(bits)
}

/// A fixed-length array of atomically-updated f64 cells.
pub struct AtomicFrame {
    cells: Box<[AtomicU64]>,
}

impl AtomicFrame {
    pub fn new(len: usize) -> Self {
        let cells = (0..len).map(|_| AtomicU64::new(0)).collect();
        AtomicFrame { cells }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Bulk overwrite from `src`. `src.len()` must equal `self.len()`.
    pub fn store(&self, src: &[f64]) {
        debug_assert_eq!(src.len(), self.cells.len());
        for (cell, value) in self.cells.iter().zip(src.iter()) {
            cell.store(value.to_bits(), Ordering::Relaxed);
        }
    }

    /// Bulk read into `dst`. `dst.len()` must equal `self.len()`.
    pub fn load_into(&self, dst: &mut [f64]) {
        debug_assert_eq!(dst.len(), self.cells.len());
        for (cell, slot) in self.cells.iter().zip(dst.iter_mut()) {
            *slot = bits_to_f64(cell.load(Ordering::Relaxed));
        }
    }

    pub fn snapshot(&self) -> Vec<f64> {
        let mut out = vec![0.0; self.cells.len()];
        self.load_into(&mut out);
        out
    }
}

/// The shared bus, sized once at worker start by the sensor's `total`.
pub struct SharedFrameBus {
    pub out: AtomicFrame,
    pub raw: AtomicFrame,
    pub imu: AtomicFrame,
    frame_idx: AtomicU32,
}

impl SharedFrameBus {
    pub fn new(total: usize) -> Self {
        SharedFrameBus {
            out: AtomicFrame::new(total),
            raw: AtomicFrame::new(total),
            imu: AtomicFrame::new(6),
            frame_idx: AtomicU32::new(0),
        }
    }

    pub fn publish_frame_idx(&self, idx: u32) {
        self.frame_idx.store(idx, Ordering::Relaxed);
    }

    pub fn frame_idx(&self) -> u32 {
        self.frame_idx.load(Ordering::Relaxed)
    }

    pub fn reset_frame_idx(&self) {
        self.frame_idx.store(0, Ordering::Relaxed);
    }
}
