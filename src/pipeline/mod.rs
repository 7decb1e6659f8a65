//! The Pressure Handler (C2): converts raw ADC samples into calibrated
//! pressure values through masking, voltage-to-resistance conversion,
//! spatial/temporal filtering and baseline calibration.
//!
//! Stages are applied in the same order the original pressure handler used:
//! mask -> convert -> spatial filter -> temporal filter -> calibrate. Each
//! stage is its own small module so it can be tested and reasoned about in
//! isolation; [`Pipeline`] is just the glue that sequences them and exposes
//! the one entry point the workers call per frame.

pub mod calibration;
pub mod convert;
pub mod fft;
pub mod r0;
pub mod spatial;
pub mod temporal;

use crate::config::ResolvedConfig;

use calibration::Calibration;
use spatial::SpatialFilter;
use temporal::TemporalFilter;

/// Which intermediate stage the raw frame bus should snapshot, mirroring
/// the `intermediate` config knob (0 = post-convert, 1 = post-spatial,
/// 2 = post-temporal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intermediate {
    PostConvert,
    PostSpatial,
    PostTemporal,
}

impl Intermediate {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Intermediate::PostSpatial,
            2 => Intermediate::PostTemporal,
            _ => Intermediate::PostConvert,
        }
    }
}

pub struct Pipeline {
    total: usize,
    mask: Option<Vec<i32>>,
    convert: bool,
    resi_opposite: bool,
    resi_delta: bool,
    v0: f64,
    r0_reci: f64,
    r0_start: Option<Vec<f64>>,
    spatial: Option<SpatialFilter>,
    temporal: Option<TemporalFilter>,
    calibration: Option<Calibration>,
    intermediate: Intermediate,
}

impl Pipeline {
    /// Builds a pipeline shell from the resolved config. Stateful pieces
    /// that need seed frames (R0_START, temporal cache, calibration
    /// baseline) are primed separately via [`Pipeline::prepare`] once a
    /// frame generator is available.
    pub fn new(resolved: &ResolvedConfig) -> Pipeline {
        let (rows, cols) = resolved.shape;
        let mask = resolved.mask.as_ref().map(|grid| grid.iter().flatten().copied().collect());

        let spatial = match resolved.filter_spatial {
            crate::config::SpatialFilterKind::None => None,
            kind => Some(SpatialFilter::new(kind, rows, cols, resolved.filter_spatial_cutoff, resolved.butterworth_order)),
        };

        let temporal = match resolved.filter_temporal {
            crate::config::TemporalFilterKind::None => None,
            crate::config::TemporalFilterKind::Ma => Some(TemporalFilter::moving_average(resolved.filter_temporal_size, resolved.total)),
            crate::config::TemporalFilterKind::Rw => Some(TemporalFilter::windowed_sinc(resolved.filter_temporal_size, resolved.rw_cutoff, resolved.total)),
        };

        Pipeline {
            total: resolved.total,
            mask,
            convert: resolved.convert,
            resi_opposite: resolved.resi_opposite,
            resi_delta: resolved.resi_delta,
            v0: resolved.v0,
            r0_reci: resolved.r0_reci,
            r0_start: None,
            spatial,
            temporal,
            calibration: None,
            intermediate: Intermediate::from_u8(resolved.intermediate),
        }
    }

    /// Seeds delta-R baseline, temporal filter cache, and static
    /// calibration, each by pulling raw frames through `next_raw` (and, for
    /// the temporal/calibration priming, through the already-built early
    /// stages) exactly as many times as that stage needs.
    pub fn prepare<F: FnMut() -> Vec<f64>>(&mut self, resolved: &ResolvedConfig, mut next_raw: F) {
        if self.resi_delta {
            self.r0_start = Some(r0::estimate(self.total, self.v0, self.r0_reci, || {
                let mut frame = next_raw();
                self.apply_mask(&mut frame);
                frame
            }));
            return;
        }

        if let Some(temporal) = &self.temporal {
            let needed = temporal.priming_needed();
            for _ in 0..needed {
                let mut frame = next_raw();
                self.convert_frame(&mut frame);
                self.run_filters(&mut frame);
            }
        }

        if resolved.cali_frames > 0 {
            let total = self.total;
            let mask = self.mask.clone();
            let convert = self.convert;
            let resi_opposite = self.resi_opposite;
            let v0 = self.v0;
            let r0_reci = self.r0_reci;
            let spatial = &self.spatial;
            let temporal = &mut self.temporal;
            let calibration = Calibration::prime(
                total,
                resolved.cali_frames,
                resolved.cali_win_size,
                resolved.cali_win_buffer_size,
                resolved.cali_threshold,
                || {
                    let mut frame = next_raw();
                    if let Some(mask) = &mask {
                        convert::apply_mask(&mut frame, mask);
                    }
                    if convert {
                        if resi_opposite {
                            convert::opposite(&mut frame, v0, r0_reci);
                        } else {
                            convert::reciprocal(&mut frame, v0, r0_reci);
                        }
                    }
                    if let Some(spatial) = spatial {
                        spatial.apply(&mut frame);
                    }
                    if let Some(temporal) = temporal {
                        temporal.apply(&mut frame);
                    }
                    frame
                },
            );
            self.calibration = calibration;
        }
    }

    fn apply_mask(&self, frame: &mut [f64]) {
        if let Some(mask) = &self.mask {
            convert::apply_mask(frame, mask);
        }
    }

    /// Stage 0: mask then voltage-to-resistance convert, in whichever mode
    /// the config selects.
    pub fn convert_frame(&self, frame: &mut [f64]) {
        self.apply_mask(frame);
        if !self.convert {
            return;
        }
        if self.resi_opposite {
            convert::opposite(frame, self.v0, self.r0_reci);
        } else if self.resi_delta {
            let r0_start = self.r0_start.as_deref().unwrap_or(&[]);
            convert::delta(frame, self.v0, self.r0_reci, r0_start);
        } else {
            convert::reciprocal(frame, self.v0, self.r0_reci);
        }
    }

    /// Stages 1-2: spatial then temporal filtering, each a no-op if not
    /// configured. Returns a snapshot to publish as the "raw" intermediate
    /// buffer if `stage` matches the configured intermediate point.
    pub fn run_filters(&mut self, frame: &mut Vec<f64>) -> Option<Vec<f64>> {
        let mut snapshot = None;
        if self.intermediate == Intermediate::PostConvert {
            snapshot = Some(frame.clone());
        }
        if let Some(spatial) = &self.spatial {
            spatial.apply(frame);
        }
        if self.intermediate == Intermediate::PostSpatial {
            snapshot = Some(frame.clone());
        }
        if let Some(temporal) = &mut self.temporal {
            temporal.apply(frame);
        }
        if self.intermediate == Intermediate::PostTemporal {
            snapshot = Some(frame.clone());
        }
        snapshot
    }

    /// Stage 3: subtracts the rolling baseline. No-op in delta-R mode
    /// (which normalizes against `R0_START` during conversion instead) or
    /// when calibration was never primed.
    pub fn calibrate(&mut self, frame: &mut [f64]) {
        if self.resi_delta {
            return;
        }
        if let Some(calibration) = &mut self.calibration {
            calibration.apply(frame);
        }
    }

    /// Runs mask, convert, filter and calibrate in sequence on one raw
    /// frame, returning the intermediate snapshot the bus should publish.
    pub fn handle(&mut self, frame: &mut Vec<f64>) -> Option<Vec<f64>> {
        self.convert_frame(frame);
        let snapshot = self.run_filters(frame);
        self.calibrate(frame);
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn handle_with_no_stages_configured_is_a_passthrough() {
        let mut resolved = Config::blank().resolve().unwrap();
        resolved.shape = (2, 2);
        resolved.total = 4;
        resolved.convert = false;
        resolved.filter_spatial = crate::config::SpatialFilterKind::None;
        resolved.filter_temporal = crate::config::TemporalFilterKind::None;
        resolved.cali_frames = 0;

        let mut pipeline = Pipeline::new(&resolved);
        let mut frame = vec![1.0, 2.0, 3.0, 4.0];
        pipeline.handle(&mut frame);
        assert_eq!(frame, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn convert_frame_applies_mask_before_reciprocal() {
        let mut resolved = Config::blank().resolve().unwrap();
        resolved.shape = (1, 2);
        resolved.total = 2;
        resolved.mask = Some(vec![vec![1, 0]]);
        resolved.convert = true;
        resolved.v0 = 255.0;
        resolved.r0_reci = 1.0;
        resolved.filter_spatial = crate::config::SpatialFilterKind::None;
        resolved.filter_temporal = crate::config::TemporalFilterKind::None;
        resolved.cali_frames = 0;

        let pipeline = Pipeline::new(&resolved);
        let mut frame = vec![100.0, 200.0];
        pipeline.convert_frame(&mut frame);
        assert_eq!(frame[1], 0.0);
        assert!((frame[0] - 100.0 / 155.0).abs() < 1e-9);
    }
}
