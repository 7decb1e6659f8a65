//! Blob Tracker (C3): optional post-processing stage that resamples a
//! calibrated frame to a display shape and extracts a single touch point
//! from it.

pub mod interpolate;
pub mod parser;

use interpolate::Interpolator;
use parser::BlobParser;

pub struct BlobTracker {
    interpolator: Option<Interpolator>,
    parser: BlobParser,
    sensor_rows: usize,
    sensor_cols: usize,
    interp_rows: usize,
    interp_cols: usize,
}

impl BlobTracker {
    pub fn new(
        sensor_shape: (usize, usize),
        interp_shape: Option<(usize, usize)>,
        interp_order: usize,
        threshold: f64,
        blob_num: usize,
        special_check: bool,
    ) -> Self {
        let (interp_rows, interp_cols) = interp_shape.unwrap_or(sensor_shape);
        let interpolator = interp_shape.map(|(r, c)| Interpolator::new(r, c, interp_order));
        let parser = BlobParser::new(interp_rows, interp_cols, threshold, blob_num, true, special_check);
        BlobTracker {
            interpolator,
            parser,
            sensor_rows: sensor_shape.0,
            sensor_cols: sensor_shape.1,
            interp_rows,
            interp_cols,
        }
    }

    /// Resamples `frame` (sensor-shaped) to the display shape if configured,
    /// then returns the parsed `(row, col, value)` touch point.
    pub fn track(&mut self, frame: &[f64]) -> (f64, f64, f64) {
        match &self.interpolator {
            Some(interp) => {
                let resampled = interp.interpolate(frame, self.sensor_rows, self.sensor_cols);
                self.parser.parse(&resampled)
            }
            None => self.parser.parse(frame),
        }
    }

    pub fn display_shape(&self) -> (usize, usize) {
        (self.interp_rows, self.interp_cols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_interpolation_when_shape_unset() {
        let mut tracker = BlobTracker::new((4, 4), None, 3, 0.1, 1, false);
        let mut frame = vec![0.0; 16];
        frame[5] = 1.0;
        let (row, col, val) = tracker.track(&frame);
        assert!((row - 1.0 / 3.0).abs() < 1e-9);
        assert!((col - 1.0 / 3.0).abs() < 1e-9);
        assert!(val > 0.0);
    }
}
