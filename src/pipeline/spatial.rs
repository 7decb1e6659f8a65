//! Stage 1: the 2-D spatial low-pass filter.
//!
//! Builds a precomputed `R x (C/2+1)` real-valued frequency mask (stable
//! across frames until reconfiguration) and applies it as rFFT ->
//! elementwise multiply -> irFFT, per spec.md §4.2.

use crate::config::SpatialFilterKind;

use super::fft::{self, Complex};

pub struct SpatialFilter {
    kernel: Vec<f64>,
    rows: usize,
    cols: usize,
}

impl SpatialFilter {
    /// Builds the half-spectrum kernel for the given window and cutoff.
    /// Row wrap mirrors DFT symmetry: rows past `R/2` mirror distance
    /// against `R - i`, so `kernel[i,j] == kernel[(R-i) mod R, j]`.
    pub fn new(kind: SpatialFilterKind, rows: usize, cols: usize, cutoff: f64, butter_order: i32) -> Self {
        let half = cols / 2 + 1;
        let mut kernel = vec![0.0; rows * half];
        let row_divide = rows / 2;

        let window = |d: f64| -> f64 {
            match kind {
                SpatialFilterKind::Ideal => {
                    if d <= cutoff {
                        1.0
                    } else {
                        0.0
                    }
                }
                SpatialFilterKind::Butterworth => 1.0 / (1.0 + (d / cutoff).powi(2 * butter_order)),
                SpatialFilterKind::Gaussian => (-(d * d) / (2.0 * cutoff * cutoff)).exp(),
                SpatialFilterKind::None => 1.0,
            }
        };

        for i in 0..=row_divide {
            for j in 0..half {
                let d = ((i * i + j * j) as f64).sqrt();
                kernel[i * half + j] = window(d);
            }
        }
        for i in (row_divide + 1)..rows {
            let dr = rows - i;
            for j in 0..half {
                let d = ((dr * dr + j * j) as f64).sqrt();
                kernel[i * half + j] = window(d);
            }
        }

        SpatialFilter { kernel, rows, cols }
    }

    /// Elementwise-multiplies the rFFT of `frame` by the kernel and inverts
    /// back to the spatial domain, in place.
    pub fn apply(&self, frame: &mut [f64]) {
        let spectrum = fft::rfft2(frame, self.rows, self.cols);
        let filtered: Vec<Complex> = spectrum
            .iter()
            .zip(self.kernel.iter())
            .map(|(c, k)| Complex::new(c.re * k, c.im * k))
            .collect();
        let out = fft::irfft2(&filtered, self.rows, self.cols);
        frame.copy_from_slice(&out);
    }

    #[cfg(test)]
    fn kernel_at(&self, row: usize, col: usize) -> f64 {
        let half = self.cols / 2 + 1;
        self.kernel[row * half + col]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_is_symmetric_across_the_row_wrap() {
        let filter = SpatialFilter::new(SpatialFilterKind::Gaussian, 8, 8, 3.5, 2);
        for i in 0..8 {
            for j in 0..5 {
                let mirrored = (8 - i) % 8;
                assert!(
                    (filter.kernel_at(i, j) - filter.kernel_at(mirrored, j)).abs() < 1e-12,
                    "row {} col {} not symmetric",
                    i,
                    j
                );
            }
        }
    }

    #[test]
    fn ideal_kernel_is_a_hard_cutoff() {
        let filter = SpatialFilter::new(SpatialFilterKind::Ideal, 4, 4, 1.0, 2);
        assert_eq!(filter.kernel_at(0, 0), 1.0);
        assert_eq!(filter.kernel_at(2, 2), 0.0);
    }

    #[test]
    fn constant_frame_is_unchanged_by_a_passthrough_kernel() {
        // Butterworth with a huge cutoff is effectively all-pass.
        let filter = SpatialFilter::new(SpatialFilterKind::Butterworth, 4, 4, 1000.0, 2);
        let mut frame = vec![5.0; 16];
        filter.apply(&mut frame);
        for v in frame {
            assert!((v - 5.0).abs() < 1e-6);
        }
    }
}
