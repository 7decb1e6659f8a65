//! Hand-rolled 2-D real DFT backing the spatial low-pass filter
//! (`pipeline::spatial`).
//!
//! A direct double sum per output bin, not restricted to power-of-two
//! sizes, mirroring the half-spectrum convention of `numpy.fft.rfft2` /
//! `numpy.fft.irfft2`: the forward transform returns `rows x (cols/2+1)`
//! complex bins, and the inverse reconstructs the full `rows x cols` real
//! array via Hermitian symmetry. Adequate for the small sensor grids this
//! system targets, and it keeps the same "hand-roll the DSP" texture the
//! rest of the crate follows rather than pulling in a dedicated FFT crate.

use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

impl Complex {
    pub const ZERO: Complex = Complex { re: 0.0, im: 0.0 };

    #[inline]
    pub fn new(re: f64, im: f64) -> Self {
        Complex { re, im }
    }

    #[inline]
    fn add(self, other: Complex) -> Complex {
        Complex::new(self.re + other.re, self.im + other.im)
    }

    #[inline]
    fn mul(self, other: Complex) -> Complex {
        Complex::new(
            self.re * other.re - self.im * other.im,
            self.re * other.im + self.im * other.re,
        )
    }

    #[inline]
    fn conj(self) -> Complex {
        Complex::new(self.re, -self.im)
    }
}

/// Forward real 2-D DFT. `input` is row-major `rows x cols`.
pub fn rfft2(input: &[f64], rows: usize, cols: usize) -> Vec<Complex> {
    let half = cols / 2 + 1;
    let mut out = vec![Complex::ZERO; rows * half];
    for u in 0..rows {
        for v in 0..half {
            let mut sum = Complex::ZERO;
            for r in 0..rows {
                for c in 0..cols {
                    let angle =
                        -2.0 * PI * ((u * r) as f64 / rows as f64 + (v * c) as f64 / cols as f64);
                    let tw = Complex::new(angle.cos(), angle.sin());
                    sum = sum.add(Complex::new(input[r * cols + c], 0.0).mul(tw));
                }
            }
            out[u * half + v] = sum;
        }
    }
    out
}

/// Inverse of [`rfft2`]: reconstructs the `rows x cols` real array from its
/// half-spectrum.
pub fn irfft2(spectrum: &[Complex], rows: usize, cols: usize) -> Vec<f64> {
    let half = cols / 2 + 1;
    let bin = |u: usize, v: usize| -> Complex {
        if v < half {
            spectrum[u * half + v]
        } else {
            let uu = (rows - u) % rows;
            spectrum[uu * half + (cols - v)].conj()
        }
    };
    let norm = (rows * cols) as f64;
    let mut out = vec![0.0; rows * cols];
    for r in 0..rows {
        for c in 0..cols {
            let mut sum = Complex::ZERO;
            for u in 0..rows {
                for v in 0..cols {
                    let angle =
                        2.0 * PI * ((u * r) as f64 / rows as f64 + (v * c) as f64 / cols as f64);
                    let tw = Complex::new(angle.cos(), angle.sin());
                    sum = sum.add(bin(u, v).mul(tw));
                }
            }
            out[r * cols + c] = sum.re / norm;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dc_component_is_the_mean_times_cell_count() {
        let data = vec![1.0, 2.0, 3.0, 4.0];
        let spectrum = rfft2(&data, 2, 2);
        // bin (0,0) is the sum of all cells.
        assert!((spectrum[0].re - 10.0).abs() < 1e-9);
        assert!(spectrum[0].im.abs() < 1e-9);
    }

    #[test]
    fn forward_then_inverse_roundtrips() {
        let data = vec![1.0, 5.0, -2.0, 3.0, 0.5, 7.0, 2.0, -1.0, 4.0, 6.0, -3.0, 1.5];
        let spectrum = rfft2(&data, 3, 4);
        let back = irfft2(&spectrum, 3, 4);
        for (a, b) in data.iter().zip(back.iter()) {
            assert!((a - b).abs() < 1e-9, "{} vs {}", a, b);
        }
    }
}
