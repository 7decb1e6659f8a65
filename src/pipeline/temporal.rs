//! Stage 2: the temporal FIR filter (moving average or windowed sinc).
//!
//! Ring buffer of the last `L-1` post-spatial frames; `apply` advances the
//! pointer exactly once per call regardless of kernel length, per spec.md
//! §4.2's `getNextIndex` walk.

use std::f64::consts::PI;

pub struct TemporalFilter {
    kernel: Vec<f64>,
    ring: Vec<Vec<f64>>,
    head: usize,
    ring_len: usize,
}

impl TemporalFilter {
    pub fn moving_average(size: usize, total: usize) -> Self {
        let kernel = vec![1.0 / size as f64; size];
        TemporalFilter::from_kernel(kernel, total)
    }

    pub fn windowed_sinc(size: usize, cutoff: f64, total: usize) -> Self {
        let mut kernel = vec![0.0; size];
        let mut sum = 0.0;
        for (t, tap) in kernel.iter_mut().enumerate() {
            let shifted = t as f64 - (size as f64 - 1.0) / 2.0;
            *tap = if shifted == 0.0 {
                2.0 * PI * cutoff
            } else {
                (2.0 * PI * cutoff * shifted).sin() / shifted
            };
            sum += *tap;
        }
        for tap in kernel.iter_mut() {
            *tap /= sum;
        }
        TemporalFilter::from_kernel(kernel, total)
    }

    fn from_kernel(kernel: Vec<f64>, total: usize) -> Self {
        let ring_len = kernel.len().saturating_sub(1);
        TemporalFilter {
            kernel,
            ring: (0..ring_len).map(|_| vec![0.0; total]).collect(),
            head: 0,
            ring_len,
        }
    }

    /// Number of prior frames the ring buffer needs primed before the first
    /// emitted output reflects steady-state behavior.
    pub fn priming_needed(&self) -> usize {
        self.ring_len
    }

    /// Convolves `frame` against the ring history, in place, then stores the
    /// pre-filter value for future frames.
    pub fn apply(&mut self, frame: &mut Vec<f64>) {
        if self.ring_len == 0 {
            for v in frame.iter_mut() {
                *v *= self.kernel[0];
            }
            return;
        }

        let stored = frame.clone();
        for v in frame.iter_mut() {
            *v *= self.kernel[0];
        }

        let mut idx = self.head;
        for tap in self.kernel.iter().skip(1) {
            for (v, r) in frame.iter_mut().zip(self.ring[idx].iter()) {
                *v += r * tap;
            }
            idx = next_index(idx, self.ring_len);
        }
        self.ring[self.head] = stored;
        self.head = next_index(self.head, self.ring_len);
    }
}

fn next_index(idx: usize, size: usize) -> usize {
    if idx + 1 == size {
        0
    } else {
        idx + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moving_average_kernel_sums_to_one() {
        let filter = TemporalFilter::moving_average(15, 4);
        let sum: f64 = filter.kernel.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn windowed_sinc_kernel_sums_to_one() {
        let filter = TemporalFilter::windowed_sinc(15, 0.04, 4);
        let sum: f64 = filter.kernel.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn size_one_degenerates_to_identity() {
        let mut filter = TemporalFilter::moving_average(1, 3);
        assert_eq!(filter.priming_needed(), 0);
        let mut frame = vec![1.0, 2.0, 3.0];
        filter.apply(&mut frame);
        assert_eq!(frame, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn priming_then_constant_input_converges_to_constant_output() {
        let mut filter = TemporalFilter::moving_average(4, 1);
        for _ in 0..filter.priming_needed() {
            let mut frame = vec![5.0];
            filter.apply(&mut frame);
        }
        let mut frame = vec![5.0];
        filter.apply(&mut frame);
        assert!((frame[0] - 5.0).abs() < 1e-9);
    }
}
