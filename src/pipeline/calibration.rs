//! Static calibration: tracks a slowly drifting zero baseline and subtracts
//! it from each frame, protected from transient touches by a two-stage gate
//! (an admission buffer in front of a rolling average window).
//!
//! Only used in reciprocal/opposite modes; delta-R mode estimates its
//! baseline once up front instead (see [`super::r0`]).

use std::collections::VecDeque;

pub struct Calibration {
    data_zero: Vec<f64>,
    data_win: Vec<Vec<f64>>,
    win_frame_idx: usize,
    win_size: usize,
    win_buffer: VecDeque<Vec<f64>>,
    win_buffer_size: usize,
    need_to_clean_buffer: bool,
    threshold: f64,
}

impl Calibration {
    /// Primes the baseline by averaging `init_frames` post-filter frames
    /// pulled from `next_frame`. Returns `None` if `init_frames == 0`
    /// (calibration disabled).
    pub fn prime<F: FnMut() -> Vec<f64>>(
        total: usize,
        init_frames: i64,
        win_size: usize,
        win_buffer_size: usize,
        threshold: f64,
        mut next_frame: F,
    ) -> Option<Calibration> {
        if init_frames <= 0 {
            return None;
        }

        let mut data_zero = vec![0.0; total];
        let mut frame_cnt = 0i64;
        while frame_cnt < init_frames {
            let frame = next_frame();
            for (z, v) in data_zero.iter_mut().zip(frame.iter()) {
                *z += v;
            }
            frame_cnt += 1;
        }
        for z in data_zero.iter_mut() {
            *z /= frame_cnt as f64;
        }

        let data_win = vec![data_zero.clone(); win_size.max(1)];
        let mut win_buffer = VecDeque::with_capacity(win_buffer_size);
        for _ in 0..win_buffer_size {
            win_buffer.push_back(data_zero.clone());
        }

        Some(Calibration {
            data_zero,
            data_win,
            win_frame_idx: 0,
            win_size,
            win_buffer,
            win_buffer_size,
            need_to_clean_buffer: false,
            threshold,
        })
    }

    /// Subtracts the current baseline from `frame` (clamped to non-negative),
    /// then rolls the baseline forward if the frame was cold (no cell
    /// exceeded `threshold` above the existing baseline).
    pub fn apply(&mut self, frame: &mut [f64]) {
        let stored = frame.to_vec();
        for (v, z) in frame.iter_mut().zip(self.data_zero.iter()) {
            *v -= z;
            if *v < 0.0 {
                *v = 0.0;
            }
        }

        if self.win_size == 0 {
            return;
        }

        let mut add_to_data_zero = true;
        for (s, z) in stored.iter().zip(self.data_zero.iter()) {
            if s - z > self.threshold {
                add_to_data_zero = false;
                self.need_to_clean_buffer = true;
                if self.win_buffer.len() == self.win_buffer_size {
                    self.win_buffer.clear();
                }
                break;
            }
        }

        if !add_to_data_zero {
            return;
        }

        if self.win_buffer.len() < self.win_buffer_size {
            self.win_buffer.push_back(stored);
            return;
        }

        if self.need_to_clean_buffer {
            self.win_buffer.clear();
            self.need_to_clean_buffer = false;
            self.win_buffer.push_back(stored);
            return;
        }

        let cur_data = self.win_buffer.pop_front().expect("buffer is at capacity");
        self.win_buffer.push_back(stored);
        for ((z, win), cur) in self
            .data_zero
            .iter_mut()
            .zip(self.data_win[self.win_frame_idx].iter())
            .zip(cur_data.iter())
        {
            *z += (cur - win) / self.win_size as f64;
        }
        self.data_win[self.win_frame_idx] = cur_data;
        self.win_frame_idx = next_index(self.win_frame_idx, self.win_size);
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
    fn prime_averages_the_seed_frames() {
        let mut frames = vec![vec![2.0, 4.0], vec![4.0, 6.0]].into_iter();
        let cal = Calibration::prime(2, 2, 0, 5, 3.0, || frames.next().unwrap()).unwrap();
        assert_eq!(cal.data_zero, vec![3.0, 5.0]);
    }

    #[test]
    fn zero_init_frames_disables_calibration() {
        assert!(Calibration::prime(2, 0, 0, 5, 3.0, || vec![0.0; 2]).is_none());
    }

    #[test]
    fn cold_frame_is_clamped_and_zeroed_to_baseline() {
        let mut cal = Calibration::prime(2, 1, 0, 5, 3.0, || vec![10.0, 20.0]).unwrap();
        let mut frame = vec![10.0, 20.0];
        cal.apply(&mut frame);
        assert_eq!(frame, vec![0.0, 0.0]);
    }

    #[test]
    fn negative_results_are_clamped_to_zero() {
        let mut cal = Calibration::prime(2, 1, 0, 5, 3.0, || vec![10.0, 20.0]).unwrap();
        let mut frame = vec![5.0, 20.0];
        cal.apply(&mut frame);
        assert_eq!(frame[0], 0.0);
    }

    #[test]
    fn hot_frame_does_not_move_the_baseline() {
        let mut cal = Calibration::prime(1, 1, 3, 5, 3.0, || vec![10.0]).unwrap();
        for _ in 0..10 {
            let mut frame = vec![10.0 + 100.0];
            cal.apply(&mut frame);
        }
        let mut probe = vec![10.0];
        cal.apply(&mut probe);
        assert_eq!(probe, vec![0.0]);
    }

    #[test]
    fn cold_frames_eventually_shift_a_drifting_baseline() {
        let mut cal = Calibration::prime(1, 1, 2, 2, 3.0, || vec![10.0]).unwrap();
        for _ in 0..20 {
            let mut frame = vec![11.0];
            cal.apply(&mut frame);
        }
        assert!(cal.data_zero[0] > 10.0);
    }
}
