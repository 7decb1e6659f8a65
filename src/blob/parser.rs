//! Flood-fill blob extraction: finds up to `total` disjoint high-value
//! regions in a frame and reports the weighted centroid of the blob the
//! caller cares about (the largest, or the one survives `special_check`
//! if set).

use std::collections::VecDeque;

pub struct BlobParser {
    rows: usize,
    cols: usize,
    threshold: f64,
    total: usize,
    normalize: bool,
    special: bool,

    data2d: Vec<f64>,
    flag2d: Vec<i32>,
    dataout: Vec<f64>,
    queue: VecDeque<(usize, usize)>,

    centers: Vec<(f64, f64)>,
    values: Vec<f64>,
    blob_cnt: usize,
    blob_idx: i32,
    weighted_r: f64,
    weighted_c: f64,
    parsed_value: f64,
}

impl BlobParser {
    pub fn new(rows: usize, cols: usize, threshold: f64, total: usize, normalize: bool, special: bool) -> Self {
        BlobParser {
            rows,
            cols,
            threshold,
            total,
            normalize,
            special,
            data2d: vec![0.0; rows * cols],
            flag2d: vec![-1; rows * cols],
            dataout: vec![0.0; rows * cols],
            queue: VecDeque::new(),
            centers: Vec::new(),
            values: Vec::new(),
            blob_cnt: 0,
            blob_idx: -1,
            weighted_r: 0.0,
            weighted_c: 0.0,
            parsed_value: 0.0,
        }
    }

    #[inline]
    fn idx(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    /// Zeroes every cell outside the selected blob, and shifts the
    /// remaining cells down by `threshold` so they start at zero.
    pub fn transform(&mut self, data: &[f64]) -> Vec<f64> {
        self.parse(data);
        for v in self.dataout.iter_mut() {
            *v = 0.0;
        }
        if self.blob_idx >= 0 {
            for i in 0..self.data2d.len() {
                if self.flag2d[i] == self.blob_idx && data[i] > self.threshold {
                    self.dataout[i] = data[i] - self.threshold;
                }
            }
        }
        self.dataout.clone()
    }

    /// Returns `(row, col, value)`, normalized to `[0, 1]` if configured.
    /// `value` is 0 when no blob clears the threshold.
    pub fn parse(&mut self, data: &[f64]) -> (f64, f64, f64) {
        self.data2d.copy_from_slice(data);
        self.flag2d.iter_mut().for_each(|f| *f = -1);
        self.blob_cnt = 0;
        let mut control = self.threshold;
        let cal_threshold = self.threshold * 0.5;
        let mut remaining = self.total;

        while remaining > 0 {
            let (max_idx, max_value) = self
                .data2d
                .iter()
                .enumerate()
                .fold((0usize, f64::MIN), |acc, (i, &v)| if v > acc.1 { (i, v) } else { acc });
            if max_value > control.max(self.threshold) {
                self.blob_cnt += 1;
                remaining -= 1;
                control = max_value * 0.5;
                let blob_idx = (self.blob_cnt - 1) as i32;
                let max_r = max_idx / self.cols;
                let max_c = max_idx % self.cols;
                let result = self.flood(max_r, max_c, cal_threshold, control, blob_idx);
                let modified = max_value - self.threshold;
                if self.centers.len() < self.blob_cnt {
                    self.centers.push(result);
                    self.values.push(modified);
                } else {
                    self.centers[blob_idx as usize] = result;
                    self.values[blob_idx as usize] = modified;
                }
            } else {
                break;
            }
        }

        let (row, col, val) = self.filter();
        if self.normalize {
            (row / (self.rows - 1) as f64, col / (self.cols - 1) as f64, val)
        } else {
            (row, col, val)
        }
    }

    fn check_pos(&mut self, row: isize, col: isize, threshold: f64, blob_idx: i32) -> bool {
        if row < 0 || row >= self.rows as isize || col < 0 || col >= self.cols as isize {
            return false;
        }
        let (row, col) = (row as usize, col as usize);
        let i = self.idx(row, col);
        if self.flag2d[i] != -1 {
            return false;
        }
        if self.data2d[i] >= threshold {
            self.queue.push_back((row, col));
            self.flag2d[i] = blob_idx;
            return true;
        }
        false
    }

    fn flood(&mut self, row: usize, col: usize, threshold: f64, control: f64, blob_idx: i32) -> (f64, f64) {
        let mut r_sum = 0.0;
        let mut c_sum = 0.0;
        let mut w_sum = 0.0;

        self.queue.clear();
        self.queue.push_back((row, col));
        self.flag2d[self.idx(row, col)] = blob_idx;

        while let Some((r, c)) = self.queue.pop_front() {
            let i = self.idx(r, c);
            let cur_value = self.data2d[i];
            self.data2d[i] = threshold - 1.0;

            if cur_value >= control {
                r_sum += cur_value * r as f64;
                c_sum += cur_value * c as f64;
                w_sum += cur_value;
            }

            let (r, c) = (r as isize, c as isize);
            self.check_pos(r, c - 1, threshold, blob_idx);
            self.check_pos(r, c + 1, threshold, blob_idx);
            self.check_pos(r - 1, c, threshold, blob_idx);
            self.check_pos(r + 1, c, threshold, blob_idx);
        }

        (r_sum / w_sum, c_sum / w_sum)
    }

    fn filter(&mut self) -> (f64, f64, f64) {
        let mut blob_idx = -1;
        if self.blob_cnt >= 1 {
            blob_idx = if self.special { self.special_check() } else { 0 };
        }

        self.blob_idx = blob_idx;
        if blob_idx >= 0 {
            self.parsed_value = self.values[blob_idx as usize];
            self.weighted_r = self.centers[blob_idx as usize].0;
            self.weighted_c = self.centers[blob_idx as usize].1;
        } else {
            self.parsed_value = 0.0;
        }
        (self.weighted_r, self.weighted_c, self.parsed_value)
    }

    /// Excludes a blob hugging the near edge column unless a second blob
    /// hugs the far edge, a hardware quirk on certain sensor boards.
    fn special_check(&self) -> i32 {
        let mut blob_idx = 0;
        if self.centers[0].1 <= 0.06 * (self.cols - 1) as f64 {
            blob_idx = -1;
            if self.blob_cnt >= 2 {
                for i in 1..self.blob_cnt {
                    if self.centers[i].1 >= 0.93 * (self.cols - 1) as f64 {
                        blob_idx = i as i32;
                        break;
                    }
                }
            }
        }
        blob_idx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: usize, cols: usize, hot: &[(usize, usize, f64)]) -> Vec<f64> {
        let mut g = vec![0.0; rows * cols];
        for &(r, c, v) in hot {
            g[r * cols + c] = v;
        }
        g
    }

    #[test]
    fn single_blob_centroid_matches_its_only_hot_cell() {
        let mut parser = BlobParser::new(4, 4, 0.1, 3, false, false);
        let data = grid(4, 4, &[(2, 1, 1.0)]);
        let (row, col, val) = parser.parse(&data);
        assert!((row - 2.0).abs() < 1e-9);
        assert!((col - 1.0).abs() < 1e-9);
        assert!((val - 0.9).abs() < 1e-9);
    }

    #[test]
    fn below_threshold_yields_no_blob() {
        let mut parser = BlobParser::new(4, 4, 0.5, 3, false, false);
        let data = vec![0.1; 16];
        let (_, _, val) = parser.parse(&data);
        assert_eq!(val, 0.0);
    }

    #[test]
    fn normalize_scales_into_unit_square() {
        let mut parser = BlobParser::new(5, 5, 0.1, 1, true, false);
        let data = grid(5, 5, &[(4, 4, 1.0)]);
        let (row, col, _) = parser.parse(&data);
        assert!((row - 1.0).abs() < 1e-9);
        assert!((col - 1.0).abs() < 1e-9);
    }

    #[test]
    fn special_check_rejects_lone_near_edge_blob() {
        let mut parser = BlobParser::new(1, 20, 0.1, 3, false, true);
        let data = grid(1, 20, &[(0, 0, 1.0)]);
        let (_, _, val) = parser.parse(&data);
        assert_eq!(val, 0.0);
    }

    #[test]
    fn special_check_accepts_far_edge_when_paired_with_near_edge_blob() {
        let mut parser = BlobParser::new(1, 20, 0.1, 3, false, true);
        let data = grid(1, 20, &[(0, 0, 1.0), (0, 19, 0.8)]);
        let (_, col, val) = parser.parse(&data);
        assert!(val > 0.0);
        assert!((col - 19.0).abs() < 1e-9);
    }
}
