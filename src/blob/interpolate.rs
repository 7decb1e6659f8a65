//! Resamples a frame from its sensor shape up (or down) to a display shape,
//! by separable 1-D resampling along rows then columns.
//!
//! `scipy.ndimage.zoom`'s default spline order is 3; rather than pull in a
//! general spline-interpolation crate for one call site, order 3 here is
//! cubic convolution (Catmull-Rom), order 1 is bilinear and order 0 is
//! nearest-neighbor. Orders above 3 fall back to cubic.

pub struct Interpolator {
    out_rows: usize,
    out_cols: usize,
    order: usize,
}

impl Interpolator {
    pub fn new(out_rows: usize, out_cols: usize, order: usize) -> Self {
        Interpolator { out_rows, out_cols, order }
    }

    /// Resamples `data` (`in_rows x in_cols`, row-major) to the configured
    /// output shape. Returns `data` unchanged (as a copy) if the shapes
    /// already match.
    pub fn interpolate(&self, data: &[f64], in_rows: usize, in_cols: usize) -> Vec<f64> {
        if in_rows == self.out_rows && in_cols == self.out_cols {
            return data.to_vec();
        }

        let row_resampled = resample_rows(data, in_rows, in_cols, self.out_rows, self.order);
        resample_cols(&row_resampled, self.out_rows, in_cols, self.out_cols, self.order)
    }
}

fn resample_rows(data: &[f64], in_rows: usize, cols: usize, out_rows: usize, order: usize) -> Vec<f64> {
    let mut out = vec![0.0; out_rows * cols];
    let scale = in_rows as f64 / out_rows as f64;
    for r in 0..out_rows {
        let src = (r as f64 + 0.5) * scale - 0.5;
        for c in 0..cols {
            out[r * cols + c] = sample_axis(data, in_rows, cols, src, c, order, Axis::Row);
        }
    }
    out
}

fn resample_cols(data: &[f64], rows: usize, in_cols: usize, out_cols: usize, order: usize) -> Vec<f64> {
    let mut out = vec![0.0; rows * out_cols];
    let scale = in_cols as f64 / out_cols as f64;
    for c in 0..out_cols {
        let src = (c as f64 + 0.5) * scale - 0.5;
        for r in 0..rows {
            out[r * out_cols + c] = sample_axis(data, rows, in_cols, src, r, order, Axis::Col);
        }
    }
    out
}

enum Axis {
    Row,
    Col,
}

fn sample_axis(data: &[f64], rows: usize, cols: usize, src: f64, fixed: usize, order: usize, axis: Axis) -> f64 {
    let get = |idx: isize| -> f64 {
        let max = match axis {
            Axis::Row => rows as isize,
            Axis::Col => cols as isize,
        };
        let clamped = idx.clamp(0, max - 1) as usize;
        match axis {
            Axis::Row => data[clamped * cols + fixed],
            Axis::Col => data[fixed * cols + clamped],
        }
    };

    match order {
        0 => get(src.round() as isize),
        1 => {
            let i0 = src.floor();
            let frac = src - i0;
            let a = get(i0 as isize);
            let b = get(i0 as isize + 1);
            a * (1.0 - frac) + b * frac
        }
        _ => {
            let i1 = src.floor();
            let frac = src - i1;
            let i1 = i1 as isize;
            let p0 = get(i1 - 1);
            let p1 = get(i1);
            let p2 = get(i1 + 1);
            let p3 = get(i1 + 2);
            catmull_rom(p0, p1, p2, p3, frac)
        }
    }
}

fn catmull_rom(p0: f64, p1: f64, p2: f64, p3: f64, t: f64) -> f64 {
    let t2 = t * t;
    let t3 = t2 * t;
    0.5 * ((2.0 * p1)
        + (-p0 + p2) * t
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
        + (-p0 + 3.0 * p1 - 3.0 * p2 + p3) * t3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_shapes_are_a_passthrough() {
        let interp = Interpolator::new(2, 2, 3);
        let data = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(interp.interpolate(&data, 2, 2), data);
    }

    #[test]
    fn constant_input_resamples_to_the_same_constant() {
        let interp = Interpolator::new(8, 8, 3);
        let data = vec![5.0; 16];
        let out = interp.interpolate(&data, 4, 4);
        assert_eq!(out.len(), 64);
        for v in out {
            assert!((v - 5.0).abs() < 1e-9);
        }
    }

    #[test]
    fn nearest_neighbor_upsamples_without_blending() {
        let interp = Interpolator::new(4, 1, 0);
        let data = vec![1.0, 9.0];
        let out = interp.interpolate(&data, 2, 1);
        assert!(out.iter().all(|v| *v == 1.0 || *v == 9.0));
    }
}
