//! Delta-R baseline estimation (`cal_start_R0`): skip one throwaway frame,
//! then average exactly 10 opposite-mode conversions to seed `R0_START`.

use super::convert;

const R0_AVE_TIMES: u32 = 10;

/// `next_frame` returns raw masked frames in voltage units; `v0`/`r0_reci`
/// match the resolved config. The first call is discarded.
pub fn estimate<F: FnMut() -> Vec<f64>>(total: usize, v0: f64, r0_reci: f64, mut next_frame: F) -> Vec<f64> {
    let _discarded = next_frame();

    let mut r0 = vec![0.0; total];
    for _ in 0..R0_AVE_TIMES {
        let mut frame = next_frame();
        convert::opposite(&mut frame, v0, r0_reci);
        for (acc, v) in r0.iter_mut().zip(frame.iter()) {
            *acc += -1.0 * v;
        }
    }
    for acc in r0.iter_mut() {
        *acc /= R0_AVE_TIMES as f64;
    }
    r0
}
