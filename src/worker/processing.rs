//! Processing Worker (C6): warm-up, the pipeline driver loop, the
//! recording sink, and control-message handling.
//!
//! Runs single-threaded and cooperatively: the hot path is a tight loop
//! around the frame source with a non-blocking check on the control
//! channel each iteration, matching the original `Proc.run` driver.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::blob::BlobTracker;
use crate::bus::SharedFrameBus;
use crate::config::{Config, ResolvedConfig};
use crate::control::{ProcessingEndpoint, ToProcessing, ToService};
use crate::error::{PressmatError, Result};
use crate::pipeline::Pipeline;
use crate::recording::{default_filename, RecordTags, Recording};
use crate::source::{AnySource, FrameSource};

const FPS_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// What the outer driver should do once the loop returns.
pub enum ProcessingOutcome {
    Stopped,
    Restart(Box<Config>),
}

fn timestamp_us_now() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_micros() as i64).unwrap_or(0)
}

/// Pulls one pressure frame through the source, retrying past transient
/// serial timeouts. Used only while priming the pipeline's stateful
/// stages, where the original driver's generator has no escape hatch for
/// a timeout either.
fn prime_frame(source: &mut AnySource, raw_buf: &mut [f64], total: usize) -> Vec<f64> {
    loop {
        match source.fetch(raw_buf) {
            Ok(_) => return raw_buf[..total].to_vec(),
            Err(PressmatError::SerialTimeout) => continue,
            Err(_) => return raw_buf[..total].to_vec(),
        }
    }
}

/// Runs the Processing Worker to completion, returning why it stopped.
pub fn run_processing(
    resolved: &ResolvedConfig,
    mut source: AnySource,
    bus: Arc<SharedFrameBus>,
    endpoint: ProcessingEndpoint,
) -> Result<ProcessingOutcome> {
    let total = resolved.total;
    let raw_len = if resolved.imu { total + 6 } else { total };
    let mut raw_buf = vec![0.0; raw_len];

    if resolved.warm_up > 0.0 {
        println!("Warming up processing...");
        let begin = Instant::now();
        while begin.elapsed().as_secs_f64() < resolved.warm_up {
            let _ = source.fetch(&mut raw_buf);
        }
    }

    let start_time = Instant::now();
    bus.reset_frame_idx();
    let mut frame_idx: u32 = 0;

    let mut pipeline = Pipeline::new(resolved);
    pipeline.prepare(resolved, || prime_frame(&mut source, &mut raw_buf, total));

    let mut blob_tracker = if resolved.blob {
        Some(BlobTracker::new(
            resolved.shape,
            resolved.interp,
            resolved.interp_order,
            resolved.threshold,
            resolved.blob_num,
            resolved.special_check,
        ))
    } else {
        None
    };

    let copy_tags = matches!(source, AnySource::File(_));
    let mut recording: Option<Recording> = None;
    let mut last_fps_check = start_time;
    let mut last_frame_idx: u32 = 0;

    println!("Running processing...");
    loop {
        while let Some(msg) = endpoint.poll() {
            match msg {
                ToProcessing::Stop => return Ok(ProcessingOutcome::Stopped),
                ToProcessing::Restart(cfg) => return Ok(ProcessingOutcome::Restart(cfg)),
                ToProcessing::RecStart { raw, filename } => {
                    let path = if filename.is_empty() { default_filename(raw) } else { filename };
                    match Recording::open(path.clone(), raw) {
                        Ok(rec) => {
                            if let Some(prev) = &recording {
                                println!("stop recording:   {}", prev.path);
                            }
                            println!("recording to:     {}", path);
                            recording = Some(rec);
                            endpoint.send(ToService::RecAck { ok: true, filename: Some(path) });
                        }
                        Err(_) => {
                            println!("failed to record: {}", path);
                            endpoint.send(ToService::RecAck { ok: false, filename: None });
                        }
                    }
                }
                ToProcessing::RecStop => {
                    if let Some(prev) = &recording {
                        println!("stop recording:   {}", prev.path);
                    }
                    recording = None;
                }
                ToProcessing::RecBreak => {
                    // Reserved for rolling-file recording; no active session
                    // format rotates today, so there is nothing to do.
                }
            }
        }

        let tags = match source.fetch(&mut raw_buf) {
            Ok(tags) => tags,
            Err(PressmatError::SerialTimeout) => continue,
            Err(PressmatError::FileEnd) => {
                println!("Processing time: {:.3} s", start_time.elapsed().as_secs_f64());
                return Ok(ProcessingOutcome::Stopped);
            }
            Err(e) => return Err(e),
        };

        let cur_time = Instant::now();
        let mut frame: Vec<f64> = raw_buf[..total].to_vec();
        let intermediate = pipeline.handle(&mut frame);
        frame_idx += 1;

        bus.raw.store(intermediate.as_deref().unwrap_or(&raw_buf[..total]));
        bus.out.store(&frame);
        if resolved.imu {
            bus.imu.store(&raw_buf[total..total + 6]);
        }
        bus.publish_frame_idx(frame_idx);

        let blob_point = blob_tracker.as_mut().map(|tracker| tracker.track(&frame));

        if cur_time.duration_since(last_fps_check) >= FPS_CHECK_INTERVAL {
            let duration = cur_time.duration_since(last_fps_check).as_secs_f64();
            let run_duration = cur_time.duration_since(start_time).as_secs_f64();
            let frames = frame_idx.wrapping_sub(last_frame_idx);
            println!("  frame rate: {:.3} fps  running time: {:.3} s", frames as f64 / duration, run_duration);
            if resolved.imu {
                println!("  {:?}", &raw_buf[total..total + 6]);
            }
            if let Some((row, col, value)) = blob_point {
                println!("  blob: row={:.2} col={:.2} value={:.3}", row, col, value);
            }
            last_frame_idx = frame_idx;
            last_fps_check = cur_time;
        }

        if let Some(rec) = &mut recording {
            let data_ptr: &[f64] = if rec.raw { &raw_buf[..total] } else { &frame };
            let record_tags = if copy_tags {
                RecordTags { frame_idx: tags.frame_idx, timestamp_us: tags.timestamp_us.unwrap_or(0) }
            } else {
                RecordTags { frame_idx: frame_idx as i64, timestamp_us: timestamp_us_now() }
            };
            let _ = rec.write_line(data_ptr, record_tags);
        }
    }
}
