//! Replays previously recorded CSV frames as a frame source, for offline
//! testing and demoing without hardware attached.

use std::fs::File;
use std::io::{BufRead, BufReader};

use crate::error::{PressmatError, Result};

use super::{FrameSource, Tags};

pub struct FileSource {
    total: usize,
    filenames: Vec<String>,
    file_idx: usize,
    reader: Option<BufReader<File>>,
}

impl FileSource {
    pub fn new(total: usize, filenames: Vec<String>) -> Self {
        FileSource { total, filenames, file_idx: 0, reader: None }
    }

    fn open_next_file(&mut self) -> Result<()> {
        let name = &self.filenames[self.file_idx];
        let file = File::open(name)?;
        self.reader = Some(BufReader::new(file));
        self.file_idx += 1;
        Ok(())
    }
}

impl FrameSource for FileSource {
    fn fetch(&mut self, raw_out: &mut [f64]) -> Result<Tags> {
        if self.reader.is_none() {
            if self.file_idx < self.filenames.len() {
                self.open_next_file()?;
            } else {
                return Err(PressmatError::ConfigError("no file provided".into()));
            }
        }

        let line = loop {
            let mut line = String::new();
            let read = self.reader.as_mut().unwrap().read_line(&mut line)?;
            if read > 0 {
                break line;
            }
            self.reader = None;
            if self.file_idx == self.filenames.len() {
                return Err(PressmatError::FileEnd);
            }
            self.open_next_file()?;
        };

        parse_line(&line, self.total, raw_out)
    }
}

/// Parses one CSV line into `data_out[..points]`, then a frame index and an
/// optional microsecond timestamp, matching the recorded file format the
/// recorder writes.
fn parse_line(line: &str, points: usize, data_out: &mut [f64]) -> Result<Tags> {
    let fields: Vec<&str> = line.trim().split(',').collect();

    for i in 0..points {
        if let Some(raw) = fields.get(i) {
            if let Ok(v) = raw.parse::<f64>() {
                data_out[i] = v;
            }
        }
    }

    let frame_idx = fields.get(points).and_then(|s| s.parse::<i64>().ok()).unwrap_or(-1);
    let timestamp_us = fields.get(points + 1).and_then(|s| s.parse::<i64>().ok());

    Ok(Tags { frame_idx, timestamp_us })
}
