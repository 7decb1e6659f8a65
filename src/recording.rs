//! Recording sink owned exclusively by the Processing Worker: an optional
//! open append-mode file plus the raw-vs-processed mode flag and the
//! tag convention (pass through the source's tags, or synthesize
//! `(frame_idx, timestamp_us)` when the source doesn't provide any).

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};

use crate::error::Result;

/// A row's trailing two fields: either copied straight from the source, or
/// generated fresh from the current frame index and wall-clock time.
#[derive(Debug, Clone, Copy)]
pub struct RecordTags {
    pub frame_idx: i64,
    pub timestamp_us: i64,
}

pub struct Recording {
    file: BufWriter<File>,
    pub path: String,
    pub raw: bool,
}

impl Recording {
    /// Opens `path` for append, creating it if absent. Matches the
    /// original recorder's "touch then append" behavior: an existing file
    /// keeps its prior content.
    pub fn open(path: String, raw: bool) -> Result<Recording> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Recording { file: BufWriter::new(file), path, raw })
    }

    /// Writes one CSV row: `total` floats, then frame index, then timestamp.
    /// A mid-stream write failure is swallowed by the caller (the frame is
    /// dropped, recording continues) rather than tearing down the worker.
    pub fn write_line(&mut self, data: &[f64], tags: RecordTags) -> Result<()> {
        let mut line = String::with_capacity(data.len() * 8 + 24);
        for v in data {
            line.push_str(&v.to_string());
            line.push(',');
        }
        line.push_str(&tags.frame_idx.to_string());
        line.push(',');
        line.push_str(&tags.timestamp_us.to_string());
        line.push('\n');
        self.file.write_all(line.as_bytes())?;
        Ok(())
    }
}

/// Synthesizes a default recording filename when the client sends an empty
/// one, following the `record_%Y%m%d%H%M%S[_raw].csv` template.
pub fn default_filename(raw: bool) -> String {
    let stamp = chrono::Local::now().format("%Y%m%d%H%M%S");
    if raw {
        format!("record_{}_raw.csv", stamp)
    } else {
        format!("record_{}.csv", stamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufRead;

    #[test]
    fn default_filename_matches_template() {
        let name = default_filename(false);
        assert!(name.starts_with("record_") && name.ends_with(".csv") && !name.contains("_raw"));
        let raw_name = default_filename(true);
        assert!(raw_name.ends_with("_raw.csv"));
    }

    #[test]
    fn write_line_appends_data_then_tags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.csv");
        let path_str = path.to_str().unwrap().to_string();
        {
            let mut rec = Recording::open(path_str.clone(), false).unwrap();
            rec.write_line(&[1.0, 2.5], RecordTags { frame_idx: 3, timestamp_us: 42 }).unwrap();
        }
        let file = File::open(&path).unwrap();
        let line = std::io::BufReader::new(file).lines().next().unwrap().unwrap();
        assert_eq!(line, "1,2.5,3,42");
    }

    #[test]
    fn open_appends_to_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.csv");
        let path_str = path.to_str().unwrap().to_string();
        {
            let mut rec = Recording::open(path_str.clone(), false).unwrap();
            rec.write_line(&[1.0], RecordTags { frame_idx: 0, timestamp_us: 0 }).unwrap();
        }
        {
            let mut rec = Recording::open(path_str.clone(), false).unwrap();
            rec.write_line(&[2.0], RecordTags { frame_idx: 1, timestamp_us: 1 }).unwrap();
        }
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
