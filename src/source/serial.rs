//! Serial-port frame source: decodes either the simple (0xFF-delimited) or
//! secure (byte-stuffed) wire framing off a UART.

use std::io::Read;
use std::time::Duration;

use crate::config::DataProtocol;
use crate::error::{PressmatError, Result};

use super::{FrameSource, Tags};

const DELIM: u8 = 0xFF;
const HEAD: u8 = 0x5B;
const TAIL: u8 = 0x5D;
const ESCAPE: u8 = 0x5C;
const ESCAPE_ESCAPE: u8 = 0x00;
const ESCAPE_HEAD: u8 = 0x01;
const ESCAPE_TAIL: u8 = 0x02;

pub struct SerialSource {
    port: Box<dyn serialport::SerialPort>,
    total: usize,
    imu: bool,
    protocol: DataProtocol,
    frame_idx: i64,
}

impl SerialSource {
    pub fn open(port_name: &str, baudrate: u32, timeout: Duration, total: usize, imu: bool, protocol: DataProtocol) -> Result<Self> {
        let port = serialport::new(port_name, baudrate)
            .timeout(timeout)
            .open()
            .map_err(|e| PressmatError::ConfigError(format!("cannot open serial port '{}': {}", port_name, e)))?;
        Ok(SerialSource { port, total, imu, protocol, frame_idx: 0 })
    }

    fn read_byte(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        match self.port.read_exact(&mut buf) {
            Ok(()) => Ok(buf[0]),
            Err(_) => Err(PressmatError::SerialTimeout),
        }
    }

    fn frame_size(&self) -> usize {
        if self.imu {
            self.total + 12
        } else {
            self.total
        }
    }
}

impl FrameSource for SerialSource {
    fn fetch(&mut self, raw_out: &mut [f64]) -> Result<Tags> {
        let total = self.total;
        let imu = self.imu;
        let frame_size = self.frame_size();
        match self.protocol {
            DataProtocol::Simple => decode_simple_frame(total, || self.read_byte(), raw_out)?,
            DataProtocol::Secure => decode_secure_frame(total, imu, frame_size, || self.read_byte(), raw_out)?,
        }
        self.frame_idx += 1;
        Ok(Tags { frame_idx: self.frame_idx, timestamp_us: None })
    }
}

/// Reads bytes via `read_byte` until a `DELIM` terminator, re-syncing on any
/// frame whose length doesn't match `total`.
fn decode_simple_frame<F: FnMut() -> Result<u8>>(total: usize, mut read_byte: F, raw_out: &mut [f64]) -> Result<()> {
    loop {
        let mut frame = Vec::with_capacity(total);
        loop {
            let byte = read_byte()?;
            if byte == DELIM {
                break;
            }
            frame.push(byte);
        }
        if frame.len() != total {
            continue;
        }
        for (out, byte) in raw_out.iter_mut().zip(frame.iter()) {
            *out = *byte as f64;
        }
        return Ok(());
    }
}

/// Reads a `HEAD`-delimited, byte-stuffed frame, unescaping `ESCAPE`
/// sequences as it goes and re-syncing on a length mismatch at `TAIL`.
fn decode_secure_frame<F: FnMut() -> Result<u8>>(
    total: usize,
    imu: bool,
    frame_size: usize,
    mut read_byte: F,
    raw_out: &mut [f64],
) -> Result<()> {
    'frame: loop {
        let mut frame = Vec::with_capacity(frame_size);
        let mut begin = false;
        loop {
            let byte = read_byte()?;
            if begin {
                if byte == ESCAPE {
                    let escaped = read_byte()?;
                    let literal = match escaped {
                        ESCAPE_ESCAPE => ESCAPE,
                        ESCAPE_HEAD => HEAD,
                        ESCAPE_TAIL => TAIL,
                        _ => {
                            eprintln!("{}", PressmatError::InvalidFrame(format!("bad escape byte {}", escaped)));
                            continue 'frame;
                        }
                    };
                    frame.push(literal);
                } else if byte == TAIL {
                    break;
                } else {
                    frame.push(byte);
                }
            } else if byte == HEAD {
                begin = true;
            }
        }

        if frame.len() != frame_size {
            eprintln!(
                "{}",
                PressmatError::InvalidFrame(format!("expected {} bytes, got {}", frame_size, frame.len()))
            );
            continue;
        }
        for (out, byte) in raw_out.iter_mut().take(total).zip(frame.iter()) {
            *out = *byte as f64;
        }
        if imu {
            let mut pos = total;
            for i in 0..6 {
                let value = i16::from_le_bytes([frame[pos], frame[pos + 1]]);
                raw_out[total + i] = value as f64;
                pos += 2;
            }
        }
        return Ok(());
    }
}

/// Lists available serial ports by device name, for the config layer's
/// `server_mode.enumerate` diagnostic.
pub fn enumerate_ports() -> Result<Vec<String>> {
    let ports = serialport::available_ports()
        .map_err(|e| PressmatError::ConfigError(format!("cannot enumerate serial ports: {}", e)))?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn byte_feed(bytes: Vec<u8>) -> impl FnMut() -> Result<u8> {
        let mut iter = bytes.into_iter();
        move || iter.next().ok_or(PressmatError::SerialTimeout)
    }

    #[test]
    fn escape_codes_map_to_their_literal_bytes() {
        assert_eq!(ESCAPE_ESCAPE, 0x00);
        assert_eq!(ESCAPE_HEAD, 0x01);
        assert_eq!(ESCAPE_TAIL, 0x02);
    }

    #[test]
    fn simple_frame_decodes_bytes_up_to_the_delimiter() {
        let feed = byte_feed(vec![1, 2, 3, DELIM]);
        let mut out = vec![0.0; 3];
        decode_simple_frame(3, feed, &mut out).unwrap();
        assert_eq!(out, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn simple_frame_resyncs_after_a_short_frame() {
        // 1, 2 (too short, DELIM) then 4, 5, 6 (correct length, DELIM)
        let feed = byte_feed(vec![1, 2, DELIM, 4, 5, 6, DELIM]);
        let mut out = vec![0.0; 3];
        decode_simple_frame(3, feed, &mut out).unwrap();
        assert_eq!(out, vec![4.0, 5.0, 6.0]);
    }

    #[test]
    fn secure_frame_unescapes_stuffed_bytes() {
        // HEAD, ESCAPE ESCAPE_HEAD (-> literal HEAD byte), 9, TAIL
        let feed = byte_feed(vec![HEAD, ESCAPE, ESCAPE_HEAD, 9, TAIL]);
        let mut out = vec![0.0; 2];
        decode_secure_frame(2, false, 2, feed, &mut out).unwrap();
        assert_eq!(out, vec![HEAD as f64, 9.0]);
    }

    #[test]
    fn secure_frame_resyncs_after_a_bad_escape_byte() {
        // HEAD, ESCAPE 0x7F (unrecognized) discards this frame attempt and
        // resyncs on the next HEAD rather than failing the whole fetch.
        let feed = byte_feed(vec![HEAD, ESCAPE, 0x7F, 1, TAIL, HEAD, 9, TAIL]);
        let mut out = vec![0.0; 1];
        decode_secure_frame(1, false, 1, feed, &mut out).unwrap();
        assert_eq!(out, vec![9.0]);
    }

    #[test]
    fn secure_frame_resyncs_after_wrong_length() {
        let feed = byte_feed(vec![HEAD, 1, 2, TAIL, HEAD, 9, TAIL]);
        let mut out = vec![0.0; 1];
        decode_secure_frame(1, false, 1, feed, &mut out).unwrap();
        assert_eq!(out, vec![9.0]);
    }

    #[test]
    fn secure_frame_parses_trailing_imu_axes() {
        let mut bytes = vec![HEAD, 7];
        bytes.extend_from_slice(&100i16.to_le_bytes());
        for _ in 0..5 {
            bytes.extend_from_slice(&0i16.to_le_bytes());
        }
        bytes.push(TAIL);
        let feed = byte_feed(bytes);
        let mut out = vec![0.0; 1 + 6];
        decode_secure_frame(1, true, 13, feed, &mut out).unwrap();
        assert_eq!(out[0], 7.0);
        assert_eq!(out[1], 100.0);
    }

    #[test]
    fn frame_size_adds_twelve_bytes_for_imu() {
        let mut src = SerialSourceSizes { total: 16, imu: false };
        assert_eq!(src.frame_size(), 16);
        src.imu = true;
        assert_eq!(src.frame_size(), 28);
    }

    struct SerialSourceSizes {
        total: usize,
        imu: bool,
    }

    impl SerialSourceSizes {
        fn frame_size(&self) -> usize {
            if self.imu {
                self.total + 12
            } else {
                self.total
            }
        }
    }
}
