//! Datagram wire protocol between clients and the Service Worker.
//!
//! Requests are a single leading command byte optionally followed by a
//! UTF-8 payload. Replies are packed little-endian per command. Codes
//! follow the newer dialect: 8 is intentionally unassigned.

/// Request command codes (first byte of a datagram).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmd {
    Close = 0,
    Data = 1,
    Raw = 2,
    RecData = 3,
    RecRaw = 4,
    RecStop = 5,
    Restart = 6,
    Config = 7,
    DataImu = 9,
    RestartFile = 10,
}

impl Cmd {
    pub fn from_byte(byte: u8) -> Option<Cmd> {
        match byte {
            0 => Some(Cmd::Close),
            1 => Some(Cmd::Data),
            2 => Some(Cmd::Raw),
            3 => Some(Cmd::RecData),
            4 => Some(Cmd::RecRaw),
            5 => Some(Cmd::RecStop),
            6 => Some(Cmd::Restart),
            7 => Some(Cmd::Config),
            9 => Some(Cmd::DataImu),
            10 => Some(Cmd::RestartFile),
            _ => None,
        }
    }
}

/// Packs a `total`-length f64 frame followed by the frame index, little-endian.
pub fn pack_frame_reply(frame: &[f64], frame_idx: i32) -> Vec<u8> {
    let mut out = Vec::with_capacity(frame.len() * 8 + 4);
    for v in frame {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out.extend_from_slice(&frame_idx.to_le_bytes());
    out
}

/// Packs the 6-element IMU vector followed by the frame index.
pub fn pack_imu_reply(imu: &[f64; 6], frame_idx: i32) -> Vec<u8> {
    let mut out = Vec::with_capacity(6 * 8 + 4);
    for v in imu {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out.extend_from_slice(&frame_idx.to_le_bytes());
    out
}

/// Packs a `u8` status byte, used for CLOSE/REC_STOP acks.
pub fn pack_status(ok: u8) -> Vec<u8> {
    vec![ok]
}

/// Packs a status byte followed by a UTF-8 string payload (filename/YAML).
pub fn pack_status_with_text(ok: u8, text: &str) -> Vec<u8> {
    let mut out = vec![ok];
    out.extend_from_slice(text.as_bytes());
    out
}

/// Extracts the UTF-8 payload following the command byte, if any.
pub fn payload_str(datagram: &[u8]) -> Result<&str, std::str::Utf8Error> {
    std::str::from_utf8(&datagram[1..])
}
