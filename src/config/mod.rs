//! Config Model (C8): a typed, hierarchical configuration with defaults,
//! validation, and YAML serialization.
//!
//! `Config` is the wire/file representation: every field is optional so a
//! partial YAML patch or a partial CLI override can be merged on top of
//! defaults. [`Config::resolve`] normalizes a fully-merged `Config` into a
//! [`ResolvedConfig`] with concrete types, used by the rest of the crate.

pub mod expr;

use serde::{Deserialize, Serialize};

use crate::error::{PressmatError, Result};

const BLANK_TEMPLATE: &str = include_str!("../../blank_template.yaml");

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ShapeSpec {
    Scalar(u32),
    Single((u32,)),
    Pair(u32, u32),
}

impl ShapeSpec {
    pub fn resolve(&self) -> (usize, usize) {
        match self {
            ShapeSpec::Scalar(n) => (*n as usize, *n as usize),
            ShapeSpec::Single((n,)) => (*n as usize, *n as usize),
            ShapeSpec::Pair(r, c) => (*r as usize, *c as usize),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaskSpec {
    Text(String),
    Grid(Vec<Vec<i32>>),
}

impl MaskSpec {
    pub fn resolve(&self) -> Result<Vec<Vec<i32>>> {
        match self {
            MaskSpec::Grid(g) => Ok(g.clone()),
            MaskSpec::Text(s) => parse_mask(s),
        }
    }
}

pub fn parse_mask(text: &str) -> Result<Vec<Vec<i32>>> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            line.split_whitespace()
                .map(|tok| {
                    tok.parse::<i32>()
                        .map_err(|_| PressmatError::ConfigError(format!("bad mask entry '{}'", tok)))
                })
                .collect::<Result<Vec<i32>>>()
        })
        .collect()
}

pub fn dump_mask(grid: &[Vec<i32>]) -> String {
    grid.iter()
        .map(|row| row.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parses `"host:port"` into `(host, Some(port))`, or `(host, None)` when
/// the port segment is absent.
pub fn parse_ip_port(content: &str) -> Result<(String, Option<u16>)> {
    let mut parts = content.splitn(2, ':');
    let host = parts
        .next()
        .ok_or_else(|| PressmatError::ConfigError("empty address".into()))?
        .to_string();
    let port = match parts.next() {
        Some(p) if !p.is_empty() => Some(
            p.parse::<u16>()
                .map_err(|_| PressmatError::ConfigError(format!("bad port '{}'", p)))?,
        ),
        _ => None,
    };
    Ok((host, port))
}

pub fn dump_ip_port(addr: &(String, Option<u16>)) -> String {
    match addr.1 {
        Some(port) => format!("{}:{}", addr.0, port),
        None => addr.0.clone(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum V0Spec {
    Num(f64),
    Expr(String),
}

impl V0Spec {
    pub fn resolve(&self) -> Result<f64> {
        match self {
            V0Spec::Num(n) => Ok(*n),
            V0Spec::Expr(s) => expr::eval(s).map_err(|e| PressmatError::ConfigError(e.to_string())),
        }
    }
}

macro_rules! merge_opt {
    ($base:expr, $over:expr) => {
        $over.clone().or_else(|| $base.clone())
    };
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorConfig {
    #[serde(default)]
    pub shape: Option<ShapeSpec>,
    #[serde(default)]
    pub mask: Option<MaskSpec>,
    #[serde(default)]
    pub total: Option<usize>,
}

impl SensorConfig {
    fn merged(&self, over: &SensorConfig) -> SensorConfig {
        SensorConfig {
            shape: merge_opt!(self.shape, over.shape),
            mask: merge_opt!(self.mask, over.mask),
            total: merge_opt!(self.total, over.total),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SerialConfig {
    #[serde(default)]
    pub port: Option<String>,
    #[serde(default)]
    pub baudrate: Option<u32>,
    #[serde(default)]
    pub timeout: Option<f64>,
    #[serde(default)]
    pub imu: Option<bool>,
    #[serde(default)]
    pub protocol: Option<String>,
}

impl SerialConfig {
    fn merged(&self, over: &SerialConfig) -> SerialConfig {
        SerialConfig {
            port: merge_opt!(self.port, over.port),
            baudrate: merge_opt!(self.baudrate, over.baudrate),
            timeout: merge_opt!(self.timeout, over.timeout),
            imu: merge_opt!(self.imu, over.imu),
            protocol: merge_opt!(self.protocol, over.protocol),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default)]
    pub server_address: Option<String>,
    #[serde(default)]
    pub client_address: Option<String>,
    #[serde(default)]
    pub udp: Option<bool>,
}

impl ConnectionConfig {
    fn merged(&self, over: &ConnectionConfig) -> ConnectionConfig {
        ConnectionConfig {
            server_address: merge_opt!(self.server_address, over.server_address),
            client_address: merge_opt!(self.client_address, over.client_address),
            udp: merge_opt!(self.udp, over.udp),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessConfig {
    #[serde(default)]
    pub convert: Option<bool>,
    #[serde(default)]
    pub resi_opposite: Option<bool>,
    #[serde(default)]
    pub resi_delta: Option<bool>,
    #[serde(default)]
    pub v0: Option<V0Spec>,
    #[serde(default)]
    pub r0_reci: Option<f64>,
    #[serde(default)]
    pub filter_spatial: Option<String>,
    #[serde(default)]
    pub filter_spatial_cutoff: Option<f64>,
    #[serde(default)]
    pub butterworth_order: Option<i32>,
    #[serde(default)]
    pub filter_temporal: Option<String>,
    #[serde(default)]
    pub filter_temporal_size: Option<usize>,
    #[serde(default)]
    pub rw_cutoff: Option<f64>,
    #[serde(default)]
    pub cali_frames: Option<i64>,
    #[serde(default)]
    pub cali_win_size: Option<usize>,
    #[serde(default)]
    pub cali_win_buffer_size: Option<usize>,
    #[serde(default)]
    pub cali_threshold: Option<f64>,
    #[serde(default)]
    pub warm_up: Option<f64>,
    #[serde(default)]
    pub interp: Option<ShapeSpec>,
    #[serde(default)]
    pub interp_order: Option<usize>,
    #[serde(default)]
    pub blob: Option<bool>,
    #[serde(default)]
    pub blob_num: Option<usize>,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub special_check: Option<bool>,
    #[serde(default)]
    pub intermediate: Option<u8>,
}

impl ProcessConfig {
    fn merged(&self, over: &ProcessConfig) -> ProcessConfig {
        ProcessConfig {
            convert: merge_opt!(self.convert, over.convert),
            resi_opposite: merge_opt!(self.resi_opposite, over.resi_opposite),
            resi_delta: merge_opt!(self.resi_delta, over.resi_delta),
            v0: merge_opt!(self.v0, over.v0),
            r0_reci: merge_opt!(self.r0_reci, over.r0_reci),
            filter_spatial: merge_opt!(self.filter_spatial, over.filter_spatial),
            filter_spatial_cutoff: merge_opt!(self.filter_spatial_cutoff, over.filter_spatial_cutoff),
            butterworth_order: merge_opt!(self.butterworth_order, over.butterworth_order),
            filter_temporal: merge_opt!(self.filter_temporal, over.filter_temporal),
            filter_temporal_size: merge_opt!(self.filter_temporal_size, over.filter_temporal_size),
            rw_cutoff: merge_opt!(self.rw_cutoff, over.rw_cutoff),
            cali_frames: merge_opt!(self.cali_frames, over.cali_frames),
            cali_win_size: merge_opt!(self.cali_win_size, over.cali_win_size),
            cali_win_buffer_size: merge_opt!(self.cali_win_buffer_size, over.cali_win_buffer_size),
            cali_threshold: merge_opt!(self.cali_threshold, over.cali_threshold),
            warm_up: merge_opt!(self.warm_up, over.warm_up),
            interp: merge_opt!(self.interp, over.interp),
            interp_order: merge_opt!(self.interp_order, over.interp_order),
            blob: merge_opt!(self.blob, over.blob),
            blob_num: merge_opt!(self.blob_num, over.blob_num),
            threshold: merge_opt!(self.threshold, over.threshold),
            special_check: merge_opt!(self.special_check, over.special_check),
            intermediate: merge_opt!(self.intermediate, over.intermediate),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisualConfig {
    #[serde(default)]
    pub zlim: Option<f64>,
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default)]
    pub scatter: Option<bool>,
    #[serde(default)]
    pub show_value: Option<bool>,
}

impl VisualConfig {
    fn merged(&self, over: &VisualConfig) -> VisualConfig {
        VisualConfig {
            zlim: merge_opt!(self.zlim, over.zlim),
            fps: merge_opt!(self.fps, over.fps),
            scatter: merge_opt!(self.scatter, over.scatter),
            show_value: merge_opt!(self.show_value, over.show_value),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sensor: SensorConfig,
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub process: ProcessConfig,
    #[serde(default)]
    pub visual: VisualConfig,
    #[serde(default)]
    pub server_mode: Option<bool>,
    #[serde(default)]
    pub client_mode: Option<bool>,
}

impl Config {
    /// The canonical defaults document, embedded from `blank_template.yaml`.
    pub fn blank() -> Config {
        serde_yaml::from_str(BLANK_TEMPLATE).expect("blank_template.yaml must parse")
    }

    /// Recursive merge: fields set in `self` take priority over `other`
    /// (`self` plays the role of the higher-priority layer, e.g. CLI over
    /// file, or file over defaults).
    pub fn merged_over(&self, other: &Config) -> Config {
        Config {
            sensor: other.sensor.merged(&self.sensor),
            serial: other.serial.merged(&self.serial),
            connection: other.connection.merged(&self.connection),
            process: other.process.merged(&self.process),
            visual: other.visual.merged(&self.visual),
            server_mode: merge_opt!(other.server_mode, self.server_mode),
            client_mode: merge_opt!(other.client_mode, self.client_mode),
        }
    }

    /// Parses a YAML document and fills missing fields from defaults.
    pub fn parse(content: &str) -> Result<Config> {
        let parsed: Config = serde_yaml::from_str(content)
            .map_err(|e| PressmatError::ConfigError(e.to_string()))?;
        Ok(parsed.merged_over(&Config::blank()))
    }

    /// Loads and parses a YAML file from disk.
    pub fn load(path: &str) -> Result<Config> {
        let content = std::fs::read_to_string(path)?;
        Config::parse(&content)
    }

    /// Parses a YAML *patch* without pre-filling absent fields from
    /// defaults, so [`Config::combine`] can tell "not mentioned in this
    /// patch" apart from "explicitly set". Used for `RESTART`/
    /// `RESTART_FILE`, where an empty or partial document must leave the
    /// currently-running config's other fields untouched rather than
    /// reverting them to blank defaults.
    pub fn parse_patch(content: &str) -> Result<Config> {
        serde_yaml::from_str(content).map_err(|e| PressmatError::ConfigError(e.to_string()))
    }

    /// Loads a YAML patch file from disk, same semantics as [`Config::parse_patch`].
    pub fn load_patch(path: &str) -> Result<Config> {
        let content = std::fs::read_to_string(path)?;
        Config::parse_patch(&content)
    }

    /// Serializes back to YAML for transmission on `CONFIG`/`RESTART`.
    pub fn dump(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| PressmatError::ConfigError(e.to_string()))
    }

    /// Combines a base config with a patch, re-validating the result
    /// (mirrors the service's `RESTART`/`RESTART_FILE` flow).
    pub fn combine(base: &Config, patch: &Config) -> Result<Config> {
        let combined = patch.merged_over(base);
        combined.resolve()?;
        Ok(combined)
    }

    /// Normalizes this (already-merged) config into concrete runtime values.
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        let shape = self
            .sensor
            .shape
            .as_ref()
            .map(ShapeSpec::resolve)
            .ok_or_else(|| PressmatError::ConfigError("sensor.shape is required".into()))?;
        let total = shape.0 * shape.1;

        let mask = match &self.sensor.mask {
            Some(spec) => Some(spec.resolve()?),
            None => None,
        };

        let protocol = match self.serial.protocol.as_deref() {
            Some("secure") => DataProtocol::Secure,
            _ => DataProtocol::Simple,
        };

        let server_address = match &self.connection.server_address {
            Some(s) => Some(parse_ip_port(s)?),
            None => None,
        };
        let client_address = match &self.connection.client_address {
            Some(s) => Some(parse_ip_port(s)?),
            None => None,
        };

        let v0 = match &self.process.v0 {
            Some(spec) => spec.resolve()?,
            None => 255.0,
        };

        let filter_spatial = match self.process.filter_spatial.as_deref() {
            Some("none") => SpatialFilterKind::None,
            Some("ideal") => SpatialFilterKind::Ideal,
            Some("butterworth") => SpatialFilterKind::Butterworth,
            _ => SpatialFilterKind::Gaussian,
        };

        let filter_temporal = match self.process.filter_temporal.as_deref() {
            Some("none") => TemporalFilterKind::None,
            Some("moving average") | Some("ma") => TemporalFilterKind::Ma,
            _ => TemporalFilterKind::Rw,
        };

        Ok(ResolvedConfig {
            shape,
            total,
            mask,
            serial_port: self.serial.port.clone(),
            baudrate: self.serial.baudrate.unwrap_or(500_000),
            serial_timeout: self.serial.timeout.unwrap_or(1.0),
            imu: self.serial.imu.unwrap_or(false),
            protocol,
            server_address,
            client_address,
            udp: self.connection.udp.unwrap_or(false),
            convert: self.process.convert.unwrap_or(true),
            resi_opposite: self.process.resi_opposite.unwrap_or(true),
            resi_delta: self.process.resi_delta.unwrap_or(false),
            v0,
            r0_reci: self.process.r0_reci.unwrap_or(1.0),
            filter_spatial,
            filter_spatial_cutoff: self.process.filter_spatial_cutoff.unwrap_or(3.5),
            butterworth_order: self.process.butterworth_order.unwrap_or(2),
            filter_temporal,
            filter_temporal_size: self.process.filter_temporal_size.unwrap_or(15),
            rw_cutoff: self.process.rw_cutoff.unwrap_or(0.04),
            cali_frames: self.process.cali_frames.unwrap_or(200),
            cali_win_size: self.process.cali_win_size.unwrap_or(0),
            cali_win_buffer_size: self.process.cali_win_buffer_size.unwrap_or(5),
            cali_threshold: self.process.cali_threshold.unwrap_or(3.0),
            warm_up: self.process.warm_up.unwrap_or(1.0),
            interp: self.process.interp.as_ref().map(ShapeSpec::resolve),
            interp_order: self.process.interp_order.unwrap_or(3),
            blob: self.process.blob.unwrap_or(false),
            blob_num: self.process.blob_num.unwrap_or(3),
            threshold: self.process.threshold.unwrap_or(0.1),
            special_check: self.process.special_check.unwrap_or(false),
            intermediate: self.process.intermediate.unwrap_or(0),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataProtocol {
    Simple,
    Secure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpatialFilterKind {
    None,
    Ideal,
    Butterworth,
    Gaussian,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalFilterKind {
    None,
    Ma,
    Rw,
}

/// A fully normalized, concretely-typed view of [`Config`] used by the
/// pipeline and workers.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub shape: (usize, usize),
    pub total: usize,
    pub mask: Option<Vec<Vec<i32>>>,
    pub serial_port: Option<String>,
    pub baudrate: u32,
    pub serial_timeout: f64,
    pub imu: bool,
    pub protocol: DataProtocol,
    pub server_address: Option<(String, Option<u16>)>,
    pub client_address: Option<(String, Option<u16>)>,
    pub udp: bool,
    pub convert: bool,
    pub resi_opposite: bool,
    pub resi_delta: bool,
    pub v0: f64,
    pub r0_reci: f64,
    pub filter_spatial: SpatialFilterKind,
    pub filter_spatial_cutoff: f64,
    pub butterworth_order: i32,
    pub filter_temporal: TemporalFilterKind,
    pub filter_temporal_size: usize,
    pub rw_cutoff: f64,
    pub cali_frames: i64,
    pub cali_win_size: usize,
    pub cali_win_buffer_size: usize,
    pub cali_threshold: f64,
    pub warm_up: f64,
    pub interp: Option<(usize, usize)>,
    pub interp_order: usize,
    pub blob: bool,
    pub blob_num: usize,
    pub threshold: f64,
    pub special_check: bool,
    pub intermediate: u8,
}

/// Prints a short human summary of the sensor shape/mask, mirroring the
/// diagnostic banner printed at start-up.
pub fn print_sensor(resolved: &ResolvedConfig) {
    println!("Sensor shape: {:?}", resolved.shape);
    println!("Sensor size:  {}", resolved.total);
    match &resolved.mask {
        Some(mask) => {
            println!("Sensor mask:");
            for row in mask {
                println!("{}", row.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(" "));
            }
        }
        None => println!("Sensor mask:  None"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_template_parses_and_resolves() {
        let cfg = Config::blank();
        let resolved = cfg.resolve().expect("blank template must resolve");
        assert_eq!(resolved.shape, (16, 16));
        assert_eq!(resolved.total, 256);
    }

    #[test]
    fn parse_then_dump_roundtrips_effective_config() {
        let cfg = Config::blank();
        let dumped = cfg.dump().unwrap();
        let reparsed = Config::parse(&dumped).unwrap();
        assert_eq!(reparsed.resolve().unwrap().total, cfg.resolve().unwrap().total);
    }

    #[test]
    fn patch_overrides_only_named_fields() {
        let base = Config::blank();
        let patch = Config::parse("process:\n  cali_frames: 0\n").unwrap();
        let combined = Config::combine(&base, &patch).unwrap();
        let resolved = combined.resolve().unwrap();
        assert_eq!(resolved.cali_frames, 0);
        // untouched fields still come from defaults
        assert_eq!(resolved.shape, base.resolve().unwrap().shape);
    }

    #[test]
    fn shape_scalar_and_pair_normalize() {
        assert_eq!(ShapeSpec::Scalar(16).resolve(), (16, 16));
        assert_eq!(ShapeSpec::Single((16,)).resolve(), (16, 16));
        assert_eq!(ShapeSpec::Pair(4, 8).resolve(), (4, 8));
    }

    #[test]
    fn shape_one_tuple_parses_from_yaml_sequence() {
        let spec: ShapeSpec = serde_yaml::from_str("[16]").unwrap();
        assert_eq!(spec.resolve(), (16, 16));
    }

    #[test]
    fn mask_text_parses_whitespace_grid() {
        let spec = MaskSpec::Text("1 1 0\n0 1 1".to_string());
        let grid = spec.resolve().unwrap();
        assert_eq!(grid, vec![vec![1, 1, 0], vec![0, 1, 1]]);
        assert_eq!(dump_mask(&grid), "1 1 0\n0 1 1");
    }

    #[test]
    fn ip_port_parses_with_and_without_port() {
        assert_eq!(parse_ip_port("192.168.1.1:255").unwrap(), ("192.168.1.1".to_string(), Some(255)));
        assert_eq!(parse_ip_port("192.168.1.1").unwrap(), ("192.168.1.1".to_string(), None));
        assert_eq!(dump_ip_port(&("a".to_string(), Some(1))), "a:1");
    }

    #[test]
    fn v0_accepts_numeric_expression() {
        let spec = V0Spec::Expr("255/3.6*3.3".to_string());
        let v = spec.resolve().unwrap();
        assert!((v - 255.0 / 3.6 * 3.3).abs() < 1e-9);
    }
}
