//! Service Worker (C7): a blocking datagram loop that answers client RPCs
//! against the Shared Frame Bus, and forwards recording/restart/shutdown
//! commands to the Processing Worker over the Control Channel.

use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::time::Duration;

use socket2::{Domain, Protocol as SockProtocol, Socket, Type};

#[cfg(unix)]
use std::os::unix::net::{SocketAddr as UnixSocketAddr, UnixDatagram};

use crate::bus::SharedFrameBus;
use crate::config::Config;
use crate::control::{ServiceEndpoint, ToProcessing, ToService};
use crate::error::{PressmatError, Result};
use crate::wire::{self, Cmd};

const RECV_TIMEOUT: Duration = Duration::from_millis(100);
const DEFAULT_UDP_PORT: u16 = 25530;
const DEFAULT_UNIX_PATH: &str = "/var/tmp/unix.socket.server";

/// Either flavor of datagram socket the service can be bound to. UNIX
/// falls back to UDP automatically on non-unix targets at compile time.
enum ServerSocket {
    Udp(UdpSocket),
    #[cfg(unix)]
    Unix(UnixDatagram, Option<String>),
}

/// A client's return address, carried alongside each received datagram so
/// the reply goes back to whoever sent the request.
enum ClientAddr {
    Net(SocketAddr),
    #[cfg(unix)]
    Unix(UnixSocketAddr),
}

impl ServerSocket {
    fn bind(resolved: &crate::config::ResolvedConfig) -> Result<ServerSocket> {
        #[cfg(unix)]
        {
            if !resolved.udp {
                let path = unix_path(resolved);
                let _ = std::fs::remove_file(&path);
                let socket = UnixDatagram::bind(&path)?;
                socket.set_read_timeout(Some(RECV_TIMEOUT))?;
                return Ok(ServerSocket::Unix(socket, Some(path)));
            }
        }

        let (host, port) = udp_addr(resolved);
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .map_err(|_| PressmatError::ConfigError(format!("bad server address '{}:{}'", host, port)))?;
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(SockProtocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;
        socket.set_read_timeout(Some(RECV_TIMEOUT))?;
        let socket: UdpSocket = socket.into();
        Ok(ServerSocket::Udp(socket))
    }

    fn recv_from(&self, buf: &mut [u8]) -> std::io::Result<(usize, ClientAddr)> {
        match self {
            ServerSocket::Udp(sock) => sock.recv_from(buf).map(|(n, a)| (n, ClientAddr::Net(a))),
            #[cfg(unix)]
            ServerSocket::Unix(sock, _) => sock.recv_from(buf).map(|(n, a)| (n, ClientAddr::Unix(a))),
        }
    }

    fn send_to(&self, buf: &[u8], addr: &ClientAddr) -> std::io::Result<usize> {
        match (self, addr) {
            (ServerSocket::Udp(sock), ClientAddr::Net(a)) => sock.send_to(buf, a),
            #[cfg(unix)]
            (ServerSocket::Unix(sock, _), ClientAddr::Unix(a)) => match a.as_pathname() {
                Some(path) => sock.send_to(buf, path),
                None => Err(std::io::Error::new(std::io::ErrorKind::NotFound, "client has no bound path")),
            },
            #[allow(unreachable_patterns)]
            _ => Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, "address/socket kind mismatch")),
        }
    }

    fn describe(&self) -> String {
        match self {
            ServerSocket::Udp(sock) => format!("UDP {:?}", sock.local_addr()),
            #[cfg(unix)]
            ServerSocket::Unix(_, path) => format!("UNIX domain datagram {:?}", path),
        }
    }
}

impl Drop for ServerSocket {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let ServerSocket::Unix(_, Some(path)) = self {
            let _ = std::fs::remove_file(path);
        }
    }
}

fn udp_addr(resolved: &crate::config::ResolvedConfig) -> (String, u16) {
    match &resolved.server_address {
        Some((host, port)) => {
            let host = if host.is_empty() { "0.0.0.0".to_string() } else { host.clone() };
            (host, port.unwrap_or(DEFAULT_UDP_PORT))
        }
        None => ("0.0.0.0".to_string(), DEFAULT_UDP_PORT),
    }
}

#[cfg(unix)]
fn unix_path(resolved: &crate::config::ResolvedConfig) -> String {
    match &resolved.server_address {
        Some(addr) => crate::config::dump_ip_port(addr),
        None => DEFAULT_UNIX_PATH.to_string(),
    }
}

/// Runs the Service Worker to completion. `config` is this generation's
/// effective configuration, returned verbatim on `CONFIG` and used as the
/// base for `RESTART`/`RESTART_FILE` patches.
pub fn run_service(
    resolved: &crate::config::ResolvedConfig,
    config: Config,
    bus: Arc<SharedFrameBus>,
    endpoint: ServiceEndpoint,
) -> Result<()> {
    let socket = ServerSocket::bind(resolved)?;
    println!("Service protocol: {}", socket.describe());
    println!("Running service...");

    let buf_size = (resolved.total * 8 + 64).max(8192);
    let mut buf = vec![0u8; buf_size];

    loop {
        if let Some(ToService::Stop) = endpoint.poll() {
            break;
        }

        let (len, client_addr) = match socket.recv_from(&mut buf) {
            Ok(pair) => pair,
            Err(e) if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) => continue,
            Err(e)
                if matches!(e.kind(), std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::NotFound) =>
            {
                println!("{}", PressmatError::ClientOffline);
                continue;
            }
            Err(e) => return Err(PressmatError::from(e)),
        };
        if len == 0 {
            continue;
        }

        let datagram = &buf[..len];
        let Some(cmd) = Cmd::from_byte(datagram[0]) else { continue };

        match cmd {
            Cmd::Close => {
                let _ = socket.send_to(&wire::pack_status(0), &client_addr);
                endpoint.send(ToProcessing::RecStop);
                endpoint.send(ToProcessing::Stop);
                break;
            }
            Cmd::Data => {
                let frame = bus.out.snapshot();
                let reply = wire::pack_frame_reply(&frame, bus.frame_idx() as i32);
                let _ = socket.send_to(&reply, &client_addr);
            }
            Cmd::Raw => {
                let frame = bus.raw.snapshot();
                let reply = wire::pack_frame_reply(&frame, bus.frame_idx() as i32);
                let _ = socket.send_to(&reply, &client_addr);
            }
            Cmd::DataImu => {
                let snapshot = bus.imu.snapshot();
                let mut imu = [0.0f64; 6];
                imu.copy_from_slice(&snapshot[..6]);
                let reply = wire::pack_imu_reply(&imu, bus.frame_idx() as i32);
                let _ = socket.send_to(&reply, &client_addr);
            }
            Cmd::RecData | Cmd::RecRaw => {
                let filename = wire::payload_str(datagram).unwrap_or("").to_string();
                let raw = cmd == Cmd::RecRaw;
                endpoint.send(ToProcessing::RecStart { raw, filename });
                let reply = match endpoint.recv() {
                    Some(ToService::RecAck { ok: true, filename: Some(name) }) => {
                        wire::pack_status_with_text(0, &name)
                    }
                    _ => wire::pack_status(255),
                };
                let _ = socket.send_to(&reply, &client_addr);
            }
            Cmd::RecStop => {
                endpoint.send(ToProcessing::RecStop);
                let _ = socket.send_to(&wire::pack_status(0), &client_addr);
            }
            Cmd::Restart => {
                let patch_text = wire::payload_str(datagram).unwrap_or("");
                let outcome = apply_restart(&config, patch_text.is_empty(), || Config::parse_patch(patch_text));
                if handle_restart_outcome(&socket, &client_addr, &config, &endpoint, outcome) {
                    break;
                }
            }
            Cmd::RestartFile => {
                let filename = wire::payload_str(datagram).unwrap_or("");
                let outcome = apply_restart_file(&config, filename);
                if handle_restart_outcome(&socket, &client_addr, &config, &endpoint, outcome) {
                    break;
                }
            }
            Cmd::Config => {
                let dumped = config.dump().unwrap_or_default();
                let _ = socket.send_to(&wire::pack_status_with_text(0, &dumped), &client_addr);
            }
        }
    }

    Ok(())
}

/// Resolves the patch (from whichever source `load_patch` reads it from)
/// against the currently-running config, unless the request's payload was
/// empty, in which case the current config is kept as-is.
fn apply_restart<F: FnOnce() -> Result<Config>>(current: &Config, empty: bool, load_patch: F) -> Result<Config> {
    if empty {
        return Ok(current.clone());
    }
    let patch = load_patch()?;
    Config::combine(current, &patch)
}

/// `RESTART_FILE`'s own empty-payload rule, deliberately different from
/// `RESTART`'s: an empty filename is a failure (the server has nothing to
/// load), not "keep the current config and report success". Mirrors
/// `userver.py`'s `RESTART_FILE` handler, which sets `success = False` and
/// replies with the unchanged config rather than restarting.
fn apply_restart_file(current: &Config, filename: &str) -> Result<Config> {
    if filename.is_empty() {
        return Err(PressmatError::ConfigError("RESTART_FILE requires a filename".into()));
    }
    apply_restart(current, false, || Config::load_patch(filename))
}

/// Sends the RESTART/RESTART_FILE reply and, on success, forwards the new
/// config to the Processing Worker and tells the caller to stop the
/// service loop (mirroring the original service's "restart tears down
/// both workers" behavior). Returns `true` if the loop should break.
fn handle_restart_outcome(
    socket: &ServerSocket,
    client_addr: &ClientAddr,
    current: &Config,
    endpoint: &ServiceEndpoint,
    outcome: Result<Config>,
) -> bool {
    match outcome {
        Ok(new_config) => {
            let dumped = new_config.dump().unwrap_or_default();
            let _ = socket.send_to(&wire::pack_status_with_text(0, &dumped), client_addr);
            endpoint.send(ToProcessing::RecStop);
            endpoint.send(ToProcessing::Restart(Box::new(new_config)));
            true
        }
        Err(_) => {
            let dumped = current.dump().unwrap_or_default();
            let _ = socket.send_to(&wire::pack_status_with_text(255, &dumped), client_addr);
            false
        }
    }
}
