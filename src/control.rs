//! Control Channel (C5): a bidirectional, FIFO-per-direction typed message
//! queue between the Processing Worker and the Service Worker.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use crate::config::Config;

/// Messages sent from the Service Worker to the Processing Worker.
#[derive(Debug, Clone)]
pub enum ToProcessing {
    Stop,
    Restart(Box<Config>),
    RecStart { raw: bool, filename: String },
    RecStop,
    RecBreak,
}

/// Messages sent from the Processing Worker back to the Service Worker.
#[derive(Debug, Clone)]
pub enum ToService {
    Stop,
    RecAck { ok: bool, filename: Option<String> },
}

/// One endpoint of the bidirectional channel.
pub struct ProcessingEndpoint {
    rx: Receiver<ToProcessing>,
    tx: Sender<ToService>,
}

pub struct ServiceEndpoint {
    rx: Receiver<ToService>,
    tx: Sender<ToProcessing>,
}

/// Builds a connected pair of endpoints, one per worker.
pub fn control_channel() -> (ProcessingEndpoint, ServiceEndpoint) {
    let (tx_to_proc, rx_to_proc) = mpsc::channel();
    let (tx_to_srv, rx_to_srv) = mpsc::channel();
    (
        ProcessingEndpoint { rx: rx_to_proc, tx: tx_to_srv },
        ServiceEndpoint { rx: rx_to_srv, tx: tx_to_proc },
    )
}

impl ProcessingEndpoint {
    /// Non-blocking check for a pending command; drains at most one message.
    pub fn poll(&self) -> Option<ToProcessing> {
        match self.rx.try_recv() {
            Ok(msg) => Some(msg),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(ToProcessing::Stop),
        }
    }

    pub fn send(&self, msg: ToService) {
        let _ = self.tx.send(msg);
    }
}

impl ServiceEndpoint {
    pub fn poll(&self) -> Option<ToService> {
        match self.rx.try_recv() {
            Ok(msg) => Some(msg),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(ToService::Stop),
        }
    }

    /// Blocking receive, used by the service loop after it sends a command
    /// that expects an acknowledgement (e.g. `RecStart`).
    pub fn recv(&self) -> Option<ToService> {
        self.rx.recv().ok()
    }

    pub fn send(&self, msg: ToProcessing) {
        let _ = self.tx.send(msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_returns_none_when_empty() {
        let (proc_end, _srv_end) = control_channel();
        assert!(proc_end.poll().is_none());
    }

    #[test]
    fn messages_are_delivered_fifo_per_direction() {
        let (proc_end, srv_end) = control_channel();
        srv_end.send(ToProcessing::RecStop);
        srv_end.send(ToProcessing::Stop);
        assert!(matches!(proc_end.poll(), Some(ToProcessing::RecStop)));
        assert!(matches!(proc_end.poll(), Some(ToProcessing::Stop)));
        assert!(proc_end.poll().is_none());
    }

    #[test]
    fn processing_to_service_direction_is_independent() {
        let (proc_end, srv_end) = control_channel();
        proc_end.send(ToService::RecAck { ok: true, filename: Some("a.csv".into()) });
        match srv_end.recv() {
            Some(ToService::RecAck { ok, filename }) => {
                assert!(ok);
                assert_eq!(filename.as_deref(), Some("a.csv"));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
