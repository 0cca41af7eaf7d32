//! UDP transport: the process's one protocol socket.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error};
use serde::{Deserialize, Serialize};

use crate::errors::Error;
use crate::events::{Event, EventBus};
use crate::frame::Frame;

type Result<T> = std::result::Result<T, Error>;

/// The port every device listens on.
pub const PORT: u16 = 56700;

/// Whether the last send reached the network.
///
/// This is the only error surface commands have: sends are
/// fire-and-forget, so a failing network flips the status to `Offline`
/// and the next successful send flips it back.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    Normal,
    Offline,
}

/// Anything that can put a frame on the network.
///
/// Devices, groups, and discovery hold the shared transport through this
/// seam; tests substitute a recorder.
pub(crate) trait FrameSink: Send + Sync {
    fn send_frame(&self, frame: &Frame);
}

/// Owner of the UDP socket.
///
/// Opened once at startup, closed once at shutdown. Requests broadcast
/// to the fixed port; replies arrive on a dedicated receive thread that
/// decodes each datagram and hands `(source ip, frame)` to the dispatch
/// channel. Send and receive are fully decoupled: nothing here ever
/// waits for a reply.
pub struct Transport {
    socket: Arc<UdpSocket>,
    status: Mutex<NetworkStatus>,
    events: EventBus,
    running: Arc<AtomicBool>,
    receiver_thread: Mutex<Option<JoinHandle<()>>>,
}

impl Transport {
    const READ_TIMEOUT: Duration = Duration::from_millis(500);
    const RECV_BUFFER_LEN: usize = 128;

    /// Bind the protocol socket with broadcast enabled.
    ///
    /// A bind failure (port already in use) is fatal: without the socket
    /// nothing else can run, so callers propagate the error instead of
    /// retrying.
    pub(crate) fn open(events: EventBus) -> Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, PORT))
            .map_err(|e| Error::socket("bind", e))?;
        socket
            .set_broadcast(true)
            .map_err(|e| Error::socket("set_broadcast", e))?;
        socket
            .set_read_timeout(Some(Self::READ_TIMEOUT))
            .map_err(|e| Error::socket("set_read_timeout", e))?;

        Ok(Transport {
            socket: Arc::new(socket),
            status: Mutex::new(NetworkStatus::Normal),
            events,
            running: Arc::new(AtomicBool::new(false)),
            receiver_thread: Mutex::new(None),
        })
    }

    pub fn status(&self) -> NetworkStatus {
        *self.status.lock().unwrap()
    }

    fn set_status(&self, status: NetworkStatus) {
        let mut current = self.status.lock().unwrap();
        if *current != status {
            *current = status;
            drop(current);
            self.events.publish(Event::NetworkStatusChanged { status });
        }
    }

    /// Spawn the receive loop, forwarding every decoded frame to
    /// `frames`.
    ///
    /// Malformed datagrams are logged and dropped; the loop only stops
    /// when [`Transport::stop`] clears the running flag or the dispatch
    /// side hangs up.
    pub(crate) fn start(&self, frames: Sender<(Ipv4Addr, Frame)>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let socket = Arc::clone(&self.socket);
        let running = Arc::clone(&self.running);

        let handle = thread::spawn(move || {
            let mut buffer = [0u8; Transport::RECV_BUFFER_LEN];

            while running.load(Ordering::SeqCst) {
                match socket.recv_from(&mut buffer) {
                    Ok((size, addr)) => {
                        let SocketAddr::V4(v4) = addr else { continue };
                        match Frame::decode(&buffer[..size]) {
                            Ok(frame) => {
                                debug!("received {:?} from {}", frame.kind, v4.ip());
                                if frames.send((*v4.ip(), frame)).is_err() {
                                    break;
                                }
                            }
                            // One bad datagram never stops the loop.
                            Err(e) => debug!("dropped datagram from {}: {}", v4.ip(), e),
                        }
                    }
                    Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {}
                    Err(ref e) if e.kind() == io::ErrorKind::TimedOut => {}
                    Err(e) => error!("receive socket error: {}", e),
                }
            }
        });

        *self.receiver_thread.lock().unwrap() = Some(handle);
    }

    /// Stop the receive loop and join its thread.
    pub(crate) fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.receiver_thread.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

impl FrameSink for Transport {
    /// Broadcast a frame, fire-and-forget.
    ///
    /// Failures never reach the caller; they only flip the shared
    /// network status.
    fn send_frame(&self, frame: &Frame) {
        let bytes = match frame.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("refusing to send {:?} frame: {}", frame.kind, e);
                return;
            }
        };

        debug!("sending {:?} to {}", frame.kind, frame.target);
        match self.socket.send_to(&bytes, (Ipv4Addr::BROADCAST, PORT)) {
            Ok(_) => self.set_status(NetworkStatus::Normal),
            Err(e) => {
                error!("send error: {}", e);
                self.set_status(NetworkStatus::Offline);
            }
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::address::DeviceAddress;
    use crate::message::MessageKind;

    /// Records frames instead of touching the network.
    #[derive(Default)]
    pub struct RecordingSink {
        pub sent: Mutex<Vec<Frame>>,
    }

    impl RecordingSink {
        pub fn kinds(&self) -> Vec<MessageKind> {
            self.sent.lock().unwrap().iter().map(|f| f.kind).collect()
        }

        pub fn kinds_for(&self, address: DeviceAddress) -> Vec<MessageKind> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|f| f.target == address)
                .map(|f| f.kind)
                .collect()
        }

        pub fn last(&self) -> Option<Frame> {
            self.sent.lock().unwrap().last().cloned()
        }
    }

    impl FrameSink for RecordingSink {
        fn send_frame(&self, frame: &Frame) {
            self.sent.lock().unwrap().push(frame.clone());
        }
    }
}
