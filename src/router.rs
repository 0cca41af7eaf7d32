//! Reply routing.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use log::debug;

use crate::address::DeviceAddress;
use crate::frame::Frame;
use crate::message::MessageKind;

/// Handler invoked with the payload of a matching reply.
pub type ReplyHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Fallback handler invoked for discovery replies from addresses that
/// have no handlers registered at all.
pub type UnknownHandler = Arc<dyn Fn(MessageKind, DeviceAddress, &[u8], Ipv4Addr) + Send + Sync>;

/// Routes decoded frames to the handler registered for the frame's
/// `(address, kind)` pair.
///
/// The router is the sole owner of the handler table. At most one
/// handler exists per key; registering again for the same key replaces
/// the previous handler. A single fallback slot catches `StateService`
/// replies from addresses nothing has registered yet; that is how new
/// devices are found. Every other unmatched reply is dropped: it is a
/// reply nobody asked to observe, or a duplicate.
///
/// Cloning yields another handle to the same table.
#[derive(Clone, Default)]
pub struct Router {
    table: Arc<Mutex<HashMap<(DeviceAddress, MessageKind), ReplyHandler>>>,
    unknown: Arc<Mutex<Option<UnknownHandler>>>,
}

impl Router {
    pub fn new() -> Self {
        Router::default()
    }

    /// Insert or overwrite the handler for `(address, kind)`.
    pub fn register<F>(&self, address: DeviceAddress, kind: MessageKind, handler: F)
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        self.table
            .lock()
            .unwrap()
            .insert((address, kind), Arc::new(handler));
    }

    /// Set the fallback handler for replies from unknown addresses.
    pub fn register_unknown<F>(&self, handler: F)
    where
        F: Fn(MessageKind, DeviceAddress, &[u8], Ipv4Addr) + Send + Sync + 'static,
    {
        *self.unknown.lock().unwrap() = Some(Arc::new(handler));
    }

    /// Drop every handler registered for `address`.
    pub fn unregister(&self, address: DeviceAddress) {
        self.table
            .lock()
            .unwrap()
            .retain(|(registered, _), _| *registered != address);
        debug!("unregistered {address}");
    }

    fn handler_for(&self, address: DeviceAddress, kind: MessageKind) -> Option<ReplyHandler> {
        self.table.lock().unwrap().get(&(address, kind)).cloned()
    }

    fn has_address(&self, address: DeviceAddress) -> bool {
        self.table
            .lock()
            .unwrap()
            .keys()
            .any(|(registered, _)| *registered == address)
    }

    /// Route one decoded frame.
    ///
    /// Handlers run with no table lock held, so a handler is free to
    /// register new routes. The discovery fallback does exactly that.
    pub fn dispatch(&self, source_ip: Ipv4Addr, frame: &Frame) {
        if let Some(handler) = self.handler_for(frame.target, frame.kind) {
            handler(&frame.payload);
        } else if frame.kind == MessageKind::StateService && !self.has_address(frame.target) {
            let unknown = self.unknown.lock().unwrap().clone();
            match unknown {
                Some(handler) => handler(frame.kind, frame.target, &frame.payload, source_ip),
                None => debug!("no fallback handler for {} from {source_ip}", frame.target),
            }
        } else {
            // A reply nobody registered interest in; not an error.
            debug!(
                "dropped {:?} from {} ({source_ip})",
                frame.kind, frame.target
            );
        }
    }

    /// Consume decoded frames on a dedicated thread until the channel
    /// closes.
    ///
    /// Every handler invocation is serialized here, in the order frames
    /// came off the wire; the receive loop never runs handlers itself.
    pub(crate) fn start(&self, frames: Receiver<(Ipv4Addr, Frame)>) -> JoinHandle<()> {
        let router = self.clone();
        thread::spawn(move || {
            while let Ok((source_ip, frame)) = frames.recv() {
                router.dispatch(source_ip, &frame);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn state_label_frame(address: DeviceAddress, label: &str) -> Frame {
        Frame::request(
            MessageKind::StateLabel,
            address,
            crate::payload::label_bytes(label),
        )
    }

    fn localhost() -> Ipv4Addr {
        Ipv4Addr::LOCALHOST
    }

    #[test]
    fn test_dispatch_invokes_exact_handler() {
        let router = Router::new();
        let address = DeviceAddress::new(7);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        router.register(address, MessageKind::StateLabel, move |payload| {
            sink.lock().unwrap().push(payload.to_vec());
        });

        router.dispatch(localhost(), &state_label_frame(address, "Desk"));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(&seen[0][..4], b"Desk");
    }

    #[test]
    fn test_unmatched_kind_for_known_address_is_dropped() {
        let router = Router::new();
        let address = DeviceAddress::new(7);
        let calls = Arc::new(AtomicUsize::new(0));

        let count = Arc::clone(&calls);
        router.register(address, MessageKind::StateLabel, move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        });
        let unknown_calls = Arc::new(AtomicUsize::new(0));
        let count = Arc::clone(&unknown_calls);
        router.register_unknown(move |_, _, _, _| {
            count.fetch_add(1, Ordering::SeqCst);
        });

        let frame = Frame::request(MessageKind::StatePower, address, vec![0xFF, 0xFF]);
        router.dispatch(localhost(), &frame);

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(unknown_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_state_service_from_unseen_address_hits_fallback() {
        let router = Router::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        router.register_unknown(move |kind, address, _, ip| {
            sink.lock().unwrap().push((kind, address, ip));
        });

        let address = DeviceAddress::new(42);
        let frame = Frame::request(
            MessageKind::StateService,
            address,
            vec![1, 0x74, 0xDD, 0, 0],
        );
        router.dispatch(localhost(), &frame);

        assert_eq!(
            seen.lock().unwrap().as_slice(),
            &[(MessageKind::StateService, address, localhost())]
        );
    }

    #[test]
    fn test_state_service_from_known_address_skips_fallback() {
        let router = Router::new();
        let address = DeviceAddress::new(42);
        router.register(address, MessageKind::StateLabel, |_| {});

        let unknown_calls = Arc::new(AtomicUsize::new(0));
        let count = Arc::clone(&unknown_calls);
        router.register_unknown(move |_, _, _, _| {
            count.fetch_add(1, Ordering::SeqCst);
        });

        let frame = Frame::request(
            MessageKind::StateService,
            address,
            vec![1, 0x74, 0xDD, 0, 0],
        );
        router.dispatch(localhost(), &frame);
        assert_eq!(unknown_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_last_registration_wins() {
        let router = Router::new();
        let address = DeviceAddress::new(7);
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let count = Arc::clone(&first);
        router.register(address, MessageKind::StateLabel, move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        });
        let count = Arc::clone(&second);
        router.register(address, MessageKind::StateLabel, move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        });

        router.dispatch(localhost(), &state_label_frame(address, "x"));

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unregister_drops_all_kinds_for_address() {
        let router = Router::new();
        let address = DeviceAddress::new(7);
        let other = DeviceAddress::new(8);
        let calls = Arc::new(AtomicUsize::new(0));

        for registered in [address, other] {
            let count = Arc::clone(&calls);
            router.register(registered, MessageKind::StateLabel, move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }
        router.unregister(address);

        router.dispatch(localhost(), &state_label_frame(address, "x"));
        router.dispatch(localhost(), &state_label_frame(other, "x"));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!router.has_address(address));
        assert!(router.has_address(other));
    }

    #[test]
    fn test_handler_may_register_during_dispatch() {
        let router = Router::new();
        let address = DeviceAddress::new(42);

        let inner = router.clone();
        router.register_unknown(move |_, from, _, _| {
            inner.register(from, MessageKind::StateLabel, |_| {});
        });

        let frame = Frame::request(
            MessageKind::StateService,
            address,
            vec![1, 0x74, 0xDD, 0, 0],
        );
        router.dispatch(localhost(), &frame);
        assert!(router.has_address(address));
    }
}
