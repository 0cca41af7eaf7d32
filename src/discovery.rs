//! Device discovery via UDP broadcast.

use std::net::Ipv4Addr;
use std::sync::Arc;

use log::debug;

use crate::address::DeviceAddress;
use crate::device::{Device, DeviceRegistry};
use crate::events::{Event, EventBus};
use crate::frame::Frame;
use crate::message::MessageKind;
use crate::payload::ServiceReply;
use crate::router::Router;
use crate::transport::FrameSink;

/// Finds devices on the local network and brings them into the
/// registry.
///
/// Discovery owns the router's fallback slot: a `StateService` reply
/// from an address nothing has registered yet is a new device. The
/// fallback runs on the dispatch thread, so creation, registration, and
/// the duplicate check are naturally serialized: a device is created
/// at most once per address no matter how many broadcast replies race
/// in.
#[derive(Clone)]
pub(crate) struct Discovery {
    devices: DeviceRegistry,
    router: Router,
    sink: Arc<dyn FrameSink>,
    events: EventBus,
}

impl Discovery {
    pub fn new(
        devices: DeviceRegistry,
        router: Router,
        sink: Arc<dyn FrameSink>,
        events: EventBus,
    ) -> Self {
        Discovery {
            devices,
            router,
            sink,
            events,
        }
    }

    /// Install the fallback route for replies from unseen addresses.
    pub fn install(&self) {
        let discovery = self.clone();
        self.router.register_unknown(move |kind, address, payload, ip| {
            discovery.on_unknown_reply(kind, address, payload, ip);
        });
    }

    /// Start a discovery round.
    ///
    /// Every known device is unconfirmed until it answers the new
    /// broadcast; devices that stay silent simply remain unreachable.
    /// No timeout removes them.
    pub fn discover(&self) {
        self.devices.mark_all_unreachable();
        self.sink
            .send_frame(&Frame::get(MessageKind::GetService, DeviceAddress::ALL));
    }

    fn on_unknown_reply(
        &self,
        kind: MessageKind,
        address: DeviceAddress,
        payload: &[u8],
        ip: Ipv4Addr,
    ) {
        // Only discovery replies may create devices. The router already
        // guarantees this; anything else here is a routing bug.
        if kind != MessageKind::StateService {
            debug!("ignoring {kind:?} from unregistered {address}");
            return;
        }
        // Duplicate broadcast replies for an address already registered
        // are dropped, not an error.
        if self.devices.contains(address) {
            debug!("already registered: {address}");
            return;
        }
        let reply = match ServiceReply::parse(payload) {
            Ok(reply) => reply,
            Err(e) => {
                debug!("bad stateService payload from {ip}: {e}");
                return;
            }
        };

        let device = Device::new_light(address, Arc::clone(&self.sink), self.events.clone());
        device.confirm_service(reply.service, reply.port, ip);
        device.register_handlers(&self.router);
        self.devices.insert(device.clone());
        debug!("discovered {address} at {ip}");
        self.events.publish(Event::DeviceDiscovered { address });

        // Populate color, power, label, and hardware info right away.
        if let Some(light) = device.as_light() {
            light.get_state();
        }
        device.get_version();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::RecordingSink;

    fn state_service_frame(address: DeviceAddress) -> Frame {
        Frame::request(
            MessageKind::StateService,
            address,
            vec![1, 0x74, 0xDD, 0x00, 0x00],
        )
    }

    fn fixture() -> (Arc<RecordingSink>, Router, DeviceRegistry, EventBus) {
        let sink = Arc::new(RecordingSink::default());
        let router = Router::new();
        let devices = DeviceRegistry::new();
        let events = EventBus::new();
        let discovery = Discovery::new(
            devices.clone(),
            router.clone(),
            Arc::clone(&sink) as Arc<dyn FrameSink>,
            events.clone(),
        );
        discovery.install();
        (sink, router, devices, events)
    }

    #[test]
    fn test_discover_broadcasts_get_service() {
        let sink = Arc::new(RecordingSink::default());
        let discovery = Discovery::new(
            DeviceRegistry::new(),
            Router::new(),
            Arc::clone(&sink) as Arc<dyn FrameSink>,
            EventBus::new(),
        );
        discovery.discover();

        let frame = sink.last().unwrap();
        assert_eq!(frame.kind, MessageKind::GetService);
        assert_eq!(frame.target, DeviceAddress::ALL);
        assert!(frame.tagged);
        assert!(frame.res);
    }

    #[test]
    fn test_discover_marks_known_devices_unreachable() {
        let (sink, router, devices, _events) = fixture();
        let address = DeviceAddress::new(0xAA);
        router.dispatch(Ipv4Addr::new(10, 0, 0, 17), &state_service_frame(address));
        let device = devices.get(address).unwrap();
        assert!(device.is_reachable());

        let discovery = Discovery::new(
            devices,
            router,
            Arc::clone(&sink) as Arc<dyn FrameSink>,
            EventBus::new(),
        );
        discovery.discover();
        assert!(!device.is_reachable());
    }

    #[test]
    fn test_discovery_creates_device_at_most_once() {
        let (_sink, router, devices, events) = fixture();
        let observer = events.subscribe();
        let address = DeviceAddress::new(0xAA);

        router.dispatch(Ipv4Addr::new(10, 0, 0, 17), &state_service_frame(address));
        router.dispatch(Ipv4Addr::new(10, 0, 0, 17), &state_service_frame(address));

        assert_eq!(devices.len(), 1);
        assert_eq!(
            observer.try_recv().unwrap(),
            Event::DeviceDiscovered { address }
        );
        // Exactly one discovery event; the duplicate was dropped.
        assert!(observer.try_recv().is_err());

        let device = devices.get(address).unwrap();
        assert!(device.is_reachable());
        assert_eq!(device.ip_address(), Some(Ipv4Addr::new(10, 0, 0, 17)));
    }

    #[test]
    fn test_two_addresses_create_two_devices_with_follow_ups() {
        let (sink, router, devices, _events) = fixture();
        let first = DeviceAddress::new(0xAA);
        let second = DeviceAddress::new(0xBB);

        router.dispatch(Ipv4Addr::new(10, 0, 0, 17), &state_service_frame(first));
        router.dispatch(Ipv4Addr::new(10, 0, 0, 18), &state_service_frame(second));
        // A third reply from a known address changes nothing.
        router.dispatch(Ipv4Addr::new(10, 0, 0, 17), &state_service_frame(first));

        assert_eq!(devices.len(), 2);
        for address in [first, second] {
            assert_eq!(
                sink.kinds_for(address),
                vec![MessageKind::GetLightState, MessageKind::GetVersion]
            );
        }
    }

    #[test]
    fn test_second_state_service_routes_to_device_not_fallback() {
        let (_sink, router, devices, _events) = fixture();
        let address = DeviceAddress::new(0xAA);

        router.dispatch(Ipv4Addr::new(10, 0, 0, 17), &state_service_frame(address));
        let device = devices.get(address).unwrap();
        device.mark_unreachable();

        // The device's own standing handler answers now.
        router.dispatch(Ipv4Addr::new(10, 0, 0, 17), &state_service_frame(address));
        assert!(device.is_reachable());
        assert_eq!(devices.len(), 1);
    }

    #[test]
    fn test_malformed_service_payload_creates_nothing() {
        let (_sink, router, devices, _events) = fixture();
        let address = DeviceAddress::new(0xAA);

        // Hand a truncated payload straight to the fallback; decode
        // would normally reject it, the coordinator must too.
        let discovery = Discovery::new(
            devices.clone(),
            router.clone(),
            Arc::new(RecordingSink::default()) as Arc<dyn FrameSink>,
            EventBus::new(),
        );
        discovery.on_unknown_reply(
            MessageKind::StateService,
            address,
            &[1, 0x74],
            Ipv4Addr::LOCALHOST,
        );

        assert_eq!(devices.len(), 0);
    }

    #[test]
    fn test_non_service_kinds_are_ignored_defensively() {
        let (_sink, router, devices, _events) = fixture();
        let discovery = Discovery::new(
            devices.clone(),
            router,
            Arc::new(RecordingSink::default()) as Arc<dyn FrameSink>,
            EventBus::new(),
        );

        discovery.on_unknown_reply(
            MessageKind::StateLabel,
            DeviceAddress::new(0xAA),
            &[0; 32],
            Ipv4Addr::LOCALHOST,
        );

        assert_eq!(devices.len(), 0);
    }
}
