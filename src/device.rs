//! Device state and commands.
//!
//! Replies are correlated by `(address, kind)` alone, since the protocol
//! has no request ids, so every device installs standing handlers at
//! discovery time and a reply updates state whenever it happens to
//! arrive. Set commands write local state optimistically and broadcast
//! a fire-and-forget frame; the protocol never confirms them.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};

use log::debug;
use serde::Serialize;

use crate::address::DeviceAddress;
use crate::errors::Error;
use crate::events::{Event, EventBus};
use crate::frame::Frame;
use crate::message::MessageKind;
use crate::payload::{
    self, FirmwareReply, InfraredReply, LabelReply, LightStateReply, MembershipReply, PowerReply,
    RuntimeReply, ServiceReply, SignalReply, VersionReply,
};
use crate::products::Product;
use crate::router::Router;
use crate::transport::FrameSink;
use crate::types::{Color, Power};

type Result<T> = std::result::Result<T, Error>;

/// Transition time applied when a command does not specify one.
pub const DEFAULT_DURATION_MS: u32 = 1024;

const UNKNOWN_LABEL: &str = "Unknown";

/// Wifi or host subsystem signal strength, traffic counters, and
/// firmware details.
#[serde_with::skip_serializing_none]
#[derive(Debug, Serialize, Clone, Copy, Default)]
pub struct SignalInfo {
    pub signal: Option<f32>,
    pub tx: Option<u32>,
    pub rx: Option<u32>,
    pub build: Option<u64>,
    pub version: Option<u32>,
}

/// Hardware vendor, product, and version codes from the version reply.
#[serde_with::skip_serializing_none]
#[derive(Debug, Serialize, Clone, Copy, Default)]
pub struct ModelInfo {
    pub vendor: Option<u32>,
    pub product: Option<u32>,
    pub version: Option<u32>,
}

impl ModelInfo {
    /// Marketing name for the reported product, when the code is known.
    pub fn product_name(&self) -> Option<&'static str> {
        self.product
            .and_then(Product::create)
            .map(|product| product.name())
    }
}

/// Device clock and uptime counters, nanoseconds.
#[serde_with::skip_serializing_none]
#[derive(Debug, Serialize, Clone, Copy, Default)]
pub struct RuntimeInfo {
    pub time: Option<u64>,
    pub uptime: Option<u64>,
    pub downtime: Option<u64>,
}

/// Location or group membership as stored on the device itself.
#[serde_with::skip_serializing_none]
#[derive(Debug, Serialize, Clone, Default)]
pub struct MembershipInfo {
    pub id: Option<[u8; 16]>,
    pub label: Option<String>,
    pub updated_at: Option<u64>,
}

/// Color capability, present on devices that are lights.
#[serde_with::skip_serializing_none]
#[derive(Debug, Serialize, Clone, Copy, Default)]
pub struct LightState {
    pub color: Option<Color>,
    pub infrared: Option<u16>,
}

struct DeviceState {
    address: DeviceAddress,
    label: String,
    power: Option<Power>,
    service: u8,
    port: u32,
    ip_address: Option<Ipv4Addr>,
    is_reachable: bool,
    wifi: SignalInfo,
    host: SignalInfo,
    model: ModelInfo,
    runtime: RuntimeInfo,
    location: MembershipInfo,
    group: MembershipInfo,
    light: Option<LightState>,
}

impl DeviceState {
    fn new(address: DeviceAddress, light: Option<LightState>) -> Self {
        DeviceState {
            address,
            label: String::from(UNKNOWN_LABEL),
            power: None,
            service: 1,
            port: u32::from(crate::transport::PORT),
            ip_address: None,
            is_reachable: false,
            wifi: SignalInfo::default(),
            host: SignalInfo::default(),
            model: ModelInfo::default(),
            runtime: RuntimeInfo::default(),
            location: MembershipInfo::default(),
            group: MembershipInfo::default(),
            light,
        }
    }
}

/// Handle to one device on the network.
///
/// Cloning is cheap; clones share the same underlying state. A device
/// holds no network resources of its own, only a reference to the
/// shared transport it sends requests through.
///
/// `get_*` operations broadcast a request and return immediately: the
/// matching standing handler fills the field in whenever the reply
/// arrives. A lost reply is never detected; there is no timeout or
/// retry at this layer.
#[derive(Clone)]
pub struct Device {
    state: Arc<Mutex<DeviceState>>,
    sink: Arc<dyn FrameSink>,
    events: EventBus,
}

impl Device {
    /// A device with no color capability (rare accessories).
    pub(crate) fn new(address: DeviceAddress, sink: Arc<dyn FrameSink>, events: EventBus) -> Self {
        Device {
            state: Arc::new(Mutex::new(DeviceState::new(address, None))),
            sink,
            events,
        }
    }

    /// A light-capable device, as discovery creates them.
    pub(crate) fn new_light(
        address: DeviceAddress,
        sink: Arc<dyn FrameSink>,
        events: EventBus,
    ) -> Self {
        Device {
            state: Arc::new(Mutex::new(DeviceState::new(
                address,
                Some(LightState::default()),
            ))),
            sink,
            events,
        }
    }

    pub fn address(&self) -> DeviceAddress {
        self.state.lock().unwrap().address
    }

    pub fn label(&self) -> String {
        self.state.lock().unwrap().label.clone()
    }

    pub fn power(&self) -> Option<Power> {
        self.state.lock().unwrap().power
    }

    pub fn ip_address(&self) -> Option<Ipv4Addr> {
        self.state.lock().unwrap().ip_address
    }

    /// Whether the device answered the current discovery round.
    pub fn is_reachable(&self) -> bool {
        self.state.lock().unwrap().is_reachable
    }

    pub fn wifi(&self) -> SignalInfo {
        self.state.lock().unwrap().wifi
    }

    pub fn host(&self) -> SignalInfo {
        self.state.lock().unwrap().host
    }

    pub fn model(&self) -> ModelInfo {
        self.state.lock().unwrap().model
    }

    pub fn runtime(&self) -> RuntimeInfo {
        self.state.lock().unwrap().runtime
    }

    pub fn location(&self) -> MembershipInfo {
        self.state.lock().unwrap().location.clone()
    }

    pub fn device_group(&self) -> MembershipInfo {
        self.state.lock().unwrap().group.clone()
    }

    /// Color-capable view, when this device is a light.
    pub fn as_light(&self) -> Option<Light> {
        if self.state.lock().unwrap().light.is_some() {
            Some(Light {
                device: self.clone(),
            })
        } else {
            None
        }
    }

    /// Point-in-time copy of every observable field.
    pub fn snapshot(&self) -> DeviceSnapshot {
        let state = self.state.lock().unwrap();
        DeviceSnapshot {
            address: state.address,
            label: state.label.clone(),
            power: state.power,
            service: state.service,
            port: state.port,
            ip_address: state.ip_address,
            is_reachable: state.is_reachable,
            wifi: state.wifi,
            model: state.model,
            product_name: state.model.product_name(),
            runtime: state.runtime,
            color: state.light.and_then(|light| light.color),
            infrared: state.light.and_then(|light| light.infrared),
        }
    }

    /// Ask the device to answer discovery directly.
    pub fn get_service(&self) {
        self.send_get(MessageKind::GetService);
    }

    /// Request the current power level.
    pub fn get_power(&self) {
        if self.is_light() {
            self.send_get(MessageKind::GetLightPower);
        } else {
            self.send_get(MessageKind::GetPower);
        }
    }

    /// Set the power state.
    ///
    /// The local field updates immediately; the device receives a
    /// fire-and-forget frame and never confirms it.
    pub fn set_power(&self, power: Power, duration_ms: u32) {
        let address = {
            let mut state = self.state.lock().unwrap();
            state.power = Some(power);
            state.address
        };
        self.events.publish(Event::PowerChanged { address, power });
        let kind = if self.is_light() {
            MessageKind::SetLightPower
        } else {
            MessageKind::SetPower
        };
        self.sink.send_frame(&Frame::request(
            kind,
            address,
            payload::power_bytes(power.level(), duration_ms),
        ));
    }

    pub fn get_label(&self) {
        self.send_get(MessageKind::GetLabel);
    }

    /// Rename the device.
    ///
    /// The label is written locally right away and sent as the fixed
    /// 32-byte wire field, truncated on a character boundary.
    pub fn set_label(&self, label: &str) {
        let address = {
            let mut state = self.state.lock().unwrap();
            state.label = String::from(label);
            state.address
        };
        self.events.publish(Event::LabelChanged {
            address,
            label: String::from(label),
        });
        self.sink.send_frame(&Frame::request(
            MessageKind::SetLabel,
            address,
            payload::label_bytes(label),
        ));
    }

    /// Request host subsystem signal and traffic counters.
    pub fn get_host_info(&self) {
        self.send_get(MessageKind::GetHostInfo);
    }

    /// Request host subsystem firmware build and version.
    pub fn get_host_firmware(&self) {
        self.send_get(MessageKind::GetHostFirmware);
    }

    /// Request wifi subsystem signal and traffic counters.
    pub fn get_wifi_info(&self) {
        self.send_get(MessageKind::GetWifiInfo);
    }

    /// Request wifi subsystem firmware build and version.
    pub fn get_wifi_firmware(&self) {
        self.send_get(MessageKind::GetWifiFirmware);
    }

    /// Request hardware vendor, product, and version.
    pub fn get_version(&self) {
        self.send_get(MessageKind::GetVersion);
    }

    /// Request device time, uptime, and downtime.
    pub fn get_info(&self) {
        self.send_get(MessageKind::GetInfo);
    }

    /// Request the device's stored location membership.
    pub fn get_location(&self) {
        self.send_get(MessageKind::GetLocation);
    }

    /// Request the device's stored group membership.
    pub fn get_group(&self) {
        self.send_get(MessageKind::GetGroup);
    }

    /// Send an echo request; the reply is logged when it arrives.
    pub fn echo(&self, payload: &[u8]) {
        self.sink.send_frame(&Frame::request(
            MessageKind::EchoRequest,
            self.address(),
            payload::echo_bytes(payload),
        ));
    }

    fn is_light(&self) -> bool {
        self.state.lock().unwrap().light.is_some()
    }

    fn send_get(&self, kind: MessageKind) {
        self.sink.send_frame(&Frame::get(kind, self.address()));
    }

    /// Record the service details carried by the discovery reply that
    /// created this device.
    pub(crate) fn confirm_service(&self, service: u8, port: u32, ip: Ipv4Addr) {
        let mut state = self.state.lock().unwrap();
        state.service = service;
        state.port = port;
        state.ip_address = Some(ip);
        state.is_reachable = true;
    }

    pub(crate) fn mark_unreachable(&self) {
        self.state.lock().unwrap().is_reachable = false;
    }

    /// Install the standing reply handlers for every kind this device
    /// understands.
    ///
    /// Called once when discovery creates the device; calling again
    /// simply replaces the routes (the table is last-registration-wins).
    /// Each handler runs on the dispatch thread, locks the shared state
    /// briefly, and publishes the matching change event.
    pub(crate) fn register_handlers(&self, router: &Router) {
        self.on(router, MessageKind::StateService, Device::apply_service);
        self.on(router, MessageKind::StatePower, Device::apply_power);
        self.on(router, MessageKind::StateLabel, Device::apply_label);
        self.on(router, MessageKind::StateHostInfo, Device::apply_host_info);
        self.on(
            router,
            MessageKind::StateHostFirmware,
            Device::apply_host_firmware,
        );
        self.on(router, MessageKind::StateWifiInfo, Device::apply_wifi_info);
        self.on(
            router,
            MessageKind::StateWifiFirmware,
            Device::apply_wifi_firmware,
        );
        self.on(router, MessageKind::StateVersion, Device::apply_version);
        self.on(router, MessageKind::StateInfo, Device::apply_info);
        self.on(router, MessageKind::StateLocation, Device::apply_location);
        self.on(router, MessageKind::StateGroup, Device::apply_device_group);
        self.on(router, MessageKind::EchoResponse, Device::apply_echo);

        if self.is_light() {
            self.on(router, MessageKind::LightState, Device::apply_light_state);
            self.on(router, MessageKind::StateLightPower, Device::apply_power);
            self.on(router, MessageKind::StateInfrared, Device::apply_infrared);
        }
    }

    fn on(
        &self,
        router: &Router,
        kind: MessageKind,
        apply: fn(&Device, &[u8]) -> Result<()>,
    ) {
        let device = self.clone();
        router.register(self.address(), kind, move |reply| {
            if let Err(e) = apply(&device, reply) {
                debug!("bad {kind:?} payload for {}: {e}", device.address());
            }
        });
    }

    fn apply_service(&self, reply: &[u8]) -> Result<()> {
        let parsed = ServiceReply::parse(reply)?;
        let (address, newly_reachable) = {
            let mut state = self.state.lock().unwrap();
            state.service = parsed.service;
            state.port = parsed.port;
            let newly = !state.is_reachable;
            state.is_reachable = true;
            (state.address, newly)
        };
        if newly_reachable {
            self.events.publish(Event::ReachabilityChanged {
                address,
                is_reachable: true,
            });
        }
        Ok(())
    }

    fn apply_power(&self, reply: &[u8]) -> Result<()> {
        let parsed = PowerReply::parse(reply)?;
        let power = Power::from_level(parsed.level);
        let address = {
            let mut state = self.state.lock().unwrap();
            state.power = Some(power);
            state.address
        };
        self.events.publish(Event::PowerChanged { address, power });
        Ok(())
    }

    fn apply_label(&self, reply: &[u8]) -> Result<()> {
        let parsed = LabelReply::parse(reply)?;
        let address = {
            let mut state = self.state.lock().unwrap();
            state.label.clone_from(&parsed.label);
            state.address
        };
        self.events.publish(Event::LabelChanged {
            address,
            label: parsed.label,
        });
        Ok(())
    }

    fn apply_host_info(&self, reply: &[u8]) -> Result<()> {
        let parsed = SignalReply::parse(reply)?;
        let mut state = self.state.lock().unwrap();
        state.host.signal = Some(parsed.signal);
        state.host.tx = Some(parsed.tx);
        state.host.rx = Some(parsed.rx);
        Ok(())
    }

    fn apply_host_firmware(&self, reply: &[u8]) -> Result<()> {
        let parsed = FirmwareReply::parse(reply)?;
        let mut state = self.state.lock().unwrap();
        state.host.build = Some(parsed.build);
        state.host.version = Some(parsed.version);
        Ok(())
    }

    fn apply_wifi_info(&self, reply: &[u8]) -> Result<()> {
        let parsed = SignalReply::parse(reply)?;
        let address = {
            let mut state = self.state.lock().unwrap();
            state.wifi.signal = Some(parsed.signal);
            state.wifi.tx = Some(parsed.tx);
            state.wifi.rx = Some(parsed.rx);
            state.address
        };
        self.events.publish(Event::WifiChanged { address });
        Ok(())
    }

    fn apply_wifi_firmware(&self, reply: &[u8]) -> Result<()> {
        let parsed = FirmwareReply::parse(reply)?;
        let address = {
            let mut state = self.state.lock().unwrap();
            state.wifi.build = Some(parsed.build);
            state.wifi.version = Some(parsed.version);
            state.address
        };
        self.events.publish(Event::WifiChanged { address });
        Ok(())
    }

    fn apply_version(&self, reply: &[u8]) -> Result<()> {
        let parsed = VersionReply::parse(reply)?;
        let address = {
            let mut state = self.state.lock().unwrap();
            state.model.vendor = Some(parsed.vendor);
            state.model.product = Some(parsed.product);
            state.model.version = Some(parsed.version);
            state.address
        };
        self.events.publish(Event::ModelChanged { address });
        Ok(())
    }

    fn apply_info(&self, reply: &[u8]) -> Result<()> {
        let parsed = RuntimeReply::parse(reply)?;
        let mut state = self.state.lock().unwrap();
        state.runtime.time = Some(parsed.time);
        state.runtime.uptime = Some(parsed.uptime);
        state.runtime.downtime = Some(parsed.downtime);
        Ok(())
    }

    fn apply_location(&self, reply: &[u8]) -> Result<()> {
        let parsed = MembershipReply::parse(reply)?;
        let mut state = self.state.lock().unwrap();
        state.location.id = Some(parsed.id);
        state.location.label = Some(parsed.label);
        state.location.updated_at = Some(parsed.updated_at);
        Ok(())
    }

    fn apply_device_group(&self, reply: &[u8]) -> Result<()> {
        let parsed = MembershipReply::parse(reply)?;
        let mut state = self.state.lock().unwrap();
        state.group.id = Some(parsed.id);
        state.group.label = Some(parsed.label);
        state.group.updated_at = Some(parsed.updated_at);
        Ok(())
    }

    fn apply_light_state(&self, reply: &[u8]) -> Result<()> {
        let parsed = LightStateReply::parse(reply)?;
        let power = Power::from_level(parsed.level);
        let address = {
            let mut state = self.state.lock().unwrap();
            if let Some(light) = state.light.as_mut() {
                light.color = Some(parsed.color);
            }
            state.power = Some(power);
            state.label.clone_from(&parsed.label);
            state.address
        };
        self.events.publish(Event::ColorChanged {
            address,
            color: parsed.color,
        });
        self.events.publish(Event::PowerChanged { address, power });
        self.events.publish(Event::LabelChanged {
            address,
            label: parsed.label,
        });
        Ok(())
    }

    fn apply_infrared(&self, reply: &[u8]) -> Result<()> {
        let parsed = InfraredReply::parse(reply)?;
        let mut state = self.state.lock().unwrap();
        if let Some(light) = state.light.as_mut() {
            light.infrared = Some(parsed.level);
        }
        Ok(())
    }

    fn apply_echo(&self, reply: &[u8]) -> Result<()> {
        debug!("echo reply from {}: {reply:?}", self.address());
        Ok(())
    }
}

/// Color-capable view over a [`Device`].
///
/// Obtained from [`Device::as_light`]; exists only for devices carrying
/// the light capability.
#[derive(Clone)]
pub struct Light {
    device: Device,
}

impl Light {
    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn address(&self) -> DeviceAddress {
        self.device.address()
    }

    pub fn color(&self) -> Option<Color> {
        self.device
            .state
            .lock()
            .unwrap()
            .light
            .and_then(|light| light.color)
    }

    pub fn infrared(&self) -> Option<u16> {
        self.device
            .state
            .lock()
            .unwrap()
            .light
            .and_then(|light| light.infrared)
    }

    /// Request color, power, and label in one reply.
    pub fn get_state(&self) {
        self.device.send_get(MessageKind::GetLightState);
    }

    /// Set the color, transitioning over `duration_ms`.
    ///
    /// The local color updates immediately; the frame is
    /// fire-and-forget.
    pub fn set_color(&self, color: Color, duration_ms: u32) {
        let address = {
            let mut state = self.device.state.lock().unwrap();
            if let Some(light) = state.light.as_mut() {
                light.color = Some(color);
            }
            state.address
        };
        self.device
            .events
            .publish(Event::ColorChanged { address, color });
        self.device.sink.send_frame(&Frame::request(
            MessageKind::SetColor,
            address,
            payload::color_bytes(&color, duration_ms),
        ));
    }

    pub fn get_infrared(&self) {
        self.device.send_get(MessageKind::GetInfrared);
    }

    /// Set the infrared level.
    pub fn set_infrared(&self, level: u16) {
        let address = {
            let mut state = self.device.state.lock().unwrap();
            if let Some(light) = state.light.as_mut() {
                light.infrared = Some(level);
            }
            state.address
        };
        self.device.sink.send_frame(&Frame::request(
            MessageKind::SetInfrared,
            address,
            payload::infrared_bytes(level),
        ));
    }
}

/// Point-in-time copy of a device's observable fields.
#[serde_with::skip_serializing_none]
#[derive(Debug, Serialize, Clone)]
pub struct DeviceSnapshot {
    pub address: DeviceAddress,
    pub label: String,
    pub power: Option<Power>,
    pub service: u8,
    pub port: u32,
    pub ip_address: Option<Ipv4Addr>,
    pub is_reachable: bool,
    pub wifi: SignalInfo,
    pub model: ModelInfo,
    pub product_name: Option<&'static str>,
    pub runtime: RuntimeInfo,
    pub color: Option<Color>,
    pub infrared: Option<u16>,
}

/// Every device known this session, keyed by address.
#[derive(Clone, Default)]
pub(crate) struct DeviceRegistry {
    devices: Arc<Mutex<HashMap<DeviceAddress, Device>>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        DeviceRegistry::default()
    }

    pub fn contains(&self, address: DeviceAddress) -> bool {
        self.devices.lock().unwrap().contains_key(&address)
    }

    pub fn insert(&self, device: Device) {
        self.devices
            .lock()
            .unwrap()
            .insert(device.address(), device);
    }

    pub fn get(&self, address: DeviceAddress) -> Option<Device> {
        self.devices.lock().unwrap().get(&address).cloned()
    }

    pub fn remove(&self, address: DeviceAddress) -> Option<Device> {
        self.devices.lock().unwrap().remove(&address)
    }

    pub fn len(&self) -> usize {
        self.devices.lock().unwrap().len()
    }

    /// All devices, ordered by address for stable iteration.
    pub fn all(&self) -> Vec<Device> {
        let devices = self.devices.lock().unwrap();
        let mut all: Vec<Device> = devices.values().cloned().collect();
        all.sort_by_key(Device::address);
        all
    }

    /// Start of a discovery round: nothing is confirmed reachable until
    /// it answers the new broadcast.
    pub fn mark_all_unreachable(&self) {
        for device in self.devices.lock().unwrap().values() {
            device.mark_unreachable();
        }
    }
}
