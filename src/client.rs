//! Session context wiring the transport, router, registry, and groups
//! together.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use serde_json::{Value, json};
use uuid::Uuid;

use crate::address::DeviceAddress;
use crate::device::{DEFAULT_DURATION_MS, Device, DeviceRegistry};
use crate::discovery::Discovery;
use crate::errors::Error;
use crate::events::{Event, EventBus};
use crate::group::{Group, NameSequence};
use crate::router::Router;
use crate::transport::{FrameSink, NetworkStatus, Transport};
use crate::types::{Color, Power};

type Result<T> = std::result::Result<T, Error>;

/// One session on the local network.
///
/// The client is constructed once at startup and handed around by
/// reference: it owns the transport (and with it the process's UDP
/// socket), the router, the device registry, the group table, and the
/// event bus, and it passes handles to each component that needs them.
/// Dropping the client stops the receive and dispatch threads.
///
/// # Example
///
/// ```ignore
/// use lifx_lan_rs::{Client, Power};
///
/// let client = Client::open()?;
/// let events = client.subscribe();
/// client.discover();
///
/// // ... replies stream in; devices appear in the registry ...
/// for device in client.devices() {
///     device.set_power(Power::On, 1024);
/// }
/// ```
pub struct Client {
    transport: Arc<Transport>,
    router: Router,
    devices: DeviceRegistry,
    discovery: Discovery,
    groups: Mutex<HashMap<Uuid, Group>>,
    group_names: Mutex<NameSequence>,
    events: EventBus,
    dispatch_thread: Option<JoinHandle<()>>,
}

impl Client {
    /// Bind the protocol socket and start the receive and dispatch
    /// threads.
    ///
    /// Fails when the fixed port cannot be bound (typically another
    /// instance is running). That failure is fatal by design: there is
    /// no retry, because nothing works without the socket.
    pub fn open() -> Result<Client> {
        let events = EventBus::new();
        let transport = Arc::new(Transport::open(events.clone())?);
        let router = Router::new();
        let devices = DeviceRegistry::new();

        let discovery = Discovery::new(
            devices.clone(),
            router.clone(),
            Arc::clone(&transport) as Arc<dyn FrameSink>,
            events.clone(),
        );
        discovery.install();

        let (frames_tx, frames_rx) = mpsc::channel();
        let dispatch_thread = router.start(frames_rx);
        transport.start(frames_tx);

        Ok(Client {
            transport,
            router,
            devices,
            discovery,
            groups: Mutex::new(HashMap::new()),
            group_names: Mutex::new(NameSequence::default()),
            events,
            dispatch_thread: Some(dispatch_thread),
        })
    }

    /// Register an observer for state-change events.
    pub fn subscribe(&self) -> Receiver<Event> {
        self.events.subscribe()
    }

    /// Whether the last send reached the network.
    pub fn network_status(&self) -> NetworkStatus {
        self.transport.status()
    }

    /// Broadcast a discovery round.
    ///
    /// New devices announce themselves through [`Event::DeviceDiscovered`];
    /// known devices flip back to reachable as their replies arrive.
    pub fn discover(&self) {
        self.discovery.discover();
    }

    /// Every known device, ordered by address.
    pub fn devices(&self) -> Vec<Device> {
        self.devices.all()
    }

    pub fn device(&self, address: DeviceAddress) -> Option<Device> {
        self.devices.get(address)
    }

    /// Forget a device: drop its routes, registry entry, and group
    /// memberships.
    pub fn forget(&self, address: DeviceAddress) -> Result<()> {
        self.devices
            .remove(address)
            .ok_or(Error::DeviceNotFound(address))?;
        self.router.unregister(address);

        let mut membership_changed = false;
        for group in self.groups.lock().unwrap().values_mut() {
            membership_changed |= group.remove(address);
        }
        if membership_changed {
            self.events.publish(Event::GroupsChanged);
        }
        self.events.publish(Event::DeviceRemoved { address });
        Ok(())
    }

    /// Set every known device's power at once.
    pub fn power_all(&self, power: Power) {
        for device in self.devices.all() {
            device.set_power(power, DEFAULT_DURATION_MS);
        }
    }

    /// Create a group; a numbered name is assigned when none is given.
    pub fn add_group(&self, name: Option<&str>) -> Uuid {
        let name = match name {
            Some(name) => String::from(name),
            None => self.group_names.lock().unwrap().next(),
        };
        let group = Group::new(&name);
        let id = group.id();
        self.groups.lock().unwrap().insert(id, group);
        self.events.publish(Event::GroupsChanged);
        id
    }

    pub fn remove_group(&self, id: Uuid) -> Result<()> {
        self.groups
            .lock()
            .unwrap()
            .remove(&id)
            .ok_or(Error::GroupNotFound(id))?;
        self.events.publish(Event::GroupsChanged);
        Ok(())
    }

    pub fn rename_group(&self, id: Uuid, name: &str) -> Result<()> {
        {
            let mut groups = self.groups.lock().unwrap();
            let group = groups.get_mut(&id).ok_or(Error::GroupNotFound(id))?;
            group.set_name(name);
        }
        self.events.publish(Event::GroupsChanged);
        Ok(())
    }

    /// Copy of one group's current definition.
    pub fn group(&self, id: Uuid) -> Option<Group> {
        self.groups.lock().unwrap().get(&id).cloned()
    }

    /// Copies of every group, ordered by name.
    pub fn groups(&self) -> Vec<Group> {
        let groups = self.groups.lock().unwrap();
        let mut all: Vec<Group> = groups.values().cloned().collect();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        all
    }

    /// Add a registered device to a group.
    pub fn group_add_device(&self, id: Uuid, address: DeviceAddress) -> Result<()> {
        if !self.devices.contains(address) {
            return Err(Error::DeviceNotFound(address));
        }
        let added = {
            let mut groups = self.groups.lock().unwrap();
            let group = groups.get_mut(&id).ok_or(Error::GroupNotFound(id))?;
            group.add(address)
        };
        if added {
            self.events.publish(Event::GroupsChanged);
        }
        Ok(())
    }

    pub fn group_remove_device(&self, id: Uuid, address: DeviceAddress) -> Result<()> {
        let removed = {
            let mut groups = self.groups.lock().unwrap();
            let group = groups.get_mut(&id).ok_or(Error::GroupNotFound(id))?;
            group.remove(address)
        };
        if removed {
            self.events.publish(Event::GroupsChanged);
        }
        Ok(())
    }

    /// Fan a power command out to every member of a group.
    pub fn set_group_power(&self, id: Uuid, power: Power, duration_ms: u32) -> Result<()> {
        let mut groups = self.groups.lock().unwrap();
        let group = groups.get_mut(&id).ok_or(Error::GroupNotFound(id))?;
        let members = self.resolve(group.members());
        group.apply_power(&members, power, duration_ms);
        Ok(())
    }

    /// Fan a color command out to every light in a group.
    pub fn set_group_color(&self, id: Uuid, color: Color, duration_ms: u32) -> Result<()> {
        let mut groups = self.groups.lock().unwrap();
        let group = groups.get_mut(&id).ok_or(Error::GroupNotFound(id))?;
        let members = self.resolve(group.members());
        group.apply_color(&members, color, duration_ms);
        Ok(())
    }

    /// Session overview for logging and support bundles.
    pub fn diagnostics(&self) -> Value {
        let devices: Vec<Value> = self
            .devices
            .all()
            .iter()
            .map(|device| serde_json::to_value(device.snapshot()).unwrap_or(Value::Null))
            .collect();
        let groups: Vec<Value> = self
            .groups()
            .iter()
            .map(|group| serde_json::to_value(group).unwrap_or(Value::Null))
            .collect();

        json!({
            "network_status": format!("{:?}", self.network_status()),
            "device_count": devices.len(),
            "devices": devices,
            "groups": groups,
        })
    }

    fn resolve(&self, members: &[DeviceAddress]) -> Vec<Device> {
        members
            .iter()
            .filter_map(|address| self.devices.get(*address))
            .collect()
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        // Stopping the transport closes the frame channel, which in turn
        // ends the dispatch thread.
        self.transport.stop();
        if let Some(handle) = self.dispatch_thread.take() {
            let _ = handle.join();
        }
    }
}
