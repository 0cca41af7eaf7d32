//! State-change notifications for external observers.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

use crate::address::DeviceAddress;
use crate::transport::NetworkStatus;
use crate::types::{Color, Power};

/// A change the core observed or performed.
///
/// Field-change events fire both when a reply updates a device and when
/// a command writes the field optimistically; the two are
/// indistinguishable to observers, exactly as the fields themselves are.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A device answered discovery for the first time.
    DeviceDiscovered { address: DeviceAddress },
    /// A device was forgotten and its handlers dropped.
    DeviceRemoved { address: DeviceAddress },
    LabelChanged { address: DeviceAddress, label: String },
    PowerChanged { address: DeviceAddress, power: Power },
    ColorChanged { address: DeviceAddress, color: Color },
    /// Wifi signal or firmware details arrived.
    WifiChanged { address: DeviceAddress },
    /// Hardware vendor/product/version details arrived.
    ModelChanged { address: DeviceAddress },
    ReachabilityChanged {
        address: DeviceAddress,
        is_reachable: bool,
    },
    /// Groups were created, renamed, removed, or changed membership.
    GroupsChanged,
    NetworkStatusChanged { status: NetworkStatus },
}

/// Fan-out registry of event subscribers.
///
/// Replaces broadcast-style notifications with an explicit subscriber
/// list: observers call [`EventBus::subscribe`] and read their channel;
/// subscribers whose receiver was dropped are pruned on the next
/// publish.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<Sender<Event>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        EventBus::default()
    }

    /// Register a new observer.
    pub fn subscribe(&self) -> Receiver<Event> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.lock().unwrap().push(tx);
        rx
    }

    /// Deliver an event to every live subscriber.
    pub(crate) fn publish(&self, event: Event) {
        self.subscribers
            .lock()
            .unwrap()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }
}
