//! # lifx_lan_rs
//!
//! A Rust library for controlling LIFX smart lights over the proprietary
//! LAN protocol.
//!
//! This crate speaks the binary UDP protocol directly: it broadcasts
//! discovery requests, decodes the fixed-format reply frames, and keeps a
//! registry of devices whose state updates as replies stream in. It
//! supports setting colors, power states, and labels, and reading wifi,
//! firmware, and hardware details.
//!
//! ## Quick Start
//!
//! ```ignore
//! use lifx_lan_rs::{Client, Color, Event, Power};
//!
//! fn main() -> Result<(), lifx_lan_rs::Error> {
//!     // Bind the protocol socket and start listening for replies.
//!     let client = Client::open()?;
//!     let events = client.subscribe();
//!
//!     // Find devices on the local network.
//!     client.discover();
//!
//!     while let Ok(event) = events.recv() {
//!         if let Event::DeviceDiscovered { address } = event {
//!             let device = client.device(address).unwrap();
//!             println!("found {} ({})", device.label(), address);
//!             if let Some(light) = device.as_light() {
//!                 light.set_color(Color::new(0, 0, 65535, 3500), 1024);
//!             }
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Discovery**: find devices with a UDP broadcast ([`Client::discover`])
//! - **Power Control**: turn devices on and off with [`Power`]
//! - **HSBK Colors**: set hue/saturation/brightness/kelvin with [`Color`]
//! - **Labels**: read and rename devices
//! - **Device Details**: wifi signal, firmware, hardware model ([`Product`])
//! - **Groups**: drive several devices as one with [`Group`]
//! - **Events**: observe every state change through [`EventBus`] channels
//!
//! ## Communication
//!
//! All communication occurs over UDP port 56700 on the local network.
//! Requests are broadcast; devices reply to the sender directly. Commands
//! are fire-and-forget (a set is never acknowledged at the protocol
//! layer) and replies to gets are matched back to devices purely by
//! `(address, message kind)`, so state converges as replies arrive rather
//! than through request/response pairs. A lost reply is not detected or
//! retried.
//!
//! ## Threading
//!
//! [`Client::open`] starts two background threads: one blocks on the
//! socket receiving datagrams, and one serialized dispatch thread runs
//! every reply handler, so device state is never mutated concurrently.
//! Commands may be issued from any thread.

mod address;
mod client;
mod device;
mod discovery;
mod errors;
mod events;
mod frame;
mod group;
mod message;
mod payload;
mod products;
mod router;
mod transport;
mod types;

// Re-export public API
pub use address::DeviceAddress;
pub use client::Client;
pub use device::{
    DEFAULT_DURATION_MS, Device, DeviceSnapshot, Light, LightState, MembershipInfo, ModelInfo,
    RuntimeInfo, SignalInfo,
};
pub use errors::Error;
pub use events::{Event, EventBus};
pub use frame::{Frame, HEADER_LEN};
pub use group::Group;
pub use message::MessageKind;
pub use payload::PayloadReader;
pub use products::Product;
pub use router::{ReplyHandler, Router, UnknownHandler};
pub use transport::{NetworkStatus, PORT};
pub use types::{Color, Power};
