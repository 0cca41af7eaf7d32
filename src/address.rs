//! Device addressing.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The 8-byte hardware address identifying one device on the network.
///
/// The low six bytes carry the device's MAC; this value is the frame
/// target on the wire and the primary key for every registered device.
/// Immutable once a device has been discovered.
///
/// # Examples
///
/// ```
/// use lifx_lan_rs::DeviceAddress;
///
/// let address = DeviceAddress::new(0x0000_D073_D512_3456);
/// assert_eq!(address.to_string(), "D0:73:D5:12:34:56");
/// assert_eq!(DeviceAddress::ALL.value(), 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceAddress(u64);

impl DeviceAddress {
    /// Target addressing every device on the network.
    pub const ALL: DeviceAddress = DeviceAddress(0);

    pub const fn new(value: u64) -> Self {
        DeviceAddress(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// Serialized wire form: most significant byte first.
    ///
    /// The protocol stores the target field with its bytes reversed
    /// relative to the little-endian order of the rest of the header.
    pub(crate) fn wire_bytes(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    /// Restore an address from its reversed wire form.
    pub(crate) fn from_wire(bytes: [u8; 8]) -> Self {
        DeviceAddress(u64::from_be_bytes(bytes))
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0.to_le_bytes();
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[5], b[4], b[3], b[2], b[1], b[0]
        )
    }
}

impl From<u64> for DeviceAddress {
    fn from(value: u64) -> Self {
        DeviceAddress(value)
    }
}

impl From<DeviceAddress> for u64 {
    fn from(address: DeviceAddress) -> Self {
        address.0
    }
}
