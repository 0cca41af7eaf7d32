//! Power state for device control.

use serde::{Deserialize, Serialize};

/// Power state of a device.
///
/// The wire carries power as a `u16` level: devices report the full
/// level when powered and zero when on standby. Anything else is treated
/// as standby.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Power {
    /// The device is emitting
    On,
    /// The device is on standby
    Off,
}

impl Power {
    const ON_LEVEL: u16 = u16::MAX;

    /// Interpret a wire level.
    ///
    /// # Examples
    ///
    /// ```
    /// use lifx_lan_rs::Power;
    ///
    /// assert_eq!(Power::from_level(65535), Power::On);
    /// assert_eq!(Power::from_level(0), Power::Off);
    /// assert_eq!(Power::from_level(1234), Power::Off);
    /// ```
    pub fn from_level(level: u16) -> Self {
        if level == Self::ON_LEVEL {
            Power::On
        } else {
            Power::Off
        }
    }

    /// The wire level for this state.
    pub fn level(&self) -> u16 {
        match self {
            Power::On => Self::ON_LEVEL,
            Power::Off => 0,
        }
    }

    pub fn is_on(&self) -> bool {
        matches!(self, Power::On)
    }
}
