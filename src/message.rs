//! Protocol message kinds.

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::EnumIter;

use crate::frame::HEADER_LEN;

/// Every message type in the LAN protocol.
///
/// Kinds split into two namespaces: device-level messages any hardware
/// answers (service, power, label, wifi, version, runtime info, location,
/// group, echo) and light-level messages only color-capable hardware
/// answers (state, color, power, infrared). Each get/set/state group is
/// one logical operation; replies are matched back to devices by
/// `(address, kind)` alone.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum MessageKind {
    GetService = 2,
    StateService = 3,
    GetHostInfo = 12,
    StateHostInfo = 13,
    GetHostFirmware = 14,
    StateHostFirmware = 15,
    GetWifiInfo = 16,
    StateWifiInfo = 17,
    GetWifiFirmware = 18,
    StateWifiFirmware = 19,
    GetPower = 20,
    SetPower = 21,
    StatePower = 22,
    GetLabel = 23,
    SetLabel = 24,
    StateLabel = 25,
    GetVersion = 32,
    StateVersion = 33,
    GetInfo = 34,
    StateInfo = 35,
    Acknowledgement = 45,
    GetLocation = 48,
    StateLocation = 50,
    GetGroup = 51,
    StateGroup = 53,
    EchoRequest = 58,
    EchoResponse = 59,

    GetLightState = 101,
    SetColor = 102,
    LightState = 107,
    GetLightPower = 116,
    SetLightPower = 117,
    StateLightPower = 118,
    GetInfrared = 120,
    StateInfrared = 121,
    SetInfrared = 122,
}

impl MessageKind {
    /// Look up a kind by its wire code.
    ///
    /// Returns `None` for codes outside the closed enumeration.
    ///
    /// # Examples
    ///
    /// ```
    /// use lifx_lan_rs::MessageKind;
    ///
    /// assert_eq!(MessageKind::create(2), Some(MessageKind::GetService));
    /// assert_eq!(MessageKind::create(4), None);
    /// ```
    pub fn create(code: u16) -> Option<Self> {
        MessageKind::iter().find(|kind| *kind as u16 == code)
    }

    /// The kind's wire code.
    pub fn code(&self) -> u16 {
        *self as u16
    }

    /// Fixed payload length in bytes for this kind.
    ///
    /// Kinds that carry no payload (all gets, acknowledgement) are
    /// header-only.
    pub(crate) fn payload_len(&self) -> usize {
        match self {
            MessageKind::StateService => 5,
            MessageKind::StateHostInfo | MessageKind::StateWifiInfo => 14,
            MessageKind::StateHostFirmware | MessageKind::StateWifiFirmware => 20,
            MessageKind::SetPower | MessageKind::SetLightPower => 6,
            MessageKind::StatePower | MessageKind::StateLightPower => 2,
            MessageKind::SetLabel | MessageKind::StateLabel => 32,
            MessageKind::StateVersion => 12,
            MessageKind::StateInfo => 24,
            MessageKind::StateLocation | MessageKind::StateGroup => 56,
            MessageKind::EchoRequest | MessageKind::EchoResponse => 64,
            MessageKind::SetColor => 13,
            MessageKind::LightState => 48,
            MessageKind::SetInfrared | MessageKind::StateInfrared => 2,
            _ => 0,
        }
    }

    /// Total frame size (header plus payload) for this kind.
    pub(crate) fn wire_size(&self) -> usize {
        HEADER_LEN + self.payload_len()
    }

    /// Only the broadcast discovery request is tagged.
    pub(crate) fn tagged(&self) -> bool {
        matches!(self, MessageKind::GetService)
    }

    /// Whether frames of this kind ask the device to respond.
    ///
    /// True for every get and for echo requests; set kinds are
    /// fire-and-forget.
    pub(crate) fn response_required(&self) -> bool {
        matches!(
            self,
            MessageKind::GetService
                | MessageKind::GetHostInfo
                | MessageKind::GetHostFirmware
                | MessageKind::GetWifiInfo
                | MessageKind::GetWifiFirmware
                | MessageKind::GetPower
                | MessageKind::GetLabel
                | MessageKind::GetVersion
                | MessageKind::GetInfo
                | MessageKind::GetLocation
                | MessageKind::GetGroup
                | MessageKind::EchoRequest
                | MessageKind::GetLightState
                | MessageKind::GetLightPower
                | MessageKind::GetInfrared
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_round_trips_every_code() {
        for kind in MessageKind::iter() {
            assert_eq!(MessageKind::create(kind.code()), Some(kind));
        }
    }

    #[test]
    fn test_create_rejects_unknown_codes() {
        assert_eq!(MessageKind::create(0), None);
        assert_eq!(MessageKind::create(4), None);
        assert_eq!(MessageKind::create(999), None);
    }

    #[test]
    fn test_wire_sizes() {
        assert_eq!(MessageKind::GetService.wire_size(), 36);
        assert_eq!(MessageKind::StateService.wire_size(), 41);
        assert_eq!(MessageKind::SetColor.wire_size(), 49);
        assert_eq!(MessageKind::LightState.wire_size(), 84);
        assert_eq!(MessageKind::StateLabel.wire_size(), 68);
        assert_eq!(MessageKind::EchoRequest.wire_size(), 100);
        assert_eq!(MessageKind::StateLocation.wire_size(), 92);
    }

    #[test]
    fn test_response_flags() {
        assert!(MessageKind::GetService.tagged());
        assert!(!MessageKind::GetLabel.tagged());
        assert!(MessageKind::GetLabel.response_required());
        assert!(MessageKind::EchoRequest.response_required());
        assert!(!MessageKind::SetColor.response_required());
        assert!(!MessageKind::SetLightPower.response_required());
        assert!(!MessageKind::StateService.response_required());
    }
}
