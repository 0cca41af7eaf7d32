//! Binary frame encoding and decoding.

use crate::address::DeviceAddress;
use crate::errors::Error;
use crate::message::MessageKind;

type Result<T> = std::result::Result<T, Error>;

/// Number of bytes in the fixed frame header.
pub const HEADER_LEN: usize = 36;

// Header layout, little-endian unless noted:
//   0..2   size (header + payload)
//   2..4   protocol flags: 0x1400, or 0x3400 when tagged
//   4..8   source
//   8..16  target, most significant byte first (see DeviceAddress)
//   16..22 reserved
//   22     flags: bit0 response-required, bit1 ack-required
//   23     sequence
//   24..32 reserved
//   32..34 message kind
//   34..36 reserved
const PROTOCOL_FLAGS: u8 = 0x14;
const PROTOCOL_FLAGS_TAGGED: u8 = 0x34;
const FLAG_RES: u8 = 0b01;
const FLAG_ACK: u8 = 0b10;

/// One protocol message: the fixed 36-byte header plus a kind-specific
/// payload.
///
/// The `size` field always equals the serialized length of the whole
/// frame; buffers that disagree are rejected during decode, never
/// repaired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub size: u16,
    pub tagged: bool,
    pub source: u32,
    pub target: DeviceAddress,
    pub ack: bool,
    pub res: bool,
    pub sequence: u8,
    pub kind: MessageKind,
    pub payload: Vec<u8>,
}

impl Frame {
    /// Build an outbound request.
    ///
    /// Header flags follow the kind: the broadcast discovery request is
    /// tagged and expects responses, every other get expects a response,
    /// and sets are fire-and-forget.
    pub fn request(kind: MessageKind, target: DeviceAddress, payload: Vec<u8>) -> Self {
        Frame {
            size: kind.wire_size() as u16,
            tagged: kind.tagged(),
            source: 0,
            target,
            ack: false,
            res: kind.response_required(),
            sequence: 0,
            kind,
            payload,
        }
    }

    /// Build a header-only request.
    pub fn get(kind: MessageKind, target: DeviceAddress) -> Self {
        Frame::request(kind, target, Vec::new())
    }

    /// Serialize to wire bytes.
    ///
    /// Fails when the payload length does not match the kind's fixed
    /// layout; a frame whose `size` lies about its contents must never
    /// reach the network.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let expected = self.kind.payload_len();
        if self.payload.len() != expected {
            return Err(Error::PayloadLength {
                kind: self.kind,
                len: self.payload.len(),
                expected,
            });
        }

        let mut buf = vec![0u8; HEADER_LEN + expected];
        buf[0..2].copy_from_slice(&(self.kind.wire_size() as u16).to_le_bytes());
        buf[2] = 0x00;
        buf[3] = if self.tagged {
            PROTOCOL_FLAGS_TAGGED
        } else {
            PROTOCOL_FLAGS
        };
        buf[4..8].copy_from_slice(&self.source.to_le_bytes());
        buf[8..16].copy_from_slice(&self.target.wire_bytes());
        let mut flags = 0u8;
        if self.res {
            flags |= FLAG_RES;
        }
        if self.ack {
            flags |= FLAG_ACK;
        }
        buf[22] = flags;
        buf[23] = self.sequence;
        buf[32..34].copy_from_slice(&self.kind.code().to_le_bytes());
        buf[HEADER_LEN..].copy_from_slice(&self.payload);
        Ok(buf)
    }

    /// Parse a received buffer.
    ///
    /// Fails when fewer than 36 bytes are present, when the embedded kind
    /// code is unknown, or when the buffer is shorter than the kind's
    /// declared total size. On success `target` is restored to host byte
    /// order and `payload` is exactly the kind's fixed length; trailing
    /// bytes beyond it are ignored.
    pub fn decode(bytes: &[u8]) -> Result<Frame> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::FrameTooShort { len: bytes.len() });
        }

        let code = u16::from_le_bytes([bytes[32], bytes[33]]);
        let kind = MessageKind::create(code).ok_or(Error::UnknownKind { code })?;

        let expected = kind.wire_size();
        if bytes.len() < expected {
            return Err(Error::IncompleteFrame {
                kind,
                len: bytes.len(),
                expected,
            });
        }

        let mut target = [0u8; 8];
        target.copy_from_slice(&bytes[8..16]);

        Ok(Frame {
            size: expected as u16,
            tagged: bytes[3] & 0x20 != 0,
            source: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            target: DeviceAddress::from_wire(target),
            ack: bytes[22] & FLAG_ACK != 0,
            res: bytes[22] & FLAG_RES != 0,
            sequence: bytes[23],
            kind,
            payload: bytes[HEADER_LEN..expected].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    fn sample_payload(kind: MessageKind) -> Vec<u8> {
        (0..kind.payload_len()).map(|i| i as u8).collect()
    }

    #[test]
    fn test_round_trip_every_kind() {
        let target = DeviceAddress::new(0xD073_D512_3456);
        for kind in MessageKind::iter() {
            let frame = Frame::request(kind, target, sample_payload(kind));
            let bytes = frame.encode().unwrap();
            assert_eq!(bytes.len(), kind.wire_size());
            let decoded = Frame::decode(&bytes).unwrap();
            assert_eq!(decoded, frame);
        }
    }

    #[test]
    fn test_get_service_header() {
        let frame = Frame::get(MessageKind::GetService, DeviceAddress::ALL);
        assert!(frame.tagged);
        assert!(frame.res);
        assert!(!frame.ack);
        let bytes = frame.encode().unwrap();
        assert_eq!(bytes.len(), 36);
        assert_eq!(&bytes[0..2], &36u16.to_le_bytes());
        assert_eq!(bytes[2], 0x00);
        assert_eq!(bytes[3], 0x34);
        assert_eq!(bytes[22], 0b01);
    }

    #[test]
    fn test_set_kind_is_fire_and_forget() {
        let frame = Frame::request(
            MessageKind::SetLightPower,
            DeviceAddress::new(1),
            vec![0xFF, 0xFF, 0, 4, 0, 0],
        );
        assert!(!frame.tagged);
        assert!(!frame.res);
        let bytes = frame.encode().unwrap();
        assert_eq!(bytes[3], 0x14);
        assert_eq!(bytes[22], 0);
    }

    #[test]
    fn test_target_serialized_most_significant_byte_first() {
        let frame = Frame::get(
            MessageKind::GetLabel,
            DeviceAddress::new(0x0102_0304_0506_0708),
        );
        let bytes = frame.encode().unwrap();
        assert_eq!(&bytes[8..16], &[1, 2, 3, 4, 5, 6, 7, 8]);
        let decoded = Frame::decode(&bytes).unwrap();
        assert_eq!(decoded.target.value(), 0x0102_0304_0506_0708);
    }

    #[test]
    fn test_decode_rejects_short_buffer() {
        let err = Frame::decode(&[0u8; 35]).unwrap_err();
        assert_eq!(err, Error::FrameTooShort { len: 35 });
        assert!(err.is_malformed_frame());
    }

    #[test]
    fn test_decode_rejects_unknown_kind() {
        let mut bytes = Frame::get(MessageKind::GetService, DeviceAddress::ALL)
            .encode()
            .unwrap();
        bytes[32..34].copy_from_slice(&999u16.to_le_bytes());
        let err = Frame::decode(&bytes).unwrap_err();
        assert_eq!(err, Error::UnknownKind { code: 999 });
    }

    #[test]
    fn test_decode_rejects_truncated_payload() {
        let frame = Frame::request(
            MessageKind::StateService,
            DeviceAddress::new(7),
            vec![1, 0x74, 0xDD, 0, 0],
        );
        let bytes = frame.encode().unwrap();
        let err = Frame::decode(&bytes[..bytes.len() - 1]).unwrap_err();
        assert_eq!(
            err,
            Error::IncompleteFrame {
                kind: MessageKind::StateService,
                len: 40,
                expected: 41,
            }
        );
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        // Receive buffers are fixed-size; a frame is valid as long as its
        // declared size fits.
        let frame = Frame::request(
            MessageKind::StatePower,
            DeviceAddress::new(7),
            vec![0xFF, 0xFF],
        );
        let mut bytes = frame.encode().unwrap();
        bytes.extend_from_slice(&[0u8; 60]);
        let decoded = Frame::decode(&bytes).unwrap();
        assert_eq!(decoded.payload, vec![0xFF, 0xFF]);
    }

    #[test]
    fn test_encode_rejects_wrong_payload_length() {
        let frame = Frame::request(MessageKind::SetColor, DeviceAddress::new(1), vec![0; 5]);
        let err = frame.encode().unwrap_err();
        assert_eq!(
            err,
            Error::PayloadLength {
                kind: MessageKind::SetColor,
                len: 5,
                expected: 13,
            }
        );
    }
}
