//! Payload field access: a bounds-checked reader, typed reply views, and
//! builders for the set-command payloads.

use crate::errors::Error;
use crate::types::Color;

type Result<T> = std::result::Result<T, Error>;

/// Width of the fixed label field shared by several payloads.
pub(crate) const LABEL_LEN: usize = 32;
/// Width of the echo payload.
pub(crate) const ECHO_LEN: usize = 64;

/// Bounds-checked reader over a reply payload.
///
/// Every accessor validates `offset + width` against the buffer before
/// touching a byte, so a handler can never read past the payload length
/// its kind declares.
///
/// # Examples
///
/// ```
/// use lifx_lan_rs::PayloadReader;
///
/// let reader = PayloadReader::new(&[0x01, 0x74, 0xDD, 0x00, 0x00]);
/// assert_eq!(reader.u8(0).unwrap(), 1);
/// assert_eq!(reader.u32_le(1).unwrap(), 56692);
/// assert!(reader.u32_le(2).is_err());
/// ```
pub struct PayloadReader<'a> {
    bytes: &'a [u8],
}

impl<'a> PayloadReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        PayloadReader { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn slice(&self, offset: usize, width: usize) -> Result<&'a [u8]> {
        let end = offset.checked_add(width).filter(|end| *end <= self.bytes.len());
        match end {
            Some(end) => Ok(&self.bytes[offset..end]),
            None => Err(Error::PayloadOutOfBounds {
                offset,
                width,
                len: self.bytes.len(),
            }),
        }
    }

    pub fn u8(&self, offset: usize) -> Result<u8> {
        Ok(self.slice(offset, 1)?[0])
    }

    pub fn u16_le(&self, offset: usize) -> Result<u16> {
        let b = self.slice(offset, 2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn u32_le(&self, offset: usize) -> Result<u32> {
        let b = self.slice(offset, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn u64_le(&self, offset: usize) -> Result<u64> {
        let b = self.slice(offset, 8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    pub fn f32_le(&self, offset: usize) -> Result<f32> {
        Ok(f32::from_bits(self.u32_le(offset)?))
    }

    pub fn bytes(&self, offset: usize, width: usize) -> Result<&'a [u8]> {
        self.slice(offset, width)
    }

    /// Read the fixed 32-byte label field at `offset`.
    ///
    /// The field is NUL-padded UTF-8; invalid sequences are replaced
    /// rather than rejected, matching how devices echo labels back.
    pub fn label(&self, offset: usize) -> Result<String> {
        let raw = self.slice(offset, LABEL_LEN)?;
        let end = raw.iter().position(|b| *b == 0).unwrap_or(LABEL_LEN);
        Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
    }
}

/// Encode a label into its fixed 32-byte wire field, truncating on a
/// character boundary.
pub(crate) fn label_bytes(label: &str) -> Vec<u8> {
    let mut out = vec![0u8; LABEL_LEN];
    let mut end = label.len().min(LABEL_LEN);
    while !label.is_char_boundary(end) {
        end -= 1;
    }
    out[..end].copy_from_slice(&label.as_bytes()[..end]);
    out
}

/// Pad or truncate an echo payload to its fixed 64 bytes.
pub(crate) fn echo_bytes(payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; ECHO_LEN];
    let end = payload.len().min(ECHO_LEN);
    out[..end].copy_from_slice(&payload[..end]);
    out
}

/// Power level plus transition duration, for both power-set kinds.
pub(crate) fn power_bytes(level: u16, duration_ms: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(6);
    out.extend_from_slice(&level.to_le_bytes());
    out.extend_from_slice(&duration_ms.to_le_bytes());
    out
}

/// Reserved byte, HSBK fields, then transition duration.
pub(crate) fn color_bytes(color: &Color, duration_ms: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(13);
    out.push(0);
    out.extend_from_slice(&color.wire_bytes());
    out.extend_from_slice(&duration_ms.to_le_bytes());
    out
}

/// Infrared level.
pub(crate) fn infrared_bytes(level: u16) -> Vec<u8> {
    level.to_le_bytes().to_vec()
}

/// stateService: service id, then the port the device listens on.
pub(crate) struct ServiceReply {
    pub service: u8,
    pub port: u32,
}

impl ServiceReply {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let r = PayloadReader::new(payload);
        Ok(ServiceReply {
            service: r.u8(0)?,
            port: r.u32_le(1)?,
        })
    }
}

/// statePower (device or light): the current level.
pub(crate) struct PowerReply {
    pub level: u16,
}

impl PowerReply {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let r = PayloadReader::new(payload);
        Ok(PowerReply { level: r.u16_le(0)? })
    }
}

/// stateLabel: the fixed 32-byte label field.
pub(crate) struct LabelReply {
    pub label: String,
}

impl LabelReply {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let r = PayloadReader::new(payload);
        Ok(LabelReply { label: r.label(0)? })
    }
}

/// stateHostInfo / stateWifiInfo: subsystem signal and traffic counters.
pub(crate) struct SignalReply {
    pub signal: f32,
    pub tx: u32,
    pub rx: u32,
}

impl SignalReply {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let r = PayloadReader::new(payload);
        Ok(SignalReply {
            signal: r.f32_le(0)?,
            tx: r.u32_le(4)?,
            rx: r.u32_le(8)?,
        })
    }
}

/// stateHostFirmware / stateWifiFirmware: build timestamp and version.
pub(crate) struct FirmwareReply {
    pub build: u64,
    pub version: u32,
}

impl FirmwareReply {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let r = PayloadReader::new(payload);
        Ok(FirmwareReply {
            build: r.u64_le(0)?,
            version: r.u32_le(16)?,
        })
    }
}

/// stateVersion: hardware vendor, product, and version codes.
pub(crate) struct VersionReply {
    pub vendor: u32,
    pub product: u32,
    pub version: u32,
}

impl VersionReply {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let r = PayloadReader::new(payload);
        Ok(VersionReply {
            vendor: r.u32_le(0)?,
            product: r.u32_le(4)?,
            version: r.u32_le(8)?,
        })
    }
}

/// stateInfo: device clock and uptime counters, nanoseconds.
pub(crate) struct RuntimeReply {
    pub time: u64,
    pub uptime: u64,
    pub downtime: u64,
}

impl RuntimeReply {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let r = PayloadReader::new(payload);
        Ok(RuntimeReply {
            time: r.u64_le(0)?,
            uptime: r.u64_le(8)?,
            downtime: r.u64_le(16)?,
        })
    }
}

/// stateLocation / stateGroup: a 16-byte id, a label, and when the
/// membership last changed.
pub(crate) struct MembershipReply {
    pub id: [u8; 16],
    pub label: String,
    pub updated_at: u64,
}

impl MembershipReply {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let r = PayloadReader::new(payload);
        let mut id = [0u8; 16];
        id.copy_from_slice(r.bytes(0, 16)?);
        Ok(MembershipReply {
            id,
            label: r.label(16)?,
            updated_at: r.u64_le(48)?,
        })
    }
}

/// Light state: HSBK color, power level, and label in one reply.
pub(crate) struct LightStateReply {
    pub color: Color,
    pub level: u16,
    pub label: String,
}

impl LightStateReply {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let r = PayloadReader::new(payload);
        Ok(LightStateReply {
            color: Color::new(r.u16_le(0)?, r.u16_le(2)?, r.u16_le(4)?, r.u16_le(6)?),
            level: r.u16_le(10)?,
            label: r.label(12)?,
        })
    }
}

/// stateInfrared: the current infrared level.
pub(crate) struct InfraredReply {
    pub level: u16,
}

impl InfraredReply {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let r = PayloadReader::new(payload);
        Ok(InfraredReply { level: r.u16_le(0)? })
    }
}
