//! Extended-identifier unpacking for FRC CAN device addressing.
//!
//! The 29-bit arbitration id carries five fields:
//!
//! | field        | bits  |
//! |--------------|-------|
//! | device type  | 28-24 |
//! | manufacturer | 23-16 |
//! | API class    | 15-10 |
//! | API index    | 9-6   |
//! | device id    | 5-0   |
//!
//! Everything here is a pure function of the id; the ingestion loop owns
//! the bus-error accounting for frames that never make it this far.

use core::fmt;

use can_transport::CanFrame;

/// Identity of one physical device on the bus.
///
/// Instance numbers alone are ambiguous (a NEO controller and a CANCoder
/// can both sit at id 3), so identity is the full triple.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct DeviceKey {
    pub manufacturer: u8,
    pub device_type: u8,
    pub instance: u8,
}

impl DeviceKey {
    pub fn new(manufacturer: u8, device_type: u8, instance: u8) -> Self {
        Self {
            manufacturer,
            device_type,
            instance,
        }
    }
}

impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.manufacturer, self.device_type, self.instance
        )
    }
}

/// All fields unpacked from one extended id.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DecodedId {
    pub key: DeviceKey,
    pub api_class: u8,
    pub api_index: u8,
}

pub fn decode_id(raw: u32) -> DecodedId {
    DecodedId {
        key: DeviceKey {
            device_type: ((raw >> 24) & 0x1F) as u8,
            manufacturer: ((raw >> 16) & 0xFF) as u8,
            instance: (raw & 0x3F) as u8,
        },
        api_class: ((raw >> 10) & 0x3F) as u8,
        api_index: ((raw >> 6) & 0x0F) as u8,
    }
}

/// Decode a received frame into device identity plus payload.
///
/// Standard (11-bit) frames are not FRC device traffic and yield `None`;
/// the caller counts them as bus errors.
pub fn decode_frame(frame: &CanFrame) -> Option<(DecodedId, &[u8])> {
    if !frame.id.is_extended() {
        return None;
    }
    Some((decode_id(frame.id.raw()), frame.payload()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use can_transport::CanId;

    #[test]
    fn unpacks_all_fields() {
        // type 2, manufacturer 5, api class 0x18, api index 3, instance 10
        let raw = (2 << 24) | (5 << 16) | (0x18 << 10) | (3 << 6) | 10;
        let decoded = decode_id(raw);
        assert_eq!(decoded.key, DeviceKey::new(5, 2, 10));
        assert_eq!(decoded.api_class, 0x18);
        assert_eq!(decoded.api_index, 3);
    }

    #[test]
    fn instance_is_low_six_bits_only() {
        let decoded = decode_id(0x3F);
        assert_eq!(decoded.key.instance, 0x3F);
        assert_eq!(decode_id(0x40).key.instance, 0);
    }

    #[test]
    fn standard_frames_are_rejected() {
        let id = CanId::standard(0x123).unwrap();
        let frame = CanFrame::new(id, &[0x01]).unwrap();
        assert!(decode_frame(&frame).is_none());
    }

    #[test]
    fn extended_frame_yields_key_and_payload() {
        let raw = (2 << 24) | (5 << 16) | 22;
        let id = CanId::extended(raw).unwrap();
        let frame = CanFrame::new(id, &[0xDE, 0xAD]).unwrap();
        let (decoded, payload) = decode_frame(&frame).unwrap();
        assert_eq!(decoded.key, DeviceKey::new(5, 2, 22));
        assert_eq!(payload, &[0xDE, 0xAD]);
    }

    #[test]
    fn key_ordering_is_by_manufacturer_then_type_then_instance() {
        let a = DeviceKey::new(4, 2, 11);
        let b = DeviceKey::new(5, 2, 1);
        let c = DeviceKey::new(5, 7, 0);
        assert!(a < b && b < c);
    }
}
