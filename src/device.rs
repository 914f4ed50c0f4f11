//! Device slots and hardware enumeration.
//!
//! The driver exposes a fixed address space of 20 device slots. Slots 1-10 are
//! keyboards, slots 11-20 are mice. A slot may or may not have physical
//! hardware behind it; [`enumerate`] reports the ones that do.

use crate::context::Context;
use crate::error::Result;

#[cfg(feature = "recorder")]
use serde::{Deserialize, Serialize};

/// Number of keyboard slots.
pub const MAX_KEYBOARD: i32 = 10;
/// Number of mouse slots.
pub const MAX_MOUSE: i32 = 10;
/// Total number of device slots.
pub const MAX_DEVICE: i32 = MAX_KEYBOARD + MAX_MOUSE;

/// Capacity of the hardware id scratch buffer, in UTF-16 code units.
pub const HARDWARE_ID_CAPACITY: usize = 1024;

/// Class of a device slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "recorder", derive(Serialize, Deserialize))]
pub enum DeviceClass {
    /// Keyboard slot (ids 1-10).
    Keyboard,
    /// Mouse slot (ids 11-20).
    Mouse,
}

/// A device slot identifier.
///
/// Any `i32` can be wrapped so that out-of-range ids can be passed through the
/// API and rejected there; use [`Device::is_invalid`] to check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "recorder", derive(Serialize, Deserialize))]
pub struct Device(i32);

impl Device {
    /// Wrap a raw device id without validation.
    pub const fn from_raw(id: i32) -> Self {
        Device(id)
    }

    /// The raw device id.
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// The keyboard slot with the given zero-based index.
    pub const fn keyboard(index: i32) -> Self {
        Device(index + 1)
    }

    /// The mouse slot with the given zero-based index.
    pub const fn mouse(index: i32) -> Self {
        Device(MAX_KEYBOARD + index + 1)
    }

    /// All device slots in ascending order.
    pub fn all() -> impl Iterator<Item = Device> {
        (1..=MAX_DEVICE).map(Device)
    }

    /// Whether the id lies outside the slot range.
    pub const fn is_invalid(self) -> bool {
        self.0 < 1 || self.0 > MAX_DEVICE
    }

    /// Whether the id is a keyboard slot.
    pub const fn is_keyboard(self) -> bool {
        self.0 >= 1 && self.0 <= MAX_KEYBOARD
    }

    /// Whether the id is a mouse slot.
    pub const fn is_mouse(self) -> bool {
        self.0 > MAX_KEYBOARD && self.0 <= MAX_DEVICE
    }

    /// The class of this slot, or `None` if the id is invalid.
    pub const fn class(self) -> Option<DeviceClass> {
        if self.is_keyboard() {
            Some(DeviceClass::Keyboard)
        } else if self.is_mouse() {
            Some(DeviceClass::Mouse)
        } else {
            None
        }
    }

    /// Zero-based slot index for table lookups.
    pub(crate) fn slot(self) -> Option<usize> {
        if self.is_invalid() {
            None
        } else {
            Some((self.0 - 1) as usize)
        }
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Device> for i32 {
    fn from(device: Device) -> Self {
        device.0
    }
}

/// Predicate matching keyboard slots, for use with [`Context::set_filter`].
pub fn is_keyboard(device: Device) -> bool {
    device.is_keyboard()
}

/// Predicate matching mouse slots, for use with [`Context::set_filter`].
pub fn is_mouse(device: Device) -> bool {
    device.is_mouse()
}

/// Predicate matching every valid slot.
pub fn is_valid(device: Device) -> bool {
    !device.is_invalid()
}

/// A device slot paired with the hardware id of the device behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "recorder", derive(Serialize, Deserialize))]
pub struct DeviceData {
    /// The device slot.
    pub device: Device,
    /// Hardware identifier reported by the driver.
    pub hardware_id: String,
}

/// Decode the UTF-16LE bytes the driver writes into the hardware id buffer.
pub(crate) fn decode_hardware_id(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
        .trim_end_matches('\0')
        .to_string()
}

/// List the devices that have hardware behind them.
///
/// Slots are visited in ascending order. A slot is considered when
/// `predicate` holds for it (every valid slot when `predicate` is `None`) and
/// included when the driver reports a non-empty hardware id.
pub fn enumerate(
    context: &Context,
    predicate: Option<&dyn Fn(Device) -> bool>,
) -> Result<Vec<DeviceData>> {
    let mut buffer = vec![0u8; HARDWARE_ID_CAPACITY * 2];
    let mut result = Vec::new();

    for device in Device::all() {
        let include = match predicate {
            Some(predicate) => predicate(device),
            None => !context.is_invalid(device)?,
        };
        if !include {
            continue;
        }

        let length = context.hardware_id_into(device, &mut buffer)?;
        if length == 0 {
            continue;
        }
        let hardware_id = decode_hardware_id(&buffer[..length]);
        if hardware_id.is_empty() {
            continue;
        }
        result.push(DeviceData {
            device,
            hardware_id,
        });
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_classes() {
        assert!(Device::from_raw(1).is_keyboard());
        assert!(Device::from_raw(10).is_keyboard());
        assert!(Device::from_raw(11).is_mouse());
        assert!(Device::from_raw(20).is_mouse());
        assert_eq!(Device::from_raw(5).class(), Some(DeviceClass::Keyboard));
        assert_eq!(Device::from_raw(15).class(), Some(DeviceClass::Mouse));
    }

    #[test]
    fn test_out_of_range_is_invalid() {
        for id in [i32::MIN, -1, 0, 21, 100, i32::MAX] {
            let device = Device::from_raw(id);
            assert!(device.is_invalid(), "{id} should be invalid");
            assert!(!device.is_keyboard());
            assert!(!device.is_mouse());
            assert_eq!(device.class(), None);
            assert_eq!(device.slot(), None);
        }
    }

    #[test]
    fn test_index_constructors() {
        assert_eq!(Device::keyboard(0).raw(), 1);
        assert_eq!(Device::keyboard(9).raw(), 10);
        assert_eq!(Device::mouse(0).raw(), 11);
        assert_eq!(Device::mouse(9).raw(), 20);
    }

    #[test]
    fn test_all_is_ascending() {
        let ids: Vec<i32> = Device::all().map(Device::raw).collect();
        assert_eq!(ids, (1..=20).collect::<Vec<_>>());
    }

    #[test]
    fn test_decode_hardware_id_trims_nul() {
        let bytes: Vec<u8> = "HID\\VID_1\0"
            .encode_utf16()
            .flat_map(u16::to_le_bytes)
            .collect();
        assert_eq!(decode_hardware_id(&bytes), "HID\\VID_1");
    }
}
