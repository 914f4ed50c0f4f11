//! Keyboard and mouse strokes and their wire layout.
//!
//! The driver exchanges strokes as a C union of a keyboard record and a mouse
//! record. Every slot in a batch is sized to the larger (mouse) record, so one
//! buffer type carries either kind; which one applies is decided by the class of
//! the device the batch belongs to, never by the bytes themselves.
//!
//! Layout (little-endian, 20 bytes per stroke):
//!
//! | offset | keyboard      | mouse         |
//! |--------|---------------|---------------|
//! | 0      | `code: u16`   | `state: u16`  |
//! | 2      | `state: u16`  | `flags: u16`  |
//! | 4      | `information: u32` | `rolling: i16` |
//! | 6      |               | padding       |
//! | 8      |               | `x: i32`      |
//! | 12     |               | `y: i32`      |
//! | 16     |               | `information: u32` |

use crate::device::{Device, DeviceClass};
use crate::error::{Error, Result};

#[cfg(feature = "recorder")]
use serde::{Deserialize, Serialize};

/// Size of one stroke on the wire.
pub const STROKE_SIZE: usize = 20;
/// Size of one keyboard record. Keyboard batches use this stride on the wire.
pub const KEY_STROKE_SIZE: usize = 8;

// Keyboard state bits
/// Key pressed.
pub const KEY_DOWN: u16 = 0x00;
/// Key released.
pub const KEY_UP: u16 = 0x01;
/// E0 prefixed scancode.
pub const KEY_E0: u16 = 0x02;
/// E1 prefixed scancode.
pub const KEY_E1: u16 = 0x04;
/// Terminal server LED update.
pub const KEY_TERMSRV_SET_LED: u16 = 0x08;
/// Terminal server shadow.
pub const KEY_TERMSRV_SHADOW: u16 = 0x10;
/// Terminal server VK packet.
pub const KEY_TERMSRV_VKPACKET: u16 = 0x20;

// Mouse state bits
/// Left button pressed.
pub const MOUSE_LEFT_BUTTON_DOWN: u16 = 0x001;
/// Left button released.
pub const MOUSE_LEFT_BUTTON_UP: u16 = 0x002;
/// Right button pressed.
pub const MOUSE_RIGHT_BUTTON_DOWN: u16 = 0x004;
/// Right button released.
pub const MOUSE_RIGHT_BUTTON_UP: u16 = 0x008;
/// Middle button pressed.
pub const MOUSE_MIDDLE_BUTTON_DOWN: u16 = 0x010;
/// Middle button released.
pub const MOUSE_MIDDLE_BUTTON_UP: u16 = 0x020;
/// Button 4 pressed.
pub const MOUSE_BUTTON_4_DOWN: u16 = 0x040;
/// Button 4 released.
pub const MOUSE_BUTTON_4_UP: u16 = 0x080;
/// Button 5 pressed.
pub const MOUSE_BUTTON_5_DOWN: u16 = 0x100;
/// Button 5 released.
pub const MOUSE_BUTTON_5_UP: u16 = 0x200;
/// Vertical wheel rotated, amount in `rolling`.
pub const MOUSE_WHEEL: u16 = 0x400;
/// Horizontal wheel rotated, amount in `rolling`.
pub const MOUSE_HWHEEL: u16 = 0x800;

// Mouse flag bits
/// `x`/`y` are deltas.
pub const MOUSE_MOVE_RELATIVE: u16 = 0x000;
/// `x`/`y` are absolute coordinates.
pub const MOUSE_MOVE_ABSOLUTE: u16 = 0x001;
/// Absolute coordinates span the virtual desktop.
pub const MOUSE_VIRTUAL_DESKTOP: u16 = 0x002;
/// Mouse attributes changed.
pub const MOUSE_ATTRIBUTES_CHANGED: u16 = 0x004;
/// Movement must not be coalesced.
pub const MOUSE_MOVE_NOCOALESCE: u16 = 0x008;
/// Terminal server shadow source.
pub const MOUSE_TERMSRV_SRC_SHADOW: u16 = 0x100;

/// A keyboard stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "recorder", derive(Serialize, Deserialize))]
pub struct KeyStroke {
    /// Hardware scancode.
    pub code: u16,
    /// `KEY_*` state bits.
    pub state: u16,
    /// Driver supplied extra information.
    pub information: u32,
}

impl KeyStroke {
    /// Create a keyboard stroke.
    pub const fn new(code: u16, state: u16) -> Self {
        Self {
            code,
            state,
            information: 0,
        }
    }

    /// A key-down stroke for `code`.
    pub const fn down(code: u16) -> Self {
        Self::new(code, KEY_DOWN)
    }

    /// A key-up stroke for `code`.
    pub const fn up(code: u16) -> Self {
        Self::new(code, KEY_UP)
    }

    /// Whether this is a release.
    pub const fn is_up(&self) -> bool {
        self.state & KEY_UP != 0
    }
}

/// A mouse stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "recorder", derive(Serialize, Deserialize))]
pub struct MouseStroke {
    /// `MOUSE_*` button and wheel bits.
    pub state: u16,
    /// `MOUSE_MOVE_*` flag bits.
    pub flags: u16,
    /// Wheel rotation.
    pub rolling: i16,
    /// Horizontal delta or coordinate.
    pub x: i32,
    /// Vertical delta or coordinate.
    pub y: i32,
    /// Driver supplied extra information.
    pub information: u32,
}

impl MouseStroke {
    /// A relative movement.
    pub const fn relative_move(x: i32, y: i32) -> Self {
        Self {
            state: 0,
            flags: MOUSE_MOVE_RELATIVE,
            rolling: 0,
            x,
            y,
            information: 0,
        }
    }

    /// A button transition with no movement.
    pub const fn button(state: u16) -> Self {
        Self {
            state,
            flags: MOUSE_MOVE_RELATIVE,
            rolling: 0,
            x: 0,
            y: 0,
            information: 0,
        }
    }

    /// A vertical wheel rotation.
    pub const fn wheel(rolling: i16) -> Self {
        Self {
            state: MOUSE_WHEEL,
            flags: MOUSE_MOVE_RELATIVE,
            rolling,
            x: 0,
            y: 0,
            information: 0,
        }
    }
}

/// A stroke of either kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "recorder", derive(Serialize, Deserialize))]
pub enum Stroke {
    /// Stroke from a keyboard slot.
    Keyboard(KeyStroke),
    /// Stroke from a mouse slot.
    Mouse(MouseStroke),
}

impl Stroke {
    /// The device class this stroke belongs to.
    pub fn class(&self) -> DeviceClass {
        match self {
            Stroke::Keyboard(_) => DeviceClass::Keyboard,
            Stroke::Mouse(_) => DeviceClass::Mouse,
        }
    }

    /// The keyboard stroke, if this is one.
    pub fn as_keyboard(&self) -> Option<&KeyStroke> {
        match self {
            Stroke::Keyboard(key) => Some(key),
            Stroke::Mouse(_) => None,
        }
    }

    /// The mouse stroke, if this is one.
    pub fn as_mouse(&self) -> Option<&MouseStroke> {
        match self {
            Stroke::Mouse(mouse) => Some(mouse),
            Stroke::Keyboard(_) => None,
        }
    }

    /// Encode into the wire layout.
    pub fn encode(&self) -> RawStroke {
        match self {
            Stroke::Keyboard(key) => RawStroke::from_key(key),
            Stroke::Mouse(mouse) => RawStroke::from_mouse(mouse),
        }
    }
}

impl From<KeyStroke> for Stroke {
    fn from(stroke: KeyStroke) -> Self {
        Stroke::Keyboard(stroke)
    }
}

impl From<MouseStroke> for Stroke {
    fn from(stroke: MouseStroke) -> Self {
        Stroke::Mouse(stroke)
    }
}

/// One stroke in the driver's wire layout.
#[repr(C, align(4))]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RawStroke(pub [u8; STROKE_SIZE]);

impl std::fmt::Debug for RawStroke {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RawStroke({:02x?})", self.0)
    }
}

impl RawStroke {
    fn u16_at(&self, offset: usize) -> u16 {
        u16::from_le_bytes([self.0[offset], self.0[offset + 1]])
    }

    fn u32_at(&self, offset: usize) -> u32 {
        u32::from_le_bytes([
            self.0[offset],
            self.0[offset + 1],
            self.0[offset + 2],
            self.0[offset + 3],
        ])
    }

    fn put(&mut self, offset: usize, bytes: &[u8]) {
        self.0[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Encode a keyboard stroke. Bytes past the keyboard record are zero.
    pub fn from_key(stroke: &KeyStroke) -> Self {
        let mut raw = RawStroke::default();
        raw.put(0, &stroke.code.to_le_bytes());
        raw.put(2, &stroke.state.to_le_bytes());
        raw.put(4, &stroke.information.to_le_bytes());
        raw
    }

    /// Encode a mouse stroke.
    pub fn from_mouse(stroke: &MouseStroke) -> Self {
        let mut raw = RawStroke::default();
        raw.put(0, &stroke.state.to_le_bytes());
        raw.put(2, &stroke.flags.to_le_bytes());
        raw.put(4, &stroke.rolling.to_le_bytes());
        raw.put(8, &stroke.x.to_le_bytes());
        raw.put(12, &stroke.y.to_le_bytes());
        raw.put(16, &stroke.information.to_le_bytes());
        raw
    }

    /// Read the bytes as a keyboard stroke.
    pub fn to_key(&self) -> KeyStroke {
        KeyStroke {
            code: self.u16_at(0),
            state: self.u16_at(2),
            information: self.u32_at(4),
        }
    }

    /// Read the bytes as a mouse stroke.
    pub fn to_mouse(&self) -> MouseStroke {
        MouseStroke {
            state: self.u16_at(0),
            flags: self.u16_at(2),
            rolling: self.u16_at(4) as i16,
            x: self.u32_at(8) as i32,
            y: self.u32_at(12) as i32,
            information: self.u32_at(16),
        }
    }

    /// Interpret the bytes for a device of the given class.
    pub fn decode(&self, class: DeviceClass) -> Stroke {
        match class {
            DeviceClass::Keyboard => Stroke::Keyboard(self.to_key()),
            DeviceClass::Mouse => Stroke::Mouse(self.to_mouse()),
        }
    }
}

/// Encode a batch of strokes destined for `device`.
///
/// Every stroke must match the device's class.
pub fn encode_batch(device: Device, strokes: &[Stroke]) -> Result<Vec<RawStroke>> {
    let class = device
        .class()
        .ok_or(Error::InvalidDevice(device.raw()))?;
    strokes
        .iter()
        .map(|stroke| {
            if stroke.class() == class {
                Ok(stroke.encode())
            } else {
                Err(Error::DeviceClassMismatch {
                    device: device.raw(),
                    expected: class,
                })
            }
        })
        .collect()
}

/// Decode a batch of strokes received from `device`.
pub fn decode_batch(device: Device, raw: &[RawStroke]) -> Result<Vec<Stroke>> {
    let class = device
        .class()
        .ok_or(Error::InvalidDevice(device.raw()))?;
    Ok(raw.iter().map(|stroke| stroke.decode(class)).collect())
}

/// A keyboard record in the driver's packed keyboard batch layout.
///
/// The driver walks keyboard batches with a [`KEY_STROKE_SIZE`] stride and
/// mouse batches with a [`STROKE_SIZE`] stride.
#[repr(C, align(4))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RawKeyStroke(pub [u8; KEY_STROKE_SIZE]);

impl RawKeyStroke {
    /// The keyboard record at the front of `raw`.
    pub fn from_raw(raw: &RawStroke) -> Self {
        let mut key = RawKeyStroke::default();
        key.0.copy_from_slice(&raw.0[..KEY_STROKE_SIZE]);
        key
    }

    /// Widen back to a full stroke slot; trailing bytes are zero.
    pub fn to_raw(self) -> RawStroke {
        let mut raw = RawStroke::default();
        raw.0[..KEY_STROKE_SIZE].copy_from_slice(&self.0);
        raw
    }
}

/// Pack keyboard strokes into the contiguous layout the driver expects.
pub fn pack_key_batch(raw: &[RawStroke]) -> Vec<RawKeyStroke> {
    raw.iter().map(RawKeyStroke::from_raw).collect()
}

/// Widen packed keyboard records into `out`. Returns the number copied.
pub fn unpack_key_batch(packed: &[RawKeyStroke], out: &mut [RawStroke]) -> usize {
    for (slot, key) in out.iter_mut().zip(packed) {
        *slot = key.to_raw();
    }
    packed.len().min(out.len())
}
