//! Filter bitmasks.
//!
//! A filter selects which strokes a context intercepts on a device. Keyboard and
//! mouse filters share the same 16-bit width; the constants below name the bits
//! for each class. A filter of zero disables interception.

use crate::stroke::{KEY_UP, KeyStroke, MOUSE_MOVE_ABSOLUTE, MouseStroke, Stroke};

/// Filter bitmask.
pub type Filter = u16;

/// Delivery priority among contexts filtering the same device.
pub type Precedence = i32;

// Keyboard filters
/// Intercept nothing.
pub const FILTER_KEY_NONE: Filter = 0x0000;
/// Intercept every keyboard stroke.
pub const FILTER_KEY_ALL: Filter = 0xFFFF;
/// Key-down strokes.
pub const FILTER_KEY_DOWN: Filter = KEY_UP;
/// Key-up strokes.
pub const FILTER_KEY_UP: Filter = KEY_UP << 1;
/// Strokes carrying the E0 prefix.
pub const FILTER_KEY_E0: Filter = crate::stroke::KEY_E0 << 1;
/// Strokes carrying the E1 prefix.
pub const FILTER_KEY_E1: Filter = crate::stroke::KEY_E1 << 1;
/// Terminal server LED updates.
pub const FILTER_KEY_TERMSRV_SET_LED: Filter = crate::stroke::KEY_TERMSRV_SET_LED << 1;
/// Terminal server shadow strokes.
pub const FILTER_KEY_TERMSRV_SHADOW: Filter = crate::stroke::KEY_TERMSRV_SHADOW << 1;
/// Terminal server VK packets.
pub const FILTER_KEY_TERMSRV_VKPACKET: Filter = crate::stroke::KEY_TERMSRV_VKPACKET << 1;

// Mouse filters
/// Intercept nothing.
pub const FILTER_MOUSE_NONE: Filter = 0x0000;
/// Intercept every mouse stroke.
pub const FILTER_MOUSE_ALL: Filter = 0xFFFF;
/// Left button pressed.
pub const FILTER_MOUSE_LEFT_BUTTON_DOWN: Filter = crate::stroke::MOUSE_LEFT_BUTTON_DOWN;
/// Left button released.
pub const FILTER_MOUSE_LEFT_BUTTON_UP: Filter = crate::stroke::MOUSE_LEFT_BUTTON_UP;
/// Right button pressed.
pub const FILTER_MOUSE_RIGHT_BUTTON_DOWN: Filter = crate::stroke::MOUSE_RIGHT_BUTTON_DOWN;
/// Right button released.
pub const FILTER_MOUSE_RIGHT_BUTTON_UP: Filter = crate::stroke::MOUSE_RIGHT_BUTTON_UP;
/// Middle button pressed.
pub const FILTER_MOUSE_MIDDLE_BUTTON_DOWN: Filter = crate::stroke::MOUSE_MIDDLE_BUTTON_DOWN;
/// Middle button released.
pub const FILTER_MOUSE_MIDDLE_BUTTON_UP: Filter = crate::stroke::MOUSE_MIDDLE_BUTTON_UP;
/// Button 4 pressed.
pub const FILTER_MOUSE_BUTTON_4_DOWN: Filter = crate::stroke::MOUSE_BUTTON_4_DOWN;
/// Button 4 released.
pub const FILTER_MOUSE_BUTTON_4_UP: Filter = crate::stroke::MOUSE_BUTTON_4_UP;
/// Button 5 pressed.
pub const FILTER_MOUSE_BUTTON_5_DOWN: Filter = crate::stroke::MOUSE_BUTTON_5_DOWN;
/// Button 5 released.
pub const FILTER_MOUSE_BUTTON_5_UP: Filter = crate::stroke::MOUSE_BUTTON_5_UP;
/// Vertical wheel.
pub const FILTER_MOUSE_WHEEL: Filter = crate::stroke::MOUSE_WHEEL;
/// Horizontal wheel.
pub const FILTER_MOUSE_HWHEEL: Filter = crate::stroke::MOUSE_HWHEEL;
/// Pointer movement.
pub const FILTER_MOUSE_MOVE: Filter = 0x1000;

/// All button transition bits.
pub const FILTER_MOUSE_BUTTONS: Filter = FILTER_MOUSE_LEFT_BUTTON_DOWN
    | FILTER_MOUSE_LEFT_BUTTON_UP
    | FILTER_MOUSE_RIGHT_BUTTON_DOWN
    | FILTER_MOUSE_RIGHT_BUTTON_UP
    | FILTER_MOUSE_MIDDLE_BUTTON_DOWN
    | FILTER_MOUSE_MIDDLE_BUTTON_UP
    | FILTER_MOUSE_BUTTON_4_DOWN
    | FILTER_MOUSE_BUTTON_4_UP
    | FILTER_MOUSE_BUTTON_5_DOWN
    | FILTER_MOUSE_BUTTON_5_UP;

/// Filter bits a keyboard stroke falls under.
pub fn key_filter_bits(stroke: &KeyStroke) -> Filter {
    let transition = if stroke.state & KEY_UP != 0 {
        FILTER_KEY_UP
    } else {
        FILTER_KEY_DOWN
    };
    transition | ((stroke.state & !KEY_UP) << 1)
}

/// Filter bits a mouse stroke falls under.
pub fn mouse_filter_bits(stroke: &MouseStroke) -> Filter {
    let mut bits = stroke.state & (FILTER_MOUSE_BUTTONS | FILTER_MOUSE_WHEEL | FILTER_MOUSE_HWHEEL);
    if stroke.x != 0 || stroke.y != 0 || stroke.flags & MOUSE_MOVE_ABSOLUTE != 0 {
        bits |= FILTER_MOUSE_MOVE;
    }
    bits
}

/// Whether `filter` selects `stroke` for interception.
pub fn matches(filter: Filter, stroke: &Stroke) -> bool {
    let bits = match stroke {
        Stroke::Keyboard(key) => key_filter_bits(key),
        Stroke::Mouse(mouse) => mouse_filter_bits(mouse),
    };
    filter & bits != 0
}
