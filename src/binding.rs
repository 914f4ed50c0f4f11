//! The driver binding boundary.
//!
//! A [`Binding`] is the raw, untyped surface of the interception driver: the
//! same operations its user-mode library exports, with raw context handles and
//! integer device ids. The typed API in [`crate::context`] validates arguments
//! and state before anything reaches a binding.
//!
//! Bindings are obtained through a [`Loader`] and unloaded when dropped.

use crate::device::Device;
use crate::error::Result;
use crate::stroke::RawStroke;

/// Raw device id meaning "no device".
pub const NO_DEVICE: i32 = 0;

/// Opaque driver-side context handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawContext(pub usize);

/// Raw operations exposed by the interception driver.
///
/// Implementations need not validate handles or device ids; callers in this
/// crate never pass a destroyed handle or an out-of-range device.
pub trait Binding: Send + Sync {
    /// Allocate a driver context. `None` if the driver refused.
    fn create_context(&self) -> Option<RawContext>;

    /// Release a driver context.
    fn destroy_context(&self, context: RawContext);

    /// Precedence of `context` on `device`.
    fn get_precedence(&self, context: RawContext, device: i32) -> i32;

    /// Set the precedence of `context` on `device`.
    fn set_precedence(&self, context: RawContext, device: i32, precedence: i32);

    /// Filter of `context` on `device`.
    fn get_filter(&self, context: RawContext, device: i32) -> u16;

    /// Set `filter` on every device for which `predicate` holds.
    fn set_filter(&self, context: RawContext, predicate: &dyn Fn(i32) -> bool, filter: u16);

    /// Block until a device has pending strokes. Returns [`NO_DEVICE`] on failure.
    fn wait(&self, context: RawContext) -> i32;

    /// Like [`Binding::wait`], returning [`NO_DEVICE`] once `milliseconds` elapse.
    fn wait_with_timeout(&self, context: RawContext, milliseconds: u32) -> i32;

    /// Inject strokes as if they came from `device`. Returns the number accepted.
    fn send(&self, context: RawContext, device: i32, strokes: &[RawStroke]) -> usize;

    /// Drain pending strokes of `device` into `strokes`. Returns the number written.
    fn receive(&self, context: RawContext, device: i32, strokes: &mut [RawStroke]) -> usize;

    /// Write the UTF-16LE hardware id of `device` into `buffer`.
    ///
    /// Returns the number of bytes written, 0 when the slot has no hardware.
    fn get_hardware_id(&self, context: RawContext, device: i32, buffer: &mut [u8]) -> usize;

    /// Whether `device` is outside the slot range.
    fn is_invalid(&self, device: i32) -> bool {
        Device::from_raw(device).is_invalid()
    }

    /// Whether `device` is a keyboard slot.
    fn is_keyboard(&self, device: i32) -> bool {
        Device::from_raw(device).is_keyboard()
    }

    /// Whether `device` is a mouse slot.
    fn is_mouse(&self, device: i32) -> bool {
        Device::from_raw(device).is_mouse()
    }
}

/// Produces a [`Binding`].
///
/// Called by [`crate::Interceptor::initialize`]; a failed load can be retried.
pub trait Loader: Send + Sync {
    /// Load the binding.
    fn load(&self) -> Result<Box<dyn Binding>>;
}

/// Implement Loader for closures.
impl<F> Loader for F
where
    F: Fn() -> Result<Box<dyn Binding>> + Send + Sync,
{
    fn load(&self) -> Result<Box<dyn Binding>> {
        self()
    }
}
