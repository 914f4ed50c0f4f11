//! Interception contexts and their per-device configuration.
//!
//! A [`Context`] is a session with the driver. For each of the 20 device slots
//! it holds a [`Filter`] (which strokes to intercept) and a [`Precedence`]
//! (where it ranks against other contexts filtering the same device). The
//! configuration lives until changed or until the context is destroyed.
//!
//! The blocking event operations (`wait`, `send`, `receive`) live in
//! [`crate::pipe`].
//!
//! # Lifecycle
//!
//! Contexts are created by [`crate::Interceptor::create_context`] and destroyed
//! exactly once, either explicitly with [`Context::destroy`] or on drop. Every
//! operation on a destroyed context fails with [`Error::InvalidHandle`];
//! operations after the interceptor was disposed fail with
//! [`Error::NotInitialized`].
//!
//! `destroy` and the waits take `&mut self`, so a context cannot be destroyed
//! while a wait on it is in flight. Sharing a context across threads behind a
//! lock keeps that guarantee; the lock holder is the single consumer.

use crate::binding::{Binding, RawContext};
use crate::device::{self, Device, DeviceData, HARDWARE_ID_CAPACITY};
use crate::error::{Error, Result};
use crate::filter::{Filter, Precedence};
use crate::interceptor::Session;
use std::sync::Arc;

/// A driver session.
pub struct Context {
    raw: RawContext,
    session: Arc<Session>,
    destroyed: bool,
}

impl Context {
    pub(crate) fn new(raw: RawContext, session: Arc<Session>) -> Self {
        Self {
            raw,
            session,
            destroyed: false,
        }
    }

    /// The driver-side handle.
    pub fn raw(&self) -> RawContext {
        self.raw
    }

    /// Whether [`Context::destroy`] has been called.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub(crate) fn binding(&self) -> Result<&dyn Binding> {
        if self.destroyed {
            return Err(Error::InvalidHandle);
        }
        if !self.session.is_live() {
            return Err(Error::NotInitialized);
        }
        Ok(self.session.binding())
    }

    pub(crate) fn device_binding(&self, device: Device) -> Result<&dyn Binding> {
        let binding = self.binding()?;
        if device.is_invalid() || binding.is_invalid(device.raw()) {
            return Err(Error::InvalidDevice(device.raw()));
        }
        Ok(binding)
    }

    /// Whether the driver considers `device` invalid.
    pub fn is_invalid(&self, device: Device) -> Result<bool> {
        Ok(self.binding()?.is_invalid(device.raw()))
    }

    /// Whether the driver considers `device` a keyboard.
    pub fn is_keyboard(&self, device: Device) -> Result<bool> {
        Ok(self.binding()?.is_keyboard(device.raw()))
    }

    /// Whether the driver considers `device` a mouse.
    pub fn is_mouse(&self, device: Device) -> Result<bool> {
        Ok(self.binding()?.is_mouse(device.raw()))
    }

    /// Precedence of this context on `device`.
    pub fn precedence(&self, device: Device) -> Result<Precedence> {
        let binding = self.device_binding(device)?;
        Ok(binding.get_precedence(self.raw, device.raw()))
    }

    /// Set the precedence of this context on `device`.
    ///
    /// Higher precedence sees strokes first. The order between equal
    /// precedences is up to the driver.
    pub fn set_precedence(&self, device: Device, precedence: Precedence) -> Result<()> {
        let binding = self.device_binding(device)?;
        binding.set_precedence(self.raw, device.raw(), precedence);
        Ok(())
    }

    /// Filter of this context on `device`.
    pub fn filter(&self, device: Device) -> Result<Filter> {
        let binding = self.device_binding(device)?;
        Ok(binding.get_filter(self.raw, device.raw()))
    }

    /// Apply `filter` to every device slot for which `predicate` holds.
    ///
    /// ```no_run
    /// # fn demo(context: &interceptor::Context) -> interceptor::Result<()> {
    /// use interceptor::{is_keyboard, FILTER_KEY_DOWN};
    ///
    /// context.set_filter(is_keyboard, FILTER_KEY_DOWN)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn set_filter<P>(&self, predicate: P, filter: Filter) -> Result<()>
    where
        P: Fn(Device) -> bool,
    {
        let binding = self.binding()?;
        let raw_predicate = |id: i32| {
            let device = Device::from_raw(id);
            !device.is_invalid() && predicate(device)
        };
        binding.set_filter(self.raw, &raw_predicate, filter);
        log::debug!("context {:?}: filter set to {:#06x}", self.raw, filter);
        Ok(())
    }

    /// Apply `filter` to a single device.
    pub fn set_device_filter(&self, device: Device, filter: Filter) -> Result<()> {
        self.device_binding(device)?;
        self.set_filter(|candidate| candidate == device, filter)
    }

    /// Hardware id of the device behind `device`, empty when there is none.
    pub fn hardware_id(&self, device: Device) -> Result<String> {
        let mut buffer = vec![0u8; HARDWARE_ID_CAPACITY * 2];
        let length = self.hardware_id_into(device, &mut buffer)?;
        Ok(device::decode_hardware_id(&buffer[..length]))
    }

    pub(crate) fn hardware_id_into(&self, device: Device, buffer: &mut [u8]) -> Result<usize> {
        let binding = self.device_binding(device)?;
        let length = binding.get_hardware_id(self.raw, device.raw(), buffer);
        Ok(length.min(buffer.len()))
    }

    /// Devices with hardware behind them, see [`device::enumerate`].
    pub fn devices(&self, predicate: Option<&dyn Fn(Device) -> bool>) -> Result<Vec<DeviceData>> {
        device::enumerate(self, predicate)
    }

    /// Release the driver context.
    ///
    /// Fails with [`Error::InvalidHandle`] when called a second time. Works
    /// after the interceptor has been disposed so contexts can always be
    /// released.
    pub fn destroy(&mut self) -> Result<()> {
        if self.destroyed {
            return Err(Error::InvalidHandle);
        }
        self.session.binding().destroy_context(self.raw);
        self.destroyed = true;
        log::debug!("context {:?} destroyed", self.raw);
        Ok(())
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        if !self.destroyed {
            let _ = self.destroy();
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("raw", &self.raw)
            .field("destroyed", &self.destroyed)
            .finish()
    }
}
