//! Waiting for, receiving and injecting strokes.
//!
//! The typical loop: [`Context::wait`] blocks until a filtered device has
//! pending strokes, [`Context::receive`] drains them, and [`Context::send`]
//! forwards them (possibly rewritten) back into the input stream. Strokes that
//! are received and not sent back are suppressed.
//!
//! ```no_run
//! # fn pump(context: &mut interceptor::Context) -> interceptor::Result<()> {
//! use interceptor::{is_keyboard, FILTER_KEY_ALL};
//!
//! context.set_filter(is_keyboard, FILTER_KEY_ALL)?;
//! loop {
//!     let device = context.wait()?;
//!     let strokes = context.receive(device, 32)?;
//!     context.send(device, &strokes)?;
//! }
//! # }
//! ```

use crate::binding::NO_DEVICE;
use crate::context::Context;
use crate::device::Device;
use crate::error::{Error, Result};
use crate::stroke::{self, RawStroke, Stroke};
use std::time::Duration;

/// Longest timeout handed to the driver. `u32::MAX` means "forever" there.
const MAX_TIMEOUT_MS: u32 = u32::MAX - 1;

/// Most strokes a single [`Context::receive`] call drains.
///
/// Larger requests are clamped; the remainder stays queued. Use
/// [`Context::receive_raw`] with a caller-owned buffer to go beyond it.
pub const MAX_RECEIVE_BATCH: usize = 4096;

/// Outcome of [`Context::wait_timeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    /// A device has pending strokes.
    Ready(Device),
    /// The timeout elapsed first.
    TimedOut,
}

impl WaitResult {
    /// The ready device, if any.
    pub fn device(self) -> Option<Device> {
        match self {
            WaitResult::Ready(device) => Some(device),
            WaitResult::TimedOut => None,
        }
    }

    /// Whether the wait timed out.
    pub fn is_timed_out(self) -> bool {
        self == WaitResult::TimedOut
    }

    /// Convert a timeout into [`Error::Timeout`].
    pub fn into_result(self) -> Result<Device> {
        self.device().ok_or(Error::Timeout)
    }
}

fn timeout_millis(timeout: Duration) -> u32 {
    u32::try_from(timeout.as_millis())
        .unwrap_or(MAX_TIMEOUT_MS)
        .min(MAX_TIMEOUT_MS)
}

impl Context {
    /// Block until a filtered device has pending strokes.
    ///
    /// Blocks indefinitely. Only one thread may wait on a context at a time.
    pub fn wait(&mut self) -> Result<Device> {
        let device = self.binding()?.wait(self.raw());
        if device == NO_DEVICE {
            return Err(Error::Platform("wait returned no device".into()));
        }
        Ok(Device::from_raw(device))
    }

    /// Like [`Context::wait`], giving up after `timeout`.
    ///
    /// A zero timeout polls once and returns.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Result<WaitResult> {
        let device = self
            .binding()?
            .wait_with_timeout(self.raw(), timeout_millis(timeout));
        if device == NO_DEVICE {
            Ok(WaitResult::TimedOut)
        } else {
            Ok(WaitResult::Ready(Device::from_raw(device)))
        }
    }

    /// Inject strokes into the input stream as if they came from `device`.
    ///
    /// Returns the number of strokes the driver accepted, which may be fewer
    /// than requested. Every stroke must match the class of `device`.
    pub fn send(&self, device: Device, strokes: &[Stroke]) -> Result<usize> {
        let binding = self.device_binding(device)?;
        let raw = stroke::encode_batch(device, strokes)?;
        if raw.is_empty() {
            return Ok(0);
        }

        let sent = binding.send(self.raw(), device.raw(), &raw).min(raw.len());
        if sent < raw.len() {
            log::debug!(
                "context {:?}: device {} accepted {} of {} strokes",
                self.raw(),
                device,
                sent,
                raw.len()
            );
        }
        Ok(sent)
    }

    /// Like [`Context::send`], failing with [`Error::PartialTransfer`] unless
    /// every stroke was accepted.
    pub fn send_all(&self, device: Device, strokes: &[Stroke]) -> Result<()> {
        let sent = self.send(device, strokes)?;
        if sent < strokes.len() {
            log::warn!(
                "context {:?}: partial send on device {}: {} of {}",
                self.raw(),
                device,
                sent,
                strokes.len()
            );
            return Err(Error::PartialTransfer {
                requested: strokes.len(),
                transferred: sent,
            });
        }
        Ok(())
    }

    /// Drain up to `capacity` pending strokes of `device`, at most
    /// [`MAX_RECEIVE_BATCH`].
    ///
    /// Does not block; an empty vector means nothing was pending.
    pub fn receive(&self, device: Device, capacity: usize) -> Result<Vec<Stroke>> {
        let mut raw = vec![RawStroke::default(); capacity.min(MAX_RECEIVE_BATCH)];
        let received = self.receive_raw(device, &mut raw)?;
        raw.truncate(received);
        stroke::decode_batch(device, &raw)
    }

    /// Drain pending strokes of `device` into a caller-owned wire buffer.
    ///
    /// Returns the number of strokes written to the front of `buffer`.
    pub fn receive_raw(&self, device: Device, buffer: &mut [RawStroke]) -> Result<usize> {
        let binding = self.device_binding(device)?;
        if buffer.is_empty() {
            return Ok(0);
        }
        Ok(binding
            .receive(self.raw(), device.raw(), buffer)
            .min(buffer.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::is_keyboard;
    use crate::filter::{FILTER_KEY_ALL, FILTER_KEY_DOWN, FILTER_MOUSE_ALL};
    use crate::simulator::SimulatedDriver;
    use crate::stroke::{KeyStroke, MouseStroke};
    use crate::Interceptor;
    use std::thread;
    use std::time::Instant;

    fn interceptor(driver: &SimulatedDriver) -> Interceptor {
        let interceptor = driver.interceptor();
        interceptor.initialize().unwrap();
        interceptor
    }

    #[test]
    fn test_send_wait_receive() {
        let driver = SimulatedDriver::new();
        let interceptor = interceptor(&driver);
        let mut context = interceptor.create_context().unwrap();
        let keyboard = Device::keyboard(0);

        context.set_device_filter(keyboard, FILTER_KEY_DOWN).unwrap();
        let stroke = KeyStroke {
            code: 0x1E,
            state: 0,
            information: 42,
        };
        assert_eq!(context.send(keyboard, &[stroke.into()]).unwrap(), 1);

        assert_eq!(context.wait().unwrap(), keyboard);
        let received = context.receive(keyboard, 8).unwrap();
        assert_eq!(received, vec![Stroke::Keyboard(stroke)]);
        assert!(context.receive(keyboard, 8).unwrap().is_empty());
    }

    #[test]
    fn test_wait_timeout_zero_returns_promptly() {
        let driver = SimulatedDriver::new();
        let interceptor = interceptor(&driver);
        let mut context = interceptor.create_context().unwrap();
        context.set_filter(is_keyboard, FILTER_KEY_ALL).unwrap();

        let start = Instant::now();
        let result = context.wait_timeout(Duration::ZERO).unwrap();
        assert_eq!(result, WaitResult::TimedOut);
        assert!(start.elapsed() < Duration::from_millis(500));
        assert!(matches!(result.into_result(), Err(Error::Timeout)));
    }

    #[test]
    fn test_wait_timeout_elapses() {
        let driver = SimulatedDriver::new();
        let interceptor = interceptor(&driver);
        let mut context = interceptor.create_context().unwrap();

        let start = Instant::now();
        let result = context.wait_timeout(Duration::from_millis(50)).unwrap();
        assert!(result.is_timed_out());
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_wait_wakes_on_input() {
        let driver = SimulatedDriver::new();
        let interceptor = interceptor(&driver);
        let mut context = interceptor.create_context().unwrap();
        let mouse = Device::mouse(0);
        context.set_device_filter(mouse, FILTER_MOUSE_ALL).unwrap();

        let emitter = driver.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            emitter
                .emit(mouse, MouseStroke::relative_move(5, -5).into())
                .unwrap();
        });

        let result = context.wait_timeout(Duration::from_secs(5)).unwrap();
        handle.join().unwrap();
        assert_eq!(result, WaitResult::Ready(mouse));
        assert_eq!(
            context.receive(mouse, 4).unwrap(),
            vec![Stroke::Mouse(MouseStroke::relative_move(5, -5))]
        );
    }

    #[test]
    fn test_unfiltered_input_passes_through() {
        let driver = SimulatedDriver::new();
        let interceptor = interceptor(&driver);
        let mut context = interceptor.create_context().unwrap();
        let keyboard = Device::keyboard(0);
        context.set_device_filter(keyboard, FILTER_KEY_DOWN).unwrap();

        driver.emit(keyboard, KeyStroke::up(0x1E).into()).unwrap();
        assert!(context.wait_timeout(Duration::ZERO).unwrap().is_timed_out());
        assert_eq!(
            driver.passed_through(),
            vec![(keyboard, Stroke::Keyboard(KeyStroke::up(0x1E)))]
        );
    }

    #[test]
    fn test_higher_precedence_sees_stroke_first() {
        let driver = SimulatedDriver::new();
        let interceptor = interceptor(&driver);
        let mut low = interceptor.create_context().unwrap();
        let mut high = interceptor.create_context().unwrap();
        let keyboard = Device::keyboard(0);

        for context in [&low, &high] {
            context.set_device_filter(keyboard, FILTER_KEY_ALL).unwrap();
        }
        high.set_precedence(keyboard, 10).unwrap();
        low.set_precedence(keyboard, 1).unwrap();

        driver.emit(keyboard, KeyStroke::down(0x10).into()).unwrap();
        assert!(low.wait_timeout(Duration::ZERO).unwrap().is_timed_out());
        assert_eq!(high.wait().unwrap(), keyboard);

        // Forwarding a received stroke hands it to the next context down.
        let strokes = high.receive(keyboard, 4).unwrap();
        assert_eq!(high.send(keyboard, &strokes).unwrap(), 1);
        assert!(high.wait_timeout(Duration::ZERO).unwrap().is_timed_out());
        assert_eq!(low.wait().unwrap(), keyboard);

        // The last context forwards to the system.
        let strokes = low.receive(keyboard, 4).unwrap();
        low.send_all(keyboard, &strokes).unwrap();
        assert_eq!(driver.passed_through(), vec![(keyboard, strokes[0])]);
    }

    #[test]
    fn test_wait_returns_lowest_ready_device() {
        let driver = SimulatedDriver::new();
        let interceptor = interceptor(&driver);
        let mut context = interceptor.create_context().unwrap();
        context.set_filter(|_| true, FILTER_KEY_ALL).unwrap();

        driver.emit(Device::mouse(0), MouseStroke::relative_move(1, 1).into()).unwrap();
        driver.emit(Device::keyboard(0), KeyStroke::down(0x02).into()).unwrap();

        assert_eq!(context.wait().unwrap(), Device::keyboard(0));
        context.receive(Device::keyboard(0), 4).unwrap();
        assert_eq!(context.wait().unwrap(), Device::mouse(0));
    }

    #[test]
    fn test_partial_send() {
        let driver = SimulatedDriver::new().with_queue_limit(2);
        let interceptor = interceptor(&driver);
        let context = interceptor.create_context().unwrap();
        let keyboard = Device::keyboard(0);
        context.set_device_filter(keyboard, FILTER_KEY_ALL).unwrap();

        let strokes: Vec<Stroke> = (0..3).map(|code| KeyStroke::down(code).into()).collect();
        assert_eq!(context.send(keyboard, &strokes).unwrap(), 2);

        let err = context.send_all(keyboard, &strokes).unwrap_err();
        assert!(matches!(
            err,
            Error::PartialTransfer {
                requested: 3,
                transferred: 0
            }
        ));
    }

    #[test]
    fn test_receive_respects_capacity() {
        let driver = SimulatedDriver::new();
        let interceptor = interceptor(&driver);
        let context = interceptor.create_context().unwrap();
        let keyboard = Device::keyboard(0);
        context.set_device_filter(keyboard, FILTER_KEY_ALL).unwrap();

        for code in 0..5 {
            driver.emit(keyboard, KeyStroke::down(code).into()).unwrap();
        }
        assert_eq!(context.receive(keyboard, 3).unwrap().len(), 3);
        assert_eq!(context.receive(keyboard, 0).unwrap().len(), 0);
        assert_eq!(context.receive(keyboard, 10).unwrap().len(), 2);
    }

    #[test]
    fn test_receive_clamps_huge_capacity() {
        let driver = SimulatedDriver::new();
        let interceptor = interceptor(&driver);
        let context = interceptor.create_context().unwrap();
        let keyboard = Device::keyboard(0);
        context.set_device_filter(keyboard, FILTER_KEY_ALL).unwrap();

        for code in 0..3 {
            driver.emit(keyboard, KeyStroke::down(code).into()).unwrap();
        }
        let strokes = context.receive(keyboard, usize::MAX).unwrap();
        assert_eq!(strokes.len(), 3);
        assert_eq!(strokes[2], Stroke::from(KeyStroke::down(2)));
    }

    #[test]
    fn test_send_rejects_wrong_stroke_kind() {
        let driver = SimulatedDriver::new();
        let interceptor = interceptor(&driver);
        let context = interceptor.create_context().unwrap();

        let err = context
            .send(Device::keyboard(0), &[MouseStroke::relative_move(1, 1).into()])
            .unwrap_err();
        assert!(matches!(err, Error::DeviceClassMismatch { device: 1, .. }));
        assert!(matches!(
            context.send(Device::from_raw(0), &[KeyStroke::down(1).into()]),
            Err(Error::InvalidDevice(0))
        ));
        assert!(matches!(
            context.receive(Device::from_raw(21), 1),
            Err(Error::InvalidDevice(21))
        ));
    }

    #[test]
    fn test_pipe_after_destroy() {
        let driver = SimulatedDriver::new();
        let interceptor = interceptor(&driver);
        let mut context = interceptor.create_context().unwrap();
        context.destroy().unwrap();

        assert!(matches!(context.wait(), Err(Error::InvalidHandle)));
        assert!(matches!(
            context.wait_timeout(Duration::ZERO),
            Err(Error::InvalidHandle)
        ));
        assert!(matches!(
            context.receive(Device::keyboard(0), 1),
            Err(Error::InvalidHandle)
        ));
    }

    #[test]
    fn test_timeout_millis_clamps() {
        assert_eq!(timeout_millis(Duration::ZERO), 0);
        assert_eq!(timeout_millis(Duration::from_millis(250)), 250);
        assert_eq!(timeout_millis(Duration::MAX), MAX_TIMEOUT_MS);
    }
}
