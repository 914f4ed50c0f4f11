//! An in-process stand-in for the interception driver.
//!
//! [`SimulatedDriver`] implements [`Binding`] entirely in memory so the typed
//! API can be exercised without the kernel driver, on any platform. It keeps
//! the driver's observable contract:
//!
//! - each context holds a filter and a precedence per device slot (default 0);
//! - a stroke is offered to contexts in precedence order (highest first, equal
//!   precedences in creation order) and queued on the first whose filter
//!   matches it; when none does it reaches the system, recorded in
//!   [`SimulatedDriver::passed_through`];
//! - waits block on a condition variable until a stroke is queued for the
//!   context, the timeout elapses, or the context is destroyed.
//!
//! Strokes a context sends back after receiving them are forwarded to the
//! contexts ranked below it. Strokes sent beyond what it received are new
//! input and start from the top, which is how a context can observe input it
//! synthesized itself.
//!
//! Physical input is fed in with [`SimulatedDriver::emit`].

use crate::binding::{Binding, NO_DEVICE, RawContext};
use crate::device::{Device, MAX_DEVICE};
use crate::error::{Error, Result};
use crate::filter::{self, Filter, Precedence};
use crate::interceptor::Interceptor;
use crate::stroke::{RawStroke, Stroke};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

const SLOTS: usize = MAX_DEVICE as usize;

/// Hardware id of the keyboard attached by [`SimulatedDriver::new`].
pub const SIMULATED_KEYBOARD_ID: &str = "HID\\VID_0000&PID_0001&REV_0001";
/// Hardware id of the mouse attached by [`SimulatedDriver::new`].
pub const SIMULATED_MOUSE_ID: &str = "HID\\VID_0000&PID_0002&REV_0001";

#[derive(Default)]
struct ContextState {
    precedence: [Precedence; SLOTS],
    filter: [Filter; SLOTS],
    queues: [VecDeque<RawStroke>; SLOTS],
    // Strokes received and not yet sent back, per device.
    credit: [usize; SLOTS],
}

impl ContextState {
    fn first_ready(&self) -> Option<usize> {
        self.queues.iter().position(|queue| !queue.is_empty())
    }
}

struct DriverState {
    next_handle: usize,
    // Keyed by handle; handles grow, so iteration follows creation order.
    contexts: BTreeMap<usize, ContextState>,
    hardware_ids: [Option<String>; SLOTS],
    passed_through: Vec<(Device, RawStroke)>,
    queue_limit: Option<usize>,
}

impl DriverState {
    /// Offer a stroke to the contexts ranked after `after` (all when `None`).
    ///
    /// Returns `false` when the receiving context's queue is full.
    fn deliver(&mut self, device: Device, raw: RawStroke, after: Option<usize>) -> bool {
        let (Some(slot), Some(class)) = (device.slot(), device.class()) else {
            return false;
        };
        let stroke = raw.decode(class);

        let mut ranked: Vec<(Precedence, usize)> = self
            .contexts
            .iter()
            .map(|(&handle, state)| (state.precedence[slot], handle))
            .collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        let start = match after {
            Some(sender) => ranked
                .iter()
                .position(|&(_, handle)| handle == sender)
                .map_or(0, |index| index + 1),
            None => 0,
        };

        let target = ranked[start..].iter().find_map(|&(_, handle)| {
            let mask = self.contexts.get(&handle)?.filter[slot];
            filter::matches(mask, &stroke).then_some(handle)
        });

        match target.and_then(|handle| self.contexts.get_mut(&handle)) {
            Some(state) => {
                let queue = &mut state.queues[slot];
                if self.queue_limit.is_some_and(|limit| queue.len() >= limit) {
                    return false;
                }
                queue.push_back(raw);
                true
            }
            None => {
                self.passed_through.push((device, raw));
                true
            }
        }
    }
}

struct Shared {
    state: Mutex<DriverState>,
    ready: Condvar,
}

/// In-memory interception driver.
///
/// Cloning yields another handle to the same driver.
#[derive(Clone)]
pub struct SimulatedDriver {
    shared: Arc<Shared>,
}

impl Default for SimulatedDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedDriver {
    /// A driver with one keyboard in slot 1 and one mouse in slot 11.
    pub fn new() -> Self {
        let driver = Self::empty();
        driver.attach(Device::keyboard(0), SIMULATED_KEYBOARD_ID);
        driver.attach(Device::mouse(0), SIMULATED_MOUSE_ID);
        driver
    }

    /// A driver with no hardware attached.
    pub fn empty() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(DriverState {
                    next_handle: 1,
                    contexts: BTreeMap::new(),
                    hardware_ids: Default::default(),
                    passed_through: Vec::new(),
                    queue_limit: None,
                }),
                ready: Condvar::new(),
            }),
        }
    }

    /// Cap every per-context, per-device queue at `limit` strokes.
    ///
    /// Strokes arriving at a full queue are refused, which makes `send`
    /// report a partial transfer.
    pub fn with_queue_limit(self, limit: usize) -> Self {
        self.lock().queue_limit = Some(limit);
        self
    }

    fn lock(&self) -> MutexGuard<'_, DriverState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// An [`Interceptor`] whose loader hands out this driver.
    pub fn interceptor(&self) -> Interceptor {
        let driver = self.clone();
        Interceptor::new(move || -> Result<Box<dyn Binding>> { Ok(Box::new(driver.clone())) })
    }

    /// Put hardware with the given id behind `device`.
    pub fn attach(&self, device: Device, hardware_id: impl Into<String>) {
        if let Some(slot) = device.slot() {
            self.lock().hardware_ids[slot] = Some(hardware_id.into());
        }
    }

    /// Remove the hardware behind `device`.
    pub fn detach(&self, device: Device) {
        if let Some(slot) = device.slot() {
            self.lock().hardware_ids[slot] = None;
        }
    }

    /// Feed a stroke in as if the physical device produced it.
    pub fn emit(&self, device: Device, stroke: Stroke) -> Result<()> {
        let raw = crate::stroke::encode_batch(device, &[stroke])?;
        let mut state = self.lock();
        for raw in raw {
            if !state.deliver(device, raw, None) {
                return Err(Error::PartialTransfer {
                    requested: 1,
                    transferred: 0,
                });
            }
        }
        drop(state);
        self.shared.ready.notify_all();
        Ok(())
    }

    /// Strokes that no context intercepted, in arrival order.
    pub fn passed_through(&self) -> Vec<(Device, Stroke)> {
        self.lock()
            .passed_through
            .iter()
            .filter_map(|(device, raw)| Some((*device, raw.decode(device.class()?))))
            .collect()
    }

    /// Number of live contexts.
    pub fn context_count(&self) -> usize {
        self.lock().contexts.len()
    }

    fn wait_until(&self, context: RawContext, deadline: Option<Instant>) -> i32 {
        let mut state = self.lock();
        loop {
            let Some(context_state) = state.contexts.get(&context.0) else {
                return NO_DEVICE;
            };
            if let Some(slot) = context_state.first_ready() {
                return slot as i32 + 1;
            }

            state = match deadline {
                None => self
                    .shared
                    .ready
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return NO_DEVICE;
                    }
                    self.shared
                        .ready
                        .wait_timeout(state, remaining)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }
}

impl Binding for SimulatedDriver {
    fn create_context(&self) -> Option<RawContext> {
        let mut state = self.lock();
        let handle = state.next_handle;
        state.next_handle += 1;
        state.contexts.insert(handle, ContextState::default());
        Some(RawContext(handle))
    }

    fn destroy_context(&self, context: RawContext) {
        self.lock().contexts.remove(&context.0);
        self.shared.ready.notify_all();
    }

    fn get_precedence(&self, context: RawContext, device: i32) -> i32 {
        let Some(slot) = Device::from_raw(device).slot() else {
            return 0;
        };
        self.lock()
            .contexts
            .get(&context.0)
            .map_or(0, |state| state.precedence[slot])
    }

    fn set_precedence(&self, context: RawContext, device: i32, precedence: i32) {
        let Some(slot) = Device::from_raw(device).slot() else {
            return;
        };
        if let Some(state) = self.lock().contexts.get_mut(&context.0) {
            state.precedence[slot] = precedence;
        }
    }

    fn get_filter(&self, context: RawContext, device: i32) -> u16 {
        let Some(slot) = Device::from_raw(device).slot() else {
            return 0;
        };
        self.lock()
            .contexts
            .get(&context.0)
            .map_or(0, |state| state.filter[slot])
    }

    fn set_filter(&self, context: RawContext, predicate: &dyn Fn(i32) -> bool, filter: u16) {
        // The predicate may call back into this driver; run it unlocked.
        let slots: Vec<usize> = Device::all()
            .filter(|device| predicate(device.raw()))
            .filter_map(Device::slot)
            .collect();

        let mut state = self.lock();
        if let Some(context_state) = state.contexts.get_mut(&context.0) {
            for slot in slots {
                context_state.filter[slot] = filter;
            }
        }
    }

    fn wait(&self, context: RawContext) -> i32 {
        self.wait_until(context, None)
    }

    fn wait_with_timeout(&self, context: RawContext, milliseconds: u32) -> i32 {
        let deadline = Instant::now() + Duration::from_millis(u64::from(milliseconds));
        self.wait_until(context, Some(deadline))
    }

    fn send(&self, context: RawContext, device: i32, strokes: &[RawStroke]) -> usize {
        let device = Device::from_raw(device);
        let Some(slot) = device.slot() else {
            return 0;
        };

        let mut state = self.lock();
        let mut sent = 0;
        for raw in strokes {
            let forwarded = match state.contexts.get_mut(&context.0) {
                Some(sender) if sender.credit[slot] > 0 => {
                    sender.credit[slot] -= 1;
                    true
                }
                _ => false,
            };
            let after = forwarded.then_some(context.0);
            if !state.deliver(device, *raw, after) {
                if forwarded {
                    if let Some(sender) = state.contexts.get_mut(&context.0) {
                        sender.credit[slot] += 1;
                    }
                }
                break;
            }
            sent += 1;
        }
        drop(state);

        if sent > 0 {
            self.shared.ready.notify_all();
        }
        sent
    }

    fn receive(&self, context: RawContext, device: i32, strokes: &mut [RawStroke]) -> usize {
        let Some(slot) = Device::from_raw(device).slot() else {
            return 0;
        };
        let mut state = self.lock();
        let Some(context_state) = state.contexts.get_mut(&context.0) else {
            return 0;
        };

        let mut received = 0;
        for out in strokes.iter_mut() {
            match context_state.queues[slot].pop_front() {
                Some(raw) => {
                    *out = raw;
                    received += 1;
                }
                None => break,
            }
        }
        context_state.credit[slot] += received;
        received
    }

    fn get_hardware_id(&self, context: RawContext, device: i32, buffer: &mut [u8]) -> usize {
        let Some(slot) = Device::from_raw(device).slot() else {
            return 0;
        };
        let state = self.lock();
        if !state.contexts.contains_key(&context.0) {
            return 0;
        }
        let Some(id) = &state.hardware_ids[slot] else {
            return 0;
        };

        let bytes: Vec<u8> = id.encode_utf16().flat_map(u16::to_le_bytes).collect();
        if bytes.len() > buffer.len() {
            return 0;
        }
        buffer[..bytes.len()].copy_from_slice(&bytes);
        bytes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FILTER_KEY_ALL, FILTER_KEY_UP};
    use crate::stroke::KeyStroke;
    use std::thread;

    fn raw_key(code: u16, state: u16) -> RawStroke {
        RawStroke::from_key(&KeyStroke::new(code, state))
    }

    #[test]
    fn test_contexts_are_independent() {
        let driver = SimulatedDriver::new();
        let a = driver.create_context().unwrap();
        let b = driver.create_context().unwrap();
        assert_ne!(a, b);

        driver.set_filter(a, &|device: i32| device == 1, FILTER_KEY_ALL);
        driver.set_precedence(b, 1, 7);
        assert_eq!(driver.get_filter(a, 1), FILTER_KEY_ALL);
        assert_eq!(driver.get_filter(b, 1), 0);
        assert_eq!(driver.get_precedence(a, 1), 0);
        assert_eq!(driver.get_precedence(b, 1), 7);
        assert_eq!(driver.context_count(), 2);
    }

    #[test]
    fn test_equal_precedence_uses_creation_order() {
        let driver = SimulatedDriver::new();
        let first = driver.create_context().unwrap();
        let second = driver.create_context().unwrap();
        for context in [first, second] {
            driver.set_filter(context, &|_: i32| true, FILTER_KEY_ALL);
        }

        assert_eq!(driver.send(second, 1, &[raw_key(0x1E, 0)]), 1);
        assert_eq!(driver.wait_with_timeout(first, 0), 1);
        assert_eq!(driver.wait_with_timeout(second, 0), NO_DEVICE);
    }

    #[test]
    fn test_destroy_wakes_waiter() {
        let driver = SimulatedDriver::new();
        let context = driver.create_context().unwrap();

        let waiter = driver.clone();
        let handle = thread::spawn(move || waiter.wait(context));
        thread::sleep(Duration::from_millis(30));
        driver.destroy_context(context);

        assert_eq!(handle.join().unwrap(), NO_DEVICE);
        assert_eq!(driver.context_count(), 0);
    }

    #[test]
    fn test_hardware_id_buffer_too_small() {
        let driver = SimulatedDriver::new();
        let context = driver.create_context().unwrap();
        let mut small = [0u8; 4];
        assert_eq!(driver.get_hardware_id(context, 1, &mut small), 0);

        let mut buffer = [0u8; 256];
        let length = driver.get_hardware_id(context, 1, &mut buffer);
        assert_eq!(length, SIMULATED_KEYBOARD_ID.len() * 2);
        assert_eq!(driver.get_hardware_id(context, 2, &mut buffer), 0);
    }

    #[test]
    fn test_detach() {
        let driver = SimulatedDriver::new();
        let context = driver.create_context().unwrap();
        driver.detach(Device::keyboard(0));
        let mut buffer = [0u8; 256];
        assert_eq!(driver.get_hardware_id(context, 1, &mut buffer), 0);
    }

    #[test]
    fn test_emit_respects_filter_bits() {
        let driver = SimulatedDriver::new();
        let context = driver.create_context().unwrap();
        driver.set_filter(context, &|device: i32| device == 1, FILTER_KEY_UP);

        driver
            .emit(Device::keyboard(0), KeyStroke::down(0x1E).into())
            .unwrap();
        driver
            .emit(Device::keyboard(0), KeyStroke::up(0x1E).into())
            .unwrap();

        let mut out = [RawStroke::default(); 4];
        assert_eq!(driver.receive(context, 1, &mut out), 1);
        assert_eq!(out[0].to_key(), KeyStroke::up(0x1E));
        assert_eq!(driver.passed_through().len(), 1);
    }
}
