//! Dynamic binding to `interception.dll`.

use super::TempFile;
use crate::binding::{Binding, Loader, RawContext};
use crate::device::Device;
use crate::error::{Error, Result};
use crate::installer::{Resources, driver_library_resource};
use crate::stroke::{self, RawKeyStroke, RawStroke};
use std::cell::Cell;
use std::ffi::{CStr, c_void};
use std::sync::Arc;
use windows::Win32::Foundation::{FreeLibrary, HMODULE};
use windows::Win32::System::LibraryLoader::{GetProcAddress, LoadLibraryW};
use windows::core::{HSTRING, PCSTR};

type CreateContextFn = unsafe extern "C" fn() -> *mut c_void;
type DestroyContextFn = unsafe extern "C" fn(*mut c_void);
type GetPrecedenceFn = unsafe extern "C" fn(*mut c_void, i32) -> i32;
type SetPrecedenceFn = unsafe extern "C" fn(*mut c_void, i32, i32);
type GetFilterFn = unsafe extern "C" fn(*mut c_void, i32) -> u16;
type PredicateFn = unsafe extern "C" fn(i32) -> i32;
type SetFilterFn = unsafe extern "C" fn(*mut c_void, PredicateFn, u16);
type WaitFn = unsafe extern "C" fn(*mut c_void) -> i32;
type WaitWithTimeoutFn = unsafe extern "C" fn(*mut c_void, u32) -> i32;
type SendFn = unsafe extern "C" fn(*mut c_void, i32, *const c_void, u32) -> i32;
type ReceiveFn = unsafe extern "C" fn(*mut c_void, i32, *mut c_void, u32) -> i32;
type GetHardwareIdFn = unsafe extern "C" fn(*mut c_void, i32, *mut c_void, u32) -> u32;
type DeviceQueryFn = unsafe extern "C" fn(i32) -> i32;

thread_local! {
    /// Devices selected by the `set_filter` call in progress on this thread.
    static FILTER_DEVICES: Cell<u32> = const { Cell::new(0) };
}

/// Predicate handed to `interception_set_filter`.
///
/// The driver library calls it synchronously, on the calling thread, once per
/// device slot.
unsafe extern "C" fn selected_device(device: i32) -> i32 {
    let Some(bit) = Device::from_raw(device).slot() else {
        return 0;
    };
    FILTER_DEVICES.with(|mask| (mask.get() >> bit) & 1) as i32
}

struct Exports {
    create_context: CreateContextFn,
    destroy_context: DestroyContextFn,
    get_precedence: GetPrecedenceFn,
    set_precedence: SetPrecedenceFn,
    get_filter: GetFilterFn,
    set_filter: SetFilterFn,
    wait: WaitFn,
    wait_with_timeout: WaitWithTimeoutFn,
    send: SendFn,
    receive: ReceiveFn,
    get_hardware_id: GetHardwareIdFn,
    is_invalid: DeviceQueryFn,
    is_keyboard: DeviceQueryFn,
    is_mouse: DeviceQueryFn,
}

/// Resolve an export and reinterpret it as the function pointer type `T`.
///
/// # Safety
///
/// `T` must be a function pointer type matching the export's signature.
unsafe fn symbol<T: Copy>(module: HMODULE, name: &CStr) -> Result<T> {
    let address = unsafe { GetProcAddress(module, PCSTR::from_raw(name.as_ptr().cast())) };
    match address {
        Some(address) => {
            debug_assert_eq!(std::mem::size_of::<T>(), std::mem::size_of_val(&address));
            Ok(unsafe { std::mem::transmute_copy(&address) })
        }
        None => Err(Error::DriverUnavailable(format!(
            "missing export {}",
            name.to_string_lossy()
        ))),
    }
}

impl Exports {
    unsafe fn resolve(module: HMODULE) -> Result<Self> {
        unsafe {
            Ok(Self {
                create_context: symbol(module, c"interception_create_context")?,
                destroy_context: symbol(module, c"interception_destroy_context")?,
                get_precedence: symbol(module, c"interception_get_precedence")?,
                set_precedence: symbol(module, c"interception_set_precedence")?,
                get_filter: symbol(module, c"interception_get_filter")?,
                set_filter: symbol(module, c"interception_set_filter")?,
                wait: symbol(module, c"interception_wait")?,
                wait_with_timeout: symbol(module, c"interception_wait_with_timeout")?,
                send: symbol(module, c"interception_send")?,
                receive: symbol(module, c"interception_receive")?,
                get_hardware_id: symbol(module, c"interception_get_hardware_id")?,
                is_invalid: symbol(module, c"interception_is_invalid")?,
                is_keyboard: symbol(module, c"interception_is_keyboard")?,
                is_mouse: symbol(module, c"interception_is_mouse")?,
            })
        }
    }
}

/// The interception driver's user-mode library, loaded from resource bytes.
pub struct DllBinding {
    exports: Exports,
    module: HMODULE,
    _file: TempFile,
}

// SAFETY: HMODULE is a process-wide handle and the library's exports are
// callable from any thread. Per-context serialization is enforced by `Context`.
unsafe impl Send for DllBinding {}
unsafe impl Sync for DllBinding {}

impl DllBinding {
    /// Write the driver library to a temp file and load it.
    pub fn load(resources: &dyn Resources) -> Result<Self> {
        let name = driver_library_resource();
        let bytes = resources.resource(name)?;
        let file = TempFile::write(name, &bytes)?;

        let module = unsafe { LoadLibraryW(&HSTRING::from(file.path().as_os_str())) }
            .map_err(|e| Error::DriverUnavailable(format!("LoadLibraryW failed: {}", e)))?;

        match unsafe { Exports::resolve(module) } {
            Ok(exports) => {
                log::debug!("loaded {} from {}", name, file.path().display());
                Ok(Self {
                    exports,
                    module,
                    _file: file,
                })
            }
            Err(e) => {
                let _ = unsafe { FreeLibrary(module) };
                Err(e)
            }
        }
    }
}

impl Drop for DllBinding {
    fn drop(&mut self) {
        if let Err(e) = unsafe { FreeLibrary(self.module) } {
            log::warn!("FreeLibrary failed: {}", e);
        }
    }
}

fn handle(context: RawContext) -> *mut c_void {
    context.0 as *mut c_void
}

fn batch_len(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

impl Binding for DllBinding {
    fn create_context(&self) -> Option<RawContext> {
        let context = unsafe { (self.exports.create_context)() };
        (!context.is_null()).then(|| RawContext(context as usize))
    }

    fn destroy_context(&self, context: RawContext) {
        unsafe { (self.exports.destroy_context)(handle(context)) }
    }

    fn get_precedence(&self, context: RawContext, device: i32) -> i32 {
        unsafe { (self.exports.get_precedence)(handle(context), device) }
    }

    fn set_precedence(&self, context: RawContext, device: i32, precedence: i32) {
        unsafe { (self.exports.set_precedence)(handle(context), device, precedence) }
    }

    fn get_filter(&self, context: RawContext, device: i32) -> u16 {
        unsafe { (self.exports.get_filter)(handle(context), device) }
    }

    fn set_filter(&self, context: RawContext, predicate: &dyn Fn(i32) -> bool, filter: u16) {
        let mask = Device::all()
            .filter(|device| predicate(device.raw()))
            .filter_map(Device::slot)
            .fold(0u32, |mask, slot| mask | (1 << slot));

        FILTER_DEVICES.with(|devices| devices.set(mask));
        unsafe { (self.exports.set_filter)(handle(context), selected_device, filter) }
        FILTER_DEVICES.with(|devices| devices.set(0));
    }

    fn wait(&self, context: RawContext) -> i32 {
        unsafe { (self.exports.wait)(handle(context)) }
    }

    fn wait_with_timeout(&self, context: RawContext, milliseconds: u32) -> i32 {
        unsafe { (self.exports.wait_with_timeout)(handle(context), milliseconds) }
    }

    fn send(&self, context: RawContext, device: i32, strokes: &[RawStroke]) -> usize {
        // Keyboard batches are packed records, mouse batches full slots.
        let sent = if Device::from_raw(device).is_keyboard() {
            let packed = stroke::pack_key_batch(strokes);
            unsafe {
                (self.exports.send)(
                    handle(context),
                    device,
                    packed.as_ptr().cast(),
                    batch_len(packed.len()),
                )
            }
        } else {
            unsafe {
                (self.exports.send)(
                    handle(context),
                    device,
                    strokes.as_ptr().cast(),
                    batch_len(strokes.len()),
                )
            }
        };
        usize::try_from(sent).unwrap_or(0)
    }

    fn receive(&self, context: RawContext, device: i32, strokes: &mut [RawStroke]) -> usize {
        if !Device::from_raw(device).is_keyboard() {
            let received = unsafe {
                (self.exports.receive)(
                    handle(context),
                    device,
                    strokes.as_mut_ptr().cast(),
                    batch_len(strokes.len()),
                )
            };
            return usize::try_from(received).unwrap_or(0);
        }

        let mut packed = vec![RawKeyStroke::default(); strokes.len()];
        let received = unsafe {
            (self.exports.receive)(
                handle(context),
                device,
                packed.as_mut_ptr().cast(),
                batch_len(packed.len()),
            )
        };
        let received = usize::try_from(received).unwrap_or(0).min(packed.len());
        stroke::unpack_key_batch(&packed[..received], strokes)
    }

    fn get_hardware_id(&self, context: RawContext, device: i32, buffer: &mut [u8]) -> usize {
        let length = unsafe {
            (self.exports.get_hardware_id)(
                handle(context),
                device,
                buffer.as_mut_ptr().cast(),
                batch_len(buffer.len()),
            )
        };
        length as usize
    }

    fn is_invalid(&self, device: i32) -> bool {
        unsafe { (self.exports.is_invalid)(device) != 0 }
    }

    fn is_keyboard(&self, device: i32) -> bool {
        unsafe { (self.exports.is_keyboard)(device) != 0 }
    }

    fn is_mouse(&self, device: i32) -> bool {
        unsafe { (self.exports.is_mouse)(device) != 0 }
    }
}

/// A [`Loader`] that loads [`DllBinding`] from `resources`.
pub fn native_loader(resources: Arc<dyn Resources>) -> impl Loader {
    move || {
        DllBinding::load(resources.as_ref()).map(|binding| Box::new(binding) as Box<dyn Binding>)
    }
}
