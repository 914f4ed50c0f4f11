//! # interceptor
//!
//! A pure Rust control surface for the Interception keyboard/mouse filter
//! driver.
//!
//! ## Features
//!
//! - Create driver contexts and configure per-device filters and precedence
//! - Block on input with or without a timeout
//! - Receive, rewrite, suppress and re-inject keyboard and mouse strokes
//! - Enumerate attached devices by hardware id
//! - An in-process simulated driver for tests and non-Windows hosts
//! - Stroke recording and replay (`recorder` feature)
//!
//! ## Quick Start
//!
//! ```no_run
//! use interceptor::{Interceptor, ResourceDir, Stroke, is_keyboard, FILTER_KEY_ALL};
//!
//! # #[cfg(windows)]
//! # fn main() -> interceptor::Result<()> {
//! let interceptor = Interceptor::native(ResourceDir::new("resources"));
//! interceptor.initialize()?;
//!
//! let mut context = interceptor.create_context()?;
//! context.set_filter(is_keyboard, FILTER_KEY_ALL)?;
//!
//! loop {
//!     let device = context.wait()?;
//!     let strokes = context.receive(device, 32)?;
//!     // Drop the Escape key, forward everything else.
//!     let forwarded: Vec<Stroke> = strokes
//!         .into_iter()
//!         .filter(|stroke| stroke.as_keyboard().map_or(true, |key| key.code != 0x01))
//!         .collect();
//!     context.send(device, &forwarded)?;
//! }
//! # }
//! # #[cfg(not(windows))]
//! # fn main() {}
//! ```
//!
//! ## Architecture
//!
//! [`Interceptor`] owns the driver [`Binding`] and its
//! uninitialized/initialized/disposed lifecycle. [`Context`] is a driver
//! session holding per-device [`Filter`] and [`Precedence`] settings; its
//! `wait`/`send`/`receive` operations live in [`pipe`]. Strokes cross the
//! driver boundary in the fixed layout defined in [`stroke`].
//!
//! The core starts no threads. Waits block the calling thread; use one
//! consumer thread per context.

pub mod binding;
pub mod context;
pub mod device;
pub mod error;
pub mod filter;
pub mod installer;
pub mod interceptor;
pub mod pipe;
#[cfg(feature = "recorder")]
pub mod recorder;
pub mod simulator;
pub mod stroke;

mod platform;

// Re-exports
pub use binding::{Binding, Loader, NO_DEVICE, RawContext};
pub use context::Context;
pub use device::{
    Device, DeviceClass, DeviceData, MAX_DEVICE, MAX_KEYBOARD, MAX_MOUSE, enumerate, is_keyboard,
    is_mouse, is_valid,
};
pub use error::{Error, Result};
pub use filter::*;
pub use installer::{Installer, ResourceDir, ResourceMap, Resources};
pub use interceptor::Interceptor;
pub use pipe::{MAX_RECEIVE_BATCH, WaitResult};
#[cfg(feature = "recorder")]
pub use recorder::{RecordedStroke, StrokeRecorder, StrokeRecording};
pub use simulator::SimulatedDriver;
pub use stroke::{
    KEY_STROKE_SIZE, KeyStroke, MouseStroke, RawKeyStroke, RawStroke, STROKE_SIZE, Stroke,
};

#[cfg(target_os = "windows")]
pub use platform::{DllBinding, RegistryInstaller, native_loader};
