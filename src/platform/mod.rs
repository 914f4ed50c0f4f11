//! Platform-specific bindings.
//!
//! The interception driver only exists on Windows. Elsewhere the crate is
//! usable through [`crate::simulator::SimulatedDriver`].

#[cfg(target_os = "windows")]
mod windows;
#[cfg(target_os = "windows")]
pub use self::windows::*;
