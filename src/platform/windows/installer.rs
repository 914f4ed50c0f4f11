//! Native installer checks: service registry entries and the process token.

use super::TempFile;
use crate::error::{Error, Result};
use crate::installer::{INSTALLER_RESOURCE, Installer, Resources};
use std::os::windows::process::CommandExt;
use std::process::Command;
use std::sync::Arc;
use windows::Win32::Foundation::ERROR_SUCCESS;
use windows::Win32::System::Registry::{HKEY_LOCAL_MACHINE, RRF_RT_REG_SZ, RegGetValueW};
use windows::Win32::UI::Shell::IsUserAnAdmin;
use windows::core::{HSTRING, w};

const CREATE_NO_WINDOW: u32 = 0x0800_0000;

const KEYBOARD_DISPLAY_NAME: &str = "Keyboard Upper Filter Driver";
const MOUSE_DISPLAY_NAME: &str = "Mouse Upper Filter Driver";

/// Read `DisplayName` of a service under `HKLM\SYSTEM\CurrentControlSet\Services`.
fn service_display_name(service: &str) -> Option<String> {
    let subkey = HSTRING::from(format!(r"SYSTEM\CurrentControlSet\Services\{}", service));
    let mut buffer = [0u16; 256];
    let mut size = std::mem::size_of_val(&buffer) as u32;

    let status = unsafe {
        RegGetValueW(
            HKEY_LOCAL_MACHINE,
            &subkey,
            w!("DisplayName"),
            RRF_RT_REG_SZ,
            None,
            Some(buffer.as_mut_ptr().cast()),
            Some(&mut size as *mut u32),
        )
    };
    if status != ERROR_SUCCESS {
        return None;
    }

    let units = (size as usize / 2).min(buffer.len());
    Some(
        String::from_utf16_lossy(&buffer[..units])
            .trim_end_matches('\0')
            .to_string(),
    )
}

/// [`Installer`] backed by the registry, the process token and the bundled
/// `install_interception.exe`.
pub struct RegistryInstaller {
    resources: Arc<dyn Resources>,
}

impl RegistryInstaller {
    /// Use `resources` to obtain the installer executable.
    pub fn new(resources: Arc<dyn Resources>) -> Self {
        Self { resources }
    }
}

impl Installer for RegistryInstaller {
    fn is_driver_installed(&self) -> bool {
        service_display_name("keyboard").as_deref() == Some(KEYBOARD_DISPLAY_NAME)
            && service_display_name("mouse").as_deref() == Some(MOUSE_DISPLAY_NAME)
    }

    fn has_admin_rights(&self) -> bool {
        unsafe { IsUserAnAdmin() }.as_bool()
    }

    fn run_installer(&self, args: &[&str]) -> Result<i32> {
        let bytes = self.resources.resource(INSTALLER_RESOURCE)?;
        let file = TempFile::write(INSTALLER_RESOURCE, &bytes)?;

        let status = Command::new(file.path())
            .args(args)
            .creation_flags(CREATE_NO_WINDOW)
            .status()
            .map_err(|e| Error::InstallerFailed(format!("failed to run installer: {}", e)))?;

        status
            .code()
            .ok_or_else(|| Error::InstallerFailed("installer terminated without exit code".into()))
    }
}
