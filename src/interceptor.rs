//! The process-scoped session facade.
//!
//! An [`Interceptor`] owns the driver binding and its lifecycle:
//!
//! ```text
//! Uninitialized --initialize--> Initialized --dispose--> Disposed
//!       ^  |                                                |
//!       +--+ (load failed, retry possible)     initialize --+
//! ```
//!
//! Construct one per process and share it explicitly. Initialization and
//! disposal are serialized by an internal lock; everything else is left to the
//! caller's threading model.

use crate::binding::{Binding, Loader};
use crate::context::Context;
use crate::device::{Device, DeviceData};
use crate::error::{Error, Result};
use crate::installer::Installer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A loaded binding shared by the interceptor and its contexts.
///
/// The binding is unloaded once the interceptor has been disposed and the last
/// context referencing it is gone.
pub(crate) struct Session {
    binding: Box<dyn Binding>,
    live: AtomicBool,
}

impl Session {
    fn new(binding: Box<dyn Binding>) -> Self {
        Self {
            binding,
            live: AtomicBool::new(true),
        }
    }

    pub(crate) fn binding(&self) -> &dyn Binding {
        self.binding.as_ref()
    }

    pub(crate) fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.live.store(false, Ordering::SeqCst);
    }
}

enum State {
    Uninitialized,
    Initialized(Arc<Session>),
    Disposed,
}

/// Entry point to the interception driver.
///
/// # Example
///
/// ```
/// use interceptor::{Device, KeyStroke, SimulatedDriver, FILTER_KEY_DOWN};
///
/// let interceptor = SimulatedDriver::new().interceptor();
/// interceptor.initialize().unwrap();
///
/// let mut context = interceptor.create_context().unwrap();
/// context.set_device_filter(Device::keyboard(0), FILTER_KEY_DOWN).unwrap();
/// context.send(Device::keyboard(0), &[KeyStroke::down(0x1E).into()]).unwrap();
///
/// let device = context.wait().unwrap();
/// let strokes = context.receive(device, 16).unwrap();
/// assert_eq!(strokes.len(), 1);
/// ```
pub struct Interceptor {
    loader: Box<dyn Loader>,
    installer: Option<Box<dyn Installer>>,
    state: Mutex<State>,
}

impl Interceptor {
    /// Create an uninitialized interceptor that loads its binding with `loader`.
    pub fn new<L: Loader + 'static>(loader: L) -> Self {
        Self {
            loader: Box::new(loader),
            installer: None,
            state: Mutex::new(State::Uninitialized),
        }
    }

    /// Attach the installer used by the driver checks and install actions.
    pub fn with_installer<I: Installer + 'static>(mut self, installer: I) -> Self {
        self.installer = Some(Box::new(installer));
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load the driver binding.
    ///
    /// Returns immediately if already initialized. On failure the error is
    /// logged and returned, the state is left untouched and a later call may
    /// retry.
    pub fn initialize(&self) -> Result<()> {
        let mut state = self.state();
        if matches!(*state, State::Initialized(_)) {
            return Ok(());
        }

        match self.loader.load() {
            Ok(binding) => {
                *state = State::Initialized(Arc::new(Session::new(binding)));
                log::debug!("interception binding loaded");
                Ok(())
            }
            Err(e) => {
                log::error!("failed to load interception binding: {}", e);
                Err(match e {
                    e @ Error::DriverUnavailable(_) => e,
                    other => Error::DriverUnavailable(other.to_string()),
                })
            }
        }
    }

    /// Tear the binding down. Idempotent.
    ///
    /// Live contexts stop accepting operations but can still be destroyed; the
    /// binding is unloaded once the last of them is dropped.
    pub fn dispose(&self) -> Result<()> {
        let mut state = self.state();
        if let State::Initialized(session) = &*state {
            session.close();
            *state = State::Disposed;
            log::debug!("interception binding disposed");
        }
        Ok(())
    }

    /// Whether the binding is loaded.
    pub fn is_initialized(&self) -> bool {
        matches!(*self.state(), State::Initialized(_))
    }

    /// Whether [`Interceptor::dispose`] tore down a loaded binding.
    pub fn is_disposed(&self) -> bool {
        matches!(*self.state(), State::Disposed)
    }

    fn session(&self) -> Result<Arc<Session>> {
        match &*self.state() {
            State::Initialized(session) => Ok(Arc::clone(session)),
            State::Uninitialized | State::Disposed => Err(Error::NotInitialized),
        }
    }

    /// Create a new context.
    pub fn create_context(&self) -> Result<Context> {
        let session = self.session()?;
        let raw = session.binding().create_context().ok_or_else(|| {
            Error::DriverUnavailable("driver refused to create a context".into())
        })?;
        log::debug!("context {:?} created", raw);
        Ok(Context::new(raw, session))
    }

    /// Enumerate devices through a temporary context.
    pub fn device_list(
        &self,
        predicate: Option<&dyn Fn(Device) -> bool>,
    ) -> Result<Vec<DeviceData>> {
        let mut context = self.create_context()?;
        let devices = context.devices(predicate);
        context.destroy()?;
        devices
    }

    /// Whether the driver considers `device` invalid.
    pub fn is_invalid(&self, device: Device) -> Result<bool> {
        Ok(self.session()?.binding().is_invalid(device.raw()))
    }

    /// Whether the driver considers `device` a keyboard.
    pub fn is_keyboard(&self, device: Device) -> Result<bool> {
        Ok(self.session()?.binding().is_keyboard(device.raw()))
    }

    /// Whether the driver considers `device` a mouse.
    pub fn is_mouse(&self, device: Device) -> Result<bool> {
        Ok(self.session()?.binding().is_mouse(device.raw()))
    }

    /// Whether the filter driver is installed. `false` without an installer.
    pub fn check_driver_installed(&self) -> bool {
        self.installer
            .as_ref()
            .is_some_and(|installer| installer.is_driver_installed())
    }

    /// Whether the process has administrator rights. `false` without an installer.
    pub fn check_administrator_rights(&self) -> bool {
        self.installer
            .as_ref()
            .is_some_and(|installer| installer.has_admin_rights())
    }

    /// Install the filter driver. A reboot is needed before it takes effect.
    pub fn install_driver(&self) -> Result<()> {
        self.run_installer("/install", false)
    }

    /// Uninstall the filter driver.
    pub fn uninstall_driver(&self) -> Result<()> {
        self.run_installer("/uninstall", true)
    }

    fn run_installer(&self, argument: &str, require_installed: bool) -> Result<()> {
        let installer = self
            .installer
            .as_ref()
            .ok_or_else(|| Error::InstallerFailed("no installer configured".into()))?;

        if !installer.has_admin_rights() {
            log::warn!("refusing to run installer {}: not elevated", argument);
            return Err(Error::PermissionDenied(
                "administrator rights are required".into(),
            ));
        }
        if installer.is_driver_installed() != require_installed {
            log::warn!(
                "refusing to run installer {}: driver installed = {}",
                argument,
                !require_installed
            );
            return Err(Error::InstallerFailed(if require_installed {
                "driver is not installed".into()
            } else {
                "driver is already installed".into()
            }));
        }

        let code = installer.run_installer(&[argument])?;
        if code == 0 {
            log::debug!("installer {} succeeded", argument);
            Ok(())
        } else {
            Err(Error::InstallerFailed(format!(
                "installer {} exited with code {}",
                argument, code
            )))
        }
    }
}

#[cfg(target_os = "windows")]
impl Interceptor {
    /// An interceptor backed by `interception.dll` and the native installer,
    /// both taken from `resources`.
    pub fn native<R: crate::installer::Resources + 'static>(resources: R) -> Self {
        let resources: Arc<dyn crate::installer::Resources> = Arc::new(resources);
        Interceptor::new(crate::platform::native_loader(Arc::clone(&resources)))
            .with_installer(crate::platform::RegistryInstaller::new(resources))
    }
}

impl std::fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interceptor")
            .field("initialized", &self.is_initialized())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::SimulatedDriver;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_lifecycle() {
        let interceptor = SimulatedDriver::new().interceptor();
        assert!(!interceptor.is_initialized());
        assert!(matches!(
            interceptor.create_context(),
            Err(Error::NotInitialized)
        ));

        interceptor.initialize().unwrap();
        interceptor.initialize().unwrap();
        assert!(interceptor.is_initialized());

        interceptor.dispose().unwrap();
        interceptor.dispose().unwrap();
        assert!(interceptor.is_disposed());
        assert!(!interceptor.is_initialized());
        assert!(matches!(
            interceptor.is_keyboard(Device::keyboard(0)),
            Err(Error::NotInitialized)
        ));

        interceptor.initialize().unwrap();
        assert!(interceptor.create_context().is_ok());
    }

    #[test]
    fn test_initialize_loads_once() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&loads);
        let driver = SimulatedDriver::new();
        let interceptor = Interceptor::new(move || -> Result<Box<dyn Binding>> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(driver.clone()))
        });

        interceptor.initialize().unwrap();
        interceptor.initialize().unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_load_can_retry() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let driver = SimulatedDriver::new();
        let interceptor = Interceptor::new(move || -> Result<Box<dyn Binding>> {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(Error::Platform("interception.dll not found".into()))
            } else {
                Ok(Box::new(driver.clone()))
            }
        });

        let err = interceptor.initialize().unwrap_err();
        assert!(matches!(err, Error::DriverUnavailable(_)));
        assert!(!interceptor.is_initialized());

        interceptor.initialize().unwrap();
        assert!(interceptor.is_initialized());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_device_queries() {
        let interceptor = SimulatedDriver::new().interceptor();
        interceptor.initialize().unwrap();
        assert!(interceptor.is_keyboard(Device::keyboard(3)).unwrap());
        assert!(interceptor.is_mouse(Device::mouse(3)).unwrap());
        assert!(interceptor.is_invalid(Device::from_raw(0)).unwrap());
        assert!(!interceptor.is_invalid(Device::from_raw(20)).unwrap());
    }

    #[test]
    fn test_device_list_releases_context() {
        let driver = SimulatedDriver::new();
        let interceptor = driver.interceptor();
        interceptor.initialize().unwrap();

        let devices = interceptor.device_list(None).unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(driver.context_count(), 0);
    }

    struct FakeInstaller {
        installed: bool,
        admin: bool,
        exit_code: i32,
        runs: Arc<AtomicUsize>,
    }

    impl Installer for FakeInstaller {
        fn is_driver_installed(&self) -> bool {
            self.installed
        }

        fn has_admin_rights(&self) -> bool {
            self.admin
        }

        fn run_installer(&self, args: &[&str]) -> Result<i32> {
            assert_eq!(args.len(), 1);
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(self.exit_code)
        }
    }

    fn with_installer(installed: bool, admin: bool, exit_code: i32) -> (Interceptor, Arc<AtomicUsize>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let interceptor = SimulatedDriver::new().interceptor().with_installer(FakeInstaller {
            installed,
            admin,
            exit_code,
            runs: Arc::clone(&runs),
        });
        (interceptor, runs)
    }

    #[test]
    fn test_install_requires_admin() {
        let (interceptor, runs) = with_installer(false, false, 0);
        assert!(!interceptor.check_administrator_rights());
        assert!(matches!(
            interceptor.install_driver(),
            Err(Error::PermissionDenied(_))
        ));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_install_gated_on_installed_state() {
        let (interceptor, runs) = with_installer(true, true, 0);
        assert!(interceptor.check_driver_installed());
        assert!(interceptor.install_driver().is_err());
        interceptor.uninstall_driver().unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        let (interceptor, runs) = with_installer(false, true, 0);
        interceptor.install_driver().unwrap();
        assert!(interceptor.uninstall_driver().is_err());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_installer_exit_code() {
        let (interceptor, _) = with_installer(false, true, 3);
        assert!(matches!(
            interceptor.install_driver(),
            Err(Error::InstallerFailed(_))
        ));
    }

    #[test]
    fn test_no_installer() {
        let interceptor = SimulatedDriver::new().interceptor();
        assert!(!interceptor.check_driver_installed());
        assert!(!interceptor.check_administrator_rights());
        assert!(interceptor.install_driver().is_err());
    }
}
