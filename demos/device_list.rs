//! Device listing example - print every keyboard and mouse the driver sees.
//!
//! Run with: cargo run --example device_list
//!
//! On Windows this talks to the real driver (DLL taken from `./resources`).
//! Elsewhere it lists the devices of the simulated driver.

use interceptor::{Interceptor, is_keyboard, is_mouse};

fn print_devices(interceptor: &Interceptor) -> interceptor::Result<()> {
    interceptor.initialize()?;

    println!("Keyboards:");
    for data in interceptor.device_list(Some(&is_keyboard))? {
        println!("  [{:>2}] {}", data.device, data.hardware_id);
    }

    println!("Mice:");
    for data in interceptor.device_list(Some(&is_mouse))? {
        println!("  [{:>2}] {}", data.device, data.hardware_id);
    }

    interceptor.dispose()
}

fn main() {
    #[cfg(windows)]
    let interceptor = Interceptor::native(interceptor::ResourceDir::new("resources"));
    #[cfg(not(windows))]
    let interceptor = interceptor::SimulatedDriver::new().interceptor();

    if let Err(e) = print_devices(&interceptor) {
        eprintln!("Error: {}", e);
    }
}
