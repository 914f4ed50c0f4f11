//! Key blocking example - swallow selected keys before any application sees them.
//!
//! Run with: cargo run --example key_blocker
//!
//! Requires the Interception driver and `interception_x64.dll` in `./resources`.
//! The Q, W and E keys are blocked; everything else is forwarded unchanged.
//! Press Ctrl+C to exit.

#[cfg(windows)]
fn main() -> interceptor::Result<()> {
    use interceptor::{FILTER_KEY_ALL, Interceptor, ResourceDir, Stroke, WaitResult, is_keyboard};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    const BLOCKED: [(u16, &str); 3] = [(0x10, "Q"), (0x11, "W"), (0x12, "E")];

    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst))
        .expect("Failed to set Ctrl+C handler");

    let interceptor = Interceptor::native(ResourceDir::new("resources"));
    if !interceptor.check_driver_installed() {
        eprintln!("The Interception driver is not installed.");
        return Ok(());
    }
    interceptor.initialize()?;

    let mut context = interceptor.create_context()?;
    context.set_filter(is_keyboard, FILTER_KEY_ALL)?;

    println!("interceptor key blocker");
    println!("=======================\n");
    println!("Blocking Q, W and E. Press Ctrl+C to exit.\n");

    let mut blocked = 0u32;
    while running.load(Ordering::SeqCst) {
        // Wake up regularly so Ctrl+C is noticed.
        let device = match context.wait_timeout(Duration::from_millis(100))? {
            WaitResult::Ready(device) => device,
            WaitResult::TimedOut => continue,
        };

        let strokes = context.receive(device, 32)?;
        let forwarded: Vec<Stroke> = strokes
            .into_iter()
            .filter(|stroke| {
                let Some(key) = stroke.as_keyboard() else {
                    return true;
                };
                match BLOCKED.iter().find(|(code, _)| *code == key.code) {
                    Some((_, name)) if !key.is_up() => {
                        blocked += 1;
                        println!("BLOCKED {} key! (total blocked: {})", name, blocked);
                        false
                    }
                    Some(_) => false,
                    None => true,
                }
            })
            .collect();
        context.send(device, &forwarded)?;
    }

    context.destroy()?;
    interceptor.dispose()
}

#[cfg(not(windows))]
fn main() {
    println!("This example only works on Windows with the Interception driver installed.");
}
