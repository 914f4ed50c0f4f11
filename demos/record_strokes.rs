//! Recording example - record keyboard strokes for five seconds, then replay them.
//!
//! Run with: cargo run --example record_strokes --features recorder
//!
//! Requires the Interception driver and `interception_x64.dll` in `./resources`.

#[cfg(windows)]
fn main() -> interceptor::Result<()> {
    use interceptor::{
        FILTER_KEY_ALL, Interceptor, ResourceDir, StrokeRecorder, WaitResult, is_keyboard,
    };
    use std::time::{Duration, Instant};

    let interceptor = Interceptor::native(ResourceDir::new("resources"));
    interceptor.initialize()?;
    let mut context = interceptor.create_context()?;
    context.set_filter(is_keyboard, FILTER_KEY_ALL)?;

    println!("Recording keyboard strokes for 5 seconds...");
    let mut recorder = StrokeRecorder::new();
    recorder.start()?;

    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if let WaitResult::Ready(device) = context.wait_timeout(Duration::from_millis(50))? {
            let strokes = context.receive(device, 32)?;
            recorder.record(device, &strokes)?;
            context.send(device, &strokes)?;
        }
    }

    let recording = recorder.stop()?.with_description("record_strokes demo");
    println!(
        "Recorded {} strokes over {:?}",
        recording.stroke_count(),
        recording.duration()
    );
    recording.save("strokes.json")?;

    println!("Replaying in 2 seconds...");
    std::thread::sleep(Duration::from_secs(2));
    context.set_filter(is_keyboard, 0)?;
    recording.replay(&context)?;

    context.destroy()?;
    interceptor.dispose()
}

#[cfg(not(windows))]
fn main() {
    println!("This example only works on Windows with the Interception driver installed.");
}
