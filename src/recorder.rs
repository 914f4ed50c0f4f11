//! Stroke recording and replay.
//!
//! Record the strokes a context receives, save them as JSON, and later send
//! them back through a context with their original timing.
//!
//! # Example
//!
//! ```no_run
//! use interceptor::recorder::{StrokeRecorder, StrokeRecording};
//! # fn demo(context: &mut interceptor::Context) -> interceptor::Result<()> {
//!
//! let mut recorder = StrokeRecorder::new();
//! recorder.start()?;
//! for _ in 0..100 {
//!     let device = context.wait()?;
//!     let strokes = context.receive(device, 32)?;
//!     recorder.record(device, &strokes)?;
//!     context.send(device, &strokes)?;
//! }
//! recorder.stop()?.save("macro.json")?;
//!
//! let recording = StrokeRecording::load("macro.json")?;
//! recording.replay(context)?;
//! # Ok(())
//! # }
//! ```

use crate::context::Context;
use crate::device::Device;
use crate::error::{Error, Result};
use crate::stroke::Stroke;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, Instant, SystemTime};

/// A stroke with its device and time since recording start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedStroke {
    /// Time elapsed since recording start.
    pub elapsed: Duration,
    /// Device the stroke came from.
    pub device: Device,
    /// The stroke.
    pub stroke: Stroke,
}

/// A sequence of recorded strokes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrokeRecording {
    /// Recorded strokes in arrival order.
    pub strokes: Vec<RecordedStroke>,
    /// When the recording was created.
    pub created_at: SystemTime,
    /// Optional description.
    pub description: Option<String>,
}

impl StrokeRecording {
    /// Create a new empty recording.
    pub fn new() -> Self {
        Self {
            strokes: Vec::new(),
            created_at: SystemTime::now(),
            description: None,
        }
    }

    /// Set a description for this recording.
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Time of the last stroke.
    pub fn duration(&self) -> Duration {
        self.strokes
            .last()
            .map(|s| s.elapsed)
            .unwrap_or(Duration::ZERO)
    }

    /// Number of recorded strokes.
    pub fn stroke_count(&self) -> usize {
        self.strokes.len()
    }

    /// Save the recording to a file (JSON format).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Other(format!("Failed to serialize recording: {}", e)))?;
        std::fs::write(path, json)
            .map_err(|e| Error::Other(format!("Failed to write recording file: {}", e)))?;
        Ok(())
    }

    /// Load a recording from a file (JSON format).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Other(format!("Failed to read recording file: {}", e)))?;
        serde_json::from_str(&json)
            .map_err(|e| Error::Other(format!("Failed to deserialize recording: {}", e)))
    }

    /// Send every stroke through `context` with its original timing.
    pub fn replay(&self, context: &Context) -> Result<()> {
        self.replay_with_speed(context, 1.0)
    }

    /// Replay with a speed multiplier (2.0 = twice as fast).
    pub fn replay_with_speed(&self, context: &Context, speed: f64) -> Result<()> {
        if speed.is_nan() || speed <= 0.0 {
            return Err(Error::Other("Playback speed must be positive".into()));
        }

        let start = Instant::now();
        for recorded in &self.strokes {
            let target = Duration::try_from_secs_f64(recorded.elapsed.as_secs_f64() / speed)
                .map_err(|e| Error::Other(format!("Playback delay out of range: {}", e)))?;
            let elapsed = start.elapsed();
            if target > elapsed {
                std::thread::sleep(target - elapsed);
            }
            context.send_all(recorded.device, std::slice::from_ref(&recorded.stroke))?;
        }
        Ok(())
    }

    /// Send every stroke through `context` without delays.
    pub fn replay_fast(&self, context: &Context) -> Result<()> {
        for recorded in &self.strokes {
            context.send_all(recorded.device, std::slice::from_ref(&recorded.stroke))?;
        }
        Ok(())
    }
}

impl Default for StrokeRecording {
    fn default() -> Self {
        Self::new()
    }
}

/// Collects strokes into a [`StrokeRecording`].
///
/// The recorder does not read input itself; feed it what the context receives.
#[derive(Debug, Default)]
pub struct StrokeRecorder {
    recording: Option<StrokeRecording>,
    start_time: Option<Instant>,
}

impl StrokeRecorder {
    /// Create an idle recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a new recording.
    pub fn start(&mut self) -> Result<()> {
        if self.recording.is_some() {
            return Err(Error::Other("Recording already in progress".into()));
        }
        self.recording = Some(StrokeRecording::new());
        self.start_time = Some(Instant::now());
        Ok(())
    }

    /// Whether a recording is in progress.
    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    /// Append strokes received from `device`.
    pub fn record(&mut self, device: Device, strokes: &[Stroke]) -> Result<()> {
        let (Some(recording), Some(start)) = (self.recording.as_mut(), self.start_time) else {
            return Err(Error::Other("No recording in progress".into()));
        };
        let elapsed = start.elapsed();
        recording
            .strokes
            .extend(strokes.iter().map(|&stroke| RecordedStroke {
                elapsed,
                device,
                stroke,
            }));
        Ok(())
    }

    /// Finish and return the recording.
    pub fn stop(&mut self) -> Result<StrokeRecording> {
        self.start_time = None;
        self.recording
            .take()
            .ok_or_else(|| Error::Other("No recording in progress".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FILTER_KEY_ALL;
    use crate::simulator::SimulatedDriver;
    use crate::stroke::{KeyStroke, MouseStroke};

    #[test]
    fn test_recording_new() {
        let recording = StrokeRecording::new();
        assert!(recording.strokes.is_empty());
        assert_eq!(recording.duration(), Duration::ZERO);
        assert_eq!(recording.stroke_count(), 0);
    }

    #[test]
    fn test_recording_with_description() {
        let recording = StrokeRecording::new().with_description("Test macro");
        assert_eq!(recording.description, Some("Test macro".to_string()));
    }

    #[test]
    fn test_recorder_lifecycle() {
        let mut recorder = StrokeRecorder::new();
        assert!(recorder.record(Device::keyboard(0), &[]).is_err());

        recorder.start().unwrap();
        assert!(recorder.start().is_err());
        recorder
            .record(Device::keyboard(0), &[KeyStroke::down(0x1E).into(), KeyStroke::up(0x1E).into()])
            .unwrap();
        let recording = recorder.stop().unwrap();
        assert!(!recorder.is_recording());
        assert_eq!(recording.stroke_count(), 2);
        assert!(recorder.stop().is_err());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let mut recording = StrokeRecording::new().with_description("Test");
        recording.strokes.push(RecordedStroke {
            elapsed: Duration::from_millis(100),
            device: Device::mouse(1),
            stroke: MouseStroke::relative_move(-3, 9).into(),
        });

        let temp_path = std::env::temp_dir().join(format!(
            "interceptor_test_recording_{}.json",
            std::process::id()
        ));
        recording.save(&temp_path).unwrap();

        let loaded = StrokeRecording::load(&temp_path).unwrap();
        assert_eq!(loaded.description, recording.description);
        assert_eq!(loaded.strokes, recording.strokes);

        std::fs::remove_file(&temp_path).unwrap();
    }

    #[test]
    fn test_replay_fast_sends_strokes() {
        let driver = SimulatedDriver::new();
        let interceptor = driver.interceptor();
        interceptor.initialize().unwrap();
        let mut context = interceptor.create_context().unwrap();
        context
            .set_device_filter(Device::keyboard(0), FILTER_KEY_ALL)
            .unwrap();

        let mut recording = StrokeRecording::new();
        for code in [0x10, 0x11] {
            recording.strokes.push(RecordedStroke {
                elapsed: Duration::ZERO,
                device: Device::keyboard(0),
                stroke: KeyStroke::down(code).into(),
            });
        }
        recording.replay_fast(&context).unwrap();

        assert_eq!(context.wait().unwrap(), Device::keyboard(0));
        let received = context.receive(Device::keyboard(0), 8).unwrap();
        assert_eq!(received.len(), 2);
        assert!(recording.replay_with_speed(&context, 0.0).is_err());
    }

    #[test]
    fn test_replay_tiny_speed_is_error() {
        let driver = SimulatedDriver::new();
        let interceptor = driver.interceptor();
        interceptor.initialize().unwrap();
        let context = interceptor.create_context().unwrap();

        let mut recording = StrokeRecording::new();
        recording.strokes.push(RecordedStroke {
            elapsed: Duration::from_secs(1),
            device: Device::keyboard(0),
            stroke: KeyStroke::down(0x1E).into(),
        });

        assert!(matches!(
            recording.replay_with_speed(&context, 1e-300),
            Err(Error::Other(_))
        ));
        assert!(driver.passed_through().is_empty());
    }
}
