use crate::RecorderError;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordState {
    #[default]
    Idle,
    Recording {
        started_at: Instant,
        frame_count: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordingStats {
    pub duration: Duration,
    pub frames: u64,
    pub actual_fps: f64,
}

impl RecordingStats {
    pub fn new(duration: Duration, frames: u64) -> Self {
        let secs = duration.as_secs_f64();
        let actual_fps = if secs > 0.0 { frames as f64 / secs } else { 0.0 };

        Self {
            duration,
            frames,
            actual_fps,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ToggleOutcome {
    Started,
    Stopped(RecordingStats),
}

/// Idle/recording state of one camera session.
#[derive(Debug, Default)]
pub struct RecordingController {
    state: RecordState,
}

impl RecordingController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RecordState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.state, RecordState::Recording { .. })
    }

    /// Fails without touching the state if a recording is running. The
    /// caller reports the error.
    pub fn start(&mut self, now: Instant) -> Result<(), RecorderError> {
        if self.is_recording() {
            return Err(RecorderError::AlreadyRecording);
        }

        self.state = RecordState::Recording {
            started_at: now,
            frame_count: 0,
        };
        Ok(())
    }

    pub fn stop(&mut self, now: Instant) -> Result<RecordingStats, RecorderError> {
        let RecordState::Recording {
            started_at,
            frame_count,
        } = self.state
        else {
            return Err(RecorderError::NotRecording);
        };

        self.state = RecordState::Idle;
        Ok(RecordingStats::new(
            now.saturating_duration_since(started_at),
            frame_count,
        ))
    }

    pub fn toggle(&mut self, now: Instant) -> Result<ToggleOutcome, RecorderError> {
        if self.is_recording() {
            self.stop(now).map(ToggleOutcome::Stopped)
        } else {
            self.start(now).map(|_| ToggleOutcome::Started)
        }
    }

    /// Counts one recorded frame. No-op while idle.
    pub fn count_frame(&mut self) {
        if let RecordState::Recording { frame_count, .. } = &mut self.state {
            *frame_count += 1;
        }
    }

    pub fn frame_count(&self) -> u64 {
        match self.state {
            RecordState::Recording { frame_count, .. } => frame_count,
            RecordState::Idle => 0,
        }
    }

    pub fn elapsed(&self, now: Instant) -> Option<Duration> {
        match self.state {
            RecordState::Recording { started_at, .. } => {
                Some(now.saturating_duration_since(started_at))
            }
            RecordState::Idle => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_stop() {
        let mut controller = RecordingController::new();
        let t0 = Instant::now();

        controller.start(t0).unwrap();
        assert!(controller.is_recording());

        for _ in 0..50 {
            controller.count_frame();
        }
        assert_eq!(controller.elapsed(t0 + Duration::from_secs(1)), Some(Duration::from_secs(1)));

        let stats = controller.stop(t0 + Duration::from_secs(2)).unwrap();
        assert_eq!(stats.frames, 50);
        assert_eq!(stats.duration, Duration::from_secs(2));
        assert!((stats.actual_fps - 25.0).abs() < 1e-9);
        assert_eq!(controller.state(), RecordState::Idle);
    }

    #[test]
    fn test_start_while_recording_keeps_state() {
        let mut controller = RecordingController::new();
        let t0 = Instant::now();
        controller.start(t0).unwrap();
        controller.count_frame();

        let err = controller.start(t0 + Duration::from_secs(1));
        assert!(matches!(err, Err(RecorderError::AlreadyRecording)));
        assert_eq!(
            controller.state(),
            RecordState::Recording {
                started_at: t0,
                frame_count: 1
            }
        );
    }

    #[test]
    fn test_stop_while_idle() {
        let mut controller = RecordingController::new();
        assert!(matches!(
            controller.stop(Instant::now()),
            Err(RecorderError::NotRecording)
        ));
        assert_eq!(controller.state(), RecordState::Idle);
    }

    #[test]
    fn test_idle_frames_are_not_counted() {
        let mut controller = RecordingController::new();
        controller.count_frame();
        assert_eq!(controller.frame_count(), 0);
        assert_eq!(controller.elapsed(Instant::now()), None);
    }

    #[test]
    fn test_toggle() {
        let mut controller = RecordingController::new();
        let t0 = Instant::now();

        assert_eq!(controller.toggle(t0).unwrap(), ToggleOutcome::Started);
        let ToggleOutcome::Stopped(stats) = controller.toggle(t0).unwrap() else {
            panic!("expected a stop");
        };

        assert_eq!(stats.frames, 0);
        assert_eq!(stats.actual_fps, 0.0);
    }
}
