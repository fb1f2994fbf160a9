use derive_setters::Setters;
use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

pub const DEFAULT_QUEUE_SIZE: usize = 64;
pub const DEFAULT_BITRATE: u32 = 2_000_000;

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct RecorderConfig {
    pub record_dir: PathBuf,

    /// File names start with `<name_prefix>_`.
    pub name_prefix: String,

    /// Nominal frame rate requested from the camera.
    pub fps: u32,

    pub bitrate: u32,

    /// Frames the writer queue holds before frames get dropped.
    pub queue_size: usize,

    pub keep_raw_h264: bool,
}

impl RecorderConfig {
    pub fn new(record_dir: impl AsRef<Path>, name_prefix: impl Into<String>) -> Self {
        Self {
            record_dir: record_dir.as_ref().to_path_buf(),
            name_prefix: name_prefix.into(),
            fps: 30,
            bitrate: DEFAULT_BITRATE,
            queue_size: DEFAULT_QUEUE_SIZE,
            keep_raw_h264: false,
        }
    }

    pub fn frame_interval_ms(&self) -> u64 {
        (1000.0 / self.fps.max(1) as f64) as u64
    }
}

/// Frame rate over a sliding three second window.
#[derive(Debug, Default, Clone)]
pub struct SimpleFpsCounter {
    pub fps: f32,
    frames: VecDeque<Instant>,
}

impl SimpleFpsCounter {
    pub fn new() -> Self {
        Self {
            frames: VecDeque::new(),
            fps: 0.0,
        }
    }

    pub fn add_frame(&mut self, timestamp: Instant) -> f32 {
        if let Some(three_seconds_ago) = timestamp.checked_sub(Duration::from_secs(3)) {
            while self
                .frames
                .front()
                .is_some_and(|&oldest| oldest < three_seconds_ago)
            {
                self.frames.pop_front();
            }
        }

        self.frames.push_back(timestamp);

        if let Some(&oldest) = self.frames.front()
            && self.frames.len() >= 2
        {
            let time_span = timestamp.duration_since(oldest);
            if time_span.as_secs_f64() > 0.0 {
                let intervals = (self.frames.len() - 1) as f64;
                self.fps = (intervals / time_span.as_secs_f64()) as f32;
                return self.fps;
            }
        }

        0.0
    }
}
