use image::RgbImage;
use recorder::{FrameSink, PreviewStats, RecorderError};
use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

pub fn status_line(stats: &PreviewStats) -> String {
    match stats.elapsed {
        Some(elapsed) if stats.recording => format!(
            "FPS: {:.1} | REC {:.1}s | frames {}",
            stats.fps,
            elapsed.as_secs_f64(),
            stats.frames
        ),
        _ => format!("FPS: {:.1} | idle", stats.fps),
    }
}

/// Saves every n-th offered frame to a PNG file. `every == 0` saves nothing.
pub struct Snapshot {
    path: PathBuf,
    every: u64,
    count: u64,
}

impl Snapshot {
    pub fn new(path: PathBuf, every: u64) -> Self {
        Self {
            path,
            every,
            count: 0,
        }
    }

    pub fn offer(&mut self, frame: &RgbImage) -> bool {
        self.count += 1;
        if self.every == 0 || self.count % self.every != 0 {
            return false;
        }

        match frame.save(&self.path) {
            Ok(_) => true,
            Err(e) => {
                log::warn!("save preview `{}` failed: {e}", self.path.display());
                false
            }
        }
    }
}

/// Terminal display: periodic status log lines plus a preview image file.
pub struct CliSink {
    snapshot: Snapshot,
    status_interval: Duration,
    last_status: Option<Instant>,
}

impl CliSink {
    pub fn new(snapshot: Snapshot, status_interval: Duration) -> Self {
        Self {
            snapshot,
            status_interval,
            last_status: None,
        }
    }

    fn status_due(&mut self, now: Instant) -> bool {
        match self.last_status {
            Some(last) if now.duration_since(last) < self.status_interval => false,
            _ => {
                self.last_status = Some(now);
                true
            }
        }
    }
}

impl FrameSink for CliSink {
    fn show(&mut self, frame: &RgbImage, stats: &PreviewStats) -> Result<(), RecorderError> {
        self.snapshot.offer(frame);

        if self.status_due(Instant::now()) {
            log::info!("{}", status_line(stats));
        }

        Ok(())
    }
}
