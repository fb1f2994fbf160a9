use crate::{CameraConfig, CameraError, CameraInfo, CameraResult, FrameSource, fit_frame};
use image::RgbImage;
use nokhwa::{
    CallbackCamera,
    pixel_format::RgbFormat,
    utils::{CameraIndex, RequestedFormat, RequestedFormatType, Resolution},
};
use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

const POLL_INTERVAL: Duration = Duration::from_millis(2);
const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// Direct webcam capture through nokhwa's threaded camera.
pub struct WebcamSource {
    index: u32,
    config: CameraConfig,
    info: CameraInfo,
    camera: Option<CallbackCamera>,

    // bumped by the capture thread for every new frame
    frame_seq: Arc<AtomicU64>,
    last_seq: u64,
    frame_timeout: Duration,
}

impl WebcamSource {
    pub fn new(index: u32, config: CameraConfig) -> Self {
        Self {
            index,
            config,
            info: CameraInfo::new(index, format!("Camera {index}"), &config),
            camera: None,
            frame_seq: Arc::new(AtomicU64::new(0)),
            last_seq: 0,
            frame_timeout: FRAME_TIMEOUT,
        }
    }

    /// How long `read_frame` waits for the capture thread before giving up.
    pub fn with_frame_timeout(mut self, timeout: Duration) -> Self {
        self.frame_timeout = timeout;
        self
    }

    pub fn is_opened(&self) -> bool {
        self.camera.is_some()
    }

}

/// Blocks until `frame_seq` moves past `last_seq`, returning the new value,
/// or `None` once `deadline` has passed.
fn wait_next_seq(frame_seq: &AtomicU64, last_seq: u64, deadline: Instant) -> Option<u64> {
    loop {
        let seq = frame_seq.load(Ordering::Acquire);
        if seq != last_seq {
            return Some(seq);
        }

        if Instant::now() >= deadline {
            return None;
        }
        thread::sleep(POLL_INTERVAL);
    }
}

// nokhwa hands out an empty placeholder until the first frame is captured
fn is_empty_frame(frame: &RgbImage) -> bool {
    frame.width() == 0 || frame.height() == 0
}

impl FrameSource for WebcamSource {
    fn open(&mut self) -> CameraResult<()> {
        if self.camera.is_some() {
            return Ok(());
        }

        let format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
        let frame_seq = self.frame_seq.clone();

        let mut camera = CallbackCamera::new(CameraIndex::Index(self.index), format, move |_| {
            frame_seq.fetch_add(1, Ordering::Release);
        })
        .map_err(|e| CameraError::InitializationError(e.to_string()))?;

        if let Err(e) = camera.set_frame_rate(self.config.fps) {
            log::warn!("camera set frame rate ({}) failed: {e}", self.config.fps);
        }

        let (w, h) = (self.config.width, self.config.height);
        if let Err(e) = camera.set_resolution(Resolution::new(w, h)) {
            log::warn!("camera set resolution ({w} x {h}) failed: {e}");
        }

        camera
            .open_stream()
            .map_err(|e| CameraError::StartError(e.to_string()))?;

        if let Ok(res) = camera.resolution() {
            self.info.width = res.width();
            self.info.height = res.height();
        }

        if let Ok(fps) = camera.frame_rate() {
            self.info.fps = fps;
        }

        if (self.info.width, self.info.height) != (w, h) {
            log::info!(
                "{} delivers {}x{}, frames are scaled to {w}x{h}",
                self.info.name,
                self.info.width,
                self.info.height
            );
        }

        log::info!("Opened {}", self.info);
        self.last_seq = self.frame_seq.load(Ordering::Acquire);
        self.camera = Some(camera);
        Ok(())
    }

    fn read_frame(&mut self) -> CameraResult<Option<RgbImage>> {
        let Some(ref camera) = self.camera else {
            return Err(CameraError::NotOpened);
        };

        let deadline = Instant::now() + self.frame_timeout;

        loop {
            let Some(seq) = wait_next_seq(&self.frame_seq, self.last_seq, deadline) else {
                log::warn!("{}: no new frame within {:?}", self.info.name, self.frame_timeout);
                return Err(CameraError::NoFrameAvailable);
            };
            self.last_seq = seq;

            let frame = camera.last_frame()?.decode_image::<RgbFormat>()?;
            if is_empty_frame(&frame) {
                log::debug!("{}: skip empty frame", self.info.name);
                continue;
            }

            let frame = fit_frame(frame, self.config.width, self.config.height)?;
            return Ok(Some(frame));
        }
    }

    fn info(&self) -> &CameraInfo {
        &self.info
    }

    fn close(&mut self) -> CameraResult<()> {
        if let Some(mut camera) = self.camera.take() {
            camera
                .stop_stream()
                .map_err(|e| CameraError::StopError(e.to_string()))?;
            log::info!("Closed {}", self.info.name);
        }

        Ok(())
    }
}

impl Drop for WebcamSource {
    fn drop(&mut self) {
        if self.is_opened() {
            _ = self.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_before_open() {
        let mut source = WebcamSource::new(99, CameraConfig::default());
        assert!(!source.is_opened());
        assert!(matches!(source.read_frame(), Err(CameraError::NotOpened)));
        assert_eq!(source.info().to_string(), "Camera 99 (640x480 @ 30fps)");
        assert!(source.close().is_ok());
    }

    #[test]
    fn test_wait_next_seq_needs_new_frame() {
        let seq = AtomicU64::new(3);
        let start = Instant::now();

        assert_eq!(wait_next_seq(&seq, 3, start + Duration::from_millis(20)), None);
        assert!(start.elapsed() >= Duration::from_millis(20));

        assert_eq!(wait_next_seq(&seq, 2, start), Some(3));
    }

    #[test]
    fn test_wait_next_seq_wakes_on_capture() {
        let seq = Arc::new(AtomicU64::new(0));
        let capture = {
            let seq = seq.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                seq.fetch_add(1, Ordering::Release);
            })
        };

        let deadline = Instant::now() + Duration::from_secs(5);
        assert_eq!(wait_next_seq(&seq, 0, deadline), Some(1));
        capture.join().unwrap();
    }

    #[test]
    fn test_placeholder_frame_is_empty() {
        assert!(is_empty_frame(&RgbImage::new(0, 0)));
        assert!(is_empty_frame(&RgbImage::new(640, 0)));
        assert!(!is_empty_frame(&RgbImage::new(2, 2)));
    }
}
