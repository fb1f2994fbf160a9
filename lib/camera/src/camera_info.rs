use crate::{CameraConfig, FrameSource, WebcamSource};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraInfo {
    pub index: u32,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl CameraInfo {
    pub fn new(index: u32, name: impl Into<String>, config: &CameraConfig) -> Self {
        Self {
            index,
            name: name.into(),
            width: config.width,
            height: config.height,
            fps: config.fps,
        }
    }
}

impl fmt::Display for CameraInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}x{} @ {}fps)",
            self.name, self.width, self.height, self.fps
        )
    }
}

/// Tries camera indices `0..count` and keeps the ones that can be opened.
pub fn probe_cameras(count: u32) -> Vec<CameraInfo> {
    (0..count)
        .filter_map(|index| {
            let mut source = WebcamSource::new(index, CameraConfig::default());

            match source.open() {
                Ok(_) => {
                    let info = source.info().clone();
                    if let Err(e) = source.close() {
                        log::debug!("close camera {index} failed: {e}");
                    }
                    log::debug!("found {info}");
                    Some(info)
                }
                Err(e) => {
                    log::debug!("camera {index} unavailable: {e}");
                    None
                }
            }
        })
        .collect()
}
