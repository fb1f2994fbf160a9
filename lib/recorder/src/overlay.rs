use crate::RecorderError;
use ab_glyph::{FontArc, PxScale};
use face_detector::FaceBox;
use image::{Rgb, RgbImage};
use imageproc::{
    drawing::{draw_hollow_rect_mut, draw_text_mut},
    rect::Rect,
};
use std::{path::Path, time::Duration};

pub const FACE_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
pub const TIMER_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const FACE_BORDER_WIDTH: u32 = 2;

// Fonts tried when none is configured.
const SYSTEM_FONTS: [&str; 4] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/freefont/FreeSans.ttf",
];

pub struct Overlay {
    font: Option<FontArc>,
    pub timer_scale: f32,
    pub timer_position: (i32, i32),
    pub face_color: Rgb<u8>,
    pub timer_color: Rgb<u8>,
    pub enable_timer: bool,
    warned_no_font: bool,
}

impl Default for Overlay {
    fn default() -> Self {
        Self {
            font: None,
            timer_scale: 16.0,
            timer_position: (10, 30),
            face_color: FACE_COLOR,
            timer_color: TIMER_COLOR,
            enable_timer: true,
            warned_no_font: false,
        }
    }
}

impl Overlay {
    pub fn new(font: Option<FontArc>) -> Self {
        Self {
            font,
            ..Default::default()
        }
    }

    pub fn with_enable_timer(mut self, enable: bool) -> Self {
        self.enable_timer = enable;
        self
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn draw_faces(&self, image: &mut RgbImage, faces: &[FaceBox]) {
        let (img_w, img_h) = image.dimensions();

        for face in faces {
            for inset in 0..FACE_BORDER_WIDTH {
                let width = face.width.saturating_sub(inset * 2);
                let height = face.height.saturating_sub(inset * 2);
                let (x, y) = (face.x + inset, face.y + inset);

                if width == 0 || height == 0 || x >= img_w || y >= img_h {
                    break;
                }

                let rect = Rect::at(x as i32, y as i32).of_size(width, height);
                draw_hollow_rect_mut(image, rect, self.face_color);
            }
        }
    }

    pub fn draw_timer(&mut self, image: &mut RgbImage, elapsed: Duration) {
        if !self.enable_timer {
            return;
        }

        let Some(ref font) = self.font else {
            if !self.warned_no_font {
                log::warn!("No font available, the recording timer is not drawn");
                self.warned_no_font = true;
            }
            return;
        };

        let (x, y) = self.timer_position;
        draw_text_mut(
            image,
            self.timer_color,
            x,
            y,
            PxScale::from(self.timer_scale),
            font,
            &timer_text(elapsed),
        );
    }
}

pub fn timer_text(elapsed: Duration) -> String {
    format!("Recording: {:.2}s", elapsed.as_secs_f64())
}

pub fn load_font(path: impl AsRef<Path>) -> Result<FontArc, RecorderError> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;

    FontArc::try_from_vec(data)
        .map_err(|e| RecorderError::Font(format!("{}: {e}", path.display())))
}

/// Loads `path` if given, else the first usable well-known system font.
pub fn find_font(path: Option<&Path>) -> Option<FontArc> {
    if let Some(path) = path {
        match load_font(path) {
            Ok(font) => return Some(font),
            Err(e) => log::warn!("{e}"),
        }
    }

    SYSTEM_FONTS
        .iter()
        .map(Path::new)
        .filter(|p| p.exists())
        .find_map(|p| load_font(p).ok())
}
