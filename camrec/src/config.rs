use anyhow::{Context, Result, bail};
use once_cell::sync::Lazy;
use platform_dirs::AppDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

const APP_NAME: &str = "camrec";
const FACE_MODEL_FILE: &str = "version-RFB-320.onnx";
static CONFIG: Lazy<Mutex<Config>> = Lazy::new(|| Mutex::new(Config::default()));

#[derive(Serialize, Deserialize, Default, Debug, Clone)]
pub struct Config {
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(skip)]
    pub data_dir: PathBuf,

    #[serde(skip)]
    pub cache_dir: PathBuf,

    #[serde(skip)]
    pub is_first_run: bool,

    #[serde(default)]
    pub recorder: Recorder,

    #[serde(default)]
    pub camera: Camera,

    #[serde(default)]
    pub overlay: Overlay,

    #[serde(default)]
    pub preview: Preview,
}

#[derive(Serialize, Deserialize, Debug, Clone, Derivative)]
#[derivative(Default)]
#[serde(default)]
pub struct Recorder {
    #[derivative(Default(value = "\"record\".to_string()"))]
    pub record_dir: String,

    #[derivative(Default(value = "640"))]
    pub width: u32,

    #[derivative(Default(value = "480"))]
    pub height: u32,

    #[derivative(Default(value = "30"))]
    pub fps: u32,

    #[derivative(Default(value = "2_000_000"))]
    pub bitrate: u32,

    pub keep_raw_h264: bool,

    #[derivative(Default(value = "64"))]
    pub queue_size: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, Derivative)]
#[derivative(Default)]
#[serde(default)]
pub struct Camera {
    /// `webcam` or `picam`
    #[derivative(Default(value = "\"webcam\".to_string()"))]
    pub backend: String,

    pub index: u32,

    #[derivative(Default(value = "10"))]
    pub probe_count: u32,

    #[derivative(Default(value = "8888"))]
    pub picam_port: u16,

    #[derivative(Default(value = "2000"))]
    pub picam_startup_ms: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Derivative)]
#[derivative(Default)]
#[serde(default)]
pub struct Overlay {
    #[derivative(Default(value = "true"))]
    pub enable_face_detection: bool,

    #[derivative(Default(value = "true"))]
    pub enable_timer: bool,

    // empty: `<data_dir>/version-RFB-320.onnx`
    pub face_model_path: String,

    // empty: first well-known system font
    pub font_path: String,

    #[derivative(Default(value = "0.7"))]
    pub score_threshold: f32,

    #[derivative(Default(value = "0.3"))]
    pub iou_threshold: f32,

    #[derivative(Default(value = "30"))]
    pub min_face_size: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Derivative)]
#[derivative(Default)]
#[serde(default)]
pub struct Preview {
    /// Write the preview frame to `<cache_dir>/preview.png` every N frames.
    /// 0 turns snapshots off.
    #[derivative(Default(value = "30"))]
    pub snapshot_every_frames: u64,

    #[derivative(Default(value = "1000"))]
    pub status_interval_ms: u64,
}

impl Config {
    pub fn init(&mut self) -> Result<()> {
        let Some(app_dirs) = AppDirs::new(Some(APP_NAME), true) else {
            bail!("No found platform directories");
        };

        self.crate_dirs(&app_dirs)?;
        self.load().with_context(|| "load config file failed")?;
        log::debug!("{:?}", self);
        Ok(())
    }

    fn crate_dirs(&mut self, app_dirs: &AppDirs) -> Result<()> {
        self.config_path = app_dirs.config_dir.join(format!("{APP_NAME}.toml"));
        self.data_dir = app_dirs.data_dir.clone();
        self.cache_dir = app_dirs.data_dir.join("cache");

        fs::create_dir_all(&app_dirs.data_dir)?;
        fs::create_dir_all(&app_dirs.config_dir)?;
        fs::create_dir_all(&self.cache_dir)?;

        Ok(())
    }

    /// Reads `config_path`. A missing file gets the defaults written; a
    /// broken one is copied to `<file>.bak` first.
    pub fn load(&mut self) -> Result<()> {
        match fs::read_to_string(&self.config_path) {
            Ok(text) => match toml::from_str::<Config>(&text) {
                Ok(mut c) => {
                    c.config_path = self.config_path.clone();
                    c.data_dir = self.data_dir.clone();
                    c.cache_dir = self.cache_dir.clone();
                    c.is_first_run = self.is_first_run;
                    *self = c;

                    Ok(())
                }
                Err(e) => {
                    log::warn!(
                        "parse `{}` failed, defaults restored: {e}",
                        self.config_path.display()
                    );
                    self.is_first_run = true;

                    let mut bak_file = self.config_path.clone().into_os_string();
                    bak_file.push(".bak");
                    _ = fs::copy(&self.config_path, bak_file);

                    self.save()
                }
            },
            Err(_) => {
                self.is_first_run = true;
                self.save()
            }
        }
    }

    pub fn save(&self) -> Result<()> {
        match toml::to_string_pretty(self) {
            Ok(text) => Ok(fs::write(&self.config_path, text)
                .with_context(|| "save config failed".to_string())?),
            Err(e) => bail!(format!("convert config to toml format failed. {e:?}")),
        }
    }

    pub fn record_dir(&self) -> PathBuf {
        PathBuf::from(&self.recorder.record_dir)
    }

    pub fn face_model_path(&self) -> PathBuf {
        if self.overlay.face_model_path.is_empty() {
            self.data_dir.join(FACE_MODEL_FILE)
        } else {
            PathBuf::from(&self.overlay.face_model_path)
        }
    }

    pub fn font_path(&self) -> Option<&Path> {
        (!self.overlay.font_path.is_empty()).then(|| Path::new(&self.overlay.font_path))
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.cache_dir.join("preview.png")
    }
}

pub fn init() -> Result<()> {
    CONFIG.lock().unwrap().init()
}

pub fn all() -> Config {
    CONFIG.lock().unwrap().clone()
}
