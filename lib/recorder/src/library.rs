use crate::RecorderError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::{
    fs,
    path::{Path, PathBuf},
};

static FPS_IN_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)@(\d+)").unwrap());

/// Checks a user supplied recording name and returns the file name prefix
/// built from it.
pub fn validate_recording_name(name: &str) -> Result<String, RecorderError> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(RecorderError::InvalidName(name.to_string()));
    }

    Ok(format!("mem_{name}"))
}

pub fn ensure_record_dir(dir: impl AsRef<Path>) -> Result<(), RecorderError> {
    let dir = dir.as_ref();
    if !dir.exists() {
        fs::create_dir_all(dir)?;
        log::info!("Created record directory: {}", dir.display());
    }
    Ok(())
}

/// MP4 files in `dir`, sorted by file name. A missing directory has no
/// recordings.
pub fn list_recordings(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, RecorderError> {
    let dir = dir.as_ref();
    if !dir.exists() {
        return Ok(vec![]);
    }

    let mut files = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("mp4"))
        })
        .collect::<Vec<_>>();

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Reads the `<int>@<frac>` frame rate recorded in a file name.
pub fn fps_from_filename(name: &str) -> Option<f64> {
    let caps = FPS_IN_NAME.captures(name)?;
    format!("{}.{}", &caps[1], &caps[2]).parse().ok()
}

/// Frame rate to play `path` at: the one in its name, else the container's.
pub fn playback_fps(path: impl AsRef<Path>) -> Result<f64, RecorderError> {
    let path = path.as_ref();

    if let Some(fps) = path
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(fps_from_filename)
    {
        return Ok(fps);
    }

    let metadata = mp4_player::metadata::parse(path)?;
    log::info!(
        "No frame rate in `{}`, using container rate {:.2}",
        path.display(),
        metadata.frame_rate
    );
    Ok(metadata.frame_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_recording_name() {
        assert_eq!(validate_recording_name("cat01").unwrap(), "mem_cat01");

        for name in ["", "my cat", "a_b", "../x", "café"] {
            assert!(matches!(
                validate_recording_name(name),
                Err(RecorderError::InvalidName(_))
            ));
        }
    }

    #[test]
    fn test_fps_from_filename() {
        assert_eq!(
            fps_from_filename("mem_cat_2024-05-01_10-00-00_29@87.mp4"),
            Some(29.87)
        );
        assert_eq!(fps_from_filename("mem_cat_15@00.mp4"), Some(15.0));
        assert_eq!(fps_from_filename("clip.mp4"), None);
    }

    #[test]
    fn test_list_recordings() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b_2@00.mp4", "a_1@00.mp4", "raw.h264", "notes.txt", "C.MP4"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::create_dir(dir.path().join("sub.mp4")).unwrap();

        let names: Vec<_> = list_recordings(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();

        assert_eq!(names, vec!["C.MP4", "a_1@00.mp4", "b_2@00.mp4"]);
    }

    #[test]
    fn test_missing_dir_has_no_recordings() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_recordings(dir.path().join("nope")).unwrap().is_empty());

        ensure_record_dir(dir.path().join("nope")).unwrap();
        assert!(dir.path().join("nope").is_dir());
        assert!(list_recordings(dir.path().join("nope")).unwrap().is_empty());
    }

    #[test]
    fn test_playback_fps_prefers_file_name() {
        assert_eq!(playback_fps("/nowhere/mem_x_12@50.mp4").unwrap(), 12.5);
        assert!(playback_fps("/nowhere/clip.mp4").is_err());
    }
}
