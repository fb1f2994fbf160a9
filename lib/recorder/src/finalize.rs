use crate::{RecorderConfig, RecorderError, RecordingStats, WriterReport};
use chrono::{DateTime, Local};
use mp4m::VideoTrack;
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, PartialEq)]
pub struct RecordingOutput {
    pub path: PathBuf,
    pub stats: RecordingStats,
    pub fps_used: f64,
}

pub fn timestamp_string(time: &DateTime<Local>) -> String {
    time.format("%Y-%m-%d_%H-%M-%S").to_string()
}

/// Two decimals with `@` for the point, e.g. `29@87`.
pub fn format_fps(fps: f64) -> String {
    format!("{fps:.2}").replace('.', "@")
}

pub fn raw_recording_path(dir: impl AsRef<Path>, prefix: &str, stamp: &str) -> PathBuf {
    dir.as_ref().join(format!("{prefix}_{stamp}.h264"))
}

pub fn final_recording_path(dir: impl AsRef<Path>, prefix: &str, stamp: &str, fps: f64) -> PathBuf {
    dir.as_ref()
        .join(format!("{prefix}_{stamp}_{}.mp4", format_fps(fps)))
}

/// `path` itself if nothing exists there yet, otherwise the first free
/// `<stem>-<n>.<ext>`.
pub fn unique_path(path: PathBuf) -> PathBuf {
    if !path.exists() {
        return path;
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    (1..)
        .map(|n| path.with_file_name(format!("{stem}-{n}{ext}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(path)
}

/// Frame rate the recording is stored with: frames actually written over
/// the wall-clock duration, or `nominal` when nothing was measured.
pub fn select_fps(frames_written: u64, stats: &RecordingStats, nominal: u32) -> f64 {
    let secs = stats.duration.as_secs_f64();

    if frames_written == 0 || secs <= 0.0 {
        nominal as f64
    } else {
        frames_written as f64 / secs
    }
}

/// Re-containers the raw stream of a finished recording with its measured
/// frame rate and removes the raw file unless it should be kept.
pub fn finalize_recording(
    report: &WriterReport,
    stats: RecordingStats,
    stamp: &str,
    frame_size: (u32, u32),
    config: &RecorderConfig,
) -> Result<RecordingOutput, RecorderError> {
    let fps_used = select_fps(report.frames_written, &stats, config.fps);
    let path = unique_path(final_recording_path(
        &config.record_dir,
        &config.name_prefix,
        stamp,
        fps_used,
    ));
    let track = VideoTrack::new(frame_size.0, frame_size.1, fps_used);

    let mux_stats = mp4m::remux_h264_file(&report.raw_path, &path, track)?;
    log::info!(
        "Saved {} frames @ {:.2}fps to {}",
        mux_stats.frames,
        fps_used,
        path.display()
    );

    if !config.keep_raw_h264 {
        if let Err(e) = fs::remove_file(&report.raw_path) {
            log::warn!("remove `{}` failed: {e}", report.raw_path.display());
        }
    }

    Ok(RecordingOutput {
        path,
        stats,
        fps_used,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FrameWriter, fps_from_filename};
    use chrono::TimeZone;
    use image::{Rgb, RgbImage};
    use std::time::Duration;
    use video_codec::EncoderConfig;

    #[test]
    fn test_names() {
        let time = Local.with_ymd_and_hms(2024, 5, 1, 9, 8, 7).unwrap();
        let stamp = timestamp_string(&time);
        assert_eq!(stamp, "2024-05-01_09-08-07");

        assert_eq!(
            raw_recording_path("/rec", "mem_cat", &stamp),
            PathBuf::from("/rec/mem_cat_2024-05-01_09-08-07.h264")
        );
        assert_eq!(
            final_recording_path("/rec", "mem_cat", &stamp, 29.874),
            PathBuf::from("/rec/mem_cat_2024-05-01_09-08-07_29@87.mp4")
        );
        assert_eq!(format_fps(30.0), "30@00");
        assert_eq!(fps_from_filename(&format_fps(7.5)), Some(7.5));
    }

    #[test]
    fn test_unique_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mem_cat_2024-05-01_09-08-07_30@00.mp4");
        assert_eq!(unique_path(path.clone()), path);

        fs::write(&path, b"first").unwrap();
        let second = unique_path(path.clone());
        assert_eq!(second, dir.path().join("mem_cat_2024-05-01_09-08-07_30@00-1.mp4"));
        assert_eq!(
            fps_from_filename(&second.file_name().unwrap().to_string_lossy()),
            Some(30.0)
        );

        fs::write(&second, b"second").unwrap();
        assert_eq!(
            unique_path(path),
            dir.path().join("mem_cat_2024-05-01_09-08-07_30@00-2.mp4")
        );
    }

    #[test]
    fn test_select_fps() {
        let stats = RecordingStats::new(Duration::from_secs(4), 100);
        assert_eq!(select_fps(100, &stats, 30), 25.0);
        assert_eq!(select_fps(90, &stats, 30), 22.5);
        assert_eq!(select_fps(0, &stats, 30), 30.0);

        let empty = RecordingStats::new(Duration::ZERO, 0);
        assert_eq!(select_fps(0, &empty, 24), 24.0);
    }

    fn record_raw(config: &RecorderConfig, stamp: &str, frames: u8) -> WriterReport {
        let raw = raw_recording_path(&config.record_dir, &config.name_prefix, stamp);
        let writer = FrameWriter::spawn(&raw, EncoderConfig::new(64, 48), 32).unwrap();
        for i in 0..frames {
            writer.submit(RgbImage::from_pixel(64, 48, Rgb([i * 10, 0, 0]))).unwrap();
        }
        writer.finish().unwrap()
    }

    #[test]
    fn test_finalize_recording() {
        let dir = tempfile::tempdir().unwrap();
        let config = RecorderConfig::new(dir.path(), "mem_cat");
        let report = record_raw(&config, "2024-05-01_09-08-07", 10);
        let stats = RecordingStats::new(Duration::from_secs(2), 10);

        let output =
            finalize_recording(&report, stats, "2024-05-01_09-08-07", (64, 48), &config).unwrap();

        assert_eq!(output.fps_used, 5.0);
        assert_eq!(
            output.path.file_name().unwrap().to_string_lossy(),
            "mem_cat_2024-05-01_09-08-07_5@00.mp4"
        );
        assert!(output.path.exists());
        assert!(!report.raw_path.exists());

        let metadata = mp4_player::metadata::parse(&output.path).unwrap();
        assert_eq!(metadata.sample_count, 10);
        assert!((metadata.frame_rate - 5.0).abs() < 0.01);
    }

    #[test]
    fn test_same_second_recordings_do_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let config = RecorderConfig::new(dir.path(), "mem_cat");
        let stats = RecordingStats::new(Duration::from_secs(1), 4);

        let first_report = record_raw(&config, "stamp", 4);
        let first = finalize_recording(&first_report, stats, "stamp", (64, 48), &config).unwrap();
        let first_len = fs::metadata(&first.path).unwrap().len();

        let second_report = record_raw(&config, "stamp", 4);
        let second = finalize_recording(&second_report, stats, "stamp", (64, 48), &config).unwrap();

        assert_ne!(first.path, second.path);
        assert_eq!(fs::metadata(&first.path).unwrap().len(), first_len);
        assert_eq!(crate::list_recordings(dir.path()).unwrap().len(), 2);
    }

    #[test]
    fn test_finalize_keeps_raw_when_asked() {
        let dir = tempfile::tempdir().unwrap();
        let config = RecorderConfig::new(dir.path(), "mem_dog").with_keep_raw_h264(true);
        let report = record_raw(&config, "stamp", 3);
        let stats = RecordingStats::new(Duration::from_secs(1), 3);

        let output = finalize_recording(&report, stats, "stamp", (64, 48), &config).unwrap();
        assert!(output.path.exists());
        assert!(report.raw_path.exists());
    }

    #[test]
    fn test_finalize_empty_recording_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = RecorderConfig::new(dir.path(), "mem_x");
        let report = record_raw(&config, "stamp", 0);
        let stats = RecordingStats::new(Duration::from_secs(1), 0);

        let err = finalize_recording(&report, stats, "stamp", (64, 48), &config);
        assert!(matches!(err, Err(RecorderError::Remux(_))));
        assert!(report.raw_path.exists());
    }
}
