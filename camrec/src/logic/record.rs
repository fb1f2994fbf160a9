use super::{
    control,
    preview::{CliSink, Snapshot},
};
use crate::{RecordArgs, config::Config};
use anyhow::{Context, Result, bail};
use camera::{CameraBackend, CameraConfig, PiCameraOptions};
use crossbeam::channel::{Sender, unbounded};
use face_detector::{DetectorOptions, FaceDetect, UltraFaceDetector};
use recorder::{CameraSession, Overlay, RecorderConfig, SessionCommand, SessionSummary};
use std::{thread, time::Duration};

pub fn record(config: &Config, args: RecordArgs) -> Result<()> {
    let prefix = recorder::validate_recording_name(&args.name)?;

    let backend = match args.backend {
        Some(backend) => backend,
        None => config
            .camera
            .backend
            .parse::<CameraBackend>()
            .with_context(|| "invalid `camera.backend` in config file")?,
    };
    let index = args.camera.unwrap_or(config.camera.index);

    let camera_config = CameraConfig::default()
        .with_width(config.recorder.width)
        .with_height(config.recorder.height)
        .with_fps(config.recorder.fps);
    let options = PiCameraOptions::default()
        .with_port(config.camera.picam_port)
        .with_startup_delay(Duration::from_millis(config.camera.picam_startup_ms));
    let source = backend.build(index, camera_config, options);

    let detector = if args.no_faces || !config.overlay.enable_face_detection {
        None
    } else {
        init_detector(config)
    };

    let overlay = Overlay::new(recorder::find_font(config.font_path()))
        .with_enable_timer(config.overlay.enable_timer && !args.no_timer);

    let recorder_config = RecorderConfig::new(config.record_dir(), prefix)
        .with_fps(config.recorder.fps)
        .with_bitrate(config.recorder.bitrate)
        .with_queue_size(config.recorder.queue_size)
        .with_keep_raw_h264(config.recorder.keep_raw_h264);

    let (tx, rx) = unbounded();
    {
        let tx = tx.clone();
        control::quit_on_ctrlc(move || {
            _ = tx.send(SessionCommand::Quit);
        })?;
    }

    match args.duration {
        Some(duration) => {
            let duration = checked_duration(duration)?;
            _ = tx.send(SessionCommand::ToggleRecording);
            quit_after(tx, duration);
            println!("Recording for {:.1}s, Ctrl-C to stop early", duration.as_secs_f64());
        }
        None => {
            if args.autostart {
                _ = tx.send(SessionCommand::ToggleRecording);
            }
            print_controls();
            control::spawn_stdin_reader(tx, control::parse_command);
        }
    }

    let mut sink = CliSink::new(
        Snapshot::new(config.snapshot_path(), config.preview.snapshot_every_frames),
        Duration::from_millis(config.preview.status_interval_ms),
    );

    log::info!("Using {backend} camera {index}");
    let summary = CameraSession::new(recorder_config, source, detector, overlay)
        .run(&mut sink, &rx)
        .with_context(|| "camera session failed")?;

    print_summary(&summary);
    Ok(())
}

fn init_detector(config: &Config) -> Option<Box<dyn FaceDetect>> {
    let options = DetectorOptions::default()
        .with_score_threshold(config.overlay.score_threshold)
        .with_iou_threshold(config.overlay.iou_threshold)
        .with_min_size((config.overlay.min_face_size, config.overlay.min_face_size));

    match UltraFaceDetector::new(config.face_model_path(), options) {
        Ok(detector) => Some(Box::new(detector)),
        Err(e) => {
            log::error!("Error initializing face detector: {e}");
            log::warn!("Face detection will be disabled.");
            None
        }
    }
}

fn checked_duration(secs: f64) -> Result<Duration> {
    if !secs.is_finite() || secs <= 0.0 {
        bail!("duration must be a positive number of seconds, got {secs}");
    }

    Duration::try_from_secs_f64(secs)
        .with_context(|| format!("duration {secs}s is out of range"))
}

fn quit_after(tx: Sender<SessionCommand>, duration: Duration) {
    thread::spawn(move || {
        thread::sleep(duration);
        _ = tx.send(SessionCommand::Quit);
    });
}

fn print_controls() {
    println!("Controls:");
    println!("  Enter or `r` + Enter: start/stop recording");
    println!("  `q` + Enter or Ctrl-C: quit");
}

fn print_summary(summary: &SessionSummary) {
    if summary.dropped_frames > 0 {
        log::warn!("{} frames dropped by a full writer queue", summary.dropped_frames);
    }

    if summary.recordings.is_empty() {
        println!("No recordings saved.");
        return;
    }

    for output in &summary.recordings {
        println!(
            "Saved {} ({:.1}s, {} frames, {:.2} fps)",
            output.path.display(),
            output.stats.duration.as_secs_f64(),
            output.stats.frames,
            output.fps_used
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_duration() {
        assert_eq!(checked_duration(2.5).unwrap(), Duration::from_millis(2500));
        assert!(checked_duration(0.0).is_err());
        assert!(checked_duration(-1.0).is_err());
        assert!(checked_duration(f64::NAN).is_err());
        assert!(checked_duration(1e20).is_err());
    }

    #[test]
    fn test_missing_model_disables_detection() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.overlay.face_model_path = dir.path().join("none.onnx").display().to_string();

        assert!(init_detector(&config).is_none());
    }
}
