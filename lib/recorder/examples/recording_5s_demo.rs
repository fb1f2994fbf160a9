use camera::{CameraBackend, CameraConfig, PiCameraOptions};
use recorder::{
    CameraSession, FrameSink, Overlay, PreviewStats, RecorderConfig, RecorderError, SessionCommand,
    find_font, unbounded,
};
use std::{thread, time::Duration};

struct LogSink;

impl FrameSink for LogSink {
    fn show(&mut self, frame: &image::RgbImage, stats: &PreviewStats) -> Result<(), RecorderError> {
        log::debug!(
            "frame {}x{}, fps: {:.2}, recorded: {}",
            frame.width(),
            frame.height(),
            stats.fps,
            stats.frames
        );
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    camera::init();

    log::info!("Recording for exactly 5 seconds...");

    let config = RecorderConfig::new("/tmp", "mem_demo").with_fps(30);
    let source = CameraBackend::Webcam.build(0, CameraConfig::default(), PiCameraOptions::default());
    let overlay = Overlay::new(find_font(None));

    let (tx, rx) = unbounded();
    tx.send(SessionCommand::ToggleRecording)?;

    let quit_tx = tx.clone();
    ctrlc::set_handler(move || {
        _ = quit_tx.send(SessionCommand::Quit);
    })?;

    thread::spawn(move || {
        thread::sleep(Duration::from_secs(5));
        log::info!("5 seconds elapsed, stopping recording...");
        _ = tx.send(SessionCommand::Quit);
    });

    let summary = CameraSession::new(config, source, None, overlay).run(&mut LogSink, &rx)?;

    for output in summary.recordings {
        log::info!(
            "saved {} ({} frames @ {:.2}fps)",
            output.path.display(),
            output.stats.frames,
            output.fps_used
        );
    }

    Ok(())
}
