use crate::{
    FrameWriter, Overlay, RecorderConfig, RecorderError, RecordingController, RecordingOutput,
    SimpleFpsCounter, WriterReport, ensure_record_dir, finalize_recording,
    raw_recording_path, timestamp_string, unique_path,
};
use camera::FrameSource;
use chrono::Local;
use crossbeam::channel::Receiver;
use face_detector::FaceDetect;
use image::RgbImage;
use std::{path::PathBuf, time::Duration, time::Instant};
use video_codec::EncoderConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    ToggleRecording,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewStats {
    pub fps: f32,
    pub recording: bool,
    pub elapsed: Option<Duration>,
    pub frames: u64,
}

/// Live display surface.
pub trait FrameSink {
    fn show(&mut self, frame: &RgbImage, stats: &PreviewStats) -> Result<(), RecorderError>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSummary {
    pub frames_seen: u64,
    pub dropped_frames: u64,
    pub recordings: Vec<RecordingOutput>,
}

struct ActiveRecording {
    stamp: String,
    raw_path: PathBuf,
    writer: Option<FrameWriter>,
    frame_size: (u32, u32),
    dropped: u64,
}

/// Camera preview loop with start/stop recording.
///
/// Each iteration reads a frame, draws the detected faces and the recording
/// timer on it, shows it on the sink and, while recording, queues it for
/// the writer thread. The writer is created with the first recorded frame
/// so that it always encodes at the size the camera really delivers.
pub struct CameraSession {
    config: RecorderConfig,
    source: Box<dyn FrameSource>,
    detector: Option<Box<dyn FaceDetect>>,
    overlay: Overlay,

    controller: RecordingController,
    fps_counter: SimpleFpsCounter,
    active: Option<ActiveRecording>,
    summary: SessionSummary,
}

impl CameraSession {
    pub fn new(
        config: RecorderConfig,
        source: Box<dyn FrameSource>,
        detector: Option<Box<dyn FaceDetect>>,
        overlay: Overlay,
    ) -> Self {
        Self {
            config,
            source,
            detector,
            overlay,
            controller: RecordingController::new(),
            fps_counter: SimpleFpsCounter::new(),
            active: None,
            summary: SessionSummary::default(),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.controller.is_recording()
    }

    /// Runs until `Quit`, the end of the camera stream or a fatal error. A
    /// recording still running at that point is stopped and saved.
    pub fn run(
        mut self,
        sink: &mut dyn FrameSink,
        commands: &Receiver<SessionCommand>,
    ) -> Result<SessionSummary, RecorderError> {
        ensure_record_dir(&self.config.record_dir)?;
        self.source.open()?;
        log::info!("Camera FPS: {}, {}", self.config.fps, self.source.info());

        let result = self.run_loop(sink, commands);

        if self.controller.is_recording() {
            self.stop_recording();
        }

        if let Err(e) = self.source.close() {
            log::warn!("close camera failed: {e}");
        }

        result.map(|_| self.summary)
    }

    fn run_loop(
        &mut self,
        sink: &mut dyn FrameSink,
        commands: &Receiver<SessionCommand>,
    ) -> Result<(), RecorderError> {
        loop {
            for command in commands.try_iter() {
                match command {
                    SessionCommand::ToggleRecording => self.toggle_recording(),
                    SessionCommand::Quit => {
                        log::info!("Quit camera session");
                        return Ok(());
                    }
                }
            }

            let mut frame = match self.source.read_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    log::warn!("Failed to read frame: end of stream");
                    return Ok(());
                }
                Err(e) => {
                    log::warn!("Failed to read frame: {e}");
                    return Ok(());
                }
            };

            self.summary.frames_seen += 1;
            let now = Instant::now();
            let fps = self.fps_counter.add_frame(now);

            if let Some(ref mut detector) = self.detector {
                match detector.detect(&frame) {
                    Ok(faces) => self.overlay.draw_faces(&mut frame, &faces),
                    Err(e) => log::warn!("face detection failed: {e}"),
                }
            }

            let elapsed = self.controller.elapsed(now);
            if let Some(elapsed) = elapsed {
                self.overlay.draw_timer(&mut frame, elapsed);
            }

            let stats = PreviewStats {
                fps,
                recording: self.controller.is_recording(),
                elapsed,
                frames: self.controller.frame_count(),
            };

            if let Err(e) = sink.show(&frame, &stats) {
                log::warn!("show frame failed: {e}");
            }

            if self.controller.is_recording() {
                self.record_frame(frame)?;
            }
        }
    }

    fn toggle_recording(&mut self) {
        if self.controller.is_recording() {
            self.stop_recording();
        } else {
            self.start_recording();
        }
    }

    fn start_recording(&mut self) {
        if let Err(e) = self.controller.start(Instant::now()) {
            log::warn!("{e}");
            return;
        }

        let stamp = timestamp_string(&Local::now());
        let raw_path = unique_path(raw_recording_path(
            &self.config.record_dir,
            &self.config.name_prefix,
            &stamp,
        ));

        log::info!("Recording started on {}...", self.source.info());
        log::info!("Saving video to: {}", raw_path.display());

        self.active = Some(ActiveRecording {
            stamp,
            raw_path,
            writer: None,
            frame_size: (0, 0),
            dropped: 0,
        });
    }

    fn record_frame(&mut self, frame: RgbImage) -> Result<(), RecorderError> {
        let Some(ref mut active) = self.active else {
            return Ok(());
        };

        self.controller.count_frame();

        if active.writer.is_none() {
            // the encoder needs even dimensions
            let (width, height) = (frame.width() & !1, frame.height() & !1);
            let encoder_config = EncoderConfig::new(width, height)
                .with_fps(self.config.fps as f32)
                .with_bitrate(self.config.bitrate);

            active.writer = Some(FrameWriter::spawn(
                &active.raw_path,
                encoder_config,
                self.config.queue_size,
            )?);
            active.frame_size = (width, height);
        }

        let submitted = match active.writer {
            Some(ref writer) => writer.submit(frame),
            None => Ok(true),
        };

        match submitted {
            Ok(true) => {}
            Ok(false) => {
                active.dropped += 1;
                self.summary.dropped_frames += 1;
                log::warn!("writer queue is full, drop frame. dropped: {}", active.dropped);
            }
            Err(e) => {
                log::error!("{e}, stop recording");
                self.stop_recording();
            }
        }

        Ok(())
    }

    fn stop_recording(&mut self) {
        let stats = match self.controller.stop(Instant::now()) {
            Ok(stats) => stats,
            Err(e) => {
                log::warn!("{e}");
                return;
            }
        };

        log::info!(
            "Recording stopped on {}. Duration: {:.2} seconds, Frames: {}, Actual FPS: {:.2}",
            self.source.info().name,
            stats.duration.as_secs_f64(),
            stats.frames,
            stats.actual_fps
        );

        let Some(active) = self.active.take() else {
            return;
        };

        let Some(writer) = active.writer else {
            log::warn!("No frames recorded, nothing to save");
            return;
        };

        let report: WriterReport = match writer.finish() {
            Ok(report) => report,
            Err(e) => {
                log::error!("Failed to write `{}`: {e}", active.raw_path.display());
                return;
            }
        };

        if active.dropped > 0 {
            log::warn!(
                "{} of {} frames were dropped",
                active.dropped,
                stats.frames
            );
        }

        match finalize_recording(&report, stats, &active.stamp, active.frame_size, &self.config) {
            Ok(output) => self.summary.recordings.push(output),
            Err(e) => log::error!(
                "Failed to save recording, raw stream kept at `{}`: {e}",
                report.raw_path.display()
            ),
        }
    }
}
