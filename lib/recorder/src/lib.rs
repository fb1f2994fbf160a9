//! # Camrec Recorder Library
//!
//! Camera preview and recording pipeline.
//!
//! A [`CameraSession`] pulls frames from a [`camera::FrameSource`], draws
//! detected faces and the recording timer on them and hands them to a
//! [`FrameSink`] for display. While recording, frames are queued to a
//! [`FrameWriter`] thread that encodes them into a raw H.264 file. When the
//! recording stops, the raw stream is re-containered into an MP4 carrying
//! the frame rate that was actually achieved, and the rate is kept in the
//! file name as `<int>@<frac>`.
//!
//! ```no_run
//! use camera::{CameraBackend, CameraConfig, PiCameraOptions};
//! use recorder::{CameraSession, Overlay, RecorderConfig, SessionCommand, validate_recording_name};
//!
//! # struct NullSink;
//! # impl recorder::FrameSink for NullSink {
//! #     fn show(&mut self, _: &image::RgbImage, _: &recorder::PreviewStats) -> Result<(), recorder::RecorderError> { Ok(()) }
//! # }
//! let prefix = validate_recording_name("cat").unwrap();
//! let config = RecorderConfig::new("/tmp/recordings", prefix);
//! let source = CameraBackend::Webcam.build(0, CameraConfig::default(), PiCameraOptions::default());
//!
//! let (tx, rx) = crossbeam::channel::unbounded();
//! tx.send(SessionCommand::ToggleRecording).unwrap();
//!
//! let summary = CameraSession::new(config, source, None, Overlay::new(None))
//!     .run(&mut NullSink, &rx)
//!     .unwrap();
//! println!("{} recordings", summary.recordings.len());
//! ```

mod finalize;
mod frame_writer;
mod library;
mod overlay;
mod recorder_config;
mod recorder_error;
mod session;
mod state;

pub use crossbeam::channel::{Receiver, Sender, bounded, unbounded};
pub use finalize::{
    RecordingOutput, final_recording_path, finalize_recording, format_fps, raw_recording_path,
    select_fps, timestamp_string, unique_path,
};
pub use frame_writer::{FrameWriter, WriterMessage, WriterReport};
pub use library::{
    ensure_record_dir, fps_from_filename, list_recordings, playback_fps, validate_recording_name,
};
pub use overlay::{FACE_COLOR, Overlay, TIMER_COLOR, find_font, load_font, timer_text};
pub use recorder_config::{RecorderConfig, SimpleFpsCounter};
pub use recorder_error::RecorderError;
pub use session::{CameraSession, FrameSink, PreviewStats, SessionCommand, SessionSummary};
pub use state::{RecordState, RecordingController, RecordingStats, ToggleOutcome};
