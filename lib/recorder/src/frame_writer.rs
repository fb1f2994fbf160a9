use crate::RecorderError;
use crossbeam::channel::{Receiver, Sender, TrySendError, bounded};
use image::{RgbImage, imageops};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    thread::{self, JoinHandle},
};
use video_codec::{EncoderConfig, H264Encoder};

pub enum WriterMessage {
    Frame(RgbImage),
    End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterReport {
    pub raw_path: PathBuf,
    pub frames_written: u64,
    pub bytes_written: u64,
}

/// Encodes frames to a raw H.264 file on a background thread.
///
/// Frames go through a bounded queue. [`FrameWriter::submit`] never blocks:
/// when the queue is full the frame is rejected and the caller decides what
/// to do with it. Once the thread has exited, `submit` fails and
/// [`FrameWriter::finish`] returns the error that stopped it.
pub struct FrameWriter {
    raw_path: PathBuf,
    frame_sender: Sender<WriterMessage>,
    writer_worker: JoinHandle<Result<WriterReport, RecorderError>>,
}

impl FrameWriter {
    /// Creates `raw_path` and starts the writer thread. Frames whose size
    /// differs from `config` are cropped to it.
    pub fn spawn(
        raw_path: impl AsRef<Path>,
        config: EncoderConfig,
        queue_size: usize,
    ) -> Result<Self, RecorderError> {
        if queue_size == 0 {
            return Err(RecorderError::InvalidConfig(
                "writer queue size is 0".to_string(),
            ));
        }

        if config.width == 0 || config.height == 0 || config.width % 2 != 0 || config.height % 2 != 0 {
            return Err(RecorderError::InvalidConfig(format!(
                "frame size {}x{} can not be encoded",
                config.width, config.height
            )));
        }

        let raw_path = raw_path.as_ref().to_path_buf();
        let file = File::create(&raw_path)?;
        log::info!("Creating H.264 file: {}", raw_path.display());

        let (frame_sender, frame_receiver) = bounded(queue_size);
        let path = raw_path.clone();
        let writer_worker =
            thread::spawn(move || Self::writer_thread(frame_receiver, file, path, config));

        Ok(Self {
            raw_path,
            frame_sender,
            writer_worker,
        })
    }

    pub fn raw_path(&self) -> &Path {
        &self.raw_path
    }

    /// Queues a frame without blocking. `Ok(false)` means the queue was
    /// full and the frame was dropped.
    pub fn submit(&self, frame: RgbImage) -> Result<bool, RecorderError> {
        match self.frame_sender.try_send(WriterMessage::Frame(frame)) {
            Ok(_) => Ok(true),
            Err(TrySendError::Full(_)) => Ok(false),
            Err(TrySendError::Disconnected(_)) => Err(RecorderError::WriterFailed(format!(
                "writer thread for `{}` has exited",
                self.raw_path.display()
            ))),
        }
    }

    pub fn queued(&self) -> usize {
        self.frame_sender.len()
    }

    /// Flushes the queued frames and waits for the writer thread.
    pub fn finish(self) -> Result<WriterReport, RecorderError> {
        if self.frame_sender.send(WriterMessage::End).is_err() {
            log::debug!("writer thread exited before `End`");
        }

        self.writer_worker
            .join()
            .map_err(|_| RecorderError::WriterFailed("writer thread panicked".to_string()))?
    }

    fn writer_thread(
        frame_receiver: Receiver<WriterMessage>,
        file: File,
        raw_path: PathBuf,
        config: EncoderConfig,
    ) -> Result<WriterReport, RecorderError> {
        let (width, height) = (config.width, config.height);
        let mut encoder = H264Encoder::new(config)?;
        let mut h264_file = BufWriter::new(file);
        let mut report = WriterReport {
            raw_path,
            frames_written: 0,
            bytes_written: 0,
        };

        log::debug!("Writer thread started");

        while let Ok(message) = frame_receiver.recv() {
            let frame = match message {
                WriterMessage::Frame(frame) => frame,
                WriterMessage::End => {
                    log::info!("h264 writer thread received `End` signal");
                    break;
                }
            };

            let frame = if frame.dimensions() != (width, height) {
                imageops::crop_imm(&frame, 0, 0, width, height).to_image()
            } else {
                frame
            };

            if frame.dimensions() != (width, height) {
                log::warn!(
                    "drop {}x{} frame, expected {width}x{height}",
                    frame.width(),
                    frame.height()
                );
                continue;
            }

            let data = match encoder.encode(&frame) {
                Ok(data) => data,
                Err(e) => {
                    log::warn!("encode frame failed: {e}");
                    continue;
                }
            };

            if let Err(e) = h264_file.write_all(&data) {
                log::error!("write `{}` failed: {e}", report.raw_path.display());
                return Err(e.into());
            }
            report.frames_written += 1;
            report.bytes_written += data.len() as u64;
        }

        h264_file.flush()?;

        log::info!(
            "Successfully created H.264 file with {} frames ({} bytes): {}",
            report.frames_written,
            report.bytes_written,
            report.raw_path.display()
        );

        Ok(report)
    }
}
