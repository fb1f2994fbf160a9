use crate::{CameraConfig, CameraError, CameraInfo, CameraResult, FrameSource};
use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, bounded};
use derivative::Derivative;
use derive_setters::Setters;
use duct::ReaderHandle;
use image::RgbImage;
use mp4m::{AccessUnitBuilder, Nal, NalStream, to_annexb};
use std::{
    io::{BufRead, BufReader, ErrorKind, Read},
    net::TcpStream,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};
use video_codec::H264Decoder;

const READ_TIMEOUT: Duration = Duration::from_millis(200);
const CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(100);
const FRAME_QUEUE_SIZE: usize = 2;

#[derive(Debug, Clone, Derivative, Setters)]
#[derivative(Default)]
#[setters(prefix = "with_")]
#[non_exhaustive]
pub struct PiCameraOptions {
    #[derivative(Default(value = "\"libcamera-vid\".to_string()"))]
    pub program: String,

    #[derivative(Default(value = "8888"))]
    pub port: u16,

    /// Time the camera process gets to start listening.
    #[derivative(Default(value = "Duration::from_secs(2)"))]
    pub startup_delay: Duration,

    /// How long `read_frame` waits before giving up on the stream.
    #[derivative(Default(value = "Duration::from_secs(5)"))]
    pub frame_timeout: Duration,
}

/// Raspberry Pi camera: `libcamera-vid` serves an H.264 preview over a
/// local TCP socket, which is decoded here into RGB frames.
pub struct PiCameraSource {
    config: CameraConfig,
    options: PiCameraOptions,
    info: CameraInfo,

    process: Option<Arc<ReaderHandle>>,
    stop_sig: Arc<AtomicBool>,
    frame_receiver: Option<Receiver<RgbImage>>,
    handles: Vec<JoinHandle<()>>,
}

impl PiCameraSource {
    pub fn new(index: u32, config: CameraConfig, options: PiCameraOptions) -> Self {
        Self {
            info: CameraInfo::new(index, format!("Pi Camera {index}"), &config),
            config,
            options,
            process: None,
            stop_sig: Arc::new(AtomicBool::new(false)),
            frame_receiver: None,
            handles: vec![],
        }
    }

    pub fn preview_args(&self) -> Vec<String> {
        preview_args(&self.config, self.options.port)
    }

    fn spawn_process(&self) -> CameraResult<Arc<ReaderHandle>> {
        let args = self.preview_args();
        log::info!(
            "Starting preview with command: {} {}",
            self.options.program,
            args.join(" ")
        );

        let handle = duct::cmd(&self.options.program, &args)
            .stderr_to_stdout()
            .unchecked()
            .reader()
            .map_err(|e| CameraError::Process(format!("spawn {} failed: {e}", self.options.program)))?;

        Ok(Arc::new(handle))
    }

    fn connect(&self) -> CameraResult<TcpStream> {
        let addr = format!("127.0.0.1:{}", self.options.port);
        let deadline = Instant::now() + self.options.startup_delay;

        loop {
            match TcpStream::connect(&addr) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(READ_TIMEOUT))?;
                    log::info!("Connected to camera preview at {addr}");
                    return Ok(stream);
                }
                Err(e) if Instant::now() >= deadline => {
                    return Err(CameraError::StartError(format!(
                        "connect to {addr} failed: {e}"
                    )));
                }
                Err(_) => thread::sleep(CONNECT_RETRY_INTERVAL),
            }
        }
    }

    fn kill_process(&mut self) {
        if let Some(process) = self.process.take() {
            match process.kill() {
                Ok(_) => log::info!("Stopped {} process", self.options.program),
                Err(e) => log::warn!("kill {} failed: {e}", self.options.program),
            }
        }
    }
}

impl FrameSource for PiCameraSource {
    fn open(&mut self) -> CameraResult<()> {
        if self.process.is_some() {
            return Ok(());
        }

        self.stop_sig.store(false, Ordering::Relaxed);
        let process = self.spawn_process()?;

        let log_process = process.clone();
        let program = self.options.program.clone();
        self.handles.push(thread::spawn(move || {
            for line in BufReader::new(&*log_process).lines() {
                match line {
                    Ok(line) => log::debug!("{program} output: {}", line.trim()),
                    Err(e) => {
                        log::debug!("{program} output closed: {e}");
                        break;
                    }
                }
            }
        }));
        self.process = Some(process);

        let stream = match self.connect() {
            Ok(stream) => stream,
            Err(e) => {
                self.kill_process();
                return Err(e);
            }
        };

        let (sender, receiver) = bounded(FRAME_QUEUE_SIZE);
        let stop_sig = self.stop_sig.clone();
        self.handles
            .push(thread::spawn(move || decode_stream(stream, sender, stop_sig)));
        self.frame_receiver = Some(receiver);

        log::info!("Opened {}", self.info);
        Ok(())
    }

    fn read_frame(&mut self) -> CameraResult<Option<RgbImage>> {
        let Some(ref receiver) = self.frame_receiver else {
            return Err(CameraError::NotOpened);
        };

        match receiver.recv_timeout(self.options.frame_timeout) {
            Ok(frame) => Ok(Some(frame)),
            Err(RecvTimeoutError::Disconnected) => Ok(None),
            Err(RecvTimeoutError::Timeout) => Err(CameraError::NoFrameAvailable),
        }
    }

    fn info(&self) -> &CameraInfo {
        &self.info
    }

    fn close(&mut self) -> CameraResult<()> {
        self.stop_sig.store(true, Ordering::Relaxed);
        self.frame_receiver = None;
        self.kill_process();

        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                log::warn!("camera worker thread panicked");
            }
        }

        Ok(())
    }
}

impl Drop for PiCameraSource {
    fn drop(&mut self) {
        if self.process.is_some() {
            _ = self.close();
        }
    }
}

pub fn preview_args(config: &CameraConfig, port: u16) -> Vec<String> {
    vec![
        "-t".to_string(),
        "0".to_string(),
        "--width".to_string(),
        config.width.to_string(),
        "--height".to_string(),
        config.height.to_string(),
        "--framerate".to_string(),
        config.fps.to_string(),
        "--inline".to_string(),
        "--listen".to_string(),
        "-o".to_string(),
        format!("tcp://127.0.0.1:{port}"),
    ]
}

/// Reads an Annex B stream, decodes it and forwards the pictures. Returns
/// at end of stream or when `stop_sig` is set; the sender is dropped then,
/// which the reader sees as end of stream.
pub(crate) fn decode_stream<R: Read>(mut reader: R, sender: Sender<RgbImage>, stop_sig: Arc<AtomicBool>) {
    let mut decoder = match H264Decoder::new() {
        Ok(decoder) => decoder,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };

    let mut nal_stream = NalStream::new();
    let mut builder = AccessUnitBuilder::new();
    let mut buf = vec![0u8; 64 * 1024];

    let mut decode_nals = |nals: Vec<Nal>, builder: &mut AccessUnitBuilder| -> bool {
        for nal in nals {
            if let Some(au) = builder.push(nal)
                && !forward_picture(&mut decoder, &au, &sender)
            {
                return false;
            }
        }
        true
    };

    while !stop_sig.load(Ordering::Relaxed) {
        match reader.read(&mut buf) {
            Ok(0) => {
                log::info!("camera stream ended");
                break;
            }
            Ok(n) => {
                if !decode_nals(nal_stream.push(&buf[..n]), &mut builder) {
                    return;
                }
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => continue,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                log::warn!("read camera stream failed: {e}");
                break;
            }
        }
    }

    if !decode_nals(nal_stream.finish(), &mut builder) {
        return;
    }

    if let Some(au) = builder.finish() {
        forward_picture(&mut decoder, &au, &sender);
    }

    log::debug!("camera decoder exit, {} frames decoded", decoder.frames_decoded());
}

// Returns false once the receiving side is gone.
fn forward_picture(decoder: &mut H264Decoder, access_unit: &[Nal], sender: &Sender<RgbImage>) -> bool {
    let frame = match decoder.decode(&to_annexb(access_unit)) {
        Ok(Some(frame)) => frame,
        Ok(None) => return true,
        Err(e) => {
            log::warn!("decode camera frame failed: {e}");
            return true;
        }
    };

    match sender.try_send(frame) {
        Ok(_) => true,
        Err(crossbeam::channel::TrySendError::Full(_)) => {
            log::debug!("preview queue full, drop camera frame");
            true
        }
        Err(crossbeam::channel::TrySendError::Disconnected(_)) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::io::Cursor;
    use video_codec::{EncoderConfig, H264Encoder};

    #[test]
    fn test_preview_args() {
        let config = CameraConfig::default()
            .with_width(1280)
            .with_height(720)
            .with_fps(25);

        assert_eq!(
            preview_args(&config, 8888).join(" "),
            "-t 0 --width 1280 --height 720 --framerate 25 --inline --listen -o tcp://127.0.0.1:8888"
        );
    }

    #[test]
    fn test_missing_program_is_process_error() {
        let options = PiCameraOptions::default()
            .with_program("camrec-no-such-program".to_string())
            .with_startup_delay(Duration::from_millis(10));
        let mut source = PiCameraSource::new(0, CameraConfig::default(), options);

        assert!(matches!(source.open(), Err(CameraError::Process(_))));
        assert!(matches!(source.read_frame(), Err(CameraError::NotOpened)));
    }

    #[test]
    fn test_decode_stream_forwards_frames() {
        let mut encoder = H264Encoder::new(EncoderConfig::new(64, 48)).unwrap();
        let mut stream = vec![];
        for i in 0..3 {
            let img = RgbImage::from_pixel(64, 48, Rgb([i * 60, 20, 20]));
            stream.extend(encoder.encode(&img).unwrap());
        }

        let (sender, receiver) = bounded(8);
        decode_stream(
            Cursor::new(stream),
            sender,
            Arc::new(AtomicBool::new(false)),
        );

        let frames: Vec<_> = receiver.iter().collect();
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f.dimensions() == (64, 48)));
    }
}
