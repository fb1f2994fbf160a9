//! Camera recorder command line front-end.
//!
//! Subcommands list the connected cameras, run a live preview with
//! start/stop recording, list the recordings and play them back at the
//! frame rate they were recorded with.

#[macro_use]
extern crate derivative;

mod config;
mod logic;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::{io::Write, path::PathBuf};

#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Cli {
    /// Print debug logs
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the cameras that can be opened
    Cameras,

    /// Preview a camera and record clips from it
    Record(RecordArgs),

    /// List recorded videos
    List,

    /// Play a recorded video
    Play(PlayArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RecordArgs {
    /// Recording name, letters and digits only
    #[arg(short, long)]
    pub name: String,

    /// Camera index
    #[arg(short, long)]
    pub camera: Option<u32>,

    /// `webcam` or `picam`
    #[arg(short, long)]
    pub backend: Option<camera::CameraBackend>,

    /// Disable face detection
    #[arg(long)]
    pub no_faces: bool,

    /// Disable the recording timer
    #[arg(long)]
    pub no_timer: bool,

    /// Record immediately and quit after this many seconds
    #[arg(short, long)]
    pub duration: Option<f64>,

    /// Start recording as soon as the camera is open
    #[arg(long)]
    pub autostart: bool,
}

#[derive(Args, Debug, Clone)]
pub struct PlayArgs {
    /// Video file, or a file name in the record directory
    pub file: PathBuf,

    /// Play once instead of looping
    #[arg(long)]
    pub once: bool,

    /// Override the playback frame rate
    #[arg(long)]
    pub fps: Option<f64>,
}

pub fn init_logger(verbose: bool) {
    let mut builder = env_logger::builder();
    builder
        .filter_level(log::LevelFilter::Info)
        .parse_default_env();

    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }

    builder
        .format(|buf, record| {
            let style = buf.default_level_style(record.level());
            let ts = chrono::Local::now().format("%H:%M:%S");

            writeln!(
                buf,
                "[{} {style}{}{style:#} {} {}] {}",
                ts,
                record.level(),
                record
                    .file()
                    .unwrap_or("None")
                    .split('/')
                    .next_back()
                    .unwrap_or("None"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .init();
}

pub fn run(cli: Cli) -> Result<()> {
    config::init()?;
    camera::init();

    let config = config::all();
    if config.is_first_run {
        log::info!("Created config file: {}", config.config_path.display());
    }

    match cli.command {
        Command::Cameras => logic::cameras::list_cameras(&config),
        Command::Record(args) => logic::record::record(&config, args),
        Command::List => logic::library::list(&config),
        Command::Play(args) => logic::player::play(&config, args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camera::CameraBackend;

    #[test]
    fn test_parse_record() {
        let cli = Cli::parse_from([
            "camrec", "record", "--name", "cat", "-b", "picam", "--no-faces", "-d", "2.5",
        ]);

        let Command::Record(args) = cli.command else {
            panic!("expected record");
        };
        assert_eq!(args.name, "cat");
        assert_eq!(args.backend, Some(CameraBackend::PiCamera));
        assert!(args.no_faces);
        assert!(!args.no_timer);
        assert_eq!(args.duration, Some(2.5));
    }

    #[test]
    fn test_parse_play() {
        let cli = Cli::parse_from(["camrec", "-v", "play", "clip_29@87.mp4", "--once"]);
        assert!(cli.verbose);

        let Command::Play(args) = cli.command else {
            panic!("expected play");
        };
        assert_eq!(args.file, PathBuf::from("clip_29@87.mp4"));
        assert!(args.once);
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let err = Cli::try_parse_from(["camrec", "record", "-n", "cat", "-b", "usb"]);
        assert!(err.is_err());
    }
}
