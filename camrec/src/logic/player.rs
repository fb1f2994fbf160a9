use super::{control, preview::Snapshot};
use crate::{PlayArgs, config::Config};
use anyhow::{Context, Result, bail};
use mp4_player::{Mp4Player, PlayerConfig};
use std::{
    ops::ControlFlow,
    path::{Path, PathBuf},
    sync::atomic::Ordering,
    time::{Duration, Instant},
};

pub fn play(config: &Config, args: PlayArgs) -> Result<()> {
    let path = resolve_video(&config.record_dir(), &args.file)?;
    let fps = match args.fps {
        Some(fps) => fps,
        None => recorder::playback_fps(&path)?,
    };

    let player_config = PlayerConfig::new(&path)
        .with_fps_override(fps)
        .with_looping(!args.once);
    let mut player = Mp4Player::new(player_config)
        .with_context(|| format!("open `{}` failed", path.display()))?;

    let stop_sig = player.stop_sig();
    {
        let stop_sig = stop_sig.clone();
        control::quit_on_ctrlc(move || stop_sig.store(true, Ordering::Relaxed))?;
    }

    if !args.once {
        let (tx, rx) = crossbeam::channel::unbounded::<()>();
        control::spawn_stdin_reader(tx, |line| (line.trim() == "q").then_some(()));

        let stop_sig = stop_sig.clone();
        std::thread::spawn(move || {
            if rx.recv().is_ok() {
                stop_sig.store(true, Ordering::Relaxed);
            }
        });
        println!("Looping playback, `q` + Enter or Ctrl-C to stop");
    }

    let meta = player.metadata();
    log::info!(
        "Playing {} ({}x{}, {} frames) at {fps:.2} fps",
        path.display(),
        meta.width,
        meta.height,
        meta.sample_count
    );

    let mut snapshot = Snapshot::new(
        config.snapshot_path(),
        config.preview.snapshot_every_frames,
    );
    let status_interval = Duration::from_millis(config.preview.status_interval_ms);
    let mut last_status = Instant::now();

    let summary = player.play(|frame| {
        snapshot.offer(&frame.image);

        if last_status.elapsed() >= status_interval {
            last_status = Instant::now();
            log::info!(
                "frame {} at {:.2}s",
                frame.index,
                frame.timestamp.as_secs_f64()
            );
        }

        ControlFlow::Continue(())
    })?;

    println!(
        "Played {} frames, {} loops",
        summary.frames_shown, summary.loops
    );
    Ok(())
}

/// An existing path is used as given, otherwise the name is looked up in
/// the record directory.
fn resolve_video(record_dir: &Path, file: &Path) -> Result<PathBuf> {
    if file.is_file() {
        return Ok(file.to_path_buf());
    }

    let candidate = record_dir.join(file);
    if candidate.is_file() {
        return Ok(candidate);
    }

    bail!(
        "video `{}` not found, neither as a path nor in `{}`",
        file.display(),
        record_dir.display()
    );
}
