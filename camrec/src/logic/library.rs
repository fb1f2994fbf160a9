use crate::config::Config;
use anyhow::{Context, Result};
use std::path::Path;

pub fn list(config: &Config) -> Result<()> {
    let dir = config.record_dir();
    let files = recorder::list_recordings(&dir)
        .with_context(|| format!("read `{}` failed", dir.display()))?;

    if files.is_empty() {
        println!("No video files found.");
        return Ok(());
    }

    println!("Recordings in {}:", dir.display());
    for (n, path) in files.iter().enumerate() {
        println!("{}. {}", n + 1, describe(path));
    }

    Ok(())
}

fn describe(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    match recorder::fps_from_filename(&name) {
        Some(fps) => format!("{name} ({fps:.2} fps)"),
        None => name,
    }
}
