use crate::config::Config;
use anyhow::{Result, bail};

pub fn list_cameras(config: &Config) -> Result<()> {
    let cameras = camera::probe_cameras(config.camera.probe_count);
    if cameras.is_empty() {
        bail!("No cameras found.");
    }

    println!("Available cameras:");
    for (n, info) in cameras.iter().enumerate() {
        println!("{}. {info}", n + 1);
    }

    Ok(())
}
