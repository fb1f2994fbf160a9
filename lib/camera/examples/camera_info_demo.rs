use camera::{CameraConfig, FrameSource, WebcamSource, probe_cameras};

fn main() -> anyhow::Result<()> {
    env_logger::init();
    camera::init();

    let cameras = probe_cameras(10);
    println!("Found {} working cameras", cameras.len());

    for (n, cam) in cameras.iter().enumerate() {
        println!("{}. {}", n + 1, cam);
    }

    if let Some(cam) = cameras.first() {
        let mut source = WebcamSource::new(cam.index, CameraConfig::default());
        source.open()?;

        for _ in 0..10 {
            if let Some(frame) = source.read_frame()? {
                println!("frame {}x{}", frame.width(), frame.height());
            }
        }

        source.close()?;
    }

    Ok(())
}
