use face_detector::{DetectorOptions, FaceDetect, UltraFaceDetector};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let (Some(model), Some(image)) = (args.next(), args.next()) else {
        anyhow::bail!("usage: detect_demo <version-RFB-320.onnx> <image.png>");
    };

    let image = image::open(image)?.to_rgb8();
    let mut detector = UltraFaceDetector::new(model, DetectorOptions::default())?;

    for face in detector.detect(&image)? {
        println!("{face:?}");
    }

    Ok(())
}
