use crate::FaceBox;
use derivative::Derivative;
use derive_setters::Setters;

#[derive(Debug, Clone, Copy, PartialEq, Derivative, Setters)]
#[derivative(Default)]
#[setters(prefix = "with_")]
#[non_exhaustive]
pub struct DetectorOptions {
    #[derivative(Default(value = "0.7"))]
    pub score_threshold: f32,

    #[derivative(Default(value = "0.3"))]
    pub iou_threshold: f32,

    /// Smallest accepted face, width and height in pixels.
    #[derivative(Default(value = "(30, 30)"))]
    pub min_size: (u32, u32),
}

/// Turns raw detector output into face boxes on a `width` x `height` image.
///
/// `scores` holds `[background, face]` pairs and `boxes` holds
/// `[x1, y1, x2, y2]` corners normalised to `0..1`, one entry per anchor.
pub fn decode_detections(
    scores: &[f32],
    boxes: &[f32],
    width: u32,
    height: u32,
    options: &DetectorOptions,
) -> Vec<FaceBox> {
    let (w, h) = (width as f32, height as f32);

    let candidates = scores
        .chunks_exact(2)
        .zip(boxes.chunks_exact(4))
        .filter(|(score, _)| score[1] >= options.score_threshold)
        .filter_map(|(score, corners)| {
            let x1 = (corners[0] * w).clamp(0.0, w);
            let y1 = (corners[1] * h).clamp(0.0, h);
            let x2 = (corners[2] * w).clamp(0.0, w);
            let y2 = (corners[3] * h).clamp(0.0, h);

            if x2 <= x1 || y2 <= y1 {
                return None;
            }

            let face = FaceBox {
                x: x1 as u32,
                y: y1 as u32,
                width: (x2 - x1) as u32,
                height: (y2 - y1) as u32,
                score: score[1],
            };

            (face.width >= options.min_size.0 && face.height >= options.min_size.1)
                .then_some(face)
        })
        .collect();

    nms(candidates, options.iou_threshold)
}

pub fn iou(a: &FaceBox, b: &FaceBox) -> f32 {
    let left = a.x.max(b.x);
    let top = a.y.max(b.y);
    let right = (a.x + a.width).min(b.x + b.width);
    let bottom = (a.y + a.height).min(b.y + b.height);

    if right <= left || bottom <= top {
        return 0.0;
    }

    let inter = ((right - left) * (bottom - top)) as f32;
    let union = (a.area() + b.area()) as f32 - inter;

    if union <= 0.0 { 0.0 } else { inter / union }
}

/// Greedy non-maximum suppression. The result is sorted by descending score.
pub fn nms(mut faces: Vec<FaceBox>, iou_threshold: f32) -> Vec<FaceBox> {
    faces.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept: Vec<FaceBox> = Vec::with_capacity(faces.len());
    for face in faces {
        if kept.iter().all(|k| iou(k, &face) <= iou_threshold) {
            kept.push(face);
        }
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(x: u32, y: u32, w: u32, h: u32, score: f32) -> FaceBox {
        FaceBox {
            x,
            y,
            width: w,
            height: h,
            score,
        }
    }

    #[test]
    fn test_iou() {
        let a = face(0, 0, 10, 10, 1.0);
        assert_eq!(iou(&a, &a), 1.0);
        assert_eq!(iou(&a, &face(20, 20, 10, 10, 1.0)), 0.0);

        let half = iou(&a, &face(5, 0, 10, 10, 1.0));
        assert!((half - 50.0 / 150.0).abs() < 1e-6);
    }

    #[test]
    fn test_nms_keeps_best_of_overlapping() {
        let faces = vec![
            face(0, 0, 100, 100, 0.8),
            face(5, 5, 100, 100, 0.95),
            face(300, 300, 50, 50, 0.75),
        ];

        let kept = nms(faces, 0.3);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].score, 0.95);
        assert_eq!(kept[1].x, 300);
    }

    #[test]
    fn test_decode_detections() {
        let options = DetectorOptions::default();
        let scores = [
            0.1, 0.9, // face
            0.8, 0.2, // background
            0.05, 0.95, // face, overlaps the first one
            0.2, 0.8, // too small
        ];
        let boxes = [
            0.1, 0.1, 0.5, 0.5, //
            0.0, 0.0, 1.0, 1.0, //
            0.12, 0.12, 0.52, 0.52, //
            0.9, 0.9, 0.91, 0.91, //
        ];

        let faces = decode_detections(&scores, &boxes, 320, 240, &options);
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].score, 0.95);
        assert_eq!((faces[0].x, faces[0].y), (38, 28));
    }

    #[test]
    fn test_boxes_are_clamped_to_image() {
        let options = DetectorOptions::default().with_min_size((1, 1));
        let faces = decode_detections(&[0.0, 0.99], &[-0.2, -0.1, 1.3, 0.5], 100, 100, &options);

        assert_eq!(faces.len(), 1);
        assert_eq!((faces[0].x, faces[0].y), (0, 0));
        assert_eq!((faces[0].width, faces[0].height), (100, 50));
    }
}
