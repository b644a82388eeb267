// src/yolo.rs

use crate::detector::{Detection, Detector};
use crate::types::{Frame, ModelConfig};
use anyhow::{bail, Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use tracing::{debug, info};

const YOLO_INPUT_SIZE: usize = 640;
const YOLO_CLASSES: usize = 80;
const YOLO_PREDICTIONS: usize = 8400;

/// COCO class names, indexed by model class id.
const COCO_CLASS_NAMES: [&str; YOLO_CLASSES] = [
    "person",
    "bicycle",
    "car",
    "motorcycle",
    "airplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic light",
    "fire hydrant",
    "stop sign",
    "parking meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "backpack",
    "umbrella",
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports ball",
    "kite",
    "baseball bat",
    "baseball glove",
    "skateboard",
    "surfboard",
    "tennis racket",
    "bottle",
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot dog",
    "pizza",
    "donut",
    "cake",
    "chair",
    "couch",
    "potted plant",
    "bed",
    "dining table",
    "toilet",
    "tv",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];

/// ONNX Runtime YOLO backend. Parses the YOLOv8 output layout
/// `[1, 84, 8400]` (4 box coordinates + 80 class scores per prediction).
pub struct YoloDetector {
    session: Session,
    confidence_threshold: f32,
    nms_threshold: f32,
}

impl YoloDetector {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        info!("Loading YOLO model: {}", config.path);

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(config.num_threads)?
            .commit_from_file(&config.path)
            .context("Failed to load model")?;

        info!(
            "✓ YOLO detector initialized (confidence {:.2}, nms {:.2})",
            config.confidence_threshold, config.nms_threshold
        );

        Ok(Self {
            session,
            confidence_threshold: config.confidence_threshold,
            nms_threshold: config.nms_threshold,
        })
    }

    fn run_session(&mut self, input: Vec<f32>) -> Result<Vec<f32>> {
        let shape = [1, 3, YOLO_INPUT_SIZE, YOLO_INPUT_SIZE];
        let input_value =
            ort::value::Value::from_array((shape.as_slice(), input.into_boxed_slice()))?;

        let outputs = self.session.run(ort::inputs!["images" => input_value])?;
        let output = &outputs[0];
        let (_, data) = output.try_extract_tensor::<f32>()?;

        Ok(data.to_vec())
    }
}

impl Detector for YoloDetector {
    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let (input, scale, pad_x, pad_y) = letterbox(&frame.data, frame.width, frame.height);
        let output = self.run_session(input)?;
        let detections = parse_detections(
            &output,
            scale,
            pad_x,
            pad_y,
            self.confidence_threshold,
            self.nms_threshold,
        )?;

        debug!("Detected {} objects", detections.len());
        Ok(detections)
    }

    fn class_name(&self, class_id: usize) -> &str {
        COCO_CLASS_NAMES.get(class_id).copied().unwrap_or("unknown")
    }
}

/// Scale the RGB frame into a 640x640 gray-padded canvas, normalized to
/// [0, 1] in CHW order. Returns the input tensor plus the scale and padding
/// needed to map boxes back to frame coordinates.
fn letterbox(src: &[u8], src_w: usize, src_h: usize) -> (Vec<f32>, f32, f32, f32) {
    let target = YOLO_INPUT_SIZE;

    let scale = (target as f32 / src_w as f32).min(target as f32 / src_h as f32);
    let scaled_w = ((src_w as f32 * scale) as usize).max(1);
    let scaled_h = ((src_h as f32 * scale) as usize).max(1);

    let pad_x = (target - scaled_w) as f32 / 2.0;
    let pad_y = (target - scaled_h) as f32 / 2.0;

    let resized = resize_bilinear(src, src_w, src_h, scaled_w, scaled_h);

    let mut canvas = vec![114u8; target * target * 3];
    for y in 0..scaled_h {
        for x in 0..scaled_w {
            let src_idx = (y * scaled_w + x) * 3;
            let dst_x = x + pad_x as usize;
            let dst_y = y + pad_y as usize;
            let dst_idx = (dst_y * target + dst_x) * 3;
            canvas[dst_idx..dst_idx + 3].copy_from_slice(&resized[src_idx..src_idx + 3]);
        }
    }

    let mut input = vec![0.0f32; 3 * target * target];
    for c in 0..3 {
        for h in 0..target {
            for w in 0..target {
                let hwc_idx = (h * target + w) * 3 + c;
                let chw_idx = c * target * target + h * target + w;
                input[chw_idx] = canvas[hwc_idx] as f32 / 255.0;
            }
        }
    }

    (input, scale, pad_x, pad_y)
}

fn resize_bilinear(src: &[u8], src_w: usize, src_h: usize, dst_w: usize, dst_h: usize) -> Vec<u8> {
    let mut dst = vec![0u8; dst_h * dst_w * 3];
    let x_ratio = src_w as f32 / dst_w as f32;
    let y_ratio = src_h as f32 / dst_h as f32;

    for dy in 0..dst_h {
        for dx in 0..dst_w {
            let sx = dx as f32 * x_ratio;
            let sy = dy as f32 * y_ratio;
            let sx0 = sx.floor() as usize;
            let sy0 = sy.floor() as usize;
            let sx1 = (sx0 + 1).min(src_w - 1);
            let sy1 = (sy0 + 1).min(src_h - 1);
            let fx = sx - sx0 as f32;
            let fy = sy - sy0 as f32;

            for c in 0..3 {
                let p00 = src[(sy0 * src_w + sx0) * 3 + c] as f32;
                let p10 = src[(sy0 * src_w + sx1) * 3 + c] as f32;
                let p01 = src[(sy1 * src_w + sx0) * 3 + c] as f32;
                let p11 = src[(sy1 * src_w + sx1) * 3 + c] as f32;

                let val = p00 * (1.0 - fx) * (1.0 - fy)
                    + p10 * fx * (1.0 - fy)
                    + p01 * (1.0 - fx) * fy
                    + p11 * fx * fy;

                dst[(dy * dst_w + dx) * 3 + c] = val.round() as u8;
            }
        }
    }

    dst
}

/// Parse raw model output into detections in frame coordinates. Boxes arrive
/// center-format in letterbox space; the inverse letterbox transform recovers
/// original pixel coordinates before NMS.
fn parse_detections(
    output: &[f32],
    scale: f32,
    pad_x: f32,
    pad_y: f32,
    confidence_threshold: f32,
    nms_threshold: f32,
) -> Result<Vec<Detection>> {
    let expected = (4 + YOLO_CLASSES) * YOLO_PREDICTIONS;
    if output.len() < expected {
        bail!(
            "Unexpected model output size: got {}, expected at least {}",
            output.len(),
            expected
        );
    }

    let mut detections = Vec::new();

    for i in 0..YOLO_PREDICTIONS {
        let cx = output[i];
        let cy = output[YOLO_PREDICTIONS + i];
        let w = output[YOLO_PREDICTIONS * 2 + i];
        let h = output[YOLO_PREDICTIONS * 3 + i];

        let mut max_conf = 0.0f32;
        let mut best_class = 0;

        for c in 0..YOLO_CLASSES {
            let conf = output[YOLO_PREDICTIONS * (4 + c) + i];
            if conf > max_conf {
                max_conf = conf;
                best_class = c;
            }
        }

        if max_conf < confidence_threshold {
            continue;
        }

        // Center format to corners, then undo the letterbox transform.
        let x1 = (cx - w / 2.0 - pad_x) / scale;
        let y1 = (cy - h / 2.0 - pad_y) / scale;
        let x2 = (cx + w / 2.0 - pad_x) / scale;
        let y2 = (cy + h / 2.0 - pad_y) / scale;

        detections.push(Detection {
            bbox: [x1, y1, x2, y2],
            confidence: max_conf,
            class_id: best_class,
        });
    }

    Ok(nms(detections, nms_threshold))
}

fn nms(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<Detection> = Vec::new();

    for det in detections {
        let suppressed = keep
            .iter()
            .any(|kept| kept.class_id == det.class_id && iou(&kept.bbox, &det.bbox) >= iou_threshold);
        if !suppressed {
            keep.push(det);
        }
    }

    keep
}

fn iou(box1: &[f32; 4], box2: &[f32; 4]) -> f32 {
    let x1 = box1[0].max(box2[0]);
    let y1 = box1[1].max(box2[1]);
    let x2 = box1[2].min(box2[2]);
    let y2 = box1[3].min(box2[3]);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let area1 = (box1[2] - box1[0]) * (box1[3] - box1[1]);
    let area2 = (box2[2] - box2[0]) * (box2[3] - box2[1]);
    let union = area1 + area2 - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letterbox_dimensions_and_padding() {
        let src = vec![128u8; 640 * 480 * 3];
        let (input, scale, pad_x, pad_y) = letterbox(&src, 640, 480);

        assert_eq!(input.len(), 3 * 640 * 640);
        assert!((scale - 1.0).abs() < 1e-6);
        assert_eq!(pad_x, 0.0);
        assert_eq!(pad_y, 80.0);
    }

    #[test]
    fn test_letterbox_normalizes_pixels() {
        let src = vec![255u8; 64 * 64 * 3];
        let (input, scale, _, _) = letterbox(&src, 64, 64);

        // Square input fills the whole canvas, so no gray padding remains.
        assert!((scale - 10.0).abs() < 1e-6);
        assert!(input.iter().all(|&v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_resize_bilinear_len() {
        let src = vec![255u8; 100 * 100 * 3];
        let dst = resize_bilinear(&src, 100, 100, 50, 50);
        assert_eq!(dst.len(), 50 * 50 * 3);
        assert!(dst.iter().all(|&b| b == 255));
    }

    #[test]
    fn test_parse_detections_rejects_short_output() {
        assert!(parse_detections(&[0.0; 16], 1.0, 0.0, 0.0, 0.25, 0.45).is_err());
    }

    #[test]
    fn test_parse_detections_threshold_and_coordinates() {
        let mut output = vec![0.0f32; (4 + YOLO_CLASSES) * YOLO_PREDICTIONS];
        // Prediction 0: centered 40x40 box, class 0 at 0.9.
        output[0] = 100.0; // cx
        output[YOLO_PREDICTIONS] = 100.0; // cy
        output[YOLO_PREDICTIONS * 2] = 40.0; // w
        output[YOLO_PREDICTIONS * 3] = 40.0; // h
        output[YOLO_PREDICTIONS * 4] = 0.9; // class 0 score
                                            // Prediction 1: below threshold.
        output[1] = 300.0;
        output[YOLO_PREDICTIONS + 1] = 300.0;
        output[YOLO_PREDICTIONS * 2 + 1] = 20.0;
        output[YOLO_PREDICTIONS * 3 + 1] = 20.0;
        output[YOLO_PREDICTIONS * 4 + 1] = 0.1;

        let detections = parse_detections(&output, 1.0, 0.0, 0.0, 0.25, 0.45).unwrap();

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].class_id, 0);
        assert!((detections[0].confidence - 0.9).abs() < 1e-6);
        assert_eq!(detections[0].bbox, [80.0, 80.0, 120.0, 120.0]);
    }

    #[test]
    fn test_nms_suppresses_same_class_overlaps() {
        let detections = vec![
            Detection {
                bbox: [10.0, 10.0, 50.0, 50.0],
                confidence: 0.9,
                class_id: 0,
            },
            Detection {
                bbox: [12.0, 12.0, 52.0, 52.0],
                confidence: 0.8,
                class_id: 0,
            },
            Detection {
                bbox: [12.0, 12.0, 52.0, 52.0],
                confidence: 0.7,
                class_id: 2,
            },
        ];

        let kept = nms(detections, 0.45);

        // Overlapping same-class box goes; the other class survives.
        assert_eq!(kept.len(), 2);
        assert!((kept[0].confidence - 0.9).abs() < 1e-6);
        assert_eq!(kept[1].class_id, 2);
    }

    #[test]
    fn test_iou_disjoint_and_identical() {
        let a = [0.0, 0.0, 10.0, 10.0];
        let b = [20.0, 20.0, 30.0, 30.0];
        assert_eq!(iou(&a, &b), 0.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_class_name_table() {
        assert_eq!(COCO_CLASS_NAMES[0], "person");
        assert_eq!(COCO_CLASS_NAMES[2], "car");
        assert_eq!(COCO_CLASS_NAMES[79], "toothbrush");
    }
}
