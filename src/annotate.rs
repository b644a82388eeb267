// src/annotate.rs

use crate::detector::{Detection, Detector};
use crate::types::Frame;
use anyhow::Result;
use opencv::{
    core::{self, Mat},
    imgproc,
    prelude::*,
};

/// Box and label color. Pure green reads the same in RGB and BGR order, so
/// drawing happens directly on the RGB frame.
const BOX_COLOR: (f64, f64, f64) = (0.0, 255.0, 0.0);
const BOX_THICKNESS: i32 = 2;
const LABEL_FONT_SCALE: f64 = 0.5;
/// Label baseline sits this many pixels above the box's top-left corner.
const LABEL_OFFSET_PX: i32 = 10;
/// Lowest baseline y so labels on boxes touching the top edge stay visible.
const LABEL_MIN_Y: i32 = 12;

/// A detection resolved for drawing: clamped integer box plus label text.
/// Built per frame, discarded after rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
    pub label: String,
}

/// Clamp detections to the frame bounds and resolve their label text through
/// the detector's class table.
pub fn resolve_annotations(
    detections: &[Detection],
    detector: &dyn Detector,
    width: usize,
    height: usize,
) -> Vec<Annotation> {
    detections
        .iter()
        .map(|det| {
            let (x1, y1, x2, y2) = clamp_box(det.bbox, width, height);
            Annotation {
                x1,
                y1,
                x2,
                y2,
                label: format_label(detector.class_name(det.class_id), det.confidence),
            }
        })
        .collect()
}

/// Clamp a box to the pixel grid. Total over any x1<=x2, y1<=y2 input, even
/// fully outside the frame.
pub fn clamp_box(bbox: [f32; 4], width: usize, height: usize) -> (i32, i32, i32, i32) {
    let max_x = (width as f32 - 1.0).max(0.0);
    let max_y = (height as f32 - 1.0).max(0.0);

    let x1 = bbox[0].clamp(0.0, max_x) as i32;
    let y1 = bbox[1].clamp(0.0, max_y) as i32;
    let x2 = bbox[2].clamp(0.0, max_x) as i32;
    let y2 = bbox[3].clamp(0.0, max_y) as i32;

    (x1, y1, x2, y2)
}

pub fn format_label(name: &str, confidence: f32) -> String {
    format!("{} {:.2}", name, confidence)
}

/// Label anchor above the box, clamped so the text never leaves the frame.
pub fn label_origin(x1: i32, y1: i32) -> (i32, i32) {
    (x1, (y1 - LABEL_OFFSET_PX).max(LABEL_MIN_Y))
}

/// Draw all annotations on an owned copy of the frame. The input frame is
/// left untouched; an empty annotation list returns a pixel-identical copy.
pub fn draw(frame: &Frame, annotations: &[Annotation]) -> Result<Frame> {
    let mat = Mat::from_slice(&frame.data)?;
    let mat = mat.reshape(3, frame.height as i32)?;
    let mut output = mat.try_clone()?;

    let color = core::Scalar::new(BOX_COLOR.0, BOX_COLOR.1, BOX_COLOR.2, 0.0);

    for ann in annotations {
        // Two-point form: corners are inclusive, and a degenerate box still
        // leaves a mark instead of being skipped as an empty rect.
        imgproc::rectangle_points(
            &mut output,
            core::Point::new(ann.x1, ann.y1),
            core::Point::new(ann.x2, ann.y2),
            color,
            BOX_THICKNESS,
            imgproc::LINE_8,
            0,
        )?;

        let (label_x, label_y) = label_origin(ann.x1, ann.y1);
        imgproc::put_text(
            &mut output,
            &ann.label,
            core::Point::new(label_x, label_y),
            imgproc::FONT_HERSHEY_SIMPLEX,
            LABEL_FONT_SCALE,
            color,
            BOX_THICKNESS,
            imgproc::LINE_8,
            false,
        )?;
    }

    Ok(Frame {
        data: output.data_bytes()?.to_vec(),
        width: frame.width,
        height: frame.height,
        timestamp_ms: frame.timestamp_ms,
    })
}
