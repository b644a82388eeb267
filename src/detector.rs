// src/detector.rs

use crate::types::Frame;
use anyhow::Result;

/// One candidate object instance returned by a detector for a frame.
#[derive(Debug, Clone)]
pub struct Detection {
    /// [x1, y1, x2, y2] in frame pixel coordinates, x1 <= x2 and y1 <= y2.
    /// Values may fall outside the frame; the renderer clamps before drawing.
    pub bbox: [f32; 4],
    pub confidence: f32,
    pub class_id: usize,
}

/// Object-detection capability injected into the playback loop.
///
/// A backend owns its class-label table for its whole lifetime and may apply
/// its own confidence filtering; the loop draws every detection it returns.
/// `infer` may block for the full model forward pass.
pub trait Detector {
    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>>;

    /// Resolve a class id to a human-readable name.
    fn class_name(&self, class_id: usize) -> &str;
}
