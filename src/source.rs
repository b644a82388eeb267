// src/source.rs

use crate::types::Frame;
use anyhow::{bail, Context, Result};
use opencv::{
    core::Mat,
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureTraitConst},
};
use tracing::{debug, info};

/// A finite, seekable stream of decoded frames.
///
/// `next_frame` returns `Ok(None)` at end-of-stream. That is a normal signal,
/// not an error: the stream stays open and `rewind` resets it to the first
/// frame. `close` releases the underlying handle and is safe to call more
/// than once.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Reset the read position to the first frame. Must succeed for any
    /// stream that opened successfully.
    fn rewind(&mut self) -> Result<()>;

    fn close(&mut self) -> Result<()>;

    /// Native frame rate, 0.0 when the container does not report one.
    fn fps(&self) -> f64;

    /// Zero-based index of the frame the next `next_frame` call returns.
    fn position(&self) -> u64;
}

/// Frame source backed by a local video file via OpenCV.
pub struct VideoFileSource {
    cap: VideoCapture,
    path: String,
    fps: f64,
    width: usize,
    height: usize,
    position: u64,
    released: bool,
}

impl VideoFileSource {
    pub fn open(path: &str) -> Result<Self> {
        info!("Opening video: {}", path);

        let cap = VideoCapture::from_file(path, videoio::CAP_ANY)
            .with_context(|| format!("Failed to open video source: {}", path))?;

        if !cap.is_opened()? {
            bail!("Unable to open video source: {}", path);
        }

        let fps = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FPS)?;
        let total_frames = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_COUNT)? as i32;
        let width = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_WIDTH)? as usize;
        let height = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_HEIGHT)? as usize;

        info!(
            "Video properties: {}x{} @ {:.1} FPS, {} frames",
            width, height, fps, total_frames
        );

        Ok(Self {
            cap,
            path: path.to_string(),
            fps,
            width,
            height,
            position: 0,
            released: false,
        })
    }
}

impl FrameSource for VideoFileSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        use opencv::videoio::VideoCaptureTrait;

        let mut mat = Mat::default();

        if !VideoCaptureTrait::read(&mut self.cap, &mut mat)? || mat.empty() {
            debug!("End of stream after frame {}", self.position);
            return Ok(None);
        }

        let timestamp_ms = if self.fps > 0.0 {
            self.position as f64 / self.fps * 1000.0
        } else {
            0.0
        };
        self.position += 1;

        let mut rgb_mat = Mat::default();
        imgproc::cvt_color(&mat, &mut rgb_mat, imgproc::COLOR_BGR2RGB, 0)?;

        let data = rgb_mat.data_bytes()?.to_vec();

        Ok(Some(Frame {
            data,
            width: self.width,
            height: self.height,
            timestamp_ms,
        }))
    }

    fn rewind(&mut self) -> Result<()> {
        use opencv::videoio::VideoCaptureTrait;

        if !self
            .cap
            .set(videoio::CAP_PROP_POS_FRAMES, 0.0)
            .with_context(|| format!("Failed to rewind video source: {}", self.path))?
        {
            bail!("Video source refused to seek to frame 0: {}", self.path);
        }
        self.position = 0;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        use opencv::videoio::VideoCaptureTrait;

        if !self.released {
            self.cap.release()?;
            self.released = true;
            debug!("Released video capture: {}", self.path);
        }
        Ok(())
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn position(&self) -> u64 {
        self.position
    }
}

impl Drop for VideoFileSource {
    fn drop(&mut self) {
        use opencv::videoio::VideoCaptureTrait;

        if !self.released {
            let _ = self.cap.release();
        }
    }
}
