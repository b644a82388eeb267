// src/display.rs

use crate::types::Frame;
use anyhow::Result;
use opencv::{core::Mat, highgui, imgproc, prelude::*};
use tracing::debug;

/// Key that ends playback.
pub const EXIT_KEY: char = 'q';

/// Display surface for annotated frames plus the exit signal.
///
/// `poll_exit` blocks for at most the given timeout; that bounded wait is
/// also what paces the loop to the source frame rate.
pub trait Presenter {
    fn present(&mut self, frame: &Frame) -> Result<()>;

    /// Returns true once the exit key has been observed.
    fn poll_exit(&mut self, timeout_ms: i32) -> Result<bool>;

    fn close(&mut self) -> Result<()>;
}

/// OpenCV highgui window.
pub struct HighguiWindow {
    name: String,
    open: bool,
}

impl HighguiWindow {
    pub fn open(name: &str) -> Result<Self> {
        highgui::named_window(name, highgui::WINDOW_AUTOSIZE)?;
        Ok(Self {
            name: name.to_string(),
            open: true,
        })
    }
}

impl Presenter for HighguiWindow {
    fn present(&mut self, frame: &Frame) -> Result<()> {
        let mat = Mat::from_slice(&frame.data)?;
        let mat = mat.reshape(3, frame.height as i32)?;

        let mut bgr_mat = Mat::default();
        imgproc::cvt_color(&mat, &mut bgr_mat, imgproc::COLOR_RGB2BGR, 0)?;

        highgui::imshow(&self.name, &bgr_mat)?;
        Ok(())
    }

    fn poll_exit(&mut self, timeout_ms: i32) -> Result<bool> {
        let key = highgui::wait_key(timeout_ms.max(1))?;
        Ok(key & 0xff == EXIT_KEY as i32)
    }

    fn close(&mut self) -> Result<()> {
        if self.open {
            highgui::destroy_all_windows()?;
            self.open = false;
            debug!("Display window closed: {}", self.name);
        }
        Ok(())
    }
}
