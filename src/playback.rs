// src/playback.rs

use crate::annotate;
use crate::detector::Detector;
use crate::display::Presenter;
use crate::source::FrameSource;
use anyhow::Result;
use tracing::{info, warn};

/// Exit-poll timeout used when the source does not report a frame rate.
const DEFAULT_POLL_TIMEOUT_MS: i32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    /// Frames are being read, annotated and presented.
    Running,
    /// End-of-stream was hit this iteration; the source was reset.
    Rewinding,
    /// Terminal. Reached only via the exit key; triggers teardown.
    Stopped,
}

/// Loop-owned state, mutated once per iteration. There is no ambient or
/// static loop state anywhere else.
#[derive(Debug, Clone)]
pub struct LoopState {
    pub phase: LoopPhase,
    pub frames_presented: u64,
    pub rewinds: u64,
    pub detections_drawn: u64,
}

impl LoopState {
    fn new() -> Self {
        Self {
            phase: LoopPhase::Running,
            frames_presented: 0,
            rewinds: 0,
            detections_drawn: 0,
        }
    }
}

/// The orchestrating state machine: pulls frames, runs the detector, draws
/// annotations, presents the result and polls for the exit key.
///
/// Acquisition, inference, rendering and presentation run strictly
/// sequentially; a slow inference simply delays the next frame.
pub struct PlaybackLoop<S, D, P> {
    source: S,
    detector: D,
    presenter: P,
    poll_timeout_ms: i32,
    state: LoopState,
}

impl<S: FrameSource, D: Detector, P: Presenter> PlaybackLoop<S, D, P> {
    pub fn new(source: S, detector: D, presenter: P) -> Self {
        let fps = source.fps();
        let poll_timeout_ms = if fps > 0.0 {
            (1000.0 / fps).round().max(1.0) as i32
        } else {
            DEFAULT_POLL_TIMEOUT_MS
        };

        Self {
            source,
            detector,
            presenter,
            poll_timeout_ms,
            state: LoopState::new(),
        }
    }

    /// Drive the loop until the exit key stops it or the detector fails.
    /// The source and the display surface are released on every exit path.
    pub fn run(mut self) -> Result<LoopState> {
        info!(
            "Playback loop started (exit poll every {}ms, press '{}' to quit)",
            self.poll_timeout_ms,
            crate::display::EXIT_KEY
        );

        let result = self.drive();
        self.teardown();

        result.map(|_| self.state)
    }

    fn drive(&mut self) -> Result<()> {
        loop {
            if self.step()? == LoopPhase::Stopped {
                return Ok(());
            }
        }
    }

    /// One iteration of the state machine: either process a frame, rewind at
    /// end-of-stream, or observe the exit signal.
    fn step(&mut self) -> Result<LoopPhase> {
        let frame = match self.source.next_frame()? {
            Some(frame) => frame,
            None => {
                info!("End of stream. Restarting playback...");
                self.source.rewind()?;
                self.state.rewinds += 1;
                self.state.phase = LoopPhase::Rewinding;
                return Ok(LoopPhase::Rewinding);
            }
        };
        self.state.phase = LoopPhase::Running;

        let detections = self.detector.infer(&frame)?;
        let annotations =
            annotate::resolve_annotations(&detections, &self.detector, frame.width, frame.height);
        let annotated = annotate::draw(&frame, &annotations)?;

        self.presenter.present(&annotated)?;
        self.state.frames_presented += 1;
        self.state.detections_drawn += annotations.len() as u64;

        if self.presenter.poll_exit(self.poll_timeout_ms)? {
            info!(
                "Exit key observed after {} frame(s), stopping",
                self.state.frames_presented
            );
            self.state.phase = LoopPhase::Stopped;
            return Ok(LoopPhase::Stopped);
        }

        Ok(LoopPhase::Running)
    }

    fn teardown(&mut self) {
        if let Err(e) = self.source.close() {
            warn!("Failed to close frame source: {}", e);
        }
        if let Err(e) = self.presenter.close() {
            warn!("Failed to close display: {}", e);
        }
        self.state.phase = LoopPhase::Stopped;
    }
}
