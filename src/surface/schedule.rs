//! Deferred work between the document and the surface: one coalesced redraw
//! per turn, and a cancellable frame for resetting a restored selection.
//! The host event loop decides when a turn or a frame happens.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(u64);

#[derive(Debug, Default)]
pub struct RedrawScheduler {
    redraw_pending: bool,
    frame: Option<FrameHandle>,
    next_frame: u64,
}

impl RedrawScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when this call scheduled the redraw, false when one was
    /// already pending.
    pub fn request(&mut self) -> bool {
        !std::mem::replace(&mut self.redraw_pending, true)
    }

    pub fn is_pending(&self) -> bool {
        self.redraw_pending
    }

    /// Consumes the pending redraw, if any.
    pub fn take(&mut self) -> bool {
        std::mem::take(&mut self.redraw_pending)
    }

    /// Schedules a frame, superseding any frame still pending.
    pub fn schedule_frame(&mut self) -> FrameHandle {
        if let Some(previous) = self.frame.take() {
            tracing::trace!(frame = previous.0, "cancelled superseded frame");
        }
        self.next_frame += 1;
        let handle = FrameHandle(self.next_frame);
        self.frame = Some(handle);
        handle
    }

    pub fn cancel_frame(&mut self) -> Option<FrameHandle> {
        self.frame.take()
    }

    /// Called by the host when `handle` fires. Returns false for a frame
    /// that was cancelled or superseded.
    pub fn fire_frame(&mut self, handle: FrameHandle) -> bool {
        if self.frame == Some(handle) {
            self.frame = None;
            return true;
        }
        false
    }
}
