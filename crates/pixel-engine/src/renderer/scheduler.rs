/// Why a redraw was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedrawReason {
    Viewport,
    Pixels,
}

/// Coalesces redraw requests into at most one per animation frame.
///
/// Any number of requests between two frames collapse into one pending redraw;
/// the frame callback then renders whatever state is current at that moment.
#[derive(Debug, Default)]
pub struct FrameScheduler {
    pending: bool,
    viewport_dirty: bool,
    pixels_dirty: bool,
    coalesced: u64,
    rendered: u64,
}

/// A redraw taken from the scheduler at a frame boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTicket {
    pub viewport_dirty: bool,
    pub pixels_dirty: bool,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark state dirty. Returns true if the host must schedule an animation frame
    /// (no redraw was pending yet).
    pub fn request(&mut self, reason: RedrawReason) -> bool {
        match reason {
            RedrawReason::Viewport => self.viewport_dirty = true,
            RedrawReason::Pixels => self.pixels_dirty = true,
        }
        if self.pending {
            self.coalesced += 1;
            return false;
        }
        self.pending = true;
        true
    }

    /// Called from the animation frame callback. Returns the pending redraw, if any.
    pub fn take(&mut self) -> Option<FrameTicket> {
        if !self.pending {
            return None;
        }
        let ticket = FrameTicket {
            viewport_dirty: self.viewport_dirty,
            pixels_dirty: self.pixels_dirty,
        };
        self.pending = false;
        self.viewport_dirty = false;
        self.pixels_dirty = false;
        self.rendered += 1;
        Some(ticket)
    }

    /// Requests absorbed into an already pending redraw.
    pub fn coalesced(&self) -> u64 {
        self.coalesced
    }

    pub fn rendered(&self) -> u64 {
        self.rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn many_requests_one_frame() {
        let mut s = FrameScheduler::new();
        assert!(s.request(RedrawReason::Viewport));
        for _ in 0..9 {
            assert!(!s.request(RedrawReason::Viewport));
        }
        assert!(!s.request(RedrawReason::Pixels));
        let ticket = s.take().unwrap();
        assert!(ticket.viewport_dirty && ticket.pixels_dirty);
        assert_eq!(s.take(), None);
        assert_eq!(s.rendered(), 1);
        assert_eq!(s.coalesced(), 10);
    }

    #[test]
    fn request_after_frame_schedules_again() {
        let mut s = FrameScheduler::new();
        s.request(RedrawReason::Pixels);
        s.take();
        assert!(s.request(RedrawReason::Viewport));
        assert_eq!(
            s.take(),
            Some(FrameTicket { viewport_dirty: true, pixels_dirty: false })
        );
    }
}
