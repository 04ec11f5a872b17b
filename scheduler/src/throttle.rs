/// Lets only every Nth frame through to the recognition gate.
///
/// The counter advances on every refused frame and on every completed
/// recognition, and restarts at zero after a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSkip {
    every: u32,
    counter: u32,
}

impl Default for FrameSkip {
    fn default() -> Self {
        Self::new(1)
    }
}

impl FrameSkip {
    /// Admit one frame in `every`; `0` and `1` disable skipping.
    #[must_use]
    pub const fn new(every: u32) -> Self {
        Self {
            every: if every == 0 { 1 } else { every },
            counter: 0,
        }
    }

    /// Period of the throttle.
    #[must_use]
    pub const fn every(&self) -> u32 {
        self.every
    }

    /// Whether the current frame is eligible. Ineligible frames advance the
    /// counter.
    pub const fn admit(&mut self) -> bool {
        if self.counter == 0 {
            true
        } else {
            self.advance();
            false
        }
    }

    /// Count one frame.
    pub const fn advance(&mut self) {
        self.counter = (self.counter + 1) % self.every;
    }

    /// Make the next frame eligible.
    pub const fn reset(&mut self) {
        self.counter = 0;
    }
}
