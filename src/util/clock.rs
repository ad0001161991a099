use std::time::Instant;

/// Monotonic millisecond clock shared by the tick loops and input handlers.
///
/// Engine code never reads the clock itself; callers sample `now_ms()` once
/// and pass it down, so tests can drive time explicitly.
#[derive(Debug, Clone, Copy)]
pub struct GameClock {
    started: Instant,
}

impl GameClock {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Milliseconds since the clock was created
    #[inline]
    pub fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

impl Default for GameClock {
    fn default() -> Self {
        Self::new()
    }
}
