//! Frame callbacks and time sources for the animation loop.

use std::collections::VecDeque;

/// Token for one requested frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(u64);

/// Host-side "call me before the next repaint" facility.
pub trait FrameScheduler {
    fn request_frame(&mut self) -> FrameHandle;

    /// Cancelling an unknown or already-delivered handle is a no-op.
    fn cancel_frame(&mut self, handle: FrameHandle);
}

/// Monotonic millisecond clock.
pub trait FrameClock {
    fn now_ms(&self) -> f64;
}

/// Scheduler backed by a FIFO of pending handles. The host pops due frames with
/// [`QueuedScheduler::next_due`] and delivers them to the driver.
#[derive(Debug, Default)]
pub struct QueuedScheduler {
    next_id: u64,
    pending: VecDeque<FrameHandle>,
}

impl QueuedScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_due(&mut self) -> Option<FrameHandle> {
        self.pending.pop_front()
    }

    #[cfg(test)]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl FrameScheduler for QueuedScheduler {
    fn request_frame(&mut self) -> FrameHandle {
        self.next_id += 1;
        let handle = FrameHandle(self.next_id);
        self.pending.push_back(handle);
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        self.pending.retain(|pending| *pending != handle);
    }
}

/// Virtual clock that only moves when told to. Used for offline rendering and tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepClock {
    now_ms: f64,
    step_ms: f64,
}

impl StepClock {
    pub fn new(start_ms: f64, step_ms: f64) -> Self {
        Self {
            now_ms: start_ms,
            step_ms,
        }
    }

    /// Clock that ticks once per frame at `fps`.
    pub fn at_fps(fps: f64) -> Self {
        Self::new(0.0, 1000.0 / fps.max(1.0))
    }

    pub fn tick(&mut self) {
        self.now_ms += self.step_ms;
    }
}

impl FrameClock for StepClock {
    fn now_ms(&self) -> f64 {
        self.now_ms
    }
}
