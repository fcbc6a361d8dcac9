//! Animation driver: owns the render loop for the current marker list.
//!
//! The driver is `Idle` until it receives a non-empty list, then `Running`
//! with exactly one frame callback pending at a time. Every frame it derives
//! elapsed time and the fade envelope from the [`AnimationSession`], clears the
//! surface and paints all markers. Replacing the list (a new identity, even
//! with equal contents) restarts the timeline; an empty list or teardown
//! cancels the pending callback and clears the surface before returning.

use std::sync::Arc;

use crate::constants::{DEFAULT_TIMELINE_MS, FADE_FRACTION};
use crate::state::{MarkerList, MarkerListId};

use super::geometry::Viewport;
use super::renderer::paint_frame;
use super::scheduler::{FrameHandle, FrameScheduler, QueuedScheduler};
use super::surface::OverlaySurface;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineConfig {
    pub duration_ms: f64,
    /// Fraction of the timeline spent fading in, and again fading out
    pub fade_fraction: f64,
}

impl TimelineConfig {
    pub fn with_duration(duration_ms: f64) -> Self {
        Self {
            duration_ms,
            ..Self::default()
        }
    }
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            duration_ms: DEFAULT_TIMELINE_MS,
            fade_fraction: FADE_FRACTION,
        }
    }
}

/// Start of the current timeline and the list it belongs to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationSession {
    pub start_ms: f64,
    pub list_id: MarkerListId,
}

impl AnimationSession {
    /// Keep `previous` if it belongs to `list_id`; otherwise start a new
    /// timeline at `now_ms`.
    pub fn sync(previous: Option<AnimationSession>, list_id: MarkerListId, now_ms: f64) -> Self {
        match previous {
            Some(session) if session.list_id == list_id => session,
            _ => AnimationSession {
                start_ms: now_ms,
                list_id,
            },
        }
    }

    pub fn timing(&self, now_ms: f64, config: &TimelineConfig) -> FrameTiming {
        let elapsed_ms = (now_ms - self.start_ms).max(0.0);
        let progress = if config.duration_ms > 0.0 {
            (elapsed_ms / config.duration_ms).min(1.0)
        } else {
            1.0
        };
        FrameTiming {
            elapsed_ms,
            progress,
            opacity: fade_envelope(progress, config.fade_fraction),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTiming {
    pub elapsed_ms: f64,
    /// `elapsed / duration`, capped at 1
    pub progress: f64,
    pub opacity: f32,
}

/// Linear fade in over the first `fade_fraction` of the timeline and fade out
/// over the last; fully opaque in between. Exactly 0 at both ends and exactly
/// 1 at both inner boundaries.
pub fn fade_envelope(progress: f64, fade_fraction: f64) -> f32 {
    let opacity = if progress < fade_fraction {
        progress / fade_fraction
    } else if progress > 1.0 - fade_fraction {
        (1.0 - progress) / fade_fraction
    } else {
        1.0
    };
    opacity.clamp(0.0, 1.0) as f32
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriverState {
    Idle,
    Running {
        /// Started lazily on the first frame of a list
        session: Option<AnimationSession>,
        pending: Option<FrameHandle>,
    },
}

/// What happened when a frame callback fired.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    Painted {
        timing: FrameTiming,
        markers: usize,
        /// The timeline hit its end on this frame and restarts on the next
        looped: bool,
    },
    /// No surface was available; nothing was drawn but the loop continues.
    Aborted { timing: FrameTiming },
    /// Callback was cancelled, superseded, or arrived while idle.
    Stale,
}

pub struct OverlayDriver<S: FrameScheduler> {
    scheduler: S,
    config: TimelineConfig,
    viewport: Viewport,
    markers: Arc<MarkerList>,
    state: DriverState,
}

impl<S: FrameScheduler> OverlayDriver<S> {
    pub fn new(scheduler: S, config: TimelineConfig, viewport: Viewport) -> Self {
        Self {
            scheduler,
            config,
            viewport,
            markers: Arc::new(MarkerList::empty()),
            state: DriverState::Idle,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, DriverState::Running { .. })
    }

    #[cfg(test)]
    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// Follow a host resize; takes effect on the next frame. Offline
    /// sequences render at a fixed size, so only live hosts call this.
    #[allow(dead_code)]
    pub fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// Hand the driver the current marker list.
    pub fn set_markers(
        &mut self,
        markers: Arc<MarkerList>,
        surface: Option<&mut dyn OverlaySurface>,
    ) {
        if markers.is_empty() {
            self.markers = markers;
            self.stop(surface);
            return;
        }

        let same_list = self.is_running() && self.markers.id() == markers.id();
        if same_list {
            return;
        }

        log::debug!(
            "Overlay timeline restarting for {} marker(s)",
            markers.len()
        );
        self.markers = markers;
        let session = match self.state {
            DriverState::Running { session, pending } => {
                if let Some(handle) = pending {
                    self.scheduler.cancel_frame(handle);
                }
                session
            }
            DriverState::Idle => None,
        };
        self.state = DriverState::Running {
            session,
            pending: Some(self.scheduler.request_frame()),
        };
    }

    /// Stop animating and blank the surface. Safe to call when already idle.
    pub fn teardown(&mut self, surface: Option<&mut dyn OverlaySurface>) {
        self.markers = Arc::new(MarkerList::empty());
        self.stop(surface);
    }

    /// Frame callback for `handle`.
    pub fn on_frame(
        &mut self,
        handle: FrameHandle,
        now_ms: f64,
        surface: Option<&mut dyn OverlaySurface>,
    ) -> FrameOutcome {
        let DriverState::Running { session, pending } = &mut self.state else {
            return FrameOutcome::Stale;
        };
        if *pending != Some(handle) {
            return FrameOutcome::Stale;
        }

        let current = AnimationSession::sync(*session, self.markers.id(), now_ms);
        let timing = current.timing(now_ms, &self.config);
        let looped = timing.progress >= 1.0;
        *session = Some(if looped {
            AnimationSession {
                start_ms: now_ms,
                ..current
            }
        } else {
            current
        });

        let outcome = match surface {
            Some(surface) => {
                let commands = paint_frame(
                    self.markers.markers(),
                    self.viewport,
                    timing.elapsed_ms,
                    timing.opacity,
                );
                surface.clear();
                surface.execute_all(&commands);
                FrameOutcome::Painted {
                    timing,
                    markers: self.markers.len(),
                    looped,
                }
            }
            None => {
                log::trace!("Overlay surface unavailable; skipping frame");
                FrameOutcome::Aborted { timing }
            }
        };

        *pending = Some(self.scheduler.request_frame());
        outcome
    }

    fn stop(&mut self, surface: Option<&mut dyn OverlaySurface>) {
        if let DriverState::Running {
            pending: Some(handle),
            ..
        } = self.state
        {
            self.scheduler.cancel_frame(handle);
        }
        if self.is_running() {
            log::debug!("Overlay timeline stopped");
        }
        self.state = DriverState::Idle;
        if let Some(surface) = surface {
            surface.clear();
        }
    }
}

impl OverlayDriver<QueuedScheduler> {
    /// Deliver the next due frame, if any, at `now_ms`.
    pub fn pump(
        &mut self,
        now_ms: f64,
        surface: Option<&mut dyn OverlaySurface>,
    ) -> Option<FrameOutcome> {
        let handle = self.scheduler.next_due()?;
        Some(self.on_frame(handle, now_ms, surface))
    }
}
