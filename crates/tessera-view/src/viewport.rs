//! Viewport controller.
//!
//! Owns the pan/zoom transform over the world and its lifecycle:
//!
//! ```text
//! Uninitialized ──attach──▶ Initializing ──ok──▶ Ready
//!                                │
//!                                └──zero size / host failure──▶ Error
//! any state ──dispose──▶ Disposed
//! ```
//!
//! Gestures only move the view while `Ready`. Resize, glide and other
//! deferred work are deadlines in a [`TimerQueue`] advanced by
//! [`ViewportController::tick`]; disposing cancels all of them and closes
//! the watch channel, which detaches every observer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use glam::DVec2;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::ViewConfig;
use crate::error::{Result, SurfaceError};
use crate::timer::TimerQueue;
use crate::transform::{constrain, fit, ViewportState};

/// Creates the render surface the viewport draws into.
#[async_trait]
pub trait SurfaceHost: Send + Sync {
    /// Create (or look up) the surface and report its size in pixels.
    async fn create_surface(&self) -> Result<DVec2>;
}

/// Lifecycle of the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Lifecycle {
    Uninitialized,
    Initializing,
    Ready,
    Error(SurfaceError),
    Disposed,
}

/// Shared flag async work checks before touching the controller.
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn kill(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Proof that an attach was started; handed back with its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachTicket {
    epoch: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ViewTimer {
    Resize,
    Glide,
}

#[derive(Debug, Clone, Copy)]
struct Drag {
    last: DVec2,
    last_at: Instant,
    /// Pixels per millisecond.
    velocity: DVec2,
}

#[derive(Debug, Clone, Copy)]
struct Glide {
    velocity: DVec2,
    last_at: Instant,
}

#[derive(Debug, Clone, Copy)]
struct Pinch {
    a: DVec2,
    b: DVec2,
}

impl Pinch {
    fn midpoint(&self) -> DVec2 {
        (self.a + self.b) * 0.5
    }

    fn span(&self) -> f64 {
        self.a.distance(self.b)
    }
}

/// Pan/zoom controller for the grid world.
#[derive(Debug)]
pub struct ViewportController {
    config: ViewConfig,
    lifecycle: Lifecycle,
    state: ViewportState,
    tx: Option<watch::Sender<ViewportState>>,
    timers: TimerQueue<ViewTimer>,
    liveness: Liveness,
    epoch: u64,
    pending_size: Option<DVec2>,
    layouts: u64,
    drag: Option<Drag>,
    glide: Option<Glide>,
    pinch: Option<Pinch>,
}

fn valid_size(size: DVec2) -> bool {
    size.is_finite() && size.x > 0.0 && size.y > 0.0
}

impl ViewportController {
    pub fn new(config: ViewConfig) -> Self {
        let (tx, _rx) = watch::channel(ViewportState::default());
        Self {
            config,
            lifecycle: Lifecycle::Uninitialized,
            state: ViewportState::default(),
            tx: Some(tx),
            timers: TimerQueue::new(),
            liveness: Liveness::new(),
            epoch: 0,
            pending_size: None,
            layouts: 0,
            drag: None,
            glide: None,
            pinch: None,
        }
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn is_ready(&self) -> bool {
        self.lifecycle == Lifecycle::Ready
    }

    pub fn state(&self) -> ViewportState {
        self.state
    }

    pub fn liveness(&self) -> Liveness {
        self.liveness.clone()
    }

    /// Number of times the transform was fitted to a new screen size.
    pub fn layouts(&self) -> u64 {
        self.layouts
    }

    /// Observe every state change. Fails once disposed.
    pub fn subscribe(&self) -> Result<watch::Receiver<ViewportState>> {
        self.tx
            .as_ref()
            .map(watch::Sender::subscribe)
            .ok_or(SurfaceError::Disposed)
    }

    fn publish(&self) {
        if let Some(tx) = &self.tx {
            tx.send_replace(self.state);
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Start attaching. Returns `None` when already `Ready` or
    /// `Initializing`.
    pub fn begin_attach(&mut self) -> Result<Option<AttachTicket>> {
        match self.lifecycle {
            Lifecycle::Disposed => Err(SurfaceError::Disposed),
            Lifecycle::Ready | Lifecycle::Initializing => Ok(None),
            Lifecycle::Uninitialized | Lifecycle::Error(_) => {
                self.epoch += 1;
                self.lifecycle = Lifecycle::Initializing;
                debug!(epoch = self.epoch, "viewport initializing");
                Ok(Some(AttachTicket { epoch: self.epoch }))
            }
        }
    }

    /// Complete an attach with the host's result.
    ///
    /// A result arriving after `dispose`, or for a superseded attach, is
    /// discarded.
    pub fn finish_attach(&mut self, ticket: AttachTicket, surface: Result<DVec2>) -> Result<()> {
        if self.lifecycle == Lifecycle::Disposed {
            debug!("surface resolved after dispose; discarded");
            return Err(SurfaceError::Disposed);
        }
        if ticket.epoch != self.epoch || self.lifecycle != Lifecycle::Initializing {
            debug!(epoch = ticket.epoch, "stale attach result discarded");
            return Ok(());
        }

        let size = match surface {
            Ok(size) if valid_size(size) => size,
            Ok(size) => {
                let err = SurfaceError::ZeroSize {
                    width: size.x,
                    height: size.y,
                };
                warn!(error = %err, "viewport attach failed");
                self.lifecycle = Lifecycle::Error(err.clone());
                return Err(err);
            }
            Err(err) => {
                warn!(error = %err, "viewport attach failed");
                self.lifecycle = Lifecycle::Error(err.clone());
                return Err(err);
            }
        };

        self.state = self.compute_initial_transform(size.x, size.y);
        self.layouts += 1;
        self.lifecycle = Lifecycle::Ready;
        info!(width = size.x, height = size.y, scale = self.state.scale, "viewport ready");
        self.publish();
        Ok(())
    }

    /// Create the surface through `host` and frame the world in it.
    /// Idempotent once `Ready`.
    pub async fn attach(&mut self, host: &dyn SurfaceHost) -> Result<()> {
        let Some(ticket) = self.begin_attach()? else {
            return Ok(());
        };
        let surface = host.create_surface().await;
        self.finish_attach(ticket, surface)
    }

    /// Tear everything down. Idempotent.
    pub fn dispose(&mut self) {
        if self.lifecycle == Lifecycle::Disposed {
            return;
        }
        self.lifecycle = Lifecycle::Disposed;
        self.timers.cancel_all();
        self.drag = None;
        self.glide = None;
        self.pinch = None;
        self.pending_size = None;
        self.tx = None;
        self.liveness.kill();
        info!("viewport disposed");
    }

    // ------------------------------------------------------------------
    // Transform
    // ------------------------------------------------------------------

    /// Fit the world into a `width` x `height` screen and center it.
    pub fn compute_initial_transform(&self, width: f64, height: f64) -> ViewportState {
        constrain(&self.config, fit(&self.config, DVec2::new(width, height)))
    }

    pub fn screen_to_world(&self, p: DVec2) -> DVec2 {
        self.state.screen_to_world(p)
    }

    pub fn world_to_screen(&self, w: DVec2) -> DVec2 {
        self.state.world_to_screen(w)
    }

    fn commit(&mut self, state: ViewportState) {
        self.state = constrain(&self.config, state);
        self.publish();
    }

    /// Move the view by a screen-space delta.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        if !self.is_ready() {
            return;
        }
        let delta = DVec2::new(dx, dy) * self.config.pan_sensitivity;
        if !delta.is_finite() {
            return;
        }
        let mut next = self.state;
        next.origin += delta;
        self.commit(next);
    }

    /// Multiply the scale by `factor`, keeping `pivot` (screen space) fixed.
    /// Without a pivot the screen center is held.
    pub fn zoom_by(&mut self, factor: f64, pivot: Option<DVec2>) {
        if !self.is_ready() || !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let pivot = pivot.unwrap_or(self.state.screen * 0.5);
        self.zoom_between(pivot, pivot, factor);
    }

    // Zoom by `factor` around `from`, then move that world point to `to`.
    fn zoom_between(&mut self, from: DVec2, to: DVec2, factor: f64) {
        let anchor = self.state.screen_to_world(from);
        let mut next = self.state;
        next.scale = self.config.clamp_scale(self.state.scale * factor);
        next.origin = to - anchor * next.scale;
        self.commit(next);
    }

    pub fn zoom_in(&mut self) {
        self.zoom_by(1.0 + self.config.zoom_step, None);
    }

    pub fn zoom_out(&mut self) {
        self.zoom_by(1.0 - self.config.zoom_step, None);
    }

    /// Put `world` at the center of the screen.
    pub fn center_on(&mut self, world: DVec2) {
        if !self.is_ready() || !world.is_finite() {
            return;
        }
        let mut next = self.state;
        next.origin = self.state.screen * 0.5 - world * self.state.scale;
        self.commit(next);
    }

    /// Report a new screen size. Bursts are coalesced: the transform is
    /// refitted once, after the debounce window passes without a resize.
    pub fn resize(&mut self, width: f64, height: f64, now: Instant) {
        if !self.is_ready() {
            return;
        }
        let size = DVec2::new(width, height);
        if !valid_size(size) {
            debug!(width, height, "ignoring empty resize");
            return;
        }
        self.pending_size = Some(size);
        self.timers
            .schedule(ViewTimer::Resize, now + self.config.resize_debounce);
    }

    fn apply_resize(&mut self) {
        if let Some(size) = self.pending_size.take() {
            self.state = self.compute_initial_transform(size.x, size.y);
            self.layouts += 1;
            debug!(width = size.x, height = size.y, scale = self.state.scale, "viewport refitted");
            self.publish();
        }
    }

    // ------------------------------------------------------------------
    // Gestures
    // ------------------------------------------------------------------

    /// Zoom by a wheel delta around the cursor.
    pub fn wheel(&mut self, delta_y: f64, pivot: DVec2) {
        self.zoom_by((-delta_y * self.config.wheel_sensitivity).exp(), Some(pivot));
    }

    pub fn drag_start(&mut self, at: DVec2, now: Instant) {
        if !self.is_ready() {
            return;
        }
        self.stop_glide();
        self.pinch = None;
        self.drag = Some(Drag {
            last: at,
            last_at: now,
            velocity: DVec2::ZERO,
        });
    }

    pub fn drag_move(&mut self, at: DVec2, now: Instant) {
        let Some(mut drag) = self.drag else {
            return;
        };
        let delta = at - drag.last;
        let dt = now.saturating_duration_since(drag.last_at).as_secs_f64() * 1000.0;
        if dt > 0.0 {
            drag.velocity = delta * self.config.pan_sensitivity / dt;
        }
        drag.last = at;
        drag.last_at = now;
        self.drag = Some(drag);
        self.pan(delta.x, delta.y);
    }

    /// Release the drag; a fast enough release keeps gliding.
    pub fn drag_end(&mut self, now: Instant) {
        let Some(drag) = self.drag.take() else {
            return;
        };
        let held = now.saturating_duration_since(drag.last_at);
        if held > self.config.frame * 4 || drag.velocity.length() < self.config.min_inertia_speed {
            return;
        }
        self.glide = Some(Glide {
            velocity: drag.velocity,
            last_at: now,
        });
        self.timers.schedule(ViewTimer::Glide, now + self.config.frame);
    }

    fn stop_glide(&mut self) {
        self.glide = None;
        self.timers.cancel(ViewTimer::Glide);
    }

    pub fn is_gliding(&self) -> bool {
        self.glide.is_some()
    }

    fn step_glide(&mut self, now: Instant) {
        let Some(mut glide) = self.glide else {
            return;
        };
        let dt = now.saturating_duration_since(glide.last_at).as_secs_f64() * 1000.0;
        let frame_ms = self.config.frame.as_secs_f64() * 1000.0;
        let mut next = self.state;
        next.origin += glide.velocity * dt;
        self.commit(next);

        glide.velocity *= self.config.friction.powf(dt / frame_ms);
        glide.last_at = now;
        if glide.velocity.length() < self.config.min_inertia_speed {
            self.glide = None;
        } else {
            self.glide = Some(glide);
            self.timers.schedule(ViewTimer::Glide, now + self.config.frame);
        }
    }

    pub fn pinch_start(&mut self, a: DVec2, b: DVec2) {
        if !self.is_ready() {
            return;
        }
        self.stop_glide();
        self.drag = None;
        self.pinch = Some(Pinch { a, b });
    }

    /// Zoom by the change in finger distance around the midpoint and pan by
    /// the midpoint's movement.
    pub fn pinch_move(&mut self, a: DVec2, b: DVec2) {
        let Some(prev) = self.pinch else {
            return;
        };
        let next = Pinch { a, b };
        self.pinch = Some(next);
        let span = prev.span();
        if span <= f64::EPSILON {
            return;
        }
        let ratio = next.span() / span;
        let factor = 1.0 + (ratio - 1.0) * self.config.pinch_sensitivity;
        if factor.is_finite() && factor > 0.0 {
            self.zoom_between(prev.midpoint(), next.midpoint(), factor);
        }
    }

    pub fn pinch_end(&mut self) {
        self.pinch = None;
    }

    // ------------------------------------------------------------------
    // Frame
    // ------------------------------------------------------------------

    /// Fire due timers. Returns whether the state changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.lifecycle == Lifecycle::Disposed {
            return false;
        }
        let before = self.state;
        for timer in self.timers.due(now) {
            match timer {
                ViewTimer::Resize => self.apply_resize(),
                ViewTimer::Glide => self.step_glide(now),
            }
        }
        before != self.state
    }

    /// When the host should tick next, if anything is pending.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }
}
