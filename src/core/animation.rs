use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::config::{ParticleConfig, SpinConfig, TimeBase};
use crate::core::assets::AssetQueue;
use crate::core::clock::Clock;
use crate::core::input_router::InputRouter;
use crate::core::timer::FpsMeter;
use crate::math::{Axis, Transform};
use crate::scene::{SceneGraph, Tracked};
use crate::traits::{SceneRenderer, TimeSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Constructed, not yet started
    Idle,
    /// Waiting for the next frame callback
    Scheduled,
    /// Inside a frame
    Rendering,
    Stopped,
}

/// What the host should do after a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reschedule {
    NextFrame,
    Stop,
}

/// Misuse of the frame loop; the offending call is not executed
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoopError {
    #[error("animation loop already started")]
    AlreadyStarted,
    #[error("another animation loop already drives this scene")]
    SceneBusy,
    #[error("frame requested before the loop was started")]
    NotStarted,
    #[error("frame requested while another frame is rendering")]
    Reentrant,
    #[error("animation loop has stopped")]
    Stopped,
}

/// Recoverable problem inside a single frame
#[derive(Debug, Error)]
pub enum FrameFault {
    #[error("update of '{name}' produced a non-finite transform")]
    NonFiniteTransform { name: String },
    #[error("render failed: {0:#}")]
    Render(anyhow::Error),
}

/// Shared cancellation flag, checked once per frame
#[derive(Debug, Clone, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-frame callback: drain loads, advance time, spin, render, reschedule
#[derive(Debug)]
pub struct AnimationLoop<T: TimeSource = Clock> {
    clock: T,
    state: LoopState,
    stop: StopToken,
    time_base: TimeBase,
    spin_axes: [Axis; 2],
    particle_spin: f32,
    started_at: f64,
    last_tick: f64,
    frames: u64,
    faults: u64,
    fps: FpsMeter,
}

impl<T: TimeSource> AnimationLoop<T> {
    pub fn new(clock: T, spin: &SpinConfig, particles: &ParticleConfig) -> Self {
        Self {
            clock,
            state: LoopState::Idle,
            stop: StopToken::new(),
            time_base: spin.time_base,
            spin_axes: spin.axes,
            particle_spin: particles.spin,
            started_at: 0.0,
            last_tick: 0.0,
            frames: 0,
            faults: 0,
            fps: FpsMeter::new(5.0),
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Handle that stops the loop at its next frame
    pub fn stop_token(&self) -> StopToken {
        self.stop.clone()
    }

    /// Frames rendered so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Faults logged so far
    pub fn faults(&self) -> u64 {
        self.faults
    }

    /// Take ownership of `scene` for animation and schedule the first frame
    pub fn start(&mut self, scene: &mut SceneGraph) -> Result<(), LoopError> {
        match self.state {
            LoopState::Idle => {}
            LoopState::Stopped => return Err(LoopError::Stopped),
            LoopState::Scheduled | LoopState::Rendering => return Err(LoopError::AlreadyStarted),
        }
        if !scene.claim_animation() {
            return Err(LoopError::SceneBusy);
        }

        let now = self.clock.seconds();
        self.started_at = now;
        self.last_tick = now;
        self.state = LoopState::Scheduled;
        log::info!("Animation loop started ({:?} time base)", self.time_base);
        Ok(())
    }

    /// Run one frame
    ///
    /// Faults in the node updates or the render are logged and counted; the
    /// frame still completes and reschedules unless the stop token is set.
    pub fn frame(
        &mut self,
        scene: &mut SceneGraph,
        assets: &mut AssetQueue,
        router: &mut InputRouter,
        renderer: &mut dyn SceneRenderer,
    ) -> Result<Reschedule, LoopError> {
        match self.state {
            LoopState::Scheduled => {}
            LoopState::Idle => return Err(LoopError::NotStarted),
            LoopState::Rendering => return Err(LoopError::Reentrant),
            LoopState::Stopped => return Err(LoopError::Stopped),
        }
        if self.stop.is_stopped() {
            self.finish(scene);
            return Ok(Reschedule::Stop);
        }
        self.state = LoopState::Rendering;

        assets.drain(scene);

        let t = self.advance_time();

        let mut faults = Vec::new();
        if let Some(fault) = self.spin(scene, t) {
            faults.push(fault);
        }
        if let Some(fault) = self.drift_particles(scene) {
            faults.push(fault);
        }

        router.update(scene);

        if let Err(err) = renderer.render(scene) {
            faults.push(FrameFault::Render(err));
        }

        for fault in &faults {
            log::warn!("Frame {}: {}", self.frames, fault);
        }
        self.faults += faults.len() as u64;
        self.frames += 1;

        if self.stop.is_stopped() {
            self.finish(scene);
            return Ok(Reschedule::Stop);
        }
        self.state = LoopState::Scheduled;
        Ok(Reschedule::NextFrame)
    }

    fn finish(&mut self, scene: &mut SceneGraph) {
        scene.release_animation();
        self.state = LoopState::Stopped;
        log::info!(
            "Animation loop stopped after {} frames ({} faults)",
            self.frames,
            self.faults
        );
    }

    fn advance_time(&mut self) -> f32 {
        let now = self.clock.seconds();
        let delta = (now - self.last_tick) as f32;
        self.last_tick = now;

        if let Some(fps) = self.fps.tick(delta) {
            log::debug!("{:.1} fps", fps);
        }

        match self.time_base {
            TimeBase::SinceStart => (now - self.started_at) as f32,
            TimeBase::SinceLastFrame => delta,
        }
    }

    fn spin(&self, scene: &mut SceneGraph, t: f32) -> Option<FrameFault> {
        let rates = scene.spin;
        let spinner = scene.tracked_mut(Tracked::Spinner)?;
        let [first, second] = self.spin_axes;
        guarded_update(&mut spinner.transform, &spinner.name, |transform| {
            transform.rotate_local(first, rates.rate(first) * t);
            transform.rotate_local(second, rates.rate(second) * t);
        })
    }

    fn drift_particles(&self, scene: &mut SceneGraph) -> Option<FrameFault> {
        let step = self.particle_spin;
        let particles = scene.tracked_mut(Tracked::Particles)?;
        guarded_update(&mut particles.transform, &particles.name, |transform| {
            transform.rotate_local(Axis::Y, step);
        })
    }
}

/// Apply `update`, rolling back if the result is not finite
fn guarded_update(
    transform: &mut Transform,
    name: &str,
    update: impl FnOnce(&mut Transform),
) -> Option<FrameFault> {
    let before = *transform;
    update(transform);
    if transform.is_finite() {
        None
    } else {
        *transform = before;
        Some(FrameFault::NonFiniteTransform {
            name: name.to_string(),
        })
    }
}
