mod common;

use glam::Quat;

use common::{empty_queue, router, triangle_node, RecordingRenderer};
use orbit_scene::config::{ParticleConfig, SpinConfig, TimeBase};
use orbit_scene::core::{AnimationLoop, LoopError, LoopState, ManualClock, Reschedule};
use orbit_scene::scene::{SceneGraph, Tracked};

fn spinning_scene() -> SceneGraph {
    let mut scene = SceneGraph::default();
    let dice = scene.add(triangle_node("dice"));
    scene.track(Tracked::Spinner, dice);
    scene.spin.y = 0.1;
    scene.spin.z = 0.1;
    scene
}

fn rotation_of(scene: &SceneGraph, handle: Tracked) -> Quat {
    let id = scene.tracked(handle).unwrap();
    scene.node(id).unwrap().transform.rotation
}

fn new_loop(clock: &ManualClock) -> AnimationLoop<ManualClock> {
    AnimationLoop::new(clock.clone(), &SpinConfig::default(), &ParticleConfig::default())
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_frame_before_start_is_rejected() {
    let clock = ManualClock::new(0.0);
    let mut frame_loop = new_loop(&clock);
    let mut scene = spinning_scene();
    let mut renderer = RecordingRenderer::default();

    let result = frame_loop.frame(&mut scene, &mut empty_queue(), &mut router(), &mut renderer);
    assert_eq!(result, Err(LoopError::NotStarted));
    assert_eq!(renderer.frames, 0);
}

#[test]
fn test_double_start_is_rejected() {
    let clock = ManualClock::new(0.0);
    let mut frame_loop = new_loop(&clock);
    let mut scene = spinning_scene();

    assert_eq!(frame_loop.start(&mut scene), Ok(()));
    assert_eq!(frame_loop.start(&mut scene), Err(LoopError::AlreadyStarted));
    assert_eq!(frame_loop.state(), LoopState::Scheduled);
}

#[test]
fn test_rejected_start_keeps_loop_running() {
    let clock = ManualClock::new(0.0);
    let mut frame_loop = new_loop(&clock);
    let mut scene = spinning_scene();
    let mut renderer = RecordingRenderer::default();

    frame_loop.start(&mut scene).unwrap();
    assert!(frame_loop.start(&mut scene).is_err());

    // The host reschedules while the loop is still scheduled
    assert_eq!(frame_loop.state(), LoopState::Scheduled);
    let next = frame_loop.frame(&mut scene, &mut empty_queue(), &mut router(), &mut renderer);
    assert_eq!(next, Ok(Reschedule::NextFrame));
    assert_eq!(renderer.frames, 1);
}

#[test]
fn test_second_loop_on_same_scene_is_rejected() {
    let clock = ManualClock::new(0.0);
    let mut first = new_loop(&clock);
    let mut second = new_loop(&clock);
    let mut scene = spinning_scene();

    first.start(&mut scene).unwrap();
    assert_eq!(second.start(&mut scene), Err(LoopError::SceneBusy));
    assert_eq!(second.state(), LoopState::Idle);
}

#[test]
fn test_stop_token_ends_loop_and_frees_scene() {
    let clock = ManualClock::new(0.0);
    let mut frame_loop = new_loop(&clock);
    let mut scene = spinning_scene();
    let mut renderer = RecordingRenderer::default();
    let mut assets = empty_queue();
    let mut router = router();

    frame_loop.start(&mut scene).unwrap();
    assert_eq!(
        frame_loop.frame(&mut scene, &mut assets, &mut router, &mut renderer),
        Ok(Reschedule::NextFrame)
    );

    frame_loop.stop_token().stop();
    assert_eq!(
        frame_loop.frame(&mut scene, &mut assets, &mut router, &mut renderer),
        Ok(Reschedule::Stop)
    );
    assert_eq!(frame_loop.state(), LoopState::Stopped);
    assert_eq!(renderer.frames, 1);

    assert_eq!(
        frame_loop.frame(&mut scene, &mut assets, &mut router, &mut renderer),
        Err(LoopError::Stopped)
    );

    // A fresh loop may now claim the scene
    let mut next = new_loop(&clock);
    assert_eq!(next.start(&mut scene), Ok(()));
}

// ============================================================================
// Per-frame updates
// ============================================================================

#[test]
fn test_spin_scales_with_elapsed_time() {
    let clock = ManualClock::new(0.0);
    let mut frame_loop = new_loop(&clock);
    let mut scene = spinning_scene();
    let mut renderer = RecordingRenderer::default();

    frame_loop.start(&mut scene).unwrap();
    clock.set(10.0);
    frame_loop
        .frame(&mut scene, &mut empty_queue(), &mut router(), &mut renderer)
        .unwrap();

    let expected = Quat::from_rotation_y(1.0) * Quat::from_rotation_z(1.0);
    assert!(rotation_of(&scene, Tracked::Spinner).abs_diff_eq(expected, 1e-5));
    assert_eq!(renderer.frames, 1);
}

#[test]
fn test_since_last_frame_uses_delta() {
    let clock = ManualClock::new(0.0);
    let spin = SpinConfig {
        time_base: TimeBase::SinceLastFrame,
        ..SpinConfig::default()
    };
    let mut frame_loop = AnimationLoop::new(clock.clone(), &spin, &ParticleConfig::default());
    let mut scene = spinning_scene();
    let mut renderer = RecordingRenderer::default();
    let mut assets = empty_queue();
    let mut router = router();

    frame_loop.start(&mut scene).unwrap();
    clock.set(8.0);
    frame_loop.frame(&mut scene, &mut assets, &mut router, &mut renderer).unwrap();
    clock.set(10.0);
    frame_loop.frame(&mut scene, &mut assets, &mut router, &mut renderer).unwrap();

    // 0.8 rad then 0.2 rad about each axis
    let expected = Quat::from_rotation_y(0.8)
        * Quat::from_rotation_z(0.8)
        * Quat::from_rotation_y(0.2)
        * Quat::from_rotation_z(0.2);
    assert!(rotation_of(&scene, Tracked::Spinner).abs_diff_eq(expected, 1e-5));
}

#[test]
fn test_particles_rotate_each_frame() {
    let clock = ManualClock::new(0.0);
    let mut frame_loop = new_loop(&clock);
    let mut scene = SceneGraph::default();
    let particles = scene.add(triangle_node("particles"));
    scene.track(Tracked::Particles, particles);
    let mut renderer = RecordingRenderer::default();
    let mut assets = empty_queue();
    let mut router = router();

    frame_loop.start(&mut scene).unwrap();
    for _ in 0..3 {
        frame_loop.frame(&mut scene, &mut assets, &mut router, &mut renderer).unwrap();
    }

    let expected = Quat::from_rotation_y(0.003);
    assert!(rotation_of(&scene, Tracked::Particles).abs_diff_eq(expected, 1e-6));
}

#[test]
fn test_frames_without_spinner_still_render() {
    let clock = ManualClock::new(0.0);
    let mut frame_loop = new_loop(&clock);
    let mut scene = SceneGraph::default();
    let mut renderer = RecordingRenderer::default();
    let mut assets = empty_queue();
    let mut router = router();

    frame_loop.start(&mut scene).unwrap();
    for _ in 0..5 {
        clock.advance(1.0 / 60.0);
        let next = frame_loop.frame(&mut scene, &mut assets, &mut router, &mut renderer);
        assert_eq!(next, Ok(Reschedule::NextFrame));
    }
    assert_eq!(renderer.frames, 5);
    assert_eq!(frame_loop.faults(), 0);
}

// ============================================================================
// Fault tolerance
// ============================================================================

#[test]
fn test_non_finite_spin_is_rolled_back() {
    let clock = ManualClock::new(0.0);
    let mut frame_loop = new_loop(&clock);
    let mut scene = spinning_scene();
    scene.spin.y = f32::NAN;
    let mut renderer = RecordingRenderer::default();

    frame_loop.start(&mut scene).unwrap();
    clock.set(1.0);
    let next = frame_loop.frame(&mut scene, &mut empty_queue(), &mut router(), &mut renderer);

    assert_eq!(next, Ok(Reschedule::NextFrame));
    assert_eq!(rotation_of(&scene, Tracked::Spinner), Quat::IDENTITY);
    assert_eq!(renderer.frames, 1);
    assert_eq!(frame_loop.faults(), 1);
}

#[test]
fn test_render_failure_still_reschedules() {
    let clock = ManualClock::new(0.0);
    let mut frame_loop = new_loop(&clock);
    let mut scene = spinning_scene();
    let mut renderer = RecordingRenderer {
        fail: true,
        ..RecordingRenderer::default()
    };
    let mut assets = empty_queue();
    let mut router = router();

    frame_loop.start(&mut scene).unwrap();
    for _ in 0..3 {
        let next = frame_loop.frame(&mut scene, &mut assets, &mut router, &mut renderer);
        assert_eq!(next, Ok(Reschedule::NextFrame));
    }
    assert_eq!(renderer.frames, 3);
    assert_eq!(frame_loop.frames(), 3);
    assert_eq!(frame_loop.faults(), 3);
}
