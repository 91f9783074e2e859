mod common;

pub use common::{create_ambient, create_helpers, create_particles, create_point_lights, LightHandle};

use glam::Vec3;

use crate::camera::Camera;
use crate::config::SceneConfig;
use crate::core::{AssetRequest, ControlPanel, Placement};
use crate::loaders::AssetSource;
use crate::scene::{AngularVelocity, SceneGraph, Tracked};

/// Synchronously built part of a scene plus the loads it still waits for
#[derive(Debug)]
pub struct SceneSetup {
    pub scene: SceneGraph,
    pub lights: Vec<LightHandle>,
    pub requests: Vec<AssetRequest>,
}

/// Build lights, particles and helpers, and list the assets to load
pub fn create_scene(config: &SceneConfig) -> SceneSetup {
    let camera_config = &config.camera;
    let mut camera = Camera::new(camera_config.fov, 1.0, camera_config.near, camera_config.far);
    camera.position = Vec3::from_array(camera_config.position);
    camera.target = Vec3::from_array(camera_config.target);

    let mut scene = SceneGraph::new(camera);
    let [x, y, z] = config.spin.rate;
    scene.spin = AngularVelocity::new(x, y, z);

    create_ambient(&mut scene, &config.ambient);
    let lights = create_point_lights(&mut scene, &config.lights);

    let particles = scene.add(create_particles(&config.particles, config.seed));
    scene.track(Tracked::Particles, particles);

    if config.show_helpers {
        create_helpers(&mut scene, &lights, config.helper_size);
    }

    let mut requests: Vec<AssetRequest> = config
        .assets
        .iter()
        .map(|asset| AssetRequest {
            name: asset.name.clone(),
            source: asset.source.clone(),
            placement: Placement {
                position: asset.position.map(Vec3::from_array),
                scale: asset.scale.map(Vec3::from_array),
                look_at: asset.look_at.map(Vec3::from_array),
            },
            tracked: asset.tracked.then_some(Tracked::Spinner),
            target: asset.target.clone(),
        })
        .collect();

    if let Some(sprite) = &config.particles.sprite {
        let mut request = AssetRequest::new("particle sprite", AssetSource::Texture { path: sprite.clone() });
        request.target = Some("particles".to_string());
        requests.push(request);
    }

    log::info!(
        "Scene built: {} nodes, {} lights, {} assets pending",
        scene.len(),
        lights.len(),
        requests.len()
    );

    SceneSetup {
        scene,
        lights,
        requests,
    }
}

/// Control panel with one folder per point light and, when enabled, the
/// spin rates of the tracked model
pub fn create_panel(config: &SceneConfig, lights: &[LightHandle]) -> ControlPanel {
    let mut panel = ControlPanel::new();
    for light in lights {
        panel.add_light(&light.name, light.id, light.palette);
    }
    if config.spin.controls {
        if let Some(spinner) = config.assets.iter().find(|asset| asset.tracked) {
            panel.add_spin(&capitalize(&spinner.name), &config.spin.axes);
        }
    }
    panel
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
