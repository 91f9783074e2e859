use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{AmbientConfig, LightConfig, ParticleConfig};
use crate::math::Transform;
use crate::scene::{AmbientLight, Node, NodeId, NodeKind, PointCloud, PointLight, SceneGraph};

/// Point light added to the scene, with the palette its color control starts at
#[derive(Debug, Clone)]
pub struct LightHandle {
    pub name: String,
    pub id: NodeId,
    pub palette: crate::math::Color,
}

pub fn create_ambient(scene: &mut SceneGraph, config: &AmbientConfig) -> NodeId {
    scene.add(Node::new(
        "ambient",
        NodeKind::AmbientLight(AmbientLight {
            color: config.color.color(),
            intensity: config.intensity,
        }),
    ))
}

pub fn create_point_lights(scene: &mut SceneGraph, lights: &[LightConfig]) -> Vec<LightHandle> {
    lights
        .iter()
        .map(|light| {
            let node = Node::new(
                light.name.as_str(),
                NodeKind::PointLight(PointLight::new(light.color.color(), light.intensity)),
            )
            .with_transform(Transform::from_position(Vec3::from_array(light.position)));
            let id = scene.add(node);
            LightHandle {
                name: light.name.clone(),
                id,
                palette: light.palette.unwrap_or(light.color).color(),
            }
        })
        .collect()
}

/// Marker node drawn at each point light
pub fn create_helpers(scene: &mut SceneGraph, lights: &[LightHandle], size: f32) {
    for light in lights {
        scene.add(Node::new(
            format!("{} helper", light.name),
            NodeKind::LightHelper {
                light: light.id,
                size,
            },
        ));
    }
}

/// Random cloud of points in a cube of side `spread` centered at the origin
pub fn create_particles(config: &ParticleConfig, seed: Option<u64>) -> Node {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let positions = (0..config.count)
        .map(|_| {
            Vec3::new(
                (rng.gen::<f32>() - 0.5) * config.spread,
                (rng.gen::<f32>() - 0.5) * config.spread,
                (rng.gen::<f32>() - 0.5) * config.spread,
            )
        })
        .collect();

    Node::new(
        "particles",
        NodeKind::Points(PointCloud {
            positions,
            size: config.size,
            color: config.color.color(),
            transparent: true,
            sprite: None,
        }),
    )
}
