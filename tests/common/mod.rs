#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use glam::Vec3;

use orbit_scene::core::{AssetQueue, AssetRequest, InputRouter};
use orbit_scene::loaders::{Asset, AssetLoader, AssetSource};
use orbit_scene::math::Color;
use orbit_scene::scene::{Mesh, MeshPrimitive, MeshVertex, Node, NodeKind, SceneGraph, Texture};
use orbit_scene::traits::{DrawSurface, SceneRenderer};

/// Surface that records every call it receives
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub sizes: Vec<(u32, u32)>,
    pub ratios: Vec<f32>,
}

impl DrawSurface for RecordingSurface {
    fn set_size(&mut self, width: u32, height: u32) {
        self.sizes.push((width, height));
    }

    fn set_pixel_ratio(&mut self, ratio: f32) {
        self.ratios.push(ratio);
    }
}

/// Renderer that counts frames and snapshots node count, optionally failing
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    pub frames: usize,
    pub node_counts: Vec<usize>,
    pub fail: bool,
}

impl SceneRenderer for RecordingRenderer {
    fn render(&mut self, scene: &SceneGraph) -> Result<()> {
        self.frames += 1;
        self.node_counts.push(scene.len());
        if self.fail {
            Err(anyhow!("device lost"))
        } else {
            Ok(())
        }
    }
}

/// In-memory loader: each asset name maps to a canned result
#[derive(Default)]
pub struct StubLoader {
    assets: HashMap<String, Asset>,
}

impl StubLoader {
    pub fn with(mut self, name: &str, asset: Asset) -> Self {
        self.assets.insert(name.to_string(), asset);
        self
    }
}

impl AssetLoader for StubLoader {
    fn load(&self, name: &str, _source: &AssetSource, progress: &mut dyn FnMut(f32)) -> Result<Asset> {
        progress(0.5);
        let asset = self
            .assets
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("no such asset: {}", name))?;
        progress(1.0);
        Ok(asset)
    }
}

/// Loader whose decoder blows up on every asset
#[derive(Debug, Default)]
pub struct PanickingLoader;

impl AssetLoader for PanickingLoader {
    fn load(&self, name: &str, _source: &AssetSource, progress: &mut dyn FnMut(f32)) -> Result<Asset> {
        progress(0.1);
        panic!("corrupt buffer in {}", name);
    }
}

pub fn queue(loader: StubLoader) -> AssetQueue {
    AssetQueue::new(Arc::new(loader))
}

pub fn empty_queue() -> AssetQueue {
    queue(StubLoader::default())
}

pub fn triangle_node(name: &str) -> Node {
    let vertex = |position: Vec3| MeshVertex {
        position,
        normal: Vec3::Z,
        color: Color::WHITE,
    };
    Node::new(
        name,
        NodeKind::Mesh(Mesh {
            primitives: vec![MeshPrimitive {
                vertices: vec![vertex(Vec3::ZERO), vertex(Vec3::X), vertex(Vec3::Y)],
                indices: vec![0, 1, 2],
            }],
            map: None,
        }),
    )
}

pub fn checker_texture() -> Texture {
    Texture {
        width: 2,
        height: 1,
        rgba: vec![255, 255, 255, 255, 0, 0, 0, 255],
    }
}

pub fn gltf_request(name: &str) -> AssetRequest {
    AssetRequest::new(
        name,
        AssetSource::Gltf {
            path: format!("{}.gltf", name).into(),
        },
    )
}

pub fn router() -> InputRouter {
    InputRouter::default()
}
