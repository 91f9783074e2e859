use std::collections::HashMap;
use std::sync::Arc;

use glam::Vec3;

use crate::camera::Camera;
use crate::math::{Axis, Color, Transform};

/// Stable handle to a node owned by a [`SceneGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Nodes addressed by input handlers and the frame loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tracked {
    /// Model nudged by scroll and spun by the frame loop
    Spinner,
    /// Particle cloud raised/lowered by scroll and slowly rotated
    Particles,
}

/// Vertex of a loaded or generated mesh
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub color: Color,
}

#[derive(Debug, Clone, Default)]
pub struct MeshPrimitive {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl MeshPrimitive {
    pub fn triangle_count(&self) -> usize {
        if self.indices.is_empty() {
            self.vertices.len() / 3
        } else {
            self.indices.len() / 3
        }
    }
}

/// Decoded RGBA8 image
#[derive(Debug, Clone)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl Texture {
    /// Average color over all texels, used as a flat tint
    pub fn mean_color(&self) -> Color {
        let texels = self.rgba.chunks_exact(4);
        let count = texels.len();
        if count == 0 {
            return Color::WHITE;
        }
        let sum = texels.fold([0u64; 3], |acc, px| {
            [acc[0] + px[0] as u64, acc[1] + px[1] as u64, acc[2] + px[2] as u64]
        });
        let mean = |s: u64| s as f32 / (count as f32 * 255.0);
        Color::new(mean(sum[0]), mean(sum[1]), mean(sum[2]))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub primitives: Vec<MeshPrimitive>,
    pub map: Option<Arc<Texture>>,
}

impl Mesh {
    pub fn triangle_count(&self) -> usize {
        self.primitives.iter().map(MeshPrimitive::triangle_count).sum()
    }
}

#[derive(Debug, Clone)]
pub struct PointCloud {
    pub positions: Vec<Vec3>,
    pub size: f32,
    pub color: Color,
    pub transparent: bool,
    pub sprite: Option<Arc<Texture>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientLight {
    pub color: Color,
    pub intensity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub color: Color,
    pub intensity: f32,
    /// Cutoff distance, 0 means unlimited
    pub distance: f32,
    pub decay: f32,
}

impl PointLight {
    pub fn new(color: Color, intensity: f32) -> Self {
        Self {
            color,
            intensity,
            distance: 0.0,
            decay: 2.0,
        }
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Mesh(Mesh),
    Points(PointCloud),
    AmbientLight(AmbientLight),
    PointLight(PointLight),
    /// Marker drawn at the position of a point light, in its color
    LightHelper { light: NodeId, size: f32 },
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub transform: Transform,
    pub visible: bool,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            transform: Transform::identity(),
            visible: true,
            kind,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn point_light(&self) -> Option<&PointLight> {
        match &self.kind {
            NodeKind::PointLight(light) => Some(light),
            _ => None,
        }
    }

    pub fn point_light_mut(&mut self) -> Option<&mut PointLight> {
        match &mut self.kind {
            NodeKind::PointLight(light) => Some(light),
            _ => None,
        }
    }
}

/// Standing rotation rates (radians per time unit) of the spinner
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AngularVelocity {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl AngularVelocity {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn rate(&self, axis: Axis) -> f32 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    pub fn rate_mut(&mut self, axis: Axis) -> &mut f32 {
        match axis {
            Axis::X => &mut self.x,
            Axis::Y => &mut self.y,
            Axis::Z => &mut self.z,
        }
    }
}

/// Owned scene state: nodes, camera, spin rates and tracked handles
///
/// Nodes are append-only; a [`NodeId`] stays valid for the lifetime of the
/// graph.
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    nodes: Vec<Node>,
    tracked: HashMap<Tracked, NodeId>,
    animated: bool,
    pub camera: Camera,
    pub spin: AngularVelocity,
}

impl SceneGraph {
    pub fn new(camera: Camera) -> Self {
        Self {
            nodes: Vec::new(),
            tracked: HashMap::new(),
            animated: false,
            camera,
            spin: AngularVelocity::default(),
        }
    }

    pub fn add(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        log::debug!("Scene: added node {:?} '{}'", id, node.name);
        self.nodes.push(node);
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|node| node.name == name)
            .map(NodeId)
    }

    /// Bind a handle to a node, replacing any previous binding
    pub fn track(&mut self, handle: Tracked, id: NodeId) {
        self.tracked.insert(handle, id);
    }

    pub fn tracked(&self, handle: Tracked) -> Option<NodeId> {
        self.tracked.get(&handle).copied()
    }

    pub fn tracked_mut(&mut self, handle: Tracked) -> Option<&mut Node> {
        let id = self.tracked(handle)?;
        self.node_mut(id)
    }

    /// Mark the graph as driven by a frame loop; false if one already is
    pub(crate) fn claim_animation(&mut self) -> bool {
        !std::mem::replace(&mut self.animated, true)
    }

    pub(crate) fn release_animation(&mut self) {
        self.animated = false;
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, node)| (NodeId(i), node))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ambient term summed over all visible ambient lights
    pub fn ambient(&self) -> Color {
        self.nodes
            .iter()
            .filter(|node| node.visible)
            .filter_map(|node| match &node.kind {
                NodeKind::AmbientLight(light) => Some(light.color.scaled(light.intensity)),
                _ => None,
            })
            .fold(Color::BLACK, |acc, c| Color::new(acc.r + c.r, acc.g + c.g, acc.b + c.b))
    }

    /// Visible point lights with their world positions
    pub fn point_lights(&self) -> impl Iterator<Item = (Vec3, &PointLight)> {
        self.nodes
            .iter()
            .filter(|node| node.visible)
            .filter_map(|node| node.point_light().map(|light| (node.transform.position, light)))
    }
}
