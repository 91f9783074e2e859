use anyhow::{Context, Result};
use glam::{Mat3, Mat4, Quat, Vec3};
use std::path::Path;

use super::vertex_normals;
use crate::math::{Color, Transform};
use crate::scene::{Mesh, MeshPrimitive, MeshVertex, Node, NodeKind, Texture};

/// Loads a glTF file and flattens its default scene into a single mesh node
///
/// The node carries the first root's local transform; the geometry below it
/// is baked into the vertices.
pub fn load_gltf_node(name: &str, path: impl AsRef<Path>, progress: &mut dyn FnMut(f32)) -> Result<Node> {
    let path = path.as_ref();
    log::info!("Loading glTF file: {:?}", path);
    progress(0.0);

    let (document, buffers, images) = ::gltf::import(path)
        .with_context(|| format!("Failed to load glTF file: {:?}", path))?;
    progress(0.5);

    log::debug!(
        "glTF loaded: {} scenes, {} nodes, {} meshes, {} images",
        document.scenes().count(),
        document.nodes().count(),
        document.meshes().count(),
        images.len()
    );

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .context("glTF file has no scenes")?;

    // The first root keeps its own transform on the node so placement can
    // override it; everything else is baked relative to that root
    let mut mesh = Mesh::default();
    let mut transform = Transform::identity();
    let mut roots = scene.nodes();
    if let Some(root) = roots.next() {
        let (translation, rotation, scale) = root.transform().decomposed();
        transform = Transform::new(
            Vec3::from_array(translation),
            Quat::from_array(rotation),
            Vec3::from_array(scale),
        );
        process_subtree(&root, &buffers, &images, &Mat4::IDENTITY, &mut mesh)?;

        let root_inverse = transform.matrix().inverse();
        for node in roots {
            process_node(&node, &buffers, &images, &root_inverse, &mut mesh)?;
        }
    }

    if mesh.primitives.is_empty() {
        log::warn!("No geometry found in glTF file {:?}", path);
    }

    log::info!(
        "Extracted {} triangles from {:?}",
        mesh.triangle_count(),
        path
    );
    progress(1.0);

    Ok(Node::new(name, NodeKind::Mesh(mesh)).with_transform(transform))
}

/// Recursively processes glTF nodes
fn process_node(
    node: &::gltf::Node,
    buffers: &[::gltf::buffer::Data],
    images: &[::gltf::image::Data],
    parent_transform: &Mat4,
    mesh: &mut Mesh,
) -> Result<()> {
    let local_transform = Mat4::from_cols_array_2d(&node.transform().matrix());
    let global_transform = *parent_transform * local_transform;
    process_subtree(node, buffers, images, &global_transform, mesh)
}

/// Bakes a node's mesh and children, with `transform` already including the node's own
fn process_subtree(
    node: &::gltf::Node,
    buffers: &[::gltf::buffer::Data],
    images: &[::gltf::image::Data],
    transform: &Mat4,
    mesh: &mut Mesh,
) -> Result<()> {
    if let Some(gltf_mesh) = node.mesh() {
        process_mesh(&gltf_mesh, buffers, images, transform, mesh)?;
    }

    for child in node.children() {
        process_node(&child, buffers, images, transform, mesh)?;
    }

    Ok(())
}

fn process_mesh(
    gltf_mesh: &::gltf::Mesh,
    buffers: &[::gltf::buffer::Data],
    images: &[::gltf::image::Data],
    transform: &Mat4,
    mesh: &mut Mesh,
) -> Result<()> {
    log::debug!("  Processing mesh: {:?}", gltf_mesh.name());
    let normal_matrix = Mat3::from_mat4(*transform).inverse().transpose();

    for primitive in gltf_mesh.primitives() {
        if primitive.mode() != ::gltf::mesh::Mode::Triangles {
            log::debug!("  Skipping non-triangle primitive ({:?})", primitive.mode());
            continue;
        }

        let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

        let positions: Vec<Vec3> = reader
            .read_positions()
            .context("Mesh primitive has no positions")?
            .map(|pos| transform.transform_point3(Vec3::from_array(pos)))
            .collect();

        if positions.is_empty() {
            continue;
        }

        let indices: Vec<u32> = match reader.read_indices() {
            Some(indices) => indices.into_u32().collect(),
            None => (0..positions.len() as u32).collect(),
        };

        let normals: Vec<Vec3> = match reader.read_normals() {
            Some(normals) => normals
                .map(|n| (normal_matrix * Vec3::from_array(n)).normalize_or_zero())
                .collect(),
            None => vertex_normals(&positions, &indices),
        };

        let color = material_color(&primitive.material(), images);

        let vertices = positions
            .iter()
            .zip(normals.iter().chain(std::iter::repeat(&Vec3::Y)))
            .map(|(&position, &normal)| MeshVertex {
                position,
                normal,
                color,
            })
            .collect();

        mesh.primitives.push(MeshPrimitive { vertices, indices });
    }

    Ok(())
}

/// Base color factor, tinted by the mean of the base color texture if any
fn material_color(material: &::gltf::Material, images: &[::gltf::image::Data]) -> Color {
    let pbr = material.pbr_metallic_roughness();
    let factor = pbr.base_color_factor();
    let base = Color::new(factor[0], factor[1], factor[2]);

    let texel_mean = pbr
        .base_color_texture()
        .and_then(|info| images.get(info.texture().source().index()))
        .and_then(image_to_texture)
        .map(|texture| texture.mean_color());

    match texel_mean {
        Some(mean) => base.modulate(mean),
        None => base,
    }
}

fn image_to_texture(image: &::gltf::image::Data) -> Option<Texture> {
    let rgba = match image.format {
        ::gltf::image::Format::R8G8B8A8 => image.pixels.clone(),
        ::gltf::image::Format::R8G8B8 => image
            .pixels
            .chunks_exact(3)
            .flat_map(|rgb| [rgb[0], rgb[1], rgb[2], 255])
            .collect(),
        other => {
            log::debug!("  Unsupported texture format {:?}, ignoring", other);
            return None;
        }
    };

    Some(Texture {
        width: image.width,
        height: image.height,
        rgba,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::assets::{insert_node, AssetRequest};
    use crate::loaders::AssetSource;
    use crate::scene::SceneGraph;

    // One triangle under a root node rotated 90 degrees about X and raised by 2
    const ROTATED_ROOT: &str = r#"{
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{
            "mesh": 0,
            "rotation": [0.70710677, 0.0, 0.0, 0.70710677],
            "translation": [0.0, 2.0, 0.0]
        }],
        "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0 } }] }],
        "accessors": [{
            "bufferView": 0,
            "componentType": 5126,
            "count": 3,
            "type": "VEC3",
            "min": [0.0, 0.0, 0.0],
            "max": [1.0, 1.0, 0.0]
        }],
        "bufferViews": [{ "buffer": 0, "byteLength": 36 }],
        "buffers": [{
            "byteLength": 36,
            "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAA"
        }]
    }"#;

    fn write_gltf(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("orbit-scene-gltf-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, ROTATED_ROOT).unwrap();
        path
    }

    #[test]
    fn test_root_transform_stays_on_node() {
        let node = load_gltf_node("dice", write_gltf("root.gltf"), &mut |_| {}).unwrap();

        let expected = Quat::from_rotation_x(std::f32::consts::FRAC_PI_2);
        assert!(node.transform.rotation.abs_diff_eq(expected, 1e-5));
        assert_eq!(node.transform.position, Vec3::new(0.0, 2.0, 0.0));

        let NodeKind::Mesh(mesh) = &node.kind else {
            panic!("expected a mesh");
        };
        let positions: Vec<Vec3> = mesh.primitives[0].vertices.iter().map(|v| v.position).collect();
        assert_eq!(positions, vec![Vec3::ZERO, Vec3::X, Vec3::Y]);
    }

    #[test]
    fn test_look_at_replaces_root_rotation() {
        let node = load_gltf_node("dice", write_gltf("look_at.gltf"), &mut |_| {}).unwrap();
        let mut request = AssetRequest::new("dice", AssetSource::Gltf { path: "dice.gltf".into() });
        request.placement.look_at = Some(Vec3::new(1.0, 2.0, 0.0));

        let mut scene = SceneGraph::default();
        let id = insert_node(&mut scene, &request, node);

        // +Z now points along +X from the root's position
        let rotation = scene.node(id).unwrap().transform.rotation;
        assert!((rotation * Vec3::Z).abs_diff_eq(Vec3::X, 1e-5));
    }
}
