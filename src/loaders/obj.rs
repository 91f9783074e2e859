use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use glam::Vec3;

use super::vertex_normals;
use crate::math::Color;
use crate::scene::{Mesh, MeshPrimitive, MeshVertex, Node, NodeKind};

/// Loads a Wavefront OBJ file with its material library into one mesh node
///
/// When `material` is given it replaces whatever `mtllib` the OBJ names.
/// Each model becomes a primitive colored by its material's diffuse term.
pub fn load_obj_node(
    name: &str,
    path: impl AsRef<Path>,
    material: Option<&Path>,
    progress: &mut dyn FnMut(f32),
) -> Result<Node> {
    let path = path.as_ref();
    log::info!("Loading OBJ file: {:?}", path);
    progress(0.0);

    let options = tobj::LoadOptions {
        single_index: true,
        triangulate: true,
        ..Default::default()
    };

    let (models, materials) = match material {
        Some(mtl_path) => {
            let file = File::open(path).with_context(|| format!("Failed to open OBJ file: {:?}", path))?;
            let mut reader = BufReader::new(file);
            tobj::load_obj_buf(&mut reader, &options, |_| tobj::load_mtl(mtl_path))
        }
        None => tobj::load_obj(path, &options),
    }
    .with_context(|| format!("Failed to parse OBJ file: {:?}", path))?;
    progress(0.5);

    let materials = materials.unwrap_or_else(|err| {
        log::warn!("Material library for {:?} unavailable ({}), using white", path, err);
        Vec::new()
    });

    log::debug!(
        "OBJ loaded: {} models, {} materials",
        models.len(),
        materials.len()
    );

    let mut mesh = Mesh::default();
    for model in &models {
        let color = model
            .mesh
            .material_id
            .and_then(|id| materials.get(id))
            .and_then(|material| material.diffuse)
            .map(Color::from)
            .unwrap_or(Color::WHITE);

        if let Some(primitive) = model_primitive(&model.mesh, color) {
            mesh.primitives.push(primitive);
        }
    }

    log::info!(
        "Extracted {} triangles from {:?}",
        mesh.triangle_count(),
        path
    );
    progress(1.0);

    Ok(Node::new(name, NodeKind::Mesh(mesh)))
}

fn model_primitive(source: &tobj::Mesh, color: Color) -> Option<MeshPrimitive> {
    let positions: Vec<Vec3> = source
        .positions
        .chunks_exact(3)
        .map(|p| Vec3::new(p[0], p[1], p[2]))
        .collect();
    if positions.is_empty() {
        return None;
    }

    let indices = source.indices.clone();
    let normals: Vec<Vec3> = if source.normals.len() == source.positions.len() {
        source
            .normals
            .chunks_exact(3)
            .map(|n| Vec3::new(n[0], n[1], n[2]).normalize_or_zero())
            .collect()
    } else {
        vertex_normals(&positions, &indices)
    };

    let vertices = positions
        .into_iter()
        .zip(normals)
        .map(|(position, normal)| MeshVertex {
            position,
            normal,
            color,
        })
        .collect();

    Some(MeshPrimitive { vertices, indices })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(name: &str, contents: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("orbit-scene-obj-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_quad_with_explicit_material() {
        let mtl = write_temp("quad.mtl", "newmtl red\nKd 1.0 0.0 0.0\n");
        let obj = write_temp(
            "quad.obj",
            "mtllib missing.mtl\nv 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nusemtl red\nf 1 2 3 4\n",
        );

        let mut steps = Vec::new();
        let node = load_obj_node("quad", &obj, Some(&mtl), &mut |p| steps.push(p)).unwrap();

        let NodeKind::Mesh(mesh) = node.kind else {
            panic!("expected a mesh");
        };
        assert_eq!(mesh.triangle_count(), 2);
        let vertex = mesh.primitives[0].vertices[0];
        assert_eq!(vertex.color, Color::new(1.0, 0.0, 0.0));
        assert!(vertex.normal.abs_diff_eq(Vec3::Z, 1e-5));
        assert_eq!(steps.last(), Some(&1.0));
    }

    #[test]
    fn test_missing_obj_fails() {
        let result = load_obj_node("none", "no/such/file.obj", None, &mut |_| {});
        assert!(result.is_err());
    }
}
