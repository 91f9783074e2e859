pub mod gltf;
pub mod obj;
pub mod texture;

use std::path::{Path, PathBuf};

use anyhow::Result;
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::scene::{Node, Texture};

/// Where an asset comes from and how to decode it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssetSource {
    Gltf {
        path: PathBuf,
    },
    Obj {
        path: PathBuf,
        /// Material library; when absent the `mtllib` named in the file is used
        #[serde(default)]
        material: Option<PathBuf>,
    },
    Texture {
        path: PathBuf,
    },
}

impl AssetSource {
    pub fn path(&self) -> &Path {
        match self {
            AssetSource::Gltf { path } | AssetSource::Obj { path, .. } | AssetSource::Texture { path } => path,
        }
    }

    /// Resolve relative paths against `root`
    pub fn rebase(&mut self, root: &Path) {
        let join = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = root.join(&*path);
            }
        };
        match self {
            AssetSource::Gltf { path } | AssetSource::Texture { path } => join(path),
            AssetSource::Obj { path, material } => {
                join(path);
                if let Some(material) = material {
                    join(material);
                }
            }
        }
    }
}

/// Decoded result of a load
#[derive(Debug, Clone)]
pub enum Asset {
    Node(Node),
    Texture(Texture),
}

/// Decodes assets; runs on a worker thread, never on the frame thread
pub trait AssetLoader: Send + Sync {
    /// Load `source`, reporting fractional completion in [0, 1]
    fn load(&self, name: &str, source: &AssetSource, progress: &mut dyn FnMut(f32)) -> Result<Asset>;
}

/// Loader backed by the filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FileLoader;

impl AssetLoader for FileLoader {
    fn load(&self, name: &str, source: &AssetSource, progress: &mut dyn FnMut(f32)) -> Result<Asset> {
        match source {
            AssetSource::Gltf { path } => gltf::load_gltf_node(name, path, progress).map(Asset::Node),
            AssetSource::Obj { path, material } => {
                obj::load_obj_node(name, path, material.as_deref(), progress).map(Asset::Node)
            }
            AssetSource::Texture { path } => texture::load_texture(path, progress).map(Asset::Texture),
        }
    }
}

/// Smooth per-vertex normals from indexed triangles
pub(crate) fn vertex_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        if a >= positions.len() || b >= positions.len() || c >= positions.len() {
            continue;
        }
        let face = (positions[b] - positions[a]).cross(positions[c] - positions[a]);
        normals[a] += face;
        normals[b] += face;
        normals[c] += face;
    }
    normals
        .into_iter()
        .map(|n| n.try_normalize().unwrap_or(Vec3::Y))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_normals_flat_triangle() {
        let positions = [Vec3::ZERO, Vec3::X, Vec3::Y];
        let normals = vertex_normals(&positions, &[0, 1, 2]);
        for n in normals {
            assert!(n.abs_diff_eq(Vec3::Z, 1e-6));
        }
    }

    #[test]
    fn test_vertex_normals_skips_bad_indices() {
        let positions = [Vec3::ZERO, Vec3::X, Vec3::Y];
        let normals = vertex_normals(&positions, &[0, 1, 9]);
        // Unreferenced vertices fall back to +Y
        assert!(normals.iter().all(|n| n.abs_diff_eq(Vec3::Y, 1e-6)));
    }

    #[test]
    fn test_rebase_only_touches_relative_paths() {
        let mut source = AssetSource::Obj {
            path: PathBuf::from("desk.obj"),
            material: Some(PathBuf::from("/abs/desk.mtl")),
        };
        source.rebase(Path::new("/assets"));
        assert_eq!(
            source,
            AssetSource::Obj {
                path: PathBuf::from("/assets/desk.obj"),
                material: Some(PathBuf::from("/abs/desk.mtl")),
            }
        );
    }

    #[test]
    fn test_missing_file_fails() {
        let source = AssetSource::Gltf {
            path: PathBuf::from("definitely/not/here.gltf"),
        };
        let result = FileLoader.load("missing", &source, &mut |_| {});
        assert!(result.is_err());
    }
}
