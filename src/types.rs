use glam::Mat4;

use crate::scene::MeshVertex;

/// Point lights forwarded to the shader; extras are ignored
pub const MAX_LIGHTS: usize = 4;

/// Vertex layout shared by the mesh, point and line pipelines
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 3],
}

impl GpuVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x3];

    pub const fn new(position: [f32; 3], normal: [f32; 3], color: [f32; 3]) -> Self {
        Self {
            position,
            normal,
            color,
        }
    }

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<GpuVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

impl From<&MeshVertex> for GpuVertex {
    fn from(vertex: &MeshVertex) -> Self {
        Self {
            position: vertex.position.to_array(),
            normal: vertex.normal.to_array(),
            color: vertex.color.to_array(),
        }
    }
}

/// Point light data for GPU
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    pub position: [f32; 3],
    pub intensity: f32,
    pub color: [f32; 3],
    pub decay: f32,
}

/// Per-frame uniform data for GPU
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GlobalsUniform {
    pub view_proj: [[f32; 4]; 4],
    pub camera_position: [f32; 3],
    pub light_count: u32,
    pub ambient: [f32; 3],
    pub _pad: f32,
    pub lights: [LightUniform; MAX_LIGHTS],
}

impl Default for GlobalsUniform {
    fn default() -> Self {
        Self {
            view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            camera_position: [0.0; 3],
            light_count: 0,
            ambient: [0.0; 3],
            _pad: 0.0,
            lights: [LightUniform::default(); MAX_LIGHTS],
        }
    }
}

/// Per-draw uniform data, bound at a dynamic offset
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelUniform {
    pub model: [[f32; 4]; 4],
    pub normal: [[f32; 4]; 4],
    /// rgb multiplies the vertex color, a is the opacity
    pub tint: [f32; 4],
    pub _pad: [f32; 4],
}

impl ModelUniform {
    pub fn new(model: Mat4, tint: [f32; 3], opacity: f32) -> Self {
        let normal = model.inverse().transpose();
        let normal = if normal.is_finite() { normal } else { Mat4::IDENTITY };
        Self {
            model: model.to_cols_array_2d(),
            normal: normal.to_cols_array_2d(),
            tint: [tint[0], tint[1], tint[2], opacity],
            _pad: [0.0; 4],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_sizes_match_wgsl() {
        assert_eq!(std::mem::size_of::<GpuVertex>(), 36);
        assert_eq!(std::mem::size_of::<LightUniform>(), 32);
        assert_eq!(std::mem::size_of::<GlobalsUniform>(), 96 + 32 * MAX_LIGHTS);
        assert_eq!(std::mem::size_of::<ModelUniform>(), 160);
    }

    #[test]
    fn test_degenerate_scale_keeps_normal_matrix_finite() {
        let uniform = ModelUniform::new(Mat4::from_scale(glam::Vec3::ZERO), [1.0; 3], 1.0);
        assert!(uniform.normal.iter().flatten().all(|v| v.is_finite()));
    }
}
