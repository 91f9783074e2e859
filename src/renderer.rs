use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::core::input_router::clamp_pixel_ratio;
use crate::scene::{Node, NodeId, NodeKind, SceneGraph};
use crate::traits::{DrawSurface, SceneRenderer};
use crate::types::{GlobalsUniform, GpuVertex, LightUniform, ModelUniform, MAX_LIGHTS};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const HELPER_SEGMENTS: u32 = 32;
const INITIAL_DRAW_CAPACITY: usize = 64;

/// Which pipeline a draw goes through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DrawKind {
    Mesh,
    Points,
    Lines,
}

/// Uploaded geometry for one node
struct GpuGeometry {
    vertex_buffer: wgpu::Buffer,
    index_buffer: Option<wgpu::Buffer>,
    count: u32,
}

struct Draw<'a> {
    kind: DrawKind,
    geometry: &'a GpuGeometry,
}

/// Offscreen color and depth attachments the scene is drawn into
struct RenderTarget {
    size: (u32, u32),
    color_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
    display_bind_group: wgpu::BindGroup,
}

/// egui output prepared ahead of the frame
struct UiFrame {
    primitives: Vec<egui::ClippedPrimitive>,
    textures_delta: egui::TexturesDelta,
    pixels_per_point: f32,
}

/// Rasterizes a [`SceneGraph`] into a window with wgpu, plus an egui overlay
///
/// The scene goes to an offscreen target sized `logical size * pixel ratio`
/// which a display pass stretches over the window surface.
pub struct WgpuRenderer {
    window: Arc<Window>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    logical_size: (u32, u32),
    pixel_ratio: f32,
    target: RenderTarget,
    target_dirty: bool,
    display_layout: wgpu::BindGroupLayout,
    display_pipeline: wgpu::RenderPipeline,
    sampler: wgpu::Sampler,
    mesh_pipeline: wgpu::RenderPipeline,
    points_pipeline: wgpu::RenderPipeline,
    lines_pipeline: wgpu::RenderPipeline,
    globals_buffer: wgpu::Buffer,
    globals_bind_group: wgpu::BindGroup,
    model_layout: wgpu::BindGroupLayout,
    model_buffer: wgpu::Buffer,
    model_bind_group: wgpu::BindGroup,
    model_stride: u64,
    model_capacity: usize,
    geometry: HashMap<NodeId, Option<GpuGeometry>>,
    helper_geometry: GpuGeometry,
    warned_light_overflow: bool,
    egui_renderer: egui_wgpu::Renderer,
    egui_state: egui_winit::State,
    egui_ctx: egui::Context,
    ui_frame: Option<UiFrame>,
}

impl WgpuRenderer {
    pub async fn new(window: Arc<Window>) -> Result<Self> {
        let size = window.inner_size();
        let scale_factor = window.scale_factor();
        let logical: winit::dpi::LogicalSize<u32> = size.to_logical(scale_factor);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("Failed to create window surface")?;
        let adapter = Self::request_adapter(&instance, &surface).await?;
        let (device, queue) = Self::request_device(&adapter).await?;

        let surface_config = Self::create_surface_config(&surface, &adapter, size)?;
        surface.configure(&device, &surface_config);
        let color_format = surface_config.format;

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let (display_pipeline, display_layout) = Self::create_display_pipeline(&device, color_format);

        let pixel_ratio = clamp_pixel_ratio(scale_factor as f32);
        let logical_size = (logical.width.max(1), logical.height.max(1));
        let target = Self::create_target(
            &device,
            &display_layout,
            &sampler,
            color_format,
            target_size(logical_size, pixel_ratio),
        );

        let globals_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Globals Buffer"),
            contents: bytemuck::cast_slice(&[GlobalsUniform::default()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let globals_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("globals_bind_group_layout"),
        });

        let globals_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &globals_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buffer.as_entire_binding(),
            }],
            label: Some("globals_bind_group"),
        });

        let model_size = std::mem::size_of::<ModelUniform>() as u64;
        let model_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(model_size),
                },
                count: None,
            }],
            label: Some("model_bind_group_layout"),
        });

        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let model_stride = model_size.div_ceil(alignment) * alignment;
        let (model_buffer, model_bind_group) =
            Self::create_model_buffer(&device, &model_layout, model_stride, INITIAL_DRAW_CAPACITY);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Scene Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("scene.wgsl").into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[&globals_layout, &model_layout],
            push_constant_ranges: &[],
        });

        let mesh_pipeline = Self::create_scene_pipeline(
            &device,
            &pipeline_layout,
            &shader,
            color_format,
            DrawKind::Mesh,
        );
        let points_pipeline = Self::create_scene_pipeline(
            &device,
            &pipeline_layout,
            &shader,
            color_format,
            DrawKind::Points,
        );
        let lines_pipeline = Self::create_scene_pipeline(
            &device,
            &pipeline_layout,
            &shader,
            color_format,
            DrawKind::Lines,
        );

        let helper_vertices = helper_lines(HELPER_SEGMENTS);
        let helper_geometry = GpuGeometry {
            vertex_buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Light Helper Vertices"),
                contents: bytemuck::cast_slice(&helper_vertices),
                usage: wgpu::BufferUsages::VERTEX,
            }),
            index_buffer: None,
            count: helper_vertices.len() as u32,
        };

        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(scale_factor as f32),
            None,
            None,
        );
        let egui_renderer =
            egui_wgpu::Renderer::new(&device, color_format, egui_wgpu::RendererOptions::default());

        log::info!(
            "Renderer initialized: {}x{} surface, {:?}",
            size.width,
            size.height,
            color_format
        );

        Ok(Self {
            window,
            device,
            queue,
            surface,
            surface_config,
            logical_size,
            pixel_ratio,
            target,
            target_dirty: false,
            display_layout,
            display_pipeline,
            sampler,
            mesh_pipeline,
            points_pipeline,
            lines_pipeline,
            globals_buffer,
            globals_bind_group,
            model_layout,
            model_buffer,
            model_bind_group,
            model_stride,
            model_capacity: INITIAL_DRAW_CAPACITY,
            geometry: HashMap::new(),
            helper_geometry,
            warned_light_overflow: false,
            egui_renderer,
            egui_state,
            egui_ctx,
            ui_frame: None,
        })
    }

    async fn request_adapter(
        instance: &wgpu::Instance,
        surface: &wgpu::Surface<'_>,
    ) -> Result<wgpu::Adapter> {
        instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(surface),
                force_fallback_adapter: false,
            })
            .await
            .context("Failed to find appropriate adapter")
    }

    async fn request_device(adapter: &wgpu::Adapter) -> Result<(wgpu::Device, wgpu::Queue)> {
        adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
                experimental_features: Default::default(),
                trace: Default::default(),
            })
            .await
            .context("Failed to create device")
    }

    fn create_surface_config(
        surface: &wgpu::Surface,
        adapter: &wgpu::Adapter,
        size: winit::dpi::PhysicalSize<u32>,
    ) -> Result<wgpu::SurfaceConfiguration> {
        let surface_caps = surface.get_capabilities(adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("Surface reports no supported formats")?;

        Ok(wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        })
    }

    fn create_target(
        device: &wgpu::Device,
        display_layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        format: wgpu::TextureFormat,
        size: (u32, u32),
    ) -> RenderTarget {
        let extent = wgpu::Extent3d {
            width: size.0,
            height: size.1,
            depth_or_array_layers: 1,
        };

        let color = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Scene Color Texture"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let depth = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Scene Depth Texture"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());

        let display_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: display_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&color_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
            label: Some("display_bind_group"),
        });

        RenderTarget {
            size,
            color_view,
            depth_view,
            display_bind_group,
        }
    }

    fn create_model_buffer(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        stride: u64,
        capacity: usize,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Model Buffer"),
            size: stride * capacity as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<ModelUniform>() as u64),
                }),
            }],
            label: Some("model_bind_group"),
        });

        (buffer, bind_group)
    }

    fn create_display_pipeline(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
    ) -> (wgpu::RenderPipeline, wgpu::BindGroupLayout) {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Display Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("display.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
            label: Some("display_bind_group_layout"),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Display Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Display Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        });

        (pipeline, bind_group_layout)
    }

    fn create_scene_pipeline(
        device: &wgpu::Device,
        layout: &wgpu::PipelineLayout,
        shader: &wgpu::ShaderModule,
        format: wgpu::TextureFormat,
        kind: DrawKind,
    ) -> wgpu::RenderPipeline {
        let (label, topology, fragment_entry, blend, depth_write) = match kind {
            DrawKind::Mesh => (
                "Mesh Pipeline",
                wgpu::PrimitiveTopology::TriangleList,
                "fs_lit",
                wgpu::BlendState::REPLACE,
                true,
            ),
            DrawKind::Points => (
                "Points Pipeline",
                wgpu::PrimitiveTopology::PointList,
                "fs_unlit",
                wgpu::BlendState::ALPHA_BLENDING,
                false,
            ),
            DrawKind::Lines => (
                "Lines Pipeline",
                wgpu::PrimitiveTopology::LineList,
                "fs_unlit",
                wgpu::BlendState::REPLACE,
                true,
            ),
        };

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: Some("vs_main"),
                buffers: &[GpuVertex::layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: Some(fragment_entry),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(blend),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: depth_write,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        })
    }

    /// Let egui see a window event first; returns true if it consumed it
    pub fn handle_event(&mut self, event: &winit::event::WindowEvent) -> bool {
        self.egui_state.on_window_event(&self.window, event).consumed
    }

    /// Run the UI for the coming frame; drawn over the scene by the next render
    pub fn prepare_ui(&mut self, mut run_ui: impl FnMut(&egui::Context)) {
        let raw_input = self.egui_state.take_egui_input(&self.window);
        let full_output = self.egui_ctx.run(raw_input, |ctx| run_ui(ctx));

        self.egui_state
            .handle_platform_output(&self.window, full_output.platform_output);

        let pixels_per_point = full_output.pixels_per_point;
        let primitives = self.egui_ctx.tessellate(full_output.shapes, pixels_per_point);

        // Texture updates from a skipped frame must not be lost
        let textures_delta = match self.ui_frame.take() {
            Some(mut pending) => {
                pending.textures_delta.append(full_output.textures_delta);
                pending.textures_delta
            }
            None => full_output.textures_delta,
        };

        self.ui_frame = Some(UiFrame {
            primitives,
            textures_delta,
            pixels_per_point,
        });
    }

    fn refresh_target(&mut self) {
        let size = self.window.inner_size();
        if size.width > 0 && size.height > 0 {
            self.surface_config.width = size.width;
            self.surface_config.height = size.height;
            self.surface.configure(&self.device, &self.surface_config);
        }

        let target = target_size(self.logical_size, self.pixel_ratio);
        if target != self.target.size {
            self.target = Self::create_target(
                &self.device,
                &self.display_layout,
                &self.sampler,
                self.surface_config.format,
                target,
            );
            log::debug!("Scene target resized to {}x{}", target.0, target.1);
        }
        self.target_dirty = false;
    }

    fn write_globals(&mut self, scene: &SceneGraph) {
        let mut globals = GlobalsUniform {
            view_proj: scene.camera.view_projection().to_cols_array_2d(),
            camera_position: scene.camera.position.to_array(),
            ambient: scene.ambient().to_array(),
            ..GlobalsUniform::default()
        };

        let mut count = 0;
        for (position, light) in scene.point_lights() {
            if count == MAX_LIGHTS {
                if !self.warned_light_overflow {
                    log::warn!("Only the first {} point lights are rendered", MAX_LIGHTS);
                    self.warned_light_overflow = true;
                }
                break;
            }
            globals.lights[count] = LightUniform {
                position: position.to_array(),
                intensity: light.intensity,
                color: light.color.to_array(),
                decay: light.decay,
            };
            count += 1;
        }
        globals.light_count = count as u32;

        self.queue
            .write_buffer(&self.globals_buffer, 0, bytemuck::cast_slice(&[globals]));
    }

    fn ensure_model_capacity(&mut self, draws: usize) {
        if draws <= self.model_capacity {
            return;
        }
        let capacity = draws.next_power_of_two();
        let (buffer, bind_group) =
            Self::create_model_buffer(&self.device, &self.model_layout, self.model_stride, capacity);
        self.model_buffer = buffer;
        self.model_bind_group = bind_group;
        self.model_capacity = capacity;
        log::debug!("Model buffer grown to {} draws", capacity);
    }

    fn encode_ui(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
    ) {
        let Some(ui) = self.ui_frame.take() else {
            return;
        };

        for (id, image_delta) in &ui.textures_delta.set {
            self.egui_renderer
                .update_texture(&self.device, &self.queue, *id, image_delta);
        }

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.surface_config.width, self.surface_config.height],
            pixels_per_point: ui.pixels_per_point,
        };

        self.egui_renderer.update_buffers(
            &self.device,
            &self.queue,
            encoder,
            &ui.primitives,
            &screen_descriptor,
        );

        {
            let render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("egui Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            let mut render_pass = render_pass.forget_lifetime();
            self.egui_renderer
                .render(&mut render_pass, &ui.primitives, &screen_descriptor);
        }

        for id in &ui.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }
    }
}

impl SceneRenderer for WgpuRenderer {
    fn render(&mut self, scene: &SceneGraph) -> Result<()> {
        if self.target_dirty {
            self.refresh_target();
        }

        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::debug!("Surface lost or outdated, reconfiguring");
                self.refresh_target();
                return Ok(());
            }
            Err(err) => return Err(err).context("Failed to acquire surface texture"),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.write_globals(scene);

        for (id, node) in scene.iter() {
            if !self.geometry.contains_key(&id) {
                let geometry = create_geometry(&self.device, node);
                self.geometry.insert(id, geometry);
            }
        }

        let instances: Vec<(NodeId, DrawKind, ModelUniform)> = scene
            .iter()
            .filter(|(_, node)| node.visible)
            .filter_map(|(id, node)| draw_instance(scene, id, node))
            .collect();

        self.ensure_model_capacity(instances.len());
        let stride = self.model_stride as usize;
        let mut model_bytes = vec![0u8; stride * instances.len()];
        for (i, (_, _, uniform)) in instances.iter().enumerate() {
            let bytes = bytemuck::bytes_of(uniform);
            model_bytes[i * stride..i * stride + bytes.len()].copy_from_slice(bytes);
        }
        if !model_bytes.is_empty() {
            self.queue.write_buffer(&self.model_buffer, 0, &model_bytes);
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Encoder"),
            });

        {
            let draws: Vec<(usize, Draw)> = instances
                .iter()
                .enumerate()
                .filter_map(|(i, (id, kind, _))| {
                    let geometry = match kind {
                        DrawKind::Lines => &self.helper_geometry,
                        _ => self.geometry.get(id)?.as_ref()?,
                    };
                    Some((i, Draw { kind: *kind, geometry }))
                })
                .collect();

            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.target.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.target.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            render_pass.set_bind_group(0, &self.globals_bind_group, &[]);

            // Opaque geometry first so transparent points blend over it
            let ordered = draws
                .iter()
                .filter(|(_, draw)| draw.kind != DrawKind::Points)
                .chain(draws.iter().filter(|(_, draw)| draw.kind == DrawKind::Points));

            for (slot, draw) in ordered {
                let pipeline = match draw.kind {
                    DrawKind::Mesh => &self.mesh_pipeline,
                    DrawKind::Points => &self.points_pipeline,
                    DrawKind::Lines => &self.lines_pipeline,
                };
                let offset = (*slot as u64 * self.model_stride) as wgpu::DynamicOffset;

                render_pass.set_pipeline(pipeline);
                render_pass.set_bind_group(1, &self.model_bind_group, &[offset]);
                render_pass.set_vertex_buffer(0, draw.geometry.vertex_buffer.slice(..));
                match &draw.geometry.index_buffer {
                    Some(indices) => {
                        render_pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
                        render_pass.draw_indexed(0..draw.geometry.count, 0, 0..1);
                    }
                    None => render_pass.draw(0..draw.geometry.count, 0..1),
                }
            }
        }

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Display Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            render_pass.set_pipeline(&self.display_pipeline);
            render_pass.set_bind_group(0, &self.target.display_bind_group, &[]);
            render_pass.draw(0..6, 0..1);
        }

        self.encode_ui(&mut encoder, &view);

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}

impl DrawSurface for WgpuRenderer {
    fn set_size(&mut self, width: u32, height: u32) {
        self.logical_size = (width.max(1), height.max(1));
        self.target_dirty = true;
    }

    fn set_pixel_ratio(&mut self, ratio: f32) {
        self.pixel_ratio = ratio;
        self.target_dirty = true;
    }
}

/// Backing store size for a logical size at a pixel ratio
pub fn target_size(logical: (u32, u32), pixel_ratio: f32) -> (u32, u32) {
    let scale = |v: u32| ((v as f32 * pixel_ratio).round() as u32).max(1);
    (scale(logical.0), scale(logical.1))
}

/// Model matrix, tint and pipeline for one visible node
fn draw_instance(scene: &SceneGraph, id: NodeId, node: &Node) -> Option<(NodeId, DrawKind, ModelUniform)> {
    match &node.kind {
        NodeKind::Mesh(mesh) => {
            let tint = mesh
                .map
                .as_ref()
                .map(|texture| texture.mean_color())
                .unwrap_or_default();
            Some((id, DrawKind::Mesh, ModelUniform::new(node.transform.matrix(), tint.to_array(), 1.0)))
        }
        NodeKind::Points(cloud) => {
            let mut tint = cloud.color;
            if let Some(sprite) = &cloud.sprite {
                tint = tint.modulate(sprite.mean_color());
            }
            let opacity = if cloud.transparent { 0.8 } else { 1.0 };
            Some((id, DrawKind::Points, ModelUniform::new(node.transform.matrix(), tint.to_array(), opacity)))
        }
        NodeKind::LightHelper { light, size } => {
            let light_node = scene.node(*light)?;
            let point = light_node.point_light()?;
            let model = Mat4::from_scale_rotation_translation(
                Vec3::splat(*size),
                glam::Quat::IDENTITY,
                light_node.transform.position,
            );
            Some((id, DrawKind::Lines, ModelUniform::new(model, point.color.to_array(), 1.0)))
        }
        NodeKind::AmbientLight(_) | NodeKind::PointLight(_) => None,
    }
}

fn create_geometry(device: &wgpu::Device, node: &Node) -> Option<GpuGeometry> {
    match &node.kind {
        NodeKind::Mesh(mesh) => {
            let mut vertices: Vec<GpuVertex> = Vec::new();
            let mut indices: Vec<u32> = Vec::new();
            for primitive in &mesh.primitives {
                let base = vertices.len() as u32;
                vertices.extend(primitive.vertices.iter().map(GpuVertex::from));
                if primitive.indices.is_empty() {
                    indices.extend(base..base + primitive.vertices.len() as u32);
                } else {
                    indices.extend(primitive.indices.iter().map(|i| base + i));
                }
            }
            if vertices.is_empty() || indices.is_empty() {
                return None;
            }

            log::debug!(
                "Uploading mesh '{}': {} vertices, {} triangles",
                node.name,
                vertices.len(),
                indices.len() / 3
            );

            Some(GpuGeometry {
                vertex_buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Mesh Vertices"),
                    contents: bytemuck::cast_slice(&vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                }),
                index_buffer: Some(device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Mesh Indices"),
                    contents: bytemuck::cast_slice(&indices),
                    usage: wgpu::BufferUsages::INDEX,
                })),
                count: indices.len() as u32,
            })
        }
        NodeKind::Points(cloud) => {
            if cloud.positions.is_empty() {
                return None;
            }
            let vertices: Vec<GpuVertex> = cloud
                .positions
                .iter()
                .map(|p| GpuVertex::new(p.to_array(), [0.0, 1.0, 0.0], [1.0; 3]))
                .collect();
            Some(GpuGeometry {
                vertex_buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Point Vertices"),
                    contents: bytemuck::cast_slice(&vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                }),
                index_buffer: None,
                count: vertices.len() as u32,
            })
        }
        _ => None,
    }
}

/// Three unit circles in the XY, XZ and YZ planes as a line list
pub fn helper_lines(segments: u32) -> Vec<GpuVertex> {
    let point = |plane: usize, angle: f32| {
        let (s, c) = angle.sin_cos();
        match plane {
            0 => [c, s, 0.0],
            1 => [c, 0.0, s],
            _ => [0.0, c, s],
        }
    };

    let step = std::f32::consts::TAU / segments as f32;
    (0..3)
        .flat_map(|plane| {
            (0..segments).flat_map(move |i| {
                let a = point(plane, i as f32 * step);
                let b = point(plane, (i + 1) as f32 * step);
                [
                    GpuVertex::new(a, [0.0, 1.0, 0.0], [1.0; 3]),
                    GpuVertex::new(b, [0.0, 1.0, 0.0], [1.0; 3]),
                ]
            })
        })
        .collect()
}
