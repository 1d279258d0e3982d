use std::collections::HashMap;

use web_sys::HtmlCanvasElement;
use wgpu::VertexFormat::{Float32x2, Float32x4};
use wgpu::util::DeviceExt;

use crate::gpu_error::{GpuFault, GpuFaultSlot};
use crate::renderer::{FrameMetrics, FrameUniforms, LayerData, LayerKind, LayerList};
use crate::shader::{FillVertex, HexBorderVertex, HexCapitalRingVertex, OverlayVertex, PrototypeHexVertex};

pub struct FrameInput<'a> {
    pub layers: &'a LayerList,
    pub view_proj: [[f32; 4]; 4],
    pub world_size: f32,
    pub uniforms: &'a FrameUniforms,
    pub clear_color: [f64; 3],
}

// --- GPU data types ---

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct CameraUniform {
    view_proj: [[f32; 4]; 4],
    world_size: f32,
    _pad: [f32; 3],
}

const fn attr(offset: u64, shader_location: u32, format: wgpu::VertexFormat) -> wgpu::VertexAttribute {
    wgpu::VertexAttribute {
        offset,
        shader_location,
        format,
    }
}

const FILL_ATTRIBUTES: [wgpu::VertexAttribute; 2] = [
    attr(0, 0, Float32x2), // position
    attr(8, 1, Float32x4), // color
];

const BORDER_ATTRIBUTES: [wgpu::VertexAttribute; 9] = [
    attr(0, 0, Float32x2),   // position
    attr(8, 1, Float32x2),   // local
    attr(16, 2, Float32x4),  // verts_a
    attr(32, 3, Float32x4),  // verts_b
    attr(48, 4, Float32x4),  // verts_c
    attr(64, 5, Float32x4),  // color
    attr(80, 6, Float32x4),  // params
    attr(96, 7, Float32x4),  // mask_a
    attr(112, 8, Float32x2), // mask_b
];

const RING_ATTRIBUTES: [wgpu::VertexAttribute; 4] = [
    attr(0, 0, Float32x2),  // position
    attr(8, 1, Float32x2),  // local
    attr(16, 2, Float32x4), // color
    attr(32, 3, Float32x4), // ring
];

const PROTOTYPE_ATTRIBUTES: [wgpu::VertexAttribute; 4] = [
    attr(0, 0, Float32x2),  // position
    attr(8, 1, Float32x2),  // local
    attr(16, 2, Float32x4), // color
    attr(32, 3, Float32x4), // pattern
];

const OVERLAY_ATTRIBUTES: [wgpu::VertexAttribute; 4] = [
    attr(0, 0, Float32x2),  // position
    attr(8, 1, Float32x2),  // uv
    attr(16, 2, Float32x4), // color
    attr(32, 3, Float32x4), // shape
];

fn vertex_layout<V>(attributes: &'static [wgpu::VertexAttribute]) -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<V>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes,
    }
}

fn uniform_layout(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

/// A uniform buffer and the bind group exposing it.
struct UniformSlot {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl UniformSlot {
    fn new<T: bytemuck::Pod>(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, label: &str, initial: T) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(&[initial]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });
        Self { buffer, bind_group }
    }

    fn write<T: bytemuck::Pod>(&self, queue: &wgpu::Queue, value: T) {
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[value]));
    }
}

struct PipelineSpec<'a> {
    label: &'a str,
    source: &'a str,
    bind_group_layouts: &'a [&'a wgpu::BindGroupLayout],
    vertex: wgpu::VertexBufferLayout<'static>,
    topology: wgpu::PrimitiveTopology,
}

fn create_pipeline(device: &wgpu::Device, format: wgpu::TextureFormat, spec: PipelineSpec<'_>) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(spec.label),
        source: wgpu::ShaderSource::Wgsl(spec.source.into()),
    });
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(spec.label),
        bind_group_layouts: spec.bind_group_layouts,
        push_constant_ranges: &[],
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(spec.label),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[spec.vertex],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: spec.topology,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

// --- Layer meshes ---

/// Vertex buffer for one layer, tagged with the generation it was built from.
struct LayerMesh {
    buffer: Option<wgpu::Buffer>,
    vertex_count: u32,
    generation: u64,
}

impl LayerMesh {
    fn create(device: &wgpu::Device, data: &LayerData, generation: u64) -> Self {
        let bytes = data.bytes();
        let buffer = (!bytes.is_empty()).then(|| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("layer-verts"),
                contents: bytes,
                usage: wgpu::BufferUsages::VERTEX,
            })
        });
        Self {
            buffer,
            vertex_count: data.vertex_count() as u32,
            generation,
        }
    }

    fn destroy(self) {
        if let Some(buffer) = self.buffer {
            buffer.destroy();
        }
    }
}

#[derive(Clone, Copy)]
enum PipelineKind {
    Basemap,
    Fill,
    Border,
    CapitalRing,
    Prototype,
    Overlay,
}

impl PipelineKind {
    fn of(data: &LayerData) -> Self {
        match data {
            LayerData::Lines(_) => PipelineKind::Basemap,
            LayerData::Fill(_) => PipelineKind::Fill,
            LayerData::Border(_) => PipelineKind::Border,
            LayerData::CapitalRing(_) => PipelineKind::CapitalRing,
            LayerData::Prototype(_) => PipelineKind::Prototype,
            LayerData::Overlay(_) => PipelineKind::Overlay,
        }
    }
}

// --- GpuRenderer ---

pub struct GpuRenderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,

    // Camera uniform (group 0 for every pipeline)
    camera: UniformSlot,

    // Per-layer style uniforms (group 1)
    territory_border_style: UniformSlot,
    zone_border_style: UniformSlot,
    selection_border_style: UniformSlot,
    capital_ring_style: UniformSlot,
    prototype_style: UniformSlot,

    basemap_pipeline: wgpu::RenderPipeline,
    fill_pipeline: wgpu::RenderPipeline,
    border_pipeline: wgpu::RenderPipeline,
    capital_ring_pipeline: wgpu::RenderPipeline,
    prototype_pipeline: wgpu::RenderPipeline,
    overlay_pipeline: wgpu::RenderPipeline,

    meshes: HashMap<LayerKind, LayerMesh>,
    faults: GpuFaultSlot,
}

impl GpuRenderer {
    /// Async initialization with a WebGL2-only path.
    pub async fn init(canvas: HtmlCanvasElement) -> Result<Self, String> {
        web_sys::console::log_1(&"wgpu init: using WebGL2 backend".into());
        Self::init_with_backends(canvas, wgpu::Backends::GL, "webgl").await
    }

    async fn init_with_backends(
        canvas: HtmlCanvasElement,
        backends: wgpu::Backends,
        backend_path: &str,
    ) -> Result<Self, String> {
        let width = canvas.width().max(1);
        let height = canvas.height().max(1);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });

        let surface = instance
            .create_surface(wgpu::SurfaceTarget::Canvas(canvas))
            .map_err(|e| format!("wgpu init ({backend_path}) create_surface: {e}"))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                ..Default::default()
            })
            .await
            .ok_or_else(|| format!("wgpu init ({backend_path}): no suitable GPU adapter found"))?;

        // WebGL2 adapters expose zero compute limits; the plain defaults fail validation.
        let required_limits = if backends == wgpu::Backends::GL {
            wgpu::Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits())
        } else {
            wgpu::Limits::default()
        };

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("frontline-device"),
                    required_features: wgpu::Features::empty(),
                    required_limits,
                    ..Default::default()
                },
                None,
            )
            .await
            .map_err(|e| format!("wgpu init ({backend_path}) request_device: {e}"))?;

        let faults = GpuFaultSlot::default();
        device.on_uncaptured_error(Box::new({
            let faults = faults.clone();
            move |e: wgpu::Error| {
                let message = e.to_string();
                if faults.report(&message) {
                    web_sys::console::error_1(&format!("wgpu uncaptured error: {message}").into());
                }
            }
        }));

        let mut surface_config = surface
            .get_default_config(&adapter, width, height)
            .ok_or_else(|| format!("wgpu init ({backend_path}): surface unsupported by adapter"))?;
        let caps = surface.get_capabilities(&adapter);

        // Vertex colors are already display-referred.
        if let Some(format) = caps.formats.iter().copied().find(|f| !f.is_srgb()) {
            surface_config.format = format;
        }
        if caps.alpha_modes.contains(&wgpu::CompositeAlphaMode::Opaque) {
            surface_config.alpha_mode = wgpu::CompositeAlphaMode::Opaque;
        } else if caps.alpha_modes.contains(&wgpu::CompositeAlphaMode::PreMultiplied) {
            surface_config.alpha_mode = wgpu::CompositeAlphaMode::PreMultiplied;
        }
        let format = surface_config.format;

        web_sys::console::log_1(
            &format!(
                "wgpu init: path={backend_path} format={:?} present={:?} alpha={:?}",
                surface_config.format, surface_config.present_mode, surface_config.alpha_mode,
            )
            .into(),
        );
        surface.configure(&device, &surface_config);

        let camera_layout = uniform_layout(&device, "camera-bgl");
        let style_layout = uniform_layout(&device, "style-bgl");

        let camera = UniformSlot::new(
            &device,
            &camera_layout,
            "camera-ubo",
            CameraUniform {
                view_proj: glam::Mat4::IDENTITY.to_cols_array_2d(),
                world_size: 512.0,
                _pad: [0.0; 3],
            },
        );
        let defaults = FrameUniforms::default();
        let territory_border_style =
            UniformSlot::new(&device, &style_layout, "territory-border-ubo", defaults.territory_border);
        let zone_border_style = UniformSlot::new(&device, &style_layout, "zone-border-ubo", defaults.zone_border);
        let selection_border_style =
            UniformSlot::new(&device, &style_layout, "selection-border-ubo", defaults.selection_border);
        let capital_ring_style = UniformSlot::new(&device, &style_layout, "capital-ring-ubo", defaults.capital_ring);
        let prototype_style = UniformSlot::new(&device, &style_layout, "prototype-hex-ubo", defaults.prototype);

        let camera_only = [&camera_layout];
        let with_style = [&camera_layout, &style_layout];

        let basemap_pipeline = create_pipeline(
            &device,
            format,
            PipelineSpec {
                label: "basemap-pipeline",
                source: include_str!("fill.wgsl"),
                bind_group_layouts: &camera_only,
                vertex: vertex_layout::<FillVertex>(&FILL_ATTRIBUTES),
                topology: wgpu::PrimitiveTopology::LineList,
            },
        );
        let fill_pipeline = create_pipeline(
            &device,
            format,
            PipelineSpec {
                label: "fill-pipeline",
                source: include_str!("fill.wgsl"),
                bind_group_layouts: &camera_only,
                vertex: vertex_layout::<FillVertex>(&FILL_ATTRIBUTES),
                topology: wgpu::PrimitiveTopology::TriangleList,
            },
        );
        let border_pipeline = create_pipeline(
            &device,
            format,
            PipelineSpec {
                label: "hex-border-pipeline",
                source: include_str!("hex_border.wgsl"),
                bind_group_layouts: &with_style,
                vertex: vertex_layout::<HexBorderVertex>(&BORDER_ATTRIBUTES),
                topology: wgpu::PrimitiveTopology::TriangleList,
            },
        );
        let capital_ring_pipeline = create_pipeline(
            &device,
            format,
            PipelineSpec {
                label: "capital-ring-pipeline",
                source: include_str!("capital_ring.wgsl"),
                bind_group_layouts: &with_style,
                vertex: vertex_layout::<HexCapitalRingVertex>(&RING_ATTRIBUTES),
                topology: wgpu::PrimitiveTopology::TriangleList,
            },
        );
        let prototype_pipeline = create_pipeline(
            &device,
            format,
            PipelineSpec {
                label: "prototype-hex-pipeline",
                source: include_str!("prototype_hex.wgsl"),
                bind_group_layouts: &with_style,
                vertex: vertex_layout::<PrototypeHexVertex>(&PROTOTYPE_ATTRIBUTES),
                topology: wgpu::PrimitiveTopology::TriangleList,
            },
        );
        let overlay_pipeline = create_pipeline(
            &device,
            format,
            PipelineSpec {
                label: "overlay-pipeline",
                source: include_str!("overlay.wgsl"),
                bind_group_layouts: &camera_only,
                vertex: vertex_layout::<OverlayVertex>(&OVERLAY_ATTRIBUTES),
                topology: wgpu::PrimitiveTopology::TriangleList,
            },
        );

        Ok(Self {
            device,
            queue,
            surface,
            surface_config,
            camera,
            territory_border_style,
            zone_border_style,
            selection_border_style,
            capital_ring_style,
            prototype_style,
            basemap_pipeline,
            fill_pipeline,
            border_pipeline,
            capital_ring_pipeline,
            prototype_pipeline,
            overlay_pipeline,
            meshes: HashMap::new(),
            faults,
        })
    }

    /// Uncaptured error reported since the last call, if any.
    pub fn take_fault(&self) -> Option<GpuFault> {
        self.faults.take()
    }

    /// Resize the surface when the canvas size changes.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        if self.surface_config.width == width && self.surface_config.height == height {
            return;
        }
        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface.configure(&self.device, &self.surface_config);
    }

    /// Rebuild meshes whose layer generation changed; drop meshes for layers
    /// no longer present.
    fn sync_layers(&mut self, list: &LayerList, metrics: &mut FrameMetrics) {
        let stale: Vec<LayerKind> = self
            .meshes
            .keys()
            .copied()
            .filter(|kind| list.get(*kind).is_none())
            .collect();
        for kind in stale {
            if let Some(mesh) = self.meshes.remove(&kind) {
                mesh.destroy();
            }
        }
        for layer in &list.layers {
            if self
                .meshes
                .get(&layer.kind)
                .is_some_and(|mesh| mesh.generation == layer.generation)
            {
                continue;
            }
            let mesh = LayerMesh::create(&self.device, &layer.data, layer.generation);
            metrics.layers_rebuilt += 1;
            metrics.vertices_uploaded += u64::from(mesh.vertex_count);
            metrics.bytes_uploaded += layer.data.bytes().len() as u64;
            if let Some(old) = self.meshes.insert(layer.kind, mesh) {
                old.destroy();
            }
        }
    }

    fn pipeline(&self, kind: PipelineKind) -> &wgpu::RenderPipeline {
        match kind {
            PipelineKind::Basemap => &self.basemap_pipeline,
            PipelineKind::Fill => &self.fill_pipeline,
            PipelineKind::Border => &self.border_pipeline,
            PipelineKind::CapitalRing => &self.capital_ring_pipeline,
            PipelineKind::Prototype => &self.prototype_pipeline,
            PipelineKind::Overlay => &self.overlay_pipeline,
        }
    }

    fn style_bind_group(&self, kind: LayerKind) -> Option<&wgpu::BindGroup> {
        let slot = match kind {
            LayerKind::TerritoryBorders => &self.territory_border_style,
            LayerKind::ZoneBorders => &self.zone_border_style,
            LayerKind::SelectionBorder => &self.selection_border_style,
            LayerKind::CapitalRings => &self.capital_ring_style,
            LayerKind::PrototypeStyle => &self.prototype_style,
            LayerKind::Basemap | LayerKind::TileFill | LayerKind::ResourceOverlay | LayerKind::Battles => {
                return None;
            }
        };
        Some(&slot.bind_group)
    }

    /// Upload changed layers, write uniforms and draw every non-empty layer in
    /// order. `None` when the surface was unavailable and the frame skipped.
    pub fn render(&mut self, frame: FrameInput<'_>) -> Option<FrameMetrics> {
        let FrameInput {
            layers,
            view_proj,
            world_size,
            uniforms,
            clear_color,
        } = frame;
        let mut metrics = FrameMetrics::default();
        self.sync_layers(layers, &mut metrics);

        // All uniform writes happen before the pass; mid-pass writes stall WebGL2.
        self.camera.write(
            &self.queue,
            CameraUniform {
                view_proj,
                world_size,
                _pad: [0.0; 3],
            },
        );
        self.territory_border_style.write(&self.queue, uniforms.territory_border);
        self.zone_border_style.write(&self.queue, uniforms.zone_border);
        self.selection_border_style.write(&self.queue, uniforms.selection_border);
        self.capital_ring_style.write(&self.queue, uniforms.capital_ring);
        self.prototype_style.write(&self.queue, uniforms.prototype);

        let output = match self.surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                web_sys::console::warn_1(&"wgpu: surface lost, reconfiguring".into());
                self.surface.configure(&self.device, &self.surface_config);
                return None;
            }
            Err(e) => {
                web_sys::console::warn_1(&format!("wgpu: frame skipped: {e}").into());
                return None;
            }
        };

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("render-encoder"),
            });

        {
            let [r, g, b] = clear_color;
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("main-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a: 1.0 }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                ..Default::default()
            });

            for layer in &layers.layers {
                let Some(mesh) = self.meshes.get(&layer.kind) else {
                    continue;
                };
                let Some(buffer) = mesh.buffer.as_ref() else {
                    continue;
                };
                pass.set_pipeline(self.pipeline(PipelineKind::of(&layer.data)));
                pass.set_bind_group(0, &self.camera.bind_group, &[]);
                if let Some(style) = self.style_bind_group(layer.kind) {
                    pass.set_bind_group(1, style, &[]);
                }
                pass.set_vertex_buffer(0, buffer.slice(..));
                pass.draw(0..mesh.vertex_count, 0..1);
                metrics.draw_calls += 1;
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Some(metrics)
    }
}

impl Drop for GpuRenderer {
    fn drop(&mut self) {
        for (_, mesh) in self.meshes.drain() {
            mesh.destroy();
        }
    }
}
