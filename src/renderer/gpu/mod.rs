//! wgpu implementation of [`GraphicsDevice`].
//!
//! Every draw call becomes one render pass recorded into a frame encoder
//! with load/store ops, so passes can be issued in any order the renderer
//! likes. The encoder is submitted and the surface presented by `present`.

mod context;
mod pipeline_builder;
mod uniforms;

use std::collections::HashMap;
use std::sync::Arc;

use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::asset::ResourcePool;
use crate::error::Result;
use crate::renderer::{
    DrawCall, GeometryHandle, GeometrySource, GraphicsDevice, ProgramKind, RasterState,
    TargetDesc, TargetFormat, TargetHandle, TextureHandle, Vertex,
};
use crate::settings::RenderSettings;

use context::RenderContext;
use pipeline_builder::PipelineBuilder;
use uniforms::{entry_points, slots, DrawUniforms, Slot};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

struct GpuTarget {
    view: wgpu::TextureView,
    depth: Option<wgpu::TextureView>,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
    _texture: wgpu::Texture,
    _depth_texture: Option<wgpu::Texture>,
}

struct GpuTexture {
    view: wgpu::TextureView,
    _texture: wgpu::Texture,
}

struct GpuGeometry {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct PipelineKey {
    kind: ProgramKind,
    colour_formats: Vec<wgpu::TextureFormat>,
    depth: bool,
    raster: RasterState,
}

/// Attachments for one pass, resolved from the bound handles.
struct PassTargets<'a> {
    colour: Vec<&'a wgpu::TextureView>,
    formats: Vec<wgpu::TextureFormat>,
    depth: Option<&'a wgpu::TextureView>,
    size: (u32, u32),
}

pub struct GpuDevice {
    context: RenderContext,
    shader: wgpu::ShaderModule,
    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    linear_clamp: wgpu::Sampler,
    linear_repeat: wgpu::Sampler,
    white: GpuTexture,
    far_depth: GpuTexture,
    targets: ResourcePool<GpuTarget>,
    textures: ResourcePool<GpuTexture>,
    geometry: ResourcePool<GpuGeometry>,
    bound: Vec<TargetHandle>,
    frame: Option<wgpu::SurfaceTexture>,
    frame_view: Option<wgpu::TextureView>,
    encoder: Option<wgpu::CommandEncoder>,
}

impl GpuDevice {
    pub async fn new(window: Arc<Window>, settings: &RenderSettings) -> Result<Self> {
        let context = RenderContext::new(window, settings).await?;
        let device = &context.device;

        let shader_source = format!(
            "{}\n{}\n{}\n{}\n{}",
            include_str!("../../../shader/common.wgsl"),
            include_str!("../../../shader/gbuffer.wgsl"),
            include_str!("../../../shader/lighting.wgsl"),
            include_str!("../../../shader/postprocess.wgsl"),
            include_str!("../../../shader/billboard.wgsl"),
        );
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("DeferredShader"),
            source: wgpu::ShaderSource::Wgsl(shader_source.into()),
        });

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("DrawUniformLayout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<DrawUniforms>() as u64,
                        ),
                    },
                    count: None,
                },
                sampler_entry(1),
                sampler_entry(2),
            ],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("PassTextureLayout"),
            entries: &[
                texture_entry(0, true),
                texture_entry(1, true),
                texture_entry(2, true),
                texture_entry(3, false),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("DeferredPipelineLayout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let linear_clamp = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("LinearClamp"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let linear_repeat = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("LinearRepeat"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let white = upload_texture(
            device,
            &context.queue,
            wgpu::TextureFormat::Rgba8Unorm,
            1,
            1,
            &[255, 255, 255, 255],
        );
        let far_depth = upload_texture(
            device,
            &context.queue,
            wgpu::TextureFormat::R32Float,
            1,
            1,
            bytemuck::bytes_of(&1.0f32),
        );

        Ok(Self {
            context,
            shader,
            uniform_layout,
            texture_layout,
            pipeline_layout,
            pipelines: HashMap::new(),
            linear_clamp,
            linear_repeat,
            white,
            far_depth,
            targets: ResourcePool::new(),
            textures: ResourcePool::new(),
            geometry: ResourcePool::new(),
            bound: Vec::new(),
            frame: None,
            frame_view: None,
            encoder: None,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.flush();
        self.frame_view = None;
        self.frame = None;
        self.context.resize(PhysicalSize::new(width, height));
    }

    /// Submits everything recorded this frame and shows the back buffer.
    pub fn present(&mut self) {
        self.flush();
        self.frame_view = None;
        if let Some(frame) = self.frame.take() {
            frame.present();
        }
    }

    fn flush(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.context.queue.submit(std::iter::once(encoder.finish()));
        }
    }

    fn acquire_frame(&mut self) -> bool {
        if self.frame_view.is_some() {
            return true;
        }
        match self.context.surface.get_current_texture() {
            Ok(frame) => {
                self.frame_view = Some(
                    frame
                        .texture
                        .create_view(&wgpu::TextureViewDescriptor::default()),
                );
                self.frame = Some(frame);
                true
            }
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("Surface lost or outdated, reconfiguring");
                self.context.reconfigure();
                false
            }
            Err(err) => {
                log::error!("Failed to acquire frame: {:?}", err);
                false
            }
        }
    }

    fn pipeline(&mut self, key: PipelineKey) -> &wgpu::RenderPipeline {
        let device = &self.context.device;
        let layout = &self.pipeline_layout;
        let shader = &self.shader;
        self.pipelines.entry(key).or_insert_with_key(|key| {
            log::debug!("Building pipeline for {:?}", key);
            let (vertex, fragment, vertex_buffer) = entry_points(key.kind);
            let mut builder = PipelineBuilder::new(device, layout, shader)
                .with_label("DeferredPassPipeline")
                .with_entry_points(vertex, fragment)
                .with_cull(key.raster.cull);
            if vertex_buffer {
                builder = builder.with_vertex_buffer(Vertex::layout());
            }
            for format in &key.colour_formats {
                builder = builder.with_color_target(*format, key.raster.blend);
            }
            if key.depth {
                builder = builder.with_depth(DEPTH_FORMAT, key.raster.depth);
            }
            builder.build()
        })
    }

    fn slot_view(&self, slot: Slot, index: usize) -> Option<&wgpu::TextureView> {
        let fallback = if index == 3 { &self.far_depth } else { &self.white };
        match slot {
            Slot::Empty | Slot::Texture(None) => Some(&fallback.view),
            Slot::Texture(Some(handle)) => Some(
                self.textures
                    .get(handle.cast())
                    .map_or(&fallback.view, |texture| &texture.view),
            ),
            Slot::Target(handle) => self.targets.get(handle.cast()).map(|target| &target.view),
        }
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

fn texture_entry(binding: u32, filterable: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn upload_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
    data: &[u8],
) -> GpuTexture {
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Texture"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        size,
    );
    GpuTexture {
        view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
        _texture: texture,
    }
}

fn target_format(format: TargetFormat) -> wgpu::TextureFormat {
    match format {
        TargetFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
        TargetFormat::R32Float => wgpu::TextureFormat::R32Float,
    }
}

impl GraphicsDevice for GpuDevice {
    fn backbuffer_size(&self) -> (u32, u32) {
        (self.context.config.width, self.context.config.height)
    }

    fn create_render_target(&mut self, desc: &TargetDesc) -> TargetHandle {
        let device = &self.context.device;
        let size = wgpu::Extent3d {
            width: desc.width.max(1),
            height: desc.height.max(1),
            depth_or_array_layers: 1,
        };
        let format = target_format(desc.format);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let depth_texture = desc.depth.then(|| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some("TargetDepth"),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: DEPTH_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            })
        });

        log::debug!("Creating render target '{}' {}x{}", desc.label, desc.width, desc.height);
        self.targets
            .insert(GpuTarget {
                view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
                depth: depth_texture
                    .as_ref()
                    .map(|t| t.create_view(&wgpu::TextureViewDescriptor::default())),
                format,
                width: size.width,
                height: size.height,
                _texture: texture,
                _depth_texture: depth_texture,
            })
            .cast()
    }

    fn release_render_target(&mut self, target: TargetHandle) {
        self.targets.remove(target.cast());
    }

    fn target_size(&self, target: TargetHandle) -> Option<(u32, u32)> {
        self.targets
            .get(target.cast())
            .map(|target| (target.width, target.height))
    }

    fn live_render_targets(&self) -> usize {
        self.targets.len()
    }

    fn create_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> TextureHandle {
        let texture = upload_texture(
            &self.context.device,
            &self.context.queue,
            wgpu::TextureFormat::Rgba8Unorm,
            width,
            height,
            rgba,
        );
        self.textures.insert(texture).cast()
    }

    fn release_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(texture.cast());
    }

    fn create_geometry(&mut self, vertices: &[Vertex], indices: &[u32]) -> GeometryHandle {
        let device = &self.context.device;
        let vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("GeometryVertices"),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("GeometryIndices"),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        self.geometry
            .insert(GpuGeometry { vertices, indices })
            .cast()
    }

    fn release_geometry(&mut self, geometry: GeometryHandle) {
        self.geometry.remove(geometry.cast());
    }

    fn set_render_targets(&mut self, targets: &[TargetHandle]) {
        self.bound.clear();
        self.bound.extend_from_slice(targets);
    }

    fn draw(&mut self, call: &DrawCall) {
        if self.bound.is_empty() && !self.acquire_frame() {
            return;
        }

        let kind = call.program.kind();
        let (formats, depth, size) = {
            let Some(pass) = self.pass_targets() else {
                log::debug!("Skipping {:?}: a bound target no longer exists", kind);
                return;
            };
            (pass.formats, pass.depth.is_some(), pass.size)
        };

        let rect = call.viewport.map_or([0.0, 0.0, size.0 as f32, size.1 as f32], |r| {
            [r.x as f32, r.y as f32, r.width as f32, r.height as f32]
        });
        let uniforms = DrawUniforms::new(&call.program, rect);

        // Resolve inputs before anything is recorded.
        let slot_list = slots(&call.program);
        let mut views = Vec::with_capacity(4);
        for (index, slot) in slot_list.into_iter().enumerate() {
            match self.slot_view(slot, index) {
                Some(view) => views.push(view.clone()),
                None => {
                    log::debug!("Skipping {:?}: an input target no longer exists", kind);
                    return;
                }
            }
        }

        let geometry = match call.geometry {
            GeometrySource::FullScreen => None,
            GeometrySource::Indexed {
                geometry,
                start_index,
                primitive_count,
            } => match self.geometry.get(geometry.cast()) {
                Some(buffers) => Some((
                    buffers.vertices.clone(),
                    buffers.indices.clone(),
                    start_index..start_index + primitive_count * 3,
                )),
                None => {
                    log::debug!("Skipping {:?}: geometry no longer exists", kind);
                    return;
                }
            },
        };

        let key = PipelineKey {
            kind,
            colour_formats: formats,
            depth,
            raster: call.raster,
        };
        let pipeline = self.pipeline(key).clone();

        let device = &self.context.device;
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("DrawUniforms"),
            contents: bytemuck::bytes_of(&uniforms),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let uniform_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("DrawUniformGroup"),
            layout: &self.uniform_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.linear_clamp),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.linear_repeat),
                },
            ],
        });
        let texture_entries: Vec<wgpu::BindGroupEntry> = views
            .iter()
            .enumerate()
            .map(|(binding, view)| wgpu::BindGroupEntry {
                binding: binding as u32,
                resource: wgpu::BindingResource::TextureView(view),
            })
            .collect();
        let texture_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("PassTextureGroup"),
            layout: &self.texture_layout,
            entries: &texture_entries,
        });

        let mut encoder = self.encoder.take().unwrap_or_else(|| {
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("FrameEncoder"),
                })
        });

        if let Some(pass_targets) = self.pass_targets() {
            let colour_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = pass_targets
                .colour
                .iter()
                .map(|view| {
                    Some(wgpu::RenderPassColorAttachment {
                        view,
                        resolve_target: None,
                        depth_slice: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })
                })
                .collect();

            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("DeferredPass"),
                color_attachments: &colour_attachments,
                depth_stencil_attachment: pass_targets.depth.map(|view| {
                    wgpu::RenderPassDepthStencilAttachment {
                        view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_viewport(rect[0], rect[1], rect[2], rect[3], 0.0, 1.0);
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, &uniform_group, &[]);
            pass.set_bind_group(1, &texture_group, &[]);
            match &geometry {
                None => pass.draw(0..3, 0..1),
                Some((vertices, indices, range)) => {
                    pass.set_vertex_buffer(0, vertices.slice(..));
                    pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
                    pass.draw_indexed(range.clone(), 0, 0..1);
                }
            }
        }

        self.encoder = Some(encoder);
    }
}

impl GpuDevice {
    fn pass_targets(&self) -> Option<PassTargets<'_>> {
        if self.bound.is_empty() {
            let view = self.frame_view.as_ref()?;
            return Some(PassTargets {
                colour: vec![view],
                formats: vec![self.context.config.format],
                depth: None,
                size: (self.context.config.width, self.context.config.height),
            });
        }

        let mut colour = Vec::with_capacity(self.bound.len());
        let mut formats = Vec::with_capacity(self.bound.len());
        let mut depth = None;
        let mut size = (0, 0);
        for (index, handle) in self.bound.iter().enumerate() {
            let target = self.targets.get(handle.cast())?;
            if index == 0 {
                depth = target.depth.as_ref();
                size = (target.width, target.height);
            }
            colour.push(&target.view);
            formats.push(target.format);
        }
        Some(PassTargets {
            colour,
            formats,
            depth,
            size,
        })
    }
}
