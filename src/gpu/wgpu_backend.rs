// ============================================================================
// WGPU BACKEND: GpuContext on a headless wgpu device
// ============================================================================
//
// Every image is an Rgba8Unorm texture that is both sampleable and
// renderable.  Each draw records one render pass with `LoadOp::Load` on the
// bound target, clipped by the scissor, and submits immediately; the engine
// issues few, large draws per frame so batching buys little.
//
// Pipelines are built lazily per (draw kind, blend factors) and cached.
// ============================================================================

use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use super::context::DeviceContext;
use super::{
    BlendFactor, BlendFactors, FramebufferHandle, GpuContext, ImageHandle, RenderTarget,
    encode_pixel,
};
use crate::color::LinearRgb;
use crate::error::{EngineError, EngineResult};
use crate::geometry::{Rect, Size};
use crate::stroke::Stamp;

const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct DrawUniforms {
    color: [f32; 4],
    canvas_size: [f32; 2],
    opacity: f32,
    hardness: f32,
}

impl DrawUniforms {
    fn new(size: Size) -> Self {
        Self {
            color: [0.0; 4],
            canvas_size: [size.width as f32, size.height as f32],
            opacity: 1.0,
            hardness: 1.0,
        }
    }
}

/// Per-instance data for `vs_stamp`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct StampInstance {
    center: [f32; 2],
    radius: f32,
    rotation: f32,
    color: [f32; 4],
}

const STAMP_ATTRIBUTES: [wgpu::VertexAttribute; 4] =
    wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32, 2 => Float32, 3 => Float32x4];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum DrawKind {
    Quad,
    Fill,
    Stamp,
}

struct GpuImage {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    bind_group: wgpu::BindGroup,
    size: Size,
}

pub struct WgpuGpu {
    ctx: DeviceContext,
    screen: GpuImage,
    images: HashMap<ImageHandle, GpuImage>,
    framebuffers: HashMap<FramebufferHandle, ImageHandle>,
    units: Vec<Option<ImageHandle>>,
    target: RenderTarget,
    blend: BlendFactors,
    scissor: Option<Rect>,
    next_handle: u32,

    shader: wgpu::ShaderModule,
    uniform_bgl: wgpu::BindGroupLayout,
    texture_bgl: wgpu::BindGroupLayout,
    quad_layout: wgpu::PipelineLayout,
    plain_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    pipelines: HashMap<(DrawKind, BlendFactors), wgpu::RenderPipeline>,
}

impl WgpuGpu {
    /// Open a device and allocate the screen target.
    pub fn try_new(screen: Size, preferred_gpu: &str) -> EngineResult<Self> {
        let ctx = DeviceContext::new(preferred_gpu)
            .ok_or_else(|| EngineError::Gpu("no usable wgpu adapter".to_string()))?;
        if !ctx.supports_size(screen.width, screen.height) {
            return Err(EngineError::Gpu(format!(
                "canvas {}x{} exceeds device limit {}",
                screen.width, screen.height, ctx.max_texture_dim
            )));
        }
        let device = &ctx.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("engine_shader"),
            source: wgpu::ShaderSource::Wgsl(super::shaders::ENGINE_SHADER.into()),
        });

        let uniform_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("draw_uniform_bgl"),
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
        });

        let texture_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("texture_unit_bgl"),
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
        });

        let quad_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("quad_pipeline_layout"),
            bind_group_layouts: &[&uniform_bgl, &texture_bgl],
            push_constant_ranges: &[],
        });
        let plain_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("plain_pipeline_layout"),
            bind_group_layouts: &[&uniform_bgl],
            push_constant_ranges: &[],
        });

        // 1:1 texel mapping, so nearest sampling is exact
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("texture_unit_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let screen_image = create_image(device, &texture_bgl, &sampler, screen, "screen");
        let units = ctx.texture_units.max(1) as usize;
        crate::log_info!(
            "gpu: wgpu backend ready on '{}' ({} texture units)",
            ctx.adapter_name,
            units
        );

        Ok(Self {
            screen: screen_image,
            images: HashMap::new(),
            framebuffers: HashMap::new(),
            units: vec![None; units],
            target: RenderTarget::Screen,
            blend: BlendFactors::NORMAL,
            scissor: None,
            next_handle: 1,
            shader,
            uniform_bgl,
            texture_bgl,
            quad_layout,
            plain_layout,
            sampler,
            pipelines: HashMap::new(),
            ctx,
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.ctx.adapter_name
    }

    fn alloc_handle(&mut self) -> u32 {
        let h = self.next_handle;
        self.next_handle += 1;
        h
    }

    fn image_handle(&self, target: RenderTarget) -> Option<ImageHandle> {
        match target {
            RenderTarget::Screen => None,
            RenderTarget::Framebuffer(fb) => self.framebuffers.get(&fb).copied(),
        }
    }

    fn image_for(&self, target: RenderTarget) -> Option<&GpuImage> {
        match target {
            RenderTarget::Screen => Some(&self.screen),
            RenderTarget::Framebuffer(_) => self.images.get(&self.image_handle(target)?),
        }
    }

    fn ensure_pipeline(&mut self, kind: DrawKind, blend: BlendFactors) {
        if self.pipelines.contains_key(&(kind, blend)) {
            return;
        }
        let layout = match kind {
            DrawKind::Quad => &self.quad_layout,
            DrawKind::Fill | DrawKind::Stamp => &self.plain_layout,
        };
        let pipeline = build_pipeline(&self.ctx.device, &self.shader, layout, kind, blend);
        self.pipelines.insert((kind, blend), pipeline);
    }

    /// Record and submit one render pass on the bound target.
    fn run_pass(
        &self,
        kind: DrawKind,
        blend: BlendFactors,
        uniforms: DrawUniforms,
        clip: Rect,
        source: Option<ImageHandle>,
        instances: Option<(&wgpu::Buffer, u32)>,
    ) {
        let Some(target) = self.image_for(self.target) else {
            crate::log_err!("gpu: draw into deleted framebuffer {:?}", self.target);
            return;
        };
        let clip = match self.scissor {
            Some(s) => clip.intersect(&s),
            None => clip,
        };
        let (x, y, w, h) = clip.to_pixels(target.size);
        if w == 0 || h == 0 {
            return;
        }
        let Some(pipeline) = self.pipelines.get(&(kind, blend)) else {
            return;
        };
        let source_bg = match source {
            Some(handle) if Some(handle) == self.image_handle(self.target) => {
                crate::log_warn!("gpu: texture {:?} sampled while bound as target", handle);
                return;
            }
            Some(handle) => match self.images.get(&handle) {
                Some(image) => Some(&image.bind_group),
                None => {
                    crate::log_warn!("gpu: texture unit holds deleted image {:?}", handle);
                    return;
                }
            },
            None => None,
        };

        let device = &self.ctx.device;
        let uniform_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("draw_uniform_buf"),
            contents: bytemuck::bytes_of(&uniforms),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let uniform_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("draw_uniform_bg"),
            layout: &self.uniform_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buf.as_entire_binding(),
            }],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("engine_draw_encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("engine_draw_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_scissor_rect(x, y, w, h);
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &uniform_bg, &[]);
            if let Some(bg) = source_bg {
                pass.set_bind_group(1, bg, &[]);
            }
            match instances {
                Some((buffer, count)) => {
                    pass.set_vertex_buffer(0, buffer.slice(..));
                    pass.draw(0..6, 0..count);
                }
                None => pass.draw(0..6, 0..1),
            }
        }
        self.ctx.submit_one(encoder);
    }

    fn clear_whole_target(&self) {
        let Some(target) = self.image_for(self.target) else { return };
        let mut encoder = self.ctx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("engine_clear_encoder"),
        });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("engine_clear_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        self.ctx.submit_one(encoder);
    }

    fn target_size(&self) -> Size {
        self.image_for(self.target).map(|t| t.size).unwrap_or(self.screen.size)
    }
}

fn create_image(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    size: Size,
    label: &str,
) -> GpuImage {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: size.width.max(1),
            height: size.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TEXTURE_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("texture_unit_bg"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    });
    GpuImage {
        texture,
        view,
        bind_group,
        size,
    }
}

fn wgpu_factor(factor: BlendFactor) -> wgpu::BlendFactor {
    match factor {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
    }
}

fn build_pipeline(
    device: &wgpu::Device,
    shader: &wgpu::ShaderModule,
    layout: &wgpu::PipelineLayout,
    kind: DrawKind,
    blend: BlendFactors,
) -> wgpu::RenderPipeline {
    let (vs, fs) = match kind {
        DrawKind::Quad => ("vs_quad", "fs_quad"),
        DrawKind::Fill => ("vs_quad", "fs_fill"),
        DrawKind::Stamp => ("vs_stamp", "fs_stamp"),
    };
    let stamp_buffers = [wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<StampInstance>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &STAMP_ATTRIBUTES,
    }];
    let buffers: &[wgpu::VertexBufferLayout] = match kind {
        DrawKind::Stamp => &stamp_buffers,
        DrawKind::Quad | DrawKind::Fill => &[],
    };
    let component = wgpu::BlendComponent {
        src_factor: wgpu_factor(blend.src),
        dst_factor: wgpu_factor(blend.dst),
        operation: wgpu::BlendOperation::Add,
    };

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("engine_pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: vs,
            buffers,
            compilation_options: Default::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: fs,
            targets: &[Some(wgpu::ColorTargetState {
                format: TEXTURE_FORMAT,
                blend: Some(wgpu::BlendState {
                    color: component,
                    alpha: component,
                }),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        multiview: None,
    })
}

fn aligned_bytes_per_row(width: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    (width * 4).div_ceil(align) * align
}

impl GpuContext for WgpuGpu {
    fn max_texture_units(&self) -> usize {
        self.units.len()
    }

    fn screen_size(&self) -> Size {
        self.screen.size
    }

    fn create_texture(&mut self, size: Size) -> ImageHandle {
        let handle = ImageHandle(self.alloc_handle());
        let image = create_image(&self.ctx.device, &self.texture_bgl, &self.sampler, size, "engine_texture");
        self.images.insert(handle, image);
        handle
    }

    fn delete_texture(&mut self, image: ImageHandle) {
        if let Some(gpu_image) = self.images.remove(&image) {
            gpu_image.texture.destroy();
        }
        for unit in self.units.iter_mut().filter(|u| **u == Some(image)) {
            *unit = None;
        }
    }

    fn create_framebuffer(&mut self, image: ImageHandle) -> FramebufferHandle {
        let handle = FramebufferHandle(self.alloc_handle());
        self.framebuffers.insert(handle, image);
        handle
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        self.framebuffers.remove(&framebuffer);
        if self.target == RenderTarget::Framebuffer(framebuffer) {
            self.target = RenderTarget::Screen;
        }
    }

    fn bind_framebuffer(&mut self, target: RenderTarget) {
        self.target = target;
    }

    fn bind_texture(&mut self, unit: usize, image: ImageHandle) {
        match self.units.get_mut(unit) {
            Some(slot) => *slot = Some(image),
            None => {
                crate::log_err!("gpu: texture unit {} out of range", unit);
            }
        }
    }

    fn set_blend(&mut self, blend: BlendFactors) {
        self.blend = blend;
    }

    fn set_scissor(&mut self, rect: Option<Rect>) {
        self.scissor = rect;
    }

    fn clear(&mut self) {
        if self.scissor.is_none() {
            self.clear_whole_target();
            return;
        }
        self.ensure_pipeline(DrawKind::Fill, BlendFactors::REPLACE);
        let size = self.target_size();
        self.run_pass(
            DrawKind::Fill,
            BlendFactors::REPLACE,
            DrawUniforms::new(size),
            size.rect(),
            None,
            None,
        );
    }

    fn draw_texture(&mut self, unit: usize, opacity: f32) {
        let Some(source) = self.units.get(unit).copied().flatten() else {
            crate::log_warn!("gpu: draw from empty texture unit {}", unit);
            return;
        };
        let blend = self.blend;
        self.ensure_pipeline(DrawKind::Quad, blend);
        let size = self.target_size();
        let uniforms = DrawUniforms {
            opacity,
            ..DrawUniforms::new(size)
        };
        self.run_pass(DrawKind::Quad, blend, uniforms, size.rect(), Some(source), None);
    }

    fn draw_stamps(&mut self, stamps: &[Stamp], hardness: f32) {
        if stamps.is_empty() {
            return;
        }
        let blend = self.blend;
        self.ensure_pipeline(DrawKind::Stamp, blend);

        let instances: Vec<StampInstance> = stamps
            .iter()
            .map(|s| StampInstance {
                center: [s.position.x, s.position.y],
                radius: s.scaled_diameter * 0.5,
                rotation: s.rotation,
                color: s.color.premultiplied(s.alpha),
            })
            .collect();
        let buffer = self.ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("stamp_instances"),
            contents: bytemuck::cast_slice(&instances),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let size = self.target_size();
        let uniforms = DrawUniforms {
            hardness: hardness.clamp(0.0, 1.0),
            ..DrawUniforms::new(size)
        };
        let clip = stamps
            .iter()
            .map(Stamp::bounds)
            .reduce(|a, b| a.union(&b))
            .unwrap_or_default();
        self.run_pass(
            DrawKind::Stamp,
            blend,
            uniforms,
            clip,
            None,
            Some((&buffer, instances.len() as u32)),
        );
    }

    fn fill_rect(&mut self, rect: Rect, color: LinearRgb, alpha: f32) {
        let blend = self.blend;
        self.ensure_pipeline(DrawKind::Fill, blend);
        let uniforms = DrawUniforms {
            color: color.premultiplied(alpha),
            ..DrawUniforms::new(self.target_size())
        };
        self.run_pass(DrawKind::Fill, blend, uniforms, rect, None, None);
    }

    fn read_pixels(&mut self, target: RenderTarget) -> Option<image::RgbaImage> {
        let image = self.image_for(target)?;
        let Size { width, height } = image.size;
        let device = &self.ctx.device;

        let bytes_per_row = aligned_bytes_per_row(width);
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback_staging"),
            size: (bytes_per_row * height) as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("readback_encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &image.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &staging,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.ctx.submit_one(encoder);

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device.poll(wgpu::Maintain::Wait);
        match rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                crate::log_err!("gpu: readback map error: {:?}", e);
                return None;
            }
            Err(e) => {
                crate::log_err!("gpu: readback channel error: {:?}", e);
                return None;
            }
        }

        let mapped = slice.get_mapped_range();
        let mut out = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            let start = (y * bytes_per_row) as usize;
            let row = &mapped[start..start + (width * 4) as usize];
            for px in row.chunks_exact(4) {
                let premul = [
                    px[0] as f32 / 255.0,
                    px[1] as f32 / 255.0,
                    px[2] as f32 / 255.0,
                    px[3] as f32 / 255.0,
                ];
                out.extend_from_slice(&encode_pixel(premul));
            }
        }
        drop(mapped);
        staging.unmap();

        image::RgbaImage::from_raw(width, height, out)
    }
}
