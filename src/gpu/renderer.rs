//! wgpu implementation of [`RenderBackend`].
//!
//! Renders into two off-screen colour surfaces plus an output texture that
//! stands in for the display. Every call encodes and submits its own command
//! buffer, so each pass sees the uniforms uploaded for it.

use wgpu::util::DeviceExt;

use crate::backend::{BackendError, PassTarget, PostProcessPass, RenderBackend, SceneFrame};
use crate::gpu::mesh::{self, MarkerInstance};
use crate::gpu::pipeline::{self, DEPTH_FORMAT};
use crate::gpu::post_processor::PostProcessor;
use crate::lighting::PerFrameConstants;

/// Colour format of every surface.
pub const SURFACE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Handle to one of the two off-screen surfaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceIndex(pub usize);

struct RenderSurface {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl RenderSurface {
    fn new(device: &wgpu::Device, label: &str, size: wgpu::Extent3d, format: wgpu::TextureFormat) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

/// Static scene geometry and the pipelines that draw it.
struct ScenePass {
    pipeline: wgpu::RenderPipeline,
    marker_pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    marker_vertex_buffer: wgpu::Buffer,
    marker_index_buffer: wgpu::Buffer,
    marker_index_count: u32,
    marker_instance_buffer: wgpu::Buffer,
}

impl ScenePass {
    fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Constants Buffer"),
            size: std::mem::size_of::<PerFrameConstants>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame Constants Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<PerFrameConstants>() as u64),
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame Constants Bind Group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let shader = device.create_shader_module(wgpu::include_wgsl!("shader_scene.wgsl"));
        let scene_pipeline = pipeline::create_scene_pipeline(device, &layout, &shader, format);
        let marker_pipeline = pipeline::create_marker_pipeline(device, &layout, &shader, format);

        let scene = mesh::create_scene_geometry();
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Scene Vertex Buffer"),
            contents: bytemuck::cast_slice(&scene.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Scene Index Buffer"),
            contents: bytemuck::cast_slice(&scene.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let marker = mesh::create_marker_geometry();
        let marker_vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Marker Vertex Buffer"),
            contents: bytemuck::cast_slice(&marker.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let marker_index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Marker Index Buffer"),
            contents: bytemuck::cast_slice(&marker.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        let marker_instance_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Marker Instance Buffer"),
            size: (std::mem::size_of::<MarkerInstance>() * 2) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            pipeline: scene_pipeline,
            marker_pipeline,
            uniform_buffer,
            bind_group,
            vertex_buffer,
            index_buffer,
            index_count: scene.indices.len() as u32,
            marker_vertex_buffer,
            marker_index_buffer,
            marker_index_count: marker.indices.len() as u32,
            marker_instance_buffer,
        }
    }
}

/// Headless wgpu renderer.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    width: u32,
    height: u32,
    surfaces: [RenderSurface; 2],
    depth_view: wgpu::TextureView,
    /// Stands in for the swap chain back buffer.
    output: RenderSurface,
    scene: ScenePass,
    post_processor: PostProcessor,
    presented_frames: u64,
}

impl WgpuBackend {
    /// Request an adapter without a window and build every GPU resource.
    pub async fn new_headless(width: u32, height: u32) -> Result<Self, BackendError> {
        if width == 0 || height == 0 {
            return Err(BackendError::InvalidViewport { width, height });
        }

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None, // Headless
                force_fallback_adapter: false,
            })
            .await
            .ok_or(BackendError::AdapterUnavailable)?;
        log::info!("Using adapter: {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor::default(), None)
            .await?;

        Ok(Self::new(device, queue, width, height))
    }

    pub fn new(device: wgpu::Device, queue: wgpu::Queue, width: u32, height: u32) -> Self {
        let size = wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        };

        let surfaces = [
            RenderSurface::new(&device, "Surface A", size, SURFACE_FORMAT),
            RenderSurface::new(&device, "Surface B", size, SURFACE_FORMAT),
        ];
        let output = RenderSurface::new(&device, "Output Surface", size, SURFACE_FORMAT);

        let depth_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Depth Texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let depth_view = depth_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let scene = ScenePass::new(&device, SURFACE_FORMAT);
        let post_processor = PostProcessor::new(&device, &queue, SURFACE_FORMAT);

        Self {
            device,
            queue,
            width: size.width,
            height: size.height,
            surfaces,
            depth_view,
            output,
            scene,
            post_processor,
            presented_frames: 0,
        }
    }

    pub fn presented_frames(&self) -> u64 {
        self.presented_frames
    }

    fn surface(&self, index: SurfaceIndex) -> Result<&RenderSurface, BackendError> {
        self.surfaces
            .get(index.0)
            .ok_or_else(|| BackendError::UnknownSurface(format!("{:?}", index)))
    }

    /// Copy the presentation surface back to the CPU.
    pub fn read_output(&self) -> Result<image::RgbaImage, BackendError> {
        let unpadded_bytes_per_row = 4 * self.width;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Buffer"),
            size: (padded_bytes_per_row * self.height) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Readback Encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &self.output.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));

        let slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| BackendError::Readback(e.to_string()))?
            .map_err(|e| BackendError::Readback(e.to_string()))?;

        let mut pixels = Vec::with_capacity((unpadded_bytes_per_row * self.height) as usize);
        {
            let data = slice.get_mapped_range();
            for row in data.chunks(padded_bytes_per_row as usize) {
                pixels.extend_from_slice(&row[..unpadded_bytes_per_row as usize]);
            }
        }
        buffer.unmap();

        image::RgbaImage::from_raw(self.width, self.height, pixels)
            .ok_or_else(|| BackendError::Readback("pixel buffer size mismatch".to_string()))
    }
}

impl RenderBackend for WgpuBackend {
    type Surface = SurfaceIndex;

    fn offscreen_surfaces(&self) -> [SurfaceIndex; 2] {
        [SurfaceIndex(0), SurfaceIndex(1)]
    }

    fn viewport_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn render_scene(&mut self, frame: &SceneFrame<SurfaceIndex>) -> Result<(), BackendError> {
        let target = &self.surface(frame.target)?.view;
        let scene = &self.scene;

        self.queue
            .write_buffer(&scene.uniform_buffer, 0, bytemuck::bytes_of(&frame.constants));
        let instances = frame.markers.each_ref().map(MarkerInstance::from);
        self.queue
            .write_buffer(&scene.marker_instance_buffer, 0, bytemuck::cast_slice(&instances));

        let [r, g, b, a] = frame.clear_colour.map(f64::from);
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Scene Encoder"),
        });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_bind_group(0, &scene.bind_group, &[]);

            render_pass.set_pipeline(&scene.pipeline);
            render_pass.set_vertex_buffer(0, scene.vertex_buffer.slice(..));
            render_pass.set_index_buffer(scene.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..scene.index_count, 0, 0..1);

            render_pass.set_pipeline(&scene.marker_pipeline);
            render_pass.set_vertex_buffer(0, scene.marker_vertex_buffer.slice(..));
            render_pass.set_vertex_buffer(1, scene.marker_instance_buffer.slice(..));
            render_pass.set_index_buffer(scene.marker_index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..scene.marker_index_count, 0, 0..instances.len() as u32);
        }
        self.queue.submit(Some(encoder.finish()));
        log::trace!("Scene pass -> {:?}", frame.target);
        Ok(())
    }

    fn draw_post_process(&mut self, pass: &PostProcessPass<SurfaceIndex>) -> Result<(), BackendError> {
        let source = &self.surface(pass.source)?.view;
        let target = match pass.target {
            PassTarget::Surface(index) => &self.surface(index)?.view,
            PassTarget::Presentation => &self.output.view,
        };

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Post-Process Encoder"),
        });
        self.post_processor.encode(
            &self.device,
            &self.queue,
            &mut encoder,
            pass.effect,
            pass.shape,
            source,
            target,
            &pass.constants,
        )?;
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn present(&mut self, vsync: bool) -> Result<(), BackendError> {
        // No display: the output texture is the presented image.
        self.presented_frames += 1;
        log::trace!("Presented frame {} (vsync {})", self.presented_frames, vsync);
        Ok(())
    }
}
