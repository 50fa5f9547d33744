//! GPU post-processing passes.
//!
//! One pipeline per (quad shape, effect) pair, all built from
//! `shader_post.wgsl` using the fragment entry points in the effect table.
//! Every draw samples its source with a point sampler and its auxiliary
//! texture (if any) with a trilinear sampler.

use std::collections::HashMap;

use crate::backend::{BackendError, PassShape};
use crate::gpu::aux_textures::{self, AUX_TEXTURE_SIZE};
use crate::gpu::pipeline::create_post_process_pipeline;
use crate::post_params::PostProcessConstants;
use crate::post_processing::{effect_table, AuxTexture, PostProcess};

/// Seed for the procedural auxiliary textures.
const AUX_TEXTURE_SEED: u64 = 0xa11ce;

impl PassShape {
    fn vertex_entry(self) -> &'static str {
        match self {
            PassShape::FullScreen => "vs_full_screen",
            PassShape::Polygon => "vs_polygon",
        }
    }
}

struct AuxResources {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

/// Everything needed to run any effect onto any target.
pub struct PostProcessor {
    pipelines: HashMap<(PassShape, PostProcess), wgpu::RenderPipeline>,
    texture_bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    point_sampler: wgpu::Sampler,
    aux_sampler: wgpu::Sampler,
    /// Indexed by `AuxTexture as usize`.
    aux_textures: Vec<AuxResources>,
}

impl PostProcessor {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, format: wgpu::TextureFormat) -> Self {
        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let sampler_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        };

        // Source texture + point sampler, aux texture + trilinear sampler
        let texture_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Post-Process Texture Bind Group Layout"),
            entries: &[texture_entry(0), sampler_entry(1), texture_entry(2), sampler_entry(3)],
        });

        let uniform_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Post-Process Uniform Bind Group Layout"),
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
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Post-Process Uniform Buffer"),
            size: std::mem::size_of::<PostProcessConstants>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Post-Process Uniform Bind Group"),
            layout: &uniform_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let point_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Post-Process Point Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let aux_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Post-Process Aux Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Post-Process Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shader_post.wgsl").into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Post-Process Pipeline Layout"),
            bind_group_layouts: &[&texture_bind_group_layout, &uniform_bind_group_layout],
            push_constant_ranges: &[],
        });

        let mut pipelines = HashMap::new();
        for entry in effect_table() {
            for shape in [PassShape::FullScreen, PassShape::Polygon] {
                let pipeline = create_post_process_pipeline(
                    device,
                    &pipeline_layout,
                    &shader,
                    shape.vertex_entry(),
                    entry.fragment_entry,
                    format,
                );
                pipelines.insert((shape, entry.effect), pipeline);
            }
        }
        log::debug!("Created {} post-process pipelines", pipelines.len());

        let aux_textures = AuxTexture::ALL
            .into_iter()
            .map(|kind| create_aux_texture(device, queue, kind))
            .collect();

        Self {
            pipelines,
            texture_bind_group_layout,
            uniform_buffer,
            uniform_bind_group,
            point_sampler,
            aux_sampler,
            aux_textures,
        }
    }

    /// Record one post-process draw into `encoder`.
    ///
    /// Uploads `constants` immediately; the caller must submit `encoder`
    /// before the next call rewrites them.
    #[allow(clippy::too_many_arguments)]
    pub fn encode(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        effect: PostProcess,
        shape: PassShape,
        source: &wgpu::TextureView,
        target: &wgpu::TextureView,
        constants: &PostProcessConstants,
    ) -> Result<(), BackendError> {
        let pipeline = self
            .pipelines
            .get(&(shape, effect))
            .ok_or(BackendError::MissingPipeline { effect, shape })?;

        // Effects without an aux texture still need something bound.
        let aux_kind = effect.entry().aux_texture.unwrap_or(AuxTexture::Noise);
        let aux = &self.aux_textures[aux_kind as usize];

        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(constants));

        let texture_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("Post-Process Texture Bind Group: {}", effect)),
            layout: &self.texture_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(source),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.point_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&aux.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.aux_sampler),
                },
            ],
        });

        // Load, not clear: masked passes only cover part of the target.
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(&format!("Post-Process Pass: {} ({:?})", effect, shape)),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
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

        render_pass.set_pipeline(pipeline);
        render_pass.set_bind_group(0, &texture_bind_group, &[]);
        render_pass.set_bind_group(1, &self.uniform_bind_group, &[]);
        render_pass.draw(0..4, 0..1);
        Ok(())
    }
}

fn create_aux_texture(device: &wgpu::Device, queue: &wgpu::Queue, kind: AuxTexture) -> AuxResources {
    let image = aux_textures::generate(kind, AUX_TEXTURE_SIZE, AUX_TEXTURE_SEED);
    let size = wgpu::Extent3d {
        width: image.width,
        height: image.height,
        depth_or_array_layers: 1,
    };

    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(&format!("Aux Texture: {:?}", kind)),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &image.data,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * image.width),
            rows_per_image: Some(image.height),
        },
        size,
    );

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    AuxResources {
        _texture: texture,
        view,
    }
}
