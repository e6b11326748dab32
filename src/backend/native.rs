use std::collections::HashMap;

use anyhow::{Context, Result as AnyResult};
use log::{debug, warn};

use super::common::{
    BackendPipelineDescriptor, BufferDescriptor, BufferKind, DrawCommand, ElementFormat,
    IndexFormat, ProgramDescriptor, SequenceAllocator, Topology,
};
use crate::error::{BridgeError, Result};
use crate::state::{BlendFactor, BlendFunc, ColorMask, CullWinding, DepthCompare, RenderState};

/// `wgpu` bakes rasterizer, depth and blend state into the pipeline object,
/// so each (pipeline, packed state, strip format, stride) combination seen
/// in a frame gets its own cached `wgpu::RenderPipeline`.
type BakeKey = (u32, RenderState, Option<IndexFormat>, u32);

/// Backend that drives a real GPU through `wgpu`.
///
/// Draws are queued by [`submit`](Self::submit) and encoded into a single
/// render pass by [`flush`](Self::flush) once the caller has a target view.
/// Uniform blocks are copied into a per-frame ring at submit time, so every
/// queued draw reads the values that were current when it was issued.
#[derive(Debug)]
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    color_format: wgpu::TextureFormat,
    depth_format: Option<wgpu::TextureFormat>,
    max_buffer_size: u64,
    ids: SequenceAllocator,
    buffers: HashMap<u32, wgpu::Buffer>,
    /// CPU copies of uniform buffers. Only the ring reaches the GPU.
    uniform_blocks: HashMap<u32, Vec<u8>>,
    programs: HashMap<u32, Program>,
    pipelines: HashMap<u32, PipelineEntry>,
    baked: HashMap<BakeKey, wgpu::RenderPipeline>,
    ring: UniformRing,
    ring_buffer: Option<wgpu::Buffer>,
    /// Bind groups over the current `ring_buffer`, one per pipeline.
    bind_groups: HashMap<u32, wgpu::BindGroup>,
    pending: Vec<PendingDraw>,
}

#[derive(Debug)]
struct Program {
    module: wgpu::ShaderModule,
    vertex_entry: String,
    fragment_entry: String,
}

#[derive(Debug)]
struct PipelineEntry {
    desc: BackendPipelineDescriptor,
    layout: wgpu::PipelineLayout,
    uniform_layout: Option<wgpu::BindGroupLayout>,
}

#[derive(Debug, Clone, Copy)]
struct PendingDraw {
    command: DrawCommand,
    /// Offset of this draw's uniform snapshot in the ring.
    uniform_offset: Option<u32>,
}

/// CPU side of the per-frame uniform ring: snapshots packed at the device's
/// dynamic-offset alignment, uploaded in one write at flush.
#[derive(Debug, Clone)]
struct UniformRing {
    staging: Vec<u8>,
    alignment: u32,
}

impl UniformRing {
    fn new(alignment: u32) -> Self {
        Self {
            staging: Vec::new(),
            alignment: alignment.max(wgpu::COPY_BUFFER_ALIGNMENT as u32),
        }
    }

    /// Size the ring would have after pushing `len` more bytes.
    fn size_after(&self, len: usize) -> u64 {
        let start = (self.staging.len() as u64).next_multiple_of(u64::from(self.alignment));
        start + (len as u64).next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT)
    }

    fn push(&mut self, block: &[u8]) -> u32 {
        let start = self.staging.len().next_multiple_of(self.alignment as usize);
        self.staging.resize(start, 0);
        self.staging.extend_from_slice(block);
        let padded = self
            .staging
            .len()
            .next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT as usize);
        self.staging.resize(padded, 0);
        start as u32
    }

    fn bytes(&self) -> &[u8] {
        &self.staging
    }

    fn clear(&mut self) {
        self.staging.clear();
    }
}

/// Stride to bake for a draw. The bound buffer's stride wins since it may
/// carry attributes the pipeline does not read; zero means "as declared".
fn resolve_stride(declared: u32, supplied: u32) -> Option<u32> {
    match supplied {
        0 => Some(declared),
        supplied if supplied < declared => None,
        supplied => Some(supplied),
    }
}

impl WgpuBackend {
    /// Acquires an adapter and device without a presentation surface.
    pub async fn new(
        color_format: wgpu::TextureFormat,
        depth_format: Option<wgpu::TextureFormat>,
    ) -> AnyResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: Default::default(),
            backend_options: Default::default(),
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .context("failed to acquire GPU adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("gl-bridge-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                experimental_features: Default::default(),
                memory_hints: Default::default(),
                trace: Default::default(),
            })
            .await
            .context("failed to create GPU device")?;

        Ok(Self::from_device(device, queue, color_format, depth_format))
    }

    /// Wraps a device the host already owns.
    pub fn from_device(
        device: wgpu::Device,
        queue: wgpu::Queue,
        color_format: wgpu::TextureFormat,
        depth_format: Option<wgpu::TextureFormat>,
    ) -> Self {
        let limits = device.limits();
        Self {
            device,
            queue,
            color_format,
            depth_format,
            max_buffer_size: limits.max_buffer_size,
            ids: SequenceAllocator::new(),
            buffers: HashMap::new(),
            uniform_blocks: HashMap::new(),
            programs: HashMap::new(),
            pipelines: HashMap::new(),
            baked: HashMap::new(),
            ring: UniformRing::new(limits.min_uniform_buffer_offset_alignment),
            ring_buffer: None,
            bind_groups: HashMap::new(),
            pending: Vec::new(),
        }
    }

    /// Draws queued since the last flush.
    pub fn pending_draws(&self) -> usize {
        self.pending.len()
    }

    fn fresh_id(&mut self) -> u32 {
        let (buffers, blocks) = (&self.buffers, &self.uniform_blocks);
        let (programs, pipelines) = (&self.programs, &self.pipelines);
        self.ids.next_free(|id| {
            buffers.contains_key(&id)
                || blocks.contains_key(&id)
                || programs.contains_key(&id)
                || pipelines.contains_key(&id)
        })
    }

    pub(crate) fn create_buffer(&mut self, desc: &BufferDescriptor<'_>) -> Result<u32> {
        if desc.size == 0 {
            return Err(BridgeError::ResourceCreation {
                label: desc.label.to_string(),
                reason: "zero-sized buffer".to_string(),
            });
        }
        let size = desc.size.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
        if size > self.max_buffer_size {
            return Err(BridgeError::BufferTooLarge {
                label: desc.label.to_string(),
                size,
                limit: self.max_buffer_size,
            });
        }
        let id = self.fresh_id();
        if id == 0 {
            return Err(BridgeError::ResourceCreation {
                label: desc.label.to_string(),
                reason: "buffer ids exhausted".to_string(),
            });
        }

        let usage = match desc.kind {
            BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
            BufferKind::Index => wgpu::BufferUsages::INDEX,
            BufferKind::Uniform => {
                self.uniform_blocks.insert(id, vec![0; desc.size as usize]);
                return Ok(id);
            }
        } | wgpu::BufferUsages::COPY_DST;

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(desc.label),
            size,
            usage,
            mapped_at_creation: false,
        });
        self.buffers.insert(id, buffer);
        Ok(id)
    }

    pub(crate) fn write_buffer(&mut self, raw: u32, offset: u64, data: &[u8]) {
        if let Some(block) = self.uniform_blocks.get_mut(&raw) {
            let start = (offset as usize).min(block.len());
            let len = data.len().min(block.len() - start);
            if len < data.len() {
                warn!("write of {} bytes clipped to {len} for uniform block {raw}", data.len());
            }
            block[start..start + len].copy_from_slice(&data[..len]);
            return;
        }

        let Some(buffer) = self.buffers.get(&raw) else {
            warn!("write to unknown buffer {raw} ignored");
            return;
        };
        let align = wgpu::COPY_BUFFER_ALIGNMENT;
        if offset % align != 0 {
            warn!("unaligned write at {offset} to buffer {raw} ignored");
            return;
        }
        let room = buffer.size().saturating_sub(offset) as usize;
        let len = data.len().min(room);
        if len < data.len() {
            warn!("write of {} bytes clipped to {len} for buffer {raw}", data.len());
        }
        if len == 0 {
            return;
        }
        let padded = (len as u64).next_multiple_of(align) as usize;
        if padded == len {
            self.queue.write_buffer(buffer, offset, &data[..len]);
        } else {
            // Buffer sizes are rounded up to the copy alignment, so the
            // padded tail still fits.
            let mut staging = data[..len].to_vec();
            staging.resize(padded, 0);
            self.queue.write_buffer(buffer, offset, &staging);
        }
    }

    pub(crate) fn destroy_buffer(&mut self, raw: u32) {
        if let Some(buffer) = self.buffers.remove(&raw) {
            buffer.destroy();
        }
        self.uniform_blocks.remove(&raw);
    }

    pub(crate) fn create_program(&mut self, desc: &ProgramDescriptor) -> Result<u32> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&desc.name),
                source: wgpu::ShaderSource::Wgsl(desc.source.clone()),
            });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(BridgeError::ShaderCompilation {
                label: desc.name.clone(),
                details: err.to_string(),
            });
        }
        let id = self.fresh_id();
        self.programs.insert(
            id,
            Program {
                module,
                vertex_entry: desc.vertex_entry.to_string(),
                fragment_entry: desc.fragment_entry.to_string(),
            },
        );
        Ok(id)
    }

    /// Builds the pipeline layout and bakes it once with the default state,
    /// so a shader that does not match its vertex layout or uniform block
    /// fails here rather than at flush.
    pub(crate) fn create_pipeline(&mut self, desc: &BackendPipelineDescriptor) -> Result<u32> {
        if !self.programs.contains_key(&desc.program.raw()) {
            return Err(BridgeError::ResourceCreation {
                label: desc.label.clone(),
                reason: format!("program {} is not loaded", desc.program.raw()),
            });
        }

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let uniform_layout = (desc.uniform_size > 0).then(|| {
            self.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(&desc.label),
                    entries: &[wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: true,
                            min_binding_size: std::num::NonZeroU64::new(desc.uniform_size),
                        },
                        count: None,
                    }],
                })
        });
        let bind_group_layouts: Vec<&wgpu::BindGroupLayout> = uniform_layout.iter().collect();
        let layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(&desc.label),
                bind_group_layouts: &bind_group_layouts,
                push_constant_ranges: &[],
            });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(BridgeError::ResourceCreation {
                label: desc.label.clone(),
                reason: err.to_string(),
            });
        }

        let entry = PipelineEntry {
            desc: desc.clone(),
            layout,
            uniform_layout,
        };
        let id = self.fresh_id();
        let key = (id, RenderState::default(), None, entry.desc.vertex_layout.stride());
        let baked = self
            .bake(&entry, &key)
            .map_err(|details| BridgeError::ShaderCompilation {
                label: desc.label.clone(),
                details,
            })?;
        self.baked.insert(key, baked);
        self.pipelines.insert(id, entry);
        Ok(id)
    }

    pub(crate) fn destroy_pipeline(&mut self, raw: u32) {
        self.pipelines.remove(&raw);
        self.baked.retain(|(pipeline, ..), _| *pipeline != raw);
        self.bind_groups.remove(&raw);
    }

    /// Queues a draw, copying the current contents of its uniform block into
    /// the frame's ring.
    pub(crate) fn submit(&mut self, command: DrawCommand) {
        let uniform_offset = match command.uniforms {
            Some(buffer) => {
                let Some(block) = self.uniform_blocks.get(&buffer.raw()) else {
                    warn!("draw references unknown uniform buffer {}, skipping", buffer.raw());
                    return;
                };
                if self.ring.size_after(block.len()) > self.max_buffer_size {
                    warn!("uniform ring is full for this frame, skipping draw");
                    return;
                }
                Some(self.ring.push(block))
            }
            None => None,
        };
        self.pending.push(PendingDraw {
            command,
            uniform_offset,
        });
    }

    pub(crate) fn end_frame(&mut self) {
        if !self.pending.is_empty() {
            warn!(
                "frame ended with {} draws that were never flushed",
                self.pending.len()
            );
            self.pending.clear();
        }
        self.ring.clear();
    }

    /// Encodes every queued draw into one render pass targeting `color`
    /// and `depth`.
    ///
    /// A backend built with a depth format needs a depth view; without one
    /// the queue is kept and nothing is encoded.
    pub fn flush(&mut self, color: &wgpu::TextureView, depth: Option<&wgpu::TextureView>) {
        if self.pending.is_empty() {
            return;
        }
        if self.depth_format.is_some() && depth.is_none() {
            warn!(
                "flush without a depth view on a backend with a depth format; {} draws kept",
                self.pending.len()
            );
            return;
        }
        let depth = match (self.depth_format, depth) {
            (None, Some(_)) => {
                debug!("ignoring depth view: backend has no depth format");
                None
            }
            (_, depth) => depth,
        };

        let pending = std::mem::take(&mut self.pending);
        self.upload_ring();

        let mut resolved = Vec::with_capacity(pending.len());
        for draw in &pending {
            let key = bake_key(&draw.command);
            if !self.baked.contains_key(&key) {
                let baked = match self.pipelines.get(&key.0) {
                    Some(entry) => self.bake(entry, &key),
                    None => Err(format!("unknown pipeline {}", key.0)),
                };
                match baked {
                    Ok(pipeline) => {
                        self.baked.insert(key, pipeline);
                    }
                    Err(details) => {
                        warn!("skipping draw: {details}");
                        continue;
                    }
                }
            }
            if draw.uniform_offset.is_some() {
                self.ensure_bind_group(key.0);
            }
            resolved.push((key, draw));
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("gl-bridge-encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("gl-bridge-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: depth.map(|view| {
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

            for (key, draw) in &resolved {
                let command = &draw.command;
                let (Some(pipeline), Some(vertex)) = (
                    self.baked.get(key),
                    self.buffers.get(&command.vertex_buffer.raw()),
                ) else {
                    warn!("skipping draw that references a destroyed resource");
                    continue;
                };
                let group = match draw.uniform_offset {
                    Some(offset) => match self.bind_groups.get(&key.0) {
                        Some(group) => Some((group, offset)),
                        None => {
                            warn!("skipping draw whose uniforms could not be bound");
                            continue;
                        }
                    },
                    None => None,
                };
                pass.set_pipeline(pipeline);
                if let Some((group, offset)) = group {
                    pass.set_bind_group(0, group, &[offset]);
                }
                pass.set_vertex_buffer(0, vertex.slice(..));

                let range = command.first..command.first + command.count;
                let instances = 0..command.instance_count;
                match command.index {
                    Some((index, format)) => {
                        let Some(index) = self.buffers.get(&index.raw()) else {
                            warn!("skipping indexed draw with a destroyed index buffer");
                            continue;
                        };
                        pass.set_index_buffer(index.slice(..), index_format(format));
                        let base = i32::try_from(command.base_vertex).unwrap_or(i32::MAX);
                        pass.draw_indexed(range, base, instances);
                    }
                    None => pass.draw(range, instances),
                }
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        self.ring.clear();
        debug!("flushed {} draws", resolved.len());
    }

    /// Copies the ring to the GPU, growing the backing buffer if needed.
    /// Growing invalidates every bind group built over the old buffer.
    fn upload_ring(&mut self) {
        let needed = self.ring.bytes().len() as u64;
        if needed == 0 {
            return;
        }
        let fits = self
            .ring_buffer
            .as_ref()
            .is_some_and(|buffer| buffer.size() >= needed);
        if !fits {
            let size = needed.next_power_of_two().min(self.max_buffer_size).max(needed);
            if let Some(old) = self.ring_buffer.take() {
                old.destroy();
            }
            self.ring_buffer = Some(self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("gl-bridge-uniform-ring"),
                size,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
            self.bind_groups.clear();
        }
        if let Some(buffer) = &self.ring_buffer {
            self.queue.write_buffer(buffer, 0, self.ring.bytes());
        }
    }

    fn ensure_bind_group(&mut self, pipeline: u32) {
        if self.bind_groups.contains_key(&pipeline) {
            return;
        }
        let (Some(entry), Some(ring)) = (self.pipelines.get(&pipeline), self.ring_buffer.as_ref())
        else {
            return;
        };
        let Some(layout) = entry.uniform_layout.as_ref() else {
            return;
        };
        let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&entry.desc.label),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: ring,
                    offset: 0,
                    size: std::num::NonZeroU64::new(entry.desc.uniform_size),
                }),
            }],
        });
        self.bind_groups.insert(pipeline, group);
    }

    /// Builds the `wgpu` pipeline for `key` inside a validation scope.
    fn bake(
        &self,
        entry: &PipelineEntry,
        key: &BakeKey,
    ) -> std::result::Result<wgpu::RenderPipeline, String> {
        let Some(program) = self.programs.get(&entry.desc.program.raw()) else {
            return Err(format!("pipeline '{}' lost its program", entry.desc.label));
        };
        let &(_, state, strip_format, supplied_stride) = key;

        let declared = entry.desc.vertex_layout.stride();
        let Some(stride) = resolve_stride(declared, supplied_stride) else {
            return Err(format!(
                "pipeline '{}' reads {declared} bytes per vertex, draw supplied {supplied_stride}",
                entry.desc.label
            ));
        };

        let attributes: Vec<wgpu::VertexAttribute> = entry
            .desc
            .vertex_layout
            .offsets()
            .enumerate()
            .map(|(location, (offset, element))| wgpu::VertexAttribute {
                format: vertex_format(element.format),
                offset: u64::from(offset),
                shader_location: location as u32,
            })
            .collect();

        let depth_stencil = self.depth_format.map(|format| wgpu::DepthStencilState {
            format,
            // Without a depth test nothing reaches the depth buffer.
            depth_write_enabled: state.depth_write() && state.depth_compare().is_some(),
            depth_compare: state
                .depth_compare()
                .map(compare_function)
                .unwrap_or(wgpu::CompareFunction::Always),
            stencil: Default::default(),
            bias: Default::default(),
        });

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&entry.desc.label),
                layout: Some(&entry.layout),
                vertex: wgpu::VertexState {
                    module: &program.module,
                    entry_point: Some(&program.vertex_entry),
                    compilation_options: Default::default(),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: u64::from(stride),
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &attributes,
                    }],
                },
                primitive: wgpu::PrimitiveState {
                    topology: primitive_topology(entry.desc.topology),
                    strip_index_format: strip_format.map(index_format),
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: state.cull().map(|winding| match winding {
                        CullWinding::Cw => wgpu::Face::Back,
                        CullWinding::Ccw => wgpu::Face::Front,
                    }),
                    polygon_mode: wgpu::PolygonMode::Fill,
                    ..Default::default()
                },
                depth_stencil,
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &program.module,
                    entry_point: Some(&program.fragment_entry),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.color_format,
                        blend: state.blend_func().map(blend_state),
                        write_mask: color_writes(state.color_writes()),
                    })],
                }),
                multiview: None,
                cache: None,
            });
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(err) => Err(format!("pipeline '{}': {err}", entry.desc.label)),
            None => Ok(pipeline),
        }
    }
}

fn bake_key(command: &DrawCommand) -> BakeKey {
    let strip = matches!(command.topology, Topology::LineStrip | Topology::TriangleStrip);
    let strip_format = if strip {
        command.index.map(|(_, format)| format)
    } else {
        None
    };
    (command.pipeline.raw(), command.state, strip_format, command.vertex_stride)
}

fn compare_function(compare: DepthCompare) -> wgpu::CompareFunction {
    match compare {
        DepthCompare::Never => wgpu::CompareFunction::Never,
        DepthCompare::Less => wgpu::CompareFunction::Less,
        DepthCompare::Equal => wgpu::CompareFunction::Equal,
        DepthCompare::LessEqual => wgpu::CompareFunction::LessEqual,
        DepthCompare::Greater => wgpu::CompareFunction::Greater,
        DepthCompare::NotEqual => wgpu::CompareFunction::NotEqual,
        DepthCompare::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
        DepthCompare::Always => wgpu::CompareFunction::Always,
    }
}

fn blend_factor(factor: BlendFactor) -> wgpu::BlendFactor {
    match factor {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcColor => wgpu::BlendFactor::Src,
        BlendFactor::InvSrcColor => wgpu::BlendFactor::OneMinusSrc,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::InvSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        BlendFactor::DstAlpha => wgpu::BlendFactor::DstAlpha,
        BlendFactor::InvDstAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
        BlendFactor::DstColor => wgpu::BlendFactor::Dst,
        BlendFactor::InvDstColor => wgpu::BlendFactor::OneMinusDst,
        BlendFactor::SrcAlphaSaturate => wgpu::BlendFactor::SrcAlphaSaturated,
    }
}

fn blend_state(func: BlendFunc) -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: blend_factor(func.src_rgb),
            dst_factor: blend_factor(func.dst_rgb),
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: blend_factor(func.src_alpha),
            dst_factor: blend_factor(func.dst_alpha),
            operation: wgpu::BlendOperation::Add,
        },
    }
}

fn color_writes(mask: ColorMask) -> wgpu::ColorWrites {
    let mut writes = wgpu::ColorWrites::empty();
    writes.set(wgpu::ColorWrites::RED, mask.contains(ColorMask::R));
    writes.set(wgpu::ColorWrites::GREEN, mask.contains(ColorMask::G));
    writes.set(wgpu::ColorWrites::BLUE, mask.contains(ColorMask::B));
    writes.set(wgpu::ColorWrites::ALPHA, mask.contains(ColorMask::A));
    writes
}

fn primitive_topology(topology: Topology) -> wgpu::PrimitiveTopology {
    match topology {
        Topology::PointList => wgpu::PrimitiveTopology::PointList,
        Topology::LineList => wgpu::PrimitiveTopology::LineList,
        Topology::LineStrip => wgpu::PrimitiveTopology::LineStrip,
        Topology::TriangleList => wgpu::PrimitiveTopology::TriangleList,
        Topology::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
    }
}

fn index_format(format: IndexFormat) -> wgpu::IndexFormat {
    match format {
        IndexFormat::U16 => wgpu::IndexFormat::Uint16,
        IndexFormat::U32 => wgpu::IndexFormat::Uint32,
    }
}

fn vertex_format(format: ElementFormat) -> wgpu::VertexFormat {
    match format {
        ElementFormat::Float32 => wgpu::VertexFormat::Float32,
        ElementFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
        ElementFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
        ElementFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
        ElementFormat::Unorm8x4 => wgpu::VertexFormat::Unorm8x4,
        ElementFormat::Snorm8x4 => wgpu::VertexFormat::Snorm8x4,
        ElementFormat::Sint16x2 => wgpu::VertexFormat::Sint16x2,
        ElementFormat::Uint16x2 => wgpu::VertexFormat::Uint16x2,
        ElementFormat::Uint8 => wgpu::VertexFormat::Uint8,
    }
}
