use std::collections::HashMap;

use log::{debug, info, warn};

use crate::{
    backend::{
        Backend, BackendPipelineDescriptor, BufferDescriptor, BufferHandle, BufferKind,
        DrawCommand, IndexFormat, PipelineHandle, ProgramDescriptor, ProgramHandle, Topology,
        VertexElement, VertexLayout, FALLBACK_SHADER,
    },
    config::BridgeConfig,
    dispatch::{self, BindingState, DrawCallState, DrawRange, IndexBinding, VertexBinding},
    error::{BridgeError, Result},
    fence::{FrameClock, FrameFence},
    registry::HandleRegistry,
    state::StateTracker,
    uniform::{UniformBuffer, UniformBufferLayout, UniformDeclaration, UniformValue},
    variant::{select_variant, AttributeFlags},
};

/// Slot of a pipeline in its [`Device`]'s table, plus the generation the
/// slot had when the pipeline was created. Ids of destroyed pipelines stay
/// dead after their slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipelineId {
    index: usize,
    generation: u32,
}

impl PipelineId {
    #[cfg(test)]
    pub(crate) fn from_index(index: usize) -> Self {
        Self {
            index,
            generation: 0,
        }
    }

    pub fn index(self) -> usize {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

/// Everything needed to build a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineDescriptor {
    pub name: String,
    pub program: ProgramHandle,
    pub vertex_layout: VertexLayout,
    pub topology: Topology,
    /// Uniforms in the order the shader declares them.
    pub uniforms: Vec<UniformDeclaration>,
}

#[derive(Debug, Default)]
struct SlotEntry {
    generation: u32,
    pipeline: Option<PipelineSlot>,
}

#[derive(Debug)]
struct PipelineSlot {
    name: String,
    handle: PipelineHandle,
    topology: Topology,
    uniforms: UniformBuffer,
}

/// Front door of the bridge. Owns the backend and every piece of draw-time
/// state, and turns legacy-style calls into validated backend draws.
///
/// Pipelines live in an indexed table owned here and are referred to by
/// [`PipelineId`]; nothing a pipeline holds points back at the device.
#[derive(Debug)]
pub struct Device {
    backend: Backend,
    config: BridgeConfig,
    state: StateTracker,
    draws: DrawCallState,
    pipelines: Vec<SlotEntry>,
    default_pipeline: PipelineId,
    variants: HashMap<String, PipelineId>,
    programs: HandleRegistry<String, ProgramHandle>,
    buffer_sizes: HashMap<BufferHandle, u64>,
    clock: FrameClock,
}

impl Device {
    /// Wraps `backend` and pre-creates the fallback pipeline used by draws
    /// issued with nothing bound. Fails if the backend cannot build it.
    pub fn new(backend: impl Into<Backend>, config: BridgeConfig) -> Result<Self> {
        let mut device = Self {
            backend: backend.into(),
            config,
            state: StateTracker::new(),
            draws: DrawCallState::new(),
            pipelines: Vec::new(),
            default_pipeline: PipelineId {
                index: 0,
                generation: 0,
            },
            variants: HashMap::new(),
            programs: HandleRegistry::new(),
            buffer_sizes: HashMap::new(),
            clock: FrameClock::new(),
        };

        let topology = device.config.default_topology;
        let program = device.create_program(ProgramDescriptor::wgsl("fallback", FALLBACK_SHADER))?;
        device.default_pipeline = device.create_pipeline(PipelineDescriptor {
            name: "fallback".to_string(),
            program,
            vertex_layout: VertexLayout::position(),
            topology,
            uniforms: Vec::new(),
        })?;

        info!("device ready, default topology {topology:?}");
        Ok(device)
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut Backend {
        &mut self.backend
    }

    pub fn state(&self) -> &StateTracker {
        &self.state
    }

    /// Legacy render-state setters go through here.
    pub fn state_mut(&mut self) -> &mut StateTracker {
        &mut self.state
    }

    /// Compiles `desc`, or returns the handle of the program already built
    /// under the same name.
    pub fn create_program(&mut self, desc: ProgramDescriptor) -> Result<ProgramHandle> {
        let backend = &mut self.backend;
        self.programs
            .get_or_try_insert_with(desc.name.clone(), || backend.create_program(&desc))
    }

    /// Shared view of the program cache, for loader threads.
    pub fn program_registry(&self) -> HandleRegistry<String, ProgramHandle> {
        self.programs.clone()
    }

    pub fn create_pipeline(&mut self, desc: PipelineDescriptor) -> Result<PipelineId> {
        let layout = UniformBufferLayout::from_declarations(&desc.uniforms)?;
        let limit = u64::from(self.config.max_uniform_buffer_size);
        if u64::from(layout.size()) > limit {
            return Err(BridgeError::BufferTooLarge {
                label: format!("{} uniforms", desc.name),
                size: u64::from(layout.size()),
                limit,
            });
        }

        let handle = self.backend.create_pipeline(&BackendPipelineDescriptor {
            label: desc.name.clone(),
            program: desc.program,
            vertex_layout: desc.vertex_layout,
            topology: desc.topology,
            uniform_size: u64::from(layout.size()),
        })?;

        let buffer = if layout.is_empty() {
            None
        } else {
            let created = self.backend.create_buffer(&BufferDescriptor {
                label: &desc.name,
                kind: BufferKind::Uniform,
                size: u64::from(layout.size()),
            });
            match created {
                Ok(buffer) => Some(buffer),
                Err(err) => {
                    self.backend.destroy_pipeline(handle);
                    return Err(err);
                }
            }
        };

        debug!(
            "pipeline '{}' created with {} uniform bytes",
            desc.name,
            layout.size()
        );

        let slot = PipelineSlot {
            name: desc.name,
            handle,
            topology: desc.topology,
            uniforms: UniformBuffer::new(layout, buffer),
        };
        let index = match self.pipelines.iter().position(|entry| entry.pipeline.is_none()) {
            Some(index) => index,
            None => {
                self.pipelines.push(SlotEntry::default());
                self.pipelines.len() - 1
            }
        };
        let entry = &mut self.pipelines[index];
        entry.pipeline = Some(slot);
        Ok(PipelineId {
            index,
            generation: entry.generation,
        })
    }

    /// Releases the pipeline and its uniform buffer. The fallback pipeline
    /// cannot be destroyed.
    pub fn destroy_pipeline(&mut self, id: PipelineId) -> Result<()> {
        if id == self.default_pipeline {
            warn!("refusing to destroy the fallback pipeline");
            return Ok(());
        }
        let slot = match self.pipelines.get_mut(id.index) {
            Some(entry) if entry.generation == id.generation && entry.pipeline.is_some() => {
                entry.generation = entry.generation.wrapping_add(1);
                entry.pipeline.take()
            }
            _ => None,
        }
        .ok_or(BridgeError::UnknownPipeline(id))?;

        self.backend.destroy_pipeline(slot.handle);
        if let Some(buffer) = slot.uniforms.buffer() {
            self.backend.destroy_buffer(buffer);
        }
        if self.draws.pipeline() == Some(id) {
            self.draws.clear_pipeline();
        }
        self.variants.retain(|_, variant| *variant != id);
        debug!("pipeline '{}' destroyed", slot.name);
        Ok(())
    }

    pub fn pipeline_handle(&self, id: PipelineId) -> Option<PipelineHandle> {
        self.slot(id).map(|slot| slot.handle)
    }

    pub fn default_pipeline(&self) -> PipelineId {
        self.default_pipeline
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines
            .iter()
            .filter(|entry| entry.pipeline.is_some())
            .count()
    }

    pub fn set_pipeline(&mut self, id: PipelineId) {
        if self.slot(id).is_some() {
            self.draws.set_pipeline(id);
        } else {
            warn!("set_pipeline({id:?}) ignored: no such pipeline");
        }
    }

    pub fn clear_pipeline(&mut self) {
        self.draws.clear_pipeline();
    }

    pub fn binding_state(&self) -> BindingState {
        self.draws.state()
    }

    /// Makes `pipeline` the program bound when `name` is resolved by
    /// [`bind_shader`](Self::bind_shader).
    pub fn register_variant(&mut self, name: impl Into<String>, pipeline: PipelineId) {
        let name = name.into();
        if self.slot(pipeline).is_none() {
            warn!("variant '{name}' not registered: {pipeline:?} does not exist");
            return;
        }
        self.variants.insert(name, pipeline);
    }

    /// Resolves `name` to the variant matching `elements` and binds it.
    /// When no such variant is registered the pipeline is unbound so the
    /// next draw falls back to the default.
    pub fn bind_shader(&mut self, name: &str, elements: &[VertexElement]) -> Option<PipelineId> {
        let variant = select_variant(name, AttributeFlags::from_elements(elements));
        match self.variants.get(variant.as_ref()).copied() {
            Some(id) => {
                self.draws.set_pipeline(id);
                Some(id)
            }
            None => {
                warn!("no pipeline registered for shader '{variant}' (requested '{name}')");
                self.draws.clear_pipeline();
                None
            }
        }
    }

    pub fn uniforms(&self, id: PipelineId) -> Option<&UniformBuffer> {
        self.slot(id).map(|slot| &slot.uniforms)
    }

    pub fn uniforms_mut(&mut self, id: PipelineId) -> Option<&mut UniformBuffer> {
        self.slot_mut(id).map(|slot| &mut slot.uniforms)
    }

    pub fn set_uniform(&mut self, id: PipelineId, name: &str, value: UniformValue) -> bool {
        match self.uniforms_mut(id) {
            Some(uniforms) => uniforms.set_value(name, value),
            None => {
                warn!("set_uniform('{name}') on missing pipeline {id:?}");
                false
            }
        }
    }

    /// Creates a buffer holding `data`. An empty slice still allocates the
    /// minimum backend size.
    pub fn create_buffer(
        &mut self,
        kind: BufferKind,
        label: &str,
        data: &[u8],
    ) -> Result<BufferHandle> {
        let size = data.len() as u64;
        let buffer = self.backend.create_buffer(&BufferDescriptor {
            label,
            kind,
            size: size.max(4),
        })?;
        if !data.is_empty() {
            self.backend.write_buffer(buffer, 0, data);
        }
        self.buffer_sizes.insert(buffer, size);
        Ok(buffer)
    }

    pub fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        if !self.buffer_sizes.contains_key(&buffer) {
            warn!("write to unknown buffer {buffer:?} ignored");
            return;
        }
        self.backend.write_buffer(buffer, offset, data);
    }

    pub fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if self.buffer_sizes.remove(&buffer).is_none() {
            warn!("destroy of unknown buffer {buffer:?} ignored");
            return;
        }
        self.draws.forget_buffer(buffer);
        self.backend.destroy_buffer(buffer);
    }

    /// Binds `buffer` as the vertex source. An unknown buffer clears the
    /// binding.
    pub fn bind_vertex_buffer(&mut self, buffer: BufferHandle, stride: u32) {
        let binding = self.buffer_sizes.get(&buffer).map(|&size| VertexBinding {
            buffer,
            size,
            stride,
        });
        if binding.is_none() {
            warn!("bind of unknown vertex buffer {buffer:?}; vertex binding cleared");
        }
        self.draws.bind_vertex(binding);
    }

    pub fn bind_index_buffer(&mut self, buffer: BufferHandle, format: IndexFormat) {
        let binding = self.buffer_sizes.get(&buffer).map(|&size| IndexBinding {
            buffer,
            size,
            format,
        });
        if binding.is_none() {
            warn!("bind of unknown index buffer {buffer:?}; index binding cleared");
        }
        self.draws.bind_index(binding);
    }

    pub fn unbind_vertex_buffer(&mut self) {
        self.draws.bind_vertex(None);
    }

    pub fn unbind_index_buffer(&mut self) {
        self.draws.bind_index(None);
    }

    /// Validates and submits an indexed draw. Returns whether anything was
    /// submitted.
    pub fn draw_indexed(
        &mut self,
        base_vertex: u32,
        first_index: u32,
        index_count: u32,
        instance_count: u32,
    ) -> bool {
        let (Some(vertex), Some(index)) = (self.draws.vertex(), self.draws.index()) else {
            warn!("draw_indexed with no vertex or index buffer bound, skipping");
            return false;
        };
        let Some(range) = dispatch::plan_indexed(
            &vertex,
            &index,
            base_vertex,
            first_index,
            index_count,
            instance_count,
            self.config.vertex_bounds,
        ) else {
            return false;
        };
        self.submit(vertex, Some(index), base_vertex, range, instance_count)
    }

    pub fn draw(&mut self, first_vertex: u32, vertex_count: u32) -> bool {
        let Some(vertex) = self.draws.vertex() else {
            warn!("draw with no vertex buffer bound, skipping");
            return false;
        };
        let Some(range) = dispatch::plan_draw(&vertex, first_vertex, vertex_count) else {
            return false;
        };
        self.submit(vertex, None, 0, range, 1)
    }

    fn submit(
        &mut self,
        vertex: VertexBinding,
        index: Option<IndexBinding>,
        base_vertex: u32,
        range: DrawRange,
        instance_count: u32,
    ) -> bool {
        let id = match self.draws.pipeline() {
            Some(id) if self.slot(id).is_some() => id,
            Some(id) => {
                warn!("bound pipeline {id:?} no longer exists, using fallback");
                self.draws.clear_pipeline();
                self.default_pipeline
            }
            None => {
                debug!("draw with no pipeline bound, using fallback");
                self.default_pipeline
            }
        };
        let Some(slot) = self
            .pipelines
            .get_mut(id.index)
            .filter(|entry| entry.generation == id.generation)
            .and_then(|entry| entry.pipeline.as_mut())
        else {
            warn!("fallback pipeline missing, draw dropped");
            return false;
        };

        slot.uniforms.upload_if_dirty(&mut self.backend);
        let command = DrawCommand {
            pipeline: slot.handle,
            state: self.state.current_state(),
            topology: slot.topology,
            vertex_buffer: vertex.buffer,
            vertex_stride: vertex.stride,
            index: index.map(|binding| (binding.buffer, binding.format)),
            uniforms: slot.uniforms.buffer(),
            base_vertex,
            first: range.first,
            count: range.count,
            instance_count,
        };
        self.backend.submit(command);
        true
    }

    pub fn frame_clock(&self) -> FrameClock {
        self.clock.clone()
    }

    /// Fence satisfied once the current frame has been presented.
    pub fn create_fence(&self) -> FrameFence {
        self.clock.fence(self.config.fence_poll_interval())
    }

    /// Called by the presentation driver once per completed present.
    pub fn advance_frame(&self) -> u64 {
        self.clock.advance_frame()
    }

    pub fn end_frame(&mut self) {
        self.backend.end_frame();
    }

    fn slot(&self, id: PipelineId) -> Option<&PipelineSlot> {
        self.pipelines
            .get(id.index)
            .filter(|entry| entry.generation == id.generation)
            .and_then(|entry| entry.pipeline.as_ref())
    }

    fn slot_mut(&mut self, id: PipelineId) -> Option<&mut PipelineSlot> {
        self.pipelines
            .get_mut(id.index)
            .filter(|entry| entry.generation == id.generation)
            .and_then(|entry| entry.pipeline.as_mut())
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec4;

    use super::*;
    use crate::backend::{ElementFormat, ElementUsage, HeadlessBackend};

    fn device() -> Device {
        Device::new(HeadlessBackend::new(), BridgeConfig::default()).unwrap()
    }

    fn pipeline(device: &mut Device, name: &str, uniforms: &[(&str, &str)]) -> PipelineId {
        let program = device
            .create_program(ProgramDescriptor::wgsl(name, FALLBACK_SHADER))
            .unwrap();
        device
            .create_pipeline(PipelineDescriptor {
                name: name.to_string(),
                program,
                vertex_layout: VertexLayout::position(),
                topology: Topology::TriangleList,
                uniforms: uniforms
                    .iter()
                    .map(|(name, ty)| UniformDeclaration::new(*name, *ty))
                    .collect(),
            })
            .unwrap()
    }

    fn headless(device: &Device) -> &HeadlessBackend {
        device.backend().as_headless().unwrap()
    }

    #[test]
    fn construction_fails_when_the_fallback_cannot_be_built() {
        let mut backend = HeadlessBackend::new();
        backend.fail_next_creation();
        let err = Device::new(backend, BridgeConfig::default()).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidHandle { kind: "program", .. }));
    }

    #[test]
    fn programs_are_created_once_per_name() {
        let mut device = device();
        let first = device
            .create_program(ProgramDescriptor::wgsl("sky", FALLBACK_SHADER))
            .unwrap();
        let second = device
            .create_program(ProgramDescriptor::wgsl("sky", FALLBACK_SHADER))
            .unwrap();
        assert_eq!(first, second);
        // fallback + sky
        assert_eq!(headless(&device).program_count(), 2);
    }

    #[test]
    fn oversized_uniform_blocks_are_rejected() {
        let mut device = Device::new(
            HeadlessBackend::new(),
            BridgeConfig {
                max_uniform_buffer_size: 64,
                ..BridgeConfig::default()
            },
        )
        .unwrap();
        let program = device
            .create_program(ProgramDescriptor::wgsl("big", FALLBACK_SHADER))
            .unwrap();
        let err = device
            .create_pipeline(PipelineDescriptor {
                name: "big".to_string(),
                program,
                vertex_layout: VertexLayout::position(),
                topology: Topology::TriangleList,
                uniforms: vec![
                    UniformDeclaration::new("ModelViewMat", "mat4"),
                    UniformDeclaration::new("ColorModulator", "vec4"),
                ],
            })
            .unwrap_err();
        assert!(matches!(err, BridgeError::BufferTooLarge { size: 80, limit: 64, .. }));
    }

    #[test]
    fn unknown_uniform_types_fail_pipeline_creation() {
        let mut device = device();
        let program = device
            .create_program(ProgramDescriptor::wgsl("odd", FALLBACK_SHADER))
            .unwrap();
        let err = device
            .create_pipeline(PipelineDescriptor {
                name: "odd".to_string(),
                program,
                vertex_layout: VertexLayout::position(),
                topology: Topology::TriangleList,
                uniforms: vec![UniformDeclaration::new("Tex", "sampler2D")],
            })
            .unwrap_err();
        assert!(matches!(err, BridgeError::UnknownUniformType { .. }));
    }

    #[test]
    fn uniform_buffer_failure_releases_the_pipeline() {
        let mut device = device();
        let program = device
            .create_program(ProgramDescriptor::wgsl("lit", FALLBACK_SHADER))
            .unwrap();
        let pipelines_before = headless(&device).pipeline_count();

        // The pipeline is created, the uniform buffer after it is not.
        device
            .backend_mut()
            .as_headless_mut()
            .unwrap()
            .fail_creation_after(1);
        let err = device
            .create_pipeline(PipelineDescriptor {
                name: "lit".to_string(),
                program,
                vertex_layout: VertexLayout::position(),
                topology: Topology::TriangleList,
                uniforms: vec![UniformDeclaration::new("ColorModulator", "vec4")],
            })
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidHandle { kind: "buffer", .. }));
        assert_eq!(headless(&device).pipeline_count(), pipelines_before);
        assert_eq!(device.pipeline_count(), 1);
    }

    #[test]
    fn destroying_releases_backend_objects_and_unbinds() {
        let mut device = device();
        let id = pipeline(&mut device, "tinted", &[("ColorModulator", "vec4")]);
        device.register_variant("tinted", id);
        device.set_pipeline(id);
        assert_eq!(device.binding_state(), BindingState::PipelineBound(id));
        let buffers = headless(&device).buffer_count();

        device.destroy_pipeline(id).unwrap();
        assert_eq!(device.binding_state(), BindingState::Unbound);
        assert_eq!(headless(&device).buffer_count(), buffers - 1);
        assert!(device.pipeline_handle(id).is_none());
        assert_eq!(device.bind_shader("tinted", &[]), None);
        assert!(matches!(
            device.destroy_pipeline(id),
            Err(BridgeError::UnknownPipeline(missing)) if missing == id
        ));

        // The freed slot is reused under a new generation.
        let again = pipeline(&mut device, "again", &[]);
        assert_eq!(again.index(), id.index());
        assert_ne!(again, id);
    }

    #[test]
    fn stale_ids_do_not_reach_a_reused_slot() {
        let mut device = device();
        let old = pipeline(&mut device, "old", &[("ColorModulator", "vec4")]);
        device.destroy_pipeline(old).unwrap();
        let new = pipeline(&mut device, "new", &[("ColorModulator", "vec4")]);
        assert_eq!(new.index(), old.index());

        assert!(device.pipeline_handle(old).is_none());
        assert!(!device.set_uniform(old, "ColorModulator", UniformValue::Vec4(Vec4::ONE)));
        device.set_pipeline(old);
        assert_eq!(device.binding_state(), BindingState::Unbound);
        device.register_variant("old", old);
        assert_eq!(device.bind_shader("old", &[]), None);
        assert!(matches!(
            device.destroy_pipeline(old),
            Err(BridgeError::UnknownPipeline(_))
        ));
        assert!(device.pipeline_handle(new).is_some());
    }

    #[test]
    fn fallback_pipeline_cannot_be_destroyed() {
        let mut device = device();
        let fallback = device.default_pipeline();
        device.destroy_pipeline(fallback).unwrap();
        assert!(device.pipeline_handle(fallback).is_some());
    }

    #[test]
    fn unbound_draw_uses_the_fallback() {
        let mut device = device();
        let vertices = device
            .create_buffer(BufferKind::Vertex, "quad", &[0; 48])
            .unwrap();
        device.bind_vertex_buffer(vertices, 12);
        assert!(device.draw(0, 4));

        let fallback = device.pipeline_handle(device.default_pipeline()).unwrap();
        let draw = headless(&device).draws()[0];
        assert_eq!(draw.pipeline, fallback);
        assert_eq!(draw.topology, device.config().default_topology);
        assert_eq!(draw.count, 4);
        assert_eq!(draw.instance_count, 1);
        assert!(draw.index.is_none());
    }

    #[test]
    fn draws_without_buffers_are_skipped() {
        let mut device = device();
        assert!(!device.draw(0, 3));
        assert!(!device.draw_indexed(0, 0, 3, 1));

        let vertices = device
            .create_buffer(BufferKind::Vertex, "tri", &[0; 36])
            .unwrap();
        device.bind_vertex_buffer(vertices, 12);
        assert!(!device.draw_indexed(0, 0, 3, 1));
        assert!(headless(&device).draws().is_empty());
    }

    #[test]
    fn indexed_draw_is_clamped_to_the_index_buffer() {
        let mut device = device();
        let vertices = device
            .create_buffer(BufferKind::Vertex, "mesh", &[0; 12 * 8])
            .unwrap();
        let indices = device
            .create_buffer(BufferKind::Index, "mesh indices", &[0; 2 * 6])
            .unwrap();
        device.bind_vertex_buffer(vertices, 12);
        device.bind_index_buffer(indices, IndexFormat::U16);

        assert!(device.draw_indexed(2, 3, 10, 2));
        let draw = headless(&device).draws()[0];
        assert_eq!(draw.first, 3);
        assert_eq!(draw.count, 3);
        assert_eq!(draw.base_vertex, 2);
        assert_eq!(draw.instance_count, 2);
        assert_eq!(draw.index, Some((indices, IndexFormat::U16)));

        assert!(!device.draw_indexed(0, 6, 1, 1));
        assert_eq!(headless(&device).draws().len(), 1);
    }

    #[test]
    fn destroyed_buffers_are_unbound() {
        let mut device = device();
        let vertices = device
            .create_buffer(BufferKind::Vertex, "gone", &[0; 36])
            .unwrap();
        device.bind_vertex_buffer(vertices, 12);
        device.destroy_buffer(vertices);
        assert!(!device.draw(0, 3));

        device.bind_vertex_buffer(vertices, 12);
        assert!(!device.draw(0, 3));
    }

    #[test]
    fn dirty_uniforms_upload_once_before_the_draw() {
        let mut device = device();
        let id = pipeline(&mut device, "tinted", &[("ColorModulator", "vec4")]);
        device.set_pipeline(id);
        let vertices = device
            .create_buffer(BufferKind::Vertex, "tri", &[0; 36])
            .unwrap();
        device.bind_vertex_buffer(vertices, 12);

        assert!(device.set_uniform(id, "ColorModulator", UniformValue::Vec4(Vec4::ONE)));
        assert!(device.draw(0, 3));
        assert!(device.draw(0, 3));
        assert_eq!(device.uniforms(id).unwrap().upload_count(), 1);

        let buffer = device.uniforms(id).unwrap().buffer().unwrap();
        let recorded = headless(&device).buffer(buffer.raw()).unwrap();
        assert_eq!(&recorded.contents[..4], &1.0f32.to_le_bytes());
        assert_eq!(headless(&device).draws()[0].uniforms, Some(buffer));
    }

    #[test]
    fn each_draw_sees_the_uniforms_set_before_it() {
        let mut device = device();
        let id = pipeline(&mut device, "tinted", &[("ColorModulator", "vec4")]);
        device.set_pipeline(id);
        let vertices = device
            .create_buffer(BufferKind::Vertex, "tri", &[0; 36])
            .unwrap();
        device.bind_vertex_buffer(vertices, 12);

        let red = Vec4::new(1.0, 0.0, 0.0, 1.0);
        let blue = Vec4::new(0.0, 0.0, 1.0, 1.0);
        device.set_uniform(id, "ColorModulator", UniformValue::Vec4(red));
        assert!(device.draw(0, 3));
        device.set_uniform(id, "ColorModulator", UniformValue::Vec4(blue));
        assert!(device.draw(0, 3));

        let bytes = |color: Vec4| -> Vec<u8> {
            color.to_array().iter().flat_map(|c| c.to_le_bytes()).collect()
        };
        let backend = headless(&device);
        assert_eq!(&backend.draw_uniforms(0).unwrap()[..16], bytes(red).as_slice());
        assert_eq!(&backend.draw_uniforms(1).unwrap()[..16], bytes(blue).as_slice());
    }

    #[test]
    fn draws_carry_the_tracked_render_state() {
        let mut device = device();
        let vertices = device
            .create_buffer(BufferKind::Vertex, "tri", &[0; 36])
            .unwrap();
        device.bind_vertex_buffer(vertices, 12);
        device.state_mut().set_depth_test_enabled(true);
        device.draw(0, 3);
        assert_eq!(
            headless(&device).draws()[0].state,
            device.state().current_state()
        );
    }

    #[test]
    fn bind_shader_routes_through_the_variant_selector() {
        let mut device = device();
        let textured = pipeline(&mut device, "position_tex_color", &[]);
        let plain = pipeline(&mut device, "position_color", &[]);
        device.register_variant("position_tex_color", textured);
        device.register_variant("position_color", plain);

        let with_uv = [
            VertexElement::new(ElementUsage::Position, ElementFormat::Float32x3),
            VertexElement::new(ElementUsage::Uv(0), ElementFormat::Float32x2),
            VertexElement::new(ElementUsage::Color, ElementFormat::Unorm8x4),
        ];
        let without_uv = [
            VertexElement::new(ElementUsage::Position, ElementFormat::Float32x3),
            VertexElement::new(ElementUsage::Color, ElementFormat::Unorm8x4),
        ];

        assert_eq!(device.bind_shader("position", &with_uv), Some(textured));
        assert_eq!(device.bind_shader("position_tex_color", &without_uv), Some(plain));
        assert_eq!(device.binding_state(), BindingState::PipelineBound(plain));
        assert_eq!(device.bind_shader("rendertype_unknown", &with_uv), None);
        assert_eq!(device.binding_state(), BindingState::Unbound);
    }

    #[test]
    fn set_pipeline_ignores_unknown_ids() {
        let mut device = device();
        device.set_pipeline(PipelineId::from_index(42));
        assert_eq!(device.binding_state(), BindingState::Unbound);
    }

    #[test]
    fn fences_follow_the_device_clock() {
        let device = device();
        let fence = device.create_fence();
        assert!(!fence.await_completion(0));
        assert_eq!(device.advance_frame(), 1);
        assert!(fence.await_completion(0));
        assert_eq!(device.frame_clock().current(), 1);
    }
}
