use std::collections::HashMap;

use log::{debug, warn};

use super::common::{
    BackendPipelineDescriptor, BufferDescriptor, BufferKind, DrawCommand, ProgramDescriptor,
    SequenceAllocator,
};

/// CPU-side copy of a buffer the headless backend was asked to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedBuffer {
    pub label: String,
    pub kind: BufferKind,
    pub contents: Vec<u8>,
    pub writes: u64,
}

/// Backend that keeps everything in memory and records what it is asked to
/// do. Used without a GPU and for inspecting submissions.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    ids: SequenceAllocator,
    buffers: HashMap<u32, RecordedBuffer>,
    programs: HashMap<u32, String>,
    pipelines: HashMap<u32, BackendPipelineDescriptor>,
    draws: Vec<DrawCommand>,
    draw_uniforms: Vec<Option<Vec<u8>>>,
    frames: u64,
    fail_in: Option<u32>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next resource creation hand back the null handle.
    pub fn fail_next_creation(&mut self) {
        self.fail_creation_after(0);
    }

    /// Lets `successes` creations through, then fails the one after.
    pub fn fail_creation_after(&mut self, successes: u32) {
        self.fail_in = Some(successes);
    }

    pub fn buffer(&self, raw: u32) -> Option<&RecordedBuffer> {
        self.buffers.get(&raw)
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn program_name(&self, raw: u32) -> Option<&str> {
        self.programs.get(&raw).map(String::as_str)
    }

    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    pub fn pipeline(&self, raw: u32) -> Option<&BackendPipelineDescriptor> {
        self.pipelines.get(&raw)
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Draws submitted since the last [`take_draws`](Self::take_draws).
    pub fn draws(&self) -> &[DrawCommand] {
        &self.draws
    }

    /// Uniform block contents the `index`-th recorded draw was submitted
    /// with.
    pub fn draw_uniforms(&self, index: usize) -> Option<&[u8]> {
        self.draw_uniforms.get(index)?.as_deref()
    }

    pub fn take_draws(&mut self) -> Vec<DrawCommand> {
        self.draw_uniforms.clear();
        std::mem::take(&mut self.draws)
    }

    pub fn frames_ended(&self) -> u64 {
        self.frames
    }

    fn allocate(&mut self) -> u32 {
        match self.fail_in {
            Some(0) => {
                self.fail_in = None;
                0
            }
            Some(remaining) => {
                self.fail_in = Some(remaining - 1);
                self.fresh_id()
            }
            None => self.fresh_id(),
        }
    }

    fn fresh_id(&mut self) -> u32 {
        let (buffers, programs, pipelines) = (&self.buffers, &self.programs, &self.pipelines);
        self.ids.next_free(|id| {
            buffers.contains_key(&id) || programs.contains_key(&id) || pipelines.contains_key(&id)
        })
    }

    pub(crate) fn create_buffer(&mut self, desc: &BufferDescriptor<'_>) -> u32 {
        let id = self.allocate();
        if id != 0 {
            self.buffers.insert(
                id,
                RecordedBuffer {
                    label: desc.label.to_string(),
                    kind: desc.kind,
                    contents: vec![0; desc.size as usize],
                    writes: 0,
                },
            );
        }
        id
    }

    pub(crate) fn write_buffer(&mut self, raw: u32, offset: u64, data: &[u8]) {
        let Some(buffer) = self.buffers.get_mut(&raw) else {
            warn!("write to unknown buffer {raw} ignored");
            return;
        };
        let start = (offset as usize).min(buffer.contents.len());
        let end = start.saturating_add(data.len()).min(buffer.contents.len());
        if end - start < data.len() {
            warn!(
                "write of {} bytes at {offset} clipped to {} for buffer '{}'",
                data.len(),
                end - start,
                buffer.label
            );
        }
        buffer.contents[start..end].copy_from_slice(&data[..end - start]);
        buffer.writes += 1;
    }

    pub(crate) fn destroy_buffer(&mut self, raw: u32) {
        self.buffers.remove(&raw);
    }

    pub(crate) fn create_program(&mut self, desc: &ProgramDescriptor) -> u32 {
        let id = self.allocate();
        if id != 0 {
            self.programs.insert(id, desc.name.clone());
        }
        id
    }

    pub(crate) fn create_pipeline(&mut self, desc: &BackendPipelineDescriptor) -> u32 {
        let id = self.allocate();
        if id != 0 {
            self.pipelines.insert(id, desc.clone());
        }
        id
    }

    pub(crate) fn destroy_pipeline(&mut self, raw: u32) {
        self.pipelines.remove(&raw);
    }

    /// Records the draw along with a copy of its uniform block as it is
    /// right now; later writes do not change what this draw saw.
    pub(crate) fn submit(&mut self, command: DrawCommand) {
        let snapshot = command
            .uniforms
            .and_then(|buffer| self.buffers.get(&buffer.raw()))
            .map(|buffer| buffer.contents.clone());
        self.draw_uniforms.push(snapshot);
        self.draws.push(command);
    }

    pub(crate) fn end_frame(&mut self) {
        self.frames += 1;
        debug!("headless frame {} ended with {} draws", self.frames, self.draws.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_past_the_end_are_clipped() {
        let mut backend = HeadlessBackend::new();
        let id = backend.create_buffer(&BufferDescriptor {
            label: "tiny",
            kind: BufferKind::Vertex,
            size: 4,
        });
        backend.write_buffer(id, 2, &[1, 2, 3, 4]);
        assert_eq!(backend.buffer(id).unwrap().contents, vec![0, 0, 1, 2]);
    }

    #[test]
    fn failing_creation_returns_null_once() {
        let mut backend = HeadlessBackend::new();
        backend.fail_next_creation();
        let desc = BufferDescriptor {
            label: "x",
            kind: BufferKind::Index,
            size: 8,
        };
        assert_eq!(backend.create_buffer(&desc), 0);
        assert_ne!(backend.create_buffer(&desc), 0);
        assert_eq!(backend.buffer_count(), 1);
    }

    #[test]
    fn wrapped_ids_do_not_alias_live_objects() {
        let mut backend = HeadlessBackend::new();
        let desc = BufferDescriptor {
            label: "long-lived",
            kind: BufferKind::Vertex,
            size: 4,
        };
        let first = backend.create_buffer(&desc);
        assert_eq!(first, 1);

        backend.ids = SequenceAllocator::starting_at(u32::MAX);
        assert_eq!(backend.create_buffer(&desc), u32::MAX);
        let wrapped = backend.create_buffer(&desc);
        assert_eq!(wrapped, 2);
        assert_eq!(backend.buffer_count(), 3);
    }
}
