//! The native graphics backend seam.
//!
//! The backend kind is picked once when the [`Backend`] is built; every
//! call afterwards is a plain `match` over the variants.

mod common;
mod headless;
mod native;
mod shared;

pub use common::{
    BackendPipelineDescriptor, BufferDescriptor, BufferHandle, BufferKind, DrawCommand,
    ElementFormat, ElementUsage, IndexFormat, PipelineHandle, ProgramDescriptor, ProgramHandle,
    SequenceAllocator, Topology, VertexElement, VertexLayout,
};
pub use headless::{HeadlessBackend, RecordedBuffer};
pub use native::WgpuBackend;
pub(crate) use shared::FALLBACK_SHADER;

use crate::error::{BridgeError, Result};

#[derive(Debug)]
pub enum Backend {
    Headless(HeadlessBackend),
    Wgpu(WgpuBackend),
}

impl Backend {
    pub fn headless() -> Self {
        Backend::Headless(HeadlessBackend::new())
    }

    pub fn as_headless(&self) -> Option<&HeadlessBackend> {
        match self {
            Backend::Headless(backend) => Some(backend),
            Backend::Wgpu(_) => None,
        }
    }

    pub fn as_headless_mut(&mut self) -> Option<&mut HeadlessBackend> {
        match self {
            Backend::Headless(backend) => Some(backend),
            Backend::Wgpu(_) => None,
        }
    }

    pub fn as_wgpu_mut(&mut self) -> Option<&mut WgpuBackend> {
        match self {
            Backend::Wgpu(backend) => Some(backend),
            Backend::Headless(_) => None,
        }
    }

    pub fn create_buffer(&mut self, desc: &BufferDescriptor<'_>) -> Result<BufferHandle> {
        let raw = match self {
            Backend::Headless(backend) => backend.create_buffer(desc),
            Backend::Wgpu(backend) => backend.create_buffer(desc)?,
        };
        BufferHandle::from_raw(raw).ok_or_else(|| BridgeError::InvalidHandle {
            kind: "buffer",
            label: desc.label.to_string(),
        })
    }

    pub fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        match self {
            Backend::Headless(backend) => backend.write_buffer(buffer.raw(), offset, data),
            Backend::Wgpu(backend) => backend.write_buffer(buffer.raw(), offset, data),
        }
    }

    pub fn destroy_buffer(&mut self, buffer: BufferHandle) {
        match self {
            Backend::Headless(backend) => backend.destroy_buffer(buffer.raw()),
            Backend::Wgpu(backend) => backend.destroy_buffer(buffer.raw()),
        }
    }

    pub fn create_program(&mut self, desc: &ProgramDescriptor) -> Result<ProgramHandle> {
        let raw = match self {
            Backend::Headless(backend) => backend.create_program(desc),
            Backend::Wgpu(backend) => backend.create_program(desc)?,
        };
        ProgramHandle::from_raw(raw).ok_or_else(|| BridgeError::InvalidHandle {
            kind: "program",
            label: desc.name.clone(),
        })
    }

    pub fn create_pipeline(
        &mut self,
        desc: &BackendPipelineDescriptor,
    ) -> Result<PipelineHandle> {
        let raw = match self {
            Backend::Headless(backend) => backend.create_pipeline(desc),
            Backend::Wgpu(backend) => backend.create_pipeline(desc)?,
        };
        PipelineHandle::from_raw(raw).ok_or_else(|| BridgeError::InvalidHandle {
            kind: "pipeline",
            label: desc.label.clone(),
        })
    }

    pub fn destroy_pipeline(&mut self, pipeline: PipelineHandle) {
        match self {
            Backend::Headless(backend) => backend.destroy_pipeline(pipeline.raw()),
            Backend::Wgpu(backend) => backend.destroy_pipeline(pipeline.raw()),
        }
    }

    /// Queues a draw. Submission cannot be cancelled.
    pub fn submit(&mut self, command: DrawCommand) {
        match self {
            Backend::Headless(backend) => backend.submit(command),
            Backend::Wgpu(backend) => backend.submit(command),
        }
    }

    pub fn end_frame(&mut self) {
        match self {
            Backend::Headless(backend) => backend.end_frame(),
            Backend::Wgpu(backend) => backend.end_frame(),
        }
    }
}

impl From<HeadlessBackend> for Backend {
    fn from(backend: HeadlessBackend) -> Self {
        Backend::Headless(backend)
    }
}

impl From<WgpuBackend> for Backend {
    fn from(backend: WgpuBackend) -> Self {
        Backend::Wgpu(backend)
    }
}
