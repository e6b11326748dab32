//! Compatibility layer between legacy immediate-mode rendering calls and an
//! explicit, pipeline-based GPU backend.
//!
//! Callers keep issuing small state changes, per-name uniform writes and
//! loosely validated draws. The crate folds the state into a packed
//! [`RenderState`], lays uniforms out into aligned blocks, picks the shader
//! variant matching the vertex format, and checks every draw against the
//! buffers actually bound before handing it to a [`Backend`]. Frame fences
//! and frustum culling round out what a frame loop needs.
//!
//! Everything runs against the in-memory [`HeadlessBackend`] as well as
//! wgpu, so the crate stays testable without a GPU.

pub mod backend;
pub mod config;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod fence;
pub mod frustum;
pub mod logging;
pub mod registry;
pub mod state;
pub mod uniform;
pub mod variant;

pub use backend::{
    Backend, BufferHandle, BufferKind, DrawCommand, ElementFormat, ElementUsage, HeadlessBackend,
    IndexFormat, PipelineHandle, ProgramDescriptor, ProgramHandle, Topology, VertexElement,
    VertexLayout, WgpuBackend,
};
pub use config::{BridgeConfig, VertexBoundsPolicy};
pub use device::{Device, PipelineDescriptor, PipelineId};
pub use dispatch::{BindingState, DrawCallState};
pub use error::{BridgeError, Result};
pub use fence::{FrameClock, FrameFence};
pub use frustum::Frustum;
pub use logging::{init_logging, LoggingConfig};
pub use registry::HandleRegistry;
pub use state::{RenderState, StateTracker};
pub use uniform::{
    UniformBuffer, UniformBufferLayout, UniformDeclaration, UniformEntry, UniformType,
    UniformValue,
};
pub use variant::{select_variant, AttributeFlags, ShaderVariantKey};
