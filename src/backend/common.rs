use std::borrow::Cow;
use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use crate::state::RenderState;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(NonZeroU32);

        impl $name {
            /// Wraps a raw backend id. Zero is the null handle.
            pub fn from_raw(raw: u32) -> Option<Self> {
                NonZeroU32::new(raw).map(Self)
            }

            pub fn raw(self) -> u32 {
                self.0.get()
            }
        }
    };
}

handle!(
    /// Opaque GPU buffer owned by the backend.
    BufferHandle
);
handle!(
    /// Opaque compiled shader program owned by the backend.
    ProgramHandle
);
handle!(
    /// Opaque pipeline owned by the backend.
    PipelineHandle
);

/// Monotonic id source. Zero is never handed out.
#[derive(Debug, Clone)]
pub struct SequenceAllocator {
    next: u32,
}

impl SequenceAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    #[cfg(test)]
    pub(crate) fn starting_at(next: u32) -> Self {
        Self { next: next.max(1) }
    }

    pub fn next_id(&mut self) -> u32 {
        let id = self.next;
        self.next = self.next.wrapping_add(1).max(1);
        id
    }

    /// Next id for which `in_use` is false. After wrapping, ids still held
    /// by live objects are skipped. Returns zero once every id is taken.
    pub fn next_free(&mut self, in_use: impl Fn(u32) -> bool) -> u32 {
        for _ in 0..u32::MAX {
            let id = self.next_id();
            if !in_use(id) {
                return id;
            }
        }
        0
    }
}

impl Default for SequenceAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BufferKind {
    Vertex,
    Index,
    Uniform,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferDescriptor<'a> {
    pub label: &'a str,
    pub kind: BufferKind,
    pub size: u64,
}

/// Shader program source handed to the backend for compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramDescriptor {
    pub name: String,
    pub source: Cow<'static, str>,
    pub vertex_entry: Cow<'static, str>,
    pub fragment_entry: Cow<'static, str>,
}

impl ProgramDescriptor {
    pub fn wgsl(name: impl Into<String>, source: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            vertex_entry: Cow::Borrowed("vs_main"),
            fragment_entry: Cow::Borrowed("fs_main"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
}

impl Topology {
    pub fn from_name(name: &str) -> Option<Self> {
        let topology = match name.to_ascii_lowercase().as_str() {
            "point_list" | "points" => Topology::PointList,
            "line_list" | "lines" => Topology::LineList,
            "line_strip" => Topology::LineStrip,
            "triangle_list" | "triangles" => Topology::TriangleList,
            "triangle_strip" => Topology::TriangleStrip,
            _ => return None,
        };
        Some(topology)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexFormat {
    U16,
    U32,
}

impl IndexFormat {
    /// Bytes per index.
    pub fn width(self) -> u64 {
        match self {
            IndexFormat::U16 => 2,
            IndexFormat::U32 => 4,
        }
    }
}

/// What a vertex element carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementUsage {
    Position,
    Color,
    /// Texture coordinate set: 0 primary, 1 overlay, 2 secondary (lightmap).
    Uv(u8),
    Normal,
    Padding,
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementFormat {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
    Unorm8x4,
    Snorm8x4,
    Sint16x2,
    Uint16x2,
    Uint8,
}

impl ElementFormat {
    pub fn size(self) -> u32 {
        match self {
            ElementFormat::Float32 => 4,
            ElementFormat::Float32x2 => 8,
            ElementFormat::Float32x3 => 12,
            ElementFormat::Float32x4 => 16,
            ElementFormat::Unorm8x4 => 4,
            ElementFormat::Snorm8x4 => 4,
            ElementFormat::Sint16x2 => 4,
            ElementFormat::Uint16x2 => 4,
            ElementFormat::Uint8 => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VertexElement {
    pub usage: ElementUsage,
    pub format: ElementFormat,
}

impl VertexElement {
    pub const fn new(usage: ElementUsage, format: ElementFormat) -> Self {
        Self { usage, format }
    }
}

/// Interleaved vertex layout, elements in buffer order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct VertexLayout {
    pub elements: Vec<VertexElement>,
}

impl VertexLayout {
    pub fn new(elements: Vec<VertexElement>) -> Self {
        Self { elements }
    }

    pub fn position() -> Self {
        Self::new(vec![VertexElement::new(
            ElementUsage::Position,
            ElementFormat::Float32x3,
        )])
    }

    /// Bytes between consecutive vertices.
    pub fn stride(&self) -> u32 {
        self.elements.iter().map(|e| e.format.size()).sum()
    }

    /// Elements paired with their byte offset inside a vertex.
    pub fn offsets(&self) -> impl Iterator<Item = (u32, &VertexElement)> + '_ {
        self.elements.iter().scan(0u32, |offset, element| {
            let current = *offset;
            *offset += element.format.size();
            Some((current, element))
        })
    }
}

/// Pipeline creation request as the backend sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendPipelineDescriptor {
    pub label: String,
    pub program: ProgramHandle,
    pub vertex_layout: VertexLayout,
    pub topology: Topology,
    /// Size of the pipeline's uniform block, zero when it has none.
    pub uniform_size: u64,
}

/// A fully resolved draw. Everything the backend needs is inline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCommand {
    pub pipeline: PipelineHandle,
    pub state: RenderState,
    pub topology: Topology,
    pub vertex_buffer: BufferHandle,
    pub vertex_stride: u32,
    pub index: Option<(BufferHandle, IndexFormat)>,
    pub uniforms: Option<BufferHandle>,
    pub base_vertex: u32,
    /// First index for indexed draws, first vertex otherwise.
    pub first: u32,
    pub count: u32,
    pub instance_count: u32,
}
