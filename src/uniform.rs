//! Constant-buffer layout and staging.
//!
//! Legacy code uploads uniforms one call at a time by name. The backend
//! wants one contiguous block per pipeline with every vec3/vec4/mat slot on
//! a 16-byte boundary. [`UniformBufferLayout`] packs the declared names in
//! the order the shader declares them and [`UniformBuffer`] stages writes
//! on the CPU until the next draw uploads them.

use std::collections::HashMap;

use bytemuck::bytes_of;
use glam::{IVec2, IVec3, IVec4, Mat3, Mat4, Vec2, Vec3, Vec4};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::backend::{Backend, BufferHandle};
use crate::error::{BridgeError, Result};

const ALIGNMENT: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UniformType {
    Float,
    Int,
    Vec2,
    IVec2,
    Vec3,
    IVec3,
    Vec4,
    IVec4,
    Mat3,
    Mat4,
}

impl UniformType {
    /// Bytes the slot occupies. vec3 is padded to a full vec4 and mat3 to
    /// three vec4 columns.
    pub fn size(self) -> u32 {
        match self {
            UniformType::Float | UniformType::Int => 4,
            UniformType::Vec2 | UniformType::IVec2 => 8,
            UniformType::Vec3 | UniformType::IVec3 => 16,
            UniformType::Vec4 | UniformType::IVec4 => 16,
            UniformType::Mat3 => 48,
            UniformType::Mat4 => 64,
        }
    }

    pub fn requires_alignment(self) -> bool {
        matches!(
            self,
            UniformType::Vec3
                | UniformType::IVec3
                | UniformType::Vec4
                | UniformType::IVec4
                | UniformType::Mat3
                | UniformType::Mat4
        )
    }

    /// Parses the type names shader declarations use.
    pub fn from_glsl(name: &str) -> Option<Self> {
        let ty = match name {
            "float" => UniformType::Float,
            "int" => UniformType::Int,
            "vec2" => UniformType::Vec2,
            "ivec2" => UniformType::IVec2,
            "vec3" => UniformType::Vec3,
            "ivec3" => UniformType::IVec3,
            "vec4" => UniformType::Vec4,
            "ivec4" => UniformType::IVec4,
            "mat3" => UniformType::Mat3,
            "mat4" => UniformType::Mat4,
            _ => return None,
        };
        Some(ty)
    }
}

/// A typed value destined for one uniform slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Vec2(Vec2),
    IVec2(IVec2),
    Vec3(Vec3),
    IVec3(IVec3),
    Vec4(Vec4),
    IVec4(IVec4),
    Mat3(Mat3),
    Mat4(Mat4),
}

impl UniformValue {
    pub fn ty(&self) -> UniformType {
        match self {
            UniformValue::Float(_) => UniformType::Float,
            UniformValue::Int(_) => UniformType::Int,
            UniformValue::Vec2(_) => UniformType::Vec2,
            UniformValue::IVec2(_) => UniformType::IVec2,
            UniformValue::Vec3(_) => UniformType::Vec3,
            UniformValue::IVec3(_) => UniformType::IVec3,
            UniformValue::Vec4(_) => UniformType::Vec4,
            UniformValue::IVec4(_) => UniformType::IVec4,
            UniformValue::Mat3(_) => UniformType::Mat3,
            UniformValue::Mat4(_) => UniformType::Mat4,
        }
    }

    /// Writes the value into `slot`, which is exactly `ty().size()` long.
    fn write_into(&self, slot: &mut [u8]) {
        slot.fill(0);
        match self {
            UniformValue::Float(v) => slot[..4].copy_from_slice(bytes_of(v)),
            UniformValue::Int(v) => slot[..4].copy_from_slice(bytes_of(v)),
            UniformValue::Vec2(v) => slot[..8].copy_from_slice(bytes_of(v)),
            UniformValue::IVec2(v) => slot[..8].copy_from_slice(bytes_of(v)),
            UniformValue::Vec3(v) => slot[..12].copy_from_slice(bytes_of(v)),
            UniformValue::IVec3(v) => slot[..12].copy_from_slice(bytes_of(v)),
            UniformValue::Vec4(v) => slot[..16].copy_from_slice(bytes_of(v)),
            UniformValue::IVec4(v) => slot[..16].copy_from_slice(bytes_of(v)),
            UniformValue::Mat3(m) => {
                for (column, chunk) in m.to_cols_array_2d().iter().zip(slot.chunks_exact_mut(16)) {
                    chunk[..12].copy_from_slice(bytemuck::cast_slice(column));
                }
            }
            UniformValue::Mat4(m) => slot.copy_from_slice(bytemuck::cast_slice(&m.to_cols_array())),
        }
    }
}

/// A declared uniform as the shader compiler reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniformDeclaration {
    pub name: String,
    pub ty: String,
}

impl UniformDeclaration {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniformEntry {
    pub name: String,
    pub ty: UniformType,
    pub offset: u32,
    pub size: u32,
}

impl UniformEntry {
    pub fn end(&self) -> u32 {
        self.offset + self.size
    }
}

/// Ordered, non-overlapping slot assignment for a pipeline's uniforms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniformBufferLayout {
    entries: Vec<UniformEntry>,
    by_name: HashMap<String, usize>,
}

impl UniformBufferLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a layout from the compiler's declarations, in order.
    pub fn from_declarations(declarations: &[UniformDeclaration]) -> Result<Self> {
        let mut layout = Self::new();
        for declaration in declarations {
            let ty = UniformType::from_glsl(&declaration.ty).ok_or_else(|| {
                BridgeError::UnknownUniformType {
                    name: declaration.name.clone(),
                    ty: declaration.ty.clone(),
                }
            })?;
            layout.add_uniform(&declaration.name, ty);
        }
        Ok(layout)
    }

    /// Appends a slot after the last entry. Duplicate names are ignored with
    /// a warning and return `None`.
    pub fn add_uniform(&mut self, name: &str, ty: UniformType) -> Option<&UniformEntry> {
        if self.by_name.contains_key(name) {
            warn!("uniform '{name}' declared twice; keeping the first slot");
            return None;
        }
        let mut offset = self.entries.last().map_or(0, UniformEntry::end);
        if ty.requires_alignment() {
            offset = offset.next_multiple_of(ALIGNMENT);
        }
        self.by_name.insert(name.to_string(), self.entries.len());
        self.entries.push(UniformEntry {
            name: name.to_string(),
            ty,
            offset,
            size: ty.size(),
        });
        self.entries.last()
    }

    pub fn entries(&self) -> &[UniformEntry] {
        &self.entries
    }

    pub fn entry(&self, name: &str) -> Option<&UniformEntry> {
        self.by_name.get(name).map(|&index| &self.entries[index])
    }

    /// Total block size, rounded up to 16 bytes.
    pub fn size(&self) -> u32 {
        self.entries
            .last()
            .map_or(0, |entry| entry.end().next_multiple_of(ALIGNMENT))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// CPU staging copy of a pipeline's uniform block plus its GPU buffer.
#[derive(Debug, Clone)]
pub struct UniformBuffer {
    layout: UniformBufferLayout,
    staging: Vec<u8>,
    buffer: Option<BufferHandle>,
    dirty: bool,
    uploads: u64,
}

impl UniformBuffer {
    /// `buffer` may be `None` for pipelines with no uniforms.
    pub fn new(layout: UniformBufferLayout, buffer: Option<BufferHandle>) -> Self {
        let staging = vec![0; layout.size() as usize];
        Self {
            layout,
            staging,
            buffer,
            dirty: false,
            uploads: 0,
        }
    }

    pub fn layout(&self) -> &UniformBufferLayout {
        &self.layout
    }

    pub fn buffer(&self) -> Option<BufferHandle> {
        self.buffer
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn upload_count(&self) -> u64 {
        self.uploads
    }

    /// Stages `value` into the named slot. Returns `false` (keeping the old
    /// contents) when the name is unknown or the type does not match.
    pub fn set_value(&mut self, name: &str, value: UniformValue) -> bool {
        let Some(entry) = self.layout.entry(name) else {
            warn!("set_value on undeclared uniform '{name}' ignored");
            return false;
        };
        if entry.ty != value.ty() {
            warn!(
                "uniform '{name}' is {:?}, rejecting {:?} write",
                entry.ty,
                value.ty()
            );
            return false;
        }
        let range = entry.offset as usize..entry.end() as usize;
        value.write_into(&mut self.staging[range]);
        self.dirty = true;
        true
    }

    /// Copies raw bytes from an external supplier into the named slot.
    /// Never writes past the slot, however much the supplier offers.
    /// Returns the number of bytes copied.
    pub fn update_from_source(&mut self, name: &str, source: &[u8]) -> usize {
        let Some(entry) = self.layout.entry(name) else {
            warn!("update_from_source on undeclared uniform '{name}' ignored");
            return 0;
        };
        let len = source.len().min(entry.size as usize);
        let start = entry.offset as usize;
        self.staging[start..start + len].copy_from_slice(&source[..len]);
        if len > 0 {
            self.dirty = true;
        }
        len
    }

    /// Staged bytes for the named slot.
    pub fn value_bytes(&self, name: &str) -> Option<&[u8]> {
        let entry = self.layout.entry(name)?;
        Some(&self.staging[entry.offset as usize..entry.end() as usize])
    }

    pub fn staging(&self) -> &[u8] {
        &self.staging
    }

    /// Uploads the whole block if anything changed since the last upload.
    /// Returns whether an upload happened.
    pub fn upload_if_dirty(&mut self, backend: &mut Backend) -> bool {
        if !self.dirty {
            return false;
        }
        self.dirty = false;
        let Some(buffer) = self.buffer else {
            return false;
        };
        backend.write_buffer(buffer, 0, &self.staging);
        self.uploads += 1;
        true
    }
}
