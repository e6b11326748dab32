//! Shader variant selection.
//!
//! Legacy callers name a shader and hand over whatever vertex format they
//! happen to have. Compiled programs only exist for specific attribute
//! combinations, so the requested name is resolved against the attributes
//! actually present.

use std::borrow::Cow;

use bitflags::bitflags;
use log::{debug, warn};

use crate::backend::{ElementUsage, VertexElement};

bitflags! {
    /// Which vertex attributes a format provides.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AttributeFlags: u8 {
        const POSITION = 1 << 0;
        const COLOR = 1 << 1;
        const UV0 = 1 << 2;
        const UV1 = 1 << 3;
        const UV2 = 1 << 4;
        const NORMAL = 1 << 5;
    }
}

impl AttributeFlags {
    /// Classifies each element; padding and generic elements contribute
    /// nothing.
    pub fn from_elements(elements: &[VertexElement]) -> Self {
        elements
            .iter()
            .fold(AttributeFlags::empty(), |flags, element| {
                flags | Self::classify(element.usage)
            })
    }

    fn classify(usage: ElementUsage) -> Self {
        match usage {
            ElementUsage::Position => AttributeFlags::POSITION,
            ElementUsage::Color => AttributeFlags::COLOR,
            ElementUsage::Uv(0) => AttributeFlags::UV0,
            ElementUsage::Uv(1) => AttributeFlags::UV1,
            ElementUsage::Uv(2) => AttributeFlags::UV2,
            ElementUsage::Normal => AttributeFlags::NORMAL,
            ElementUsage::Uv(_) | ElementUsage::Padding | ElementUsage::Generic => {
                AttributeFlags::empty()
            }
        }
    }
}

/// Base name whose variants differ only in texcoord/color presence.
pub const POSITION_FAMILY: &str = "position";

/// Prefix of fully specialized render-type programs.
pub const RENDER_TYPE_PREFIX: &str = "rendertype_";

/// Programs that encode a fixed attribute combination in their name, with
/// the attributes they need and the variant to use when the primary
/// texcoord is missing.
const COMBINATIONS: &[(&str, AttributeFlags, &str)] = &[
    (
        "position_tex_color",
        AttributeFlags::POSITION.union(AttributeFlags::UV0).union(AttributeFlags::COLOR),
        "position_color",
    ),
    (
        "position_tex",
        AttributeFlags::POSITION.union(AttributeFlags::UV0),
        "position",
    ),
    (
        "position_color_tex_lightmap",
        AttributeFlags::POSITION
            .union(AttributeFlags::COLOR)
            .union(AttributeFlags::UV0)
            .union(AttributeFlags::UV2),
        "position_color_lightmap",
    ),
    (
        "position_tex_color_normal",
        AttributeFlags::POSITION
            .union(AttributeFlags::UV0)
            .union(AttributeFlags::COLOR)
            .union(AttributeFlags::NORMAL),
        "position_color_normal",
    ),
    (
        "position_color_lightmap",
        AttributeFlags::POSITION
            .union(AttributeFlags::COLOR)
            .union(AttributeFlags::UV2),
        "position_color",
    ),
    (
        "position_color_normal",
        AttributeFlags::POSITION
            .union(AttributeFlags::COLOR)
            .union(AttributeFlags::NORMAL),
        "position_color",
    ),
    (
        "position_color",
        AttributeFlags::POSITION.union(AttributeFlags::COLOR),
        "position",
    ),
];

/// Attributes the known render-type programs consume. Render types not
/// listed are only expected to have a position.
const RENDER_TYPES: &[(&str, AttributeFlags)] = &[
    (
        "rendertype_solid",
        AttributeFlags::POSITION
            .union(AttributeFlags::COLOR)
            .union(AttributeFlags::UV0)
            .union(AttributeFlags::UV2)
            .union(AttributeFlags::NORMAL),
    ),
    (
        "rendertype_cutout",
        AttributeFlags::POSITION
            .union(AttributeFlags::COLOR)
            .union(AttributeFlags::UV0)
            .union(AttributeFlags::UV2)
            .union(AttributeFlags::NORMAL),
    ),
    (
        "rendertype_translucent",
        AttributeFlags::POSITION
            .union(AttributeFlags::COLOR)
            .union(AttributeFlags::UV0)
            .union(AttributeFlags::UV2)
            .union(AttributeFlags::NORMAL),
    ),
    (
        "rendertype_entity_solid",
        AttributeFlags::POSITION
            .union(AttributeFlags::COLOR)
            .union(AttributeFlags::UV0)
            .union(AttributeFlags::UV1)
            .union(AttributeFlags::UV2)
            .union(AttributeFlags::NORMAL),
    ),
    (
        "rendertype_lines",
        AttributeFlags::POSITION
            .union(AttributeFlags::COLOR)
            .union(AttributeFlags::NORMAL),
    ),
    (
        "rendertype_gui",
        AttributeFlags::POSITION.union(AttributeFlags::COLOR),
    ),
    (
        "rendertype_text",
        AttributeFlags::POSITION
            .union(AttributeFlags::COLOR)
            .union(AttributeFlags::UV0)
            .union(AttributeFlags::UV2),
    ),
];

/// Resolves `name` to the compiled variant to bind for a vertex format
/// providing `flags`.
///
/// Pure: the same inputs always produce the same name. The only side effect
/// is logging downgrades and mismatches.
pub fn select_variant(name: &str, flags: AttributeFlags) -> Cow<'_, str> {
    if name == POSITION_FAMILY {
        let has_uv = flags.contains(AttributeFlags::UV0);
        let has_color = flags.contains(AttributeFlags::COLOR);
        let variant = match (has_uv, has_color) {
            (true, true) => "position_tex_color",
            (true, false) => "position_tex",
            (false, true) => "position_color",
            (false, false) => "position",
        };
        return Cow::Borrowed(variant);
    }

    if let Some((_, required, without_uv)) = COMBINATIONS.iter().find(|(n, _, _)| *n == name) {
        if flags.contains(*required) {
            return Cow::Borrowed(name);
        }
        if required.contains(AttributeFlags::UV0) && !flags.contains(AttributeFlags::UV0) {
            warn!("'{name}' needs a texcoord the format lacks, downgrading to '{without_uv}'");
            return Cow::Borrowed(*without_uv);
        }
        warn!(
            "'{name}' needs {:?} but the format provides {:?}; using it anyway",
            *required - flags,
            flags
        );
        return Cow::Borrowed(name);
    }

    if name.starts_with(RENDER_TYPE_PREFIX) {
        let required = RENDER_TYPES
            .iter()
            .find(|(n, _)| *n == name)
            .map_or(AttributeFlags::POSITION, |(_, required)| *required);
        if !flags.contains(required) {
            warn!(
                "render type '{name}' is missing {:?}; binding as requested",
                required - flags
            );
        }
        return Cow::Borrowed(name);
    }

    debug!("no variant rule for '{name}'");
    Cow::Borrowed(name)
}

/// Cache key for a resolved variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderVariantKey {
    pub base: String,
    pub flags: AttributeFlags,
}

impl ShaderVariantKey {
    pub fn new(base: impl Into<String>, elements: &[VertexElement]) -> Self {
        Self {
            base: base.into(),
            flags: AttributeFlags::from_elements(elements),
        }
    }

    pub fn resolve(&self) -> Cow<'_, str> {
        select_variant(&self.base, self.flags)
    }
}
