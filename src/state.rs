//! Legacy render-state tracking.
//!
//! Immediate-mode code flips global toggles (`glEnable(GL_DEPTH_TEST)`,
//! `glBlendFunc`, `glColorMask`, ...) one call at a time. The explicit
//! backend instead wants a single packed [`RenderState`] per draw. The
//! [`StateTracker`] keeps the legacy components and re-packs them only
//! when a setter actually changes something.

use std::fmt;

use bitflags::bitflags;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Raw enum values accepted by the legacy setters.
pub mod gl {
    pub const NEVER: u32 = 0x0200;
    pub const LESS: u32 = 0x0201;
    pub const EQUAL: u32 = 0x0202;
    pub const LEQUAL: u32 = 0x0203;
    pub const GREATER: u32 = 0x0204;
    pub const NOTEQUAL: u32 = 0x0205;
    pub const GEQUAL: u32 = 0x0206;
    pub const ALWAYS: u32 = 0x0207;

    pub const ZERO: u32 = 0;
    pub const ONE: u32 = 1;
    pub const SRC_COLOR: u32 = 0x0300;
    pub const ONE_MINUS_SRC_COLOR: u32 = 0x0301;
    pub const SRC_ALPHA: u32 = 0x0302;
    pub const ONE_MINUS_SRC_ALPHA: u32 = 0x0303;
    pub const DST_ALPHA: u32 = 0x0304;
    pub const ONE_MINUS_DST_ALPHA: u32 = 0x0305;
    pub const DST_COLOR: u32 = 0x0306;
    pub const ONE_MINUS_DST_COLOR: u32 = 0x0307;
    pub const SRC_ALPHA_SATURATE: u32 = 0x0308;

    pub const FRONT: u32 = 0x0404;
    pub const BACK: u32 = 0x0405;
    pub const FRONT_AND_BACK: u32 = 0x0408;
}

/// Depth comparison understood by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DepthCompare {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

impl DepthCompare {
    const ALL: [DepthCompare; 8] = [
        DepthCompare::Never,
        DepthCompare::Less,
        DepthCompare::Equal,
        DepthCompare::LessEqual,
        DepthCompare::Greater,
        DepthCompare::NotEqual,
        DepthCompare::GreaterEqual,
        DepthCompare::Always,
    ];

    /// Translates a legacy comparison enum. Unknown values fall back to
    /// `LessEqual` with a warning.
    pub fn from_gl(value: u32) -> Self {
        match value {
            gl::NEVER => DepthCompare::Never,
            gl::LESS => DepthCompare::Less,
            gl::EQUAL => DepthCompare::Equal,
            gl::LEQUAL => DepthCompare::LessEqual,
            gl::GREATER => DepthCompare::Greater,
            gl::NOTEQUAL => DepthCompare::NotEqual,
            gl::GEQUAL => DepthCompare::GreaterEqual,
            gl::ALWAYS => DepthCompare::Always,
            other => {
                warn!("unknown depth function 0x{other:04X}, using LessEqual");
                DepthCompare::LessEqual
            }
        }
    }

    fn code(self) -> u64 {
        self as u64 + 1
    }

    fn from_code(code: u64) -> Option<Self> {
        Self::ALL.get(code.checked_sub(1)? as usize).copied()
    }
}

/// Blend factor understood by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    InvSrcColor,
    SrcAlpha,
    InvSrcAlpha,
    DstAlpha,
    InvDstAlpha,
    DstColor,
    InvDstColor,
    SrcAlphaSaturate,
}

impl BlendFactor {
    const ALL: [BlendFactor; 11] = [
        BlendFactor::Zero,
        BlendFactor::One,
        BlendFactor::SrcColor,
        BlendFactor::InvSrcColor,
        BlendFactor::SrcAlpha,
        BlendFactor::InvSrcAlpha,
        BlendFactor::DstAlpha,
        BlendFactor::InvDstAlpha,
        BlendFactor::DstColor,
        BlendFactor::InvDstColor,
        BlendFactor::SrcAlphaSaturate,
    ];

    /// Translates a legacy blend factor. Unknown values (including the
    /// constant-color factors the backend has no slot for) fall back to
    /// `One` with a warning.
    pub fn from_gl(value: u32) -> Self {
        match value {
            gl::ZERO => BlendFactor::Zero,
            gl::ONE => BlendFactor::One,
            gl::SRC_COLOR => BlendFactor::SrcColor,
            gl::ONE_MINUS_SRC_COLOR => BlendFactor::InvSrcColor,
            gl::SRC_ALPHA => BlendFactor::SrcAlpha,
            gl::ONE_MINUS_SRC_ALPHA => BlendFactor::InvSrcAlpha,
            gl::DST_ALPHA => BlendFactor::DstAlpha,
            gl::ONE_MINUS_DST_ALPHA => BlendFactor::InvDstAlpha,
            gl::DST_COLOR => BlendFactor::DstColor,
            gl::ONE_MINUS_DST_COLOR => BlendFactor::InvDstColor,
            gl::SRC_ALPHA_SATURATE => BlendFactor::SrcAlphaSaturate,
            other => {
                warn!("unknown blend factor 0x{other:04X}, using One");
                BlendFactor::One
            }
        }
    }

    fn code(self) -> u64 {
        self as u64 + 1
    }

    fn from_code(code: u64) -> Option<Self> {
        Self::ALL.get(code.checked_sub(1)? as usize).copied()
    }
}

/// Separate RGB/alpha blend function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlendFunc {
    pub src_rgb: BlendFactor,
    pub dst_rgb: BlendFactor,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
}

impl Default for BlendFunc {
    fn default() -> Self {
        Self {
            src_rgb: BlendFactor::One,
            dst_rgb: BlendFactor::Zero,
            src_alpha: BlendFactor::One,
            dst_alpha: BlendFactor::Zero,
        }
    }
}

/// Legacy face selection for culling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CullFace {
    Front,
    Back,
    /// Has no single-flag equivalent; packs as "culling disabled".
    FrontAndBack,
}

impl CullFace {
    /// Unknown values fall back to `Back` with a warning.
    pub fn from_gl(value: u32) -> Self {
        match value {
            gl::FRONT => CullFace::Front,
            gl::BACK => CullFace::Back,
            gl::FRONT_AND_BACK => CullFace::FrontAndBack,
            other => {
                warn!("unknown cull face 0x{other:04X}, using Back");
                CullFace::Back
            }
        }
    }
}

/// Winding the backend culls. Front faces wind counter-clockwise, so
/// culling back faces means culling clockwise triangles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CullWinding {
    Cw,
    Ccw,
}

bitflags! {
    /// Per-channel color write enables.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ColorMask: u8 {
        const R = 0b0001;
        const G = 0b0010;
        const B = 0b0100;
        const A = 0b1000;
        const ALL = Self::R.bits() | Self::G.bits() | Self::B.bits() | Self::A.bits();
    }
}

impl ColorMask {
    pub fn from_channels(r: bool, g: bool, b: bool, a: bool) -> Self {
        let mut mask = ColorMask::empty();
        mask.set(ColorMask::R, r);
        mask.set(ColorMask::G, g);
        mask.set(ColorMask::B, b);
        mask.set(ColorMask::A, a);
        mask
    }
}

/// Packed render state handed to the backend with every draw.
///
/// Layout (low to high bits): RGBAZ write enables, 4-bit depth compare,
/// four 4-bit blend factors, 2-bit cull winding. A zero field means the
/// feature is off.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RenderState(u64);

impl RenderState {
    pub const WRITE_R: u64 = 1 << 0;
    pub const WRITE_G: u64 = 1 << 1;
    pub const WRITE_B: u64 = 1 << 2;
    pub const WRITE_A: u64 = 1 << 3;
    pub const WRITE_Z: u64 = 1 << 4;
    pub const WRITE_RGB: u64 = Self::WRITE_R | Self::WRITE_G | Self::WRITE_B;
    pub const WRITE_MASK: u64 = Self::WRITE_RGB | Self::WRITE_A | Self::WRITE_Z;

    const DEPTH_SHIFT: u32 = 5;
    pub const DEPTH_TEST_MASK: u64 = 0xF << Self::DEPTH_SHIFT;

    const BLEND_SHIFT: u32 = 9;
    pub const BLEND_MASK: u64 = 0xFFFF << Self::BLEND_SHIFT;

    const CULL_SHIFT: u32 = 25;
    pub const CULL_CW: u64 = 1 << Self::CULL_SHIFT;
    pub const CULL_CCW: u64 = 2 << Self::CULL_SHIFT;
    pub const CULL_MASK: u64 = 0x3 << Self::CULL_SHIFT;

    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    /// The bits enabling a depth test with `compare`.
    pub fn depth_test(compare: DepthCompare) -> u64 {
        compare.code() << Self::DEPTH_SHIFT
    }

    /// The bits enabling blending with `func`.
    pub fn blend(func: BlendFunc) -> u64 {
        let packed = func.src_rgb.code()
            | (func.dst_rgb.code() << 4)
            | (func.src_alpha.code() << 8)
            | (func.dst_alpha.code() << 12);
        packed << Self::BLEND_SHIFT
    }

    pub fn color_writes(self) -> ColorMask {
        ColorMask::from_bits_truncate((self.0 & (Self::WRITE_RGB | Self::WRITE_A)) as u8)
    }

    pub fn depth_write(self) -> bool {
        self.0 & Self::WRITE_Z != 0
    }

    pub fn depth_compare(self) -> Option<DepthCompare> {
        DepthCompare::from_code((self.0 & Self::DEPTH_TEST_MASK) >> Self::DEPTH_SHIFT)
    }

    pub fn blend_func(self) -> Option<BlendFunc> {
        let packed = (self.0 & Self::BLEND_MASK) >> Self::BLEND_SHIFT;
        if packed == 0 {
            return None;
        }
        Some(BlendFunc {
            src_rgb: BlendFactor::from_code(packed & 0xF)?,
            dst_rgb: BlendFactor::from_code((packed >> 4) & 0xF)?,
            src_alpha: BlendFactor::from_code((packed >> 8) & 0xF)?,
            dst_alpha: BlendFactor::from_code((packed >> 12) & 0xF)?,
        })
    }

    pub fn cull(self) -> Option<CullWinding> {
        match self.0 & Self::CULL_MASK {
            Self::CULL_CW => Some(CullWinding::Cw),
            Self::CULL_CCW => Some(CullWinding::Ccw),
            _ => None,
        }
    }
}

impl fmt::Debug for RenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RenderState(0x{:08X}: {self})", self.0)
    }
}

impl fmt::Display for RenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let writes = self.color_writes();
        for (flag, name) in [
            (ColorMask::R, 'R'),
            (ColorMask::G, 'G'),
            (ColorMask::B, 'B'),
            (ColorMask::A, 'A'),
        ] {
            if writes.contains(flag) {
                write!(f, "{name}")?;
            }
        }
        if self.depth_write() {
            write!(f, "Z")?;
        }
        if let Some(compare) = self.depth_compare() {
            write!(f, " depth={compare:?}")?;
        }
        if let Some(blend) = self.blend_func() {
            write!(
                f,
                " blend=({:?},{:?},{:?},{:?})",
                blend.src_rgb, blend.dst_rgb, blend.src_alpha, blend.dst_alpha
            )?;
        }
        if let Some(cull) = self.cull() {
            write!(f, " cull={cull:?}")?;
        }
        Ok(())
    }
}

/// Every legacy input the packed state is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateComponents {
    pub depth_test: bool,
    pub depth_func: DepthCompare,
    pub depth_write: bool,
    pub blend: bool,
    pub blend_func: BlendFunc,
    pub cull: bool,
    pub cull_face: CullFace,
    pub color_mask: ColorMask,
}

impl Default for StateComponents {
    fn default() -> Self {
        Self {
            depth_test: false,
            depth_func: DepthCompare::Less,
            depth_write: true,
            blend: false,
            blend_func: BlendFunc::default(),
            cull: false,
            cull_face: CullFace::Back,
            color_mask: ColorMask::ALL,
        }
    }
}

impl StateComponents {
    /// Packs the components. Identical components always give the same state.
    pub fn pack(&self) -> RenderState {
        let mut bits = 0u64;

        if self.color_mask.contains(ColorMask::R) {
            bits |= RenderState::WRITE_R;
        }
        if self.color_mask.contains(ColorMask::G) {
            bits |= RenderState::WRITE_G;
        }
        if self.color_mask.contains(ColorMask::B) {
            bits |= RenderState::WRITE_B;
        }
        if self.color_mask.contains(ColorMask::A) {
            bits |= RenderState::WRITE_A;
        }
        if self.depth_write {
            bits |= RenderState::WRITE_Z;
        }

        if self.depth_test {
            bits |= RenderState::depth_test(self.depth_func);
        }

        if self.blend {
            bits |= RenderState::blend(self.blend_func);
        }

        if self.cull {
            bits |= match self.cull_face {
                CullFace::Back => RenderState::CULL_CW,
                CullFace::Front => RenderState::CULL_CCW,
                // Lossy: no single winding culls both, so nothing is culled.
                CullFace::FrontAndBack => 0,
            };
        }

        RenderState(bits)
    }
}

/// Translates legacy state toggles into a packed [`RenderState`].
///
/// Lives on the render thread; no setter can fail.
#[derive(Debug)]
pub struct StateTracker {
    components: StateComponents,
    current: RenderState,
    stack: Vec<StateComponents>,
    rebuilds: u64,
}

impl StateTracker {
    pub fn new() -> Self {
        let components = StateComponents::default();
        Self {
            components,
            current: components.pack(),
            stack: Vec::new(),
            rebuilds: 0,
        }
    }

    pub fn set_depth_test_enabled(&mut self, enabled: bool) {
        self.update(|c| c.depth_test = enabled);
    }

    pub fn set_depth_func(&mut self, func: u32) {
        let func = DepthCompare::from_gl(func);
        self.update(|c| c.depth_func = func);
    }

    pub fn set_depth_write_enabled(&mut self, enabled: bool) {
        self.update(|c| c.depth_write = enabled);
    }

    pub fn set_blend_enabled(&mut self, enabled: bool) {
        self.update(|c| c.blend = enabled);
    }

    /// Same factors for RGB and alpha.
    pub fn set_blend_func(&mut self, src: u32, dst: u32) {
        self.set_blend_func_separate(src, dst, src, dst);
    }

    pub fn set_blend_func_separate(
        &mut self,
        src_rgb: u32,
        dst_rgb: u32,
        src_alpha: u32,
        dst_alpha: u32,
    ) {
        let func = BlendFunc {
            src_rgb: BlendFactor::from_gl(src_rgb),
            dst_rgb: BlendFactor::from_gl(dst_rgb),
            src_alpha: BlendFactor::from_gl(src_alpha),
            dst_alpha: BlendFactor::from_gl(dst_alpha),
        };
        self.update(|c| c.blend_func = func);
    }

    pub fn set_cull_face_enabled(&mut self, enabled: bool) {
        self.update(|c| c.cull = enabled);
    }

    pub fn set_cull_mode(&mut self, mode: u32) {
        let face = CullFace::from_gl(mode);
        if face == CullFace::FrontAndBack {
            debug!("cull mode FRONT_AND_BACK packs as culling disabled");
        }
        self.update(|c| c.cull_face = face);
    }

    pub fn set_color_mask(&mut self, r: bool, g: bool, b: bool, a: bool) {
        let mask = ColorMask::from_channels(r, g, b, a);
        self.update(|c| c.color_mask = mask);
    }

    pub fn current_state(&self) -> RenderState {
        self.current
    }

    pub fn components(&self) -> &StateComponents {
        &self.components
    }

    /// Restores every component to its default and drops saved states.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.apply(StateComponents::default());
    }

    /// Saves the current components.
    pub fn push_state(&mut self) {
        self.stack.push(self.components);
    }

    /// Restores the most recently pushed components.
    pub fn pop_state(&mut self) {
        match self.stack.pop() {
            Some(saved) => self.apply(saved),
            None => warn!("pop_state called with an empty state stack"),
        }
    }

    /// How many times the packed state has been recomputed.
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }

    fn apply(&mut self, components: StateComponents) {
        if components != self.components {
            self.components = components;
            self.rebuild();
        }
    }

    fn update<F>(&mut self, mutate: F)
    where
        F: FnOnce(&mut StateComponents),
    {
        let mut next = self.components;
        mutate(&mut next);
        self.apply(next);
    }

    fn rebuild(&mut self) {
        self.current = self.components.pack();
        self.rebuilds += 1;
    }
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}
