//! Draw-call validation.
//!
//! Legacy callers hand over ranges that were valid against whatever buffer
//! they believed was bound. Before anything reaches the backend the ranges
//! are checked against the buffers actually bound:
//!
//! * index ranges are enforced. An overrun there reads past the end of a
//!   GPU allocation, so the count is clamped or the draw dropped.
//! * vertex ranges for indexed draws can only be estimated from the index
//!   range, and pooled vertex buffers make that estimate a frequent false
//!   positive, so it is reported and nothing more.
//! * vertex ranges for non-indexed draws are exact and enforced like
//!   indices.

use log::{debug, warn};

use crate::{
    backend::{BufferHandle, IndexFormat},
    config::VertexBoundsPolicy,
    device::PipelineId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexBinding {
    pub buffer: BufferHandle,
    pub size: u64,
    pub stride: u32,
}

impl VertexBinding {
    /// Whole vertices that fit in the buffer. A zero stride fits none.
    pub fn available_vertices(&self) -> u64 {
        match self.stride {
            0 => 0,
            stride => self.size / u64::from(stride),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexBinding {
    pub buffer: BufferHandle,
    pub size: u64,
    pub format: IndexFormat,
}

impl IndexBinding {
    pub fn available_indices(&self) -> u64 {
        self.size / self.format.width()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    Unbound,
    PipelineBound(PipelineId),
}

/// What is currently bound for the next draw.
///
/// Buffer bindings are independent of the pipeline: rebinding a buffer only
/// replaces the tracked reference.
#[derive(Debug, Clone, Default)]
pub struct DrawCallState {
    vertex: Option<VertexBinding>,
    index: Option<IndexBinding>,
    pipeline: Option<PipelineId>,
}

impl DrawCallState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> BindingState {
        match self.pipeline {
            Some(id) => BindingState::PipelineBound(id),
            None => BindingState::Unbound,
        }
    }

    pub fn pipeline(&self) -> Option<PipelineId> {
        self.pipeline
    }

    pub fn set_pipeline(&mut self, id: PipelineId) {
        self.pipeline = Some(id);
    }

    pub fn clear_pipeline(&mut self) {
        self.pipeline = None;
    }

    pub fn vertex(&self) -> Option<VertexBinding> {
        self.vertex
    }

    pub fn index(&self) -> Option<IndexBinding> {
        self.index
    }

    pub fn bind_vertex(&mut self, binding: Option<VertexBinding>) {
        self.vertex = binding;
    }

    pub fn bind_index(&mut self, binding: Option<IndexBinding>) {
        self.index = binding;
    }

    /// Drops any binding that refers to `buffer`.
    pub fn forget_buffer(&mut self, buffer: BufferHandle) {
        if self.vertex.is_some_and(|binding| binding.buffer == buffer) {
            self.vertex = None;
        }
        if self.index.is_some_and(|binding| binding.buffer == buffer) {
            self.index = None;
        }
    }
}

/// A validated range, ready to submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawRange {
    /// First index for indexed draws, first vertex otherwise.
    pub first: u32,
    pub count: u32,
    /// Set when the requested count had to be shortened.
    pub clamped: bool,
}

/// Fits `first..first + count` inside `available` elements. `None` when
/// nothing is left to draw.
fn clamp_range(first: u32, count: u32, available: u64, what: &str) -> Option<DrawRange> {
    let end = u64::from(first) + u64::from(count);
    if end <= available {
        return Some(DrawRange {
            first,
            count,
            clamped: false,
        });
    }
    if u64::from(first) >= available {
        warn!("{what} range {first}..{end} starts past the {available} available, skipping draw");
        return None;
    }
    // `available - first` is below `count`, which is a u32.
    let fitted = (available - u64::from(first)) as u32;
    warn!(
        "{what} range {first}..{end} exceeds the {available} available, clamping count to {fitted}"
    );
    Some(DrawRange {
        first,
        count: fitted,
        clamped: true,
    })
}

/// Validates an indexed draw. The returned range never reaches past the
/// bound index buffer.
pub fn plan_indexed(
    vertex: &VertexBinding,
    index: &IndexBinding,
    base_vertex: u32,
    first_index: u32,
    index_count: u32,
    instance_count: u32,
    policy: VertexBoundsPolicy,
) -> Option<DrawRange> {
    if index_count == 0 || instance_count == 0 {
        debug!("empty indexed draw ({index_count} indices, {instance_count} instances) skipped");
        return None;
    }

    // Upper bound on the highest vertex the range could touch, assuming the
    // indices are roughly sequential.
    let highest = u64::from(base_vertex) + u64::from(first_index) + u64::from(index_count) - 1;
    let available_vertices = vertex.available_vertices();
    if highest >= available_vertices && policy == VertexBoundsPolicy::Warn {
        warn!(
            "indexed draw may reach vertex {highest} but only {available_vertices} are bound \
             (stride {}, {} bytes)",
            vertex.stride,
            vertex.size
        );
    }

    clamp_range(first_index, index_count, index.available_indices(), "index")
}

/// Validates a non-indexed draw against the bound vertex buffer.
pub fn plan_draw(
    vertex: &VertexBinding,
    first_vertex: u32,
    vertex_count: u32,
) -> Option<DrawRange> {
    if vertex_count == 0 {
        debug!("empty draw skipped");
        return None;
    }
    clamp_range(first_vertex, vertex_count, vertex.available_vertices(), "vertex")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertices(count: u64, stride: u32) -> VertexBinding {
        VertexBinding {
            buffer: BufferHandle::from_raw(1).unwrap(),
            size: count * u64::from(stride),
            stride,
        }
    }

    fn indices(count: u64, format: IndexFormat) -> IndexBinding {
        IndexBinding {
            buffer: BufferHandle::from_raw(2).unwrap(),
            size: count * format.width(),
            format,
        }
    }

    #[test]
    fn available_counts_round_down() {
        let vertex = VertexBinding {
            buffer: BufferHandle::from_raw(1).unwrap(),
            size: 100,
            stride: 12,
        };
        assert_eq!(vertex.available_vertices(), 8);
        assert_eq!(VertexBinding { stride: 0, ..vertex }.available_vertices(), 0);

        let index = IndexBinding {
            buffer: BufferHandle::from_raw(2).unwrap(),
            size: 7,
            format: IndexFormat::U16,
        };
        assert_eq!(index.available_indices(), 3);
    }

    #[test]
    fn in_range_indexed_draw_is_untouched() {
        let plan = plan_indexed(
            &vertices(4, 12),
            &indices(6, IndexFormat::U16),
            0,
            0,
            6,
            1,
            VertexBoundsPolicy::Warn,
        );
        assert_eq!(
            plan,
            Some(DrawRange {
                first: 0,
                count: 6,
                clamped: false
            })
        );
    }

    #[test]
    fn vertex_estimate_never_blocks() {
        // Six indices into a four-vertex buffer trips the estimate.
        for policy in [VertexBoundsPolicy::Warn, VertexBoundsPolicy::Ignore] {
            let plan = plan_indexed(
                &vertices(4, 12),
                &indices(6, IndexFormat::U32),
                100,
                0,
                6,
                1,
                policy,
            );
            assert_eq!(plan.map(|range| range.count), Some(6));
        }
    }

    #[test]
    fn index_overrun_is_clamped() {
        let plan = plan_indexed(
            &vertices(1000, 12),
            &indices(10, IndexFormat::U16),
            0,
            4,
            12,
            1,
            VertexBoundsPolicy::Warn,
        );
        assert_eq!(
            plan,
            Some(DrawRange {
                first: 4,
                count: 6,
                clamped: true
            })
        );
    }

    #[test]
    fn nothing_left_skips_the_draw() {
        let vertex = vertices(1000, 12);
        let index = indices(10, IndexFormat::U32);
        for first in [10, 11, u32::MAX] {
            assert_eq!(
                plan_indexed(&vertex, &index, 0, first, 3, 1, VertexBoundsPolicy::Warn),
                None
            );
        }
    }

    #[test]
    fn never_reads_past_the_index_buffer() {
        let vertex = vertices(64, 16);
        for available in 0..8u64 {
            let index = indices(available, IndexFormat::U16);
            for first in 0..10u32 {
                for count in 0..10u32 {
                    let policy = VertexBoundsPolicy::Ignore;
                    if let Some(range) = plan_indexed(&vertex, &index, 0, first, count, 1, policy) {
                        assert!(range.count > 0);
                        assert!(u64::from(range.first) + u64::from(range.count) <= available);
                    }
                }
            }
        }
    }

    #[test]
    fn huge_ranges_do_not_overflow() {
        let plan = plan_indexed(
            &vertices(4, 12),
            &indices(4, IndexFormat::U16),
            u32::MAX,
            1,
            u32::MAX,
            1,
            VertexBoundsPolicy::Warn,
        );
        assert_eq!(plan.map(|range| range.count), Some(3));
    }

    #[test]
    fn empty_draws_are_skipped() {
        let vertex = vertices(4, 12);
        let index = indices(6, IndexFormat::U16);
        assert_eq!(plan_indexed(&vertex, &index, 0, 0, 0, 1, VertexBoundsPolicy::Warn), None);
        assert_eq!(plan_indexed(&vertex, &index, 0, 0, 6, 0, VertexBoundsPolicy::Warn), None);
        assert_eq!(plan_draw(&vertex, 0, 0), None);
    }

    #[test]
    fn non_indexed_ranges_are_enforced() {
        let vertex = vertices(4, 12);
        assert_eq!(plan_draw(&vertex, 0, 4).map(|r| r.count), Some(4));
        assert_eq!(
            plan_draw(&vertex, 2, 4),
            Some(DrawRange {
                first: 2,
                count: 2,
                clamped: true
            })
        );
        assert_eq!(plan_draw(&vertex, 4, 1), None);
        let zero_stride = VertexBinding { stride: 0, ..vertex };
        assert_eq!(plan_draw(&zero_stride, 0, 3), None);
    }

    #[test]
    fn bindings_do_not_touch_the_pipeline_state() {
        let mut state = DrawCallState::new();
        assert_eq!(state.state(), BindingState::Unbound);
        state.bind_vertex(Some(vertices(4, 12)));
        state.bind_index(Some(indices(6, IndexFormat::U16)));
        assert_eq!(state.state(), BindingState::Unbound);

        state.set_pipeline(PipelineId::from_index(3));
        assert_eq!(state.state(), BindingState::PipelineBound(PipelineId::from_index(3)));
        state.bind_vertex(None);
        assert_eq!(state.state(), BindingState::PipelineBound(PipelineId::from_index(3)));

        state.clear_pipeline();
        assert_eq!(state.state(), BindingState::Unbound);
    }

    #[test]
    fn forgetting_a_buffer_clears_matching_bindings() {
        let mut state = DrawCallState::new();
        let vertex = vertices(4, 12);
        let index = indices(6, IndexFormat::U16);
        state.bind_vertex(Some(vertex));
        state.bind_index(Some(index));
        state.forget_buffer(index.buffer);
        assert_eq!(state.vertex(), Some(vertex));
        assert_eq!(state.index(), None);
    }
}
