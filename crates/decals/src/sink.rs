//! Shared per-frame vertex/index arena.
//!
//! Projected decal geometry from every caster of a frame is appended into one
//! pre-sized arena so it can be uploaded and drawn as a single batch.
//!
//! - [`SharedGeometrySink::begin_frame`] rewinds the arena and hands out a
//!   [`SinkFrame`]. It takes `&mut self`, so no slot from the previous frame
//!   can still be alive.
//! - [`SinkFrame::allocate`] is the only locked operation: it bumps the
//!   cursors and splits off exclusive slices.
//! - The caller fills its [`SinkSlot`] without holding any lock and turns it
//!   into a [`DecalPrimitiveRef`], which resolves back to the data until the
//!   next frame begins.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tracing::{debug, trace};

use crate::types::DecalVertex;

/// Vertices addressable by a 16-bit index range
const MAX_INDEXED_VERTICES: usize = u16::MAX as usize + 1;

static NEXT_SINK_ID: AtomicU64 = AtomicU64::new(1);

/// Errors that can occur when allocating from the sink
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error(
        "sink out of space: requested {requested_vertices} vertices and {requested_indices} indices, \
         {available_vertices} and {available_indices} left"
    )]
    OutOfSpace {
        requested_vertices: usize,
        requested_indices: usize,
        available_vertices: usize,
        available_indices: usize,
    },

    #[error("indexed range of {0} vertices exceeds the 16-bit index limit")]
    IndexRange(usize),
}

/// Non-owning handle to a finished range in the sink.
///
/// Only valid for the frame it was allocated in; resolving it later yields
/// `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DecalPrimitiveRef {
    sink_id: u64,
    frame: u64,
    pub first_vertex: usize,
    pub vertex_count: usize,
    pub first_index: usize,
    /// Zero for non-indexed geometry
    pub index_count: usize,
    pub user_data: u64,
}

impl DecalPrimitiveRef {
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn is_indexed(&self) -> bool {
        self.index_count > 0
    }

    pub fn triangle_count(&self) -> usize {
        if self.is_indexed() {
            self.index_count / 3
        } else {
            self.vertex_count / 3
        }
    }
}

/// Arena usage after a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SinkUsage {
    pub vertices: usize,
    pub indices: usize,
    pub allocations: usize,
}

/// Pre-sized vertex and index storage shared by all casters of a frame
pub struct SharedGeometrySink {
    id: u64,
    frame: u64,
    vertices: Vec<DecalVertex>,
    indices: Vec<u16>,
    last_usage: SinkUsage,
}

impl std::fmt::Debug for SharedGeometrySink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedGeometrySink")
            .field("id", &self.id)
            .field("frame", &self.frame)
            .field("vertex_capacity", &self.vertices.len())
            .field("index_capacity", &self.indices.len())
            .field("last_usage", &self.last_usage)
            .finish()
    }
}

impl SharedGeometrySink {
    pub fn new(vertex_capacity: usize, index_capacity: usize) -> Self {
        Self {
            id: NEXT_SINK_ID.fetch_add(1, Ordering::Relaxed),
            frame: 0,
            vertices: vec![DecalVertex::default(); vertex_capacity],
            indices: vec![0; index_capacity],
            last_usage: SinkUsage::default(),
        }
    }

    pub fn vertex_capacity(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_capacity(&self) -> usize {
        self.indices.len()
    }

    /// Number of the current (or most recent) frame
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Usage recorded when the last [`SinkFrame`] was dropped
    pub fn last_usage(&self) -> SinkUsage {
        self.last_usage
    }

    /// Invalidate every outstanding [`DecalPrimitiveRef`] and rewind the arena
    pub fn reset(&mut self) {
        self.frame += 1;
        self.last_usage = SinkUsage::default();
        trace!("SharedGeometrySink {}: reset to frame {}", self.id, self.frame);
    }

    /// Rewind the arena and start handing out ranges for a new frame
    pub fn begin_frame(&mut self) -> SinkFrame<'_> {
        self.reset();
        SinkFrame {
            sink_id: self.id,
            frame: self.frame,
            vertex_capacity: self.vertices.len(),
            index_capacity: self.indices.len(),
            state: Mutex::new(FrameState {
                vertices: &mut self.vertices,
                indices: &mut self.indices,
                usage: SinkUsage::default(),
            }),
            report: &mut self.last_usage,
        }
    }

    fn owns(&self, primitive: &DecalPrimitiveRef) -> bool {
        primitive.sink_id == self.id && primitive.frame == self.frame
    }

    /// Vertex data of a finished range, `None` if the ref is stale or foreign
    pub fn vertices(&self, primitive: &DecalPrimitiveRef) -> Option<&[DecalVertex]> {
        if !self.owns(primitive) {
            return None;
        }
        self.vertices
            .get(primitive.first_vertex..primitive.first_vertex + primitive.vertex_count)
    }

    /// Index data of a finished range. Indices are relative to the range's
    /// first vertex.
    pub fn indices(&self, primitive: &DecalPrimitiveRef) -> Option<&[u16]> {
        if !self.owns(primitive) {
            return None;
        }
        self.indices
            .get(primitive.first_index..primitive.first_index + primitive.index_count)
    }
}

struct FrameState<'a> {
    /// Unallocated tails of the arena
    vertices: &'a mut [DecalVertex],
    indices: &'a mut [u16],
    usage: SinkUsage,
}

/// Allocation handle for one frame; may be shared across worker threads
pub struct SinkFrame<'a> {
    sink_id: u64,
    frame: u64,
    vertex_capacity: usize,
    index_capacity: usize,
    state: Mutex<FrameState<'a>>,
    report: &'a mut SinkUsage,
}

impl<'a> SinkFrame<'a> {
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Reserve contiguous vertex and index ranges.
    ///
    /// The lock is held only while the cursors move; the returned slot is
    /// filled without it.
    pub fn allocate(&self, vertex_count: usize, index_count: usize) -> Result<SinkSlot<'a>, SinkError> {
        if index_count > 0 && vertex_count > MAX_INDEXED_VERTICES {
            return Err(SinkError::IndexRange(vertex_count));
        }

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if vertex_count > state.vertices.len() || index_count > state.indices.len() {
            return Err(SinkError::OutOfSpace {
                requested_vertices: vertex_count,
                requested_indices: index_count,
                available_vertices: state.vertices.len(),
                available_indices: state.indices.len(),
            });
        }

        let remaining = std::mem::take(&mut state.vertices);
        let (vertices, rest) = remaining.split_at_mut(vertex_count);
        state.vertices = rest;
        let remaining = std::mem::take(&mut state.indices);
        let (indices, rest) = remaining.split_at_mut(index_count);
        state.indices = rest;

        let first_vertex = state.usage.vertices;
        let first_index = state.usage.indices;
        state.usage.vertices += vertex_count;
        state.usage.indices += index_count;
        state.usage.allocations += 1;
        drop(state);

        Ok(SinkSlot {
            sink_id: self.sink_id,
            frame: self.frame,
            first_vertex,
            first_index,
            vertices,
            indices,
        })
    }

    /// Allocate a non-indexed range and copy `vertices` into it
    pub fn push_vertices(&self, vertices: &[DecalVertex], user_data: u64) -> Result<DecalPrimitiveRef, SinkError> {
        let mut slot = self.allocate(vertices.len(), 0)?;
        slot.vertices_mut().copy_from_slice(vertices);
        Ok(slot.finish(user_data))
    }

    pub fn usage(&self) -> SinkUsage {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).usage
    }

    pub fn remaining(&self) -> (usize, usize) {
        let usage = self.usage();
        (
            self.vertex_capacity - usage.vertices,
            self.index_capacity - usage.indices,
        )
    }
}

impl Drop for SinkFrame<'_> {
    fn drop(&mut self) {
        let usage = self.state.get_mut().unwrap_or_else(PoisonError::into_inner).usage;
        debug!(
            "SinkFrame {}: {} allocations, {}/{} vertices, {}/{} indices",
            self.frame,
            usage.allocations,
            usage.vertices,
            self.vertex_capacity,
            usage.indices,
            self.index_capacity
        );
        *self.report = usage;
    }
}

/// Exclusively owned range of the arena, written outside the lock
#[derive(Debug)]
pub struct SinkSlot<'a> {
    sink_id: u64,
    frame: u64,
    first_vertex: usize,
    first_index: usize,
    vertices: &'a mut [DecalVertex],
    indices: &'a mut [u16],
}

impl SinkSlot<'_> {
    pub fn vertices_mut(&mut self) -> &mut [DecalVertex] {
        self.vertices
    }

    /// Indices are relative to the slot's first vertex
    pub fn indices_mut(&mut self) -> &mut [u16] {
        self.indices
    }

    /// Seal the slot into a handle the renderer can resolve
    pub fn finish(self, user_data: u64) -> DecalPrimitiveRef {
        DecalPrimitiveRef {
            sink_id: self.sink_id,
            frame: self.frame,
            first_vertex: self.first_vertex,
            vertex_count: self.vertices.len(),
            first_index: self.first_index,
            index_count: self.indices.len(),
            user_data,
        }
    }
}
