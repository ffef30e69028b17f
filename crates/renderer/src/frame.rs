//! Per-frame bookkeeping.
//!
//! This module holds the pure, device-free pieces of the frame loop: the
//! frame-slot counter that cycles through the in-flight synchronization
//! slots, and the draw list built from the scene's meshes before command
//! recording.

use glam::Mat4;

use crate::mesh::Mesh;

/// Cycles through the in-flight frame slots.
///
/// Each slot owns one fence and one pair of semaphores. A slot may only be
/// reused after its fence has been waited on, which the renderer does at the
/// top of every frame before touching the slot's resources.
#[derive(Debug)]
pub struct FrameSlots {
    current: usize,
    count: usize,
}

impl FrameSlots {
    /// Creates a counter over `count` slots, starting at slot 0.
    pub fn new(count: usize) -> Self {
        assert!(count > 0, "at least one frame slot is required");
        Self { current: 0, count }
    }

    /// Returns the current slot index.
    #[inline]
    pub fn current(&self) -> usize {
        self.current
    }

    /// Returns the number of slots.
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Advances to the next slot, wrapping around.
    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.count;
    }
}

/// A single recorded draw: which mesh, with which model matrix.
///
/// The model matrix is captured at build time so the recorded command
/// sequence is a pure value that tests can inspect.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawCommand {
    /// Index into the mesh list.
    pub mesh_index: usize,
    /// Model matrix pushed to the vertex stage for this draw.
    pub model: Mat4,
    /// Number of indices to draw.
    pub index_count: u32,
}

/// Builds the draw list for one frame from the current mesh transforms.
pub fn build_draw_list(meshes: &[Mesh]) -> Vec<DrawCommand> {
    draw_list_from(meshes.iter().map(|mesh| (mesh.model(), mesh.index_count())))
}

fn draw_list_from(items: impl Iterator<Item = (Mat4, u32)>) -> Vec<DrawCommand> {
    items
        .enumerate()
        .map(|(mesh_index, (model, index_count))| DrawCommand {
            mesh_index,
            model,
            index_count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_slots_cycle() {
        let mut slots = FrameSlots::new(2);
        assert_eq!(slots.current(), 0);
        slots.advance();
        assert_eq!(slots.current(), 1);
        slots.advance();
        assert_eq!(slots.current(), 0);
    }

    #[test]
    fn test_no_slot_reuse_without_intervening_frames() {
        // Simulate the orchestrator's counters over many frames. A slot is
        // revisited only after every other slot has had a frame, which is
        // what gives the fence wait at the top of the frame time to cover
        // the slot's previous submission.
        let count = 2;
        let mut slots = FrameSlots::new(count);
        let mut last_used = vec![None; count];

        for frame in 0..100usize {
            let f = slots.current();
            if let Some(prev) = last_used[f] {
                assert_eq!(frame - prev, count, "slot {} reused too early", f);
            }
            last_used[f] = Some(frame);
            slots.advance();
        }
    }

    #[test]
    fn test_frame_slots_single_slot() {
        let mut slots = FrameSlots::new(1);
        slots.advance();
        assert_eq!(slots.current(), 0);
    }

    #[test]
    #[should_panic]
    fn test_frame_slots_zero_count_panics() {
        FrameSlots::new(0);
    }

    #[test]
    fn test_draw_list_keeps_per_mesh_transforms() {
        let left = Mat4::from_translation(glam::Vec3::new(-1.0, 0.0, 0.0));
        let right = Mat4::from_translation(glam::Vec3::new(1.0, 0.0, 0.0));

        let draws = draw_list_from([(left, 6), (right, 6)].into_iter());

        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].mesh_index, 0);
        assert_eq!(draws[1].mesh_index, 1);
        assert_eq!(draws[0].model, left);
        assert_eq!(draws[1].model, right);
        assert_ne!(draws[0].model, draws[1].model);
    }

    #[test]
    fn test_draw_list_empty() {
        assert!(draw_list_from(std::iter::empty()).is_empty());
    }
}
