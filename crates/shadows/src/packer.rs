//! Rectangle packing for the shadow atlas.
//!
//! Entries are collected with [`RectanglePacker::add_rectangle`], laid out
//! all at once by [`RectanglePacker::assign_coords`] and dropped again with
//! [`RectanglePacker::cleanup`]. Layout is shelf based: rows are filled left
//! to right and a new row starts below the tallest entry of the previous one.

use std::cmp::Ordering;

use decals::UvRect;
use glam::Vec2;
use thiserror::Error;
use tracing::{debug, trace};

/// Errors that can occur while laying out the atlas
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PackError {
    #[error("atlas {atlas_width}x{atlas_height} overflowed after placing {placed} of {total} rectangles")]
    Overflow {
        atlas_width: u32,
        atlas_height: u32,
        placed: usize,
        total: usize,
    },

    #[error("atlas dimensions must be non-zero, got {0}x{1}")]
    EmptyAtlas(u32, u32),
}

/// Pixel rectangle inside the atlas, origin at the top-left
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AtlasRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl AtlasRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn overlaps(&self, other: &AtlasRect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Whether the rectangle lies within an atlas of the given size
    pub fn fits_in(&self, atlas_width: u32, atlas_height: u32) -> bool {
        self.right() <= atlas_width && self.bottom() <= atlas_height
    }

    /// The same rectangle measured from the bottom edge
    pub fn flipped_y(&self, atlas_height: u32) -> AtlasRect {
        AtlasRect {
            y: atlas_height.saturating_sub(self.bottom()),
            ..*self
        }
    }

    /// Normalized texture-space bounds within an atlas of the given size
    pub fn to_uv(&self, atlas_width: u32, atlas_height: u32) -> UvRect {
        let scale = Vec2::new(1.0 / atlas_width.max(1) as f32, 1.0 / atlas_height.max(1) as f32);
        UvRect {
            left_top: Vec2::new(self.x as f32, self.y as f32) * scale,
            right_bottom: Vec2::new(self.right() as f32, self.bottom() as f32) * scale,
        }
    }
}

/// A rectangle waiting to be placed, with its caller payload
#[derive(Debug, Clone)]
pub struct PackerEntry<T> {
    pub width: u32,
    pub height: u32,
    pub payload: T,
    placed: Option<AtlasRect>,
}

impl<T> PackerEntry<T> {
    /// Position assigned by the last successful layout
    pub fn placed(&self) -> Option<AtlasRect> {
        self.placed
    }
}

/// Larger `width + height` first
pub fn by_perimeter_desc<T>(a: &PackerEntry<T>, b: &PackerEntry<T>) -> Ordering {
    let perimeter = |e: &PackerEntry<T>| u64::from(e.width) + u64::from(e.height);
    perimeter(b).cmp(&perimeter(a))
}

/// Shelf packer with opaque per-entry payloads
#[derive(Debug, Clone)]
pub struct RectanglePacker<T> {
    entries: Vec<PackerEntry<T>>,
    padding: u32,
}

impl<T> Default for RectanglePacker<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            padding: 0,
        }
    }
}

impl<T> RectanglePacker<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_padding(padding: u32) -> Self {
        Self {
            entries: Vec::new(),
            padding,
        }
    }

    /// Empty space kept on every side of each rectangle
    pub fn set_padding(&mut self, padding: u32) {
        self.padding = padding;
    }

    pub fn padding(&self) -> u32 {
        self.padding
    }

    /// Queue a rectangle for the next layout. Returns its index.
    pub fn add_rectangle(&mut self, width: u32, height: u32, payload: T) -> usize {
        self.entries.push(PackerEntry {
            width,
            height,
            payload,
            placed: None,
        });
        self.entries.len() - 1
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, index: usize) -> Option<&PackerEntry<T>> {
        self.entries.get(index)
    }

    /// Placed rectangle and payload of an entry
    pub fn rectangle(&self, index: usize) -> Option<(AtlasRect, &T)> {
        let entry = self.entries.get(index)?;
        entry.placed.map(|rect| (rect, &entry.payload))
    }

    /// Every placed entry, in insertion order
    pub fn placed(&self) -> impl Iterator<Item = (AtlasRect, &T)> {
        self.entries
            .iter()
            .filter_map(|entry| entry.placed.map(|rect| (rect, &entry.payload)))
    }

    /// Drop every entry, payloads included
    pub fn cleanup(&mut self) {
        self.entries.clear();
    }

    /// Lay out all entries, largest `width + height` first
    pub fn assign_coords(&mut self, atlas_width: u32, atlas_height: u32) -> Result<(), PackError> {
        self.assign_coords_by(atlas_width, atlas_height, by_perimeter_desc)
    }

    /// Lay out all entries in the order given by `compare`.
    ///
    /// Either every entry is placed, or none keeps a placement and
    /// [`PackError::Overflow`] is returned.
    pub fn assign_coords_by<F>(
        &mut self,
        atlas_width: u32,
        atlas_height: u32,
        mut compare: F,
    ) -> Result<(), PackError>
    where
        F: FnMut(&PackerEntry<T>, &PackerEntry<T>) -> Ordering,
    {
        if atlas_width == 0 || atlas_height == 0 {
            return Err(PackError::EmptyAtlas(atlas_width, atlas_height));
        }
        for entry in &mut self.entries {
            entry.placed = None;
        }

        let mut order: Vec<usize> = (0..self.entries.len()).collect();
        order.sort_by(|&a, &b| compare(&self.entries[a], &self.entries[b]));

        let pad = self.padding;
        let mut cursor_x = 0u32;
        let mut cursor_y = 0u32;
        let mut shelf_height = 0u32;

        for (placed, &index) in order.iter().enumerate() {
            let entry = &self.entries[index];
            let padded_w = entry.width.saturating_add(pad.saturating_mul(2));
            let padded_h = entry.height.saturating_add(pad.saturating_mul(2));

            if cursor_x.saturating_add(padded_w) > atlas_width {
                cursor_y = cursor_y.saturating_add(shelf_height);
                cursor_x = 0;
                shelf_height = 0;
            }
            if padded_w > atlas_width || cursor_y.saturating_add(padded_h) > atlas_height {
                for entry in &mut self.entries {
                    entry.placed = None;
                }
                debug!(
                    "RectanglePacker: overflow at {}/{} in {}x{} atlas",
                    placed,
                    order.len(),
                    atlas_width,
                    atlas_height
                );
                return Err(PackError::Overflow {
                    atlas_width,
                    atlas_height,
                    placed,
                    total: order.len(),
                });
            }

            let rect = AtlasRect::new(cursor_x + pad, cursor_y + pad, entry.width, entry.height);
            trace!("RectanglePacker: entry {} -> {:?}", index, rect);
            self.entries[index].placed = Some(rect);

            cursor_x += padded_w;
            shelf_height = shelf_height.max(padded_h);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic sizes for the layout property tests
    fn sizes(seed: u32, count: usize, max: u32) -> Vec<(u32, u32)> {
        let mut state = seed;
        (0..count)
            .map(|_| {
                state = state.wrapping_mul(1103515245).wrapping_add(12345);
                let w = 1 + (state >> 16) % max;
                state = state.wrapping_mul(1103515245).wrapping_add(12345);
                let h = 1 + (state >> 16) % max;
                (w, h)
            })
            .collect()
    }

    fn assert_sound<T>(packer: &RectanglePacker<T>, atlas: u32) {
        let rects: Vec<AtlasRect> = packer.placed().map(|(rect, _)| rect).collect();
        assert_eq!(rects.len(), packer.len());
        for (i, a) in rects.iter().enumerate() {
            assert!(a.fits_in(atlas, atlas), "{a:?} outside atlas");
            for b in &rects[i + 1..] {
                assert!(!a.overlaps(b), "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn test_single_rectangle() {
        let mut packer = RectanglePacker::new();
        let index = packer.add_rectangle(64, 32, "caster");
        packer.assign_coords(128, 128).unwrap();

        let (rect, payload) = packer.rectangle(index).unwrap();
        assert_eq!(rect, AtlasRect::new(0, 0, 64, 32));
        assert_eq!(*payload, "caster");
    }

    #[test]
    fn test_oversized_rectangle_overflows() {
        let mut packer = RectanglePacker::new();
        packer.add_rectangle(u32::MAX, 1, ());
        packer.add_rectangle(1, 1, ());

        let result = packer.assign_coords(256, 256);
        assert!(matches!(result, Err(PackError::Overflow { placed: 0, total: 2, .. })));
        assert!(packer.placed().next().is_none());

        let edge = AtlasRect::new(u32::MAX - 1, 0, 8, u32::MAX);
        assert_eq!(edge.right(), u32::MAX);
        assert_eq!(edge.bottom(), u32::MAX);
        assert!(!edge.fits_in(256, 256));
    }

    #[test]
    fn test_placements_never_overlap() {
        for seed in 0..20 {
            let mut packer = RectanglePacker::with_padding(seed % 3);
            for (i, (w, h)) in sizes(seed, 30, 40).into_iter().enumerate() {
                packer.add_rectangle(w, h, i);
            }
            if packer.assign_coords(512, 512).is_ok() {
                assert_sound(&packer, 512);
            }
        }
    }

    #[test]
    fn test_complete_or_nothing() {
        for seed in 0..20 {
            let mut packer = RectanglePacker::new();
            for (i, (w, h)) in sizes(seed, 40, 64).into_iter().enumerate() {
                packer.add_rectangle(w, h, i);
            }
            match packer.assign_coords(128, 128) {
                Ok(()) => assert_eq!(packer.placed().count(), packer.len()),
                Err(PackError::Overflow { total, .. }) => {
                    assert_eq!(total, packer.len());
                    assert_eq!(packer.placed().count(), 0);
                }
                Err(other) => panic!("unexpected error {other}"),
            }
        }
    }

    #[test]
    fn test_overflow_then_recover() {
        let mut packer = RectanglePacker::new();
        for i in 0..8 {
            packer.add_rectangle(100, 100, i);
        }
        assert!(matches!(
            packer.assign_coords(128, 128),
            Err(PackError::Overflow { placed: 1, total: 8, .. })
        ));
        assert!(packer.rectangle(0).is_none());

        packer.cleanup();
        assert!(packer.is_empty());
        let index = packer.add_rectangle(16, 16, 99);
        packer.assign_coords(128, 128).unwrap();
        assert!(packer.rectangle(index).is_some());
    }

    #[test]
    fn test_oversized_entry_fails() {
        let mut packer = RectanglePacker::new();
        packer.add_rectangle(300, 10, ());
        assert!(packer.assign_coords(256, 256).is_err());
    }

    #[test]
    fn test_padding_separates_neighbours() {
        let mut packer = RectanglePacker::with_padding(2);
        packer.add_rectangle(10, 10, 0);
        packer.add_rectangle(10, 10, 1);
        packer.assign_coords(64, 64).unwrap();

        let (a, _) = packer.rectangle(0).unwrap();
        let (b, _) = packer.rectangle(1).unwrap();
        assert_eq!(a, AtlasRect::new(2, 2, 10, 10));
        assert_eq!(b.x - a.right(), 4);
    }

    #[test]
    fn test_default_order_places_largest_first() {
        let mut packer = RectanglePacker::new();
        let small = packer.add_rectangle(8, 8, ());
        let large = packer.add_rectangle(32, 32, ());
        packer.assign_coords(64, 64).unwrap();

        assert_eq!(packer.rectangle(large).unwrap().0.x, 0);
        assert_eq!(packer.rectangle(small).unwrap().0.x, 32);
    }

    #[test]
    fn test_custom_order() {
        let mut packer = RectanglePacker::new();
        let first = packer.add_rectangle(8, 8, 1);
        let second = packer.add_rectangle(32, 32, 2);
        packer
            .assign_coords_by(64, 64, |a, b| a.payload.cmp(&b.payload))
            .unwrap();

        assert_eq!(packer.rectangle(first).unwrap().0.x, 0);
        assert_eq!(packer.rectangle(second).unwrap().0.x, 8);
    }

    #[test]
    fn test_rect_uv_and_flip() {
        let rect = AtlasRect::new(64, 0, 64, 128);
        let uv = rect.to_uv(256, 256);
        assert_eq!(uv.left_top, Vec2::new(0.25, 0.0));
        assert_eq!(uv.right_bottom, Vec2::new(0.5, 0.5));

        assert_eq!(rect.flipped_y(256), AtlasRect::new(64, 128, 64, 128));
    }

    #[test]
    fn test_empty_atlas_rejected() {
        let mut packer: RectanglePacker<()> = RectanglePacker::new();
        assert_eq!(packer.assign_coords(0, 64), Err(PackError::EmptyAtlas(0, 64)));
    }
}
