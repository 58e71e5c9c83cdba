//! The per-frame pass: filter, group, pack, refresh, draw.

use std::collections::{HashMap, HashSet};

use decals::{BoundingBox, GeometrySource};
use tracing::{debug, warn};

use crate::caster::{fade_factor, is_faded_out, Caster, CasterId, FrameView};
use crate::constants::MOVE_EPSILON;
use crate::renderer::{mirrored_view_proj, slice_targets, CasterDraw, SliceRenderer};

use super::jobs::{run_jobs, slice_radius, JobContext, SliceJob};
use super::{FrameReport, ShadowOrchestrator, SliceCache};

/// Casters drawn into one shared atlas slice
#[derive(Debug)]
struct SliceGroup {
    /// Group leader id; keys the slice cache
    key: CasterId,
    /// Indices into the frame's caster list
    members: Vec<usize>,
    bounds: BoundingBox,
    fade: f32,
}

impl ShadowOrchestrator {
    /// Run the shadow pass for one frame.
    ///
    /// When the atlas cannot hold every slice the frame draws nothing and the
    /// cached sets are left as they were.
    pub fn render_frame<S, R>(
        &mut self,
        casters: &[Caster],
        view: &FrameView,
        source: &S,
        renderer: &mut R,
    ) -> FrameReport
    where
        S: GeometrySource + ?Sized,
        R: SliceRenderer + ?Sized,
    {
        self.frame_count += 1;
        let mut report = FrameReport {
            considered: casters.len(),
            ..FrameReport::default()
        };

        let light_dir = view.light_dir();
        report.invalidated = self.apply_invalidation(light_dir);
        self.track_transforms(casters);

        let groups = self.collect_groups(casters, view, &mut report);
        report.slices = groups.len();

        for (index, group) in groups.iter().enumerate() {
            let size = self.slice_size(&group.bounds);
            self.packer.add_rectangle(size, size, index);
        }

        let atlas_size = self.config.atlas_size;
        if let Err(err) = self.packer.assign_coords(atlas_size, atlas_size) {
            warn!("ShadowOrchestrator: {}, skipping shadows this frame", err);
            self.packer.cleanup();
            self.sink.reset();
            report.overflowed = true;
            return report;
        }

        let mut jobs = Vec::with_capacity(groups.len());
        for (rect, &index) in self.packer.placed() {
            let group = &groups[index];
            let (viewport, uv) = slice_targets(&rect, atlas_size, self.config.texture_origin);
            let cache = self
                .caches
                .remove(&group.key)
                .unwrap_or_else(|| SliceCache::new(group.key));
            jobs.push(SliceJob {
                key: group.key,
                group: index,
                bounds: group.bounds,
                viewport,
                uv,
                fade: group.fade,
                cache,
            });
        }
        self.packer.cleanup();

        let planes = self.clip_planes();
        let parallel = self.config.parallel_jobs;
        let extent_padding = self.config.extent_padding;
        let results = {
            let frame = self.sink.begin_frame();
            let ctx = JobContext {
                source,
                frame: &frame,
                planes,
                light_dir,
                extent_padding,
            };
            run_jobs(&mut jobs, &ctx, parallel)
        };

        renderer.begin_atlas(atlas_size, true);
        for (job, result) in jobs.into_iter().zip(results) {
            match result.regenerated {
                Some(_) => report.regenerated += 1,
                None => report.reused += 1,
            }

            match result.drawn {
                Ok(Some(primitive)) => {
                    report.primitives.push(primitive);
                    let view_proj = mirrored_view_proj(&job.cache.view_proj);
                    for &member in &groups[job.group].members {
                        let caster = &casters[member];
                        renderer.render_caster(&CasterDraw {
                            viewport: job.viewport,
                            view_proj,
                            world: caster.transform,
                            caster: caster.id,
                        });
                        report.draws += 1;
                    }
                }
                Ok(None) => report.empty += 1,
                Err(err) => {
                    warn!("ShadowOrchestrator: slice {:?} dropped: {}", job.key, err);
                    report.sink_failures += 1;
                }
            }

            self.caches.insert(job.key, job.cache);
        }
        renderer.submit_decals(&report.primitives, &self.sink);

        debug!(
            "ShadowOrchestrator: frame {} drew {} slices ({} regenerated, {} reused, {} empty)",
            self.frame_count,
            report.primitives.len(),
            report.regenerated,
            report.reused,
            report.empty
        );
        report
    }

    /// Flag slices whose members moved and forget casters that are gone
    fn track_transforms(&mut self, casters: &[Caster]) {
        for caster in casters {
            let moved = self
                .transforms
                .insert(caster.id, caster.transform)
                .is_some_and(|previous| !previous.abs_diff_eq(caster.transform, MOVE_EPSILON));
            if moved {
                if let Some(cache) = self.caches.get_mut(&caster.group_key()) {
                    cache.primitives.mark_dirty();
                }
            }
        }

        let present: HashSet<CasterId> = casters.iter().map(|c| c.id).collect();
        let keys: HashSet<CasterId> = casters.iter().map(|c| c.group_key()).collect();
        self.transforms.retain(|id, _| present.contains(id));
        self.caches.retain(|key, _| keys.contains(key));
    }

    fn collect_groups(&self, casters: &[Caster], view: &FrameView, report: &mut FrameReport) -> Vec<SliceGroup> {
        let mut groups: Vec<SliceGroup> = Vec::new();
        let mut by_key: HashMap<CasterId, usize> = HashMap::new();

        for (index, caster) in casters.iter().enumerate() {
            let bounds = caster.world_bounds();
            if !caster.has_geometry || bounds.is_empty() {
                report.skipped_no_geometry += 1;
                continue;
            }
            if !view.is_visible(&bounds) {
                report.skipped_culled += 1;
                continue;
            }
            let distance = view.camera_position.distance(bounds.center());
            let fade = fade_factor(distance, self.config.fade_distance);
            if is_faded_out(fade) {
                report.skipped_faded += 1;
                continue;
            }

            let key = caster.group_key();
            match by_key.get(&key) {
                Some(&group_index) => {
                    let group = &mut groups[group_index];
                    group.members.push(index);
                    group.bounds.include_point(bounds.min);
                    group.bounds.include_point(bounds.max);
                    group.fade = group.fade.max(fade);
                }
                None => {
                    by_key.insert(key, groups.len());
                    groups.push(SliceGroup {
                        key,
                        members: vec![index],
                        bounds,
                        fade,
                    });
                }
            }
        }
        groups
    }

    /// Square slice side in pixels for a group's bounds
    fn slice_size(&self, bounds: &BoundingBox) -> u32 {
        let diameter = 2.0 * slice_radius(bounds, self.config.extent_padding);
        let wanted = (diameter * self.config.pixels_per_unit).ceil() as u32;
        let max = self
            .config
            .atlas_size
            .saturating_sub(2 * self.config.slice_padding)
            .max(1);
        wanted.max(self.config.min_slice_size).min(max)
    }
}
