//! Uniform octree index (spec §4.4, C4).
//!
//! A full octree of uniform depth over the dataset's outer box. Because the
//! depth is uniform, a leaf's address is a direct `(i, j, k)` triple rather
//! than a path through internal nodes, so `find_cell`/ray-march traversal
//! never walks parent nodes at all — only [`generate_representation`]
//! (which draws empty/non-empty boundaries) needs the aggregated ancestor
//! view, built on demand from the leaf grid.

use std::sync::Arc;

use smallvec::SmallVec;
use tracing::debug;

use crate::cache::CellBoundsCache;
use crate::core::targets::BUILD;
use crate::core::types::{CellId, Number, Point3, Vector3};
use crate::dataset::{Cell, Dataset};
use crate::error::BuildError;
use crate::geom::aabb::Aabb;
use crate::geom::interval::Interval;
use crate::geom::ray::Segment;
use crate::locator::base::{LocatorBase, LocatorConfig};
use crate::locator::query::VisitedSet;
use crate::locator::{sort_hits_by_t, BuildReport, CellLocator, Hit};

/// A cell whose AABB is flatter than this fraction of the dataset's
/// diagonal is treated as degenerate along that axis (spec §4.4 step 1).
const DEGENERATE_AXIS_FRACTION: Number = 1.0 / 1000.0;
const DEGENERATE_AXIS_PADDING: Number = 1.0 / 100.0;

struct OctreeTree {
    /// Padded outer bounds actually indexed (may differ from the dataset's
    /// raw bounds if an axis was degenerate).
    bounds: Aabb,
    level: u32,
    ndivs: u32,
    /// Per-axis leaf extent, `bounds.size() / ndivs`.
    h: Vector3,
    /// `ndivs^3` leaves, indexed `i + j*ndivs + k*ndivs^2`.
    leaves: Vec<SmallVec<[CellId; 8]>>,
    /// Occupancy, kept even when `leaves` is emptied by
    /// `retain_cell_lists = false` so `non_empty_octant_count` and
    /// `generate_representation` still reflect the real structure.
    occupied: Vec<bool>,
    /// SUPPLEMENTED FEATURES #3: when false, `leaves` has been drained of
    /// cell ids right after build and every cell-returning query answers
    /// empty rather than indexing freed storage.
    lists_retained: bool,
}

impl OctreeTree {
    fn leaf_index(&self, i: u32, j: u32, k: u32) -> usize {
        let n = self.ndivs as usize;
        i as usize + j as usize * n + k as usize * n * n
    }

    /// Clamps `p` into the grid and returns its `(i, j, k)` leaf coordinate.
    fn leaf_coord_of(&self, p: Point3) -> (u32, u32, u32) {
        let rel = p - self.bounds.min();
        let clamp_axis = |v: Number, h: Number| -> u32 {
            if h <= 0.0 {
                return 0;
            }
            let idx = (v / h).floor();
            if idx < 0.0 {
                0
            } else if idx >= self.ndivs as Number {
                self.ndivs - 1
            } else {
                idx as u32
            }
        };
        (
            clamp_axis(rel.x, self.h.x),
            clamp_axis(rel.y, self.h.y),
            clamp_axis(rel.z, self.h.z),
        )
    }

    fn leaf_bounds(&self, i: u32, j: u32, k: u32) -> Aabb {
        let min = self.bounds.min() + Vector3::new(i as Number * self.h.x, j as Number * self.h.y, k as Number * self.h.z);
        let max = min + self.h;
        Aabb::new(min, max)
    }

    /// Aggregates the leaf grid bottom-up into a count of non-empty octants
    /// at every level (spec scenario 3). Level `self.level` is the leaves
    /// themselves; level 0 is the single root octant.
    fn non_empty_octant_count(&self) -> usize {
        let n = self.ndivs as usize;
        let mut grid: Vec<bool> = self.occupied.clone();
        let mut total = grid.iter().filter(|b| **b).count();
        let mut dim = n;
        while dim > 1 {
            let half = dim / 2;
            let mut next = vec![false; half * half * half];
            for k in 0..half {
                for j in 0..half {
                    for i in 0..half {
                        let mut any = false;
                        for dz in 0..2 {
                            for dy in 0..2 {
                                for dx in 0..2 {
                                    let (ci, cj, ck) = (i * 2 + dx, j * 2 + dy, k * 2 + dz);
                                    let idx = ci + cj * dim + ck * dim * dim;
                                    any |= grid[idx];
                                }
                            }
                        }
                        next[i + j * half + k * half * half] = any;
                    }
                }
            }
            total += next.iter().filter(|b| **b).count();
            grid = next;
            dim = half;
        }
        total
    }
}

/// A full octree of uniform depth over the dataset's outer box (spec §4.4).
pub struct UniformOctreeLocator<'d, D: Dataset> {
    base: LocatorBase<'d, D>,
    /// `Arc`-wrapped so [`UniformOctreeLocator::shallow_copy`] can alias the
    /// built tree instead of rebuilding it (spec §9 "shared cache arrays").
    tree: Option<Arc<OctreeTree>>,
}

impl<'d, D: Dataset> UniformOctreeLocator<'d, D> {
    pub fn new(dataset: &'d D) -> Self {
        Self {
            base: LocatorBase::new(dataset, LocatorConfig::octree_defaults()),
            tree: None,
        }
    }

    pub fn with_config(dataset: &'d D, config: LocatorConfig) -> Self {
        Self {
            base: LocatorBase::new(dataset, config),
            tree: None,
        }
    }

    pub fn base(&self) -> &LocatorBase<'d, D> { &self.base }
    pub fn base_mut(&mut self) -> &mut LocatorBase<'d, D> { &mut self.base }

    /// A duplicate bound to a (possibly different) dataset handle, sharing
    /// the built tree and cache by reference rather than rebuilding (spec §3
    /// `shallow_copy`, §6 "Lifecycle", §9 "shared cache arrays").
    pub fn shallow_copy<'e>(&self, dataset: &'e D) -> UniformOctreeLocator<'e, D> {
        UniformOctreeLocator {
            base: self.base.shallow_copy_onto(dataset),
            tree: self.tree.clone(),
        }
    }

    /// Non-empty octant count at every level, summed (spec scenario 3).
    /// `None` if the index has not been built.
    pub fn non_empty_octant_count(&self) -> Option<usize> { self.tree.as_deref().map(OctreeTree::non_empty_octant_count) }

    fn derive_level(&self, num_cells: usize) -> u32 {
        let config = self.base.config();
        if !config.automatic() {
            return config.level();
        }
        let per_bucket = config.number_of_cells_per_node().max(1) as Number;
        let ratio = num_cells as Number / per_bucket;
        // Open question resolved (see DESIGN.md): the natural level can be
        // negative when `num_cells < per_bucket`; clamp to 0 so there is
        // always at least one (the root) leaf, then clamp by max_level.
        let raw = if ratio <= 1.0 { 0.0 } else { ratio.ln() / 8f64.ln() };
        let level = raw.ceil().max(0.0) as u32;
        level.min(config.max_level())
    }

    fn build_tree(&mut self, cache: &CellBoundsCache) -> Result<OctreeTree, BuildError> {
        let dataset = self.base.dataset();
        let raw_bounds = dataset.bounds();
        let length = dataset.length();
        let size = raw_bounds.size().to_vector();
        let padded_min_extent = length * DEGENERATE_AXIS_FRACTION;
        let bounds = if size.x <= padded_min_extent || size.y <= padded_min_extent || size.z <= padded_min_extent {
            raw_bounds.with_min_padding(length * DEGENERATE_AXIS_PADDING)
        } else {
            raw_bounds
        };

        let level = self.derive_level(dataset.num_cells());
        let ndivs = 1u32 << level;
        let extent = bounds.size().to_vector();
        let h = Vector3::new(
            extent.x / ndivs as Number,
            extent.y / ndivs as Number,
            extent.z / ndivs as Number,
        );

        debug!(target: BUILD, level, ndivs, "building uniform octree");

        let mut tree = OctreeTree {
            bounds,
            level,
            ndivs,
            h,
            leaves: vec![SmallVec::new(); (ndivs as usize).pow(3)],
            occupied: Vec::new(),
            lists_retained: self.base.config().retain_cell_lists(),
        };

        for cell_id in 0..dataset.num_cells() as CellId {
            let cell_bounds = cache.bounds_of(cell_id);
            let (i0, j0, k0) = tree.leaf_coord_of(cell_bounds.min());
            let (i1, j1, k1) = tree.leaf_coord_of(cell_bounds.max());
            for k in i_range(k0, k1) {
                for j in i_range(j0, j1) {
                    for i in i_range(i0, i1) {
                        let idx = tree.leaf_index(i, j, k);
                        tree.leaves[idx].push(cell_id);
                    }
                }
            }
        }

        tree.occupied = tree.leaves.iter().map(|l| !l.is_empty()).collect();
        if !tree.lists_retained {
            for leaf in &mut tree.leaves {
                leaf.clear();
            }
        }

        Ok(tree)
    }

    fn test_cell_at_point(&self, cell_id: CellId, x: Point3, tol2: Number) -> bool {
        let Some(cell) = self.base.dataset().get_cell(cell_id) else {
            return false;
        };
        if let Some(cache) = self.base.cache() {
            if !cache.contains(cell_id, x, self.base.config().tolerance()) {
                return false;
            }
        }
        cell.evaluate_position(x, tol2).is_inside()
    }
}

fn i_range(a: u32, b: u32) -> std::ops::RangeInclusive<u32> {
    if a <= b {
        a..=b
    } else {
        b..=a
    }
}

impl<'d, D: Dataset> CellLocator<D> for UniformOctreeLocator<'d, D> {
    fn build(&mut self) -> Result<BuildReport, BuildError> {
        if !self.base.needs_rebuild() {
            return Ok(self.base.build_report());
        }
        self.force_build()
    }

    fn force_build(&mut self) -> Result<BuildReport, BuildError> {
        let build_time = self.base.prepare_build()?;
        let cache = self.base.cache().cloned().unwrap_or_else(|| CellBoundsCache::build(self.base.dataset()));
        let tree = self.build_tree(&cache)?;
        self.tree = Some(Arc::new(tree));
        self.base.record_build(build_time);
        Ok(self.base.build_report())
    }

    fn free_search_structure(&mut self) {
        self.tree = None;
        self.base.free_search_structure();
    }

    fn find_cell(&self, x: Point3) -> Option<CellId> {
        let tree = self.tree.as_ref()?;
        if !tree.lists_retained {
            return None;
        }
        if !tree.bounds.contains_point(x, self.base.config().tolerance()) {
            return None;
        }
        let (i, j, k) = tree.leaf_coord_of(x);
        let leaf = &tree.leaves[tree.leaf_index(i, j, k)];
        let tol2 = self.base.config().tolerance().powi(2);
        leaf.iter().copied().find(|&cell_id| self.test_cell_at_point(cell_id, x, tol2))
    }

    fn intersect_with_line(&self, p1: Point3, p2: Point3, tol: Number) -> Option<Hit> {
        self.march(p1, p2, tol, false).into_iter().next()
    }

    fn intersect_with_line_all(&self, p1: Point3, p2: Point3, tol: Number) -> Vec<Hit> {
        let mut hits = self.march(p1, p2, tol, true);
        sort_hits_by_t(&mut hits);
        hits
    }

    fn find_closest_point(&self, x: Point3) -> Option<Hit> {
        let mut radius = self.base.dataset().length();
        for _ in 0..8 {
            if let Some(hit) = self.find_closest_point_within_radius(x, radius) {
                return Some(hit);
            }
            radius *= 2.0;
        }
        None
    }

    fn find_closest_point_within_radius(&self, x: Point3, radius: Number) -> Option<Hit> {
        let tree = self.tree.as_ref()?;
        if !tree.lists_retained {
            return None;
        }
        let data_len = self.base.dataset().length();
        let dist_to_bounds = tree.bounds.point_distance_squared(x).sqrt();
        let mut refined_radius = radius.min(dist_to_bounds + data_len);
        let (ci, cj, ck) = tree.leaf_coord_of(x);
        let max_ring = (tree.ndivs / 2).max(1);

        let mut best_hit: Option<Hit> = None;
        let mut best_dist2 = refined_radius * refined_radius;

        'rings: for ring in 0..=max_ring {
            if (ring as Number - 1.0) * tree.h.x.min(tree.h.y).min(tree.h.z) > refined_radius && ring > 0 {
                break 'rings;
            }
            let mut any_in_range = false;
            for_ring_cells(tree.ndivs, ci, cj, ck, ring, |i, j, k| {
                let leaf_box = tree.leaf_bounds(i, j, k);
                if leaf_box.point_distance_squared(x) >= best_dist2 {
                    return;
                }
                any_in_range = true;
                for &cell_id in &tree.leaves[tree.leaf_index(i, j, k)] {
                    let cell_dist2 = self
                        .base
                        .cache()
                        .map(|c| c.bounds_of(cell_id).point_distance_squared(x))
                        .unwrap_or(0.0);
                    if cell_dist2 >= best_dist2 {
                        continue;
                    }
                    let Some(cell) = self.base.dataset().get_cell(cell_id) else { continue };
                    if let crate::dataset::EvaluatePosition::Inside { dist2, sub_id, pcoords, .. } =
                        cell.evaluate_position(x, self.base.config().tolerance().powi(2))
                    {
                        if dist2 < best_dist2 {
                            best_dist2 = dist2;
                            refined_radius = best_dist2.sqrt();
                            best_hit = Some(Hit {
                                t: 0.0,
                                x,
                                pcoords,
                                sub_id,
                                cell_id,
                            });
                        }
                    }
                }
            });
            if ring > 0 && !any_in_range && best_hit.is_some() {
                break 'rings;
            }
        }
        best_hit
    }

    fn find_cells_within_bounds(&self, bbox: Aabb) -> Vec<CellId> {
        let Some(tree) = self.tree.as_ref() else { return Vec::new() };
        if !tree.lists_retained {
            return Vec::new();
        }
        let clamped_min: Point3 = [
            bbox.min().x.max(tree.bounds.min().x),
            bbox.min().y.max(tree.bounds.min().y),
            bbox.min().z.max(tree.bounds.min().z),
        ]
        .into();
        let clamped_max: Point3 = [
            bbox.max().x.min(tree.bounds.max().x),
            bbox.max().y.min(tree.bounds.max().y),
            bbox.max().z.min(tree.bounds.max().z),
        ]
        .into();
        if clamped_min.x > clamped_max.x || clamped_min.y > clamped_max.y || clamped_min.z > clamped_max.z {
            return Vec::new();
        }
        let (i0, j0, k0) = tree.leaf_coord_of(clamped_min);
        let (i1, j1, k1) = tree.leaf_coord_of(clamped_max);
        let mut out = Vec::new();
        for k in k0..=k1 {
            for j in j0..=j1 {
                for i in i0..=i1 {
                    out.extend(tree.leaves[tree.leaf_index(i, j, k)].iter().copied());
                }
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    fn find_cells_along_plane(&self, origin: Point3, normal: Vector3, tol: Number) -> Vec<CellId> {
        let Some(tree) = self.tree.as_ref() else { return Vec::new() };
        if !tree.lists_retained {
            return Vec::new();
        }
        let n = normal.normalize();
        let mut out = Vec::new();
        for (idx, leaf) in tree.leaves.iter().enumerate() {
            if leaf.is_empty() {
                continue;
            }
            let k = idx / (tree.ndivs as usize * tree.ndivs as usize);
            let j = (idx / tree.ndivs as usize) % tree.ndivs as usize;
            let i = idx % tree.ndivs as usize;
            let box_ = tree.leaf_bounds(i as u32, j as u32, k as u32);
            if corners_straddle_plane(&box_, origin, n, tol) {
                out.extend(leaf.iter().copied());
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    fn generate_representation(&self, level: u32) -> Vec<[Point3; 4]> {
        let Some(tree) = self.tree.as_ref() else { return Vec::new() };
        let _ = level; // the octree is uniform depth; every leaf is already at `self.level`.
        let n = tree.ndivs;
        let is_non_empty = |i: i64, j: i64, k: i64| -> bool {
            if i < 0 || j < 0 || k < 0 || i >= n as i64 || j >= n as i64 || k >= n as i64 {
                return false;
            }
            tree.occupied[tree.leaf_index(i as u32, j as u32, k as u32)]
        };
        let mut quads = Vec::new();
        for k in 0..n as i64 {
            for j in 0..n as i64 {
                for i in 0..n as i64 {
                    if !is_non_empty(i, j, k) {
                        continue;
                    }
                    let b = tree.leaf_bounds(i as u32, j as u32, k as u32);
                    let c = b.corners();
                    let neighbours = [
                        ((-1, 0, 0), [c[0], c[1], c[3], c[2]]),
                        ((1, 0, 0), [c[4], c[5], c[7], c[6]]),
                        ((0, -1, 0), [c[0], c[1], c[5], c[4]]),
                        ((0, 1, 0), [c[2], c[3], c[7], c[6]]),
                        ((0, 0, -1), [c[0], c[2], c[6], c[4]]),
                        ((0, 0, 1), [c[1], c[3], c[7], c[5]]),
                    ];
                    for ((di, dj, dk), quad) in neighbours {
                        if !is_non_empty(i + di, j + dj, k + dk) {
                            quads.push(quad);
                        }
                    }
                }
            }
        }
        quads
    }
}

fn corners_straddle_plane(b: &Aabb, origin: Point3, normal: Vector3, tol: Number) -> bool {
    let mut min_d = Number::INFINITY;
    let mut max_d = Number::NEG_INFINITY;
    for c in b.corners() {
        let d = (c - origin).dot(normal);
        min_d = min_d.min(d);
        max_d = max_d.max(d);
    }
    min_d <= tol && max_d >= -tol
}

/// Invokes `f(i, j, k)` for every leaf on the Chebyshev-distance-`ring`
/// boundary of `(ci, cj, ck)`, clamped to the grid (spec §4.4
/// `FindClosestPointWithinRadius`).
fn for_ring_cells(ndivs: u32, ci: u32, cj: u32, ck: u32, ring: u32, mut f: impl FnMut(u32, u32, u32)) {
    let n = ndivs as i64;
    let (ci, cj, ck) = (ci as i64, cj as i64, ck as i64);
    let r = ring as i64;
    if r == 0 {
        f(ci as u32, cj as u32, ck as u32);
        return;
    }
    for dk in -r..=r {
        for dj in -r..=r {
            for di in -r..=r {
                if di.abs() != r && dj.abs() != r && dk.abs() != r {
                    continue;
                }
                let (i, j, k) = (ci + di, cj + dj, ck + dk);
                if i < 0 || j < 0 || k < 0 || i >= n || j >= n || k >= n {
                    continue;
                }
                f(i as u32, j as u32, k as u32);
            }
        }
    }
}

impl<'d, D: Dataset> UniformOctreeLocator<'d, D> {
    /// Shared implementation of both single-hit and all-hits ray queries
    /// (spec §4.4 steps 1-5).
    fn march(&self, p1: Point3, p2: Point3, tol: Number, collect_all: bool) -> Vec<Hit> {
        let Some(tree) = self.tree.as_ref() else { return Vec::new() };
        if !tree.lists_retained {
            return Vec::new();
        }
        let seg = Segment::new(p1, p2);
        let Some((mut t_enter, t_exit)) = tree.bounds.intersect(&seg, &Interval::new(0.0, 1.0)) else {
            return Vec::new();
        };
        t_enter = t_enter.max(0.0);
        if t_enter > t_exit {
            return Vec::new();
        }

        let entry = seg.at(t_enter + tol.max(1e-9));
        let exit = seg.at(t_exit);
        let (mut i, mut j, mut k) = tree.leaf_coord_of(entry);
        let (i_end, j_end, k_end) = tree.leaf_coord_of(exit);

        let dir = seg.dir();
        let mut visited = VisitedSet::new(self.base.dataset().num_cells());
        let mut results = Vec::new();

        let axis_setup = |p0: Number, d: Number, idx: u32, h: Number, min: Number| -> (i32, Number, Number) {
            if d.abs() < Number::EPSILON {
                return (0, Number::INFINITY, Number::INFINITY);
            }
            let step = if d > 0.0 { 1 } else { -1 };
            let boundary = min + (idx as Number + if step > 0 { 1.0 } else { 0.0 }) * h;
            let t_max = (boundary - p0) / d;
            let t_delta = (h / d).abs();
            (step, t_max, t_delta)
        };

        let (step_x, mut t_max_x, t_delta_x) = axis_setup(seg.p1().x, dir.x, i, tree.h.x, tree.bounds.min().x);
        let (step_y, mut t_max_y, t_delta_y) = axis_setup(seg.p1().y, dir.y, j, tree.h.y, tree.bounds.min().y);
        let (step_z, mut t_max_z, t_delta_z) = axis_setup(seg.p1().z, dir.z, k, tree.h.z, tree.bounds.min().z);

        loop {
            let leaf = &tree.leaves[tree.leaf_index(i, j, k)];
            let voxel_box = tree.leaf_bounds(i, j, k);
            let mut best_in_voxel: Option<Hit> = None;

            for &cell_id in leaf {
                if visited.is_visited(cell_id) {
                    continue;
                }
                let reject_by_aabb = self
                    .base
                    .cache()
                    .map(|c| !c.bounds_of(cell_id).hit(&seg, &Interval::new(0.0, 1.0)))
                    .unwrap_or(false);
                if reject_by_aabb {
                    visited.mark(cell_id);
                    continue;
                }
                visited.mark(cell_id);
                let Some(cell) = self.base.dataset().get_cell(cell_id) else { continue };
                let Some(hit) = cell.intersect_with_line(p1, p2, tol) else { continue };
                if voxel_box.contains_point(hit.x, tol.max(1e-9)) {
                    let h = Hit {
                        t: hit.t,
                        x: hit.x,
                        pcoords: hit.pcoords,
                        sub_id: hit.sub_id,
                        cell_id,
                    };
                    if collect_all {
                        results.push(h);
                    } else {
                        match &best_in_voxel {
                            Some(prev) if prev.t <= h.t => {}
                            _ => best_in_voxel = Some(h),
                        }
                    }
                } else {
                    // Cell belongs to a different octant; allow a retry once
                    // the DDA reaches the octant the hit actually falls in.
                    visited.clear(cell_id);
                }
            }

            if !collect_all {
                if let Some(h) = best_in_voxel {
                    return vec![h];
                }
            }

            if (i, j, k) == (i_end, j_end, k_end) {
                break;
            }

            if t_max_x < t_max_y && t_max_x < t_max_z {
                if step_x == 0 || t_max_x > t_exit {
                    break;
                }
                let ni = i as i64 + step_x as i64;
                if ni < 0 || ni >= tree.ndivs as i64 {
                    break;
                }
                i = ni as u32;
                t_max_x += t_delta_x;
            } else if t_max_y < t_max_z {
                if step_y == 0 || t_max_y > t_exit {
                    break;
                }
                let nj = j as i64 + step_y as i64;
                if nj < 0 || nj >= tree.ndivs as i64 {
                    break;
                }
                j = nj as u32;
                t_max_y += t_delta_y;
            } else {
                if step_z == 0 || t_max_z > t_exit {
                    break;
                }
                let nk = k as i64 + step_z as i64;
                if nk < 0 || nk >= tree.ndivs as i64 {
                    break;
                }
                k = nk as u32;
                t_max_z += t_delta_z;
            }
        }

        results
    }
}
