//! Bounding Interval Hierarchy index (spec §4.5, C5; Garth-Joy 2010).
//!
//! Each internal node carries two overlapping split planes along one axis
//! (`left_max`, `right_min`); every cell lives in exactly one leaf. Built
//! top-down by SAH-like bucket costing with an explicit work stack rather
//! than recursion (spec §9 "coroutine-like traversal").

use std::sync::Arc;

use itertools::Itertools;
use tracing::debug;

use crate::cache::CellBoundsCache;
use crate::core::targets::BUILD;
use crate::core::types::{label_width_for, CellId, Label, LabelWidth, Number, Point3, Vector3};
use crate::dataset::{Cell, Dataset};
use crate::error::BuildError;
use crate::geom::aabb::Aabb;
use crate::geom::interval::Interval;
use crate::geom::ray::{Axis, Segment};
use crate::locator::base::{LocatorBase, LocatorConfig};
use crate::locator::{sort_hits_by_t, BuildReport, CellLocator, Hit};

/// Hard cap on recursion depth (spec §4.5 "maximum tree depth is bounded by
/// a compile-time limit").
const MAX_DEPTH: u32 = 64;

#[derive(Debug, Clone, Copy)]
enum BihNode {
    Internal {
        axis: Axis,
        left_max: Number,
        right_min: Number,
        left: usize,
        right: usize,
    },
    Leaf {
        start: usize,
        len: usize,
    },
}

/// The built tree, generic over the internal cell-id storage width (spec §5
/// "label widths are selectable at build time"). `order` is a permutation of
/// every cell id in the dataset; each leaf indexes a contiguous slice of it.
struct BihTreeData<L: Label> {
    nodes: Vec<BihNode>,
    order: Vec<L>,
    root: usize,
    bounds: Aabb,
    /// SUPPLEMENTED FEATURES #3: when false, `order` has been drained right
    /// after build and every query that would index it answers empty.
    lists_retained: bool,
}

struct CellInfo {
    id: CellId,
    min: Point3,
    max: Point3,
}

impl CellInfo {
    fn center(&self, axis: Axis) -> Number { (axis.of_point(self.min) + axis.of_point(self.max)) / 2.0 }
}

fn longest_axis(bounds: &Aabb) -> Axis {
    use strum::IntoEnumIterator;
    Axis::iter()
        .max_by(|a, b| bounds.extent(*a).partial_cmp(&bounds.extent(*b)).unwrap())
        .unwrap_or(Axis::X)
}

/// Chooses a split axis/position by SAH-like bucket costing (spec §4.5
/// steps 2-4), falling back to a longest-axis median split (step 5, and the
/// Open Question this crate documents in `DESIGN.md`) when no bucket
/// boundary leaves both sides non-empty.
fn choose_split(cells: &[CellInfo], bounds: &Aabb, number_of_buckets: u32) -> (Axis, Number) {
    use strum::IntoEnumIterator;
    const NUM_BUCKETS_CAP: usize = 32;
    let buckets = (number_of_buckets as usize).clamp(2, NUM_BUCKETS_CAP);

    let mut best: Option<(Axis, Number, Number)> = None; // (axis, split, cost)

    for axis in Axis::iter() {
        let extent = bounds.extent(axis);
        if extent <= 0.0 {
            continue;
        }
        let axis_min = axis.of_point(bounds.min());

        let mut counts = vec![0u32; buckets];
        let mut bmin = vec![Number::INFINITY; buckets];
        let mut bmax = vec![Number::NEG_INFINITY; buckets];

        for c in cells {
            let center = c.center(axis);
            let frac = ((center - axis_min) / extent).clamp(0.0, 0.999_999_9);
            let b = (frac * buckets as Number) as usize;
            let b = b.min(buckets - 1);
            counts[b] += 1;
            bmin[b] = bmin[b].min(axis.of_point(c.min));
            bmax[b] = bmax[b].max(axis.of_point(c.max));
        }

        for n in 0..buckets - 1 {
            let left_count: u32 = counts[..=n].iter().sum();
            let right_count: u32 = counts[n + 1..].iter().sum();
            if left_count == 0 || right_count == 0 {
                continue;
            }
            let left_max = bmax[..=n].iter().copied().fold(Number::NEG_INFINITY, Number::max);
            let right_min = bmin[n + 1..].iter().copied().fold(Number::INFINITY, Number::min);
            let left_ratio = (left_max - axis_min) / extent;
            let right_ratio = (axis.of_point(bounds.max()) - right_min) / extent;
            let cost = left_ratio * left_count as Number + right_ratio * right_count as Number;

            let split = axis_min + (n as Number + 1.0) * extent / buckets as Number;
            if best.as_ref().map(|(_, _, c)| cost < *c).unwrap_or(true) {
                best = Some((axis, split, cost));
            }
        }
    }

    if let Some((axis, split, _)) = best {
        return (axis, split);
    }

    // Fallback: longest-axis median split. Must terminate even when every
    // cell shares the same center (all on one side of any split): selecting
    // the exact median index guarantees a non-trivial partition as long as
    // `cells.len() >= 2`, which the caller already ensures before calling in.
    let axis = longest_axis(bounds);
    let mid = cells.len() / 2;
    let mut centers: Vec<Number> = cells.iter().map(|c| c.center(axis)).collect_vec();
    centers.sort_by(|a, b| a.partial_cmp(b).unwrap());
    (axis, centers[mid])
}

fn build_bih<L: Label>(cells: Vec<CellInfo>, bounds: Aabb, config: &LocatorConfig) -> Result<BihTreeData<L>, BuildError> {
    let mut nodes = vec![BihNode::Leaf { start: 0, len: cells.len() }];
    let mut order: Vec<CellInfo> = cells;
    let mut stack = vec![(0usize, 0usize, order.len(), bounds, 0u32)];

    while let Some((node_idx, start, len, node_bounds, depth)) = stack.pop() {
        if depth > MAX_DEPTH {
            return Err(BuildError::TreeDepthExceeded { cap: MAX_DEPTH });
        }
        if len <= config.number_of_cells_per_node() as usize || len < 2 {
            nodes[node_idx] = BihNode::Leaf { start, len };
            continue;
        }

        let (axis, split) = choose_split(&order[start..start + len], &node_bounds, config.number_of_buckets());

        let slice = &mut order[start..start + len];
        let mid = partition_by(slice, axis, split);
        let (mid, axis, split) = if mid == 0 || mid == len {
            // Bucket costing picked a split with an empty side after all
            // (can happen with heavily clustered centers); force the
            // longest-axis median fallback so the recursion still makes
            // progress.
            let fallback_axis = longest_axis(&node_bounds);
            let mut centers: Vec<Number> = slice.iter().map(|c| c.center(fallback_axis)).collect_vec();
            centers.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let fallback_split = centers[len / 2];
            let fallback_mid = partition_by(slice, fallback_axis, fallback_split);
            let fallback_mid = fallback_mid.clamp(1, len - 1);
            (fallback_mid, fallback_axis, fallback_split)
        } else {
            (mid, axis, split)
        };

        let left_max = slice[..mid]
            .iter()
            .map(|c| axis.of_point(c.max))
            .fold(Number::NEG_INFINITY, Number::max);
        let right_min = slice[mid..]
            .iter()
            .map(|c| axis.of_point(c.min))
            .fold(Number::INFINITY, Number::min);
        let _ = split;

        let left_bounds = Aabb::encompass_points(slice[..mid].iter().flat_map(|c| [c.min, c.max]));
        let right_bounds = Aabb::encompass_points(slice[mid..].iter().flat_map(|c| [c.min, c.max]));

        let left_idx = nodes.len();
        nodes.push(BihNode::Leaf { start, len: mid });
        let right_idx = nodes.len();
        nodes.push(BihNode::Leaf {
            start: start + mid,
            len: len - mid,
        });

        nodes[node_idx] = BihNode::Internal {
            axis,
            left_max,
            right_min,
            left: left_idx,
            right: right_idx,
        };

        stack.push((left_idx, start, mid, left_bounds, depth + 1));
        stack.push((right_idx, start + mid, len - mid, right_bounds, depth + 1));
    }

    let mut order: Vec<L> = order.into_iter().map(|c| L::from_usize(c.id as usize)).collect();
    let lists_retained = config.retain_cell_lists();
    if !lists_retained {
        order = Vec::new();
        order.shrink_to_fit();
    }
    Ok(BihTreeData {
        nodes,
        order,
        root: 0,
        bounds,
        lists_retained,
    })
}

/// Partitions `cells` in place by `(min+max)/2 < split` along `axis`,
/// returning the boundary index (spec §4.5 step 4).
fn partition_by(cells: &mut [CellInfo], axis: Axis, split: Number) -> usize {
    let mut i = 0;
    for j in 0..cells.len() {
        if cells[j].center(axis) < split {
            cells.swap(i, j);
            i += 1;
        }
    }
    i
}

impl<L: Label> BihTreeData<L> {
    fn cell_ids(&self, start: usize, len: usize) -> impl Iterator<Item = CellId> + '_ {
        self.order[start..start + len].iter().map(|l| l.to_usize() as CellId)
    }

    fn find_cell<D: Dataset>(&self, base: &LocatorBase<D>, x: Point3) -> Option<CellId> {
        if !self.lists_retained {
            return None;
        }
        let tol2 = base.config().tolerance().powi(2);
        let mut stack = vec![self.root];
        while let Some(idx) = stack.pop() {
            match self.nodes[idx] {
                BihNode::Leaf { start, len } => {
                    for cell_id in self.cell_ids(start, len) {
                        if test_cell_contains(base, cell_id, x, tol2) {
                            return Some(cell_id);
                        }
                    }
                }
                BihNode::Internal {
                    axis,
                    left_max,
                    right_min,
                    left,
                    right,
                } => {
                    let p = axis.of_point(x);
                    let tol = base.config().tolerance();
                    let visit_left = p <= left_max + tol;
                    let visit_right = p >= right_min - tol;
                    if visit_left && visit_right {
                        stack.push(right);
                        stack.push(left);
                    } else if visit_left {
                        stack.push(left);
                    } else if visit_right {
                        stack.push(right);
                    }
                }
            }
        }
        None
    }

    /// Ray descent with classification (spec §4.5 "IntersectWithLine —
    /// descent with classification"). Collects every accepted hit; callers
    /// pick the minimum for the single-hit form.
    fn intersect_all<D: Dataset>(&self, base: &LocatorBase<D>, seg: &Segment, tol: Number) -> Vec<Hit> {
        if !self.lists_retained {
            return Vec::new();
        }
        let mut out = Vec::new();
        let mut stack = vec![(self.root, 0.0 as Number, 1.0 as Number)];
        let origin = seg.p1();
        let dir = seg.dir();

        while let Some((idx, t_min, t_max)) = stack.pop() {
            match self.nodes[idx] {
                BihNode::Leaf { start, len } => {
                    for cell_id in self.cell_ids(start, len) {
                        self.test_cell_ray(base, cell_id, seg, tol, &mut out);
                    }
                }
                BihNode::Internal {
                    axis,
                    left_max,
                    right_min,
                    left,
                    right,
                } => {
                    let origin_v = axis.of_point(origin);
                    let d = axis.of_vector(dir);
                    let t_l = if d.abs() > Number::EPSILON { (left_max - origin_v) / d } else { Number::INFINITY };
                    let t_r = if d.abs() > Number::EPSILON { (right_min - origin_v) / d } else { Number::INFINITY };

                    if origin_v < right_min {
                        push_near_far(&mut stack, left, right, t_r, t_min, t_max);
                    } else if origin_v > left_max {
                        push_near_far(&mut stack, right, left, t_l, t_min, t_max);
                    } else {
                        stack.push((right, t_min, t_max));
                        stack.push((left, t_min, t_max));
                    }
                }
            }
        }
        out
    }

    fn test_cell_ray<D: Dataset>(&self, base: &LocatorBase<D>, cell_id: CellId, seg: &Segment, tol: Number, out: &mut Vec<Hit>) {
        if let Some(cache) = base.cache() {
            if !cache.bounds_of(cell_id).hit(seg, &Interval::new(0.0, 1.0)) {
                return;
            }
        }
        let Some(cell) = base.dataset().get_cell(cell_id) else { return };
        if let Some(hit) = cell.intersect_with_line(seg.p1(), seg.p2(), tol) {
            out.push(Hit {
                t: hit.t,
                x: hit.x,
                pcoords: hit.pcoords,
                sub_id: hit.sub_id,
                cell_id,
            });
        }
    }

    fn find_cells_within_bounds(&self, query: Aabb) -> Vec<CellId> {
        if !self.lists_retained {
            return Vec::new();
        }
        let mut out = Vec::new();
        let mut stack = vec![(self.root, self.bounds)];
        while let Some((idx, node_box)) = stack.pop() {
            if disjoint(&node_box, &query) {
                continue;
            }
            match self.nodes[idx] {
                BihNode::Leaf { start, len } => out.extend(self.cell_ids(start, len)),
                BihNode::Internal {
                    axis,
                    left_max,
                    right_min,
                    left,
                    right,
                } => {
                    let mut left_box = node_box;
                    let mut right_box = node_box;
                    set_axis_max(&mut left_box, axis, left_max);
                    set_axis_min(&mut right_box, axis, right_min);
                    stack.push((left, left_box));
                    stack.push((right, right_box));
                }
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }
}

fn push_near_far(stack: &mut Vec<(usize, Number, Number)>, near: usize, far: usize, r_dist: Number, t_min: Number, t_max: Number) {
    if r_dist > t_max || r_dist <= 0.0 {
        stack.push((near, t_min, t_max));
    } else if r_dist < t_min {
        stack.push((far, t_min, t_max));
    } else {
        stack.push((far, r_dist, t_max));
        stack.push((near, t_min, r_dist));
    }
}

fn disjoint(a: &Aabb, b: &Aabb) -> bool {
    a.max().x < b.min().x
        || b.max().x < a.min().x
        || a.max().y < b.min().y
        || b.max().y < a.min().y
        || a.max().z < b.min().z
        || b.max().z < a.min().z
}

fn set_axis_max(b: &mut Aabb, axis: Axis, value: Number) {
    let mut max = b.max();
    match axis {
        Axis::X => max.x = value,
        Axis::Y => max.y = value,
        Axis::Z => max.z = value,
    }
    *b = Aabb::new(b.min(), max);
}

fn set_axis_min(b: &mut Aabb, axis: Axis, value: Number) {
    let mut min = b.min();
    match axis {
        Axis::X => min.x = value,
        Axis::Y => min.y = value,
        Axis::Z => min.z = value,
    }
    *b = Aabb::new(min, b.max());
}

fn test_cell_contains<D: Dataset>(base: &LocatorBase<D>, cell_id: CellId, x: Point3, tol2: Number) -> bool {
    if let Some(cache) = base.cache() {
        if !cache.contains(cell_id, x, base.config().tolerance()) {
            return false;
        }
    }
    let Some(cell) = base.dataset().get_cell(cell_id) else { return false };
    cell.evaluate_position(x, tol2).is_inside()
}

enum BihTree {
    Narrow(BihTreeData<u32>),
    Wide(BihTreeData<u64>),
}

/// Bounding Interval Hierarchy locator (spec §4.5).
pub struct BihCellTreeLocator<'d, D: Dataset> {
    base: LocatorBase<'d, D>,
    tree: Option<Arc<BihTree>>,
}

impl<'d, D: Dataset> BihCellTreeLocator<'d, D> {
    pub fn new(dataset: &'d D) -> Self {
        Self {
            base: LocatorBase::new(dataset, LocatorConfig::bih_defaults()),
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
    /// the built tree and cache by reference rather than rebuilding.
    pub fn shallow_copy<'e>(&self, dataset: &'e D) -> BihCellTreeLocator<'e, D> {
        BihCellTreeLocator {
            base: self.base.shallow_copy_onto(dataset),
            tree: self.tree.clone(),
        }
    }

    fn gather_cell_infos(&self, cache: &CellBoundsCache) -> Vec<CellInfo> {
        (0..self.base.dataset().num_cells())
            .map(|i| {
                let id = i as CellId;
                let b = cache.bounds_of(id);
                CellInfo { id, min: b.min(), max: b.max() }
            })
            .collect()
    }
}

impl<'d, D: Dataset> CellLocator<D> for BihCellTreeLocator<'d, D> {
    fn build(&mut self) -> Result<BuildReport, BuildError> {
        if !self.base.needs_rebuild() {
            return Ok(self.base.build_report());
        }
        self.force_build()
    }

    fn force_build(&mut self) -> Result<BuildReport, BuildError> {
        let build_time = self.base.prepare_build()?;
        let cache = self.base.cache().cloned().unwrap_or_else(|| CellBoundsCache::build(self.base.dataset()));
        let cells = self.gather_cell_infos(&cache);
        let bounds = self.base.dataset().bounds();
        let config = self.base.config().clone();

        debug!(target: BUILD, num_cells = cells.len(), "building BIH tree");

        self.tree = Some(Arc::new(match label_width_for(self.base.dataset().num_cells()) {
            LabelWidth::Narrow => BihTree::Narrow(build_bih::<u32>(cells, bounds, &config)?),
            LabelWidth::Wide => BihTree::Wide(build_bih::<u64>(cells, bounds, &config)?),
        }));
        self.base.record_build(build_time);
        Ok(self.base.build_report())
    }

    fn free_search_structure(&mut self) {
        self.tree = None;
        self.base.free_search_structure();
    }

    fn find_cell(&self, x: Point3) -> Option<CellId> {
        match self.tree.as_deref()? {
            BihTree::Narrow(t) => t.find_cell(&self.base, x),
            BihTree::Wide(t) => t.find_cell(&self.base, x),
        }
    }

    fn intersect_with_line(&self, p1: Point3, p2: Point3, tol: Number) -> Option<Hit> {
        self.intersect_with_line_all(p1, p2, tol).into_iter().next()
    }

    fn intersect_with_line_all(&self, p1: Point3, p2: Point3, tol: Number) -> Vec<Hit> {
        let Some(tree) = self.tree.as_deref() else { return Vec::new() };
        let seg = Segment::new(p1, p2);
        let mut hits = match tree {
            BihTree::Narrow(t) => t.intersect_all(&self.base, &seg, tol),
            BihTree::Wide(t) => t.intersect_all(&self.base, &seg, tol),
        };
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
        // No spatial descent is specified for BIH closest-point in spec
        // §4.5; fall back to a full scan of cells within `radius` using the
        // shared cache, same as the brute-force reference used in tests.
        let cache = self.base.cache()?;
        let mut best: Option<Hit> = None;
        let mut best_dist2 = radius * radius;
        for cell_id in 0..self.base.dataset().num_cells() as CellId {
            if cache.bounds_of(cell_id).point_distance_squared(x) >= best_dist2 {
                continue;
            }
            let Some(cell) = self.base.dataset().get_cell(cell_id) else { continue };
            if let crate::dataset::EvaluatePosition::Inside { dist2, sub_id, pcoords, .. } =
                cell.evaluate_position(x, self.base.config().tolerance().powi(2))
            {
                if dist2 < best_dist2 {
                    best_dist2 = dist2;
                    best = Some(Hit {
                        t: 0.0,
                        x,
                        pcoords,
                        sub_id,
                        cell_id,
                    });
                }
            }
        }
        best
    }

    fn find_cells_within_bounds(&self, bbox: Aabb) -> Vec<CellId> {
        match self.tree.as_deref() {
            Some(BihTree::Narrow(t)) => t.find_cells_within_bounds(bbox),
            Some(BihTree::Wide(t)) => t.find_cells_within_bounds(bbox),
            None => Vec::new(),
        }
    }

    fn find_cells_along_plane(&self, origin: Point3, normal: Vector3, tol: Number) -> Vec<CellId> {
        let Some(cache) = self.base.cache() else { return Vec::new() };
        let n = normal.normalize();
        let mut out = Vec::new();
        for cell_id in 0..self.base.dataset().num_cells() as CellId {
            let b = cache.bounds_of(cell_id);
            let mut min_d = Number::INFINITY;
            let mut max_d = Number::NEG_INFINITY;
            for c in b.corners() {
                let d = (c - origin).dot(n);
                min_d = min_d.min(d);
                max_d = max_d.max(d);
            }
            if min_d <= tol && max_d >= -tol {
                out.push(cell_id);
            }
        }
        out
    }

    fn generate_representation(&self, level: u32) -> Vec<[Point3; 4]> {
        match self.tree.as_deref() {
            Some(BihTree::Narrow(t)) => generate_representation(t, level),
            Some(BihTree::Wide(t)) => generate_representation(t, level),
            None => Vec::new(),
        }
    }
}

/// Walks the tree emitting node-box wireframes down to `level` (spec §4.6's
/// `GenerateRepresentation` description applies equally to BIH: split the
/// parent box using `left_max`/`right_min`).
fn generate_representation<L: Label>(tree: &BihTreeData<L>, level: u32) -> Vec<[Point3; 4]> {
    let mut quads = Vec::new();
    let mut stack = vec![(tree.root, tree.bounds, 0u32)];
    while let Some((idx, b, depth)) = stack.pop() {
        if depth >= level {
            push_box_quads(&b, &mut quads);
            continue;
        }
        match tree.nodes[idx] {
            BihNode::Leaf { .. } => push_box_quads(&b, &mut quads),
            BihNode::Internal {
                axis,
                left_max,
                right_min,
                left,
                right,
            } => {
                let mut left_box = b;
                let mut right_box = b;
                set_axis_max(&mut left_box, axis, left_max);
                set_axis_min(&mut right_box, axis, right_min);
                stack.push((left, left_box, depth + 1));
                stack.push((right, right_box, depth + 1));
            }
        }
    }
    quads
}

fn push_box_quads(b: &Aabb, quads: &mut Vec<[Point3; 4]>) {
    let c = b.corners();
    quads.push([c[0], c[1], c[3], c[2]]);
    quads.push([c[4], c[5], c[7], c[6]]);
    quads.push([c[0], c[1], c[5], c[4]]);
    quads.push([c[2], c[3], c[7], c[6]]);
    quads.push([c[0], c[2], c[6], c[4]]);
    quads.push([c[1], c[3], c[7], c[5]]);
}
