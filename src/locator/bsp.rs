//! Axis-aligned BSP index with three children per node (spec §4.6, C6).
//!
//! Cells straddling a split collect in the middle child; each leaf
//! pre-sorts its cells into six lists (one per signed axis direction) so a
//! ray can be marched in dominant-axis order and stop as soon as the
//! nearest possible hit in the remaining cells is farther than the current
//! best.

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

const MAX_DEPTH: u32 = 64;

/// A ray direction tangent to a split plane (spec's "mustCheck" case) must
/// not be treated as exactly zero without some slack, or a ray merely
/// *close* to tangent would incorrectly skip the far side.
const TANGENT_EPS: Number = 1e-9;

/// Index into [`BspLeaf::lists`]: one entry per signed axis direction.
#[derive(Debug, Clone, Copy)]
enum SortDir {
    PlusX = 0,
    MinusX = 1,
    PlusY = 2,
    MinusY = 3,
    PlusZ = 4,
    MinusZ = 5,
}

fn sort_dir_for(axis: Axis, positive: bool) -> SortDir {
    match (axis, positive) {
        (Axis::X, true) => SortDir::PlusX,
        (Axis::X, false) => SortDir::MinusX,
        (Axis::Y, true) => SortDir::PlusY,
        (Axis::Y, false) => SortDir::MinusY,
        (Axis::Z, true) => SortDir::PlusZ,
        (Axis::Z, false) => SortDir::MinusZ,
    }
}

struct BspLeaf<L: Label> {
    /// Six cell-id lists, pre-sorted so marching in a given dominant signed
    /// axis direction visits cells in non-decreasing possible-entry order.
    lists: [Vec<L>; 6],
}

enum BspNode<L: Label> {
    Internal {
        axis: Axis,
        left_max: Number,
        right_min: Number,
        /// `[left, middle, right]`.
        children: [usize; 3],
    },
    Leaf(BspLeaf<L>),
}

struct BspTreeData<L: Label> {
    nodes: Vec<BspNode<L>>,
    root: usize,
    bounds: Aabb,
    /// SUPPLEMENTED FEATURES #3: when false, every leaf's six cell-id lists
    /// have been drained right after build and every query that would
    /// index them answers empty.
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

fn median_split(cells: &[CellInfo], axis: Axis) -> Number {
    let mut centers: Vec<Number> = cells.iter().map(|c| c.center(axis)).collect_vec();
    centers.sort_by(|a, b| a.partial_cmp(b).unwrap());
    centers[centers.len() / 2]
}

fn make_leaf<L: Label>(cells: &[CellInfo]) -> BspLeaf<L> {
    let mut lists: [Vec<L>; 6] = Default::default();
    for dir_idx in 0..6 {
        let mut ids: Vec<CellId> = cells.iter().map(|c| c.id).collect();
        match dir_idx {
            0 => ids.sort_by(|&a, &b| key_of(cells, a, Axis::X, true).partial_cmp(&key_of(cells, b, Axis::X, true)).unwrap()),
            1 => ids.sort_by(|&a, &b| key_of(cells, a, Axis::X, false).partial_cmp(&key_of(cells, b, Axis::X, false)).unwrap()),
            2 => ids.sort_by(|&a, &b| key_of(cells, a, Axis::Y, true).partial_cmp(&key_of(cells, b, Axis::Y, true)).unwrap()),
            3 => ids.sort_by(|&a, &b| key_of(cells, a, Axis::Y, false).partial_cmp(&key_of(cells, b, Axis::Y, false)).unwrap()),
            4 => ids.sort_by(|&a, &b| key_of(cells, a, Axis::Z, true).partial_cmp(&key_of(cells, b, Axis::Z, true)).unwrap()),
            _ => ids.sort_by(|&a, &b| key_of(cells, a, Axis::Z, false).partial_cmp(&key_of(cells, b, Axis::Z, false)).unwrap()),
        }
        lists[dir_idx] = ids.into_iter().map(|id| L::from_usize(id as usize)).collect();
    }
    BspLeaf { lists }
}

/// Sort key for cell `id` when marching in `axis`'s `positive`/negative
/// direction: ascending `min` for `+axis`, ascending `-max` for `-axis`, so
/// both lists are monotonic in "earliest possible entry t" order.
fn key_of(cells: &[CellInfo], id: CellId, axis: Axis, positive: bool) -> Number {
    let c = cells.iter().find(|c| c.id == id).expect("cell id must be present in its own leaf's cell list");
    if positive {
        axis.of_point(c.min)
    } else {
        -axis.of_point(c.max)
    }
}

fn build_bsp<L: Label>(cells: Vec<CellInfo>, bounds: Aabb, config: &LocatorConfig) -> Result<BspTreeData<L>, BuildError> {
    let mut nodes = vec![BspNode::Leaf(make_leaf::<L>(&cells))];
    let mut stack = vec![(0usize, cells, bounds, 0u32)];
    let per_node = config.number_of_cells_per_node() as usize;

    while let Some((node_idx, node_cells, node_bounds, depth)) = stack.pop() {
        if node_cells.len() <= per_node.max(1) {
            nodes[node_idx] = BspNode::Leaf(make_leaf::<L>(&node_cells));
            continue;
        }
        if depth > MAX_DEPTH {
            return Err(BuildError::TreeDepthExceeded { cap: MAX_DEPTH });
        }

        let axis = longest_axis(&node_bounds);
        let split = median_split(&node_cells, axis);

        let mut left = Vec::new();
        let mut middle = Vec::new();
        let mut right = Vec::new();
        for c in node_cells {
            let max_v = axis.of_point(c.max);
            let min_v = axis.of_point(c.min);
            if max_v < split {
                left.push(c);
            } else if min_v > split {
                right.push(c);
            } else {
                middle.push(c);
            }
        }

        if middle.len() == left.len() + middle.len() + right.len() {
            // Degenerate: every cell straddles the median (e.g. all cells
            // share the same extent along this axis). Force a leaf rather
            // than recursing forever on an unchanged partition.
            nodes[node_idx] = BspNode::Leaf(make_leaf::<L>(&middle));
            continue;
        }

        let left_max = left
            .iter()
            .chain(middle.iter())
            .map(|c| axis.of_point(c.max))
            .fold(Number::NEG_INFINITY, Number::max)
            .min(split);
        let right_min = right
            .iter()
            .chain(middle.iter())
            .map(|c| axis.of_point(c.min))
            .fold(Number::INFINITY, Number::min)
            .max(split);

        let mut left_box = node_bounds;
        let mut right_box = node_bounds;
        let mut middle_box = node_bounds;
        set_axis_max(&mut left_box, axis, left_max);
        set_axis_min(&mut right_box, axis, right_min);
        set_axis_max(&mut middle_box, axis, right_min);
        set_axis_min(&mut middle_box, axis, left_max);

        let left_idx = nodes.len();
        nodes.push(BspNode::Leaf(make_leaf::<L>(&[])));
        let middle_idx = nodes.len();
        nodes.push(BspNode::Leaf(make_leaf::<L>(&[])));
        let right_idx = nodes.len();
        nodes.push(BspNode::Leaf(make_leaf::<L>(&[])));

        nodes[node_idx] = BspNode::Internal {
            axis,
            left_max,
            right_min,
            children: [left_idx, middle_idx, right_idx],
        };

        stack.push((left_idx, left, left_box, depth + 1));
        stack.push((middle_idx, middle, middle_box, depth + 1));
        stack.push((right_idx, right, right_box, depth + 1));
    }

    let lists_retained = config.retain_cell_lists();
    if !lists_retained {
        for node in &mut nodes {
            if let BspNode::Leaf(leaf) = node {
                for list in &mut leaf.lists {
                    list.clear();
                    list.shrink_to_fit();
                }
            }
        }
    }

    Ok(BspTreeData { nodes, root: 0, bounds, lists_retained })
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

impl<L: Label> BspTreeData<L> {
    fn find_cell<D: Dataset>(&self, base: &LocatorBase<D>, x: Point3) -> Option<CellId> {
        if !self.lists_retained {
            return None;
        }
        let tol2 = base.config().tolerance().powi(2);
        let mut idx = self.root;
        loop {
            match &self.nodes[idx] {
                BspNode::Leaf(leaf) => {
                    for &l in &leaf.lists[0] {
                        let cell_id = l.to_usize() as CellId;
                        if test_cell_contains(base, cell_id, x, tol2) {
                            return Some(cell_id);
                        }
                    }
                    return None;
                }
                BspNode::Internal { axis, left_max, right_min, children } => {
                    let p = axis.of_point(x);
                    idx = if p < *left_max {
                        children[0]
                    } else if p > *right_min {
                        children[2]
                    } else {
                        children[1]
                    };
                }
            }
        }
    }

    fn intersect<D: Dataset>(&self, base: &LocatorBase<D>, seg: &Segment, tol: Number, collect_all: bool) -> Vec<Hit> {
        if !self.lists_retained {
            return Vec::new();
        }
        let mut out = Vec::new();
        let mut best_t = Number::INFINITY;
        let mut stack = vec![(self.root, 0.0 as Number, 1.0 as Number)];
        let origin = seg.p1();
        let dir = seg.dir();

        while let Some((idx, t_min, t_max)) = stack.pop() {
            if !collect_all && t_min > best_t {
                continue;
            }
            match &self.nodes[idx] {
                BspNode::Leaf(leaf) => {
                    self.march_leaf(base, leaf, seg, tol, collect_all, &mut best_t, &mut out);
                }
                BspNode::Internal { axis, left_max, right_min, children } => {
                    let d = axis.of_vector(dir);
                    let origin_v = axis.of_point(origin);

                    // Which region the origin itself sits in -- mirrors
                    // `find_cell`'s point classification. The near child is
                    // always this region, never guessed from direction sign
                    // alone: an origin already past a split must not treat
                    // the other side as near just because the ray happens to
                    // point back across the node's own centre.
                    let region = if origin_v < *left_max {
                        0
                    } else if origin_v > *right_min {
                        2
                    } else {
                        1
                    };

                    if d.abs() <= TANGENT_EPS {
                        // mustCheck: the ray is (near-)tangent to the split
                        // axis, so there's no reliable forward direction;
                        // visit the origin's own region plus the straddling
                        // middle.
                        stack.push((children[1], t_min, t_max));
                        stack.push((children[region], t_min, t_max));
                        continue;
                    }

                    let t_l = (left_max - origin_v) / d;
                    let t_r = (right_min - origin_v) / d;

                    if d > 0.0 {
                        match region {
                            0 => push_chain3(&mut stack, children[0], t_l, children[1], t_r, children[2], t_min, t_max),
                            1 => push_chain2(&mut stack, children[1], t_r, children[2], t_min, t_max),
                            _ => stack.push((children[2], t_min, t_max)),
                        }
                    } else {
                        match region {
                            2 => push_chain3(&mut stack, children[2], t_r, children[1], t_l, children[0], t_min, t_max),
                            1 => push_chain2(&mut stack, children[1], t_l, children[0], t_min, t_max),
                            _ => stack.push((children[0], t_min, t_max)),
                        }
                    }
                }
            }
        }
        out
    }

    fn march_leaf<D: Dataset>(
        &self,
        base: &LocatorBase<D>,
        leaf: &BspLeaf<L>,
        seg: &Segment,
        tol: Number,
        collect_all: bool,
        best_t: &mut Number,
        out: &mut Vec<Hit>,
    ) {
        let dominant = seg.dominant_axis();
        let positive = dominant.of_vector(seg.dir()) >= 0.0;
        let dir_idx = sort_dir_for(dominant, positive) as usize;
        let origin_v = dominant.of_point(seg.p1());
        let d = dominant.of_vector(seg.dir());

        for &l in &leaf.lists[dir_idx] {
            let cell_id = l.to_usize() as CellId;
            if !collect_all {
                if let Some(cache) = base.cache() {
                    let b = cache.bounds_of(cell_id);
                    // List order guarantees this coordinate is monotonic
                    // along the march direction, so its t is a lower bound
                    // on every remaining cell's entry t.
                    let coord = if positive { dominant.of_point(b.min()) } else { dominant.of_point(b.max()) };
                    let lower_t = if d.abs() > Number::EPSILON { (coord - origin_v) / d } else { Number::NEG_INFINITY };
                    if lower_t > *best_t {
                        break;
                    }
                }
            }

            if let Some(cache) = base.cache() {
                if !cache.bounds_of(cell_id).hit(seg, &Interval::new(0.0, 1.0)) {
                    continue;
                }
            }
            let Some(cell) = base.dataset().get_cell(cell_id) else { continue };
            let Some(hit) = cell.intersect_with_line(seg.p1(), seg.p2(), tol) else { continue };
            if !collect_all && hit.t >= *best_t {
                continue;
            }
            if !collect_all {
                *best_t = hit.t;
            }
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
            match &self.nodes[idx] {
                BspNode::Leaf(leaf) => out.extend(leaf.lists[0].iter().map(|l| l.to_usize() as CellId)),
                BspNode::Internal { axis, left_max, right_min, children } => {
                    let mut left_box = node_box;
                    let mut right_box = node_box;
                    set_axis_max(&mut left_box, *axis, *left_max);
                    set_axis_min(&mut right_box, *axis, *right_min);
                    stack.push((children[0], left_box));
                    stack.push((children[1], node_box));
                    stack.push((children[2], right_box));
                }
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }
}

/// Pushes two regions in travel order: `near` up to `r_dist`, then `far`
/// beyond it. `near` is pushed last so it pops first. `r_dist <= 0.0` means
/// the crossing is behind the ray's own start and can never be reached, as
/// opposed to `r_dist < t_min`, which means it was already crossed earlier
/// in the ray's timeline, before this node's window began.
fn push_chain2(stack: &mut Vec<(usize, Number, Number)>, near: usize, r_dist: Number, far: usize, t_min: Number, t_max: Number) {
    if r_dist > t_max || r_dist <= 0.0 {
        stack.push((near, t_min, t_max));
    } else if r_dist < t_min {
        stack.push((far, t_min, t_max));
    } else {
        stack.push((far, r_dist, t_max));
        stack.push((near, t_min, r_dist));
    }
}

/// Pushes three regions in travel order: `a` up to `t_a`, then `b` up to
/// `t_b`, then `c`. Same behind-the-ray vs. already-crossed distinction as
/// [`push_chain2`].
fn push_chain3(stack: &mut Vec<(usize, Number, Number)>, a: usize, t_a: Number, b: usize, t_b: Number, c: usize, t_min: Number, t_max: Number) {
    if t_a > t_max || t_a <= 0.0 {
        stack.push((a, t_min, t_max));
    } else if t_a < t_min {
        push_chain2(stack, b, t_b, c, t_min, t_max);
    } else {
        push_chain2(stack, b, t_b, c, t_a, t_max);
        stack.push((a, t_min, t_a));
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

fn test_cell_contains<D: Dataset>(base: &LocatorBase<D>, cell_id: CellId, x: Point3, tol2: Number) -> bool {
    if let Some(cache) = base.cache() {
        if !cache.contains(cell_id, x, base.config().tolerance()) {
            return false;
        }
    }
    let Some(cell) = base.dataset().get_cell(cell_id) else { return false };
    cell.evaluate_position(x, tol2).is_inside()
}

enum BspTree {
    Narrow(BspTreeData<u32>),
    Wide(BspTreeData<u64>),
}

/// Axis-aligned BSP locator with three children per node (spec §4.6).
pub struct BspCellTreeLocator<'d, D: Dataset> {
    base: LocatorBase<'d, D>,
    tree: Option<Arc<BspTree>>,
}

impl<'d, D: Dataset> BspCellTreeLocator<'d, D> {
    pub fn new(dataset: &'d D) -> Self {
        Self {
            base: LocatorBase::new(dataset, LocatorConfig::bsp_defaults()),
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
    pub fn shallow_copy<'e>(&self, dataset: &'e D) -> BspCellTreeLocator<'e, D> {
        BspCellTreeLocator {
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

impl<'d, D: Dataset> CellLocator<D> for BspCellTreeLocator<'d, D> {
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

        debug!(target: BUILD, num_cells = cells.len(), "building BSP tree");

        self.tree = Some(Arc::new(match label_width_for(self.base.dataset().num_cells()) {
            LabelWidth::Narrow => BspTree::Narrow(build_bsp::<u32>(cells, bounds, &config)?),
            LabelWidth::Wide => BspTree::Wide(build_bsp::<u64>(cells, bounds, &config)?),
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
            BspTree::Narrow(t) => t.find_cell(&self.base, x),
            BspTree::Wide(t) => t.find_cell(&self.base, x),
        }
    }

    fn intersect_with_line(&self, p1: Point3, p2: Point3, tol: Number) -> Option<Hit> {
        let Some(tree) = self.tree.as_deref() else { return None };
        let seg = Segment::new(p1, p2);
        let mut hits = match tree {
            BspTree::Narrow(t) => t.intersect(&self.base, &seg, tol, false),
            BspTree::Wide(t) => t.intersect(&self.base, &seg, tol, false),
        };
        sort_hits_by_t(&mut hits);
        hits.into_iter().next()
    }

    fn intersect_with_line_all(&self, p1: Point3, p2: Point3, tol: Number) -> Vec<Hit> {
        let Some(tree) = self.tree.as_deref() else { return Vec::new() };
        let seg = Segment::new(p1, p2);
        let mut hits = match tree {
            BspTree::Narrow(t) => t.intersect(&self.base, &seg, tol, true),
            BspTree::Wide(t) => t.intersect(&self.base, &seg, tol, true),
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
            Some(BspTree::Narrow(t)) => t.find_cells_within_bounds(bbox),
            Some(BspTree::Wide(t)) => t.find_cells_within_bounds(bbox),
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
            Some(BspTree::Narrow(t)) => generate_representation(t, level),
            Some(BspTree::Wide(t)) => generate_representation(t, level),
            None => Vec::new(),
        }
    }
}

fn generate_representation<L: Label>(tree: &BspTreeData<L>, level: u32) -> Vec<[Point3; 4]> {
    let mut quads = Vec::new();
    let mut stack = vec![(tree.root, tree.bounds, 0u32)];
    while let Some((idx, b, depth)) = stack.pop() {
        if depth >= level {
            push_box_quads(&b, &mut quads);
            continue;
        }
        match &tree.nodes[idx] {
            BspNode::Leaf(_) => push_box_quads(&b, &mut quads),
            BspNode::Internal { axis, left_max, right_min, children } => {
                let mut left_box = b;
                let mut right_box = b;
                set_axis_max(&mut left_box, *axis, *left_max);
                set_axis_min(&mut right_box, *axis, *right_min);
                stack.push((children[0], left_box, depth + 1));
                stack.push((children[2], right_box, depth + 1));
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
