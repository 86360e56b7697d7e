//! The locator family (spec §2 C3-C7): shared lifecycle, the query contract
//! every variant implements, and the three concrete index types.

pub mod base;
pub mod bih;
pub mod bsp;
pub mod octree;
pub mod query;

use getset::CopyGetters;

use crate::core::types::{CellId, Number, Point3, SubId};
use crate::dataset::Dataset;
use crate::geom::aabb::Aabb;

pub use base::LocatorConfig;

/// Outcome of a successful build (SUPPLEMENTED FEATURES #4): surfaces how
/// many cells had degenerate bounds and were included conservatively,
/// rather than leaving that count buried in a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct BuildReport {
    pub(crate) degenerate_cell_count: usize,
}

/// A single intersection/closest-point result (spec §6 `Hit`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    /// Parameter along the query segment, `[0, 1]`. Unused (`0.0`) for
    /// closest-point queries.
    pub t: Number,
    pub x: Point3,
    pub pcoords: [Number; 3],
    pub sub_id: SubId,
    pub cell_id: CellId,
}

impl Hit {
    fn by_t(&self) -> Number { self.t }
}

/// Orders hits by ascending `t`, ties broken by ascending `cell_id` (spec §5
/// "ordering guarantees").
pub(crate) fn sort_hits_by_t(hits: &mut [Hit]) {
    hits.sort_by(|a, b| {
        a.by_t()
            .partial_cmp(&b.by_t())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.cell_id.cmp(&b.cell_id))
    });
}

/// The query contract shared by every index variant (spec §2 C7, §6 "Locator
/// public API").
///
/// Implemented directly by [`octree::UniformOctreeLocator`],
/// [`bih::BihCellTreeLocator`] and [`bsp::BspCellTreeLocator`] rather than
/// through a shared base-struct method table: each variant's descent is
/// different enough (voxel DDA vs. two-plane descent vs. three-child
/// descent) that sharing only the signature, not the body, keeps the three
/// implementations independently readable (spec §9 "polymorphism over cell
/// kinds" applies to `Cell`, not to the locator itself).
pub trait CellLocator<D: Dataset> {
    /// Builds the index if it is missing or stale (spec §3 "Lifecycle").
    fn build(&mut self) -> Result<BuildReport, crate::error::BuildError>;

    /// Unconditionally rebuilds the index.
    fn force_build(&mut self) -> Result<BuildReport, crate::error::BuildError>;

    /// Releases the built index; the locator reverts to its pre-build state.
    fn free_search_structure(&mut self);

    fn find_cell(&self, x: Point3) -> Option<CellId>;

    fn intersect_with_line(&self, p1: Point3, p2: Point3, tol: Number) -> Option<Hit>;

    /// All intersections, sorted by ascending `t` (spec P3/P4).
    fn intersect_with_line_all(&self, p1: Point3, p2: Point3, tol: Number) -> Vec<Hit>;

    /// Unbounded closest-point search (SUPPLEMENTED FEATURES #1): seeded
    /// with `radius = dataset.length()`, doubling on an empty result.
    fn find_closest_point(&self, x: Point3) -> Option<Hit>;

    fn find_closest_point_within_radius(&self, x: Point3, radius: Number) -> Option<Hit>;

    fn find_cells_within_bounds(&self, bbox: Aabb) -> Vec<CellId>;

    /// Cell ids intersected anywhere along the segment (unsorted, deduped;
    /// a coarse sibling of [`CellLocator::intersect_with_line_all`] that
    /// skips computing hit geometry).
    fn find_cells_along_line(&self, p1: Point3, p2: Point3, tol: Number) -> Vec<CellId> {
        self.intersect_with_line_all(p1, p2, tol)
            .into_iter()
            .map(|h| h.cell_id)
            .collect()
    }

    /// Cell ids whose AABB straddles the plane through `origin` with normal
    /// `normal`, within `tol`.
    fn find_cells_along_plane(&self, origin: Point3, normal: crate::core::types::Vector3, tol: Number) -> Vec<CellId>;

    /// Debug-only wireframe of the tree structure at `level` (spec §4.4/4.6
    /// `GenerateRepresentation`): one quad per emitted face.
    fn generate_representation(&self, level: u32) -> Vec<[Point3; 4]>;
}
