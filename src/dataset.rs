//! External interfaces (spec §6): the mesh and per-cell geometry this crate
//! consumes but does not own.
//!
//! Everything here is a contract, not an implementation — cell geometry,
//! field interpolation and mesh storage belong to the caller. The locators
//! only ever go through [`Dataset`]/[`Cell`].

use crate::core::types::{CellId, Number, Point3, SubId};
use crate::geom::aabb::Aabb;
use smallvec::SmallVec;

/// Outcome of testing whether a point lies inside a cell.
///
/// Mirrors `vtkCell::EvaluatePosition`'s three-way return, reused verbatim
/// by every locator's `find_cell`/ray-intersection early-accept logic (spec
/// §7 item 3 treats this as a pure predicate: it never errors, it only
/// classifies).
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluatePosition {
    /// `x` is inside the cell (within `tol2`).
    Inside {
        sub_id: SubId,
        /// Parametric coordinates of `x` within the cell.
        pcoords: [Number; 3],
        /// Squared distance from `x` to its closest point on/in the cell.
        dist2: Number,
        /// Interpolation weights, one per [`Cell::point_ids`] entry.
        weights: SmallVec<[Number; 8]>,
    },
    Outside,
    /// The cell's geometry could not be evaluated (e.g. zero volume).
    Degenerate,
}

impl EvaluatePosition {
    pub fn is_inside(&self) -> bool { matches!(self, Self::Inside { .. }) }
}

/// Result of a single cell's line-segment intersection test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntersectWithLine {
    /// Parameter along the query segment, in `[0, 1]`.
    pub t: Number,
    /// World-space intersection point.
    pub x: Point3,
    pub pcoords: [Number; 3],
    pub sub_id: SubId,
}

/// A single mesh element: tetrahedron, hexahedron, wedge, pyramid, polygon,
/// or polyhedron (spec §9: reimplemented as a capability trait rather than a
/// virtual-dispatch class hierarchy; callers that need a closed sum type can
/// implement this trait once on their own `enum Cell { .. }`).
pub trait Cell {
    /// Point ids into the owning [`Dataset`]'s point array.
    fn point_ids(&self) -> &[usize];

    /// Classifies `x` as inside, outside, or degenerate, filling
    /// interpolation data when inside.
    fn evaluate_position(&self, x: Point3, tol2: Number) -> EvaluatePosition;

    /// Intersects the finite segment `p1..p2` with this cell's surface,
    /// within tolerance `tol`.
    fn intersect_with_line(&self, p1: Point3, p2: Point3, tol: Number) -> Option<IntersectWithLine>;
}

/// The mesh a locator indexes: cells referencing vertex indices into a
/// shared point array (spec §6).
///
/// Non-owning by design (spec §9 "cyclic owner/dataset relations"): a
/// locator holds a borrow of its `Dataset`, never the reverse.
pub trait Dataset {
    type Cell: Cell;

    fn num_cells(&self) -> usize;
    fn num_points(&self) -> usize;

    /// The dataset's outer axis-aligned bounding box.
    fn bounds(&self) -> Aabb;

    /// Diagonal length of [`Dataset::bounds`]; used to derive degenerate-axis
    /// padding and the `find_closest_point` unbounded search seed.
    fn length(&self) -> Number { self.bounds().diagonal_length() }

    fn get_point(&self, point_id: usize) -> Point3;

    /// Returns `None` for an out-of-range id; never panics.
    fn get_cell(&self, cell_id: CellId) -> Option<Self::Cell>;

    /// Monotonically increasing timestamp, bumped whenever the dataset's
    /// geometry changes. Compared against the locator's build timestamp to
    /// decide whether `build()` may skip rebuilding (spec §3 "Lifecycle").
    fn modification_time(&self) -> u64;
}
