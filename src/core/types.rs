//! Numeric and geometric type aliases shared by every module in the crate.

/// Numeric type used for all geometric calculations.
///
/// The locators operate in double precision throughout, matching the
/// floating-point width used by the meshes (and cell-geometry routines)
/// they index.
pub type Number = f64;

pub type Vector3 = glamour::Vector3<Number>;
pub type Point3 = glamour::Point3<Number>;
pub type Size3 = glamour::Size3<Number>;

/// Identifies a cell within a bound [`crate::dataset::Dataset`].
///
/// A negative value (`-1` by convention, see [`NO_CELL`]) denotes "no cell";
/// this mirrors the calling convention of the original locator family this
/// crate is modelled on, where `FindCell` returns `vtkIdType` and uses `-1`
/// as the sentinel for "not found" rather than an `Option`.
pub type CellId = i64;

/// Sentinel returned by queries that found no matching cell.
pub const NO_CELL: CellId = -1;

static_assertions::const_assert!(NO_CELL < 0);

/// A sub-cell index, used by cells composed of multiple geometric primitives
/// (e.g. a polyhedron's constituent faces). Meaningless (always `0`) for
/// single-primitive cells.
pub type SubId = i32;

/// Internal index width for a built tree's node/permutation arrays (spec §5
/// "label widths are selectable at build time"): `u32` below 2^31 cells,
/// `u64` at or above it. The public [`CellId`] is unaffected — this only
/// changes how compactly a built [`crate::locator::bih`]/[`crate::locator::bsp`]
/// tree stores its internal arrays.
pub trait Label: Copy + Ord + std::fmt::Debug + Send + Sync + 'static {
    const MAX_COUNT: u64;
    fn from_usize(v: usize) -> Self;
    fn to_usize(self) -> usize;
}

impl Label for u32 {
    const MAX_COUNT: u64 = 1 << 31;
    fn from_usize(v: usize) -> Self { v as u32 }
    fn to_usize(self) -> usize { self as usize }
}

impl Label for u64 {
    const MAX_COUNT: u64 = u64::MAX;
    fn from_usize(v: usize) -> Self { v as u64 }
    fn to_usize(self) -> usize { self as usize }
}

/// Chooses the narrowest [`Label`] width that can address `num_cells` cells,
/// matching spec §5's 2^31 threshold.
pub fn label_width_for(num_cells: usize) -> LabelWidth {
    if (num_cells as u64) < u32::MAX_COUNT {
        LabelWidth::Narrow
    } else {
        LabelWidth::Wide
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelWidth {
    Narrow,
    Wide,
}
