//! Spatial cell locators for unstructured 3D meshes.
//!
//! A *cell locator* indexes a dataset of cells (tetrahedra, hexahedra,
//! wedges, pyramids, polyhedra, polygons) referenced by vertex indices into
//! a shared point array, and answers geometric queries against it:
//!
//! - [`find_cell`](locator::CellLocator::find_cell) — which cell contains a point.
//! - [`intersect_with_line`](locator::CellLocator::intersect_with_line) — nearest hit of a segment with any cell.
//! - [`find_closest_point_within_radius`](locator::CellLocator::find_closest_point_within_radius) — nearest cell surface point.
//! - [`find_cells_within_bounds`](locator::CellLocator::find_cells_within_bounds) — coarse candidate sets.
//!
//! Three index variants share the same contract, trading build cost for
//! query shape: [`locator::octree`], [`locator::bih`] and [`locator::bsp`].
//!
//! This crate owns none of the mesh representation or cell geometry: those
//! are supplied by the caller through the [`dataset`] traits. It does not
//! read or write files, interpolate field values, or maintain process-wide
//! state.

/// String definitions for [`tracing`] log targets.
///
/// Used like `tracing_targets! { BUILD = "build", QUERY = "query" }`, which
/// expands each entry to `pub const BUILD: &'static str = concat!(env!("CARGO_PKG_NAME"), "::", "build");`.
#[macro_export]
macro_rules! tracing_targets {
    {$( $name:ident $(=$val:expr)? ),* $(,)?} => {
        $( $crate::tracing_targets!(@value $name $(=$val)? ); )*
    };

    (@value $name:ident = $val:expr) => {pub const $name: &'static str = concat!(env!("CARGO_PKG_NAME"), "::", $val);};
    (@value $name:ident)             => {$crate::tracing_targets!($name = stringify!($name));};
}

pub mod cache;
pub mod core;
pub mod dataset;
pub mod error;
pub mod geom;
pub mod locator;

pub use dataset::{Cell, Dataset, EvaluatePosition, IntersectWithLine};
pub use error::{BuildError, ConfigurationError};
pub use locator::{bih::BihCellTreeLocator, bsp::BspCellTreeLocator, octree::UniformOctreeLocator, BuildReport, CellLocator, Hit};
