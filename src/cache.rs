//! Per-cell bounding-box cache (spec §4.2, C2).
//!
//! Built once, immediately after the cell-id/AABB pairs are known, and never
//! mutated again: [`CellBoundsCache`] wraps its storage in an [`Arc`] so a
//! [`shallow_copy`](crate::locator::base::LocatorBase::shallow_copy) can
//! alias the same array instead of recomputing it (spec §9 "shared cache
//! arrays").

use std::sync::Arc;

use tracing::warn;

use crate::core::targets::BUILD;
use crate::core::types::{CellId, Number};
use crate::dataset::{Cell, Dataset};
use crate::geom::aabb::Aabb;

/// Per-cell AABBs, indexed by `cell_id`.
#[derive(Clone, Debug)]
pub struct CellBoundsCache {
    bounds: Arc<[Aabb]>,
    /// Number of cells whose AABB was empty or inverted at build time (spec
    /// §7 item 2: `GeometryDegenerate`); logged once, not treated as an
    /// error.
    degenerate_count: usize,
}

impl CellBoundsCache {
    /// Computes one AABB per cell by folding over its points. A cell with no
    /// points, or whose bounding box collapses to empty, is recorded as
    /// degenerate (spec §7 item 2) and given a zero-size box at its owning
    /// point instead of [`Aabb::EMPTY`], so it still participates in the
    /// index (visible to `contains`/`point_distance_squared` as a real,
    /// if zero-volume, location) rather than being silently unreachable. A
    /// cell the dataset can't even produce (`get_cell` returns `None` for an
    /// id the dataset itself reported via `num_cells`) has no point of its
    /// own to anchor on, so it falls back to the dataset's overall centre.
    pub fn build<D: Dataset>(dataset: &D) -> Self {
        let mut degenerate_count = 0usize;
        let fallback_anchor = dataset.bounds().center();
        let bounds: Vec<Aabb> = (0..dataset.num_cells())
            .map(|id| {
                let cell_id = id as CellId;
                let Some(cell) = dataset.get_cell(cell_id) else {
                    degenerate_count += 1;
                    return Aabb::new(fallback_anchor, fallback_anchor);
                };
                let point_ids = cell.point_ids();
                let points = point_ids.iter().map(|&pid| dataset.get_point(pid));
                let aabb = Aabb::encompass_points(points);
                if aabb.is_empty() {
                    degenerate_count += 1;
                    let anchor = point_ids.first().map(|&pid| dataset.get_point(pid)).unwrap_or(fallback_anchor);
                    return Aabb::new(anchor, anchor);
                }
                aabb
            })
            .collect();

        if degenerate_count > 0 {
            warn!(target: BUILD, degenerate_count, "cells with degenerate bounds included conservatively");
        }

        Self {
            bounds: bounds.into(),
            degenerate_count,
        }
    }

    pub fn len(&self) -> usize { self.bounds.len() }
    pub fn is_empty(&self) -> bool { self.bounds.is_empty() }
    pub fn degenerate_count(&self) -> usize { self.degenerate_count }

    /// The cached AABB of `cell_id`. Panics if out of range: callers only
    /// ever index with ids drawn from the dataset the cache was built over.
    pub fn bounds_of(&self, cell_id: CellId) -> Aabb { self.bounds[cell_id as usize] }

    /// Per-axis slab test against the cached bounds, used to early-reject a
    /// candidate cell before the expensive [`Cell::evaluate_position`] call
    /// (spec §4.2). Also exposed publicly as
    /// [`crate::locator::base::LocatorBase::inside_cell_bounds`] (spec
    /// SUPPLEMENTED FEATURES #2, `vtkAbstractCellLocator::InsideCellBounds`).
    pub fn contains(&self, cell_id: CellId, x: crate::core::types::Point3, tol: Number) -> bool {
        self.bounds_of(cell_id).contains_point(x, tol)
    }
}
