//! Shared configuration and lifecycle (spec §4.3, C3), embedded by each
//! concrete locator rather than implementing the query contract itself: the
//! descent algorithms differ too much per variant to share more than this.

use derivative::Derivative;
use getset::{CopyGetters, Setters};
use tracing::debug;

use crate::cache::CellBoundsCache;
use crate::core::targets::BUILD;
use crate::core::types::{Number, Point3};
use crate::dataset::Dataset;
use crate::error::ConfigurationError;

/// Tunables shared by all three locator variants (spec §6 "Configuration
/// enumeration"). Each variant picks its own defaults via the
/// `*_defaults()` constructors; nothing here is variant-specific behaviour,
/// only the numbers differ.
#[derive(Debug, Clone, Copy, PartialEq, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct LocatorConfig {
    /// Upper bound on octree depth (octree only; ignored by BIH/BSP).
    max_level: u32,
    /// Explicit octree level; only consulted when `automatic` is off.
    level: u32,
    /// Target leaf size.
    number_of_cells_per_node: u32,
    /// SAH bucket count per axis (BIH only).
    number_of_buckets: u32,
    /// Store per-cell AABBs once at build time.
    cache_cell_bounds: bool,
    /// Skip rebuild even when the dataset timestamp advances.
    use_existing_search_structure: bool,
    /// Derive `level` from cell count instead of using the explicit value.
    automatic: bool,
    /// Geometric epsilon for box/position tests.
    tolerance: Number,
    /// Keep leaf cell-id lists after build (SUPPLEMENTED FEATURES #3). When
    /// off, only bounds-only queries remain available after `build()`.
    retain_cell_lists: bool,
}

impl LocatorConfig {
    const COMMON: Self = Self {
        max_level: 8,
        level: 0,
        number_of_cells_per_node: 32,
        number_of_buckets: 6,
        cache_cell_bounds: true,
        use_existing_search_structure: false,
        automatic: true,
        tolerance: 0.001,
        retain_cell_lists: true,
    };

    pub const fn octree_defaults() -> Self {
        Self {
            number_of_cells_per_node: 32,
            ..Self::COMMON
        }
    }

    pub const fn bih_defaults() -> Self {
        Self {
            number_of_cells_per_node: 8,
            ..Self::COMMON
        }
    }

    pub const fn bsp_defaults() -> Self {
        Self {
            number_of_cells_per_node: 32,
            ..Self::COMMON
        }
    }

    pub(crate) fn validate(&self, num_cells: usize) -> Result<(), ConfigurationError> {
        if num_cells == 0 {
            return Err(ConfigurationError::EmptyDataset);
        }
        if !self.automatic && self.level > self.max_level {
            return Err(ConfigurationError::LevelExceedsMax {
                level: self.level,
                max_level: self.max_level,
            });
        }
        if self.number_of_cells_per_node == 0 {
            return Err(ConfigurationError::ZeroCellsPerNode(self.number_of_cells_per_node));
        }
        if self.number_of_buckets < 2 {
            return Err(ConfigurationError::TooFewBuckets(self.number_of_buckets));
        }
        Ok(())
    }
}

/// Dataset binding, timestamps and cache policy common to every locator
/// variant (spec §4.3). Embedded as a field, not a supertrait: each concrete
/// locator owns its tree storage and calls into this for the bookkeeping
/// around it.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct LocatorBase<'d, D: Dataset> {
    /// `Dataset` carries no `Debug` bound; skip it rather than push one onto
    /// every caller's implementation just for diagnostics.
    #[derivative(Debug = "ignore")]
    dataset: &'d D,
    config: LocatorConfig,
    cache: Option<CellBoundsCache>,
    /// Timestamp at which the tree was last (re)built; `None` if never built.
    build_time: Option<u64>,
    /// Bumped whenever a setter changes `config` after a build.
    modification_time: u64,
}

impl<'d, D: Dataset> LocatorBase<'d, D> {
    pub fn new(dataset: &'d D, config: LocatorConfig) -> Self {
        Self {
            dataset,
            config,
            cache: None,
            build_time: None,
            modification_time: 0,
        }
    }

    pub fn dataset(&self) -> &'d D { self.dataset }
    pub fn config(&self) -> &LocatorConfig { &self.config }
    pub fn config_mut(&mut self) -> &mut LocatorConfig {
        self.modification_time += 1;
        &mut self.config
    }
    pub fn cache(&self) -> Option<&CellBoundsCache> { self.cache.as_ref() }
    pub fn is_built(&self) -> bool { self.build_time.is_some() }

    /// Per spec §3 "Lifecycle": skip rebuild if the existing structure's
    /// timestamp already covers both the locator's own config changes and
    /// the dataset's last modification, or if the caller asked to keep
    /// reusing whatever structure exists.
    pub fn needs_rebuild(&self) -> bool {
        if self.config.use_existing_search_structure && self.is_built() {
            return false;
        }
        match self.build_time {
            None => true,
            Some(t) => t < self.modification_time || t < self.dataset.modification_time(),
        }
    }

    /// Validates the configuration and builds/refreshes the cell-bounds
    /// cache; returns the timestamp to record as `build_time` on success.
    /// The caller (each concrete locator's `build()`) still has to build its
    /// own tree structure using the returned cache.
    pub fn prepare_build(&mut self) -> Result<u64, ConfigurationError> {
        self.config.validate(self.dataset.num_cells())?;
        if self.config.cache_cell_bounds {
            self.cache = Some(CellBoundsCache::build(self.dataset));
        } else {
            self.cache = None;
        }
        let t = self.dataset.modification_time().max(self.modification_time);
        debug!(target: BUILD, num_cells = self.dataset.num_cells(), build_time = t, "locator base prepared");
        Ok(t)
    }

    pub fn record_build(&mut self, build_time: u64) { self.build_time = Some(build_time); }

    /// The [`crate::locator::BuildReport`] for the index as it currently
    /// stands (spec SUPPLEMENTED FEATURES #4). Zero if no cache was built
    /// (either never built, or `cache_cell_bounds` is off).
    pub fn build_report(&self) -> crate::locator::BuildReport {
        crate::locator::BuildReport {
            degenerate_cell_count: self.cache.as_ref().map(CellBoundsCache::degenerate_count).unwrap_or(0),
        }
    }

    pub fn free_search_structure(&mut self) {
        self.cache = None;
        self.build_time = None;
    }

    /// Shares this locator's cache/config with a fresh `LocatorBase` bound
    /// to a (possibly different) dataset handle of the same underlying
    /// mesh, without recomputing the cache (spec §3 "shared-reference
    /// shallow copies release only their references").
    pub fn shallow_copy_onto<'e>(&self, dataset: &'e D) -> LocatorBase<'e, D> {
        LocatorBase {
            dataset,
            config: self.config,
            cache: self.cache.clone(),
            build_time: self.build_time,
            modification_time: self.modification_time,
        }
    }

    /// Per-axis slab test against a cell's cached bounds (SUPPLEMENTED
    /// FEATURES #2, public `InsideCellBounds`). `None` if bounds are not
    /// cached or the locator has not been built.
    pub fn inside_cell_bounds(&self, x: Point3, cell_id: crate::core::types::CellId) -> Option<bool> {
        Some(self.cache.as_ref()?.contains(cell_id, x, self.config.tolerance))
    }
}
