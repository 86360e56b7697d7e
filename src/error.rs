//! Error kinds surfaced by the locators (spec §7).
//!
//! Only `build()`/`force_build()` can fail: a degenerate cell is a logged
//! warning, not an error (it is folded into the index conservatively), and a
//! query that finds nothing returns `None`/an empty `Vec` rather than `Err`.

use thiserror::Error;

/// Rejected before any tree construction is attempted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("dataset has no cells to index")]
    EmptyDataset,

    #[error("level {level} exceeds max_level {max_level}")]
    LevelExceedsMax { level: u32, max_level: u32 },

    #[error("number_of_cells_per_node must be at least 1, got {0}")]
    ZeroCellsPerNode(u32),

    #[error("number_of_buckets must be at least 2, got {0}")]
    TooFewBuckets(u32),
}

/// The `Err` type of [`crate::locator::base::LocatorBase::build`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Internal invariant violation: the tree recursed past its hard depth
    /// cap. Fatal — the build is aborted and no partial index is kept.
    #[error("tree depth exceeded the hard cap of {cap} levels; dataset may contain degenerate or coincident cells")]
    TreeDepthExceeded { cap: u32 },
}
