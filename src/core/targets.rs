//! String definitions for [`tracing`] targets, namespaced under the crate name.
//!
//! Used in macros like [`tracing::debug`] so that downstream consumers can
//! filter (`RUST_LOG=cell_locator::build=debug`) independently of module
//! paths, which tend to shift around under refactoring.

use crate::tracing_targets;

tracing_targets! {
    BUILD = "build",
    QUERY = "query",
}
