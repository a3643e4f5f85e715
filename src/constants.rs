//! Application-wide constants
//!
//! Defaults for the batch configuration, grouped by purpose.

// =============================================================================
// LAYOUT DEFAULTS
// =============================================================================

/// Parent directory of the project groups
pub const DEFAULT_PROJECTS_DIR: &str = "./projects";

/// Directory holding `<group>.json` test documents
pub const DEFAULT_TESTS_DIR: &str = "./tests";

/// Mixin document
pub const DEFAULT_MIXINS_PATH: &str = "./mixins/mixins.json";

/// Entry under a project group that is never a project
pub const RESERVED_TESTS_ENTRY: &str = "tests";

// =============================================================================
// CONCURRENCY DEFAULTS (0 = unbounded)
// =============================================================================

pub const DEFAULT_MAX_CONCURRENT_COMPILES: usize = 0;

// =============================================================================
// LOGGING
// =============================================================================

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "autograder=info,sisyphus=info,minos=info";
