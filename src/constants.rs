//! Global constants used throughout the tmplver codebase.
//!
//! This module contains timeout durations, resolution bounds, and file names
//! that are used across multiple modules. Defining them centrally keeps magic
//! numbers discoverable.

use std::time::Duration;

/// Default timeout for a single persistence operation (10 seconds).
///
/// Applies to both loading and saving a per-template record set. A timed-out
/// save is reported as a persistence failure and the in-memory snapshot is
/// left untouched.
pub fn default_persist_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Default persistence timeout in milliseconds, as stored in configuration.
pub const DEFAULT_PERSIST_TIMEOUT_MS: u64 = 10_000;

/// Default maximum depth of recursive dependency resolution.
///
/// The requested template is depth 0; its direct dependencies are depth 1.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Default maximum number of dependency declarations followed per version.
pub const DEFAULT_MAX_FAN_OUT: usize = 64;

/// Marker stored as `resolved_version` for dependencies that failed to resolve.
pub const UNRESOLVED: &str = "UNRESOLVED";

/// Actor id used for audit events when the caller does not supply one.
pub const DEFAULT_ACTOR: &str = "system";

/// Concurrency used when loading every template snapshot at startup.
pub const LOAD_CONCURRENCY: usize = 8;

/// File name of the per-template version list.
pub const VERSIONS_FILENAME: &str = "versions.toml";

/// File name of the per-template migration list.
pub const MIGRATIONS_FILENAME: &str = "migrations.toml";

/// Current on-disk format version for both record files.
pub const STORE_FORMAT_VERSION: u32 = 1;
