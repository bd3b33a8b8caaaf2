//! tmplver - Template Version & Dependency Resolution Engine
//!
//! Tracks semantically versioned templates, resolves version constraints
//! across transitive dependencies between templates, reports version
//! conflicts, checks compatibility with target environments, and plans and
//! applies migrations between versions.
//!
//! Template content is opaque to the engine. Renderers and generators consume
//! the resolved `template@version` information; nothing here calls back into
//! them.
//!
//! # Architecture Overview
//!
//! ```text
//!                 TemplateVersionManager ──► AuditSink
//!                /        │         │   \
//!   DependencyValidator   │  CompatibilityChecker
//!                 VersionResolver       MigrationPlanner
//!                         │              │
//!                    VersionStore ◄──────┘
//!                         │
//!                   StoreBackend (TOML files | memory)
//! ```
//!
//! Readers work on immutable per-template snapshots. Mutations are serialized
//! per template, persisted first and only then made visible.
//!
//! # Core Modules
//!
//! ## Engine
//! - [`manager`] - The public facade and audit emission
//! - [`store`] - Version storage, backends and per-template locking
//! - [`resolver`] - Version selection, dependency walk, conflicts, validation
//! - [`compat`] - Compatibility checks against a target environment
//! - [`migration`] - Migration registry, chains and content transformations
//!
//! ## Supporting Modules
//! - [`audit`] - Audit events and sinks
//! - [`config`] - Engine configuration (`~/.tmplver/config.toml`)
//! - [`core`] - Error types and identifier validation
//! - [`models`] - Records, declarations, migrations and resolution results
//! - [`version`] - Semver parsing, constraints and precedence
//! - [`utils`] - Atomic file writes
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tmplver::audit::TracingAuditSink;
//! use tmplver::config::EngineConfig;
//! use tmplver::manager::TemplateVersionManager;
//! use tmplver::migration::ApplyOptions;
//! use tmplver::models::{MigrationSpec, NewVersion, Transformation};
//!
//! # async fn example() -> tmplver::core::EngineResult<()> {
//! let manager =
//!     TemplateVersionManager::open(EngineConfig::load().await?, Arc::new(TracingAuditSink))
//!         .await?;
//!
//! manager.create_version("widget", NewVersion::new("1.0.0", "alice")).await?;
//! manager.create_version("widget", NewVersion::new("2.0.0", "alice").breaking(true)).await?;
//!
//! let spec = MigrationSpec::automated()
//!     .with_transformation(Transformation::rename("oldName", "newName"));
//! manager.create_migration("widget", "1.0.0", "2.0.0", spec, "alice").await?;
//!
//! let chain = manager.build_migration_chain("widget", "1.0.0", "2.0.0")?;
//! let outcome =
//!     manager.apply_migrations("widget", "use oldName here", &chain, ApplyOptions::default())?;
//! assert_eq!(outcome.content, "use newName here");
//! # Ok(())
//! # }
//! ```

// Engine
pub mod compat;
pub mod manager;
pub mod migration;
pub mod resolver;
pub mod store;

// Supporting modules
pub mod audit;
pub mod config;
pub mod constants;
pub mod core;
pub mod models;
pub mod utils;
pub mod version;

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
