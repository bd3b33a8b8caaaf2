//! Shared data models for the engine.
//!
//! - [`record`] - [`VersionRecord`] and the declarations it carries
//! - [`migration`] - [`Migration`] and its ordered [`Transformation`]s
//! - [`resolution`] - transient [`VersionResolution`] results

pub mod migration;
pub mod record;
pub mod resolution;

pub use migration::{Condition, Migration, MigrationSpec, TransformKind, Transformation};
pub use record::{
    AccessibilityLevel, Classification, Compatibility, ComplianceMetadata, DependencyDeclaration,
    DependencyKind, NewVersion, VersionRecord,
};
pub use resolution::{
    ResolutionStrategy, ResolveOptions, ResolvedDependency, VersionConflict, VersionResolution,
};
