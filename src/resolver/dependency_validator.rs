//! Creation-time validation of dependency declarations.

use semver::Version;
use std::sync::Arc;

use crate::core::{EngineError, EngineResult, validate_template_id};
use crate::models::DependencyDeclaration;
use crate::store::{ListOptions, VersionStore};
use crate::version::VersionConstraint;

/// Checks that every required declaration of a new version can be satisfied
/// by the versions currently in the store.
///
/// Only the state at creation time is checked. Deprecating the satisfying
/// dependency version later does not invalidate records admitted before.
#[derive(Debug, Clone)]
pub struct DependencyValidator {
    store: Arc<VersionStore>,
}

impl DependencyValidator {
    pub fn new(store: Arc<VersionStore>) -> Self {
        Self { store }
    }

    /// Validate `dependencies` declared by a new version of `for_template_id`.
    ///
    /// # Errors
    ///
    /// The first failing declaration aborts validation:
    /// - [`EngineError::CyclicDependency`] for a dependency on the declaring template
    /// - [`EngineError::DependencyMissing`] when the dependency has no versions
    /// - [`EngineError::InvalidVersionConstraint`] for an unparsable range
    /// - [`EngineError::ConstraintUnsatisfiable`] when no non-deprecated
    ///   version satisfies the range
    pub fn validate(
        &self,
        dependencies: &[DependencyDeclaration],
        for_template_id: &str,
    ) -> EngineResult<()> {
        for dependency in dependencies {
            if !dependency.required {
                tracing::debug!(
                    "Skipping validation of non-required dependency '{}' for '{}'",
                    dependency.dependency_id,
                    for_template_id
                );
                continue;
            }
            let best = self.best_match(dependency, for_template_id)?;
            tracing::debug!(
                "Dependency '{}' {} of '{}' satisfied by {}",
                dependency.dependency_id,
                dependency.version_constraint,
                for_template_id,
                best
            );
        }
        Ok(())
    }

    fn best_match(
        &self,
        dependency: &DependencyDeclaration,
        for_template_id: &str,
    ) -> EngineResult<Version> {
        if dependency.dependency_id == for_template_id {
            return Err(EngineError::CyclicDependency {
                chain: format!("{for_template_id} -> {for_template_id}"),
            });
        }
        validate_template_id(&dependency.dependency_id)?;

        let versions = self.store.list(&dependency.dependency_id, ListOptions::all());
        if versions.is_empty() {
            return Err(EngineError::DependencyMissing {
                template_id: for_template_id.to_string(),
                dependency_id: dependency.dependency_id.clone(),
            });
        }

        let constraint = VersionConstraint::parse(&dependency.version_constraint)?;
        let candidates: Vec<Version> = versions
            .iter()
            .filter(|r| !r.deprecated)
            .filter_map(|r| Version::parse(&r.version).ok())
            .collect();

        constraint.find_best_match(&candidates, false).cloned().ok_or_else(|| {
            EngineError::ConstraintUnsatisfiable {
                template_id: for_template_id.to_string(),
                dependency_id: dependency.dependency_id.clone(),
                constraint: dependency.version_constraint.clone(),
            }
        })
    }
}
