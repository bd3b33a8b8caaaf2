//! Version resolution for templates and their transitive dependencies.
//!
//! Resolution turns `(template, constraint, options)` into a concrete version
//! and then walks the dependency declarations of that version depth-first.
//!
//! # Selection Policy
//!
//! 1. A template without any versions fails with `NoVersionsForTemplate`
//! 2. Deprecated versions are never candidates
//! 3. Prereleases are dropped unless `include_prerelease` is set; the
//!    `prerelease` strategy instead takes the newest prerelease
//! 4. The strategy picks from the remaining candidates:
//!    - `exact`: the candidate named verbatim by the constraint
//!    - `latest`: the newest candidate, constraint ignored
//!    - `range`: the newest candidate satisfying the constraint
//!    - `prerelease`: see step 3
//!
//! # Dependencies
//!
//! Every declaration of a resolved version is resolved with the same options.
//! Failures do not abort the walk; the entry is recorded with
//! `resolved_version = "UNRESOLVED"` and a reason. The flattened list is not
//! deduplicated, so diamonds show up once per path and the same template
//! resolved at different versions becomes a [`VersionConflict`](crate::models::VersionConflict).
//!
//! The walk stops at a template that is already on the current ancestor path
//! (a cycle), below `max_depth`, and after `max_fan_out` declarations of a
//! single version. Each of those is recorded as `UNRESOLVED` too.
//!
//! # Module Organization
//!
//! - [`conflict`] - groups the flattened list into conflicts
//! - [`dependency_graph`] - petgraph graph producing the install order
//! - [`dependency_validator`] - creation-time validation of declarations

pub mod conflict;
pub mod dependency_graph;
pub mod dependency_validator;

pub use conflict::ConflictDetector;
pub use dependency_graph::DependencyGraph;
pub use dependency_validator::DependencyValidator;

use semver::Version;
use std::sync::Arc;

use crate::constants::UNRESOLVED;
use crate::core::{EngineError, EngineResult};
use crate::models::{
    ResolutionStrategy, ResolveOptions, ResolvedDependency, VersionRecord, VersionResolution,
};
use crate::store::VersionStore;
use crate::version::VersionConstraint;

/// Resolves templates against the current store snapshots.
#[derive(Debug, Clone)]
pub struct VersionResolver {
    store: Arc<VersionStore>,
}

struct Walk {
    options: ResolveOptions,
    path: Vec<String>,
    dependencies: Vec<ResolvedDependency>,
    graph: DependencyGraph,
}

impl VersionResolver {
    pub fn new(store: Arc<VersionStore>) -> Self {
        Self { store }
    }

    /// Resolve a template and its dependency graph.
    ///
    /// # Errors
    ///
    /// Only failures selecting the requested template itself are returned;
    /// see [`VersionResolver::select`].
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use tmplver::models::ResolveOptions;
    /// use tmplver::resolver::VersionResolver;
    /// # use tmplver::store::VersionStore;
    /// # use std::sync::Arc;
    ///
    /// # fn example(store: Arc<VersionStore>) -> tmplver::core::EngineResult<()> {
    /// let resolver = VersionResolver::new(store);
    /// let resolution = resolver.resolve("widget", "^1.0.0", ResolveOptions::default())?;
    /// for conflict in &resolution.conflicts {
    ///     println!("{conflict}");
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn resolve(
        &self,
        template_id: &str,
        constraint: &str,
        options: ResolveOptions,
    ) -> EngineResult<VersionResolution> {
        let root = self.select(template_id, constraint, options)?;
        let root_label = root.display_name();
        tracing::debug!("Resolved {} for '{}' using {}", root_label, constraint, options.strategy);

        let mut walk = Walk {
            options,
            path: vec![template_id.to_string()],
            dependencies: Vec::new(),
            graph: DependencyGraph::new(),
        };
        walk.graph.ensure_node(&root_label);
        self.walk_dependencies(&root, 1, &mut walk);

        let conflicts = ConflictDetector::from_dependencies(&walk.dependencies).detect_conflicts();
        for conflict in &conflicts {
            tracing::warn!("{}", conflict);
        }

        let install_order = match walk.graph.topological_order() {
            Ok(order) => order,
            Err(e) => {
                tracing::warn!("No install order for {}: {}", root_label, e);
                Vec::new()
            }
        };

        Ok(VersionResolution {
            template_id: template_id.to_string(),
            requested_constraint: constraint.to_string(),
            resolved_version: root.version,
            strategy: options.strategy,
            dependencies: walk.dependencies,
            conflicts,
            install_order,
        })
    }

    /// Pick the version of a single template, without following dependencies.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NoVersionsForTemplate`] when the template has no versions
    /// - [`EngineError::VersionNotFound`] when `exact` names no candidate
    /// - [`EngineError::NoSatisfyingVersion`] when `latest` or `range` finds nothing
    /// - [`EngineError::InvalidVersionConstraint`] for an unparsable range
    /// - [`EngineError::NoPrereleaseVersions`] when `prerelease` finds nothing
    pub fn select(
        &self,
        template_id: &str,
        constraint: &str,
        options: ResolveOptions,
    ) -> EngineResult<VersionRecord> {
        let snapshot = self.store.snapshot(template_id);
        if snapshot.is_empty() {
            return Err(EngineError::NoVersionsForTemplate {
                template_id: template_id.to_string(),
            });
        }

        let mut active = snapshot.iter().filter(|r| !r.deprecated);

        // Snapshots are sorted newest first, so the first match is the highest.
        if options.strategy == ResolutionStrategy::Prerelease {
            return active.find(|r| r.prerelease).cloned().ok_or_else(|| {
                EngineError::NoPrereleaseVersions {
                    template_id: template_id.to_string(),
                }
            });
        }

        let mut candidates = active.filter(|r| options.include_prerelease || !r.prerelease);

        let selected = match options.strategy {
            ResolutionStrategy::Exact => {
                let wanted = constraint.trim().trim_start_matches('=').trim();
                return candidates.find(|r| r.version == wanted).cloned().ok_or_else(|| {
                    EngineError::VersionNotFound {
                        template_id: template_id.to_string(),
                        version: constraint.to_string(),
                    }
                });
            }
            ResolutionStrategy::Latest => candidates.next(),
            ResolutionStrategy::Range => {
                let parsed = VersionConstraint::parse(constraint)?;
                candidates.find(|r| {
                    Version::parse(&r.version)
                        .is_ok_and(|v| parsed.matches(&v, options.include_prerelease))
                })
            }
            ResolutionStrategy::Prerelease => None,
        };

        selected.cloned().ok_or_else(|| EngineError::NoSatisfyingVersion {
            template_id: template_id.to_string(),
            constraint: constraint.to_string(),
        })
    }

    fn walk_dependencies(&self, parent: &VersionRecord, depth: usize, walk: &mut Walk) {
        let parent_label = parent.display_name();

        for (index, declaration) in parent.dependencies.iter().enumerate() {
            let mut entry = ResolvedDependency {
                template_id: declaration.dependency_id.clone(),
                requested_constraint: declaration.version_constraint.clone(),
                resolved_version: UNRESOLVED.to_string(),
                required_by: parent_label.clone(),
                depth,
                reason: None,
            };

            let limit = if index >= walk.options.max_fan_out {
                Some(format!(
                    "fan-out limit of {} declarations exceeded by {}",
                    walk.options.max_fan_out, parent_label
                ))
            } else if depth > walk.options.max_depth {
                Some(format!("depth limit of {} exceeded", walk.options.max_depth))
            } else {
                None
            };
            if let Some(reason) = limit {
                tracing::warn!("Not following {}: {}", declaration.dependency_id, reason);
                entry.reason = Some(reason);
                walk.dependencies.push(entry);
                continue;
            }

            if walk.path.contains(&declaration.dependency_id) {
                let mut chain = walk.path.clone();
                chain.push(declaration.dependency_id.clone());
                let error = EngineError::CyclicDependency {
                    chain: chain.join(" -> "),
                };
                tracing::warn!("{}", error);
                entry.reason = Some(format!("{}: {}", error.kind(), chain.join(" -> ")));
                walk.dependencies.push(entry);
                continue;
            }

            match self.select(&declaration.dependency_id, &declaration.version_constraint, walk.options)
            {
                Ok(record) => {
                    tracing::debug!(
                        "{} requires {} {} -> {}",
                        parent_label,
                        declaration.dependency_id,
                        declaration.version_constraint,
                        record.version
                    );
                    entry.resolved_version = record.version.clone();
                    walk.dependencies.push(entry);
                    walk.graph.add_dependency(&parent_label, &record.display_name());

                    walk.path.push(declaration.dependency_id.clone());
                    self.walk_dependencies(&record, depth + 1, walk);
                    walk.path.pop();
                }
                Err(e) => {
                    tracing::warn!(
                        "Could not resolve {} {} for {}: {}",
                        declaration.dependency_id,
                        declaration.version_constraint,
                        parent_label,
                        e
                    );
                    entry.reason = Some(format!("{}: {}", e.kind(), e));
                    walk.dependencies.push(entry);
                }
            }
        }
    }
}
