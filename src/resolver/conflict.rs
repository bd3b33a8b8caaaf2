//! Conflict detection over a flattened dependency list.
//!
//! A conflict exists when the same template was resolved to more than one
//! distinct version along different paths. Conflicts are reported, never
//! resolved: picking a winner is the caller's decision.

use std::collections::{BTreeMap, BTreeSet};

use crate::models::{ResolvedDependency, VersionConflict};

/// Collects `(template, version, required_by)` triples and reports templates
/// reached at more than one version.
#[derive(Debug, Default)]
pub struct ConflictDetector {
    // template -> version -> requirers
    resolutions: BTreeMap<String, BTreeMap<String, BTreeSet<String>>>,
}

impl ConflictDetector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one resolved entry.
    pub fn add_resolution(&mut self, template_id: &str, resolved_version: &str, required_by: &str) {
        self.resolutions
            .entry(template_id.to_string())
            .or_default()
            .entry(resolved_version.to_string())
            .or_default()
            .insert(required_by.to_string());
    }

    /// Build a detector from a flattened dependency list.
    #[must_use]
    pub fn from_dependencies(dependencies: &[ResolvedDependency]) -> Self {
        let mut detector = Self::new();
        for dep in dependencies {
            detector.add_resolution(&dep.template_id, &dep.resolved_version, &dep.required_by);
        }
        detector
    }

    /// One conflict per template with more than one distinct version, sorted
    /// by template id.
    ///
    /// `UNRESOLVED` counts as a version of its own, so a template that
    /// resolved on one path and failed on another is reported as well.
    #[must_use]
    pub fn detect_conflicts(&self) -> Vec<VersionConflict> {
        self.resolutions
            .iter()
            .filter(|(_, versions)| versions.len() > 1)
            .map(|(template_id, versions)| {
                let reason = versions
                    .iter()
                    .map(|(version, requirers)| {
                        let requirers: Vec<&str> = requirers.iter().map(String::as_str).collect();
                        format!("{version} required by {}", requirers.join(", "))
                    })
                    .collect::<Vec<_>>()
                    .join("; ");

                VersionConflict {
                    template_id: template_id.clone(),
                    conflicting_versions: versions.keys().cloned().collect(),
                    reason: Some(reason),
                }
            })
            .collect()
    }
}
