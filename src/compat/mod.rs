//! Compatibility of a template version with a target environment.
//!
//! Hard problems (wrong framework, runtime outside the supported range,
//! dependencies that cannot be resolved) are issues and make the version
//! incompatible. Soft problems (tool version outside range, unsupported
//! platforms, conflicts among dependencies) are warnings only.
//!
//! Only attributes the target actually provides are checked: a target
//! without a framework is never rejected for its framework.

use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::core::{EngineError, EngineResult};
use crate::models::{ResolveOptions, VersionRecord};
use crate::resolver::VersionResolver;
use crate::store::VersionStore;
use crate::version::VersionConstraint;

/// Environment a template version is about to be used in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetEnvironment {
    pub framework: Option<String>,
    pub runtime_version: Option<String>,
    pub tool_version: Option<String>,
    #[serde(default)]
    pub platforms: BTreeSet<String>,
}

impl TargetEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_framework(mut self, framework: impl Into<String>) -> Self {
        self.framework = Some(framework.into());
        self
    }

    pub fn with_runtime_version(mut self, version: impl Into<String>) -> Self {
        self.runtime_version = Some(version.into());
        self
    }

    pub fn with_tool_version(mut self, version: impl Into<String>) -> Self {
        self.tool_version = Some(version.into());
        self
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platforms.insert(platform.into());
        self
    }
}

/// Outcome of a compatibility check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityReport {
    pub template_id: String,
    pub version: String,
    /// `true` iff `issues` is empty
    pub compatible: bool,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
}

/// Checks stored versions against target environments.
#[derive(Debug, Clone)]
pub struct CompatibilityChecker {
    store: Arc<VersionStore>,
    resolver: VersionResolver,
    options: ResolveOptions,
}

impl CompatibilityChecker {
    pub fn new(store: Arc<VersionStore>) -> Self {
        let resolver = VersionResolver::new(Arc::clone(&store));
        Self {
            store,
            resolver,
            options: ResolveOptions::default(),
        }
    }

    /// Resolve dependencies with `options` instead of the defaults.
    pub fn with_options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }

    /// Check `template_id@version` against `target`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::VersionNotFound`] for an unknown version. Every
    /// other problem ends up in the report.
    pub fn check(
        &self,
        template_id: &str,
        version: &str,
        target: &TargetEnvironment,
    ) -> EngineResult<CompatibilityReport> {
        let record = self.store.get(template_id, version).ok_or_else(|| {
            EngineError::VersionNotFound {
                template_id: template_id.to_string(),
                version: version.to_string(),
            }
        })?;

        let mut issues = Vec::new();
        let mut warnings = Vec::new();

        check_environment(&record, target, &mut issues, &mut warnings);
        self.check_dependencies(&record, &mut issues, &mut warnings);

        let compatible = issues.is_empty();
        tracing::debug!(
            "{} compatible={} ({} issues, {} warnings)",
            record.display_name(),
            compatible,
            issues.len(),
            warnings.len()
        );

        Ok(CompatibilityReport {
            template_id: template_id.to_string(),
            version: record.version,
            compatible,
            issues,
            warnings,
        })
    }

    /// Unresolvable required dependencies are issues. Non-required ones are
    /// never validated at creation time, so they only produce warnings.
    fn check_dependencies(
        &self,
        record: &VersionRecord,
        issues: &mut Vec<String>,
        warnings: &mut Vec<String>,
    ) {
        for declaration in &record.dependencies {
            match self.resolver.resolve(
                &declaration.dependency_id,
                &declaration.version_constraint,
                self.options,
            ) {
                Ok(resolution) => {
                    warnings.extend(resolution.conflicts.iter().map(|c| {
                        format!("Dependency '{}': {}", declaration.dependency_id, c)
                    }));
                }
                Err(e) => {
                    let problem = format!(
                        "Dependency '{}' ({}) cannot be resolved: {}",
                        declaration.dependency_id, declaration.version_constraint, e
                    );
                    if declaration.required {
                        issues.push(problem);
                    } else {
                        warnings.push(problem);
                    }
                }
            }
        }
    }
}

fn check_environment(
    record: &VersionRecord,
    target: &TargetEnvironment,
    issues: &mut Vec<String>,
    warnings: &mut Vec<String>,
) {
    let compat = &record.compatibility;

    if let Some(framework) = &target.framework {
        if !compat.frameworks.is_empty() && !compat.frameworks.contains(framework) {
            let supported: Vec<&str> = compat.frameworks.iter().map(String::as_str).collect();
            issues.push(format!(
                "Framework '{}' is not supported (supported: {})",
                framework,
                supported.join(", ")
            ));
        }
    }

    if let (Some(range), Some(runtime)) = (&compat.runtime_version_range, &target.runtime_version) {
        if let Err(problem) = satisfies(range, runtime) {
            issues.push(format!("Runtime {problem}"));
        }
    }

    if let (Some(range), Some(tool)) = (&compat.tool_version_range, &target.tool_version) {
        if let Err(problem) = satisfies(range, tool) {
            warnings.push(format!("Tool {problem}"));
        }
    }

    if !compat.platforms.is_empty() {
        for platform in target.platforms.difference(&compat.platforms) {
            warnings.push(format!("Platform '{platform}' is not listed as supported"));
        }
    }
}

/// `Ok(())` when `version` satisfies `range`, otherwise a description of why not.
fn satisfies(range: &str, version: &str) -> Result<(), String> {
    let constraint = VersionConstraint::parse(range)
        .map_err(|e| format!("range '{range}' cannot be checked: {e}"))?;
    let parsed = Version::parse(version.trim())
        .map_err(|e| format!("version '{version}' is not a valid version: {e}"))?;

    if constraint.matches(&parsed, true) {
        Ok(())
    } else {
        Err(format!("version {version} does not satisfy '{range}'"))
    }
}
