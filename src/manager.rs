//! The public entry point of the engine.
//!
//! [`TemplateVersionManager`] owns the store, the migration planner and the
//! audit sink, wires the validator, resolver and compatibility checker to the
//! store, and emits an audit event for every mutation, resolution and
//! compatibility check.

use serde_json::json;
use std::sync::Arc;

use crate::audit::{AuditEvent, AuditEventType, AuditSink};
use crate::compat::{CompatibilityChecker, CompatibilityReport, TargetEnvironment};
use crate::config::EngineConfig;
use crate::core::{EngineError, EngineResult, validate_template_id};
use crate::migration::{ApplyOptions, MigrationOutcome, MigrationOverlap, MigrationPlanner};
use crate::models::{
    Classification, Migration, MigrationSpec, NewVersion, ResolutionStrategy, ResolveOptions,
    VersionRecord, VersionResolution,
};
use crate::resolver::{DependencyValidator, VersionResolver};
use crate::store::{FsBackend, ListOptions, StoreBackend, TemplateLocks, VersionStore};
use crate::version::parse_version;

/// Facade over every engine component.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use tmplver::audit::TracingAuditSink;
/// use tmplver::config::EngineConfig;
/// use tmplver::manager::TemplateVersionManager;
/// use tmplver::models::{DependencyDeclaration, NewVersion, ResolveOptions};
///
/// # async fn example() -> tmplver::core::EngineResult<()> {
/// let config = EngineConfig::load().await?;
/// let manager = TemplateVersionManager::open(config, Arc::new(TracingAuditSink)).await?;
///
/// manager.create_version("base-layout", NewVersion::new("1.0.0", "alice")).await?;
/// manager
///     .create_version(
///         "widget",
///         NewVersion::new("1.0.0", "alice")
///             .with_dependency(DependencyDeclaration::runtime("base-layout", "^1.0.0")),
///     )
///     .await?;
///
/// let resolution = manager.resolve_version("widget", "^1.0.0", ResolveOptions::default())?;
/// assert_eq!(resolution.resolved_version, "1.0.0");
/// # Ok(())
/// # }
/// ```
pub struct TemplateVersionManager {
    config: EngineConfig,
    store: Arc<VersionStore>,
    validator: DependencyValidator,
    resolver: VersionResolver,
    checker: CompatibilityChecker,
    planner: MigrationPlanner,
    audit: Arc<dyn AuditSink>,
}

impl std::fmt::Debug for TemplateVersionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateVersionManager")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("planner", &self.planner)
            .finish_non_exhaustive()
    }
}

impl TemplateVersionManager {
    /// Open a manager backed by TOML files under `config.data_dir`.
    ///
    /// # Errors
    ///
    /// Fails with [`EngineError::ConfigError`](crate::core::EngineError::ConfigError)
    /// for invalid configuration, or
    /// [`EngineError::PersistenceFailure`](crate::core::EngineError::PersistenceFailure)
    /// when existing records cannot be loaded.
    pub async fn open(config: EngineConfig, audit: Arc<dyn AuditSink>) -> EngineResult<Self> {
        let backend = Arc::new(FsBackend::new(config.data_dir.clone()));
        Self::with_backend(config, backend, audit).await
    }

    /// Open a manager on an arbitrary backend.
    pub async fn with_backend(
        config: EngineConfig,
        backend: Arc<dyn StoreBackend>,
        audit: Arc<dyn AuditSink>,
    ) -> EngineResult<Self> {
        config.validate()?;
        let timeout = config.persist_timeout();
        let locks = TemplateLocks::new();

        let store = Arc::new(VersionStore::open(backend, locks.clone(), timeout).await?);
        let planner = MigrationPlanner::open(Arc::clone(&store), locks, timeout).await?;

        tracing::info!("Opened template store with {} templates", store.templates().len());

        Ok(Self {
            validator: DependencyValidator::new(Arc::clone(&store)),
            resolver: VersionResolver::new(Arc::clone(&store)),
            checker: CompatibilityChecker::new(Arc::clone(&store))
                .with_options(config.resolve_options()),
            config,
            store,
            planner,
            audit,
        })
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resolution options carrying the configured depth and fan-out bounds.
    #[must_use]
    pub fn default_resolve_options(&self) -> ResolveOptions {
        self.config.resolve_options()
    }

    /// Create a new version. `new.author` is recorded as the audit actor.
    ///
    /// Nothing is stored unless the version parses, every required dependency
    /// is satisfiable and the write succeeds.
    pub async fn create_version(
        &self,
        template_id: &str,
        new: NewVersion,
    ) -> EngineResult<VersionRecord> {
        validate_template_id(template_id)?;
        let parsed = parse_version(&new.version)?;
        self.validator.validate(&new.dependencies, template_id)?;

        let record = VersionRecord::from_new(template_id, new, !parsed.pre.is_empty());
        self.store.put(record.clone()).await?;

        tracing::info!("Created {}", record.display_name());
        self.emit(
            AuditEvent::new(
                AuditEventType::VersionCreated,
                template_id,
                &record.version,
                &record.author,
            )
            .with_classification(record.compliance.classification)
            .with_details(json!({
                "breaking": record.breaking,
                "prerelease": record.prerelease,
                "dependencies": record.dependencies.len(),
                "tags": record.tags,
            })),
        );
        Ok(record)
    }

    /// Versions newest first, filtered.
    #[must_use]
    pub fn get_versions(
        &self,
        template_id: &str,
        include_deprecated: bool,
        include_prerelease: bool,
    ) -> Vec<VersionRecord> {
        self.store.list(
            template_id,
            ListOptions {
                include_deprecated,
                include_prerelease,
            },
        )
    }

    /// One stored version, deprecated or not.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::VersionNotFound`] when `template_id@version`
    /// was never created.
    pub fn get_version(&self, template_id: &str, version: &str) -> EngineResult<VersionRecord> {
        self.store.get(template_id, version.trim()).ok_or_else(|| EngineError::VersionNotFound {
            template_id: template_id.to_string(),
            version: version.to_string(),
        })
    }

    /// Every version, deprecated and prerelease included, newest first.
    #[must_use]
    pub fn get_version_history(&self, template_id: &str) -> Vec<VersionRecord> {
        self.store.list(template_id, ListOptions::all())
    }

    /// Newest non-deprecated version.
    pub fn get_latest_version(
        &self,
        template_id: &str,
        include_prerelease: bool,
    ) -> EngineResult<VersionRecord> {
        let options = self
            .default_resolve_options()
            .with_strategy(ResolutionStrategy::Latest)
            .include_prerelease(include_prerelease);
        self.resolver.select(template_id, "*", options)
    }

    /// Deprecate a version. Deprecating twice is a silent no-op.
    pub async fn deprecate_version(
        &self,
        template_id: &str,
        version: &str,
        actor: &str,
    ) -> EngineResult<()> {
        if !self.store.deprecate(template_id, version).await? {
            return Ok(());
        }

        self.emit(
            AuditEvent::new(AuditEventType::VersionDeprecated, template_id, version, actor)
                .with_classification(self.classification_of(template_id, version)),
        );
        Ok(())
    }

    /// Resolve a template and its dependency graph.
    pub fn resolve_version(
        &self,
        template_id: &str,
        constraint: &str,
        options: ResolveOptions,
    ) -> EngineResult<VersionResolution> {
        let resolution = self.resolver.resolve(template_id, constraint, options)?;
        let classification = self.classification_of(template_id, &resolution.resolved_version);

        self.emit(
            AuditEvent::new(
                AuditEventType::VersionResolved,
                template_id,
                &resolution.resolved_version,
                &self.config.default_actor,
            )
            .with_classification(classification)
            .with_details(json!({
                "constraint": constraint,
                "strategy": resolution.strategy,
                "dependencies": resolution.dependencies.len(),
                "unresolved": resolution.unresolved().count(),
                "conflicts": resolution.conflicts.len(),
            })),
        );

        if resolution.has_conflicts() {
            self.emit(
                AuditEvent::new(
                    AuditEventType::ConflictDetected,
                    template_id,
                    &resolution.resolved_version,
                    &self.config.default_actor,
                )
                .with_classification(classification)
                .with_details(json!({ "conflicts": resolution.conflicts })),
            );
        }

        Ok(resolution)
    }

    /// Check a version against a target environment.
    pub fn check_compatibility(
        &self,
        template_id: &str,
        version: &str,
        target: &TargetEnvironment,
    ) -> EngineResult<CompatibilityReport> {
        let report = self.checker.check(template_id, version, target)?;

        self.emit(
            AuditEvent::new(
                AuditEventType::CompatibilityChecked,
                template_id,
                version,
                &self.config.default_actor,
            )
            .with_classification(self.classification_of(template_id, version))
            .with_details(json!({
                "compatible": report.compatible,
                "issues": report.issues,
                "warnings": report.warnings,
                "target": target,
            })),
        );
        Ok(report)
    }

    /// Register a migration between two existing versions.
    pub async fn create_migration(
        &self,
        template_id: &str,
        from_version: &str,
        to_version: &str,
        spec: MigrationSpec,
        actor: &str,
    ) -> EngineResult<Migration> {
        let migration = self
            .planner
            .create_migration(template_id, from_version, to_version, spec, actor)
            .await?;

        self.emit(
            AuditEvent::new(AuditEventType::MigrationCreated, template_id, to_version, actor)
                .with_classification(self.classification_of(template_id, to_version))
                .with_details(json!({
                    "migration_id": migration.id,
                    "from_version": migration.from_version,
                    "diff_type": migration.diff_type,
                    "breaking": migration.breaking,
                    "automated": migration.automated,
                })),
        );
        Ok(migration)
    }

    pub fn build_migration_chain(
        &self,
        template_id: &str,
        from_version: &str,
        to_version: &str,
    ) -> EngineResult<Vec<String>> {
        self.planner.build_migration_chain(template_id, from_version, to_version)
    }

    /// Apply a chain to `content`, emitting one event per applied migration.
    pub fn apply_migrations(
        &self,
        template_id: &str,
        content: &str,
        chain: &[String],
        options: ApplyOptions,
    ) -> EngineResult<MigrationOutcome> {
        let outcome = self.planner.apply_migrations(template_id, content, chain, options)?;

        for id in &outcome.applied {
            let Some(migration) = self.planner.get(template_id, id) else {
                continue;
            };
            self.emit(
                AuditEvent::new(
                    AuditEventType::MigrationExecuted,
                    template_id,
                    &migration.to_version,
                    &self.config.default_actor,
                )
                .with_classification(self.classification_of(template_id, &migration.to_version))
                .with_details(json!({
                    "migration_id": migration.id,
                    "from_version": migration.from_version,
                    "auto_only": options.auto_only,
                })),
            );
        }
        Ok(outcome)
    }

    #[must_use]
    pub fn list_migrations(&self, template_id: &str) -> Vec<Migration> {
        self.planner.list_migrations(template_id)
    }

    pub fn find_migration_overlaps(
        &self,
        template_id: &str,
        chain: &[String],
    ) -> EngineResult<Vec<MigrationOverlap>> {
        self.planner.find_overlaps(template_id, chain)
    }

    /// Every template with at least one version, sorted.
    #[must_use]
    pub fn templates(&self) -> Vec<String> {
        self.store.templates()
    }

    fn classification_of(&self, template_id: &str, version: &str) -> Classification {
        self.store
            .get(template_id, version)
            .map(|r| r.compliance.classification)
            .unwrap_or_default()
    }

    fn emit(&self, event: AuditEvent) {
        self.audit.emit(event);
    }
}
