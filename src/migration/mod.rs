//! Migration registry, chain planning and application.
//!
//! A migration describes how content made for one version of a template is
//! turned into content for another version of the same template. Migrations
//! are registered once and never modified.
//!
//! # Chains
//!
//! [`MigrationPlanner::build_migration_chain`] selects every migration whose
//! range lies inside the requested window (`m.from >= from` and
//! `m.to <= to`), ordered by `from`, then `to`, then creation time. This is a
//! window selection, not a path search: two migrations covering overlapping
//! ranges are both selected. [`MigrationPlanner::find_overlaps`] reports such
//! pairs and [`MigrationPlanner::apply_migrations`] turns them into warnings.
//!
//! # Examples
//!
//! ```rust,no_run
//! use tmplver::migration::{ApplyOptions, MigrationPlanner};
//!
//! # fn example(planner: &MigrationPlanner) -> tmplver::core::EngineResult<()> {
//! let chain = planner.build_migration_chain("widget", "1.0.0", "2.0.0")?;
//! let outcome = planner.apply_migrations(
//!     "widget",
//!     "use oldName here",
//!     &chain,
//!     ApplyOptions::default(),
//! )?;
//! for warning in &outcome.warnings {
//!     eprintln!("warning: {warning}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod transform;

use chrono::Utc;
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::constants::LOAD_CONCURRENCY;
use crate::core::{EngineError, EngineResult};
use crate::models::{Migration, MigrationSpec};
use crate::store::{
    StoreBackend, TemplateLocks, VersionStore, WriteTicket, load_with_timeout, persist_with_timeout,
};
use crate::version::{DiffType, diff_type, parse_version};

/// Options for [`MigrationPlanner::apply_migrations`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Skip migrations that are not automated
    pub auto_only: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self { auto_only: true }
    }
}

/// Result of applying a chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationOutcome {
    pub content: String,
    /// Ids of the migrations that were applied, in order
    pub applied: Vec<String>,
    pub warnings: Vec<String>,
}

/// Two migrations in a chain whose version ranges overlap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationOverlap {
    pub first: String,
    pub second: String,
    pub reason: String,
}

/// Registers migrations and plans/applies chains of them.
pub struct MigrationPlanner {
    store: Arc<VersionStore>,
    backend: Arc<dyn StoreBackend>,
    migrations: DashMap<String, Arc<Vec<Migration>>>,
    locks: TemplateLocks,
    timeout: Duration,
}

impl std::fmt::Debug for MigrationPlanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationPlanner")
            .field("templates", &self.migrations.len())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl MigrationPlanner {
    /// Load the migrations of every template known to `store`.
    ///
    /// `locks` must be the same lock set the store was opened with.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::PersistenceFailure`] when loading fails.
    pub async fn open(
        store: Arc<VersionStore>,
        locks: TemplateLocks,
        timeout: Duration,
    ) -> EngineResult<Self> {
        let backend = store.backend();

        let loaded: Vec<EngineResult<(String, Vec<Migration>)>> = stream::iter(store.templates())
            .map(|template_id| {
                let backend = Arc::clone(&backend);
                async move {
                    let migrations = load_with_timeout(
                        timeout,
                        "load migrations",
                        &template_id,
                        backend.load_migrations(&template_id),
                    )
                    .await?;
                    Ok((template_id, migrations))
                }
            })
            .buffer_unordered(LOAD_CONCURRENCY)
            .collect()
            .await;

        let migrations = DashMap::new();
        for entry in loaded {
            let (template_id, list) = entry?;
            if !list.is_empty() {
                migrations.insert(template_id, Arc::new(list));
            }
        }

        Ok(Self {
            store,
            backend,
            migrations,
            locks,
            timeout,
        })
    }

    fn snapshot(&self, template_id: &str) -> Arc<Vec<Migration>> {
        self.migrations
            .get(template_id)
            .map(|entry| Arc::clone(entry.value()))
            .unwrap_or_default()
    }

    /// Every migration registered for `template_id`, in creation order.
    #[must_use]
    pub fn list_migrations(&self, template_id: &str) -> Vec<Migration> {
        self.snapshot(template_id).as_ref().clone()
    }

    /// Look up one migration.
    #[must_use]
    pub fn get(&self, template_id: &str, migration_id: &str) -> Option<Migration> {
        self.snapshot(template_id).iter().find(|m| m.id == migration_id).cloned()
    }

    /// Register a migration between two existing versions.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidVersionFormat`] when either version does not parse
    /// - [`EngineError::MigrationSourceVersionMissing`] /
    ///   [`EngineError::MigrationTargetVersionMissing`] for unknown versions
    /// - [`EngineError::InvalidMigration`] when both versions have the same
    ///   precedence or a transformation cannot be applied
    /// - [`EngineError::PersistenceFailure`] when the write fails; nothing is
    ///   registered
    pub async fn create_migration(
        &self,
        template_id: &str,
        from_version: &str,
        to_version: &str,
        spec: MigrationSpec,
        author: &str,
    ) -> EngineResult<Migration> {
        let from = parse_version(from_version)?;
        let to = parse_version(to_version)?;

        if !self.store.contains(template_id, from_version) {
            return Err(EngineError::MigrationSourceVersionMissing {
                template_id: template_id.to_string(),
                version: from_version.to_string(),
            });
        }
        if !self.store.contains(template_id, to_version) {
            return Err(EngineError::MigrationTargetVersionMissing {
                template_id: template_id.to_string(),
                version: to_version.to_string(),
            });
        }

        let invalid = |reason: String| EngineError::InvalidMigration {
            template_id: template_id.to_string(),
            reason,
        };

        if from.cmp_precedence(&to) == Ordering::Equal {
            return Err(invalid(format!("{from_version} and {to_version} are the same version")));
        }
        for (index, transformation) in spec.transformations.iter().enumerate() {
            transform::validate(transformation)
                .map_err(|reason| invalid(format!("transformation {}: {reason}", index + 1)))?;
        }

        let diff = diff_type(&from, &to);
        let migration = Migration {
            id: Uuid::new_v4().to_string(),
            template_id: template_id.to_string(),
            from_version: from_version.to_string(),
            to_version: to_version.to_string(),
            diff_type: diff,
            breaking: spec.breaking || diff == DiffType::Major,
            automated: spec.automated,
            transformations: spec.transformations,
            requirements: spec.requirements,
            warnings: spec.warnings,
            created_at: Utc::now(),
            created_by: author.to_string(),
        };

        let _guard = self.locks.acquire(template_id).await;

        let current = self.snapshot(template_id);
        let mut next = Vec::with_capacity(current.len() + 1);
        next.extend(current.iter().cloned());
        next.push(migration.clone());

        let ticket = WriteTicket::new();
        persist_with_timeout(
            self.timeout,
            "save migrations",
            template_id,
            &ticket,
            self.backend.save_migrations(template_id, &next, &ticket),
        )
        .await?;

        tracing::info!(
            "Registered migration {} for '{}': {} -> {} ({})",
            migration.id,
            template_id,
            from_version,
            to_version,
            diff
        );
        self.migrations.insert(template_id.to_string(), Arc::new(next));
        Ok(migration)
    }

    /// Ids of every migration inside the `from..=to` window, in application order.
    ///
    /// Selection is literal: a migration qualifies when its source is at or
    /// above `from` and its target at or below `to`. Asking for `from > to`
    /// therefore yields an empty chain.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidVersionFormat`] when a bound does not parse.
    pub fn build_migration_chain(
        &self,
        template_id: &str,
        from_version: &str,
        to_version: &str,
    ) -> EngineResult<Vec<String>> {
        let from = parse_version(from_version)?;
        let to = parse_version(to_version)?;

        let snapshot = self.snapshot(template_id);
        let mut window: Vec<(Version, Version, &Migration)> = snapshot
            .iter()
            .filter_map(|m| {
                let m_from = Version::parse(&m.from_version).ok()?;
                let m_to = Version::parse(&m.to_version).ok()?;
                Some((m_from, m_to, m))
            })
            .filter(|(m_from, m_to, _)| {
                m_from.cmp_precedence(&from) != Ordering::Less
                    && m_to.cmp_precedence(&to) != Ordering::Greater
            })
            .collect();

        window.sort_by(|(a_from, a_to, a), (b_from, b_to, b)| {
            a_from
                .cmp_precedence(b_from)
                .then_with(|| a_to.cmp_precedence(b_to))
                .then_with(|| a.created_at.cmp(&b.created_at))
        });

        let chain: Vec<String> = window.into_iter().map(|(_, _, m)| m.id.clone()).collect();
        tracing::debug!(
            "Migration chain for '{}' {} -> {}: {} migrations",
            template_id,
            from_version,
            to_version,
            chain.len()
        );
        Ok(chain)
    }

    /// Pairs of chain migrations whose version ranges overlap.
    ///
    /// Ranges that only touch (`1.0.0 -> 1.1.0` then `1.1.0 -> 1.2.0`) do not
    /// overlap.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MigrationNotFound`] for an id that is not
    /// registered for `template_id`.
    pub fn find_overlaps(
        &self,
        template_id: &str,
        chain: &[String],
    ) -> EngineResult<Vec<MigrationOverlap>> {
        let migrations = self.lookup_chain(template_id, chain)?;
        Ok(overlaps(&migrations))
    }

    /// Apply a chain of migrations to `content`.
    ///
    /// Every id is looked up before anything is applied. Manual migrations are
    /// skipped with a warning when `auto_only` is set.
    ///
    /// # Errors
    ///
    /// - [`EngineError::MigrationNotFound`] for an unknown id
    /// - [`EngineError::InvalidTransformation`] when a stored transformation
    ///   cannot be applied
    pub fn apply_migrations(
        &self,
        template_id: &str,
        content: &str,
        chain: &[String],
        options: ApplyOptions,
    ) -> EngineResult<MigrationOutcome> {
        let migrations = self.lookup_chain(template_id, chain)?;

        let mut outcome = MigrationOutcome {
            content: content.to_string(),
            ..MigrationOutcome::default()
        };

        for overlap in overlaps(&migrations) {
            outcome.warnings.push(overlap.reason);
        }

        for migration in migrations {
            if options.auto_only && !migration.automated {
                outcome.warnings.push(format!(
                    "Skipped manual migration {} ({} -> {})",
                    migration.id, migration.from_version, migration.to_version
                ));
                continue;
            }

            let mut current = std::mem::take(&mut outcome.content);
            for transformation in &migration.transformations {
                let (next, warning) = transform::apply(current, transformation).map_err(
                    |reason| EngineError::InvalidTransformation {
                        migration_id: migration.id.clone(),
                        reason,
                    },
                )?;
                current = next;
                outcome.warnings.extend(warning);
            }
            outcome.content = current;
            outcome.warnings.extend(migration.warnings.iter().cloned());
            outcome.applied.push(migration.id.clone());

            tracing::debug!(
                "Applied migration {} ({} -> {})",
                migration.id,
                migration.from_version,
                migration.to_version
            );
        }

        Ok(outcome)
    }

    fn lookup_chain(&self, template_id: &str, chain: &[String]) -> EngineResult<Vec<Migration>> {
        let snapshot = self.snapshot(template_id);
        chain
            .iter()
            .map(|id| {
                snapshot.iter().find(|m| &m.id == id).cloned().ok_or_else(|| {
                    EngineError::MigrationNotFound {
                        template_id: template_id.to_string(),
                        migration_id: id.clone(),
                    }
                })
            })
            .collect()
    }
}

fn overlaps(migrations: &[Migration]) -> Vec<MigrationOverlap> {
    let ranges: Vec<Option<(Version, Version)>> = migrations
        .iter()
        .map(|m| {
            let from = Version::parse(&m.from_version).ok()?;
            let to = Version::parse(&m.to_version).ok()?;
            // Downgrade migrations cover the same span as their reverse.
            if from.cmp_precedence(&to) == Ordering::Greater {
                Some((to, from))
            } else {
                Some((from, to))
            }
        })
        .collect();

    let mut found = Vec::new();
    for i in 0..migrations.len() {
        for j in (i + 1)..migrations.len() {
            let (Some((a_low, a_high)), Some((b_low, b_high))) = (&ranges[i], &ranges[j]) else {
                continue;
            };
            let disjoint = a_high.cmp_precedence(b_low) != Ordering::Greater
                || b_high.cmp_precedence(a_low) != Ordering::Greater;
            if disjoint {
                continue;
            }
            let (a, b) = (&migrations[i], &migrations[j]);
            found.push(MigrationOverlap {
                first: a.id.clone(),
                second: b.id.clone(),
                reason: format!(
                    "Migrations {} ({} -> {}) and {} ({} -> {}) cover overlapping ranges",
                    a.id, a.from_version, a.to_version, b.id, b.from_version, b.to_version
                ),
            });
        }
    }
    found
}
