//! Per-template version storage.
//!
//! [`VersionStore`] owns the version list of every template and keeps two
//! invariants: version strings are unique within a template, and each list is
//! sorted newest first by semver precedence.
//!
//! # Snapshots and Writers
//!
//! Readers never take a lock. Each template's list lives behind an `Arc` that
//! is replaced wholesale after a mutation has been persisted, so a reader
//! sees either the list before a mutation or the list after it.
//!
//! Writers are serialized per template through [`TemplateLocks`], which the
//! migration registry shares so that version and migration writes for one
//! template never interleave. Writes to different templates run in parallel.
//!
//! # Persistence
//!
//! Every mutation writes the full per-template list through a
//! [`StoreBackend`], bounded by a timeout. If the write fails or times out the
//! in-memory snapshot is left untouched and the caller gets
//! [`EngineError::PersistenceFailure`].

use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

pub mod backend;
pub mod file;
pub mod lock;

pub use backend::{MemoryBackend, StoreBackend, WriteTicket};
pub use file::FsBackend;

use crate::constants::LOAD_CONCURRENCY;
use crate::core::{EngineError, EngineResult, validate_template_id};
use crate::models::VersionRecord;
use crate::version::sort_descending;

/// Per-template writer locks.
///
/// Cloning shares the underlying map.
#[derive(Debug, Clone, Default)]
pub struct TemplateLocks {
    inner: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl TemplateLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive write access to `template_id`.
    pub async fn acquire(&self, template_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .inner
            .entry(template_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}

/// Run a backend write, bounded by `timeout`, and convert failures to
/// [`EngineError::PersistenceFailure`].
///
/// The timeout only covers the wait before `write` claims `ticket`. A write
/// that already committed is awaited to the end so a reported failure never
/// lands in storage afterwards.
pub(crate) async fn persist_with_timeout<F>(
    timeout: Duration,
    operation: &str,
    template_id: &str,
    ticket: &WriteTicket,
    write: F,
) -> EngineResult<()>
where
    F: Future<Output = anyhow::Result<()>>,
{
    tokio::pin!(write);

    let result = match tokio::time::timeout(timeout, &mut write).await {
        Ok(result) => result,
        Err(_) if ticket.abandon() => {
            tracing::warn!("Timed out after {timeout:?} trying to {operation} for '{template_id}'");
            return Err(EngineError::PersistenceFailure {
                operation: operation.to_string(),
                template_id: template_id.to_string(),
                reason: format!("timed out after {}ms", timeout.as_millis()),
            });
        }
        Err(_) => {
            tracing::debug!("{operation} for '{template_id}' committed before the timeout, waiting");
            write.await
        }
    };

    result.map_err(|e| {
        tracing::warn!("Failed to {operation} for '{template_id}': {e:#}");
        EngineError::persistence(operation, template_id, &e)
    })
}

/// Filters for [`VersionStore::list`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub include_deprecated: bool,
    pub include_prerelease: bool,
}

impl ListOptions {
    /// Every version, deprecated and prerelease included.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            include_deprecated: true,
            include_prerelease: true,
        }
    }
}

/// Ordered, persisted version lists keyed by template id.
pub struct VersionStore {
    backend: Arc<dyn StoreBackend>,
    snapshots: DashMap<String, Arc<Vec<VersionRecord>>>,
    locks: TemplateLocks,
    timeout: Duration,
}

impl std::fmt::Debug for VersionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionStore")
            .field("templates", &self.snapshots.len())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl VersionStore {
    /// Open a store, loading every template known to `backend`.
    ///
    /// Templates are loaded concurrently. Lists read from the backend are
    /// re-sorted so the ordering invariant holds whatever wrote them.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::PersistenceFailure`] if listing or loading any
    /// template fails or times out.
    pub async fn open(
        backend: Arc<dyn StoreBackend>,
        locks: TemplateLocks,
        timeout: Duration,
    ) -> EngineResult<Self> {
        let templates = load_with_timeout(timeout, "list templates", "*", backend.templates())
            .await?;

        let loaded: Vec<EngineResult<(String, Vec<VersionRecord>)>> = stream::iter(templates)
            .map(|template_id| {
                let backend = Arc::clone(&backend);
                async move {
                    let versions = load_with_timeout(
                        timeout,
                        "load versions",
                        &template_id,
                        backend.load_versions(&template_id),
                    )
                    .await?;
                    Ok((template_id, versions))
                }
            })
            .buffer_unordered(LOAD_CONCURRENCY)
            .collect()
            .await;

        let snapshots = DashMap::new();
        for entry in loaded {
            let (template_id, mut versions) = entry?;
            if versions.is_empty() {
                continue;
            }
            sort_descending(&mut versions, |r| r.version.as_str());
            tracing::debug!("Loaded {} versions for '{}'", versions.len(), template_id);
            snapshots.insert(template_id, Arc::new(versions));
        }

        Ok(Self {
            backend,
            snapshots,
            locks,
            timeout,
        })
    }

    /// The backend this store persists through.
    #[must_use]
    pub fn backend(&self) -> Arc<dyn StoreBackend> {
        Arc::clone(&self.backend)
    }

    /// Current snapshot of a template's versions, newest first. Empty for an
    /// unknown template.
    #[must_use]
    pub fn snapshot(&self, template_id: &str) -> Arc<Vec<VersionRecord>> {
        self.snapshots
            .get(template_id)
            .map(|entry| Arc::clone(entry.value()))
            .unwrap_or_default()
    }

    /// Look up one version by its exact version string.
    #[must_use]
    pub fn get(&self, template_id: &str, version: &str) -> Option<VersionRecord> {
        self.snapshot(template_id).iter().find(|r| r.version == version).cloned()
    }

    /// Whether `version` exists for `template_id`.
    #[must_use]
    pub fn contains(&self, template_id: &str, version: &str) -> bool {
        self.snapshot(template_id).iter().any(|r| r.version == version)
    }

    /// Versions of a template, newest first, filtered by `options`.
    #[must_use]
    pub fn list(&self, template_id: &str, options: ListOptions) -> Vec<VersionRecord> {
        self.snapshot(template_id)
            .iter()
            .filter(|r| options.include_deprecated || !r.deprecated)
            .filter(|r| options.include_prerelease || !r.prerelease)
            .cloned()
            .collect()
    }

    /// Every template with at least one version, sorted.
    #[must_use]
    pub fn templates(&self) -> Vec<String> {
        let mut templates: Vec<String> =
            self.snapshots.iter().map(|entry| entry.key().clone()).collect();
        templates.sort();
        templates
    }

    /// Admit a new record.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidTemplateId`] for an unusable template id
    /// - [`EngineError::VersionExists`] when the version string is taken
    /// - [`EngineError::PersistenceFailure`] when the write fails; the store
    ///   is unchanged
    pub async fn put(&self, record: VersionRecord) -> EngineResult<()> {
        validate_template_id(&record.template_id)?;
        let template_id = record.template_id.clone();
        let _guard = self.locks.acquire(&template_id).await;

        let current = self.snapshot(&template_id);
        if current.iter().any(|r| r.version == record.version) {
            return Err(EngineError::VersionExists {
                template_id,
                version: record.version,
            });
        }

        let mut next = Vec::with_capacity(current.len() + 1);
        next.extend(current.iter().cloned());
        next.push(record);
        sort_descending(&mut next, |r| r.version.as_str());

        let ticket = WriteTicket::new();
        persist_with_timeout(
            self.timeout,
            "save versions",
            &template_id,
            &ticket,
            self.backend.save_versions(&template_id, &next, &ticket),
        )
        .await?;

        tracing::info!("Stored {} versions for '{}'", next.len(), template_id);
        self.snapshots.insert(template_id, Arc::new(next));
        Ok(())
    }

    /// Mark a version deprecated.
    ///
    /// Returns `false` without persisting when the version already was.
    ///
    /// # Errors
    ///
    /// - [`EngineError::VersionNotFound`] for an unknown version
    /// - [`EngineError::PersistenceFailure`] when the write fails; the store
    ///   is unchanged
    pub async fn deprecate(&self, template_id: &str, version: &str) -> EngineResult<bool> {
        let _guard = self.locks.acquire(template_id).await;

        let current = self.snapshot(template_id);
        let Some(index) = current.iter().position(|r| r.version == version) else {
            return Err(EngineError::VersionNotFound {
                template_id: template_id.to_string(),
                version: version.to_string(),
            });
        };

        if current[index].deprecated {
            tracing::debug!("{}@{} is already deprecated", template_id, version);
            return Ok(false);
        }

        let mut next: Vec<VersionRecord> = current.iter().cloned().collect();
        next[index].deprecated = true;

        let ticket = WriteTicket::new();
        persist_with_timeout(
            self.timeout,
            "save versions",
            template_id,
            &ticket,
            self.backend.save_versions(template_id, &next, &ticket),
        )
        .await?;

        tracing::info!("Deprecated {}@{}", template_id, version);
        self.snapshots.insert(template_id.to_string(), Arc::new(next));
        Ok(true)
    }
}

/// Like [`persist_with_timeout`] for reads that return a value.
pub(crate) async fn load_with_timeout<T, F>(
    timeout: Duration,
    operation: &str,
    template_id: &str,
    read: F,
) -> EngineResult<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(timeout, read).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(EngineError::persistence(operation, template_id, &e)),
        Err(_) => Err(EngineError::PersistenceFailure {
            operation: operation.to_string(),
            template_id: template_id.to_string(),
            reason: format!("timed out after {}ms", timeout.as_millis()),
        }),
    }
}
