//! The persistence contract behind [`VersionStore`](super::VersionStore) and
//! the migration registry, plus an in-memory implementation.
//!
//! Backends deal in whole per-template lists: every save replaces the stored
//! list for one template. A save claims its [`WriteTicket`] right before the
//! step that makes it visible; once claimed it runs to completion even when
//! the caller's timeout has elapsed. Errors are plain [`anyhow::Error`]s with context;
//! callers convert them to
//! [`EngineError::PersistenceFailure`](crate::core::EngineError::PersistenceFailure).

use anyhow::{Result, bail};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::time::Duration;

use crate::models::{Migration, VersionRecord};

const PENDING: u8 = 0;
const COMMITTED: u8 = 1;
const ABANDONED: u8 = 2;

/// Decides, exactly once, whether a save reaches its commit point or is
/// abandoned by its caller.
#[derive(Debug, Clone, Default)]
pub struct WriteTicket {
    state: Arc<AtomicU8>,
}

impl WriteTicket {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the commit point. `false` means the caller gave up and nothing
    /// may be written.
    pub fn commit(&self) -> bool {
        match self.state.compare_exchange(PENDING, COMMITTED, Ordering::SeqCst, Ordering::SeqCst) {
            Ok(_) => true,
            Err(state) => state == COMMITTED,
        }
    }

    /// Give up on the save. `false` means it already committed and has to be
    /// awaited.
    pub fn abandon(&self) -> bool {
        match self.state.compare_exchange(PENDING, ABANDONED, Ordering::SeqCst, Ordering::SeqCst) {
            Ok(_) => true,
            Err(state) => state == ABANDONED,
        }
    }
}

/// Logical read/write contract for template records.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Every template id with stored records, in any order.
    async fn templates(&self) -> Result<Vec<String>>;

    /// The stored version list of one template; empty when none was saved.
    async fn load_versions(&self, template_id: &str) -> Result<Vec<VersionRecord>>;

    /// Replace the stored version list of one template, claiming `ticket`
    /// before the new list becomes visible.
    async fn save_versions(
        &self,
        template_id: &str,
        versions: &[VersionRecord],
        ticket: &WriteTicket,
    ) -> Result<()>;

    /// The stored migrations of one template; empty when none were saved.
    async fn load_migrations(&self, template_id: &str) -> Result<Vec<Migration>>;

    /// Replace the stored migrations of one template, claiming `ticket`
    /// before the new list becomes visible.
    async fn save_migrations(
        &self,
        template_id: &str,
        migrations: &[Migration],
        ticket: &WriteTicket,
    ) -> Result<()>;
}

/// Backend that keeps everything in process memory.
///
/// Writes can be made to fail or to stall, which is how persistence failure
/// and timeout handling are exercised without touching the file system.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    versions: DashMap<String, Vec<VersionRecord>>,
    migrations: DashMap<String, Vec<Migration>>,
    fail_writes: AtomicBool,
    write_delay_ms: AtomicU64,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent save fail until switched off again.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Delay every subsequent save by `delay`.
    pub fn set_write_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.write_delay_ms.store(millis, Ordering::SeqCst);
    }

    async fn before_write(&self, template_id: &str, ticket: &WriteTicket) -> Result<()> {
        let delay = self.write_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("Simulated write failure for template '{template_id}'");
        }
        if !ticket.commit() {
            bail!("Write for template '{template_id}' was abandoned");
        }
        Ok(())
    }
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    async fn templates(&self) -> Result<Vec<String>> {
        Ok(self.versions.iter().map(|entry| entry.key().clone()).collect())
    }

    async fn load_versions(&self, template_id: &str) -> Result<Vec<VersionRecord>> {
        Ok(self.versions.get(template_id).map(|v| v.clone()).unwrap_or_default())
    }

    async fn save_versions(
        &self,
        template_id: &str,
        versions: &[VersionRecord],
        ticket: &WriteTicket,
    ) -> Result<()> {
        self.before_write(template_id, ticket).await?;
        self.versions.insert(template_id.to_string(), versions.to_vec());
        Ok(())
    }

    async fn load_migrations(&self, template_id: &str) -> Result<Vec<Migration>> {
        Ok(self.migrations.get(template_id).map(|m| m.clone()).unwrap_or_default())
    }

    async fn save_migrations(
        &self,
        template_id: &str,
        migrations: &[Migration],
        ticket: &WriteTicket,
    ) -> Result<()> {
        self.before_write(template_id, ticket).await?;
        self.migrations.insert(template_id.to_string(), migrations.to_vec());
        Ok(())
    }
}
