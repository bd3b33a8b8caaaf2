//! Test utilities for tmplver
//!
//! Helpers shared by unit tests and the integration suite (enable the
//! `test-utils` feature to use them from outside the crate):
//! - [`init_test_logging`] - one-time `tracing` subscriber for test output
//! - [`TestEngine`] - a manager wired to an in-memory backend and audit sink
//! - [`seed_versions`] - bulk creation of plain versions
//!
//! # Example
//!
//! ```rust,no_run
//! use tmplver::test_utils::{TestEngine, seed_versions};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let engine = TestEngine::in_memory().await?;
//! seed_versions(&engine.manager, "widget", &["1.0.0", "2.0.0"]).await?;
//! assert_eq!(engine.manager.get_version_history("widget").len(), 2);
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use std::path::Path;
use std::sync::{Arc, Once};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::audit::{AuditEventType, MemoryAuditSink};
use crate::config::EngineConfig;
use crate::manager::TemplateVersionManager;
use crate::models::NewVersion;
use crate::store::{FsBackend, MemoryBackend};

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Uses `level` when given, otherwise `RUST_LOG`; with neither, logging
/// stays off.
///
/// ```bash
/// RUST_LOG=tmplver=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

/// A manager plus handles on its backend and audit sink.
pub struct TestEngine {
    pub manager: TemplateVersionManager,
    pub audit: Arc<MemoryAuditSink>,
    /// Set for in-memory engines; used to inject write failures and delays
    pub backend: Option<Arc<MemoryBackend>>,
}

impl TestEngine {
    /// Engine on a fresh in-memory backend with a short persistence timeout.
    pub async fn in_memory() -> Result<Self> {
        init_test_logging(None);
        let backend = Arc::new(MemoryBackend::new());
        let audit = Arc::new(MemoryAuditSink::new());
        let config = EngineConfig {
            persist_timeout_ms: 500,
            ..EngineConfig::with_data_dir("unused")
        };

        let manager =
            TemplateVersionManager::with_backend(config, backend.clone(), audit.clone()).await?;
        Ok(Self {
            manager,
            audit,
            backend: Some(backend),
        })
    }

    /// Engine on TOML files under `data_dir`.
    pub async fn on_disk(data_dir: &Path) -> Result<Self> {
        init_test_logging(None);
        let audit = Arc::new(MemoryAuditSink::new());
        let config = EngineConfig::with_data_dir(data_dir);
        let backend = Arc::new(FsBackend::new(data_dir));

        let manager = TemplateVersionManager::with_backend(config, backend, audit.clone()).await?;
        Ok(Self {
            manager,
            audit,
            backend: None,
        })
    }

    /// Number of audit events of one type emitted so far.
    #[must_use]
    pub fn event_count(&self, event_type: AuditEventType) -> usize {
        self.audit.events_of(event_type).len()
    }
}

/// Create plain versions (no dependencies) of `template_id`, authored by "test".
pub async fn seed_versions(
    manager: &TemplateVersionManager,
    template_id: &str,
    versions: &[&str],
) -> Result<()> {
    for version in versions {
        manager.create_version(template_id, NewVersion::new(*version, "test")).await?;
    }
    Ok(())
}
