//! TOML file backend.
//!
//! # Layout
//!
//! ```text
//! {data_dir}/templates/
//! ├── widget/
//! │   ├── .lock              # fs4 exclusive lock held while writing
//! │   ├── versions.toml
//! │   └── migrations.toml
//! └── base-layout/
//!     └── versions.toml
//! ```
//!
//! Both files start with a `version` header giving the format version,
//! followed by an array of tables:
//!
//! ```toml
//! version = 1
//!
//! [[versions]]
//! version = "1.0.0"
//! template_id = "widget"
//! # ...
//! ```
//!
//! Files written by a newer format are refused rather than misread.
//!
//! The lock is held by the blocking write itself, so a caller that stops
//! waiting never lets a second writer into the same directory early.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::backend::{StoreBackend, WriteTicket};
use super::lock::StoreLock;
use crate::constants::{MIGRATIONS_FILENAME, STORE_FORMAT_VERSION, VERSIONS_FILENAME};
use crate::core::validate_template_id;
use crate::models::{Migration, VersionRecord};
use crate::utils::fs::atomic_write;

#[derive(Debug, Serialize, Deserialize)]
struct VersionsFile {
    version: u32,
    #[serde(default)]
    versions: Vec<VersionRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct MigrationsFile {
    version: u32,
    #[serde(default)]
    migrations: Vec<Migration>,
}

trait FormatVersioned {
    fn format_version(&self) -> u32;
}

impl FormatVersioned for VersionsFile {
    fn format_version(&self) -> u32 {
        self.version
    }
}

impl FormatVersioned for MigrationsFile {
    fn format_version(&self) -> u32 {
        self.version
    }
}

/// Backend storing one directory per template under `{data_dir}/templates`.
#[derive(Debug, Clone)]
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    /// Create a backend rooted at `data_dir`. Nothing is touched on disk
    /// until the first write.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: data_dir.into().join("templates"),
        }
    }

    /// Directory holding every template directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn template_dir(&self, template_id: &str) -> Result<PathBuf> {
        validate_template_id(template_id)?;
        Ok(self.root.join(template_id))
    }

    async fn read_file<T>(&self, path: &Path) -> Result<Option<T>>
    where
        T: DeserializeOwned + FormatVersioned,
    {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Cannot read {}", path.display()));
            }
        };

        if content.trim().is_empty() {
            return Ok(None);
        }

        let parsed: T = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        if parsed.format_version() > STORE_FORMAT_VERSION {
            bail!(
                "{} has format version {} which is newer than supported version {}",
                path.display(),
                parsed.format_version(),
                STORE_FORMAT_VERSION
            );
        }

        Ok(Some(parsed))
    }

    async fn write_file<T: Serialize>(
        &self,
        template_id: &str,
        name: &str,
        value: &T,
        ticket: &WriteTicket,
    ) -> Result<()> {
        let dir = self.template_dir(template_id)?;
        let content = toml::to_string_pretty(value)
            .with_context(|| format!("Failed to serialize {name} for '{template_id}'"))?;

        let lock = StoreLock::acquire(&dir).await?;

        let path = dir.join(name);
        let path_clone = path.clone();
        let ticket = ticket.clone();
        tokio::task::spawn_blocking(move || {
            let _lock = lock;
            if !ticket.commit() {
                bail!("Write to {} was abandoned", path_clone.display());
            }
            atomic_write(&path_clone, content.as_bytes())
        })
        .await
        .context("Failed to spawn blocking task for file write")?
        .with_context(|| format!("Failed to write {}", path.display()))?;

        tracing::debug!("Wrote {}", path.display());
        Ok(())
    }
}

#[async_trait]
impl StoreBackend for FsBackend {
    async fn templates(&self) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Cannot list templates in {}", self.root.display()));
            }
        };

        let mut templates = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if validate_template_id(&name).is_err() {
                tracing::warn!("Skipping directory with invalid template id: {name}");
                continue;
            }
            templates.push(name);
        }

        Ok(templates)
    }

    async fn load_versions(&self, template_id: &str) -> Result<Vec<VersionRecord>> {
        let path = self.template_dir(template_id)?.join(VERSIONS_FILENAME);
        Ok(self
            .read_file::<VersionsFile>(&path)
            .await?
            .map(|file| file.versions)
            .unwrap_or_default())
    }

    async fn save_versions(
        &self,
        template_id: &str,
        versions: &[VersionRecord],
        ticket: &WriteTicket,
    ) -> Result<()> {
        let file = VersionsFile {
            version: STORE_FORMAT_VERSION,
            versions: versions.to_vec(),
        };
        self.write_file(template_id, VERSIONS_FILENAME, &file, ticket).await
    }

    async fn load_migrations(&self, template_id: &str) -> Result<Vec<Migration>> {
        let path = self.template_dir(template_id)?.join(MIGRATIONS_FILENAME);
        Ok(self
            .read_file::<MigrationsFile>(&path)
            .await?
            .map(|file| file.migrations)
            .unwrap_or_default())
    }

    async fn save_migrations(
        &self,
        template_id: &str,
        migrations: &[Migration],
        ticket: &WriteTicket,
    ) -> Result<()> {
        let file = MigrationsFile {
            version: STORE_FORMAT_VERSION,
            migrations: migrations.to_vec(),
        };
        self.write_file(template_id, MIGRATIONS_FILENAME, &file, ticket).await
    }
}
