//! Integration tests for persistence: failure atomicity, timeouts and reopen.

use anyhow::Result;
use std::time::Duration;
use tempfile::TempDir;
use tmplver::core::EngineError;
use tmplver::migration::ApplyOptions;
use tmplver::models::{DependencyDeclaration, MigrationSpec, NewVersion, Transformation};
use tmplver::test_utils::{TestEngine, seed_versions};

fn memory_backend(engine: &TestEngine) -> &tmplver::store::MemoryBackend {
    engine.backend.as_deref().expect("in-memory engine has a backend handle")
}

/// A failed write leaves both the store and the audit log untouched.
#[tokio::test]
async fn test_failed_write_changes_nothing() -> Result<()> {
    let engine = TestEngine::in_memory().await?;
    seed_versions(&engine.manager, "widget", &["1.0.0"]).await?;
    let events_before = engine.audit.events().len();

    memory_backend(&engine).set_fail_writes(true);

    let err = engine.manager.create_version("widget", NewVersion::new("2.0.0", "alice")).await;
    assert!(matches!(err, Err(EngineError::PersistenceFailure { .. })), "got {err:?}");

    let err = engine.manager.deprecate_version("widget", "1.0.0", "bob").await;
    assert!(matches!(err, Err(EngineError::PersistenceFailure { .. })), "got {err:?}");

    let history = engine.manager.get_version_history("widget");
    assert_eq!(history.len(), 1);
    assert!(!history[0].deprecated);
    assert_eq!(engine.audit.events().len(), events_before, "No event for failed mutations");

    memory_backend(&engine).set_fail_writes(false);
    engine.manager.create_version("widget", NewVersion::new("2.0.0", "alice")).await?;
    assert_eq!(engine.manager.get_version_history("widget").len(), 2);
    Ok(())
}

/// A write slower than the configured timeout is a persistence failure.
#[tokio::test]
async fn test_slow_write_times_out() -> Result<()> {
    let engine = TestEngine::in_memory().await?;
    memory_backend(&engine).set_write_delay(Duration::from_secs(2));

    let err = engine.manager.create_version("widget", NewVersion::new("1.0.0", "alice")).await;
    match err {
        Err(EngineError::PersistenceFailure { reason, .. }) => {
            assert!(reason.contains("timed out"), "Reason should mention the timeout: {reason}");
        }
        other => panic!("Expected PersistenceFailure, got {other:?}"),
    }
    assert!(engine.manager.templates().is_empty());
    Ok(())
}

/// Versions, deprecations and migrations survive reopening from disk.
#[tokio::test]
async fn test_file_backend_round_trip() -> Result<()> {
    let temp = TempDir::new()?;
    let migration_id;

    {
        let engine = TestEngine::on_disk(temp.path()).await?;
        seed_versions(&engine.manager, "base", &["1.0.0", "1.1.0"]).await?;
        engine
            .manager
            .create_version(
                "widget",
                NewVersion::new("1.0.0", "alice")
                    .with_dependency(DependencyDeclaration::runtime("base", "^1.0.0")),
            )
            .await?;
        seed_versions(&engine.manager, "widget", &["2.0.0"]).await?;
        engine.manager.deprecate_version("base", "1.0.0", "bob").await?;

        let migration = engine
            .manager
            .create_migration(
                "widget",
                "1.0.0",
                "2.0.0",
                MigrationSpec::automated()
                    .with_transformation(Transformation::rename("oldName", "newName")),
                "alice",
            )
            .await?;
        migration_id = migration.id;
    }

    assert!(temp.path().join("templates/widget/versions.toml").exists());
    assert!(temp.path().join("templates/widget/migrations.toml").exists());

    let reopened = TestEngine::on_disk(temp.path()).await?;
    assert_eq!(reopened.manager.templates(), vec!["base".to_string(), "widget".to_string()]);

    let base = reopened.manager.get_version_history("base");
    let versions: Vec<(&str, bool)> = base.iter().map(|r| (r.version.as_str(), r.deprecated)).collect();
    assert_eq!(versions, vec![("1.1.0", false), ("1.0.0", true)]);

    let widget = reopened.manager.get_version_history("widget");
    assert_eq!(widget[1].dependencies[0].dependency_id, "base");

    let chain = reopened.manager.build_migration_chain("widget", "1.0.0", "2.0.0")?;
    assert_eq!(chain, vec![migration_id]);
    let outcome =
        reopened.manager.apply_migrations("widget", "oldName", &chain, ApplyOptions::default())?;
    assert_eq!(outcome.content, "newName");
    Ok(())
}

/// Concurrent writers on different templates all land on disk.
#[tokio::test]
async fn test_parallel_writes_to_disk() -> Result<()> {
    let temp = TempDir::new()?;
    let engine = TestEngine::on_disk(temp.path()).await?;

    let templates: Vec<String> = (0..8).map(|i| format!("template-{i}")).collect();
    let manager = &engine.manager;
    let creates = templates.iter().flat_map(|id| {
        ["1.0.0", "1.1.0"]
            .into_iter()
            .map(move |v| manager.create_version(id, NewVersion::new(v, "alice")))
    });
    for result in futures::future::join_all(creates).await {
        result?;
    }

    let reopened = TestEngine::on_disk(temp.path()).await?;
    assert_eq!(reopened.manager.templates().len(), 8);
    for id in &templates {
        assert_eq!(reopened.manager.get_version_history(id).len(), 2, "{id} should have 2 versions");
    }
    Ok(())
}
