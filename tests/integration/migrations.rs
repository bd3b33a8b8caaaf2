//! Integration tests for migration registration, chains and application.

use anyhow::Result;
use tmplver::core::EngineError;
use tmplver::migration::ApplyOptions;
use tmplver::models::{Condition, MigrationSpec, Transformation};
use tmplver::test_utils::{TestEngine, seed_versions};
use tmplver::version::DiffType;

/// The canonical rename migration rewrites content and reports itself applied.
#[tokio::test]
async fn test_rename_migration() -> Result<()> {
    let engine = TestEngine::in_memory().await?;
    seed_versions(&engine.manager, "widget", &["1.0.0", "2.0.0"]).await?;

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
    assert_eq!(migration.diff_type, DiffType::Major);
    assert!(migration.breaking, "Major migrations are always breaking");

    let chain = engine.manager.build_migration_chain("widget", "1.0.0", "2.0.0")?;
    assert_eq!(chain, vec![migration.id.clone()]);

    let outcome = engine.manager.apply_migrations(
        "widget",
        "use oldName here",
        &chain,
        ApplyOptions::default(),
    )?;
    assert_eq!(outcome.content, "use newName here");
    assert_eq!(outcome.applied, vec![migration.id]);
    assert!(outcome.warnings.is_empty());
    Ok(())
}

/// Transformations run in order and see the output of earlier ones.
#[tokio::test]
async fn test_multi_step_chain() -> Result<()> {
    let engine = TestEngine::in_memory().await?;
    seed_versions(&engine.manager, "widget", &["1.0.0", "1.1.0", "1.2.0"]).await?;

    let first = MigrationSpec::automated()
        .with_transformation(Transformation::replace(r"color:\s*(\w+)", "colour: $1"))
        .with_transformation(Transformation::remove(r"(?m)^legacy.*\n"));
    let second = MigrationSpec::automated()
        .with_transformation(
            Transformation::add("\nfooter: true").when(Condition::NotContains("footer".into())),
        )
        .with_transformation(Transformation::modify("layout tree").because("needs manual review"))
        .with_warning("Check custom themes");

    engine.manager.create_migration("widget", "1.1.0", "1.2.0", second, "alice").await?;
    engine.manager.create_migration("widget", "1.0.0", "1.1.0", first, "alice").await?;

    let chain = engine.manager.build_migration_chain("widget", "1.0.0", "1.2.0")?;
    assert_eq!(chain.len(), 2);

    let content = "color: red\nlegacy: yes\nsize: 2";
    let outcome =
        engine.manager.apply_migrations("widget", content, &chain, ApplyOptions::default())?;

    assert_eq!(outcome.content, "colour: red\nsize: 2\nfooter: true");
    assert_eq!(outcome.applied.len(), 2);
    assert_eq!(outcome.warnings.len(), 2, "Structural edit and declared warning: {:?}", outcome.warnings);
    Ok(())
}

/// Manual migrations are skipped with a warning unless everything is applied.
#[tokio::test]
async fn test_manual_migration_skipped() -> Result<()> {
    let engine = TestEngine::in_memory().await?;
    seed_versions(&engine.manager, "widget", &["1.0.0", "1.0.1"]).await?;
    let manual = engine
        .manager
        .create_migration(
            "widget",
            "1.0.0",
            "1.0.1",
            MigrationSpec::manual().with_transformation(Transformation::replace("a", "b")),
            "alice",
        )
        .await?;
    assert_eq!(manual.diff_type, DiffType::Patch);

    let chain = vec![manual.id.clone()];
    let skipped = engine.manager.apply_migrations("widget", "aaa", &chain, ApplyOptions::default())?;
    assert_eq!(skipped.content, "aaa");
    assert!(skipped.applied.is_empty());
    assert_eq!(skipped.warnings.len(), 1);

    let forced =
        engine.manager.apply_migrations("widget", "aaa", &chain, ApplyOptions { auto_only: false })?;
    assert_eq!(forced.content, "bbb");
    Ok(())
}

/// Creation errors for missing versions, identical versions and bad patterns.
#[tokio::test]
async fn test_creation_errors() -> Result<()> {
    let engine = TestEngine::in_memory().await?;
    seed_versions(&engine.manager, "widget", &["1.0.0", "2.0.0"]).await?;

    let err = engine
        .manager
        .create_migration("widget", "0.1.0", "2.0.0", MigrationSpec::automated(), "a")
        .await;
    assert!(matches!(err, Err(EngineError::MigrationSourceVersionMissing { .. })));

    let err = engine
        .manager
        .create_migration("widget", "1.0.0", "9.0.0", MigrationSpec::automated(), "a")
        .await;
    assert!(matches!(err, Err(EngineError::MigrationTargetVersionMissing { .. })));

    let err = engine
        .manager
        .create_migration("widget", "2.0.0", "2.0.0", MigrationSpec::automated(), "a")
        .await;
    assert!(matches!(err, Err(EngineError::InvalidMigration { .. })));

    let bad_condition = MigrationSpec::automated()
        .with_transformation(Transformation::add("x").when(Condition::Matches("(".into())));
    let err = engine.manager.create_migration("widget", "1.0.0", "2.0.0", bad_condition, "a").await;
    assert!(matches!(err, Err(EngineError::InvalidMigration { .. })));

    assert!(engine.manager.list_migrations("widget").is_empty());
    Ok(())
}

/// Overlapping migrations inside a window are selected and flagged.
#[tokio::test]
async fn test_overlaps_are_flagged() -> Result<()> {
    let engine = TestEngine::in_memory().await?;
    seed_versions(&engine.manager, "widget", &["1.0.0", "1.5.0", "2.0.0"]).await?;
    for (from, to) in [("1.0.0", "2.0.0"), ("1.5.0", "2.0.0"), ("1.0.0", "1.5.0")] {
        engine
            .manager
            .create_migration("widget", from, to, MigrationSpec::automated(), "alice")
            .await?;
    }

    let chain = engine.manager.build_migration_chain("widget", "1.0.0", "2.0.0")?;
    let ordered: Vec<(String, String)> = chain
        .iter()
        .map(|id| {
            let m = engine.manager.list_migrations("widget").into_iter().find(|m| &m.id == id);
            m.map(|m| (m.from_version, m.to_version)).unwrap_or_default()
        })
        .collect();
    assert_eq!(
        ordered,
        vec![
            ("1.0.0".to_string(), "1.5.0".to_string()),
            ("1.0.0".to_string(), "2.0.0".to_string()),
            ("1.5.0".to_string(), "2.0.0".to_string()),
        ]
    );

    let overlaps = engine.manager.find_migration_overlaps("widget", &chain)?;
    assert_eq!(overlaps.len(), 2, "The wide migration overlaps both narrow ones");

    let err = engine.manager.find_migration_overlaps("widget", &["missing".to_string()]);
    assert!(matches!(err, Err(EngineError::MigrationNotFound { .. })));
    Ok(())
}
