//! Integration tests for audit events.

use anyhow::Result;
use tmplver::audit::AuditEventType;
use tmplver::compat::TargetEnvironment;
use tmplver::migration::ApplyOptions;
use tmplver::models::{
    Classification, ComplianceMetadata, DependencyDeclaration, MigrationSpec, NewVersion,
    ResolveOptions, Transformation,
};
use tmplver::test_utils::{TestEngine, seed_versions};

/// Every operation emits its event with the actor and record classification.
#[tokio::test]
async fn test_events_per_operation() -> Result<()> {
    let engine = TestEngine::in_memory().await?;
    let secret = ComplianceMetadata {
        classification: Classification::Secret,
        ..ComplianceMetadata::default()
    };

    engine
        .manager
        .create_version("widget", NewVersion::new("1.0.0", "alice").with_compliance(secret.clone()))
        .await?;
    engine
        .manager
        .create_version("widget", NewVersion::new("2.0.0", "alice").with_compliance(secret))
        .await?;

    let created = engine.audit.events_of(AuditEventType::VersionCreated);
    assert_eq!(created.len(), 2);
    assert_eq!(created[0].actor_id, "alice");
    assert_eq!(created[0].classification, Classification::Secret);
    assert_eq!(created[0].details["prerelease"], false);

    engine.manager.deprecate_version("widget", "1.0.0", "bob").await?;
    engine.manager.deprecate_version("widget", "1.0.0", "bob").await?;
    let deprecated = engine.audit.events_of(AuditEventType::VersionDeprecated);
    assert_eq!(deprecated.len(), 1, "The no-op second deprecation must not emit");
    assert_eq!(deprecated[0].actor_id, "bob");

    let migration = engine
        .manager
        .create_migration(
            "widget",
            "1.0.0",
            "2.0.0",
            MigrationSpec::automated().with_transformation(Transformation::rename("a", "b")),
            "carol",
        )
        .await?;
    assert_eq!(engine.event_count(AuditEventType::MigrationCreated), 1);

    engine.manager.apply_migrations("widget", "a", &[migration.id.clone()], ApplyOptions::default())?;
    let executed = engine.audit.events_of(AuditEventType::MigrationExecuted);
    assert_eq!(executed.len(), 1);
    assert_eq!(executed[0].details["migration_id"], migration.id.as_str());
    assert_eq!(executed[0].version, "2.0.0");

    engine.manager.check_compatibility("widget", "2.0.0", &TargetEnvironment::new())?;
    let checked = engine.audit.events_of(AuditEventType::CompatibilityChecked);
    assert_eq!(checked.len(), 1);
    assert_eq!(checked[0].details["compatible"], true);
    Ok(())
}

/// Resolution always emits VERSION_RESOLVED and adds CONFLICT_DETECTED on conflicts.
#[tokio::test]
async fn test_resolution_events() -> Result<()> {
    let engine = TestEngine::in_memory().await?;
    seed_versions(&engine.manager, "b", &["1.0.0", "2.0.0"]).await?;
    for (id, constraint) in [("a", "^1.0.0"), ("c", "^2.0.0")] {
        engine
            .manager
            .create_version(
                id,
                NewVersion::new("1.0.0", "alice")
                    .with_dependency(DependencyDeclaration::runtime("b", constraint)),
            )
            .await?;
    }

    engine.manager.resolve_version("a", "*", ResolveOptions::default())?;
    assert_eq!(engine.event_count(AuditEventType::VersionResolved), 1);
    assert_eq!(engine.event_count(AuditEventType::ConflictDetected), 0);

    engine
        .manager
        .create_version(
            "t",
            NewVersion::new("1.0.0", "alice")
                .with_dependency(DependencyDeclaration::runtime("a", "*"))
                .with_dependency(DependencyDeclaration::runtime("c", "*")),
        )
        .await?;
    engine.manager.resolve_version("t", "*", ResolveOptions::default())?;

    assert_eq!(engine.event_count(AuditEventType::VersionResolved), 2);
    let conflicts = engine.audit.events_of(AuditEventType::ConflictDetected);
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].template_id, "t");
    assert_eq!(conflicts[0].actor_id, "system");
    Ok(())
}

/// Failed resolutions emit nothing.
#[tokio::test]
async fn test_failed_resolution_is_silent() -> Result<()> {
    let engine = TestEngine::in_memory().await?;
    seed_versions(&engine.manager, "widget", &["2.0.0"]).await?;

    assert!(engine.manager.resolve_version("widget", "^1.0.0", ResolveOptions::default()).is_err());
    assert_eq!(engine.event_count(AuditEventType::VersionResolved), 0);
    Ok(())
}
