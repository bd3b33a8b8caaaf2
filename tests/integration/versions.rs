//! Integration tests for version creation, listing and deprecation.

use anyhow::Result;
use tmplver::core::EngineError;
use tmplver::models::{Classification, ComplianceMetadata, DependencyDeclaration, NewVersion};
use tmplver::test_utils::{TestEngine, seed_versions};

/// A created version comes back unchanged from the history.
#[tokio::test]
async fn test_create_then_history_returns_equivalent_record() -> Result<()> {
    let engine = TestEngine::in_memory().await?;
    seed_versions(&engine.manager, "base-layout", &["1.0.0"]).await?;

    let created = engine
        .manager
        .create_version(
            "widget",
            NewVersion::new("1.2.0", "alice")
                .with_changelog("Adds dark mode")
                .with_commit_ref("abc123")
                .with_tag("stable")
                .with_dependency(DependencyDeclaration::runtime("base-layout", "^1.0.0"))
                .with_compliance(ComplianceMetadata {
                    classification: Classification::Restricted,
                    approved: true,
                    approver: Some("bob".to_string()),
                    ..ComplianceMetadata::default()
                }),
        )
        .await?;

    let history = engine.manager.get_version_history("widget");
    assert_eq!(history.len(), 1, "Exactly one version should exist");
    assert_eq!(history[0], created, "Stored record should equal the created one");
    assert!(!history[0].prerelease);
    assert!(!history[0].deprecated);

    let fetched = engine.manager.get_version("widget", "1.2.0")?;
    assert_eq!(fetched, created, "Direct lookup should return the created record");
    Ok(())
}

/// Looking up a version that was never created is an error.
#[tokio::test]
async fn test_get_unknown_version_is_not_found() -> Result<()> {
    let engine = TestEngine::in_memory().await?;
    seed_versions(&engine.manager, "widget", &["1.0.0"]).await?;

    let err = engine.manager.get_version("widget", "1.1.0").unwrap_err();
    assert!(matches!(err, EngineError::VersionNotFound { .. }), "Got {err:?}");
    assert!(engine.manager.get_version("ghost", "1.0.0").is_err());
    Ok(())
}

/// The prerelease flag is derived from the version string.
#[tokio::test]
async fn test_prerelease_flag_is_derived() -> Result<()> {
    let engine = TestEngine::in_memory().await?;
    let record =
        engine.manager.create_version("widget", NewVersion::new("2.0.0-beta.1", "alice")).await?;
    assert!(record.prerelease, "2.0.0-beta.1 should be flagged as prerelease");
    Ok(())
}

/// Invalid versions, ids and duplicates are rejected without storing anything.
#[tokio::test]
async fn test_invalid_input_is_rejected() -> Result<()> {
    let engine = TestEngine::in_memory().await?;
    seed_versions(&engine.manager, "widget", &["1.0.0"]).await?;

    for bad in ["v1.0.0", "1.0", "one"] {
        let err = engine.manager.create_version("widget", NewVersion::new(bad, "a")).await;
        assert!(
            matches!(err, Err(EngineError::InvalidVersionFormat { .. })),
            "{bad} should be an invalid version, got {err:?}"
        );
    }

    let err = engine.manager.create_version("../widget", NewVersion::new("1.0.0", "a")).await;
    assert!(matches!(err, Err(EngineError::InvalidTemplateId { .. })));

    let err = engine.manager.create_version("widget", NewVersion::new("1.0.0", "a")).await;
    assert!(matches!(err, Err(EngineError::VersionExists { .. })));

    assert_eq!(engine.manager.get_version_history("widget").len(), 1);
    Ok(())
}

/// An unsatisfiable dependency aborts creation and leaves the store unchanged.
#[tokio::test]
async fn test_unsatisfiable_dependency_leaves_store_unchanged() -> Result<()> {
    let engine = TestEngine::in_memory().await?;
    seed_versions(&engine.manager, "base", &["1.0.0"]).await?;

    let err = engine
        .manager
        .create_version(
            "widget",
            NewVersion::new("1.0.0", "alice")
                .with_dependency(DependencyDeclaration::runtime("base", "^9.9.9")),
        )
        .await;

    assert!(
        matches!(err, Err(EngineError::ConstraintUnsatisfiable { .. })),
        "Expected ConstraintUnsatisfiable, got {err:?}"
    );
    assert!(engine.manager.get_version_history("widget").is_empty());
    assert_eq!(engine.manager.templates(), vec!["base".to_string()]);
    Ok(())
}

/// A dependency on a template without versions is missing.
#[tokio::test]
async fn test_missing_dependency() -> Result<()> {
    let engine = TestEngine::in_memory().await?;
    let err = engine
        .manager
        .create_version(
            "widget",
            NewVersion::new("1.0.0", "alice")
                .with_dependency(DependencyDeclaration::runtime("ghost", "*")),
        )
        .await;
    assert!(matches!(err, Err(EngineError::DependencyMissing { .. })));
    Ok(())
}

/// Listing never returns deprecated entries unless asked to.
#[tokio::test]
async fn test_list_excludes_deprecated() -> Result<()> {
    let engine = TestEngine::in_memory().await?;
    seed_versions(&engine.manager, "widget", &["1.0.0", "1.1.0", "1.2.0", "2.0.0-rc.1"]).await?;
    engine.manager.deprecate_version("widget", "1.1.0", "bob").await?;

    let visible = engine.manager.get_versions("widget", false, true);
    assert!(visible.iter().all(|r| !r.deprecated), "No deprecated entry may be listed");
    let versions: Vec<&str> = visible.iter().map(|r| r.version.as_str()).collect();
    assert_eq!(versions, vec!["2.0.0-rc.1", "1.2.0", "1.0.0"]);

    let stable = engine.manager.get_versions("widget", false, false);
    assert_eq!(stable.len(), 2);

    let all = engine.manager.get_versions("widget", true, true);
    assert_eq!(all.len(), 4);
    Ok(())
}

/// Deprecating twice is a no-op and unknown versions are reported.
#[tokio::test]
async fn test_deprecate_twice_is_noop() -> Result<()> {
    let engine = TestEngine::in_memory().await?;
    seed_versions(&engine.manager, "widget", &["1.0.0"]).await?;

    engine.manager.deprecate_version("widget", "1.0.0", "bob").await?;
    engine.manager.deprecate_version("widget", "1.0.0", "bob").await?;

    let history = engine.manager.get_version_history("widget");
    assert!(history[0].deprecated);

    let err = engine.manager.deprecate_version("widget", "3.0.0", "bob").await;
    assert!(matches!(err, Err(EngineError::VersionNotFound { .. })));
    Ok(())
}

/// Latest is the strictly highest non-deprecated stable version.
#[tokio::test]
async fn test_latest_version() -> Result<()> {
    let engine = TestEngine::in_memory().await?;
    seed_versions(&engine.manager, "widget", &["1.0.0", "1.10.0", "1.9.0", "2.0.0", "3.0.0-alpha"])
        .await?;
    engine.manager.deprecate_version("widget", "2.0.0", "bob").await?;

    assert_eq!(engine.manager.get_latest_version("widget", false)?.version, "1.10.0");
    assert_eq!(engine.manager.get_latest_version("widget", true)?.version, "3.0.0-alpha");

    let err = engine.manager.get_latest_version("ghost", false);
    assert!(matches!(err, Err(EngineError::NoVersionsForTemplate { .. })));
    Ok(())
}

/// Writers on the same template are serialized; every version lands.
#[tokio::test]
async fn test_concurrent_creates_on_one_template() -> Result<()> {
    let engine = TestEngine::in_memory().await?;

    let creates = (0..20).map(|i| {
        engine.manager.create_version("widget", NewVersion::new(format!("1.{i}.0"), "alice"))
    });
    for result in futures::future::join_all(creates).await {
        result?;
    }

    let history = engine.manager.get_version_history("widget");
    assert_eq!(history.len(), 20);
    assert_eq!(history[0].version, "1.19.0", "History should be sorted newest first");
    assert_eq!(history[19].version, "1.0.0");
    Ok(())
}
