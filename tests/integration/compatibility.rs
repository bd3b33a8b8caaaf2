//! Integration tests for compatibility checks.

use anyhow::Result;
use tmplver::compat::TargetEnvironment;
use tmplver::core::EngineError;
use tmplver::models::{Compatibility, DependencyDeclaration, NewVersion};
use tmplver::test_utils::{TestEngine, seed_versions};

#[tokio::test]
async fn test_report_separates_issues_and_warnings() -> Result<()> {
    let engine = TestEngine::in_memory().await?;
    engine
        .manager
        .create_version(
            "widget",
            NewVersion::new("1.0.0", "alice").with_compatibility(
                Compatibility::default()
                    .with_framework("react")
                    .with_framework("preact")
                    .with_runtime_range(">=18.0.0")
                    .with_tool_range("~5.1.0")
                    .with_platform("linux")
                    .with_platform("macos"),
            ),
        )
        .await?;

    let ok = TargetEnvironment::new()
        .with_framework("preact")
        .with_runtime_version("18.2.0")
        .with_tool_version("5.1.3")
        .with_platform("macos");
    let report = engine.manager.check_compatibility("widget", "1.0.0", &ok)?;
    assert!(report.compatible, "Matching target should be compatible: {report:?}");

    let soft = TargetEnvironment::new().with_tool_version("6.0.0").with_platform("windows");
    let report = engine.manager.check_compatibility("widget", "1.0.0", &soft)?;
    assert!(report.compatible, "Warnings alone must not make a version incompatible");
    assert_eq!(report.warnings.len(), 2);

    let hard = TargetEnvironment::new().with_framework("svelte").with_runtime_version("16.0.0");
    let report = engine.manager.check_compatibility("widget", "1.0.0", &hard)?;
    assert!(!report.compatible);
    assert_eq!(report.issues.len(), 2, "Framework and runtime should both be issues");
    Ok(())
}

/// Dependencies that can no longer be resolved make the version incompatible.
#[tokio::test]
async fn test_deprecated_dependency_is_an_issue() -> Result<()> {
    let engine = TestEngine::in_memory().await?;
    seed_versions(&engine.manager, "base", &["1.0.0"]).await?;
    engine
        .manager
        .create_version(
            "widget",
            NewVersion::new("1.0.0", "alice")
                .with_dependency(DependencyDeclaration::runtime("base", "^1.0.0")),
        )
        .await?;

    let target = TargetEnvironment::new();
    assert!(engine.manager.check_compatibility("widget", "1.0.0", &target)?.compatible);

    engine.manager.deprecate_version("base", "1.0.0", "bob").await?;
    let report = engine.manager.check_compatibility("widget", "1.0.0", &target)?;
    assert!(!report.compatible);
    assert!(report.issues[0].contains("base"), "Issue should name the dependency");
    Ok(())
}

#[tokio::test]
async fn test_unknown_version_is_an_error() -> Result<()> {
    let engine = TestEngine::in_memory().await?;
    let err = engine.manager.check_compatibility("widget", "1.0.0", &TargetEnvironment::new());
    assert!(matches!(err, Err(EngineError::VersionNotFound { .. })));
    Ok(())
}
