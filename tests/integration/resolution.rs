//! Integration tests for version resolution and conflict detection.

use anyhow::Result;
use tmplver::constants::UNRESOLVED;
use tmplver::core::EngineError;
use tmplver::models::{DependencyDeclaration, NewVersion, ResolutionStrategy, ResolveOptions};
use tmplver::test_utils::{TestEngine, seed_versions};

async fn create_with_deps(
    engine: &TestEngine,
    template_id: &str,
    version: &str,
    deps: &[(&str, &str)],
) -> Result<()> {
    let mut new = NewVersion::new(version, "alice");
    for (id, constraint) in deps {
        new = new.with_dependency(DependencyDeclaration::runtime(*id, *constraint));
    }
    engine.manager.create_version(template_id, new).await?;
    Ok(())
}

/// A range that nothing satisfies fails with NoSatisfyingVersion.
#[tokio::test]
async fn test_range_without_match() -> Result<()> {
    let engine = TestEngine::in_memory().await?;
    seed_versions(&engine.manager, "widget", &["2.0.0"]).await?;

    let err = engine.manager.resolve_version("widget", "^1.0.0", ResolveOptions::default());
    assert!(
        matches!(err, Err(EngineError::NoSatisfyingVersion { .. })),
        "Expected NoSatisfyingVersion, got {err:?}"
    );
    Ok(())
}

/// Each strategy selects according to its own rule.
#[tokio::test]
async fn test_strategies_end_to_end() -> Result<()> {
    let engine = TestEngine::in_memory().await?;
    seed_versions(&engine.manager, "widget", &["1.0.0", "1.5.0", "2.0.0", "2.1.0-beta.2"]).await?;

    let resolve = |constraint: &str, strategy: ResolutionStrategy| {
        engine
            .manager
            .resolve_version("widget", constraint, ResolveOptions::default().with_strategy(strategy))
            .map(|r| r.resolved_version)
    };

    assert_eq!(resolve("^1.0.0", ResolutionStrategy::Range)?, "1.5.0");
    assert_eq!(resolve(">=1.0.0, <2.0.0", ResolutionStrategy::Range)?, "1.5.0");
    assert_eq!(resolve("1.0.0", ResolutionStrategy::Exact)?, "1.0.0");
    assert_eq!(resolve("^1.0.0", ResolutionStrategy::Latest)?, "2.0.0");
    assert_eq!(resolve("*", ResolutionStrategy::Prerelease)?, "2.1.0-beta.2");

    let err = resolve("1.2.3", ResolutionStrategy::Exact);
    assert!(matches!(err, Err(EngineError::VersionNotFound { .. })));

    let err = engine.manager.resolve_version("ghost", "*", ResolveOptions::default());
    assert!(matches!(err, Err(EngineError::NoVersionsForTemplate { .. })));
    Ok(())
}

/// Two paths resolving the same template to different versions give one conflict.
#[tokio::test]
async fn test_conflicting_transitive_versions() -> Result<()> {
    let engine = TestEngine::in_memory().await?;
    seed_versions(&engine.manager, "b", &["1.0.0", "1.3.0", "2.0.0", "2.2.0"]).await?;
    create_with_deps(&engine, "a", "1.0.0", &[("b", "^1.0.0")]).await?;
    create_with_deps(&engine, "c", "1.0.0", &[("b", "^2.0.0")]).await?;
    create_with_deps(&engine, "t", "1.0.0", &[("a", "^1.0.0"), ("c", "^1.0.0")]).await?;

    let resolution = engine.manager.resolve_version("t", "^1.0.0", ResolveOptions::default())?;

    assert_eq!(resolution.conflicts.len(), 1, "Exactly one conflict expected");
    let conflict = &resolution.conflicts[0];
    assert_eq!(conflict.template_id, "b");
    let versions: Vec<&str> = conflict.conflicting_versions.iter().map(String::as_str).collect();
    assert_eq!(versions, vec!["1.3.0", "2.2.0"]);

    // The flattened list keeps both paths.
    let b_entries: Vec<_> =
        resolution.dependencies.iter().filter(|d| d.template_id == "b").collect();
    assert_eq!(b_entries.len(), 2);
    assert_eq!(b_entries[0].required_by, "a@1.0.0");
    assert_eq!(b_entries[1].required_by, "c@1.0.0");
    Ok(())
}

/// Cyclic declarations terminate and record the cycle.
#[tokio::test]
async fn test_cycle_terminates_with_reason() -> Result<()> {
    let engine = TestEngine::in_memory().await?;
    seed_versions(&engine.manager, "a", &["1.0.0"]).await?;
    create_with_deps(&engine, "b", "1.0.0", &[("a", "^1.0.0")]).await?;
    create_with_deps(&engine, "a", "2.0.0", &[("b", "^1.0.0")]).await?;

    let resolution = engine.manager.resolve_version("a", "^2.0.0", ResolveOptions::default())?;

    assert_eq!(resolution.resolved_version, "2.0.0");
    assert_eq!(resolution.dependencies.len(), 2);
    let back_edge = &resolution.dependencies[1];
    assert_eq!(back_edge.template_id, "a");
    assert_eq!(back_edge.resolved_version, UNRESOLVED);
    assert_eq!(back_edge.reason.as_deref(), Some("CyclicDependency: a -> b -> a"));
    Ok(())
}

/// A dependency deprecated after creation is reported as unresolved, not fatal.
#[tokio::test]
async fn test_retroactively_deprecated_dependency() -> Result<()> {
    let engine = TestEngine::in_memory().await?;
    seed_versions(&engine.manager, "base", &["1.0.0"]).await?;
    create_with_deps(&engine, "widget", "1.0.0", &[("base", "^1.0.0")]).await?;
    engine.manager.deprecate_version("base", "1.0.0", "bob").await?;

    let resolution = engine.manager.resolve_version("widget", "*", ResolveOptions::default())?;
    assert_eq!(resolution.resolved_version, "1.0.0");
    assert_eq!(resolution.unresolved().count(), 1);
    assert!(resolution.install_order.contains(&"widget@1.0.0".to_string()));
    Ok(())
}

/// Install order lists dependencies before dependents.
#[tokio::test]
async fn test_install_order() -> Result<()> {
    let engine = TestEngine::in_memory().await?;
    seed_versions(&engine.manager, "base", &["1.0.0"]).await?;
    create_with_deps(&engine, "layout", "1.0.0", &[("base", "^1.0.0")]).await?;
    create_with_deps(&engine, "page", "1.0.0", &[("layout", "^1.0.0"), ("base", "^1.0.0")])
        .await?;

    let resolution = engine.manager.resolve_version("page", "*", ResolveOptions::default())?;
    assert_eq!(
        resolution.install_order,
        vec!["base@1.0.0".to_string(), "layout@1.0.0".to_string(), "page@1.0.0".to_string()]
    );
    Ok(())
}

/// Configured bounds are carried by the manager's default options.
#[tokio::test]
async fn test_depth_bound_from_options() -> Result<()> {
    let engine = TestEngine::in_memory().await?;
    seed_versions(&engine.manager, "d", &["1.0.0"]).await?;
    create_with_deps(&engine, "c", "1.0.0", &[("d", "*")]).await?;
    create_with_deps(&engine, "b", "1.0.0", &[("c", "*")]).await?;
    create_with_deps(&engine, "a", "1.0.0", &[("b", "*")]).await?;

    let options = engine.manager.default_resolve_options().with_limits(2, 8);
    let resolution = engine.manager.resolve_version("a", "*", options)?;
    let resolved: Vec<&str> =
        resolution.dependencies.iter().map(|d| d.resolved_version.as_str()).collect();
    assert_eq!(resolved, vec!["1.0.0", "1.0.0", UNRESOLVED]);
    Ok(())
}
