//! Error handling for tmplver
//!
//! This module provides the typed error taxonomy of the engine and a
//! user-friendly wrapper for presenting errors to people. The error system is
//! designed around two principles:
//! 1. **Strongly-typed errors** so callers can match on precise failure modes
//! 2. **User-friendly messages** with actionable suggestions for tooling built on top
//!
//! # Architecture
//!
//! - [`EngineError`] - Enumerated error types for every failure case of the engine
//! - [`ErrorContext`] - Wrapper that adds details and suggestions
//!
//! # Error Categories
//!
//! - **Validation**: [`EngineError::InvalidVersionFormat`], [`EngineError::InvalidTemplateId`], ...
//! - **Dependencies**: [`EngineError::DependencyMissing`], [`EngineError::ConstraintUnsatisfiable`]
//! - **Resolution**: [`EngineError::NoVersionsForTemplate`], [`EngineError::NoSatisfyingVersion`], ...
//! - **Migrations**: [`EngineError::MigrationSourceVersionMissing`], ...
//! - **Persistence**: [`EngineError::PersistenceFailure`]
//!
//! Validation errors abort the creating operation before anything is stored.
//! [`EngineError::PersistenceFailure`] guarantees that no in-memory state changed.
//!
//! # Examples
//!
//! ```rust,no_run
//! use tmplver::core::{EngineError, user_friendly_error};
//!
//! let error = EngineError::NoVersionsForTemplate {
//!     template_id: "widget".to_string(),
//! };
//! let ctx = user_friendly_error(anyhow::Error::from(error));
//! ctx.display(); // Shows colored error with suggestions
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// Result alias used by every fallible engine operation.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// The main error type for engine operations.
///
/// Every public operation returns either a typed success value or one of these
/// variants. No operation silently downgrades one of them into a warning,
/// except where a compatibility check explicitly classifies a mismatch as soft.
///
/// # Examples
///
/// ```rust,no_run
/// use tmplver::core::EngineError;
///
/// fn handle(error: EngineError) {
///     match error {
///         EngineError::NoSatisfyingVersion { template_id, constraint } => {
///             eprintln!("nothing in {template_id} matches {constraint}");
///         }
///         EngineError::PersistenceFailure { .. } => {
///             eprintln!("storage unavailable, nothing was changed");
///         }
///         other => eprintln!("{other}"),
///     }
/// }
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A version string does not follow MAJOR.MINOR.PATCH[-PRERELEASE][+BUILD]
    #[error("Invalid version format '{version}': {reason}")]
    InvalidVersionFormat {
        /// The rejected version string
        version: String,
        /// Parser message
        reason: String,
    },

    /// A range expression could not be parsed
    #[error("Invalid version constraint '{constraint}': {reason}")]
    InvalidVersionConstraint {
        /// The rejected constraint
        constraint: String,
        /// Parser message
        reason: String,
    },

    /// A template identifier contains characters that cannot be stored
    #[error("Invalid template id '{template_id}': {reason}")]
    InvalidTemplateId {
        /// The rejected identifier
        template_id: String,
        /// Why it was rejected
        reason: String,
    },

    /// The version string is already present for the template
    #[error("Version {version} already exists for template '{template_id}'")]
    VersionExists {
        /// Owning template
        template_id: String,
        /// Duplicate version
        version: String,
    },

    /// The requested version is not present (or not a candidate) for the template
    #[error("Version '{version}' not found for template '{template_id}'")]
    VersionNotFound {
        /// Owning template
        template_id: String,
        /// Requested version
        version: String,
    },

    /// The template has no versions at all
    #[error("No versions found for template '{template_id}'")]
    NoVersionsForTemplate {
        /// Requested template
        template_id: String,
    },

    /// A declared dependency has no versions
    #[error("Dependency '{dependency_id}' of template '{template_id}' has no versions")]
    DependencyMissing {
        /// Template declaring the dependency
        template_id: String,
        /// Missing dependency
        dependency_id: String,
    },

    /// No non-deprecated version of a dependency satisfies the declared range
    #[error(
        "No version of dependency '{dependency_id}' satisfies '{constraint}' (required by '{template_id}')"
    )]
    ConstraintUnsatisfiable {
        /// Template declaring the dependency
        template_id: String,
        /// Dependency whose versions were checked
        dependency_id: String,
        /// The declared range
        constraint: String,
    },

    /// No candidate version satisfies the requested constraint
    #[error("No version of template '{template_id}' satisfies '{constraint}'")]
    NoSatisfyingVersion {
        /// Requested template
        template_id: String,
        /// Requested constraint
        constraint: String,
    },

    /// Prerelease strategy requested but the template has no usable prerelease
    #[error("No prerelease versions available for template '{template_id}'")]
    NoPrereleaseVersions {
        /// Requested template
        template_id: String,
    },

    /// A dependency declaration points back at the declaring template
    #[error("Circular dependency detected: {chain}")]
    CyclicDependency {
        /// The cycle, rendered as `a -> b -> a`
        chain: String,
    },

    /// Migration source version does not exist
    #[error("Migration source version '{version}' not found for template '{template_id}'")]
    MigrationSourceVersionMissing {
        /// Owning template
        template_id: String,
        /// Missing source version
        version: String,
    },

    /// Migration target version does not exist
    #[error("Migration target version '{version}' not found for template '{template_id}'")]
    MigrationTargetVersionMissing {
        /// Owning template
        template_id: String,
        /// Missing target version
        version: String,
    },

    /// Migration definition rejected at creation time
    #[error("Invalid migration for template '{template_id}': {reason}")]
    InvalidMigration {
        /// Owning template
        template_id: String,
        /// Why it was rejected
        reason: String,
    },

    /// A chain references a migration that is not registered for the template
    #[error("Migration '{migration_id}' not found for template '{template_id}'")]
    MigrationNotFound {
        /// Owning template
        template_id: String,
        /// Unknown migration id
        migration_id: String,
    },

    /// A stored transformation could not be applied
    #[error("Invalid transformation in migration '{migration_id}': {reason}")]
    InvalidTransformation {
        /// Migration containing the transformation
        migration_id: String,
        /// Why it failed
        reason: String,
    },

    /// Reading or writing the backing store failed or timed out
    #[error("Persistence failure during {operation} for template '{template_id}': {reason}")]
    PersistenceFailure {
        /// Operation that failed (e.g. "save versions")
        operation: String,
        /// Template whose record set was involved
        template_id: String,
        /// Flattened error chain
        reason: String,
    },

    /// Engine configuration could not be loaded
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the problem
        message: String,
    },

    /// Other error
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

impl EngineError {
    /// Build a [`EngineError::PersistenceFailure`] from an [`anyhow::Error`],
    /// keeping the whole context chain in the reason.
    pub fn persistence(
        operation: impl Into<String>,
        template_id: impl Into<String>,
        error: &anyhow::Error,
    ) -> Self {
        Self::PersistenceFailure {
            operation: operation.into(),
            template_id: template_id.into(),
            reason: format!("{error:#}"),
        }
    }

    /// Short, stable name of the variant, used in recorded reasons and audit details.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidVersionFormat { .. } => "InvalidVersionFormat",
            Self::InvalidVersionConstraint { .. } => "InvalidVersionConstraint",
            Self::InvalidTemplateId { .. } => "InvalidTemplateId",
            Self::VersionExists { .. } => "VersionExists",
            Self::VersionNotFound { .. } => "VersionNotFound",
            Self::NoVersionsForTemplate { .. } => "NoVersionsForTemplate",
            Self::DependencyMissing { .. } => "DependencyMissing",
            Self::ConstraintUnsatisfiable { .. } => "ConstraintUnsatisfiable",
            Self::NoSatisfyingVersion { .. } => "NoSatisfyingVersion",
            Self::NoPrereleaseVersions { .. } => "NoPrereleaseVersions",
            Self::CyclicDependency { .. } => "CyclicDependency",
            Self::MigrationSourceVersionMissing { .. } => "MigrationSourceVersionMissing",
            Self::MigrationTargetVersionMissing { .. } => "MigrationTargetVersionMissing",
            Self::InvalidMigration { .. } => "InvalidMigration",
            Self::MigrationNotFound { .. } => "MigrationNotFound",
            Self::InvalidTransformation { .. } => "InvalidTransformation",
            Self::PersistenceFailure { .. } => "PersistenceFailure",
            Self::ConfigError { .. } => "ConfigError",
            Self::Other { .. } => "Other",
        }
    }
}

/// Error context wrapper that provides user-friendly error information.
///
/// # Examples
///
/// ```rust,no_run
/// use tmplver::core::{EngineError, ErrorContext};
///
/// let context = ErrorContext::new(EngineError::NoVersionsForTemplate {
///     template_id: "widget".to_string(),
/// })
/// .with_suggestion("Create a first version of 'widget' before resolving it");
///
/// let message = format!("{context}");
/// ```
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying engine error
    pub error: EngineError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: EngineError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors
    ///
    /// - Error message: Red and bold
    /// - Details: Yellow
    /// - Suggestion: Green
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`] with actionable suggestions
///
/// [`EngineError`] values get tailored suggestions; anything else becomes
/// [`EngineError::Other`] carrying the full error chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(engine_error) = error.downcast_ref::<EngineError>() {
        return create_error_context(engine_error.clone());
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(EngineError::ConfigError {
            message: toml_error.to_string(),
        })
        .with_suggestion("Check the TOML syntax of the configuration or record file")
        .with_details("TOML parsing errors are usually caused by missing quotes or mismatched brackets");
    }

    let mut message = error.to_string();
    let chain: Vec<String> =
        error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(EngineError::Other {
        message,
    })
}

fn create_error_context(error: EngineError) -> ErrorContext {
    match &error {
        EngineError::InvalidVersionFormat { .. } => ErrorContext::new(error.clone())
            .with_suggestion("Use MAJOR.MINOR.PATCH with optional -PRERELEASE and +BUILD, e.g. 1.4.0 or 2.0.0-rc.1")
            .with_details("Version strings are parsed strictly; a leading 'v' is not accepted"),

        EngineError::VersionExists { template_id, version } => ErrorContext::new(error.clone())
            .with_suggestion(format!(
                "Bump the version of '{template_id}' instead of re-publishing {version}"
            ))
            .with_details("Version records are immutable; superseding one requires a new version and a migration"),

        EngineError::NoVersionsForTemplate { template_id } => ErrorContext::new(error.clone())
            .with_suggestion(format!("Create a first version of '{template_id}' before resolving it")),

        EngineError::DependencyMissing { dependency_id, .. } => ErrorContext::new(error.clone())
            .with_suggestion(format!(
                "Publish a version of '{dependency_id}' first, or mark the dependency as not required"
            )),

        EngineError::ConstraintUnsatisfiable { dependency_id, constraint, .. } => {
            ErrorContext::new(error.clone())
                .with_suggestion(format!(
                    "Relax the constraint '{constraint}' or publish a matching version of '{dependency_id}'"
                ))
                .with_details("Deprecated versions are never considered when validating dependencies")
        }

        EngineError::NoSatisfyingVersion { template_id, .. } => ErrorContext::new(error.clone())
            .with_suggestion(format!(
                "List the available versions of '{template_id}' and widen the range, or use the latest strategy"
            )),

        EngineError::CyclicDependency { .. } => ErrorContext::new(error.clone())
            .with_suggestion("Review the dependency declarations and remove circular references"),

        EngineError::PersistenceFailure { .. } => ErrorContext::new(error.clone())
            .with_suggestion("Check that the data directory is writable and not held by another process")
            .with_details("The operation was rejected as a whole; no in-memory state was changed"),

        _ => ErrorContext::new(error),
    }
}
