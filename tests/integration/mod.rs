//! Integration test suite for tmplver
//!
//! End-to-end tests that drive the engine through [`TemplateVersionManager`]
//! the way an embedding service would, with an in-memory backend or TOML
//! files in a temporary directory.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! RUST_LOG=tmplver=debug cargo test --test integration -- --nocapture
//! ```
//!
//! # Test Organization
//!
//! - **versions**: Creation, listing, latest selection and deprecation
//! - **resolution**: Strategies, transitive dependencies, conflicts and cycles
//! - **compatibility**: Target environment checks
//! - **migrations**: Registration, chains and content transformation
//! - **persistence**: Failure atomicity, timeouts and reopening from disk
//! - **audit**: Events emitted for each operation
//!
//! [`TemplateVersionManager`]: tmplver::manager::TemplateVersionManager

mod audit;
mod compatibility;
mod migrations;
mod persistence;
mod resolution;
mod versions;
