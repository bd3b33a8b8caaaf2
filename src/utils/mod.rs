//! Filesystem helpers shared by the persistence layer.

pub mod fs;

pub use fs::{atomic_write, ensure_dir};
