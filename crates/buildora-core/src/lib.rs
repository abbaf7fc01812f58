//! # buildora-core
//!
//! Core project model for Buildora, a workspace for small multi-file front-end
//! projects (markup, stylesheet, script, and a simulated legacy server dialect).
//!
//! ## Contents
//!
//! - [`ProjectGraph`] / [`FileNode`]: the passive file graph with single-level
//!   parent/child containers
//! - [`payload`]: data-URL encoding for image and font content
//! - [`BuildoraConfig`]: `.buildora/config.toml`
//! - [`store::ProjectStore`]: explicit persistence collaborator
//! - [`templates`]: starter projects
//!
//! Composition, sandboxing, generation and archiving live in their own crates and
//! only ever read a graph; [`ProjectGraph::apply_updates`] is the single mutation
//! path for externally produced files.

mod config;
mod error;
pub mod fail_open;
pub mod payload;
pub mod store;
pub mod templates;
mod types;

pub use config::{ArchiveConfig, BuildoraConfig, GenerationConfig, PreviewConfig, StoreConfig};
pub use error::{BuildoraError, Result};
pub use types::*;
