//! rag-core - Core types and traits for the hybrid retrieval engine
//!
//! This crate provides the domain types, the error taxonomy, the
//! collaborator traits (embedding and generation) and configuration
//! shared by every other crate in the workspace.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::{ErrorKind, RagError, Result};
pub use traits::*;
pub use types::*;
