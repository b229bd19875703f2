//! # AI-Hab Common Library
//!
//! Shared code for the AI-Hab habitat classification service:
//! - UKHab taxonomy store (code → name/definition)
//! - Hierarchy resolution (leaf code → ancestor chain)
//! - Bootstrap configuration resolution
//! - Common error types

pub mod config;
pub mod error;
pub mod hierarchy;
pub mod taxonomy;

pub use error::{Error, Result, TaxonomyError};
pub use hierarchy::{HierarchyLevel, HierarchyResolver, MAX_HIERARCHY_LEVEL};
pub use taxonomy::{TaxonomyEntry, TaxonomyStore};
