//! # HTS Common Library
//!
//! Shared code for the tariff classification service:
//! - Catalog row model and snapshot loading
//! - Hierarchy enrichment (short-code and full-code indexes)
//! - Read-only candidate queries over the built indexes
//! - Configuration loading
//! - Common error types

pub mod catalog;
pub mod config;
pub mod error;

pub use error::{Error, Result};
