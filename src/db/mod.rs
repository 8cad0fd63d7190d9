//! SQLite-backed operation journal.
//!
//! This module provides:
//! - Database initialization and schema
//! - SQLite pragma configuration
//! - Repository for recording operations and their outcomes

pub mod migrations;
pub mod repo;

pub use migrations::init_db;
pub use repo::Repository;
