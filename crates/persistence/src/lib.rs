//! Persistence layer for the course funnel backend.
//!
//! This crate contains:
//! - Database connection management and migrations
//! - Entity definitions (database row mappings)
//! - The PostgreSQL registration store

pub mod db;
pub mod entities;
pub mod metrics;
pub mod repositories;
