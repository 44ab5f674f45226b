//! Shared utilities for the course funnel backend.
//!
//! This crate provides common functionality used across all other crates:
//! - HMAC signing and Stripe-style webhook signature verification
//! - Form field normalization and validation

pub mod crypto;
pub mod validation;
