//! HTTP surface for the course registration funnel.

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;
