//! HTTP API handlers

pub mod audit;
pub mod auth;
pub mod dashboard;
pub mod events;
pub mod flags;
pub mod health;
pub mod scan_jobs;
pub mod screenshots;

pub use auth::{require_auth, AuthUser};
