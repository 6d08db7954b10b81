//! # Vigil Common Library
//!
//! Shared code for the Vigil compliance review services including:
//! - Error types
//! - Domain status enums (flag lifecycle, scan job/run status)
//! - Event types (VigilEvent enum) and the broadcast EventBus
//! - Database initialization and schema
//! - Configuration loading

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod types;

pub use error::{Error, Result};
