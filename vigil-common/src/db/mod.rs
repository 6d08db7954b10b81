//! Database initialization and shared schema

pub mod init;
pub mod schema;
pub mod settings;

pub use init::*;
pub use settings::*;
