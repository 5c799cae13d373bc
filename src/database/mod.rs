//! Database module

pub mod operations;
pub mod schema;

// Re-export for convenience
pub use operations::{LastPlayed, PlaylistEntry, StateStore};
pub use schema::initialize_database;
