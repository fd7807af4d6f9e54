//! Local persistence
//!
//! SQLite tables backing the catalog, the user's collection, runtime
//! settings and the read-only bulk reference dataset.

pub mod catalog;
pub mod collection;
pub mod dataset;
pub mod init;
pub mod settings;

pub use init::*;
