pub mod backend;
pub mod catalog;
pub mod governance_impl;
pub mod grants;
pub mod providers;
pub mod schema;
pub mod usage;

pub use backend::DuckDbBackend;

/// Re-export the `duckdb` crate so consumers (especially tests) can use
/// `quillgate_duckdb::duckdb::params!` without an extra dependency.
pub use duckdb;
