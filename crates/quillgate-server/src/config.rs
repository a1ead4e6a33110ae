/// Re-export `Config` from `quillgate-core` for use within this crate.
///
/// All environment-variable parsing lives in `quillgate-core` so it can be
/// shared with integration tests and future crates without depending on the
/// full server.
pub use quillgate_core::config::Config;
