pub mod config;
pub mod entitlement;
pub mod error;
pub mod generation;
pub mod plan;
pub mod provider;
pub mod quota;
pub mod service;
pub mod usage;
