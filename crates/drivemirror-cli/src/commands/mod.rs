//! CLI command implementations

pub mod audit;
pub mod auth;
pub mod changes;
pub mod diagnostics;
pub mod folder;
pub mod sync;
