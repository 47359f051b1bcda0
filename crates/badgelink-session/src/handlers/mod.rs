//! Thin adapters from decoded requests to collaborator calls (spec §4.5).

pub mod appstore;
pub mod fs;
pub mod settings;
pub mod start_app;
