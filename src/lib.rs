pub mod config;
pub mod ghcmod;
pub mod log;
pub mod lsp;
pub mod provider;
pub mod throttle;
