//! LSP server surface.

pub mod backend;
pub mod server;
