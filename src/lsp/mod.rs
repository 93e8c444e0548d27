//! LSP server for step registry navigation.
//!
//! Provides go-to-definition from registry references in pipeline
//! configuration to the files that define them, plus placeholder hover and
//! completion.

mod dispatch;
mod placeholder;
mod server;

pub use dispatch::{server_capabilities, Dispatcher};
pub use server::{serve_stdio, serve_tcp, Backend};
