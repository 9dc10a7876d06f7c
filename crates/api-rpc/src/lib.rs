//! JSON-RPC API Layer
//!
//! Exposes the office hours queue over JSON-RPC 2.0 and decides who may call what.

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use handler::RpcHandler;
pub use server::{methods, RpcServer, RpcServerConfig, ServerError};
