//! HTTP transport
//!
//! REST endpoints under `/api/v1` plus a JSON-RPC endpoint backed by the same dispatcher
//! as the stdio transport.

pub mod handlers;
