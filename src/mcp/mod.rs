//! JSON-RPC 2.0 protocol engine
//!
//! Envelope types and error codes, the method dispatcher shared by every transport,
//! and the newline-delimited stdio transport.

pub mod rpc;
pub mod server;
pub mod stdio;
