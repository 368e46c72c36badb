//! Tool catalogue, execution and the business logic behind each tool
//!
//! Shared by both transports; nothing in here knows about HTTP or JSON-RPC framing.

pub mod authorization;
pub mod calculator;
pub mod completions;
pub mod executor;
pub mod inspector;
pub mod registry;
pub mod tools;
