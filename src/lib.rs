//! loopcast - fetch a video dataset, keep only playable files, and loop-stream
//! them to a local media server.
//!
//! This library crate exposes the core functionality for integration testing.

pub mod cache;
pub mod fetch;
pub mod scanner;
pub mod server;
pub mod supervisor;
