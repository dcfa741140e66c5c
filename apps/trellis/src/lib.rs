//! # Trellis Application Library
//!
//! Library surface of the Trellis binary, exposing the HTTP API and CLI
//! modules for integration tests and embedding.
//!
//! The binary (`main.rs`) compiles the same modules directly; this crate
//! exists so `tests/` can drive the router with a real HTTP client.

pub mod api;
pub mod cli;
