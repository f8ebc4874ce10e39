//! # Infrastructure Module
//!
//! - [`model`] - chat-completions client behind the `ModelStream` trait
//! - [`server`] - REST/SSE surface over the session registry

pub mod model;
pub mod server;
