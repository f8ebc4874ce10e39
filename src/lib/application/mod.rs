//! # Application Module
//!
//! ## Submodules
//!
//! - [`tooling`] - provider connections, retry policy, capability catalog
//! - [`conversation`] - the multi-turn loop that streams model output and runs tool calls
//! - [`session`] - registry of live sessions and their connections

pub mod conversation;
pub mod session;
pub mod tooling;
