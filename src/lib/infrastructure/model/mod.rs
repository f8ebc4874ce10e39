//! Model infrastructure module
//!
//! # Structure
//! - `types` - wire payloads and `ModelError`
//! - `traits` - the `ModelStream` seam used by the conversation loop
//! - `sse` - incremental `data:` frame parser
//! - `clients` - HTTP client implementations

pub mod clients;
pub mod sse;
pub mod traits;
pub mod types;

pub use clients::ChatCompletionsClient;
pub use traits::ModelStream;
pub use types::ModelError;
