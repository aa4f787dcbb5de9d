//! Translation between the chat-completions and responses protocols.
//!
//! Everything here is pure and synchronous; the HTTP plumbing lives in [`crate::fetch`].

pub mod request;
pub mod response;
pub mod sse;
pub mod streaming;
pub mod tools;
pub mod types;
