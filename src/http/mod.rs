//! HTTP protocol implementation.
//!
//! A hand-built HTTP/1.0 and 1.1 layer on top of raw byte streams:
//!
//! - **`parser`**: byte-level request head state machine
//! - **`request`** / **`response`**: the two views handlers work with
//! - **`context`**: per-request lifecycle (header-write-once, release-once,
//!   keep-alive disposition)
//! - **`connection`**: socket plus buffered stream, owned by one worker
//! - **`fields`**: the ordered key/value container behind headers, query
//!   and form data
//! - **`cookie`**: cookie parsing, serialization and the response jar

pub mod connection;
pub mod context;
pub mod cookie;
pub mod fields;
pub mod parser;
pub mod request;
pub mod response;
