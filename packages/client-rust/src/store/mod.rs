//! [`RemoteStore`](crate::RemoteStore) implementations.
//!
//! [`HttpStore`] talks to the real remote; [`MemoryStore`] keeps everything
//! in process for tests and local development.

mod eval;
pub mod http;
pub mod memory;

pub use http::HttpStore;
pub use memory::{MemoryStore, StoreCall, StoreMethod};
