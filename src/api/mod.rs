//! The task/messaging backend: domain types, the remote source abstraction,
//! its REST implementation and the cached client built on top.

pub mod api_types;
mod cache;
mod cached_client;
mod cached_messages;
mod cached_tasks;
pub mod client;
#[cfg(test)]
pub(crate) mod fake;
pub mod source;
pub mod types;

pub use cached_client::CachedClient;
pub use client::RestClient;
pub use source::RemoteSource;
