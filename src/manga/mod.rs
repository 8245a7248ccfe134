//! Manga catalogue: domain types, the remote API and the offline-first
//! repository that reconciles it with the local cache.

pub mod api_types;
pub mod client;
pub mod remote;
pub mod repository;
pub mod synthetic;
pub mod types;

#[cfg(test)]
pub mod testing;
