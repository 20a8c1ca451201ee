//! Storage for telephony number records.
//!
//! Records live in a sqlite table accessed through sqlx. Single-record
//! reads are served cache-aside from redis or an in-process cache, and
//! every mutation re-reads the row and refreshes the cache.

pub mod cache;
mod db;
mod error;
mod types;

pub use cache::{MemoryCache, NumberCache, RedisCache};
pub use db::{connect, NumberDb};
pub use error::StoreError;
pub use types::*;

pub use sqlx::SqlitePool;
