//! Read-only gateway onto the guild action log.
//!
//! Executes parameterized aggregation specs against Postgres and returns
//! decoded rows in one of two shapes. Knows nothing about metric kinds;
//! the engine decides what to ask for.

pub mod error;
pub mod statements;
pub mod store;
pub mod types;

pub use error::{Result, StoreError};
pub use statements::{MINUTE_BUCKET_SQL, RAW_SNAPSHOT_SQL};
pub use store::{EventStore, PoolSettings};
pub use types::{ActionKind, QueryParam, QuerySpec, RawRow, RowShape};
