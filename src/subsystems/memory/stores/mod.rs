//! Session store backends.

#[cfg(feature = "store-sqlite")]
pub mod sqlite;
pub mod tmp;
