//! Store trait — key-value persistence of whole session records.
//!
//! Stores are synchronous; [`SessionHistory`](super::history::SessionHistory)
//! drives them through `tokio::task::spawn_blocking`.

use crate::error::AppError;

use super::types::SessionRecord;

/// Pluggable session backend.
///
/// `put` overwrites the full record: no partial updates, no locking,
/// last writer wins.
pub trait SessionStore: Send + Sync {
    /// Backend name for logs (e.g. `"tmp"`, `"sqlite"`).
    fn backend(&self) -> &str;

    /// `Ok(None)` for a session that was never written.
    fn get(&self, session_id: &str) -> Result<Option<SessionRecord>, AppError>;

    fn put(&self, session_id: &str, record: &SessionRecord) -> Result<(), AppError>;
}
