//! Memory subsystem — per-session conversation history.
//!
//! - **types** — persisted record shapes (`SessionRecord`, `Turn`, `ToolRecord`).
//! - **store** — the synchronous `SessionStore` trait.
//! - **stores** — `tmp` (in-process) and `sqlite` backends.
//! - **history** — async `SessionHistory` wrapper and prompt replay.
//!
//! The backend is picked once at startup by [`open_store`] and injected
//! into the agents; nothing here is global.

pub mod history;
pub mod store;
pub mod stores;
pub mod types;

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::error::AppError;

pub use history::{SessionHistory, STATELESS_SESSION_ID, is_stateless, replay};
pub use store::SessionStore;
pub use types::{SessionRecord, ToolRecord, Turn};

/// Select the session backend: `tmp` in local mode, SQLite otherwise.
pub fn open_store(config: &Config) -> Result<Arc<dyn SessionStore>, AppError> {
    if config.local {
        info!(backend = "tmp", "session store ready (local mode)");
        return Ok(Arc::new(stores::tmp::TmpStore::new()));
    }

    #[cfg(feature = "store-sqlite")]
    {
        let path = config.session_db_path();
        let store = stores::sqlite::SqliteStore::open(&path, &config.store.session_entity)?;
        info!(
            backend = "sqlite",
            path = %path.display(),
            entity = %config.store.session_entity,
            "session store ready"
        );
        Ok(Arc::new(store))
    }

    #[cfg(not(feature = "store-sqlite"))]
    {
        tracing::warn!("store-sqlite feature disabled — falling back to in-process session store");
        Ok(Arc::new(stores::tmp::TmpStore::new()))
    }
}
