//! `tmp` store — ephemeral in-memory session map.
//!
//! All data lives in process memory and is discarded when the process exits.
//! Selected in local mode.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::AppError;

use super::super::store::SessionStore;
use super::super::types::SessionRecord;

#[derive(Default)]
pub struct TmpStore {
    data: Mutex<HashMap<String, SessionRecord>>,
}

impl TmpStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions written so far.
    pub fn session_count(&self) -> Result<usize, AppError> {
        let data = self
            .data
            .lock()
            .map_err(|_| AppError::Memory("tmp store lock poisoned".into()))?;
        Ok(data.len())
    }
}

impl SessionStore for TmpStore {
    fn backend(&self) -> &str {
        "tmp"
    }

    fn get(&self, session_id: &str) -> Result<Option<SessionRecord>, AppError> {
        let data = self
            .data
            .lock()
            .map_err(|_| AppError::Memory("tmp store lock poisoned".into()))?;
        Ok(data.get(session_id).cloned())
    }

    fn put(&self, session_id: &str, record: &SessionRecord) -> Result<(), AppError> {
        let mut data = self
            .data
            .lock()
            .map_err(|_| AppError::Memory("tmp store lock poisoned".into()))?;
        data.insert(session_id.to_string(), record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystems::memory::types::Turn;

    fn turn(q: &str) -> Turn {
        Turn { question: q.into(), answer: format!("answer to {q}"), tools: vec![] }
    }

    #[test]
    fn get_missing_is_none() {
        let store = TmpStore::new();
        assert!(store.get("nobody").unwrap().is_none());
        assert_eq!(store.session_count().unwrap(), 0);
    }

    #[test]
    fn put_overwrites_whole_record() {
        let store = TmpStore::new();
        store.put("s1", &SessionRecord::new(vec![turn("a")])).unwrap();
        store.put("s1", &SessionRecord::new(vec![turn("a"), turn("b")])).unwrap();
        let got = store.get("s1").unwrap().unwrap();
        assert_eq!(got.conversation.len(), 2);
        assert_eq!(store.session_count().unwrap(), 1);
    }

    #[test]
    fn sessions_are_independent() {
        let store = TmpStore::new();
        store.put("a", &SessionRecord::new(vec![turn("x")])).unwrap();
        store.put("b", &SessionRecord::new(vec![turn("y")])).unwrap();
        assert_eq!(store.get("a").unwrap().unwrap().conversation[0].question, "x");
        assert_eq!(store.get("b").unwrap().unwrap().conversation[0].question, "y");
    }

    #[test]
    fn backend_is_tmp() {
        assert_eq!(TmpStore::new().backend(), "tmp");
    }
}
