//! Session persistence
//!
//! Stores analysis sessions and the derived findings each run produced.
//! Sessions are created before computation starts and finalized exactly
//! once: the final session state and its findings land in one atomic
//! write, so a failed finalize leaves no partial children behind.
//!
//! The SQLite store keeps indexed columns for listing and the full typed
//! payloads as JSON, in WAL mode.

use crate::model::derived::{Anomaly, Correlation, Pattern};
use crate::model::session::AnalysisSession;
use rusqlite::{params, Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

/// Errors from the session store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session {0} not found")]
    SessionNotFound(Uuid),
}

/// The findings a session owns
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionChildren {
    pub patterns: Vec<Pattern>,
    pub correlations: Vec<Correlation>,
    pub anomalies: Vec<Anomaly>,
}

/// A session together with its findings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionWithChildren {
    pub session: AnalysisSession,
    pub children: SessionChildren,
}

/// Persistence seam for sessions and their findings
pub trait SessionStore: Send + Sync {
    /// Create the session record; failure here is fatal to the run
    fn create_session(&self, session: &AnalysisSession) -> Result<(), StoreError>;

    /// Overwrite the session record, leaving its findings untouched
    fn update_session(&self, session: &AnalysisSession) -> Result<(), StoreError>;

    /// Atomically write the session's final state together with its
    /// findings; on failure neither is persisted
    fn finalize(
        &self,
        session: &AnalysisSession,
        children: &SessionChildren,
    ) -> Result<(), StoreError>;

    /// Fetch a session and its findings
    fn fetch_session(&self, session_id: Uuid) -> Result<Option<SessionWithChildren>, StoreError>;

    /// All sessions for a user, newest first
    fn list_sessions(&self, user_id: &str) -> Result<Vec<AnalysisSession>, StoreError>;
}

/// SQLite-backed session store
pub struct SqliteSessionStore {
    conn: Mutex<Connection>,
}

impl SqliteSessionStore {
    /// Create or open the store at a path
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Self::init(conn)
    }

    /// In-memory SQLite store, for tests and the demo subcommand
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                payload TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_sessions_user
             ON sessions(user_id, created_at DESC)",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS findings (
                session_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                payload TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_findings_session
             ON findings(session_id)",
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl SessionStore for SqliteSessionStore {
    fn create_session(&self, session: &AnalysisSession) -> Result<(), StoreError> {
        let payload = serde_json::to_string(session)?;
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            "INSERT INTO sessions (id, user_id, status, created_at, payload)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session.id.to_string(),
                session.user_id,
                session.status.to_string(),
                session.created_at.timestamp_millis(),
                payload
            ],
        )?;
        Ok(())
    }

    fn update_session(&self, session: &AnalysisSession) -> Result<(), StoreError> {
        let payload = serde_json::to_string(session)?;
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            "UPDATE sessions SET status = ?2, payload = ?3 WHERE id = ?1",
            params![session.id.to_string(), session.status.to_string(), payload],
        )?;
        Ok(())
    }

    fn finalize(
        &self,
        session: &AnalysisSession,
        children: &SessionChildren,
    ) -> Result<(), StoreError> {
        let payload = serde_json::to_string(session)?;
        let mut conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO findings (session_id, kind, payload) VALUES (?1, ?2, ?3)",
            )?;
            let id = session.id.to_string();
            for p in &children.patterns {
                stmt.execute(params![id, "pattern", serde_json::to_string(p)?])?;
            }
            for c in &children.correlations {
                stmt.execute(params![id, "correlation", serde_json::to_string(c)?])?;
            }
            for a in &children.anomalies {
                stmt.execute(params![id, "anomaly", serde_json::to_string(a)?])?;
            }
        }
        // The session row must exist; rolling back here also discards the
        // findings inserted above.
        let updated = tx.execute(
            "UPDATE sessions SET status = ?2, payload = ?3 WHERE id = ?1",
            params![session.id.to_string(), session.status.to_string(), payload],
        )?;
        if updated == 0 {
            return Err(StoreError::SessionNotFound(session.id));
        }
        tx.commit()?;
        Ok(())
    }

    fn fetch_session(&self, session_id: Uuid) -> Result<Option<SessionWithChildren>, StoreError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let id = session_id.to_string();

        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM sessions WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        let Some(payload) = payload else {
            return Ok(None);
        };
        let session: AnalysisSession = serde_json::from_str(&payload)?;

        let mut children = SessionChildren::default();
        let mut stmt =
            conn.prepare("SELECT kind, payload FROM findings WHERE session_id = ?1")?;
        let rows = stmt.query_map(params![id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (kind, payload) = row?;
            match kind.as_str() {
                "pattern" => children.patterns.push(serde_json::from_str(&payload)?),
                "correlation" => children.correlations.push(serde_json::from_str(&payload)?),
                "anomaly" => children.anomalies.push(serde_json::from_str(&payload)?),
                other => {
                    tracing::warn!(kind = other, "Unknown finding kind in store");
                }
            }
        }

        Ok(Some(SessionWithChildren { session, children }))
    }

    fn list_sessions(&self, user_id: &str) -> Result<Vec<AnalysisSession>, StoreError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = conn.prepare(
            "SELECT payload FROM sessions WHERE user_id = ?1 ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map(params![user_id], |row| row.get::<_, String>(0))?;

        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(serde_json::from_str(&row?)?);
        }
        Ok(sessions)
    }
}

/// In-memory session store for tests
#[derive(Default)]
pub struct InMemorySessionStore {
    inner: Mutex<HashMap<Uuid, SessionWithChildren>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    fn create_session(&self, session: &AnalysisSession) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.insert(
            session.id,
            SessionWithChildren {
                session: session.clone(),
                children: SessionChildren::default(),
            },
        );
        Ok(())
    }

    fn update_session(&self, session: &AnalysisSession) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = inner.get_mut(&session.id) {
            entry.session = session.clone();
        }
        Ok(())
    }

    fn finalize(
        &self,
        session: &AnalysisSession,
        children: &SessionChildren,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let entry = inner
            .get_mut(&session.id)
            .ok_or(StoreError::SessionNotFound(session.id))?;
        entry.session = session.clone();
        entry.children = children.clone();
        Ok(())
    }

    fn fetch_session(&self, session_id: Uuid) -> Result<Option<SessionWithChildren>, StoreError> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(inner.get(&session_id).cloned())
    }

    fn list_sessions(&self, user_id: &str) -> Result<Vec<AnalysisSession>, StoreError> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut sessions: Vec<AnalysisSession> = inner
            .values()
            .filter(|s| s.session.user_id == user_id)
            .map(|s| s.session.clone())
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::derived::Severity;
    use crate::model::session::{
        AnalysisRequest, AnalysisScope, Granularity, SessionStatus, SessionType, Timeframe,
    };
    use chrono::NaiveDate;

    fn request(user: &str) -> AnalysisRequest {
        AnalysisRequest {
            user_id: user.to_string(),
            session_type: SessionType::FullAnalysis,
            scope: AnalysisScope::default(),
            timeframe: Timeframe {
                start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                end: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
                granularity: Granularity::Quarter,
            },
        }
    }

    fn pattern() -> Pattern {
        Pattern {
            symptom: "headache".to_string(),
            mean_cycle_day: 10.5,
            cycle_days: vec![3, 4, 17, 18],
            occurrences: 4,
            probability: 33.3,
            confidence: 80.0,
            predicted_next: NaiveDate::from_ymd_opt(2024, 3, 11),
            severity: Severity::Low,
            trigger_factors: vec!["dehydration".to_string()],
            prevention_tips: vec!["Stay hydrated".to_string()],
            is_synthetic: false,
        }
    }

    #[test]
    fn test_sqlite_finalize_roundtrip() {
        let store = SqliteSessionStore::open_in_memory().unwrap();
        let mut session = AnalysisSession::start(&request("u1"));
        store.create_session(&session).unwrap();

        let children = SessionChildren {
            patterns: vec![pattern()],
            ..Default::default()
        };
        session.status = SessionStatus::Completed;
        session.confidence_score = 0.8;
        store.finalize(&session, &children).unwrap();

        let fetched = store.fetch_session(session.id).unwrap().unwrap();
        assert_eq!(fetched.session.status, SessionStatus::Completed);
        assert_eq!(fetched.session.confidence_score, 0.8);
        assert_eq!(fetched.children.patterns.len(), 1);
        assert_eq!(fetched.children.patterns[0].symptom, "headache");
    }

    #[test]
    fn test_finalize_unknown_session_rolls_back_findings() {
        let store = SqliteSessionStore::open_in_memory().unwrap();
        let mut session = AnalysisSession::start(&request("u1"));
        session.status = SessionStatus::Completed;
        let children = SessionChildren {
            patterns: vec![pattern()],
            ..Default::default()
        };
        assert!(matches!(
            store.finalize(&session, &children),
            Err(StoreError::SessionNotFound(_))
        ));

        // Creating the row afterwards shows the aborted finalize left no
        // findings behind.
        store.create_session(&session).unwrap();
        let fetched = store.fetch_session(session.id).unwrap().unwrap();
        assert!(fetched.children.patterns.is_empty());
    }

    #[test]
    fn test_fetch_missing_session_is_none() {
        let store = SqliteSessionStore::open_in_memory().unwrap();
        assert!(store.fetch_session(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_list_sessions_newest_first_per_user() {
        let store = SqliteSessionStore::open_in_memory().unwrap();

        let mut first = AnalysisSession::start(&request("u1"));
        first.created_at = first.created_at - chrono::Duration::hours(2);
        store.create_session(&first).unwrap();

        let second = AnalysisSession::start(&request("u1"));
        store.create_session(&second).unwrap();

        let other = AnalysisSession::start(&request("u2"));
        store.create_session(&other).unwrap();

        let sessions = store.list_sessions("u1").unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].id, second.id);
        assert_eq!(sessions[1].id, first.id);
    }

    #[test]
    fn test_duplicate_session_id_rejected() {
        let store = SqliteSessionStore::open_in_memory().unwrap();
        let session = AnalysisSession::start(&request("u1"));
        store.create_session(&session).unwrap();
        assert!(store.create_session(&session).is_err());
    }

    #[test]
    fn test_sqlite_store_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.db");
        let store = SqliteSessionStore::open(&path).unwrap();
        let session = AnalysisSession::start(&request("u1"));
        store.create_session(&session).unwrap();
        assert_eq!(store.list_sessions("u1").unwrap().len(), 1);
    }

    #[test]
    fn test_in_memory_store_roundtrip() {
        let store = InMemorySessionStore::new();
        let mut session = AnalysisSession::start(&request("u1"));
        store.create_session(&session).unwrap();
        session.status = SessionStatus::Completed;
        store
            .finalize(
                &session,
                &SessionChildren {
                    patterns: vec![pattern()],
                    ..Default::default()
                },
            )
            .unwrap();
        let fetched = store.fetch_session(session.id).unwrap().unwrap();
        assert_eq!(fetched.session.status, SessionStatus::Completed);
        assert_eq!(fetched.children.patterns.len(), 1);
    }
}
