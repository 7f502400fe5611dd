//! Analysis sessions: orchestration and persistence

pub mod orchestrator;
pub mod store;

pub use orchestrator::{AnalysisSessionOrchestrator, SessionError};
pub use store::{
    InMemorySessionStore, SessionChildren, SessionStore, SessionWithChildren, SqliteSessionStore,
    StoreError,
};
