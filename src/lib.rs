//! # CycleSense
//!
//! Cycle-aware personal health analytics - an engine for finding patterns,
//! correlations and anomalies in menstrual-cycle records, daily symptom
//! logs and wearable metrics.
//!
//! ## Features
//!
//! - **Cycle context**: Phase resolution for any date against recorded cycles
//! - **Pattern detection**: Recurring symptoms mapped to cycle days, with
//!   probability, confidence and a predicted next occurrence
//! - **Correlations**: Pairwise Pearson analysis across wearable metrics with
//!   a significance estimate
//! - **Anomaly detection**: Baseline deviation scoring over trailing history
//! - **Mood forecasting**: Seven-day outlook from recent logs and cycle phase
//! - **Notifications**: An ordered, stateless rule set over current state
//!
//! ## Modules
//!
//! - [`model`]: Source records and derived finding types
//! - [`cycle`]: Cycle phase windows and context resolution
//! - [`engine`]: The analysis engines
//! - [`session`]: Session orchestration and SQLite persistence
//! - [`data`]: Record providers, file import and the demo generator
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cyclesense::config::Config;
//! use cyclesense::data::{generate_demo_data, InMemoryStore};
//! use cyclesense::model::{
//!     AnalysisRequest, AnalysisScope, Granularity, SessionType, Timeframe,
//! };
//! use cyclesense::session::{AnalysisSessionOrchestrator, InMemorySessionStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = Arc::new(InMemoryStore::new());
//!     generate_demo_data(&provider, "me", chrono::Utc::now().date_naive());
//!
//!     let orchestrator = AnalysisSessionOrchestrator::new(
//!         provider,
//!         Arc::new(InMemorySessionStore::new()),
//!         Config::default(),
//!     );
//!
//!     let results = orchestrator
//!         .run(AnalysisRequest {
//!             user_id: "me".to_string(),
//!             session_type: SessionType::FullAnalysis,
//!             scope: AnalysisScope::default(),
//!             timeframe: Timeframe::last_days(90, Granularity::Quarter),
//!         })
//!         .await?;
//!
//!     for finding in &results.key_findings {
//!         println!("{finding}");
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod cycle;
pub mod data;
pub mod engine;
pub mod model;
pub mod notify;
pub mod session;

pub use config::Config;
pub use cycle::{CycleContext, CycleContextResolver, CyclePhase};
pub use model::session::{AnalysisRequest, AnalysisResults, AnalysisSession, SessionStatus};
pub use session::AnalysisSessionOrchestrator;
