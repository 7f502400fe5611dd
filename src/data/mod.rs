//! Record access: providers, file import and the demo generator

pub mod demo;
pub mod import;
pub mod provider;

pub use demo::generate_demo_data;
pub use import::{
    import_cycles_json, import_daily_logs_csv, import_metrics_csv, ImportError, ImportReport,
    RowError,
};
pub use provider::{DataError, InMemoryStore, RecordProvider};
