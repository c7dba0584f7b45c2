// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod analyze;
pub mod api;
pub mod config;
pub mod conflict;
pub mod credibility;
pub mod ingest;
pub mod metrics;
pub mod pipeline;
pub mod scheduler;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::analyze::gateway::{AnalysisGateway, DynGateway, GroqGateway, MockGateway};
pub use crate::analyze::judgment::{Market, PumpRisk, RawJudgment, SignalKind, ValidatedJudgment};
pub use crate::api::{create_router, AppState};
pub use crate::pipeline::{Pipeline, RunReport};
pub use crate::store::Store;
