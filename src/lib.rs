//! Synheart Wellbeing - On-device engine for wellbeing trends and peer support
//!
//! Wellbeing fuses passive health signals (sleep, activity, exercise, steps)
//! with self-reported mood check-ins and compares a recent window against the
//! user's own baseline through a deterministic pipeline: normalization →
//! baseline computation → comparison → classification → support brokering.
//!
//! ## Modules
//!
//! - **Analysis**: `normalizer`, `features`, `baseline`, `comparator`, `classifier`
//! - **Check-ins**: validated submissions with a per-user cooldown (`rate_limiter`)
//! - **Support**: one open request per user, first-come claiming (`broker`)
//! - **Engine**: `pipeline::WellbeingEngine` over injected collaborators (`adapters`)

pub mod adapters;
pub mod baseline;
pub mod broker;
pub mod classifier;
pub mod clock;
pub mod comparator;
pub mod config;
pub mod encoder;
pub mod error;
pub mod features;
pub mod logging;
pub mod normalizer;
pub mod pipeline;
pub mod rate_limiter;
pub mod scheduler;
pub mod schema;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::{Config, Policy};
pub use encoder::{AnalysisEncoder, AnalysisEnvelope};
pub use error::{Result, WellbeingError};
pub use pipeline::{EngineBuilder, EvaluationWindows, WellbeingEngine};
pub use scheduler::EvaluationScheduler;
pub use types::{
    AnalysisResult, Caller, CallerRole, CheckIn, CheckInStatus, MentalHealthStatus, Metric,
    SupportRequest, SupportRequestState,
};

// Schema exports
pub use schema::{CheckInSubmission, HealthRecord, ValidationError};

/// Library version embedded in every analysis envelope
pub const WELLBEING_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for analysis envelopes
pub const PRODUCER_NAME: &str = "synheart-wellbeing";
