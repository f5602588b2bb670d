//! Forge - Core Library
//!
//! Streaming code synthesis pipeline: extracts files, packages and
//! commands from model output, reconciles them, analyzes the project and
//! applies each turn to an environment with ordered progress events.

pub mod config;
pub mod environment;
pub mod error;
pub mod extract;
pub mod intent;
pub mod manifest;
pub mod orchestrator;
pub mod paths;
pub mod pipeline;
pub mod reconcile;
pub mod session;
pub mod stream;
pub mod types;

pub use config::*;
pub use environment::{CommandOutput, Environment, EnvironmentHandle, InstallOutcome, MemoryEnvironment};
pub use error::*;
pub use extract::{Extraction, Extractor, Matcher};
pub use intent::Classifier;
pub use manifest::{ManifestBuilder, SearchConfidence, SearchHit};
pub use orchestrator::{progress_channel, ApplyRequest, Orchestrator, ProgressSink, ProgressStream};
pub use pipeline::{Pipeline, TurnHandle};
pub use reconcile::{Reconciler, Reconciliation};
pub use session::{Session, SessionManager, SessionSnapshot};
pub use stream::{collect_turn, TurnAccumulator, TurnOutput};
pub use types::*;
