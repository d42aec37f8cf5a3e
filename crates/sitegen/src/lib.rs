pub mod config;
pub mod errors;
pub mod extract;
pub mod models;
pub mod pages;
pub mod patch;
pub mod prompts;
pub mod protocol;
pub mod reconcile;
pub mod scanner;
pub mod session;
pub mod transport;

pub use config::EngineConfig;
pub use errors::{ConfigError, GenerationError, TransportError, UpstreamFailure};
pub use pages::{Page, PageCollection};
pub use patch::LineRange;
pub use reconcile::{GenerationMode, LegacyPatch, ReconcileStats, Reconciler, Reconciliation};
pub use session::{GenerationOutcome, GenerationSession, SessionEvent};
pub use transport::CompletionStream;
