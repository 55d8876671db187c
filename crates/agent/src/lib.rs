//! Agent management services for voicedesk.
//!
//! - `resolver` maps module names from the configuration document to catalog model ids.
//! - `reconcile` keeps the system-owned default agent in line with that document.
//! - `plugins` seeds and reconciles agent plugin mappings.
//! - `service`, `timbre` and `user` serve edits and cached lookups for the admin surface.
//!
//! Everything here works against the repository traits in `voicedesk-db`, so the same
//! services run over SQLite in production and over in-memory tables in tests.

pub mod context;
pub mod errors;
pub mod plugins;
pub mod reconcile;
pub mod resolver;
pub mod service;
pub mod timbre;
pub mod user;

pub use context::Repositories;
pub use errors::{ReconcileError, ServiceError};
pub use reconcile::{initialize_default_agent, DefaultAgentReconciler, ReconcileOutcome};
pub use resolver::ConfigResolver;
pub use service::{AgentService, AgentUpdate};
pub use timbre::TimbreService;
pub use user::UserDirectory;
