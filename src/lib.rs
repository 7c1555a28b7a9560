//! aptsentry - apt source declaration auditor
//!
//! aptsentry probes every mirror named in the `*.list` files of an apt sources
//! directory, retires declaration files whose mirrors are gone, and brings
//! retired files back once their mirrors serve index files again.
//!
//! ## Modules
//!
//! - [`config`]: Configuration management and parsing
//! - [`declaration`]: Declaration file discovery and parsing
//! - [`probe`]: DNS, service and retrieval probes
//! - [`classifier`]: Tiered good/bad classification of a declaration
//! - [`quarantine`]: Moving files between the active and retired directories
//! - [`health`]: Preflight checks
//! - [`sweep`]: Full retire/revive orchestration

pub mod classifier;
pub mod config;
pub mod declaration;
pub mod health;
pub mod probe;
pub mod quarantine;
pub mod sweep;

pub use classifier::{BadReason, Classification, Classifier, ClassifierSettings, Verdict};
pub use config::Config;
pub use declaration::RepoDeclaration;
pub use health::HealthCheck;
pub use quarantine::Quarantine;
pub use sweep::{SweepEngine, SweepReport};
