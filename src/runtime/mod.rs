//! Snapshot assembly runtime.
//!
//! Line classification, accumulation and completion policies, plus the
//! configuration that selects between them.

pub mod line_classifier;
pub mod accumulator;
pub mod completion;
pub mod assembler;
pub mod config_loader;

// Re-export key types
pub use line_classifier::{classify, LineCategory};
pub use accumulator::Accumulator;
pub use completion::{build_policy, BoundaryReset, CompletionPolicy, FixedInterval, PolicyKind};
pub use assembler::{AssemblerStats, SnapshotAssembler};
pub use config_loader::{CollectorConfig, ConfigError, DEFAULT_CONFIG_PATH};
