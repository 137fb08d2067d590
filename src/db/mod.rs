//! Session persistence.
//!
//! Research sessions are checkpointed after every stage boundary so a failed
//! or interrupted run can resume from the stage that failed:
//! - **File**: one JSON document per session under a directory (default)
//! - **Memory**: process-local map, for tests and one-shot runs
//!
//! Select the backend in `delve.toml`:
//! ```toml
//! [checkpoint]
//! backend = "file"
//! dir = "sessions"
//! ```

/// Checkpoint store trait and implementations.
pub mod checkpoint;

pub use checkpoint::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
