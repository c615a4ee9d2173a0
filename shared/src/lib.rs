//! Macrofetch shared library.
//!
//! Holds the data model, error taxonomy and the concurrent
//! fetch-and-persist pipeline. Concrete sources and sinks live in the
//! `macrofetch` crate.

pub mod collector;
pub mod errors;
pub mod models;
pub mod orchestrator;
pub mod progress;
pub mod sink;
pub mod source;
pub mod task_queue;
pub mod workers;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{FetchCause, FetchError, RunError, StorageError, TransportError};
pub use models::{Macro, MacroImage};
pub use orchestrator::{Orchestrator, Report, DEFAULT_WORKERS};
pub use sink::Sink;
pub use source::MacroSource;
