//! Root of the `easel-core` library.

// Prevent accidental direct writes to stdout/stderr in library code. All
// user-visible output goes through events or the tracing stack.
#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod config;
mod easel;
pub mod error;
pub mod generation;
pub mod history;
pub mod protocol;
pub mod record;
pub mod state;
pub mod store;
pub mod surface;

pub use config::Config;
pub use config::ConfigOverrides;
pub use easel::Easel;
pub use error::EaselErr;
pub use error::GenerateError;
pub use generation::Generator;
pub use history::History;
pub use history::HistoryAction;
pub use history::Snapshot;
pub use record::GeneratedImageRecord;
pub use record::RecordId;
pub use store::FileStore;
pub use store::KeyValueStore;
pub use store::MemoryStore;
pub use surface::DrawingSurface;
pub use surface::RasterSurface;
