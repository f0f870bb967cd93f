//! cmd-metrics: per-command resource aggregation for leak and thundering-herd diagnosis.
//!
//! Modular structure:
//! - [`arena`]: Bump arena with relocation on growth
//! - [`collectors`]: Process records, socket inode index, process→socket correlation
//! - [`metrics`]: Per-command totals and interval deltas
//! - [`filter`]: Command-prefix / uid record selection
//! - [`report`]: Delta lines and process listing
//! - [`output`]: Report sink with reopen for log rotation
//! - [`signals`]: Stop/reopen flags and the interval ticker
//! - [`logging`]: Tracing setup

pub mod arena;
pub mod cli;
pub mod collectors;
pub mod config;
pub mod error;
pub mod filter;
pub mod logging;
pub mod metrics;
pub mod output;
pub mod report;
pub mod signals;

pub use arena::Arena;
pub use collectors::{ProcRoots, ProcessSample, Sampler, SocketAggregate, SocketIndex, SocketRecord};
pub use config::MetricsConfig;
pub use error::{MetricsError, Result};
pub use logging::StructuredLogger;
pub use metrics::{CommandDelta, CommandMetrics};
