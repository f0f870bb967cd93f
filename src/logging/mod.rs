//! Structured diagnostics.

mod format;

pub use format::StructuredLogger;
