//! Tracing/logging setup shared by processes embedding the stock domain.

/// Initialize process-wide logging.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use crate::tracing::LogFormat;
