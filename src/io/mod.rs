//! Provide the buffered, encoding-aware sink the writer emits into.

mod output;

pub use output::*;

/// Minimum amount of encoded bytes kept in the output buffer before they
/// are pushed to the underlying sink.
pub(crate) const MINLEN: usize = 4000;
