//! Error types for the reassembly engine.

use thiserror::Error;

/// Hard failures of the reassembly engine.
///
/// Malformed-but-usable input (overlaps, conflicting bytes, extra tails) is
/// never an error; it is recorded as advisory flags on the affected entries.
/// The only hard failure is a fragment whose declared length exceeds the
/// bytes actually captured, in which case the add operation declines to
/// participate for that packet instead of corrupting the list.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReassemblyError {
    #[error(
        "fragment in frame {frame} declares {declared} bytes but only {available} were captured"
    )]
    TruncatedFragment {
        frame: u32,
        declared: usize,
        available: usize,
    },
}
