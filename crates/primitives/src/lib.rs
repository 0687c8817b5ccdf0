//! Core types shared by the annotation engine: positions, ranges and
//! document identity.

/// Document identity and immutable text snapshots.
pub mod document;
/// Line/column positions and half-open ranges.
pub mod range;
/// Rope utilities and extensions.
pub mod rope;

pub use document::{DocumentKey, DocumentSnapshot};
pub use range::{Position, Range};
pub use rope::{line_count, line_len};
pub use ropey::{Rope, RopeSlice};
