//! Expected-version sentinels for append operations.
//!
//! Writers pass one of these in place of a concrete stream version when
//! appending. Pure values; the read/subscribe path never consults them.

/// The writer does not care what the current version of the stream is.
pub const ANY: i64 = -2;

/// The writer asserts that the stream does not exist yet.
pub const NO_STREAM: i64 = -1;
