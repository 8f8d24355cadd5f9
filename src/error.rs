//! Error taxonomy for the screen core.
//!
//! Allocation and capacity failures propagate to the caller of
//! `Terminal`/`Screen` methods; the caller decides whether the operation is
//! fatal. Unknown SGR parameters are not errors (the parser yields
//! `Attribute::Unknown` instead), and out-of-range point lookups return
//! `None` rather than failing.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// The OS denied memory for a page buffer or node.
    #[error("out of memory")]
    OutOfMemory,

    /// The page's style table cannot accept a new entry. The page list
    /// normally recovers by splitting the page at the cursor row.
    #[error("page style set is full")]
    StyleSetFull,

    /// The page's grapheme bitmap allocator is exhausted.
    #[error("page grapheme storage is full")]
    GraphemeStorageFull,

    /// The requested columns are too wide for the fixed maximum page size,
    /// or a single row legitimately exceeds a fresh page's capacity.
    #[error("requested capacity exceeds the maximum page size")]
    CapacityExceeded,

    /// A color or SGR string could not be parsed.
    #[error("invalid format")]
    InvalidFormat,
}

pub type Result<T> = std::result::Result<T, Error>;
