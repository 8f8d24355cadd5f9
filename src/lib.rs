//! termgrid: the paged screen core of a terminal emulator.
//!
//! This crate maintains the grid of character cells that constitutes a
//! terminal display. Scrollback lives in a linked list of fixed-size,
//! relocatable memory pages; each page owns its rows, cells, interned
//! styles, and grapheme cluster storage, all addressed by offsets from the
//! page base. On top of that sit a [`Screen`] (cursor, erase, style
//! transitions, text dump) and a [`Terminal`] (print with soft wrap and
//! wide characters, scroll regions, modes, tab stops, palette, and the
//! primary/alternate screen pair).
//!
//! The crate is a library with no I/O: it does not parse escape bytes,
//! talk to a PTY, or render. Hosts feed it decoded operations and read the
//! resulting state. Everything is deterministic and synchronous, which
//! makes the core directly property-testable: a sequence of printable
//! codepoints and control operations produces one screen state,
//! serializable as plain text via [`Screen::dump_string`].
//!
//! # Concurrency contract
//!
//! A screen is owned by exactly one logical task at a time; writes inside
//! a [`Terminal`] are totally ordered. A renderer may read the active
//! screen between writes by holding whatever coarse lock the host wraps
//! the terminal in — the core does not provide the lock, it only promises
//! not to suspend or mutate behind a shared reference.

pub mod cell;
pub mod color;
pub mod error;
pub mod grapheme;
pub mod modes;
pub mod offset;
pub mod page;
pub mod pagelist;
pub mod point;
pub mod pool;
pub mod screen;
pub mod sgr;
pub mod style;
pub mod terminal;
pub mod unicode;

pub use cell::{Cell, ContentTag, Row, Wide};
pub use color::{Palette, Rgb};
pub use error::{Error, Result};
pub use modes::{ModeKind, Modes, MouseEvents, MouseFormat};
pub use pagelist::{PageList, RowOffset, Scroll};
pub use point::{Point, Tag};
pub use screen::Screen;
pub use sgr::{Attribute, Param, Parser};
pub use style::{Color, Style, Underline};
pub use terminal::{
    EraseDisplay, EraseLine, Options, ScreenKind, ScrollingRegion, StatusDisplay, Terminal,
};
