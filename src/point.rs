//! Logical coordinates over the page list.
//!
//! The same `(x, y)` pair means different things depending on which area
//! it is measured from, so points carry their reference frame:
//!
//! - `screen`: y 0 is the first row of the first page (top of scrollback).
//! - `history`: y 0 is the first row of scrollback, excluding the active
//!   area (only meaningful when history exists).
//! - `active`: y 0 is the top of the active area — the bottom `rows` rows.
//! - `viewport`: y 0 is the first row the user currently sees.

use serde::{Deserialize, Serialize};

/// The reference frame a coordinate is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tag {
    Screen,
    History,
    Active,
    Viewport,
}

/// A tagged grid coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub tag: Tag,
    pub x: usize,
    pub y: usize,
}

impl Point {
    pub fn new(tag: Tag, x: usize, y: usize) -> Point {
        Point { tag, x, y }
    }

    pub fn screen(x: usize, y: usize) -> Point {
        Point::new(Tag::Screen, x, y)
    }

    pub fn history(x: usize, y: usize) -> Point {
        Point::new(Tag::History, x, y)
    }

    pub fn active(x: usize, y: usize) -> Point {
        Point::new(Tag::Active, x, y)
    }

    pub fn viewport(x: usize, y: usize) -> Point {
        Point::new(Tag::Viewport, x, y)
    }
}
