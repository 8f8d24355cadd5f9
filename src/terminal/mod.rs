//! Terminal semantics over a pair of screens.
//!
//! This is the layer that understands what a terminal *means*: printing
//! with soft wrap and wide characters, index and scroll regions, modes,
//! tab stops, the palette, and the primary/alternate screen pair. It owns
//! no parsing beyond SGR parameters — byte-stream escape parsing belongs
//! to the host feeding this type.
//!
//! Writes are routed to the active screen only while the status display is
//! `Main`; a host that switches the status display away gets its writes
//! discarded, matching DECSASD behavior.

mod tabstops;

pub use tabstops::Tabstops;

use serde::{Deserialize, Serialize};

use crate::cell::{Cell, Wide};
use crate::color::{Palette, Rgb};
use crate::error::{Error, Result};
use crate::modes::{ModeKind, Modes, MouseEvents, MouseFormat};
use crate::pagelist::Scroll;
use crate::point::Point;
use crate::screen::Screen;
use crate::unicode::{self, BreakState};

/// Construction options. The alternate screen always gets zero scrollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    pub cols: usize,
    pub rows: usize,
    pub max_scrollback: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            cols: 80,
            rows: 24,
            max_scrollback: 10_000,
        }
    }
}

/// Which of the two screens is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenKind {
    Primary,
    Alternate,
}

/// Where writes are routed (DECSASD). Anything but `Main` discards them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusDisplay {
    #[default]
    Main,
    StatusLine,
}

/// The scrolling region, inclusive on all four sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollingRegion {
    pub top: usize,
    pub bottom: usize,
    pub left: usize,
    pub right: usize,
}

/// Display erase variants (ED).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EraseDisplay {
    Below,
    Above,
    Complete,
    Scrollback,
}

/// Line erase variants (EL).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EraseLine {
    Right,
    Left,
    Complete,
}

pub struct Terminal {
    /// The active screen.
    screen: Screen,
    /// The inactive half of the primary/alternate pair.
    inactive_screen: Screen,
    active_kind: ScreenKind,

    modes: Modes,
    scrolling_region: ScrollingRegion,
    tabstops: Tabstops,
    palette: Palette,
    status_display: StatusDisplay,
    max_scrollback: usize,

    /// Last printed character, for CSI REP.
    previous_char: Option<char>,
    /// DECSCA: newly printed cells get the protected flag.
    protected: bool,
    /// Grapheme boundary state threaded through consecutive prints.
    grapheme_state: BreakState,
}

impl Terminal {
    pub fn new(cols: usize, rows: usize) -> Result<Terminal> {
        Terminal::with_options(Options {
            cols,
            rows,
            ..Options::default()
        })
    }

    pub fn with_options(options: Options) -> Result<Terminal> {
        let screen = Screen::new(options.cols, options.rows, options.max_scrollback)?;
        let inactive_screen = Screen::new(options.cols, options.rows, 0)?;
        Ok(Terminal {
            screen,
            inactive_screen,
            active_kind: ScreenKind::Primary,
            modes: Modes::default(),
            scrolling_region: ScrollingRegion {
                top: 0,
                bottom: options.rows - 1,
                left: 0,
                right: options.cols - 1,
            },
            tabstops: Tabstops::new(options.cols),
            palette: Palette::default(),
            status_display: StatusDisplay::default(),
            max_scrollback: options.max_scrollback,
            previous_char: None,
            protected: false,
            grapheme_state: BreakState::default(),
        })
    }

    pub fn cols(&self) -> usize {
        self.screen.cols()
    }

    pub fn rows(&self) -> usize {
        self.screen.rows()
    }

    /// The active screen. Reads only; a renderer borrows this between
    /// writes under the host's lock.
    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn active_screen_kind(&self) -> ScreenKind {
        self.active_kind
    }

    pub fn modes(&self) -> &Modes {
        &self.modes
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn scrolling_region(&self) -> ScrollingRegion {
        self.scrolling_region
    }

    pub fn tabstops(&self) -> &Tabstops {
        &self.tabstops
    }

    pub fn set_status_display(&mut self, status_display: StatusDisplay) {
        self.status_display = status_display;
    }

    /// Scroll the viewport of the active screen.
    pub fn scroll_viewport(&mut self, behavior: Scroll) {
        self.screen.scroll(behavior);
    }

    pub fn dump_string_alloc(&self, from: Point) -> String {
        self.screen.dump_string_alloc(from)
    }

    // Printing.

    /// Exclusive right boundary for printing: the scroll region's right
    /// edge, unless the cursor is already right of it.
    fn right_margin(&self) -> usize {
        if self.screen.cursor.x > self.scrolling_region.right {
            self.cols()
        } else {
            self.scrolling_region.right + 1
        }
    }

    /// Print one codepoint at the cursor.
    pub fn print(&mut self, c: char) -> Result<()> {
        if self.status_display != StatusDisplay::Main {
            return Ok(());
        }
        let cp = c as u32;
        let props = unicode::properties(cp);
        self.previous_char = Some(c);

        // Grapheme clustering: a codepoint that continues the previous
        // cell's cluster is stored there, regardless of its own width.
        if self.modes.grapheme_cluster && unicode::can_extend_cluster(props.boundary_class) {
            if let Some((x, prev_cp)) = self.prior_cell() {
                let prev_class = unicode::properties(prev_cp).boundary_class;
                if !unicode::grapheme_break(prev_class, props.boundary_class, &mut self.grapheme_state)
                {
                    return self.append_cluster(x, cp);
                }
            } else if props.width == 0 {
                tracing::warn!(codepoint = cp, "zero-width codepoint with no prior cell dropped");
                return Ok(());
            }
        }

        match props.width {
            0 => match self.prior_cell() {
                Some((x, _)) => self.append_cluster(x, cp),
                None => {
                    tracing::warn!(codepoint = cp, "zero-width codepoint with no prior cell dropped");
                    Ok(())
                }
            },
            1 => self.print_narrow(cp),
            _ => self.print_wide(cp),
        }
    }

    /// Repeat the last printed character (CSI REP).
    pub fn print_repeat(&mut self, n: usize) -> Result<()> {
        let Some(c) = self.previous_char else {
            return Ok(());
        };
        // Bound the repeat to one full screen of cells.
        let n = n.min(self.cols() * self.rows());
        for _ in 0..n {
            self.print(c)?;
        }
        Ok(())
    }

    /// Feed a string through the printable/control fast path: printables
    /// print, CR/LF/TAB/BS act, anything else is discarded.
    pub fn input(&mut self, s: &str) -> Result<()> {
        for c in s.chars() {
            match c {
                '\n' => {
                    self.carriage_return();
                    self.linefeed()?;
                }
                '\r' => self.carriage_return(),
                '\t' => self.horizontal_tab(),
                '\u{8}' => self.backspace(),
                c if (c as u32) < 0x20 || c == '\u{7F}' => {
                    // Unhandled control characters are discarded.
                }
                c => self.print(c)?,
            }
        }
        Ok(())
    }

    /// The cell a combining codepoint would attach to: left of the cursor
    /// (or under it while a wrap is pending), stepping over a spacer tail.
    /// Returns its column and the last codepoint of its cluster.
    fn prior_cell(&self) -> Option<(usize, u32)> {
        let cursor = &self.screen.cursor;
        let mut x = if cursor.pending_wrap {
            cursor.x
        } else {
            if cursor.x == 0 {
                return None;
            }
            cursor.x - 1
        };

        let page = self.screen.pages.page(cursor.pos.node);
        let mut cell = page.cell(cursor.pos.row, x);
        if cell.wide() == Wide::SpacerTail {
            if x == 0 {
                return None;
            }
            x -= 1;
            cell = page.cell(cursor.pos.row, x);
        }
        if !cell.has_text() {
            return None;
        }
        let last_cp = if cell.has_grapheme() {
            *page
                .grapheme_codepoints(cursor.pos.row, x)
                .last()
                .expect("grapheme cell with empty cluster")
        } else {
            cell.codepoint()
        };
        Some((x, last_cp))
    }

    /// Attach `cp` to the cluster in column `x` of the cursor row,
    /// splitting the page when grapheme storage is exhausted.
    fn append_cluster(&mut self, x: usize, cp: u32) -> Result<()> {
        let pos = self.screen.cursor.pos;
        match self.screen.pages.page_mut(pos.node).append_grapheme(pos.row, x, cp) {
            Ok(()) => Ok(()),
            Err(Error::GraphemeStorageFull) => {
                self.screen.split_at_cursor()?;
                let pos = self.screen.cursor.pos;
                self.screen
                    .pages
                    .page_mut(pos.node)
                    .append_grapheme(pos.row, x, cp)
            }
            Err(e) => Err(e),
        }
    }

    fn print_narrow(&mut self, cp: u32) -> Result<()> {
        if self.screen.cursor.pending_wrap {
            if self.modes.wraparound {
                self.wrap_cursor()?;
            }
            // With wraparound off the last column is overwritten in place
            // and the pending state re-arms below.
        }

        if self.modes.insert {
            self.shift_for_insert(1);
        }
        self.clean_wide_cell(self.screen.cursor.x);

        let mut cell = Cell::new(cp, self.screen.cursor.style_id);
        cell.set_protected(self.protected);
        self.screen.write_cursor_cell(cell);

        let right_margin = self.right_margin();
        if self.screen.cursor.x == right_margin - 1 {
            self.screen.cursor.pending_wrap = true;
        } else {
            self.screen.cursor_right(1);
        }
        Ok(())
    }

    fn print_wide(&mut self, cp: u32) -> Result<()> {
        if self.screen.cursor.pending_wrap {
            if self.modes.wraparound {
                self.wrap_cursor()?;
            } else {
                return Ok(());
            }
        }

        let mut right_margin = self.right_margin();
        if self.screen.cursor.x + 1 >= right_margin {
            // One column left: reserve it with a spacer head and wrap the
            // character itself to the next row.
            if !self.modes.wraparound {
                return Ok(());
            }
            self.clean_wide_cell(self.screen.cursor.x);
            let mut head = Cell::blank_styled(self.screen.cursor.style_id);
            head.set_wide(Wide::SpacerHead);
            self.screen.write_cursor_cell(head);
            self.wrap_cursor()?;
            right_margin = self.right_margin();
            if self.screen.cursor.x + 1 >= right_margin {
                // A one-column region cannot hold a wide character.
                return Ok(());
            }
        }

        if self.modes.insert {
            self.shift_for_insert(2);
        }
        self.clean_wide_cell(self.screen.cursor.x);
        self.clean_wide_cell(self.screen.cursor.x + 1);

        let mut wide = Cell::new(cp, self.screen.cursor.style_id);
        wide.set_protected(self.protected);
        wide.set_wide(Wide::Wide);
        self.screen.write_cursor_cell(wide);

        self.screen.cursor_right(1);
        let mut tail = Cell::blank_styled(self.screen.cursor.style_id);
        tail.set_protected(self.protected);
        tail.set_wide(Wide::SpacerTail);
        self.screen.write_cursor_cell(tail);

        if self.screen.cursor.x == right_margin - 1 {
            self.screen.cursor.pending_wrap = true;
        } else {
            self.screen.cursor_right(1);
        }
        Ok(())
    }

    /// Soft wrap: mark the current row wrapped, move to the next row
    /// (scrolling if needed), and continue at the region's left edge.
    fn wrap_cursor(&mut self) -> Result<()> {
        let pos = self.screen.cursor.pos;
        self.screen
            .pages
            .page_mut(pos.node)
            .with_row(pos.row, |row| row.set_wrap(true));

        self.index()?;
        self.screen.cursor_horizontal_absolute(self.scrolling_region.left);

        let pos = self.screen.cursor.pos;
        self.screen
            .pages
            .page_mut(pos.node)
            .with_row(pos.row, |row| row.set_wrap_continuation(true));
        Ok(())
    }

    /// Insert mode: slide the cells from the cursor to the right margin
    /// over by `width`, clipping at the margin.
    fn shift_for_insert(&mut self, width: usize) {
        let right_margin = self.right_margin();
        let x = self.screen.cursor.x;
        if x + width >= right_margin {
            return;
        }
        let pos = self.screen.cursor.pos;
        let snaps = self.screen.snapshot_cells(pos, x..right_margin - width);
        self.screen.write_snapshots(pos, x + width, &snaps);
    }

    /// Overwriting half of a wide character leaves its other half
    /// dangling; erase the orphan so the grid never shows half a glyph.
    fn clean_wide_cell(&mut self, x: usize) {
        let pos = self.screen.cursor.pos;
        let cell = self.screen.pages.page(pos.node).cell(pos.row, x);
        match cell.wide() {
            Wide::Wide => {
                if x + 1 < self.cols() {
                    self.screen.erase_row_cells(pos, x + 1..x + 2, false);
                }
            }
            Wide::SpacerTail => {
                if x > 0 {
                    self.screen.erase_row_cells(pos, x - 1..x, false);
                }
            }
            Wide::Narrow | Wide::SpacerHead => {}
        }
    }

    // Cursor movement and line discipline.

    fn region_is_full_screen(&self) -> bool {
        let sr = self.scrolling_region;
        sr.top == 0 && sr.bottom == self.rows() - 1 && sr.left == 0 && sr.right == self.cols() - 1
    }

    /// Move down one row; at the scroll region's bottom this scrolls — a
    /// full-screen region grows scrollback, anything smaller rotates the
    /// region in place.
    pub fn index(&mut self) -> Result<()> {
        self.screen.cursor.pending_wrap = false;
        let sr = self.scrolling_region;
        let cursor_y = self.screen.cursor.y;

        // Outside the region vertically: move down, clamped to the screen.
        if cursor_y < sr.top || cursor_y > sr.bottom {
            if cursor_y < self.rows() - 1 {
                self.screen.cursor_down(1);
            }
            return Ok(());
        }

        if cursor_y == sr.bottom {
            let x = self.screen.cursor.x;
            if x >= sr.left && x <= sr.right {
                if self.region_is_full_screen() {
                    self.screen.cursor_down_scroll()?;
                } else {
                    self.scroll_up_range(sr.top, sr.bottom, 1);
                }
            }
            return Ok(());
        }

        self.screen.cursor_down(1);
        Ok(())
    }

    /// Move up one row; at the scroll region's top this scrolls the region
    /// contents down.
    pub fn reverse_index(&mut self) {
        self.screen.cursor.pending_wrap = false;
        let sr = self.scrolling_region;
        let cursor = &self.screen.cursor;

        if cursor.y == sr.top && cursor.x >= sr.left && cursor.x <= sr.right {
            self.scroll_down_range(sr.top, sr.bottom, 1);
        } else if cursor.y > 0 {
            self.screen.cursor_up(1);
        }
    }

    pub fn linefeed(&mut self) -> Result<()> {
        self.index()
    }

    pub fn next_line(&mut self) -> Result<()> {
        self.carriage_return();
        self.index()
    }

    pub fn carriage_return(&mut self) {
        let sr = self.scrolling_region;
        let x = if self.modes.origin {
            sr.left
        } else if self.screen.cursor.x >= sr.left {
            sr.left
        } else {
            0
        };
        self.screen.cursor_horizontal_absolute(x);
    }

    pub fn backspace(&mut self) {
        if self.screen.cursor.x > 0 {
            self.screen.cursor_left(1);
        } else {
            self.screen.cursor.pending_wrap = false;
        }
    }

    pub fn horizontal_tab(&mut self) {
        let limit = self.right_margin() - 1;
        let x = match self.tabstops.next_after(self.screen.cursor.x) {
            Some(stop) => stop.min(limit),
            None => limit,
        };
        self.screen.cursor_horizontal_absolute(x);
    }

    pub fn horizontal_tab_back(&mut self) {
        let x = self.tabstops.prev_before(self.screen.cursor.x).unwrap_or(0);
        self.screen.cursor_horizontal_absolute(x);
    }

    pub fn tab_set(&mut self) {
        self.tabstops.set(self.screen.cursor.x);
    }

    /// TBC: clear the stop under the cursor, or every stop.
    pub fn tab_clear(&mut self, all: bool) {
        if all {
            self.tabstops.unset_all();
        } else {
            self.tabstops.unset(self.screen.cursor.x);
        }
    }

    /// Cursor movement relative to the screen, clamped (CUU/CUD/CUF/CUB).
    pub fn cursor_up(&mut self, n: usize) {
        let n = n.max(1).min(self.screen.cursor.y);
        self.screen.cursor_up(n);
    }

    pub fn cursor_down(&mut self, n: usize) {
        let n = n.max(1).min(self.rows() - 1 - self.screen.cursor.y);
        if n > 0 {
            self.screen.cursor_down(n);
        } else {
            self.screen.cursor.pending_wrap = false;
        }
    }

    pub fn cursor_left(&mut self, n: usize) {
        let n = n.max(1).min(self.screen.cursor.x);
        if n > 0 {
            self.screen.cursor_left(n);
        } else {
            self.screen.cursor.pending_wrap = false;
        }
    }

    pub fn cursor_right(&mut self, n: usize) {
        let n = n.max(1).min(self.cols() - 1 - self.screen.cursor.x);
        if n > 0 {
            self.screen.cursor_right(n);
        } else {
            self.screen.cursor.pending_wrap = false;
        }
    }

    /// CUP: absolute position, origin-mode aware, clamped to bounds.
    pub fn cursor_position(&mut self, x: usize, y: usize) {
        let sr = self.scrolling_region;
        let (x, y) = if self.modes.origin {
            (
                (sr.left + x).min(sr.right),
                (sr.top + y).min(sr.bottom),
            )
        } else {
            (x.min(self.cols() - 1), y.min(self.rows() - 1))
        };
        self.screen.cursor_absolute(x, y);
    }

    // Erase operations.

    pub fn erase_display(&mut self, mode: EraseDisplay, protected: bool) {
        let (x, y) = (self.screen.cursor.x, self.screen.cursor.y);
        let cols = self.cols();
        match mode {
            EraseDisplay::Below => {
                self.screen.cursor.pending_wrap = false;
                let pos = self.screen.cursor.pos;
                self.screen.erase_row_cells(pos, x..cols, protected);
                if y + 1 < self.rows() {
                    self.screen.erase_rows(Point::active(0, y + 1), None, protected);
                }
            }
            EraseDisplay::Above => {
                self.screen.cursor.pending_wrap = false;
                if y > 0 {
                    self.screen
                        .erase_rows(Point::active(0, 0), Some(Point::active(0, y - 1)), protected);
                }
                let pos = self.screen.cursor.pos;
                self.screen.erase_row_cells(pos, 0..x + 1, protected);
            }
            EraseDisplay::Complete => {
                self.screen.cursor.pending_wrap = false;
                self.screen.erase_rows(Point::active(0, 0), None, protected);
            }
            EraseDisplay::Scrollback => {
                let history = self.screen.pages().history_rows();
                if history > 0 {
                    self.screen.erase_rows(
                        Point::history(0, 0),
                        Some(Point::history(0, history - 1)),
                        protected,
                    );
                }
            }
        }
    }

    pub fn erase_line(&mut self, mode: EraseLine, protected: bool) {
        self.screen.cursor.pending_wrap = false;
        let (x, cols) = (self.screen.cursor.x, self.cols());
        let pos = self.screen.cursor.pos;
        let range = match mode {
            EraseLine::Right => x..cols,
            EraseLine::Left => 0..x + 1,
            EraseLine::Complete => 0..cols,
        };
        self.screen.erase_row_cells(pos, range, protected);
    }

    /// ECH: erase `n` cells from the cursor rightward.
    pub fn erase_chars(&mut self, n: usize) {
        self.screen.cursor.pending_wrap = false;
        let x = self.screen.cursor.x;
        let end = (x + n.max(1)).min(self.cols());
        let pos = self.screen.cursor.pos;
        self.screen.erase_row_cells(pos, x..end, false);
    }

    // In-row shifts.

    /// ICH: open `n` blank cells at the cursor, clipping at the right
    /// margin.
    pub fn insert_blanks(&mut self, n: usize) {
        self.screen.cursor.pending_wrap = false;
        let right_margin = self.right_margin();
        let x = self.screen.cursor.x;
        let n = n.max(1).min(right_margin - x);
        let pos = self.screen.cursor.pos;
        if n < right_margin - x {
            let snaps = self.screen.snapshot_cells(pos, x..right_margin - n);
            self.screen.write_snapshots(pos, x + n, &snaps);
        }
        self.screen.erase_row_cells(pos, x..x + n, false);
    }

    /// DCH: delete `n` cells at the cursor, closing the gap from the
    /// right margin.
    pub fn delete_chars(&mut self, n: usize) {
        self.screen.cursor.pending_wrap = false;
        let right_margin = self.right_margin();
        let x = self.screen.cursor.x;
        let n = n.max(1).min(right_margin - x);
        let pos = self.screen.cursor.pos;
        if n < right_margin - x {
            let snaps = self.screen.snapshot_cells(pos, x + n..right_margin);
            self.screen.write_snapshots(pos, x, &snaps);
        }
        self.screen
            .erase_row_cells(pos, right_margin - n..right_margin, false);
    }

    // Region scrolls.

    /// SU: scroll the region up by `n` without moving the cursor.
    pub fn scroll_up(&mut self, n: usize) {
        let sr = self.scrolling_region;
        self.screen.cursor.pending_wrap = false;
        self.scroll_up_range(sr.top, sr.bottom, n.max(1));
    }

    /// SD: scroll the region down by `n` without moving the cursor.
    pub fn scroll_down(&mut self, n: usize) {
        let sr = self.scrolling_region;
        self.screen.cursor.pending_wrap = false;
        self.scroll_down_range(sr.top, sr.bottom, n.max(1));
    }

    /// IL: insert `n` blank lines at the cursor, pushing the rest of the
    /// region down. No-op outside the region.
    pub fn insert_lines(&mut self, n: usize) {
        let sr = self.scrolling_region;
        let cursor = &self.screen.cursor;
        if cursor.y < sr.top || cursor.y > sr.bottom || cursor.x < sr.left || cursor.x > sr.right {
            return;
        }
        let y = cursor.y;
        self.screen.cursor.pending_wrap = false;
        self.scroll_down_range(y, sr.bottom, n.max(1));
        self.screen.cursor_horizontal_absolute(sr.left);
    }

    /// DL: delete `n` lines at the cursor, pulling the rest of the region
    /// up. No-op outside the region.
    pub fn delete_lines(&mut self, n: usize) {
        let sr = self.scrolling_region;
        let cursor = &self.screen.cursor;
        if cursor.y < sr.top || cursor.y > sr.bottom || cursor.x < sr.left || cursor.x > sr.right {
            return;
        }
        let y = cursor.y;
        self.screen.cursor.pending_wrap = false;
        self.scroll_up_range(y, sr.bottom, n.max(1));
        self.screen.cursor_horizontal_absolute(sr.left);
    }

    /// Shift rows `top..=bottom` up by `n` within the region's columns,
    /// blanking the vacated rows.
    fn scroll_up_range(&mut self, top: usize, bottom: usize, n: usize) {
        let sr = self.scrolling_region;
        let height = bottom - top + 1;
        let n = n.min(height);
        let range = sr.left..sr.right + 1;

        // n == height blanks the whole range; there is nothing to copy.
        for y in top..top + height - n {
            let src = self
                .screen
                .pages
                .row_offset(Point::active(0, y + n))
                .expect("region row must exist");
            let dst = self
                .screen
                .pages
                .row_offset(Point::active(0, y))
                .expect("region row must exist");
            self.screen.copy_row_range(src, dst, range.clone());
        }
        for y in bottom + 1 - n..=bottom {
            let ro = self
                .screen
                .pages
                .row_offset(Point::active(0, y))
                .expect("region row must exist");
            self.screen.erase_row_cells(ro, range.clone(), false);
        }
    }

    /// Shift rows `top..=bottom` down by `n` within the region's columns,
    /// blanking the vacated rows.
    fn scroll_down_range(&mut self, top: usize, bottom: usize, n: usize) {
        let sr = self.scrolling_region;
        let height = bottom - top + 1;
        let n = n.min(height);
        let range = sr.left..sr.right + 1;

        for y in (top + n..=bottom).rev() {
            let src = self
                .screen
                .pages
                .row_offset(Point::active(0, y - n))
                .expect("region row must exist");
            let dst = self
                .screen
                .pages
                .row_offset(Point::active(0, y))
                .expect("region row must exist");
            self.screen.copy_row_range(src, dst, range.clone());
        }
        for y in top..top + n {
            let ro = self
                .screen
                .pages
                .row_offset(Point::active(0, y))
                .expect("region row must exist");
            self.screen.erase_row_cells(ro, range.clone(), false);
        }
    }

    // Region and mode state.

    /// DECSTBM/DECSLRM combined: set the scrolling region (inclusive,
    /// 0-based, clamped). Degenerate regions are ignored. The cursor homes
    /// to the origin.
    pub fn set_scrolling_region(&mut self, top: usize, bottom: usize, left: usize, right: usize) {
        let bottom = bottom.min(self.rows() - 1);
        let right = right.min(self.cols() - 1);
        if top >= bottom || left >= right {
            return;
        }
        self.scrolling_region = ScrollingRegion {
            top,
            bottom,
            left,
            right,
        };
        self.cursor_position(0, 0);
    }

    pub fn set_mode(&mut self, kind: ModeKind, enabled: bool) {
        match kind {
            ModeKind::Wraparound => self.modes.wraparound = enabled,
            ModeKind::Insert => self.modes.insert = enabled,
            ModeKind::GraphemeCluster => self.modes.grapheme_cluster = enabled,
            ModeKind::ReverseVideo => self.modes.reverse_video = enabled,
            ModeKind::Origin => {
                self.modes.origin = enabled;
                self.cursor_position(0, 0);
            }
            ModeKind::AlternateScreen => {
                if enabled {
                    self.enter_alternate_screen();
                } else {
                    self.exit_alternate_screen();
                }
            }
            ModeKind::MouseX10 => self.set_mouse_events(MouseEvents::X10, enabled),
            ModeKind::MouseNormal => self.set_mouse_events(MouseEvents::Normal, enabled),
            ModeKind::MouseButtonEvent => self.set_mouse_events(MouseEvents::Button, enabled),
            ModeKind::MouseAnyEvent => self.set_mouse_events(MouseEvents::Any, enabled),
            ModeKind::MouseUtf8 => self.set_mouse_format(MouseFormat::Utf8, enabled),
            ModeKind::MouseSgr => self.set_mouse_format(MouseFormat::Sgr, enabled),
            ModeKind::MouseSgrPixels => self.set_mouse_format(MouseFormat::SgrPixels, enabled),
            ModeKind::MouseUrxvt => self.set_mouse_format(MouseFormat::Urxvt, enabled),
        }
    }

    fn set_mouse_events(&mut self, events: MouseEvents, enabled: bool) {
        if enabled {
            self.modes.mouse_events = events;
        } else if self.modes.mouse_events == events {
            self.modes.mouse_events = MouseEvents::None;
        }
    }

    fn set_mouse_format(&mut self, format: MouseFormat, enabled: bool) {
        if enabled {
            self.modes.mouse_format = format;
        } else if self.modes.mouse_format == format {
            self.modes.mouse_format = MouseFormat::X10;
        }
    }

    /// Switch to the alternate screen. A pure swap: each screen keeps its
    /// own cursor, saved cursor, and contents; mode changes never mutate
    /// cells.
    fn enter_alternate_screen(&mut self) {
        if self.active_kind == ScreenKind::Alternate {
            return;
        }
        std::mem::swap(&mut self.screen, &mut self.inactive_screen);
        self.active_kind = ScreenKind::Alternate;
    }

    fn exit_alternate_screen(&mut self) {
        if self.active_kind == ScreenKind::Primary {
            return;
        }
        std::mem::swap(&mut self.screen, &mut self.inactive_screen);
        self.active_kind = ScreenKind::Primary;
    }

    // Cursor save/restore and protection.

    pub fn save_cursor(&mut self) {
        self.screen.save_cursor(self.modes.origin);
    }

    pub fn restore_cursor(&mut self) -> Result<()> {
        let origin = self.screen.restore_cursor()?;
        self.modes.origin = origin;
        Ok(())
    }

    /// DECSCA: mark subsequently printed cells (un)protected against
    /// selective erase.
    pub fn set_protected(&mut self, protected: bool) {
        self.protected = protected;
    }

    // Palette.

    pub fn set_palette_color(&mut self, index: u8, color: Rgb) {
        self.palette[index] = color;
    }

    pub fn reset_palette_color(&mut self, index: u8) {
        self.palette[index] = Palette::default()[index];
    }

    pub fn reset_palette(&mut self) {
        self.palette = Palette::default();
    }

    // Whole-terminal operations.

    /// DECALN: fill the screen with `E`, reset the scrolling region, and
    /// home the cursor.
    pub fn decaln(&mut self) -> Result<()> {
        self.scrolling_region = ScrollingRegion {
            top: 0,
            bottom: self.rows() - 1,
            left: 0,
            right: self.cols() - 1,
        };
        self.screen.cursor_absolute(0, 0);

        let cols = self.cols();
        for y in 0..self.rows() {
            let ro = self
                .screen
                .pages
                .row_offset(Point::active(0, y))
                .expect("active row must exist");
            self.screen.pages.scrub_row(ro.node, ro.row);
            let fill = Cell::new('E' as u32, 0);
            self.screen.pages.page_mut(ro.node).fill_cells(ro.row, 0..cols, fill);
        }
        Ok(())
    }

    /// RIS: reset modes, screens, tab stops, palette, and scrollback.
    pub fn full_reset(&mut self) -> Result<()> {
        *self = Terminal::with_options(Options {
            cols: self.cols(),
            rows: self.rows(),
            max_scrollback: self.max_scrollback,
        })?;
        Ok(())
    }

    /// Resize both screens. Cursor row content within the new bounds is
    /// preserved; the scrolling region and tab stops reset to the new
    /// geometry.
    pub fn resize(&mut self, cols: usize, rows: usize) -> Result<()> {
        self.screen.resize(cols, rows)?;
        self.inactive_screen.resize(cols, rows)?;
        self.scrolling_region = ScrollingRegion {
            top: 0,
            bottom: rows - 1,
            left: 0,
            right: cols - 1,
        };
        self.tabstops.resize(cols);
        Ok(())
    }

    // SGR.

    /// Apply one parsed SGR attribute to the active screen's cursor style.
    pub fn set_attribute(&mut self, attr: crate::sgr::Attribute) -> Result<()> {
        if let crate::sgr::Attribute::Unknown { ref params } = attr {
            tracing::warn!(?params, "unknown SGR parameters dropped");
            return Ok(());
        }
        self.screen.set_attribute(attr)
    }
}

impl std::fmt::Debug for Terminal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Terminal")
            .field("cols", &self.cols())
            .field("rows", &self.rows())
            .field("active", &self.active_kind)
            .finish()
    }
}
