//! The screen: a page list plus a cursor and the operations between them.
//!
//! The cursor caches its `(x, y)` inside the active area, the row position
//! in the page list backing `y`, and the current style both as a value and
//! as the id interned in the cursor page's style table. Those caches must
//! stay coherent: every cursor move goes through helpers that re-derive
//! the row position, and any move that lands the cursor in a different
//! page re-interns the style there.
//!
//! Style bookkeeping follows one rule everywhere: writing a styled cell
//! increments the entry's reference count, erasing or overwriting it
//! decrements, and an entry that reaches zero references is physically
//! removed on the next cursor style transition (`manual_style_update`) —
//! never while the cursor still points at it.

use crate::cell::{Cell, ContentTag, Wide};
use crate::error::{Error, Result};
use crate::pagelist::{NodeId, PageList, RowOffset, Scroll};
use crate::point::{Point, Tag};
use crate::sgr::Attribute;
use crate::style::{Color, Style, Underline};

/// Cursor state, cached against the backing page list.
#[derive(Debug)]
pub struct Cursor {
    /// Column within the active area.
    pub x: usize,
    /// Row within the active area.
    pub y: usize,
    /// Armed when a write filled the last column; the next printable
    /// write wraps before placing its cell.
    pub pending_wrap: bool,
    /// Current style value.
    pub style: Style,
    /// The style's id in the cursor page's style table; 0 when default.
    pub style_id: u16,
    /// Cached page position of row `y`.
    pub(crate) pos: RowOffset,
}

/// Cursor state preserved by DECSC/DECRC.
#[derive(Debug, Clone, Copy)]
pub struct SavedCursor {
    pub x: usize,
    pub y: usize,
    pub style: Style,
    pub pending_wrap: bool,
    pub origin: bool,
}

/// A resolved copy of one cell, independent of any page's tables. Used to
/// move content between rows and pages.
#[derive(Debug, Clone)]
pub(crate) struct CellSnapshot {
    cp: u32,
    wide: Wide,
    protected: bool,
    style: Option<Style>,
    cluster: Vec<u32>,
}

pub struct Screen {
    pub(crate) pages: PageList,
    pub(crate) cursor: Cursor,
    saved_cursor: Option<SavedCursor>,
}

impl Screen {
    pub fn new(cols: usize, rows: usize, max_scrollback: usize) -> Result<Screen> {
        let pages = PageList::new(cols, rows, max_scrollback)?;
        let pos = pages.active_top();
        Ok(Screen {
            pages,
            cursor: Cursor {
                x: 0,
                y: 0,
                pending_wrap: false,
                style: Style::default(),
                style_id: 0,
                pos,
            },
            saved_cursor: None,
        })
    }

    pub fn cols(&self) -> usize {
        self.pages.cols()
    }

    pub fn rows(&self) -> usize {
        self.pages.rows()
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn pages(&self) -> &PageList {
        &self.pages
    }

    /// Scroll the viewport. Content is untouched.
    pub fn scroll(&mut self, behavior: Scroll) {
        self.pages.scroll(behavior);
    }

    /// Slow cell lookup for tests and debugging.
    pub fn get_cell(&self, point: Point) -> Option<Cell> {
        self.pages.get_cell(point)
    }

    // Cursor movement.
    //
    // Preconditions are hard contracts: the caller keeps the move inside
    // the active area. All movement disarms a pending wrap.

    pub fn cursor_up(&mut self, n: usize) {
        debug_assert!(n <= self.cursor.y, "cursor_up past the top");
        self.cursor.pending_wrap = false;
        self.cursor.y -= n;
        let pos = self.pages.backward(self.cursor.pos, n).expect("cursor row must exist");
        self.set_cursor_pos(pos);
    }

    pub fn cursor_down(&mut self, n: usize) {
        debug_assert!(self.cursor.y + n < self.rows(), "cursor_down past the bottom");
        self.cursor.pending_wrap = false;
        self.cursor.y += n;
        let pos = self.pages.forward(self.cursor.pos, n).expect("cursor row must exist");
        self.set_cursor_pos(pos);
    }

    pub fn cursor_left(&mut self, n: usize) {
        debug_assert!(n <= self.cursor.x, "cursor_left past the left edge");
        self.cursor.pending_wrap = false;
        self.cursor.x -= n;
    }

    pub fn cursor_right(&mut self, n: usize) {
        debug_assert!(self.cursor.x + n < self.cols(), "cursor_right past the right edge");
        self.cursor.pending_wrap = false;
        self.cursor.x += n;
    }

    pub fn cursor_horizontal_absolute(&mut self, x: usize) {
        debug_assert!(x < self.cols());
        self.cursor.pending_wrap = false;
        self.cursor.x = x;
    }

    pub fn cursor_absolute(&mut self, x: usize, y: usize) {
        debug_assert!(x < self.cols() && y < self.rows(), "cursor_absolute out of bounds");
        self.cursor.pending_wrap = false;
        self.cursor.x = x;
        self.cursor.y = y;
        let pos = self
            .pages
            .row_offset(Point::active(0, y))
            .expect("active row must exist");
        self.set_cursor_pos(pos);
    }

    /// Grow the screen by one row at the bottom and keep the cursor on the
    /// (new) bottom row. Precondition: the cursor is on the bottom row.
    ///
    /// When the cursor style carries a background color, the fresh row is
    /// painted with the matching blank cell so the background extends.
    pub fn cursor_down_scroll(&mut self) -> Result<()> {
        debug_assert_eq!(self.cursor.y, self.rows() - 1, "cursor must be on the bottom row");
        let grown = self.pages.grow()?;
        self.set_cursor_pos(grown);

        if self.cursor.style.bg_cell_color().is_some() {
            self.fill_row_blank(grown)?;
        }
        Ok(())
    }

    /// Re-derive the cursor's page position after an operation that may
    /// have reshaped the page list (split, resize).
    pub(crate) fn refresh_cursor_pos(&mut self) {
        let pos = self
            .pages
            .row_offset(Point::active(0, self.cursor.y))
            .expect("cursor row must exist");
        self.set_cursor_pos(pos);
    }

    /// Update the cached position, re-interning the cursor style when the
    /// cursor lands in a different page.
    fn set_cursor_pos(&mut self, pos: RowOffset) {
        let old_node = self.cursor.pos.node;
        self.cursor.pos = pos;
        if pos.node != old_node {
            self.rebase_style(old_node);
        }
    }

    /// Move the cursor's interned style from `old_node`'s page to the
    /// current page. Infallible by design: if the destination table is
    /// full even after a page split, the cursor degrades to the default
    /// style id and logs, rather than poisoning a movement operation.
    fn rebase_style(&mut self, old_node: NodeId) {
        if self.cursor.style_id == 0 {
            return;
        }
        // Garbage-collect the entry left behind if nothing references it.
        // The old page may already have been pruned out from under us.
        let old_id = self.cursor.style_id;
        if self.pages.node_alive(old_node)
            && self.pages.page(old_node).style_lookup_id(old_id).is_some()
            && self.pages.page(old_node).style_ref_count(old_id) == 0
        {
            self.pages.page_mut(old_node).style_remove(old_id);
        }

        let style = self.cursor.style;
        match self.pages.page_mut(self.cursor.pos.node).style_upsert(&style) {
            Ok(id) => self.cursor.style_id = id,
            Err(_) => match self.pages.split_page(self.cursor.pos) {
                Ok(pos) => {
                    self.cursor.pos = pos;
                    match self.pages.page_mut(pos.node).style_upsert(&style) {
                        Ok(id) => self.cursor.style_id = id,
                        Err(e) => {
                            tracing::warn!(error = %e, "cursor style dropped: fresh page rejected it");
                            self.cursor.style_id = 0;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "cursor style dropped: page split failed");
                    self.cursor.style_id = 0;
                }
            },
        }
    }

    // Style transitions.

    /// Apply one SGR attribute to the cursor style.
    pub fn set_attribute(&mut self, attr: Attribute) -> Result<()> {
        let style = &mut self.cursor.style;
        match attr {
            Attribute::Unset => *style = Style::default(),
            Attribute::Bold => style.bold = true,
            Attribute::ResetBold => {
                // SGR 22 clears both weight attributes.
                style.bold = false;
                style.faint = false;
            }
            Attribute::Faint => style.faint = true,
            Attribute::Italic => style.italic = true,
            Attribute::ResetItalic => style.italic = false,
            Attribute::Underline(kind) => style.underline = kind,
            Attribute::ResetUnderline => style.underline = Underline::None,
            Attribute::UnderlineColor(color) => style.underline_color = color,
            Attribute::ResetUnderlineColor => style.underline_color = Color::None,
            Attribute::Blink => style.blink = true,
            Attribute::ResetBlink => style.blink = false,
            Attribute::Inverse => style.inverse = true,
            Attribute::ResetInverse => style.inverse = false,
            Attribute::Invisible => style.invisible = true,
            Attribute::ResetInvisible => style.invisible = false,
            Attribute::Strikethrough => style.strikethrough = true,
            Attribute::ResetStrikethrough => style.strikethrough = false,
            Attribute::Fg(color) => style.fg_color = color,
            Attribute::ResetFg => style.fg_color = Color::None,
            Attribute::Bg(color) => style.bg_color = color,
            Attribute::ResetBg => style.bg_color = Color::None,
            // Unknown parameters are dropped silently by contract.
            Attribute::Unknown { .. } => return Ok(()),
        }
        self.manual_style_update()
    }

    /// Synchronize the cursor's interned style id with its style value:
    /// drop the old entry if it became unreferenced, then intern the new
    /// value (splitting the page when its table is full).
    pub fn manual_style_update(&mut self) -> Result<()> {
        let node = self.cursor.pos.node;
        let old_id = self.cursor.style_id;
        if old_id != 0 && self.pages.page(node).style_ref_count(old_id) == 0 {
            self.pages.page_mut(node).style_remove(old_id);
        }

        if self.cursor.style.is_default() {
            self.cursor.style_id = 0;
            return Ok(());
        }

        let style = self.cursor.style;
        match self.pages.page_mut(node).style_upsert(&style) {
            Ok(id) => {
                self.cursor.style_id = id;
                Ok(())
            }
            // Table full: split at the cursor row; the split re-interns
            // the cursor style into the fresh page.
            Err(Error::StyleSetFull) => self.split_at_cursor(),
            Err(e) => Err(e),
        }
    }

    /// Split the cursor's page at the cursor row, so the row continues in
    /// a fresh page with empty style and grapheme tables, and restore the
    /// cursor's cached style id against the new page.
    pub(crate) fn split_at_cursor(&mut self) -> Result<()> {
        let old_node = self.cursor.pos.node;
        let old_id = self.cursor.style_id;
        let pos = self.pages.split_page(self.cursor.pos)?;
        self.cursor.pos = pos;

        if old_id != 0
            && self.pages.node_alive(old_node)
            && self.pages.page(old_node).style_lookup_id(old_id).is_some()
            && self.pages.page(old_node).style_ref_count(old_id) == 0
        {
            self.pages.page_mut(old_node).style_remove(old_id);
        }

        if self.cursor.style.is_default() {
            self.cursor.style_id = 0;
        } else {
            let style = self.cursor.style;
            self.cursor.style_id = self.pages.page_mut(pos.node).style_upsert(&style)?;
        }
        Ok(())
    }

    // Writing.

    /// The cell an erase should write: zero, or a cell carrying the
    /// cursor's style when that style has a background color. The style is
    /// interned into `node`'s page; a full table downgrades to the plain
    /// blank rather than failing an erase.
    pub(crate) fn blank_cell_for(&mut self, node: NodeId) -> Cell {
        if self.cursor.style.bg_cell_color().is_none() {
            return Cell::EMPTY;
        }
        if node == self.cursor.pos.node && self.cursor.style_id != 0 {
            return Cell::blank_styled(self.cursor.style_id);
        }
        let style = self.cursor.style;
        match self.pages.page_mut(node).style_upsert(&style) {
            Ok(id) => Cell::blank_styled(id),
            Err(e) => {
                tracing::warn!(error = %e, "erase background dropped: style table full");
                Cell::EMPTY
            }
        }
    }

    /// Write `cell` at the cursor, releasing whatever the target held and
    /// charging the new style. The caller has already positioned the
    /// cursor and chosen the wide flag.
    pub(crate) fn write_cursor_cell(&mut self, cell: Cell) {
        let (node, y, x) = (self.cursor.pos.node, self.cursor.pos.row, self.cursor.x);
        self.overwrite_cell(node, y, x, cell);
    }

    /// Replace the cell at an arbitrary position with full bookkeeping.
    /// The new style is charged before the old one is released, so
    /// rewriting a cell under the same style never drops the entry to zero
    /// in between.
    pub(crate) fn overwrite_cell(&mut self, node: NodeId, y: usize, x: usize, cell: Cell) {
        let cursor_fast_path = node == self.cursor.pos.node;
        let cursor_id = self.cursor.style_id;
        let page = self.pages.page_mut(node);

        let old = page.cell(y, x);
        if old.has_grapheme() {
            page.clear_grapheme(y, x);
        }
        if cell.styled() {
            page.style_use(cell.style_id());
            page.with_row(y, |row| row.set_styled(true));
        }
        if old.styled() {
            let id = old.style_id();
            let refs = page.style_release(id);
            if refs == 0 && !(cursor_fast_path && id == cursor_id) {
                page.style_remove(id);
            }
        }
        page.set_cell(y, x, cell);
    }

    /// Paint a whole row with the background blank cell.
    pub(crate) fn fill_row_blank(&mut self, ro: RowOffset) -> Result<()> {
        let cols = self.cols();
        let blank = self.blank_cell_for(ro.node);
        let page = self.pages.page_mut(ro.node);
        page.fill_cells(ro.row, 0..cols, blank);
        if blank.styled() {
            for _ in 0..cols {
                page.style_use(blank.style_id());
            }
            page.with_row(ro.row, |row| row.set_styled(true));
        }
        Ok(())
    }

    // Erasing.

    /// Erase rows `tl..=bl` (or through the end of `tl`'s area), releasing
    /// styles and grapheme storage. With `protected` set, cells marked
    /// protected survive.
    pub fn erase_rows(&mut self, tl: Point, bl: Option<Point>, protected: bool) {
        let Some(start) = self.pages.row_offset(tl) else {
            return;
        };
        let count = match bl {
            Some(p) => {
                debug_assert_eq!(p.tag, tl.tag, "erase bounds must share a reference frame");
                if p.y < tl.y {
                    return;
                }
                p.y - tl.y + 1
            }
            None => {
                let limit = match tl.tag {
                    Tag::Screen => self.pages.total_rows(),
                    Tag::History => self.pages.history_rows(),
                    Tag::Active | Tag::Viewport => self.rows(),
                };
                limit - tl.y
            }
        };

        let cols = self.cols();
        let mut ro = start;
        for _ in 0..count {
            self.erase_row_cells(ro, 0..cols, protected);
            match self.pages.forward(ro, 1) {
                Some(next) => ro = next,
                None => break,
            }
        }
    }

    /// Erase a run of cells in the row at `row`, all cells included.
    pub fn erase_cells(&mut self, row: Point, range: std::ops::Range<usize>) {
        if let Some(ro) = self.pages.row_offset(row) {
            self.erase_row_cells(ro, range, false);
        }
    }

    /// Erase a run of cells, skipping protected ones.
    pub fn erase_unprotected_cells(&mut self, row: Point, range: std::ops::Range<usize>) {
        if let Some(ro) = self.pages.row_offset(row) {
            self.erase_row_cells(ro, range, true);
        }
    }

    pub(crate) fn erase_row_cells(
        &mut self,
        ro: RowOffset,
        range: std::ops::Range<usize>,
        protected: bool,
    ) {
        let cols = self.cols();
        let range = range.start.min(cols)..range.end.min(cols);
        if range.is_empty() {
            return;
        }
        let full_row = range.start == 0 && range.end == cols;
        let blank = self.blank_cell_for(ro.node);

        let cursor_fast_path = ro.node == self.cursor.pos.node;
        let cursor_id = self.cursor.style_id;
        let page = self.pages.page_mut(ro.node);
        let row = page.row(ro.row);
        let check_grapheme = row.grapheme();
        let check_style = row.styled();

        let mut skipped_protected = false;
        for x in range.clone() {
            let cell = page.cell(ro.row, x);
            if protected && cell.protected() {
                skipped_protected = true;
                continue;
            }
            if check_grapheme && cell.has_grapheme() {
                page.clear_grapheme(ro.row, x);
            }
            // Charge the blank's style before releasing the old one; they
            // may be the same entry.
            if blank.styled() {
                page.style_use(blank.style_id());
            }
            if check_style && cell.styled() {
                let id = cell.style_id();
                let refs = page.style_release(id);
                if refs == 0 && !(cursor_fast_path && id == cursor_id) {
                    page.style_remove(id);
                }
            }
            page.set_cell(ro.row, x, blank);
        }

        if full_row && !skipped_protected {
            page.with_row(ro.row, |row| {
                row.reset_flags();
                if blank.styled() {
                    row.set_styled(true);
                }
            });
        } else if check_grapheme || check_style {
            // Partial erase: re-derive the summary bits.
            let mut any_grapheme = false;
            let mut any_styled = blank.styled();
            for x in 0..cols {
                let cell = page.cell(ro.row, x);
                any_grapheme |= cell.has_grapheme();
                any_styled |= cell.styled();
            }
            page.with_row(ro.row, |row| {
                row.set_grapheme(any_grapheme);
                row.set_styled(any_styled);
            });
        }
    }

    // Row content moves (scroll regions, insert/delete).

    /// Capture resolved copies of a cell run.
    pub(crate) fn snapshot_cells(&self, ro: RowOffset, range: std::ops::Range<usize>) -> Vec<CellSnapshot> {
        let page = self.pages.page(ro.node);
        range
            .map(|x| {
                let cell = page.cell(ro.row, x);
                CellSnapshot {
                    cp: cell.codepoint(),
                    wide: cell.wide(),
                    protected: cell.protected(),
                    style: if cell.styled() {
                        page.style_lookup_id(cell.style_id())
                    } else {
                        None
                    },
                    cluster: if cell.has_grapheme() {
                        page.grapheme_codepoints(ro.row, x)
                    } else {
                        Vec::new()
                    },
                }
            })
            .collect()
    }

    /// Write snapshots starting at `(ro, start_x)`. The target cells are
    /// overwritten with bookkeeping; snapshots whose resources no longer
    /// fit degrade (style dropped, cluster truncated) with a log rather
    /// than failing mid-move.
    pub(crate) fn write_snapshots(
        &mut self,
        ro: RowOffset,
        start_x: usize,
        snaps: &[CellSnapshot],
    ) {
        for (i, snap) in snaps.iter().enumerate() {
            let x = start_x + i;
            let style_id = match snap.style {
                Some(style) => match self.pages.page_mut(ro.node).style_upsert(&style) {
                    Ok(id) => id,
                    Err(e) => {
                        tracing::warn!(error = %e, "style dropped while moving cells");
                        0
                    }
                },
                None => 0,
            };

            let mut cell = if snap.cp == 0 {
                Cell::blank_styled(style_id)
            } else {
                Cell::new(snap.cp, style_id)
            };
            cell.set_wide(snap.wide);
            cell.set_protected(snap.protected);
            self.overwrite_cell(ro.node, ro.row, x, cell);

            if !snap.cluster.is_empty() && snap.cp != 0 {
                for &cp in &snap.cluster {
                    if let Err(e) = self.pages.page_mut(ro.node).append_grapheme(ro.row, x, cp) {
                        tracing::warn!(error = %e, "grapheme cluster truncated while moving cells");
                        break;
                    }
                }
            }
        }
    }

    /// Copy `range` of the row at `src` over the same range of `dst`,
    /// resolving styles and clusters so the pages may differ.
    pub(crate) fn copy_row_range(
        &mut self,
        src: RowOffset,
        dst: RowOffset,
        range: std::ops::Range<usize>,
    ) {
        let snaps = self.snapshot_cells(src, range.clone());
        self.write_snapshots(dst, range.start, &snaps);

        // Wrap flags travel with full-width copies.
        if range.start == 0 && range.end == self.cols() {
            let src_row = self.pages.page(src.node).row(src.row);
            let (wrap, cont) = (src_row.wrap(), src_row.wrap_continuation());
            self.pages.page_mut(dst.node).with_row(dst.row, |row| {
                row.set_wrap(wrap);
                row.set_wrap_continuation(cont);
            });
        }
    }

    // Cursor save/restore.

    pub fn save_cursor(&mut self, origin: bool) {
        self.saved_cursor = Some(SavedCursor {
            x: self.cursor.x,
            y: self.cursor.y,
            style: self.cursor.style,
            pending_wrap: self.cursor.pending_wrap,
            origin,
        });
    }

    /// Restore the saved cursor, or home the cursor with default style
    /// when nothing was saved. Returns the saved origin-mode flag for the
    /// terminal to reapply.
    pub fn restore_cursor(&mut self) -> Result<bool> {
        let saved = self.saved_cursor.unwrap_or(SavedCursor {
            x: 0,
            y: 0,
            style: Style::default(),
            pending_wrap: false,
            origin: false,
        });
        self.cursor.style = saved.style;
        self.manual_style_update()?;
        self.cursor_absolute(saved.x.min(self.cols() - 1), saved.y.min(self.rows() - 1));
        self.cursor.pending_wrap = saved.pending_wrap;
        Ok(saved.origin)
    }

    // Reading.

    /// Write the text content of the screen from `from`'s row downward.
    /// Codepoints are emitted in column order; spacer cells are skipped;
    /// trailing blanks and fully-blank trailing rows are elided; `\n`
    /// separates rows.
    pub fn dump_string(&self, writer: &mut impl std::fmt::Write, from: Point) -> std::fmt::Result {
        let mut pending_newlines = 0usize;
        let mut first = true;

        for ro in self.pages.row_iterator(Point::new(from.tag, 0, from.y)) {
            let text = self.row_text(ro);
            if text.is_empty() {
                pending_newlines += 1;
                continue;
            }
            if !first || pending_newlines > 0 {
                let newlines = pending_newlines + usize::from(!first);
                for _ in 0..newlines {
                    writer.write_char('\n')?;
                }
            }
            writer.write_str(&text)?;
            first = false;
            pending_newlines = 0;
        }
        Ok(())
    }

    /// `dump_string` into a fresh `String`.
    pub fn dump_string_alloc(&self, from: Point) -> String {
        let mut out = String::new();
        self.dump_string(&mut out, from).expect("writing to a String cannot fail");
        out
    }

    fn row_text(&self, ro: RowOffset) -> String {
        let page = self.pages.page(ro.node);
        let mut text = String::new();
        let mut blank_run = 0usize;
        for x in 0..self.cols() {
            let cell = page.cell(ro.row, x);
            match cell.wide() {
                Wide::SpacerTail | Wide::SpacerHead => continue,
                Wide::Narrow | Wide::Wide => {}
            }
            if !cell.has_text() {
                blank_run += 1;
                continue;
            }
            // Interior blanks become spaces once more text follows.
            for _ in 0..blank_run {
                text.push(' ');
            }
            blank_run = 0;
            if let Some(c) = char::from_u32(cell.codepoint()) {
                text.push(c);
            }
            if cell.content_tag() == ContentTag::Grapheme {
                for cp in page.grapheme_codepoints(ro.row, x) {
                    if let Some(c) = char::from_u32(cp) {
                        text.push(c);
                    }
                }
            }
        }
        text
    }

    // Resize.

    /// Resize to a new geometry, preserving as much of the active area as
    /// fits: the top-left aligned intersection of old and new bounds. Page
    /// invariants are rebuilt from scratch; scrollback is dropped.
    pub fn resize(&mut self, cols: usize, rows: usize) -> Result<()> {
        if cols == self.cols() && rows == self.rows() {
            return Ok(());
        }
        let max_scrollback = self.pages.max_scrollback();
        let mut next = Screen::new(cols, rows, max_scrollback)?;

        let copy_rows = rows.min(self.rows());
        let copy_cols = cols.min(self.cols());
        for y in 0..copy_rows {
            let src = self
                .pages
                .row_offset(Point::active(0, y))
                .expect("active row must exist");
            let dst = next
                .pages
                .row_offset(Point::active(0, y))
                .expect("active row must exist");
            let snaps = self.snapshot_cells(src, 0..copy_cols);
            next.write_snapshots(dst, 0, &snaps);
        }

        next.cursor.style = self.cursor.style;
        next.manual_style_update()?;
        next.cursor_absolute(self.cursor.x.min(cols - 1), self.cursor.y.min(rows - 1));
        next.saved_cursor = self.saved_cursor.map(|mut saved| {
            saved.x = saved.x.min(cols - 1);
            saved.y = saved.y.min(rows - 1);
            saved
        });
        *self = next;
        Ok(())
    }

    // Test and accounting support.

    /// Style entries interned in the cursor's page.
    pub fn cursor_page_style_count(&self) -> usize {
        self.pages.page(self.cursor.pos.node).style_count()
    }

    /// Sum of style references in the cursor's page.
    pub fn cursor_page_style_refs(&self) -> usize {
        self.pages.page(self.cursor.pos.node).style_total_refs()
    }

    /// Count of styled cells in the cursor's page. For validating the
    /// reference accounting invariant.
    pub fn cursor_page_styled_cells(&self) -> usize {
        let page = self.pages.page(self.cursor.pos.node);
        let mut styled = 0;
        for y in 0..page.size() {
            for x in 0..self.pages.cols() {
                if page.cell(y, x).styled() {
                    styled += 1;
                }
            }
        }
        styled
    }
}

impl std::fmt::Debug for Screen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Screen")
            .field("cols", &self.cols())
            .field("rows", &self.rows())
            .field("cursor", &(self.cursor.x, self.cursor.y))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::Color;

    fn screen() -> Screen {
        Screen::new(80, 24, 1000).unwrap()
    }

    fn bold() -> Attribute {
        Attribute::Bold
    }

    /// Write an ASCII char at the cursor and advance, the minimal print.
    fn put(screen: &mut Screen, c: char) {
        let cell = Cell::new(c as u32, screen.cursor.style_id);
        screen.write_cursor_cell(cell);
        if screen.cursor.x + 1 < screen.cols() {
            screen.cursor_right(1);
        }
    }

    fn put_str(screen: &mut Screen, s: &str) {
        for c in s.chars() {
            put(screen, c);
        }
    }

    #[test]
    fn test_cursor_moves_update_position() {
        let mut screen = screen();
        screen.cursor_absolute(10, 5);
        assert_eq!((screen.cursor.x, screen.cursor.y), (10, 5));
        screen.cursor_up(2);
        assert_eq!(screen.cursor.y, 3);
        screen.cursor_down(4);
        assert_eq!(screen.cursor.y, 7);
        screen.cursor_left(10);
        assert_eq!(screen.cursor.x, 0);
        screen.cursor_right(79);
        assert_eq!(screen.cursor.x, 79);
    }

    #[test]
    fn test_moves_disarm_pending_wrap() {
        let mut screen = screen();
        screen.cursor.pending_wrap = true;
        screen.cursor_left(0);
        assert!(!screen.cursor.pending_wrap);
    }

    #[test]
    fn test_write_and_dump_single_row() {
        let mut screen = screen();
        put_str(&mut screen, "hello, world");
        assert_eq!(screen.dump_string_alloc(Point::screen(0, 0)), "hello, world");
        assert_eq!((screen.cursor.x, screen.cursor.y), (12, 0));
    }

    #[test]
    fn test_dump_interior_blanks_and_blank_rows() {
        let mut screen = screen();
        put_str(&mut screen, "hello");
        screen.cursor_absolute(2, 2);
        put_str(&mut screen, "world");
        assert_eq!(
            screen.dump_string_alloc(Point::screen(0, 0)),
            "hello\n\n  world"
        );
    }

    #[test]
    fn test_dump_elides_trailing_blank_rows() {
        let mut screen = screen();
        put_str(&mut screen, "top");
        assert_eq!(screen.dump_string_alloc(Point::screen(0, 0)), "top");
    }

    #[test]
    fn test_cursor_down_scroll_grows_history() {
        let mut screen = screen();
        put_str(&mut screen, "first");
        screen.cursor_absolute(0, 23);
        screen.cursor_down_scroll().unwrap();
        assert_eq!(screen.pages.history_rows(), 1);
        assert_eq!(screen.cursor.y, 23);
        // The first row is now history; active row 0 is the old row 1.
        let cell = screen.get_cell(Point::screen(0, 0)).unwrap();
        assert_eq!(cell.codepoint(), 'f' as u32);
        assert_eq!(screen.get_cell(Point::active(0, 0)), Some(Cell::EMPTY));
    }

    #[test]
    fn test_cursor_down_scroll_paints_background() {
        let mut screen = screen();
        screen
            .set_attribute(Attribute::Bg(Color::Palette(4)))
            .unwrap();
        screen.cursor_absolute(0, 23);
        screen.cursor_down_scroll().unwrap();
        let cell = screen.get_cell(Point::active(10, 23)).unwrap();
        assert!(cell.styled(), "new bottom row carries the background style");
        let style = screen
            .pages
            .page(screen.cursor.pos.node)
            .style_lookup_id(cell.style_id())
            .unwrap();
        assert_eq!(style.bg_color, Color::Palette(4));
    }

    #[test]
    fn test_set_attribute_interns_style_once() {
        let mut screen = screen();
        screen.set_attribute(bold()).unwrap();
        assert_eq!(screen.cursor_page_style_count(), 1);
        assert_ne!(screen.cursor.style_id, 0);

        put_str(&mut screen, "hello world");
        assert_eq!(screen.cursor_page_style_count(), 1);
        assert_eq!(screen.cursor_page_style_refs(), 11);
        assert_eq!(screen.cursor_page_styled_cells(), 11);
    }

    #[test]
    fn test_style_unset_keeps_referenced_entry() {
        let mut screen = screen();
        screen.set_attribute(bold()).unwrap();
        put_str(&mut screen, "x");
        screen.set_attribute(Attribute::Unset).unwrap();
        assert_eq!(screen.cursor.style_id, 0);
        // The bold cell still references the entry.
        assert_eq!(screen.cursor_page_style_count(), 1);
    }

    #[test]
    fn test_style_unset_collects_unreferenced_entry() {
        let mut screen = screen();
        screen.set_attribute(bold()).unwrap();
        assert_eq!(screen.cursor_page_style_count(), 1);
        // Nothing was written; switching back to default collects it.
        screen.set_attribute(Attribute::Unset).unwrap();
        assert_eq!(screen.cursor_page_style_count(), 0);
    }

    #[test]
    fn test_erase_rows_releases_styles() {
        let mut screen = screen();
        screen.set_attribute(bold()).unwrap();
        put_str(&mut screen, "hello world");
        screen.set_attribute(Attribute::Unset).unwrap();
        assert_eq!(screen.cursor_page_style_count(), 1);

        screen.erase_rows(Point::active(0, 0), None, false);
        assert_eq!(screen.cursor_page_style_count(), 0);
        assert_eq!(screen.cursor_page_style_refs(), 0);
        assert_eq!(screen.dump_string_alloc(Point::screen(0, 0)), "");
    }

    #[test]
    fn test_erase_keeps_cursor_style_entry() {
        let mut screen = screen();
        screen.set_attribute(bold()).unwrap();
        put_str(&mut screen, "abc");
        screen.erase_rows(Point::active(0, 0), None, false);
        // Refs dropped to zero but the entry survives while the cursor
        // still holds it.
        assert_eq!(screen.cursor_page_style_count(), 1);
        assert_eq!(screen.cursor_page_style_refs(), 0);
        assert_ne!(screen.cursor.style_id, 0);
    }

    #[test]
    fn test_erase_rows_protected() {
        let mut screen = screen();
        put(&mut screen, 'a');
        let mut protected = Cell::new('b' as u32, 0);
        protected.set_protected(true);
        screen.write_cursor_cell(protected);
        screen.cursor_right(1);
        put(&mut screen, 'c');

        screen.erase_rows(Point::active(0, 0), Some(Point::active(0, 0)), true);
        assert_eq!(screen.dump_string_alloc(Point::screen(0, 0)), " b");
    }

    #[test]
    fn test_erase_cells_range() {
        let mut screen = screen();
        put_str(&mut screen, "abcdef");
        screen.erase_cells(Point::active(0, 0), 1..4);
        assert_eq!(screen.dump_string_alloc(Point::screen(0, 0)), "a   ef");
    }

    #[test]
    fn test_erase_with_background_paints_blank() {
        let mut screen = screen();
        screen
            .set_attribute(Attribute::Bg(Color::Rgb(crate::color::Rgb::new(9, 9, 9))))
            .unwrap();
        screen.erase_rows(Point::active(2, 2), Some(Point::active(0, 2)), false);
        let cell = screen.get_cell(Point::active(40, 2)).unwrap();
        assert!(cell.styled());
        assert!(!cell.has_text());
        // Accounting holds: every blank carries one reference.
        assert_eq!(screen.cursor_page_style_refs(), screen.cursor_page_styled_cells());
    }

    #[test]
    fn test_grapheme_row_flag_lifecycle() {
        let mut screen = screen();
        put(&mut screen, 'e');
        let pos = screen.cursor.pos;
        assert!(!screen.pages.page(pos.node).row(pos.row).grapheme());

        screen
            .pages
            .page_mut(pos.node)
            .append_grapheme(pos.row, 0, 0x0301)
            .unwrap();
        assert!(screen.pages.page(pos.node).row(pos.row).grapheme());

        screen.erase_rows(Point::active(0, 0), Some(Point::active(0, 0)), false);
        assert!(!screen.pages.page(pos.node).row(pos.row).grapheme());
        assert_eq!(screen.pages.page(pos.node).grapheme_chunks_used(), 0);
    }

    #[test]
    fn test_snapshot_copy_between_rows() {
        let mut screen = screen();
        screen.set_attribute(bold()).unwrap();
        put_str(&mut screen, "ab");
        let src = screen.pages.row_offset(Point::active(0, 0)).unwrap();
        let dst = screen.pages.row_offset(Point::active(0, 3)).unwrap();
        screen.copy_row_range(src, dst, 0..screen.cols());
        assert_eq!(
            screen.dump_string_alloc(Point::screen(0, 0)),
            "ab\n\n\nab"
        );
        assert_eq!(screen.cursor_page_style_refs(), screen.cursor_page_styled_cells());
    }

    #[test]
    fn test_save_restore_cursor() {
        let mut screen = screen();
        screen.set_attribute(bold()).unwrap();
        screen.cursor_absolute(7, 3);
        screen.save_cursor(false);

        screen.set_attribute(Attribute::Unset).unwrap();
        screen.cursor_absolute(0, 0);
        let origin = screen.restore_cursor().unwrap();
        assert!(!origin);
        assert_eq!((screen.cursor.x, screen.cursor.y), (7, 3));
        assert!(screen.cursor.style.bold);
        assert_ne!(screen.cursor.style_id, 0);
    }

    #[test]
    fn test_restore_without_save_homes_cursor() {
        let mut screen = screen();
        screen.cursor_absolute(5, 5);
        screen.restore_cursor().unwrap();
        assert_eq!((screen.cursor.x, screen.cursor.y), (0, 0));
        assert!(screen.cursor.style.is_default());
    }

    #[test]
    fn test_resize_preserves_content_and_cursor() {
        let mut screen = screen();
        put_str(&mut screen, "keep me");
        screen.cursor_absolute(70, 20);
        screen.resize(40, 10).unwrap();
        assert_eq!(screen.cols(), 40);
        assert_eq!(screen.rows(), 10);
        assert_eq!(screen.dump_string_alloc(Point::screen(0, 0)), "keep me");
        assert_eq!((screen.cursor.x, screen.cursor.y), (39, 9));
    }

    #[test]
    fn test_resize_preserves_styles() {
        let mut screen = screen();
        screen.set_attribute(bold()).unwrap();
        put_str(&mut screen, "hi");
        screen.resize(100, 30).unwrap();
        let cell = screen.get_cell(Point::active(0, 0)).unwrap();
        assert!(cell.styled());
        let style = screen
            .pages
            .page(screen.cursor.pos.node)
            .style_lookup_id(cell.style_id())
            .unwrap();
        assert!(style.bold);
        assert_eq!(screen.cursor_page_style_refs(), screen.cursor_page_styled_cells());
    }

    #[test]
    fn test_style_accounting_across_scroll() {
        let mut screen = screen();
        screen.set_attribute(bold()).unwrap();
        // Fill enough rows to push content into history and across pages.
        for _ in 0..200 {
            put_str(&mut screen, "styled");
            screen.cursor_absolute(0, 23);
            screen.cursor_down_scroll().unwrap();
        }
        assert_eq!(screen.cursor_page_style_refs(), screen.cursor_page_styled_cells());
        screen.pages.page(screen.cursor.pos.node).verify_integrity();
    }
}
