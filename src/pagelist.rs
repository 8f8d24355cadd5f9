//! The page list: scrollback and active area over a chain of pages.
//!
//! Pages form a doubly-linked list encoded as an arena of nodes with a
//! free list, which keeps append and prune O(1) without raw pointer
//! chasing. The first page is the top of scrollback; the last page is the
//! bottom of content. Three positions matter:
//!
//! - the *active area*: the bottom `rows` rows, where the cursor lives;
//! - the *viewport*: what the user sees (the active area unless they
//!   scrolled back);
//! - *screen* coordinates: absolute rows from the top of scrollback.
//!
//! The active top-left is cached and recomputed by walking back from the
//! last page whenever the shape of the list changes (grow, prune, split).
//! That walk is O(pages covering the active area), which in practice is
//! one or two pages, and it is what makes scrolling writes O(1).
//!
//! Pruning is row-granular: scrollback never exceeds the configured
//! maximum. Rows are first retired in place at the front of the head page
//! (`head_skip`), and the page itself goes back to the buffer pool once
//! every row in it is dead.

use crate::cell::Cell;
use crate::error::{Error, Result};
use crate::page::{Capacity, Page};
use crate::point::{Point, Tag};
use crate::pool::PagePool;

/// Index of a page node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(usize);

struct PageNode {
    page: Page,
    prev: Option<NodeId>,
    next: Option<NodeId>,
}

/// A row position: a page plus a row index inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowOffset {
    pub node: NodeId,
    pub row: usize,
}

/// Scroll requests against the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scroll {
    /// Jump to the active area (bottom).
    Active,
    /// Jump to the top of scrollback.
    Top,
    /// Move by a row delta; negative is toward the top.
    Delta(isize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Viewport {
    Active,
    Top,
    Exact(RowOffset),
}

pub struct PageList {
    cols: usize,
    rows: usize,
    max_scrollback: usize,
    capacity: Capacity,

    nodes: Vec<Option<PageNode>>,
    free_nodes: Vec<usize>,
    head: NodeId,
    tail: NodeId,
    /// Retired rows at the front of the head page. Only the head page can
    /// have dead leading rows; they are scrubbed and zeroed.
    head_skip: usize,
    pool: PagePool,

    viewport: Viewport,
    /// Cached top-left of the active area.
    active: RowOffset,
    /// Live rows across all pages; always at least `rows`.
    total_rows: usize,
}

impl PageList {
    /// Allocate enough pages for `rows` rows of `cols` columns, with up to
    /// `max_scrollback` rows of history beyond the active area.
    pub fn new(cols: usize, rows: usize, max_scrollback: usize) -> Result<PageList> {
        debug_assert!(cols > 0 && rows > 0);
        let capacity = Capacity::for_cols(cols)?;
        let mut pool = PagePool::default();

        let mut first = Page::init(pool.acquire()?, capacity);
        first.set_size(rows.min(capacity.rows));
        let first_size = first.size();
        let head = NodeId(0);
        let mut list = PageList {
            cols,
            rows,
            max_scrollback,
            capacity,
            nodes: vec![Some(PageNode {
                page: first,
                prev: None,
                next: None,
            })],
            free_nodes: Vec::new(),
            head,
            tail: head,
            head_skip: 0,
            pool,
            viewport: Viewport::Active,
            active: RowOffset { node: head, row: 0 },
            total_rows: first_size,
        };

        // A very wide screen may need several pages for one viewport.
        while list.total_rows < rows {
            let node = list.append_page()?;
            let fill = (rows - list.total_rows).min(list.capacity.rows);
            list.page_mut(node).set_size(fill);
            list.total_rows += fill;
        }

        list.active = list.compute_active();
        Ok(list)
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn max_scrollback(&self) -> usize {
        self.max_scrollback
    }

    /// Live rows across all pages.
    pub fn total_rows(&self) -> usize {
        self.total_rows
    }

    /// Rows of history above the active area.
    pub fn history_rows(&self) -> usize {
        self.total_rows - self.rows
    }

    // Node plumbing.

    fn node(&self, id: NodeId) -> &PageNode {
        self.nodes[id.0].as_ref().expect("stale node id")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut PageNode {
        self.nodes[id.0].as_mut().expect("stale node id")
    }

    pub fn page(&self, id: NodeId) -> &Page {
        &self.node(id).page
    }

    pub fn page_mut(&mut self, id: NodeId) -> &mut Page {
        &mut self.node_mut(id).page
    }

    /// First live row index of a page (nonzero only for the head).
    fn first_row(&self, id: NodeId) -> usize {
        if id == self.head {
            self.head_skip
        } else {
            0
        }
    }

    /// Top of the whole screen: the first live row of scrollback.
    fn screen_top(&self) -> RowOffset {
        RowOffset {
            node: self.head,
            row: self.head_skip,
        }
    }

    fn alloc_node(&mut self, node: PageNode) -> NodeId {
        match self.free_nodes.pop() {
            Some(i) => {
                self.nodes[i] = Some(node);
                NodeId(i)
            }
            None => {
                self.nodes.push(Some(node));
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    fn release_node(&mut self, id: NodeId) -> PageNode {
        let node = self.nodes[id.0].take().expect("stale node id");
        self.free_nodes.push(id.0);
        node
    }

    /// Append an empty page at the tail. Fails only on allocation.
    fn append_page(&mut self) -> Result<NodeId> {
        let page = Page::init(self.pool.acquire()?, self.capacity);
        let id = self.alloc_node(PageNode {
            page,
            prev: Some(self.tail),
            next: None,
        });
        self.node_mut(self.tail).next = Some(id);
        self.tail = id;
        tracing::trace!(pages = self.page_count(), "appended page");
        Ok(id)
    }

    /// Append one row at the bottom of content, growing the page chain if
    /// the last page is at capacity and pruning scrollback past its
    /// maximum. Returns the new bottom row.
    pub fn grow(&mut self) -> Result<RowOffset> {
        let tail_size = self.page(self.tail).size();
        let grown = if tail_size < self.capacity.rows {
            self.page_mut(self.tail).set_size(tail_size + 1);
            RowOffset {
                node: self.tail,
                row: tail_size,
            }
        } else {
            let node = self.append_page()?;
            self.page_mut(node).set_size(1);
            RowOffset { node, row: 0 }
        };
        self.total_rows += 1;

        self.prune();
        self.active = self.compute_active();
        Ok(grown)
    }

    /// Retire history rows from the front while scrollback exceeds the
    /// maximum. Skipped while the viewport resolves into the head page so
    /// rows are not pulled out from under a scrolled-back reader.
    fn prune(&mut self) {
        loop {
            let excess = self.history_rows().saturating_sub(self.max_scrollback);
            if excess == 0 {
                return;
            }
            match self.viewport {
                Viewport::Top => return,
                Viewport::Exact(ro) if ro.node == self.head => return,
                _ => {}
            }

            let head_live = self.page(self.head).size() - self.head_skip;
            let droppable = excess.min(head_live).min(self.total_rows - self.rows);
            if droppable == 0 {
                return;
            }

            for y in self.head_skip..self.head_skip + droppable {
                self.scrub_row(self.head, y);
            }
            self.head_skip += droppable;
            self.total_rows -= droppable;

            if self.head_skip == self.page(self.head).size() && self.head != self.tail {
                let old_head = self.head;
                let node = self.release_node(old_head);
                let next = node.next.expect("head with full skip must have a successor");
                self.node_mut(next).prev = None;
                self.head = next;
                self.head_skip = 0;
                self.pool.release(node.page.into_buffer());
                tracing::trace!("retired scrollback page to the pool");
            }
        }
    }

    // Row arithmetic.

    /// The row `n` rows after `from`, or `None` past the end of content.
    pub fn forward(&self, from: RowOffset, n: usize) -> Option<RowOffset> {
        let (ro, rem) = self.forward_overflow(from, n);
        if rem == 0 {
            Some(ro)
        } else {
            None
        }
    }

    /// Like `forward`, but clamps at the last row and reports how many
    /// rows could not be traversed.
    pub fn forward_overflow(&self, from: RowOffset, n: usize) -> (RowOffset, usize) {
        let mut node = from.node;
        let mut row = from.row;
        let mut remaining = n;
        loop {
            let size = self.page(node).size();
            debug_assert!(row < size, "row offset {} beyond page size {}", row, size);
            if row + remaining < size {
                return (RowOffset { node, row: row + remaining }, 0);
            }
            match self.node(node).next {
                Some(next) => {
                    remaining -= size - row;
                    node = next;
                    row = 0;
                }
                None => {
                    return (RowOffset { node, row: size - 1 }, remaining - (size - 1 - row));
                }
            }
        }
    }

    /// The row `n` rows before `from`, or `None` past the top.
    pub fn backward(&self, from: RowOffset, n: usize) -> Option<RowOffset> {
        let (ro, rem) = self.backward_overflow(from, n);
        if rem == 0 {
            Some(ro)
        } else {
            None
        }
    }

    /// Like `backward`, but clamps at the first live row of the screen.
    pub fn backward_overflow(&self, from: RowOffset, n: usize) -> (RowOffset, usize) {
        let mut node = from.node;
        let mut row = from.row;
        let mut remaining = n;
        loop {
            let floor = self.first_row(node);
            if remaining <= row - floor {
                return (RowOffset { node, row: row - remaining }, 0);
            }
            match self.node(node).prev {
                Some(prev) => {
                    remaining -= row - floor + 1;
                    node = prev;
                    row = self.page(node).size() - 1;
                }
                None => {
                    return (RowOffset { node, row: floor }, remaining - (row - floor));
                }
            }
        }
    }

    /// Absolute screen row index of a position. O(pages); used by scroll
    /// clamping and tests, not by write paths.
    pub fn screen_row_of(&self, ro: RowOffset) -> usize {
        let mut index = ro.row;
        let mut node = ro.node;
        while let Some(prev) = self.node(node).prev {
            index += self.page(prev).size();
            node = prev;
        }
        debug_assert_eq!(node, self.head);
        index - self.head_skip
    }

    // Active area and viewport.

    fn compute_active(&self) -> RowOffset {
        let mut remaining = self.rows;
        let mut node = self.tail;
        loop {
            let live = self.page(node).size() - self.first_row(node);
            if live >= remaining {
                return RowOffset {
                    node,
                    row: self.page(node).size() - remaining,
                };
            }
            remaining -= live;
            node = self
                .node(node)
                .prev
                .expect("page sizes sum to fewer rows than the active area");
        }
    }

    /// Cached top-left of the active area.
    pub fn active_top(&self) -> RowOffset {
        self.active
    }

    /// Top row currently shown to the user.
    pub fn viewport_top(&self) -> RowOffset {
        match self.viewport {
            Viewport::Active => self.active,
            Viewport::Top => self.screen_top(),
            Viewport::Exact(ro) => ro,
        }
    }

    /// Whether the viewport is following the active area.
    pub fn viewport_is_active(&self) -> bool {
        match self.viewport {
            Viewport::Active => true,
            Viewport::Top => self.history_rows() == 0,
            Viewport::Exact(ro) => ro == self.active,
        }
    }

    pub fn scroll(&mut self, behavior: Scroll) {
        match behavior {
            Scroll::Active => self.viewport = Viewport::Active,
            Scroll::Top => self.viewport = Viewport::Top,
            Scroll::Delta(delta) => {
                let current = self.screen_row_of(self.viewport_top());
                let limit = self.screen_row_of(self.active);
                let target = if delta < 0 {
                    current.saturating_sub(delta.unsigned_abs())
                } else {
                    (current + delta as usize).min(limit)
                };
                if target >= limit {
                    self.viewport = Viewport::Active;
                    return;
                }
                let ro = self
                    .forward(self.screen_top(), target)
                    .expect("clamped viewport target must exist");
                self.viewport = Viewport::Exact(ro);
            }
        }
    }

    // Point resolution.

    /// Resolve a logical point to a row position, or `None` when the
    /// coordinate is out of range.
    pub fn row_offset(&self, point: Point) -> Option<RowOffset> {
        let (base, limit) = match point.tag {
            Tag::Screen => (self.screen_top(), self.total_rows),
            Tag::History => (self.screen_top(), self.history_rows()),
            Tag::Active => (self.active, self.rows),
            Tag::Viewport => (self.viewport_top(), self.rows),
        };
        if point.y >= limit {
            return None;
        }
        self.forward(base, point.y)
    }

    /// Slow cell lookup for tests and debugging.
    pub fn get_cell(&self, point: Point) -> Option<Cell> {
        if point.x >= self.cols {
            return None;
        }
        let ro = self.row_offset(point)?;
        Some(self.page(ro.node).cell(ro.row, point.x))
    }

    /// Lazy forward iterator over rows, from `point` to the bottom of
    /// content.
    pub fn row_iterator(&self, point: Point) -> RowIterator<'_> {
        RowIterator {
            list: self,
            next: self.row_offset(point),
        }
    }

    /// Split the page holding `at` so that the row `at.row` starts a fresh
    /// page with empty style/grapheme tables. Returns the new position of
    /// that row.
    ///
    /// Used when a page-local table fills up: rows from the cut onward are
    /// re-interned into the fresh page, which compacts away entries only
    /// dead rows were holding. Fails with `CapacityExceeded` when even a
    /// fresh page cannot hold the migrated rows.
    pub fn split_page(&mut self, at: RowOffset) -> Result<RowOffset> {
        let old = at.node;
        let old_size = self.page(old).size();
        debug_assert!(at.row >= self.first_row(old) && at.row < old_size);
        let moved = old_size - at.row;

        // Build the fresh page before relinking so failure leaves the
        // list untouched.
        let mut fresh = Page::init(self.pool.acquire()?, self.capacity);
        fresh.set_size(moved);
        for i in 0..moved {
            if fresh.copy_row_from(i, self.page(old), at.row + i).is_err() {
                self.pool.release(fresh.into_buffer());
                return Err(Error::CapacityExceeded);
            }
        }

        // Scrub the moved rows out of the old page.
        for y in at.row..old_size {
            self.scrub_row(old, y);
        }
        self.page_mut(old).set_size(at.row);

        let old_next = self.node(old).next;
        let fresh_id = self.alloc_node(PageNode {
            page: fresh,
            prev: Some(old),
            next: old_next,
        });
        self.node_mut(old).next = Some(fresh_id);
        match old_next {
            Some(next) => self.node_mut(next).prev = Some(fresh_id),
            None => self.tail = fresh_id,
        }

        // Remap a viewport pin into the moved range.
        if let Viewport::Exact(ro) = self.viewport {
            if ro.node == old && ro.row >= at.row {
                self.viewport = Viewport::Exact(RowOffset {
                    node: fresh_id,
                    row: ro.row - at.row,
                });
            }
        }

        // An emptied page drops out of the chain.
        if at.row == self.first_row(old) {
            let node = self.release_node(old);
            match node.prev {
                Some(prev) => self.node_mut(prev).next = Some(fresh_id),
                None => {
                    self.head = fresh_id;
                    self.head_skip = 0;
                }
            }
            self.node_mut(fresh_id).prev = node.prev;
            self.pool.release(node.page.into_buffer());
        }

        self.active = self.compute_active();
        tracing::debug!(moved, "split page at cursor row");
        Ok(RowOffset {
            node: fresh_id,
            row: 0,
        })
    }

    /// Release a row's style refs and grapheme storage, then zero it.
    pub fn scrub_row(&mut self, node: NodeId, y: usize) {
        let cols = self.cols;
        let page = self.page_mut(node);
        let row = page.row(y);
        if row.grapheme() || row.styled() {
            for x in 0..cols {
                let cell = page.cell(y, x);
                if cell.has_grapheme() {
                    page.clear_grapheme(y, x);
                }
                if cell.styled() {
                    let id = cell.style_id();
                    if page.style_release(id) == 0 {
                        page.style_remove(id);
                    }
                }
            }
        }
        page.clear_cells(y, 0..cols);
        page.with_row(y, |row| row.reset_flags());
    }

    /// Whether a node id still refers to a live page. Cached positions can
    /// go stale when growth prunes the page they pointed into.
    pub fn node_alive(&self, id: NodeId) -> bool {
        self.nodes.get(id.0).is_some_and(|n| n.is_some())
    }

    /// Number of live pages. Test support.
    pub fn page_count(&self) -> usize {
        self.nodes.len() - self.free_nodes.len()
    }
}

impl std::fmt::Debug for PageList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageList")
            .field("cols", &self.cols)
            .field("rows", &self.rows)
            .field("total_rows", &self.total_rows)
            .field("pages", &self.page_count())
            .finish()
    }
}

pub struct RowIterator<'a> {
    list: &'a PageList,
    next: Option<RowOffset>,
}

impl Iterator for RowIterator<'_> {
    type Item = RowOffset;

    fn next(&mut self) -> Option<RowOffset> {
        let current = self.next?;
        self.next = self.list.forward(current, 1);
        Some(current)
    }
}
