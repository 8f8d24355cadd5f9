//! A page: one contiguous, zero-initialized block holding a slab of rows,
//! their cells, the style intern table, and grapheme storage.
//!
//! Section order inside the block is rows, cells, styles, grapheme
//! allocator, grapheme map. Every section start is derived deterministically
//! from the capacity by [`Layout::compute`], and every internal reference is
//! an [`Offset`] from the page base, so the block can be bit-copied or
//! relocated wholesale.
//!
//! A page has a *capacity* (how many rows/styles/grapheme bytes it can
//! hold) and a *size* (rows currently in use). The page list appends rows
//! into the last page until its capacity is reached, then allocates a new
//! page.

use crate::cell::{Cell, ContentTag, Row};
use crate::error::{Error, Result};
use crate::grapheme::{GraphemeAlloc, GraphemeCapacity, GraphemeMap, GraphemeSlice, CHUNK_CODEPOINTS};
use crate::offset::{align_forward, Offset, PAGE_BYTES, PAGE_WORDS};
use crate::style::{Style, StyleSet, StyleSetCapacity};

/// Default maximum interned styles per page.
pub const DEFAULT_STYLES: usize = 128;
/// Default bytes of grapheme cluster payload per page.
pub const DEFAULT_GRAPHEME_BYTES: usize = 2_048;

/// Declared capacity of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacity {
    pub cols: usize,
    pub rows: usize,
    pub styles: StyleSetCapacity,
    pub graphemes: GraphemeCapacity,
}

impl Capacity {
    /// Derive the capacity for a column count: as many rows as fit in the
    /// fixed page size after the style and grapheme tables take their
    /// share. Fails when even a single row cannot be indexed within the
    /// 16-bit offset space.
    pub fn for_cols(cols: usize) -> Result<Capacity> {
        debug_assert!(cols > 0);
        let styles = StyleSetCapacity::new(DEFAULT_STYLES);
        let graphemes = GraphemeCapacity::new(DEFAULT_GRAPHEME_BYTES);

        let overhead = styles.size_bytes() + graphemes.alloc_size_bytes() + graphemes.map_size_bytes();
        let per_row = 8 + cols * std::mem::size_of::<Cell>();
        let available = PAGE_BYTES.saturating_sub(overhead);
        let rows = available / per_row;
        if rows == 0 {
            return Err(Error::CapacityExceeded);
        }

        Ok(Capacity {
            cols,
            rows,
            styles,
            graphemes,
        })
    }
}

/// Byte offsets of each section, derived from a capacity.
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    pub rows_start: Offset<Row>,
    pub cells_start: Offset<Cell>,
    pub styles_start: Offset<u64>,
    pub grapheme_alloc_start: Offset<u64>,
    pub grapheme_map_start: Offset<u64>,
    pub total_bytes: usize,
}

impl Layout {
    pub fn compute(capacity: &Capacity) -> Layout {
        let mut offset = 0usize;

        let rows_start = Offset::new(align_forward(offset, 8));
        offset = rows_start.bytes() + capacity.rows * std::mem::size_of::<Row>();

        let cells_start: Offset<Cell> = Offset::new(align_forward(offset, 8));
        offset = cells_start.bytes() + capacity.rows * capacity.cols * std::mem::size_of::<Cell>();

        let styles_start: Offset<u64> = Offset::new(align_forward(offset, 8));
        offset = styles_start.bytes() + capacity.styles.size_bytes();

        let grapheme_alloc_start: Offset<u64> = Offset::new(align_forward(offset, 8));
        offset = grapheme_alloc_start.bytes() + capacity.graphemes.alloc_size_bytes();

        let grapheme_map_start: Offset<u64> = Offset::new(align_forward(offset, 8));
        offset = grapheme_map_start.bytes() + capacity.graphemes.map_size_bytes();

        debug_assert!(offset <= PAGE_BYTES, "layout overflows the page: {} bytes", offset);
        Layout {
            rows_start,
            cells_start,
            styles_start,
            grapheme_alloc_start,
            grapheme_map_start,
            total_bytes: offset,
        }
    }
}

/// One page of screen memory.
pub struct Page {
    mem: Box<[u64]>,
    capacity: Capacity,
    layout: Layout,
    styles: StyleSet,
    grapheme_alloc: GraphemeAlloc,
    grapheme_map: GraphemeMap,
    /// Rows currently in use, at most `capacity.rows`.
    size: usize,
}

impl Page {
    /// Initialize a page over a pool buffer. The buffer must be zeroed;
    /// initialization writes only the per-row cell strip offsets.
    pub fn init(mem: Box<[u64]>, capacity: Capacity) -> Page {
        debug_assert_eq!(mem.len(), PAGE_WORDS);
        debug_assert!(mem.iter().all(|&w| w == 0), "page buffers must be issued zeroed");

        let layout = Layout::compute(&capacity);
        let mut page = Page {
            mem,
            capacity,
            layout,
            styles: StyleSet::new(layout.styles_start, capacity.styles),
            grapheme_alloc: GraphemeAlloc::new(layout.grapheme_alloc_start, capacity.graphemes),
            grapheme_map: GraphemeMap::new(layout.grapheme_map_start, capacity.graphemes),
            size: 0,
        };

        for y in 0..capacity.rows {
            let cells = layout.cells_start.add(y * capacity.cols);
            page.set_row(y, Row::new(cells));
        }
        page.styles.init(&mut page.mem);
        page.grapheme_alloc.init(&mut page.mem);
        page.grapheme_map.init(&mut page.mem);
        page
    }

    /// Tear the page down, returning its buffer (re-zeroed) for pool reuse.
    pub fn into_buffer(mut self) -> Box<[u64]> {
        self.mem.fill(0);
        self.mem
    }

    pub fn capacity(&self) -> &Capacity {
        &self.capacity
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn set_size(&mut self, size: usize) {
        debug_assert!(size <= self.capacity.rows);
        self.size = size;
    }

    // Rows and cells.

    fn row_word(&self, y: usize) -> usize {
        debug_assert!(y < self.capacity.rows, "row {} out of capacity", y);
        self.layout.rows_start.word() + y
    }

    pub fn row(&self, y: usize) -> Row {
        Row(self.mem[self.row_word(y)])
    }

    pub fn set_row(&mut self, y: usize, row: Row) {
        let word = self.row_word(y);
        self.mem[word] = row.0;
    }

    pub fn with_row(&mut self, y: usize, f: impl FnOnce(&mut Row)) {
        let mut row = self.row(y);
        f(&mut row);
        self.set_row(y, row);
    }

    /// Byte offset of a cell from the page base; the stable key for the
    /// grapheme map.
    pub fn cell_offset(&self, y: usize, x: usize) -> u16 {
        debug_assert!(x < self.capacity.cols, "col {} out of capacity", x);
        self.row(y).cells().add(x).bytes() as u16
    }

    pub fn cell(&self, y: usize, x: usize) -> Cell {
        Cell(self.mem[self.cell_word(y, x)])
    }

    pub fn set_cell(&mut self, y: usize, x: usize, cell: Cell) {
        let word = self.cell_word(y, x);
        self.mem[word] = cell.0;
    }

    fn cell_word(&self, y: usize, x: usize) -> usize {
        debug_assert!(x < self.capacity.cols, "col {} out of capacity", x);
        self.row(y).cells().word() + x
    }

    /// Zero a run of cells in a row. Raw memory clear; style and grapheme
    /// bookkeeping is the caller's job.
    pub fn clear_cells(&mut self, y: usize, range: std::ops::Range<usize>) {
        debug_assert!(range.end <= self.capacity.cols);
        let start = self.row(y).cells().word();
        self.mem[start + range.start..start + range.end].fill(0);
    }

    /// Overwrite a run of cells with a blank cell (used for background
    /// painted erases). Raw write, like `clear_cells`.
    pub fn fill_cells(&mut self, y: usize, range: std::ops::Range<usize>, blank: Cell) {
        debug_assert!(range.end <= self.capacity.cols);
        let start = self.row(y).cells().word();
        self.mem[start + range.start..start + range.end].fill(blank.0);
    }

    // Style table.

    pub fn style_upsert(&mut self, style: &Style) -> Result<u16> {
        self.styles.upsert(&mut self.mem, style)
    }

    pub fn style_lookup(&self, style: &Style) -> Option<u16> {
        self.styles.lookup(&self.mem, style)
    }

    pub fn style_lookup_id(&self, id: u16) -> Option<Style> {
        self.styles.lookup_id(&self.mem, id)
    }

    pub fn style_use(&mut self, id: u16) {
        self.styles.use_id(&mut self.mem, id);
    }

    pub fn style_release(&mut self, id: u16) -> u16 {
        self.styles.release_id(&mut self.mem, id)
    }

    pub fn style_ref_count(&self, id: u16) -> u16 {
        self.styles.ref_count(&self.mem, id)
    }

    pub fn style_remove(&mut self, id: u16) {
        self.styles.remove(&mut self.mem, id);
    }

    pub fn style_count(&self) -> usize {
        self.styles.count(&self.mem)
    }

    pub fn style_total_refs(&self) -> usize {
        self.styles.total_refs(&self.mem)
    }

    // Grapheme storage.

    /// Attach `cp` to the cluster anchored at `(y, x)`, allocating or
    /// growing backing storage as needed and maintaining the cell tag and
    /// the row summary bit.
    pub fn append_grapheme(&mut self, y: usize, x: usize, cp: u32) -> Result<()> {
        let key = self.cell_offset(y, x);
        let mut cell = self.cell(y, x);
        debug_assert!(cell.has_text(), "grapheme append to an empty cell");

        if !cell.has_grapheme() {
            let offset = self.grapheme_alloc.alloc(&mut self.mem, 1)?;
            let slice = GraphemeSlice { offset, len: 1 };
            self.grapheme_alloc.set_codepoint(&mut self.mem, slice, 0, cp);
            if let Err(e) = self.grapheme_map.set(&mut self.mem, key, slice) {
                self.grapheme_alloc.free(&mut self.mem, slice);
                return Err(e);
            }
            cell.set_content_tag(ContentTag::Grapheme);
            self.set_cell(y, x, cell);
            self.with_row(y, |row| row.set_grapheme(true));
            return Ok(());
        }

        let slice = self
            .grapheme_map
            .get(&self.mem, key)
            .expect("grapheme-tagged cell must have a map entry");
        let len = slice.len as usize;
        if len % CHUNK_CODEPOINTS != 0 {
            // Spare room in the last chunk.
            self.grapheme_alloc.set_codepoint(&mut self.mem, slice, len, cp);
            let grown = GraphemeSlice {
                offset: slice.offset,
                len: slice.len + 1,
            };
            self.grapheme_map.set(&mut self.mem, key, grown)?;
            return Ok(());
        }

        // Grow past a chunk boundary: reallocate and copy.
        let offset = self.grapheme_alloc.alloc(&mut self.mem, slice.chunks() + 1)?;
        let grown = GraphemeSlice {
            offset,
            len: slice.len + 1,
        };
        for i in 0..len {
            let cp_i = self.grapheme_alloc.codepoint(&self.mem, slice, i);
            self.grapheme_alloc.set_codepoint(&mut self.mem, grown, i, cp_i);
        }
        self.grapheme_alloc.set_codepoint(&mut self.mem, grown, len, cp);
        self.grapheme_alloc.free(&mut self.mem, slice);
        self.grapheme_map.set(&mut self.mem, key, grown)?;
        Ok(())
    }

    /// The associated codepoints of a grapheme cell, excluding the base
    /// codepoint stored in the cell itself.
    pub fn grapheme_codepoints(&self, y: usize, x: usize) -> Vec<u32> {
        let cell = self.cell(y, x);
        if !cell.has_grapheme() {
            return Vec::new();
        }
        let key = self.cell_offset(y, x);
        let slice = self
            .grapheme_map
            .get(&self.mem, key)
            .expect("grapheme-tagged cell must have a map entry");
        (0..slice.len as usize)
            .map(|i| self.grapheme_alloc.codepoint(&self.mem, slice, i))
            .collect()
    }

    /// Release a cell's grapheme storage, clearing the content tag back to
    /// a plain codepoint. The row summary bit is left for the caller,
    /// which knows whether the whole row was scrubbed.
    pub fn clear_grapheme(&mut self, y: usize, x: usize) {
        let key = self.cell_offset(y, x);
        if let Some(slice) = self.grapheme_map.remove(&mut self.mem, key) {
            self.grapheme_alloc.free(&mut self.mem, slice);
        }
        let mut cell = self.cell(y, x);
        if cell.has_grapheme() {
            cell.set_content_tag(ContentTag::Codepoint);
            self.set_cell(y, x, cell);
        }
    }

    pub fn grapheme_chunks_used(&self) -> usize {
        self.grapheme_alloc.used_chunks(&self.mem)
    }

    pub fn grapheme_map_count(&self) -> usize {
        self.grapheme_map.count(&self.mem)
    }

    /// Check the page's internal consistency: summary bits against cell
    /// contents, style references against styled cells, and the grapheme
    /// map against grapheme-tagged cells. Panics on violation; intended
    /// for tests and debug assertions.
    pub fn verify_integrity(&self) {
        let cols = self.capacity.cols;
        let mut styled_cells = 0usize;
        let mut grapheme_cells = 0usize;

        for y in 0..self.size {
            let row = self.row(y);
            let mut row_styled = false;
            let mut row_grapheme = false;
            for x in 0..cols {
                let cell = self.cell(y, x);
                if cell.styled() {
                    styled_cells += 1;
                    row_styled = true;
                    assert!(
                        self.style_lookup_id(cell.style_id()).is_some(),
                        "cell ({y},{x}) references missing style {}",
                        cell.style_id()
                    );
                }
                if cell.has_grapheme() {
                    grapheme_cells += 1;
                    row_grapheme = true;
                    let key = self.cell_offset(y, x);
                    assert!(
                        self.grapheme_map.get(&self.mem, key).is_some(),
                        "grapheme cell ({y},{x}) has no map entry"
                    );
                }
            }
            // Summary bits may be conservatively set, never stale-false.
            assert!(!row_styled || row.styled(), "row {y} styled bit is stale");
            assert!(!row_grapheme || row.grapheme(), "row {y} grapheme bit is stale");
        }

        assert_eq!(
            self.style_total_refs(),
            styled_cells,
            "style references diverge from styled cells"
        );
        assert!(
            self.grapheme_map_count() >= grapheme_cells,
            "grapheme map lost entries"
        );
    }

    /// Copy one row's full contents (cells, flags, styles, graphemes) from
    /// another page, re-interning styles into this page's table. The
    /// destination row must already be scrubbed (no live refs or grapheme
    /// storage).
    pub fn copy_row_from(&mut self, dst_y: usize, src: &Page, src_y: usize) -> Result<()> {
        debug_assert_eq!(self.capacity.cols, src.capacity.cols);

        let src_row = src.row(src_y);
        self.with_row(dst_y, |row| {
            row.reset_flags();
            row.set_wrap(src_row.wrap());
            row.set_wrap_continuation(src_row.wrap_continuation());
        });

        let mut any_grapheme = false;
        let mut any_styled = false;
        for x in 0..self.capacity.cols {
            let src_cell = src.cell(src_y, x);
            let mut cell = src_cell;

            if src_cell.styled() {
                let style = src
                    .style_lookup_id(src_cell.style_id())
                    .expect("styled cell with missing style entry");
                let id = self.style_upsert(&style)?;
                self.style_use(id);
                cell.set_style_id(id);
                any_styled = true;
            }

            if src_cell.has_grapheme() {
                // Write the base cell first so the append path sees text.
                cell.set_content_tag(ContentTag::Codepoint);
                self.set_cell(dst_y, x, cell);
                for cp in src.grapheme_codepoints(src_y, x) {
                    self.append_grapheme(dst_y, x, cp)?;
                }
                any_grapheme = true;
            } else {
                self.set_cell(dst_y, x, cell);
            }
        }

        self.with_row(dst_y, |row| {
            row.set_grapheme(any_grapheme);
            row.set_styled(any_styled);
        });
        Ok(())
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("cols", &self.capacity.cols)
            .field("rows", &self.capacity.rows)
            .field("size", &self.size)
            .field("styles", &self.style_count())
            .field("grapheme_chunks", &self.grapheme_chunks_used())
            .finish()
    }
}
