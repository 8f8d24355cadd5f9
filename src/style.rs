//! Text styles and the per-page style interning table.
//!
//! A [`Style`] is the host-facing value: colors plus attribute flags. Pages
//! never store `Style` values per cell; each page owns a small
//! open-addressed [`StyleSet`] that deduplicates styles into 16-bit ids,
//! and cells carry only the id. Entries are reference counted: every cell
//! write under a non-default style increments the entry, every erase or
//! overwrite decrements it, and an entry whose count reaches zero is
//! removed on the next cursor style transition.
//!
//! The table lives inside the page's word slab so a page stays one
//! relocatable block. All methods therefore take the page memory explicitly.

use serde::{Deserialize, Serialize};

use crate::color::Rgb;
use crate::error::{Error, Result};
use crate::offset::Offset;

/// A terminal color: unset (use the terminal default), a 256-palette
/// index, or a direct RGB value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Color {
    #[default]
    None,
    Palette(u8),
    Rgb(Rgb),
}

impl Color {
    fn pack(self) -> u32 {
        match self {
            Color::None => 0,
            Color::Palette(i) => (1 << 24) | i as u32,
            Color::Rgb(rgb) => {
                (2 << 24) | ((rgb.r as u32) << 16) | ((rgb.g as u32) << 8) | rgb.b as u32
            }
        }
    }

    fn unpack(packed: u32) -> Color {
        match packed >> 24 {
            0 => Color::None,
            1 => Color::Palette(packed as u8),
            _ => Color::Rgb(Rgb::new((packed >> 16) as u8, (packed >> 8) as u8, packed as u8)),
        }
    }
}

/// Underline rendering kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Underline {
    #[default]
    None = 0,
    Single = 1,
    Double = 2,
    Curly = 3,
    Dotted = 4,
    Dashed = 5,
}

impl Underline {
    fn from_bits(bits: u64) -> Underline {
        match bits {
            1 => Underline::Single,
            2 => Underline::Double,
            3 => Underline::Curly,
            4 => Underline::Dotted,
            5 => Underline::Dashed,
            _ => Underline::None,
        }
    }
}

/// A full text style. `Style::default()` is the sentinel "default style"
/// that cells express as style id 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Style {
    pub fg_color: Color,
    pub bg_color: Color,
    pub underline_color: Color,
    pub underline: Underline,
    pub bold: bool,
    pub faint: bool,
    pub italic: bool,
    pub blink: bool,
    pub inverse: bool,
    pub invisible: bool,
    pub strikethrough: bool,
}

impl Style {
    pub fn is_default(&self) -> bool {
        *self == Style::default()
    }

    /// The color an erase under this style should paint, if any. Blank
    /// cells only need to carry a style when it has a background.
    pub fn bg_cell_color(&self) -> Option<Color> {
        match self.bg_color {
            Color::None => None,
            bg => Some(bg),
        }
    }

    /// Pack into the two-word in-page representation. The default style
    /// packs to all-zero words, matching zeroed page memory.
    pub fn pack(&self) -> (u64, u64) {
        let word0 = self.fg_color.pack() as u64 | ((self.bg_color.pack() as u64) << 32);
        let mut flags: u64 = self.underline as u64;
        flags |= (self.bold as u64) << 3;
        flags |= (self.faint as u64) << 4;
        flags |= (self.italic as u64) << 5;
        flags |= (self.blink as u64) << 6;
        flags |= (self.inverse as u64) << 7;
        flags |= (self.invisible as u64) << 8;
        flags |= (self.strikethrough as u64) << 9;
        let word1 = self.underline_color.pack() as u64 | (flags << 32);
        (word0, word1)
    }

    pub fn unpack(word0: u64, word1: u64) -> Style {
        let flags = word1 >> 32;
        Style {
            fg_color: Color::unpack(word0 as u32),
            bg_color: Color::unpack((word0 >> 32) as u32),
            underline_color: Color::unpack(word1 as u32),
            underline: Underline::from_bits(flags & 0b111),
            bold: flags & (1 << 3) != 0,
            faint: flags & (1 << 4) != 0,
            italic: flags & (1 << 5) != 0,
            blink: flags & (1 << 6) != 0,
            inverse: flags & (1 << 7) != 0,
            invisible: flags & (1 << 8) != 0,
            strikethrough: flags & (1 << 9) != 0,
        }
    }
}

// Slot layout: three words per slot.
//   word 0, word 1: packed style value
//   word 2: state (bits 0..2) | ref count (bits 16..32)
const SLOT_WORDS: usize = 3;
const STATE_FREE: u64 = 0;
const STATE_OCCUPIED: u64 = 1;
const STATE_TOMBSTONE: u64 = 2;
const STATE_MASK: u64 = 0b11;
const REF_SHIFT: u64 = 16;
const REF_MASK: u64 = 0xFFFF;

/// Size parameters for a page's style table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyleSetCapacity {
    /// Maximum live entries.
    pub styles: usize,
    /// Slot count; a power of two, at least twice `styles` so probes stay
    /// short.
    pub table_len: usize,
}

impl StyleSetCapacity {
    pub fn new(styles: usize) -> StyleSetCapacity {
        let table_len = (styles * 2).next_power_of_two();
        StyleSetCapacity { styles, table_len }
    }

    /// Bytes of page memory the table occupies: a header word plus slots.
    pub fn size_bytes(&self) -> usize {
        8 * (1 + self.table_len * SLOT_WORDS)
    }
}

/// The open-addressed intern table, addressed through an in-page offset.
///
/// Zeroed memory is a valid empty table (all slots free, count zero), so
/// `init` has nothing to write; it exists to document the contract.
#[derive(Debug, Clone, Copy)]
pub struct StyleSet {
    base: Offset<u64>,
    capacity: StyleSetCapacity,
}

impl StyleSet {
    pub fn new(base: Offset<u64>, capacity: StyleSetCapacity) -> StyleSet {
        StyleSet { base, capacity }
    }

    /// Initialize over a zero-filled buffer section.
    pub fn init(&self, _mem: &mut [u64]) {}

    pub fn capacity(&self) -> StyleSetCapacity {
        self.capacity
    }

    fn header(&self) -> usize {
        self.base.word()
    }

    fn slot_word(&self, slot: usize) -> usize {
        self.base.word() + 1 + slot * SLOT_WORDS
    }

    /// Live entry count.
    pub fn count(&self, mem: &[u64]) -> usize {
        (mem[self.header()] & 0xFFFF) as usize
    }

    fn set_count(&self, mem: &mut [u64], count: usize) {
        mem[self.header()] = (mem[self.header()] & !0xFFFF) | count as u64;
    }

    fn hash(word0: u64, word1: u64) -> u64 {
        // FNV-1a over the 16 packed bytes.
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for word in [word0, word1] {
            for byte in word.to_le_bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
            }
        }
        hash
    }

    /// Insert or find `style`, returning its id. Does not touch the
    /// reference count; callers pair this with [`StyleSet::use_id`] per
    /// cell write. Ids are `slot + 1` and stay stable while the entry
    /// exists; id 0 is reserved for the default style and never stored.
    pub fn upsert(&self, mem: &mut [u64], style: &Style) -> Result<u16> {
        debug_assert!(!style.is_default(), "default style is id 0, never interned");
        let (word0, word1) = style.pack();
        let mask = self.capacity.table_len - 1;
        let mut slot = (Self::hash(word0, word1) as usize) & mask;
        let mut reusable: Option<usize> = None;

        for _ in 0..self.capacity.table_len {
            let meta = mem[self.slot_word(slot) + 2];
            match meta & STATE_MASK {
                STATE_FREE => break,
                STATE_TOMBSTONE => {
                    if reusable.is_none() {
                        reusable = Some(slot);
                    }
                }
                _ => {
                    if mem[self.slot_word(slot)] == word0 && mem[self.slot_word(slot) + 1] == word1 {
                        return Ok((slot + 1) as u16);
                    }
                }
            }
            slot = (slot + 1) & mask;
        }

        if self.count(mem) >= self.capacity.styles {
            return Err(Error::StyleSetFull);
        }

        let target = match reusable {
            Some(t) => t,
            None => {
                // The loop above ended on a free slot; `slot` is it.
                debug_assert_eq!(mem[self.slot_word(slot) + 2] & STATE_MASK, STATE_FREE);
                slot
            }
        };
        let base = self.slot_word(target);
        mem[base] = word0;
        mem[base + 1] = word1;
        mem[base + 2] = STATE_OCCUPIED;
        self.set_count(mem, self.count(mem) + 1);
        Ok((target + 1) as u16)
    }

    /// Find an existing entry without inserting.
    pub fn lookup(&self, mem: &[u64], style: &Style) -> Option<u16> {
        let (word0, word1) = style.pack();
        let mask = self.capacity.table_len - 1;
        let mut slot = (Self::hash(word0, word1) as usize) & mask;
        for _ in 0..self.capacity.table_len {
            let meta = mem[self.slot_word(slot) + 2];
            match meta & STATE_MASK {
                STATE_FREE => return None,
                STATE_OCCUPIED
                    if mem[self.slot_word(slot)] == word0
                        && mem[self.slot_word(slot) + 1] == word1 =>
                {
                    return Some((slot + 1) as u16)
                }
                _ => {}
            }
            slot = (slot + 1) & mask;
        }
        None
    }

    /// O(1) reverse lookup from id to value.
    pub fn lookup_id(&self, mem: &[u64], id: u16) -> Option<Style> {
        if id == 0 || id as usize > self.capacity.table_len {
            return None;
        }
        let base = self.slot_word(id as usize - 1);
        if mem[base + 2] & STATE_MASK != STATE_OCCUPIED {
            return None;
        }
        Some(Style::unpack(mem[base], mem[base + 1]))
    }

    pub fn ref_count(&self, mem: &[u64], id: u16) -> u16 {
        debug_assert!(id != 0);
        let base = self.slot_word(id as usize - 1);
        debug_assert_eq!(mem[base + 2] & STATE_MASK, STATE_OCCUPIED);
        ((mem[base + 2] >> REF_SHIFT) & REF_MASK) as u16
    }

    /// Increment the reference count of a live entry.
    pub fn use_id(&self, mem: &mut [u64], id: u16) {
        debug_assert!(id != 0);
        let base = self.slot_word(id as usize - 1);
        debug_assert_eq!(mem[base + 2] & STATE_MASK, STATE_OCCUPIED);
        let refs = (mem[base + 2] >> REF_SHIFT) & REF_MASK;
        debug_assert!(refs < REF_MASK, "style ref count overflow");
        mem[base + 2] = (mem[base + 2] & !(REF_MASK << REF_SHIFT)) | ((refs + 1) << REF_SHIFT);
    }

    /// Decrement the reference count, returning the new value. A zero
    /// result makes the entry eligible for removal; physical removal is
    /// deferred to the next style transition.
    pub fn release_id(&self, mem: &mut [u64], id: u16) -> u16 {
        debug_assert!(id != 0);
        let base = self.slot_word(id as usize - 1);
        debug_assert_eq!(mem[base + 2] & STATE_MASK, STATE_OCCUPIED);
        let refs = (mem[base + 2] >> REF_SHIFT) & REF_MASK;
        debug_assert!(refs > 0, "style ref count underflow");
        mem[base + 2] = (mem[base + 2] & !(REF_MASK << REF_SHIFT)) | ((refs - 1) << REF_SHIFT);
        (refs - 1) as u16
    }

    /// Remove an entry, freeing its slot (as a tombstone so probe chains
    /// stay intact).
    pub fn remove(&self, mem: &mut [u64], id: u16) {
        debug_assert!(id != 0);
        let base = self.slot_word(id as usize - 1);
        debug_assert_eq!(mem[base + 2] & STATE_MASK, STATE_OCCUPIED);
        mem[base] = 0;
        mem[base + 1] = 0;
        mem[base + 2] = STATE_TOMBSTONE;
        let count = self.count(mem);
        debug_assert!(count > 0);
        self.set_count(mem, count - 1);
    }

    /// Sum of all live reference counts. Test support.
    pub fn total_refs(&self, mem: &[u64]) -> usize {
        let mut total = 0;
        for slot in 0..self.capacity.table_len {
            let meta = mem[self.slot_word(slot) + 2];
            if meta & STATE_MASK == STATE_OCCUPIED {
                total += ((meta >> REF_SHIFT) & REF_MASK) as usize;
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bold() -> Style {
        Style {
            bold: true,
            ..Style::default()
        }
    }

    fn fg(r: u8, g: u8, b: u8) -> Style {
        Style {
            fg_color: Color::Rgb(Rgb::new(r, g, b)),
            ..Style::default()
        }
    }

    fn test_set(styles: usize) -> (StyleSet, Vec<u64>) {
        let capacity = StyleSetCapacity::new(styles);
        let set = StyleSet::new(Offset::new(0), capacity);
        let mem = vec![0u64; capacity.size_bytes() / 8];
        (set, mem)
    }

    #[test]
    fn test_default_style_packs_to_zero() {
        assert_eq!(Style::default().pack(), (0, 0));
        assert!(Style::default().is_default());
        assert_eq!(Style::unpack(0, 0), Style::default());
    }

    #[test]
    fn test_style_pack_roundtrip() {
        let style = Style {
            fg_color: Color::Palette(9),
            bg_color: Color::Rgb(Rgb::new(1, 2, 3)),
            underline_color: Color::Rgb(Rgb::new(250, 251, 252)),
            underline: Underline::Curly,
            bold: true,
            faint: true,
            italic: false,
            blink: true,
            inverse: false,
            invisible: true,
            strikethrough: true,
        };
        let (word0, word1) = style.pack();
        assert_eq!(Style::unpack(word0, word1), style);
    }

    #[test]
    fn test_zeroed_memory_is_empty_table() {
        let (set, mem) = test_set(16);
        assert_eq!(set.count(&mem), 0);
        assert_eq!(set.lookup(&mem, &bold()), None);
        assert_eq!(set.lookup_id(&mem, 1), None);
        assert_eq!(set.lookup_id(&mem, 0), None, "id 0 is never stored");
    }

    #[test]
    fn test_upsert_find_and_reverse_lookup() {
        let (set, mut mem) = test_set(16);
        let id = set.upsert(&mut mem, &bold()).unwrap();
        assert_ne!(id, 0);
        assert_eq!(set.count(&mem), 1);
        // Upserting again finds the same entry.
        assert_eq!(set.upsert(&mut mem, &bold()).unwrap(), id);
        assert_eq!(set.count(&mem), 1);
        assert_eq!(set.lookup(&mem, &bold()), Some(id));
        assert_eq!(set.lookup_id(&mem, id), Some(bold()));
    }

    #[test]
    fn test_ref_counting() {
        let (set, mut mem) = test_set(16);
        let id = set.upsert(&mut mem, &bold()).unwrap();
        assert_eq!(set.ref_count(&mem, id), 0);
        set.use_id(&mut mem, id);
        set.use_id(&mut mem, id);
        assert_eq!(set.ref_count(&mem, id), 2);
        assert_eq!(set.release_id(&mut mem, id), 1);
        assert_eq!(set.release_id(&mut mem, id), 0);
        assert_eq!(set.total_refs(&mem), 0);
    }

    #[test]
    fn test_remove_frees_slot_for_reuse() {
        let (set, mut mem) = test_set(16);
        let id = set.upsert(&mut mem, &bold()).unwrap();
        set.remove(&mut mem, id);
        assert_eq!(set.count(&mem), 0);
        assert_eq!(set.lookup(&mem, &bold()), None);
        assert_eq!(set.lookup_id(&mem, id), None);

        // A later insert may land on the tombstoned slot.
        let id2 = set.upsert(&mut mem, &fg(1, 1, 1)).unwrap();
        assert_ne!(id2, 0);
        assert_eq!(set.count(&mem), 1);
    }

    #[test]
    fn test_many_styles_distinct_ids() {
        let (set, mut mem) = test_set(64);
        let mut ids = std::collections::HashSet::new();
        for i in 0..64u8 {
            let id = set.upsert(&mut mem, &fg(i, 0, 0)).unwrap();
            assert!(ids.insert(id), "id {} reused while live", id);
        }
        assert_eq!(set.count(&mem), 64);
        for i in 0..64u8 {
            let id = set.lookup(&mem, &fg(i, 0, 0)).expect("style present");
            assert_eq!(set.lookup_id(&mem, id), Some(fg(i, 0, 0)));
        }
    }

    #[test]
    fn test_table_full() {
        let (set, mut mem) = test_set(4);
        for i in 0..4u8 {
            set.upsert(&mut mem, &fg(i, 2, 3)).unwrap();
        }
        assert_eq!(set.upsert(&mut mem, &fg(99, 2, 3)), Err(Error::StyleSetFull));
        // Existing entries still resolve after a failed insert.
        assert_eq!(set.count(&mem), 4);
        assert!(set.lookup(&mem, &fg(0, 2, 3)).is_some());
    }

    #[test]
    fn test_id_stable_across_other_removals() {
        let (set, mut mem) = test_set(16);
        let id_a = set.upsert(&mut mem, &fg(1, 0, 0)).unwrap();
        let id_b = set.upsert(&mut mem, &fg(2, 0, 0)).unwrap();
        set.remove(&mut mem, id_a);
        assert_eq!(set.lookup_id(&mem, id_b), Some(fg(2, 0, 0)));
        assert_eq!(set.lookup(&mem, &fg(2, 0, 0)), Some(id_b));
    }
}
