//! Reuse pool for page buffers.
//!
//! Pages come and go with scrollback growth and pruning; their buffers are
//! all the same fixed size, so retired buffers are kept here and handed
//! back out instead of returning memory to the OS. Buffers are re-zeroed
//! on retirement (see `Page::into_buffer`), and issuance verifies that in
//! debug builds so a page can always assume zeroed memory.

use crate::error::{Error, Result};
use crate::offset::PAGE_WORDS;

#[derive(Default)]
pub struct PagePool {
    free: Vec<Box<[u64]>>,
}

impl PagePool {
    /// Issue a zeroed page buffer, reusing a retired one when available.
    pub fn acquire(&mut self) -> Result<Box<[u64]>> {
        if let Some(buf) = self.free.pop() {
            debug_assert!(buf.iter().all(|&w| w == 0), "pooled buffer was not zeroed");
            return Ok(buf);
        }

        let mut buf = Vec::new();
        buf.try_reserve_exact(PAGE_WORDS).map_err(|_| Error::OutOfMemory)?;
        buf.resize(PAGE_WORDS, 0u64);
        Ok(buf.into_boxed_slice())
    }

    /// Take a buffer back for reuse. The caller re-zeroes before release.
    pub fn release(&mut self, buf: Box<[u64]>) {
        debug_assert_eq!(buf.len(), PAGE_WORDS);
        self.free.push(buf);
    }

    pub fn idle_buffers(&self) -> usize {
        self.free.len()
    }
}

impl std::fmt::Debug for PagePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagePool").field("idle", &self.free.len()).finish()
    }
}
