//! Tab stop storage: one flag per column, set every eight columns by
//! default.

const DEFAULT_INTERVAL: usize = 8;

#[derive(Debug, Clone)]
pub struct Tabstops {
    stops: Vec<bool>,
}

impl Tabstops {
    pub fn new(cols: usize) -> Tabstops {
        let mut tabstops = Tabstops {
            stops: vec![false; cols],
        };
        tabstops.reset(cols);
        tabstops
    }

    /// Restore the default stops for a column count.
    pub fn reset(&mut self, cols: usize) {
        self.stops.clear();
        self.stops.resize(cols, false);
        let mut col = DEFAULT_INTERVAL;
        while col < cols {
            self.stops[col] = true;
            col += DEFAULT_INTERVAL;
        }
    }

    pub fn is_set(&self, col: usize) -> bool {
        self.stops.get(col).copied().unwrap_or(false)
    }

    pub fn set(&mut self, col: usize) {
        if col < self.stops.len() {
            self.stops[col] = true;
        }
    }

    pub fn unset(&mut self, col: usize) {
        if col < self.stops.len() {
            self.stops[col] = false;
        }
    }

    pub fn unset_all(&mut self) {
        self.stops.fill(false);
    }

    /// The next stop strictly right of `col`.
    pub fn next_after(&self, col: usize) -> Option<usize> {
        (col + 1..self.stops.len()).find(|&c| self.stops[c])
    }

    /// The closest stop strictly left of `col`.
    pub fn prev_before(&self, col: usize) -> Option<usize> {
        (0..col.min(self.stops.len())).rev().find(|&c| self.stops[c])
    }

    /// Adjust to a new width. Existing stops are kept; columns gained get
    /// the default interval stops.
    pub fn resize(&mut self, cols: usize) {
        let old = self.stops.len();
        self.stops.resize(cols, false);
        if cols > old {
            let mut col = (old / DEFAULT_INTERVAL + 1) * DEFAULT_INTERVAL;
            while col < cols {
                self.stops[col] = true;
                col += DEFAULT_INTERVAL;
            }
        }
    }
}
