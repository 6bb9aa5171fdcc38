//! Table of contents: a bounded page index used to accelerate seeking
//!
//! One entry is recorded per page during a one-time linear scan; the
//! table is then decimated to a fixed memory budget, keeping the first
//! and last entries and approximately uniform coverage in between.

/// Memory budget for the table of contents, in bytes of entries
pub const MAX_TOC_BYTES: usize = 8192;

/// One table-of-contents entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TocEntry {
    /// Byte offset of the page
    pub page_offset: u64,
    /// Presentation time of the page's granule position
    pub time_us: i64,
}

/// Page index ordered by increasing offset
#[derive(Debug, Default)]
pub struct Toc {
    entries: Vec<TocEntry>,
}

impl Toc {
    /// Create an empty table
    pub fn new() -> Self {
        Toc {
            entries: Vec::new(),
        }
    }

    /// Maximum entry count permitted by the memory budget
    pub fn max_entries() -> usize {
        MAX_TOC_BYTES / std::mem::size_of::<TocEntry>()
    }

    /// Append an entry; offsets must be pushed in increasing order
    pub fn push(&mut self, entry: TocEntry) {
        debug_assert!(self
            .entries
            .last()
            .map_or(true, |last| entry.page_offset > last.page_offset));
        self.entries.push(entry);
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in offset order
    pub fn entries(&self) -> &[TocEntry] {
        &self.entries
    }

    /// Decimate the table so it holds at most `max_entries` entries.
    ///
    /// Walks the interior entries from the end with an accumulator,
    /// dropping one entry each time it wraps; the first and last
    /// entries are never dropped. The retained set is approximately
    /// uniformly spaced.
    pub fn thin(&mut self, max_entries: usize) {
        let total = self.entries.len();
        if max_entries < 2 || total <= max_entries {
            return;
        }
        let excess = total - max_entries;
        let interior = total - 2;
        let mut accum = 0usize;
        for i in (1..total - 1).rev() {
            accum += excess;
            if accum >= interior {
                self.entries.remove(i);
                accum -= interior;
            }
        }
    }

    /// Find the entry to seek to for `time_us`: the first entry with
    /// `time_us >=` the target, clamped to the last entry.
    pub fn entry_for_time(&self, time_us: i64) -> Option<&TocEntry> {
        if self.entries.is_empty() {
            return None;
        }
        let idx = self.entries.partition_point(|e| e.time_us < time_us);
        Some(&self.entries[idx.min(self.entries.len() - 1)])
    }
}
