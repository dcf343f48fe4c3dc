//! Page progress reporting

use crate::device::MemoryKind;

/// Page-level NVM operation being reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NvmOperation {
    /// Reading pages back from the target
    Read,
    /// Programming pages
    Write,
    /// Comparing target pages with the source image
    Verify,
}

impl NvmOperation {
    /// Short verb for display
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Read => "Reading",
            Self::Write => "Writing",
            Self::Verify => "Verifying",
        }
    }
}

/// Progress callbacks for page-oriented NVM operations
///
/// Write and verify only touch pages holding data, so `begin` reports how
/// many of those there are and `page` says whether the current one counted.
/// A reporter can then advance only on real work.
pub trait PageProgress {
    /// Called before the first page
    fn begin(&mut self, op: NvmOperation, kind: MemoryKind, total_pages: usize, data_pages: usize);

    /// Called after each page, with its 0-based index
    fn page(&mut self, index: usize, has_data: bool);

    /// Called when the operation is done
    fn finish(&mut self);
}

/// A no-op progress reporter
pub struct NoProgress;

impl PageProgress for NoProgress {
    fn begin(&mut self, _op: NvmOperation, _kind: MemoryKind, _total: usize, _data: usize) {}
    fn page(&mut self, _index: usize, _has_data: bool) {}
    fn finish(&mut self) {}
}
