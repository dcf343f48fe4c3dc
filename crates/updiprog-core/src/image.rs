//! Flat memory images and page helpers
//!
//! A [`MemoryImage`] is a plain byte buffer indexed by address. Bytes that
//! were never written hold [`ERASED_VALUE`]; "all 0xFF" is treated as "no
//! data" by both the hex codec and the NVM programmer.

use std::fmt;

/// The erased value for flash memory (all bits set)
pub const ERASED_VALUE: u8 = 0xFF;

/// Largest device-side image (16-bit UPDI data space)
pub const MAX_IMAGE_SIZE: usize = 0x1_0000;

/// Inclusive address range `[low, high]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRange {
    /// First address
    pub low: u32,
    /// Last address (inclusive)
    pub high: u32,
}

impl AddressRange {
    /// Create a new range
    pub const fn new(low: u32, high: u32) -> Self {
        Self { low, high }
    }

    /// Number of bytes covered
    pub const fn len(&self) -> u32 {
        self.high - self.low + 1
    }

    /// A range always covers at least one byte
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Check whether an address falls inside the range
    pub const fn contains(&self, addr: u32) -> bool {
        addr >= self.low && addr <= self.high
    }

    /// Check whether two ranges share at least one address
    ///
    /// Any of the four boundary containments counts as an overlap.
    pub const fn overlaps(&self, other: &AddressRange) -> bool {
        self.contains(other.low)
            || self.contains(other.high)
            || other.contains(self.low)
            || other.contains(self.high)
    }

    /// Widen the range to whole AVR words: low even, high odd
    pub const fn word_aligned(&self) -> Self {
        Self {
            low: self.low & !1,
            high: self.high | 1,
        }
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}-0x{:04X}", self.low, self.high)
    }
}

/// A byte buffer filled with erased bytes and addressed from zero
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryImage {
    data: Vec<u8>,
}

impl MemoryImage {
    /// Create an erased image of `size` bytes
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![ERASED_VALUE; size],
        }
    }

    /// Wrap existing bytes
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Image size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the image has zero capacity
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether any byte differs from the erased value
    pub fn has_data(&self) -> bool {
        has_page_data(&self.data)
    }

    /// Range spanned by the first and last non-erased byte
    pub fn data_range(&self) -> Option<AddressRange> {
        let low = self.data.iter().position(|&b| b != ERASED_VALUE)?;
        let high = self.data.iter().rposition(|&b| b != ERASED_VALUE)?;
        Some(AddressRange::new(low as u32, high as u32))
    }

    /// Copy `bytes` into the image at `addr`
    ///
    /// Returns `false` if the write would run past the end.
    pub fn write(&mut self, addr: usize, bytes: &[u8]) -> bool {
        match addr.checked_add(bytes.len()) {
            Some(end) if end <= self.data.len() => {
                self.data[addr..end].copy_from_slice(bytes);
                true
            }
            _ => false,
        }
    }

    /// Borrow the raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Borrow the raw bytes mutably
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Consume the image and return the bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

impl AsRef<[u8]> for MemoryImage {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

/// A page "has data" iff any byte differs from 0xFF
pub fn has_page_data(page: &[u8]) -> bool {
    page.iter().any(|&b| b != ERASED_VALUE)
}

/// Number of `page_size` pages in `buf` that contain data
pub fn pages_with_data(buf: &[u8], page_size: usize) -> usize {
    buf.chunks(page_size).filter(|p| has_page_data(p)).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_page_data() {
        let mut page = [0xFFu8; 64];
        assert!(!has_page_data(&page));
        page[17] = 0xFE;
        assert!(has_page_data(&page));
    }

    #[test]
    fn test_pages_with_data() {
        let mut buf = vec![0xFFu8; 64 * 10];
        buf[3 * 64 + 5] = 0x00;
        buf[9 * 64] = 0x12;
        assert_eq!(pages_with_data(&buf, 64), 2);
    }

    #[test]
    fn test_overlap_combinations() {
        let a = AddressRange::new(0x100, 0x1FF);
        // second range contains first's low
        assert!(a.overlaps(&AddressRange::new(0x000, 0x100)));
        // second range contains first's high
        assert!(a.overlaps(&AddressRange::new(0x1FF, 0x300)));
        // first contains second entirely
        assert!(a.overlaps(&AddressRange::new(0x140, 0x150)));
        // second contains first entirely
        assert!(a.overlaps(&AddressRange::new(0x000, 0x400)));
        // disjoint on either side
        assert!(!a.overlaps(&AddressRange::new(0x000, 0x0FF)));
        assert!(!a.overlaps(&AddressRange::new(0x200, 0x2FF)));
    }

    #[test]
    fn test_word_aligned() {
        let r = AddressRange::new(0x101, 0x1FE).word_aligned();
        assert_eq!(r, AddressRange::new(0x100, 0x1FF));
        let r = AddressRange::new(0x100, 0x1FF).word_aligned();
        assert_eq!(r, AddressRange::new(0x100, 0x1FF));
    }

    #[test]
    fn test_image_write_bounds() {
        let mut img = MemoryImage::new(16);
        assert!(img.write(12, &[1, 2, 3, 4]));
        assert!(!img.write(13, &[1, 2, 3, 4]));
        assert_eq!(img.data_range(), Some(AddressRange::new(12, 15)));
    }
}
