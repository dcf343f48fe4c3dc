//! Device type definitions

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Memory technology of an NVM region
///
/// Flash is accessed in words, EEPROM and the user row in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryKind {
    /// Program flash (word access)
    Flash,
    /// Data EEPROM (byte access)
    Eeprom,
    /// User signature row (byte access, EEPROM page sized)
    UserRow,
}

impl MemoryKind {
    /// Whether REPEAT and burst accesses use 16-bit units
    pub const fn is_word_mode(&self) -> bool {
        matches!(self, Self::Flash)
    }

    /// Human-readable name
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Flash => "flash",
            Self::Eeprom => "eeprom",
            Self::UserRow => "userrow",
        }
    }
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A paged non-volatile memory region in the UPDI data space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NvmRegion {
    /// Memory technology
    pub kind: MemoryKind,
    /// First address in the data space
    pub start: u16,
    /// Region size in bytes
    pub size: u32,
    /// Page size in bytes
    pub page_size: u16,
}

impl NvmRegion {
    /// Create a new region
    pub const fn new(kind: MemoryKind, start: u16, size: u32, page_size: u16) -> Self {
        Self {
            kind,
            start,
            size,
            page_size,
        }
    }

    /// Number of pages, at least one
    pub const fn page_count(&self) -> usize {
        let count = self.size as usize / self.page_size as usize;
        if count == 0 {
            1
        } else {
            count
        }
    }

    /// Number of 16-bit words in one page
    pub const fn words_per_page(&self) -> usize {
        self.page_size as usize / 2
    }

    /// Transfer units per page (words for flash, bytes otherwise)
    pub const fn units_per_page(&self) -> usize {
        if self.kind.is_word_mode() {
            self.words_per_page()
        } else {
            self.page_size as usize
        }
    }

    /// Data-space address of page `index`
    pub const fn page_address(&self, index: usize) -> u16 {
        self.start
            .wrapping_add((index * self.page_size as usize) as u16)
    }

    /// Bytes covered by all pages
    pub const fn span(&self) -> usize {
        self.page_count() * self.page_size as usize
    }
}

/// Supported part codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartCode {
    /// tinyAVR 2 KiB flash
    T2k,
    /// tinyAVR 4 KiB flash
    T4k,
    /// tinyAVR 8 KiB flash
    T8k,
    /// tinyAVR 16 KiB flash
    T16k,
    /// tinyAVR 32 KiB flash
    T32k,
    /// megaAVR 32 KiB flash
    M32k,
    /// megaAVR 48 KiB flash
    M48k,
}

impl PartCode {
    /// All part codes, smallest first
    pub const ALL: [PartCode; 7] = [
        Self::T2k,
        Self::T4k,
        Self::T8k,
        Self::T16k,
        Self::T32k,
        Self::M32k,
        Self::M48k,
    ];

    /// Command-line name of the part
    pub const fn name(&self) -> &'static str {
        match self {
            Self::T2k => "t2k",
            Self::T4k => "t4k",
            Self::T8k => "t8k",
            Self::T16k => "t16k",
            Self::T32k => "t32k",
            Self::M32k => "m32k",
            Self::M48k => "m48k",
        }
    }
}

impl fmt::Display for PartCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PartCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidArgument(format!("unknown part '{}'", s)))
    }
}

/// Immutable memory map of one device family member
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceProfile {
    /// Part code
    pub part: PartCode,
    /// Devices covered by this entry
    pub description: &'static str,
    /// Program flash
    pub flash: NvmRegion,
    /// Data EEPROM
    pub eeprom: NvmRegion,
    /// System configuration block (revision ID at +1)
    pub syscfg_address: u16,
    /// NVM controller register block
    pub nvmctrl_address: u16,
    /// Signature row (device ID, serial number)
    pub sigrow_address: u16,
    /// Fuse bytes
    pub fuses_address: u16,
    /// User row
    pub userrow_address: u16,
}

impl DeviceProfile {
    /// The user row, one EEPROM page long
    pub const fn userrow(&self) -> NvmRegion {
        NvmRegion::new(
            MemoryKind::UserRow,
            self.userrow_address,
            self.eeprom.page_size as u32,
            self.eeprom.page_size,
        )
    }

    /// Region for a memory kind
    pub const fn region(&self, kind: MemoryKind) -> NvmRegion {
        match kind {
            MemoryKind::Flash => self.flash,
            MemoryKind::Eeprom => self.eeprom,
            MemoryKind::UserRow => self.userrow(),
        }
    }
}
