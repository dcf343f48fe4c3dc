//! Intel HEX codec
//!
//! Text records are decoded into a flat [`MemoryImage`](crate::image::MemoryImage)
//! indexed by absolute address, and serialized back as 16-byte data lines.
//! The [`tools`] module builds the standalone file utilities on top of it.

pub mod reader;
pub mod record;
pub mod tools;
pub mod writer;

pub use reader::{parse_into, parse_str, read_file, ParsedHex};
pub use record::{checksum, HexRecord, RecordType};
pub use writer::{serialize, write_file};

/// Smallest accepted hex file (one EOF record)
pub const MIN_FILE_SIZE: usize = 11;

/// Largest file the codec will read
pub const MAX_FILE_SIZE: usize = 1024 * 1024;

/// Data bytes per emitted line
pub const LINE_DATA_LEN: usize = 16;
