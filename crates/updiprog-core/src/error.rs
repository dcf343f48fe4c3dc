//! Error types for updiprog-core
//!
//! One taxonomy is shared by the codec, the transport and the protocol
//! engine so that a CLI or library caller can match on the failure class
//! without knowing which layer raised it.

use std::fmt;

use thiserror::Error;

use crate::image::AddressRange;

/// Why a hex file line was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatReason {
    /// File size outside the accepted bounds
    #[error("file size {size} is not valid (min {min}, max {max})")]
    FileSize {
        /// Actual file size in bytes
        size: usize,
        /// Smallest accepted size
        min: usize,
        /// Largest accepted size
        max: usize,
    },
    /// No `:` start code found before the end of the file
    #[error("unexpected end of file (no end-of-file record)")]
    UnexpectedEof,
    /// Line shorter than the 11 characters of an empty record
    #[error("line length {0} is too short")]
    LineTooShort(usize),
    /// Line length is even (valid records are always odd)
    #[error("line length {0} is even, should be odd")]
    EvenLength(usize),
    /// A character that is not a hex digit
    #[error("invalid hex digit {0:?}")]
    InvalidHexDigit(char),
    /// `byte_count * 2` does not match the number of data characters
    #[error("byte count {declared} * 2 does not match {data_chars} data characters")]
    ByteCountMismatch {
        /// Declared byte count
        declared: u8,
        /// Number of data characters on the line
        data_chars: usize,
    },
    /// Stored checksum does not match the computed one
    #[error("computed checksum 0x{computed:02X} does not match 0x{stored:02X}")]
    ChecksumMismatch {
        /// Checksum computed from the record contents
        computed: u8,
        /// Checksum stored on the line
        stored: u8,
    },
    /// Record type outside 0x00..=0x05
    #[error("unknown record type 0x{0:02X}")]
    UnknownRecordType(u8),
    /// Address record with the wrong payload length
    #[error("address record 0x{0:02X} has the wrong byte count")]
    BadAddressRecord(u8),
    /// Data record would write past the destination buffer
    #[error("{len} bytes at 0x{address:06X} overrun the {capacity} byte buffer")]
    BufferOverrun {
        /// Absolute address of the record
        address: u32,
        /// Record length
        len: usize,
        /// Destination buffer size
        capacity: usize,
    },
    /// Lone hex nibble in a text dump
    #[error("hex nibbles are not supported (offset {offset})")]
    LoneNibble {
        /// Byte offset (1-based) in the input text
        offset: usize,
    },
    /// Hex file contains no data records
    #[error("no data found in hex file")]
    NoData,
    /// Extracted data exceeds the 64 KiB image limit
    #[error("{0} bytes exceed the 64 KiB image limit")]
    TooMuchData(usize),
}

/// Link-level failures
#[derive(Debug, Error)]
pub enum TransportError {
    /// The serial device could not be opened or configured
    #[error("failed to open {port}: {message}")]
    Open {
        /// Port name
        port: String,
        /// Underlying error message
        message: String,
    },

    /// Echoed byte differs from the byte sent
    #[error("echo mismatch: sent 0x{sent:02X}, echoed 0x{echoed:02X}")]
    EchoMismatch {
        /// Byte written to the line
        sent: u8,
        /// Byte read back
        echoed: u8,
    },

    /// Fewer bytes were accepted by the port than requested
    #[error("short write: {written} of {expected} bytes")]
    ShortWrite {
        /// Requested length
        expected: usize,
        /// Bytes actually written
        written: usize,
    },

    /// Fewer bytes arrived than requested after all retries
    #[error("short read: received {received} of {expected} bytes")]
    ShortRead {
        /// Requested length
        expected: usize,
        /// Bytes actually received
        received: usize,
    },

    /// Other serial port error
    #[error("serial port error: {0}")]
    Serial(String),
}

/// Authentication keys understood by the UPDI ASI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Chip erase key (`NVMErase`)
    ChipErase,
    /// NVM programming key (`NVMProg `)
    NvmProg,
    /// User row write key (`NVMUs&te`)
    UserRowWrite,
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChipErase => write!(f, "chip erase"),
            Self::NvmProg => write!(f, "NVM programming"),
            Self::UserRowWrite => write!(f, "user row write"),
        }
    }
}

/// Condition a bounded poll was waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitTarget {
    /// LOCKSTATUS cleared
    Unlock,
    /// NVM controller not busy
    NvmReady,
    /// UROWPROG bit reached the wanted state
    UserRowProg(bool),
}

impl fmt::Display for WaitTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlock => write!(f, "device unlock"),
            Self::NvmReady => write!(f, "NVM controller ready"),
            Self::UserRowProg(true) => write!(f, "user row programming start"),
            Self::UserRowProg(false) => write!(f, "user row programming end"),
        }
    }
}

/// UPDI protocol failures
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// ACK byte missing or wrong after a store phase
    #[error("missing ACK after {context}: got {received:?}")]
    MissingAck {
        /// Which phase expected the ACK
        context: &'static str,
        /// What was read instead (None when nothing arrived)
        received: Option<u8>,
    },

    /// Key written but not reflected in ASI_KEY_STATUS
    #[error("{0} key not accepted")]
    KeyRejected(Key),

    /// STATUSA still reads zero after the double-break recovery
    #[error("UPDI unable to init")]
    InitFailed,

    /// A bounded poll ran out of attempts
    #[error("timed out waiting for {0}")]
    Timeout(WaitTarget),

    /// NVM controller reported a write error
    #[error("NVM controller reported a write error")]
    NvmWriteError,

    /// Repeat count above the 256 unit limit
    #[error("repeat count {0} exceeds 256")]
    RepeatTooLarge(usize),
}

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed Intel HEX or text input
    #[error("line {line}: {reason}")]
    Format {
        /// 1-based line number (0 when not line oriented)
        line: usize,
        /// What was wrong
        reason: FormatReason,
    },

    /// Two merged hex files cover intersecting address ranges
    #[error("hex files overlap: {first} and {second}")]
    Overlap {
        /// Range of the first file
        first: AddressRange,
        /// Range of the second file
        second: AddressRange,
    },

    /// Link-level failure (fatal for the session)
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Protocol failure (fatal for the session)
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Read-back did not match the written data
    #[error(
        "verify failed on page {page} (address 0x{address:04X}): expected 0x{expected:02X}, found 0x{found:02X}"
    )]
    Verify {
        /// 0-based page index
        page: usize,
        /// Address of the first differing byte
        address: u32,
        /// Byte that was written
        expected: u8,
        /// Byte read back
        found: u8,
    },

    /// Fuse read-back after a write did not match
    #[error("fuse {fuse} write failed: wrote 0x{written:02X}, read back 0x{read:02X}")]
    FuseVerify {
        /// Fuse index
        fuse: u8,
        /// Value requested
        written: u8,
        /// Value read back
        read: u8,
    },

    /// Operation requires NVM programming mode
    #[error("not in NVM programming mode")]
    NotInProgMode,

    /// Session was poisoned by an earlier fatal error or already closed
    #[error("UPDI session is closed")]
    SessionClosed,

    /// Caller passed an unusable argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// File system error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a format error on a given line
    pub fn format(line: usize, reason: FormatReason) -> Self {
        Self::Format { line, reason }
    }

    /// Whether this error must end the UPDI session
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Protocol(_) | Self::SessionClosed
        )
    }
}

/// Result type alias using the core Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error_message() {
        let err = Error::format(
            3,
            FormatReason::ChecksumMismatch {
                computed: 0xE2,
                stored: 0xE3,
            },
        );
        assert_eq!(
            err.to_string(),
            "line 3: computed checksum 0xE2 does not match 0xE3"
        );
        assert_eq!(
            FormatReason::InvalidHexDigit('g').to_string(),
            "invalid hex digit 'g'"
        );
    }

    #[test]
    fn test_fatal_classes() {
        assert!(Error::from(ProtocolError::InitFailed).is_fatal());
        assert!(Error::SessionClosed.is_fatal());
        assert!(!Error::format(1, FormatReason::NoData).is_fatal());
        assert!(!Error::NotInProgMode.is_fatal());
    }
}
