//! Intel HEX parsing

use std::path::Path;

use log::{debug, info};

use super::record::{HexRecord, RecordType};
use super::{MAX_FILE_SIZE, MIN_FILE_SIZE};
use crate::error::{Error, FormatReason, Result};
use crate::image::{AddressRange, MemoryImage};

/// Result of parsing a hex file into a fresh image
#[derive(Debug, Clone)]
pub struct ParsedHex {
    /// Image holding the decoded data, 0xFF elsewhere
    pub image: MemoryImage,
    /// Word-aligned span of all data records (None if there were none)
    pub range: Option<AddressRange>,
    /// Number of data bytes decoded
    pub total_bytes: usize,
}

impl ParsedHex {
    /// Data span, or a format error when the file held no data records
    pub fn require_range(&self) -> Result<AddressRange> {
        self.range
            .ok_or_else(|| Error::format(0, FormatReason::NoData))
    }
}

/// Parse hex text into a new erased image of `capacity` bytes
pub fn parse_str(text: &str, capacity: usize) -> Result<ParsedHex> {
    let mut image = MemoryImage::new(capacity);
    let (range, total_bytes) = decode(text, &mut image)?;
    Ok(ParsedHex {
        image,
        range,
        total_bytes,
    })
}

/// Parse hex text on top of an existing image
///
/// Bytes not covered by data records keep their current value. Returns the
/// word-aligned span of the records that were decoded.
pub fn parse_into(text: &str, image: &mut MemoryImage) -> Result<Option<AddressRange>> {
    decode(text, image).map(|(range, _)| range)
}

/// Read and parse a hex file from disk
pub fn read_file(path: impl AsRef<Path>, capacity: usize) -> Result<ParsedHex> {
    let text = load(path.as_ref())?;
    parse_str(&text, capacity)
}

/// Load a hex file from disk and apply the size bounds
pub(crate) fn load(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    if !(MIN_FILE_SIZE..=MAX_FILE_SIZE).contains(&bytes.len()) {
        return Err(Error::format(
            0,
            FormatReason::FileSize {
                size: bytes.len(),
                min: MIN_FILE_SIZE,
                max: MAX_FILE_SIZE,
            },
        ));
    }
    debug!("opened {} ({} bytes)", path.display(), bytes.len());
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn decode(text: &str, image: &mut MemoryImage) -> Result<(Option<AddressRange>, usize)> {
    let capacity = image.len();
    let mut offset: u32 = 0;
    let mut span: Option<AddressRange> = None;
    let mut total_bytes = 0usize;
    let mut rest = text;
    let mut line = 1usize;

    loop {
        // Skip anything before the next start code
        let Some(start) = rest.find(':') else {
            line += rest.matches('\n').count();
            return Err(Error::format(line, FormatReason::UnexpectedEof));
        };
        line += rest[..start].matches('\n').count();
        rest = &rest[start..];
        let end = rest.find(['\r', '\n']).unwrap_or(rest.len());
        let record = HexRecord::parse(&rest[..end]).map_err(|reason| Error::format(line, reason))?;
        rest = &rest[end..];

        match record.record_type {
            RecordType::Data => {
                let address = offset.wrapping_add(record.address as u32);
                let len = record.data.len();
                if !image.write(address as usize, &record.data) {
                    return Err(Error::format(
                        line,
                        FormatReason::BufferOverrun {
                            address,
                            len,
                            capacity,
                        },
                    ));
                }
                if len > 0 {
                    let last = address + len as u32 - 1;
                    span = Some(match span {
                        Some(r) => AddressRange::new(r.low.min(address), r.high.max(last)),
                        None => AddressRange::new(address, last),
                    });
                    total_bytes += len;
                }
            }
            RecordType::EndOfFile => break,
            RecordType::ExtSegmentAddr => {
                offset = record.data_u16().map_or(0, |d| (d as u32) * 16);
            }
            RecordType::ExtLinearAddr => {
                offset = record.data_u16().map_or(0, |d| (d as u32) << 16);
            }
            RecordType::StartSegmentAddr | RecordType::StartLinearAddr => {
                debug!("ignoring start address record {:02X?}", record.data);
            }
        }
    }

    info!("read {} bytes", total_bytes);
    Ok((span.map(|r| r.word_aligned()), total_bytes))
}
