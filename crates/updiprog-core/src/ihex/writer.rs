//! Intel HEX serialization

use std::path::Path;

use log::{debug, info};

use super::record::{HexRecord, RecordType, EOF_LINE};
use super::LINE_DATA_LEN;
use crate::error::Result;
use crate::image::ERASED_VALUE;

/// Serialize `data` as Intel HEX text, addressed from zero
///
/// Each 16-byte chunk has its trailing 0xFF bytes dropped and the remainder
/// rounded up to whole words; chunks that are entirely 0xFF produce no line.
/// The end-of-file record is always emitted. Lines end in CRLF.
pub fn serialize(data: &[u8]) -> String {
    let mut out = String::new();
    let mut upper: u32 = 0;
    let mut written = 0usize;

    for (index, chunk) in data.chunks(LINE_DATA_LEN).enumerate() {
        let len = line_len(chunk);
        if len == 0 {
            continue;
        }

        let address = (index * LINE_DATA_LEN) as u32;
        if address >> 16 != upper {
            upper = address >> 16;
            let ela = HexRecord {
                address: 0,
                record_type: RecordType::ExtLinearAddr,
                data: (upper as u16).to_be_bytes().to_vec(),
            };
            out.push_str(&ela.encode());
            out.push_str("\r\n");
        }

        out.push_str(&HexRecord::data(address as u16, &chunk[..len]).encode());
        out.push_str("\r\n");
        written += len;
    }

    out.push_str(EOF_LINE);
    out.push_str("\r\n");
    debug!("serialized {} data bytes", written);
    out
}

/// Serialize `data` and write it to `path`
pub fn write_file(path: impl AsRef<Path>, data: &[u8]) -> Result<()> {
    let path = path.as_ref();
    std::fs::write(path, serialize(data))?;
    info!("wrote {}", path.display());
    Ok(())
}

/// Number of bytes of `chunk` worth emitting
fn line_len(chunk: &[u8]) -> usize {
    let Some(last) = chunk.iter().rposition(|&b| b != ERASED_VALUE) else {
        return 0;
    };
    let len = last + 1;
    // Round up to a whole word, but never past the end of the input
    if len % 2 == 1 && len < chunk.len() {
        len + 1
    } else {
        len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ihex::reader::parse_str;

    #[test]
    fn test_serialize_single_line() {
        let data: Vec<u8> = (0x00..=0x0F).collect();
        assert_eq!(
            serialize(&data),
            ":10000000000102030405060708090A0B0C0D0E0F78\r\n:00000001FF\r\n"
        );
    }

    #[test]
    fn test_serialize_empty_is_eof_only() {
        assert_eq!(serialize(&[]), ":00000001FF\r\n");
        assert_eq!(serialize(&[0xFF; 64]), ":00000001FF\r\n");
    }

    #[test]
    fn test_trailing_ff_trimmed_to_word() {
        let mut data = [0xFFu8; 16];
        data[0] = 0x12;
        data[1] = 0x34;
        data[2] = 0x56;
        let text = serialize(&data);
        let first = text.lines().next().unwrap();
        // three data bytes round up to four
        assert_eq!(first, ":04000000123456FF61");
    }

    #[test]
    fn test_odd_tail_not_extended() {
        let data = [0x01, 0x02, 0x03];
        let text = serialize(&data);
        assert!(text.starts_with(":03000000010203"));
    }

    #[test]
    fn test_skips_empty_chunks_keeps_addresses() {
        let mut data = vec![0xFFu8; 48];
        data[0x20] = 0xAA;
        data[0x21] = 0xBB;
        let text = serialize(&data);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with(":02002000AABB"));
    }

    #[test]
    fn test_round_trip_drops_only_trailing_erased() {
        let mut data: Vec<u8> = (0..200u32).map(|i| (i * 7) as u8).collect();
        data[100..116].fill(0xFF);
        data.extend_from_slice(&[0xFF; 20]);
        let text = serialize(&data);
        let parsed = parse_str(&text, data.len()).unwrap();
        assert_eq!(parsed.image.as_bytes(), &data[..]);
        assert_eq!(parsed.total_bytes, 188);
    }

    #[test]
    fn test_large_image_uses_linear_address() {
        let mut data = vec![0xFFu8; 0x1_0010];
        data[0x1_0000] = 0x42;
        data[0x1_0001] = 0x43;
        let text = serialize(&data);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], ":020000040001F9");
        assert_eq!(lines[1], ":02000000424379");
        let parsed = parse_str(&text, data.len()).unwrap();
        assert_eq!(parsed.image.as_bytes()[0x1_0000], 0x42);
    }
}
