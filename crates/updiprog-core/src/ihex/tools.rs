//! Standalone hex file utilities: merge, txt2hex, hex2c, hex2bin

use std::fmt::Write as _;
use std::path::Path;

use log::info;

use super::reader::{load, parse_into, parse_str, ParsedHex};
use super::record::hex_digit;
use super::writer::write_file;
use super::MAX_FILE_SIZE;
use crate::error::{Error, FormatReason, Result};
use crate::image::{AddressRange, MemoryImage, MAX_IMAGE_SIZE};

/// Values per line in [`hex2c`] output
pub const C_ARRAY_WIDTH: usize = 16;

/// Load two hex texts into one shared 64 KiB image at their native addresses
///
/// Fails with [`Error::Overlap`] if the word-aligned data spans of the two
/// inputs intersect, and with a format error if either one holds no data.
pub fn merge(first: &str, second: &str) -> Result<MemoryImage> {
    let mut image = MemoryImage::new(MAX_IMAGE_SIZE);
    let a = parse_into(first, &mut image)?.ok_or_else(no_data)?;
    let b = parse_into(second, &mut image)?.ok_or_else(no_data)?;
    if a.overlaps(&b) {
        return Err(Error::Overlap {
            first: a,
            second: b,
        });
    }
    info!("merged {} and {}", a, b);
    Ok(image)
}

/// Merge two hex files into `out`
pub fn merge_files(
    first: impl AsRef<Path>,
    second: impl AsRef<Path>,
    out: impl AsRef<Path>,
) -> Result<()> {
    let image = merge(&load(first.as_ref())?, &load(second.as_ref())?)?;
    write_file(out, image.as_bytes())
}

/// Extract hex byte pairs from free-form text such as `"00, FF, AB"` or
/// `"0x00,0xFF,0xAB"`
///
/// Non-hex characters are separators. A `0x` prefix is skipped. A single
/// hex digit not followed by a second one is an error.
pub fn txt2hex(text: &str) -> Result<Vec<u8>> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let Some(hi) = hex_digit(bytes[i]) else {
            i += 1;
            continue;
        };
        let next = bytes.get(i + 1).copied();
        if bytes[i] == b'0' && matches!(next, Some(b'x' | b'X')) {
            i += 2;
            continue;
        }
        match next.and_then(hex_digit) {
            Some(lo) => out.push((hi << 4) | lo),
            None => {
                return Err(Error::format(0, FormatReason::LoneNibble { offset: i + 1 }));
            }
        }
        i += 2;
    }

    info!("extracted {} hex bytes from text", out.len());
    if out.len() > MAX_IMAGE_SIZE {
        return Err(Error::format(0, FormatReason::TooMuchData(out.len())));
    }
    Ok(out)
}

/// Convert a text dump at `input` into a hex file at `out`
pub fn txt2hex_file(input: impl AsRef<Path>, out: impl AsRef<Path>) -> Result<()> {
    let bytes = std::fs::read(input.as_ref())?;
    if bytes.is_empty() || bytes.len() > MAX_FILE_SIZE {
        return Err(Error::format(
            0,
            FormatReason::FileSize {
                size: bytes.len(),
                min: 1,
                max: MAX_FILE_SIZE,
            },
        ));
    }
    let data = txt2hex(&String::from_utf8_lossy(&bytes))?;
    write_file(out, &data)
}

/// Render the data window of a parsed hex file as a C array
///
/// The window is word aligned: the start is even and the end is odd.
pub fn hex2c(parsed: &ParsedHex) -> Result<String> {
    let range = parsed.require_range()?;
    let window = window(parsed, range)?;

    let mut out = String::new();
    let _ = write!(out, "#define FIRM_ADR_START {}\r\n", range.low);
    let _ = write!(out, "#define FIRM_ADR_END   {}\r\n", range.high);
    let _ = write!(out, "#define FIRM_LEN       {}\r\n", range.len());
    out.push_str("static const uint8_t g_HexVariable[] PROGMEM = { \r\n");
    let last = window.len() - 1;
    for (i, b) in window.iter().enumerate() {
        let _ = write!(out, "0x{:02X}", b);
        if i != last {
            out.push(',');
            if (i + 1) % C_ARRAY_WIDTH == 0 {
                out.push_str("\r\n");
            }
        }
    }
    out.push_str("\r\n};\r\n");
    Ok(out)
}

/// Raw bytes of the word-aligned data window of a parsed hex file
pub fn hex2bin(parsed: &ParsedHex) -> Result<Vec<u8>> {
    let range = parsed.require_range()?;
    Ok(window(parsed, range)?.to_vec())
}

/// Convert the hex file at `input` into a C header at `out`
pub fn hex2c_file(input: impl AsRef<Path>, out: impl AsRef<Path>) -> Result<()> {
    let parsed = parse_str(&load(input.as_ref())?, MAX_IMAGE_SIZE)?;
    let text = hex2c(&parsed)?;
    std::fs::write(out.as_ref(), text)?;
    info!(
        "wrote {} bytes to C variable file {}",
        parsed.require_range()?.len(),
        out.as_ref().display()
    );
    Ok(())
}

/// Convert the hex file at `input` into a raw binary at `out`
pub fn hex2bin_file(input: impl AsRef<Path>, out: impl AsRef<Path>) -> Result<()> {
    let parsed = parse_str(&load(input.as_ref())?, MAX_IMAGE_SIZE)?;
    let bin = hex2bin(&parsed)?;
    std::fs::write(out.as_ref(), &bin)?;
    info!(
        "wrote {} bytes to raw binary {}",
        bin.len(),
        out.as_ref().display()
    );
    Ok(())
}

fn window(parsed: &ParsedHex, range: AddressRange) -> Result<&[u8]> {
    let bytes = parsed.image.as_bytes();
    let (low, high) = (range.low as usize, range.high as usize);
    // An odd-length image can push the aligned end one past the buffer
    let high = high.min(bytes.len().saturating_sub(1));
    bytes.get(low..=high).ok_or_else(|| {
        Error::format(
            0,
            FormatReason::BufferOverrun {
                address: range.low,
                len: range.len() as usize,
                capacity: bytes.len(),
            },
        )
    })
}

fn no_data() -> Error {
    Error::format(0, FormatReason::NoData)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOOT: &str = ":0400000001020304F2\r\n:00000001FF\r\n";
    const APP: &str = ":04010000AABBCCDDED\r\n:00000001FF\r\n";

    #[test]
    fn test_merge_disjoint() {
        let image = merge(BOOT, APP).unwrap();
        assert_eq!(&image.as_bytes()[..4], &[1, 2, 3, 4]);
        assert_eq!(&image.as_bytes()[0x100..0x104], &[0xAA, 0xBB, 0xCC, 0xDD]);
        assert_eq!(image.len(), MAX_IMAGE_SIZE);
    }

    #[test]
    fn test_merge_detects_overlap_between_distinct_files() {
        // second file starts inside the first one's range
        let second = ":040002001122334450\r\n:00000001FF\r\n";
        let err = merge(BOOT, second).unwrap_err();
        match err {
            Error::Overlap { first, second } => {
                assert_eq!(first, AddressRange::new(0, 3));
                assert_eq!(second, AddressRange::new(2, 5));
            }
            other => panic!("unexpected error: {other}"),
        }
        // and the other way round
        assert!(matches!(merge(second, BOOT), Err(Error::Overlap { .. })));
    }

    #[test]
    fn test_merge_rejects_empty_file() {
        let empty = ":00000001FF\r\n";
        assert!(matches!(
            merge(BOOT, empty),
            Err(Error::Format {
                reason: FormatReason::NoData,
                ..
            })
        ));
    }

    #[test]
    fn test_txt2hex_forms() {
        assert_eq!(txt2hex("00, FF, ab").unwrap(), vec![0x00, 0xFF, 0xAB]);
        assert_eq!(txt2hex("0x00,0xFF,0XAB\n").unwrap(), vec![0x00, 0xFF, 0xAB]);
        assert_eq!(txt2hex("{ 0x12 0x34 }").unwrap(), vec![0x12, 0x34]);
    }

    #[test]
    fn test_txt2hex_lone_nibble() {
        let err = txt2hex("12, 3, 45").unwrap_err();
        assert!(matches!(
            err,
            Error::Format {
                reason: FormatReason::LoneNibble { offset: 5 },
                ..
            }
        ));
    }

    #[test]
    fn test_hex2c_layout() {
        let text = ":03000100AABBCCCB\r\n:00000001FF\r\n";
        let parsed = parse_str(text, MAX_IMAGE_SIZE).unwrap();
        let c = hex2c(&parsed).unwrap();
        assert_eq!(
            c,
            "#define FIRM_ADR_START 0\r\n\
             #define FIRM_ADR_END   3\r\n\
             #define FIRM_LEN       4\r\n\
             static const uint8_t g_HexVariable[] PROGMEM = { \r\n\
             0xFF,0xAA,0xBB,0xCC\r\n};\r\n"
        );
    }

    #[test]
    fn test_hex2c_wraps_lines() {
        let data: Vec<u8> = (0..18).collect();
        let parsed = parse_str(&crate::ihex::serialize(&data), MAX_IMAGE_SIZE).unwrap();
        let c = hex2c(&parsed).unwrap();
        let body: Vec<&str> = c.split("\r\n").skip(4).collect();
        assert_eq!(body[0].matches("0x").count(), 16);
        assert!(body[0].ends_with(','));
        assert_eq!(body[1], "0x10,0x11");
        assert_eq!(body[2], "};");
    }

    #[test]
    fn test_hex2bin_window() {
        let parsed = parse_str(APP, MAX_IMAGE_SIZE).unwrap();
        assert_eq!(hex2bin(&parsed).unwrap(), vec![0xAA, 0xBB, 0xCC, 0xDD]);
    }

    #[test]
    fn test_hex2bin_no_data() {
        let parsed = parse_str(":00000001FF\r\n", MAX_IMAGE_SIZE).unwrap();
        assert!(hex2bin(&parsed).is_err());
    }

    #[test]
    fn test_merge_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("boot.hex");
        let b = dir.path().join("app.hex");
        let out = dir.path().join("merged.hex");
        std::fs::write(&a, BOOT).unwrap();
        std::fs::write(&b, APP).unwrap();
        merge_files(&a, &b, &out).unwrap();
        let text = std::fs::read_to_string(&out).unwrap();
        assert_eq!(
            text,
            ":0400000001020304F2\r\n:04010000AABBCCDDED\r\n:00000001FF\r\n"
        );
    }
}
