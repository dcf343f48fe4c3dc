//! Intel HEX record encoding and decoding
//!
//! ```text
//!   ,--S=Start
//!   | ,--BB=ByteCount
//!   | |   ,--AAAA=Address
//!   | |   | ,--RR=RecordType
//!   | |   | |   ,--DDDD=Data
//!   | |   | |   | ,--CC=Checksum
//!   | |   | |   | |
//!   SBBAAAARRDDDDCC
//!   :020000027F007D
//!   :00000001FF
//! ```

use std::fmt::Write as _;

use crate::error::FormatReason;

/// Length of a record without data (`:BBAAAARRCC`)
pub const MIN_LINE_LEN: usize = 11;

/// The literal end-of-file record
pub const EOF_LINE: &str = ":00000001FF";

/// Intel HEX record types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// Data bytes at `offset + address`
    Data = 0x00,
    /// End of file
    EndOfFile = 0x01,
    /// Extended segment address: data * 16 becomes the running offset
    ExtSegmentAddr = 0x02,
    /// Start segment address (CS:IP); ignored
    StartSegmentAddr = 0x03,
    /// Extended linear address: data << 16 becomes the running offset
    ExtLinearAddr = 0x04,
    /// Start linear address (EIP); ignored
    StartLinearAddr = 0x05,
}

impl TryFrom<u8> for RecordType {
    type Error = FormatReason;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Self::Data),
            0x01 => Ok(Self::EndOfFile),
            0x02 => Ok(Self::ExtSegmentAddr),
            0x03 => Ok(Self::StartSegmentAddr),
            0x04 => Ok(Self::ExtLinearAddr),
            0x05 => Ok(Self::StartLinearAddr),
            other => Err(FormatReason::UnknownRecordType(other)),
        }
    }
}

/// A single decoded record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexRecord {
    /// 16-bit load address field
    pub address: u16,
    /// Record type
    pub record_type: RecordType,
    /// Payload bytes (`byte_count` is `data.len()`)
    pub data: Vec<u8>,
}

impl HexRecord {
    /// Create a data record
    pub fn data(address: u16, data: &[u8]) -> Self {
        Self {
            address,
            record_type: RecordType::Data,
            data: data.to_vec(),
        }
    }

    /// Create the end-of-file record
    pub fn end_of_file() -> Self {
        Self {
            address: 0,
            record_type: RecordType::EndOfFile,
            data: Vec::new(),
        }
    }

    /// Byte count field
    pub fn byte_count(&self) -> u8 {
        self.data.len() as u8
    }

    /// Checksum over all fields of this record
    pub fn checksum(&self) -> u8 {
        let [hi, lo] = self.address.to_be_bytes();
        checksum(
            [self.byte_count(), hi, lo, self.record_type as u8]
                .iter()
                .chain(self.data.iter())
                .copied(),
        )
    }

    /// Payload interpreted as a big-endian 16-bit value (address records)
    pub fn data_u16(&self) -> Option<u16> {
        match self.data[..] {
            [hi, lo] => Some(u16::from_be_bytes([hi, lo])),
            _ => None,
        }
    }

    /// Decode one line, starting at the `:` start code
    ///
    /// The line must not include the CR/LF terminator.
    pub fn parse(line: &str) -> Result<Self, FormatReason> {
        let Some(digits) = line.strip_prefix(':') else {
            let first = line.chars().next().unwrap_or(' ');
            return Err(FormatReason::InvalidHexDigit(first));
        };
        let len = line.len();
        if len < MIN_LINE_LEN {
            return Err(FormatReason::LineTooShort(len));
        }
        if len % 2 == 0 {
            return Err(FormatReason::EvenLength(len));
        }

        let bytes = decode_hex(digits)?;
        let byte_count = bytes[0];
        let data_chars = len - MIN_LINE_LEN;
        if byte_count as usize * 2 != data_chars {
            return Err(FormatReason::ByteCountMismatch {
                declared: byte_count,
                data_chars,
            });
        }

        let (body, stored) = bytes.split_at(bytes.len() - 1);
        let computed = checksum(body.iter().copied());
        if computed != stored[0] {
            return Err(FormatReason::ChecksumMismatch {
                computed,
                stored: stored[0],
            });
        }

        let record_type = RecordType::try_from(body[3])?;
        let data = body[4..].to_vec();
        let expected_len = match record_type {
            RecordType::ExtSegmentAddr | RecordType::ExtLinearAddr => Some(2),
            RecordType::StartSegmentAddr | RecordType::StartLinearAddr => Some(4),
            _ => None,
        };
        if let Some(expected) = expected_len {
            if data.len() != expected {
                return Err(FormatReason::BadAddressRecord(record_type as u8));
            }
        }

        Ok(Self {
            address: u16::from_be_bytes([body[1], body[2]]),
            record_type,
            data,
        })
    }

    /// Encode as `:BBAAAARR<data>CC` without a line terminator
    pub fn encode(&self) -> String {
        let mut line = String::with_capacity(MIN_LINE_LEN + self.data.len() * 2);
        let _ = write!(
            line,
            ":{:02X}{:04X}{:02X}",
            self.byte_count(),
            self.address,
            self.record_type as u8
        );
        for b in &self.data {
            let _ = write!(line, "{:02X}", b);
        }
        let _ = write!(line, "{:02X}", self.checksum());
        line
    }
}

/// Two's complement of the 8-bit sum of `bytes`
///
/// Adding the result to the sum of all record bytes yields zero mod 256.
pub fn checksum(bytes: impl IntoIterator<Item = u8>) -> u8 {
    let sum = bytes.into_iter().fold(0u8, |acc, b| acc.wrapping_add(b));
    (sum ^ 0xFF).wrapping_add(1)
}

/// Value of one ASCII hex digit
pub fn hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Decode an even-length string of hex digit pairs
fn decode_hex(s: &str) -> Result<Vec<u8>, FormatReason> {
    s.as_bytes()
        .chunks(2)
        .map(|pair| {
            let nibble = |c: u8| hex_digit(c).ok_or(FormatReason::InvalidHexDigit(c as char));
            Ok((nibble(pair[0])? << 4) | nibble(pair[1])?)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_sixteen_bytes() {
        let data: Vec<u8> = (0x00..=0x0F).collect();
        let rec = HexRecord::data(0x0000, &data);
        assert_eq!(rec.encode(), ":10000000000102030405060708090A0B0C0D0E0F78");
    }

    #[test]
    fn test_encode_eof() {
        assert_eq!(HexRecord::end_of_file().encode(), EOF_LINE);
    }

    #[test]
    fn test_checksum_law() {
        let rec = HexRecord::data(0x1234, &[0xDE, 0xAD, 0xBE, 0xEF, 0x01]);
        let [hi, lo] = rec.address.to_be_bytes();
        let sum = [rec.byte_count(), hi, lo, 0x00]
            .iter()
            .chain(rec.data.iter())
            .fold(rec.checksum(), |acc, &b| acc.wrapping_add(b));
        assert_eq!(sum, 0);
    }

    #[test]
    fn test_parse_segment_record() {
        let rec = HexRecord::parse(":020000027F007D").unwrap();
        assert_eq!(rec.record_type, RecordType::ExtSegmentAddr);
        assert_eq!(rec.data_u16(), Some(0x7F00));
    }

    #[test]
    fn test_parse_rejects_bad_checksum() {
        let err = HexRecord::parse(":0400000001020304F1").unwrap_err();
        assert_eq!(
            err,
            FormatReason::ChecksumMismatch {
                computed: 0xF2,
                stored: 0xF1
            }
        );
    }

    #[test]
    fn test_parse_rejects_length_errors() {
        assert_eq!(
            HexRecord::parse(":000001FF").unwrap_err(),
            FormatReason::LineTooShort(9)
        );
        assert_eq!(
            HexRecord::parse(":00000001FF0").unwrap_err(),
            FormatReason::EvenLength(12)
        );
        assert!(matches!(
            HexRecord::parse(":030000000102F9").unwrap_err(),
            FormatReason::ByteCountMismatch { declared: 3, .. }
        ));
    }

    #[test]
    fn test_parse_rejects_bad_digit() {
        assert_eq!(
            HexRecord::parse(":0000000XFF").unwrap_err(),
            FormatReason::InvalidHexDigit('X')
        );
    }
}
