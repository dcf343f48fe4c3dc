//! Raw byte transport abstraction
//!
//! The UPDI engine only needs a half-duplex byte pipe whose line settings
//! can be changed on the fly. Real hardware is a serial port; tests plug in
//! an in-memory target emulator.

use crate::error::{Error, Result};

/// Baud rates accepted for the UPDI link
pub const BAUD_RATES: [u32; 18] = [
    50, 75, 110, 134, 150, 200, 300, 600, 1200, 1800, 2400, 4800, 9600, 19200, 38400, 57600,
    115200, 230400,
];

/// Default UPDI baud rate
pub const DEFAULT_BAUD: u32 = 115200;

/// Baud rate used for the double-break recovery
pub const DOUBLE_BREAK_BAUD: u32 = 300;

/// Parity setting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    /// No parity bit
    None,
    /// Even parity
    Even,
}

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    /// One stop bit
    One,
    /// Two stop bits
    Two,
}

/// Line framing for an 8-data-bit link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSettings {
    /// Baud rate
    pub baud: u32,
    /// Parity
    pub parity: Parity,
    /// Stop bits
    pub stop_bits: StopBits,
}

impl LineSettings {
    /// Normal UPDI framing: 8 data bits, even parity, 2 stop bits
    pub const fn updi(baud: u32) -> Self {
        Self {
            baud,
            parity: Parity::Even,
            stop_bits: StopBits::Two,
        }
    }

    /// Slow framing used to send the double break
    pub const fn double_break() -> Self {
        Self {
            baud: DOUBLE_BREAK_BAUD,
            parity: Parity::Even,
            stop_bits: StopBits::One,
        }
    }
}

/// Check a baud rate against [`BAUD_RATES`]
pub fn validate_baud(baud: u32) -> Result<u32> {
    if BAUD_RATES.contains(&baud) {
        Ok(baud)
    } else {
        Err(Error::InvalidArgument(format!(
            "baud rate {} is not supported",
            baud
        )))
    }
}

/// Transport trait for a half-duplex byte link
pub trait Transport {
    /// Write bytes, returning how many were accepted
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Read up to `buf.len()` bytes
    ///
    /// Waits at most one short timeout slice. Returns the number of bytes
    /// read, or 0 if nothing arrived in time.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Change baud rate and framing
    fn configure(&mut self, settings: &LineSettings) -> Result<()>;

    /// Discard pending input and output
    fn clear(&mut self) -> Result<()>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        (**self).write(data)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn configure(&mut self, settings: &LineSettings) -> Result<()> {
        (**self).configure(settings)
    }

    fn clear(&mut self) -> Result<()> {
        (**self).clear()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        (**self).write(data)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn configure(&mut self, settings: &LineSettings) -> Result<()> {
        (**self).configure(settings)
    }

    fn clear(&mut self) -> Result<()> {
        (**self).clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_baud() {
        assert_eq!(validate_baud(115200).unwrap(), 115200);
        assert_eq!(validate_baud(300).unwrap(), 300);
        assert!(validate_baud(250000).is_err());
        assert!(validate_baud(0).is_err());
    }

    #[test]
    fn test_line_settings() {
        let s = LineSettings::updi(57600);
        assert_eq!(s.stop_bits, StopBits::Two);
        assert_eq!(s.parity, Parity::Even);
        assert_eq!(LineSettings::double_break().stop_bits, StopBits::One);
    }
}
