//! UPDI instruction frames
//!
//! Each method builds one instruction, sends it through the [`Phy`] and
//! collects the response or the ACKs the instruction requires. The
//! `read_data*`/`write_data*` helpers combine pointer, REPEAT and burst
//! instructions into block transfers.

use updiprog_core::error::{Error, ProtocolError, Result, TransportError};
use updiprog_core::transport::Transport;

use crate::phy::Phy;
use crate::protocol::*;

/// UPDI link layer
pub struct UpdiLink<T: Transport> {
    phy: Phy<T>,
}

impl<T: Transport> UpdiLink<T> {
    /// Create a link on top of a PHY
    pub fn new(phy: Phy<T>) -> Self {
        Self { phy }
    }

    /// The PHY
    pub fn phy(&self) -> &Phy<T> {
        &self.phy
    }

    /// Access the PHY
    pub fn phy_mut(&mut self) -> &mut Phy<T> {
        &mut self.phy
    }

    /// Release the PHY
    pub fn into_phy(self) -> Phy<T> {
        self.phy
    }

    fn recv_byte(&mut self) -> Result<u8> {
        let mut b = [0u8; 1];
        self.phy.recv(&mut b)?;
        Ok(b[0])
    }

    fn recv_ack(&mut self, context: &'static str) -> Result<()> {
        let mut b = [0u8; 1];
        match self.phy.recv(&mut b) {
            Ok(()) if b[0] == ACK => Ok(()),
            Ok(()) => Err(ProtocolError::MissingAck {
                context,
                received: Some(b[0]),
            }
            .into()),
            Err(Error::Transport(TransportError::ShortRead { .. })) => {
                Err(ProtocolError::MissingAck {
                    context,
                    received: None,
                }
                .into())
            }
            Err(e) => Err(e),
        }
    }

    /// Store a control/status register
    pub fn stcs(&mut self, reg: u8, value: u8) -> Result<()> {
        log::debug!("STCS 0x{:02X} to 0x{:02X}", value, reg);
        self.phy.send(&[SYNC, opcode::STCS | (reg & 0x0F), value])
    }

    /// Load a control/status register
    pub fn ldcs(&mut self, reg: u8) -> Result<u8> {
        self.phy.send(&[SYNC, opcode::LDCS | (reg & 0x0F)])?;
        let value = self.recv_byte()?;
        log::debug!("LDCS 0x{:02X} = 0x{:02X}", reg, value);
        Ok(value)
    }

    /// Load one byte from a 16-bit address
    pub fn ld(&mut self, address: u16) -> Result<u8> {
        let [lo, hi] = address.to_le_bytes();
        self.phy.send(&[
            SYNC,
            opcode::LDS | size::ADDRESS_16 | size::DATA_8,
            lo,
            hi,
        ])?;
        let value = self.recv_byte()?;
        log::debug!("LD 0x{:04X} = 0x{:02X}", address, value);
        Ok(value)
    }

    /// Store one byte to a 16-bit address
    pub fn st(&mut self, address: u16, value: u8) -> Result<()> {
        log::debug!("ST 0x{:02X} to 0x{:04X}", value, address);
        let [lo, hi] = address.to_le_bytes();
        self.phy.send(&[
            SYNC,
            opcode::STS | size::ADDRESS_16 | size::DATA_8,
            lo,
            hi,
        ])?;
        self.recv_ack("ST address")?;
        self.phy.send(&[value])?;
        self.recv_ack("ST data")
    }

    /// Store one little-endian word to a 16-bit address
    pub fn st16(&mut self, address: u16, value: u16) -> Result<()> {
        log::debug!("ST16 0x{:04X} to 0x{:04X}", value, address);
        let [lo, hi] = address.to_le_bytes();
        self.phy.send(&[
            SYNC,
            opcode::STS | size::ADDRESS_16 | size::DATA_16,
            lo,
            hi,
        ])?;
        self.recv_ack("ST16 address")?;
        self.phy.send(&value.to_le_bytes())?;
        self.recv_ack("ST16 data")
    }

    /// Set the pointer register
    pub fn st_ptr(&mut self, address: u16) -> Result<()> {
        log::debug!("ST ptr 0x{:04X}", address);
        let [lo, hi] = address.to_le_bytes();
        self.phy
            .send(&[SYNC, opcode::ST | ptr::ADDRESS | size::DATA_16, lo, hi])?;
        self.recv_ack("ST ptr")
    }

    /// Set the repeat counter for the next instruction
    pub fn repeat(&mut self, count: usize) -> Result<()> {
        if count == 0 || count > MAX_REPEAT {
            return Err(ProtocolError::RepeatTooLarge(count).into());
        }
        log::debug!("REPEAT {}", count);
        self.phy
            .send(&[SYNC, opcode::REPEAT, (count - 1) as u8])
    }

    /// Load bytes from `*ptr++`
    pub fn ld_ptr_inc(&mut self, buf: &mut [u8]) -> Result<()> {
        log::debug!("LD8 {} bytes from ptr++", buf.len());
        self.phy
            .send(&[SYNC, opcode::LD | ptr::INC | size::DATA_8])?;
        self.phy.recv(buf)
    }

    /// Load words from `*ptr++`; `buf` holds two bytes per word
    pub fn ld_ptr_inc16(&mut self, buf: &mut [u8]) -> Result<()> {
        log::debug!("LD16 {} words from ptr++", buf.len() / 2);
        self.phy
            .send(&[SYNC, opcode::LD | ptr::INC | size::DATA_16])?;
        self.phy.recv(buf)
    }

    /// Store bytes to `*ptr++`, one ACK per byte
    pub fn st_ptr_inc(&mut self, data: &[u8]) -> Result<()> {
        let Some((&first, rest)) = data.split_first() else {
            return Ok(());
        };
        log::debug!("ST8 {} bytes to ptr++", data.len());
        self.phy
            .send(&[SYNC, opcode::ST | ptr::INC | size::DATA_8, first])?;
        self.recv_ack("ST8 ptr++")?;
        for &b in rest {
            self.phy.send(&[b])?;
            self.recv_ack("ST8 ptr++")?;
        }
        Ok(())
    }

    /// Store words to `*ptr++`, one ACK per word
    ///
    /// `data` is sent as little-endian words; an odd trailing byte is
    /// padded with 0xFF.
    pub fn st_ptr_inc16(&mut self, data: &[u8]) -> Result<()> {
        let mut words = data.chunks(2).map(|w| [w[0], *w.get(1).unwrap_or(&0xFF)]);
        let Some([lo, hi]) = words.next() else {
            return Ok(());
        };
        log::debug!("ST16 {} words to ptr++", data.len().div_ceil(2));
        self.phy
            .send(&[SYNC, opcode::ST | ptr::INC | size::DATA_16, lo, hi])?;
        self.recv_ack("ST16 ptr++")?;
        for word in words {
            self.phy.send(&word)?;
            self.recv_ack("ST16 ptr++")?;
        }
        Ok(())
    }

    /// Read the system information block
    pub fn sib(&mut self) -> Result<[u8; SIB_LEN]> {
        self.phy
            .send(&[SYNC, opcode::KEY | key::SIB | key::SIB_16BYTES])?;
        let mut sib = [0u8; SIB_LEN];
        self.phy.recv(&mut sib)?;
        Ok(sib)
    }

    /// Send a 64-bit key, last character first
    pub fn key(&mut self, k: &[u8; 8]) -> Result<()> {
        log::debug!("KEY {}", String::from_utf8_lossy(k));
        self.phy.send(&[SYNC, opcode::KEY | key::KEY_64])?;
        let mut reversed = *k;
        reversed.reverse();
        self.phy.send(&reversed)
    }

    /// Apply or release the UPDI reset request
    pub fn reset(&mut self, apply: bool) -> Result<()> {
        let value = if apply { RESET_REQ_VALUE } else { 0x00 };
        self.stcs(cs::ASI_RESET_REQ, value)
    }

    /// Assert and then release reset
    pub fn toggle_reset(&mut self) -> Result<()> {
        self.reset(true)?;
        self.reset(false)
    }

    /// Read `buf.len()` bytes starting at `address`
    pub fn read_data(&mut self, address: u16, buf: &mut [u8]) -> Result<()> {
        self.st_ptr(address)?;
        if buf.len() > 1 {
            self.repeat(buf.len())?;
        }
        self.ld_ptr_inc(buf)
    }

    /// Read `buf.len() / 2` words starting at `address`
    pub fn read_data_words(&mut self, address: u16, buf: &mut [u8]) -> Result<()> {
        let words = buf.len() / 2;
        self.st_ptr(address)?;
        if words > 1 {
            self.repeat(words)?;
        }
        self.ld_ptr_inc16(buf)
    }

    /// Write bytes starting at `address`
    ///
    /// One or two bytes go out as direct stores, anything longer as a
    /// pointer burst.
    pub fn write_data(&mut self, address: u16, data: &[u8]) -> Result<()> {
        match data {
            [] => Ok(()),
            [b] => self.st(address, *b),
            [a, b] => {
                self.st(address, *a)?;
                self.st(address.wrapping_add(1), *b)
            }
            _ => {
                self.st_ptr(address)?;
                self.repeat(data.len())?;
                self.st_ptr_inc(data)
            }
        }
    }

    /// Write words starting at `address`; `data` holds two bytes per word
    pub fn write_data_words(&mut self, address: u16, data: &[u8]) -> Result<()> {
        if data.len() == 2 {
            return self.st16(address, u16::from_le_bytes([data[0], data[1]]));
        }
        let words = data.len().div_ceil(2);
        self.st_ptr(address)?;
        if words > 1 {
            self.repeat(words)?;
        }
        self.st_ptr_inc16(data)
    }
}
