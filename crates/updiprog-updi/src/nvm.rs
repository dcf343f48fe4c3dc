//! NVM programming
//!
//! Page-oriented read, write and verify of flash and EEPROM, fuse access
//! and NVM controller commands. Everything here needs the session to be in
//! programming mode; [`UpdiSession::nvm`] hands out an [`Nvm`] handle only
//! in that state.
//!
//! Write and verify skip pages that are entirely 0xFF. Flash pages move as
//! 16-bit words, EEPROM and user row pages as bytes.

use updiprog_core::device::NvmRegion;
use updiprog_core::error::{Error, ProtocolError, Result, WaitTarget};
use updiprog_core::image::{has_page_data, pages_with_data, ERASED_VALUE};
use updiprog_core::progress::{NvmOperation, PageProgress};
use updiprog_core::transport::Transport;

use crate::protocol::nvmctrl::{self, Command, Status};
use crate::session::{LinkState, UpdiSession};

/// Outcome of a fuse write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuseWrite {
    /// The fuse already held the value; nothing was written
    Unchanged,
    /// The fuse was programmed and read back
    Written {
        /// Value before the write
        old: u8,
    },
}

impl<T: Transport> UpdiSession<T> {
    /// NVM access, available only in programming mode
    pub fn nvm(&mut self) -> Result<Nvm<'_, T>> {
        match self.state() {
            LinkState::ProgMode => Ok(Nvm { session: self }),
            LinkState::Closed => Err(Error::SessionClosed),
            _ => Err(Error::NotInProgMode),
        }
    }
}

/// NVM programmer borrowed from a session in programming mode
pub struct Nvm<'s, T: Transport> {
    session: &'s mut UpdiSession<T>,
}

impl<T: Transport> Nvm<'_, T> {
    /// Wait until the NVM controller is idle
    ///
    /// A set WRITE_ERROR bit fails immediately.
    pub fn wait_ready(&mut self) -> Result<()> {
        self.session.guarded(wait_ready)
    }

    /// Issue an NVM controller command
    pub fn execute(&mut self, cmd: Command) -> Result<()> {
        self.session.guarded(|s| execute(s, cmd))
    }

    /// Erase flash and EEPROM through the NVM controller
    ///
    /// Unlike the key-based erase this needs an unlocked part, but it also
    /// enables plain page writes for the rest of the session.
    pub fn chip_erase(&mut self) -> Result<()> {
        self.session.guarded(|s| {
            log::info!("Chip erase via NVM controller");
            wait_ready(s)?;
            execute(s, Command::ChipErase)?;
            wait_ready(s)?;
            s.set_chip_erase_ok();
            Ok(())
        })
    }

    /// Read every page of `region`
    pub fn read<P: PageProgress>(&mut self, region: &NvmRegion, progress: &mut P) -> Result<Vec<u8>> {
        self.session.guarded(|s| {
            let pages = region.page_count();
            let page_size = region.page_size as usize;
            let mut out = vec![ERASED_VALUE; region.span()];

            log::info!("Reading {} ({} pages)", region.kind, pages);
            progress.begin(NvmOperation::Read, region.kind, pages, pages);
            for (i, page) in out.chunks_mut(page_size).enumerate() {
                read_page(s, region, i, page)?;
                progress.page(i, true);
            }
            progress.finish();

            log::info!(
                "{} read done, {} of {} pages had data",
                region.kind,
                pages_with_data(&out, page_size),
                pages
            );
            Ok(out)
        })
    }

    /// Program the pages of `region` that hold data
    ///
    /// `data` is region relative and may be shorter than the region; the
    /// rest counts as erased. A session that ran a chip erase commits with
    /// WRITE_PAGE, otherwise each page is erased and written in one go.
    /// Returns the number of pages written.
    pub fn write<P: PageProgress>(
        &mut self,
        region: &NvmRegion,
        data: &[u8],
        progress: &mut P,
    ) -> Result<usize> {
        check_len(region, data)?;
        self.session.guarded(|s| {
            let page_size = region.page_size as usize;
            let pages = region.page_count();
            let with_data = pages_with_data(data, page_size);

            let commit = if s.chip_erase_ok() {
                log::info!("Chip already erased, skipping page erase cycles");
                Command::WritePage
            } else {
                log::info!("Chip not erased, erasing pages before writing");
                Command::EraseWritePage
            };

            progress.begin(NvmOperation::Write, region.kind, pages, with_data);
            let mut written = 0;
            if with_data > 0 {
                for (i, page) in data.chunks(page_size).enumerate() {
                    let has_data = has_page_data(page);
                    if has_data {
                        wait_ready(s)?;
                        execute(s, Command::PageBufferClear)?;
                        wait_ready(s)?;
                        write_page(s, region, i, page)?;
                        execute(s, commit)?;
                        written += 1;
                    }
                    progress.page(i, has_data);
                }
                wait_ready(s)?;
            }
            progress.finish();

            log::info!(
                "{} write done, {} of {} pages had data",
                region.kind,
                written,
                pages
            );
            Ok(written)
        })
    }

    /// Compare the pages of `region` that hold data against `data`
    ///
    /// Stops at the first mismatching page. Returns the number of pages
    /// checked.
    pub fn verify<P: PageProgress>(
        &mut self,
        region: &NvmRegion,
        data: &[u8],
        progress: &mut P,
    ) -> Result<usize> {
        check_len(region, data)?;
        self.session.guarded(|s| {
            let page_size = region.page_size as usize;
            let pages = region.page_count();
            let with_data = pages_with_data(data, page_size);
            let mut buf = vec![0u8; page_size];
            let mut checked = 0;

            progress.begin(NvmOperation::Verify, region.kind, pages, with_data);
            for (i, expected) in data.chunks(page_size).enumerate() {
                let has_data = has_page_data(expected);
                if has_data {
                    let found = &mut buf[..expected.len()];
                    read_page(s, region, i, found)?;
                    checked += 1;
                    if let Some(pos) = expected.iter().zip(found.iter()).position(|(a, b)| a != b) {
                        progress.finish();
                        return Err(Error::Verify {
                            page: i,
                            address: region.page_address(i) as u32 + pos as u32,
                            expected: expected[pos],
                            found: found[pos],
                        });
                    }
                }
                progress.page(i, has_data);
            }
            progress.finish();

            log::info!(
                "{} verify done, {} of {} pages had data to verify",
                region.kind,
                checked,
                pages
            );
            Ok(checked)
        })
    }

    /// Read fuse `n`
    pub fn fuse_read(&mut self, n: u8) -> Result<u8> {
        self.session.guarded(|s| {
            let fuse = s.profile().fuses_address + n as u16;
            let value = s.link().ld(fuse)?;
            log::debug!("Fuse {:02} = 0x{:02X}", n, value);
            Ok(value)
        })
    }

    /// Program fuse `n` and read it back
    ///
    /// Nothing is written if the fuse already holds `value`.
    pub fn fuse_write(&mut self, n: u8, value: u8) -> Result<FuseWrite> {
        self.session.guarded(|s| {
            let fuse = s.profile().fuses_address + n as u16;
            let nvm = s.profile().nvmctrl_address;

            wait_ready(s)?;
            let old = s.link().ld(fuse)?;
            if old == value {
                log::info!("Fuse {:02} is already 0x{:02X}", n, value);
                return Ok(FuseWrite::Unchanged);
            }

            let [lo, hi] = fuse.to_le_bytes();
            let link = s.link();
            link.write_data(nvm + nvmctrl::ADDRL, &[lo])?;
            link.write_data(nvm + nvmctrl::ADDRH, &[hi])?;
            link.write_data(nvm + nvmctrl::DATAL, &[value])?;
            link.write_data(nvm + nvmctrl::CTRLA, &[Command::WriteFuse as u8])?;

            let read = link.ld(fuse)?;
            if read != value {
                return Err(Error::FuseVerify {
                    fuse: n,
                    written: value,
                    read,
                });
            }
            log::info!(
                "Fuse {:02} written: 0x{:02X} -> 0x{:02X}",
                n,
                old,
                value
            );
            Ok(FuseWrite::Written { old })
        })
    }

    /// Read the user row
    pub fn userrow_read(&mut self) -> Result<Vec<u8>> {
        self.session.guarded(|s| {
            let region = s.profile().userrow();
            let mut buf = vec![0u8; region.page_size as usize];
            s.link().read_data(region.start, &mut buf)?;
            Ok(buf)
        })
    }
}

fn check_len(region: &NvmRegion, data: &[u8]) -> Result<()> {
    if data.len() > region.span() {
        return Err(Error::InvalidArgument(format!(
            "{} bytes do not fit the {} byte {} region",
            data.len(),
            region.span(),
            region.kind
        )));
    }
    Ok(())
}

fn wait_ready<T: Transport>(s: &mut UpdiSession<T>) -> Result<()> {
    let status = s.profile().nvmctrl_address + nvmctrl::STATUS;
    let retry = s.timings().nvm_ready;
    retry.poll_until(WaitTarget::NvmReady, |_| {
        let value = Status::from_bits_retain(s.link().ld(status)?);
        if value.contains(Status::WRITE_ERROR) {
            return Err(ProtocolError::NvmWriteError.into());
        }
        Ok((!value.intersects(Status::FLASH_BUSY | Status::EEPROM_BUSY)).then_some(()))
    })
}

fn execute<T: Transport>(s: &mut UpdiSession<T>, cmd: Command) -> Result<()> {
    log::debug!("NVM command {:?}", cmd);
    let ctrla = s.profile().nvmctrl_address + nvmctrl::CTRLA;
    s.link().st(ctrla, cmd as u8)
}

fn read_page<T: Transport>(
    s: &mut UpdiSession<T>,
    region: &NvmRegion,
    index: usize,
    buf: &mut [u8],
) -> Result<()> {
    let address = region.page_address(index);
    if region.kind.is_word_mode() {
        s.link().read_data_words(address, buf)
    } else {
        s.link().read_data(address, buf)
    }
}

fn write_page<T: Transport>(
    s: &mut UpdiSession<T>,
    region: &NvmRegion,
    index: usize,
    data: &[u8],
) -> Result<()> {
    let address = region.page_address(index);
    if region.kind.is_word_mode() {
        s.link().write_data_words(address, data)
    } else {
        s.link().write_data(address, data)
    }
}
