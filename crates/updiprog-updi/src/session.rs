//! UPDI session state machine
//!
//! A session owns the link to one target and walks it through the
//! handshake, key-based unlock and NVM programming mode. Any transport or
//! protocol failure closes the session for good: the wire is in an unknown
//! state and later calls fail with [`Error::SessionClosed`].

use std::fmt;
use std::time::Duration;

use updiprog_core::device::DeviceProfile;
use updiprog_core::error::{Error, Key, ProtocolError, Result, TransportError, WaitTarget};
use updiprog_core::retry::Retry;
use updiprog_core::transport::{validate_baud, LineSettings, Transport, DEFAULT_BAUD};

use crate::link::UpdiLink;
use crate::phy::Phy;
use crate::protocol::*;

/// Link state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Line not yet handshaken
    Cold,
    /// BREAK sent, waiting for a non-zero STATUSA
    SyncPending,
    /// UPDI responds
    Synced,
    /// Chip erase key accepted and the part reports unlocked
    Unlocked,
    /// NVM programming mode active
    ProgMode,
    /// Session released or aborted by a fatal error
    Closed,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Cold => "cold",
            Self::SyncPending => "sync pending",
            Self::Synced => "synced",
            Self::Unlocked => "unlocked",
            Self::ProgMode => "programming mode",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Retry budgets and delays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Read slices allowed for one response
    pub recv: Retry,
    /// Lock status polling after a chip erase
    pub unlock: Retry,
    /// Lock status polling while entering programming mode
    pub progmode: Retry,
    /// NVM controller busy polling
    pub nvm_ready: Retry,
    /// User row programming status polling
    pub userrow: Retry,
    /// Pause after every transmitted byte
    pub byte_delay: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        let poll = Duration::from_millis(100);
        Self {
            recv: Retry::new(30, Duration::ZERO),
            unlock: Retry::new(50, poll),
            progmode: Retry::new(5, poll),
            nvm_ready: Retry::new(100, poll),
            userrow: Retry::new(5, poll),
            byte_delay: Duration::from_micros(100),
        }
    }
}

impl Timings {
    /// Same attempt budgets without any sleeping, for emulated targets
    pub fn immediate() -> Self {
        let d = Self::default();
        let fast = |r: Retry| Retry::new(r.attempts, Duration::ZERO);
        Self {
            recv: fast(d.recv),
            unlock: fast(d.unlock),
            progmode: fast(d.progmode),
            nvm_ready: fast(d.nvm_ready),
            userrow: fast(d.userrow),
            byte_delay: Duration::ZERO,
        }
    }
}

/// Session settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Link baud rate
    pub baud: u32,
    /// Retry budgets
    pub timings: Timings,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            baud: DEFAULT_BAUD,
            timings: Timings::default(),
        }
    }
}

/// A UPDI session with one target
///
/// The session leaves programming mode on drop if it is still in it.
pub struct UpdiSession<T: Transport> {
    link: UpdiLink<T>,
    profile: &'static DeviceProfile,
    timings: Timings,
    state: LinkState,
    chip_erase_ok: bool,
}

impl<T: Transport> UpdiSession<T> {
    /// Create a session over `transport` for the given part
    ///
    /// No traffic happens until [`init`](Self::init).
    pub fn new(transport: T, profile: &'static DeviceProfile, config: SessionConfig) -> Result<Self> {
        let baud = validate_baud(config.baud)?;
        let phy = Phy::new(
            transport,
            LineSettings::updi(baud),
            config.timings.recv,
            config.timings.byte_delay,
        );
        log::debug!("UPDI session for {} at {} baud", profile.part, baud);
        Ok(Self {
            link: UpdiLink::new(phy),
            profile,
            timings: config.timings,
            state: LinkState::Cold,
            chip_erase_ok: false,
        })
    }

    /// Current link state
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Device profile bound to this session
    pub fn profile(&self) -> &'static DeviceProfile {
        self.profile
    }

    /// Whether a full chip erase succeeded in this session
    pub fn chip_erase_ok(&self) -> bool {
        self.chip_erase_ok
    }

    /// The transport this session runs on
    pub fn transport(&self) -> &T {
        self.link.phy().transport()
    }

    /// Mutable access to the transport
    ///
    /// Bytes written here bypass the echo check and can desynchronize
    /// the link.
    pub fn transport_mut(&mut self) -> &mut T {
        self.link.phy_mut().transport_mut()
    }

    pub(crate) fn timings(&self) -> &Timings {
        &self.timings
    }

    pub(crate) fn link(&mut self) -> &mut UpdiLink<T> {
        &mut self.link
    }

    pub(crate) fn set_chip_erase_ok(&mut self) {
        self.chip_erase_ok = true;
    }

    /// Run `f` unless the session is closed, closing it on a fatal error
    pub(crate) fn guarded<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        if self.state == LinkState::Closed {
            return Err(Error::SessionClosed);
        }
        let result = f(self);
        if let Err(e) = &result {
            if e.is_fatal() {
                log::error!("UPDI session aborted: {}", e);
                self.state = LinkState::Closed;
            }
        }
        result
    }

    /// Handshake with the target
    ///
    /// Sends BREAK, enables the inter-byte delay, disables collision
    /// detection and reads STATUSA. A zero status gets one double break and
    /// a second attempt; if that fails too the session is closed.
    pub fn init(&mut self) -> Result<()> {
        self.guarded(|s| {
            s.state = LinkState::SyncPending;
            s.link.phy_mut().open_line()?;
            s.link.phy_mut().send_break()?;

            if handshake(&mut s.link)? {
                log::info!("UPDI init OK");
                s.state = LinkState::Synced;
                return Ok(());
            }

            log::debug!("UPDI not initialized yet");
            s.link.phy_mut().double_break()?;
            if handshake(&mut s.link)? {
                log::info!("UPDI init OK");
                s.state = LinkState::Synced;
                return Ok(());
            }
            Err(ProtocolError::InitFailed.into())
        })
    }

    fn ensure_synced(&mut self) -> Result<()> {
        match self.state {
            LinkState::Cold | LinkState::SyncPending => self.init(),
            LinkState::Closed => Err(Error::SessionClosed),
            _ => Ok(()),
        }
    }

    fn require_key(&mut self, k: Key, bit: KeyStatus) -> Result<()> {
        let status = KeyStatus::from_bits_retain(self.link.ldcs(cs::ASI_KEY_STATUS)?);
        log::debug!("{} key status = 0x{:02X}", k, status.bits());
        if status.contains(bit) {
            Ok(())
        } else {
            Err(ProtocolError::KeyRejected(k).into())
        }
    }

    fn sys_status(&mut self) -> Result<SysStatus> {
        Ok(SysStatus::from_bits_retain(
            self.link.ldcs(cs::ASI_SYS_STATUS)?,
        ))
    }

    /// Poll until LOCKSTATUS clears; `Ok(false)` if it never does
    fn wait_unlocked(&mut self, retry: Retry) -> Result<bool> {
        let unlocked = retry.poll(|_| {
            let status = self.sys_status()?;
            Ok((!status.contains(SysStatus::LOCKSTATUS)).then_some(()))
        })?;
        Ok(unlocked.is_some())
    }

    fn wait_userrow_prog(&mut self, active: bool) -> Result<()> {
        let retry = self.timings.userrow;
        retry.poll_until(WaitTarget::UserRowProg(active), |_| {
            let status = self.sys_status()?;
            Ok((status.contains(SysStatus::UROWPROG) == active).then_some(()))
        })
    }

    /// Read ASI_SYS_STATUS and report whether NVM programming is active
    pub fn in_progmode(&mut self) -> Result<bool> {
        self.guarded(|s| Ok(s.sys_status()?.contains(SysStatus::NVMPROG)))
    }

    /// Erase the whole chip with the chip erase key
    ///
    /// This works on a locked part and clears the lock. On success the
    /// session switches to plain page writes for the rest of its life.
    pub fn unlock_erase(&mut self) -> Result<()> {
        self.ensure_synced()?;
        self.guarded(|s| {
            log::info!("Unlocking and erasing {}", s.profile.part);
            s.link.key(key::CHIP_ERASE)?;
            s.require_key(Key::ChipErase, KeyStatus::CHIPERASE)?;
            s.link.toggle_reset()?;

            let retry = s.timings.unlock;
            if !s.wait_unlocked(retry)? {
                return Err(ProtocolError::Timeout(WaitTarget::Unlock).into());
            }
            s.state = LinkState::Unlocked;
            s.chip_erase_ok = true;
            log::info!("Chip erase done, device unlocked");
            Ok(())
        })
    }

    /// Enter NVM programming mode
    ///
    /// Returns `Ok(false)` if the part refused, which usually means it is
    /// locked and needs [`unlock_erase`](Self::unlock_erase) first. Link
    /// failures are still errors.
    pub fn enter_progmode(&mut self) -> Result<bool> {
        self.ensure_synced()?;
        self.guarded(|s| {
            if s.sys_status()?.contains(SysStatus::NVMPROG) {
                log::debug!("Already in programming mode");
                s.state = LinkState::ProgMode;
                return Ok(true);
            }

            s.link.key(key::NVM_PROG)?;
            let status = KeyStatus::from_bits_retain(s.link.ldcs(cs::ASI_KEY_STATUS)?);
            if !status.contains(KeyStatus::NVMPROG) {
                log::warn!("NVMProg key not accepted (key status 0x{:02X})", status.bits());
                return Ok(false);
            }

            s.link.toggle_reset()?;
            let retry = s.timings.progmode;
            if !s.wait_unlocked(retry)? {
                log::warn!("Failed to enter programming mode: device is locked");
                return Ok(false);
            }
            if !s.sys_status()?.contains(SysStatus::NVMPROG) {
                log::warn!("Failed to enter programming mode");
                return Ok(false);
            }

            s.state = LinkState::ProgMode;
            log::info!("Entered programming mode OK");
            Ok(true)
        })
    }

    /// Leave programming mode and release the line
    ///
    /// Resets the target and then sets UPDIDIS; the next use of the session
    /// starts again from a fresh handshake.
    pub fn leave_progmode(&mut self) -> Result<()> {
        self.guarded(|s| {
            s.link.toggle_reset()?;
            s.link
                .stcs(cs::CTRLB, (CtrlB::UPDIDIS | CtrlB::CCDETDIS).bits())?;
            s.state = LinkState::Cold;
            log::info!("Left programming mode");
            Ok(())
        })
    }

    /// Write the user row
    ///
    /// Uses the user row write key, so this also works on a locked part.
    /// `data` must be exactly one EEPROM page long. The target is reset
    /// afterwards, which ends programming mode.
    pub fn userrow_write(&mut self, data: &[u8]) -> Result<()> {
        let region = self.profile.userrow();
        if data.len() != region.page_size as usize {
            return Err(Error::InvalidArgument(format!(
                "user row data is {} bytes, expected {}",
                data.len(),
                region.page_size
            )));
        }
        self.ensure_synced()?;
        self.guarded(|s| {
            s.link.key(key::USERROW_WRITE)?;
            s.require_key(Key::UserRowWrite, KeyStatus::UROWWRITE)?;
            s.link.toggle_reset()?;
            s.wait_userrow_prog(true)?;

            s.link.write_data(region.start, data)?;
            s.link.stcs(cs::ASI_SYS_CTRLA, SYS_CTRLA_UROWWRITE_FINAL)?;
            s.wait_userrow_prog(false)?;

            s.link
                .stcs(cs::ASI_KEY_STATUS, KeyStatus::UROWWRITE.bits())?;
            s.link.toggle_reset()?;
            if s.state == LinkState::ProgMode {
                s.state = LinkState::Synced;
            }
            log::info!("User row written, {} bytes", data.len());
            Ok(())
        })
    }

    /// Leave programming mode if needed and release the transport
    pub fn close(mut self) -> Result<()> {
        let result = if self.state == LinkState::ProgMode {
            self.leave_progmode()
        } else {
            Ok(())
        };
        self.state = LinkState::Closed;
        result
    }
}

/// Set CTRLB/CTRLA and check STATUSA
///
/// A target that does not answer the STATUSA read is not initialized yet,
/// the same as one that answers zero.
fn handshake<T: Transport>(link: &mut UpdiLink<T>) -> Result<bool> {
    link.stcs(cs::CTRLB, CtrlB::CCDETDIS.bits())?;
    link.stcs(cs::CTRLA, CTRLA_IBDLY)?;
    match link.ldcs(cs::STATUSA) {
        Ok(status) => Ok(status != 0),
        Err(Error::Transport(TransportError::ShortRead { .. })) => {
            log::debug!("No reply to STATUSA read");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

impl<T: Transport> Drop for UpdiSession<T> {
    fn drop(&mut self) {
        if self.state == LinkState::ProgMode {
            if let Err(e) = self.leave_progmode() {
                log::debug!("Failed to leave programming mode on drop: {}", e);
            }
        }
    }
}
