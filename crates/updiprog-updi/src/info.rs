//! Device information readout

use std::fmt;

use updiprog_core::error::Result;
use updiprog_core::transport::Transport;

use crate::protocol::{cs, SIB_LEN};
use crate::session::{LinkState, UpdiSession};

/// Signature row bytes shown by [`DeviceInfo`]
pub const SIGROW_LEN: usize = 0x26;

/// Fuse names by index
pub const FUSE_NAMES: [&str; 11] = [
    "WDTCFG", "BODCFG", "OSCCFG", "Reserved", "TCD0CFG", "SYSCFG0", "SYSCFG1", "APPEND",
    "BOOTEND", "Reserved", "LOCKBIT",
];

/// Parsed system information block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sib {
    /// Raw 16 bytes
    pub raw: [u8; SIB_LEN],
}

impl Sib {
    fn text(&self, range: std::ops::Range<usize>) -> String {
        String::from_utf8_lossy(&self.raw[range]).into_owned()
    }

    /// Family ID, e.g. `tinyAVR`
    pub fn family(&self) -> String {
        self.text(0..7)
    }

    /// NVM controller revision field
    pub fn nvm_revision(&self) -> String {
        self.text(8..11)
    }

    /// OCD revision field
    pub fn ocd_revision(&self) -> String {
        self.text(11..14)
    }

    /// PDI oscillator frequency character
    pub fn osc(&self) -> char {
        self.raw[15] as char
    }
}

/// Details only readable in programming mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgModeInfo {
    /// Three signature bytes
    pub device_id: [u8; 3],
    /// Silicon revision, 0 = A
    pub revision: u8,
    /// Signature row
    pub sigrow: Vec<u8>,
    /// Fuses 0..=10
    pub fuses: [u8; 11],
    /// User row
    pub userrow: Vec<u8>,
}

impl ProgModeInfo {
    /// Serial number bytes from the signature row
    pub fn serial_number(&self) -> &[u8] {
        &self.sigrow[3..13]
    }

    /// Revision as a letter
    pub fn revision_letter(&self) -> char {
        b'A'.saturating_add(self.revision) as char
    }
}

/// Everything [`UpdiSession::device_info`] collects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// System information block
    pub sib: Sib,
    /// UPDI revision from STATUSA
    pub updi_revision: u8,
    /// Present when the session was in programming mode
    pub progmode: Option<ProgModeInfo>,
}

impl<T: Transport> UpdiSession<T> {
    /// Read the SIB and UPDI revision, plus signature, fuses and user row
    /// when in programming mode
    pub fn device_info(&mut self) -> Result<DeviceInfo> {
        let profile = self.profile();
        let (sib, updi_revision) = self.guarded(|s| {
            let sib = s.link().sib()?;
            let status = s.link().ldcs(cs::STATUSA)?;
            Ok((Sib { raw: sib }, status >> 4))
        })?;

        let progmode = if self.state() == LinkState::ProgMode {
            let mut nvm = self.nvm()?;
            let userrow = nvm.userrow_read()?;
            let mut fuses = [0u8; 11];
            for (n, fuse) in fuses.iter_mut().enumerate() {
                *fuse = nvm.fuse_read(n as u8)?;
            }
            let (device_id, revision, sigrow) = self.guarded(|s| {
                let mut sigrow = vec![0u8; SIGROW_LEN];
                s.link().read_data(profile.sigrow_address, &mut sigrow)?;
                let revision = s.link().ld(profile.syscfg_address + 1)?;
                Ok(([sigrow[0], sigrow[1], sigrow[2]], revision, sigrow))
            })?;
            Some(ProgModeInfo {
                device_id,
                revision,
                sigrow,
                fuses,
                userrow,
            })
        } else {
            None
        };

        Ok(DeviceInfo {
            sib,
            updi_revision,
            progmode,
        })
    }
}

fn hex_rows(f: &mut fmt::Formatter<'_>, data: &[u8]) -> fmt::Result {
    for row in data.chunks(16) {
        let line: Vec<String> = row.iter().map(|b| format!("{:02X}", b)).collect();
        writeln!(f, "  {}", line.join(" "))?;
    }
    Ok(())
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw: Vec<String> = self.sib.raw.iter().map(|b| format!("{:02X}", b)).collect();
        writeln!(f, "SIB           = {}", raw.join(" "))?;
        writeln!(f, "Family ID     = {}", self.sib.family())?;
        writeln!(f, "NVM revision  = {}", self.sib.nvm_revision())?;
        writeln!(f, "OCD revision  = {}", self.sib.ocd_revision())?;
        writeln!(f, "PDI OSC       = {} MHz", self.sib.osc())?;
        writeln!(f, "PDI revision  = {}", self.updi_revision)?;

        let Some(p) = &self.progmode else {
            return writeln!(f, "(not in programming mode, no signature or fuses)");
        };
        writeln!(
            f,
            "Device ID     = {:02X} {:02X} {:02X} rev {}",
            p.device_id[0],
            p.device_id[1],
            p.device_id[2],
            p.revision_letter()
        )?;
        let serial: Vec<String> = p.serial_number().iter().map(|b| format!("{:02X}", b)).collect();
        writeln!(f, "Serial Number = {}", serial.join(" "))?;
        writeln!(f, "SigRow:")?;
        hex_rows(f, &p.sigrow)?;
        for (n, (name, value)) in FUSE_NAMES.iter().zip(p.fuses.iter()).enumerate() {
            writeln!(f, "Fuse {:02} {:<8} = 0x{:02X} {:08b}", n, name, value, value)?;
        }
        writeln!(f, "UserRow:")?;
        hex_rows(f, &p.userrow)
    }
}
