//! UPDI protocol constants and register flags
//!
//! Opcode layout follows the UPDI chapter of the tinyAVR 0/1-series and
//! megaAVR 0-series datasheets.

use bitflags::bitflags;

/// Synchronization character that starts every frame
pub const SYNC: u8 = 0x55;
/// Acknowledge byte sent by the target after each store phase
pub const ACK: u8 = 0x40;
/// BREAK character (a zero byte at link speed)
pub const BREAK: u8 = 0x00;

/// REPEAT counter limit: the count byte holds `n - 1`
pub const MAX_REPEAT: usize = 0xFF + 1;

/// Length of the system information block
pub const SIB_LEN: usize = 16;

/// Instruction opcodes (upper 3 bits)
pub mod opcode {
    /// Load data space, direct address
    pub const LDS: u8 = 0x00;
    /// Store data space, direct address
    pub const STS: u8 = 0x40;
    /// Load data space, pointer access
    pub const LD: u8 = 0x20;
    /// Store data space, pointer access
    pub const ST: u8 = 0x60;
    /// Load control/status space
    pub const LDCS: u8 = 0x80;
    /// Store control/status space
    pub const STCS: u8 = 0xC0;
    /// Set repeat counter
    pub const REPEAT: u8 = 0xA0;
    /// Key or SIB
    pub const KEY: u8 = 0xE0;
}

/// Pointer access modes for LD/ST
pub mod ptr {
    /// `*(ptr)`
    pub const DEREF: u8 = 0x00;
    /// `*(ptr++)`
    pub const INC: u8 = 0x04;
    /// Write the pointer register itself
    pub const ADDRESS: u8 = 0x08;
}

/// Address and data size fields
pub mod size {
    /// 8-bit address (LDS/STS)
    pub const ADDRESS_8: u8 = 0x00;
    /// 16-bit address (LDS/STS)
    pub const ADDRESS_16: u8 = 0x04;
    /// 8-bit data
    pub const DATA_8: u8 = 0x00;
    /// 16-bit data
    pub const DATA_16: u8 = 0x01;
}

/// KEY instruction modifiers
pub mod key {
    /// Send a 64-bit key
    pub const KEY_64: u8 = 0x00;
    /// Read the system information block instead
    pub const SIB: u8 = 0x04;
    /// 16-byte SIB
    pub const SIB_16BYTES: u8 = 0x01;

    /// Chip erase key
    pub const CHIP_ERASE: &[u8; 8] = b"NVMErase";
    /// NVM programming key
    pub const NVM_PROG: &[u8; 8] = b"NVMProg ";
    /// User row write key
    pub const USERROW_WRITE: &[u8; 8] = b"NVMUs&te";
}

/// Control/status space register indices
pub mod cs {
    /// Status A (UPDI revision in bits 7:4)
    pub const STATUSA: u8 = 0x00;
    /// Status B (PESIG)
    pub const STATUSB: u8 = 0x01;
    /// Control A
    pub const CTRLA: u8 = 0x02;
    /// Control B
    pub const CTRLB: u8 = 0x03;
    /// ASI key status
    pub const ASI_KEY_STATUS: u8 = 0x07;
    /// ASI reset request
    pub const ASI_RESET_REQ: u8 = 0x08;
    /// ASI control A
    pub const ASI_CTRLA: u8 = 0x09;
    /// ASI system control A
    pub const ASI_SYS_CTRLA: u8 = 0x0A;
    /// ASI system status
    pub const ASI_SYS_STATUS: u8 = 0x0B;
}

/// CTRLA: inter-byte delay enable
pub const CTRLA_IBDLY: u8 = 1 << 7;

/// ASI_RESET_REQ value that asserts reset
pub const RESET_REQ_VALUE: u8 = 0x59;

/// ASI_SYS_CTRLA: user row programming done
pub const SYS_CTRLA_UROWWRITE_FINAL: u8 = 0x02;

bitflags! {
    /// CTRLB register bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CtrlB: u8 {
        /// Collision and contention detection disable
        const CCDETDIS = 1 << 3;
        /// UPDI disable
        const UPDIDIS  = 1 << 2;
    }
}

bitflags! {
    /// ASI_KEY_STATUS bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct KeyStatus: u8 {
        /// Chip erase key accepted
        const CHIPERASE = 1 << 3;
        /// NVM programming key accepted
        const NVMPROG   = 1 << 4;
        /// User row write key accepted
        const UROWWRITE = 1 << 5;
    }
}

bitflags! {
    /// ASI_SYS_STATUS bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SysStatus: u8 {
        /// System is in reset
        const RSTSYS     = 1 << 5;
        /// System is in sleep
        const INSLEEP    = 1 << 4;
        /// NVM programming mode active
        const NVMPROG    = 1 << 3;
        /// User row programming active
        const UROWPROG   = 1 << 2;
        /// Device is locked
        const LOCKSTATUS = 1 << 0;
    }
}

/// NVM controller register offsets and commands
pub mod nvmctrl {
    use bitflags::bitflags;

    /// Control A (command register)
    pub const CTRLA: u16 = 0x00;
    /// Control B
    pub const CTRLB: u16 = 0x01;
    /// Status
    pub const STATUS: u16 = 0x02;
    /// Interrupt control
    pub const INTCTRL: u16 = 0x03;
    /// Interrupt flags
    pub const INTFLAGS: u16 = 0x04;
    /// Data low byte
    pub const DATAL: u16 = 0x06;
    /// Data high byte
    pub const DATAH: u16 = 0x07;
    /// Address low byte
    pub const ADDRL: u16 = 0x08;
    /// Address high byte
    pub const ADDRH: u16 = 0x09;

    /// CTRLA command codes
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(u8)]
    pub enum Command {
        /// No operation
        Nop = 0x00,
        /// Write page buffer to memory
        WritePage = 0x01,
        /// Erase page
        ErasePage = 0x02,
        /// Erase page, then write page buffer
        EraseWritePage = 0x03,
        /// Clear the page buffer
        PageBufferClear = 0x04,
        /// Erase flash and EEPROM
        ChipErase = 0x05,
        /// Erase EEPROM
        EraseEeprom = 0x06,
        /// Write fuse from DATAL to ADDR
        WriteFuse = 0x07,
    }

    bitflags! {
        /// STATUS register bits
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct Status: u8 {
            /// Last operation failed
            const WRITE_ERROR = 1 << 2;
            /// EEPROM busy
            const EEPROM_BUSY = 1 << 1;
            /// Flash busy
            const FLASH_BUSY  = 1 << 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_composition() {
        assert_eq!(opcode::LDS | size::ADDRESS_16 | size::DATA_8, 0x04);
        assert_eq!(opcode::STS | size::ADDRESS_16 | size::DATA_16, 0x45);
        assert_eq!(opcode::ST | ptr::ADDRESS | size::DATA_16, 0x69);
        assert_eq!(opcode::LD | ptr::INC | size::DATA_16, 0x25);
        assert_eq!(opcode::KEY | key::SIB | key::SIB_16BYTES, 0xE5);
    }
}
