//! updiprog-dummy - In-memory UPDI target emulator for testing
//!
//! This crate provides a fake tinyAVR/megaAVR target that speaks UPDI over
//! the [`Transport`] trait. It echoes every byte like the single-wire
//! physical link does, decodes frames, answers loads, ACKs stores and
//! emulates the ASI key/reset logic and the NVM controller. Counters and
//! fault injection knobs let tests observe exactly what went over the wire.

use std::collections::{BTreeMap, VecDeque};

use log::trace;
use updiprog_core::device::DeviceProfile;
use updiprog_core::error::Result;
use updiprog_core::transport::{LineSettings, Transport, DOUBLE_BREAK_BAUD};

const SYNC: u8 = 0x55;
const ACK: u8 = 0x40;

// Control/status registers
const CS_STATUSA: usize = 0x00;
const CS_CTRLB: usize = 0x03;
const CS_ASI_KEY_STATUS: usize = 0x07;
const CS_ASI_RESET_REQ: usize = 0x08;
const CS_ASI_SYS_CTRLA: usize = 0x0A;
const CS_ASI_SYS_STATUS: usize = 0x0B;

const KEY_CHIPERASE: u8 = 1 << 3;
const KEY_NVMPROG: u8 = 1 << 4;
const KEY_UROWWRITE: u8 = 1 << 5;

const SYS_RSTSYS: u8 = 1 << 5;
const SYS_NVMPROG: u8 = 1 << 3;
const SYS_UROWPROG: u8 = 1 << 2;
const SYS_LOCKSTATUS: u8 = 1 << 0;

const CTRLB_UPDIDIS: u8 = 1 << 2;
const RESET_SIGNATURE: u8 = 0x59;
const UROW_FINAL: u8 = 0x02;

// NVM controller register offsets and commands
const NVM_CTRLA: u16 = 0x00;
const NVM_STATUS: u16 = 0x02;
const NVM_DATAL: u16 = 0x06;
const NVM_ADDRL: u16 = 0x08;
const NVM_ADDRH: u16 = 0x09;

/// NVM controller command codes as logged by the emulator
pub mod nvm_cmd {
    /// No operation
    pub const NOP: u8 = 0x00;
    /// Write page buffer to memory
    pub const WRITE_PAGE: u8 = 0x01;
    /// Erase page
    pub const ERASE_PAGE: u8 = 0x02;
    /// Erase page and write page buffer
    pub const ERASE_WRITE_PAGE: u8 = 0x03;
    /// Clear the page buffer
    pub const PAGE_BUFFER_CLR: u8 = 0x04;
    /// Erase flash and EEPROM
    pub const CHIP_ERASE: u8 = 0x05;
    /// Erase EEPROM
    pub const ERASE_EEPROM: u8 = 0x06;
    /// Write one fuse
    pub const WRITE_FUSE: u8 = 0x07;
}

const KEY_ERASE: &[u8; 8] = b"NVMErase";
const KEY_PROG: &[u8; 8] = b"NVMProg ";
const KEY_UROW: &[u8; 8] = b"NVMUs&te";

/// Configuration for the dummy target
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Memory map of the emulated part
    pub profile: &'static DeviceProfile,
    /// System information block
    pub sib: [u8; 16],
    /// UPDI revision reported in STATUSA bits 7:4
    pub updi_revision: u8,
    /// 3-byte device signature
    pub device_id: [u8; 3],
    /// Silicon revision (0 = A)
    pub revision: u8,
    /// Start out locked (LOCKBIT set)
    pub locked: bool,
    /// Number of STATUSA reads that come back as zero
    pub dead_status_reads: u32,
    /// Number of STATUSA reads that get no reply at all
    pub silent_status_reads: u32,
    /// Number of NVM STATUS reads after each command that report busy
    pub busy_polls: u32,
    /// Report WRITE_ERROR in the NVM STATUS register
    pub write_error: bool,
    /// Ignore keys (key status bits never set)
    pub reject_keys: bool,
    /// Corrupt the echo of the n-th byte written (0-based)
    pub corrupt_echo_at: Option<usize>,
}

impl DummyConfig {
    /// Default configuration for a device profile
    pub fn new(profile: &'static DeviceProfile) -> Self {
        Self {
            profile,
            sib: *b"tinyAVR P:0D:1-3",
            updi_revision: 3,
            device_id: [0x1E, 0x94, 0x21],
            revision: 3,
            locked: false,
            dead_status_reads: 0,
            silent_status_reads: 0,
            busy_polls: 0,
            write_error: false,
            reject_keys: false,
            corrupt_echo_at: None,
        }
    }
}

/// Pointer addressing of a store burst
#[derive(Debug, Clone, Copy)]
enum PtrMode {
    Deref,
    PostInc,
}

/// Frame decoder state
#[derive(Debug, Clone)]
enum Frame {
    /// Waiting for SYNC
    Idle,
    /// SYNC seen, waiting for opcode
    Opcode,
    /// STCS register index, waiting for the value
    Stcs(usize),
    /// LDS: collecting address bytes
    LdsAddr { addr_len: usize, data_len: usize, buf: Vec<u8> },
    /// STS: collecting address bytes
    StsAddr { addr_len: usize, data_len: usize, buf: Vec<u8> },
    /// STS: collecting data bytes for `addr`
    StsData { addr: u16, data_len: usize, buf: Vec<u8> },
    /// ST ptr: collecting new pointer bytes
    PtrAddr { len: usize, buf: Vec<u8> },
    /// ST *ptr / *ptr++: collecting data units
    PtrData { mode: PtrMode, unit: usize, remaining: usize, buf: Vec<u8> },
    /// REPEAT: waiting for the count byte
    Repeat,
    /// KEY: collecting 8 key bytes
    Key(Vec<u8>),
}

/// One register store to the NVM controller block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterWrite {
    /// Register offset within NVMCTRL
    pub offset: u16,
    /// Value written
    pub value: u8,
}

/// Emulated UPDI target
pub struct DummyTarget {
    config: DummyConfig,
    mem: Vec<u8>,
    cs: [u8; 16],
    nvm_regs: [u8; 16],
    page_buffer: BTreeMap<u16, u8>,
    urow_buffer: BTreeMap<u16, u8>,
    settings: LineSettings,
    frame: Frame,
    tx: VecDeque<u8>,
    ptr: u16,
    repeat: usize,
    reset_asserted: bool,
    disabled: bool,
    locked: bool,
    busy_left: u32,
    dead_status_reads: u32,
    silent_status_reads: u32,
    bytes_written: usize,

    nvm_commands: Vec<u8>,
    register_writes: Vec<RegisterWrite>,
    double_breaks: u32,
    burst_loads: usize,
    keys_written: Vec<[u8; 8]>,
    resets: u32,
}

impl DummyTarget {
    /// Create a new target with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        let mut mem = vec![0xFF; 0x1_0000];
        let p = config.profile;

        // Signature row: device ID, then a serial number
        let sig = p.sigrow_address as usize;
        mem[sig..sig + 3].copy_from_slice(&config.device_id);
        for (i, b) in mem[sig + 3..sig + 13].iter_mut().enumerate() {
            *b = 0x30 + i as u8;
        }
        mem[p.syscfg_address as usize + 1] = config.revision;

        // Factory fuse defaults
        let fuses = p.fuses_address as usize;
        mem[fuses..fuses + 11]
            .copy_from_slice(&[0x00, 0x00, 0x02, 0xFF, 0x00, 0xF6, 0x07, 0x00, 0x00, 0xFF, 0xC5]);

        let mut cs = [0u8; 16];
        cs[CS_STATUSA] = config.updi_revision << 4;
        let locked = config.locked;
        if locked {
            cs[CS_ASI_SYS_STATUS] |= SYS_LOCKSTATUS;
        }

        Self {
            dead_status_reads: config.dead_status_reads,
            silent_status_reads: config.silent_status_reads,
            config,
            mem,
            cs,
            nvm_regs: [0; 16],
            page_buffer: BTreeMap::new(),
            urow_buffer: BTreeMap::new(),
            settings: LineSettings::updi(115200),
            frame: Frame::Idle,
            tx: VecDeque::new(),
            ptr: 0,
            repeat: 0,
            reset_asserted: false,
            disabled: false,
            locked,
            busy_left: 0,
            bytes_written: 0,
            nvm_commands: Vec::new(),
            register_writes: Vec::new(),
            double_breaks: 0,
            burst_loads: 0,
            keys_written: Vec::new(),
            resets: 0,
        }
    }

    /// Create a target with default settings for a device profile
    pub fn for_device(profile: &'static DeviceProfile) -> Self {
        Self::new(DummyConfig::new(profile))
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Raw data space
    pub fn memory(&self) -> &[u8] {
        &self.mem
    }

    /// Bytes of the data space at `addr`
    pub fn read_memory(&self, addr: u16, len: usize) -> &[u8] {
        let start = addr as usize;
        &self.mem[start..start + len]
    }

    /// Preload bytes into the data space
    pub fn load_memory(&mut self, addr: u16, data: &[u8]) {
        let start = addr as usize;
        self.mem[start..start + data.len()].copy_from_slice(data);
    }

    /// Current flash contents
    pub fn flash(&self) -> &[u8] {
        let f = self.config.profile.flash;
        self.read_memory(f.start, f.size as usize)
    }

    /// Current EEPROM contents
    pub fn eeprom(&self) -> &[u8] {
        let e = self.config.profile.eeprom;
        self.read_memory(e.start, e.size as usize)
    }

    /// Current user row contents
    pub fn userrow(&self) -> &[u8] {
        let u = self.config.profile.userrow();
        self.read_memory(u.start, u.size as usize)
    }

    /// Current value of fuse `n`
    pub fn fuse(&self, n: u8) -> u8 {
        self.mem[self.config.profile.fuses_address as usize + n as usize]
    }

    /// Whether the part is still locked
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Whether the target is in NVM programming mode
    pub fn in_progmode(&self) -> bool {
        self.cs[CS_ASI_SYS_STATUS] & SYS_NVMPROG != 0
    }

    /// Whether the host released the line with UPDIDIS
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// NVM controller commands executed, in order
    pub fn nvm_commands(&self) -> &[u8] {
        &self.nvm_commands
    }

    /// Count how often one NVM command ran
    pub fn nvm_command_count(&self, cmd: u8) -> usize {
        self.nvm_commands.iter().filter(|&&c| c == cmd).count()
    }

    /// Stores into the NVM controller register block, in order
    pub fn register_writes(&self) -> &[RegisterWrite] {
        &self.register_writes
    }

    /// Number of double breaks seen
    pub fn double_breaks(&self) -> u32 {
        self.double_breaks
    }

    /// Number of `LD *ptr++` bursts answered
    pub fn burst_loads(&self) -> usize {
        self.burst_loads
    }

    /// Keys received (in transmit order, i.e. reversed)
    pub fn keys_written(&self) -> &[[u8; 8]] {
        &self.keys_written
    }

    /// Number of completed reset pulses
    pub fn resets(&self) -> u32 {
        self.resets
    }

    /// Forget all counters
    pub fn clear_counters(&mut self) {
        self.nvm_commands.clear();
        self.register_writes.clear();
        self.double_breaks = 0;
        self.burst_loads = 0;
        self.keys_written.clear();
        self.resets = 0;
    }

    /// Change fault injection at run time
    pub fn set_write_error(&mut self, on: bool) {
        self.config.write_error = on;
    }

    /// Corrupt the echo of the n-th byte from now on
    pub fn corrupt_echo_after(&mut self, n: usize) {
        self.config.corrupt_echo_at = Some(self.bytes_written + n);
    }

    fn respond(&mut self, bytes: &[u8]) {
        trace!("dummy <- {:02X?}", bytes);
        self.tx.extend(bytes.iter().copied());
    }

    fn load(&mut self, addr: u16) -> u8 {
        let nvm = self.config.profile.nvmctrl_address;
        if (nvm..nvm + 16).contains(&addr) {
            let offset = addr - nvm;
            if offset == NVM_STATUS {
                let mut status = 0u8;
                if self.busy_left > 0 {
                    self.busy_left -= 1;
                    status |= 0x03;
                }
                if self.config.write_error {
                    status |= 0x04;
                }
                return status;
            }
            return self.nvm_regs[offset as usize];
        }
        self.mem[addr as usize]
    }

    fn store(&mut self, addr: u16, value: u8) {
        let p = self.config.profile;
        let nvm = p.nvmctrl_address;
        if (nvm..nvm + 16).contains(&addr) {
            let offset = addr - nvm;
            self.register_writes.push(RegisterWrite { offset, value });
            self.nvm_regs[offset as usize] = value;
            if offset == NVM_CTRLA {
                self.execute(value);
            }
            return;
        }

        let urow = p.userrow();
        let in_urow = addr >= urow.start && (addr as u32) < urow.start as u32 + urow.size;
        if in_urow && self.cs[CS_ASI_SYS_STATUS] & SYS_UROWPROG != 0 {
            self.urow_buffer.insert(addr, value);
        } else if self.in_progmode() && self.is_nvm(addr) {
            self.page_buffer.insert(addr, value);
        } else {
            self.mem[addr as usize] = value;
        }
    }

    fn is_nvm(&self, addr: u16) -> bool {
        let p = self.config.profile;
        [p.flash, p.eeprom, p.userrow()]
            .iter()
            .any(|r| addr >= r.start && (addr as u32) < r.start as u32 + r.size)
    }

    fn page_start(&self, addr: u16) -> u16 {
        let flash = self.config.profile.flash;
        if addr >= flash.start {
            addr - (addr - flash.start) % flash.page_size
        } else {
            addr
        }
    }

    fn erase_range(&mut self, start: u16, len: usize) {
        let s = start as usize;
        self.mem[s..s + len].fill(0xFF);
    }

    fn execute(&mut self, cmd: u8) {
        trace!("dummy NVM command 0x{:02X}", cmd);
        self.nvm_commands.push(cmd);
        self.busy_left = self.config.busy_polls;
        let p = self.config.profile;
        match cmd {
            nvm_cmd::WRITE_PAGE => {
                let buffer = std::mem::take(&mut self.page_buffer);
                for (addr, value) in buffer {
                    self.mem[addr as usize] &= value;
                }
            }
            nvm_cmd::ERASE_PAGE | nvm_cmd::ERASE_WRITE_PAGE => {
                let pages: Vec<u16> = self.page_buffer.keys().map(|&a| self.page_start(a)).collect();
                for page in pages {
                    if page >= p.flash.start {
                        self.erase_range(page, p.flash.page_size as usize);
                    }
                }
                let buffer = std::mem::take(&mut self.page_buffer);
                if cmd == nvm_cmd::ERASE_WRITE_PAGE {
                    for (addr, value) in buffer {
                        self.mem[addr as usize] = value;
                    }
                } else {
                    for addr in buffer.into_keys() {
                        self.mem[addr as usize] = 0xFF;
                    }
                }
            }
            nvm_cmd::PAGE_BUFFER_CLR => self.page_buffer.clear(),
            nvm_cmd::CHIP_ERASE => {
                self.erase_range(p.flash.start, p.flash.size as usize);
                self.erase_range(p.eeprom.start, p.eeprom.size as usize);
                self.unlock();
            }
            nvm_cmd::ERASE_EEPROM => self.erase_range(p.eeprom.start, p.eeprom.size as usize),
            nvm_cmd::WRITE_FUSE => {
                let addr = u16::from_le_bytes([
                    self.nvm_regs[NVM_ADDRL as usize],
                    self.nvm_regs[NVM_ADDRH as usize],
                ]);
                self.mem[addr as usize] = self.nvm_regs[NVM_DATAL as usize];
            }
            _ => {}
        }
    }

    fn unlock(&mut self) {
        self.locked = false;
        self.cs[CS_ASI_SYS_STATUS] &= !SYS_LOCKSTATUS;
    }

    fn stcs(&mut self, reg: usize, value: u8) {
        match reg {
            CS_ASI_KEY_STATUS => {
                // Writing UROWWRITE acknowledges the end of a user row write
                if value & KEY_UROWWRITE != 0 {
                    self.cs[CS_ASI_KEY_STATUS] &= !KEY_UROWWRITE;
                }
            }
            CS_ASI_RESET_REQ => {
                if value == RESET_SIGNATURE {
                    self.reset_asserted = true;
                    self.cs[CS_ASI_SYS_STATUS] |= SYS_RSTSYS;
                } else if self.reset_asserted {
                    self.reset_asserted = false;
                    self.cs[CS_ASI_SYS_STATUS] &= !SYS_RSTSYS;
                    self.release_reset();
                }
            }
            CS_ASI_SYS_CTRLA => {
                if value & UROW_FINAL != 0 && self.cs[CS_ASI_SYS_STATUS] & SYS_UROWPROG != 0 {
                    let buffer = std::mem::take(&mut self.urow_buffer);
                    for (addr, v) in buffer {
                        self.mem[addr as usize] = v;
                    }
                    self.cs[CS_ASI_SYS_STATUS] &= !SYS_UROWPROG;
                }
            }
            CS_CTRLB => {
                self.cs[reg] = value;
                if value & CTRLB_UPDIDIS != 0 {
                    self.disabled = true;
                }
            }
            CS_STATUSA | CS_ASI_SYS_STATUS => {}
            _ => self.cs[reg] = value,
        }
    }

    fn release_reset(&mut self) {
        self.resets += 1;
        let keys = self.cs[CS_ASI_KEY_STATUS];
        self.cs[CS_ASI_SYS_STATUS] &= !SYS_NVMPROG;

        if keys & KEY_CHIPERASE != 0 {
            let p = self.config.profile;
            self.cs[CS_ASI_KEY_STATUS] &= !KEY_CHIPERASE;
            self.erase_range(p.flash.start, p.flash.size as usize);
            self.erase_range(p.eeprom.start, p.eeprom.size as usize);
            self.unlock();
        }
        if keys & KEY_NVMPROG != 0 {
            self.cs[CS_ASI_KEY_STATUS] &= !KEY_NVMPROG;
            if !self.locked {
                self.cs[CS_ASI_SYS_STATUS] |= SYS_NVMPROG;
            }
        }
        if keys & KEY_UROWWRITE != 0 {
            self.cs[CS_ASI_SYS_STATUS] |= SYS_UROWPROG;
        }
        self.page_buffer.clear();
    }

    fn ldcs(&mut self, reg: usize) -> Option<u8> {
        if reg == CS_STATUSA && self.silent_status_reads > 0 {
            self.silent_status_reads -= 1;
            return None;
        }
        if reg == CS_STATUSA && self.dead_status_reads > 0 {
            self.dead_status_reads -= 1;
            return Some(0);
        }
        Some(self.cs[reg])
    }

    fn key(&mut self, reversed: &[u8]) {
        let mut key = [0u8; 8];
        key.copy_from_slice(reversed);
        self.keys_written.push(key);
        key.reverse();
        if self.config.reject_keys {
            return;
        }
        let bit = match &key {
            k if k == KEY_ERASE => KEY_CHIPERASE,
            k if k == KEY_PROG => KEY_NVMPROG,
            k if k == KEY_UROW => KEY_UROWWRITE,
            _ => return,
        };
        self.cs[CS_ASI_KEY_STATUS] |= bit;
    }

    fn opcode(&mut self, op: u8) -> Frame {
        let size = |bits: u8| if bits & 0x03 == 1 { 2 } else { 1 };
        match op & 0xE0 {
            0x80 => {
                if let Some(value) = self.ldcs((op & 0x0F) as usize) {
                    self.respond(&[value]);
                }
                Frame::Idle
            }
            0xC0 => Frame::Stcs((op & 0x0F) as usize),
            0x00 => Frame::LdsAddr {
                addr_len: size(op >> 2),
                data_len: size(op),
                buf: Vec::new(),
            },
            0x40 => Frame::StsAddr {
                addr_len: size(op >> 2),
                data_len: size(op),
                buf: Vec::new(),
            },
            0x20 => {
                let unit = size(op);
                let count = std::mem::take(&mut self.repeat) + 1;
                let post_inc = (op >> 2) & 0x03 == 1;
                if post_inc {
                    self.burst_loads += 1;
                }
                let mut out = Vec::with_capacity(count * unit);
                for _ in 0..count {
                    for i in 0..unit {
                        let v = self.load(self.ptr.wrapping_add(i as u16));
                        out.push(v);
                    }
                    if post_inc {
                        self.ptr = self.ptr.wrapping_add(unit as u16);
                    }
                }
                self.respond(&out);
                Frame::Idle
            }
            0x60 => match (op >> 2) & 0x03 {
                2 => Frame::PtrAddr {
                    len: size(op),
                    buf: Vec::new(),
                },
                mode => Frame::PtrData {
                    mode: if mode == 1 {
                        PtrMode::PostInc
                    } else {
                        PtrMode::Deref
                    },
                    unit: size(op),
                    remaining: std::mem::take(&mut self.repeat) + 1,
                    buf: Vec::new(),
                },
            },
            0xA0 => Frame::Repeat,
            0xE0 => {
                if op & 0x04 != 0 {
                    let sib = self.config.sib;
                    self.respond(&sib);
                    Frame::Idle
                } else {
                    Frame::Key(Vec::new())
                }
            }
            _ => Frame::Idle,
        }
    }

    fn feed(&mut self, byte: u8) {
        let frame = std::mem::replace(&mut self.frame, Frame::Idle);
        self.frame = match frame {
            Frame::Idle => match byte {
                SYNC if !self.disabled => Frame::Opcode,
                // BREAK character re-enables a released link
                0x00 => {
                    self.disabled = false;
                    Frame::Idle
                }
                _ => Frame::Idle,
            },
            Frame::Opcode => self.opcode(byte),
            Frame::Stcs(reg) => {
                self.stcs(reg, byte);
                Frame::Idle
            }
            Frame::LdsAddr {
                addr_len,
                data_len,
                mut buf,
            } => {
                buf.push(byte);
                if buf.len() < addr_len {
                    Frame::LdsAddr {
                        addr_len,
                        data_len,
                        buf,
                    }
                } else {
                    let addr = le_addr(&buf);
                    let out: Vec<u8> = (0..data_len)
                        .map(|i| self.load(addr.wrapping_add(i as u16)))
                        .collect();
                    self.respond(&out);
                    Frame::Idle
                }
            }
            Frame::StsAddr {
                addr_len,
                data_len,
                mut buf,
            } => {
                buf.push(byte);
                if buf.len() < addr_len {
                    Frame::StsAddr {
                        addr_len,
                        data_len,
                        buf,
                    }
                } else {
                    self.respond(&[ACK]);
                    Frame::StsData {
                        addr: le_addr(&buf),
                        data_len,
                        buf: Vec::new(),
                    }
                }
            }
            Frame::StsData {
                addr,
                data_len,
                mut buf,
            } => {
                buf.push(byte);
                if buf.len() < data_len {
                    Frame::StsData {
                        addr,
                        data_len,
                        buf,
                    }
                } else {
                    for (i, &v) in buf.iter().enumerate() {
                        self.store(addr.wrapping_add(i as u16), v);
                    }
                    self.respond(&[ACK]);
                    Frame::Idle
                }
            }
            Frame::PtrAddr { len, mut buf } => {
                buf.push(byte);
                if buf.len() < len {
                    Frame::PtrAddr { len, buf }
                } else {
                    self.ptr = le_addr(&buf);
                    self.respond(&[ACK]);
                    Frame::Idle
                }
            }
            Frame::PtrData {
                mode,
                unit,
                remaining,
                mut buf,
            } => {
                buf.push(byte);
                if buf.len() < unit {
                    Frame::PtrData {
                        mode,
                        unit,
                        remaining,
                        buf,
                    }
                } else {
                    for (i, &v) in buf.iter().enumerate() {
                        self.store(self.ptr.wrapping_add(i as u16), v);
                    }
                    if let PtrMode::PostInc = mode {
                        self.ptr = self.ptr.wrapping_add(unit as u16);
                    }
                    self.respond(&[ACK]);
                    if remaining > 1 {
                        Frame::PtrData {
                            mode,
                            unit,
                            remaining: remaining - 1,
                            buf: Vec::new(),
                        }
                    } else {
                        Frame::Idle
                    }
                }
            }
            Frame::Repeat => {
                self.repeat = byte as usize;
                Frame::Idle
            }
            Frame::Key(mut buf) => {
                buf.push(byte);
                if buf.len() < 8 {
                    Frame::Key(buf)
                } else {
                    self.key(&buf);
                    Frame::Idle
                }
            }
        };
    }
}

fn le_addr(buf: &[u8]) -> u16 {
    match buf {
        [lo] => *lo as u16,
        [lo, hi, ..] => u16::from_le_bytes([*lo, *hi]),
        [] => 0,
    }
}

impl Transport for DummyTarget {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        trace!("dummy -> {:02X?}", data);
        if self.settings.baud == DOUBLE_BREAK_BAUD {
            // Two long zero characters reset the whole UPDI block
            self.double_breaks += 1;
            self.tx.extend(data.iter().copied());
            self.frame = Frame::Idle;
            self.disabled = false;
            self.repeat = 0;
            return Ok(data.len());
        }

        for &byte in data {
            let echo = if self.config.corrupt_echo_at == Some(self.bytes_written) {
                byte ^ 0xFF
            } else {
                byte
            };
            self.bytes_written += 1;
            self.tx.push_back(echo);
            self.feed(byte);
        }
        Ok(data.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = buf.len().min(self.tx.len());
        for (slot, byte) in buf.iter_mut().zip(self.tx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn configure(&mut self, settings: &LineSettings) -> Result<()> {
        self.settings = *settings;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.tx.clear();
        Ok(())
    }
}
