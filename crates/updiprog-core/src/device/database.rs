//! Built-in device catalog

use super::types::{DeviceProfile, MemoryKind, NvmRegion, PartCode};

const SYSCFG: u16 = 0x0F00;
const NVMCTRL: u16 = 0x1000;
const SIGROW: u16 = 0x1100;
const FUSES: u16 = 0x1280;
const USERROW: u16 = 0x1300;
const EEPROM_START: u16 = 0x1400;

const fn profile(
    part: PartCode,
    description: &'static str,
    flash_start: u16,
    flash_size: u32,
    flash_page: u16,
    eeprom_size: u32,
    eeprom_page: u16,
) -> DeviceProfile {
    DeviceProfile {
        part,
        description,
        flash: NvmRegion::new(MemoryKind::Flash, flash_start, flash_size, flash_page),
        eeprom: NvmRegion::new(MemoryKind::Eeprom, EEPROM_START, eeprom_size, eeprom_page),
        syscfg_address: SYSCFG,
        nvmctrl_address: NVMCTRL,
        sigrow_address: SIGROW,
        fuses_address: FUSES,
        userrow_address: USERROW,
    }
}

/// All known devices
pub static DEVICES: [DeviceProfile; 7] = [
    profile(PartCode::M48k, "ATmega4808/4809", 0x4000, 48 * 1024, 128, 256, 64),
    profile(PartCode::M32k, "ATmega3208/3209", 0x4000, 32 * 1024, 128, 256, 64),
    profile(PartCode::T32k, "ATtiny3216/3217", 0x8000, 32 * 1024, 128, 256, 64),
    profile(PartCode::T16k, "ATtiny1604-1617", 0x8000, 16 * 1024, 64, 256, 32),
    profile(PartCode::T8k, "ATtiny804-817", 0x8000, 8 * 1024, 64, 128, 32),
    profile(PartCode::T4k, "ATtiny402-417", 0x8000, 4 * 1024, 64, 128, 32),
    profile(PartCode::T2k, "ATtiny202-214", 0x8000, 2 * 1024, 64, 64, 32),
];

/// Look up the profile for a part code
pub fn lookup(part: PartCode) -> &'static DeviceProfile {
    // Every PartCode has exactly one table entry
    DEVICES
        .iter()
        .find(|d| d.part == part)
        .unwrap_or(&DEVICES[0])
}

/// Look up a profile by its command-line name
pub fn find_by_name(name: &str) -> Option<&'static DeviceProfile> {
    let part: PartCode = name.parse().ok()?;
    Some(lookup(part))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_part_has_entry() {
        for part in PartCode::ALL {
            assert_eq!(lookup(part).part, part);
        }
    }

    #[test]
    fn test_t16k_geometry() {
        let dev = find_by_name("t16k").unwrap();
        assert_eq!(dev.flash.start, 0x8000);
        assert_eq!(dev.flash.page_count(), 256);
        assert_eq!(dev.eeprom.start, 0x1400);
        assert_eq!(dev.eeprom.page_size, 32);
        assert_eq!(dev.userrow().size, 32);
        assert_eq!(dev.userrow().start, 0x1300);
    }

    #[test]
    fn test_mega_flash_start() {
        let dev = lookup(PartCode::M48k);
        assert_eq!(dev.flash.start, 0x4000);
        assert_eq!(dev.flash.size, 48 * 1024);
        assert_eq!(dev.fuses_address, 0x1280);
    }

    #[test]
    fn test_unknown_name() {
        assert!(find_by_name("x1k").is_none());
    }
}
