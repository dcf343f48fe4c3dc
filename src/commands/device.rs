//! Commands that talk to a target over UPDI
//!
//! The commands work on any [`UpdiSession`], whatever transport it runs on.
//! [`with_session`] opens the serial port, runs one command and closes the
//! session, which leaves programming mode and releases the UPDI line. On
//! error the session is dropped, which does the same on a best-effort basis.

use std::path::Path;

use updiprog_core::device::{lookup, MemoryKind, NvmRegion};
use updiprog_core::ihex;
use updiprog_core::transport::Transport;
use updiprog_updi::info::FUSE_NAMES;
use updiprog_updi::{FuseWrite, SerialTransport, SessionConfig, UpdiSession};

use super::IndicatifProgress;
use crate::cli::TargetArgs;

/// Open the port and synchronize with the target
pub fn open_session(
    target: &TargetArgs,
) -> Result<UpdiSession<SerialTransport>, Box<dyn std::error::Error>> {
    let profile = lookup(target.part);
    let config = SessionConfig {
        baud: target.baud,
        ..SessionConfig::default()
    };
    log::info!(
        "Opening {} for {} ({}) at {} baud",
        target.port,
        profile.part,
        profile.description,
        target.baud
    );
    let mut session = updiprog_updi::open(&target.port, profile, config)?;
    session.init()?;
    Ok(session)
}

/// Run one command on a freshly opened session, then close it
pub fn with_session<F>(target: &TargetArgs, f: F) -> Result<(), Box<dyn std::error::Error>>
where
    F: FnOnce(&mut UpdiSession<SerialTransport>) -> Result<(), Box<dyn std::error::Error>>,
{
    let mut session = open_session(target)?;
    f(&mut session)?;
    session.close()?;
    Ok(())
}

/// Bring the target into programming mode, optionally erasing it first
///
/// The erase unlocks a locked part and lets page writes skip their erase
/// cycle for the rest of the session.
fn enter_progmode<T: Transport>(
    session: &mut UpdiSession<T>,
    erase: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if erase {
        println!("Erasing chip...");
        session.unlock_erase()?;
        session.init()?;
    }
    if !session.enter_progmode()? {
        return Err(
            "device is locked, use erase (or --erase) to unlock it; this clears flash and EEPROM"
                .into(),
        );
    }
    Ok(())
}

/// Print SIB, signature, fuses and user row
pub fn run_info<T: Transport>(
    session: &mut UpdiSession<T>,
) -> Result<(), Box<dyn std::error::Error>> {
    if !session.enter_progmode()? {
        log::warn!("Device is locked, only the SIB can be read");
    }
    let info = session.device_info()?;
    print!("{}", info);
    Ok(())
}

/// Unlock the part with a chip erase
pub fn run_erase<T: Transport>(
    session: &mut UpdiSession<T>,
) -> Result<(), Box<dyn std::error::Error>> {
    enter_progmode(session, true)?;
    println!("Chip erased");
    Ok(())
}

/// Print one fuse, or all of them
pub fn run_fuse_read<T: Transport>(
    session: &mut UpdiSession<T>,
    fuse: Option<u8>,
) -> Result<(), Box<dyn std::error::Error>> {
    enter_progmode(session, false)?;

    let fuses: Vec<u8> = match fuse {
        Some(n) => vec![n],
        None => (0..FUSE_NAMES.len() as u8).collect(),
    };
    let mut nvm = session.nvm()?;
    for n in fuses {
        let value = nvm.fuse_read(n)?;
        println!(
            "Fuse {:02} {:<8} = 0x{:02X} {:08b}",
            n, FUSE_NAMES[n as usize], value, value
        );
    }
    Ok(())
}

/// Write one fuse and verify it
pub fn run_fuse_write<T: Transport>(
    session: &mut UpdiSession<T>,
    fuse: u8,
    value: u8,
) -> Result<(), Box<dyn std::error::Error>> {
    enter_progmode(session, false)?;

    match session.nvm()?.fuse_write(fuse, value)? {
        FuseWrite::Unchanged => println!(
            "Fuse {} ({}) already 0x{:02X}, nothing to do",
            fuse, FUSE_NAMES[fuse as usize], value
        ),
        FuseWrite::Written { old } => println!(
            "Fuse {} ({}) 0x{:02X} -> 0x{:02X}",
            fuse, FUSE_NAMES[fuse as usize], old, value
        ),
    }
    Ok(())
}

/// Read a region and store it as Intel HEX
///
/// File addresses are relative to the region start.
pub fn run_read<T: Transport>(
    session: &mut UpdiSession<T>,
    kind: MemoryKind,
    output: &Path,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    enter_progmode(session, false)?;

    let region = session.profile().region(kind);
    let mut progress = IndicatifProgress::new(quiet);
    let data = session.nvm()?.read(&region, &mut progress)?;

    ihex::write_file(output, &data)?;
    println!("Read {} bytes of {} to {:?}", data.len(), kind, output);
    Ok(())
}

/// Load a hex file into a region-sized image
///
/// File addresses are relative to the region start, so records past the
/// region end are rejected as buffer overruns.
fn load_region_image(
    input: &Path,
    region: &NvmRegion,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let parsed = ihex::read_file(input, region.size as usize)?;
    let range = parsed.range.ok_or("hex file empty")?;
    println!(
        "Loaded {} bytes from {:?} ({})",
        parsed.total_bytes, input, range
    );
    Ok(parsed.image.into_bytes())
}

/// Program flash or EEPROM from a hex file, then verify
pub fn run_write<T: Transport>(
    session: &mut UpdiSession<T>,
    kind: MemoryKind,
    input: &Path,
    erase: bool,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let region = session.profile().region(kind);
    let data = load_region_image(input, &region)?;

    enter_progmode(session, erase)?;

    let mut progress = IndicatifProgress::new(quiet);
    let mut nvm = session.nvm()?;
    let written = nvm.write(&region, &data, &mut progress)?;
    let checked = nvm.verify(&region, &data, &mut progress)?;

    println!(
        "Wrote and verified {} of {} {} pages ({} checked)",
        written,
        region.page_count(),
        kind,
        checked
    );
    Ok(())
}

/// Write the user row from a hex file
///
/// This works on locked parts. Read-back verification needs programming
/// mode, so it is skipped when the part stays locked.
pub fn run_userrow_write<T: Transport>(
    session: &mut UpdiSession<T>,
    input: &Path,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let region = session.profile().userrow();
    let data = load_region_image(input, &region)?;

    session.userrow_write(&data)?;

    if session.enter_progmode()? {
        let mut progress = IndicatifProgress::new(quiet);
        session.nvm()?.verify(&region, &data, &mut progress)?;
        println!("User row written and verified");
    } else {
        log::warn!("Device is locked, user row written but not verified");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use updiprog_core::device::{DeviceProfile, PartCode};
    use updiprog_dummy::{nvm_cmd, DummyConfig, DummyTarget};
    use updiprog_updi::{LinkState, Timings};

    fn profile() -> &'static DeviceProfile {
        lookup(PartCode::T16k)
    }

    fn session_with(target: DummyTarget) -> UpdiSession<DummyTarget> {
        let config = SessionConfig {
            baud: 115200,
            timings: Timings::immediate(),
        };
        UpdiSession::new(target, profile(), config).unwrap()
    }

    fn locked_target() -> DummyTarget {
        let mut cfg = DummyConfig::new(profile());
        cfg.locked = true;
        DummyTarget::new(cfg)
    }

    /// Region-relative image with data in pages 1 and 2 only
    fn sample_image() -> Vec<u8> {
        let page = profile().flash.page_size as usize;
        let mut data = vec![0xFF; 3 * page];
        for (i, b) in data[page..].iter_mut().enumerate() {
            *b = i as u8;
        }
        data
    }

    #[test]
    fn test_flash_round_trip_through_hex() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.hex");
        let output = dir.path().join("out.hex");
        let data = sample_image();
        ihex::write_file(&input, &data).unwrap();

        let mut s = session_with(DummyTarget::for_device(profile()));
        run_write(&mut s, MemoryKind::Flash, &input, false, true).unwrap();
        assert_eq!(&s.transport().flash()[..data.len()], &data[..]);
        assert_eq!(s.transport().nvm_command_count(nvm_cmd::ERASE_WRITE_PAGE), 2);

        run_read(&mut s, MemoryKind::Flash, &output, true).unwrap();
        let parsed = ihex::read_file(&output, profile().flash.size as usize).unwrap();
        // file address 0 is the first flash byte
        assert_eq!(parsed.image.as_bytes(), s.transport().flash());
        assert_eq!(&parsed.image.as_bytes()[..data.len()], &data[..]);
    }

    #[test]
    fn test_erase_then_write_uses_write_page() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.hex");
        let data = sample_image();
        ihex::write_file(&input, &data).unwrap();

        let mut target = locked_target();
        target.load_memory(profile().flash.start, &[0x00; 64]);
        let mut s = session_with(target);
        run_write(&mut s, MemoryKind::Flash, &input, true, true).unwrap();

        let t = s.transport();
        assert!(!t.is_locked());
        assert_eq!(t.keys_written()[0], *b"esarEMVN");
        assert_eq!(t.nvm_command_count(nvm_cmd::WRITE_PAGE), 2);
        assert_eq!(t.nvm_command_count(nvm_cmd::ERASE_WRITE_PAGE), 0);
        // the stale first page was cleared by the chip erase
        assert_eq!(&t.flash()[..data.len()], &data[..]);
        assert_eq!(s.state(), LinkState::ProgMode);
    }

    #[test]
    fn test_write_to_locked_part_needs_erase() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.hex");
        ihex::write_file(&input, &sample_image()).unwrap();

        let mut s = session_with(locked_target());
        let err = run_write(&mut s, MemoryKind::Flash, &input, false, true).unwrap_err();
        assert!(err.to_string().contains("locked"));
        assert_eq!(s.transport().nvm_commands().len(), 0);
        assert!(s.transport().is_locked());
    }

    #[test]
    fn test_empty_hex_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("empty.hex");
        fs::write(&input, ":00000001FF\r\n").unwrap();

        let mut s = session_with(DummyTarget::for_device(profile()));
        let err = run_write(&mut s, MemoryKind::Eeprom, &input, false, true).unwrap_err();
        assert_eq!(err.to_string(), "hex file empty");
        // nothing went over the wire
        assert_eq!(s.state(), LinkState::Cold);
    }

    #[test]
    fn test_eeprom_write_lands_at_region_start() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("ee.hex");
        ihex::write_file(&input, &[0x11, 0x22, 0x33, 0x44]).unwrap();

        let mut s = session_with(DummyTarget::for_device(profile()));
        run_write(&mut s, MemoryKind::Eeprom, &input, false, true).unwrap();
        assert_eq!(&s.transport().eeprom()[..4], &[0x11, 0x22, 0x33, 0x44]);
    }

    #[test]
    fn test_fuse_write_command() {
        let mut s = session_with(DummyTarget::for_device(profile()));
        run_fuse_write(&mut s, 1, 0x1F).unwrap();
        assert_eq!(s.transport().fuse(1), 0x1F);

        // same value again is a no-op
        s.transport_mut().clear_counters();
        run_fuse_write(&mut s, 1, 0x1F).unwrap();
        assert!(s.transport().register_writes().is_empty());
    }

    #[test]
    fn test_userrow_write_on_locked_part() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("urow.hex");
        let row: Vec<u8> = (0..profile().eeprom.page_size).map(|i| i as u8).collect();
        ihex::write_file(&input, &row).unwrap();

        let mut s = session_with(locked_target());
        run_userrow_write(&mut s, &input, true).unwrap();
        assert_eq!(s.transport().userrow(), &row[..]);
        assert!(s.transport().is_locked());
    }

    #[test]
    fn test_userrow_write_verified_on_unlocked_part() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("urow.hex");
        ihex::write_file(&input, &[0xA5; 4]).unwrap();

        let mut s = session_with(DummyTarget::for_device(profile()));
        run_userrow_write(&mut s, &input, true).unwrap();
        assert_eq!(&s.transport().userrow()[..4], &[0xA5; 4]);
        assert_eq!(s.state(), LinkState::ProgMode);
    }
}
