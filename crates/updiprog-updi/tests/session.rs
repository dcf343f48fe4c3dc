//! Session state machine against the emulated target

use updiprog_core::device::{lookup, DeviceProfile, PartCode};
use updiprog_core::error::{Error, Key, ProtocolError, TransportError};
use updiprog_core::transport::{LineSettings, Transport};
use updiprog_dummy::{DummyConfig, DummyTarget};
use updiprog_updi::{LinkState, SessionConfig, Timings, UpdiSession};

fn profile() -> &'static DeviceProfile {
    lookup(PartCode::T16k)
}

fn config() -> SessionConfig {
    SessionConfig {
        baud: 115200,
        timings: Timings::immediate(),
    }
}

fn session_with(target: DummyTarget) -> UpdiSession<DummyTarget> {
    UpdiSession::new(target, profile(), config()).unwrap()
}

fn session() -> UpdiSession<DummyTarget> {
    session_with(DummyTarget::for_device(profile()))
}

#[test]
fn test_init_ok() {
    let mut s = session();
    assert_eq!(s.state(), LinkState::Cold);
    s.init().unwrap();
    assert_eq!(s.state(), LinkState::Synced);
    assert_eq!(s.transport().double_breaks(), 0);
}

#[test]
fn test_init_recovers_with_one_double_break() {
    let mut cfg = DummyConfig::new(profile());
    cfg.dead_status_reads = 1;
    let mut s = session_with(DummyTarget::new(cfg));
    s.init().unwrap();
    assert_eq!(s.state(), LinkState::Synced);
    assert_eq!(s.transport().double_breaks(), 1);
}

#[test]
fn test_init_fails_after_second_zero_status() {
    let mut cfg = DummyConfig::new(profile());
    cfg.dead_status_reads = 2;
    let mut s = session_with(DummyTarget::new(cfg));
    let err = s.init().unwrap_err();
    assert!(matches!(err, Error::Protocol(ProtocolError::InitFailed)));
    assert_eq!(s.transport().double_breaks(), 1);
    assert_eq!(s.state(), LinkState::Closed);
    assert!(matches!(s.init(), Err(Error::SessionClosed)));
}

#[test]
fn test_init_recovers_from_silent_status() {
    let mut cfg = DummyConfig::new(profile());
    cfg.silent_status_reads = 1;
    let mut s = session_with(DummyTarget::new(cfg));
    s.init().unwrap();
    assert_eq!(s.state(), LinkState::Synced);
    assert_eq!(s.transport().double_breaks(), 1);
}

#[test]
fn test_init_fails_when_status_stays_silent() {
    let mut cfg = DummyConfig::new(profile());
    cfg.silent_status_reads = 2;
    let mut s = session_with(DummyTarget::new(cfg));
    let err = s.init().unwrap_err();
    assert!(matches!(err, Error::Protocol(ProtocolError::InitFailed)));
    assert_eq!(s.transport().double_breaks(), 1);
    assert_eq!(s.state(), LinkState::Closed);
}

#[test]
fn test_init_echo_corruption_is_fatal() {
    let mut target = DummyTarget::for_device(profile());
    // BREAK, SYNC, then the STCS opcode
    target.corrupt_echo_after(2);
    let mut s = session_with(target);
    let err = s.init().unwrap_err();
    assert!(matches!(
        err,
        Error::Transport(TransportError::EchoMismatch { sent: 0xC3, .. })
    ));
    assert_eq!(s.transport().double_breaks(), 0);
    assert_eq!(s.state(), LinkState::Closed);
}

/// Line that swallows everything: no echo, no replies
struct DeadLine {
    writes: usize,
}

impl Transport for DeadLine {
    fn write(&mut self, data: &[u8]) -> updiprog_core::Result<usize> {
        self.writes += data.len();
        Ok(data.len())
    }

    fn read(&mut self, _buf: &mut [u8]) -> updiprog_core::Result<usize> {
        Ok(0)
    }

    fn configure(&mut self, _settings: &LineSettings) -> updiprog_core::Result<()> {
        Ok(())
    }

    fn clear(&mut self) -> updiprog_core::Result<()> {
        Ok(())
    }
}

#[test]
fn test_init_missing_echo_is_fatal() {
    let mut s = UpdiSession::new(DeadLine { writes: 0 }, profile(), config()).unwrap();
    let err = s.init().unwrap_err();
    assert!(matches!(
        err,
        Error::Transport(TransportError::ShortRead {
            expected: 1,
            received: 0
        })
    ));
    // the BREAK went out, nothing after it
    assert_eq!(s.transport().writes, 1);
    assert_eq!(s.state(), LinkState::Closed);
}

#[test]
fn test_rejects_unsupported_baud() {
    let target = DummyTarget::for_device(profile());
    let cfg = SessionConfig {
        baud: 250_000,
        ..config()
    };
    assert!(matches!(
        UpdiSession::new(target, profile(), cfg),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn test_enter_progmode() {
    let mut s = session();
    s.init().unwrap();
    assert!(s.enter_progmode().unwrap());
    assert_eq!(s.state(), LinkState::ProgMode);
    assert!(s.transport().in_progmode());
    assert_eq!(s.transport().keys_written()[0], *b" gorPMVN");

    // second call is a no-op
    assert!(s.enter_progmode().unwrap());
    assert_eq!(s.transport().keys_written().len(), 1);
}

#[test]
fn test_enter_progmode_initializes_cold_link() {
    let mut s = session();
    assert!(s.enter_progmode().unwrap());
    assert_eq!(s.state(), LinkState::ProgMode);
}

#[test]
fn test_locked_part_refuses_progmode_until_erased() {
    let mut cfg = DummyConfig::new(profile());
    cfg.locked = true;
    let mut s = session_with(DummyTarget::new(cfg));
    s.init().unwrap();

    assert!(!s.enter_progmode().unwrap());
    assert_eq!(s.state(), LinkState::Synced);
    assert!(!s.chip_erase_ok());

    s.unlock_erase().unwrap();
    assert_eq!(s.state(), LinkState::Unlocked);
    assert!(s.chip_erase_ok());
    assert!(!s.transport().is_locked());

    assert!(s.enter_progmode().unwrap());
    assert_eq!(s.state(), LinkState::ProgMode);
}

#[test]
fn test_unlock_erase_clears_memory() {
    let mut target = DummyTarget::for_device(profile());
    target.load_memory(profile().flash.start, &[0x12, 0x34]);
    target.load_memory(profile().eeprom.start, &[0x56]);
    let mut s = session_with(target);
    s.unlock_erase().unwrap();
    assert!(s.transport().flash().iter().all(|&b| b == 0xFF));
    assert!(s.transport().eeprom().iter().all(|&b| b == 0xFF));
}

#[test]
fn test_rejected_key_is_fatal() {
    let mut cfg = DummyConfig::new(profile());
    cfg.reject_keys = true;
    let mut s = session_with(DummyTarget::new(cfg));
    s.init().unwrap();
    let err = s.unlock_erase().unwrap_err();
    assert!(matches!(
        err,
        Error::Protocol(ProtocolError::KeyRejected(Key::ChipErase))
    ));
    assert_eq!(s.state(), LinkState::Closed);
    assert!(matches!(s.enter_progmode(), Err(Error::SessionClosed)));
}

#[test]
fn test_rejected_progmode_key_is_not_fatal() {
    let mut cfg = DummyConfig::new(profile());
    cfg.reject_keys = true;
    let mut s = session_with(DummyTarget::new(cfg));
    s.init().unwrap();
    assert!(!s.enter_progmode().unwrap());
    assert_eq!(s.state(), LinkState::Synced);
}

#[test]
fn test_leave_progmode_releases_line() {
    let mut s = session();
    s.init().unwrap();
    assert!(s.enter_progmode().unwrap());
    s.leave_progmode().unwrap();
    assert_eq!(s.state(), LinkState::Cold);
    assert!(s.transport().is_disabled());
    assert!(!s.transport().in_progmode());

    // a fresh handshake brings the link back
    s.init().unwrap();
    assert!(!s.transport().is_disabled());
}

#[test]
fn test_drop_leaves_progmode() {
    let mut target = DummyTarget::for_device(profile());
    {
        let mut s = UpdiSession::new(&mut target, profile(), config()).unwrap();
        s.init().unwrap();
        assert!(s.enter_progmode().unwrap());
    }
    assert!(target.is_disabled());
    assert!(!target.in_progmode());
}

#[test]
fn test_close_leaves_progmode() {
    let mut target = DummyTarget::for_device(profile());
    let mut s = UpdiSession::new(&mut target, profile(), config()).unwrap();
    assert!(s.enter_progmode().unwrap());
    s.close().unwrap();
    assert!(target.is_disabled());
}

#[test]
fn test_userrow_write_on_locked_part() {
    let mut cfg = DummyConfig::new(profile());
    cfg.locked = true;
    let mut s = session_with(DummyTarget::new(cfg));
    s.init().unwrap();

    let data: Vec<u8> = (0..32).map(|i| i * 3).collect();
    s.userrow_write(&data).unwrap();
    assert_eq!(s.transport().userrow(), &data[..]);
    assert!(s.transport().is_locked());
    assert_eq!(s.transport().keys_written()[0], *b"et&sUMVN");
}

#[test]
fn test_userrow_write_wrong_length() {
    let mut s = session();
    s.init().unwrap();
    assert!(matches!(
        s.userrow_write(&[0u8; 31]),
        Err(Error::InvalidArgument(_))
    ));
    // argument errors do not close the session
    assert_eq!(s.state(), LinkState::Synced);
}

#[test]
fn test_echo_corruption_closes_session() {
    let mut s = session();
    s.init().unwrap();
    s.transport_mut().corrupt_echo_after(1);
    let err = s.enter_progmode().unwrap_err();
    assert!(matches!(
        err,
        Error::Transport(TransportError::EchoMismatch { .. })
    ));
    assert_eq!(s.state(), LinkState::Closed);
    assert!(matches!(s.in_progmode(), Err(Error::SessionClosed)));
    assert!(matches!(s.nvm(), Err(Error::SessionClosed)));
}
