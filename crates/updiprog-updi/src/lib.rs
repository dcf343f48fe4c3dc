//! updiprog-updi - UPDI protocol engine
//!
//! This crate drives the Unified Program and Debug Interface of tinyAVR and
//! megaAVR 0/1-series parts over a half-duplex serial link.
//!
//! # Layers
//!
//! - [`phy`]: one byte at a time with echo check, bounded receive
//! - [`link`]: UPDI instructions (LDS/STS, LD/ST ptr, LDCS/STCS, REPEAT, KEY)
//! - [`session`]: handshake, unlock, programming mode, user row write
//! - [`nvm`]: page read/write/verify, fuses, NVM controller commands
//!
//! # Example
//!
//! ```no_run
//! use updiprog_core::device::find_by_name;
//! use updiprog_core::progress::NoProgress;
//! use updiprog_updi::{open, SessionConfig};
//!
//! let profile = find_by_name("t16k").unwrap();
//! let mut session = open("/dev/ttyUSB0", profile, SessionConfig::default())?;
//! session.init()?;
//! if session.enter_progmode()? {
//!     let flash = session.nvm()?.read(&profile.flash, &mut NoProgress)?;
//!     println!("read {} bytes", flash.len());
//! }
//! session.close()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod info;
pub mod link;
pub mod nvm;
pub mod phy;
pub mod protocol;
pub mod session;

#[cfg(feature = "serial")]
pub mod transport;

pub use info::DeviceInfo;
pub use nvm::{FuseWrite, Nvm};
pub use session::{LinkState, SessionConfig, Timings, UpdiSession};

#[cfg(feature = "serial")]
pub use transport::SerialTransport;

/// Open a serial port and create a session on it
#[cfg(feature = "serial")]
pub fn open(
    port: &str,
    profile: &'static updiprog_core::device::DeviceProfile,
    config: SessionConfig,
) -> updiprog_core::Result<UpdiSession<SerialTransport>> {
    let baud = updiprog_core::transport::validate_baud(config.baud)?;
    let transport = SerialTransport::open(port, &updiprog_core::transport::LineSettings::updi(baud))?;
    UpdiSession::new(transport, profile, config)
}
