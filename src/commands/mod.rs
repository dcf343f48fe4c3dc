//! CLI command implementations
//!
//! ## Device commands
//!
//! The `device` module opens a UPDI session on the serial port, brings the
//! target into programming mode and always releases it again, whether the
//! command succeeded or not.
//!
//! ## Hex utilities
//!
//! The `hex` module wraps the offline Intel HEX tools. These never touch
//! a serial port.

pub mod device;
pub mod hex;
mod list;
mod progress;

pub use list::list_parts;
pub use progress::IndicatifProgress;
