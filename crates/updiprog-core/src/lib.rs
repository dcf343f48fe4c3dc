//! updiprog-core - Core library for UPDI programming
//!
//! This crate holds the parts of the programmer that do not talk to a
//! target: the Intel HEX codec and file utilities, memory images, the
//! device catalog, and the traits the protocol engine is built on.
//!
//! # Example
//!
//! ```ignore
//! use updiprog_core::{device, ihex};
//!
//! let dev = device::find_by_name("t16k").unwrap();
//! let hex = ihex::read_file("firmware.hex", dev.flash.size as usize)?;
//! println!("{} bytes at {:?}", hex.total_bytes, hex.range);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod device;
pub mod error;
pub mod ihex;
pub mod image;
pub mod progress;
pub mod retry;
pub mod transport;

pub use error::{Error, Result};
