//! Device types and catalog
//!
//! This module describes the memory geometry of the supported tinyAVR and
//! megaAVR parts, together with an immutable table of known devices.

mod database;
mod types;

pub use database::*;
pub use types::*;
