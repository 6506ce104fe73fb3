//! Core traits and types shared by the ColecoVision emulator crates.
//!
//! The CPU reaches the outside world only through the [`Bus`] trait; every
//! chip serializes itself through the [`serial`] primitives. Nothing here
//! knows about any particular machine.

mod bus;
pub mod serial;

pub use bus::Bus;
pub use serial::{Deserializer, Serializer};
