//! Cycle-timed ColecoVision emulator core.
//!
//! The machine is a Z80 at 3.579545 MHz driving a TMS9928A VDP, an SN76489
//! PSG, and — with the Super Game Module expansion — 32 KB of extra RAM and
//! an AY-3-8910 second PSG. Everything is owned by one [`Coleco`] value;
//! the frontend supplies an input-poll callback, an audio callback, and an
//! instruction interpreter, then calls [`Coleco::run_frame`] at the frame
//! rate and reads the framebuffer.
//!
//! The Z80 instruction decoder is not part of this crate: it plugs in
//! behind [`cpu_z80::Interpreter`] and talks to the machine through the
//! four bus hooks.

mod bus;
mod cartridge;
mod coleco;
mod config;
mod error;
pub mod input;
mod mixer;

pub use bus::{ColecoBus, SIZE_BIOS, SIZE_RAM, SIZE_SGMRAM};
pub use cartridge::Cartridge;
pub use coleco::{Coleco, STATE_SIZE};
pub use config::{ColecoConfig, SAMPLE_RATES};
pub use error::ColecoError;
pub use input::{AudioCallback, InputCallback};
pub use mixer::{Mixer, PSG_SAMPLE_RATE};

pub use cpu_z80::{Interpreter, Registers, Z80};
pub use emu_core::Bus;
pub use ti_tms9928a::{Palette, Region};
