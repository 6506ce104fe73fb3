//! The machine: frame scheduler, reset, and save states.
//!
//! # Timing (NTSC)
//!
//! ```text
//! Z80 cycles per frame (2 CPU cycles per 3 VDP cycles):
//!     89,603.5 * 2/3 = 59,735.66667
//! Z80 cycles per scanline:
//!     59,735.66667 / 262 = 227.99873 (~228)
//! PSG cycles per frame (one per 16 CPU cycles):
//!     59,735.66667 / 16 = 3,733.479 (~224 kHz)
//! ```
//!
//! Each scanline the scheduler runs CPU instructions until 228 cycles
//! (minus the residue carried from the previous line) have elapsed, feeding
//! every cycle into the divide-by-16 PSG clock, then renders one VDP line.
//! The fractional cycle is preserved as a residue so the average rate stays
//! exact across frames.

use cpu_z80::{Interpreter, Z80};
use emu_core::{Deserializer, Serializer};
use ti_tms9928a::Region;

use crate::bus::{ColecoBus, SIZE_BIOS, SIZE_RAM, SIZE_SGMRAM};
use crate::cartridge::Cartridge;
use crate::config::{ColecoConfig, SAMPLE_RATES};
use crate::error::ColecoError;
use crate::input::{AudioCallback, InputCallback};
use crate::mixer::Mixer;

/// Z80 cycles per scanline (227.99873 rounded; the residue accounting
/// makes up the difference).
const Z80_CYC_LINE: u32 = 228;

/// PSG clock divider: both sound chips advance once per 16 Z80 cycles.
const DIV_PSG: u32 = 16;

/// Exact size of a serialized machine state in bytes.
pub const STATE_SIZE: usize = SIZE_RAM
    + SIZE_SGMRAM
    + 1 // strobe segment
    + 2 * 2 // controller words
    + 4 * 4 // ROM page offsets
    + ti_sn76489::STATE_LEN
    + gi_ay_3_8910::STATE_LEN
    + ti_tms9928a::STATE_LEN
    + cpu_z80::STATE_LEN;

/// A complete ColecoVision.
pub struct Coleco {
    cpu: Z80,
    bus: ColecoBus,
    mixer: Mixer,
    region: Region,
    /// Cycle credit left over from the previous frame's last scanline.
    extcycs: u32,
    /// Divide-by-16 counter feeding the PSG clocks.
    psgcycs: u32,
}

impl Coleco {
    /// Build a machine from a configuration and an instruction interpreter.
    ///
    /// # Errors
    ///
    /// Rejects a BIOS that is not exactly 8 KB, a sample rate outside the
    /// supported set, or a resampler quality above 10.
    pub fn new(
        config: &ColecoConfig,
        interpreter: Box<dyn Interpreter>,
    ) -> Result<Self, ColecoError> {
        if config.bios.len() != SIZE_BIOS {
            return Err(ColecoError::BiosSize(config.bios.len()));
        }
        if !SAMPLE_RATES.contains(&config.sample_rate) {
            return Err(ColecoError::SampleRate(config.sample_rate));
        }
        if config.resampler_quality > 10 {
            return Err(ColecoError::ResamplerQuality(config.resampler_quality));
        }

        let mut bus = ColecoBus::new(config.bios.clone());
        bus.vdp.set_region(config.region);
        bus.vdp.set_palette(config.palette);

        Ok(Self {
            cpu: Z80::new(interpreter),
            bus,
            mixer: Mixer::new(
                config.sample_rate,
                config.region.frame_rate(),
                config.resampler_quality,
            ),
            region: config.region,
            extcycs: 0,
            psgcycs: 0,
        })
    }

    /// Parse and insert a cartridge image.
    ///
    /// # Errors
    ///
    /// [`ColecoError::RomHeader`] when the image carries no valid boot
    /// signature.
    pub fn load_rom(&mut self, data: &[u8]) -> Result<(), ColecoError> {
        self.bus.cart = Cartridge::load(data)?;
        Ok(())
    }

    /// Reset the system: memory and chips return to power-on state, the
    /// BIOS and cartridge mapping survive.
    pub fn reset(&mut self) {
        self.bus.init();
        self.bus.psg.reset();
        self.bus.sgmpsg.reset();
        self.bus.vdp.reset();
        self.cpu.reset();
        self.extcycs = 0;
        self.psgcycs = 0;
    }

    /// Install the controller poll callback.
    pub fn set_input_callback(&mut self, cb: InputCallback) {
        self.bus.set_input_callback(cb);
    }

    /// Install the audio-ready callback, invoked once per frame.
    pub fn set_audio_callback(&mut self, cb: AudioCallback) {
        self.mixer.set_callback(cb);
    }

    /// Run emulation for one frame.
    pub fn run_frame(&mut self) {
        // Restore the leftover cycle credit from the previous frame
        let mut extcycs = self.extcycs;

        for _ in 0..self.region.scanlines() {
            let reqcycs = Z80_CYC_LINE - extcycs;
            let mut linecycs = 0u32;

            // Run CPU instructions until this scanline's budget is met
            while linecycs < reqcycs {
                // I/O penalties (the SN76489 write stall) count toward the
                // instruction that incurred them
                let itercycs = self.cpu.step(&mut self.bus) + self.bus.take_delay();
                linecycs += itercycs;

                // Catch the PSGs up to the CPU
                for _ in 0..itercycs {
                    self.psgcycs += 1;
                    if self.psgcycs == DIV_PSG {
                        self.psgcycs = 0;
                        self.bus.psg.exec();
                        self.bus.sgmpsg.exec();
                    }
                }

                // A mid-instruction GINT write may have raised the VDP line
                self.bus.poll_nmi(&mut self.cpu.regs);
            }

            extcycs = linecycs - reqcycs;

            // Draw a scanline; entering VBlank raises the interrupt line
            self.bus.vdp.exec();
            self.bus.poll_nmi(&mut self.cpu.regs);
        }

        // Resample the frame's audio and push it to the frontend
        self.mixer.resample(&mut self.bus.psg, &mut self.bus.sgmpsg);

        // Carry the leftover cycle count into the next frame
        self.extcycs = extcycs;
    }

    /// The rendered frame, 272x208 ARGB32 row-major.
    #[must_use]
    pub fn framebuffer(&self) -> &[u32] {
        self.bus.vdp.framebuffer()
    }

    /// The most recent frame of resampled audio.
    #[must_use]
    pub fn audio(&self) -> &[i16] {
        self.mixer.output()
    }

    #[must_use]
    pub fn bus(&self) -> &ColecoBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut ColecoBus {
        &mut self.bus
    }

    #[must_use]
    pub fn cpu(&self) -> &Z80 {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Z80 {
        &mut self.cpu
    }

    #[must_use]
    pub fn region(&self) -> Region {
        self.region
    }

    /// Snapshot the running state into a fixed-size blob.
    #[must_use]
    pub fn state_save(&self) -> Vec<u8> {
        let mut s = Serializer::with_capacity(STATE_SIZE);

        s.push_block(&self.bus.ram);
        s.push_block(&self.bus.sgmram);
        s.push8(self.bus.cseg);
        s.push16(self.bus.ctrl[0]);
        s.push16(self.bus.ctrl[1]);
        for page in self.bus.cart.rompage() {
            s.push32(page);
        }
        self.bus.psg.state_save(&mut s);
        self.bus.sgmpsg.state_save(&mut s);
        self.bus.vdp.state_save(&mut s);
        self.cpu.state_save(&mut s);

        debug_assert_eq!(s.len(), STATE_SIZE);
        s.finish()
    }

    /// Restore a previously saved state. The matching BIOS and cartridge
    /// must already be loaded; only their mapping is part of the state.
    ///
    /// # Errors
    ///
    /// [`ColecoError::StateSize`] when the blob length does not match
    /// [`STATE_SIZE`].
    pub fn state_load(&mut self, data: &[u8]) -> Result<(), ColecoError> {
        if data.len() != STATE_SIZE {
            log::warn!(
                "rejecting save state: {} bytes, expected {STATE_SIZE}",
                data.len()
            );
            return Err(ColecoError::StateSize {
                expected: STATE_SIZE,
                got: data.len(),
            });
        }

        let mut d = Deserializer::new(data);
        d.pop_block(&mut self.bus.ram);
        d.pop_block(&mut self.bus.sgmram);
        self.bus.cseg = d.pop8();
        self.bus.ctrl[0] = d.pop16();
        self.bus.ctrl[1] = d.pop16();
        let mut rompage = [0u32; 4];
        for page in &mut rompage {
            *page = d.pop32();
        }
        self.bus.cart.set_rompage(rompage);
        self.bus.psg.state_load(&mut d);
        self.bus.sgmpsg.state_load(&mut d);
        self.bus.vdp.state_load(&mut d);
        self.cpu.state_load(&mut d);

        Ok(())
    }
}
