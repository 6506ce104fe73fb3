//! ColecoVision memory and I/O bus.
//!
//! Memory map:
//!
//! ```text
//! 0x0000 - 0x1FFF: BIOS ROM (SGM RAM when the lower overlay is armed)
//! 0x2000 - 0x3FFF: expansion port (SGM RAM when the upper overlay is on)
//! 0x4000 - 0x5FFF: expansion port (SGM RAM when the upper overlay is on)
//! 0x6000 - 0x7FFF: 1 KB system RAM mirrored every 1 KB
//! 0x8000 - 0xFFFF: cartridge ROM, four 8 KB pages
//! ```
//!
//! I/O map (decoded on the top three port bits):
//!
//! ```text
//! 0x80 - 0x9F: write: strobe segment to keypad/right-fire
//! 0xA0 - 0xBF: VDP (odd: status/control, even: VRAM data)
//! 0xC0 - 0xDF: write: strobe segment to joystick/left-fire
//! 0xE0 - 0xFF: read: controllers; write: SN76489
//! ```
//!
//! Ports 0x50-0x53 and 0x7F belong to the Super Game Module: AY register
//! select/write/read and the two RAM overlay enables.

use cpu_z80::Registers;
use emu_core::Bus;
use gi_ay_3_8910::Ay38910;
use rand::Rng;
use ti_sn76489::Sn76489;
use ti_tms9928a::Vdp;

use crate::cartridge::Cartridge;
use crate::input::InputCallback;

/// System RAM size: a single mirrored kilobyte.
pub const SIZE_RAM: usize = 0x400;
/// Super Game Module RAM size.
pub const SIZE_SGMRAM: usize = 0x8000;
/// BIOS ROM size.
pub const SIZE_BIOS: usize = 0x2000;

/// Extra Z80 cycles charged for an SN76489 write. The chip holds the bus
/// for roughly 32 cycles while it latches; without the charge, games that
/// play PCM by hammering the volume register run audibly fast.
const PSG_WRITE_DELAY: u32 = 48;

/// The bus: memory, cartridge, sound chips, video chip, and controllers.
pub struct ColecoBus {
    bios: Vec<u8>,
    pub(crate) ram: [u8; SIZE_RAM],
    pub(crate) sgmram: Vec<u8>,

    /// Lower overlay: SGM RAM replaces the BIOS mapping.
    sgm_lower: bool,
    /// Upper overlay: SGM RAM fills 0x2000-0x7FFF. Armed once, never
    /// cleared (the hardware offers no disable path).
    sgm_upper: bool,

    /// Controller strobe segment flip-flop.
    pub(crate) cseg: u8,
    /// Latched controller words from the last poll.
    pub(crate) ctrl: [u16; 2],

    pub cart: Cartridge,
    pub vdp: Vdp,
    pub psg: Sn76489,
    pub sgmpsg: Ay38910,

    input_cb: Option<InputCallback>,
    /// Cycle penalty accumulated by I/O traffic, drained into the current
    /// instruction's cycle count by the scheduler.
    delay: u32,
}

impl ColecoBus {
    /// Build the bus around a validated 8 KB BIOS image.
    #[must_use]
    pub fn new(bios: Vec<u8>) -> Self {
        let mut bus = Self {
            bios,
            ram: [0; SIZE_RAM],
            sgmram: vec![0; SIZE_SGMRAM],
            sgm_lower: false,
            sgm_upper: false,
            cseg: 0,
            ctrl: [0; 2],
            cart: Cartridge::empty(),
            vdp: Vdp::new(),
            psg: Sn76489::new(),
            sgmpsg: Ay38910::new(),
            input_cb: None,
            delay: 0,
        };
        bus.init();
        bus
    }

    /// Set memory and I/O state to power-on defaults. The BIOS and any
    /// loaded cartridge survive.
    pub(crate) fn init(&mut self) {
        // Fill RAM with garbage. Some software relies on non-zero data at
        // boot (Yolk's on You, possibly more); every real console wakes up
        // with its own indeterminate pattern.
        rand::rng().fill(&mut self.ram[..]);

        self.sgmram.fill(0xFF);

        self.cseg = 0;
        self.ctrl = [0; 2];
        self.sgm_lower = false;
        self.sgm_upper = false;
        self.delay = 0;
    }

    /// Install the controller poll callback.
    pub fn set_input_callback(&mut self, cb: InputCallback) {
        self.input_cb = Some(cb);
    }

    /// Drain the I/O cycle penalty charged since the last call.
    pub(crate) fn take_delay(&mut self) -> u32 {
        let d = self.delay;
        self.delay = 0;
        d
    }

    #[must_use]
    pub fn sgm_lower(&self) -> bool {
        self.sgm_lower
    }

    #[must_use]
    pub fn sgm_upper(&self) -> bool {
        self.sgm_upper
    }

    fn mem_rd(&mut self, addr: u16) -> u8 {
        if self.sgm_lower && addr < 0x2000 {
            self.sgmram[usize::from(addr)]
        } else if addr < 0x2000 {
            self.bios[usize::from(addr)]
        } else if self.sgm_upper && addr < 0x8000 {
            self.sgmram[usize::from(addr)]
        } else if addr < 0x6000 {
            // Expansion port with nothing plugged in
            0xFF
        } else if addr < 0x8000 {
            self.ram[usize::from(addr & 0x3FF)]
        } else {
            self.cart.read(addr)
        }
    }

    fn mem_wr(&mut self, addr: u16, data: u8) {
        // With the Super Game Module armed, writes that would land in the
        // BIOS or expansion regions go to SGM RAM instead; ROM stays silent
        if self.sgm_lower && addr < 0x2000 {
            self.sgmram[usize::from(addr)] = data;
        } else if self.sgm_upper && addr > 0x1FFF && addr < 0x8000 {
            self.sgmram[usize::from(addr)] = data;
        } else if addr > 0x5FFF && addr < 0x8000 {
            self.ram[usize::from(addr & 0x3FF)] = data;
        }
    }

    fn io_rd(&mut self, port: u8) -> u8 {
        match port & 0xE0 {
            0xA0 => {
                if port & 0x01 != 0 {
                    self.vdp.rd_stat()
                } else {
                    self.vdp.rd_data()
                }
            }
            0xE0 => {
                // Strobe a controller port and answer with the complement
                // of the selected segment
                let p = usize::from((port & 0x02) >> 1);
                self.ctrl[p] = match self.input_cb.as_mut() {
                    Some(cb) => cb(p),
                    None => 0,
                };

                if self.cseg != 0 {
                    !((self.ctrl[p] >> 8) as u8) // Joystick, left fire
                } else {
                    !(self.ctrl[p] as u8) // Keypad, right fire
                }
            }
            _ => {
                if port == 0x52 {
                    self.sgmpsg.read()
                } else {
                    0xFF
                }
            }
        }
    }

    fn io_wr(&mut self, port: u8, data: u8) {
        match port & 0xE0 {
            // The strobe writes ignore the data byte: they just flip the
            // segment flip-flop
            0x80 => self.cseg = 0,
            0xC0 => self.cseg = 1,
            0xA0 => {
                if port & 0x01 != 0 {
                    self.vdp.wr_ctrl(data);
                } else {
                    self.vdp.wr_data(data);
                }
            }
            0xE0 => {
                self.delay += PSG_WRITE_DELAY;
                self.psg.write(data);
            }
            _ => match port {
                0x50 => self.sgmpsg.set_reg(data & 0x0F),
                0x51 => self.sgmpsg.write(data),
                0x53 => self.sgm_upper = true,
                0x7F => self.sgm_lower = !data & 0x02 != 0,
                _ => {}
            },
        }
    }

    /// Drain the VDP interrupt line into the CPU's NMI latch.
    pub(crate) fn poll_nmi(&mut self, regs: &mut Registers) {
        if self.vdp.take_nmi() {
            regs.nmi_pending = true;
        }
    }
}

impl Bus for ColecoBus {
    fn read_byte(&mut self, addr: u16) -> u8 {
        self.mem_rd(addr)
    }

    fn write_byte(&mut self, addr: u16, data: u8) {
        self.mem_wr(addr, data);
    }

    fn io_read(&mut self, port: u8) -> u8 {
        self.io_rd(port)
    }

    fn io_write(&mut self, port: u8, data: u8) {
        self.io_wr(port, data);
    }
}
