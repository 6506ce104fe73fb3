//! Z80 host adapter.
//!
//! This crate owns everything about the CPU that the machine needs to see:
//! the full register file, the latched IRQ/NMI request lines, reset, and the
//! save-state surface. The instruction decoder itself is a separate concern,
//! plugged in behind the [`Interpreter`] trait at construction time — the
//! host routes its memory and I/O traffic through [`emu_core::Bus`] and
//! reports cycles back to the frame scheduler.

mod registers;

pub use registers::Registers;

use emu_core::{Bus, Deserializer, Serializer};

/// Serialized size of the CPU state in bytes.
///
/// Five 16-bit registers, sixteen 8-bit registers, I and R, and eight
/// single-byte interrupt/halt fields.
pub const STATE_LEN: usize = 5 * 2 + 16 + 2 + 8;

/// Instruction decode/execute backend.
///
/// Implementations fetch from `regs.pc`, mutate the register file, drive the
/// bus, service the pending interrupt lines, and return the cycle count of
/// the executed instruction. The emulator core never looks inside.
pub trait Interpreter {
    /// Execute one instruction and return the clock cycles it consumed.
    fn step(&mut self, regs: &mut Registers, bus: &mut dyn Bus) -> u32;
}

/// The Z80 as the machine sees it: registers plus an interpreter.
pub struct Z80 {
    pub regs: Registers,
    interp: Box<dyn Interpreter>,
}

impl Z80 {
    /// Create a CPU driven by the given interpreter backend.
    #[must_use]
    pub fn new(interp: Box<dyn Interpreter>) -> Self {
        Self {
            regs: Registers::new(),
            interp,
        }
    }

    /// Execute one instruction. Returns cycles consumed.
    pub fn step(&mut self, bus: &mut dyn Bus) -> u32 {
        self.interp.step(&mut self.regs, bus)
    }

    /// Latch a non-maskable interrupt. Serviced at the next instruction
    /// boundary by the interpreter.
    pub fn pulse_nmi(&mut self) {
        self.regs.nmi_pending = true;
    }

    /// Latch a maskable interrupt with the given data-bus byte.
    pub fn pulse_irq(&mut self, data: u8) {
        self.regs.irq_pending = true;
        self.regs.irq_data = data;
    }

    /// Reset the register file to power-on values.
    pub fn reset(&mut self) {
        self.regs = Registers::new();
    }

    /// Append the CPU state to a serializer.
    pub fn state_save(&self, s: &mut Serializer) {
        let r = &self.regs;
        s.push16(r.pc);
        s.push16(r.sp);
        s.push16(r.ix);
        s.push16(r.iy);
        s.push16(r.wz);
        s.push8(r.a);
        s.push8(r.f);
        s.push8(r.b);
        s.push8(r.c);
        s.push8(r.d);
        s.push8(r.e);
        s.push8(r.h);
        s.push8(r.l);
        s.push8(r.a_alt);
        s.push8(r.f_alt);
        s.push8(r.b_alt);
        s.push8(r.c_alt);
        s.push8(r.d_alt);
        s.push8(r.e_alt);
        s.push8(r.h_alt);
        s.push8(r.l_alt);
        s.push8(r.i);
        s.push8(r.r);
        s.push8(r.iff_delay);
        s.push8(r.im);
        s.push8(r.irq_data);
        s.push8(u8::from(r.iff1));
        s.push8(u8::from(r.iff2));
        s.push8(u8::from(r.halted));
        s.push8(u8::from(r.irq_pending));
        s.push8(u8::from(r.nmi_pending));
    }

    /// Restore the CPU state from a deserializer.
    pub fn state_load(&mut self, d: &mut Deserializer) {
        let r = &mut self.regs;
        r.pc = d.pop16();
        r.sp = d.pop16();
        r.ix = d.pop16();
        r.iy = d.pop16();
        r.wz = d.pop16();
        r.a = d.pop8();
        r.f = d.pop8();
        r.b = d.pop8();
        r.c = d.pop8();
        r.d = d.pop8();
        r.e = d.pop8();
        r.h = d.pop8();
        r.l = d.pop8();
        r.a_alt = d.pop8();
        r.f_alt = d.pop8();
        r.b_alt = d.pop8();
        r.c_alt = d.pop8();
        r.d_alt = d.pop8();
        r.e_alt = d.pop8();
        r.h_alt = d.pop8();
        r.l_alt = d.pop8();
        r.i = d.pop8();
        r.r = d.pop8();
        r.iff_delay = d.pop8();
        r.im = d.pop8();
        r.irq_data = d.pop8();
        r.iff1 = d.pop8() != 0;
        r.iff2 = d.pop8() != 0;
        r.halted = d.pop8() != 0;
        r.irq_pending = d.pop8() != 0;
        r.nmi_pending = d.pop8() != 0;
    }
}
