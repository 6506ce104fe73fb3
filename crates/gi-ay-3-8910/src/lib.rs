//! General Instrument AY-3-8910 Programmable Sound Generator.
//!
//! The Super Game Module's second sound chip: three square-wave tone
//! generators, a shared 17-bit LFSR noise generator, and a shared envelope
//! generator with 16 shape codes. Clocked once per 16 Z80 cycles alongside
//! the SN76489; every clock mixes one signed 16-bit sample into the frame
//! buffer.
//!
//! # Register map
//!
//! | Reg | Name        | Bits |
//! |-----|-------------|------|
//! | R0  | A fine      | 7-0  |
//! | R1  | A coarse    | 3-0  |
//! | R2  | B fine      | 7-0  |
//! | R3  | B coarse    | 3-0  |
//! | R4  | C fine      | 7-0  |
//! | R5  | C coarse    | 3-0  |
//! | R6  | Noise       | 4-0  |
//! | R7  | Mixer       | 7-0  |
//! | R8  | A amplitude | 4-0  |
//! | R9  | B amplitude | 4-0  |
//! | R10 | C amplitude | 4-0  |
//! | R11 | Env fine    | 7-0  |
//! | R12 | Env coarse  | 7-0  |
//! | R13 | Env shape   | 3-0  |
//! | R14 | Port A      | 7-0  |
//! | R15 | Port B      | 7-0  |
//!
//! R7's enable bits are really *disable* bits, and disabling both tone and
//! noise on a channel does not mute it — only a zero amplitude does.

use emu_core::{Deserializer, Serializer};

/// Serialized size of the chip state in bytes.
pub const STATE_LEN: usize =
    16 + 1 + 3 * 2 + 3 * 2 + 3 + 1 + 2 + 4 + 2 + 2 + 1 + 1 + 1 + 3 + 3 + 3 + 3;

/// Sample buffer capacity, sized like the SN76489's (one frame plus slack).
const BUF_LEN: usize = 4600;

/// Don't-care masks applied on every register write.
const DCMASK: [u8; 16] = [
    0xFF, 0x0F, 0xFF, 0x0F, 0xFF, 0x0F, 0x1F, 0xFF,
    0x1F, 0x1F, 0x1F, 0xFF, 0xFF, 0x0F, 0xFF, 0xFF,
];

/// Amplitude step to output level. Index 0 is silence, 15 full volume.
const VTABLE: [i16; 16] = [
    0, 40, 60, 86, 124, 186, 264, 440,
    518, 840, 1196, 1526, 2016, 2602, 3300, 4096,
];

/// AY-3-8910 state machine.
pub struct Ay38910 {
    /// Raw register file, stored post-mask.
    reg: [u8; 16],
    /// Currently latched register index.
    rlatch: u8,

    /// 12-bit half-period per tone channel, clamped to at least 1.
    tperiod: [u16; 3],
    tcounter: [u16; 3],
    /// Fixed 4-bit amplitude per channel.
    amplitude: [u8; 3],

    /// 5-bit noise period, clamped to at least 1.
    nperiod: u8,
    ncounter: u16,
    /// 17-bit noise shift register.
    nshift: u32,

    eperiod: u16,
    ecounter: u16,
    /// Which half of the envelope shape is playing.
    eseg: u8,
    /// Step within the current segment (0-15).
    estep: u8,
    /// Current envelope volume (0-15).
    evol: u8,

    /// Per-channel disable and envelope-mode bits from R7/R8-R10.
    tdisable: [u8; 3],
    ndisable: [u8; 3],
    emode: [u8; 3],

    /// Square-wave polarity per tone channel.
    sign: [u8; 3],

    buf: Vec<i16>,
}

impl Ay38910 {
    #[must_use]
    pub fn new() -> Self {
        let mut psg = Self {
            reg: [0; 16],
            rlatch: 0,
            tperiod: [0; 3],
            tcounter: [0; 3],
            amplitude: [0; 3],
            nperiod: 0,
            ncounter: 0,
            nshift: 1,
            eperiod: 0,
            ecounter: 0,
            eseg: 0,
            estep: 0,
            evol: 0,
            tdisable: [0; 3],
            ndisable: [0; 3],
            emode: [0; 3],
            sign: [0; 3],
            buf: Vec::with_capacity(BUF_LEN),
        };
        psg.reset();
        psg
    }

    /// Reset every register to its power-on value and clear the buffer.
    pub fn reset(&mut self) {
        self.reg = [0; 16];
        self.rlatch = 0;
        self.tperiod = [0; 3];
        self.tcounter = [0; 3];
        self.amplitude = [0; 3];
        self.nperiod = 0;
        self.ncounter = 0;
        self.nshift = 1;
        self.eperiod = 0;
        self.ecounter = 0;
        self.eseg = 0;
        self.estep = 0;
        self.evol = 0;
        self.tdisable = [0; 3];
        self.ndisable = [0; 3];
        self.emode = [0; 3];
        self.sign = [0; 3];
        self.buf.clear();
    }

    /// Latch the active register index (I/O port 0x50).
    pub fn set_reg(&mut self, r: u8) {
        self.rlatch = r & 0x0F;
    }

    /// Read the currently latched register (I/O port 0x52).
    #[must_use]
    pub fn read(&self) -> u8 {
        self.reg[usize::from(self.rlatch)]
    }

    /// Write to the currently latched register (I/O port 0x51).
    pub fn write(&mut self, data: u8) {
        let r = usize::from(self.rlatch);
        self.reg[r] = data & DCMASK[r];

        match r {
            // Tone periods are 12 bits across a register pair; the lowest
            // usable period is 1
            0 | 1 => {
                self.tperiod[0] = self.tone_period(0).max(1);
            }
            2 | 3 => {
                self.tperiod[1] = self.tone_period(1).max(1);
            }
            4 | 5 => {
                self.tperiod[2] = self.tone_period(2).max(1);
            }
            6 => {
                self.nperiod = self.reg[6].max(1);
            }
            7 => {
                self.tdisable[0] = self.reg[7] & 0x01;
                self.tdisable[1] = (self.reg[7] >> 1) & 0x01;
                self.tdisable[2] = (self.reg[7] >> 2) & 0x01;
                self.ndisable[0] = (self.reg[7] >> 3) & 0x01;
                self.ndisable[1] = (self.reg[7] >> 4) & 0x01;
                self.ndisable[2] = (self.reg[7] >> 5) & 0x01;
            }
            8 | 9 | 10 => {
                self.amplitude[r - 8] = data & 0x0F;
                self.emode[r - 8] = (data >> 4) & 0x01;
            }
            11 | 12 => {
                self.eperiod = u16::from(self.reg[11]) | (u16::from(self.reg[12]) << 8);
            }
            13 => {
                // Writing the shape register restarts the envelope
                self.ecounter = 0;
                self.eseg = 0;
                self.env_reset();
            }
            // R14/R15 are plain I/O data stores
            _ => {}
        }
    }

    fn tone_period(&self, chan: usize) -> u16 {
        u16::from(self.reg[chan * 2]) | (u16::from(self.reg[chan * 2 + 1]) << 8)
    }

    /// Position the envelope volume for the start of a segment.
    fn env_reset(&mut self) {
        self.estep = 0;

        if self.eseg != 0 {
            // Second segment: shapes 8, 11, 13, and 14 restart from the top
            self.evol = match self.reg[13] {
                8 | 11 | 13 | 14 => 15,
                _ => 0,
            };
        } else {
            // First segment: the Attack bit picks the starting end
            self.evol = if self.reg[13] & 0x04 != 0 { 0 } else { 15 };
        }
    }

    /// Run one chip clock (one per 16 Z80 cycles) and mix one sample into
    /// the frame buffer. Returns the number of samples generated.
    pub fn exec(&mut self) -> usize {
        // Tone counters
        for i in 0..3 {
            self.tcounter[i] += 1;
            if self.tcounter[i] >= self.tperiod[i] {
                self.tcounter[i] = 0;
                self.sign[i] ^= 1;
            }
        }

        // Noise counter; the period counts double ticks
        self.ncounter += 1;
        if self.ncounter >= u16::from(self.nperiod) << 1 {
            self.ncounter = 0;
            // 17-bit shift register, input = bit 0 XOR bit 3, output at bit 0
            self.nshift =
                (self.nshift >> 1) | (((self.nshift ^ (self.nshift >> 3)) & 0x01) << 16);
        }

        // Envelope counter. The threshold is compared in 32 bits: a full
        // 16-bit period doubled overflows u16, and the hardware simply
        // never gets there.
        self.ecounter = self.ecounter.wrapping_add(1);
        if u32::from(self.ecounter) >= u32::from(self.eperiod) << 1 {
            self.ecounter = 0;

            /* Shape codes (CONT/ATT/ALT/HOLD in bits 3-0):
               00xx: \____    01xx: /|____
               1000: \|\|\|   1001: \_____   1010: \/\/\/   1011: \|----
               1100: /|/|/|   1101: /-----   1110: /\/\/\   1111: /|____
            */
            // The volume steps wrap: with a zero period and no shape ever
            // written, the hardware free-runs the counter below zero until
            // the first segment ends. Nothing reads it in that window.
            if self.estep != 0 {
                if self.eseg != 0 {
                    match self.reg[13] {
                        10 | 12 => self.evol = self.evol.wrapping_add(1),
                        8 | 14 => self.evol = self.evol.wrapping_sub(1),
                        _ => {} // Hold
                    }
                } else if self.reg[13] & 0x04 != 0 {
                    self.evol = self.evol.wrapping_add(1);
                } else {
                    self.evol = self.evol.wrapping_sub(1);
                }
            }

            self.estep += 1;
            if self.estep >= 16 {
                if self.reg[13] & 0x09 == 0x08 {
                    self.eseg ^= 1;
                } else {
                    // Shapes 0-7, 9, 11, 13, 15 latch into the second segment
                    self.eseg = 1;
                }
                self.env_reset();
            }
        }

        // Mix. Disabling tone and noise does not mute a channel: the output
        // gate is (tdisable | sign) & (ndisable | noise bit), and only a
        // zero amplitude silences it.
        let mut vol: i16 = 0;
        for i in 0..3 {
            let out = (self.tdisable[i] | self.sign[i])
                & (self.ndisable[i] | (self.nshift as u8 & 0x01));
            if out != 0 {
                vol += if self.emode[i] != 0 {
                    // The mask covers the free-running wrap described above
                    VTABLE[usize::from(self.evol & 0x0F)]
                } else {
                    VTABLE[usize::from(self.amplitude[i])]
                };
            }
        }

        self.buf.push(vol);

        1
    }

    /// The samples generated since the last [`reset_buffer`](Self::reset_buffer).
    #[must_use]
    pub fn samples(&self) -> &[i16] {
        &self.buf
    }

    /// Drop the buffered samples; called once per frame by the mixer.
    pub fn reset_buffer(&mut self) {
        self.buf.clear();
    }

    /// Current envelope volume.
    #[doc(hidden)]
    #[must_use]
    pub fn env_volume(&self) -> u8 {
        self.evol
    }

    /// Current noise shift register contents.
    #[doc(hidden)]
    #[must_use]
    pub fn noise_shift(&self) -> u32 {
        self.nshift
    }

    /// Append the chip state to a serializer.
    pub fn state_save(&self, s: &mut Serializer) {
        for i in 0..16 {
            s.push8(self.reg[i]);
        }
        s.push8(self.rlatch);
        for i in 0..3 {
            s.push16(self.tperiod[i]);
        }
        for i in 0..3 {
            s.push16(self.tcounter[i]);
        }
        for i in 0..3 {
            s.push8(self.amplitude[i]);
        }
        s.push8(self.nperiod);
        s.push16(self.ncounter);
        s.push32(self.nshift);
        s.push16(self.eperiod);
        s.push16(self.ecounter);
        s.push8(self.eseg);
        s.push8(self.estep);
        s.push8(self.evol);
        for i in 0..3 {
            s.push8(self.tdisable[i]);
        }
        for i in 0..3 {
            s.push8(self.ndisable[i]);
        }
        for i in 0..3 {
            s.push8(self.emode[i]);
        }
        for i in 0..3 {
            s.push8(self.sign[i]);
        }
    }

    /// Restore the chip state from a deserializer.
    pub fn state_load(&mut self, d: &mut Deserializer) {
        for i in 0..16 {
            self.reg[i] = d.pop8();
        }
        self.rlatch = d.pop8();
        for i in 0..3 {
            self.tperiod[i] = d.pop16();
        }
        for i in 0..3 {
            self.tcounter[i] = d.pop16();
        }
        for i in 0..3 {
            self.amplitude[i] = d.pop8();
        }
        self.nperiod = d.pop8();
        self.ncounter = d.pop16();
        self.nshift = d.pop32();
        self.eperiod = d.pop16();
        self.ecounter = d.pop16();
        self.eseg = d.pop8();
        self.estep = d.pop8();
        self.evol = d.pop8();
        for i in 0..3 {
            self.tdisable[i] = d.pop8();
        }
        for i in 0..3 {
            self.ndisable[i] = d.pop8();
        }
        for i in 0..3 {
            self.emode[i] = d.pop8();
        }
        for i in 0..3 {
            self.sign[i] = d.pop8();
        }
    }
}

impl Default for Ay38910 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_reg(psg: &mut Ay38910, r: u8, v: u8) {
        psg.set_reg(r);
        psg.write(v);
    }

    #[test]
    fn dont_care_bits_are_masked() {
        let mut psg = Ay38910::new();
        write_reg(&mut psg, 1, 0xFF); // Coarse tune keeps 4 bits
        assert_eq!(psg.read(), 0x0F);
        write_reg(&mut psg, 6, 0xFF); // Noise period keeps 5 bits
        assert_eq!(psg.read(), 0x1F);
        write_reg(&mut psg, 13, 0xFF); // Shape keeps 4 bits
        assert_eq!(psg.read(), 0x0F);
    }

    #[test]
    fn tone_period_pairs_combine_and_clamp() {
        let mut psg = Ay38910::new();
        write_reg(&mut psg, 2, 0x34);
        write_reg(&mut psg, 3, 0x02);
        assert_eq!(psg.tperiod[1], 0x0234);

        write_reg(&mut psg, 0, 0x00);
        write_reg(&mut psg, 1, 0x00);
        assert_eq!(psg.tperiod[0], 1, "period 0 clamps to 1");
    }

    #[test]
    fn mixer_register_splits_disable_bits() {
        let mut psg = Ay38910::new();
        write_reg(&mut psg, 7, 0b0010_1001);
        assert_eq!(psg.tdisable, [1, 0, 0]);
        assert_eq!(psg.ndisable, [1, 0, 1]);
    }

    #[test]
    fn amplitude_and_envelope_mode() {
        let mut psg = Ay38910::new();
        write_reg(&mut psg, 9, 0x17);
        assert_eq!(psg.amplitude[1], 0x07);
        assert_eq!(psg.emode[1], 1);
    }

    #[test]
    fn register_read_back() {
        let mut psg = Ay38910::new();
        write_reg(&mut psg, 0, 0xAB);
        psg.set_reg(0);
        assert_eq!(psg.read(), 0xAB);
    }

    #[test]
    fn noise_shift_update_known_vector() {
        let mut psg = Ay38910::new();
        // nperiod defaults to 0 -> clamp path not taken yet; force period 1
        write_reg(&mut psg, 6, 1);
        // Seed is 1: bit 0 XOR bit 3 = 1, so the first update must move the
        // set bit to position 16.
        psg.exec();
        psg.exec();
        assert_eq!(psg.noise_shift(), 0x1_0000);
    }

    #[test]
    fn noise_output_varies() {
        let mut psg = Ay38910::new();
        write_reg(&mut psg, 6, 1);
        let mut saw = [false, false];
        for _ in 0..200 {
            psg.exec();
            saw[(psg.noise_shift() & 1) as usize] = true;
        }
        assert!(saw[0] && saw[1]);
    }

    /// Step the envelope once (one env tick = eperiod << 1 chip clocks).
    fn env_ticks(psg: &mut Ay38910, ticks: usize, per_tick: usize) -> Vec<u8> {
        let mut out = Vec::new();
        for _ in 0..ticks {
            for _ in 0..per_tick {
                psg.exec();
            }
            out.push(psg.env_volume());
        }
        out
    }

    #[test]
    fn envelope_shape_10_triangles() {
        let mut psg = Ay38910::new();
        write_reg(&mut psg, 11, 1);
        write_reg(&mut psg, 12, 0);
        write_reg(&mut psg, 13, 10); // CONT|ALT: \/\/
        let vols = env_ticks(&mut psg, 64, 2);

        // First segment descends 15 -> 0 over 16 steps
        assert_eq!(vols[0], 15, "step 0 holds the reset value");
        assert_eq!(vols[15], 0);
        // Second segment ascends back to 15
        assert_eq!(vols[31], 15);
        // And the pattern repeats
        assert_eq!(vols[47], 0);
        assert_eq!(vols[63], 15);
    }

    #[test]
    fn envelope_shape_8_saws_down() {
        let mut psg = Ay38910::new();
        write_reg(&mut psg, 11, 1);
        write_reg(&mut psg, 13, 8); // CONT: \|\|
        let vols = env_ticks(&mut psg, 32, 2);
        assert_eq!(vols[1], 14);
        assert_eq!(vols[14], 1, "bottom of the ramp");
        // The wrap tick reaches 0 and restarts from the top in one step
        assert_eq!(vols[15], 15);
        assert_eq!(vols[30], 1);
        assert_eq!(vols[31], 15);
    }

    #[test]
    fn envelope_shape_11_holds_high() {
        let mut psg = Ay38910::new();
        write_reg(&mut psg, 11, 1);
        write_reg(&mut psg, 13, 11); // \| then hold at 15
        let vols = env_ticks(&mut psg, 48, 2);
        assert_eq!(vols[14], 1, "ramp still descending");
        assert!(vols[15..].iter().all(|&v| v == 15));
    }

    #[test]
    fn envelope_shape_0_one_shot() {
        let mut psg = Ay38910::new();
        write_reg(&mut psg, 11, 1);
        write_reg(&mut psg, 13, 0); // \___
        let vols = env_ticks(&mut psg, 48, 2);
        assert_eq!(vols[15], 0);
        assert!(vols[16..].iter().all(|&v| v == 0));
    }

    #[test]
    fn channel_gate_identity() {
        let mut psg = Ay38910::new();
        // Disable tone and noise on channel A; amplitude max.
        write_reg(&mut psg, 7, 0b0000_1001);
        write_reg(&mut psg, 8, 0x0F);
        psg.exec();
        // Both disables high force the gate open: constant full volume.
        assert_eq!(psg.samples()[0], VTABLE[15]);
    }

    #[test]
    fn zero_amplitude_mutes() {
        let mut psg = Ay38910::new();
        write_reg(&mut psg, 7, 0b0000_1001);
        write_reg(&mut psg, 8, 0x00);
        for _ in 0..16 {
            psg.exec();
        }
        assert!(psg.samples().iter().all(|&s| s == 0));
    }

    #[test]
    fn state_round_trip() {
        let mut psg = Ay38910::new();
        write_reg(&mut psg, 0, 0x55);
        write_reg(&mut psg, 1, 0x02);
        write_reg(&mut psg, 7, 0x38);
        write_reg(&mut psg, 8, 0x1F);
        write_reg(&mut psg, 11, 3);
        write_reg(&mut psg, 13, 12);
        for _ in 0..500 {
            psg.exec();
        }

        let mut s = Serializer::with_capacity(STATE_LEN);
        psg.state_save(&mut s);
        let blob = s.finish();
        assert_eq!(blob.len(), STATE_LEN);

        let mut other = Ay38910::new();
        let mut d = Deserializer::new(&blob);
        other.state_load(&mut d);

        let mut s2 = Serializer::with_capacity(STATE_LEN);
        other.state_save(&mut s2);
        assert_eq!(s2.finish(), blob);
    }
}
