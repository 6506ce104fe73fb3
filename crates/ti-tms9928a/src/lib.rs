//! Texas Instruments TMS9928A Video Display Processor.
//!
//! 16 KB of VRAM behind a two-step control port, eight write-only control
//! registers, one read-only status register, and a scanline renderer for the
//! four screen modes the console uses (Graphics 1, Graphics 2, Multicolor,
//! Text). One [`exec`](Vdp::exec) call renders one scanline into the owned
//! 272x208 ARGB32 framebuffer (256x192 playfield plus 8 pixels of overscan
//! on every side).
//!
//! # Control registers
//!
//! ```text
//!     |----------------------------------------------------------------|
//! Bit |7       6       5       4       3       2       1       0       |
//! Reg |----------------------------------------------------------------|
//! 0   |-       -       -       -       -       -       M2      EXTVID  |
//! 1   |4/16K   BL      GINT    M1      M3      -       SI      MAG     |
//! 2   |-       -       -       -       PN13    PN12    PN11    PN10    |
//! 3   |CT13    CT12    CT11    CT10    CT9     CT8     CT7     CT6     |
//! 4   |-       -       -       -       -       PG13    PG12    PG11    |
//! 5   |-       SA13    SA12    SA11    SA10    SA9     SA8     SA7     |
//! 6   |-       -       -       -       -       SG13    SG12    SG11    |
//! 7   |TC3     TC2     TC1     TC0     BD3     BD2     BD1     BD0     |
//!     |----------------------------------------------------------------|
//! ```
//!
//! The VBlank interrupt is a latched line: the scheduler drains it with
//! [`take_nmi`](Vdp::take_nmi) and pulses the CPU, which keeps the chip free
//! of any backreference into the rest of the machine.

mod palette;

pub use palette::{Palette, SYOUNG, TEATIME};

use emu_core::{Deserializer, Serializer};

/// Overscan border width in pixels, applied to all four sides.
pub const OVERSCAN: usize = 8;
/// Active playfield width in pixels.
pub const WIDTH: usize = 256;
/// Active playfield height in pixels.
pub const HEIGHT: usize = 192;
/// Output width including overscan.
pub const WIDTH_OVERSCAN: usize = 272;
/// Output height including overscan.
pub const HEIGHT_OVERSCAN: usize = 208;

/// VRAM size in bytes.
pub const SIZE_VRAM: usize = 0x4000;

/// Serialized size of the VDP state in bytes.
pub const STATE_LEN: usize = 2 + 2 + SIZE_VRAM + 2 + 1 + 1 + 8 + 1 + 5 * 2;

/// Masks to keep "Don't Care" bits out of the control registers.
const DCMASK: [u8; 8] = [0x03, 0xFB, 0x0F, 0xFF, 0x07, 0x7F, 0x07, 0xFF];

/// Video standard. The chip renders 192 visible lines either way; the
/// standards differ in total line count and frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Region {
    #[default]
    Ntsc,
    Pal,
}

impl Region {
    /// Total scanlines per frame (262 NTSC, 313 PAL).
    #[must_use]
    pub fn scanlines(self) -> u16 {
        match self {
            Self::Ntsc => 262,
            Self::Pal => 313,
        }
    }

    /// Frames per second (60 NTSC, 50 PAL).
    #[must_use]
    pub fn frame_rate(self) -> u32 {
        match self {
            Self::Ntsc => 60,
            Self::Pal => 50,
        }
    }
}

/// TMS9928A state machine and renderer.
pub struct Vdp {
    /// Line currently being drawn.
    line: u16,
    /// Dot cursor within the line.
    dot: u16,
    vram: Vec<u8>,
    /// 14-bit VRAM address register.
    addr: u16,
    /// General purpose data latch (read-ahead buffer and first control byte).
    dlatch: u8,
    /// Write-step latch: nonzero after the first byte of a control pair.
    wlatch: u8,
    /// Eight write-only control registers.
    ctrl: [u8; 8],
    /// Read-only status register (INT 0x80, 5S 0x40, C 0x20, FS 0x1F).
    stat: u8,

    // Derived table base addresses
    tbl_col: u16,
    tbl_pgen: u16,
    tbl_pname: u16,
    tbl_sattr: u16,
    tbl_spgen: u16,

    /// Latched VBlank/GINT interrupt request.
    nmi_line: bool,

    numscanlines: u16,
    palette: Palette,
    fb: Vec<u32>,
}

impl Vdp {
    #[must_use]
    pub fn new() -> Self {
        let mut vdp = Self {
            line: 0,
            dot: 0,
            vram: vec![0; SIZE_VRAM],
            addr: 0,
            dlatch: 0,
            wlatch: 0,
            ctrl: [0; 8],
            stat: 0,
            tbl_col: 0,
            tbl_pgen: 0,
            tbl_pname: 0,
            tbl_sattr: 0,
            tbl_spgen: 0,
            nmi_line: false,
            numscanlines: Region::Ntsc.scanlines(),
            palette: Palette::Teatime,
            fb: vec![0xFF00_0000; WIDTH_OVERSCAN * HEIGHT_OVERSCAN],
        };
        vdp.reset();
        vdp
    }

    /// Reset registers, VRAM, and latches to power-on values. Region and
    /// palette selection survive a reset.
    pub fn reset(&mut self) {
        self.line = 0;
        self.dot = 0;
        self.ctrl = [0; 8];
        self.stat = 0;
        self.vram.fill(0);
        self.addr = 0;
        self.dlatch = 0;
        self.wlatch = 0;
        self.nmi_line = false;

        self.tbl_col = u16::from(self.ctrl[3]) << 6;
        self.tbl_pname = u16::from(self.ctrl[2]) << 10;
        self.tbl_pgen = u16::from(self.ctrl[4]) << 11;
        self.tbl_sattr = u16::from(self.ctrl[5]) << 7;
        self.tbl_spgen = u16::from(self.ctrl[6]) << 11;
    }

    /// Select the video standard.
    pub fn set_region(&mut self, region: Region) {
        self.numscanlines = region.scanlines();
    }

    /// Select the output palette.
    pub fn set_palette(&mut self, palette: Palette) {
        self.palette = palette;
    }

    /// The rendered frame, 272x208 ARGB32 row-major.
    #[must_use]
    pub fn framebuffer(&self) -> &[u32] {
        &self.fb
    }

    /// Drain the latched interrupt line.
    pub fn take_nmi(&mut self) -> bool {
        let nmi = self.nmi_line;
        self.nmi_line = false;
        nmi
    }

    /// Current scanline.
    #[must_use]
    pub fn line(&self) -> u16 {
        self.line
    }

    #[must_use]
    pub fn vram(&self) -> &[u8] {
        &self.vram
    }

    pub fn vram_mut(&mut self) -> &mut [u8] {
        &mut self.vram
    }

    fn addr_inc(&mut self) {
        self.addr = (self.addr + 1) & 0x3FFF;
    }

    /// BL bit: rendering enabled.
    fn rendering(&self) -> bool {
        self.ctrl[1] & 0x40 != 0
    }

    /// GINT bit in control register 1.
    fn gint(&self) -> bool {
        self.ctrl[1] & 0x20 != 0
    }

    /// INT bit in the status register.
    fn int(&self) -> bool {
        self.stat & 0x80 != 0
    }

    /// Current backdrop colour.
    fn bdcol(&self) -> u32 {
        self.palette.table()[usize::from(self.ctrl[7] & 0x0F)]
    }

    /// Paint one full framebuffer row (raw row index, overscan included).
    fn bd_line(&mut self, row: usize) {
        let bd = self.bdcol();
        self.fb[row * WIDTH_OVERSCAN..(row + 1) * WIDTH_OVERSCAN].fill(bd);
    }

    /// Plot one pixel at playfield line `line`, raw dot `dot`.
    fn pixel(&mut self, c: u32, line: u16, dot: u16) {
        self.fb[(usize::from(line) + OVERSCAN) * WIDTH_OVERSCAN + usize::from(dot)] = c;
    }

    /// Read the VRAM data port: returns the latch, refills it, bumps the
    /// address. Also clears an interrupted control-write pair.
    pub fn rd_data(&mut self) -> u8 {
        self.wlatch = 0;
        let rb = self.dlatch;
        self.dlatch = self.vram[usize::from(self.addr)];
        self.addr_inc();
        rb
    }

    /// Read the status register: returns the old value, then clears the
    /// INT, 5S, and C flags and the control-write latch.
    pub fn rd_stat(&mut self) -> u8 {
        self.wlatch = 0;
        let sr = self.stat;
        self.stat &= 0x1F;
        sr
    }

    fn wr_reg(&mut self, rnum: usize, data: u8) {
        let old_gint = self.gint();

        self.ctrl[rnum] = data & DCMASK[rnum];

        // Registers 2-6 hold table base addresses; the shifts build the
        // 14-bit VRAM offset from the register value
        match rnum {
            1 => {
                // Fire NMI if the Status INT bit is already set and the GINT
                // bit just turned on
                if self.int() && self.gint() && !old_gint {
                    self.nmi_line = true;
                }
            }
            2 => self.tbl_pname = u16::from(self.ctrl[2]) << 10,
            3 => self.tbl_col = u16::from(self.ctrl[3]) << 6,
            4 => self.tbl_pgen = u16::from(self.ctrl[4]) << 11,
            5 => self.tbl_sattr = u16::from(self.ctrl[5]) << 7,
            6 => self.tbl_spgen = u16::from(self.ctrl[6]) << 11,
            // Modes (0) and colours (7) are sampled by the render routines
            _ => {}
        }
    }

    /// Write the control port (odd I/O addresses).
    pub fn wr_ctrl(&mut self, data: u8) {
        if self.wlatch != 0 {
            // Second write: combine the 14-bit address and dispatch
            self.wlatch = 0;

            let upper = u16::from(data & 0x3F) << 8;
            self.addr = upper | u16::from(self.dlatch);

            match data & 0xC0 {
                0x00 => {
                    // VRAM read: prime the data latch
                    self.dlatch = self.vram[usize::from(self.addr)];
                    self.addr_inc();
                }
                0x80 => self.wr_reg(usize::from(data & 0x07), self.dlatch),
                _ => {}
            }
        } else {
            // First write: lower address byte into the latch
            self.wlatch = 1;
            self.addr = (self.addr & 0x3F00) | u16::from(data);
            self.dlatch = data;
        }
    }

    /// Write the VRAM data port (even I/O addresses).
    pub fn wr_data(&mut self, data: u8) {
        self.wlatch = 0;
        self.dlatch = data;
        self.vram[usize::from(self.addr)] = data;
        self.addr_inc();
    }

    /// Draw a single line of background pixels.
    fn bg_line(&mut self) {
        let pal = self.palette.table();
        let bdcol = self.bdcol();

        let srow = usize::from(self.line >> 3); // Screen row (0-23)
        let prow = usize::from(self.line & 0x07); // Pattern row (0-7)

        // Screen mode: M1 | M2 | M3
        let scrmode =
            ((self.ctrl[1] & 0x10) >> 4) | (self.ctrl[0] & 0x02) | ((self.ctrl[1] & 0x08) >> 1);

        // In Mode 2 only PG13 positions the Pattern Generator (0x0000 or
        // 0x2000); the low register bits become an AND mask instead
        let offset_pgen = usize::from(self.ctrl[4] & 0x04) << 11;

        if scrmode == 0x01 {
            // Text mode: 40 cells of 6x8, register 7's high nibble is the
            // ink for every cell
            let fg = pal[usize::from((self.ctrl[7] >> 4) & 0x0F)];
            let bg = bdcol;

            // 16 pixel borders on both sides
            for p in 0..(OVERSCAN << 1) as u16 {
                self.pixel(bdcol, self.line, self.dot);
                self.dot += 1;
                self.pixel(bdcol, self.line, p + 256);
            }

            for i in 0..40 {
                let name = usize::from(self.vram[usize::from(self.tbl_pname) + srow * 40 + i]);
                let pat = self.vram[usize::from(self.tbl_pgen) + (name << 3) + prow];

                // Only the top 6 bits of the pattern are displayed
                let mut p = 0x80u8;
                while p > 0x02 {
                    self.pixel(if pat & p != 0 { fg } else { bg }, self.line, self.dot);
                    self.dot += 1;
                    p >>= 1;
                }
            }

            self.dot = 0;
            return;
        }

        // Left overscan
        for _ in 0..OVERSCAN {
            self.pixel(bdcol, self.line, self.dot);
            self.dot += 1;
        }

        // Graphics 1/2 and Multicolor: 32 tiles of 8 pixels
        for i in 0..32 {
            let mut chpat = 0u8;
            let mut pindex = 0u8;

            if scrmode == 0x00 {
                // Graphics 1
                let name = usize::from(self.vram[usize::from(self.tbl_pname) + (srow << 5) + i]);
                chpat = self.vram[usize::from(self.tbl_pgen) + (name << 3) + prow];
                pindex = self.vram[usize::from(self.tbl_col) + (name >> 3)];
            } else if scrmode == 0x02 {
                // Graphics 2: the name index grows by 0x100 per screen third
                let mut name =
                    usize::from(self.vram[usize::from(self.tbl_pname) + (srow << 5) + i]);
                name += (srow & 0x18) << 5;
                let offset_col = usize::from(self.tbl_col) & 0x2000;

                // Register 4 bits 1-0 mask the top two bits of the 10-bit
                // character number for pattern lookup; register 3 bits 6-0
                // mask its top seven bits for colour lookup
                let m1 = (usize::from(self.ctrl[4] & 0x03) << 8) | 0xFF;
                let m2 = (usize::from(self.ctrl[3] & 0x7F) << 3) | 0x07;

                chpat = self.vram[offset_pgen + ((name & m1) << 3) + prow];
                pindex = self.vram[offset_col + ((name & m2) << 3) + prow];
            } else if scrmode == 0x04 {
                // Multicolor: two pattern bytes give four 4x4 colour blocks;
                // the high nibble colours the left half, the low the right
                let name = usize::from(self.vram[usize::from(self.tbl_pname) + (srow << 5) + i]);
                let offset_col = offset_pgen
                    + (name << 3)
                    + ((srow & 0x03) << 1)
                    + usize::from(self.line & 0x04 != 0);

                let pindex = self.vram[offset_col];

                let left = if pindex >> 4 != 0 {
                    pal[usize::from(pindex >> 4)]
                } else {
                    bdcol
                };
                let right = if pindex & 0x0F != 0 {
                    pal[usize::from(pindex & 0x0F)]
                } else {
                    bdcol
                };

                for _ in 0..4 {
                    self.pixel(left, self.line, self.dot);
                    self.dot += 1;
                }
                for _ in 0..4 {
                    self.pixel(right, self.line, self.dot);
                    self.dot += 1;
                }

                continue;
            }

            // Palette entry 0 shows the backdrop
            let bg = if pindex & 0x0F != 0 {
                pal[usize::from(pindex & 0x0F)]
            } else {
                bdcol
            };
            let fg = if pindex >> 4 != 0 {
                pal[usize::from(pindex >> 4)]
            } else {
                bdcol
            };

            let mut p = 0x80u8;
            while p > 0x00 {
                self.pixel(if chpat & p != 0 { fg } else { bg }, self.line, self.dot);
                self.dot += 1;
                p >>= 1;
            }
        }

        // Right overscan
        for _ in 0..OVERSCAN {
            self.pixel(bdcol, self.line, self.dot);
            self.dot += 1;
        }

        self.dot = 0;
    }

    /// Draw a single line of sprite pixels.
    fn sprite_line(&mut self) {
        let sprmag = i32::from(self.ctrl[1] & 0x01); // Pixels doubled
        let sprsize: i32 = if self.ctrl[1] & 0x02 != 0 { 16 } else { 8 };

        let mut numspr = 0;
        let line = i32::from(self.line);

        // Palette entries for this line, and a separate coincidence buffer:
        // a sprite pixel whose palette entry is 0 is invisible but still
        // participates in collision detection.
        let mut linebuf = [0u8; WIDTH];
        let mut cbuf = [0u8; WIDTH];

        for i in 0..32u16 {
            /* Sprite Attribute Table entry:
               byte 0: Y position ("partially signed"; 208 ends the table)
               byte 1: X position
               byte 2: pattern name
               byte 3: EC bit (0x80) and colour code (0x0F)
            */
            let base = usize::from(self.tbl_sattr + i * 4);
            let mut y = i32::from(self.vram[base]);
            let mut x = i32::from(self.vram[base + 1]);
            let mut pname = usize::from(self.vram[base + 2]);
            let c = self.vram[base + 3];

            // The FS field always tracks the walk; it only means anything
            // once the 5S bit is set alongside it.
            self.stat = (self.stat & !0x1F) | (i as u8 & 0x1F);

            // Early Clock: shift the sprite 32 pixels left so it can enter
            // from the left edge
            if c & 0x80 != 0 {
                x -= 32;
            }

            // Y of 208 stops the whole table
            if y == 208 {
                break;
            }

            // 255 means -1: sprites bleed in from the top edge
            if y > 224 {
                y -= 256;
            }
            y += 1;

            // Skip sprites whose vertical extent misses this line
            if y > line || y + (sprsize << sprmag) <= line {
                continue;
            }

            numspr += 1;
            if numspr == 5 {
                // Only four sprites per line; flag the fifth and stop
                self.stat |= 0x40;
                break;
            }

            // 16x16 sprites use four consecutive 8-byte patterns
            if sprsize == 16 {
                pname &= 0xFC;
            }

            let srow = usize::try_from((line - y) >> sprmag).unwrap_or(0);

            let mut sppat = self.vram[usize::from(self.tbl_spgen) + (pname << 3) + srow];

            for p in 0..(sprsize << sprmag) {
                let col = x + p;

                // Skip pixels that are off screen, or the whole sprite if
                // the colour byte is zero
                if col < -sprsize || col >= WIDTH as i32 || c == 0 {
                    continue;
                }

                // Right half of a 16x16 sprite is 16 bytes further in
                if sprsize == 16 && p == (8 << sprmag) {
                    sppat =
                        self.vram[(usize::from(self.tbl_spgen) + (pname << 3) + srow) | 0x10];
                }

                if sppat & (0x80 >> ((p >> sprmag) & 7)) != 0 {
                    // Columns left of the screen edge never reach the
                    // buffers
                    let Ok(col) = usize::try_from(col) else {
                        continue;
                    };

                    if cbuf[col] != 0 {
                        // Two sprites met here
                        self.stat |= 0x20;
                    } else {
                        linebuf[col] = c & 0x0F;
                        // Coincidence is tracked even for transparent pixels
                        cbuf[col] = 1;
                    }
                }
            }
        }

        // Composite non-transparent sprite pixels over the background
        let pal = self.palette.table();
        for i in 0..WIDTH {
            if linebuf[i] != 0 {
                self.pixel(
                    pal[usize::from(linebuf[i])],
                    self.line,
                    (i + OVERSCAN) as u16,
                );
            }
        }
    }

    /// Render one scanline and advance the beam.
    pub fn exec(&mut self) {
        if self.rendering() && self.line < HEIGHT as u16 {
            self.bg_line();
            if self.ctrl[1] & 0x10 == 0 {
                // No sprites in Text mode
                self.sprite_line();
            }
        } else if self.line < HEIGHT as u16 {
            self.bd_line(usize::from(self.line) + OVERSCAN);
        }

        self.line += 1;

        if self.line == HEIGHT as u16 {
            // Entering VBlank
            let old_int = self.int();
            self.stat |= 0x80;

            // Hold the NMI if the INT bit was still set from last frame: the
            // service routine has not read the status register yet
            if self.gint() && !old_int {
                self.nmi_line = true;
            }
        }

        if self.line >= self.numscanlines {
            self.line = 0;

            // Top and bottom overscan bands
            for i in 0..OVERSCAN {
                self.bd_line(i);
                self.bd_line(i + HEIGHT + OVERSCAN);
            }
        }
    }

    /// Append the VDP state to a serializer.
    pub fn state_save(&self, s: &mut Serializer) {
        s.push16(self.line);
        s.push16(self.dot);
        s.push_block(&self.vram);
        s.push16(self.addr);
        s.push8(self.dlatch);
        s.push8(self.wlatch);
        for i in 0..8 {
            s.push8(self.ctrl[i]);
        }
        s.push8(self.stat);
        s.push16(self.tbl_col);
        s.push16(self.tbl_pgen);
        s.push16(self.tbl_pname);
        s.push16(self.tbl_sattr);
        s.push16(self.tbl_spgen);
    }

    /// Restore the VDP state from a deserializer.
    pub fn state_load(&mut self, d: &mut Deserializer) {
        self.line = d.pop16();
        self.dot = d.pop16();
        d.pop_block(&mut self.vram);
        self.addr = d.pop16();
        self.dlatch = d.pop8();
        self.wlatch = d.pop8();
        for i in 0..8 {
            self.ctrl[i] = d.pop8();
        }
        self.stat = d.pop8();
        self.tbl_col = d.pop16();
        self.tbl_pgen = d.pop16();
        self.tbl_pname = d.pop16();
        self.tbl_sattr = d.pop16();
        self.tbl_spgen = d.pop16();
    }
}

impl Default for Vdp {
    fn default() -> Self {
        Self::new()
    }
}
