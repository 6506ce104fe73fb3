//! Cartridge ROM and Mega Cart bank switching.
//!
//! Standard carts map up to four fixed 8 KB pages over 0x8000-0xFFFF.
//! Mega Carts keep their top 16 KB permanently at 0x8000-0xBFFF and switch
//! the 16 KB window at 0xC000-0xFFFF whenever any address in
//! 0xFFC0-0xFFFF is read — including the fetch of the instruction doing
//! the reading, which therefore returns the new bank's byte.

use crate::error::ColecoError;

pub(crate) const SIZE_8K: usize = 0x2000;
pub(crate) const SIZE_16K: usize = 0x4000;
pub(crate) const SIZE_32K: usize = 0x8000;

/// A loaded (or absent) cartridge with its page mapping.
pub struct Cartridge {
    rom: Vec<u8>,
    /// Number of 8 KB pages in the image, counting a short tail page.
    rompages: u8,
    megacart: bool,
    /// Byte offsets into `rom` for the four 8 KB windows at 0x8000,
    /// 0xA000, 0xC000, and 0xE000.
    rompage: [u32; 4],
}

impl Cartridge {
    /// A cart slot with nothing in it: every read is 0xFF.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            rom: Vec::new(),
            rompages: 0,
            megacart: false,
            rompage: [0; 4],
        }
    }

    /// Parse and map a ROM image.
    ///
    /// Images over 32 KB are Mega Carts, validated by the boot signature at
    /// the start of their final 16 KB; anything else must carry the
    /// signature in its first two bytes. 0xAA55 boots through the BIOS
    /// splash screen, 0x55AA jumps straight to the cartridge vector.
    ///
    /// # Errors
    ///
    /// [`ColecoError::RomHeader`] when no valid signature is found.
    pub fn load(data: &[u8]) -> Result<Self, ColecoError> {
        if data.len() < 2 {
            return Err(ColecoError::RomHeader);
        }

        let rompages = data.len().div_ceil(SIZE_8K) as u8;

        if data.len() > SIZE_32K {
            // Possibly a Mega Cart: the signature lives at the start of the
            // final 16 KB, little-endian
            let off = data.len() - SIZE_16K;
            let hword = u16::from_le_bytes([data[off], data[off + 1]]);
            if hword != 0xAA55 && hword != 0x55AA {
                return Err(ColecoError::RomHeader);
            }

            log::debug!(
                "mega cart: {} KB, {} switchable 16K banks",
                data.len() / 1024,
                rompages >> 1
            );

            return Ok(Self {
                rom: data.to_vec(),
                rompages,
                megacart: true,
                rompage: [
                    // The final 16 KB is pinned at 0x8000-0xBFFF
                    (data.len() - SIZE_16K) as u32,
                    (data.len() - SIZE_8K) as u32,
                    // The switchable window starts on the first bank
                    0,
                    SIZE_8K as u32,
                ],
            });
        }

        // Standard cart: the signature word reads big-endian here
        let hword = u16::from_be_bytes([data[0], data[1]]);
        if hword != 0xAA55 && hword != 0x55AA {
            return Err(ColecoError::RomHeader);
        }

        // One enable line per 8 KB window; short ROMs leave the upper
        // windows parked on offset 0 and the size guard in read() covers
        // them
        let mut rompage = [0u32; 4];
        for (i, page) in rompage.iter_mut().enumerate().take(usize::from(rompages).min(4)) {
            *page = (i * SIZE_8K) as u32;
        }

        Ok(Self {
            rom: data.to_vec(),
            rompages,
            megacart: false,
            rompage,
        })
    }

    /// Read a byte from cartridge space (`addr` in 0x8000-0xFFFF).
    ///
    /// On Mega Carts a read at 0xFFC0 or above retargets the switchable
    /// window first, so the returned byte already comes from the new bank.
    pub fn read(&mut self, addr: u16) -> u8 {
        if self.megacart && addr >= 0xFFC0 {
            // 16 KB banks, so half the page count, minus one for the mask
            self.rompage[2] = (u32::from(addr) & (u32::from(self.rompages >> 1) - 1)) << 14;
            self.rompage[3] = self.rompage[2] + SIZE_8K as u32;
        }

        // Reads past the true image size hit unpopulated bus
        if usize::from(addr) >= self.rom.len() + SIZE_32K {
            return 0xFF;
        }

        let page = usize::from(addr >> 13) - 4;
        let offset = self.rompage[page] as usize + usize::from(addr & 0x1FFF);
        self.rom.get(offset).copied().unwrap_or(0xFF)
    }

    /// Current page offsets, for save states.
    #[must_use]
    pub fn rompage(&self) -> [u32; 4] {
        self.rompage
    }

    /// Restore page offsets from a save state.
    pub fn set_rompage(&mut self, rompage: [u32; 4]) {
        self.rompage = rompage;
    }

    #[must_use]
    pub fn is_megacart(&self) -> bool {
        self.megacart
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standard_rom(size: usize) -> Vec<u8> {
        let mut rom = vec![0u8; size];
        rom[0] = 0xAA;
        rom[1] = 0x55;
        rom
    }

    /// 16 banks of 16 KB, each marked with its index.
    fn mega_rom() -> Vec<u8> {
        let mut rom = vec![0u8; 0x20000];
        for bank in 0..8 {
            rom[bank * SIZE_16K] = bank as u8;
        }
        // Signature at the start of the final bank
        rom[0x20000 - SIZE_16K] = 0x55;
        rom[0x20000 - SIZE_16K + 1] = 0xAA;
        rom
    }

    #[test]
    fn rejects_bad_signature() {
        assert!(Cartridge::load(&[0u8; 0x2000]).is_err());
        assert!(Cartridge::load(&[]).is_err());
    }

    #[test]
    fn accepts_both_signatures() {
        let mut rom = vec![0u8; 0x2000];
        rom[0] = 0xAA;
        rom[1] = 0x55;
        assert!(Cartridge::load(&rom).is_ok());
        rom[0] = 0x55;
        rom[1] = 0xAA;
        assert!(Cartridge::load(&rom).is_ok());
    }

    #[test]
    fn standard_cart_maps_linearly() {
        let mut rom = standard_rom(SIZE_32K);
        rom[0x0000] = 0xAA; // Already the signature
        rom[0x2000] = 0x11;
        rom[0x4000] = 0x22;
        rom[0x6000] = 0x33;
        let mut cart = Cartridge::load(&rom).unwrap();

        assert_eq!(cart.read(0x8000), 0xAA);
        assert_eq!(cart.read(0xA000), 0x11);
        assert_eq!(cart.read(0xC000), 0x22);
        assert_eq!(cart.read(0xE000), 0x33);
    }

    #[test]
    fn short_cart_pads_with_ff() {
        let rom = standard_rom(SIZE_8K);
        let mut cart = Cartridge::load(&rom).unwrap();
        assert_eq!(cart.read(0x8000), 0xAA);
        assert_eq!(cart.read(0xA000), 0xFF, "beyond the image");
        assert_eq!(cart.read(0xFFFF), 0xFF);
    }

    #[test]
    fn megacart_detected() {
        let cart = Cartridge::load(&mega_rom()).unwrap();
        assert!(cart.is_megacart());
    }

    #[test]
    fn megacart_top_bank_pinned_at_0x8000() {
        let mut cart = Cartridge::load(&mega_rom()).unwrap();
        // Offset 0x1C000 holds the signature low byte 0x55
        assert_eq!(cart.read(0x8000), 0x55);
        // Bank switching must not disturb the pinned window
        cart.read(0xFFC5);
        assert_eq!(cart.read(0x8000), 0x55);
    }

    #[test]
    fn megacart_bank_select_on_read() {
        let mut cart = Cartridge::load(&mega_rom()).unwrap();

        // Power-on: bank 0 visible at 0xC000
        assert_eq!(cart.read(0xC000), 0x00);

        cart.read(0xFFC1);
        assert_eq!(cart.read(0xC000), 0x01);

        cart.read(0xFFC2);
        assert_eq!(cart.read(0xC000), 0x02);

        // The selecting read itself uses the new mapping
        let byte = cart.read(0xFFC7);
        assert_eq!(byte, cart.rom[7 * SIZE_16K + 0x3FC7]);
    }

    #[test]
    fn empty_slot_reads_ff() {
        let mut cart = Cartridge::empty();
        assert_eq!(cart.read(0x8000), 0xFF);
        assert_eq!(cart.read(0xFFFF), 0xFF);
    }
}
