//! Machine configuration.

use ti_tms9928a::{Palette, Region};

/// Supported audio output rates.
pub const SAMPLE_RATES: [u32; 4] = [44_100, 48_000, 96_000, 192_000];

/// Configuration for creating a [`Coleco`](crate::Coleco) instance.
pub struct ColecoConfig {
    /// BIOS ROM image. Must be exactly 8192 bytes.
    pub bios: Vec<u8>,
    /// Video standard: NTSC (60 Hz, 262 lines) or PAL (50 Hz, 313 lines).
    pub region: Region,
    /// Output palette variant.
    pub palette: Palette,
    /// Audio output rate in Hz. Must be one of [`SAMPLE_RATES`].
    pub sample_rate: u32,
    /// Resampler quality, 0 (nearest) through 10.
    pub resampler_quality: u8,
}

impl Default for ColecoConfig {
    /// NTSC at 48 kHz with the default palette. The BIOS is left empty and
    /// must be filled in before constructing the machine.
    fn default() -> Self {
        Self {
            bios: Vec::new(),
            region: Region::Ntsc,
            palette: Palette::Teatime,
            sample_rate: 48_000,
            resampler_quality: 3,
        }
    }
}
