//! TMS9928A colour palettes.
//!
//! Entry 0 is "transparent", which on a real console shows the backdrop;
//! both palettes keep it opaque black alongside entry 1. The remaining 14
//! entries are the standard TMS9928A colours.

/// Tweaked-to-look-nice palette, the default.
pub const TEATIME: [u32; 16] = [
    0xFF00_0000, 0xFF00_0000, 0xFF23_B03F, 0xFF3C_DF5E,
    0xFF49_5BFE, 0xFF75_7CFF, 0xFFD7_3218, 0xFF14_F8F8,
    0xFFFF_4746, 0xFFFF_6464, 0xFFD4_CE54, 0xFFE6_E180,
    0xFF1D_9A34, 0xFFD6_3BC1, 0xFFCC_CCCC, 0xFFFF_FFFF,
];

/// Palette derived from Sean Young's tms9918a.txt measurements, the set
/// most other emulators ship.
pub const SYOUNG: [u32; 16] = [
    0xFF00_0000, 0xFF00_0000, 0xFF21_C842, 0xFF5E_DC78,
    0xFF54_55ED, 0xFF7D_76FC, 0xFFD4_524D, 0xFF42_EBF5,
    0xFFFC_5554, 0xFFFF_7978, 0xFFD4_C154, 0xFFE6_CE80,
    0xFF21_B03B, 0xFFC9_5BBA, 0xFFCC_CCCC, 0xFFFF_FFFF,
];

/// Selectable palette variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Palette {
    #[default]
    Teatime,
    Syoung,
}

impl Palette {
    /// The ARGB32 entries for this variant.
    #[must_use]
    pub fn table(self) -> &'static [u32; 16] {
        match self {
            Self::Teatime => &TEATIME,
            Self::Syoung => &SYOUNG,
        }
    }
}
