//! Emulator error types.

use thiserror::Error;

/// Everything that can go wrong while configuring or feeding the emulator.
///
/// Runtime emulation itself never fails: unmapped reads return 0xFF and
/// stray writes are discarded, exactly like the hardware.
#[derive(Debug, Error)]
pub enum ColecoError {
    #[error("BIOS image must be 8192 bytes, got {0}")]
    BiosSize(usize),

    #[error("unsupported sample rate {0} Hz (expected 44100, 48000, 96000, or 192000)")]
    SampleRate(u32),

    #[error("resampler quality {0} out of range (0-10)")]
    ResamplerQuality(u8),

    #[error("ROM image has no valid boot signature")]
    RomHeader,

    #[error("save state must be {expected} bytes, got {got}")]
    StateSize { expected: usize, got: usize },
}
