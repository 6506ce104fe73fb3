//! Memory and I/O bus interface.

/// Memory and I/O bus interface.
///
/// The CPU performs every external access through these four hooks. The bus
/// handles address decoding and routing to the appropriate device.
///
/// Reads take `&mut self`: on real hardware a read can have side effects
/// (VDP read-ahead, Mega Cart bank switching), and the bus models those.
pub trait Bus {
    /// Read a byte from the given address.
    fn read_byte(&mut self, addr: u16) -> u8;

    /// Write a byte to the given address.
    fn write_byte(&mut self, addr: u16, data: u8);

    /// Read a byte from the given I/O port.
    fn io_read(&mut self, port: u8) -> u8;

    /// Write a byte to the given I/O port.
    fn io_write(&mut self, port: u8, data: u8);
}
