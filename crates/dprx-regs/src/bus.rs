use std::sync::Arc;

/// Synchronous register file access.
///
/// Registers are addressed by byte offset and carry an 8-bit payload in the low bits of a
/// 32-bit word. Implementations must be callable from any execution context, hence `&self`.
pub trait RegisterBus: Send + Sync {
    fn read(&self, offset: u32) -> u32;
    fn write(&self, offset: u32, value: u32);

    /// Read-modify-write of the bits selected by `mask`.
    fn write_masked(&self, offset: u32, value: u32, mask: u32) {
        let old = self.read(offset);
        self.write(offset, (old & !mask) | (value & mask));
    }

    fn set_bits(&self, offset: u32, bits: u32) {
        self.write_masked(offset, bits, bits);
    }

    fn clear_bits(&self, offset: u32, bits: u32) {
        self.write_masked(offset, 0, bits);
    }

    fn test_bits(&self, offset: u32, bits: u32) -> bool {
        self.read(offset) & bits != 0
    }
}

impl<T: RegisterBus + ?Sized> RegisterBus for Arc<T> {
    fn read(&self, offset: u32) -> u32 {
        (**self).read(offset)
    }

    fn write(&self, offset: u32, value: u32) {
        (**self).write(offset, value)
    }

    fn write_masked(&self, offset: u32, value: u32, mask: u32) {
        (**self).write_masked(offset, value, mask)
    }
}

pub fn read_u8(bus: &dyn RegisterBus, offset: u32) -> u8 {
    (bus.read(offset) & 0xFF) as u8
}

/// Assembles a 24-bit value from three byte registers given high byte first.
pub fn read_u24_be(bus: &dyn RegisterBus, [hi, mid, lo]: [u32; 3]) -> u32 {
    let hi = u32::from(read_u8(bus, hi));
    let mid = u32::from(read_u8(bus, mid));
    let lo = u32::from(read_u8(bus, lo));
    (hi << 16) | (mid << 8) | lo
}

/// Writes the low 24 bits of `value` to three byte registers given low byte first.
pub fn write_u24(bus: &dyn RegisterBus, [lo, mid, hi]: [u32; 3], value: u32) {
    bus.write(lo, value & 0xFF);
    bus.write(mid, (value >> 8) & 0xFF);
    bus.write(hi, (value >> 16) & 0xFF);
}

pub fn read_u16(bus: &dyn RegisterBus, lo: u32, hi: u32) -> u16 {
    u16::from(read_u8(bus, lo)) | (u16::from(read_u8(bus, hi)) << 8)
}

/// Copies consecutive byte registers starting at `base` into `buf`.
pub fn read_block(bus: &dyn RegisterBus, base: u32, buf: &mut [u8]) {
    for (i, byte) in buf.iter_mut().enumerate() {
        *byte = read_u8(bus, base + (i as u32) * crate::map::REG_STRIDE);
    }
}
