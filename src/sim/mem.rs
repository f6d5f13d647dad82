//! The machine's memory and register file.
//!
//! This module consists of:
//! - [`AddrSpace`]: the flat byte-addressed memory of the machine
//! - [`RegFile`]: the register file, holding the 32 general-purpose
//!   registers plus `hi` and `lo`
//! - The memory layout constants ([`TEXT_START`], [`DATA_START`], etc.)

use std::ops::{Index, IndexMut};

use crate::ast::{Reg, REG_COUNT};

/// The total size of the address space, in bytes.
pub const MEM_SIZE: usize = 0x8000_0000;
/// The byte address the text segment (and execution) starts at.
pub const TEXT_START: u32 = 0x0040_0000;
/// The byte address the static data segment starts at.
pub const DATA_START: u32 = 0x1000_0000;
/// The highest byte address of the stack region.
pub const STACK_START: u32 = 0x7FFF_FFFF;
/// The initial value of the stack pointer.
pub const SP_INIT: u32 = 0x0100_0000;

/// The flat, byte-addressed, little-endian memory of the machine.
///
/// All accesses are bounds-checked against [`MEM_SIZE`]. Out-of-range reads
/// return 0 and out-of-range writes are dropped; both log a warning rather
/// than halting the machine.
pub struct AddrSpace {
    data: Vec<u8>,
    text_end: u32,
    static_end: u32,
    dynamic_end: u32,
}

impl AddrSpace {
    /// Creates a fully mapped, zero-initialized address space.
    ///
    /// The backing allocation is [`MEM_SIZE`] bytes; on typical platforms
    /// the zero pages are not committed until touched.
    pub fn new() -> Self {
        AddrSpace {
            data: vec![0; MEM_SIZE],
            text_end: TEXT_START,
            static_end: DATA_START,
            dynamic_end: DATA_START,
        }
    }

    fn check(&self, addr: u32, width: u32) -> bool {
        let ok = (addr as usize).saturating_add(width as usize) <= self.data.len();
        if !ok {
            warn!("access of {width} byte(s) at 0x{addr:08X} is out of range");
        }
        ok
    }

    /// Reads a byte, returning 0 if the address is out of range.
    pub fn read8(&self, addr: u32) -> u8 {
        match self.check(addr, 1) {
            true => self.data[addr as usize],
            false => 0,
        }
    }

    /// Writes a byte, returning whether the address was in range.
    pub fn write8(&mut self, addr: u32, value: u8) -> bool {
        let ok = self.check(addr, 1);
        if ok {
            self.data[addr as usize] = value;
        }
        ok
    }

    /// Reads a little-endian halfword, returning 0 if out of range.
    pub fn read16(&self, addr: u32) -> u16 {
        match self.check(addr, 2) {
            true => {
                let i = addr as usize;
                u16::from_le_bytes([self.data[i], self.data[i + 1]])
            }
            false => 0,
        }
    }

    /// Writes a little-endian halfword, returning whether it was in range.
    pub fn write16(&mut self, addr: u32, value: u16) -> bool {
        let ok = self.check(addr, 2);
        if ok {
            self.data[addr as usize..][..2].copy_from_slice(&value.to_le_bytes());
        }
        ok
    }

    /// Reads a little-endian word, returning 0 if out of range.
    pub fn read32(&self, addr: u32) -> u32 {
        match self.check(addr, 4) {
            true => {
                let i = addr as usize;
                u32::from_le_bytes([self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]])
            }
            false => 0,
        }
    }

    /// Writes a little-endian word, returning whether it was in range.
    pub fn write32(&mut self, addr: u32, value: u32) -> bool {
        let ok = self.check(addr, 4);
        if ok {
            self.data[addr as usize..][..4].copy_from_slice(&value.to_le_bytes());
        }
        ok
    }

    /// Copies a program's instruction words into the text segment,
    /// advancing the end-of-text marker past them.
    pub fn load_text(&mut self, words: &[u32]) {
        for &word in words {
            self.write32(self.text_end, word);
            self.text_end += 4;
        }
    }

    /// The address one past the last loaded instruction.
    pub fn text_end(&self) -> u32 {
        self.text_end
    }

    /// The address one past the static data laid down at load time.
    pub fn static_end(&self) -> u32 {
        self.static_end
    }

    /// The current top of the dynamic (sbrk) region.
    pub fn dynamic_end(&self) -> u32 {
        self.dynamic_end
    }

    /// Reserves `size` bytes of dynamic memory, returning the address of
    /// the start of the reservation.
    pub fn allocate(&mut self, size: u32) -> u32 {
        let start = self.dynamic_end;
        self.dynamic_end = self.dynamic_end.wrapping_add(size);
        start
    }
}

impl Default for AddrSpace {
    /// The unmapped state: no backing allocation, so every read returns 0
    /// and every write reports `false`.
    fn default() -> Self {
        AddrSpace {
            data: Vec::new(),
            text_end: TEXT_START,
            static_end: DATA_START,
            dynamic_end: DATA_START,
        }
    }
}
impl std::fmt::Debug for AddrSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddrSpace")
            .field("text_end", &self.text_end)
            .field("static_end", &self.static_end)
            .field("dynamic_end", &self.dynamic_end)
            .finish_non_exhaustive()
    }
}

/// The register file.
///
/// This can be addressed with a [`Reg`], using typical index syntax.
/// Beyond the 32 general-purpose registers, the `hi` and `lo` multiply
/// results live in the same array (see [`reg_consts::HI`] and
/// [`reg_consts::LO`]).
///
/// [`reg_consts::HI`]: crate::ast::reg_consts::HI
/// [`reg_consts::LO`]: crate::ast::reg_consts::LO
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegFile([u32; REG_COUNT]);

impl RegFile {
    /// Creates a new register file with all registers zeroed.
    pub fn new() -> Self {
        RegFile([0; REG_COUNT])
    }

    /// Zeroes every register.
    pub fn reset(&mut self) {
        self.0.fill(0);
    }
}
impl Default for RegFile {
    fn default() -> Self {
        Self::new()
    }
}
impl Index<Reg> for RegFile {
    type Output = u32;

    fn index(&self, index: Reg) -> &Self::Output {
        &self.0[usize::from(index)]
    }
}
impl IndexMut<Reg> for RegFile {
    fn index_mut(&mut self, index: Reg) -> &mut Self::Output {
        &mut self.0[usize::from(index)]
    }
}

#[cfg(test)]
mod tests {
    use super::{AddrSpace, RegFile, DATA_START, MEM_SIZE, TEXT_START};
    use crate::ast::reg_consts;

    #[test]
    fn test_rw_roundtrip() {
        let mut mem = AddrSpace::new();
        assert!(mem.write32(DATA_START, 0x1122_3344));
        assert_eq!(mem.read32(DATA_START), 0x1122_3344);
        // little-endian byte order
        assert_eq!(mem.read8(DATA_START), 0x44);
        assert_eq!(mem.read8(DATA_START + 3), 0x11);
        assert_eq!(mem.read16(DATA_START + 2), 0x1122);

        assert!(mem.write8(DATA_START, 0xFF));
        assert_eq!(mem.read32(DATA_START), 0x1122_33FF);
    }

    #[test]
    fn test_out_of_range() {
        let mut mem = AddrSpace::new();
        let end = MEM_SIZE as u32 - 2;
        assert!(!mem.write32(end, 1));
        assert_eq!(mem.read32(end), 0);
        assert!(mem.write16(end, 0xABCD));
        assert_eq!(mem.read16(end), 0xABCD);
    }

    #[test]
    fn test_default_is_unmapped() {
        let mut mem = AddrSpace::default();
        assert!(!mem.write32(DATA_START, 1));
        assert_eq!(mem.read32(DATA_START), 0);
    }

    #[test]
    fn test_load_text() {
        let mut mem = AddrSpace::new();
        mem.load_text(&[0x012a_4020, 0x0000_000c]);
        assert_eq!(mem.text_end(), TEXT_START + 8);
        assert_eq!(mem.read32(TEXT_START), 0x012a_4020);
        assert_eq!(mem.read32(TEXT_START + 4), 0x0000_000c);
    }

    #[test]
    fn test_allocate() {
        let mut mem = AddrSpace::new();
        assert_eq!(mem.allocate(16), DATA_START);
        assert_eq!(mem.allocate(8), DATA_START + 16);
        assert_eq!(mem.dynamic_end(), DATA_START + 24);
    }

    #[test]
    fn test_reg_file() {
        let mut rf = RegFile::new();
        rf[reg_consts::T0] = 17;
        rf[reg_consts::HI] = 3;
        assert_eq!(rf[reg_consts::T0], 17);
        assert_eq!(rf[reg_consts::HI], 3);
        assert_eq!(rf[reg_consts::T1], 0);

        rf.reset();
        assert_eq!(rf[reg_consts::T0], 0);
    }
}
