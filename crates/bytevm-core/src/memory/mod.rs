//! Banked 64 KiB address space: RAM below `0x8000`, active ROM bank above.

/// Fixed region map and address decoder.
pub mod map;
/// ROM sources and bank loading.
pub mod rom;

pub use map::{decode_memory_region, MemoryRegion, RAM_END, RAM_START, ROM_END, ROM_START};
pub use rom::{
    MappingMode, RomSource, RomStream, PRELOADED_BANK_COUNT, PRELOADED_IMAGE_BYTES,
    ROM_BANK_BYTES,
};

use std::io;

use crate::fault::MemoryCopyError;

/// Size in bytes of the logical address space (64 KiB).
pub const ADDRESS_SPACE_BYTES: usize = u16::MAX as usize + 1;

/// Logical byte space over a RAM segment and a switchable ROM bank.
#[derive(Debug)]
pub struct AddressSpace {
    ram: Box<[u8]>,
    active_bank: Box<[u8]>,
    rom: RomSource,
    bank: u64,
}

impl AddressSpace {
    /// Creates an address space over `rom` with zeroed RAM and bank 0 selected.
    ///
    /// # Errors
    ///
    /// Returns the I/O error raised while loading bank 0 from a stream.
    pub fn new(rom: RomSource) -> io::Result<Self> {
        let mut space = Self {
            ram: vec![0; ROM_BANK_BYTES].into_boxed_slice(),
            active_bank: vec![0; ROM_BANK_BYTES].into_boxed_slice(),
            rom,
            bank: 0,
        };
        space.switch_bank(0)?;
        Ok(space)
    }

    /// Returns the ROM mapping mode.
    #[must_use]
    pub const fn mapping_mode(&self) -> MappingMode {
        self.rom.mapping_mode()
    }

    /// Returns the index of the bank currently mapped at `0x8000`.
    #[must_use]
    pub const fn active_bank(&self) -> u64 {
        self.bank
    }

    /// Reads one byte. Total over the 16-bit domain.
    #[must_use]
    pub fn read_byte(&self, addr: u16) -> u8 {
        match decode_memory_region(addr) {
            MemoryRegion::Ram => self.ram[usize::from(addr)],
            MemoryRegion::RomBank => self.active_bank[usize::from(addr - ROM_START)],
        }
    }

    /// Writes one byte, returning `true` when the write took effect.
    ///
    /// Writes into the ROM window are accepted and discarded.
    pub fn write_byte(&mut self, addr: u16, value: u8) -> bool {
        match decode_memory_region(addr) {
            MemoryRegion::Ram => {
                self.ram[usize::from(addr)] = value;
                true
            }
            MemoryRegion::RomBank => false,
        }
    }

    /// Reads a little-endian word from `addr` and `addr + 1` (wrapping).
    #[must_use]
    pub fn read_word(&self, addr: u16) -> u16 {
        u16::from_le_bytes([self.read_byte(addr), self.read_byte(addr.wrapping_add(1))])
    }

    /// Maps bank `bank` into the ROM window and returns the bank loaded.
    ///
    /// # Errors
    ///
    /// Returns the I/O error raised by a streaming reload.
    pub fn switch_bank(&mut self, bank: u64) -> io::Result<u64> {
        let loaded = self.rom.load_bank(bank, &mut self.active_bank)?;
        self.bank = loaded;
        tracing::debug!(bank = loaded, mode = ?self.mapping_mode(), "rom bank switched");
        Ok(loaded)
    }

    /// Selects the previous bank.
    ///
    /// Preloaded wraps `0 -> 15`; streaming stops at bank 0.
    ///
    /// # Errors
    ///
    /// Returns the I/O error raised by a streaming reload.
    pub fn previous_bank(&mut self) -> io::Result<u64> {
        let target = match self.mapping_mode() {
            MappingMode::Preloaded => (self.bank + PRELOADED_BANK_COUNT - 1) % PRELOADED_BANK_COUNT,
            MappingMode::Streaming => self.bank.saturating_sub(1),
        };
        self.switch_bank(target)
    }

    /// Selects the next bank.
    ///
    /// Preloaded wraps `15 -> 0`; streaming advances without limit.
    ///
    /// # Errors
    ///
    /// Returns the I/O error raised by a streaming reload.
    pub fn next_bank(&mut self) -> io::Result<u64> {
        let target = match self.mapping_mode() {
            MappingMode::Preloaded => (self.bank + 1) % PRELOADED_BANK_COUNT,
            MappingMode::Streaming => self.bank.saturating_add(1),
        };
        self.switch_bank(target)
    }

    /// Copies `length` bytes starting at `start` into `destination[offset..]`.
    ///
    /// Addresses wrap at `0xFFFF` and cross the RAM/ROM boundary transparently.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryCopyError::DestinationTooSmall`] when
    /// `offset + length` exceeds the destination length.
    pub fn fill_buffer(
        &self,
        start: u16,
        destination: &mut [u8],
        length: usize,
        offset: usize,
    ) -> Result<(), MemoryCopyError> {
        let needed = offset.saturating_add(length);
        let Some(window) = destination.get_mut(offset..needed) else {
            return Err(MemoryCopyError::DestinationTooSmall {
                needed,
                available: destination.len(),
            });
        };

        let mut addr = start;
        for byte in window {
            *byte = self.read_byte(addr);
            addr = addr.wrapping_add(1);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::{AddressSpace, RomSource, ADDRESS_SPACE_BYTES, ROM_BANK_BYTES};
    use crate::fault::MemoryCopyError;

    fn banked_image(banks: usize) -> Vec<u8> {
        (0..banks * ROM_BANK_BYTES)
            .map(|i| (i / ROM_BANK_BYTES) as u8)
            .collect()
    }

    #[test]
    fn address_space_covers_64kib() {
        assert_eq!(ADDRESS_SPACE_BYTES, 0x1_0000);
    }

    #[test]
    fn ram_writes_land_and_rom_writes_are_discarded() {
        let mut space =
            AddressSpace::new(RomSource::preloaded_from_bytes(&[0x11, 0x22])).expect("in memory");

        assert!(space.write_byte(0x7FFF, 0xAB));
        assert_eq!(space.read_byte(0x7FFF), 0xAB);

        assert!(!space.write_byte(0x8000, 0xCD));
        assert_eq!(space.read_byte(0x8000), 0x11);
        assert_eq!(space.read_byte(0x8001), 0x22);
    }

    #[test]
    fn word_reads_are_little_endian_and_wrap() {
        let mut space =
            AddressSpace::new(RomSource::preloaded_from_bytes(&[0x34])).expect("in memory");
        space.write_byte(0x0000, 0x12);
        assert_eq!(space.read_word(0xFFFF), 0x1200);
        assert_eq!(space.read_word(0x7FFF), 0x3400);
    }

    #[test]
    fn preloaded_navigation_wraps_both_ways() {
        let mut space =
            AddressSpace::new(RomSource::preloaded_from_bytes(&banked_image(16))).expect("mem");
        assert_eq!(space.previous_bank().expect("mem"), 15);
        assert_eq!(space.read_byte(0x8000), 15);
        assert_eq!(space.next_bank().expect("mem"), 0);
        assert_eq!(space.read_byte(0xFFFF), 0);
    }

    #[test]
    fn streaming_navigation_advances_and_stops_at_zero() {
        let mut space =
            AddressSpace::new(RomSource::streaming(Cursor::new(banked_image(3)))).expect("cursor");
        assert_eq!(space.previous_bank().expect("cursor"), 0);
        assert_eq!(space.next_bank().expect("cursor"), 1);
        assert_eq!(space.next_bank().expect("cursor"), 2);
        assert_eq!(space.read_byte(0x8000), 2);
        assert_eq!(space.next_bank().expect("cursor"), 3);
        assert_eq!(space.read_byte(0x8000), 0);
        assert_eq!(space.active_bank(), 3);
    }

    #[test]
    fn fill_buffer_crosses_ram_rom_boundary() {
        let mut space =
            AddressSpace::new(RomSource::preloaded_from_bytes(&[0xE0, 0xE1])).expect("in memory");
        space.write_byte(0x7FFE, 0xD0);
        space.write_byte(0x7FFF, 0xD1);

        let mut dest = [0_u8; 6];
        space.fill_buffer(0x7FFE, &mut dest, 4, 1).expect("fits");
        assert_eq!(dest, [0, 0xD0, 0xD1, 0xE0, 0xE1, 0]);
    }

    #[test]
    fn fill_buffer_rejects_short_destination() {
        let space = AddressSpace::new(RomSource::preloaded_from_bytes(&[])).expect("in memory");
        let mut dest = [0_u8; 4];
        assert_eq!(
            space.fill_buffer(0, &mut dest, 4, 2),
            Err(MemoryCopyError::DestinationTooSmall {
                needed: 6,
                available: 4
            })
        );
    }
}
