//! Fixed two-region address map and decoding helpers.

/// Inclusive start address of the RAM segment.
pub const RAM_START: u16 = 0x0000;
/// Inclusive end address of the RAM segment.
pub const RAM_END: u16 = 0x7FFF;
/// Inclusive start address of the active ROM bank window.
pub const ROM_START: u16 = 0x8000;
/// Inclusive end address of the active ROM bank window.
pub const ROM_END: u16 = 0xFFFF;

/// Region classification for logical addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum MemoryRegion {
    /// Mutable RAM (`0x0000..=0x7FFF`).
    Ram,
    /// Active ROM bank (`0x8000..=0xFFFF`); writes are discarded.
    RomBank,
}

impl MemoryRegion {
    /// Returns the inclusive bounds for this region.
    #[must_use]
    pub const fn bounds(self) -> (u16, u16) {
        match self {
            Self::Ram => (RAM_START, RAM_END),
            Self::RomBank => (ROM_START, ROM_END),
        }
    }

    /// Returns `true` when `addr` belongs to this region.
    #[must_use]
    pub const fn contains(self, addr: u16) -> bool {
        let (start, end) = self.bounds();
        addr >= start && addr <= end
    }

    /// Returns `true` when writes into this region take effect.
    #[must_use]
    pub const fn is_writable(self) -> bool {
        matches!(self, Self::Ram)
    }
}

/// Decodes a logical 16-bit address into its region.
#[must_use]
pub const fn decode_memory_region(addr: u16) -> MemoryRegion {
    match addr {
        RAM_START..=RAM_END => MemoryRegion::Ram,
        ROM_START..=ROM_END => MemoryRegion::RomBank,
    }
}
