use crate::fault::FaultCode;
use crate::memory::MappingMode;

/// Number of addressable registers (`A B X Y SP IP BANKNUM FLAGS`).
pub const REGISTER_COUNT: usize = 8;
/// `FLAGS` bit set when the last compare found `a == b`.
pub const FLAGS_EQUAL: u8 = 1 << 0;
/// `FLAGS` bit set when the last compare found `a > b`.
pub const FLAGS_GREATER: u8 = 1 << 1;
/// `FLAGS` bit set when the last compare found `a < b`.
pub const FLAGS_LESS: u8 = 1 << 2;
/// Mask of the three comparison bits.
pub const FLAGS_COMPARE_MASK: u8 = FLAGS_EQUAL | FLAGS_GREATER | FLAGS_LESS;
/// Highest stack address; SP arithmetic is circular within `0..=SP_MAX`.
pub const SP_MAX: u16 = 0x7FFF;

/// Register identifier, indexed as encoded in operand bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Register {
    A = 0,
    B = 1,
    X = 2,
    Y = 3,
    Sp = 4,
    Ip = 5,
    BankNum = 6,
    Flags = 7,
}

impl Register {
    /// All registers in index order.
    pub const ALL: [Self; REGISTER_COUNT] = [
        Self::A,
        Self::B,
        Self::X,
        Self::Y,
        Self::Sp,
        Self::Ip,
        Self::BankNum,
        Self::Flags,
    ];

    /// Returns the operand index for this register (`0..=7`).
    #[must_use]
    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Decodes an operand byte into a register.
    #[must_use]
    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::A),
            1 => Some(Self::B),
            2 => Some(Self::X),
            3 => Some(Self::Y),
            4 => Some(Self::Sp),
            5 => Some(Self::Ip),
            6 => Some(Self::BankNum),
            7 => Some(Self::Flags),
            _ => None,
        }
    }

    /// Decodes an operand byte, failing with [`FaultCode::InvalidRegister`].
    ///
    /// # Errors
    ///
    /// Returns [`FaultCode::InvalidRegister`] for indices above 7.
    pub const fn decode(index: u8) -> Result<Self, FaultCode> {
        match Self::from_index(index) {
            Some(reg) => Ok(reg),
            None => Err(FaultCode::InvalidRegister),
        }
    }

    /// Assembly name used by disassembly.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::X => "X",
            Self::Y => "Y",
            Self::Sp => "SP",
            Self::Ip => "IP",
            Self::BankNum => "BANKNUM",
            Self::Flags => "FLAGS",
        }
    }
}

/// Side effect a register write asks the owner to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterWrite {
    /// No follow-up needed.
    Plain,
    /// `BANKNUM` was written; the ROM bank must be reloaded.
    BankSelected(u8),
}

/// Six word registers plus the bank-select and flags bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RegisterFile {
    a: u16,
    b: u16,
    x: u16,
    y: u16,
    sp: u16,
    ip: u16,
    bank_num: u8,
    flags: u8,
}

impl RegisterFile {
    /// Creates a zeroed register file with IP at `entry_point`.
    #[must_use]
    pub fn with_entry_point(entry_point: u16) -> Self {
        Self {
            ip: entry_point,
            ..Self::default()
        }
    }

    /// Reads a register, widening byte registers.
    #[must_use]
    pub const fn get(&self, reg: Register) -> u16 {
        match reg {
            Register::A => self.a,
            Register::B => self.b,
            Register::X => self.x,
            Register::Y => self.y,
            Register::Sp => self.sp,
            Register::Ip => self.ip,
            Register::BankNum => self.bank_num as u16,
            Register::Flags => self.flags as u16,
        }
    }

    /// Writes a register, truncating for byte registers.
    ///
    /// SP is masked into its `0..=0x7FFF` domain. A `BANKNUM` write returns
    /// [`RegisterWrite::BankSelected`] so the owner can reload the ROM bank.
    #[allow(clippy::cast_possible_truncation)]
    pub const fn set(&mut self, reg: Register, value: u16) -> RegisterWrite {
        match reg {
            Register::A => self.a = value,
            Register::B => self.b = value,
            Register::X => self.x = value,
            Register::Y => self.y = value,
            Register::Sp => self.sp = value & SP_MAX,
            Register::Ip => self.ip = value,
            Register::BankNum => {
                self.bank_num = value as u8;
                return RegisterWrite::BankSelected(value as u8);
            }
            Register::Flags => self.flags = value as u8,
        }
        RegisterWrite::Plain
    }

    /// Reads a register by operand index.
    ///
    /// # Errors
    ///
    /// Returns [`FaultCode::InvalidRegister`] for indices above 7.
    pub const fn get_index(&self, index: u8) -> Result<u16, FaultCode> {
        match Register::decode(index) {
            Ok(reg) => Ok(self.get(reg)),
            Err(fault) => Err(fault),
        }
    }

    /// Writes a register by operand index.
    ///
    /// # Errors
    ///
    /// Returns [`FaultCode::InvalidRegister`] for indices above 7.
    pub const fn set_index(&mut self, index: u8, value: u16) -> Result<RegisterWrite, FaultCode> {
        match Register::decode(index) {
            Ok(reg) => Ok(self.set(reg, value)),
            Err(fault) => Err(fault),
        }
    }

    /// Reads `A`.
    #[must_use]
    pub const fn a(&self) -> u16 {
        self.a
    }

    /// Reads `B`.
    #[must_use]
    pub const fn b(&self) -> u16 {
        self.b
    }

    /// Reads `X`.
    #[must_use]
    pub const fn x(&self) -> u16 {
        self.x
    }

    /// Reads `Y`.
    #[must_use]
    pub const fn y(&self) -> u16 {
        self.y
    }

    /// Reads `SP`.
    #[must_use]
    pub const fn sp(&self) -> u16 {
        self.sp
    }

    /// Writes `SP`, masked into its domain.
    pub const fn set_sp(&mut self, value: u16) {
        self.sp = value & SP_MAX;
    }

    /// Reads `IP`.
    #[must_use]
    pub const fn ip(&self) -> u16 {
        self.ip
    }

    /// Writes `IP`.
    pub const fn set_ip(&mut self, value: u16) {
        self.ip = value;
    }

    /// Reads `BANKNUM`.
    #[must_use]
    pub const fn bank_num(&self) -> u8 {
        self.bank_num
    }

    /// Stores a bank number without requesting a reload.
    pub(crate) const fn store_bank_num(&mut self, bank: u8) {
        self.bank_num = bank;
    }

    /// Reads `FLAGS`.
    #[must_use]
    pub const fn flags(&self) -> u8 {
        self.flags
    }

    /// Writes `FLAGS`.
    pub const fn set_flags(&mut self, value: u8) {
        self.flags = value;
    }
}

/// Circular SP increment: `0x7FFF` wraps to `0x0000`.
#[must_use]
pub const fn next_address_for_sp(addr: u16) -> u16 {
    if addr >= SP_MAX {
        0
    } else {
        addr + 1
    }
}

/// Circular SP decrement: `0x0000` wraps to `0x7FFF`.
#[must_use]
pub const fn previous_address_for_sp(addr: u16) -> u16 {
    if addr == 0 || addr > SP_MAX {
        SP_MAX
    } else {
        addr - 1
    }
}

/// Result of advancing IP by one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpAdvance {
    /// IP moves to this address.
    To(u16),
    /// IP ran off the end of a streaming bank: load the next bank, then
    /// continue at `0x8000`.
    NextBank,
}

/// Advances IP by one byte.
///
/// `0x7FFF` wraps to `0x0000` so plain increments never roam from RAM into
/// ROM. `0xFFFF` wraps to `0x0000` for preloaded images and requests the next
/// bank for streaming ones.
#[must_use]
pub const fn next_address_for_ip(addr: u16, mode: MappingMode) -> IpAdvance {
    match addr {
        0x7FFF => IpAdvance::To(0x0000),
        0xFFFF => match mode {
            MappingMode::Preloaded => IpAdvance::To(0x0000),
            MappingMode::Streaming => IpAdvance::NextBank,
        },
        _ => IpAdvance::To(addr + 1),
    }
}
