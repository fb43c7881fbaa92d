//! Arithmetic and address-walking helpers shared by the executors.

use crate::encoding::MathKind;
use crate::memory::{MappingMode, ROM_START};
use crate::state::{next_address_for_ip, previous_address_for_sp, IpAdvance};

/// Longest string a write instruction scans before giving up on a terminator.
pub const MAX_WRITE_SCAN: usize = 0x1_0000;

/// Applies a binary stack operation with 16-bit wraparound.
///
/// Division by zero yields `0xFFFF`.
#[must_use]
pub const fn apply_math(kind: MathKind, a: u16, b: u16) -> u16 {
    match kind {
        MathKind::Add => a.wrapping_add(b),
        MathKind::Subtract => a.wrapping_sub(b),
        MathKind::Multiply => a.wrapping_mul(b),
        MathKind::Divide => match a.checked_div(b) {
            Some(quotient) => quotient,
            None => 0xFFFF,
        },
        MathKind::And => a & b,
        MathKind::Or => a | b,
        MathKind::Xor => a ^ b,
    }
}

/// Walks `count` positions below `sp`, circular within the stack domain.
#[must_use]
pub const fn stack_below(sp: u16, count: u8) -> u16 {
    let mut addr = sp;
    let mut remaining = count;
    while remaining > 0 {
        addr = previous_address_for_sp(addr);
        remaining -= 1;
    }
    addr
}

/// Address of the last byte of a `len`-byte instruction at `address`.
///
/// Follows IP increment rules without loading banks: a streaming bank edge
/// continues at `0x8000` of the next bank.
#[must_use]
pub const fn last_byte_address(address: u16, len: u8, mode: MappingMode) -> u16 {
    let mut addr = address;
    let mut remaining = len.saturating_sub(1);
    while remaining > 0 {
        addr = match next_address_for_ip(addr, mode) {
            IpAdvance::To(next) => next,
            IpAdvance::NextBank => ROM_START,
        };
        remaining -= 1;
    }
    addr
}

/// Byte stored for one input character; code points above `0xFF` keep their low byte.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn char_code(c: char) -> u8 {
    c as u32 as u8
}
