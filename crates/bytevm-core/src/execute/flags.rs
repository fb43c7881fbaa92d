//! Compare-result flags and jump predicates.

use crate::encoding::JumpCondition;
use crate::state::{FLAGS_COMPARE_MASK, FLAGS_EQUAL, FLAGS_GREATER, FLAGS_LESS};

impl JumpCondition {
    /// Exact 3-bit `FLAGS` pattern this condition requires.
    ///
    /// The combined conditions are literal patterns, not unions: `0b101`
    /// satisfies `LessThanOrEqual` but neither `Equal` nor `LessThan`.
    #[must_use]
    pub const fn pattern(self) -> u8 {
        match self {
            Self::Equal => FLAGS_EQUAL,
            Self::NotEqual => 0,
            Self::GreaterThan => FLAGS_GREATER,
            Self::LessThan => FLAGS_LESS,
            Self::GreaterThanOrEqual => FLAGS_EQUAL | FLAGS_GREATER,
            Self::LessThanOrEqual => FLAGS_EQUAL | FLAGS_LESS,
        }
    }

    /// Returns `true` when the compare bits of `flags` match [`Self::pattern`].
    #[must_use]
    pub const fn holds(self, flags: u8) -> bool {
        flags & FLAGS_COMPARE_MASK == self.pattern()
    }
}

/// Returns `flags` with the compare bits replaced by the ordering of `a` and `b`.
///
/// Bits above bit 2 pass through untouched.
#[must_use]
pub const fn compare_flags(flags: u8, a: u16, b: u16) -> u8 {
    let result = if a == b {
        FLAGS_EQUAL
    } else if a > b {
        FLAGS_GREATER
    } else {
        FLAGS_LESS
    };
    (flags & !FLAGS_COMPARE_MASK) | result
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::compare_flags;
    use crate::encoding::JumpCondition;

    #[rstest]
    #[case(JumpCondition::Equal, 0b001)]
    #[case(JumpCondition::NotEqual, 0b000)]
    #[case(JumpCondition::GreaterThan, 0b010)]
    #[case(JumpCondition::LessThan, 0b100)]
    #[case(JumpCondition::GreaterThanOrEqual, 0b011)]
    #[case(JumpCondition::LessThanOrEqual, 0b101)]
    fn each_condition_matches_only_its_pattern(#[case] condition: JumpCondition, #[case] bits: u8) {
        for flags in 0_u8..8 {
            assert_eq!(condition.holds(flags), flags == bits, "flags={flags:03b}");
        }
        assert!(condition.holds(bits | 0xF8));
    }

    #[test]
    fn compare_sets_one_bit_and_keeps_upper_bits() {
        assert_eq!(compare_flags(0xF8, 3, 3), 0xF9);
        assert_eq!(compare_flags(0x07, 4, 3), 0x02);
        assert_eq!(compare_flags(0x80, 3, 4), 0x84);
    }
}
