use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Fault classes used for logging and host policy decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum FaultClass {
    /// Instruction operands could not be resolved.
    Decode,
    /// The ROM source failed underneath the address space.
    Rom,
    /// Host drove the input suspension protocol out of order.
    Host,
}

/// Execution faults. Any fault halts the current step and latches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum FaultCode {
    /// Register operand outside `0..=7`.
    #[error("register index out of range")]
    InvalidRegister = 0x01,
    /// Streaming ROM seek/read failed with an I/O error (short reads are not faults).
    #[error("rom bank reload failed")]
    RomReadFailed = 0x02,
    /// `resume_with_input` called while no read instruction is suspended.
    #[error("no read instruction is awaiting input")]
    InputNotPending = 0x03,
    /// A pre-decoded instruction carries operands of the wrong shape for its operation.
    #[error("operand shape does not match the operation")]
    OperandMismatch = 0x04,
}

impl FaultCode {
    /// Converts a fault code to its stable byte value.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Converts a stable byte value back into a fault code.
    #[must_use]
    pub const fn from_u8(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::InvalidRegister),
            0x02 => Some(Self::RomReadFailed),
            0x03 => Some(Self::InputNotPending),
            0x04 => Some(Self::OperandMismatch),
            _ => None,
        }
    }

    /// Returns the fault class for this fault code.
    #[must_use]
    pub const fn class(self) -> FaultClass {
        match self {
            Self::InvalidRegister | Self::OperandMismatch => FaultClass::Decode,
            Self::RomReadFailed => FaultClass::Rom,
            Self::InputNotPending => FaultClass::Host,
        }
    }

    /// Faults that latch the engine until `reset`.
    ///
    /// Host protocol faults are reported but leave the engine runnable.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::InputNotPending)
    }
}

/// Errors raised while opening or loading a ROM image.
#[derive(Debug, Error)]
pub enum RomLoadError {
    /// The ROM image could not be opened.
    #[error("failed to open rom image {path}")]
    Open {
        /// Path that was being opened.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The ROM image could not be read or seeked.
    #[error("failed to read rom image")]
    Read(#[from] io::Error),
}

/// Errors raised by bulk copies out of the address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MemoryCopyError {
    /// Destination cannot hold `offset + length` bytes.
    #[error("destination holds {available} bytes but {needed} are required")]
    DestinationTooSmall {
        /// Bytes required (`offset + length`).
        needed: usize,
        /// Length of the destination buffer.
        available: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::{FaultClass, FaultCode, MemoryCopyError};

    #[test]
    fn stable_code_roundtrip_is_bijective_for_defined_values() {
        for code in 0x01u8..=0x04 {
            let fault = FaultCode::from_u8(code).expect("defined fault code");
            assert_eq!(fault.as_u8(), code);
        }
    }

    #[test]
    fn unknown_code_is_rejected() {
        assert!(FaultCode::from_u8(0x00).is_none());
        assert!(FaultCode::from_u8(0xFF).is_none());
    }

    #[test]
    fn only_host_protocol_faults_are_recoverable() {
        assert!(FaultCode::InvalidRegister.is_terminal());
        assert!(FaultCode::RomReadFailed.is_terminal());
        assert!(FaultCode::OperandMismatch.is_terminal());
        assert!(!FaultCode::InputNotPending.is_terminal());
    }

    #[test]
    fn class_mapping_matches_fault_taxonomy() {
        assert_eq!(FaultCode::InvalidRegister.class(), FaultClass::Decode);
        assert_eq!(FaultCode::OperandMismatch.class(), FaultClass::Decode);
        assert_eq!(FaultCode::RomReadFailed.class(), FaultClass::Rom);
        assert_eq!(FaultCode::InputNotPending.class(), FaultClass::Host);
    }

    #[test]
    fn copy_error_reports_sizes() {
        let err = MemoryCopyError::DestinationTooSmall {
            needed: 10,
            available: 4,
        };
        assert_eq!(
            err.to_string(),
            "destination holds 4 bytes but 10 are required"
        );
    }
}
