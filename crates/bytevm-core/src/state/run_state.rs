use crate::FaultCode;

/// Execution-state machine for host-observable control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum RunState {
    /// Ready to execute the next instruction.
    #[default]
    Running,
    /// A read instruction at `address` is suspended until input is supplied.
    AwaitingInput {
        /// Address of the suspended read instruction.
        address: u16,
    },
    /// Fault is latched and no further progress is possible without reset.
    FaultLatched(FaultCode),
}

impl RunState {
    /// Returns the currently latched fault, if this state is fault-latched.
    #[must_use]
    pub const fn latched_fault(self) -> Option<FaultCode> {
        match self {
            Self::FaultLatched(cause) => Some(cause),
            Self::Running | Self::AwaitingInput { .. } => None,
        }
    }

    /// Returns `true` while a read instruction is suspended.
    #[must_use]
    pub const fn is_awaiting_input(self) -> bool {
        matches!(self, Self::AwaitingInput { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::RunState;
    use crate::FaultCode;

    #[test]
    fn run_state_default_is_running() {
        assert_eq!(RunState::default(), RunState::Running);
    }

    #[test]
    fn latched_fault_accessor_reports_only_fault_latched_variant() {
        assert_eq!(RunState::Running.latched_fault(), None);
        assert_eq!(
            RunState::AwaitingInput { address: 0x8000 }.latched_fault(),
            None
        );
        assert_eq!(
            RunState::FaultLatched(FaultCode::InvalidRegister).latched_fault(),
            Some(FaultCode::InvalidRegister)
        );
    }

    #[test]
    fn awaiting_input_is_reported() {
        assert!(RunState::AwaitingInput { address: 1 }.is_awaiting_input());
        assert!(!RunState::Running.is_awaiting_input());
    }
}
