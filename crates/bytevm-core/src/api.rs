//! Host-facing contracts: notifications, input providers, and step results.

use crate::fault::FaultCode;

/// Synchronous event raised while an instruction executes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Notification {
    /// A write instruction produced text.
    OutputWritten(String),
    /// One RAM byte changed.
    ByteChanged {
        /// Written address.
        address: u16,
        /// New byte value.
        value: u8,
    },
    /// A contiguous RAM range changed.
    ///
    /// Only bytes that landed in RAM are covered. A string that runs into the
    /// ROM window is cut short there, and one that wraps past `0xFFFF` is
    /// reported again from `0x0000`.
    RangeChanged {
        /// First written address.
        start: u16,
        /// Number of RAM bytes written, terminator included when it landed.
        length: usize,
    },
    /// A different ROM bank was mapped into the bank window.
    RomBankSwitched {
        /// Index of the newly mapped bank.
        bank: u64,
    },
}

/// Observer for notifications delivered during a step.
///
/// Handlers run inline; execution resumes only after they return.
pub trait NotificationSink {
    /// Receives one notification in execution order.
    fn on_notification(&mut self, notification: Notification);
}

/// Sink that discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn on_notification(&mut self, _notification: Notification) {}
}

/// Sink that keeps every notification in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordingSink {
    /// Notifications received so far.
    pub notifications: Vec<Notification>,
}

impl RecordingSink {
    /// Concatenates all `OutputWritten` text received so far.
    #[must_use]
    pub fn output(&self) -> String {
        self.notifications
            .iter()
            .filter_map(|notification| match notification {
                Notification::OutputWritten(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Drains and returns the recorded notifications.
    pub fn take(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }
}

impl NotificationSink for RecordingSink {
    fn on_notification(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }
}

/// Supplies lines of text to read instructions.
///
/// Called synchronously from inside a step and may block.
pub trait InputProvider {
    /// Returns the next line of input, without its line terminator.
    fn read_line(&mut self) -> String;
}

impl<F> InputProvider for F
where
    F: FnMut() -> String,
{
    fn read_line(&mut self) -> String {
        self()
    }
}

/// Messages returned in rotation by [`SyntheticInput`].
pub const SYNTHETIC_MESSAGES: [&str; 6] = [
    "hello",
    "is anyone there?",
    "forever",
    "0123456789",
    "the quick brown fox jumps over the lazy dog",
    "",
];

/// Non-interactive provider cycling through [`SYNTHETIC_MESSAGES`].
#[derive(Debug, Clone, Default)]
pub struct SyntheticInput {
    next: usize,
}

impl SyntheticInput {
    /// Creates a provider that starts at message `start` (modulo the list length).
    #[must_use]
    pub const fn starting_at(start: usize) -> Self {
        Self {
            next: start % SYNTHETIC_MESSAGES.len(),
        }
    }
}

impl InputProvider for SyntheticInput {
    fn read_line(&mut self) -> String {
        let message = SYNTHETIC_MESSAGES[self.next];
        self.next = (self.next + 1) % SYNTHETIC_MESSAGES.len();
        message.to_owned()
    }
}

/// Result of one `step` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepOutcome {
    /// The instruction at `address` completed.
    Retired {
        /// Address of the retired instruction.
        address: u16,
        /// Raw opcode byte of the retired instruction.
        opcode: u8,
    },
    /// A read instruction is suspended until the host supplies input.
    AwaitingInput {
        /// Address of the suspended read instruction.
        address: u16,
    },
    /// Execution stopped on a fault.
    Fault {
        /// Fault raised or still latched.
        cause: FaultCode,
    },
}

impl StepOutcome {
    /// Returns `true` for [`StepOutcome::Retired`].
    #[must_use]
    pub const fn is_retired(self) -> bool {
        matches!(self, Self::Retired { .. })
    }
}

/// Aggregated outcome from running multiple steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunOutcome {
    /// Number of retired instructions during this run call.
    pub steps: u64,
    /// Last step-level status observed before returning.
    pub final_step: StepOutcome,
}

#[cfg(test)]
mod tests {
    use super::{
        InputProvider, Notification, NotificationSink, NullSink, RecordingSink, StepOutcome,
        SyntheticInput, SYNTHETIC_MESSAGES,
    };
    use crate::fault::FaultCode;

    #[test]
    fn recording_sink_collects_in_order_and_joins_output() {
        let mut sink = RecordingSink::default();
        sink.on_notification(Notification::OutputWritten("he".to_owned()));
        sink.on_notification(Notification::ByteChanged {
            address: 1,
            value: 2,
        });
        sink.on_notification(Notification::OutputWritten("llo".to_owned()));

        assert_eq!(sink.output(), "hello");
        assert_eq!(sink.take().len(), 3);
        assert!(sink.notifications.is_empty());
    }

    #[test]
    fn null_sink_accepts_anything() {
        NullSink.on_notification(Notification::RomBankSwitched { bank: 9 });
    }

    #[test]
    fn closures_are_input_providers() {
        let mut calls = 0;
        let mut provider = || {
            calls += 1;
            format!("line {calls}")
        };
        assert_eq!(provider.read_line(), "line 1");
        assert_eq!(provider.read_line(), "line 2");
    }

    #[test]
    fn synthetic_input_cycles_deterministically() {
        let mut input = SyntheticInput::default();
        let first_pass: Vec<String> = (0..SYNTHETIC_MESSAGES.len())
            .map(|_| input.read_line())
            .collect();
        assert_eq!(first_pass, SYNTHETIC_MESSAGES);
        assert_eq!(input.read_line(), SYNTHETIC_MESSAGES[0]);

        let mut offset = SyntheticInput::starting_at(SYNTHETIC_MESSAGES.len() + 2);
        assert_eq!(offset.read_line(), SYNTHETIC_MESSAGES[2]);
    }

    #[test]
    fn only_retired_outcomes_report_retired() {
        assert!(StepOutcome::Retired {
            address: 0,
            opcode: 0
        }
        .is_retired());
        assert!(!StepOutcome::AwaitingInput { address: 0 }.is_retired());
        assert!(!StepOutcome::Fault {
            cause: FaultCode::InvalidRegister
        }
        .is_retired());
    }
}
