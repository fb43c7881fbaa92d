//! Register file and execution-state model primitives.

/// Register file types and address-advance rules.
pub mod registers;
/// Host-observable execution state machine.
pub mod run_state;

pub use registers::{
    next_address_for_ip, next_address_for_sp, previous_address_for_sp, IpAdvance, Register,
    RegisterFile, RegisterWrite, FLAGS_COMPARE_MASK, FLAGS_EQUAL, FLAGS_GREATER, FLAGS_LESS,
    REGISTER_COUNT, SP_MAX,
};
pub use run_state::RunState;
