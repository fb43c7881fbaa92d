#![no_main]

use std::io::Cursor;
use std::num::NonZeroU64;

use bytevm_core::{
    disassemble, CoreConfig, Decoder, Engine, NullSink, SyntheticInput, DISASSEMBLY_WINDOW_BYTES,
};
use libfuzzer_sys::fuzz_target;

const STEP_BUDGET: NonZeroU64 = match NonZeroU64::new(4096) {
    Some(budget) => budget,
    None => unreachable!(),
};

fuzz_target!(|data: &[u8]| {
    let _ = Decoder::decode(0x8000, data);
    let window = &data[..data.len().min(DISASSEMBLY_WINDOW_BYTES)];
    let rows = disassemble(window, 0x8000, 16);
    assert_eq!(rows.len(), 16);

    let Ok(engine) = Engine::from_image(Cursor::new(data), CoreConfig::default()) else {
        return;
    };
    let mut engine = engine.with_input(SyntheticInput::default());
    let outcome = engine.run(&mut NullSink, Some(STEP_BUDGET));
    assert!(outcome.steps <= STEP_BUDGET.get());
    assert!(engine.sp() <= 0x7FFF);
    let _ = engine.disassemble_at_ip(8);
});
