//! Fuzz target: `CycleSensor::on_edge_at`
//!
//! Interprets the input as a sequence of inter-edge gaps and checks the
//! filter's bookkeeping after every edge: state parity follows the
//! generation, only gaps above the threshold are accepted, and every edge
//! is either accepted or counted as a bounce.
//!
//! cargo fuzz run fuzz_debounce_edges

#![no_main]

use core::time::Duration;

use caster_interface::sensors::cycle::{CycleSensor, GEN_MASK, InputState};
use libfuzzer_sys::fuzz_target;

const THRESHOLD_US: u64 = 10_000;

fuzz_target!(|data: &[u8]| {
    let sensor = CycleSensor::new(Duration::from_micros(THRESHOLD_US));
    let mut t = sensor.snapshot().last_edge_us;
    let mut accepted: u32 = 0;

    // Two bytes per gap, scaled so both sides of the threshold are common.
    for chunk in data.chunks_exact(2) {
        let gap = u64::from(u16::from_le_bytes([chunk[0], chunk[1]])) / 2;
        let before = sensor.snapshot();
        t += gap;
        sensor.on_edge_at(t);
        let after = sensor.snapshot();

        let stepped = after.transitions_since(before.generation);
        assert_eq!(stepped, u16::from(gap > THRESHOLD_US));
        assert_eq!(after.state == InputState::On, after.generation % 2 == 1);
        assert_eq!(after.last_edge_us, t);
        accepted += u32::from(stepped);
    }

    let edges = (data.len() / 2) as u32;
    assert_eq!(accepted + sensor.bounces(), edges);
    assert_eq!(u32::from(sensor.snapshot().generation), accepted & u32::from(GEN_MASK));
});
