//! Fuzz target: `OutputCode::from_str`
//!
//! Feeds arbitrary console lines to the code parser and asserts that it
//! never panics, and that anything it accepts renders to text that parses
//! back to the same code.
//!
//! cargo fuzz run fuzz_output_code

#![no_main]

use caster_interface::app::code::OutputCode;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(line) = core::str::from_utf8(data) else {
        return;
    };

    if let Ok(code) = line.parse::<OutputCode>() {
        let text = code.to_string();
        let again: OutputCode = text.parse().expect("rendered code must parse");
        assert_eq!(again, code);
    }
});
