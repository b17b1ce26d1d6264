//! Description fuzz target: load arbitrary bytes as a grammar description.
//! Loading must not panic; it either installs a grammar or reports a status code.
//! Build with: cargo fuzz run description_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let Ok(mut grammar) = yaep::Grammar::new() else {
        return;
    };
    for strict in [true, false] {
        if grammar.parse_description_bytes(data, strict).is_ok() {
            let _ = grammar.parse(data.iter().map(|&b| i32::from(b)));
        }
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run description_fuzz");
}
