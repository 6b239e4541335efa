#![forbid(unsafe_code)]

mod emit;

pub use emit::{emit_program, render_type};
