#![forbid(unsafe_code)]

pub mod ir;
pub mod types;
pub mod value;

pub use ir::*;
pub use types::*;
pub use value::*;
