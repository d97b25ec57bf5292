mod base;
mod worker;

pub use base::*;
pub use worker::*;
