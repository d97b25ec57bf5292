pub mod errors;
pub mod shutdown;
pub mod signal;
