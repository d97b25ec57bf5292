pub mod definition;
pub mod filter;
pub mod reconcile;
