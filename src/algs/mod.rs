//! Communication primitives used by plan construction.

pub mod communicator;
pub mod exchange;
pub mod sort;
pub mod wire;

pub use exchange::{exchange_records, exchange_sizes_all};
pub use sort::{sort2, sort3};
