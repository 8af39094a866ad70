//! Two-stage neighbour exchange used by the directory and the distributor.
//!
//! Stage 1 ([`size_exchange`]) tells every rank how many records each peer
//! will send it; stage 2 ([`data_exchange`]) moves the records themselves,
//! touching only peer pairs with a non-zero count.

pub mod data_exchange;
pub mod size_exchange;

pub use data_exchange::exchange_records;
pub use size_exchange::exchange_sizes_all;
