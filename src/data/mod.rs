//! Data module: distributed index spaces and their owner directory.

pub mod directory;
pub mod map;

pub use directory::Directory;
pub use map::{LookupStatus, Map};
