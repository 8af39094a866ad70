//! ImportError: Unified error type for import-plan public APIs
//!
//! Every fallible operation of the crate (map construction, ownership
//! lookup, plan construction, union, projection and data transfer) reports
//! failures through this type instead of panicking.

use thiserror::Error;

use crate::Gid;

/// Unified error type for plan construction and communication.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Two arrays that must be parallel have different lengths.
    #[error("Length mismatch: {what} ({left} vs {right})")]
    LengthMismatch {
        what: &'static str,
        left: usize,
        right: usize,
    },
    /// A local index is outside the valid range of its map or buffer.
    #[error("{what} LID {lid} out of range (len = {len})")]
    LidOutOfRange {
        what: &'static str,
        lid: usize,
        len: usize,
    },
    /// A rank is outside the communicator.
    #[error("rank {rank} out of range for communicator of size {size}")]
    RankOutOfRange { rank: usize, size: usize },
    /// A GID appears more than once in one process's element list.
    #[error("GID {gid} appears more than once in the local element list")]
    DuplicateGid { gid: Gid },
    /// A user-supplied global element count disagrees with the sum of local counts.
    #[error("global element count mismatch: expected {expected}, counted {actual}")]
    GlobalCountMismatch { expected: u64, actual: u64 },
    /// Union inputs do not share the same source map.
    #[error("set_union: the source maps of both imports must be the same")]
    SourceMapMismatch,
    /// The remote-only target map has the wrong number of local elements.
    #[error("remote-only import: remote target has {got} elements, expected {expected}")]
    RemoteMapSizeMismatch { expected: usize, got: usize },
    /// A remote GID of the plan is missing from the remote-only target map.
    #[error("remote-only import: GID {gid} is not present in the remote target map")]
    RemoteGidMissing { gid: Gid },
    /// The remote-only target map does not preserve the plan's remote order.
    #[error(
        "remote-only import: remote target order does not match (position {index}: LID {current} follows {previous})"
    )]
    RemoteOrderMismatch {
        index: usize,
        previous: usize,
        current: usize,
    },
    /// Some remote GIDs are not owned by any process of the source map.
    #[error(
        "{count} remote GID(s) (first: {first}) are not owned by any process in the source map; \
         source and target maps do not share the same global GID set"
    )]
    RemoteGidsNotOwned { count: usize, first: Gid },
    /// Another rank found remote GIDs that no process owns.
    #[error("{count} remote GID(s) on other ranks are not owned by any process in the source map")]
    RemoteGidsNotOwnedOnPeer { count: u64 },
    /// An exported GID is not present in the local source map (bug in ownership resolution).
    #[error("rank {rank}: exported GID {gid} is not owned locally by the source map")]
    ExportGidNotLocal { gid: Gid, rank: usize },
    /// Communication with a neighbor failed.
    #[error("communication error with rank {neighbor}: {source}")]
    CommError {
        neighbor: usize,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// A received buffer has an unexpected byte length.
    #[error("buffer size mismatch from rank {neighbor}: expected {expected} bytes, got {got}")]
    BufferSizeMismatch {
        neighbor: usize,
        expected: usize,
        got: usize,
    },
    /// A received message carries an unexpected number of records.
    #[error("record count mismatch from rank {neighbor}: expected {expected}, got {got}")]
    PartCountMismatch {
        neighbor: usize,
        expected: usize,
        got: usize,
    },
    /// Internal consistency failure. Never caused by user input.
    #[error("internal consistency failure: {0}")]
    Internal(String),
}

impl ImportError {
    /// True for errors that indicate a bug rather than bad input.
    pub fn is_logic_error(&self) -> bool {
        matches!(
            self,
            ImportError::ExportGidNotLocal { .. } | ImportError::Internal(_)
        )
    }
}
