#![cfg_attr(docsrs, feature(doc_cfg))]
//! # import-plan
//!
//! import-plan builds communication plans between two distributions of a
//! global index space. Given a *source* and a *target* [`Map`](data::map::Map)
//! on every rank, an [`Import`](import::Import) records which target
//! entries are copied in place, which are permuted locally and which must
//! be received from another rank, together with the dual list of local
//! entries every rank must send.
//!
//! ## Features
//! - Classification of target entries into same, permuted and remote
//! - Distributed owner lookup through a GID directory
//! - Peer discovery of export lists (`create_from_recvs`), no all-to-all of GIDs
//! - Plan reversal, union of two plans and restriction to remote entries
//! - Pluggable communication backends (serial, threads, MPI)
//!
//! ## Usage
//! ```toml
//! [dependencies]
//! import-plan = "0.3"
//! # Optional features:
//! # features = ["mpi-support","rayon"]
//! ```
//!
//! All collective operations must be called by every rank of the
//! communicator in the same order.

pub mod algs;
pub mod data;
pub mod debug_invariants;
pub mod distributor;
pub mod import;
pub mod import_error;

pub use debug_invariants::DebugInvariants;

/// Global identifier of an element of a distributed index space.
pub type Gid = i64;
/// Position of an element in one rank's local element list.
pub type Lid = usize;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::communicator::{Communicator, NoComm, RayonComm, Wait};
    pub use crate::data::map::{LookupStatus, Map};
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::distributor::Distributor;
    pub use crate::import::{
        CombineMode, ExportStrategy, Import, ImportConfig, ImportParts, UnownedRemoteHandling,
        UserExports,
    };
    pub use crate::import_error::ImportError;
    pub use crate::{Gid, Lid};
}
