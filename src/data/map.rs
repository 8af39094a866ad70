//! Distributed index space: an ordered, process-local list of global IDs.
//!
//! A [`Map`] assigns every global identifier (GID) of an index space to the
//! processes that hold it. On each process the position of a GID in the
//! local element list is its local identifier (LID). Maps are immutable
//! after construction and are shared between plans through `Arc`.
//!
//! Construction is collective for [`Map::new`] and [`Map::contiguous`]
//! (one allgather of local counts); [`Map::locally_replicated`] needs no
//! communication.

use std::sync::Arc;

use hashbrown::HashMap;
use once_cell::sync::OnceCell;

use crate::algs::communicator::{Communicator, all_reduce_and, allgather_u64};
use crate::data::directory::Directory;
use crate::debug_invariants::DebugInvariants;
use crate::import_error::ImportError;
use crate::{Gid, Lid};

/// Result of a distributed ownership lookup.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LookupStatus {
    /// Every queried GID has an owner.
    AllIdsPresent,
    /// At least one queried GID is owned by no process.
    IdNotPresent,
}

/// One process's view of a distributed index space.
#[derive(Debug)]
pub struct Map<C> {
    comm: Arc<C>,
    elements: Vec<Gid>,
    lookup: HashMap<Gid, Lid>,
    index_base: Gid,
    global_count: u64,
    distributed: bool,
    directory: OnceCell<Directory>,
}

fn build_lookup(elements: &[Gid]) -> Result<HashMap<Gid, Lid>, ImportError> {
    let mut lookup = HashMap::with_capacity(elements.len());
    for (lid, &gid) in elements.iter().enumerate() {
        if lookup.insert(gid, lid).is_some() {
            return Err(ImportError::DuplicateGid { gid });
        }
    }
    Ok(lookup)
}

impl<C: Communicator> Map<C> {
    /// Build a map from this process's GIDs (collective).
    ///
    /// `global_count` may be `None`, in which case the sum of the local
    /// counts is used; if given, it must equal that sum.
    pub fn new(
        global_count: Option<u64>,
        elements: Vec<Gid>,
        index_base: Gid,
        comm: Arc<C>,
    ) -> Result<Self, ImportError> {
        // Gather before any local validation so that every rank completes
        // the collective even if this one rejects its input.
        let counts = allgather_u64(&*comm, elements.len() as u64);
        let actual: u64 = counts.iter().sum();
        if let Some(expected) = global_count {
            if expected != actual {
                return Err(ImportError::GlobalCountMismatch { expected, actual });
            }
        }
        let lookup = build_lookup(&elements)?;
        let distributed = comm.size() > 1 && counts.iter().any(|&c| c != actual);
        Ok(Self {
            comm,
            elements,
            lookup,
            index_base,
            global_count: actual,
            distributed,
            directory: OnceCell::new(),
        })
    }

    /// Uniform contiguous distribution of `global_count` GIDs starting at
    /// `index_base`; the remainder goes to the lowest ranks (collective).
    pub fn contiguous(global_count: u64, index_base: Gid, comm: Arc<C>) -> Result<Self, ImportError> {
        let size = comm.size().max(1) as u64;
        let rank = comm.rank() as u64;
        let chunk = global_count / size;
        let rem = global_count % size;
        let count = chunk + u64::from(rank < rem);
        let start = rank * chunk + rank.min(rem);
        let elements = (0..count)
            .map(|i| index_base + (start + i) as Gid)
            .collect();
        Self::new(Some(global_count), elements, index_base, comm)
    }

    /// Map in which every process holds all `elements`. Never distributed.
    pub fn locally_replicated(
        elements: Vec<Gid>,
        index_base: Gid,
        comm: Arc<C>,
    ) -> Result<Self, ImportError> {
        let lookup = build_lookup(&elements)?;
        Ok(Self {
            comm,
            global_count: elements.len() as u64,
            elements,
            lookup,
            index_base,
            distributed: false,
            directory: OnceCell::new(),
        })
    }

    /// GIDs held by this process, indexed by LID.
    pub fn element_list(&self) -> &[Gid] {
        &self.elements
    }

    /// LID of `gid` on this process, if present.
    pub fn local_element(&self, gid: Gid) -> Option<Lid> {
        self.lookup.get(&gid).copied()
    }

    /// GID stored at `lid` on this process, if in range.
    pub fn global_element(&self, lid: Lid) -> Option<Gid> {
        self.elements.get(lid).copied()
    }

    pub fn is_node_global_element(&self, gid: Gid) -> bool {
        self.lookup.contains_key(&gid)
    }

    pub fn num_local_elements(&self) -> usize {
        self.elements.len()
    }

    /// Sum of local element counts over all processes.
    pub fn num_global_elements(&self) -> u64 {
        self.global_count
    }

    pub fn index_base(&self) -> Gid {
        self.index_base
    }

    pub fn comm(&self) -> &Arc<C> {
        &self.comm
    }

    /// True if more than one process participates and some process does
    /// not hold every global element.
    pub fn is_distributed(&self) -> bool {
        self.distributed
    }

    #[cfg(feature = "rayon")]
    pub(crate) fn lookup_table(&self) -> &HashMap<Gid, Lid> {
        &self.lookup
    }

    /// Structural equality on every process (collective unless both
    /// arguments are the same object).
    pub fn is_same_as(&self, other: &Map<C>) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        let locally_same = self.comm.size() == other.comm.size()
            && self.global_count == other.global_count
            && self.index_base == other.index_base
            && self.distributed == other.distributed
            && self.elements == other.elements;
        all_reduce_and(&*self.comm, locally_same)
    }

    /// Owning process of each GID in `gids` (collective).
    ///
    /// Entries owned by no process are `None` and the status is
    /// [`LookupStatus::IdNotPresent`]. A map that is not distributed
    /// answers locally: the owner is this process if it holds the GID.
    pub fn remote_index_list(
        &self,
        gids: &[Gid],
    ) -> Result<(Vec<Option<usize>>, LookupStatus), ImportError> {
        let owners: Vec<Option<usize>> = if self.distributed {
            let directory = self
                .directory
                .get_or_try_init(|| Directory::build(&self.elements, &*self.comm))?;
            directory.lookup(gids, &*self.comm)?
        } else {
            let me = self.comm.rank();
            gids.iter()
                .map(|&g| self.is_node_global_element(g).then_some(me))
                .collect()
        };
        let status = if owners.iter().all(Option::is_some) {
            LookupStatus::AllIdsPresent
        } else {
            LookupStatus::IdNotPresent
        };
        Ok((owners, status))
    }
}

impl<C> DebugInvariants for Map<C> {
    fn validate_invariants(&self) -> Result<(), ImportError> {
        if self.lookup.len() != self.elements.len() {
            return Err(ImportError::LengthMismatch {
                what: "map lookup table vs element list",
                left: self.lookup.len(),
                right: self.elements.len(),
            });
        }
        for (lid, gid) in self.elements.iter().enumerate() {
            if self.lookup.get(gid) != Some(&lid) {
                return Err(ImportError::Internal(format!(
                    "map lookup table maps GID {gid} away from LID {lid}"
                )));
            }
        }
        Ok(())
    }
}
