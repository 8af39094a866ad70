//! Point-to-point communication schedule shared by a plan and its reverse.
//!
//! A [`Distributor`] records, for one rank, which peers it sends to and
//! receives from and how many items travel on each link. It is built once
//! (from receive lists, from send lists, or from both) and then reused to
//! move any `Pod` payload with [`Distributor::do_posts_and_waits`].
//!
//! Items on the send side are *packed* by destination rank (ascending).
//! If the caller's export list is not already grouped that way the
//! distributor keeps a packing permutation; the receive side likewise
//! keeps an unpacking permutation when remote entries are not grouped by
//! source rank.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use bytemuck::Pod;

use crate::Gid;
use crate::algs::communicator::{CommTag, Communicator, ExchangeTags};
use crate::algs::exchange::{exchange_records, exchange_sizes_all};
use crate::algs::wire::WireGid;
use crate::import_error::ImportError;

/// One direction (send or receive) of a schedule.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Side {
    /// Peer ranks, ascending and distinct.
    procs: Vec<usize>,
    /// Items exchanged with `procs[i]`.
    lengths: Vec<usize>,
    /// Offset of `procs[i]`'s block in the packed buffer.
    starts: Vec<usize>,
    /// Packed position -> item index. `None` if items are already grouped.
    indices: Option<Vec<usize>>,
}

impl Side {
    fn from_pids(pids: &[usize], size: usize) -> Result<Self, ImportError> {
        if let Some(&bad) = pids.iter().find(|&&p| p >= size) {
            return Err(ImportError::RankOutOfRange { rank: bad, size });
        }
        let indices = if pids.is_sorted() {
            None
        } else {
            let mut perm: Vec<usize> = (0..pids.len()).collect();
            perm.sort_by_key(|&i| pids[i]);
            Some(perm)
        };
        let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
        for &p in pids {
            *counts.entry(p).or_default() += 1;
        }
        let mut side = Side {
            indices,
            ..Side::default()
        };
        let mut offset = 0;
        for (p, n) in counts {
            side.procs.push(p);
            side.lengths.push(n);
            side.starts.push(offset);
            offset += n;
        }
        Ok(side)
    }

    fn from_counts(counts: &[usize]) -> Self {
        let mut side = Side::default();
        let mut offset = 0;
        for (p, &n) in counts.iter().enumerate().filter(|(_, n)| **n > 0) {
            side.procs.push(p);
            side.lengths.push(n);
            side.starts.push(offset);
            offset += n;
        }
        side
    }

    fn total(&self) -> usize {
        self.lengths.iter().sum()
    }

    /// Item index at packed position `k`.
    fn item(&self, k: usize) -> usize {
        self.indices.as_ref().map_or(k, |ix| ix[k])
    }

    /// Packed positions belonging to block `i`.
    fn block(&self, i: usize) -> std::ops::Range<usize> {
        self.starts[i]..self.starts[i] + self.lengths[i]
    }
}

/// Send/receive schedule of one rank.
pub struct Distributor<C> {
    comm: Arc<C>,
    to: Side,
    from: Side,
}

impl<C> Clone for Distributor<C> {
    fn clone(&self) -> Self {
        Self {
            comm: Arc::clone(&self.comm),
            to: self.to.clone(),
            from: self.from.clone(),
        }
    }
}

impl<C> fmt::Debug for Distributor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Distributor")
            .field("images_to", &self.to.procs)
            .field("lengths_to", &self.to.lengths)
            .field("images_from", &self.from.procs)
            .field("lengths_from", &self.from.lengths)
            .finish()
    }
}

/// Two schedules are equal if they move the same items along the same links.
impl<C> PartialEq for Distributor<C> {
    fn eq(&self, other: &Self) -> bool {
        self.to == other.to && self.from == other.from
    }
}

impl<C: Communicator> Distributor<C> {
    /// Empty schedule: nothing is sent or received.
    pub fn empty(comm: Arc<C>) -> Self {
        Self {
            comm,
            to: Side::default(),
            from: Side::default(),
        }
    }

    /// Peer discovery from the receive side (collective).
    ///
    /// Every rank lists the GIDs it needs and the rank owning each. The
    /// requests are delivered to the owners, so each rank learns which of
    /// its GIDs it must send and to whom. Returns the schedule together with
    /// the export GIDs and their destination ranks, grouped by destination
    /// rank (ascending) and in request order within a rank.
    pub fn create_from_recvs(
        comm: Arc<C>,
        remote_gids: &[Gid],
        remote_pids: &[usize],
    ) -> Result<(Self, Vec<Gid>, Vec<usize>), ImportError> {
        if remote_gids.len() != remote_pids.len() {
            return Err(ImportError::LengthMismatch {
                what: "remote GIDs vs remote PIDs",
                left: remote_gids.len(),
                right: remote_pids.len(),
            });
        }
        let size = comm.size();
        let from = Side::from_pids(remote_pids, size)?;

        let mut requests: BTreeMap<usize, Vec<WireGid>> = BTreeMap::new();
        for (&gid, &pid) in remote_gids.iter().zip(remote_pids) {
            requests.entry(pid).or_default().push(WireGid::of(gid));
        }
        let counts: Vec<usize> = (0..size)
            .map(|p| requests.get(&p).map_or(0, Vec::len))
            .collect();

        let tags = ExchangeTags::from_base(CommTag::DISTRIBUTOR_PLAN);
        let recv_counts = exchange_sizes_all(&counts, &*comm, tags.sizes)?;
        let incoming = exchange_records(&requests, &recv_counts, &*comm, tags.data)?;

        let mut export_gids = Vec::with_capacity(recv_counts.iter().sum());
        let mut export_pids = Vec::with_capacity(export_gids.capacity());
        for (&peer, gids) in &incoming {
            for g in gids {
                export_gids.push(g.get());
                export_pids.push(peer);
            }
        }
        let to = Side::from_pids(&export_pids, size)?;
        Ok((Self { comm, to, from }, export_gids, export_pids))
    }

    /// Peer discovery from the send side (collective).
    ///
    /// `export_pids` need not be sorted. Returns the schedule and the total
    /// number of items this rank will receive.
    pub fn create_from_sends(comm: Arc<C>, export_pids: &[usize]) -> Result<(Self, usize), ImportError> {
        let size = comm.size();
        let to = Side::from_pids(export_pids, size)?;
        let mut counts = vec![0usize; size];
        for (&p, &n) in to.procs.iter().zip(&to.lengths) {
            counts[p] = n;
        }
        let tags = ExchangeTags::from_base(CommTag::DISTRIBUTOR_PLAN.offset(4));
        let recv_counts = exchange_sizes_all(&counts, &*comm, tags.sizes)?;
        let from = Side::from_counts(&recv_counts);
        let total = from.total();
        Ok((Self { comm, to, from }, total))
    }

    /// Schedule from fully known send and receive sides. No communication.
    pub fn create_from_sends_and_recvs(
        comm: Arc<C>,
        export_pids: &[usize],
        remote_pids: &[usize],
    ) -> Result<Self, ImportError> {
        let size = comm.size();
        let to = Side::from_pids(export_pids, size)?;
        let from = Side::from_pids(remote_pids, size)?;
        Ok(Self { comm, to, from })
    }

    /// The same links with sends and receives exchanged. No communication.
    pub fn reverse(&self) -> Self {
        Self {
            comm: Arc::clone(&self.comm),
            to: self.from.clone(),
            from: self.to.clone(),
        }
    }

    pub fn comm(&self) -> &Arc<C> {
        &self.comm
    }

    /// Ranks this rank sends to, ascending.
    pub fn images_to(&self) -> &[usize] {
        &self.to.procs
    }

    /// Ranks this rank receives from, ascending.
    pub fn images_from(&self) -> &[usize] {
        &self.from.procs
    }

    pub fn lengths_to(&self) -> &[usize] {
        &self.to.lengths
    }

    pub fn lengths_from(&self) -> &[usize] {
        &self.from.lengths
    }

    /// True if this rank sends items to itself.
    pub fn has_self_message(&self) -> bool {
        self.to.procs.contains(&self.comm.rank())
    }

    /// Messages sent to other ranks.
    pub fn num_sends(&self) -> usize {
        self.to.procs.len() - usize::from(self.has_self_message())
    }

    /// Messages received from other ranks.
    pub fn num_receives(&self) -> usize {
        let me = self.comm.rank();
        self.from.procs.iter().filter(|&&p| p != me).count()
    }

    pub fn total_send_length(&self) -> usize {
        self.to.total()
    }

    pub fn total_receive_length(&self) -> usize {
        self.from.total()
    }

    /// Source rank of every received item, in item order.
    pub fn remote_pids(&self) -> Vec<usize> {
        let mut pids = vec![0; self.from.total()];
        for (i, &p) in self.from.procs.iter().enumerate() {
            for k in self.from.block(i) {
                pids[self.from.item(k)] = p;
            }
        }
        pids
    }

    /// Send `exports[j]` along the send side and fill `imports` from the
    /// receive side (collective among the linked ranks).
    ///
    /// `exports.len()` must equal [`total_send_length`](Self::total_send_length)
    /// and `imports.len()` [`total_receive_length`](Self::total_receive_length).
    pub fn do_posts_and_waits<T: Pod>(&self, exports: &[T], imports: &mut [T]) -> Result<(), ImportError> {
        if exports.len() != self.to.total() {
            return Err(ImportError::LengthMismatch {
                what: "export buffer vs send schedule",
                left: exports.len(),
                right: self.to.total(),
            });
        }
        if imports.len() != self.from.total() {
            return Err(ImportError::LengthMismatch {
                what: "import buffer vs receive schedule",
                left: imports.len(),
                right: self.from.total(),
            });
        }

        let mut outgoing: BTreeMap<usize, Vec<T>> = BTreeMap::new();
        for (i, &p) in self.to.procs.iter().enumerate() {
            let block = self.to.block(i).map(|k| exports[self.to.item(k)]).collect();
            outgoing.insert(p, block);
        }
        let mut recv_counts = vec![0usize; self.comm.size()];
        for (&p, &n) in self.from.procs.iter().zip(&self.from.lengths) {
            recv_counts[p] = n;
        }

        let received = exchange_records(&outgoing, &recv_counts, &*self.comm, CommTag::DISTRIBUTOR_DATA)?;

        for (i, p) in self.from.procs.iter().enumerate() {
            let data = received.get(p).ok_or_else(|| ImportError::CommError {
                neighbor: *p,
                source: "missing payload".into(),
            })?;
            if data.len() != self.from.lengths[i] {
                return Err(ImportError::PartCountMismatch {
                    neighbor: *p,
                    expected: self.from.lengths[i],
                    got: data.len(),
                });
            }
            for (k, v) in self.from.block(i).zip(data) {
                imports[self.from.item(k)] = *v;
            }
        }
        Ok(())
    }
}
