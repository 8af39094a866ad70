//! Distributed GID → owning-rank directory.
//!
//! Each GID has a *home* rank (`gid mod size`) that records which process
//! owns it. Building the directory sends every local GID to its home;
//! a lookup sends each queried GID to its home and receives the owner back.
//! Both are two sparse exchanges over the communicator.

use std::collections::BTreeMap;

use hashbrown::HashMap;

use crate::algs::communicator::{CommTag, Communicator, ExchangeTags};
use crate::algs::exchange::{exchange_records, exchange_sizes_all};
use crate::algs::wire::{WireGid, WireGidRank};
use crate::import_error::ImportError;
use crate::Gid;

/// Home rank of `gid` in a communicator of `size` ranks.
pub fn home_rank(gid: Gid, size: usize) -> usize {
    gid.rem_euclid(size.max(1) as Gid) as usize
}

/// Owner records for the GIDs whose home is this rank.
#[derive(Debug, Default)]
pub struct Directory {
    owners: HashMap<Gid, usize>,
}

fn counts_per_rank<T>(outgoing: &BTreeMap<usize, Vec<T>>, size: usize) -> Vec<usize> {
    (0..size)
        .map(|p| outgoing.get(&p).map_or(0, Vec::len))
        .collect()
}

impl Directory {
    /// Register this rank's `elements` with their home ranks (collective).
    ///
    /// A GID held by several ranks is attributed to the lowest of them.
    pub fn build<C: Communicator + ?Sized>(elements: &[Gid], comm: &C) -> Result<Self, ImportError> {
        let size = comm.size();
        let me = comm.rank();
        let mut outgoing: BTreeMap<usize, Vec<WireGidRank>> = BTreeMap::new();
        for &gid in elements {
            outgoing
                .entry(home_rank(gid, size))
                .or_default()
                .push(WireGidRank::new(gid, Some(me)));
        }

        let tags = ExchangeTags::from_base(CommTag::DIRECTORY_BUILD);
        let recv_counts = exchange_sizes_all(&counts_per_rank(&outgoing, size), comm, tags.sizes)?;
        let received = exchange_records(&outgoing, &recv_counts, comm, tags.data)?;

        let mut owners: HashMap<Gid, usize> = HashMap::new();
        for (&from, records) in &received {
            for rec in records {
                let owner = rec.rank().ok_or_else(|| {
                    ImportError::Internal(format!(
                        "directory registration from rank {from} carries no owner"
                    ))
                })?;
                let gid = rec.gid();
                owners
                    .entry(gid)
                    .and_modify(|o| {
                        log::debug!("{me}: directory: GID {gid} held by ranks {o} and {owner}");
                        *o = (*o).min(owner);
                    })
                    .or_insert(owner);
            }
        }
        Ok(Self { owners })
    }

    /// Number of GIDs whose home is this rank.
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Owner of each GID in `gids`, `None` if no rank holds it (collective).
    pub fn lookup<C: Communicator + ?Sized>(
        &self,
        gids: &[Gid],
        comm: &C,
    ) -> Result<Vec<Option<usize>>, ImportError> {
        let size = comm.size();
        let mut outgoing: BTreeMap<usize, Vec<WireGid>> = BTreeMap::new();
        let mut positions: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (i, &gid) in gids.iter().enumerate() {
            let home = home_rank(gid, size);
            outgoing.entry(home).or_default().push(WireGid::of(gid));
            positions.entry(home).or_default().push(i);
        }
        let query_counts = counts_per_rank(&outgoing, size);

        let tags = ExchangeTags::from_base(CommTag::DIRECTORY_QUERY);
        let recv_counts = exchange_sizes_all(&query_counts, comm, tags.sizes)?;
        let queries = exchange_records(&outgoing, &recv_counts, comm, tags.data)?;

        let replies: BTreeMap<usize, Vec<WireGidRank>> = queries
            .iter()
            .map(|(&from, qs)| {
                let answers = qs
                    .iter()
                    .map(|q| WireGidRank::new(q.get(), self.owners.get(&q.get()).copied()))
                    .collect();
                (from, answers)
            })
            .collect();
        // A reply carries exactly as many records as the query it answers.
        let answers = exchange_records(&replies, &query_counts, comm, tags.data.offset(1))?;

        let mut owners = vec![None; gids.len()];
        for (home, idxs) in &positions {
            let ans = answers.get(home).ok_or_else(|| ImportError::CommError {
                neighbor: *home,
                source: "missing directory reply".into(),
            })?;
            if ans.len() != idxs.len() {
                return Err(ImportError::PartCountMismatch {
                    neighbor: *home,
                    expected: idxs.len(),
                    got: ans.len(),
                });
            }
            for (&i, a) in idxs.iter().zip(ans) {
                if a.gid() != gids[i] {
                    return Err(ImportError::Internal(format!(
                        "directory reply from rank {home} answers GID {} for query {}",
                        a.gid(),
                        gids[i]
                    )));
                }
                owners[i] = a.rank();
            }
        }
        Ok(owners)
    }
}
