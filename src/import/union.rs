//! Union of two plans that share a source map.

use std::sync::Arc;

use itertools::Itertools;

use super::export_plan::export_gids_to_lids;
use super::{ExportStrategy, Import};
use crate::algs::communicator::Communicator;
use crate::algs::sort2;
use crate::data::map::Map;
use crate::distributor::Distributor;
use crate::import_error::ImportError;
use crate::{Gid, Lid};

/// Sorted GIDs of `lids` in `map`.
fn sorted_gids<C: Communicator>(map: &Map<C>, lids: &[Lid]) -> Result<Vec<Gid>, ImportError> {
    let mut gids = lids
        .iter()
        .map(|&lid| {
            map.global_element(lid).ok_or(ImportError::LidOutOfRange {
                what: "union input",
                lid,
                len: map.num_local_elements(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    gids.sort_unstable();
    Ok(gids)
}

/// Sorted `(owner, gid)` pairs of a plan's remote entries.
fn sorted_remote_pairs<C: Communicator>(plan: &Import<C>) -> Result<Vec<(usize, Gid)>, ImportError> {
    let gids = plan.remote_gids();
    if gids.len() != plan.remote_pids.len() {
        return Err(ImportError::Internal(format!(
            "{} remote GIDs recovered for {} remote LIDs",
            gids.len(),
            plan.remote_pids.len()
        )));
    }
    let mut pairs: Vec<(usize, Gid)> = plan.remote_pids.iter().copied().zip(gids).collect();
    pairs.sort_unstable();
    Ok(pairs)
}

impl<C: Communicator> Import<C> {
    /// Plan from the shared source to the union of both targets (collective).
    ///
    /// The union target holds, in order: the longer same prefix (this
    /// plan's on a tie), the sorted union of permuted GIDs, then the remote
    /// GIDs sorted by `(owner, gid)`. Its index base is the smaller of the
    /// two. If both targets are the same map a copy of `self` is returned.
    pub fn set_union(&self, other: &Import<C>) -> Result<Self, ImportError> {
        if !Arc::ptr_eq(&self.source, &other.source) && !self.source.is_same_as(&other.source) {
            return Err(ImportError::SourceMapMismatch);
        }
        if self.target.is_same_as(&other.target) {
            return Ok(self.clone());
        }
        let me = self.source.comm().rank();
        let debug = self.config.debug;

        // same prefix
        let (long, num_same_short) = if self.num_same >= other.num_same {
            (self, other.num_same)
        } else {
            (other, self.num_same)
        };
        let num_same = long.num_same;
        let same_gids = &long.target.element_list()[..num_same];

        // permutes: drop GIDs the longer prefix already covers
        let mut permute1 = sorted_gids(&self.target, &self.permute_to_lids)?;
        let mut permute2 = sorted_gids(&other.target, &other.permute_to_lids)?;
        let mut covered = same_gids[num_same_short..].to_vec();
        covered.sort_unstable();
        let short_permutes = if std::ptr::eq(long, self) {
            &mut permute2
        } else {
            &mut permute1
        };
        short_permutes.retain(|g| covered.binary_search(g).is_err());
        let permute_gids: Vec<Gid> = permute1.into_iter().merge(permute2).dedup().collect();

        // remotes: owners are already known to both inputs
        let remote_pairs: Vec<(usize, Gid)> = sorted_remote_pairs(self)?
            .into_iter()
            .merge(sorted_remote_pairs(other)?)
            .dedup()
            .collect();
        let (remote_pids, remote_gids): (Vec<usize>, Vec<Gid>) = remote_pairs.into_iter().unzip();

        if debug {
            log::debug!(
                "{me}: Import::set_union: {num_same} same, {} permute, {} remote",
                permute_gids.len(),
                remote_gids.len()
            );
        }

        let num_permute = permute_gids.len();
        let num_remote = remote_gids.len();
        let union_gids: Vec<Gid> = same_gids
            .iter()
            .chain(&permute_gids)
            .chain(&remote_gids)
            .copied()
            .collect();
        let index_base = self.target.index_base().min(other.target.index_base());
        let comm = Arc::clone(self.source.comm());
        let union_target = Arc::new(Map::new(None, union_gids, index_base, Arc::clone(&comm))?);

        let permute_to_lids: Vec<Lid> = (num_same..num_same + num_permute).collect();
        let permute_from_lids = permute_gids
            .iter()
            .map(|&gid| {
                self.source.local_element(gid).ok_or_else(|| {
                    ImportError::Internal(format!("union permute GID {gid} is not in the source map"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let remote_lids: Vec<Lid> =
            (num_same + num_permute..num_same + num_permute + num_remote).collect();

        let (export_lids, export_pids, distributor) = match self.config.export_strategy {
            ExportStrategy::FromRecvs => {
                let (distributor, export_gids, export_pids) =
                    Distributor::create_from_recvs(comm, &remote_gids, &remote_pids)?;
                let export_lids = export_gids_to_lids(&self.source, &export_gids)?;
                (export_lids, export_pids, distributor)
            }
            ExportStrategy::FromSends => self.merged_exports(other, comm, num_remote)?,
        };

        if debug {
            log::debug!(
                "{me}: Import::set_union: {} exports to ranks {:?}",
                export_lids.len(),
                distributor.images_to()
            );
        }

        Ok(Self::assemble(
            Arc::clone(&self.source),
            union_target,
            num_same,
            permute_to_lids,
            permute_from_lids,
            remote_lids,
            remote_pids,
            export_lids,
            export_pids,
            distributor,
            self.config,
        )
        .ready())
    }

    /// Export side of a union from the inputs' export lists; only message
    /// sizes are exchanged.
    ///
    /// Exports to one rank are ordered by source GID, which is the order in
    /// which the receiver lists its remote entries from this rank.
    fn merged_exports(
        &self,
        other: &Import<C>,
        comm: Arc<C>,
        num_remote: usize,
    ) -> Result<(Vec<Lid>, Vec<usize>, Distributor<C>), ImportError> {
        let src = self.source.element_list();
        let len = self.export_lids.len() + other.export_lids.len();
        let mut keys: Vec<(usize, Gid)> = Vec::with_capacity(len);
        let mut lids: Vec<Lid> = Vec::with_capacity(len);
        for (&pid, &lid) in self
            .export_pids
            .iter()
            .zip(&self.export_lids)
            .chain(other.export_pids.iter().zip(&other.export_lids))
        {
            let gid = *src.get(lid).ok_or(ImportError::LidOutOfRange {
                what: "union export",
                lid,
                len: src.len(),
            })?;
            keys.push((pid, gid));
            lids.push(lid);
        }
        sort2(&mut keys, &mut lids)?;

        let (export_pids, export_lids): (Vec<usize>, Vec<Lid>) = keys
            .into_iter()
            .zip(lids)
            .dedup()
            .map(|((pid, _), lid)| (pid, lid))
            .unzip();
        let (distributor, num_recv) = Distributor::create_from_sends(comm, &export_pids)?;
        if num_recv != num_remote {
            return Err(ImportError::Internal(format!(
                "union expects {num_remote} remote entries but peers send {num_recv}"
            )));
        }
        Ok((export_lids, export_pids, distributor))
    }

    /// Union of this plan with the identity plan on its source map.
    ///
    /// The result's target is the source element list followed by this
    /// plan's remote GIDs; exports and distributor are reused unchanged.
    /// Collective only through the construction of the new target map.
    pub fn set_union_with_source(&self) -> Result<Self, ImportError> {
        let num_same = self.source.num_local_elements();
        let remote_gids = self.remote_gids();
        let num_remote = remote_gids.len();
        let union_gids: Vec<Gid> = self
            .source
            .element_list()
            .iter()
            .copied()
            .chain(remote_gids)
            .collect();
        let union_target = Arc::new(Map::new(
            None,
            union_gids,
            self.source.index_base(),
            Arc::clone(self.source.comm()),
        )?);
        let plan = Self {
            source: Arc::clone(&self.source),
            target: union_target,
            num_same,
            permute_to_lids: Vec::new(),
            permute_from_lids: Vec::new(),
            remote_lids: (num_same..num_same + num_remote).collect(),
            remote_pids: self.remote_pids.clone(),
            export_lids: self.export_lids.clone(),
            export_pids: self.export_pids.clone(),
            distributor: Arc::clone(&self.distributor),
            config: self.config,
            reversed: false,
        };
        Ok(plan.ready())
    }
}
