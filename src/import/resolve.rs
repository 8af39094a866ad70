//! Owner resolution for remote GIDs.

use crate::algs::communicator::{Communicator, allgather_u64};
use crate::algs::sort::sort3;
use crate::data::map::{LookupStatus, Map};
use crate::import::config::{ImportConfig, UnownedRemoteHandling};
use crate::import_error::ImportError;
use crate::{Gid, Lid};

/// Remote entries with their owning ranks, sorted by owner (stable).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct ResolvedRemotes {
    pub remote_pids: Vec<usize>,
    pub remote_gids: Vec<Gid>,
    pub remote_lids: Vec<Lid>,
}

/// Look up the owner of every remote GID in the source map's directory
/// (collective) and drop or reject unowned entries per `config`.
pub(crate) fn resolve_remote_owners<C: Communicator>(
    source: &Map<C>,
    remote_gids: Vec<Gid>,
    remote_lids: Vec<Lid>,
    config: &ImportConfig,
) -> Result<ResolvedRemotes, ImportError> {
    let (owners, status) = source.remote_index_list(&remote_gids)?;
    let me = source.comm().rank();

    let unowned = owners.iter().filter(|o| o.is_none()).count();
    if config.unowned_remotes == UnownedRemoteHandling::Error {
        // Every rank must leave together, or peers block in the next exchange.
        let counts = allgather_u64(&**source.comm(), unowned as u64);
        if unowned > 0 {
            let first = remote_gids
                .iter()
                .zip(&owners)
                .find_map(|(&g, o)| o.is_none().then_some(g))
                .unwrap_or_default();
            return Err(ImportError::RemoteGidsNotOwned {
                count: unowned,
                first,
            });
        }
        let elsewhere: u64 = counts.iter().sum();
        if elsewhere > 0 {
            return Err(ImportError::RemoteGidsNotOwnedOnPeer { count: elsewhere });
        }
    }

    if status == LookupStatus::AllIdsPresent {
        let mut remote_pids: Vec<usize> = owners.into_iter().flatten().collect();
        let (mut remote_gids, mut remote_lids) = (remote_gids, remote_lids);
        sort3(&mut remote_pids, &mut remote_gids, &mut remote_lids)?;
        return Ok(ResolvedRemotes {
            remote_pids,
            remote_gids,
            remote_lids,
        });
    }

    let total = remote_gids.len();
    if config.unowned_remotes == UnownedRemoteHandling::Warn {
        if unowned == total {
            log::warn!(
                "{me}: Import ctor: none of the {total} remote GIDs is owned by any process \
                 of the source map; dropping the whole remote set"
            );
        } else {
            log::warn!(
                "{me}: Import ctor: {unowned} of {total} remote GIDs are not owned by any process \
                 of the source map; they will be ignored"
            );
        }
    }

    let mut remote_pids = Vec::with_capacity(total - unowned);
    let mut kept_gids = Vec::with_capacity(total - unowned);
    let mut kept_lids = Vec::with_capacity(total - unowned);
    for ((owner, gid), lid) in owners.into_iter().zip(remote_gids).zip(remote_lids) {
        if let Some(pid) = owner {
            remote_pids.push(pid);
            kept_gids.push(gid);
            kept_lids.push(lid);
        }
    }
    if remote_pids.len() != total - unowned {
        return Err(ImportError::Internal(format!(
            "compacted {} remote entries, expected {} - {}",
            remote_pids.len(),
            total,
            unowned
        )));
    }
    sort3(&mut remote_pids, &mut kept_gids, &mut kept_lids)?;
    Ok(ResolvedRemotes {
        remote_pids,
        remote_gids: kept_gids,
        remote_lids: kept_lids,
    })
}
